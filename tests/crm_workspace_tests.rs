use folio_sync::{
    AutoConfirm, Car, CarPatch, CarStatus, CollectionPath, CrmWorkspace, Customer, DashboardStats,
    Identity, MemoryAuthProvider, MemoryDocumentStore, NoticeKind, Sale, SalePatch, SyncConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Fixture {
    store: Arc<MemoryDocumentStore>,
    confirm: Arc<AutoConfirm>,
    workspace: CrmWorkspace,
    identity: Identity,
}

async fn signed_in(confirm: AutoConfirm) -> Fixture {
    let store = Arc::new(MemoryDocumentStore::new());
    let confirm = Arc::new(confirm);
    let config = SyncConfig::new().app_id("crm-test");
    let workspace = CrmWorkspace::new(
        &config,
        Arc::new(MemoryAuthProvider::new()),
        store.clone(),
        confirm.clone(),
    );
    let identity = workspace.start().await.expect("start session");
    Fixture {
        store,
        confirm,
        workspace,
        identity,
    }
}

impl Fixture {
    fn path(&self, collection: &str) -> CollectionPath {
        self.workspace
            .synchronizer()
            .path_for(&self.identity, collection)
    }

    async fn stored_status(&self, car_id: &str) -> Option<String> {
        self.store
            .documents(&self.path("cars"))
            .await
            .into_iter()
            .find(|doc| doc.id == car_id)
            .and_then(|doc| doc.get_str("status").map(str::to_string))
    }

    async fn stats_where<F>(&self, pred: F) -> DashboardStats
    where
        F: FnMut(&DashboardStats) -> bool,
    {
        timeout(WAIT, self.workspace.dashboard().wait_for(pred))
            .await
            .expect("dashboard settles")
    }

    async fn car_status(&self, car_id: &str, status: CarStatus) {
        timeout(
            WAIT,
            self.workspace
                .cars()
                .wait_for(|snap| snap.get(car_id).is_some_and(|car| car.status == status)),
        )
        .await
        .expect("car mirror settles");
    }

    async fn subscribers(&self, path: &CollectionPath, expected: usize) {
        timeout(WAIT, async {
            while self.store.subscriber_count(path).await != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("listeners settle");
    }

    async fn sales_count(&self, count: usize) {
        timeout(WAIT, self.workspace.sales().wait_for(|snap| snap.len() == count))
            .await
            .expect("sales mirror settles");
    }
}

#[tokio::test]
async fn empty_collections_give_zeroed_dashboard() {
    let f = signed_in(AutoConfirm::accept()).await;

    let stats = f.workspace.stats();
    assert_eq!(stats, DashboardStats::default());
    assert_eq!(stats.average_sale_price, 0.0);
    assert_eq!(f.workspace.synchronizer().open_count(), 3);
    assert!(f.workspace.sale_details().is_empty());
}

#[tokio::test]
async fn recording_a_sale_marks_the_car_sold() {
    let f = signed_in(AutoConfirm::accept()).await;

    let car = f
        .workspace
        .add_car(Car::new("Honda", "Civic", 20000.0).with_year(2019))
        .await
        .expect("add car");
    let customer = f
        .workspace
        .add_customer(Customer::new("Grace Hopper").with_email("grace@example.com"))
        .await
        .expect("add customer");

    let sale = f
        .workspace
        .add_sale(Sale::new(&car, &customer, 19000.0))
        .await
        .expect("add sale");
    assert!(!sale.is_empty());
    assert_eq!(f.stored_status(&car).await.as_deref(), Some("Sold"));

    let stats = f
        .stats_where(|s| s.total_sales == 1 && s.sold_cars == 1 && s.total_customers == 1)
        .await;
    assert_eq!(stats.total_cars, 1);
    assert_eq!(stats.available_cars, 0);
    assert_eq!(stats.total_revenue, 19000.0);
    assert_eq!(stats.average_sale_price, 19000.0);

    timeout(WAIT, f.workspace.customers().wait_for(|s| s.len() == 1))
        .await
        .expect("customer mirror settles");
    let details = f.workspace.sale_details();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].car_label(), "2019 Honda Civic");
    assert_eq!(details[0].customer_label(), "Grace Hopper");
}

#[tokio::test]
async fn sale_for_pending_car_promotes_it_to_sold() {
    let f = signed_in(AutoConfirm::accept()).await;

    let car = f
        .workspace
        .add_car(Car::new("Mazda", "3", 15000.0).with_status(CarStatus::Pending))
        .await
        .expect("add car");

    f.workspace
        .add_sale(Sale::new(&car, "walk-in", 14500.0))
        .await
        .expect("add sale");
    assert_eq!(f.stored_status(&car).await.as_deref(), Some("Sold"));
}

#[tokio::test]
async fn deleting_the_only_sale_frees_the_car() {
    let f = signed_in(AutoConfirm::accept()).await;

    let car = f
        .workspace
        .add_car(Car::new("Ford", "Focus", 12000.0))
        .await
        .expect("add car");
    let sale = f
        .workspace
        .add_sale(Sale::new(&car, "c-1", 11000.0))
        .await
        .expect("add sale");

    assert!(f.workspace.delete_sale(&sale).await.expect("delete sale"));
    assert_eq!(f.stored_status(&car).await.as_deref(), Some("Available"));

    let stats = f
        .stats_where(|s| s.total_sales == 0 && s.available_cars == 1)
        .await;
    assert_eq!(stats.total_revenue, 0.0);
    assert_eq!(stats.average_sale_price, 0.0);
}

#[tokio::test]
async fn car_with_another_sale_stays_sold() {
    let f = signed_in(AutoConfirm::accept()).await;

    let car = f
        .workspace
        .add_car(Car::new("Kia", "Rio", 9000.0))
        .await
        .expect("add car");
    let first = f
        .workspace
        .add_sale(Sale::new(&car, "c-1", 8800.0))
        .await
        .expect("first sale");
    f.workspace
        .add_sale(Sale::new(&car, "c-2", 8700.0))
        .await
        .expect("second sale");

    assert!(f.workspace.delete_sale(&first).await.expect("delete sale"));
    assert_eq!(f.stored_status(&car).await.as_deref(), Some("Sold"));
}

#[tokio::test]
async fn moving_a_sale_to_another_car_swaps_statuses() {
    let f = signed_in(AutoConfirm::accept()).await;

    let old_car = f
        .workspace
        .add_car(Car::new("VW", "Golf", 14000.0))
        .await
        .expect("old car");
    let new_car = f
        .workspace
        .add_car(Car::new("VW", "Polo", 11000.0))
        .await
        .expect("new car");
    let sale = f
        .workspace
        .add_sale(Sale::new(&old_car, "c-1", 13500.0))
        .await
        .expect("add sale");

    f.workspace
        .update_sale(
            &sale,
            SalePatch {
                car_id: Some(new_car.clone()),
                ..SalePatch::default()
            },
        )
        .await
        .expect("update sale");

    assert_eq!(f.stored_status(&old_car).await.as_deref(), Some("Available"));
    assert_eq!(f.stored_status(&new_car).await.as_deref(), Some("Sold"));
}

#[tokio::test(flavor = "multi_thread")]
async fn back_to_back_add_and_delete_settle_the_stored_status() {
    let f = signed_in(AutoConfirm::accept()).await;

    let car = f
        .workspace
        .add_car(Car::new("Skoda", "Fabia", 10500.0))
        .await
        .expect("add car");
    let sale = f
        .workspace
        .add_sale(Sale::new(&car, "c-1", 10000.0))
        .await
        .expect("add sale");
    assert_eq!(f.stored_status(&car).await.as_deref(), Some("Sold"));

    assert!(f.workspace.delete_sale(&sale).await.expect("delete sale"));
    assert_eq!(f.stored_status(&car).await.as_deref(), Some("Available"));

    f.car_status(&car, CarStatus::Available).await;
    f.sales_count(0).await;
}

#[tokio::test]
async fn moving_a_sale_to_a_car_added_moments_ago() {
    let f = signed_in(AutoConfirm::accept()).await;

    let old_car = f
        .workspace
        .add_car(Car::new("Renault", "Clio", 9800.0))
        .await
        .expect("old car");
    let sale = f
        .workspace
        .add_sale(Sale::new(&old_car, "c-1", 9400.0))
        .await
        .expect("add sale");
    let new_car = f
        .workspace
        .add_car(Car::new("Renault", "Megane", 12800.0))
        .await
        .expect("new car");

    f.workspace
        .update_sale(
            &sale,
            SalePatch {
                car_id: Some(new_car.clone()),
                ..SalePatch::default()
            },
        )
        .await
        .expect("update sale");

    assert_eq!(f.stored_status(&old_car).await.as_deref(), Some("Available"));
    assert_eq!(f.stored_status(&new_car).await.as_deref(), Some("Sold"));
}

#[tokio::test]
async fn sale_for_unknown_car_writes_no_status() {
    let f = signed_in(AutoConfirm::accept()).await;

    f.workspace
        .add_sale(Sale::new("no-such-car", "c-1", 5000.0))
        .await
        .expect("add sale");
    assert_eq!(f.store.write_count(), 1);
    assert!(f.store.documents(&f.path("cars")).await.is_empty());
}

#[tokio::test]
async fn declined_delete_keeps_the_record() {
    let f = signed_in(AutoConfirm::decline()).await;

    let car = f
        .workspace
        .add_car(Car::new("Audi", "A4", 30000.0))
        .await
        .expect("add car");
    let writes = f.store.write_count();

    assert!(!f.workspace.delete_car(&car).await.expect("delete car"));
    assert_eq!(f.store.write_count(), writes);
    assert_eq!(f.store.documents(&f.path("cars")).await.len(), 1);
    assert_eq!(f.confirm.prompts().len(), 1);
}

#[tokio::test]
async fn invalid_car_never_reaches_the_store() {
    let f = signed_in(AutoConfirm::accept()).await;

    let err = f
        .workspace
        .add_car(Car::new("", "Civic", 20000.0))
        .await
        .expect_err("make is required");
    assert!(err.is_validation());

    let err = f
        .workspace
        .update_car(
            "any",
            CarPatch {
                price: Some(-1.0),
                ..CarPatch::default()
            },
        )
        .await
        .expect_err("negative price");
    assert!(err.is_validation());
    assert_eq!(f.store.write_count(), 0);
}

#[tokio::test]
async fn listener_error_keeps_last_snapshot() {
    let f = signed_in(AutoConfirm::accept()).await;
    let mut notices = f.workspace.notices();

    let car = f
        .workspace
        .add_car(Car::new("Seat", "Ibiza", 10000.0))
        .await
        .expect("add car");
    f.car_status(&car, CarStatus::Available).await;

    f.store
        .fail_subscription(&f.path("cars"), "permission denied")
        .await;

    let banner = timeout(WAIT, async {
        loop {
            match notices.recv().await {
                Ok(notice) if notice.kind == NoticeKind::Banner => return notice,
                Ok(_) => continue,
                Err(err) => panic!("notice channel failed: {err}"),
            }
        }
    })
    .await
    .expect("banner notice");
    assert!(banner.message.contains("permission denied"));
    assert!(f.workspace.cars().current().contains(&car));
}

#[tokio::test]
async fn logout_clears_every_mirror() {
    let f = signed_in(AutoConfirm::accept()).await;

    let car = f
        .workspace
        .add_car(Car::new("Fiat", "500", 8000.0))
        .await
        .expect("add car");
    f.car_status(&car, CarStatus::Available).await;

    f.workspace.logout().await.expect("logout");
    assert!(f.workspace.identity().is_none());
    assert!(f.workspace.cars().is_empty());
    assert!(f.workspace.sales().is_empty());
    assert_eq!(f.workspace.synchronizer().open_count(), 0);
    f.subscribers(&f.path("cars"), 0).await;

    let stats = f.stats_where(|s| s.total_cars == 0).await;
    assert_eq!(stats, DashboardStats::default());
}
