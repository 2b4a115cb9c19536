use super::FormSlot;
use crate::auth::AuthProvider;
use crate::config::SyncConfig;
use crate::confirm::Confirm;
use crate::core::{Identity, Result};
use crate::dashboard::{DashboardStats, DashboardWatcher, SaleDetail, sale_details};
use crate::domain::{Car, CarPatch, Customer, CustomerPatch, Sale, SalePatch};
use crate::gateway::CrmGateway;
use crate::notice::{Notice, Notifier};
use crate::session::{SessionEvent, SessionResolver};
use crate::store::DocumentStore;
use crate::sync::{CollectionSynchronizer, Mirror};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Car-sales CRM state: cars, customers and sales mirrors plus the
/// dashboard derived from them.
///
/// Must be created inside a tokio runtime; the dashboard watcher is a
/// spawned task.
pub struct CrmWorkspace {
    notifier: Notifier,
    session: SessionResolver,
    cars: Mirror<Car>,
    customers: Mirror<Customer>,
    sales: Mirror<Sale>,
    sync: CollectionSynchronizer,
    gateway: CrmGateway,
    dashboard: DashboardWatcher,
    form: FormSlot,
}

impl CrmWorkspace {
    pub fn new(
        config: &SyncConfig,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        let notifier = Notifier::new(config.notice_capacity);
        let root = config.path_root();
        let session = SessionResolver::new(auth, config.auth_token.clone(), notifier.clone());

        let cars = Mirror::new();
        let customers = Mirror::new();
        let sales = Mirror::new();
        let sync = CollectionSynchronizer::new(store.clone(), root.clone(), notifier.clone())
            .register(&cars)
            .register(&customers)
            .register(&sales);
        let gateway = CrmGateway::new(
            store,
            root,
            session.watch_identity(),
            confirm,
            notifier.clone(),
        );
        let dashboard = DashboardWatcher::spawn(&cars, &customers, &sales);

        Self {
            notifier,
            session,
            cars,
            customers,
            sales,
            sync,
            gateway,
            dashboard,
            form: FormSlot::default(),
        }
    }

    // ----- session -----

    pub async fn start(&self) -> Result<Identity> {
        let identity = self.session.resolve().await?;
        self.sync.open(&identity).await?;
        Ok(identity)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = self.session.login(email, password).await?;
        self.sync.open(&identity).await?;
        Ok(identity)
    }

    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await?;
        self.sync.close()?;
        info!("signed out, CRM mirrors cleared");
        Ok(())
    }

    pub async fn run(&self) -> Result<()> {
        while let Some(event) = self.session.next_auth_change().await {
            self.handle(event).await?;
        }
        debug!("auth listener closed");
        Ok(())
    }

    pub async fn handle(&self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::SignedIn(identity) => self.sync.open(&identity).await.map(|_| ()),
            SessionEvent::SignedOut => self.sync.close(),
        }
    }

    // ----- reads -----

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub fn session(&self) -> &SessionResolver {
        &self.session
    }

    pub fn cars(&self) -> &Mirror<Car> {
        &self.cars
    }

    pub fn customers(&self) -> &Mirror<Customer> {
        &self.customers
    }

    pub fn sales(&self) -> &Mirror<Sale> {
        &self.sales
    }

    pub fn synchronizer(&self) -> &CollectionSynchronizer {
        &self.sync
    }

    pub fn gateway(&self) -> &CrmGateway {
        &self.gateway
    }

    pub fn stats(&self) -> DashboardStats {
        self.dashboard.current()
    }

    pub fn dashboard(&self) -> &DashboardWatcher {
        &self.dashboard
    }

    pub fn sale_details(&self) -> Vec<SaleDetail> {
        sale_details(
            &self.cars.current(),
            &self.customers.current(),
            &self.sales.current(),
        )
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    pub fn form(&self) -> &FormSlot {
        &self.form
    }

    // ----- writes -----

    pub async fn add_car(&self, car: Car) -> Result<String> {
        self.form.submit(self.gateway.add_car(car)).await
    }

    pub async fn update_car(&self, id: &str, patch: CarPatch) -> Result<()> {
        self.form.submit(self.gateway.update_car(id, patch)).await
    }

    pub async fn delete_car(&self, id: &str) -> Result<bool> {
        self.form.submit_delete(id, self.gateway.delete_car(id)).await
    }

    pub async fn add_customer(&self, customer: Customer) -> Result<String> {
        self.form.submit(self.gateway.add_customer(customer)).await
    }

    pub async fn update_customer(&self, id: &str, patch: CustomerPatch) -> Result<()> {
        self.form.submit(self.gateway.update_customer(id, patch)).await
    }

    pub async fn delete_customer(&self, id: &str) -> Result<bool> {
        self.form
            .submit_delete(id, self.gateway.delete_customer(id))
            .await
    }

    pub async fn add_sale(&self, sale: Sale) -> Result<String> {
        self.form.submit(self.gateway.add_sale(sale)).await
    }

    pub async fn update_sale(&self, id: &str, patch: SalePatch) -> Result<()> {
        self.form.submit(self.gateway.update_sale(id, patch)).await
    }

    pub async fn delete_sale(&self, id: &str) -> Result<bool> {
        self.form.submit_delete(id, self.gateway.delete_sale(id)).await
    }
}
