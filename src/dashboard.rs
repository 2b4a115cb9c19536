// ============================================================================
// Derived Aggregator
// ============================================================================
//
// Dashboard statistics are a pure function of the car, customer and sale
// mirrors. The watcher recomputes them whenever any input mirror publishes
// a new snapshot; nothing is cached across mirror changes.
//
// ============================================================================

use crate::domain::{Car, CarStatus, Customer, Persisted, Sale};
use crate::sync::{Mirror, MirrorSnapshot};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_cars: usize,
    pub available_cars: usize,
    pub sold_cars: usize,
    pub pending_cars: usize,
    pub total_customers: usize,
    pub total_sales: usize,
    pub total_revenue: f64,
    /// 0 when there are no sales
    pub average_sale_price: f64,
}

impl DashboardStats {
    pub fn compute(
        cars: &[Persisted<Car>],
        customers: &[Persisted<Customer>],
        sales: &[Persisted<Sale>],
    ) -> Self {
        let count = |status: CarStatus| cars.iter().filter(|c| c.value.status == status).count();
        let total_revenue: f64 = sales.iter().map(|s| s.value.sale_price).sum();
        let average_sale_price = if sales.is_empty() {
            0.0
        } else {
            total_revenue / sales.len() as f64
        };

        Self {
            total_cars: cars.len(),
            available_cars: count(CarStatus::Available),
            sold_cars: count(CarStatus::Sold),
            pending_cars: count(CarStatus::Pending),
            total_customers: customers.len(),
            total_sales: sales.len(),
            total_revenue,
            average_sale_price,
        }
    }

    fn from_snapshots(
        cars: &MirrorSnapshot<Car>,
        customers: &MirrorSnapshot<Customer>,
        sales: &MirrorSnapshot<Sale>,
    ) -> Self {
        Self::compute(cars.items(), customers.items(), sales.items())
    }
}

/// A sale joined with the display names of what it references.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    pub sale_id: String,
    /// `None` when the referenced car no longer exists
    pub car: Option<String>,
    pub customer: Option<String>,
    pub sale_price: f64,
    pub sale_date: Option<NaiveDate>,
}

impl SaleDetail {
    pub fn car_label(&self) -> &str {
        self.car.as_deref().unwrap_or("Car not found")
    }

    pub fn customer_label(&self) -> &str {
        self.customer.as_deref().unwrap_or("Customer not found")
    }
}

pub fn sale_details(
    cars: &MirrorSnapshot<Car>,
    customers: &MirrorSnapshot<Customer>,
    sales: &MirrorSnapshot<Sale>,
) -> Vec<SaleDetail> {
    sales
        .iter()
        .map(|sale| SaleDetail {
            sale_id: sale.id.clone(),
            car: cars.get(&sale.value.car_id).map(Car::label),
            customer: customers.get(&sale.value.customer_id).map(|c| c.name.clone()),
            sale_price: sale.value.sale_price,
            sale_date: sale.value.sale_date,
        })
        .collect()
}

/// Keeps [`DashboardStats`] current for a set of mirrors.
pub struct DashboardWatcher {
    stats: watch::Receiver<DashboardStats>,
    join_handle: Option<JoinHandle<()>>,
}

impl DashboardWatcher {
    /// Computes the initial statistics and starts following the mirrors.
    pub fn spawn(cars: &Mirror<Car>, customers: &Mirror<Customer>, sales: &Mirror<Sale>) -> Self {
        let mut cars_rx = cars.subscribe();
        let mut customers_rx = customers.subscribe();
        let mut sales_rx = sales.subscribe();

        let mut seen = (
            cars_rx.borrow_and_update().clone(),
            customers_rx.borrow_and_update().clone(),
            sales_rx.borrow_and_update().clone(),
        );
        let (tx, stats) = watch::channel(DashboardStats::from_snapshots(&seen.0, &seen.1, &seen.2));

        let join_handle = tokio::spawn(async move {
            loop {
                let changed = tokio::select! {
                    r = cars_rx.changed() => r,
                    r = customers_rx.changed() => r,
                    r = sales_rx.changed() => r,
                };
                if changed.is_err() {
                    break;
                }

                let latest = (
                    cars_rx.borrow_and_update().clone(),
                    customers_rx.borrow_and_update().clone(),
                    sales_rx.borrow_and_update().clone(),
                );
                let same = Arc::ptr_eq(&latest.0, &seen.0)
                    && Arc::ptr_eq(&latest.1, &seen.1)
                    && Arc::ptr_eq(&latest.2, &seen.2);
                if same {
                    continue;
                }

                let next = DashboardStats::from_snapshots(&latest.0, &latest.1, &latest.2);
                trace!(?next, "dashboard recomputed");
                seen = latest;
                if tx.send(next).is_err() {
                    break;
                }
            }
        });

        Self {
            stats,
            join_handle: Some(join_handle),
        }
    }

    pub fn current(&self) -> DashboardStats {
        self.stats.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardStats> {
        self.stats.clone()
    }

    /// Resolves once statistics satisfying `pred` are published.
    pub async fn wait_for<F>(&self, pred: F) -> DashboardStats
    where
        F: FnMut(&DashboardStats) -> bool,
    {
        let mut rx = self.stats.clone();
        match rx.wait_for(pred).await {
            Ok(stats) => stats.clone(),
            Err(_) => self.current(),
        }
    }
}

impl Drop for DashboardWatcher {
    fn drop(&mut self) {
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}
