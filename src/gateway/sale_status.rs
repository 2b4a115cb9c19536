//! How sale lifecycle events drive car availability.
//!
//! A car with at least one sale referencing it is `Sold`; removing the last
//! such sale makes it `Available` again. Callers pass the car and sales as
//! read from the store at write time.

use crate::domain::{Car, CarStatus, Persisted, Sale};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleEvent {
    Added { car_id: String },
    /// `sale_id` is ignored during the rescan even if the caller's view of
    /// the sales still contains it.
    Removed { sale_id: String, car_id: String },
}

impl SaleEvent {
    pub fn car_id(&self) -> &str {
        match self {
            SaleEvent::Added { car_id } | SaleEvent::Removed { car_id, .. } => car_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarStatusChange {
    pub car_id: String,
    pub from: CarStatus,
    pub to: CarStatus,
}

/// Status writes implied by `event`. A car absent from `cars` does not
/// exist, and a car already in the target state needs no write.
pub fn apply_sale_event(
    cars: &[Persisted<Car>],
    sales: &[Persisted<Sale>],
    event: &SaleEvent,
) -> Vec<CarStatusChange> {
    let (car_id, target) = match event {
        SaleEvent::Added { car_id } => (car_id, CarStatus::Sold),
        SaleEvent::Removed { sale_id, car_id } => {
            let still_sold = sales
                .iter()
                .any(|sale| sale.id != *sale_id && sale.value.car_id == *car_id);
            if still_sold {
                return Vec::new();
            }
            (car_id, CarStatus::Available)
        }
    };

    cars.iter()
        .filter(|car| car.id == *car_id && car.value.status != target)
        .map(|car| CarStatusChange {
            car_id: car.id.clone(),
            from: car.value.status,
            to: target,
        })
        .collect()
}

/// Applies `changes` to a copy of `cars`.
pub fn with_changes(cars: &[Persisted<Car>], changes: &[CarStatusChange]) -> Vec<Persisted<Car>> {
    cars.iter()
        .cloned()
        .map(|mut car| {
            if let Some(change) = changes.iter().find(|c| c.car_id == car.id) {
                car.value.status = change.to;
            }
            car
        })
        .collect()
}
