use super::sale_status::{SaleEvent, apply_sale_event};
use super::Writer;
use crate::confirm::Confirm;
use crate::core::{Identity, Result, SyncError};
use crate::domain::{Car, CarPatch, Customer, CustomerPatch, Entity, Persisted, Sale, SalePatch};
use crate::notice::Notifier;
use crate::store::DocumentStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Writes for the car-sales CRM.
///
/// Sales drive car availability: a new sale marks its car `Sold`, and
/// removing the last sale of a car makes it `Available` again. The status
/// decision reads the car and the remaining sales from the store at write
/// time; the mirrors can lag behind this gateway's own writes.
pub struct CrmGateway {
    writer: Writer,
    confirm: Arc<dyn Confirm>,
}

impl CrmGateway {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        root: Option<String>,
        identity: watch::Receiver<Option<Identity>>,
        confirm: Arc<dyn Confirm>,
        notifier: Notifier,
    ) -> Self {
        Self {
            writer: Writer::new(store, root, identity, notifier),
            confirm,
        }
    }

    // ----- cars -----

    pub async fn add_car(&self, car: Car) -> Result<String> {
        let result = self.create(&car).await;
        self.writer.surface("add car", result)
    }

    pub async fn update_car(&self, id: &str, patch: CarPatch) -> Result<()> {
        let result = match patch.validate() {
            Ok(()) => self.writer.merge(Car::COLLECTION, id, patch.into_fields()).await,
            Err(err) => Err(err),
        };
        self.writer.surface("update car", result)
    }

    /// Sales referencing the car are left in place and show it as missing.
    pub async fn delete_car(&self, id: &str) -> Result<bool> {
        let result = self.remove(Car::COLLECTION, id).await;
        self.writer.surface("delete car", result)
    }

    // ----- customers -----

    pub async fn add_customer(&self, customer: Customer) -> Result<String> {
        let result = self.create(&customer).await;
        self.writer.surface("add customer", result)
    }

    pub async fn update_customer(&self, id: &str, patch: CustomerPatch) -> Result<()> {
        let result = match patch.validate() {
            Ok(()) => {
                self.writer
                    .merge(Customer::COLLECTION, id, patch.into_fields())
                    .await
            }
            Err(err) => Err(err),
        };
        self.writer.surface("update customer", result)
    }

    pub async fn delete_customer(&self, id: &str) -> Result<bool> {
        let result = self.remove(Customer::COLLECTION, id).await;
        self.writer.surface("delete customer", result)
    }

    // ----- sales -----

    /// Records a sale and marks its car sold.
    ///
    /// The returned id is for the sale. A failed status write is reported
    /// but does not undo the sale.
    pub async fn add_sale(&self, sale: Sale) -> Result<String> {
        let car_id = sale.car_id.trim().to_string();
        let result = self.create(&sale).await;
        let id = self.writer.surface("add sale", result)?;

        self.couple(SaleEvent::Added { car_id }).await;
        Ok(id)
    }

    /// Merges `patch` into sale `id`. Moving a sale to another car frees the
    /// old car when nothing else references it and marks the new one sold.
    pub async fn update_sale(&self, id: &str, patch: SalePatch) -> Result<()> {
        let previous_car = self.sale_car(id).await;
        let moved_to = patch.car_id.as_ref().map(|c| c.trim().to_string());

        let result = match patch.validate() {
            Ok(()) => self.writer.merge(Sale::COLLECTION, id, patch.into_fields()).await,
            Err(err) => Err(err),
        };
        self.writer.surface("update sale", result)?;

        if let (Some(old), Some(new)) = (previous_car, moved_to) {
            if old != new {
                self.couple(SaleEvent::Removed {
                    sale_id: id.to_string(),
                    car_id: old,
                })
                .await;
                self.couple(SaleEvent::Added { car_id: new }).await;
            }
        }
        Ok(())
    }

    /// Deletes sale `id` after confirmation, then rescans the remaining
    /// sales to decide whether its car is available again.
    pub async fn delete_sale(&self, id: &str) -> Result<bool> {
        let car_id = self.sale_car(id).await;
        let result = self.remove(Sale::COLLECTION, id).await;
        let deleted = self.writer.surface("delete sale", result)?;

        if deleted {
            match car_id {
                Some(car_id) => {
                    self.couple(SaleEvent::Removed {
                        sale_id: id.to_string(),
                        car_id,
                    })
                    .await
                }
                None => debug!(sale = id, "deleted sale had no known car"),
            }
        }
        Ok(deleted)
    }

    // ----- internals -----

    async fn create<T: Entity>(&self, value: &T) -> Result<String> {
        value.validate()?;
        let id = self.writer.create(T::COLLECTION, value.to_fields()?).await?;
        info!(collection = T::COLLECTION, id = %id, "record added");
        Ok(id)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool> {
        if self.writer.identity().is_none() {
            return Err(SyncError::Unauthenticated(format!(
                "sign in to delete {}",
                collection
            )));
        }
        if !self
            .writer
            .confirm_delete(self.confirm.as_ref(), collection, id)
            .await?
        {
            return Ok(false);
        }
        self.writer.delete(collection, id).await?;
        info!(collection, id, "record deleted");
        Ok(true)
    }

    /// Car referenced by sale `id`, as stored before the write.
    async fn sale_car(&self, id: &str) -> Option<String> {
        match self.writer.fetch(Sale::COLLECTION, id).await {
            Ok(Some(doc)) => doc.get_str("carId").map(str::to_string),
            Ok(None) => None,
            Err(err) => {
                debug!(sale = id, error = %err, "could not look up sale");
                None
            }
        }
    }

    /// The event's car and, for removals, every stored sale.
    async fn coupling_inputs(&self, event: &SaleEvent) -> Result<(Vec<Persisted<Car>>, Vec<Persisted<Sale>>)> {
        let cars = match self.writer.fetch(Car::COLLECTION, event.car_id()).await? {
            Some(doc) => vec![Car::from_document(&doc)?],
            None => Vec::new(),
        };
        let sales = match event {
            SaleEvent::Added { .. } => Vec::new(),
            SaleEvent::Removed { .. } => self
                .writer
                .list(Sale::COLLECTION)
                .await?
                .iter()
                .filter_map(|doc| match Sale::from_document(doc) {
                    Ok(sale) => Some(sale),
                    Err(err) => {
                        warn!(sale = %doc.id, error = %err, "skipping undecodable sale in rescan");
                        None
                    }
                })
                .collect(),
        };
        Ok((cars, sales))
    }

    /// Writes the car status change implied by `event`.
    async fn couple(&self, event: SaleEvent) {
        let inputs = self.coupling_inputs(&event).await;
        let (cars, sales) = match self.writer.surface("read car status", inputs) {
            Ok(inputs) => inputs,
            Err(err) => {
                warn!(car = %event.car_id(), error = %err, "car status left unchanged");
                return;
            }
        };
        if cars.is_empty() {
            debug!(car = %event.car_id(), "sale references an unknown car");
        }

        for change in apply_sale_event(&cars, &sales, &event) {
            let result = self
                .writer
                .merge(Car::COLLECTION, &change.car_id, CarPatch::status(change.to).into_fields())
                .await;
            match self.writer.surface("update car status", result) {
                Ok(()) => info!(car = %change.car_id, from = %change.from, to = %change.to, "car status changed"),
                Err(err) => warn!(car = %change.car_id, error = %err, "car status left unchanged"),
            }
        }
    }
}
