use super::{Entity, non_negative, required};
use crate::core::{Fields, Result, server_timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Car availability. Driven by sale events whenever sales reference the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CarStatus {
    #[default]
    Available,
    Sold,
    Pending,
}

impl fmt::Display for CarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Available => "Available",
            Self::Sold => "Sold",
            Self::Pending => "Pending",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub make: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub status: CarStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Car {
    pub fn new(make: impl Into<String>, model: impl Into<String>, price: f64) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
            year: None,
            price,
            status: CarStatus::Available,
            created_at: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_status(mut self, status: CarStatus) -> Self {
        self.status = status;
        self
    }

    /// "2019 Honda Civic"
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{} {} {}", year, self.make, self.model),
            None => format!("{} {}", self.make, self.model),
        }
    }
}

impl Entity for Car {
    const COLLECTION: &'static str = "cars";

    fn validate(&self) -> Result<()> {
        required("Make", &self.make)?;
        required("Model", &self.model)?;
        non_negative("Price", self.price)
    }

    fn to_fields(&self) -> Result<Fields> {
        let mut fields = Fields::new();
        fields.insert("make".into(), json!(self.make.trim()));
        fields.insert("model".into(), json!(self.model.trim()));
        if let Some(year) = self.year {
            fields.insert("year".into(), json!(year));
        }
        fields.insert("price".into(), json!(self.price));
        fields.insert("status".into(), json!(self.status));
        fields.insert("createdAt".into(), server_timestamp());
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CarPatch {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price: Option<f64>,
    pub status: Option<CarStatus>,
}

impl CarPatch {
    pub fn status(status: CarStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(make) = &self.make {
            required("Make", make)?;
        }
        if let Some(model) = &self.model {
            required("Model", model)?;
        }
        if let Some(price) = self.price {
            non_negative("Price", price)?;
        }
        Ok(())
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if let Some(make) = self.make {
            fields.insert("make".into(), json!(make.trim()));
        }
        if let Some(model) = self.model {
            fields.insert("model".into(), json!(model.trim()));
        }
        if let Some(year) = self.year {
            fields.insert("year".into(), json!(year));
        }
        if let Some(price) = self.price {
            fields.insert("price".into(), json!(price));
        }
        if let Some(status) = self.status {
            fields.insert("status".into(), json!(status));
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            created_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

impl Entity for Customer {
    const COLLECTION: &'static str = "customers";

    fn validate(&self) -> Result<()> {
        required("Customer name", &self.name)
    }

    fn to_fields(&self) -> Result<Fields> {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(self.name.trim()));
        if let Some(email) = &self.email {
            fields.insert("email".into(), json!(email.trim()));
        }
        if let Some(phone) = &self.phone {
            fields.insert("phone".into(), json!(phone.trim()));
        }
        fields.insert("createdAt".into(), server_timestamp());
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CustomerPatch {
    pub fn validate(&self) -> Result<()> {
        match &self.name {
            Some(name) => required("Customer name", name),
            None => Ok(()),
        }
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = self.name {
            fields.insert("name".into(), json!(name.trim()));
        }
        if let Some(email) = self.email {
            fields.insert("email".into(), json!(email.trim()));
        }
        if let Some(phone) = self.phone {
            fields.insert("phone".into(), json!(phone.trim()));
        }
        fields
    }
}

/// A sale references its car and customer by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub car_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub sale_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Sale {
    pub fn new(car_id: impl Into<String>, customer_id: impl Into<String>, sale_price: f64) -> Self {
        Self {
            car_id: car_id.into(),
            customer_id: customer_id.into(),
            sale_price,
            sale_date: None,
            created_at: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.sale_date = Some(date);
        self
    }
}

impl Entity for Sale {
    const COLLECTION: &'static str = "sales";

    fn validate(&self) -> Result<()> {
        required("Car", &self.car_id)?;
        required("Customer", &self.customer_id)?;
        non_negative("Sale price", self.sale_price)
    }

    fn to_fields(&self) -> Result<Fields> {
        let mut fields = Fields::new();
        fields.insert("carId".into(), json!(self.car_id.trim()));
        fields.insert("customerId".into(), json!(self.customer_id.trim()));
        fields.insert("salePrice".into(), json!(self.sale_price));
        if let Some(date) = self.sale_date {
            fields.insert("saleDate".into(), json!(date));
        }
        fields.insert("createdAt".into(), server_timestamp());
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SalePatch {
    pub car_id: Option<String>,
    pub customer_id: Option<String>,
    pub sale_price: Option<f64>,
    pub sale_date: Option<NaiveDate>,
}

impl SalePatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(car_id) = &self.car_id {
            required("Car", car_id)?;
        }
        if let Some(customer_id) = &self.customer_id {
            required("Customer", customer_id)?;
        }
        if let Some(price) = self.sale_price {
            non_negative("Sale price", price)?;
        }
        Ok(())
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if let Some(car_id) = self.car_id {
            fields.insert("carId".into(), json!(car_id.trim()));
        }
        if let Some(customer_id) = self.customer_id {
            fields.insert("customerId".into(), json!(customer_id.trim()));
        }
        if let Some(price) = self.sale_price {
            fields.insert("salePrice".into(), json!(price));
        }
        if let Some(date) = self.sale_date {
            fields.insert("saleDate".into(), json!(date));
        }
        fields
    }
}
