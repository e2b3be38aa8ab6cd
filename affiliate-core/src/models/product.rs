use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    /// Percent. Overrides the company commission rate for deals on this product.
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub company_id: i64,
    pub name: String,
    pub commission_rate: Option<Decimal>,
}
