use std::fmt::Display;

use marketplace_engine::db_types::{Money, NewCustomer, NewSeller, ProductId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToCartParams {
    #[serde(alias = "productId")]
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Changes to a listing. Fields that are absent are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProductParams {
    pub price: Option<Money>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemPointsParams {
    pub points: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerParams {
    pub name: String,
    pub email: Option<String>,
}

impl CustomerParams {
    pub fn into_new_customer(self, id: String) -> NewCustomer {
        NewCustomer { id, name: self.name, email: self.email }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerParams {
    pub name: String,
    #[serde(alias = "storeName")]
    pub store_name: String,
    pub email: Option<String>,
}

impl SellerParams {
    pub fn into_new_seller(self, id: String) -> NewSeller {
        NewSeller { id, name: self.name, store_name: self.store_name, email: self.email }
    }
}
