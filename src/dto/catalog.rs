use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Combo, Location};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLocationRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub map_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateComboRequest {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub price: Option<i64>,
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    pub is_popular: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationList {
    pub items: Vec<Location>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComboList {
    pub items: Vec<Combo>,
}
