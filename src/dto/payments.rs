use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VnpayPaymentRequest {
    pub bank_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentUrl {
    pub payment_url: String,
    pub transaction_id: String,
}
