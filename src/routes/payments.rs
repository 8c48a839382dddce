use std::collections::BTreeMap;

use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};

use crate::{services::payment_service, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/vnpay/return", get(vnpay_return))
}

/// Browser return trip from VNPay. Always answers with a redirect.
#[utoipa::path(
    get,
    path = "/api/payment/vnpay/return",
    params(
        ("vnp_TxnRef" = String, Query, description = "Transaction reference"),
        ("vnp_ResponseCode" = String, Query, description = "Gateway response code, 00 on success"),
        ("vnp_SecureHash" = String, Query, description = "HMAC-SHA512 signature")
    ),
    responses(
        (status = 303, description = "Redirect to the booking success or failure page")
    ),
    tag = "Payments"
)]
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Redirect {
    let outcome = payment_service::settle_vnpay_return(&state, params).await;
    Redirect::to(&outcome.redirect_url(&state.config.public_base_url))
}
