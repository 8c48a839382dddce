use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        bookings::{BookingList, CreateBookingRequest},
        payments::{PaymentUrl, VnpayPaymentRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::BookingWithPayment,
    response::ApiResponse,
    routes::params::BookingListQuery,
    services::{booking_service, payment_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bookings).post(create_booking))
        .route("/{id}", get(get_booking))
        .route("/{id}/payment/vnpay", post(create_vnpay_payment))
        .route("/{id}/payment/cash", post(choose_cash_payment))
}

#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking and pending payment created", body = ApiResponse<BookingWithPayment>),
        (status = 400, description = "Missing or malformed fields"),
        (status = 401, description = "No authenticated caller"),
        (status = 404, description = "Unknown or inactive combo/location"),
        (status = 409, description = "Booking code could not be allocated"),
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<BookingWithPayment>>)> {
    let resp = booking_service::create_booking(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/bookings",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by booking status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Bookings of the current customer", body = ApiResponse<BookingList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<ApiResponse<BookingList>>> {
    let resp = booking_service::list_my_bookings(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking with payment", body = ApiResponse<BookingWithPayment>),
        (status = 404, description = "Booking not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookingWithPayment>>> {
    let resp = booking_service::get_my_booking(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{id}/payment/vnpay",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = VnpayPaymentRequest,
    responses(
        (status = 200, description = "Signed VNPay redirect URL", body = ApiResponse<PaymentUrl>),
        (status = 400, description = "Payment already settled"),
        (status = 404, description = "Booking not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_vnpay_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<VnpayPaymentRequest>>,
) -> AppResult<Json<ApiResponse<PaymentUrl>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let client_ip = client_ip(&headers);
    let resp =
        payment_service::create_vnpay_payment(&state, &user, id, payload, &client_ip).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{id}/payment/cash",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking confirmed, pay at the counter", body = ApiResponse<BookingWithPayment>),
        (status = 400, description = "Payment or booking already settled"),
        (status = 404, description = "Booking not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn choose_cash_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookingWithPayment>>> {
    let resp = payment_service::choose_cash_payment(&state, &user, id).await?;
    Ok(Json(resp))
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("127.0.0.1")
        .to_string()
}
