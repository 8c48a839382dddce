use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{CalendarQuery, DayCalendar, UpdateBookingStatusRequest},
        bookings::BookingDetailList,
        catalog::{CreateComboRequest, CreateLocationRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Booking, BookingWithPayment, Combo, Location, Payment},
    response::ApiResponse,
    routes::params::BookingListQuery,
    services::{admin_service, catalog_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_all_bookings))
        .route("/bookings/{id}", get(get_booking_admin))
        .route("/bookings/{id}/status", patch(update_booking_status))
        .route("/bookings/{id}/payment/collect", post(collect_cash_payment))
        .route("/calendar", get(day_calendar))
        .route("/locations", post(create_location))
        .route("/combos", post(create_combo))
}

#[utoipa::path(
    get,
    path = "/api/admin/bookings",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "All bookings with payments (admin only)", body = ApiResponse<BookingDetailList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<ApiResponse<BookingDetailList>>> {
    let resp = admin_service::list_all_bookings(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking detail (admin only)", body = ApiResponse<BookingWithPayment>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Booking not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_booking_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookingWithPayment>>> {
    let resp = admin_service::get_booking_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/bookings/{id}/status",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = UpdateBookingStatusRequest,
    responses(
        (status = 200, description = "Booking status updated", body = ApiResponse<Booking>),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Booking not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_booking_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBookingStatusRequest>,
) -> AppResult<Json<ApiResponse<Booking>>> {
    let resp = admin_service::update_booking_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/bookings/{id}/payment/collect",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Cash payment marked as collected", body = ApiResponse<Payment>),
        (status = 400, description = "Not a pending cash payment"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Payment not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn collect_cash_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = admin_service::collect_cash_payment(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/calendar",
    params(
        ("date" = String, Query, description = "Day to show, YYYY-MM-DD"),
        ("location_id" = Option<Uuid>, Query, description = "Restrict to one location")
    ),
    responses(
        (status = 200, description = "Hourly day view", body = ApiResponse<DayCalendar>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn day_calendar(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CalendarQuery>,
) -> AppResult<Json<ApiResponse<DayCalendar>>> {
    let resp = admin_service::day_calendar(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location created", body = ApiResponse<Location>),
        (status = 400, description = "Missing required fields"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_location(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateLocationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Location>>)> {
    let resp = catalog_service::create_location(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/admin/combos",
    request_body = CreateComboRequest,
    responses(
        (status = 201, description = "Combo created", body = ApiResponse<Combo>),
        (status = 400, description = "Missing or invalid fields"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_combo(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateComboRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Combo>>)> {
    let resp = catalog_service::create_combo(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
