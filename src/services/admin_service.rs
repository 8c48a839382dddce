use chrono::Utc;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        admin::{CalendarQuery, DayCalendar, UpdateBookingStatusRequest},
        bookings::BookingDetailList,
    },
    entity::{
        bookings::{ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings},
        combos::{Column as ComboCol, Entity as Combos},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
        status::{BookingStatus, PaymentMethod, PaymentStatus},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Booking, BookingWithPayment, Payment},
    response::{ApiResponse, Meta},
    routes::params::{BookingListQuery, SortOrder},
    services::booking_service::find_with_payment,
    slots::{CalendarEntry, day_grid},
    state::AppState,
};

pub async fn list_all_bookings(
    state: &AppState,
    user: &AuthUser,
    query: BookingListQuery,
) -> AppResult<ApiResponse<BookingDetailList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(BookingCol::Status.eq(status));
    }

    let mut finder = Bookings::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(BookingCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(BookingCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let bookings = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = bookings.iter().map(|b| b.id).collect();
    let mut payments: HashMap<Uuid, Payment> = Payments::find()
        .filter(PaymentCol::BookingId.is_in(ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| (p.booking_id, Payment::from(p)))
        .collect();

    let items = bookings
        .into_iter()
        .map(|booking| BookingWithPayment {
            payment: payments.remove(&booking.id),
            booking: booking.into(),
        })
        .collect();

    Ok(ApiResponse::success(
        "Bookings",
        BookingDetailList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_booking_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<BookingWithPayment>> {
    ensure_admin(user)?;
    let data = find_with_payment(&state.orm, id, None).await?;
    Ok(ApiResponse::item("Booking found", data))
}

pub async fn update_booking_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateBookingStatusRequest,
) -> AppResult<ApiResponse<Booking>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let existing = Bookings::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let from = existing.status;
    if !from.can_transition_to(payload.status) {
        return Err(AppError::BadRequest(format!(
            "Cannot move booking from {from:?} to {:?}",
            payload.status
        )));
    }

    let mut active: BookingActive = existing.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        state,
        Some(user.user_id),
        "booking_status_update",
        Some("bookings"),
        Some(serde_json::json!({
            "booking_id": booking.id,
            "from": from,
            "to": booking.status,
        })),
    )
    .await;

    Ok(ApiResponse::item("Booking updated", booking.into()))
}

/// Staff received the money for a pay-at-counter booking.
pub async fn collect_cash_payment(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let payment = Payments::find()
        .filter(PaymentCol::BookingId.eq(booking_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if payment.method != PaymentMethod::Cash {
        return Err(AppError::BadRequest("Payment is not a cash payment".into()));
    }
    if payment.status != PaymentStatus::Pending {
        return Err(AppError::BadRequest("Payment already settled".into()));
    }

    let now = Utc::now();
    let mut active: PaymentActive = payment.into();
    active.status = Set(PaymentStatus::Completed);
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let payment = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        state,
        Some(user.user_id),
        "payment_cash_collected",
        Some("payments"),
        Some(serde_json::json!({ "booking_id": booking_id, "amount": payment.amount })),
    )
    .await;

    Ok(ApiResponse::item("Payment collected", payment.into()))
}

pub async fn day_calendar(
    state: &AppState,
    user: &AuthUser,
    query: CalendarQuery,
) -> AppResult<ApiResponse<DayCalendar>> {
    ensure_admin(user)?;

    let mut condition = Condition::all()
        .add(BookingCol::Date.eq(query.date))
        .add(BookingCol::Status.ne(BookingStatus::Cancelled));
    if let Some(location_id) = query.location_id {
        condition = condition.add(BookingCol::LocationId.eq(location_id));
    }

    let bookings = Bookings::find()
        .filter(condition)
        .order_by_asc(BookingCol::StartTime)
        .all(&state.orm)
        .await?;

    let user_ids: Vec<Uuid> = bookings.iter().map(|b| b.user_id).collect();
    let combo_ids: Vec<Uuid> = bookings.iter().map(|b| b.combo_id).collect();
    let names: HashMap<Uuid, String> = Users::find()
        .filter(UserCol::Id.is_in(user_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();
    let combos: HashMap<Uuid, String> = Combos::find()
        .filter(ComboCol::Id.is_in(combo_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let entries: Vec<CalendarEntry> = bookings
        .into_iter()
        .map(|b| CalendarEntry {
            booking_id: b.id,
            customer_name: names.get(&b.user_id).cloned().unwrap_or_default(),
            combo_name: combos.get(&b.combo_id).cloned().unwrap_or_default(),
            code: b.code,
            start_time: b.start_time,
            end_time: b.end_time,
            status: b.status.to_value(),
        })
        .collect();

    Ok(ApiResponse::item(
        "Calendar",
        DayCalendar {
            date: query.date,
            location_id: query.location_id,
            slots: day_grid(&entries),
        },
    ))
}
