use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    booking_code::{MAX_CODE_ATTEMPTS, booking_code},
    db::is_unique_violation,
    dto::bookings::{BookingList, CreateBookingRequest},
    entity::{
        bookings::{ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings},
        combos::{Entity as Combos, Model as ComboModel},
        locations::Entity as Locations,
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
        status::{BookingStatus, PaymentMethod, PaymentStatus},
        users::{Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Booking, BookingWithPayment, Payment},
    notify::{self, BookingEvent, BookingEventKind},
    response::{ApiResponse, Meta},
    routes::params::{BookingListQuery, SortOrder},
    slots::{BookingSlot, parse_clock, parse_date},
    state::AppState,
};

/// A request that passed field validation.
#[derive(Debug, Clone, Copy)]
pub struct BookingInput {
    pub location_id: Uuid,
    pub combo_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

impl TryFrom<CreateBookingRequest> for BookingInput {
    type Error = AppError;

    fn try_from(payload: CreateBookingRequest) -> Result<Self, Self::Error> {
        let (Some(location_id), Some(combo_id), Some(date), Some(start_time)) = (
            payload.location_id,
            payload.combo_id,
            payload.date.filter(|s| !s.trim().is_empty()),
            payload.start_time.filter(|s| !s.trim().is_empty()),
        ) else {
            return Err(AppError::BadRequest("Missing required fields".into()));
        };

        let date = parse_date(&date)
            .ok_or_else(|| AppError::BadRequest("date must be YYYY-MM-DD".into()))?;
        let start_time = parse_clock(&start_time)
            .ok_or_else(|| AppError::BadRequest("start_time must be HH:MM (24-hour)".into()))?;

        Ok(Self {
            location_id,
            combo_id,
            date,
            start_time,
        })
    }
}

/// Derived values of a booking, fixed at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPlan {
    pub slot: BookingSlot,
    pub total_amount: i64,
}

impl BookingPlan {
    pub fn new(input: &BookingInput, combo: &ComboModel) -> AppResult<Self> {
        if combo.price < 0 {
            return Err(AppError::BadRequest("Combo has an invalid price".into()));
        }
        let slot = BookingSlot::new(input.date, input.start_time, combo.duration)
            .ok_or_else(|| AppError::BadRequest("Combo has an invalid duration".into()))?;
        Ok(Self {
            slot,
            total_amount: combo.price,
        })
    }
}

/// Booking Builder: validate, price, persist booking + pending payment, then
/// notify once the transaction has committed.
pub async fn create_booking(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBookingRequest,
) -> AppResult<ApiResponse<BookingWithPayment>> {
    let customer = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let input = BookingInput::try_from(payload)?;

    let combo = Combos::find_by_id(input.combo_id)
        .one(&state.orm)
        .await?
        .filter(|combo| combo.is_active)
        .ok_or(AppError::NotFound)?;

    Locations::find_by_id(input.location_id)
        .one(&state.orm)
        .await?
        .filter(|location| location.is_active)
        .ok_or(AppError::NotFound)?;

    let plan = BookingPlan::new(&input, &combo)?;

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = booking_code(plan.slot.date(), state.code_suffix.next_suffix());
        let txn = state.orm.begin().await?;

        let booking = match insert_booking(&txn, &customer, &input, &plan, &code).await {
            Ok(booking) => booking,
            Err(AppError::OrmError(err)) if is_unique_violation(&err) => {
                tracing::debug!(attempt, code = %code, "booking code collision");
                txn.rollback().await?;
                continue;
            }
            Err(err) => return Err(err),
        };
        let payment = insert_pending_payment(&txn, &booking).await?;

        let event = BookingEvent {
            kind: BookingEventKind::Created,
            booking: booking.clone(),
            customer_email: Some(customer.email.clone()),
            customer_name: Some(customer.name.clone()),
        };
        notify::commit(txn, vec![event]).await?.dispatch(state).await;

        tracing::info!(booking_id = %booking.id, code = %booking.code, "booking created");
        audit::record(
            state,
            Some(user.user_id),
            "booking_create",
            Some("bookings"),
            Some(serde_json::json!({ "booking_id": booking.id, "code": booking.code })),
        )
        .await;

        return Ok(ApiResponse::item(
            "Booking created",
            BookingWithPayment {
                booking,
                payment: Some(payment),
            },
        ));
    }

    tracing::warn!(
        date = %plan.slot.date(),
        attempts = MAX_CODE_ATTEMPTS,
        "booking code generation exhausted"
    );
    Err(AppError::Conflict(
        "Could not allocate a booking code, please retry".into(),
    ))
}

async fn insert_booking(
    txn: &DatabaseTransaction,
    customer: &UserModel,
    input: &BookingInput,
    plan: &BookingPlan,
    code: &str,
) -> AppResult<Booking> {
    let now = Utc::now();
    let booking = BookingActive {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        user_id: Set(customer.id),
        location_id: Set(input.location_id),
        combo_id: Set(input.combo_id),
        date: Set(plan.slot.date()),
        start_time: Set(plan.slot.start_time()),
        end_time: Set(plan.slot.end_time()),
        total_amount: Set(plan.total_amount),
        status: Set(BookingStatus::Pending),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;
    Ok(booking.into())
}

async fn insert_pending_payment(txn: &DatabaseTransaction, booking: &Booking) -> AppResult<Payment> {
    let now = Utc::now();
    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        amount: Set(booking.total_amount),
        method: Set(PaymentMethod::Vnpay),
        status: Set(PaymentStatus::Pending),
        transaction_id: Set(None),
        gateway_data: Set(None),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;
    Ok(payment.into())
}

pub async fn list_my_bookings(
    state: &AppState,
    user: &AuthUser,
    query: BookingListQuery,
) -> AppResult<ApiResponse<BookingList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(BookingCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(BookingCol::Status.eq(status));
    }

    let mut finder = Bookings::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(BookingCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(BookingCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Booking::from)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        BookingList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_my_booking(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<BookingWithPayment>> {
    let data = find_with_payment(&state.orm, id, Some(user.user_id)).await?;
    Ok(ApiResponse::item("OK", data))
}

/// Booking plus its payment; `owner` restricts the lookup to one customer.
pub async fn find_with_payment<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    owner: Option<Uuid>,
) -> AppResult<BookingWithPayment> {
    let mut condition = Condition::all().add(BookingCol::Id.eq(id));
    if let Some(owner) = owner {
        condition = condition.add(BookingCol::UserId.eq(owner));
    }

    let booking = Bookings::find()
        .filter(condition)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let payment = Payments::find()
        .filter(PaymentCol::BookingId.eq(booking.id))
        .one(conn)
        .await?
        .map(Payment::from);

    Ok(BookingWithPayment {
        booking: booking.into(),
        payment,
    })
}
