use std::collections::BTreeMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect,
    Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    db::is_unique_violation,
    dto::payments::{PaymentUrl, VnpayPaymentRequest},
    entity::{
        bookings::{
            ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings,
            Model as BookingModel,
        },
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
        status::{BookingStatus, PaymentMethod, PaymentStatus},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Booking, BookingWithPayment, Payment},
    notify::{self, BookingEvent, BookingEventKind},
    response::ApiResponse,
    state::AppState,
    vnpay::{PaymentRequest, SignatureVerifier, VnpayReturn},
};

/// Where the customer's browser is sent after the gateway return trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled { booking_id: Uuid },
    Rejected { booking_id: Uuid },
    /// Money arrived for a booking that was cancelled or marked no-show.
    BookingClosed { booking_id: Uuid },
    SignatureInvalid,
    NotFound,
    Malformed,
    Internal,
}

impl SettlementOutcome {
    pub fn redirect_path(&self) -> String {
        match self {
            SettlementOutcome::Settled { booking_id } => {
                format!("/booking/success?id={booking_id}&payment=success")
            }
            SettlementOutcome::Rejected { booking_id } => {
                format!("/booking/failed?id={booking_id}&error=payment_failed")
            }
            SettlementOutcome::BookingClosed { booking_id } => {
                format!("/booking/failed?id={booking_id}&error=booking_closed")
            }
            SettlementOutcome::SignatureInvalid => "/booking/failed?error=signature".into(),
            SettlementOutcome::NotFound => "/booking/failed?error=not_found".into(),
            SettlementOutcome::Malformed => "/booking/failed?error=invalid_request".into(),
            SettlementOutcome::Internal => "/booking/failed?error=internal".into(),
        }
    }

    pub fn redirect_url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.redirect_path())
    }

    /// Outcome a replayed callback reports for an already settled payment.
    fn of_settled(payment: &PaymentModel, booking_status: BookingStatus) -> Self {
        let booking_id = payment.booking_id;
        match payment.status {
            PaymentStatus::Completed if booking_status.is_abandoned() => {
                SettlementOutcome::BookingClosed { booking_id }
            }
            PaymentStatus::Completed => SettlementOutcome::Settled { booking_id },
            _ => SettlementOutcome::Rejected { booking_id },
        }
    }
}

/// Payment Settlement entry point for the gateway return redirect.
pub async fn settle_vnpay_return(
    state: &AppState,
    params: BTreeMap<String, String>,
) -> SettlementOutcome {
    settle_callback(state, state.vnpay.as_ref(), params).await
}

/// Never fails: every fault is mapped to an outcome.
pub async fn settle_callback(
    state: &AppState,
    verifier: &dyn SignatureVerifier,
    params: BTreeMap<String, String>,
) -> SettlementOutcome {
    if !verifier.verify(&params) {
        tracing::warn!(
            txn_ref = params.get(crate::vnpay::TXN_REF).map(String::as_str).unwrap_or("-"),
            "vnpay return signature mismatch"
        );
        return SettlementOutcome::SignatureInvalid;
    }

    let callback = match VnpayReturn::parse(params) {
        Ok(callback) => callback,
        Err(err) => {
            tracing::warn!(error = %err, "vnpay return rejected");
            return SettlementOutcome::Malformed;
        }
    };

    match apply_settlement(state, &callback).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(error = %err, txn_ref = %callback.txn_ref, "vnpay settlement failed");
            SettlementOutcome::Internal
        }
    }
}

async fn apply_settlement(
    state: &AppState,
    callback: &VnpayReturn,
) -> AppResult<SettlementOutcome> {
    let txn = state.orm.begin().await?;

    let payment = Payments::find()
        .filter(PaymentCol::TransactionId.eq(callback.txn_ref.as_str()))
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let Some(payment) = payment else {
        tracing::warn!(txn_ref = %callback.txn_ref, "vnpay return for unknown transaction");
        return Ok(SettlementOutcome::NotFound);
    };

    let booking_id = payment.booking_id;
    let booking = Bookings::find_by_id(booking_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("booking {booking_id} missing for payment"))
        })?;

    if payment.status.is_settled() {
        tracing::info!(
            txn_ref = %callback.txn_ref,
            status = ?payment.status,
            "duplicate vnpay return ignored"
        );
        return Ok(SettlementOutcome::of_settled(&payment, booking.status));
    }

    let now = Utc::now();

    if !callback.is_success() {
        let mut active: PaymentActive = payment.into();
        active.status = Set(PaymentStatus::Failed);
        active.gateway_data = Set(Some(callback.payload()));
        active.updated_at = Set(now.into());
        active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(
            booking_id = %booking_id,
            response_code = %callback.response_code,
            "vnpay payment failed"
        );
        audit::record(
            state,
            None,
            "payment_failed",
            Some("payments"),
            Some(serde_json::json!({ "booking_id": booking_id, "txn_ref": callback.txn_ref })),
        )
        .await;
        return Ok(SettlementOutcome::Rejected { booking_id });
    }

    let mut active: PaymentActive = payment.into();
    active.status = Set(PaymentStatus::Completed);
    active.paid_at = Set(Some(now.into()));
    active.gateway_data = Set(Some(callback.payload()));
    active.updated_at = Set(now.into());
    active.update(&txn).await?;

    let audit_data = serde_json::json!({
        "booking_id": booking_id,
        "booking_status": booking.status,
        "txn_ref": callback.txn_ref,
        "transaction_no": callback.transaction_no,
        "bank_code": callback.bank_code,
    });

    // Only a pending booking is confirmed; any other state is left as staff set it.
    if !booking.status.can_transition_to(BookingStatus::Confirmed) {
        txn.commit().await?;

        let (action, outcome) = if booking.status.is_abandoned() {
            tracing::warn!(
                booking_id = %booking_id,
                status = ?booking.status,
                txn_ref = %callback.txn_ref,
                "vnpay payment received for closed booking"
            );
            ("payment_on_closed_booking", SettlementOutcome::BookingClosed { booking_id })
        } else {
            tracing::info!(
                booking_id = %booking_id,
                status = ?booking.status,
                txn_ref = %callback.txn_ref,
                "vnpay payment settled, booking already active"
            );
            ("payment_completed", SettlementOutcome::Settled { booking_id })
        };
        audit::record(state, None, action, Some("payments"), Some(audit_data)).await;
        return Ok(outcome);
    }

    let confirmed = Bookings::update_many()
        .set(BookingActive {
            status: Set(BookingStatus::Confirmed),
            updated_at: Set(now.into()),
            ..Default::default()
        })
        .filter(BookingCol::Id.eq(booking_id))
        .filter(BookingCol::Status.eq(BookingStatus::Pending))
        .exec(&txn)
        .await?;
    if confirmed.rows_affected != 1 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "booking {booking_id} left pending state during settlement"
        )));
    }

    let booking = Bookings::find_by_id(booking_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let customer = Users::find_by_id(booking.user_id).one(&txn).await?;

    let event = BookingEvent {
        kind: BookingEventKind::Confirmed,
        booking: Booking::from(booking),
        customer_email: customer.as_ref().map(|c| c.email.clone()),
        customer_name: customer.map(|c| c.name),
    };
    notify::commit(txn, vec![event]).await?.dispatch(state).await;

    tracing::info!(booking_id = %booking_id, txn_ref = %callback.txn_ref, "vnpay payment settled");
    audit::record(state, None, "payment_completed", Some("payments"), Some(audit_data)).await;

    Ok(SettlementOutcome::Settled { booking_id })
}

/// Assign a fresh gateway reference to the booking's payment and return the
/// signed redirect URL. A failed earlier attempt is replaced first.
pub async fn create_vnpay_payment(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
    payload: VnpayPaymentRequest,
    client_ip: &str,
) -> AppResult<ApiResponse<PaymentUrl>> {
    let txn = state.orm.begin().await?;

    let booking = owned_pending_booking(&txn, user, booking_id).await?;
    let (payment, replaced) = payment_for_attempt(&txn, &booking).await?;

    let created_at = Utc::now();
    let txn_ref = format!("{}-{}", booking.code, created_at.timestamp_millis());

    let mut active: PaymentActive = payment.into();
    active.transaction_id = Set(Some(txn_ref.clone()));
    active.method = Set(PaymentMethod::Vnpay);
    active.updated_at = Set(created_at.into());
    let payment = match active.update(&txn).await {
        Ok(payment) => payment,
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::Conflict(
                "Payment reference already in use, please retry".into(),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    let payment_url = state.vnpay.payment_url(&PaymentRequest {
        txn_ref: &txn_ref,
        amount: payment.amount,
        order_info: format!("Thanh toan booking {}", booking.code),
        client_ip,
        bank_code: payload.bank_code.as_deref(),
        created_at,
    })?;

    txn.commit().await?;

    tracing::info!(booking_id = %booking.id, txn_ref = %txn_ref, "vnpay session created");
    if let Some(previous) = replaced {
        record_retry(state, user, &previous).await;
    }
    audit::record(
        state,
        Some(user.user_id),
        "payment_session_create",
        Some("payments"),
        Some(serde_json::json!({ "booking_id": booking.id, "txn_ref": txn_ref })),
    )
    .await;

    Ok(ApiResponse::item(
        "Payment URL created",
        PaymentUrl {
            payment_url,
            transaction_id: txn_ref,
        },
    ))
}

/// Pay at the counter: switch the method to cash and confirm the booking.
/// The payment stays pending until staff collect it, and any gateway
/// reference is dropped so a late gateway return cannot settle it.
pub async fn choose_cash_payment(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
) -> AppResult<ApiResponse<BookingWithPayment>> {
    let txn = state.orm.begin().await?;

    let booking = owned_pending_booking(&txn, user, booking_id).await?;
    let (payment, replaced) = payment_for_attempt(&txn, &booking).await?;

    let now = Utc::now();
    let mut payment: PaymentActive = payment.into();
    payment.method = Set(PaymentMethod::Cash);
    payment.transaction_id = Set(None);
    payment.updated_at = Set(now.into());
    let payment = payment.update(&txn).await?;

    let mut booking: BookingActive = booking.into();
    booking.status = Set(BookingStatus::Confirmed);
    booking.updated_at = Set(now.into());
    let booking = Booking::from(booking.update(&txn).await?);

    let customer = Users::find_by_id(user.user_id).one(&txn).await?;
    let event = BookingEvent {
        kind: BookingEventKind::Confirmed,
        booking: booking.clone(),
        customer_email: customer.as_ref().map(|c| c.email.clone()),
        customer_name: customer.map(|c| c.name),
    };
    notify::commit(txn, vec![event]).await?.dispatch(state).await;

    if let Some(previous) = replaced {
        record_retry(state, user, &previous).await;
    }
    audit::record(
        state,
        Some(user.user_id),
        "payment_cash_selected",
        Some("payments"),
        Some(serde_json::json!({ "booking_id": booking.id })),
    )
    .await;

    Ok(ApiResponse::item(
        "Booking confirmed, pay at the counter",
        BookingWithPayment {
            booking,
            payment: Some(Payment::from(payment)),
        },
    ))
}

async fn owned_pending_booking(
    txn: &DatabaseTransaction,
    user: &AuthUser,
    booking_id: Uuid,
) -> AppResult<BookingModel> {
    let booking = Bookings::find()
        .filter(BookingCol::Id.eq(booking_id))
        .filter(BookingCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;
    if booking.status != BookingStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Booking is already {:?}",
            booking.status
        )));
    }
    Ok(booking)
}

/// The payment a new attempt works on. A pending payment is reused; a failed
/// one is replaced by a fresh pending row, returned alongside for the audit
/// trail. A completed payment is final.
async fn payment_for_attempt(
    txn: &DatabaseTransaction,
    booking: &BookingModel,
) -> AppResult<(PaymentModel, Option<PaymentModel>)> {
    let payment = Payments::find()
        .filter(PaymentCol::BookingId.eq(booking.id))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;

    match payment.status {
        PaymentStatus::Pending => Ok((payment, None)),
        PaymentStatus::Completed => Err(AppError::BadRequest("Payment already settled".into())),
        PaymentStatus::Failed => {
            Payments::delete_by_id(payment.id).exec(txn).await?;
            let now = Utc::now();
            let fresh = PaymentActive {
                id: Set(Uuid::new_v4()),
                booking_id: Set(booking.id),
                amount: Set(booking.total_amount),
                method: Set(payment.method),
                status: Set(PaymentStatus::Pending),
                transaction_id: Set(None),
                gateway_data: Set(None),
                paid_at: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(txn)
            .await?;
            Ok((fresh, Some(payment)))
        }
    }
}

async fn record_retry(state: &AppState, user: &AuthUser, previous: &PaymentModel) {
    tracing::info!(
        booking_id = %previous.booking_id,
        previous_payment = %previous.id,
        "failed payment replaced by a new attempt"
    );
    audit::record(
        state,
        Some(user.user_id),
        "payment_retry",
        Some("payments"),
        Some(serde_json::json!({
            "booking_id": previous.booking_id,
            "previous_payment_id": previous.id,
            "previous_txn_ref": previous.transaction_id,
            "previous_gateway_data": previous.gateway_data,
        })),
    )
    .await;
}
