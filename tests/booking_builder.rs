mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use nerd_society_api::{
    booking_code::is_booking_code,
    dto::bookings::CreateBookingRequest,
    entity::status::{BookingStatus, PaymentMethod, PaymentStatus},
    error::AppError,
    middleware::auth::{AuthUser, ROLE_CUSTOMER},
    notify::BookingEventKind,
    routes::params::BookingListQuery,
    services::booking_service,
};
use uuid::Uuid;

use common::{FailingNotifier, ScriptedSuffix};

fn request(location_id: Uuid, combo_id: Uuid, date: &str, start: &str) -> CreateBookingRequest {
    CreateBookingRequest {
        location_id: Some(location_id),
        combo_id: Some(combo_id),
        date: Some(date.into()),
        start_time: Some(start.into()),
    }
}

#[tokio::test]
async fn three_hour_combo_creates_pending_booking_and_payment() {
    let app = common::setup().await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 180, 55_000, true).await;

    let resp = booking_service::create_booking(
        &app.state,
        &user,
        request(location.id, combo.id, "2025-06-01", "09:00"),
    )
    .await
    .expect("booking created");
    let created = resp.data.expect("booking data");

    let booking = created.booking;
    assert_eq!(booking.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    assert_eq!(booking.start_time, "09:00");
    assert_eq!(booking.end_time, "12:00");
    assert_eq!(booking.total_amount, 55_000);
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.user_id, user.user_id);
    assert!(is_booking_code(&booking.code), "bad code {}", booking.code);
    assert!(booking.code.starts_with("NERD-20250601-"));

    let payment = created.payment.expect("payment");
    assert_eq!(payment.booking_id, booking.id);
    assert_eq!(payment.amount, 55_000);
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.method, PaymentMethod::Vnpay);
    assert!(payment.transaction_id.is_none());
    assert!(payment.paid_at.is_none());

    let events = app.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, BookingEventKind::Created);
    assert_eq!(events[0].booking.id, booking.id);
}

#[tokio::test]
async fn late_booking_wraps_end_time_and_keeps_start_date() {
    let app = common::setup().await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 180, 55_000, true).await;

    let booking = booking_service::create_booking(
        &app.state,
        &user,
        request(location.id, combo.id, "2025-06-01", "22:30"),
    )
    .await
    .expect("booking created")
    .data
    .expect("booking data")
    .booking;

    assert_eq!(booking.end_time, "01:30");
    assert_eq!(booking.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    assert!(booking.code.starts_with("NERD-20250601-"));
}

#[tokio::test]
async fn colliding_code_is_retried_with_a_fresh_suffix() {
    let app = common::setup_with_suffix(ScriptedSuffix::new(&[7, 7, 8])).await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 60, 25_000, true).await;

    let first = booking_service::create_booking(
        &app.state,
        &user,
        request(location.id, combo.id, "2025-06-01", "09:00"),
    )
    .await
    .expect("first booking")
    .data
    .expect("data")
    .booking;
    let second = booking_service::create_booking(
        &app.state,
        &user,
        request(location.id, combo.id, "2025-06-01", "10:00"),
    )
    .await
    .expect("second booking")
    .data
    .expect("data")
    .booking;

    assert_eq!(first.code, "NERD-20250601-007");
    assert_eq!(second.code, "NERD-20250601-008");
    assert_eq!(common::count_bookings(&app.state).await, 2);
    assert_eq!(common::count_payments(&app.state).await, 2);
}

#[tokio::test]
async fn exhausted_code_attempts_return_conflict_without_writes() {
    let app = common::setup_with_suffix(ScriptedSuffix::new(&[3, 3, 3, 3, 3, 3])).await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 60, 25_000, true).await;

    booking_service::create_booking(
        &app.state,
        &user,
        request(location.id, combo.id, "2025-06-01", "09:00"),
    )
    .await
    .expect("first booking");

    let err = booking_service::create_booking(
        &app.state,
        &user,
        request(location.id, combo.id, "2025-06-01", "11:00"),
    )
    .await
    .expect_err("conflict");
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

    assert_eq!(common::count_bookings(&app.state).await, 1);
    assert_eq!(common::count_payments(&app.state).await, 1);
    assert_eq!(app.notifier.events().len(), 1);
}

#[tokio::test]
async fn same_suffix_on_another_day_is_not_a_collision() {
    let app = common::setup_with_suffix(ScriptedSuffix::new(&[42, 42])).await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 60, 25_000, true).await;

    for date in ["2025-06-01", "2025-06-02"] {
        booking_service::create_booking(&app.state, &user, request(location.id, combo.id, date, "09:00"))
            .await
            .expect("booking");
    }
    assert_eq!(common::count_bookings(&app.state).await, 2);
}

#[tokio::test]
async fn missing_or_inactive_combo_is_not_found_and_writes_nothing() {
    let app = common::setup().await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let inactive = common::create_combo(&app.state, 60, 25_000, false).await;

    for combo_id in [Uuid::new_v4(), inactive.id] {
        let err = booking_service::create_booking(
            &app.state,
            &user,
            request(location.id, combo_id, "2025-06-01", "09:00"),
        )
        .await
        .expect_err("not found");
        assert!(matches!(err, AppError::NotFound), "got {err:?}");
    }

    assert_eq!(common::count_bookings(&app.state).await, 0);
    assert_eq!(common::count_payments(&app.state).await, 0);
    assert!(app.notifier.events().is_empty());
}

#[tokio::test]
async fn inactive_location_is_not_found() {
    let app = common::setup().await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, false).await;
    let combo = common::create_combo(&app.state, 60, 25_000, true).await;

    let err = booking_service::create_booking(
        &app.state,
        &user,
        request(location.id, combo.id, "2025-06-01", "09:00"),
    )
    .await
    .expect_err("not found");
    assert!(matches!(err, AppError::NotFound));
    assert_eq!(common::count_bookings(&app.state).await, 0);
}

#[tokio::test]
async fn malformed_input_is_a_validation_error() {
    let app = common::setup().await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 60, 25_000, true).await;

    let cases = [
        CreateBookingRequest {
            start_time: None,
            ..request(location.id, combo.id, "2025-06-01", "09:00")
        },
        CreateBookingRequest {
            location_id: None,
            ..request(location.id, combo.id, "2025-06-01", "09:00")
        },
        request(location.id, combo.id, "   ", "09:00"),
        request(location.id, combo.id, "01/06/2025", "09:00"),
        request(location.id, combo.id, "2025-06-01", "9am"),
        request(location.id, combo.id, "2025-06-01", "24:00"),
    ];
    for payload in cases {
        let err = booking_service::create_booking(&app.state, &user, payload)
            .await
            .expect_err("validation error");
        assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");
    }
    assert_eq!(common::count_bookings(&app.state).await, 0);
}

#[tokio::test]
async fn unknown_caller_is_unauthorized() {
    let app = common::setup().await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 60, 25_000, true).await;
    let ghost = AuthUser {
        user_id: Uuid::new_v4(),
        role: ROLE_CUSTOMER.into(),
    };

    let err = booking_service::create_booking(
        &app.state,
        &ghost,
        request(location.id, combo.id, "2025-06-01", "09:00"),
    )
    .await
    .expect_err("unauthorized");
    assert!(matches!(err, AppError::Unauthorized));
    assert_eq!(common::count_bookings(&app.state).await, 0);
}

#[tokio::test]
async fn notifier_failure_does_not_undo_the_booking() {
    let state =
        common::build_state(Arc::new(FailingNotifier), Arc::new(ScriptedSuffix::new(&[]))).await;
    let user = common::customer(&state).await;
    let location = common::create_location(&state, true).await;
    let combo = common::create_combo(&state, 60, 25_000, true).await;

    let created = booking_service::create_booking(
        &state,
        &user,
        request(location.id, combo.id, "2025-06-01", "09:00"),
    )
    .await
    .expect("booking survives notifier failure");
    assert!(created.data.is_some());
    assert_eq!(common::count_bookings(&state).await, 1);
    assert_eq!(common::count_payments(&state).await, 1);
}

#[tokio::test]
async fn failed_payment_insert_leaves_no_orphan_booking() {
    let app = common::setup().await;
    let user = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 60, 25_000, true).await;
    common::fail_writes(&app.state, "INSERT", "payments").await;

    let err = booking_service::create_booking(
        &app.state,
        &user,
        request(location.id, combo.id, "2025-06-01", "09:00"),
    )
    .await
    .expect_err("insert aborted");
    assert!(matches!(err, AppError::OrmError(_)), "got {err:?}");

    assert_eq!(common::count_bookings(&app.state).await, 0);
    assert_eq!(common::count_payments(&app.state).await, 0);
    assert!(app.notifier.events().is_empty());
}

#[tokio::test]
async fn customers_only_see_their_own_bookings() {
    let app = common::setup().await;
    let alice = common::customer(&app.state).await;
    let bob = common::customer(&app.state).await;
    let location = common::create_location(&app.state, true).await;
    let combo = common::create_combo(&app.state, 60, 25_000, true).await;

    let alice_booking = booking_service::create_booking(
        &app.state,
        &alice,
        request(location.id, combo.id, "2025-06-01", "09:00"),
    )
    .await
    .unwrap()
    .data
    .unwrap()
    .booking;
    booking_service::create_booking(
        &app.state,
        &bob,
        request(location.id, combo.id, "2025-06-01", "10:00"),
    )
    .await
    .unwrap();

    let mine = booking_service::list_my_bookings(&app.state, &alice, BookingListQuery::default())
        .await
        .unwrap();
    let items = mine.data.unwrap().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, alice_booking.id);
    assert_eq!(mine.meta.unwrap().total, Some(1));

    let err = booking_service::get_my_booking(&app.state, &bob, alice_booking.id)
        .await
        .expect_err("other customer's booking");
    assert!(matches!(err, AppError::NotFound));

    let detail = booking_service::get_my_booking(&app.state, &alice, alice_booking.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(detail.payment.unwrap().amount, 25_000);
}
