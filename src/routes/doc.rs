use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{DayCalendar, UpdateBookingStatusRequest},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        bookings::{BookingDetailList, BookingList, CreateBookingRequest},
        catalog::{ComboList, CreateComboRequest, CreateLocationRequest, LocationList},
        payments::{PaymentUrl, VnpayPaymentRequest},
    },
    entity::status::{BookingStatus, PaymentMethod, PaymentStatus},
    models::{Booking, BookingWithPayment, Combo, Location, Payment, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, bookings, catalog, health, params, payments},
    slots::{CalendarEntry, CalendarSlot, CalendarSlotEntry},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        catalog::list_locations,
        catalog::list_combos,
        bookings::create_booking,
        bookings::list_bookings,
        bookings::get_booking,
        bookings::create_vnpay_payment,
        bookings::choose_cash_payment,
        payments::vnpay_return,
        admin::list_all_bookings,
        admin::get_booking_admin,
        admin::update_booking_status,
        admin::collect_cash_payment,
        admin::day_calendar,
        admin::create_location,
        admin::create_combo
    ),
    components(
        schemas(
            User,
            Location,
            Combo,
            Booking,
            Payment,
            BookingWithPayment,
            BookingStatus,
            PaymentStatus,
            PaymentMethod,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateBookingRequest,
            BookingList,
            BookingDetailList,
            VnpayPaymentRequest,
            PaymentUrl,
            CreateLocationRequest,
            CreateComboRequest,
            LocationList,
            ComboList,
            UpdateBookingStatusRequest,
            DayCalendar,
            CalendarSlot,
            CalendarSlotEntry,
            CalendarEntry,
            params::Pagination,
            params::BookingListQuery,
            Meta,
            ApiResponse<BookingWithPayment>,
            ApiResponse<BookingList>,
            ApiResponse<BookingDetailList>,
            ApiResponse<PaymentUrl>,
            ApiResponse<DayCalendar>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Catalog", description = "Locations and combos"),
        (name = "Bookings", description = "Customer booking endpoints"),
        (name = "Payments", description = "Payment initiation and gateway return"),
        (name = "Admin", description = "Back-office endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
