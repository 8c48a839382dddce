use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Booking, BookingWithPayment};

/// Fields are optional so that a missing one is reported as a validation
/// error instead of a body rejection.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub location_id: Option<Uuid>,
    #[serde(alias = "service_id")]
    pub combo_id: Option<Uuid>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// `HH:MM`, 24-hour clock
    pub start_time: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingList {
    pub items: Vec<Booking>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingDetailList {
    pub items: Vec<BookingWithPayment>,
}
