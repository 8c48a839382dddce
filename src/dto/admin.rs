use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{entity::status::BookingStatus, slots::CalendarSlot};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CalendarQuery {
    pub date: NaiveDate,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DayCalendar {
    pub date: NaiveDate,
    pub location_id: Option<Uuid>,
    pub slots: Vec<CalendarSlot>,
}
