use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    bookings::Model as BookingModel,
    combos::Model as ComboModel,
    locations::Model as LocationModel,
    payments::Model as PaymentModel,
    status::{BookingStatus, PaymentMethod, PaymentStatus},
    users::Model as UserModel,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub map_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Combo {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub price: i64,
    pub description: String,
    pub features: Vec<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub is_popular: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub code: String,
    pub user_id: Uuid,
    pub location_id: Uuid,
    pub combo_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub total_amount: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingWithPayment {
    pub booking: Booking,
    pub payment: Option<Payment>,
}

impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<LocationModel> for Location {
    fn from(model: LocationModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            address: model.address,
            phone: model.phone,
            map_url: model.map_url,
            is_active: model.is_active,
        }
    }
}

impl From<ComboModel> for Combo {
    fn from(model: ComboModel) -> Self {
        let features = serde_json::from_value(model.features).unwrap_or_default();
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            duration: model.duration,
            price: model.price,
            description: model.description,
            features,
            sort_order: model.sort_order,
            is_active: model.is_active,
            is_popular: model.is_popular,
        }
    }
}

impl From<BookingModel> for Booking {
    fn from(model: BookingModel) -> Self {
        Self {
            id: model.id,
            code: model.code,
            user_id: model.user_id,
            location_id: model.location_id,
            combo_id: model.combo_id,
            date: model.date,
            start_time: model.start_time,
            end_time: model.end_time,
            total_amount: model.total_amount,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<PaymentModel> for Payment {
    fn from(model: PaymentModel) -> Self {
        Self {
            id: model.id,
            booking_id: model.booking_id,
            amount: model.amount,
            method: model.method,
            status: model.status,
            transaction_id: model.transaction_id,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
