use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::catalog::{ComboList, CreateComboRequest, CreateLocationRequest, LocationList},
    entity::{
        combos::{ActiveModel as ComboActive, Column as ComboCol, Entity as Combos},
        locations::{ActiveModel as LocationActive, Column as LocationCol, Entity as Locations},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Combo, Location},
    response::ApiResponse,
    state::AppState,
};

pub async fn list_locations(state: &AppState) -> AppResult<ApiResponse<LocationList>> {
    let items = Locations::find()
        .filter(LocationCol::IsActive.eq(true))
        .order_by_asc(LocationCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Location::from)
        .collect();
    Ok(ApiResponse::item("OK", LocationList { items }))
}

pub async fn list_combos(state: &AppState) -> AppResult<ApiResponse<ComboList>> {
    let items = Combos::find()
        .filter(ComboCol::IsActive.eq(true))
        .order_by_asc(ComboCol::SortOrder)
        .order_by_asc(ComboCol::Price)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Combo::from)
        .collect();
    Ok(ApiResponse::item("OK", ComboList { items }))
}

pub async fn create_location(
    state: &AppState,
    user: &AuthUser,
    payload: CreateLocationRequest,
) -> AppResult<ApiResponse<Location>> {
    ensure_admin(user)?;
    let (Some(name), Some(address), Some(phone)) = (
        required(payload.name),
        required(payload.address),
        required(payload.phone),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".into()));
    };

    let location = LocationActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        address: Set(address),
        phone: Set(phone),
        map_url: Set(payload.map_url),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        state,
        Some(user.user_id),
        "location_create",
        Some("locations"),
        Some(serde_json::json!({ "location_id": location.id })),
    )
    .await;

    Ok(ApiResponse::item("Location created", location.into()))
}

pub async fn create_combo(
    state: &AppState,
    user: &AuthUser,
    payload: CreateComboRequest,
) -> AppResult<ApiResponse<Combo>> {
    ensure_admin(user)?;
    let (Some(name), Some(duration), Some(price), Some(description)) = (
        required(payload.name),
        payload.duration,
        payload.price,
        required(payload.description),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".into()));
    };
    if duration <= 0 {
        return Err(AppError::BadRequest("duration must be greater than 0".into()));
    }
    if price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }

    let now = Utc::now();
    let slug = format!("{}-{}", slugify(&name), now.timestamp_millis());
    let combo = ComboActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        slug: Set(slug),
        duration: Set(duration),
        price: Set(price),
        description: Set(description),
        features: Set(serde_json::json!(payload.features)),
        sort_order: Set(payload.sort_order.unwrap_or(0)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        is_popular: Set(payload.is_popular.unwrap_or(false)),
        created_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        state,
        Some(user.user_id),
        "combo_create",
        Some("combos"),
        Some(serde_json::json!({ "combo_id": combo.id, "price": combo.price })),
    )
    .await;

    Ok(ApiResponse::item("Combo created", combo.into()))
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lowercase ASCII words joined by `-`; other characters are dropped.
fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
