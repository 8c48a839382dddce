use chrono::Utc;
use nerd_society_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        combos::{ActiveModel as ComboActive, Column as ComboCol, Entity as Combos},
        locations::{ActiveModel as LocationActive, Column as LocationCol, Entity as Locations},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    middleware::auth::{ROLE_ADMIN, ROLE_CUSTOMER},
    services::auth_service::hash_password,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

struct ComboSeed {
    name: &'static str,
    slug: &'static str,
    duration: i32,
    price: i64,
    description: &'static str,
    features: &'static [&'static str],
    is_popular: bool,
}

const COMBOS: &[ComboSeed] = &[
    ComboSeed {
        name: "Combo 1 giờ",
        slug: "combo-1h",
        duration: 60,
        price: 25_000,
        description: "Quick focus session",
        features: &["Wifi", "Free drink refill"],
        is_popular: false,
    },
    ComboSeed {
        name: "Combo 3 giờ",
        slug: "combo-3h",
        duration: 180,
        price: 55_000,
        description: "Half a working day",
        features: &["Wifi", "Free drink refill", "Power outlet"],
        is_popular: true,
    },
    ComboSeed {
        name: "Combo 6 giờ",
        slug: "combo-6h",
        duration: 360,
        price: 85_000,
        description: "A full working day",
        features: &["Wifi", "Free drink refill", "Power outlet", "Locker"],
        is_popular: false,
    },
    ComboSeed {
        name: "Combo 24 giờ",
        slug: "combo-24h",
        duration: 1440,
        price: 180_000,
        description: "Around the clock",
        features: &["Wifi", "Free drink refill", "Power outlet", "Locker", "Nap pod"],
        is_popular: false,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "Nerd Admin", "admin@nerdsociety.vn", "admin123", ROLE_ADMIN).await?;
    let user_id =
        ensure_user(&orm, "Nerd Member", "member@nerdsociety.vn", "member123", ROLE_CUSTOMER).await?;
    ensure_location(
        &orm,
        "Nerd Society Tây Sơn",
        "Tầng 2, 9 Tây Sơn, Đống Đa, Hà Nội",
        "0901000001",
    )
    .await?;
    ensure_location(
        &orm,
        "Nerd Society Hồ Tùng Mậu",
        "Tầng 3, 134 Hồ Tùng Mậu, Cầu Giấy, Hà Nội",
        "0901000002",
    )
    .await?;
    for (index, combo) in COMBOS.iter().enumerate() {
        ensure_combo(&orm, combo, index as i32).await?;
    }

    println!("Seed completed. Admin ID: {admin_id}, Member ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(user) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        return Ok(user.id);
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        phone: Set(None),
        password_hash: Set(password_hash),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;
    Ok(user.id)
}

async fn ensure_location(
    orm: &DatabaseConnection,
    name: &str,
    address: &str,
    phone: &str,
) -> anyhow::Result<()> {
    let exists = Locations::find()
        .filter(LocationCol::Name.eq(name))
        .one(orm)
        .await?
        .is_some();
    if exists {
        return Ok(());
    }

    LocationActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        address: Set(address.to_string()),
        phone: Set(phone.to_string()),
        map_url: Set(None),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;
    Ok(())
}

async fn ensure_combo(orm: &DatabaseConnection, seed: &ComboSeed, sort_order: i32) -> anyhow::Result<()> {
    let exists = Combos::find()
        .filter(ComboCol::Slug.eq(seed.slug))
        .one(orm)
        .await?
        .is_some();
    if exists {
        return Ok(());
    }

    ComboActive {
        id: Set(Uuid::new_v4()),
        name: Set(seed.name.to_string()),
        slug: Set(seed.slug.to_string()),
        duration: Set(seed.duration),
        price: Set(seed.price),
        description: Set(seed.description.to_string()),
        features: Set(serde_json::json!(seed.features)),
        sort_order: Set(sort_order),
        is_active: Set(true),
        is_popular: Set(seed.is_popular),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;
    Ok(())
}
