#![allow(dead_code)]

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use nerd_society_api::{
    booking_code::SuffixSource,
    config::{AppConfig, VnpayConfig},
    entity::{
        audit_logs, bookings,
        combos::{self, ActiveModel as ComboActive},
        locations::{self, ActiveModel as LocationActive},
        payments,
        users::{self, ActiveModel as UserActive},
    },
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_CUSTOMER},
    notify::{BookingEvent, Notifier},
    state::AppState,
    vnpay::{SECURE_HASH, VnpayGateway},
};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, Schema, Set,
};
use uuid::Uuid;

pub const HASH_SECRET: &str = "test-hash-secret";
pub const BASE_URL: &str = "http://nerd.test";

/// Records every delivered event.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<BookingEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<BookingEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Always fails, like an unreachable mail relay.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &BookingEvent) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("smtp relay unreachable"))
    }
}

/// Hands out queued suffixes, then counts upwards from 500.
pub struct ScriptedSuffix {
    queue: Mutex<VecDeque<u16>>,
    next: Mutex<u16>,
}

impl ScriptedSuffix {
    pub fn new(script: &[u16]) -> Self {
        Self {
            queue: Mutex::new(script.iter().copied().collect()),
            next: Mutex::new(500),
        }
    }
}

impl SuffixSource for ScriptedSuffix {
    fn next_suffix(&self) -> u16 {
        if let Some(value) = self.queue.lock().unwrap().pop_front() {
            return value;
        }
        let mut next = self.next.lock().unwrap();
        *next = (*next + 1) % 1000;
        *next
    }
}

pub struct TestApp {
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn setup() -> TestApp {
    setup_with_suffix(ScriptedSuffix::new(&[])).await
}

pub async fn setup_with_suffix(suffix: ScriptedSuffix) -> TestApp {
    let notifier = Arc::new(RecordingNotifier::default());
    let state = build_state(notifier.clone(), Arc::new(suffix)).await;
    TestApp { state, notifier }
}

pub async fn build_state(
    notifier: Arc<dyn Notifier>,
    code_suffix: Arc<dyn SuffixSource>,
) -> AppState {
    let orm = sqlite_db().await;
    let config = test_config();
    AppState {
        orm,
        vnpay: Arc::new(VnpayGateway::new(&config.vnpay).expect("gateway")),
        config: Arc::new(config),
        notifier,
        code_suffix,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-jwt-secret".into(),
        public_base_url: BASE_URL.into(),
        vnpay: VnpayConfig {
            tmn_code: "NERDTEST".into(),
            hash_secret: HASH_SECRET.into(),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: format!("{BASE_URL}/api/payment/vnpay/return"),
        },
        notify_webhook_url: None,
    }
}

/// File-backed SQLite with a single connection, so the schema survives
/// connection recycling and transactions serialize.
async fn sqlite_db() -> DatabaseConnection {
    let path = std::env::temp_dir().join(format!("nerd-society-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let orm = Database::connect(options).await.expect("sqlite connect");

    let backend = orm.get_database_backend();
    let schema = Schema::new(backend);
    let tables = [
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(locations::Entity),
        schema.create_table_from_entity(combos::Entity),
        schema.create_table_from_entity(bookings::Entity),
        schema.create_table_from_entity(payments::Entity),
        schema.create_table_from_entity(audit_logs::Entity),
    ];
    for table in &tables {
        orm.execute(backend.build(table)).await.expect("create table");
    }
    orm
}

pub async fn create_user(state: &AppState, role: &str, email: &str) -> AuthUser {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test {role}")),
        email: Set(email.to_string()),
        phone: Set(None),
        password_hash: Set("not-a-real-hash".into()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .expect("insert user");
    AuthUser {
        user_id: user.id,
        role: user.role,
    }
}

pub async fn customer(state: &AppState) -> AuthUser {
    create_user(state, ROLE_CUSTOMER, &format!("{}@nerd.test", Uuid::new_v4())).await
}

pub async fn admin(state: &AppState) -> AuthUser {
    create_user(state, ROLE_ADMIN, &format!("admin-{}@nerd.test", Uuid::new_v4())).await
}

pub async fn create_location(state: &AppState, is_active: bool) -> locations::Model {
    LocationActive {
        id: Set(Uuid::new_v4()),
        name: Set("Nerd Society Tây Sơn".into()),
        address: Set("9 Tây Sơn, Hà Nội".into()),
        phone: Set("0901000001".into()),
        map_url: Set(None),
        is_active: Set(is_active),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .expect("insert location")
}

pub async fn create_combo(
    state: &AppState,
    duration: i32,
    price: i64,
    is_active: bool,
) -> combos::Model {
    ComboActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Combo {} phút", duration)),
        slug: Set(format!("combo-{}", Uuid::new_v4())),
        duration: Set(duration),
        price: Set(price),
        description: Set("Test combo".into()),
        features: Set(serde_json::json!(["Wifi"])),
        sort_order: Set(0),
        is_active: Set(is_active),
        is_popular: Set(false),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .expect("insert combo")
}

pub async fn count_bookings(state: &AppState) -> u64 {
    bookings::Entity::find().count(&state.orm).await.expect("count bookings")
}

pub async fn count_payments(state: &AppState) -> u64 {
    payments::Entity::find().count(&state.orm).await.expect("count payments")
}

/// Gateway return parameters signed with the test secret.
pub fn signed_return(state: &AppState, pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = state.vnpay.sign(&params);
    params.insert(SECURE_HASH.to_string(), hash);
    params
}

/// Makes every statement of the given kind on a table abort, standing in for
/// a crash between two writes of one unit of work.
pub async fn fail_writes(state: &AppState, event: &str, table: &str) {
    let sql = format!(
        "CREATE TRIGGER fail_{table}_{event} BEFORE {event} ON {table} \
         BEGIN SELECT RAISE(ABORT, 'simulated crash'); END;",
        event = event.to_ascii_lowercase(),
    );
    state
        .orm
        .execute_unprepared(&sql)
        .await
        .expect("create trigger");
}
