use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    booking_code::SuffixSource, config::AppConfig, notify::Notifier, vnpay::VnpayGateway,
};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub vnpay: Arc<VnpayGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub code_suffix: Arc<dyn SuffixSource>,
}
