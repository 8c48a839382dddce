use std::env;

const VNPAY_SANDBOX_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Origin of the customer-facing site; callback redirects land under it.
    pub public_base_url: String,
    pub vnpay: VnpayConfig,
    pub notify_webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub payment_url: String,
    pub return_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let vnpay = VnpayConfig {
            tmn_code: env::var("VNPAY_TMN_CODE").unwrap_or_default(),
            hash_secret: env::var("VNPAY_HASH_SECRET")
                .map_err(|_| anyhow::anyhow!("VNPAY_HASH_SECRET is not set"))?,
            payment_url: env::var("VNPAY_PAYMENT_URL")
                .unwrap_or_else(|_| VNPAY_SANDBOX_URL.to_string()),
            return_url: env::var("VNPAY_RETURN_URL")
                .unwrap_or_else(|_| format!("{public_base_url}/api/payment/vnpay/return")),
        };

        let notify_webhook_url = env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            public_base_url,
            vnpay,
            notify_webhook_url,
        })
    }
}
