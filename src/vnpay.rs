//! VNPay boundary: canonical signing, payment URL creation and the return
//! envelope. Only this module sees raw gateway parameter names.

use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::config::VnpayConfig;

type HmacSha512 = Hmac<Sha512>;

pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
pub const TXN_REF: &str = "vnp_TxnRef";
pub const RESPONSE_CODE: &str = "vnp_ResponseCode";
pub const SUCCESS_CODE: &str = "00";

const VERSION: &str = "2.1.0";
/// Gateway timestamps are Vietnam local time (GMT+7).
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;
const PAYMENT_EXPIRY_MINUTES: i64 = 15;

/// Authenticity check over a raw callback parameter set.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, params: &BTreeMap<String, String>) -> bool;
}

pub struct VnpayGateway {
    tmn_code: String,
    hash_secret: String,
    endpoint: Url,
    return_url: String,
}

/// Input for one gateway session.
#[derive(Debug, Clone)]
pub struct PaymentRequest<'a> {
    pub txn_ref: &'a str,
    /// Minor currency units (VND).
    pub amount: i64,
    pub order_info: String,
    pub client_ip: &'a str,
    pub bank_code: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

impl VnpayGateway {
    pub fn new(config: &VnpayConfig) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&config.payment_url)
            .with_context(|| format!("invalid VNPAY_PAYMENT_URL {}", config.payment_url))?;
        if config.hash_secret.is_empty() {
            return Err(anyhow!("VNPAY_HASH_SECRET must not be empty"));
        }
        Ok(Self {
            tmn_code: config.tmn_code.clone(),
            hash_secret: config.hash_secret.clone(),
            endpoint,
            return_url: config.return_url.clone(),
        })
    }

    /// Signed redirect URL for the customer's browser.
    pub fn payment_url(&self, request: &PaymentRequest<'_>) -> anyhow::Result<String> {
        let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)
            .ok_or_else(|| anyhow!("invalid gateway offset"))?;
        let created = request.created_at.with_timezone(&offset);
        let expires = created + Duration::minutes(PAYMENT_EXPIRY_MINUTES);

        // Gateway amounts are in hundredths of a dong.
        let amount = request
            .amount
            .checked_mul(100)
            .filter(|amount| *amount >= 0)
            .ok_or_else(|| anyhow!("payment amount {} out of range", request.amount))?;

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VERSION.to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.tmn_code.clone());
        params.insert("vnp_Locale".to_string(), "vn".to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert(TXN_REF.to_string(), request.txn_ref.to_string());
        params.insert("vnp_OrderInfo".to_string(), request.order_info.clone());
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert("vnp_Amount".to_string(), amount.to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), request.client_ip.to_string());
        params.insert(
            "vnp_CreateDate".to_string(),
            created.format("%Y%m%d%H%M%S").to_string(),
        );
        params.insert(
            "vnp_ExpireDate".to_string(),
            expires.format("%Y%m%d%H%M%S").to_string(),
        );
        if let Some(bank_code) = request.bank_code.filter(|code| !code.is_empty()) {
            params.insert("vnp_BankCode".to_string(), bank_code.to_string());
        }

        let signature = self.sign(&params);
        let mut url = self.endpoint.clone();
        url.set_query(Some(&self.canonical_query(&params)));
        url.query_pairs_mut().append_pair(SECURE_HASH, &signature);
        Ok(url.to_string())
    }

    /// Hex HMAC-SHA512 over the sorted, form-encoded parameters, excluding
    /// the hash fields themselves.
    pub fn sign(&self, params: &BTreeMap<String, String>) -> String {
        let payload = self.canonical_query(params);
        // HMAC accepts keys of any length.
        let mut mac = match HmacSha512::new_from_slice(self.hash_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn canonical_query(&self, params: &BTreeMap<String, String>) -> String {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.query_pairs_mut().extend_pairs(
            params
                .iter()
                .filter(|(key, _)| key.as_str() != SECURE_HASH && key.as_str() != SECURE_HASH_TYPE),
        );
        url.query().unwrap_or_default().to_string()
    }
}

impl SignatureVerifier for VnpayGateway {
    fn verify(&self, params: &BTreeMap<String, String>) -> bool {
        let Some(received) = params.get(SECURE_HASH) else {
            return false;
        };
        let expected = self.sign(params);
        let received = received.to_ascii_lowercase();
        !expected.is_empty() && expected.as_bytes().ct_eq(received.as_bytes()).into()
    }
}

/// Typed view of a verified return request.
#[derive(Debug, Clone)]
pub struct VnpayReturn {
    pub txn_ref: String,
    pub response_code: String,
    pub transaction_no: Option<String>,
    pub bank_code: Option<String>,
    /// Raw parameters, kept for the audit payload.
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReturnParseError {
    #[error("missing parameter {0}")]
    Missing(&'static str),
}

impl VnpayReturn {
    pub fn parse(params: BTreeMap<String, String>) -> Result<Self, ReturnParseError> {
        let txn_ref = non_empty(&params, TXN_REF).ok_or(ReturnParseError::Missing(TXN_REF))?;
        let response_code =
            non_empty(&params, RESPONSE_CODE).ok_or(ReturnParseError::Missing(RESPONSE_CODE))?;
        let transaction_no = non_empty(&params, "vnp_TransactionNo");
        let bank_code = non_empty(&params, "vnp_BankCode");
        Ok(Self {
            txn_ref,
            response_code,
            transaction_no,
            bank_code,
            params,
        })
    }

    pub fn is_success(&self) -> bool {
        self.response_code == SUCCESS_CODE
    }

    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or(serde_json::Value::Null)
    }
}

fn non_empty(params: &BTreeMap<String, String>, key: &str) -> Option<String> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(&VnpayConfig {
            tmn_code: "NERDTEST".into(),
            hash_secret: "secret-key".into(),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://localhost:3000/api/payment/vnpay/return".into(),
        })
        .expect("gateway")
    }

    fn signed(gateway: &VnpayGateway, pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let hash = gateway.sign(&params);
        params.insert(SECURE_HASH.into(), hash);
        params
    }

    #[test]
    fn verifies_own_signature_and_rejects_tampering() {
        let gateway = gateway();
        let mut params = signed(
            &gateway,
            &[
                (TXN_REF, "NERD-20250601-007-1748750000000"),
                (RESPONSE_CODE, "00"),
                ("vnp_Amount", "5500000"),
                ("vnp_OrderInfo", "Thanh toan booking NERD-20250601-007"),
            ],
        );
        assert!(gateway.verify(&params));

        params.insert("vnp_Amount".into(), "100".into());
        assert!(!gateway.verify(&params));
    }

    #[test]
    fn hash_type_and_case_are_ignored() {
        let gateway = gateway();
        let mut params = signed(&gateway, &[(TXN_REF, "abc"), (RESPONSE_CODE, "24")]);
        params.insert(SECURE_HASH_TYPE.into(), "HmacSHA512".into());
        let upper = params[SECURE_HASH].to_ascii_uppercase();
        params.insert(SECURE_HASH.into(), upper);
        assert!(gateway.verify(&params));
    }

    #[test]
    fn missing_hash_is_invalid() {
        let gateway = gateway();
        let params: BTreeMap<String, String> =
            [(TXN_REF.to_string(), "abc".to_string())].into_iter().collect();
        assert!(!gateway.verify(&params));
    }

    #[test]
    fn different_secret_does_not_verify() {
        let params = signed(&gateway(), &[(TXN_REF, "abc"), (RESPONSE_CODE, "00")]);
        let other = VnpayGateway::new(&VnpayConfig {
            tmn_code: "NERDTEST".into(),
            hash_secret: "another-secret".into(),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://localhost/return".into(),
        })
        .unwrap();
        assert!(!other.verify(&params));
    }

    #[test]
    fn payment_url_round_trips_through_verification() {
        let gateway = gateway();
        let url = gateway
            .payment_url(&PaymentRequest {
                txn_ref: "NERD-20250601-007-1",
                amount: 55_000,
                order_info: "Thanh toan booking NERD-20250601-007".into(),
                client_ip: "127.0.0.1",
                bank_code: None,
                created_at: Utc::now(),
            })
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        let params: BTreeMap<String, String> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(params["vnp_Amount"], "5500000");
        assert_eq!(params[TXN_REF], "NERD-20250601-007-1");
        assert!(!params.contains_key("vnp_BankCode"));
        assert!(gateway.verify(&params));
    }

    #[test]
    fn payment_url_rejects_unrepresentable_amounts() {
        let gateway = gateway();
        for amount in [i64::MAX, i64::MAX / 100 + 1, -55_000] {
            let result = gateway.payment_url(&PaymentRequest {
                txn_ref: "NERD-20250601-007-1",
                amount,
                order_info: "Thanh toan booking NERD-20250601-007".into(),
                client_ip: "127.0.0.1",
                bank_code: None,
                created_at: Utc::now(),
            });
            assert!(result.is_err(), "amount {amount} accepted");
        }
    }

    #[test]
    fn parse_requires_reference_and_code() {
        let params: BTreeMap<String, String> =
            [(RESPONSE_CODE.to_string(), "00".to_string())].into_iter().collect();
        assert_eq!(
            VnpayReturn::parse(params).unwrap_err(),
            ReturnParseError::Missing(TXN_REF)
        );

        let params: BTreeMap<String, String> = [
            (TXN_REF.to_string(), "ref".to_string()),
            (RESPONSE_CODE.to_string(), "00".to_string()),
        ]
        .into_iter()
        .collect();
        let parsed = VnpayReturn::parse(params).unwrap();
        assert!(parsed.is_success());
        assert_eq!(parsed.txn_ref, "ref");
    }
}
