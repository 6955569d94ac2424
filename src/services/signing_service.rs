use crate::entities::token_entity as tokens;
use crate::error::{AppError, AppResult, ErrorCode};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

const FIELD_DELIMITER: char = '|';
const MAX_FIELD_LEN: usize = 128;

/// 参与签名的奖券字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningPayload {
    pub token_id: String,
    pub prize_id: String,
    pub batch_id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&tokens::Model> for SigningPayload {
    fn from(t: &tokens::Model) -> Self {
        SigningPayload {
            token_id: t.id.clone(),
            prize_id: t.prize_id.clone(),
            batch_id: t.batch_id.clone(),
            expires_at: t.expires_at,
        }
    }
}

impl SigningPayload {
    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("token_id", &self.token_id),
            ("prize_id", &self.prize_id),
            ("batch_id", &self.batch_id),
        ] {
            if value.is_empty() {
                return Err(format!("{name} must not be empty"));
            }
            if value.len() > MAX_FIELD_LEN {
                return Err(format!("{name} is too long"));
            }
            if value.contains(FIELD_DELIMITER) || value.chars().any(char::is_control) {
                return Err(format!("{name} contains reserved characters"));
            }
        }
        Ok(())
    }

    /// 带版本前缀、分隔符拼接的规范化表示
    fn canonical(&self, version: i32) -> String {
        format!(
            "v{version}|{}|{}|{}|{}",
            self.token_id,
            self.prize_id,
            self.batch_id,
            self.expires_at.timestamp()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    Mismatch,
    MalformedSignature,
    MalformedPayload,
    UnsupportedVersion,
}

/// 验签结果（不抛错）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid,
    Invalid(InvalidReason),
}

impl VerifyOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid)
    }
}

/// 签名服务：HMAC-SHA256，按 signature_version 选择密钥，
/// 新旧签名方案可以并存
#[derive(Clone)]
pub struct SigningService {
    current_version: i32,
    keys: Arc<HashMap<i32, Vec<u8>>>,
}

impl SigningService {
    pub fn new(secret: &str, version: i32) -> Self {
        let mut keys = HashMap::new();
        keys.insert(version, secret.as_bytes().to_vec());
        Self {
            current_version: version,
            keys: Arc::new(keys),
        }
    }

    /// 注册历史版本密钥，仅用于验签
    pub fn with_legacy_key(mut self, version: i32, secret: &str) -> Self {
        let mut keys = (*self.keys).clone();
        keys.entry(version)
            .or_insert_with(|| secret.as_bytes().to_vec());
        self.keys = Arc::new(keys);
        self
    }

    pub fn current_version(&self) -> i32 {
        self.current_version
    }

    /// 用当前版本签名，返回十六进制签名
    pub fn sign(&self, payload: &SigningPayload) -> AppResult<String> {
        payload
            .validate()
            .map_err(|msg| AppError::bad_request(ErrorCode::MalformedPayload, msg))?;
        let mac = self
            .mac_for(self.current_version, payload)
            .ok_or_else(|| AppError::ConfigError("Missing signing key".into()))?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 常量时间比较；任何失败都以 Invalid 返回
    pub fn verify(&self, payload: &SigningPayload, signature: &str, version: i32) -> VerifyOutcome {
        if payload.validate().is_err() {
            return VerifyOutcome::Invalid(InvalidReason::MalformedPayload);
        }
        let Ok(sig_bytes) = hex::decode(signature) else {
            return VerifyOutcome::Invalid(InvalidReason::MalformedSignature);
        };
        let Some(mac) = self.mac_for(version, payload) else {
            return VerifyOutcome::Invalid(InvalidReason::UnsupportedVersion);
        };
        match mac.verify_slice(&sig_bytes) {
            Ok(()) => VerifyOutcome::Valid,
            Err(_) => VerifyOutcome::Invalid(InvalidReason::Mismatch),
        }
    }

    /// 验证数据库中的奖券记录
    pub fn verify_token(&self, token: &tokens::Model, signature: &str) -> VerifyOutcome {
        self.verify(
            &SigningPayload::from(token),
            signature,
            token.signature_version,
        )
    }

    fn mac_for(&self, version: i32, payload: &SigningPayload) -> Option<HmacSha256> {
        let key = self.keys.get(&version)?;
        let mut mac = HmacSha256::new_from_slice(key).ok()?;
        mac.update(payload.canonical(version).as_bytes());
        Some(mac)
    }
}
