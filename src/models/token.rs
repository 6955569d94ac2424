use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::signing_service::InvalidReason;

/// 奖券所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenPhase {
    Pending,
    Revealed,
    Delivered,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RevealResponse {
    pub phase: TokenPhase,
    pub token_id: String,
    pub prize_id: String,
    pub revealed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct DeliverRequest {
    pub delivery_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryTimings {
    pub reveal_to_deliver_ms: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryTimestamps {
    pub revealed_at: DateTime<Utc>,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliverResponse {
    pub phase: TokenPhase,
    pub token_id: String,
    pub prize_id: String,
    pub timings: DeliveryTimings,
    pub timestamps: DeliveryTimestamps,
    pub is_static_batch: bool,
    /// 静态批次交付时自动完成兑换（仅用于客户端提示）
    pub auto_redeemed: bool,
}

/// 旧版单阶段兑换结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedeemResponse {
    pub token_id: String,
    pub prize_id: String,
    pub used_count: i32,
    pub max_uses: i32,
    pub remaining_uses: i32,
    pub redeemed_at: DateTime<Utc>,
    pub static_target_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct VerifyTokenRequest {
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerifyTokenResponse {
    pub token_id: String,
    pub valid: bool,
    pub reason: Option<InvalidReason>,
}
