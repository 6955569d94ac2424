use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{TokenKind, batch_entity, token_entity};

/// 单个奖品的发放数量
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IssuePrizeRequest {
    pub prize_id: String,
    /// 发放数量；不填则发放全部剩余库存（无限库存奖品必须填写）
    pub count: Option<u32>,
    /// 若填写，则本奖品的每张券都是 "再来一次" 券，
    /// 并为每张券额外发放一张该奖品的后续奖券
    pub follow_up_prize_id: Option<String>,
}

/// 发放奖券请求
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IssueTokensRequest {
    /// 追加到已有批次；不填则新建批次。
    /// 追加时不可再填写 description / static_target_url / is_reusable
    pub batch_id: Option<String>,
    pub description: Option<String>,
    pub static_target_url: Option<String>,
    pub is_reusable: Option<bool>,
    /// 过期时间；与 ttl_days 二选一，都不填使用默认有效天数
    pub expires_at: Option<DateTime<Utc>>,
    pub ttl_days: Option<i64>,
    /// 每张券可使用次数 (默认 1)
    pub max_uses: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub prizes: Vec<IssuePrizeRequest>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedToken {
    pub id: String,
    pub prize_id: String,
    pub kind: TokenKind,
    pub signature: String,
    pub signature_version: i32,
    pub expires_at: DateTime<Utc>,
}

impl From<&token_entity::Model> for IssuedToken {
    fn from(m: &token_entity::Model) -> Self {
        IssuedToken {
            id: m.id.clone(),
            prize_id: m.prize_id.clone(),
            kind: m.kind.clone(),
            signature: m.signature.clone(),
            signature_version: m.signature_version,
            expires_at: m.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedPrizeSummary {
    pub prize_id: String,
    pub key: String,
    pub issued: i64,
    pub emitted_total: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssueTokensResponse {
    pub batch_id: String,
    pub total_issued: i64,
    pub prizes: Vec<IssuedPrizeSummary>,
    /// 被跳过的奖品（未启用或无库存）
    pub skipped_prize_ids: Vec<String>,
    pub tokens: Vec<IssuedToken>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResponse {
    pub id: String,
    pub description: Option<String>,
    pub static_target_url: Option<String>,
    pub is_static: bool,
    pub is_reusable: bool,
    pub token_count: i64,
    pub created_at: DateTime<Utc>,
}

impl BatchResponse {
    pub fn new(m: batch_entity::Model, token_count: i64) -> Self {
        BatchResponse {
            is_static: m.is_static(),
            id: m.id,
            description: m.description,
            static_target_url: m.static_target_url,
            is_reusable: m.is_reusable,
            token_count,
            created_at: m.created_at,
        }
    }
}

/// 批次奖券分页查询参数
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BatchTokenQuery {
    /// 页码 (默认 1)
    pub page: Option<u32>,
    /// 每页数量 (默认 20)
    pub per_page: Option<u32>,
}

/// 奖券详情（管理端）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    pub id: String,
    pub prize_id: String,
    pub batch_id: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub signature_version: i32,
    pub disabled: bool,
    pub max_uses: i32,
    pub used_count: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub revealed_at: Option<DateTime<Utc>>,
    pub assigned_prize_id: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub delivered_by_user_id: Option<String>,
    pub delivery_note: Option<String>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<token_entity::Model> for TokenResponse {
    fn from(m: token_entity::Model) -> Self {
        TokenResponse {
            id: m.id,
            prize_id: m.prize_id,
            batch_id: m.batch_id,
            kind: m.kind,
            expires_at: m.expires_at,
            signature_version: m.signature_version,
            disabled: m.disabled,
            max_uses: m.max_uses,
            used_count: m.used_count,
            start_time: m.start_time,
            end_time: m.end_time,
            revealed_at: m.revealed_at,
            assigned_prize_id: m.assigned_prize_id,
            delivered_at: m.delivered_at,
            delivered_by_user_id: m.delivered_by_user_id,
            delivery_note: m.delivery_note,
            redeemed_at: m.redeemed_at,
            created_at: m.created_at,
        }
    }
}
