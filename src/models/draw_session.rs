use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::TokenPhase;
use crate::entities::{DrawMode, DrawStatus, draw_spin_entity};

/// 创建抽奖会话请求
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateDrawSessionRequest {
    pub batch_id: String,
    /// 不填默认 BY_PRIZE，奖品数不满足时自动回退 BY_TOKEN
    pub mode: Option<DrawMode>,
}

/// 轮盘上的一个扇区
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct DrawElement {
    pub prize_id: String,
    /// BY_TOKEN 模式下对应的奖券
    pub token_id: Option<String>,
    pub label: String,
    pub color: Option<String>,
    pub weight: i32,
}

/// 会话创建时的组成快照，序列化后存入 draw_sessions.meta
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DrawMeta {
    pub mode: DrawMode,
    pub elements: Vec<DrawElement>,
    /// 参与本会话的奖券
    pub token_ids: Vec<String>,
    /// 创建时被 "再来一次" 券占用而排除的奖券
    pub reserved_token_ids: Vec<String>,
    pub snapshot_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DrawSessionCreatedResponse {
    pub session_id: String,
    pub batch_id: String,
    pub elements: Vec<DrawElement>,
    pub mode: DrawMode,
    pub max_spins: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpinResponse {
    pub phase: TokenPhase,
    pub session_id: String,
    pub token_id: String,
    pub prize_id: String,
    pub order: i32,
    pub weight_snapshot: i32,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpinRecord {
    pub order: i32,
    pub prize_id: String,
    pub token_id: Option<String>,
    pub weight_snapshot: i32,
    pub created_at: DateTime<Utc>,
}

impl From<draw_spin_entity::Model> for SpinRecord {
    fn from(m: draw_spin_entity::Model) -> Self {
        SpinRecord {
            order: m.spin_order,
            prize_id: m.prize_id,
            token_id: m.token_id,
            weight_snapshot: m.weight_snapshot,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DrawSessionResponse {
    pub session_id: String,
    pub batch_id: String,
    pub mode: DrawMode,
    pub status: DrawStatus,
    pub finished: bool,
    pub max_spins: i32,
    pub elements: Vec<DrawElement>,
    /// 按 order 升序
    pub spins: Vec<SpinRecord>,
}
