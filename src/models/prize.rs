use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::prize_entity;

/// 创建奖品请求
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreatePrizeRequest {
    /// 唯一键，仅允许小写字母、数字、下划线与短横线
    pub key: String,
    pub label: String,
    pub color: Option<String>,
    /// 声明库存 (不填 = 无限)
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SetPrizeActiveRequest {
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PrizeQuery {
    /// 仅返回启用的奖品 (默认 false)
    pub active_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrizeResponse {
    pub id: String,
    pub key: String,
    pub label: String,
    pub color: Option<String>,
    pub stock: Option<i64>,
    /// 剩余可发放数量 (None = 无限)
    pub available_stock: Option<i64>,
    pub active: bool,
    pub emitted_total: i64,
    pub last_emitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<prize_entity::Model> for PrizeResponse {
    fn from(m: prize_entity::Model) -> Self {
        PrizeResponse {
            available_stock: m.available_stock(),
            id: m.id,
            key: m.key,
            label: m.label,
            color: m.color,
            stock: m.stock,
            active: m.active,
            emitted_total: m.emitted_total,
            last_emitted_at: m.last_emitted_at,
            created_at: m.created_at,
        }
    }
}
