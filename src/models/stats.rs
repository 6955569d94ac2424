use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// 计数与百分比（百分比保留两位小数，分母为 total）
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct StatsCounts {
    pub total: i64,
    pub redeemed: i64,
    pub delivered: i64,
    pub revealed: i64,
    /// revealed - delivered
    pub revealed_pending: i64,
    pub expired: i64,
    pub active: i64,
    pub disabled: i64,
    pub redeemed_pct: f64,
    pub delivered_pct: f64,
    pub revealed_pct: f64,
    pub expired_pct: f64,
    pub active_pct: f64,
}

/// 揭晓到交付的耗时
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct LeadTimeStats {
    pub samples: i64,
    pub mean_ms: Option<f64>,
    /// 最近秩法：升序排序后取下标 floor(0.95 * (n - 1))
    pub p95_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PrizeStats {
    pub prize_id: String,
    pub key: Option<String>,
    pub label: Option<String>,
    pub counts: StatsCounts,
    pub lead_time: LeadTimeStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BatchStatsSummary {
    pub batch_id: String,
    pub generated_at: DateTime<Utc>,
    pub counts: StatsCounts,
    pub lead_time: LeadTimeStats,
    pub prizes: Vec<PrizeStats>,
}
