use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrawMode {
    #[sea_orm(string_value = "BY_PRIZE")]
    ByPrize,
    #[sea_orm(string_value = "BY_TOKEN")]
    ByToken,
}

impl std::fmt::Display for DrawMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawMode::ByPrize => write!(f, "BY_PRIZE"),
            DrawMode::ByToken => write!(f, "BY_TOKEN"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrawStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "FINISHED")]
    Finished,
}

impl std::fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawStatus::Active => write!(f, "ACTIVE"),
            DrawStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

/// 轮盘抽奖会话
/// - spins <= max_spins；status = FINISHED 当且仅当 spins == max_spins
/// - meta: 创建时的组成快照 (JSON 文本)，创建后不再从实时数据重新推导
/// - active_batch_id: ACTIVE 时等于 batch_id，结束后为 NULL（唯一索引约束）
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "draw_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub batch_id: String,
    pub active_batch_id: Option<String>,
    pub mode: DrawMode,
    pub status: DrawStatus,
    pub spins: i32,
    pub max_spins: i32,
    #[sea_orm(column_type = "Text")]
    pub meta: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_finished(&self) -> bool {
        self.status == DrawStatus::Finished
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::batches::Entity",
        from = "Column::BatchId",
        to = "super::batches::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Batch,
    #[sea_orm(has_many = "super::draw_spins::Entity")]
    Spins,
}

impl Related<super::batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl Related<super::draw_spins::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Spins.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
