use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 奖券类型（按类型固定结构，存为 JSON 列）
/// - Prize: 普通奖品券，参与轮盘抽取
/// - Retry: "再来一次" 券，指向一张后续奖券；
///   该券未被抽出前，后续奖券不进入抽奖池
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema, Default,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenKind {
    #[default]
    Prize,
    Retry { follow_up_token_id: String },
}

impl TokenKind {
    pub fn follow_up_token_id(&self) -> Option<&str> {
        match self {
            TokenKind::Prize => None,
            TokenKind::Retry { follow_up_token_id } => Some(follow_up_token_id.as_str()),
        }
    }
}

/// 奖券实体
/// 不变量:
/// - used_count <= max_uses
/// - delivered_at 非空 => revealed_at 非空
/// - redeemed_at 为旧版字段，与 delivered_at 同时写入（可复用券直接兑换时单独写入）
/// - disabled 的奖券不会进入 revealed / delivered
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub prize_id: String,
    pub batch_id: String,
    #[sea_orm(column_type = "Json")]
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub signature: String,
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

impl Model {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// 是否处于有效时间窗 [start_time, end_time) 内
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_time.is_none_or(|start| now >= start)
            && self.end_time.is_none_or(|end| now < end)
    }

    pub fn is_reusable(&self) -> bool {
        self.max_uses > 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.max_uses
    }

    /// 已兑换或已交付（不再参与抽取）
    pub fn is_settled(&self) -> bool {
        self.redeemed_at.is_some() || self.delivered_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::prizes::Entity",
        from = "Column::PrizeId",
        to = "super::prizes::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Prize,
    #[sea_orm(
        belongs_to = "super::batches::Entity",
        from = "Column::BatchId",
        to = "super::batches::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Batch,
}

impl Related<super::prizes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prize.def()
    }
}

impl Related<super::batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
