use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 奖品目录实体
/// 概念说明:
/// - stock: 声明库存 (NULL 表示无限)
/// - emitted_total / last_emitted_at: 仅在发放奖券时更新的计数
/// - 剩余可发放数量 = stock - emitted_total
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "prizes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// 唯一键 (例如 "free_coffee")
    pub key: String,
    pub label: String,
    pub color: Option<String>,
    /// 声明库存 (NULL=无限)
    pub stock: Option<i64>,
    pub active: bool,
    pub emitted_total: i64,
    pub last_emitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// 剩余可发放数量，None 表示无限
    pub fn available_stock(&self) -> Option<i64> {
        self.stock.map(|s| s - self.emitted_total)
    }

    /// 是否可参与发放 (启用且仍有库存)
    pub fn is_issuable(&self) -> bool {
        self.active && self.available_stock().is_none_or(|left| left > 0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tokens::Entity")]
    Tokens,
}

impl Related<super::tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
