use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 奖券批次
/// static_target_url 非空即 "静态批次"：交付时自动完成兑换，无需轮盘抽取
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub description: Option<String>,
    pub static_target_url: Option<String>,
    pub is_reusable: bool,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_static(&self) -> bool {
        self.static_target_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tokens::Entity")]
    Tokens,
    #[sea_orm(has_many = "super::draw_sessions::Entity")]
    DrawSessions,
}

impl Related<super::tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tokens.def()
    }
}

impl Related<super::draw_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DrawSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
