use crate::entities::prize_entity as prizes;
use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::{CreatePrizeRequest, PrizeQuery, PrizeResponse};
use chrono::Utc;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use std::sync::OnceLock;

fn prize_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9_-]{1,64}$").expect("valid prize key regex"))
}

/// 奖品目录
#[derive(Clone)]
pub struct PrizeService {
    pool: DatabaseConnection,
}

impl PrizeService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn create_prize(&self, req: CreatePrizeRequest) -> AppResult<PrizeResponse> {
        let key = req.key.trim().to_string();
        if !prize_key_regex().is_match(&key) {
            return Err(AppError::ValidationError(
                "Prize key must match [a-z0-9_-]{1,64}".into(),
            ));
        }
        let label = req.label.trim().to_string();
        if label.is_empty() || label.len() > 255 {
            return Err(AppError::ValidationError(
                "Prize label must be 1-255 characters".into(),
            ));
        }
        if let Some(stock) = req.stock
            && stock < 0
        {
            return Err(AppError::ValidationError(
                "Prize stock must not be negative".into(),
            ));
        }

        let now = Utc::now();
        let inserted = prizes::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            key: Set(key.clone()),
            label: Set(label),
            color: Set(req.color),
            stock: Set(req.stock),
            active: Set(true),
            emitted_total: Set(0),
            last_emitted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.pool)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::conflict(
                ErrorCode::DuplicatePrizeKey,
                format!("Prize key '{key}' already exists"),
            ),
            _ => AppError::from(e),
        })?;

        log::info!("Prize created: {} ({})", inserted.key, inserted.id);
        Ok(inserted.into())
    }

    pub async fn list_prizes(&self, query: &PrizeQuery) -> AppResult<Vec<PrizeResponse>> {
        let mut select = prizes::Entity::find();
        if query.active_only.unwrap_or(false) {
            select = select.filter(prizes::Column::Active.eq(true));
        }
        let list = select
            .order_by_asc(prizes::Column::CreatedAt)
            .order_by_asc(prizes::Column::Key)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    pub async fn set_active(&self, prize_id: &str, active: bool) -> AppResult<PrizeResponse> {
        let prize = prizes::Entity::find_by_id(prize_id.to_string())
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::not_found(ErrorCode::PrizeNotFound, format!("Prize {prize_id} not found"))
            })?;

        let mut am = prize.into_active_model();
        am.active = Set(active);
        am.updated_at = Set(Utc::now());
        let updated = am.update(&self.pool).await?;
        Ok(updated.into())
    }
}
