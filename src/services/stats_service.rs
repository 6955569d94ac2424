use crate::entities::{batch_entity as batches, prize_entity as prizes, token_entity as tokens};
use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::BatchStatsSummary;
use crate::utils::stats::summarize;
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// 统计汇总：每次从账本实时重新计算，不落库
#[derive(Clone)]
pub struct StatsService {
    pool: DatabaseConnection,
}

impl StatsService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn batch_stats(&self, batch_id: &str) -> AppResult<BatchStatsSummary> {
        batches::Entity::find_by_id(batch_id.to_string())
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::not_found(ErrorCode::BatchNotFound, format!("Batch {batch_id} not found"))
            })?;

        let batch_tokens = tokens::Entity::find()
            .filter(tokens::Column::BatchId.eq(batch_id))
            .all(&self.pool)
            .await?;

        let mut prize_ids: Vec<String> = batch_tokens.iter().map(|t| t.prize_id.clone()).collect();
        prize_ids.sort();
        prize_ids.dedup();
        let prize_list = prizes::Entity::find()
            .filter(prizes::Column::Id.is_in(prize_ids))
            .all(&self.pool)
            .await?;

        Ok(summarize(batch_id, &batch_tokens, &prize_list, Utc::now()))
    }
}
