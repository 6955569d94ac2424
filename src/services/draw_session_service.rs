use crate::entities::{
    DrawMode, DrawStatus, batch_entity as batches, draw_session_entity as draw_sessions,
    draw_spin_entity as draw_spins, prize_entity as prizes, token_entity as tokens,
};
use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::{
    CreateDrawSessionRequest, DrawElement, DrawMeta, DrawSessionCreatedResponse,
    DrawSessionResponse, SpinRecord, SpinResponse, TokenPhase,
};
use crate::services::redemption_service::claim_reveal;
use crate::utils::draw::{
    Candidate, build_composition, eligible_pool, pick_candidate, reserved_follow_ups, resolve_mode,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

/// 轮盘抽奖服务 (Roulette Engine)
/// 会话状态: ACTIVE -> FINISHED，不可取消，只会被抽完
#[derive(Clone)]
pub struct DrawSessionService {
    pool: DatabaseConnection,
}

impl DrawSessionService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 创建抽奖会话
    ///
    /// 逻辑:
    /// 1. 读取批次内所有奖券，排除已揭晓 / 已交付 / 禁用 / 过期 / 被再来一次券占用的
    /// 2. 决定模式（默认 BY_PRIZE，奖品数不满足时回退 BY_TOKEN）
    /// 3. 组成快照写入 meta，max_spins = 抽奖池奖券数
    /// 4. active_batch_id 唯一索引保证同一批次最多一个 ACTIVE 会话
    pub async fn create_session(
        &self,
        req: CreateDrawSessionRequest,
    ) -> AppResult<DrawSessionCreatedResponse> {
        let batch = batches::Entity::find_by_id(req.batch_id.clone())
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::not_found(
                    ErrorCode::BatchNotFound,
                    format!("Batch {} not found", req.batch_id),
                )
            })?;

        let now = Utc::now();
        let batch_tokens = tokens::Entity::find()
            .filter(tokens::Column::BatchId.eq(batch.id.clone()))
            .order_by_asc(tokens::Column::CreatedAt)
            .order_by_asc(tokens::Column::Id)
            .all(&self.pool)
            .await?;

        let pool = eligible_pool(&batch_tokens, now);
        if pool.is_empty() {
            return Err(AppError::bad_request(
                ErrorCode::NoTokens,
                format!("Batch {} has no tokens left to draw", batch.id),
            ));
        }

        let distinct_prizes = pool
            .iter()
            .map(|t| t.prize_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let mode = resolve_mode(req.mode, distinct_prizes, pool.len()).map_err(AppError::NotEligible)?;

        let composition = build_composition(&pool, mode);
        let prize_ids: Vec<String> = composition.iter().map(|e| e.prize_id.clone()).collect();
        let prize_map: HashMap<String, prizes::Model> = prizes::Entity::find()
            .filter(prizes::Column::Id.is_in(prize_ids))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let elements: Vec<DrawElement> = composition
            .into_iter()
            .map(|entry| {
                let prize = prize_map.get(&entry.prize_id);
                DrawElement {
                    label: prize.map_or_else(|| entry.prize_id.clone(), |p| p.label.clone()),
                    color: prize.and_then(|p| p.color.clone()),
                    prize_id: entry.prize_id,
                    token_id: entry.token_id,
                    weight: entry.weight,
                }
            })
            .collect();

        let mut reserved: Vec<String> = reserved_follow_ups(&batch_tokens, now).into_iter().collect();
        reserved.sort();
        let max_spins = pool.len() as i32;
        let meta = DrawMeta {
            mode,
            elements: elements.clone(),
            token_ids: pool.iter().map(|t| t.id.clone()).collect(),
            reserved_token_ids: reserved,
            snapshot_at: now,
        };

        let session = draw_sessions::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            batch_id: Set(batch.id.clone()),
            active_batch_id: Set(Some(batch.id.clone())),
            mode: Set(mode),
            status: Set(DrawStatus::Active),
            spins: Set(0),
            max_spins: Set(max_spins),
            meta: Set(serde_json::to_string(&meta)?),
            created_at: Set(now),
            finished_at: Set(None),
        }
        .insert(&self.pool)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::conflict(
                ErrorCode::AlreadyExists,
                format!("Batch {} already has an active draw session", batch.id),
            ),
            _ => AppError::from(e),
        })?;

        log::info!(
            "Draw session {} created for batch {} ({mode}, {max_spins} spins)",
            session.id,
            batch.id
        );

        Ok(DrawSessionCreatedResponse {
            session_id: session.id,
            batch_id: batch.id,
            elements,
            mode,
            max_spins,
        })
    }

    /// 抽取一次
    ///
    /// 同一事务内:
    /// 1. 从快照中仍未揭晓的奖券里按权重选择候选
    /// 2. 条件更新 "where revealed_at is null" 抢占该奖券；0 行表示被并发请求抢先，换一个候选重试
    /// 3. 条件自增 spins (spins < max_spins)，得到本次 order
    /// 4. spins == max_spins 时在同一事务内置为 FINISHED
    /// 5. 写入抽取记录
    pub async fn spin(&self, session_id: &str) -> AppResult<SpinResponse> {
        let txn = self.pool.begin().await?;

        let session = draw_sessions::Entity::find_by_id(session_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| session_not_found(session_id))?;
        if session.is_finished() {
            return Err(finished(session_id));
        }

        let meta: DrawMeta = serde_json::from_str(&session.meta)?;
        let now = Utc::now();
        let mut remaining = load_candidates(&txn, meta.token_ids, now).await?;
        let mut rng = StdRng::from_entropy();
        let Some((claimed, weight)) =
            claim_next(&txn, &mut remaining, session.mode, now, &mut rng).await?
        else {
            return Err(finished(session_id));
        };

        let Some((order, is_last)) = record_spin(&txn, session_id, &claimed, weight, now).await?
        else {
            // 事务回滚，已抢占的奖券随之释放
            return Err(finished(session_id));
        };

        txn.commit().await?;

        log::info!(
            "Spin #{order} on session {session_id}: token {} prize {}",
            claimed.token_id,
            claimed.prize_id
        );
        if is_last {
            log::info!("Draw session {session_id} finished");
        }

        Ok(SpinResponse {
            phase: TokenPhase::Revealed,
            session_id: session_id.to_string(),
            token_id: claimed.token_id,
            prize_id: claimed.prize_id,
            order,
            weight_snapshot: weight,
            finished: is_last,
        })
    }

    /// 会话详情与按 order 排序的抽取记录
    pub async fn get_session(&self, session_id: &str) -> AppResult<DrawSessionResponse> {
        let session = draw_sessions::Entity::find_by_id(session_id.to_string())
            .one(&self.pool)
            .await?
            .ok_or_else(|| session_not_found(session_id))?;
        let meta: DrawMeta = serde_json::from_str(&session.meta)?;

        let spins = draw_spins::Entity::find()
            .filter(draw_spins::Column::SessionId.eq(session_id))
            .order_by_asc(draw_spins::Column::SpinOrder)
            .all(&self.pool)
            .await?;

        Ok(DrawSessionResponse {
            finished: session.is_finished(),
            session_id: session.id,
            batch_id: session.batch_id,
            mode: session.mode,
            status: session.status,
            max_spins: session.max_spins,
            elements: meta.elements,
            spins: spins.into_iter().map(SpinRecord::from).collect(),
        })
    }
}

/// 快照中仍可抽取的奖券
async fn load_candidates<C: ConnectionTrait>(
    db: &C,
    token_ids: Vec<String>,
    now: DateTime<Utc>,
) -> Result<Vec<Candidate>, DbErr> {
    Ok(tokens::Entity::find()
        .filter(tokens::Column::Id.is_in(token_ids))
        .filter(tokens::Column::RevealedAt.is_null())
        .filter(tokens::Column::DeliveredAt.is_null())
        .filter(tokens::Column::RedeemedAt.is_null())
        .filter(tokens::Column::Disabled.eq(false))
        .order_by_asc(tokens::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter(|t| !t.is_expired(now) && t.is_within_window(now))
        .map(|t| Candidate {
            token_id: t.id,
            prize_id: t.prize_id,
        })
        .collect())
}

/// 按权重选择候选并抢占；被并发请求抢先的候选从列表移除后重选。
/// 候选耗尽时返回 None
async fn claim_next<C: ConnectionTrait, R: Rng + Send>(
    db: &C,
    remaining: &mut Vec<Candidate>,
    mode: DrawMode,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<Option<(Candidate, i32)>, DbErr> {
    while let Some(pick) = pick_candidate(remaining, mode, rng) {
        let candidate = remaining.swap_remove(pick.index);
        if claim_reveal(db, &candidate.token_id, &candidate.prize_id, now).await? {
            return Ok(Some((candidate, pick.weight)));
        }
        log::debug!("Lost claim race for token {}", candidate.token_id);
    }
    Ok(None)
}

/// 条件自增 spins 并写入抽取记录，返回 (order, 是否最后一次)。
/// 会话已结束或已抽满时返回 None
async fn record_spin<C: ConnectionTrait>(
    db: &C,
    session_id: &str,
    claimed: &Candidate,
    weight: i32,
    now: DateTime<Utc>,
) -> AppResult<Option<(i32, bool)>> {
    let bumped = draw_sessions::Entity::update_many()
        .col_expr(
            draw_sessions::Column::Spins,
            Expr::col(draw_sessions::Column::Spins).add(1),
        )
        .filter(draw_sessions::Column::Id.eq(session_id))
        .filter(draw_sessions::Column::Status.eq(DrawStatus::Active))
        .filter(
            Expr::col(draw_sessions::Column::Spins).lt(Expr::col(draw_sessions::Column::MaxSpins)),
        )
        .exec(db)
        .await?;
    if bumped.rows_affected == 0 {
        return Ok(None);
    }

    let session = draw_sessions::Entity::find_by_id(session_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;
    let order = session.spins;
    let is_last = order >= session.max_spins;
    if is_last {
        let mut am = session.into_active_model();
        am.status = Set(DrawStatus::Finished);
        am.active_batch_id = Set(None);
        am.finished_at = Set(Some(now));
        am.update(db).await?;
    }

    draw_spins::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        session_id: Set(session_id.to_string()),
        prize_id: Set(claimed.prize_id.clone()),
        token_id: Set(Some(claimed.token_id.clone())),
        weight_snapshot: Set(weight),
        spin_order: Set(order),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    Ok(Some((order, is_last)))
}

fn session_not_found(session_id: &str) -> AppError {
    AppError::not_found(
        ErrorCode::SessionNotFound,
        format!("Draw session {session_id} not found"),
    )
}

fn finished(session_id: &str) -> AppError {
    AppError::conflict(
        ErrorCode::Finished,
        format!("Draw session {session_id} is finished"),
    )
}
