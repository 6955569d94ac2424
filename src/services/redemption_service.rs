use crate::entities::{batch_entity as batches, draw_session_entity as draw_sessions, token_entity as tokens};
use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::{
    DeliverRequest, DeliverResponse, DeliveryTimestamps, DeliveryTimings, RedeemResponse,
    RevealResponse, TokenPhase,
};
use crate::utils::flags::FlagSource;
use crate::utils::jwt::Actor;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter,
};
use std::sync::Arc;

const MAX_DELIVERY_NOTE_LEN: usize = 500;

/// 条件揭晓：仅当奖券仍未揭晓、未交付/兑换、未禁用时写入 revealed_at。
/// 返回是否抢到该奖券（false 表示被并发请求抢先）。
/// 抽奖 spin 与直接揭晓共用，可在事务内调用。
pub(crate) async fn claim_reveal<C: ConnectionTrait>(
    db: &C,
    token_id: &str,
    prize_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let result = tokens::Entity::update_many()
        .col_expr(tokens::Column::RevealedAt, Expr::value(Some(now)))
        .col_expr(
            tokens::Column::AssignedPrizeId,
            Expr::value(Some(prize_id.to_string())),
        )
        .filter(tokens::Column::Id.eq(token_id))
        .filter(tokens::Column::RevealedAt.is_null())
        .filter(tokens::Column::DeliveredAt.is_null())
        .filter(tokens::Column::RedeemedAt.is_null())
        .filter(tokens::Column::Disabled.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// 奖券状态机：PENDING -> REVEALED -> DELIVERED
/// 禁用 / 过期为每次状态转换时检查的守卫条件，不单独存储
#[derive(Clone)]
pub struct RedemptionService {
    pool: DatabaseConnection,
    flags: Arc<dyn FlagSource>,
}

impl RedemptionService {
    pub fn new(pool: DatabaseConnection, flags: Arc<dyn FlagSource>) -> Self {
        Self { pool, flags }
    }

    /// 直接揭晓（不经过轮盘的奖券）
    pub async fn reveal(&self, token_id: &str) -> AppResult<RevealResponse> {
        if !self.flags.two_phase_enabled() {
            return Err(AppError::bad_request(
                ErrorCode::TwoPhaseDisabled,
                "Two-phase redemption is disabled",
            ));
        }

        let token = self.find_token(token_id).await?;
        let now = Utc::now();
        if token.disabled {
            return Err(disabled(token_id));
        }
        if token.is_settled() {
            return Err(already_delivered(token_id));
        }
        if token.revealed_at.is_some() {
            return Err(AppError::conflict(
                ErrorCode::AlreadyRevealed,
                format!("Token {token_id} is already revealed"),
            ));
        }
        check_window(&token, now)?;

        self.ensure_no_active_draw(&token.batch_id).await?;

        if !claim_reveal(&self.pool, token_id, &token.prize_id, now).await? {
            log::debug!("Lost reveal race for token {token_id}");
            let current = self.find_token(token_id).await?;
            return Err(classify_conflict(&current, now));
        }

        log::info!("Token {token_id} revealed directly");
        Ok(RevealResponse {
            phase: TokenPhase::Revealed,
            token_id: token.id,
            prize_id: token.prize_id,
            revealed_at: now,
        })
    }

    /// 确认交付（REVEALED -> DELIVERED）
    ///
    /// 逻辑:
    /// 1. 两阶段开关与调用方权限（staff/admin，或开启自助交付）
    /// 2. 守卫条件：禁用、已交付、未揭晓、过期
    /// 3. 条件更新 "where delivered_at is null"；0 行即并发交付失败，返回 ALREADY_DELIVERED
    /// 4. 同一次写入同时写 redeemed_at（旧版兼容字段）
    pub async fn deliver(
        &self,
        token_id: &str,
        actor: Option<&Actor>,
        req: DeliverRequest,
    ) -> AppResult<DeliverResponse> {
        if !self.flags.two_phase_enabled() {
            return Err(AppError::bad_request(
                ErrorCode::TwoPhaseDisabled,
                "Two-phase redemption is disabled",
            ));
        }

        let self_deliver = self.flags.self_deliver_enabled();
        let delivered_by = match actor {
            Some(a) if a.role.can_deliver() || self_deliver => Some(a.user_id.clone()),
            Some(_) => return Err(AppError::Forbidden),
            None if self_deliver => None,
            None => {
                return Err(AppError::AuthError(
                    "Authentication required to confirm delivery".into(),
                ));
            }
        };

        let note = req
            .delivery_note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if note
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_DELIVERY_NOTE_LEN)
        {
            return Err(AppError::ValidationError(format!(
                "Delivery note must be at most {MAX_DELIVERY_NOTE_LEN} characters"
            )));
        }

        let token = self.find_token(token_id).await?;
        let now = Utc::now();
        if token.disabled {
            return Err(disabled(token_id));
        }
        if token.delivered_at.is_some() {
            return Err(already_delivered(token_id));
        }
        let Some(revealed_at) = token.revealed_at else {
            return Err(not_revealed(token_id));
        };
        if token.is_expired(now) {
            return Err(expired(token_id));
        }

        let batch = batches::Entity::find_by_id(token.batch_id.clone())
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::not_found(
                    ErrorCode::BatchNotFound,
                    format!("Batch {} not found", token.batch_id),
                )
            })?;

        let result = tokens::Entity::update_many()
            .col_expr(tokens::Column::DeliveredAt, Expr::value(Some(now)))
            .col_expr(tokens::Column::DeliveredByUserId, Expr::value(delivered_by.clone()))
            .col_expr(tokens::Column::DeliveryNote, Expr::value(note))
            .col_expr(tokens::Column::RedeemedAt, Expr::value(Some(now)))
            .filter(tokens::Column::Id.eq(token_id))
            .filter(tokens::Column::DeliveredAt.is_null())
            .filter(tokens::Column::RevealedAt.is_not_null())
            .filter(tokens::Column::Disabled.eq(false))
            .exec(&self.pool)
            .await?;

        if result.rows_affected == 0 {
            log::debug!("Lost delivery race for token {token_id}");
            let current = self.find_token(token_id).await?;
            return Err(classify_conflict(&current, now));
        }

        let is_static_batch = batch.is_static();
        log::info!(
            "Token {token_id} delivered by {} (static batch: {is_static_batch})",
            delivered_by.as_deref().unwrap_or("self-service")
        );

        Ok(DeliverResponse {
            phase: TokenPhase::Delivered,
            prize_id: token.assigned_prize_id.unwrap_or(token.prize_id),
            token_id: token.id,
            timings: DeliveryTimings {
                reveal_to_deliver_ms: (now - revealed_at).num_milliseconds().max(0),
            },
            timestamps: DeliveryTimestamps {
                revealed_at,
                delivered_at: now,
            },
            is_static_batch,
            auto_redeemed: is_static_batch,
        })
    }

    /// 旧版单阶段兑换
    /// - 可复用券 (max_uses > 1)：used_count + 1，条件 used_count < max_uses
    /// - 单次券：一次写入 revealed_at / delivered_at / redeemed_at；
    ///   两阶段开启时仅静态批次允许
    pub async fn redeem(&self, token_id: &str) -> AppResult<RedeemResponse> {
        let token = self.find_token(token_id).await?;
        let now = Utc::now();
        if token.disabled {
            return Err(disabled(token_id));
        }
        if token.is_expired(now) {
            return Err(expired(token_id));
        }
        check_window(&token, now)?;

        let batch = batches::Entity::find_by_id(token.batch_id.clone())
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::not_found(
                    ErrorCode::BatchNotFound,
                    format!("Batch {} not found", token.batch_id),
                )
            })?;

        let mut update = tokens::Entity::update_many()
            .col_expr(
                tokens::Column::UsedCount,
                Expr::col(tokens::Column::UsedCount).add(1),
            )
            .col_expr(tokens::Column::RedeemedAt, Expr::value(Some(now)))
            .filter(tokens::Column::Id.eq(token_id))
            .filter(tokens::Column::Disabled.eq(false))
            .filter(Expr::col(tokens::Column::UsedCount).lt(Expr::col(tokens::Column::MaxUses)));

        if token.is_reusable() {
            if token.is_exhausted() {
                return Err(exhausted(token_id));
            }
        } else {
            if self.flags.two_phase_enabled() && !batch.is_static() {
                return Err(AppError::conflict(
                    ErrorCode::TwoPhaseRequired,
                    format!("Token {token_id} must be revealed and delivered"),
                ));
            }
            if token.is_settled() {
                return Err(already_delivered(token_id));
            }
            self.ensure_no_active_draw(&token.batch_id).await?;
            let revealed_at: SimpleExpr = Func::coalesce([
                Expr::col(tokens::Column::RevealedAt).into(),
                Expr::value(Some(now)),
            ])
            .into();
            let assigned: SimpleExpr = Func::coalesce([
                Expr::col(tokens::Column::AssignedPrizeId).into(),
                Expr::col(tokens::Column::PrizeId).into(),
            ])
            .into();
            update = update
                .col_expr(tokens::Column::RevealedAt, revealed_at)
                .col_expr(tokens::Column::AssignedPrizeId, assigned)
                .col_expr(tokens::Column::DeliveredAt, Expr::value(Some(now)))
                .filter(tokens::Column::DeliveredAt.is_null())
                .filter(tokens::Column::RedeemedAt.is_null());
        }

        let result = update.exec(&self.pool).await?;
        if result.rows_affected == 0 {
            log::debug!("Lost redeem race for token {token_id}");
            let current = self.find_token(token_id).await?;
            return Err(if current.is_reusable() {
                exhausted(token_id)
            } else {
                classify_conflict(&current, now)
            });
        }

        let updated = self.find_token(token_id).await?;
        log::info!(
            "Token {token_id} redeemed ({}/{})",
            updated.used_count,
            updated.max_uses
        );

        Ok(RedeemResponse {
            token_id: updated.id,
            prize_id: updated.assigned_prize_id.unwrap_or(updated.prize_id),
            used_count: updated.used_count,
            max_uses: updated.max_uses,
            remaining_uses: (updated.max_uses - updated.used_count).max(0),
            redeemed_at: now,
            static_target_url: batch.static_target_url,
        })
    }

    /// 批次存在进行中的抽奖会话时，单次券只能通过 spin 揭晓
    async fn ensure_no_active_draw(&self, batch_id: &str) -> AppResult<()> {
        let active_sessions = draw_sessions::Entity::find()
            .filter(draw_sessions::Column::ActiveBatchId.eq(batch_id))
            .count(&self.pool)
            .await?;
        if active_sessions > 0 {
            return Err(AppError::conflict(
                ErrorCode::DrawInProgress,
                format!("Batch {batch_id} has an active draw session"),
            ));
        }
        Ok(())
    }

    async fn find_token(&self, token_id: &str) -> AppResult<tokens::Model> {
        tokens::Entity::find_by_id(token_id.to_string())
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::not_found(ErrorCode::TokenNotFound, format!("Token {token_id} not found"))
            })
    }
}

/// 奖券的有效时间窗 [start_time, end_time)
fn check_window(token: &tokens::Model, now: DateTime<Utc>) -> AppResult<()> {
    if token.start_time.is_some_and(|start| now < start) {
        return Err(AppError::conflict(
            ErrorCode::TokenNotActive,
            format!("Token {} is not active yet", token.id),
        ));
    }
    if token.end_time.is_some_and(|end| now >= end) {
        return Err(expired(&token.id));
    }
    Ok(())
}

/// 条件更新未命中后，根据最新状态给出具体错误码
fn classify_conflict(token: &tokens::Model, now: DateTime<Utc>) -> AppError {
    if token.disabled {
        disabled(&token.id)
    } else if token.is_settled() {
        already_delivered(&token.id)
    } else if token.revealed_at.is_some() {
        AppError::conflict(
            ErrorCode::AlreadyRevealed,
            format!("Token {} is already revealed", token.id),
        )
    } else if token.is_expired(now) {
        expired(&token.id)
    } else {
        not_revealed(&token.id)
    }
}

fn disabled(token_id: &str) -> AppError {
    AppError::conflict(ErrorCode::TokenDisabled, format!("Token {token_id} is disabled"))
}

fn expired(token_id: &str) -> AppError {
    AppError::conflict(ErrorCode::TokenExpired, format!("Token {token_id} has expired"))
}

fn exhausted(token_id: &str) -> AppError {
    AppError::conflict(ErrorCode::TokenExhausted, format!("Token {token_id} has no uses left"))
}

fn not_revealed(token_id: &str) -> AppError {
    AppError::conflict(ErrorCode::NotRevealed, format!("Token {token_id} is not revealed"))
}

fn already_delivered(token_id: &str) -> AppError {
    AppError::conflict(
        ErrorCode::AlreadyDelivered,
        format!("Token {token_id} is already delivered"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use crate::services::issuance_service::tests::{issuance, issue_request, prize};
    use crate::utils::flags::StaticFlags;
    use crate::utils::jwt::Role;
    use chrono::Duration;
    use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

    fn flags(two_phase: bool, self_deliver: bool) -> Arc<dyn FlagSource> {
        Arc::new(StaticFlags {
            two_phase_enabled: two_phase,
            self_deliver_enabled: self_deliver,
        })
    }

    fn staff() -> Actor {
        Actor {
            user_id: "staff-1".into(),
            role: Role::Staff,
        }
    }

    /// 发放 count 张单次券，返回奖券 ID
    async fn issue(pool: &DatabaseConnection, count: u32, static_url: Option<&str>) -> Vec<String> {
        let p = prize(pool, "gift", None).await;
        let mut req = issue_request(vec![(&p.id, Some(count))]);
        req.static_target_url = static_url.map(str::to_string);
        issuance(pool)
            .issue_tokens(req)
            .await
            .unwrap()
            .tokens
            .into_iter()
            .map(|t| t.id)
            .collect()
    }

    async fn load(pool: &DatabaseConnection, id: &str) -> tokens::Model {
        tokens::Entity::find_by_id(id.to_string())
            .one(pool)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_deliver_before_reveal_fails() {
        let pool = create_test_pool().await;
        let ids = issue(&pool, 1, None).await;
        let svc = RedemptionService::new(pool.clone(), flags(true, false));

        let err = svc
            .deliver(&ids[0], Some(&staff()), DeliverRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_REVEALED");
        assert!(load(&pool, &ids[0]).await.delivered_at.is_none());
    }

    #[tokio::test]
    async fn test_reveal_then_deliver_mirrors_redeemed_at() {
        let pool = create_test_pool().await;
        let ids = issue(&pool, 1, None).await;
        let svc = RedemptionService::new(pool.clone(), flags(true, false));

        let revealed = svc.reveal(&ids[0]).await.unwrap();
        assert_eq!(revealed.phase, TokenPhase::Revealed);
        let err = svc.reveal(&ids[0]).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_REVEALED");

        let resp = svc
            .deliver(
                &ids[0],
                Some(&staff()),
                DeliverRequest {
                    delivery_note: Some("  counter 3 ".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.phase, TokenPhase::Delivered);
        assert!(!resp.auto_redeemed);
        assert!(resp.timings.reveal_to_deliver_ms >= 0);

        let stored = load(&pool, &ids[0]).await;
        assert_eq!(stored.redeemed_at, stored.delivered_at);
        assert_eq!(stored.delivered_by_user_id.as_deref(), Some("staff-1"));
        assert_eq!(stored.delivery_note.as_deref(), Some("counter 3"));

        let err = svc
            .deliver(&ids[0], Some(&staff()), DeliverRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ALREADY_DELIVERED");
    }

    #[tokio::test]
    async fn test_concurrent_double_delivery_has_single_winner() {
        let pool = create_test_pool().await;
        let ids = issue(&pool, 1, None).await;
        let svc = RedemptionService::new(pool.clone(), flags(true, false));
        svc.reveal(&ids[0]).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            let id = ids[0].clone();
            handles.push(tokio::spawn(async move {
                svc.deliver(&id, Some(&staff()), DeliverRequest::default())
                    .await
            }));
        }

        let mut delivered_at = Vec::new();
        let mut conflicts = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(resp) => delivered_at.push(resp.timestamps.delivered_at),
                Err(e) => {
                    assert_eq!(e.code(), "ALREADY_DELIVERED");
                    conflicts += 1;
                }
            }
        }
        assert_eq!(delivered_at.len(), 1);
        assert_eq!(conflicts, 7);

        let stored = load(&pool, &ids[0]).await;
        assert!(stored.delivered_at.is_some());
        assert_eq!(stored.redeemed_at, stored.delivered_at);
    }

    #[tokio::test]
    async fn test_static_batch_delivery_is_auto_redeemed() {
        let pool = create_test_pool().await;
        let ids = issue(&pool, 1, Some("https://example.com/claim")).await;
        let svc = RedemptionService::new(pool.clone(), flags(true, false));
        svc.reveal(&ids[0]).await.unwrap();

        let resp = svc
            .deliver(&ids[0], Some(&staff()), DeliverRequest::default())
            .await
            .unwrap();
        assert!(resp.is_static_batch);
        assert!(resp.auto_redeemed);

        let stored = load(&pool, &ids[0]).await;
        assert!(stored.redeemed_at.is_some());
        assert_eq!(stored.redeemed_at, stored.delivered_at);
    }

    #[tokio::test]
    async fn test_deliver_requires_capability() {
        let pool = create_test_pool().await;
        let ids = issue(&pool, 1, None).await;
        let svc = RedemptionService::new(pool.clone(), flags(true, false));
        svc.reveal(&ids[0]).await.unwrap();

        let err = svc
            .deliver(&ids[0], None, DeliverRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));

        let user = Actor {
            user_id: "u1".into(),
            role: Role::User,
        };
        let err = svc
            .deliver(&ids[0], Some(&user), DeliverRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        // 自助交付模式下匿名调用方也可确认
        let kiosk = RedemptionService::new(pool.clone(), flags(true, true));
        let resp = kiosk
            .deliver(&ids[0], None, DeliverRequest::default())
            .await
            .unwrap();
        assert_eq!(resp.phase, TokenPhase::Delivered);
        assert!(load(&pool, &ids[0]).await.delivered_by_user_id.is_none());
    }

    #[tokio::test]
    async fn test_disabled_token_never_transitions() {
        let pool = create_test_pool().await;
        let ids = issue(&pool, 1, None).await;
        let mut am = load(&pool, &ids[0]).await.into_active_model();
        am.disabled = Set(true);
        am.update(&pool).await.unwrap();

        let svc = RedemptionService::new(pool.clone(), flags(true, false));
        assert_eq!(svc.reveal(&ids[0]).await.unwrap_err().code(), "TOKEN_DISABLED");
        assert_eq!(
            svc.deliver(&ids[0], Some(&staff()), DeliverRequest::default())
                .await
                .unwrap_err()
                .code(),
            "TOKEN_DISABLED"
        );
        assert!(load(&pool, &ids[0]).await.revealed_at.is_none());
    }

    #[tokio::test]
    async fn test_two_phase_disabled_uses_legacy_redeem() {
        let pool = create_test_pool().await;
        let ids = issue(&pool, 1, None).await;

        let two_phase = RedemptionService::new(pool.clone(), flags(true, false));
        assert_eq!(
            two_phase.redeem(&ids[0]).await.unwrap_err().code(),
            "TWO_PHASE_REQUIRED"
        );

        let legacy = RedemptionService::new(pool.clone(), flags(false, false));
        assert_eq!(
            legacy
                .deliver(&ids[0], Some(&staff()), DeliverRequest::default())
                .await
                .unwrap_err()
                .code(),
            "TWO_PHASE_DISABLED"
        );
        let resp = legacy.redeem(&ids[0]).await.unwrap();
        assert_eq!(resp.used_count, 1);
        assert_eq!(resp.remaining_uses, 0);

        let stored = load(&pool, &ids[0]).await;
        assert!(stored.revealed_at.is_some());
        assert_eq!(stored.delivered_at, stored.redeemed_at);
        assert_eq!(legacy.redeem(&ids[0]).await.unwrap_err().code(), "ALREADY_DELIVERED");
    }

    #[tokio::test]
    async fn test_reusable_token_counts_uses() {
        let pool = create_test_pool().await;
        let p = prize(&pool, "pass", None).await;
        let mut req = issue_request(vec![(&p.id, Some(1))]);
        req.max_uses = Some(2);
        let id = issuance(&pool).issue_tokens(req).await.unwrap().tokens[0].id.clone();

        let svc = RedemptionService::new(pool.clone(), flags(true, false));
        assert_eq!(svc.redeem(&id).await.unwrap().remaining_uses, 1);
        assert_eq!(svc.redeem(&id).await.unwrap().remaining_uses, 0);
        assert_eq!(svc.redeem(&id).await.unwrap_err().code(), "TOKEN_EXHAUSTED");

        let stored = load(&pool, &id).await;
        assert_eq!(stored.used_count, 2);
        assert!(stored.delivered_at.is_none());
    }

    #[tokio::test]
    async fn test_time_window_is_enforced() {
        let pool = create_test_pool().await;
        let p = prize(&pool, "later", None).await;
        let mut req = issue_request(vec![(&p.id, Some(1))]);
        req.max_uses = Some(3);
        req.start_time = Some(Utc::now() + Duration::hours(1));
        req.end_time = Some(Utc::now() + Duration::hours(2));
        let id = issuance(&pool).issue_tokens(req).await.unwrap().tokens[0].id.clone();

        let svc = RedemptionService::new(pool.clone(), flags(true, false));
        assert_eq!(svc.redeem(&id).await.unwrap_err().code(), "TOKEN_NOT_ACTIVE");
    }

    #[tokio::test]
    async fn test_missing_token_is_not_found() {
        let pool = create_test_pool().await;
        let svc = RedemptionService::new(pool, flags(true, false));
        assert_eq!(svc.reveal("nope").await.unwrap_err().code(), "TOKEN_NOT_FOUND");
    }
}
