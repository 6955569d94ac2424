use crate::config::IssuanceConfig;
use crate::entities::{TokenKind, batch_entity as batches, prize_entity as prizes, token_entity as tokens};
use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::{
    BatchResponse, BatchTokenQuery, IssueTokensRequest, IssueTokensResponse, IssuedPrizeSummary,
    IssuedToken, PaginatedResponse, PaginationParams, TokenResponse, VerifyTokenResponse,
};
use crate::services::signing_service::{SigningPayload, SigningService, VerifyOutcome};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;

/// 单条 INSERT 的最大行数（SQLite 绑定参数上限）
const INSERT_CHUNK: usize = 40;

/// 一个奖品的发放计划
struct PlannedIssue<'a> {
    prize: &'a prizes::Model,
    count: i64,
    follow_up: Option<&'a prizes::Model>,
}

/// 奖券账本 (Token Ledger)：批次与奖券的发放、查询
#[derive(Clone)]
pub struct IssuanceService {
    pool: DatabaseConnection,
    signing: SigningService,
    config: IssuanceConfig,
}

impl IssuanceService {
    pub fn new(pool: DatabaseConnection, signing: SigningService, config: IssuanceConfig) -> Self {
        Self {
            pool,
            signing,
            config,
        }
    }

    /// 发放奖券
    ///
    /// 逻辑:
    /// 1. 校验参数，确定过期时间
    /// 2. 读取奖品，跳过未启用 / 无库存的奖品；全部被跳过则 NO_ACTIVE_PRIZES
    /// 3. 校验单次上限 (LIMIT_EXCEEDED) 与剩余库存 (INSUFFICIENT_STOCK)
    /// 4. 同一事务内: 创建批次(可选)、写入签名后的奖券、条件更新奖品计数
    pub async fn issue_tokens(&self, req: IssueTokensRequest) -> AppResult<IssueTokensResponse> {
        let now = Utc::now();
        let expires_at = self.resolve_expiry(&req, now)?;
        let max_uses = req.max_uses.unwrap_or(1);
        if max_uses < 1 {
            return Err(AppError::ValidationError("max_uses must be at least 1".into()));
        }
        if let (Some(start), Some(end)) = (req.start_time, req.end_time)
            && start >= end
        {
            return Err(AppError::ValidationError(
                "start_time must be before end_time".into(),
            ));
        }
        if req.prizes.is_empty() {
            return Err(AppError::ValidationError("At least one prize is required".into()));
        }
        if req.batch_id.is_some()
            && (req.description.is_some()
                || req.static_target_url.is_some()
                || req.is_reusable.is_some())
        {
            return Err(AppError::ValidationError(
                "description, static_target_url and is_reusable only apply to a new batch".into(),
            ));
        }

        let txn = self.pool.begin().await?;

        let batch = match req.batch_id.as_deref() {
            Some(batch_id) => batches::Entity::find_by_id(batch_id.to_string())
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(ErrorCode::BatchNotFound, format!("Batch {batch_id} not found"))
                })?,
            None => {
                let static_target_url = req
                    .static_target_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string);
                batches::ActiveModel {
                    id: Set(uuid::Uuid::new_v4().to_string()),
                    description: Set(req.description.clone()),
                    static_target_url: Set(static_target_url),
                    is_reusable: Set(req.is_reusable.unwrap_or(max_uses > 1)),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        let mut prize_ids: Vec<String> = req.prizes.iter().map(|p| p.prize_id.clone()).collect();
        prize_ids.extend(req.prizes.iter().filter_map(|p| p.follow_up_prize_id.clone()));
        let prize_map: HashMap<String, prizes::Model> = prizes::Entity::find()
            .filter(prizes::Column::Id.is_in(prize_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        if let Some(missing) = prize_ids.iter().find(|id| !prize_map.contains_key(*id)) {
            return Err(AppError::not_found(
                ErrorCode::PrizeNotFound,
                format!("Prize {missing} not found"),
            ));
        }

        // 规划：跳过不可发放的奖品
        let mut plan: Vec<PlannedIssue> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        for entry in &req.prizes {
            let prize = &prize_map[&entry.prize_id];
            let follow_up = entry.follow_up_prize_id.as_ref().map(|id| &prize_map[id]);
            if !prize.is_issuable() || follow_up.is_some_and(|f| !f.is_issuable()) {
                log::debug!("Skipping non-issuable prize {}", prize.key);
                skipped.push(prize.id.clone());
                continue;
            }
            let count = match (entry.count, prize.available_stock()) {
                (Some(0), _) => {
                    return Err(AppError::ValidationError(format!(
                        "Count for prize {} must be positive",
                        prize.key
                    )));
                }
                (Some(n), _) => n as i64,
                (None, Some(left)) => left,
                (None, None) => {
                    return Err(AppError::ValidationError(format!(
                        "Count is required for unlimited prize {}",
                        prize.key
                    )));
                }
            };
            plan.push(PlannedIssue {
                prize,
                count,
                follow_up,
            });
        }

        if plan.is_empty() {
            return Err(AppError::bad_request(
                ErrorCode::NoActivePrizes,
                "No active prize with remaining stock",
            ));
        }

        // 每个奖品的需求量（同一奖品可能出现多次或作为后续奖品）
        let mut demand: HashMap<&str, i64> = HashMap::new();
        for p in &plan {
            *demand.entry(p.prize.id.as_str()).or_default() += p.count;
            if let Some(f) = p.follow_up {
                *demand.entry(f.id.as_str()).or_default() += p.count;
            }
        }

        let total: i64 = demand.values().sum();
        if total > self.config.max_tokens_per_call as i64 {
            return Err(AppError::bad_request(
                ErrorCode::LimitExceeded,
                format!(
                    "Requested {total} tokens, limit per call is {}",
                    self.config.max_tokens_per_call
                ),
            ));
        }

        for (prize_id, wanted) in &demand {
            let prize = &prize_map[*prize_id];
            if let Some(left) = prize.available_stock()
                && *wanted > left
            {
                return Err(AppError::bad_request(
                    ErrorCode::InsufficientStock,
                    format!("Prize {} has {left} left, {wanted} requested", prize.key),
                ));
            }
        }

        let mut rows: Vec<tokens::ActiveModel> = Vec::with_capacity(total as usize);
        let mut issued: Vec<IssuedToken> = Vec::with_capacity(total as usize);
        let template = TokenTemplate {
            batch_id: &batch.id,
            expires_at,
            max_uses,
            start_time: req.start_time,
            end_time: req.end_time,
            now,
        };
        for p in &plan {
            for _ in 0..p.count {
                let kind = match p.follow_up {
                    Some(follow_prize) => {
                        let follow = self.build_token(&template, follow_prize, TokenKind::Prize)?;
                        let follow_up_token_id = follow.id.clone();
                        issued.push(IssuedToken::from(&follow));
                        rows.push(follow.into());
                        TokenKind::Retry { follow_up_token_id }
                    }
                    None => TokenKind::Prize,
                };
                let token = self.build_token(&template, p.prize, kind)?;
                issued.push(IssuedToken::from(&token));
                rows.push(token.into());
            }
        }

        let mut chunk: Vec<tokens::ActiveModel> = Vec::with_capacity(INSERT_CHUNK);
        for row in rows {
            chunk.push(row);
            if chunk.len() == INSERT_CHUNK {
                tokens::Entity::insert_many(std::mem::take(&mut chunk))
                    .exec(&txn)
                    .await?;
            }
        }
        if !chunk.is_empty() {
            tokens::Entity::insert_many(chunk).exec(&txn).await?;
        }

        let mut summaries = Vec::with_capacity(demand.len());
        for (prize_id, count) in &demand {
            self.bump_emitted(&txn, prize_id, *count, now).await?;
            let prize = &prize_map[*prize_id];
            summaries.push(IssuedPrizeSummary {
                prize_id: prize.id.clone(),
                key: prize.key.clone(),
                issued: *count,
                emitted_total: prize.emitted_total + count,
            });
        }
        summaries.sort_by(|a, b| a.key.cmp(&b.key));

        txn.commit().await?;

        log::info!(
            "Issued {total} tokens into batch {} ({} prizes, {} skipped)",
            batch.id,
            summaries.len(),
            skipped.len()
        );

        Ok(IssueTokensResponse {
            batch_id: batch.id,
            total_issued: total,
            prizes: summaries,
            skipped_prize_ids: skipped,
            tokens: issued,
        })
    }

    pub async fn get_batch(&self, batch_id: &str) -> AppResult<BatchResponse> {
        let batch = self.find_batch(batch_id).await?;
        let token_count = tokens::Entity::find()
            .filter(tokens::Column::BatchId.eq(batch_id))
            .count(&self.pool)
            .await? as i64;
        Ok(BatchResponse::new(batch, token_count))
    }

    /// 分页获取批次内奖券
    pub async fn list_batch_tokens(
        &self,
        batch_id: &str,
        query: &BatchTokenQuery,
    ) -> AppResult<PaginatedResponse<TokenResponse>> {
        self.find_batch(batch_id).await?;

        let params = PaginationParams::new(query.page, query.per_page);
        let offset = params.get_offset();
        let limit = params.get_limit();

        let base_query = tokens::Entity::find().filter(tokens::Column::BatchId.eq(batch_id));
        let total = base_query.clone().count(&self.pool).await? as i64;

        let items = base_query
            .order_by_asc(tokens::Column::CreatedAt)
            .order_by_asc(tokens::Column::Id)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20),
            total,
        ))
    }

    /// 用库中记录重新计算签名载荷，校验调用方出示的签名
    pub async fn verify_token(&self, token_id: &str, signature: &str) -> AppResult<VerifyTokenResponse> {
        let token = tokens::Entity::find_by_id(token_id.to_string())
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::not_found(ErrorCode::TokenNotFound, format!("Token {token_id} not found"))
            })?;

        let outcome = self.signing.verify_token(&token, signature.trim());
        if !outcome.is_valid() {
            log::warn!("Signature check failed for token {token_id}: {outcome:?}");
        }
        Ok(VerifyTokenResponse {
            token_id: token.id,
            valid: outcome.is_valid(),
            reason: match outcome {
                VerifyOutcome::Valid => None,
                VerifyOutcome::Invalid(reason) => Some(reason),
            },
        })
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    async fn find_batch(&self, batch_id: &str) -> AppResult<batches::Model> {
        batches::Entity::find_by_id(batch_id.to_string())
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::not_found(ErrorCode::BatchNotFound, format!("Batch {batch_id} not found"))
            })
    }

    fn resolve_expiry(&self, req: &IssueTokensRequest, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        let expires_at = match (req.expires_at, req.ttl_days) {
            (Some(_), Some(_)) => {
                return Err(AppError::ValidationError(
                    "Specify either expires_at or ttl_days, not both".into(),
                ));
            }
            (Some(at), None) => at,
            (None, Some(days)) if days > 0 => add_days(now, days)?,
            (None, Some(_)) => {
                return Err(AppError::ValidationError("ttl_days must be positive".into()));
            }
            (None, None) => add_days(now, self.config.default_ttl_days)?,
        };
        if expires_at <= now {
            return Err(AppError::ValidationError(
                "expires_at must be in the future".into(),
            ));
        }
        Ok(expires_at)
    }

    fn build_token(
        &self,
        template: &TokenTemplate<'_>,
        prize: &prizes::Model,
        kind: TokenKind,
    ) -> AppResult<tokens::Model> {
        let id = uuid::Uuid::new_v4().to_string();
        let signature = self.signing.sign(&SigningPayload {
            token_id: id.clone(),
            prize_id: prize.id.clone(),
            batch_id: template.batch_id.to_string(),
            expires_at: template.expires_at,
        })?;
        Ok(tokens::Model {
            id,
            prize_id: prize.id.clone(),
            batch_id: template.batch_id.to_string(),
            kind,
            expires_at: template.expires_at,
            signature,
            signature_version: self.signing.current_version(),
            disabled: false,
            max_uses: template.max_uses,
            used_count: 0,
            start_time: template.start_time,
            end_time: template.end_time,
            revealed_at: None,
            assigned_prize_id: None,
            delivered_at: None,
            delivered_by_user_id: None,
            delivery_note: None,
            redeemed_at: None,
            created_at: template.now,
        })
    }

    /// 条件更新发放计数：仅当剩余库存足够时成功，防止并发发放超发
    async fn bump_emitted(
        &self,
        txn: &DatabaseTransaction,
        prize_id: &str,
        count: i64,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = prizes::Entity::update_many()
            .col_expr(
                prizes::Column::EmittedTotal,
                Expr::col(prizes::Column::EmittedTotal).add(count),
            )
            .col_expr(prizes::Column::LastEmittedAt, Expr::value(Some(now)))
            .col_expr(prizes::Column::UpdatedAt, Expr::value(now))
            .filter(prizes::Column::Id.eq(prize_id))
            .filter(
                Condition::any()
                    .add(prizes::Column::Stock.is_null())
                    .add(
                        Expr::expr(Expr::col(prizes::Column::EmittedTotal).add(count))
                            .lte(Expr::col(prizes::Column::Stock)),
                    ),
            )
            .exec(txn)
            .await?;

        if result.rows_affected != 1 {
            return Err(AppError::bad_request(
                ErrorCode::InsufficientStock,
                format!("Prize {prize_id} stock changed during issuance"),
            ));
        }
        Ok(())
    }
}

struct TokenTemplate<'a> {
    batch_id: &'a str,
    expires_at: DateTime<Utc>,
    max_uses: i32,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
}

/// now + days；超出时间可表示范围时视为非法输入
fn add_days(now: DateTime<Utc>, days: i64) -> AppResult<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AppError::ValidationError(format!("ttl_days {days} is out of range")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use crate::models::{CreatePrizeRequest, IssuePrizeRequest, PrizeResponse};
    use crate::services::PrizeService;
    use crate::services::signing_service::InvalidReason;

    pub(crate) fn signing() -> SigningService {
        SigningService::new("test-secret", 1)
    }

    pub(crate) fn issuance(pool: &DatabaseConnection) -> IssuanceService {
        IssuanceService::new(pool.clone(), signing(), IssuanceConfig::default())
    }

    pub(crate) async fn prize(pool: &DatabaseConnection, key: &str, stock: Option<i64>) -> PrizeResponse {
        PrizeService::new(pool.clone())
            .create_prize(CreatePrizeRequest {
                key: key.to_string(),
                label: key.to_uppercase(),
                color: None,
                stock,
            })
            .await
            .unwrap()
    }

    pub(crate) fn issue_request(prizes: Vec<(&str, Option<u32>)>) -> IssueTokensRequest {
        IssueTokensRequest {
            batch_id: None,
            description: Some("test batch".into()),
            static_target_url: None,
            is_reusable: None,
            expires_at: None,
            ttl_days: None,
            max_uses: None,
            start_time: None,
            end_time: None,
            prizes: prizes
                .into_iter()
                .map(|(id, count)| IssuePrizeRequest {
                    prize_id: id.to_string(),
                    count,
                    follow_up_prize_id: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_issue_full_stock_for_two_prizes() {
        let pool = create_test_pool().await;
        let p1 = prize(&pool, "p1", Some(5)).await;
        let p2 = prize(&pool, "p2", Some(3)).await;

        let resp = issuance(&pool)
            .issue_tokens(issue_request(vec![(&p1.id, None), (&p2.id, None)]))
            .await
            .unwrap();
        assert_eq!(resp.total_issued, 8);
        assert_eq!(resp.tokens.len(), 8);

        let stored = tokens::Entity::find()
            .filter(tokens::Column::BatchId.eq(resp.batch_id.clone()))
            .all(&pool)
            .await
            .unwrap();
        assert_eq!(stored.len(), 8);

        let prize1 = prizes::Entity::find_by_id(p1.id.clone()).one(&pool).await.unwrap().unwrap();
        let prize2 = prizes::Entity::find_by_id(p2.id.clone()).one(&pool).await.unwrap().unwrap();
        assert_eq!(prize1.emitted_total, 5);
        assert_eq!(prize2.emitted_total, 3);
        assert!(prize1.last_emitted_at.is_some());
        assert_eq!(stored.iter().filter(|t| t.prize_id == p1.id).count(), 5);

        // 所有签名可验证
        let svc = signing();
        assert!(stored.iter().all(|t| svc.verify_token(t, &t.signature).is_valid()));
    }

    #[tokio::test]
    async fn test_inactive_and_empty_prizes_are_skipped() {
        let pool = create_test_pool().await;
        let active = prize(&pool, "active", Some(2)).await;
        let inactive = prize(&pool, "inactive", Some(2)).await;
        let empty = prize(&pool, "empty", Some(0)).await;
        PrizeService::new(pool.clone())
            .set_active(&inactive.id, false)
            .await
            .unwrap();

        let resp = issuance(&pool)
            .issue_tokens(issue_request(vec![
                (&active.id, None),
                (&inactive.id, None),
                (&empty.id, None),
            ]))
            .await
            .unwrap();
        assert_eq!(resp.total_issued, 2);
        assert_eq!(resp.skipped_prize_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_no_eligible_prize_fails() {
        let pool = create_test_pool().await;
        let empty = prize(&pool, "empty", Some(0)).await;
        let err = issuance(&pool)
            .issue_tokens(issue_request(vec![(&empty.id, None)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NO_ACTIVE_PRIZES");
    }

    #[tokio::test]
    async fn test_limit_exceeded_is_all_or_nothing() {
        let pool = create_test_pool().await;
        let p = prize(&pool, "p", None).await;
        let svc = IssuanceService::new(
            pool.clone(),
            signing(),
            IssuanceConfig {
                max_tokens_per_call: 10,
                default_ttl_days: 30,
            },
        );
        let err = svc
            .issue_tokens(issue_request(vec![(&p.id, Some(11))]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LIMIT_EXCEEDED");

        assert_eq!(tokens::Entity::find().count(&pool).await.unwrap(), 0);
        assert_eq!(batches::Entity::find().count(&pool).await.unwrap(), 0);
        let stored = prizes::Entity::find_by_id(p.id).one(&pool).await.unwrap().unwrap();
        assert_eq!(stored.emitted_total, 0);
    }

    #[tokio::test]
    async fn test_count_above_stock_fails() {
        let pool = create_test_pool().await;
        let p = prize(&pool, "p", Some(3)).await;
        let err = issuance(&pool)
            .issue_tokens(issue_request(vec![(&p.id, Some(4))]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    }

    #[tokio::test]
    async fn test_retry_tokens_get_follow_ups() {
        let pool = create_test_pool().await;
        let retry = prize(&pool, "retry", None).await;
        let bonus = prize(&pool, "bonus", Some(2)).await;
        let mut req = issue_request(vec![(&retry.id, Some(2))]);
        req.prizes[0].follow_up_prize_id = Some(bonus.id.clone());

        let resp = issuance(&pool).issue_tokens(req).await.unwrap();
        assert_eq!(resp.total_issued, 4);

        let stored = tokens::Entity::find().all(&pool).await.unwrap();
        let retries: Vec<&tokens::Model> = stored
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Retry { .. }))
            .collect();
        assert_eq!(retries.len(), 2);
        for r in retries {
            let follow_id = r.kind.follow_up_token_id().unwrap();
            let follow = stored.iter().find(|t| t.id == follow_id).unwrap();
            assert_eq!(follow.prize_id, bonus.id);
        }
    }

    #[tokio::test]
    async fn test_append_to_existing_batch_and_list() {
        let pool = create_test_pool().await;
        let p = prize(&pool, "p", None).await;
        let svc = issuance(&pool);
        let first = svc
            .issue_tokens(issue_request(vec![(&p.id, Some(3))]))
            .await
            .unwrap();

        let mut again = issue_request(vec![(&p.id, Some(2))]);
        again.batch_id = Some(first.batch_id.clone());
        // 批次属性只在新建时设置
        let err = svc.issue_tokens(again.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        again.description = None;
        svc.issue_tokens(again).await.unwrap();

        let batch = svc.get_batch(&first.batch_id).await.unwrap();
        assert_eq!(batch.token_count, 5);
        assert!(!batch.is_static);

        let page = svc
            .list_batch_tokens(
                &first.batch_id,
                &BatchTokenQuery {
                    page: Some(1),
                    per_page: Some(4),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.data.len(), 4);
        assert_eq!(page.total_pages, 2);

        let err = svc.get_batch("missing").await.unwrap_err();
        assert_eq!(err.code(), "BATCH_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_verify_token_signature() {
        let pool = create_test_pool().await;
        let p = prize(&pool, "p", None).await;
        let resp = issuance(&pool)
            .issue_tokens(issue_request(vec![(&p.id, Some(1))]))
            .await
            .unwrap();
        let token = &resp.tokens[0];
        let svc = issuance(&pool);

        let ok = svc.verify_token(&token.id, &token.signature).await.unwrap();
        assert!(ok.valid);
        assert!(ok.reason.is_none());

        let mut tampered = token.signature.clone();
        tampered.replace_range(0..2, if tampered.starts_with("00") { "11" } else { "00" });
        let bad = svc.verify_token(&token.id, &tampered).await.unwrap();
        assert!(!bad.valid);
        assert_eq!(bad.reason, Some(InvalidReason::Mismatch));

        let garbage = svc.verify_token(&token.id, "zz").await.unwrap();
        assert_eq!(garbage.reason, Some(InvalidReason::MalformedSignature));

        let err = svc.verify_token("missing", "00").await.unwrap_err();
        assert_eq!(err.code(), "TOKEN_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_expiry_is_rejected() {
        let pool = create_test_pool().await;
        let p = prize(&pool, "p", None).await;
        let mut req = issue_request(vec![(&p.id, Some(1))]);
        req.expires_at = Some(Utc::now() - Duration::days(1));
        let err = issuance(&pool).issue_tokens(req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_rejected() {
        let pool = create_test_pool().await;
        let p = prize(&pool, "p", None).await;
        let mut req = issue_request(vec![(&p.id, Some(1))]);
        req.ttl_days = Some(i64::MAX);
        let err = issuance(&pool).issue_tokens(req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let svc = IssuanceService::new(
            pool.clone(),
            signing(),
            IssuanceConfig {
                default_ttl_days: i64::MAX / 2,
                ..IssuanceConfig::default()
            },
        );
        let err = svc
            .issue_tokens(issue_request(vec![(&p.id, Some(1))]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        // 失败的请求不落库
        let stored = tokens::Entity::find().all(&pool).await.unwrap();
        assert!(stored.is_empty());
    }
}
