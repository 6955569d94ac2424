//! 轮盘抽奖的纯计算部分：抽奖池筛选、组成快照、按剩余数量加权抽取。
//! 不访问数据库，便于用固定种子的随机数测试。

use crate::entities::token_entity as tokens;
use crate::entities::{DrawMode, TokenKind};
use crate::error::IneligibleReason;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;

/// 轮盘元素数量允许范围（奖品数或奖券数）
pub const MIN_ELEMENTS: usize = 2;
pub const MAX_ELEMENTS: usize = 12;

/// 仍被 "再来一次" 券占用的后续奖券 ID。
/// 只在创建会话时根据当前数据重新计算；再来一次券被禁用 / 过期 / 已抽出后即释放。
pub fn reserved_follow_ups(batch_tokens: &[tokens::Model], now: DateTime<Utc>) -> HashSet<String> {
    batch_tokens
        .iter()
        .filter(|t| {
            matches!(t.kind, TokenKind::Retry { .. })
                && t.revealed_at.is_none()
                && !t.is_settled()
                && !t.disabled
                && !t.is_expired(now)
        })
        .filter_map(|t| t.kind.follow_up_token_id().map(str::to_string))
        .collect()
}

/// 可参与抽取的奖券：未揭晓、未兑换/交付、未禁用、未过期且在时间窗内、非可复用、未被占用
pub fn eligible_pool(batch_tokens: &[tokens::Model], now: DateTime<Utc>) -> Vec<&tokens::Model> {
    let reserved = reserved_follow_ups(batch_tokens, now);
    batch_tokens
        .iter()
        .filter(|t| {
            !t.disabled
                && t.revealed_at.is_none()
                && !t.is_settled()
                && !t.is_expired(now)
                && t.is_within_window(now)
                && !t.is_reusable()
                && !reserved.contains(&t.id)
        })
        .collect()
}

fn in_range(n: usize) -> bool {
    (MIN_ELEMENTS..=MAX_ELEMENTS).contains(&n)
}

/// 决定会话模式。
/// - 指定 BY_TOKEN：奖券数须在 [2,12]
/// - 指定 BY_PRIZE：奖品数须在 [2,12]
/// - 未指定：优先 BY_PRIZE，奖品数不满足时回退 BY_TOKEN
pub fn resolve_mode(
    requested: Option<DrawMode>,
    distinct_prizes: usize,
    token_count: usize,
) -> Result<DrawMode, IneligibleReason> {
    let token_reason = || {
        if token_count < MIN_ELEMENTS {
            IneligibleReason::TooFewTokens
        } else {
            IneligibleReason::TooManyTokens
        }
    };

    match requested {
        Some(DrawMode::ByToken) => {
            if in_range(token_count) {
                Ok(DrawMode::ByToken)
            } else {
                Err(token_reason())
            }
        }
        Some(DrawMode::ByPrize) => {
            if in_range(distinct_prizes) {
                Ok(DrawMode::ByPrize)
            } else if distinct_prizes < MIN_ELEMENTS {
                Err(IneligibleReason::TooFewPrizes)
            } else {
                Err(IneligibleReason::TooManyPrizes)
            }
        }
        None => {
            if in_range(distinct_prizes) {
                Ok(DrawMode::ByPrize)
            } else if in_range(token_count) {
                Ok(DrawMode::ByToken)
            } else if token_count < MIN_ELEMENTS {
                Err(IneligibleReason::TooFewTokens)
            } else if distinct_prizes > MAX_ELEMENTS {
                Err(IneligibleReason::TooManyPrizes)
            } else {
                // 单一奖品但奖券过多
                Err(IneligibleReason::TooFewPrizes)
            }
        }
    }
}

/// 组成快照中的一个元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionEntry {
    pub prize_id: String,
    /// BY_TOKEN 模式下对应的奖券
    pub token_id: Option<String>,
    pub weight: i32,
}

/// 构建组成快照。BY_PRIZE 按奖品首次出现的顺序分组，权重为数量。
pub fn build_composition(pool: &[&tokens::Model], mode: DrawMode) -> Vec<CompositionEntry> {
    match mode {
        DrawMode::ByToken => pool
            .iter()
            .map(|t| CompositionEntry {
                prize_id: t.prize_id.clone(),
                token_id: Some(t.id.clone()),
                weight: 1,
            })
            .collect(),
        DrawMode::ByPrize => {
            let mut entries: Vec<CompositionEntry> = Vec::new();
            for t in pool {
                match entries.iter_mut().find(|e| e.prize_id == t.prize_id) {
                    Some(entry) => entry.weight += 1,
                    None => entries.push(CompositionEntry {
                        prize_id: t.prize_id.clone(),
                        token_id: None,
                        weight: 1,
                    }),
                }
            }
            entries
        }
    }
}

/// 尚未被抽取的候选奖券
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub token_id: String,
    pub prize_id: String,
}

/// 选中的候选及其权重快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub index: usize,
    pub weight: i32,
}

/// 从剩余候选中抽取一个（不放回抽样）。
/// - BY_PRIZE：奖品被抽中的概率与其剩余数量成正比，再在该奖品的奖券中均匀选择
/// - BY_TOKEN：剩余奖券等概率
pub fn pick_candidate<R: Rng>(
    remaining: &[Candidate],
    mode: DrawMode,
    rng: &mut R,
) -> Option<Pick> {
    if remaining.is_empty() {
        return None;
    }

    match mode {
        DrawMode::ByToken => Some(Pick {
            index: rng.gen_range(0..remaining.len()),
            weight: 1,
        }),
        DrawMode::ByPrize => {
            let mut groups: Vec<(&str, i32)> = Vec::new();
            for c in remaining {
                match groups.iter_mut().find(|(p, _)| *p == c.prize_id) {
                    Some((_, count)) => *count += 1,
                    None => groups.push((c.prize_id.as_str(), 1)),
                }
            }

            let total: i32 = groups.iter().map(|(_, n)| n).sum();
            let roll = rng.gen_range(0..total);
            let mut acc = 0;
            let (prize_id, weight) = groups
                .iter()
                .find(|(_, n)| {
                    acc += n;
                    roll < acc
                })
                .copied()
                .unwrap_or(groups[groups.len() - 1]);

            let positions: Vec<usize> = remaining
                .iter()
                .enumerate()
                .filter(|(_, c)| c.prize_id == prize_id)
                .map(|(i, _)| i)
                .collect();
            let index = positions[rng.gen_range(0..positions.len())];

            Some(Pick { index, weight })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn token(id: &str, prize: &str) -> tokens::Model {
        let now = Utc::now();
        tokens::Model {
            id: id.to_string(),
            prize_id: prize.to_string(),
            batch_id: "b".to_string(),
            kind: TokenKind::Prize,
            expires_at: now + Duration::days(1),
            signature: String::new(),
            signature_version: 1,
            disabled: false,
            max_uses: 1,
            used_count: 0,
            start_time: None,
            end_time: None,
            revealed_at: None,
            assigned_prize_id: None,
            delivered_at: None,
            delivered_by_user_id: None,
            delivery_note: None,
            redeemed_at: None,
            created_at: now,
        }
    }

    fn candidates(spec: &[(&str, &str)]) -> Vec<Candidate> {
        spec.iter()
            .map(|(t, p)| Candidate {
                token_id: t.to_string(),
                prize_id: p.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_pool_excludes_unavailable_tokens() {
        let now = Utc::now();
        let mut revealed = token("t2", "p1");
        revealed.revealed_at = Some(now);
        let mut disabled = token("t3", "p1");
        disabled.disabled = true;
        let mut expired = token("t4", "p1");
        expired.expires_at = now - Duration::seconds(1);
        let mut reusable = token("t5", "p1");
        reusable.max_uses = 3;
        let mut closed = token("t6", "p1");
        closed.end_time = Some(now);
        let mut not_yet = token("t7", "p1");
        not_yet.start_time = Some(now + Duration::hours(1));
        let mut open = token("t8", "p1");
        open.start_time = Some(now - Duration::hours(1));
        open.end_time = Some(now + Duration::hours(1));
        let all = vec![
            token("t1", "p1"),
            revealed,
            disabled,
            expired,
            reusable,
            closed,
            not_yet,
            open,
        ];

        let pool = eligible_pool(&all, now);
        let ids: Vec<&str> = pool.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t8"]);
    }

    #[test]
    fn test_retry_token_reserves_follow_up_until_drawn() {
        let now = Utc::now();
        let mut retry = token("retry", "p_retry");
        retry.kind = TokenKind::Retry {
            follow_up_token_id: "follow".to_string(),
        };
        let all = vec![retry.clone(), token("follow", "p1"), token("other", "p2")];

        let pool = eligible_pool(&all, now);
        let ids: HashSet<&str> = pool.iter().map(|t| t.id.as_str()).collect();
        assert!(ids.contains("retry"));
        assert!(!ids.contains("follow"));

        // 再来一次券已被抽出 -> 后续奖券释放
        retry.revealed_at = Some(now);
        let all = vec![retry.clone(), token("follow", "p1")];
        let pool = eligible_pool(&all, now);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, "follow");

        // 再来一次券被禁用（永远不会被抽出） -> 同样释放
        retry.revealed_at = None;
        retry.disabled = true;
        let all = vec![retry, token("follow", "p1")];
        assert!(reserved_follow_ups(&all, now).is_empty());
    }

    #[test]
    fn test_resolve_mode_defaults_to_by_prize() {
        assert_eq!(resolve_mode(None, 3, 6), Ok(DrawMode::ByPrize));
        assert_eq!(resolve_mode(None, 12, 40), Ok(DrawMode::ByPrize));
    }

    #[test]
    fn test_resolve_mode_falls_back_to_by_token() {
        // 单一奖品，奖券数在范围内
        assert_eq!(resolve_mode(None, 1, 5), Ok(DrawMode::ByToken));
        assert_eq!(resolve_mode(None, 1, 2), Ok(DrawMode::ByToken));
    }

    #[test]
    fn test_resolve_mode_reasons() {
        assert_eq!(resolve_mode(None, 1, 1), Err(IneligibleReason::TooFewTokens));
        assert_eq!(resolve_mode(None, 0, 0), Err(IneligibleReason::TooFewTokens));
        assert_eq!(resolve_mode(None, 13, 30), Err(IneligibleReason::TooManyPrizes));
        assert_eq!(resolve_mode(None, 1, 20), Err(IneligibleReason::TooFewPrizes));
        assert_eq!(
            resolve_mode(Some(DrawMode::ByToken), 3, 13),
            Err(IneligibleReason::TooManyTokens)
        );
        assert_eq!(
            resolve_mode(Some(DrawMode::ByPrize), 1, 5),
            Err(IneligibleReason::TooFewPrizes)
        );
    }

    #[test]
    fn test_build_composition_by_prize_groups_counts() {
        let all = vec![
            token("a", "p1"),
            token("b", "p2"),
            token("c", "p1"),
            token("d", "p3"),
        ];
        let pool: Vec<&tokens::Model> = all.iter().collect();
        let entries = build_composition(&pool, DrawMode::ByPrize);
        let summary: Vec<(&str, i32)> = entries
            .iter()
            .map(|e| (e.prize_id.as_str(), e.weight))
            .collect();
        assert_eq!(summary, vec![("p1", 2), ("p2", 1), ("p3", 1)]);

        let entries = build_composition(&pool, DrawMode::ByToken);
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.weight == 1 && e.token_id.is_some()));
    }

    #[test]
    fn test_pick_empty_returns_none() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_candidate(&[], DrawMode::ByPrize, &mut rng), None);
    }

    #[test]
    fn test_pick_by_prize_reports_remaining_count_as_weight() {
        let mut rng = StdRng::seed_from_u64(42);
        let remaining = candidates(&[("a", "p1"), ("b", "p1"), ("c", "p1")]);
        let pick = pick_candidate(&remaining, DrawMode::ByPrize, &mut rng).unwrap();
        assert_eq!(pick.weight, 3);
        assert!(pick.index < 3);
    }

    #[test]
    fn test_pick_by_prize_is_proportional_to_remaining() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut spec = vec![("rare", "p_rare")];
        let common: Vec<String> = (0..9).map(|i| format!("c{i}")).collect();
        for id in &common {
            spec.push((id.as_str(), "p_common"));
        }
        let remaining = candidates(&spec);

        let rounds = 20_000;
        let mut rare_hits = 0;
        for _ in 0..rounds {
            let pick = pick_candidate(&remaining, DrawMode::ByPrize, &mut rng).unwrap();
            if remaining[pick.index].prize_id == "p_rare" {
                assert_eq!(pick.weight, 1);
                rare_hits += 1;
            } else {
                assert_eq!(pick.weight, 9);
            }
        }
        let ratio = rare_hits as f64 / rounds as f64;
        assert!((0.08..0.12).contains(&ratio), "ratio = {ratio}");
    }

    #[test]
    fn test_pick_by_token_is_uniform_with_unit_weight() {
        let mut rng = StdRng::seed_from_u64(1);
        let remaining = candidates(&[("a", "p1"), ("b", "p1"), ("c", "p2"), ("d", "p3")]);
        let mut hits = [0usize; 4];
        for _ in 0..8_000 {
            let pick = pick_candidate(&remaining, DrawMode::ByToken, &mut rng).unwrap();
            assert_eq!(pick.weight, 1);
            hits[pick.index] += 1;
        }
        assert!(hits.iter().all(|&n| (1_700..2_300).contains(&n)), "{hits:?}");
    }
}
