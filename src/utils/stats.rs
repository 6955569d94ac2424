//! 批次统计的纯计算：只依赖传入的奖券列表与当前时间，无副作用，可任意频率重复调用。

use crate::entities::{prize_entity as prizes, token_entity as tokens};
use crate::models::{BatchStatsSummary, LeadTimeStats, PrizeStats, StatsCounts};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn pct(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / total as f64)
    }
}

/// 计数口径:
/// - expired: 未兑换 / 未交付且已过期
/// - active: 未禁用、未过期、未兑换 / 未交付、仍有剩余次数
pub fn count_tokens(list: &[&tokens::Model], now: DateTime<Utc>) -> StatsCounts {
    let mut c = StatsCounts {
        total: list.len() as i64,
        ..Default::default()
    };
    for t in list {
        if t.redeemed_at.is_some() {
            c.redeemed += 1;
        }
        if t.delivered_at.is_some() {
            c.delivered += 1;
        }
        if t.revealed_at.is_some() {
            c.revealed += 1;
        }
        if t.disabled {
            c.disabled += 1;
        }
        let expired = !t.is_settled() && t.is_expired(now);
        if expired {
            c.expired += 1;
        }
        if !t.disabled && !expired && !t.is_settled() && !t.is_exhausted() {
            c.active += 1;
        }
    }
    c.revealed_pending = (c.revealed - c.delivered).max(0);
    c.redeemed_pct = pct(c.redeemed, c.total);
    c.delivered_pct = pct(c.delivered, c.total);
    c.revealed_pct = pct(c.revealed, c.total);
    c.expired_pct = pct(c.expired, c.total);
    c.active_pct = pct(c.active, c.total);
    c
}

/// 揭晓到交付耗时；p95 用最近秩法 floor(0.95 * (n - 1))
pub fn lead_time(list: &[&tokens::Model]) -> LeadTimeStats {
    let mut samples: Vec<i64> = list
        .iter()
        .filter_map(|t| match (t.revealed_at, t.delivered_at) {
            (Some(r), Some(d)) => Some((d - r).num_milliseconds().max(0)),
            _ => None,
        })
        .collect();
    if samples.is_empty() {
        return LeadTimeStats::default();
    }

    samples.sort_unstable();
    let n = samples.len();
    let sum: i64 = samples.iter().sum();
    let idx = (0.95 * (n - 1) as f64).floor() as usize;
    LeadTimeStats {
        samples: n as i64,
        mean_ms: Some(round2(sum as f64 / n as f64)),
        p95_ms: Some(samples[idx]),
    }
}

/// 汇总整个批次以及每个奖品（按奖券发放时的奖品分组，按 key 排序）
pub fn summarize(
    batch_id: &str,
    batch_tokens: &[tokens::Model],
    prize_list: &[prizes::Model],
    now: DateTime<Utc>,
) -> BatchStatsSummary {
    let all: Vec<&tokens::Model> = batch_tokens.iter().collect();

    let mut grouped: BTreeMap<&str, Vec<&tokens::Model>> = BTreeMap::new();
    for t in &all {
        grouped.entry(t.prize_id.as_str()).or_default().push(t);
    }

    let mut per_prize: Vec<PrizeStats> = grouped
        .into_iter()
        .map(|(prize_id, list)| {
            let prize = prize_list.iter().find(|p| p.id == prize_id);
            PrizeStats {
                prize_id: prize_id.to_string(),
                key: prize.map(|p| p.key.clone()),
                label: prize.map(|p| p.label.clone()),
                counts: count_tokens(&list, now),
                lead_time: lead_time(&list),
            }
        })
        .collect();
    per_prize.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.prize_id.cmp(&b.prize_id)));

    BatchStatsSummary {
        batch_id: batch_id.to_string(),
        generated_at: now,
        counts: count_tokens(&all, now),
        lead_time: lead_time(&all),
        prizes: per_prize,
    }
}
