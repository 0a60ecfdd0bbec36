use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::categories::{jaccard, normalize, tokens};
use crate::core::Transaction;

/// Tunable duplicate-detection thresholds. The defaults are assumptions,
/// not guaranteed behavior; statements with odd posting delays may need a
/// wider window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Maximum date distance, in days, between candidate and existing entry.
    pub lookback_days: i64,
    /// Amounts differing by no more than this count as equal (one minor
    /// currency unit by default).
    pub amount_epsilon: Decimal,
    /// Minimum merchant token overlap when categories differ.
    pub merchant_overlap: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            lookback_days: 3,
            amount_epsilon: Decimal::new(1, 2), // 0.01
            merchant_overlap: 0.5,
        }
    }
}

/// The fields of a candidate row relevant to duplicate detection.
#[derive(Debug, Clone)]
pub struct DedupCandidate<'a> {
    pub account_id: Uuid,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: Option<&'a str>,
    pub merchant: &'a str,
}

/// Searches `existing` for a probable duplicate of `candidate`.
///
/// A match requires the same account, an amount equal within the epsilon, a
/// date within the lookback window, and either an equal category or enough
/// merchant token overlap. With several matches the closest by date wins,
/// ties broken by smallest transaction id. `None` is the common case, not
/// an error.
pub fn find_duplicate(
    candidate: &DedupCandidate<'_>,
    existing: &[Transaction],
    config: &DedupConfig,
) -> Option<Uuid> {
    let candidate_tokens = tokens(&normalize(candidate.merchant));
    let mut best: Option<(i64, Uuid)> = None;
    for txn in existing {
        if txn.account_id != candidate.account_id {
            continue;
        }
        if (txn.amount - candidate.amount).abs() > config.amount_epsilon {
            continue;
        }
        let distance = (txn.date - candidate.date).num_days().abs();
        if distance > config.lookback_days {
            continue;
        }
        let category_matches = candidate
            .category
            .map(|c| c == txn.category)
            .unwrap_or(false);
        let merchant_matches = jaccard(&candidate_tokens, &tokens(&normalize(&txn.merchant)))
            >= config.merchant_overlap;
        if !category_matches && !merchant_matches {
            continue;
        }
        let key = (distance, txn.id);
        if best.map(|b| key < b).unwrap_or(true) {
            best = Some(key);
        }
    }
    best.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TransactionKind, TransactionSource};
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 10, d).unwrap()
    }

    fn txn(account: Uuid, day: u32, amount: Decimal, merchant: &str) -> Transaction {
        Transaction::new(
            date(day),
            account,
            TransactionKind::Expense,
            amount,
            "转账",
            merchant,
            "",
            TransactionSource::Manual,
        )
        .unwrap()
    }

    #[test]
    fn same_day_same_amount_matches() {
        let account = Uuid::new_v4();
        let existing = vec![txn(account, 23, dec!(1000.00), "公司")];
        let candidate = DedupCandidate {
            account_id: account,
            date: date(23),
            amount: dec!(1000.00),
            category: Some("转账"),
            merchant: "",
        };
        assert_eq!(
            find_duplicate(&candidate, &existing, &DedupConfig::default()),
            Some(existing[0].id)
        );
    }

    #[test]
    fn outside_lookback_window_does_not_match() {
        let account = Uuid::new_v4();
        let existing = vec![txn(account, 19, dec!(1000.00), "公司")];
        let candidate = DedupCandidate {
            account_id: account,
            date: date(23),
            amount: dec!(1000.00),
            category: Some("转账"),
            merchant: "公司",
        };
        assert_eq!(
            find_duplicate(&candidate, &existing, &DedupConfig::default()),
            None
        );
    }

    #[test]
    fn different_account_does_not_match() {
        let existing = vec![txn(Uuid::new_v4(), 23, dec!(1000.00), "公司")];
        let candidate = DedupCandidate {
            account_id: Uuid::new_v4(),
            date: date(23),
            amount: dec!(1000.00),
            category: Some("转账"),
            merchant: "公司",
        };
        assert_eq!(
            find_duplicate(&candidate, &existing, &DedupConfig::default()),
            None
        );
    }

    #[test]
    fn merchant_overlap_substitutes_for_category() {
        let account = Uuid::new_v4();
        let existing = vec![txn(account, 23, dec!(55.00), "luckin coffee")];
        let candidate = DedupCandidate {
            account_id: account,
            date: date(24),
            amount: dec!(55.00),
            category: Some("餐饮"),
            merchant: "luckin coffee beijing",
        };
        assert_eq!(
            find_duplicate(&candidate, &existing, &DedupConfig::default()),
            Some(existing[0].id)
        );
    }

    #[test]
    fn closest_by_date_wins_then_smallest_id() {
        let account = Uuid::new_v4();
        let near = txn(account, 23, dec!(1000.00), "公司");
        let far = txn(account, 21, dec!(1000.00), "公司");
        let candidate = DedupCandidate {
            account_id: account,
            date: date(23),
            amount: dec!(1000.00),
            category: Some("转账"),
            merchant: "公司",
        };
        let existing = vec![far.clone(), near.clone()];
        assert_eq!(
            find_duplicate(&candidate, &existing, &DedupConfig::default()),
            Some(near.id)
        );

        let twin_a = txn(account, 23, dec!(1000.00), "公司");
        let twin_b = txn(account, 23, dec!(1000.00), "公司");
        let expected = twin_a.id.min(twin_b.id);
        assert_eq!(
            find_duplicate(&candidate, &[twin_a, twin_b], &DedupConfig::default()),
            Some(expected)
        );
    }

    #[test]
    fn amount_epsilon_is_a_minor_unit() {
        let account = Uuid::new_v4();
        let existing = vec![txn(account, 23, dec!(1000.00), "公司")];
        let candidate = DedupCandidate {
            account_id: account,
            date: date(23),
            amount: dec!(1000.01),
            category: Some("转账"),
            merchant: "公司",
        };
        assert!(find_duplicate(&candidate, &existing, &DedupConfig::default()).is_some());
    }
}
