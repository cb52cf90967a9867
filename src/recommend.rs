//! Buy recommendation scoring
//!
//! A deterministic, additive score over a pricing snapshot: recency of the
//! last sale, the 7-day trend, and the 30-day trend as context. No
//! randomness, no external state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::market::PricingSnapshot;

/// Score needed before a card is flagged as a hot buy
const HOT_BUY_THRESHOLD: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Buy recommendation for a priced card
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub is_hot_buy: bool,
    pub confidence: Confidence,
    /// Suggested buy offer as a percentage of market price
    pub recommended_pct: u8,
    pub reasoning: Vec<String>,
    pub score: i32,
}

/// Days since the snapshot's last recorded sale, when both the date is
/// present and parseable (date-only or timestamp prefix accepted)
fn days_since_last_sale(snapshot: &PricingSnapshot, now: DateTime<Utc>) -> Option<i64> {
    let raw = snapshot.last_sold_date.as_deref()?;
    let date: NaiveDate = raw.get(..10)?.parse().ok()?;
    Some((now.date_naive() - date).num_days())
}

fn recommended_pct(score: i32) -> u8 {
    if score >= 40 {
        75
    } else if score >= 25 {
        70
    } else if score >= 15 {
        65
    } else if score >= 5 {
        60
    } else if score >= -5 {
        55
    } else if score >= -15 {
        50
    } else {
        45
    }
}

/// Score a snapshot into a buy recommendation
pub fn recommend(snapshot: &PricingSnapshot, now: DateTime<Utc>) -> Recommendation {
    if snapshot.market_price.is_none() {
        return Recommendation {
            is_hot_buy: false,
            confidence: Confidence::Low,
            recommended_pct: 50,
            reasoning: vec!["No market data available".to_string()],
            score: 0,
        };
    }

    let mut score = 0;
    let mut reasoning = Vec::new();

    match days_since_last_sale(snapshot, now) {
        Some(days) if days < 3 => {
            score += 20;
            reasoning.push(format!("Sold {} day(s) ago - very active", days));
        }
        Some(days) if days < 7 => {
            score += 15;
            reasoning.push(format!("Sold {} days ago - active", days));
        }
        Some(days) if days < 14 => {
            score += 10;
            reasoning.push(format!("Sold {} days ago", days));
        }
        Some(days) if days > 30 => {
            score -= 10;
            reasoning.push(format!("No sale in {} days - slow mover", days));
        }
        Some(days) => {
            reasoning.push(format!("Sold {} days ago", days));
        }
        None => {
            score -= 5;
            reasoning.push("No last-sold data".to_string());
        }
    }

    match snapshot.trend_7d {
        Some(t) if t > 15.0 => {
            score += 25;
            reasoning.push(format!("7d trend +{:.1}% - surging", t));
        }
        Some(t) if t > 5.0 => {
            score += 15;
            reasoning.push(format!("7d trend +{:.1}% - rising", t));
        }
        Some(t) if t > 0.0 => {
            score += 5;
            reasoning.push(format!("7d trend +{:.1}%", t));
        }
        Some(t) if t < -15.0 => {
            score -= 20;
            reasoning.push(format!("7d trend {:.1}% - falling hard", t));
        }
        Some(t) if t < -5.0 => {
            score -= 10;
            reasoning.push(format!("7d trend {:.1}% - falling", t));
        }
        _ => {}
    }

    match snapshot.trend_30d {
        Some(t) if t > 20.0 => {
            score += 15;
            reasoning.push(format!("30d trend +{:.1}%", t));
        }
        Some(t) if t < -20.0 => {
            score -= 15;
            reasoning.push(format!("30d trend {:.1}%", t));
        }
        _ => {}
    }

    let confidence = if score >= 40 {
        Confidence::High
    } else if score >= 20 {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    Recommendation {
        is_hot_buy: score >= HOT_BUY_THRESHOLD,
        confidence,
        recommended_pct: recommended_pct(score),
        reasoning,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::ProductRef;
    use crate::market::normalize;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-08-07T12:00:00Z".parse().unwrap()
    }

    fn snapshot(
        last_sold_days_ago: Option<i64>,
        trend_7d: Option<f64>,
        trend_30d: Option<f64>,
    ) -> PricingSnapshot {
        let mut s = priced_snapshot();
        s.last_sold_date =
            last_sold_days_ago.map(|d| (now() - Duration::days(d)).format("%Y-%m-%d").to_string());
        s.trend_7d = trend_7d;
        s.trend_30d = trend_30d;
        s
    }

    fn priced_snapshot() -> PricingSnapshot {
        let product = ProductRef {
            product_id: "p1".to_string(),
            set_id: "sv1".to_string(),
            number: "25".to_string(),
            material: None,
            grade: None,
        };
        let mut s = normalize(&product, &[]);
        s.market_price = Some(10.0);
        s.currency = Some("GBP".to_string());
        s
    }

    #[test]
    fn no_pricing_data_short_circuits() {
        let product = ProductRef {
            product_id: "p1".to_string(),
            set_id: "sv1".to_string(),
            number: "25".to_string(),
            material: None,
            grade: None,
        };
        let empty = normalize(&product, &[]);

        let rec = recommend(&empty, now());
        assert!(!rec.is_hot_buy);
        assert_eq!(rec.confidence, Confidence::Low);
        assert_eq!(rec.recommended_pct, 50);
    }

    #[test]
    fn fresh_sale_and_strong_trend_is_a_hot_buy() {
        let rec = recommend(&snapshot(Some(1), Some(20.0), None), now());
        // +20 recency, +25 trend
        assert_eq!(rec.score, 45);
        assert!(rec.is_hot_buy);
        assert_eq!(rec.confidence, Confidence::High);
        assert_eq!(rec.recommended_pct, 75);
    }

    #[test]
    fn strong_trend_with_stale_sale_is_still_hot() {
        // 10 days since sale (+10) with a surging 7d trend (+25)
        let rec = recommend(&snapshot(Some(10), Some(20.0), None), now());
        assert_eq!(rec.score, 35);
        assert!(rec.is_hot_buy);
        assert_eq!(rec.confidence, Confidence::Medium);
        assert_eq!(rec.recommended_pct, 70);
    }

    #[test]
    fn no_sale_data_penalized() {
        let rec = recommend(&snapshot(None, None, None), now());
        assert_eq!(rec.score, -5);
        assert!(!rec.is_hot_buy);
        assert_eq!(rec.recommended_pct, 55);
    }

    #[test]
    fn falling_trends_push_offer_down() {
        let rec = recommend(&snapshot(Some(40), Some(-20.0), Some(-25.0)), now());
        // -10 recency, -20 trend7, -15 trend30
        assert_eq!(rec.score, -45);
        assert!(!rec.is_hot_buy);
        assert_eq!(rec.confidence, Confidence::Low);
        assert_eq!(rec.recommended_pct, 45);
    }

    #[test]
    fn recency_score_is_monotonic_for_fixed_trends() {
        let mut last_score = i32::MIN;
        for days in [45, 20, 12, 5, 1] {
            let rec = recommend(&snapshot(Some(days), Some(8.0), Some(5.0)), now());
            assert!(
                rec.score >= last_score,
                "score regressed at {} days: {} < {}",
                days,
                rec.score,
                last_score
            );
            last_score = rec.score;
        }
    }

    #[test]
    fn pct_steps_with_score() {
        assert_eq!(recommended_pct(42), 75);
        assert_eq!(recommended_pct(30), 70);
        assert_eq!(recommended_pct(20), 65);
        assert_eq!(recommended_pct(10), 60);
        assert_eq!(recommended_pct(0), 55);
        assert_eq!(recommended_pct(-10), 50);
        assert_eq!(recommended_pct(-30), 45);
    }

    #[test]
    fn timestamp_last_sold_dates_are_accepted() {
        let mut s = priced_snapshot();
        s.last_sold_date = Some("2026-08-05T09:30:00Z".to_string());
        let rec = recommend(&s, now());
        // 2 days ago
        assert_eq!(rec.score, 20);
    }
}
