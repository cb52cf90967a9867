//! Background price monitor
//!
//! Refreshes pricing for the cards most recently seen in the history table,
//! once shortly after startup and then on a fixed schedule. Shares the daily
//! quota with interactive traffic and backs off (stops the cycle, no error)
//! as soon as the quota is exhausted.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep};

use crate::error::PricingError;
use crate::history;
use crate::pipeline::{PricingOptions, PricingService};

/// Delay before the first cycle after process start
const STARTUP_DELAY: Duration = Duration::from_secs(30);

/// Cards refreshed per cycle
const BATCH_SIZE: usize = 50;

/// Run the monitor loop. Never returns; intended for `tokio::spawn`.
pub async fn run(service: Arc<PricingService>, interval_hours: u64) {
    sleep(STARTUP_DELAY).await;
    run_cycle(&service).await;

    let mut ticker = interval(Duration::from_secs(interval_hours * 3600));
    ticker.tick().await; // the first tick completes immediately
    loop {
        ticker.tick().await;
        run_cycle(&service).await;
    }
}

/// One refresh pass over the recently priced cards
pub async fn run_cycle(service: &PricingService) {
    let cards = {
        let db = service.db();
        let conn = db.lock().unwrap();
        match history::recent_cards(&conn, BATCH_SIZE) {
            Ok(cards) => cards,
            Err(e) => {
                log::error!("Price monitor could not list tracked cards: {}", e);
                return;
            }
        }
    };

    if cards.is_empty() {
        log::debug!("Price monitor: nothing tracked yet");
        return;
    }

    log::info!("Price monitor refreshing {} card(s)", cards.len());
    let mut refreshed = 0;

    for (set_id, number, name) in cards {
        match service
            .get_card_pricing(&set_id, &number, &name, PricingOptions::default())
            .await
        {
            Ok(Some(pricing)) => {
                let db = service.db();
                let conn = db.lock().unwrap();
                if let Err(e) = history::record_snapshot(
                    &conn,
                    &set_id,
                    &number,
                    &name,
                    &pricing.headline,
                    chrono::Utc::now().date_naive(),
                ) {
                    log::warn!("Failed to record snapshot for {} {}: {}", set_id, number, e);
                } else {
                    refreshed += 1;
                }
            }
            Ok(None) => {
                log::debug!("No pricing for tracked card {} {}", set_id, number);
            }
            Err(PricingError::QuotaExceeded { retry_after }) => {
                // yield the remaining budget to interactive traffic
                log::info!(
                    "Price monitor backing off, quota exhausted until {} ({} refreshed)",
                    retry_after,
                    refreshed
                );
                return;
            }
            Err(e) => {
                log::warn!("Price monitor refresh failed for {} {}: {}", set_id, number, e);
            }
        }
    }

    log::info!("Price monitor cycle complete, {} card(s) refreshed", refreshed);
}
