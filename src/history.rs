//! Daily price history recording
//!
//! One row per (set, number, calendar day); later snapshots on the same day
//! overwrite the row. Feeds trend analytics and the price-alert collaborator,
//! which compares successive rows.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::index::DbResult;
use crate::market::PricingSnapshot;

/// One persisted daily snapshot
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPoint {
    pub set_id: String,
    pub card_number: String,
    pub price_date: String,
    pub card_name: String,
    pub market_price: Option<f64>,
    pub currency: Option<String>,
    pub last_sold_price: Option<f64>,
    pub last_sold_date: Option<String>,
    pub trend_7d: Option<f64>,
    pub trend_30d: Option<f64>,
}

/// Upsert the daily snapshot row for a card
pub fn record_snapshot(
    conn: &Connection,
    set_id: &str,
    number: &str,
    name: &str,
    snapshot: &PricingSnapshot,
    day: NaiveDate,
) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO price_history
         (set_id, card_number, price_date, card_name, market_price, currency,
          last_sold_price, last_sold_date, trend_7d, trend_30d, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, datetime('now'))
         ON CONFLICT(set_id, card_number, price_date) DO UPDATE SET
             card_name = excluded.card_name,
             market_price = excluded.market_price,
             currency = excluded.currency,
             last_sold_price = excluded.last_sold_price,
             last_sold_date = excluded.last_sold_date,
             trend_7d = excluded.trend_7d,
             trend_30d = excluded.trend_30d,
             recorded_at = excluded.recorded_at",
    )?;
    stmt.execute(params![
        set_id,
        number,
        day.format("%Y-%m-%d").to_string(),
        name,
        snapshot.market_price,
        snapshot.currency,
        snapshot.last_sold_price,
        snapshot.last_sold_date,
        snapshot.trend_7d,
        snapshot.trend_30d,
    ])?;
    Ok(())
}

fn point_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryPoint> {
    Ok(HistoryPoint {
        set_id: row.get(0)?,
        card_number: row.get(1)?,
        price_date: row.get(2)?,
        card_name: row.get(3)?,
        market_price: row.get(4)?,
        currency: row.get(5)?,
        last_sold_price: row.get(6)?,
        last_sold_date: row.get(7)?,
        trend_7d: row.get(8)?,
        trend_30d: row.get(9)?,
    })
}

const POINT_COLUMNS: &str = "set_id, card_number, price_date, card_name, market_price, \
     currency, last_sold_price, last_sold_date, trend_7d, trend_30d";

/// Chronological history for one card
pub fn get_history(conn: &Connection, set_id: &str, number: &str) -> DbResult<Vec<HistoryPoint>> {
    let sql = format!(
        "SELECT {} FROM price_history
         WHERE set_id = ?1 AND card_number = ?2 COLLATE NOCASE
         ORDER BY price_date ASC",
        POINT_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let results: DbResult<Vec<HistoryPoint>> = stmt
        .query_map(params![set_id, number], point_from_row)?
        .collect();
    results
}

/// Best 7-day movers recorded on `day`
pub fn top_movers(conn: &Connection, day: NaiveDate, limit: usize) -> DbResult<Vec<HistoryPoint>> {
    let sql = format!(
        "SELECT {} FROM price_history
         WHERE price_date = ?1 AND trend_7d IS NOT NULL
         ORDER BY trend_7d DESC
         LIMIT ?2",
        POINT_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let results: DbResult<Vec<HistoryPoint>> = stmt
        .query_map(
            params![day.format("%Y-%m-%d").to_string(), limit],
            point_from_row,
        )?
        .collect();
    results
}

/// Cards most recently seen in the history, newest first. The price
/// monitor refreshes these.
pub fn recent_cards(conn: &Connection, limit: usize) -> DbResult<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT set_id, card_number, card_name, MAX(price_date) AS latest
         FROM price_history
         GROUP BY set_id, card_number
         ORDER BY latest DESC, set_id, card_number
         LIMIT ?1",
    )?;
    let results: DbResult<Vec<(String, String, String)>> = stmt
        .query_map(params![limit], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect();
    results
}
