//! Local card index: schema and locator queries
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! The `cards` table is bulk-created by the importer and read-only to
//! request traffic; `catalogue_products` and `price_history` are written
//! by the pipeline and recorder respectively.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::parser::canonical_number;

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

/// One row of the card index. Immutable reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: String,
    pub name: String,
    /// In-set collector number ("1", "089", "GG07")
    pub local_id: String,
    pub category: String,
    pub rarity: Option<String>,
    pub hp: Option<i64>,
    pub types: Option<String>,
    pub stage: Option<String>,
    pub set_id: String,
    pub set_name: String,
    pub set_total: Option<i64>,
    pub variant_normal: bool,
    pub variant_reverse: bool,
    pub variant_holo: bool,
    pub variant_first_edition: bool,
    /// Structured blobs kept as JSON text; the pipeline never looks inside
    pub attacks: Option<String>,
    pub weaknesses: Option<String>,
    pub resistances: Option<String>,
    pub legal_standard: bool,
    pub legal_expanded: bool,
    pub image: Option<String>,
}

/// Set listing entry derived from the card index
#[derive(Debug, Clone, Serialize)]
pub struct SetInfo {
    pub set_id: String,
    pub set_name: String,
    pub set_total: Option<i64>,
}

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `cards`: the card index (bulk-imported, read-only to requests)
/// - `catalogue_products`: external product-identity cache (upsert-only)
/// - `price_history`: daily price snapshots per (set, number, day)
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            local_id TEXT NOT NULL,
            category TEXT NOT NULL,
            rarity TEXT,
            hp INTEGER,
            types TEXT,
            stage TEXT,
            set_id TEXT NOT NULL,
            set_name TEXT NOT NULL,
            set_total INTEGER,
            variant_normal INTEGER NOT NULL DEFAULT 0,
            variant_reverse INTEGER NOT NULL DEFAULT 0,
            variant_holo INTEGER NOT NULL DEFAULT 0,
            variant_first_edition INTEGER NOT NULL DEFAULT 0,
            attacks TEXT,
            weaknesses TEXT,
            resistances TEXT,
            legal_standard INTEGER NOT NULL DEFAULT 0,
            legal_expanded INTEGER NOT NULL DEFAULT 0,
            image TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_cards_set_number ON cards(set_id, local_id);
        CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name);

        CREATE TABLE IF NOT EXISTS catalogue_products (
            product_id TEXT PRIMARY KEY,
            set_id TEXT NOT NULL,
            card_number TEXT,
            card_name TEXT,
            material TEXT,
            grade_company TEXT,
            grade_value TEXT,
            last_fetched TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_catalogue_set_number
            ON catalogue_products(set_id, card_number);

        CREATE TABLE IF NOT EXISTS price_history (
            set_id TEXT NOT NULL,
            card_number TEXT NOT NULL,
            price_date TEXT NOT NULL,
            card_name TEXT NOT NULL,
            market_price REAL,
            currency TEXT,
            last_sold_price REAL,
            last_sold_date TEXT,
            trend_7d REAL,
            trend_30d REAL,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (set_id, card_number, price_date)
        );

        CREATE INDEX IF NOT EXISTS idx_price_history_date ON price_history(price_date);
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<CardRecord> {
    Ok(CardRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        local_id: row.get(2)?,
        category: row.get(3)?,
        rarity: row.get(4)?,
        hp: row.get(5)?,
        types: row.get(6)?,
        stage: row.get(7)?,
        set_id: row.get(8)?,
        set_name: row.get(9)?,
        set_total: row.get(10)?,
        variant_normal: row.get(11)?,
        variant_reverse: row.get(12)?,
        variant_holo: row.get(13)?,
        variant_first_edition: row.get(14)?,
        attacks: row.get(15)?,
        weaknesses: row.get(16)?,
        resistances: row.get(17)?,
        legal_standard: row.get(18)?,
        legal_expanded: row.get(19)?,
        image: row.get(20)?,
    })
}

const CARD_COLUMNS: &str = "id, name, local_id, category, rarity, hp, types, stage, \
     set_id, set_name, set_total, variant_normal, variant_reverse, variant_holo, \
     variant_first_edition, attacks, weaknesses, resistances, legal_standard, \
     legal_expanded, image";

/// Candidate spellings of a purely numeric card number. The upstream source
/// is inconsistent about zero padding, so the number is also tried padded to
/// 3 digits and with leading zeros stripped.
fn number_forms(number: &str) -> Vec<String> {
    let mut forms = vec![number.to_string()];
    if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
        let padded = format!("{:0>3}", number);
        if !forms.contains(&padded) {
            forms.push(padded);
        }
        let stripped = canonical_number(number);
        if !forms.contains(&stripped) {
            forms.push(stripped);
        }
    }
    forms
}

/// Letter prefix of an alphanumeric number ("TG07" -> "TG"), if any
fn letter_prefix(number: &str) -> Option<String> {
    let prefix: String = number
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

/// Find a card by set id and in-set number
pub fn find_card(conn: &Connection, set_id: &str, number: &str) -> DbResult<Option<CardRecord>> {
    let sql = format!(
        "SELECT {} FROM cards WHERE set_id = ?1 AND local_id = ?2 COLLATE NOCASE",
        CARD_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    for form in number_forms(number) {
        let mut rows = stmt.query_map(params![set_id, form], card_from_row)?;
        if let Some(card) = rows.next() {
            return Ok(Some(card?));
        }
    }

    // prefixed numbers ("TG7" vs stored "TG07") compare canonically
    if let Some(prefix) = letter_prefix(number) {
        let sql = format!(
            "SELECT {} FROM cards
             WHERE set_id = ?1 AND local_id LIKE ?2 COLLATE NOCASE
             ORDER BY local_id",
            CARD_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let wanted = canonical_number(number);
        let cards: DbResult<Vec<CardRecord>> = stmt
            .query_map(params![set_id, format!("{}%", prefix)], card_from_row)?
            .collect();
        for card in cards? {
            if canonical_number(&card.local_id) == wanted {
                return Ok(Some(card));
            }
        }
    }
    Ok(None)
}

/// Find every card matching an in-set number across all sets
pub fn find_cards_by_number(conn: &Connection, number: &str) -> DbResult<Vec<CardRecord>> {
    let mut results: Vec<CardRecord> = Vec::new();
    let push_unique = |cards: Vec<CardRecord>, results: &mut Vec<CardRecord>| {
        for card in cards {
            if !results.iter().any(|c| c.id == card.id) {
                results.push(card);
            }
        }
    };

    let sql = format!(
        "SELECT {} FROM cards WHERE local_id = ?1 COLLATE NOCASE ORDER BY set_id",
        CARD_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    for form in number_forms(number) {
        let cards: DbResult<Vec<CardRecord>> =
            stmt.query_map(params![form], card_from_row)?.collect();
        push_unique(cards?, &mut results);
    }

    if let Some(prefix) = letter_prefix(number) {
        let sql = format!(
            "SELECT {} FROM cards WHERE local_id LIKE ?1 COLLATE NOCASE ORDER BY set_id, local_id",
            CARD_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let wanted = canonical_number(number);
        let cards: DbResult<Vec<CardRecord>> = stmt
            .query_map(params![format!("{}%", prefix)], card_from_row)?
            .collect();
        let matched: Vec<CardRecord> = cards?
            .into_iter()
            .filter(|c| canonical_number(&c.local_id) == wanted)
            .collect();
        push_unique(matched, &mut results);
    }

    Ok(results)
}

/// Disambiguate a set from a "number/total" input with no set code: return
/// the matching card from every set that contains *both* a card numbered
/// exactly `total` (proving the print run reaches that count) *and* a card
/// numbered `number`.
pub fn find_sets_by_total(
    conn: &Connection,
    total: &str,
    number: &str,
) -> DbResult<Vec<CardRecord>> {
    let total_sets: std::collections::HashSet<String> = find_cards_by_number(conn, total)?
        .into_iter()
        .map(|c| c.set_id)
        .collect();

    Ok(find_cards_by_number(conn, number)?
        .into_iter()
        .filter(|c| total_sets.contains(&c.set_id))
        .collect())
}

/// Search cards by name (case-insensitive substring match)
///
/// Returns up to `limit` results, exact name matches first, then prefix
/// matches, then the rest, alphabetically within each group.
pub fn search_by_name(conn: &Connection, query: &str, limit: usize) -> DbResult<Vec<CardRecord>> {
    let pattern = format!("%{}%", query);
    let sql = format!(
        "SELECT {} FROM cards
         WHERE name LIKE ?1 COLLATE NOCASE
         ORDER BY
             CASE WHEN name = ?2 COLLATE NOCASE THEN 0
                  WHEN name LIKE ?2 || '%' COLLATE NOCASE THEN 1
                  ELSE 2
             END,
             name, set_id, local_id
         LIMIT ?3",
        CARD_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let results: DbResult<Vec<CardRecord>> = stmt
        .query_map(params![pattern, query, limit], card_from_row)?
        .collect();
    results
}

/// All known sets, derived from the card index
pub fn distinct_sets(conn: &Connection) -> DbResult<Vec<SetInfo>> {
    let mut stmt = conn.prepare_cached(
        "SELECT set_id, set_name, MAX(set_total)
         FROM cards GROUP BY set_id, set_name ORDER BY set_id",
    )?;
    let results: DbResult<Vec<SetInfo>> = stmt
        .query_map([], |row| {
            Ok(SetInfo {
                set_id: row.get(0)?,
                set_name: row.get(1)?,
                set_total: row.get(2)?,
            })
        })?
        .collect();
    results
}

/// Total count of cards in the index
pub fn card_count(conn: &Connection) -> DbResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
}

#[cfg(test)]
pub use tests::{make_test_card, test_db};
