//! External catalogue client and product-identity cache
//!
//! The catalogue service maps (set, card, material/grade) to stable product
//! identifiers. Lookups go cache-first against the local
//! `catalogue_products` table; search results fetched from the API are
//! persisted unconditionally, building a durable index over time.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{PricingError, Result};
use crate::index::DbResult;
use crate::parser::canonical_number;

/// Professional grading label on an encapsulated card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub company: String,
    pub grade: String,
}

/// One product identity in the external catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    pub product_id: String,
    /// External-dialect set id
    pub set_id: String,
    pub number: String,
    pub material: Option<String>,
    /// Graded products are a distinct family, never mixed with raw variants
    pub grade: Option<Grade>,
}

impl ProductRef {
    /// Raw = ungraded physical card
    pub fn is_raw(&self) -> bool {
        self.grade.is_none()
    }
}

/// Result row from the catalogue search API
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueCard {
    pub product_id: String,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub grade_company: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CatalogueCard {
    pub fn to_product_ref(&self, set_id: &str) -> ProductRef {
        let grade = match (&self.grade_company, &self.grade) {
            (Some(company), Some(grade)) => Some(Grade {
                company: company.clone(),
                grade: grade.clone(),
            }),
            _ => None,
        };
        ProductRef {
            product_id: self.product_id.clone(),
            set_id: set_id.to_string(),
            number: self.card_number.clone().unwrap_or_default(),
            material: self.material.clone(),
            grade,
        }
    }
}

/// The search endpoint answers in one of four shapes; `Wrapped` variants
/// must come before `Bare` so untagged deserialization tries them first.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Cards { cards: Vec<CatalogueCard> },
    Data { data: Vec<CatalogueCard> },
    Results { results: Vec<CatalogueCard> },
    Bare(Vec<CatalogueCard>),
}

impl SearchResponse {
    pub fn into_cards(self) -> Vec<CatalogueCard> {
        match self {
            SearchResponse::Cards { cards } => cards,
            SearchResponse::Data { data } => data,
            SearchResponse::Results { results } => results,
            SearchResponse::Bare(cards) => cards,
        }
    }
}

/// One tier of the search fallback chain. Tiers are tried in order and the
/// first attempt returning any results wins.
#[derive(Debug, Clone)]
pub struct SearchAttempt {
    pub set_id: Option<String>,
}

/// Fallback chain for a card: external set id, internal set id when it
/// differs, then an unscoped name search as last resort.
pub fn search_attempts(external_set_id: &str, internal_set_id: &str) -> Vec<SearchAttempt> {
    let mut attempts = vec![SearchAttempt {
        set_id: Some(external_set_id.to_string()),
    }];
    if !internal_set_id.eq_ignore_ascii_case(external_set_id) {
        attempts.push(SearchAttempt {
            set_id: Some(internal_set_id.to_string()),
        });
    }
    attempts.push(SearchAttempt { set_id: None });
    attempts
}

/// HTTP client for the catalogue search API
pub struct CatalogueClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogueClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    /// Search the catalogue for cards by name, optionally scoped to a set.
    /// Graded products are excluded server-side; the raw/graded split in the
    /// local cache comes from rows the API still tags.
    pub async fn search(
        &self,
        set_id: Option<&str>,
        card_name: &str,
        limit: u32,
    ) -> Result<Vec<CatalogueCard>> {
        let mut url = format!(
            "{}/cards/search?cardName={}&excludeGraded=true&limit={}",
            self.base_url,
            urlencoding::encode(card_name),
            limit
        );
        if let Some(set_id) = set_id {
            url.push_str(&format!("&setId={}", urlencoding::encode(set_id)));
        }

        log::debug!("Catalogue search: {}", url);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(PricingError::HttpStatus(response.status()));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.into_cards())
    }
}

// ── Local product-identity cache ───────────────────────────────────────────

/// Query the local cache for raw products of (set, number), one per
/// distinct material. Exact number match is preferred; stored "89/123"
/// style numbers fall back to a prefix match for requested "89".
pub fn cached_raw_products(
    conn: &Connection,
    set_id: &str,
    number: &str,
) -> DbResult<Vec<ProductRef>> {
    let exact = query_products(
        conn,
        "SELECT product_id, set_id, card_number, material, grade_company, grade_value
         FROM catalogue_products
         WHERE set_id = ?1 AND card_number = ?2 COLLATE NOCASE
           AND grade_company IS NULL
         ORDER BY product_id",
        params![set_id, number],
    )?;
    if !exact.is_empty() {
        return Ok(one_per_material(exact));
    }

    let prefix = format!("{}/%", number);
    let by_prefix = query_products(
        conn,
        "SELECT product_id, set_id, card_number, material, grade_company, grade_value
         FROM catalogue_products
         WHERE set_id = ?1 AND card_number LIKE ?2 COLLATE NOCASE
           AND grade_company IS NULL
         ORDER BY product_id",
        params![set_id, prefix],
    )?;
    Ok(one_per_material(by_prefix))
}

/// Graded products for (set, number) - a separate family, returned only
/// when the caller explicitly asks for slab pricing.
pub fn cached_graded_products(
    conn: &Connection,
    set_id: &str,
    number: &str,
) -> DbResult<Vec<ProductRef>> {
    query_products(
        conn,
        "SELECT product_id, set_id, card_number, material, grade_company, grade_value
         FROM catalogue_products
         WHERE set_id = ?1 AND card_number = ?2 COLLATE NOCASE
           AND grade_company IS NOT NULL
         ORDER BY product_id",
        params![set_id, number],
    )
}

fn query_products(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> DbResult<Vec<ProductRef>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let results: DbResult<Vec<ProductRef>> = stmt
        .query_map(params, |row| {
            let company: Option<String> = row.get(4)?;
            let value: Option<String> = row.get(5)?;
            let grade = match (company, value) {
                (Some(company), Some(grade)) => Some(Grade { company, grade }),
                _ => None,
            };
            Ok(ProductRef {
                product_id: row.get(0)?,
                set_id: row.get(1)?,
                number: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                material: row.get(3)?,
                grade,
            })
        })?
        .collect();
    results
}

/// Persist search results into the cache. Upsert-only: rows are never
/// deleted and `last_fetched` marks staleness without enforcing a TTL.
pub fn upsert_products(
    conn: &Connection,
    set_id: &str,
    cards: &[CatalogueCard],
    now: DateTime<Utc>,
) -> DbResult<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO catalogue_products
         (product_id, set_id, card_number, card_name, material,
          grade_company, grade_value, last_fetched)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(product_id) DO UPDATE SET
             set_id = excluded.set_id,
             card_number = excluded.card_number,
             card_name = excluded.card_name,
             material = excluded.material,
             grade_company = excluded.grade_company,
             grade_value = excluded.grade_value,
             last_fetched = excluded.last_fetched",
    )?;

    let stamp = now.to_rfc3339();
    let mut count = 0;
    for card in cards {
        stmt.execute(params![
            card.product_id,
            set_id,
            card.card_number,
            card.name,
            card.material,
            card.grade_company,
            card.grade,
            stamp,
        ])?;
        count += 1;
    }
    Ok(count)
}

// ── Matching within fetched results ────────────────────────────────────────

/// Compare a stored card number against a requested one: leading zeros
/// stripped, any "/total" suffix on the stored side ignored.
pub fn number_matches(stored: &str, requested: &str) -> bool {
    let head = stored.split('/').next().unwrap_or(stored).trim();
    canonical_number(head) == canonical_number(requested)
}

fn one_per_material(products: Vec<ProductRef>) -> Vec<ProductRef> {
    let mut seen: HashSet<String> = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.material.clone().unwrap_or_default()))
        .collect()
}

/// Pick the products a fresh search actually answers the request with.
///
/// Number-matched raw candidates win, one per material. Failing that, a
/// sole number-matched candidate (graded or not) or a sole candidate
/// overall is accepted. Multiple raws with no number match is ambiguous:
/// return nothing rather than guess.
pub fn match_candidates(candidates: Vec<ProductRef>, number: &str) -> Vec<ProductRef> {
    let matched: Vec<ProductRef> = candidates
        .iter()
        .filter(|c| number_matches(&c.number, number))
        .cloned()
        .collect();

    let raw_matched: Vec<ProductRef> = matched.iter().filter(|c| c.is_raw()).cloned().collect();
    if !raw_matched.is_empty() {
        return one_per_material(raw_matched);
    }
    if matched.len() == 1 {
        return matched;
    }
    if candidates.len() == 1 {
        return candidates;
    }
    Vec::new()
}
