//! Bulk importer for the card index
//!
//! Reads a JSON dump of the upstream card catalogue and fully replaces the
//! local `cards` table. The importer is the only writer of that table;
//! request traffic treats it as read-only reference data.

use rusqlite::{params, Connection, Transaction};
use serde::Deserialize;
use std::path::Path;

use crate::error::{PricingError, Result};
use crate::index::{CardRecord, DbResult};

/// Card object as exported by the upstream catalogue
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCard {
    pub id: String,
    pub local_id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub hp: Option<i64>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub stage: Option<String>,
    pub set: ImportSet,
    #[serde(default)]
    pub variants: ImportVariants,
    #[serde(default)]
    pub attacks: Option<serde_json::Value>,
    #[serde(default)]
    pub weaknesses: Option<serde_json::Value>,
    #[serde(default)]
    pub resistances: Option<serde_json::Value>,
    #[serde(default)]
    pub legal: ImportLegal,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub card_count: Option<ImportCardCount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCardCount {
    #[serde(default)]
    pub total: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportVariants {
    #[serde(default)]
    pub normal: bool,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub holo: bool,
    #[serde(default)]
    pub first_edition: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLegal {
    #[serde(default)]
    pub standard: bool,
    #[serde(default)]
    pub expanded: bool,
}

impl ImportCard {
    fn into_record(self) -> CardRecord {
        let blob = |v: Option<serde_json::Value>| v.map(|v| v.to_string());
        CardRecord {
            id: self.id,
            name: self.name,
            local_id: self.local_id,
            category: self.category,
            rarity: self.rarity,
            hp: self.hp,
            types: self.types.map(|t| t.join(",")),
            stage: self.stage,
            set_id: self.set.id,
            set_name: self.set.name,
            set_total: self.set.card_count.and_then(|c| c.total),
            variant_normal: self.variants.normal,
            variant_reverse: self.variants.reverse,
            variant_holo: self.variants.holo,
            variant_first_edition: self.variants.first_edition,
            attacks: blob(self.attacks),
            weaknesses: blob(self.weaknesses),
            resistances: blob(self.resistances),
            legal_standard: self.legal.standard,
            legal_expanded: self.legal.expanded,
            image: self.image,
        }
    }
}

/// Insert card records without touching existing rows (test seeding and
/// incremental loads share this path)
pub fn insert_cards(conn: &Connection, records: &[CardRecord]) -> DbResult<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO cards
         (id, name, local_id, category, rarity, hp, types, stage,
          set_id, set_name, set_total, variant_normal, variant_reverse,
          variant_holo, variant_first_edition, attacks, weaknesses,
          resistances, legal_standard, legal_expanded, image)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                 ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
    )?;
    let mut count = 0;
    for card in records {
        stmt.execute(params![
            card.id,
            card.name,
            card.local_id,
            card.category,
            card.rarity,
            card.hp,
            card.types,
            card.stage,
            card.set_id,
            card.set_name,
            card.set_total,
            card.variant_normal,
            card.variant_reverse,
            card.variant_holo,
            card.variant_first_edition,
            card.attacks,
            card.weaknesses,
            card.resistances,
            card.legal_standard,
            card.legal_expanded,
            card.image,
        ])?;
        count += 1;
    }
    Ok(count)
}

/// Fully replace the card index with the given records
///
/// Delete-then-insert inside one transaction: a re-import either lands
/// completely or leaves the previous index untouched.
pub fn replace_all(conn: &mut Connection, records: &[CardRecord]) -> DbResult<usize> {
    let tx = conn.transaction()?;
    let count = replace_all_tx(&tx, records)?;
    tx.commit()?;
    Ok(count)
}

fn replace_all_tx(tx: &Transaction<'_>, records: &[CardRecord]) -> DbResult<usize> {
    tx.execute("DELETE FROM cards", [])?;
    let count = insert_cards(tx, records)?;
    log::info!("Replaced card index with {} cards", count);
    Ok(count)
}

/// Import a JSON card dump from disk, fully replacing the index
pub fn import_file(conn: &mut Connection, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path).map_err(PricingError::ImportRead)?;
    let cards: Vec<ImportCard> = serde_json::from_str(&content)?;
    let records: Vec<CardRecord> = cards.into_iter().map(ImportCard::into_record).collect();
    let count = replace_all(conn, &records)?;
    Ok(count)
}
