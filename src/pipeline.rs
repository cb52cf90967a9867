//! The unified pricing pipeline
//!
//! One `PricingService` sits behind every route family (public price check,
//! seller submission, vendor buy, vendor sell) and the background monitor.
//! It owns the database handle, the HTTP clients, both TTL caches and the
//! shared daily quota. Identity resolution is specific and user-facing;
//! pricing degrades to "no price available" rather than failing a request.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use crate::cache::TtlCache;
use crate::catalogue::{self, CatalogueCard, CatalogueClient, ProductRef};
use crate::error::{PricingError, Result};
use crate::external_id::to_external_set_id;
use crate::history;
use crate::index::{self, CardRecord};
use crate::market::{self, CardPricing, ConditionRecord, MarketClient, PricingSnapshot};
use crate::parser::{self, canonical_number, ParsedInput};
use crate::quota::{DailyQuota, DEFAULT_DAILY_LIMIT};
use crate::recommend::{recommend, Recommendation};
use crate::sets;

const USER_AGENT: &str = concat!("card_pricing/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);
const NAME_SEARCH_LIMIT: usize = 10;

/// Endpoint and budget configuration for the pricing service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub catalogue_base_url: String,
    pub market_base_url: String,
    pub daily_call_limit: u32,
    pub search_cache_ttl: chrono::Duration,
    pub market_cache_ttl: chrono::Duration,
    pub search_limit: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            catalogue_base_url: "https://api.cardvault.io/v1".to_string(),
            market_base_url: "https://prices.cardvault.io/v1".to_string(),
            daily_call_limit: DEFAULT_DAILY_LIMIT,
            search_cache_ttl: chrono::Duration::hours(6),
            market_cache_ttl: chrono::Duration::minutes(15),
            search_limit: 25,
        }
    }
}

/// Caller context for a pricing request
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingOptions {
    /// Also return graded (slab) products from the identity cache
    pub include_graded: bool,
    /// Attach a buy recommendation to the result
    pub with_recommendation: bool,
}

/// Identity resolution outcome. Ambiguity is not an error: the caller must
/// prompt for a choice rather than guess.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
    Match { card: CardRecord },
    Ambiguous { candidates: Vec<CardRecord> },
    NotFound { query: String },
}

/// Combined result of the shared pipeline
#[derive(Debug, Serialize)]
pub struct PriceCheckResult {
    pub lookup: LookupOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<CardPricing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

/// The pricing pipeline service shared by all routes and the monitor
pub struct PricingService {
    db: Arc<Mutex<Connection>>,
    catalogue: CatalogueClient,
    market: MarketClient,
    search_cache: Mutex<TtlCache<Vec<CatalogueCard>>>,
    market_cache: Mutex<TtlCache<HashMap<String, Vec<ConditionRecord>>>>,
    quota: Mutex<DailyQuota>,
    search_limit: u32,
}

impl PricingService {
    pub fn new(db: Arc<Mutex<Connection>>, config: ServiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            db,
            catalogue: CatalogueClient::new(http.clone(), config.catalogue_base_url),
            market: MarketClient::new(http, config.market_base_url),
            search_cache: Mutex::new(TtlCache::new(config.search_cache_ttl)),
            market_cache: Mutex::new(TtlCache::new(config.market_cache_ttl)),
            quota: Mutex::new(DailyQuota::new(config.daily_call_limit, Utc::now())),
            search_limit: config.search_limit,
        })
    }

    /// Shared database handle, for the read-only web queries
    pub fn db(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.db)
    }

    /// External API calls still available in today's budget
    pub fn quota_remaining(&self) -> u32 {
        self.quota.lock().unwrap().remaining(Utc::now())
    }

    /// Resolve free-text input to a card identity
    pub fn lookup(&self, input: &str) -> Result<LookupOutcome> {
        let conn = self.db.lock().unwrap();
        let parsed = parser::parse(input);
        log::debug!("Parsed {:?} from {:?}", parsed, input);

        let outcome = match parsed {
            ParsedInput::NameSearch { query } => outcome_from(
                index::search_by_name(&conn, &query, NAME_SEARCH_LIMIT)?,
                input,
            ),
            ParsedInput::SetAndNumber { set_code, number } => {
                match sets::resolve_set_code(&conn, &set_code)? {
                    Some(set_id) => match index::find_card(&conn, &set_id, &number)? {
                        Some(card) => LookupOutcome::Match { card },
                        None => LookupOutcome::NotFound {
                            query: input.trim().to_string(),
                        },
                    },
                    // the token was not a set code after all; the grammar is
                    // ambiguous, so retry it as a card-number prefix
                    None => {
                        let prefixed = canonical_number(&format!("{}{}", set_code, number));
                        outcome_from(index::find_cards_by_number(&conn, &prefixed)?, input)
                    }
                }
            }
            ParsedInput::BareNumber { number, total } => {
                outcome_from(index::find_sets_by_total(&conn, &total, &number)?, input)
            }
            ParsedInput::PrefixedNumber { number, total } => match total {
                Some(total) => {
                    outcome_from(index::find_sets_by_total(&conn, &total, &number)?, input)
                }
                None => outcome_from(index::find_cards_by_number(&conn, &number)?, input),
            },
        };
        Ok(outcome)
    }

    /// Resolve products and fetch normalized pricing for a card.
    /// `None` means no pricing is available, which is not an error.
    pub async fn get_card_pricing(
        &self,
        set_id: &str,
        number: &str,
        name: &str,
        opts: PricingOptions,
    ) -> Result<Option<CardPricing>> {
        let products = self
            .resolve_products(set_id, number, name, opts.include_graded)
            .await?;
        if products.is_empty() {
            log::info!("No products resolved for {} {} ({})", set_id, number, name);
            return Ok(None);
        }

        let snapshots = self.fetch_and_normalize(&products).await?;
        let mut snapshots = snapshots.into_iter();
        match snapshots.next() {
            Some(headline) => Ok(Some(CardPricing {
                headline,
                variants: snapshots.collect(),
            })),
            None => Ok(None),
        }
    }

    /// The single entry point the four route families share
    pub async fn price_check(&self, input: &str, opts: PricingOptions) -> Result<PriceCheckResult> {
        let lookup = self.lookup(input)?;
        let card = match &lookup {
            LookupOutcome::Match { card } => card.clone(),
            _ => {
                return Ok(PriceCheckResult {
                    lookup,
                    pricing: None,
                    recommendation: None,
                })
            }
        };

        let pricing = match self
            .get_card_pricing(&card.set_id, &card.local_id, &card.name, opts)
            .await
        {
            Ok(pricing) => pricing,
            Err(e) if e.is_quota_exceeded() => return Err(e),
            Err(e) => {
                // identity is the higher-value half of the response; pricing
                // failures degrade instead of failing the request
                log::warn!(
                    "Pricing unavailable for {} {}: {}",
                    card.set_id,
                    card.local_id,
                    e
                );
                None
            }
        };

        if let Some(pricing) = &pricing {
            let conn = self.db.lock().unwrap();
            if let Err(e) = history::record_snapshot(
                &conn,
                &card.set_id,
                &card.local_id,
                &card.name,
                &pricing.headline,
                Utc::now().date_naive(),
            ) {
                log::warn!(
                    "Failed to record price history for {} {}: {}",
                    card.set_id,
                    card.local_id,
                    e
                );
            }
        }

        let recommendation = match (&pricing, opts.with_recommendation) {
            (Some(pricing), true) => Some(recommend(&pricing.headline, Utc::now())),
            _ => None,
        };

        Ok(PriceCheckResult {
            lookup,
            pricing,
            recommendation,
        })
    }

    /// Resolve the external products for a card, cache-first
    pub async fn resolve_products(
        &self,
        internal_set_id: &str,
        number: &str,
        name: &str,
        include_graded: bool,
    ) -> Result<Vec<ProductRef>> {
        let external_set_id = to_external_set_id(internal_set_id);
        let number = canonical_number(number);

        let mut products = {
            let conn = self.db.lock().unwrap();
            catalogue::cached_raw_products(&conn, &external_set_id, &number)?
        };

        if products.is_empty() {
            products = self
                .search_catalogue(&external_set_id, internal_set_id, &number, name)
                .await?;
        } else {
            log::debug!(
                "Product cache hit for {} {} ({} variant(s))",
                external_set_id,
                number,
                products.len()
            );
        }

        if include_graded {
            let conn = self.db.lock().unwrap();
            match catalogue::cached_graded_products(&conn, &external_set_id, &number) {
                Ok(graded) => products.extend(graded),
                Err(e) => log::warn!("Graded product lookup failed: {}", e),
            }
        }

        Ok(products)
    }

    /// Catalogue API fallback chain: external set id, internal set id,
    /// unscoped. First non-empty response wins; a failed tier is logged and
    /// the next one tried; quota exhaustion propagates.
    async fn search_catalogue(
        &self,
        external_set_id: &str,
        internal_set_id: &str,
        number: &str,
        name: &str,
    ) -> Result<Vec<ProductRef>> {
        let attempts = catalogue::search_attempts(external_set_id, internal_set_id);
        let mut found: Vec<CatalogueCard> = Vec::new();

        for attempt in &attempts {
            match self.cached_search(attempt.set_id.as_deref(), name).await {
                Ok(cards) if !cards.is_empty() => {
                    found = cards;
                    break;
                }
                Ok(_) => {}
                Err(e @ PricingError::QuotaExceeded { .. }) => return Err(e),
                Err(e) => {
                    log::warn!("Catalogue search failed (set {:?}): {}", attempt.set_id, e);
                }
            }
        }

        if found.is_empty() {
            return Ok(Vec::new());
        }

        // persist every returned row, match or not: the cache doubles as a
        // durable index that amortizes future lookups for the same set
        {
            let conn = self.db.lock().unwrap();
            if let Err(e) = catalogue::upsert_products(&conn, external_set_id, &found, Utc::now()) {
                log::warn!("Failed to persist catalogue products: {}", e);
            }
        }

        let candidates: Vec<ProductRef> = found
            .iter()
            .map(|c| c.to_product_ref(external_set_id))
            .collect();
        Ok(catalogue::match_candidates(candidates, number))
    }

    /// Catalogue search through the TTL cache and the daily quota
    async fn cached_search(
        &self,
        set_id: Option<&str>,
        name: &str,
    ) -> Result<Vec<CatalogueCard>> {
        let key = format!("{}|{}", set_id.unwrap_or(""), name.to_lowercase());
        let now = Utc::now();

        let cached = self.search_cache.lock().unwrap().get(&key, now);
        if let Some(hit) = cached {
            log::debug!("Catalogue search cache hit: {}", key);
            return Ok(hit);
        }

        // quota check happens before any network I/O
        self.quota.lock().unwrap().check_and_increment(now)?;
        let cards = self.catalogue.search(set_id, name, self.search_limit).await?;
        self.search_cache
            .lock()
            .unwrap()
            .insert(key, cards.clone(), Utc::now());
        Ok(cards)
    }

    /// Fetch market data for the resolved products, one snapshot per
    /// product that actually has condition records
    pub async fn fetch_and_normalize(
        &self,
        products: &[ProductRef],
    ) -> Result<Vec<PricingSnapshot>> {
        let ids: Vec<String> = products.iter().map(|p| p.product_id.clone()).collect();
        let key = ids.join(",");
        let now = Utc::now();

        let cached = self.market_cache.lock().unwrap().get(&key, now);
        let records: HashMap<String, Vec<ConditionRecord>> = match cached {
            Some(hit) => {
                log::debug!("Market data cache hit: {}", key);
                hit
            }
            None => {
                self.quota.lock().unwrap().check_and_increment(now)?;
                let fetched = self.market.fetch_batch(&ids).await?;
                self.market_cache
                    .lock()
                    .unwrap()
                    .insert(key, fetched.clone(), Utc::now());
                fetched
            }
        };

        let mut snapshots = Vec::new();
        for product in products {
            match records.get(&product.product_id) {
                Some(conditions) if !conditions.is_empty() => {
                    snapshots.push(market::normalize(product, conditions));
                }
                _ => {
                    log::debug!("No market records for product {}", product.product_id);
                }
            }
        }
        Ok(snapshots)
    }
}

fn outcome_from(mut cards: Vec<CardRecord>, query: &str) -> LookupOutcome {
    match cards.len() {
        0 => LookupOutcome::NotFound {
            query: query.trim().to_string(),
        },
        1 => LookupOutcome::Match {
            card: cards.remove(0),
        },
        _ => LookupOutcome::Ambiguous { candidates: cards },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::insert_cards;
    use crate::index::{init_schema, make_test_card};

    fn service_with_cards(cards: Vec<CardRecord>) -> PricingService {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        insert_cards(&conn, &cards).unwrap();
        PricingService::new(Arc::new(Mutex::new(conn)), ServiceConfig::default()).unwrap()
    }

    #[test]
    fn lookup_by_set_code_and_number() {
        let service = service_with_cards(vec![make_test_card("sv01", "25", "Pikachu")]);

        match service.lookup("SVI 025").unwrap() {
            LookupOutcome::Match { card } => assert_eq!(card.name, "Pikachu"),
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn lookup_by_bare_number_disambiguates_via_total() {
        let mut energy = make_test_card("sv01", "198", "Basic Energy");
        energy.set_total = Some(198);
        let service = service_with_cards(vec![make_test_card("sv01", "4", "Charmander"), energy]);

        match service.lookup("4/198").unwrap() {
            LookupOutcome::Match { card } => {
                assert_eq!(card.set_id, "sv01");
                assert_eq!(card.name, "Charmander");
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn lookup_reports_ambiguity_instead_of_guessing() {
        let service = service_with_cards(vec![
            make_test_card("sv01", "4", "Charmander"),
            make_test_card("sv01", "198", "Energy"),
            make_test_card("sv02", "4", "Weedle"),
            make_test_card("sv02", "198", "Energy"),
        ]);

        match service.lookup("4/198").unwrap() {
            LookupOutcome::Ambiguous { candidates } => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn lookup_falls_back_to_prefix_when_set_code_unknown() {
        let service = service_with_cards(vec![make_test_card("sv08.5", "TG07", "Mimikyu")]);

        // "TG" is not a set code; "TG 07" must be reinterpreted as "TG7"
        match service.lookup("TG 07").unwrap() {
            LookupOutcome::Match { card } => assert_eq!(card.name, "Mimikyu"),
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn lookup_by_name_search() {
        let service = service_with_cards(vec![make_test_card("sv01", "25", "Pikachu")]);

        match service.lookup("pikachu").unwrap() {
            LookupOutcome::Match { card } => assert_eq!(card.local_id, "25"),
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn lookup_not_found_keeps_the_query() {
        let service = service_with_cards(vec![]);

        match service.lookup("  no such card ").unwrap() {
            LookupOutcome::NotFound { query } => assert_eq!(query, "no such card"),
            other => panic!("expected not-found, got {:?}", other),
        }
    }
}
