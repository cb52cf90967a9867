//! Card Pricing - marketplace card identity resolution and pricing engine
//!
//! Resolves free-text customer input to a canonical card identity in the
//! local card index, maps it into the external catalogue's id scheme,
//! fetches market data behind TTL caches and a daily call budget, and
//! produces a deterministic buy recommendation.

pub mod cache;
pub mod catalogue;
pub mod error;
pub mod external_id;
pub mod history;
pub mod importer;
pub mod index;
pub mod market;
pub mod monitor;
pub mod parser;
pub mod pipeline;
pub mod quota;
pub mod recommend;
pub mod sets;
pub mod web;

pub use error::{PricingError, Result};
pub use index::{init_schema, CardRecord};
pub use market::{CardPricing, PricingSnapshot};
pub use parser::{parse, ParsedInput};
pub use pipeline::{LookupOutcome, PriceCheckResult, PricingOptions, PricingService, ServiceConfig};
pub use recommend::{recommend, Recommendation};
