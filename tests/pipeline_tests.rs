//! End-to-end pipeline tests against stubbed catalogue and market APIs.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use card_pricing::catalogue;
use card_pricing::importer::insert_cards;
use card_pricing::index::init_schema;
use card_pricing::{CardRecord, LookupOutcome, PricingOptions, PricingService, ServiceConfig};

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_card(set_id: &str, local_id: &str, name: &str, total: i64) -> CardRecord {
    CardRecord {
        id: format!("{}-{}", set_id, local_id),
        name: name.to_string(),
        local_id: local_id.to_string(),
        category: "Pokemon".to_string(),
        rarity: Some("Common".to_string()),
        hp: Some(60),
        types: Some("Electric".to_string()),
        stage: Some("Basic".to_string()),
        set_id: set_id.to_string(),
        set_name: "Scarlet & Violet".to_string(),
        set_total: Some(total),
        variant_normal: true,
        variant_reverse: true,
        variant_holo: false,
        variant_first_edition: false,
        attacks: None,
        weaknesses: None,
        resistances: None,
        legal_standard: true,
        legal_expanded: true,
        image: None,
    }
}

/// In-memory database seeded with one card, plus a handle kept for asserts
fn seeded_db(cards: &[CardRecord]) -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    insert_cards(&conn, cards).unwrap();
    Arc::new(Mutex::new(conn))
}

fn make_service(db: Arc<Mutex<Connection>>, base_url: &str, daily_limit: u32) -> PricingService {
    let config = ServiceConfig {
        catalogue_base_url: base_url.to_string(),
        market_base_url: base_url.to_string(),
        daily_call_limit: daily_limit,
        ..ServiceConfig::default()
    };
    PricingService::new(db, config).unwrap()
}

fn catalogue_row() -> serde_json::Value {
    serde_json::json!({
        "product_id": "prod-1",
        "card_number": "1/198",
        "material": "holo",
        "name": "Pikachu"
    })
}

fn market_body(last_sold_days_ago: i64, trend_7d: f64) -> serde_json::Value {
    let last_sold = (Utc::now() - Duration::days(last_sold_days_ago))
        .format("%Y-%m-%d")
        .to_string();
    serde_json::json!({
        "data": {
            "prod-1": [{
                "condition": "NM",
                "value": 10.0,
                "currency": "GBP",
                "last_sold_price": 9.5,
                "last_sold_date": last_sold,
                "trends": {
                    "7d": {"percentage_change": trend_7d, "previous_value": 8.3}
                }
            }]
        }
    })
}

#[tokio::test]
async fn end_to_end_price_check_with_recommendation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cards/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"cards": [catalogue_row()]})),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/prices/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(market_body(10, 20.0)))
        .mount(&server)
        .await;

    let db = seeded_db(&[test_card("sv01", "1", "Pikachu", 198)]);
    let service = make_service(Arc::clone(&db), &server.uri(), 1000);

    let result = service
        .price_check(
            "SVI 1",
            PricingOptions {
                include_graded: false,
                with_recommendation: true,
            },
        )
        .await
        .unwrap();

    match &result.lookup {
        LookupOutcome::Match { card } => assert_eq!(card.name, "Pikachu"),
        other => panic!("expected match, got {:?}", other),
    }

    let pricing = result.pricing.expect("pricing should be available");
    assert_eq!(pricing.headline.market_price, Some(10.0));
    assert_eq!(pricing.headline.currency.as_deref(), Some("GBP"));
    assert_eq!(pricing.headline.trend_7d, Some(20.0));
    assert!(pricing.variants.is_empty());

    // +10 recency (10 days), +25 trend: hot buy at 70%
    let rec = result.recommendation.expect("recommendation requested");
    assert!(rec.is_hot_buy);
    assert_eq!(rec.recommended_pct, 70);

    // the successful check left a daily history row behind
    let conn = db.lock().unwrap();
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM price_history WHERE set_id = 'sv01'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn fully_cached_lookup_makes_no_external_calls() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cards/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": [catalogue_row()]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/prices/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(market_body(2, 5.0)))
        .expect(1)
        .mount(&server)
        .await;

    let db = seeded_db(&[test_card("sv01", "1", "Pikachu", 198)]);
    let service = make_service(db, &server.uri(), 1000);

    // first call populates the product cache and the market TTL cache;
    // the second must be answered without touching either API
    for _ in 0..2 {
        let result = service
            .price_check("SVI 1", PricingOptions::default())
            .await
            .unwrap();
        assert!(result.pricing.is_some());
    }

    server.verify().await;
}

#[tokio::test]
async fn quota_exhaustion_is_a_retryable_error() {
    let server = MockServer::start().await;

    let db = seeded_db(&[test_card("sv01", "1", "Pikachu", 198)]);
    let service = make_service(db, &server.uri(), 0);

    let err = service
        .price_check("SVI 1", PricingOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_quota_exceeded());
    match err {
        card_pricing::PricingError::QuotaExceeded { retry_after } => {
            assert!(retry_after > Utc::now());
        }
        other => panic!("expected quota error, got {}", other),
    }
}

#[tokio::test]
async fn upstream_failure_degrades_to_identity_only() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cards/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = seeded_db(&[test_card("sv01", "1", "Pikachu", 198)]);
    let service = make_service(db, &server.uri(), 1000);

    let result = service
        .price_check("SVI 1", PricingOptions::default())
        .await
        .unwrap();

    // card identity still resolves; pricing is simply absent
    assert!(matches!(result.lookup, LookupOutcome::Match { .. }));
    assert!(result.pricing.is_none());
    assert!(result.recommendation.is_none());
}

#[tokio::test]
async fn search_falls_back_to_internal_set_id() {
    let server = MockServer::start().await;

    // the external-dialect id is unknown to the stub catalogue
    Mock::given(method("GET"))
        .and(path("/cards/search"))
        .and(query_param("setId", "sv1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    // the internal id works
    Mock::given(method("GET"))
        .and(path("/cards/search"))
        .and(query_param("setId", "sv01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([catalogue_row()])))
        .expect(1)
        .mount(&server)
        .await;

    let db = seeded_db(&[test_card("sv01", "1", "Pikachu", 198)]);
    let service = make_service(db, &server.uri(), 1000);

    let products = service
        .resolve_products("sv01", "1", "Pikachu", false)
        .await
        .unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].product_id, "prod-1");
    assert_eq!(products[0].material.as_deref(), Some("holo"));

    server.verify().await;
}

#[tokio::test]
async fn graded_products_ride_along_when_requested() {
    let server = MockServer::start().await;

    let db = seeded_db(&[test_card("sv01", "1", "Pikachu", 198)]);
    {
        let conn = db.lock().unwrap();
        let raw: catalogue::CatalogueCard = serde_json::from_value(catalogue_row()).unwrap();
        let slab: catalogue::CatalogueCard = serde_json::from_value(serde_json::json!({
            "product_id": "prod-9",
            "card_number": "1",
            "grade_company": "PSA",
            "grade": "10",
            "name": "Pikachu"
        }))
        .unwrap();
        catalogue::upsert_products(&conn, "sv1", &[raw, slab], Utc::now()).unwrap();
    }

    let service = make_service(db, &server.uri(), 1000);

    let raw_only = service
        .resolve_products("sv01", "1", "Pikachu", false)
        .await
        .unwrap();
    assert_eq!(raw_only.len(), 1);
    assert_eq!(raw_only[0].product_id, "prod-1");

    let with_graded = service
        .resolve_products("sv01", "1", "Pikachu", true)
        .await
        .unwrap();
    assert_eq!(with_graded.len(), 2);
    assert!(with_graded.iter().any(|p| p.product_id == "prod-9"));
}
