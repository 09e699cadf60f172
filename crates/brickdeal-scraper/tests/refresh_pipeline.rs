//! End-to-end refresh pipeline tests over a wiremock server and the
//! in-memory store: extraction, change-triggered history, identity remap,
//! availability, and batch behavior with a failing item.

use chrono::Utc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use brickdeal_core::{
    MemoryStore, Offer, PricePoint, PriceStore, Retailer, ScrapeConfig, SetRecord,
};
use brickdeal_scraper::{NoCatalogLookup, Refresher};

fn test_config() -> ScrapeConfig {
    ScrapeConfig {
        max_retries: 0,
        backoff_base_secs: 0,
        ..ScrapeConfig::default()
    }
}

fn test_refresher() -> Refresher<MemoryStore, NoCatalogLookup> {
    Refresher::new(MemoryStore::new(), NoCatalogLookup, &test_config())
        .expect("failed to build refresher")
}

/// Amazon-shaped page with an LD+JSON product offer.
fn amazon_page(price: &str, availability: &str) -> String {
    format!(
        r#"<html><head>
<title>LEGO Star Wars Millennium Falcon 75375 - Amazon.com</title>
<script type="application/ld+json">
{{"@context":"https://schema.org","@type":"Product",
  "name":"LEGO Star Wars Millennium Falcon 75375 Building Set",
  "image":"https://img.example.com/falcon.jpg",
  "offers":{{"@type":"Offer","price":"{price}","priceCurrency":"USD",
             "availability":"https://schema.org/{availability}",
             "seller":{{"@type":"Organization","name":"Amazon.com"}}}}}}
</script>
</head><body>
<span id="productTitle">LEGO Star Wars Millennium Falcon 75375 Building Set</span>
</body></html>"#
    )
}

#[tokio::test]
async fn happy_path_stores_offer_history_and_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dp/B0FALCON"))
        .respond_with(ResponseTemplate::new(200).set_body_string(amazon_page("84.99", "InStock")))
        .mount(&server)
        .await;

    let refresher = test_refresher();
    let url = format!("{}/dp/B0FALCON", server.uri());
    let result = refresher
        .refresh_one(Retailer::Amazon, "75375", &url)
        .await
        .unwrap();

    assert!(result.ok);
    assert_eq!(result.price_cents, Some(8499));
    assert_eq!(result.in_stock, Some(true));

    let store = refresher.store();
    let offer = store
        .find_offer("75375", Retailer::Amazon)
        .await
        .unwrap()
        .expect("offer stored");
    assert_eq!(offer.price_cents, Some(8499));
    assert_eq!(offer.url, url);

    let set = store.find_set("75375").await.unwrap().expect("set created");
    assert_eq!(set.image_url, "https://img.example.com/falcon.jpg");

    let latest = store
        .latest_history("75375", Retailer::Amazon)
        .await
        .unwrap()
        .expect("history appended");
    assert_eq!(latest.price_cents, Some(8499));
    assert_eq!(latest.in_stock, Some(true));
    assert_eq!(store.history_len().unwrap(), 1);
}

#[tokio::test]
async fn unchanged_rescrape_appends_no_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dp/B0FALCON"))
        .respond_with(ResponseTemplate::new(200).set_body_string(amazon_page("84.99", "InStock")))
        .mount(&server)
        .await;

    let refresher = test_refresher();
    let url = format!("{}/dp/B0FALCON", server.uri());
    for _ in 0..2 {
        let result = refresher
            .refresh_one(Retailer::Amazon, "75375", &url)
            .await
            .unwrap();
        assert!(result.ok);
    }

    assert_eq!(refresher.store().history_len().unwrap(), 1);
}

#[tokio::test]
async fn price_change_appends_history() {
    let server = MockServer::start().await;
    // First scrape sees 84.99, the second 74.99.
    Mock::given(method("GET"))
        .and(path("/dp/B0FALCON"))
        .respond_with(ResponseTemplate::new(200).set_body_string(amazon_page("84.99", "InStock")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dp/B0FALCON"))
        .respond_with(ResponseTemplate::new(200).set_body_string(amazon_page("74.99", "InStock")))
        .mount(&server)
        .await;

    let refresher = test_refresher();
    let url = format!("{}/dp/B0FALCON", server.uri());
    refresher
        .refresh_one(Retailer::Amazon, "75375", &url)
        .await
        .unwrap();
    let second = refresher
        .refresh_one(Retailer::Amazon, "75375", &url)
        .await
        .unwrap();

    assert_eq!(second.price_cents, Some(7499));
    let store = refresher.store();
    assert_eq!(store.history_len().unwrap(), 2);
    let latest = store
        .latest_history("75375", Retailer::Amazon)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.price_cents, Some(7499));
}

#[tokio::test]
async fn synthetic_id_is_remapped_to_catalog_id() {
    let server = MockServer::start().await;
    let page = r#"<html><head><title>LEGO Icons Retro Radio 10334 - Amazon.com</title></head>
<body>
<span id="productTitle">LEGO Icons Retro Radio 10334 Building Set for Adults</span>
<span id="priceblock_ourprice">$99.99</span>
</body></html>"#;
    Mock::given(method("GET"))
        .and(path("/dp/B0RADIO"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let refresher = test_refresher();
    let store = refresher.store();
    let url = format!("{}/dp/B0RADIO", server.uri());

    // Seed the synthetic id with an offer and a history entry.
    store
        .upsert_set(&SetRecord::placeholder("rk-B0RADIO", None))
        .await
        .unwrap();
    store
        .upsert_offer(&Offer {
            set_id: "rk-B0RADIO".to_owned(),
            retailer: Retailer::Amazon,
            url: url.clone(),
            price_cents: Some(10_999),
            in_stock: Some(true),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    store
        .append_history(&PricePoint {
            set_id: "rk-B0RADIO".to_owned(),
            retailer: Retailer::Amazon,
            price_cents: Some(10_999),
            in_stock: Some(true),
            recorded_at: Utc::now(),
        })
        .await
        .unwrap();

    let result = refresher
        .refresh_one(Retailer::Amazon, "rk-B0RADIO", &url)
        .await
        .unwrap();

    assert!(result.ok);
    assert_eq!(result.set_id, "10334");
    assert_eq!(result.price_cents, Some(9999));

    // The stale synthetic offer is gone; everything lives under 10334 now.
    assert!(store
        .find_offer("rk-B0RADIO", Retailer::Amazon)
        .await
        .unwrap()
        .is_none());
    let offer = store
        .find_offer("10334", Retailer::Amazon)
        .await
        .unwrap()
        .expect("offer under catalog id");
    assert_eq!(offer.price_cents, Some(9999));

    assert!(store
        .latest_history("rk-B0RADIO", Retailer::Amazon)
        .await
        .unwrap()
        .is_none());
    let latest = store
        .latest_history("10334", Retailer::Amazon)
        .await
        .unwrap()
        .expect("history moved to catalog id");
    assert_eq!(latest.price_cents, Some(9999));
}

#[tokio::test]
async fn unavailable_page_records_out_of_stock_without_price() {
    let server = MockServer::start().await;
    let page = r#"<html><head><title>LEGO Ideas Typewriter 21327 - Amazon.com</title></head>
<body>
<span id="productTitle">LEGO Ideas Typewriter 21327</span>
<div id="availability"><span>Currently unavailable.</span></div>
</body></html>"#;
    Mock::given(method("GET"))
        .and(path("/dp/B0TYPE"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let refresher = test_refresher();
    let url = format!("{}/dp/B0TYPE", server.uri());
    let result = refresher
        .refresh_one(Retailer::Amazon, "21327", &url)
        .await
        .unwrap();

    assert!(result.ok);
    assert_eq!(result.price_cents, None);
    assert_eq!(result.in_stock, Some(false));

    let offer = refresher
        .store()
        .find_offer("21327", Retailer::Amazon)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(offer.price_cents, None);
    assert_eq!(offer.in_stock, Some(false));
}

#[tokio::test]
async fn fetch_failure_is_a_soft_per_item_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dp/B0GONE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let refresher = test_refresher();
    let url = format!("{}/dp/B0GONE", server.uri());
    let result = refresher
        .refresh_one(Retailer::Amazon, "75375", &url)
        .await
        .unwrap();

    assert!(!result.ok);
    assert!(result.error.as_deref().unwrap_or("").contains("404"));
    // Nothing was written for the failed item.
    assert!(refresher
        .store()
        .find_offer("75375", Retailer::Amazon)
        .await
        .unwrap()
        .is_none());
    assert_eq!(refresher.store().history_len().unwrap(), 0);
}

#[tokio::test]
async fn lego_structured_page_is_parsed_without_identity_resolution() {
    let server = MockServer::start().await;
    let page = r#"<html><head>
<script type="application/ld+json">
{"@type":"Product","name":"Millennium Falcon",
 "offers":{"@type":"Offer","price":849.99,
           "availability":"http://schema.org/BackOrder"}}
</script>
</head><body></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/en-us/product/millennium-falcon-75192"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let refresher = test_refresher();
    let url = format!("{}/en-us/product/millennium-falcon-75192", server.uri());
    let result = refresher
        .refresh_one(Retailer::Lego, "75192", &url)
        .await
        .unwrap();

    assert!(result.ok);
    assert_eq!(result.price_cents, Some(84_999));
    // BackOrder maps to no explicit flag; a found price implies purchasable.
    assert_eq!(result.in_stock, Some(true));
}

#[tokio::test]
async fn batch_refresh_isolates_a_failing_item() {
    let server = MockServer::start().await;
    let ids = ["10311", "21327", "31120", "75375", "76989"];
    for id in ids {
        let template = if id == "31120" {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200).set_body_string(amazon_page("49.99", "InStock"))
        };
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}")))
            .respond_with(template)
            .mount(&server)
            .await;
    }

    let refresher = test_refresher();
    let store = refresher.store();
    for id in ids {
        store
            .upsert_set(&SetRecord::placeholder(id, None))
            .await
            .unwrap();
        store
            .upsert_offer(&Offer {
                set_id: id.to_owned(),
                retailer: Retailer::Amazon,
                url: format!("{}/item/{id}", server.uri()),
                price_cents: None,
                in_stock: None,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let summary = refresher
        .refresh_all(Retailer::Amazon, Some(2), 0)
        .await
        .unwrap();

    assert_eq!(summary.total, 5);
    assert_eq!(summary.refreshed, 4);
    assert_eq!(summary.failed, 1);
    let failed: Vec<&str> = summary
        .results
        .iter()
        .filter(|r| !r.ok)
        .map(|r| r.set_id.as_str())
        .collect();
    assert_eq!(failed, vec!["31120"]);
}

#[tokio::test]
async fn refresh_stored_without_an_offer_is_a_soft_failure() {
    let refresher = test_refresher();
    let result = refresher
        .refresh_stored(Retailer::Amazon, "75375")
        .await
        .unwrap();
    assert!(!result.ok);
    assert!(result.error.is_some());
}
