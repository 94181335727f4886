//! HTTP-level tests for the product scanner routes.
//!
//! Upstream services are replaced by httpmock servers and the text generator
//! by an in-process canned implementation.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::future::{BoxFuture, FutureExt};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use product_scanner::api::{create_router, AppState};
use product_scanner::enrichment::Enricher;
use product_scanner::error::{AppError, AppResult};
use product_scanner::generation::TextGenerator;
use product_scanner::markets::{Geocoder, MarketFinder, OverpassClient};
use product_scanner::product::ProductClient;
use product_scanner::scan::Scanner;
use product_scanner::upload::UploadStore;

const BARCODE: &str = "3017620422003";
const BOUNDARY: &str = "scanner-test-boundary";

struct Canned(fn(&str) -> AppResult<String>);

impl TextGenerator for Canned {
    fn generate<'a>(&'a self, prompt: &'a str, _max_tokens: u32) -> BoxFuture<'a, AppResult<String>> {
        let reply = (self.0)(prompt);
        async move { reply }.boxed()
    }
}

fn canned_reply(prompt: &str) -> AppResult<String> {
    let reply = if prompt.contains("nutritional quality") {
        json!({ "summary": "Very high in sugar and fat." }).to_string()
    } else if prompt.contains("environmental impact") {
        // Missing closing fence on purpose.
        "```json\n{\"summary\": \"Palm oil drives deforestation.\"}".to_string()
    } else if prompt.contains("sustainability metric") {
        json!({ "metrics": {
            "emissions": { "score": 3, "explanation": "Cocoa and palm oil." },
            "processing": { "score": 2, "explanation": "Highly processed." },
            "water_usage": { "score": 4, "explanation": "Hazelnut irrigation." },
            "land_use": { "score": 3, "explanation": "Plantations." },
            "soil_health": { "score": 4, "explanation": "Monoculture." },
            "labor_practices": { "score": 5, "explanation": "Mixed record." },
            "animal_welfare": { "score": 6, "explanation": "Dairy content." },
            "biodiversity": { "score": 2, "explanation": "Habitat loss." }
        }})
        .to_string()
    } else if prompt.contains("reducing waste") {
        json!({ "tips": ["Reuse the jar", "Scrape it clean"] }).to_string()
    } else {
        return Err(AppError::Upstream("alternatives unavailable".into()));
    };
    Ok(reply)
}

struct Upstreams {
    server: MockServer,
    uploads: TempDir,
    statics: TempDir,
}

impl Upstreams {
    async fn start() -> Self {
        let statics = TempDir::new().unwrap();
        std::fs::write(
            statics.path().join("index.html"),
            "<!DOCTYPE html><title>Product Scanner</title>",
        )
        .unwrap();

        Self {
            server: MockServer::start_async().await,
            uploads: TempDir::new().unwrap(),
            statics,
        }
    }

    fn app(&self, generator: Option<Arc<dyn TextGenerator>>, product_timeout: Duration) -> Router {
        let ai_enabled = generator.is_some();
        let scanner = Scanner::new(
            ProductClient::new(self.server.url("/api/v2/product"), product_timeout).unwrap(),
            Enricher::new(generator),
        );
        let markets = MarketFinder::new(
            Geocoder::new(self.server.url("/us"), Duration::from_secs(5)).unwrap(),
            OverpassClient::new(self.server.url("/interpreter"), Duration::from_secs(5)).unwrap(),
            25.0,
        );
        let state = AppState::new(scanner, markets, UploadStore::new(self.uploads.path()), ai_enabled);
        create_router(state, self.statics.path())
    }

    fn default_app(&self) -> Router {
        self.app(Some(Arc::new(Canned(canned_reply))), Duration::from_secs(5))
    }
}

fn nutella() -> Value {
    json!({
        "code": BARCODE,
        "status": 1,
        "status_verbose": "product found",
        "product": {
            "product_name": "Nutella",
            "brands": "Ferrero",
            "categories": "Spreads, Sweet spreads, Cocoa and hazelnuts spreads",
            "ingredients_text": "Sugar, palm oil, hazelnuts 13%, skimmed milk powder 8.7%, fat-reduced cocoa 7.4%, emulsifier: lecithins (soya), vanillin",
            "packaging": "Glass jar, plastic lid",
            "labels": "Sustainable palm oil",
            "allergens": "en:milk,en:nuts,en:soybeans",
            "nutriscore_grade": "e",
            "ecoscore_grade": "not-applicable",
            "nutriments": {
                "energy-kcal_100g": 539,
                "fat_100g": 30.9,
                "saturated-fat_100g": 10.6,
                "carbohydrates_100g": 57.5,
                "sugars_100g": 56.3,
                "proteins_100g": 6.3,
                "salt_100g": 0.107
            }
        }
    })
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn multipart_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn scan_returns_complete_payload() {
    let upstreams = Upstreams::start().await;
    let product = upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/v2/product/{BARCODE}.json"));
            then.status(200).json_body(nutella());
        })
        .await;

    let (status, body) = post_json(
        upstreams.default_app(),
        "/scan",
        json!({
            "barcode": format!("  {BARCODE} "),
            "filters": { "dietary": ["vegan", "halal", "paleo"], "health": ["low-sugar", "heart_healthy"] }
        }),
    )
    .await;

    product.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["barcode"], BARCODE);
    assert_eq!(body["name"], "Nutella");
    assert_eq!(body["nutriscore"], "E");
    assert_eq!(body["ecoscore"], "N/A");

    let nutriments = &body["nutriments"];
    assert_eq!(nutriments["sugars"], json!(56.3));
    assert_eq!(nutriments["fiber"], "N/A");
    assert_eq!(nutriments["sodium"], "N/A");

    assert_eq!(
        body["certifications"],
        json!({ "vegan": false, "halal": true, "kosher": true })
    );

    let titles: Vec<&str> = body["health_warnings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["title"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&"Not Vegan"));
    assert!(titles.contains(&"High Sugar"));
    assert!(titles.contains(&"Saturated Fat"));
    assert!(!titles.iter().any(|t| t.contains("Halal")));

    assert_eq!(body["nutriscore_summary"], "Very high in sugar and fat.");
    assert_eq!(body["ecoscore_summary"], "Palm oil drives deforestation.");
    assert_eq!(body["sustainability_metrics"]["biodiversity"]["score"], json!(2.0));
    assert_eq!(body["waste_tips"], json!(["Reuse the jar", "Scrape it clean"]));
    assert_eq!(body["alternatives"], json!([]));
    assert_eq!(body["ai_generated"], true);

    // (3 + 2 + 4 + 3 + 4 + 5 + 6 + 2) / 8 * 10
    assert_eq!(body["sustainability_score"], json!(36.3));
    // glass (8), plastic (6), sweet spreads (5)
    assert_eq!(body["community_actions"].as_array().unwrap().len(), 3);
    assert_eq!(body["community_score"], json!(63.3));
    assert_eq!(body["combined_score"], json!(49.8));
}

#[tokio::test]
async fn scan_without_generator_uses_defaults() {
    let upstreams = Upstreams::start().await;
    upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/v2/product/{BARCODE}.json"));
            then.status(200).json_body(nutella());
        })
        .await;

    let app = upstreams.app(None, Duration::from_secs(5));
    let (status, body) = post_json(app, "/scan", json!({ "barcode": BARCODE })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nutriscore_summary"], "Nutri-Score: E");
    assert_eq!(body["ecoscore_summary"], "Eco-Score: N/A");
    assert_eq!(body["ai_generated"], false);
    assert_eq!(body["health_warnings"], json!([]));
    for metric in [
        "emissions",
        "processing",
        "water_usage",
        "land_use",
        "soil_health",
        "labor_practices",
        "animal_welfare",
        "biodiversity",
    ] {
        assert_eq!(body["sustainability_metrics"][metric]["score"], json!(5.0), "{metric}");
    }
    assert_eq!(body["sustainability_score"], json!(50.0));
}

#[tokio::test]
async fn scan_rejects_missing_or_empty_barcode() {
    let upstreams = Upstreams::start().await;
    let product = upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(nutella());
        })
        .await;

    for body in [json!({}), json!({ "barcode": "   " }), json!({ "barcode": 42 })] {
        let (status, response) = post_json(upstreams.default_app(), "/scan", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/scan")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(upstreams.default_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(product.hits_async().await, 0);
}

#[tokio::test]
async fn scan_unknown_barcode_is_not_found() {
    let upstreams = Upstreams::start().await;
    upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/product/0000000000000.json");
            then.status(404)
                .json_body(json!({ "status": 0, "status_verbose": "product not found" }));
        })
        .await;
    upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/product/1111111111111.json");
            then.status(200).json_body(json!({ "status": 0 }));
        })
        .await;

    for barcode in ["0000000000000", "1111111111111"] {
        let (status, body) =
            post_json(upstreams.default_app(), "/scan", json!({ "barcode": barcode })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Product not found in database");
    }
}

#[tokio::test]
async fn scan_upstream_failures_are_server_errors() {
    let upstreams = Upstreams::start().await;
    upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/product/500.json");
            then.status(503);
        })
        .await;
    upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/product/slow.json");
            then.status(200)
                .json_body(nutella())
                .delay(Duration::from_secs(3));
        })
        .await;

    let (status, body) =
        post_json(upstreams.default_app(), "/scan", json!({ "barcode": "500" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);

    let app = upstreams.app(Some(Arc::new(Canned(canned_reply))), Duration::from_millis(500));
    let (status, body) = post_json(app, "/scan", json!({ "barcode": "slow" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Request timed out. Please try again.");
}

fn overpass_elements(count: usize) -> Value {
    let elements: Vec<Value> = (0..count)
        .rev()
        .map(|i| {
            json!({
                "type": "node",
                "id": i,
                "lat": 40.7506 + i as f64 * 0.02,
                "lon": -73.9972,
                "tags": { "amenity": "marketplace", "name": format!("Market {i}"), "addr:city": "New York" }
            })
        })
        .collect();
    json!({ "version": 0.6, "elements": elements })
}

fn geocode_body() -> Value {
    json!({
        "post code": "10001",
        "country": "United States",
        "places": [{
            "place name": "New York City",
            "longitude": "-73.9972",
            "state": "New York",
            "state abbreviation": "NY",
            "latitude": "40.7506"
        }]
    })
}

#[tokio::test]
async fn find_markets_sorts_and_caps_results() {
    let upstreams = Upstreams::start().await;
    let geocode = upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/us/10001");
            then.status(200).json_body(geocode_body());
        })
        .await;
    let overpass = upstreams
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/interpreter")
                .body_contains("marketplace");
            then.status(200).json_body(overpass_elements(14));
        })
        .await;

    let (status, body) =
        post_json(upstreams.default_app(), "/find-markets", json!({ "zipcode": "10001" })).await;

    geocode.assert_async().await;
    overpass.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["location"]["place"], "New York City");
    assert_eq!(body["count"], 10);

    let markets = body["markets"].as_array().unwrap();
    assert_eq!(markets.len(), 10);
    let distances: Vec<f64> = markets.iter().map(|m| m["distance"].as_f64().unwrap()).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(markets[0]["name"], "Market 0");
    assert_eq!(markets[0]["type"], "Farmers Market");
    assert_eq!(markets[1]["distance"], json!(1.4));
}

#[tokio::test]
async fn find_markets_rejects_bad_zip_before_network() {
    let upstreams = Upstreams::start().await;
    let geocode = upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(geocode_body());
        })
        .await;

    for zipcode in [json!("1234"), json!("123456"), json!("abcde"), json!(10001), Value::Null] {
        let (status, body) = post_json(
            upstreams.default_app(),
            "/find-markets",
            json!({ "zipcode": zipcode }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{zipcode}");
        assert_eq!(body["success"], false);
    }

    assert_eq!(geocode.hits_async().await, 0);
}

#[tokio::test]
async fn find_markets_unknown_zip_is_not_found() {
    let upstreams = Upstreams::start().await;
    upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/us/00000");
            then.status(404).json_body(json!({}));
        })
        .await;

    let (status, body) =
        post_json(upstreams.default_app(), "/find-markets", json!({ "zipcode": "00000" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Could not find location for ZIP code 00000");
}

#[tokio::test]
async fn find_markets_survives_overpass_failure() {
    let upstreams = Upstreams::start().await;
    upstreams
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/us/10001");
            then.status(200).json_body(geocode_body());
        })
        .await;
    upstreams
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/interpreter");
            then.status(504).body("gateway timeout");
        })
        .await;

    let (status, body) =
        post_json(upstreams.default_app(), "/find-markets", json!({ "zipcode": "10001" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["markets"], json!([]));
}

#[tokio::test]
async fn upload_stores_allowed_images() {
    let upstreams = Upstreams::start().await;
    let request = multipart_request("file", "my label.PNG", b"\x89PNG fake image");

    let (status, body) = send(upstreams.default_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let filename = body["filename"].as_str().unwrap();
    assert!(filename.ends_with("_my_label.PNG"), "{filename}");
    assert!(body["note"].as_str().unwrap().contains("not yet implemented"));

    let stored = std::fs::read(upstreams.uploads.path().join(filename)).unwrap();
    assert_eq!(stored, b"\x89PNG fake image");
}

#[tokio::test]
async fn upload_rejects_bad_requests() {
    let upstreams = Upstreams::start().await;

    let (status, body) = send(
        upstreams.default_app(),
        multipart_request("file", "notes.txt", b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid file type"));

    let (status, body) = send(upstreams.default_app(), multipart_request("file", "", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file selected");

    let (status, body) = send(
        upstreams.default_app(),
        multipart_request("image", "scan.png", b"data"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");

    let not_multipart = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = send(upstreams.default_app(), not_multipart).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_over_limit_is_payload_too_large() {
    let upstreams = Upstreams::start().await;
    let oversized = vec![0u8; 17 * 1024 * 1024];

    let (status, body) = send(
        upstreams.default_app(),
        multipart_request("file", "huge.png", &oversized),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "File too large. Maximum size is 16MB.");
}

#[tokio::test]
async fn index_and_health_are_served() {
    let upstreams = Upstreams::start().await;

    let response = upstreams
        .default_app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.contains("text/html"));

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(upstreams.default_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "ai_enrichment": true }));
}
