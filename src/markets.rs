//! Farmers market lookup: ZIP code to coordinates, coordinates to nearby
//! markets sorted by great-circle distance.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::scoring::round1;

pub const EARTH_RADIUS_MILES: f64 = 3959.0;
pub const METERS_PER_MILE: f64 = 1609.344;
pub const MAX_MARKETS: usize = 10;
pub const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);
pub const OVERPASS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPoint {
    pub coordinates: Coordinates,
    pub place: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketPoint {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub city: String,
    /// Miles, one decimal.
    pub distance: f64,
    pub coordinates: Coordinates,
}

/// Accepts exactly five ASCII digits, surrounding whitespace ignored.
pub fn validate_zipcode(raw: &str) -> AppResult<&str> {
    let zip = raw.trim();
    if zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit()) {
        Ok(zip)
    } else {
        Err(AppError::InvalidInput(
            "Please enter a valid 5-digit ZIP code".to_string(),
        ))
    }
}

/// Great-circle distance in miles.
pub fn haversine_miles(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

#[derive(Debug, Deserialize)]
struct ZipResponse {
    #[serde(default)]
    places: Vec<ZipPlace>,
}

#[derive(Debug, Deserialize)]
struct ZipPlace {
    #[serde(rename = "place name", default)]
    place_name: String,
    #[serde(default)]
    state: String,
    latitude: String,
    longitude: String,
}

#[derive(Clone)]
pub struct Geocoder {
    http: Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn locate(&self, zipcode: &str) -> AppResult<GeoPoint> {
        let url = format!("{}/{}", self.base_url, zipcode);
        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            info!(zipcode, "ZIP code not found");
            return Err(AppError::LocationNotFound(zipcode.to_string()));
        }
        let response = response
            .error_for_status()
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let body: ZipResponse = response.json().await?;
        let place = body
            .places
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LocationNotFound(zipcode.to_string()))?;

        let lat = place.latitude.trim().parse::<f64>();
        let lon = place.longitude.trim().parse::<f64>();
        match (lat, lon) {
            (Ok(lat), Ok(lon)) => Ok(GeoPoint {
                coordinates: Coordinates { lat, lon },
                place: place.place_name,
                state: place.state,
            }),
            _ => Err(AppError::LocationNotFound(zipcode.to_string())),
        }
    }
}

/// Tag categories searched for, with the label each one is reported under.
const MARKET_TAGS: &[(&str, &str, &str)] = &[
    ("amenity", "marketplace", "Farmers Market"),
    ("shop", "farm", "Farm Shop"),
    ("shop", "greengrocer", "Greengrocer"),
];

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<Coordinates>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl OverpassElement {
    fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => self.center,
        }
    }

    fn kind(&self) -> &'static str {
        MARKET_TAGS
            .iter()
            .find(|(key, value, _)| self.tags.get(*key).map(String::as_str) == Some(*value))
            .map(|(_, _, label)| *label)
            .unwrap_or("Market")
    }

    fn address(&self) -> String {
        let street = self.tags.get("addr:street").map(|s| s.trim()).unwrap_or("");
        let number = self.tags.get("addr:housenumber").map(|s| s.trim()).unwrap_or("");
        match (number.is_empty(), street.is_empty()) {
            (_, true) => "Address not available".to_string(),
            (true, false) => street.to_string(),
            (false, false) => format!("{} {}", number, street),
        }
    }

    fn into_market(self, origin: &GeoPoint) -> Option<MarketPoint> {
        let coordinates = self.coordinates()?;
        let name = self
            .tags
            .get("name")
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .unwrap_or("Unnamed Market")
            .to_string();
        let city = self
            .tags
            .get("addr:city")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| origin.place.clone());

        Some(MarketPoint {
            name,
            kind: self.kind().to_string(),
            address: self.address(),
            city,
            distance: haversine_miles(origin.coordinates, coordinates),
            coordinates,
        })
    }
}

pub fn overpass_query(center: Coordinates, radius_miles: f64) -> String {
    let radius_m = (radius_miles * METERS_PER_MILE).round();
    let clauses: String = MARKET_TAGS
        .iter()
        .flat_map(|(key, value, _)| {
            ["node", "way"].map(|element| {
                format!(
                    "{element}[\"{key}\"=\"{value}\"](around:{radius_m},{},{});",
                    center.lat, center.lon
                )
            })
        })
        .collect();
    format!("[out:json][timeout:25];({clauses});out center;")
}

#[derive(Clone)]
pub struct OverpassClient {
    http: Client,
    url: String,
}

impl OverpassClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }

    async fn query(&self, query: String) -> AppResult<OverpassResponse> {
        let response = self
            .http
            .post(&self.url)
            .form(&[("data", query)])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        Ok(response.json().await?)
    }

    /// Markets around `origin`, nearest first, at most [`MAX_MARKETS`].
    /// A failed query is logged and yields an empty list.
    pub async fn search(&self, origin: &GeoPoint, radius_miles: f64) -> Vec<MarketPoint> {
        let query = overpass_query(origin.coordinates, radius_miles);
        debug!(%query, "Querying Overpass");

        match self.query(query).await {
            Ok(response) => nearest(response.elements, origin),
            Err(e) => {
                warn!(error = %e, place = %origin.place, "Market search failed");
                Vec::new()
            }
        }
    }
}

fn nearest(elements: Vec<OverpassElement>, origin: &GeoPoint) -> Vec<MarketPoint> {
    let mut markets: Vec<MarketPoint> = elements
        .into_iter()
        .filter_map(|element| element.into_market(origin))
        .collect();
    markets.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    markets.truncate(MAX_MARKETS);
    for market in &mut markets {
        market.distance = round1(market.distance);
    }
    markets
}

/// Geocoding plus market search, built once from config.
#[derive(Clone)]
pub struct MarketFinder {
    geocoder: Geocoder,
    overpass: OverpassClient,
    radius_miles: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSearch {
    pub location: GeoPoint,
    pub markets: Vec<MarketPoint>,
}

impl MarketFinder {
    pub fn new(geocoder: Geocoder, overpass: OverpassClient, radius_miles: f64) -> Self {
        Self {
            geocoder,
            overpass,
            radius_miles,
        }
    }

    pub async fn find(&self, raw_zipcode: &str) -> AppResult<MarketSearch> {
        let zipcode = validate_zipcode(raw_zipcode)?;
        let location = self.geocoder.locate(zipcode).await?;
        let markets = self.overpass.search(&location, self.radius_miles).await;
        info!(zipcode, count = markets.len(), "Market search complete");
        Ok(MarketSearch { location, markets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn origin() -> GeoPoint {
        GeoPoint {
            coordinates: Coordinates {
                lat: 40.7128,
                lon: -74.0060,
            },
            place: "New York".into(),
            state: "New York".into(),
        }
    }

    #[test]
    fn zipcodes_must_be_five_digits() {
        assert_eq!(validate_zipcode(" 10001 ").unwrap(), "10001");
        for bad in ["", "1234", "123456", "1234a", "12 34", "１２３４５"] {
            assert!(validate_zipcode(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn haversine_matches_known_distance() {
        let nyc = Coordinates { lat: 40.7128, lon: -74.0060 };
        let la = Coordinates { lat: 34.0522, lon: -118.2437 };
        let miles = haversine_miles(nyc, la);
        assert!((miles - 2445.0).abs() < 5.0, "got {miles}");
        assert_eq!(haversine_miles(nyc, nyc), 0.0);
    }

    #[test]
    fn query_covers_all_tags_with_meter_radius() {
        let query = overpass_query(Coordinates { lat: 1.5, lon: 2.5 }, 25.0);
        assert!(query.contains("around:40234,1.5,2.5"));
        assert!(query.contains("node[\"amenity\"=\"marketplace\"]"));
        assert!(query.contains("way[\"shop\"=\"farm\"]"));
        assert!(query.contains("node[\"shop\"=\"greengrocer\"]"));
        assert!(query.ends_with("out center;"));
    }

    #[test]
    fn results_sorted_capped_and_rounded() {
        let mut elements = Vec::new();
        for i in (0..15).rev() {
            elements.push(json!({
                "type": "node",
                "lat": 40.7128 + i as f64 * 0.01,
                "lon": -74.0060,
                "tags": { "amenity": "marketplace", "name": format!("Market {i}") }
            }));
        }
        elements.push(json!({ "type": "way", "tags": { "shop": "farm" } }));
        let response: OverpassResponse = serde_json::from_value(json!({ "elements": elements })).unwrap();

        let markets = nearest(response.elements, &origin());
        assert_eq!(markets.len(), MAX_MARKETS);
        assert!(markets.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(markets[0].name, "Market 0");
        assert_eq!(markets[0].distance, 0.0);
        assert_eq!(markets[1].distance, 0.7);
    }

    #[test]
    fn element_defaults() {
        let element: OverpassElement = serde_json::from_value(json!({
            "type": "way",
            "center": { "lat": 40.72, "lon": -74.0 },
            "tags": { "shop": "greengrocer", "addr:street": "Main St", "addr:housenumber": "12" }
        }))
        .unwrap();
        let market = element.into_market(&origin()).unwrap();
        assert_eq!(market.name, "Unnamed Market");
        assert_eq!(market.kind, "Greengrocer");
        assert_eq!(market.address, "12 Main St");
        assert_eq!(market.city, "New York");

        let json = serde_json::to_value(&market).unwrap();
        assert_eq!(json["type"], "Greengrocer");
    }
}
