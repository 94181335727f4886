use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

pub const UNAVAILABLE: &str = "N/A";
pub const PRODUCT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// A per-100g nutrient amount, or the "N/A" sentinel when upstream has none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NutrientValue {
    Amount(f64),
    Unavailable,
}

impl NutrientValue {
    pub fn amount(&self) -> Option<f64> {
        match self {
            NutrientValue::Amount(value) => Some(*value),
            NutrientValue::Unavailable => None,
        }
    }

    fn from_upstream(nutriments: &Map<String, Value>, key: &str) -> Self {
        let value = match nutriments.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match value {
            Some(v) if v.is_finite() => NutrientValue::Amount(v),
            _ => NutrientValue::Unavailable,
        }
    }
}

impl fmt::Display for NutrientValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NutrientValue::Amount(value) => write!(f, "{}", value),
            NutrientValue::Unavailable => write!(f, "{}", UNAVAILABLE),
        }
    }
}

impl Serialize for NutrientValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NutrientValue::Amount(value) => serializer.serialize_f64(*value),
            NutrientValue::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Nutriments {
    pub energy: NutrientValue,
    pub fat: NutrientValue,
    pub saturated_fat: NutrientValue,
    pub carbohydrates: NutrientValue,
    pub sugars: NutrientValue,
    pub fiber: NutrientValue,
    pub proteins: NutrientValue,
    pub salt: NutrientValue,
    pub sodium: NutrientValue,
}

impl Nutriments {
    fn from_upstream(raw: &Map<String, Value>) -> Self {
        let get = |key: &str| NutrientValue::from_upstream(raw, key);
        Self {
            energy: get("energy-kcal_100g"),
            fat: get("fat_100g"),
            saturated_fat: get("saturated-fat_100g"),
            carbohydrates: get("carbohydrates_100g"),
            sugars: get("sugars_100g"),
            fiber: get("fiber_100g"),
            proteins: get("proteins_100g"),
            salt: get("salt_100g"),
            sodium: get("sodium_100g"),
        }
    }
}

/// Product data as fetched for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRecord {
    pub barcode: String,
    pub name: String,
    pub brand: String,
    pub image: String,
    pub categories: String,
    pub ingredients: String,
    pub packaging: String,
    pub labels: String,
    pub allergens: String,
    pub nutriscore: String,
    pub ecoscore: String,
    pub nutriments: Nutriments,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    product: Option<UpstreamProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpstreamProduct {
    product_name: Option<String>,
    brands: Option<String>,
    image_url: Option<String>,
    categories: Option<String>,
    ingredients_text: Option<String>,
    packaging: Option<String>,
    labels: Option<String>,
    allergens: Option<String>,
    nutriscore_grade: Option<String>,
    ecoscore_grade: Option<String>,
    nutriments: Map<String, Value>,
}

fn text_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Normalises an upstream letter grade. Anything outside A-E becomes "N/A".
pub fn normalize_grade(raw: Option<&str>) -> String {
    match raw.map(|g| g.trim().to_uppercase()) {
        Some(g) if matches!(g.as_str(), "A" | "B" | "C" | "D" | "E") => g,
        _ => UNAVAILABLE.to_string(),
    }
}

impl ProductRecord {
    fn from_upstream(barcode: &str, product: UpstreamProduct) -> Self {
        Self {
            barcode: barcode.to_string(),
            nutriscore: normalize_grade(product.nutriscore_grade.as_deref()),
            ecoscore: normalize_grade(product.ecoscore_grade.as_deref()),
            nutriments: Nutriments::from_upstream(&product.nutriments),
            name: text_or(product.product_name, "Unknown Product"),
            brand: text_or(product.brands, "Unknown Brand"),
            image: text_or(product.image_url, ""),
            categories: text_or(product.categories, ""),
            ingredients: text_or(product.ingredients_text, ""),
            packaging: text_or(product.packaging, ""),
            labels: text_or(product.labels, ""),
            allergens: text_or(product.allergens, "None specified"),
        }
    }
}

/// Keyed lookup against the Open Food Facts product endpoint.
#[derive(Clone)]
pub struct ProductClient {
    http: Client,
    base_url: Url,
}

impl ProductClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("product_scanner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| AppError::InvalidConfig(format!("invalid product API base URL: {base_url}")))?;
        Ok(Self { http, base_url })
    }

    /// The barcode is one escaped path segment, so `/`, `?` or `#` in it
    /// cannot change which resource is requested.
    pub fn product_url(&self, barcode: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&format!("{barcode}.json"));
        }
        url
    }

    /// Fetches one product. No retry: a timeout, network failure or unknown
    /// barcode is returned to the caller as is.
    pub async fn fetch(&self, barcode: &str) -> AppResult<ProductRecord> {
        let url = self.product_url(barcode);
        debug!(%url, "Fetching product");

        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            info!(barcode, "Product not found upstream");
            return Err(AppError::ProductNotFound(barcode.to_string()));
        }
        let response = response
            .error_for_status()
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let body: UpstreamResponse = response.json().await?;
        match (body.status, body.product) {
            (1, Some(product)) => Ok(ProductRecord::from_upstream(barcode, product)),
            _ => {
                info!(barcode, "Product not found upstream");
                Err(AppError::ProductNotFound(barcode.to_string()))
            }
        }
    }
}
