use serde::Serialize;
use std::time::Instant;
use tracing::info;

use crate::classify::{health_warnings, ActiveFilters, Certifications, HealthWarning};
use crate::enrichment::{Enricher, Enrichment};
use crate::error::{AppError, AppResult};
use crate::product::{ProductClient, ProductRecord};
use crate::scoring::{combined_score, community_actions, community_score, CommunityAction};

/// Payload returned by `POST /scan`. Every field is always present.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    #[serde(flatten)]
    pub product: ProductRecord,
    pub certifications: Certifications,
    pub health_warnings: Vec<HealthWarning>,
    #[serde(flatten)]
    pub enrichment: Enrichment,
    pub sustainability_score: f64,
    pub community_actions: Vec<CommunityAction>,
    pub community_score: f64,
    pub combined_score: f64,
}

impl ScanResponse {
    /// Merges the upstream record, rule-derived fields and enrichment.
    pub fn assemble(product: ProductRecord, filters: &ActiveFilters, enrichment: Enrichment) -> Self {
        let certifications = Certifications::from_ingredients(&product.ingredients);
        let health_warnings = health_warnings(&product, &certifications, filters);

        let sustainability_score = enrichment.sustainability_metrics.overall_score();
        let community_actions = community_actions(&product);
        let community_score = community_score(&community_actions);

        Self {
            success: true,
            product,
            certifications,
            health_warnings,
            enrichment,
            sustainability_score,
            community_actions,
            community_score,
            combined_score: combined_score(sustainability_score, community_score),
        }
    }
}

/// The barcode scan pipeline: lookup, classify, enrich, score.
#[derive(Clone)]
pub struct Scanner {
    products: ProductClient,
    enricher: Enricher,
}

impl Scanner {
    pub fn new(products: ProductClient, enricher: Enricher) -> Self {
        Self { products, enricher }
    }

    /// Only the product lookup can fail the scan; enrichment always yields
    /// at least its defaults.
    pub async fn scan(&self, barcode: &str, filters: &ActiveFilters) -> AppResult<ScanResponse> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return Err(AppError::InvalidInput("Barcode cannot be empty".to_string()));
        }

        let started = Instant::now();
        let product = self.products.fetch(barcode).await?;
        let enrichment = self.enricher.enrich(&product).await;
        let response = ScanResponse::assemble(product, filters, enrichment);

        info!(
            barcode,
            warnings = response.health_warnings.len(),
            ai_generated = response.enrichment.ai_generated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan complete"
        );
        Ok(response)
    }
}
