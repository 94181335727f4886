//! Generative enrichment of a scanned product.
//!
//! Five independent prompts are sent to the text generator through a bounded
//! pool and joined before the response is built. Each fragment has its own
//! token budget, parser and default; a failed or unparseable fragment is
//! replaced by its default and never fails the scan.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::generation::TextGenerator;
use crate::product::ProductRecord;
use crate::scoring::{Metric, MetricScore, SustainabilityMetrics, PLACEHOLDER_EXPLANATION};
use crate::tolerant;

pub const DEFAULT_CONCURRENCY: usize = 4;
const MAX_WASTE_TIPS: usize = 5;
const MAX_ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub brand: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reason: String,
}

/// Models often answer `null` for a field they have nothing for.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Everything the generator contributes to a scan response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    pub nutriscore_summary: String,
    pub ecoscore_summary: String,
    pub sustainability_metrics: SustainabilityMetrics,
    pub waste_tips: Vec<String>,
    pub alternatives: Vec<Alternative>,
    /// True when at least one fragment came from the generator.
    pub ai_generated: bool,
}

impl Enrichment {
    pub fn defaults(record: &ProductRecord) -> Self {
        Self {
            nutriscore_summary: format!("Nutri-Score: {}", record.nutriscore),
            ecoscore_summary: format!("Eco-Score: {}", record.ecoscore),
            sustainability_metrics: SustainabilityMetrics::default(),
            waste_tips: default_waste_tips(),
            alternatives: Vec::new(),
            ai_generated: false,
        }
    }

    fn merge(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::NutriScoreSummary(summary) => self.nutriscore_summary = summary,
            Fragment::EcoScoreSummary(summary) => self.ecoscore_summary = summary,
            Fragment::Metrics(metrics) => self.sustainability_metrics = metrics,
            Fragment::WasteTips(tips) => self.waste_tips = tips,
            Fragment::Alternatives(alternatives) => self.alternatives = alternatives,
        }
    }
}

fn default_waste_tips() -> Vec<String> {
    vec![
        "Check local recycling guidelines for this packaging.".to_string(),
        "Store leftovers properly to extend freshness.".to_string(),
        "Plan portions to avoid throwing food away.".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    NutriScoreSummary(String),
    EcoScoreSummary(String),
    Metrics(SustainabilityMetrics),
    WasteTips(Vec<String>),
    Alternatives(Vec<Alternative>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    NutriScoreSummary,
    EcoScoreSummary,
    Metrics,
    WasteTips,
    Alternatives,
}

#[derive(Default, Deserialize)]
struct SummaryReply {
    summary: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TipsReply {
    Wrapped { tips: Vec<String> },
    Bare(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AlternativesReply {
    Wrapped { alternatives: Vec<Alternative> },
    Bare(Vec<Alternative>),
}

fn product_context(record: &ProductRecord) -> String {
    let n = &record.nutriments;
    let or_unknown = |s: &str| if s.is_empty() { "Unknown".to_string() } else { s.to_string() };
    format!(
        "Product Information:\n\
         - Name: {}\n\
         - Brand: {}\n\
         - Categories: {}\n\
         - Ingredients: {}\n\
         - Packaging: {}\n\
         - Labels: {}\n\
         - Nutri-Score: {}\n\
         - Eco-Score: {}\n\
         - Nutrition per 100g: energy {} kcal, fat {} g, saturated fat {} g, carbohydrates {} g, \
         sugars {} g, fiber {} g, proteins {} g, salt {} g",
        record.name,
        record.brand,
        or_unknown(&record.categories),
        or_unknown(&record.ingredients),
        or_unknown(&record.packaging),
        or_unknown(&record.labels),
        record.nutriscore,
        record.ecoscore,
        n.energy,
        n.fat,
        n.saturated_fat,
        n.carbohydrates,
        n.sugars,
        n.fiber,
        n.proteins,
        n.salt,
    )
}

impl FragmentKind {
    pub const ALL: [FragmentKind; 5] = [
        FragmentKind::NutriScoreSummary,
        FragmentKind::EcoScoreSummary,
        FragmentKind::Metrics,
        FragmentKind::WasteTips,
        FragmentKind::Alternatives,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FragmentKind::NutriScoreSummary => "nutriscore_summary",
            FragmentKind::EcoScoreSummary => "ecoscore_summary",
            FragmentKind::Metrics => "sustainability_metrics",
            FragmentKind::WasteTips => "waste_tips",
            FragmentKind::Alternatives => "alternatives",
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            FragmentKind::NutriScoreSummary | FragmentKind::EcoScoreSummary => 200,
            FragmentKind::Metrics => 800,
            FragmentKind::WasteTips => 300,
            FragmentKind::Alternatives => 400,
        }
    }

    pub fn prompt(&self, record: &ProductRecord) -> String {
        let context = product_context(record);
        match self {
            FragmentKind::NutriScoreSummary => format!(
                "Write a 2-3 sentence summary of this food product's nutritional quality. \
                 The official Nutri-Score grade is {grade}; do not invent a different grade.\n\n\
                 {context}\n\n\
                 Respond only with JSON: {{\"summary\": \"...\"}}",
                grade = record.nutriscore,
            ),
            FragmentKind::EcoScoreSummary => format!(
                "Write a 2-3 sentence summary of this food product's environmental impact. \
                 The official Eco-Score grade is {grade}; do not invent a different grade.\n\n\
                 {context}\n\n\
                 Respond only with JSON: {{\"summary\": \"...\"}}",
                grade = record.ecoscore,
            ),
            FragmentKind::Metrics => {
                let rubric: Vec<String> = Metric::ALL
                    .iter()
                    .map(|m| format!("- {}: {}", m.key(), m.description()))
                    .collect();
                let example: Vec<String> = Metric::ALL
                    .iter()
                    .map(|m| format!("  \"{}\": {{\"score\": 0-10, \"explanation\": \"one sentence\"}}", m.key()))
                    .collect();
                format!(
                    "Score this food product on each sustainability metric from 0 (worst) to 10 (best).\n\
                     Metrics:\n{}\n\n{context}\n\n\
                     Respond only with JSON:\n{{\n{}\n}}",
                    rubric.join("\n"),
                    example.join(",\n"),
                )
            }
            FragmentKind::WasteTips => format!(
                "Give 3 short, practical tips for reducing waste from this product and its packaging.\n\n\
                 {context}\n\n\
                 Respond only with JSON: {{\"tips\": [\"...\", \"...\", \"...\"]}}"
            ),
            FragmentKind::Alternatives => format!(
                "Suggest up to 3 healthier or more sustainable alternatives to this product.\n\n\
                 {context}\n\n\
                 Respond only with JSON: {{\"alternatives\": [{{\"name\": \"...\", \"brand\": \"...\", \"reason\": \"...\"}}]}}"
            ),
        }
    }

    /// Parses a reply, returning `None` when it does not carry usable content.
    pub fn parse(&self, reply: &str) -> Option<Fragment> {
        match self {
            FragmentKind::NutriScoreSummary => parse_summary(reply).map(Fragment::NutriScoreSummary),
            FragmentKind::EcoScoreSummary => parse_summary(reply).map(Fragment::EcoScoreSummary),
            FragmentKind::Metrics => parse_metrics(reply).map(Fragment::Metrics),
            FragmentKind::WasteTips => {
                let tips = match tolerant::decode_or(reply, TipsReply::Bare(Vec::new())) {
                    TipsReply::Wrapped { tips } | TipsReply::Bare(tips) => tips,
                };
                let tips: Vec<String> = tips
                    .into_iter()
                    .map(|tip| tip.trim().to_string())
                    .filter(|tip| !tip.is_empty())
                    .take(MAX_WASTE_TIPS)
                    .collect();
                (!tips.is_empty()).then_some(Fragment::WasteTips(tips))
            }
            FragmentKind::Alternatives => {
                let alternatives = match tolerant::decode::<AlternativesReply>(reply)? {
                    AlternativesReply::Wrapped { alternatives } | AlternativesReply::Bare(alternatives) => {
                        alternatives
                    }
                };
                let alternatives = alternatives
                    .into_iter()
                    .filter(|alt| !alt.name.trim().is_empty())
                    .take(MAX_ALTERNATIVES)
                    .collect();
                Some(Fragment::Alternatives(alternatives))
            }
        }
    }

    async fn run(&self, generator: &dyn TextGenerator, record: &ProductRecord) -> Option<Fragment> {
        let prompt = self.prompt(record);
        let reply = match generator.generate(&prompt, self.max_tokens()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(fragment = self.name(), barcode = %record.barcode, error = %e, "Enrichment call failed");
                return None;
            }
        };

        let fragment = self.parse(&reply);
        if fragment.is_none() {
            warn!(fragment = self.name(), barcode = %record.barcode, "Unusable enrichment reply, using default");
        }
        fragment
    }
}

fn parse_summary(reply: &str) -> Option<String> {
    let summary = tolerant::decode_or(reply, SummaryReply::default()).summary;
    let summary = summary.trim();
    (!summary.is_empty()).then(|| summary.to_string())
}

fn score_of(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    score.is_finite().then(|| score.clamp(0.0, 10.0))
}

fn metric_score(value: &Value) -> Option<MetricScore> {
    match value {
        Value::Object(obj) => {
            let score = obj.get("score").and_then(score_of)?;
            let explanation = obj
                .get("explanation")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(PLACEHOLDER_EXPLANATION);
            Some(MetricScore {
                score,
                explanation: explanation.to_string(),
            })
        }
        other => score_of(other).map(|score| MetricScore {
            score,
            explanation: PLACEHOLDER_EXPLANATION.to_string(),
        }),
    }
}

/// Fills every metric the reply scores; the rest keep their neutral default.
fn parse_metrics(reply: &str) -> Option<SustainabilityMetrics> {
    let root: Map<String, Value> = tolerant::decode(reply)?;
    let metrics = match root.get("metrics") {
        Some(Value::Object(inner)) => inner,
        _ => &root,
    };

    let mut parsed = SustainabilityMetrics::default();
    let mut found = 0;
    for metric in Metric::ALL {
        if let Some(score) = metrics.get(metric.key()).and_then(metric_score) {
            *parsed.get_mut(metric) = score;
            found += 1;
        }
    }
    debug!(found, "Parsed sustainability metrics");
    (found > 0).then_some(parsed)
}

/// Runs the enrichment fan-out. Without a generator every fragment defaults.
#[derive(Clone)]
pub struct Enricher {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Enricher {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub async fn enrich(&self, record: &ProductRecord) -> Enrichment {
        let mut enrichment = Enrichment::defaults(record);
        let Some(generator) = self.generator.as_deref() else {
            return enrichment;
        };

        let fragments: Vec<Option<Fragment>> = stream::iter(FragmentKind::ALL)
            .map(|kind| async move { kind.run(generator, record).await })
            .buffer_unordered(DEFAULT_CONCURRENCY)
            .collect()
            .await;

        for fragment in fragments.into_iter().flatten() {
            enrichment.ai_generated = true;
            enrichment.merge(fragment);
        }
        enrichment
    }
}
