use serde::Serialize;

use crate::product::ProductRecord;

pub const NEUTRAL_SCORE: f64 = 5.0;
pub const PLACEHOLDER_EXPLANATION: &str = "Insufficient data to assess this metric.";

/// The eight sustainability dimensions, each scored 0-10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Emissions,
    Processing,
    WaterUsage,
    LandUse,
    SoilHealth,
    LaborPractices,
    AnimalWelfare,
    Biodiversity,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Emissions,
        Metric::Processing,
        Metric::WaterUsage,
        Metric::LandUse,
        Metric::SoilHealth,
        Metric::LaborPractices,
        Metric::AnimalWelfare,
        Metric::Biodiversity,
    ];

    /// JSON key used both in prompts and in the response.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Emissions => "emissions",
            Metric::Processing => "processing",
            Metric::WaterUsage => "water_usage",
            Metric::LandUse => "land_use",
            Metric::SoilHealth => "soil_health",
            Metric::LaborPractices => "labor_practices",
            Metric::AnimalWelfare => "animal_welfare",
            Metric::Biodiversity => "biodiversity",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Metric::Emissions => "greenhouse gas emissions across the supply chain",
            Metric::Processing => "degree of industrial processing",
            Metric::WaterUsage => "water consumption and pollution",
            Metric::LandUse => "land required to produce the ingredients",
            Metric::SoilHealth => "effect of farming practices on soil",
            Metric::LaborPractices => "fairness of working conditions",
            Metric::AnimalWelfare => "treatment of animals in the supply chain",
            Metric::Biodiversity => "impact on ecosystems and species diversity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricScore {
    pub score: f64,
    pub explanation: String,
}

impl Default for MetricScore {
    fn default() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            explanation: PLACEHOLDER_EXPLANATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SustainabilityMetrics {
    pub emissions: MetricScore,
    pub processing: MetricScore,
    pub water_usage: MetricScore,
    pub land_use: MetricScore,
    pub soil_health: MetricScore,
    pub labor_practices: MetricScore,
    pub animal_welfare: MetricScore,
    pub biodiversity: MetricScore,
}

impl SustainabilityMetrics {
    pub fn get(&self, metric: Metric) -> &MetricScore {
        match metric {
            Metric::Emissions => &self.emissions,
            Metric::Processing => &self.processing,
            Metric::WaterUsage => &self.water_usage,
            Metric::LandUse => &self.land_use,
            Metric::SoilHealth => &self.soil_health,
            Metric::LaborPractices => &self.labor_practices,
            Metric::AnimalWelfare => &self.animal_welfare,
            Metric::Biodiversity => &self.biodiversity,
        }
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut MetricScore {
        match metric {
            Metric::Emissions => &mut self.emissions,
            Metric::Processing => &mut self.processing,
            Metric::WaterUsage => &mut self.water_usage,
            Metric::LandUse => &mut self.land_use,
            Metric::SoilHealth => &mut self.soil_health,
            Metric::LaborPractices => &mut self.labor_practices,
            Metric::AnimalWelfare => &mut self.animal_welfare,
            Metric::Biodiversity => &mut self.biodiversity,
        }
    }

    /// Mean of the eight scores scaled to 0-100.
    pub fn overall_score(&self) -> f64 {
        let total: f64 = Metric::ALL.iter().map(|m| self.get(*m).score).sum();
        round1(total / Metric::ALL.len() as f64 * 10.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityAction {
    pub action: String,
    pub description: String,
    pub impact_score: f64,
}

enum Field {
    Packaging,
    Categories,
}

struct ActionRule {
    field: Field,
    keywords: &'static [&'static str],
    action: &'static str,
    description: &'static str,
    impact: f64,
}

const ACTION_RULES: &[ActionRule] = &[
    ActionRule {
        field: Field::Packaging,
        keywords: &["plastic", "polyethylene", "polypropylene", "pet bottle"],
        action: "Recycle plastic packaging",
        description: "Rinse and sort plastic packaging according to your local recycling rules.",
        impact: 6.0,
    },
    ActionRule {
        field: Field::Packaging,
        keywords: &["glass", "jar"],
        action: "Reuse the glass container",
        description: "Glass jars and bottles can be reused for storage or recycled indefinitely.",
        impact: 8.0,
    },
    ActionRule {
        field: Field::Packaging,
        keywords: &["cardboard", "paper", "carton"],
        action: "Recycle or compost cardboard",
        description: "Flatten cardboard and paper packaging for recycling, or compost it if uncoated.",
        impact: 7.0,
    },
    ActionRule {
        field: Field::Packaging,
        keywords: &["metal", "aluminium", "aluminum", "steel", "can"],
        action: "Recycle metal packaging",
        description: "Metal cans recycle without loss of quality and save significant energy.",
        impact: 8.0,
    },
    ActionRule {
        field: Field::Categories,
        keywords: &["meat", "beef", "pork", "poultry", "sausage"],
        action: "Try a plant-based swap",
        description: "Replacing meat with plant proteins once a week cuts your food footprint.",
        impact: 9.0,
    },
    ActionRule {
        field: Field::Categories,
        keywords: &["dairy", "milk", "cheese", "yogurt"],
        action: "Explore dairy alternatives",
        description: "Plant-based dairy alternatives usually need less land and water.",
        impact: 7.0,
    },
    ActionRule {
        field: Field::Categories,
        keywords: &["fruit", "vegetable", "produce"],
        action: "Buy local and seasonal produce",
        description: "Farmers markets shorten supply chains and support local growers.",
        impact: 8.0,
    },
    ActionRule {
        field: Field::Categories,
        keywords: &["beverage", "drink", "soda", "water"],
        action: "Carry a reusable bottle",
        description: "Refilling a bottle avoids single-use containers.",
        impact: 6.0,
    },
    ActionRule {
        field: Field::Categories,
        keywords: &["snack", "confectioner", "chocolate", "sweet"],
        action: "Buy snacks in bulk",
        description: "Larger packs and bulk bins mean less packaging per serving.",
        impact: 5.0,
    },
];

const FALLBACK_ACTION: ActionRule = ActionRule {
    field: Field::Categories,
    keywords: &[],
    action: "Bring reusable bags",
    description: "Reusable bags and containers reduce waste on every shopping trip.",
    impact: 5.0,
};

impl From<&ActionRule> for CommunityAction {
    fn from(rule: &ActionRule) -> Self {
        Self {
            action: rule.action.to_string(),
            description: rule.description.to_string(),
            impact_score: rule.impact,
        }
    }
}

/// Derives community actions from packaging and category keywords. Never empty.
pub fn community_actions(record: &ProductRecord) -> Vec<CommunityAction> {
    let packaging = record.packaging.to_lowercase();
    let categories = record.categories.to_lowercase();

    let actions: Vec<CommunityAction> = ACTION_RULES
        .iter()
        .filter(|rule| {
            let text = match rule.field {
                Field::Packaging => &packaging,
                Field::Categories => &categories,
            };
            rule.keywords.iter().any(|k| text.contains(k))
        })
        .map(CommunityAction::from)
        .collect();

    if actions.is_empty() {
        vec![CommunityAction::from(&FALLBACK_ACTION)]
    } else {
        actions
    }
}

pub fn community_score(actions: &[CommunityAction]) -> f64 {
    if actions.is_empty() {
        return round1(NEUTRAL_SCORE * 10.0);
    }
    let total: f64 = actions.iter().map(|a| a.impact_score).sum();
    round1(total / actions.len() as f64 * 10.0)
}

pub fn combined_score(overall: f64, community: f64) -> f64 {
    round1((overall + community) / 2.0)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
