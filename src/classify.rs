//! Keyword and threshold rules that turn a product's ingredient text and
//! nutrient values into certification flags and health warnings.
//!
//! Everything here is a pure function of its inputs: the same ingredient text
//! always yields the same flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::product::{NutrientValue, ProductRecord};

const NON_VEGAN: &[&str] = &[
    "milk", "cream", "butter", "cheese", "whey", "casein", "lactose", "yogurt", "yoghurt", "egg",
    "honey", "gelatin", "gelatine", "meat", "beef", "pork", "chicken", "turkey", "fish", "anchovy",
    "tuna", "salmon", "shrimp", "prawn", "shellfish", "lard", "tallow", "bacon", "ham", "carmine",
    "beeswax", "collagen",
];

const NON_VEGETARIAN: &[&str] = &[
    "meat", "beef", "pork", "chicken", "turkey", "fish", "anchovy", "tuna", "salmon", "shrimp",
    "prawn", "shellfish", "lard", "tallow", "bacon", "ham", "gelatin", "gelatine", "rennet",
    "collagen",
];

const NON_HALAL: &[&str] = &[
    "pork", "bacon", "ham", "lard", "pepperoni", "gelatin", "gelatine", "alcohol", "ethanol",
    "wine", "beer", "rum", "brandy", "liqueur", "carmine",
];

const NON_KOSHER: &[&str] = &[
    "pork", "bacon", "ham", "lard", "shellfish", "shrimp", "prawn", "crab", "lobster", "oyster",
    "clam", "mussel", "squid", "octopus", "gelatin", "gelatine", "carmine",
];

const KOSHER_MEAT: &[&str] = &["meat", "beef", "chicken", "turkey", "lamb", "veal"];
const KOSHER_DAIRY: &[&str] = &["milk", "cream", "butter", "cheese", "whey", "casein"];

const GLUTEN: &[&str] = &["gluten", "wheat", "barley", "rye", "malt", "spelt", "semolina"];
const DAIRY: &[&str] = &[
    "milk", "cream", "butter", "cheese", "whey", "casein", "lactose", "yogurt", "yoghurt",
];
const NUTS: &[&str] = &[
    "nut", "almond", "hazelnut", "walnut", "cashew", "pecan", "pistachio", "peanut", "macadamia",
];

/// Derived suitability flags. All false when there is no ingredient text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Certifications {
    pub vegan: bool,
    pub halal: bool,
    pub kosher: bool,
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

impl Certifications {
    pub fn from_ingredients(ingredients: &str) -> Self {
        let text = ingredients.trim().to_lowercase();
        if text.is_empty() {
            return Self {
                vegan: false,
                halal: false,
                kosher: false,
            };
        }

        let mixes_meat_and_dairy = contains_any(&text, KOSHER_MEAT) && contains_any(&text, KOSHER_DAIRY);
        Self {
            vegan: !contains_any(&text, NON_VEGAN),
            halal: !contains_any(&text, NON_HALAL),
            kosher: !contains_any(&text, NON_KOSHER) && !mixes_meat_and_dairy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DietaryFilter {
    Vegan,
    Vegetarian,
    Halal,
    Kosher,
    GlutenFree,
    DairyFree,
    NutFree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthFilter {
    LowSugar,
    LowSodium,
    LowFat,
    Diabetic,
    HeartHealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthWarning {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl HealthWarning {
    fn new(title: &str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
            severity,
        }
    }
}

fn normalize_filter_name(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['_', ' '], "-")
}

fn parse_filters<T: for<'de> Deserialize<'de> + Ord>(names: &[String]) -> BTreeSet<T> {
    names
        .iter()
        .filter_map(|name| match serde_plain::from_str::<T>(&normalize_filter_name(name)) {
            Ok(filter) => Some(filter),
            Err(_) => {
                debug!(filter = %name, "Ignoring unknown filter");
                None
            }
        })
        .collect()
}

/// The caller's dietary and health filters, with unknown names dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveFilters {
    pub dietary: BTreeSet<DietaryFilter>,
    pub health: BTreeSet<HealthFilter>,
}

impl ActiveFilters {
    pub fn parse(dietary: &[String], health: &[String]) -> Self {
        Self {
            dietary: parse_filters(dietary),
            health: parse_filters(health),
        }
    }
}

/// Grades `value` against a (high, medium) pair of per-100g limits.
fn threshold(value: NutrientValue, high: f64, medium: f64) -> Option<(Severity, f64)> {
    let amount = value.amount()?;
    if amount > high {
        Some((Severity::High, amount))
    } else if amount > medium {
        Some((Severity::Medium, amount))
    } else {
        None
    }
}

fn nutrient_warning(
    title: &str,
    nutrient: &str,
    value: NutrientValue,
    high: f64,
    medium: f64,
) -> Option<HealthWarning> {
    threshold(value, high, medium).map(|(severity, amount)| {
        let level = match severity {
            Severity::High => "high",
            _ => "moderate",
        };
        HealthWarning::new(
            title,
            format!("This product has a {level} {nutrient} content ({amount:.1}g per 100g)."),
            severity,
        )
    })
}

/// Salt per 100g, derived from sodium when salt itself is missing.
fn salt_of(record: &ProductRecord) -> NutrientValue {
    match (record.nutriments.salt, record.nutriments.sodium) {
        (NutrientValue::Unavailable, NutrientValue::Amount(sodium)) => {
            NutrientValue::Amount(sodium * 2.5)
        }
        (salt, _) => salt,
    }
}

fn certification_warning(
    label: &str,
    certified: bool,
    ingredients_known: bool,
) -> Option<HealthWarning> {
    if certified {
        return None;
    }
    if !ingredients_known {
        return Some(HealthWarning::new(
            &format!("{label} Status Unknown"),
            format!("Ingredient information is unavailable, so this product cannot be confirmed as {}.", label.to_lowercase()),
            Severity::Medium,
        ));
    }
    Some(HealthWarning::new(
        &format!("Not {label}"),
        format!("This product contains ingredients that are not {}.", label.to_lowercase()),
        Severity::High,
    ))
}

fn allergen_warning(
    record: &ProductRecord,
    title: &str,
    ingredient_keywords: &[&str],
    allergen_tag: &str,
    what: &str,
) -> Option<HealthWarning> {
    let ingredients = record.ingredients.to_lowercase();
    let allergens = record.allergens.to_lowercase();
    if contains_any(&ingredients, ingredient_keywords) || allergens.contains(allergen_tag) {
        Some(HealthWarning::new(
            title,
            format!("This product contains {what}."),
            Severity::High,
        ))
    } else {
        None
    }
}

fn dietary_warnings(
    filter: DietaryFilter,
    record: &ProductRecord,
    certs: &Certifications,
) -> Vec<HealthWarning> {
    let ingredients_known = !record.ingredients.trim().is_empty();
    let warning = match filter {
        DietaryFilter::Vegan => certification_warning("Vegan", certs.vegan, ingredients_known),
        DietaryFilter::Halal => certification_warning("Halal", certs.halal, ingredients_known),
        DietaryFilter::Kosher => certification_warning("Kosher", certs.kosher, ingredients_known),
        DietaryFilter::Vegetarian => {
            let vegetarian = ingredients_known
                && !contains_any(&record.ingredients.to_lowercase(), NON_VEGETARIAN);
            certification_warning("Vegetarian", vegetarian, ingredients_known)
        }
        DietaryFilter::GlutenFree => {
            allergen_warning(record, "Contains Gluten", GLUTEN, "gluten", "gluten or gluten-containing grains")
        }
        DietaryFilter::DairyFree => {
            allergen_warning(record, "Contains Dairy", DAIRY, "milk", "dairy ingredients")
        }
        DietaryFilter::NutFree => {
            allergen_warning(record, "Contains Nuts", NUTS, "nut", "nuts or peanuts")
        }
    };
    warning.into_iter().collect()
}

fn health_filter_warnings(filter: HealthFilter, record: &ProductRecord) -> Vec<HealthWarning> {
    let n = &record.nutriments;
    let warnings = match filter {
        HealthFilter::LowSugar => vec![nutrient_warning("High Sugar", "sugar", n.sugars, 10.0, 5.0)],
        HealthFilter::LowSodium => vec![nutrient_warning("High Sodium", "salt", salt_of(record), 1.5, 0.3)],
        HealthFilter::LowFat => vec![nutrient_warning("High Fat", "fat", n.fat, 17.5, 3.0)],
        HealthFilter::Diabetic => vec![
            nutrient_warning("Sugar Content", "sugar", n.sugars, 10.0, 5.0),
            nutrient_warning("Carbohydrate Content", "carbohydrate", n.carbohydrates, 45.0, 20.0),
        ],
        HealthFilter::HeartHealthy => vec![
            nutrient_warning("Saturated Fat", "saturated fat", n.saturated_fat, 5.0, 1.5),
            nutrient_warning("Sodium Content", "salt", salt_of(record), 1.5, 0.3),
        ],
    };
    warnings.into_iter().flatten().collect()
}

/// Evaluates every active filter independently; warnings may co-occur.
pub fn health_warnings(
    record: &ProductRecord,
    certs: &Certifications,
    filters: &ActiveFilters,
) -> Vec<HealthWarning> {
    let dietary = filters
        .dietary
        .iter()
        .flat_map(|filter| dietary_warnings(*filter, record, certs));
    let health = filters
        .health
        .iter()
        .flat_map(|filter| health_filter_warnings(*filter, record));
    dietary.chain(health).collect()
}
