//! Classification des espèces et agrégats biodiversité

use serde_json::json;

use super::SnapshotContext;
use crate::models::BiodiversitySnapshot;
use crate::sources::{BiodiversityResponse, BiodiversitySummary, SpeciesObservation};

/// Grande catégorie d'une espèce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesCategory {
    Bird,
    Plant,
    Fungus,
    Other,
}

const BIRD_KEYWORDS: &[&str] = &[
    "oiseau", "bird", "merle", "mésange", "pigeon", "corneille", "corbeau", "moineau", "héron",
    "buse", "faucon", "hirondelle", "rouge-gorge", "pinson", "fauvette", "grive", "étourneau",
    "geai", "canard", "goéland", "mouette", "rouge-queue", "bergeronnette", "sittelle",
    "troglodyte", "chouette", "hibou", "martinet", "tourterelle", "passer", "parus", "turdus",
    "corvus", "anas", "ardea", "larus",
];

const PLANT_KEYWORDS: &[&str] = &[
    "plante", "plant", "arbre", "tree", "fleur", "flower", "herbe", "grass", "chêne", "érable",
    "frêne", "saule", "peuplier", "fougère", "fern", "mousse", "moss", "graminée", "trèfle",
    "ortie", "lierre", "ronce", "pissenlit", "quercus", "acer", "salix", "populus", "fraxinus",
    "trifolium", "urtica", "hedera", "rubus", "taraxacum",
];

const FUNGI_KEYWORDS: &[&str] = &[
    "champignon", "fungus", "fungi", "mushroom", "bolet", "amanite", "lichen", "russule",
    "lactaire", "coprin", "boletus", "amanita", "russula", "lactarius", "coprinus",
];

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Règne d'abord, puis classe, puis mots-clés sur les noms
pub fn classify(species: &SpeciesObservation) -> SpeciesCategory {
    let kingdom = species.kingdom.as_deref().map(str::to_lowercase);
    match kingdom.as_deref() {
        Some("plantae") => return SpeciesCategory::Plant,
        Some("fungi") => return SpeciesCategory::Fungus,
        _ => {}
    }
    if species
        .class
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case("aves"))
    {
        return SpeciesCategory::Bird;
    }

    let names = format!(
        "{} {}",
        species.scientific_name.to_lowercase(),
        species.common_name.as_deref().unwrap_or("").to_lowercase()
    );
    if contains_any(&names, BIRD_KEYWORDS) {
        SpeciesCategory::Bird
    } else if contains_any(&names, FUNGI_KEYWORDS) {
        SpeciesCategory::Fungus
    } else if contains_any(&names, PLANT_KEYWORDS) {
        SpeciesCategory::Plant
    } else {
        SpeciesCategory::Other
    }
}

/// Résumé calculé depuis la liste d'espèces
pub fn derive_summary(species: &[SpeciesObservation]) -> BiodiversitySummary {
    let mut summary = BiodiversitySummary {
        total_species: u32::try_from(species.len()).unwrap_or(u32::MAX),
        ..Default::default()
    };
    for s in species {
        match classify(s) {
            SpeciesCategory::Bird => summary.birds = summary.birds.saturating_add(1),
            SpeciesCategory::Plant => summary.plants = summary.plants.saturating_add(1),
            SpeciesCategory::Fungus => summary.fungi = summary.fungi.saturating_add(1),
            SpeciesCategory::Other => summary.others = summary.others.saturating_add(1),
        }
        // comptes amont non bornés
        summary.recent_observations = summary.recent_observations.saturating_add(s.observations);
    }
    summary
}

/// Indice de Shannon sur les nombres d'observations par espèce.
///
/// `None` sans observation.
pub fn shannon_index(species: &[SpeciesObservation]) -> Option<f64> {
    let total: f64 = species.iter().map(|s| f64::from(s.observations)).sum();
    if total <= 0.0 {
        return None;
    }
    let h = species
        .iter()
        .filter(|s| s.observations > 0)
        .map(|s| {
            let p = f64::from(s.observations) / total;
            -p * p.ln()
        })
        .sum::<f64>();
    Some((h * 1000.0).round() / 1000.0)
}

fn to_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Construit le snapshot; le résumé amont est prioritaire s'il est présent
pub fn to_snapshot(
    ctx: &SnapshotContext,
    radius_meters: u32,
    response: &BiodiversityResponse,
) -> BiodiversitySnapshot {
    let summary = response
        .summary
        .clone()
        .unwrap_or_else(|| derive_summary(&response.species));

    BiodiversitySnapshot {
        marche_id: ctx.marche_id,
        latitude: ctx.latitude,
        longitude: ctx.longitude,
        radius_meters: to_i32(radius_meters),
        snapshot_date: ctx.snapshot_date,
        total_species: to_i32(summary.total_species),
        birds_count: to_i32(summary.birds),
        plants_count: to_i32(summary.plants),
        fungi_count: to_i32(summary.fungi),
        others_count: to_i32(summary.others),
        recent_observations: to_i32(summary.recent_observations),
        biodiversity_index: shannon_index(&response.species),
        species_data: serde_json::to_value(&response.species).unwrap_or_default(),
        methodology: response
            .methodology
            .clone()
            .unwrap_or_else(|| json!({ "radius": radius_meters, "dateFilter": "recent" })),
    }
}
