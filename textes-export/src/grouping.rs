//! Regroupement des textes par type littéraire ou par marche

use chrono::NaiveDate;

use crate::types::TexteExport;

/// Ordre éditorial des types littéraires
pub const TYPE_ORDER: &[&str] = &[
    "haiku",
    "senryu",
    "poeme",
    "haibun",
    "texte-libre",
    "fable",
    "prose",
    "recit",
];

/// Groupe de textes prêt pour la mise en page
#[derive(Debug, Clone)]
pub struct TexteGroup<'a> {
    /// Clé de regroupement (type normalisé ou identifiant de marche)
    pub key: String,
    /// Libellé affiché dans l'en-tête de section
    pub label: String,
    /// Date associée (groupes par marche uniquement)
    pub date: Option<NaiveDate>,
    /// Textes du groupe, dans l'ordre d'entrée
    pub textes: Vec<&'a TexteExport>,
}

/// Normalise un type littéraire: minuscules, sans accents, espaces → tirets
pub fn normalize_type(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' | 'ū' => 'u',
            'ç' => 'c',
            ' ' | '_' => '-',
            other => other,
        })
        .collect()
}

/// Libellé français d'un type littéraire
pub fn type_label(raw: &str) -> String {
    match normalize_type(raw).as_str() {
        "haiku" => "Haïkus".to_string(),
        "senryu" => "Senryūs".to_string(),
        "poeme" => "Poèmes".to_string(),
        "haibun" => "Haïbuns".to_string(),
        "texte-libre" => "Textes libres".to_string(),
        "fable" => "Fables".to_string(),
        "prose" => "Proses".to_string(),
        "recit" => "Récits".to_string(),
        _ => capitalize(raw.trim()),
    }
}

/// Nom singulier d'un type littéraire (ligne de métadonnées)
pub fn type_name(raw: &str) -> String {
    match normalize_type(raw).as_str() {
        "haiku" => "Haïku".to_string(),
        "senryu" => "Senryū".to_string(),
        "poeme" => "Poème".to_string(),
        "haibun" => "Haïbun".to_string(),
        "texte-libre" => "Texte libre".to_string(),
        "fable" => "Fable".to_string(),
        "prose" => "Prose".to_string(),
        "recit" => "Récit".to_string(),
        _ => capitalize(raw.trim()),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Sans type".to_string(),
    }
}

/// Regroupe par type: types connus dans l'ordre éditorial, puis types
/// inconnus dans l'ordre de première apparition.
pub fn group_by_type(textes: &[TexteExport]) -> Vec<TexteGroup<'_>> {
    let mut known: Vec<Vec<&TexteExport>> = vec![Vec::new(); TYPE_ORDER.len()];
    let mut unknown: Vec<TexteGroup<'_>> = Vec::new();

    for texte in textes {
        let key = normalize_type(&texte.type_texte);
        if let Some(idx) = TYPE_ORDER.iter().position(|t| *t == key) {
            known[idx].push(texte);
        } else if let Some(group) = unknown.iter_mut().find(|g| g.key == key) {
            group.textes.push(texte);
        } else {
            unknown.push(TexteGroup {
                label: type_label(&texte.type_texte),
                key,
                date: None,
                textes: vec![texte],
            });
        }
    }

    TYPE_ORDER
        .iter()
        .zip(known)
        .filter(|(_, textes)| !textes.is_empty())
        .map(|(key, textes)| TexteGroup {
            key: key.to_string(),
            label: type_label(key),
            date: None,
            textes,
        })
        .chain(unknown)
        .collect()
}

/// Clé du groupe des textes sans marche
pub const NO_MARCHE_KEY: &str = "sans-marche";

/// Regroupe par marche, dans l'ordre chronologique des marches.
///
/// Les marches sans date viennent après les marches datées; le groupe
/// des textes sans marche est toujours le dernier.
pub fn group_by_marche(textes: &[TexteExport]) -> Vec<TexteGroup<'_>> {
    let mut groups: Vec<TexteGroup<'_>> = Vec::new();
    let mut orphans: Vec<&TexteExport> = Vec::new();

    for texte in textes {
        let Some(marche_id) = texte.marche_id.as_deref() else {
            orphans.push(texte);
            continue;
        };
        if let Some(group) = groups.iter_mut().find(|g| g.key == marche_id) {
            if group.date.is_none() {
                group.date = texte.marche_date;
            }
            group.textes.push(texte);
        } else {
            groups.push(TexteGroup {
                key: marche_id.to_string(),
                label: marche_label(texte),
                date: texte.marche_date,
                textes: vec![texte],
            });
        }
    }

    // Tri stable: (sans date en dernier, date croissante)
    groups.sort_by_key(|g| (g.date.is_none(), g.date));

    if !orphans.is_empty() {
        groups.push(TexteGroup {
            key: NO_MARCHE_KEY.to_string(),
            label: "Sans marche".to_string(),
            date: None,
            textes: orphans,
        });
    }

    groups
}

fn marche_label(texte: &TexteExport) -> String {
    match (texte.marche_nom.as_deref(), texte.ville.as_deref()) {
        (Some(nom), Some(ville)) if !nom.is_empty() && nom != ville => {
            format!("{} ({})", nom, ville)
        }
        (Some(nom), _) if !nom.is_empty() => nom.to_string(),
        (_, Some(ville)) if !ville.is_empty() => ville.to_string(),
        _ => "Marche sans nom".to_string(),
    }
}
