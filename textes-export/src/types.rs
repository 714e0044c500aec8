//! Types de données pour le crate textes-export

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Un texte littéraire tel que stocké en base, prêt pour l'export
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TexteExport {
    /// Identifiant du texte
    pub id: String,

    /// Titre du texte
    pub titre: String,

    /// Corps du texte (sous-ensemble HTML: p, div, br, span, em, i, strong, b)
    pub contenu: String,

    /// Type littéraire (haiku, senryu, poeme, ...)
    pub type_texte: String,

    /// Marche associée (optionnel)
    #[serde(default)]
    pub marche_id: Option<String>,

    /// Nom de la marche associée
    #[serde(default)]
    pub marche_nom: Option<String>,

    /// Ville de la marche
    #[serde(default)]
    pub ville: Option<String>,

    /// Région de la marche
    #[serde(default)]
    pub region: Option<String>,

    /// Date de la marche, utilisée pour l'ordre chronologique
    #[serde(default)]
    pub marche_date: Option<NaiveDate>,

    /// Ordre d'affichage dans la marche
    #[serde(default)]
    pub ordre: Option<i32>,
}

/// Segment de texte avec un style homogène
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub italic: bool,
    pub bold: bool,
}

impl Run {
    /// Segment sans mise en forme
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Segment en italique
    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            italic: true,
            bold: false,
        }
    }

    /// Segment en gras
    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            italic: false,
            bold: true,
        }
    }

    pub(crate) fn same_style(&self, other: &Run) -> bool {
        self.italic == other.italic && self.bold == other.bold
    }
}

/// Paragraphe: suite de segments stylés
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs }
    }

    /// Paragraphe d'un seul segment sans style
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            runs: vec![Run::plain(text)],
        }
    }

    /// Un paragraphe vide marque une ligne blanche (séparation de strophes)
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.is_empty())
    }

    /// Texte concaténé sans mise en forme
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Critère de regroupement des textes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// Par type littéraire (ordre éditorial fixe)
    #[default]
    Type,
    /// Par marche (ordre chronologique)
    Marche,
}

impl std::str::FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "type" | "genre" => Ok(GroupBy::Type),
            "marche" | "marches" => Ok(GroupBy::Marche),
            _ => Err(format!("Invalid grouping: {}. Use: type, marche", s)),
        }
    }
}

/// Options d'export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Titre de la page de couverture
    pub title: String,

    /// Sous-titre (optionnel)
    pub subtitle: Option<String>,

    /// Auteur affiché sur la couverture
    pub author: Option<String>,

    /// Critère de regroupement
    pub group_by: GroupBy,

    /// Insérer une page "Table des matières"
    pub include_toc: bool,

    /// Afficher la ligne de métadonnées (lieu, type) sous chaque titre
    pub include_metadata: bool,

    /// Date affichée sur la couverture
    pub generated_on: NaiveDate,

    /// Police TrueType pour le PDF (sinon Times intégrée)
    pub pdf_font: Option<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            title: "La Fréquence du Vivant".to_string(),
            subtitle: None,
            author: Some("Gaspard Boréal".to_string()),
            group_by: GroupBy::Type,
            include_toc: true,
            include_metadata: true,
            generated_on: chrono::Local::now().date_naive(),
            pdf_font: None,
        }
    }
}

/// Bloc de mise en page, indépendant du format de sortie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Titre de couverture
    CoverTitle(String),
    /// Ligne secondaire de couverture (sous-titre, auteur, date)
    CoverLine(String),
    /// Emplacement de la table des matières
    TableOfContents,
    /// En-tête de section (type ou marche) avec détail (nombre, date)
    SectionHeading { title: String, detail: String },
    /// Titre d'un texte
    EntryTitle(String),
    /// Métadonnées d'un texte (lieu, type)
    EntryMeta(String),
    /// Paragraphe du corps
    Body(Paragraph),
    /// Ornement entre deux textes
    Separator,
    /// Saut de page
    PageBreak,
}

/// Document mis en page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Document {
    /// Titres des sections, pour la table des matières
    pub fn section_titles(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::SectionHeading { title, .. } => Some(title.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Nombre de textes dans le document
    pub fn entry_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::EntryTitle(_)))
            .count()
    }
}
