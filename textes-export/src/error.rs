//! Types d'erreurs pour le crate textes-export

use thiserror::Error;

/// Erreurs pouvant survenir lors de l'export des textes
#[derive(Debug, Error)]
pub enum ExportError {
    /// Erreur d'I/O (lecture de police, écriture du fichier)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Aucun texte à exporter
    #[error("Nothing to export: the text list is empty")]
    EmptyInput,

    /// Format de sortie inconnu
    #[error("Unknown export format: {0}. Use: docx, pdf, csv")]
    UnknownFormat(String),

    /// Option d'export invalide
    #[error("Invalid export option {option}: {reason}")]
    InvalidOption { option: String, reason: String },

    /// Échec du rendu dans un format donné
    #[error("Rendering failed ({format}): {reason}")]
    Render { format: &'static str, reason: String },
}

impl ExportError {
    /// Crée une erreur de rendu avec contexte
    pub fn render(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Render {
            format,
            reason: reason.into(),
        }
    }

    /// Crée une erreur d'option invalide
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}
