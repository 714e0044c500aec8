//! # textes-export
//!
//! Export des textes littéraires de La Fréquence du Vivant vers Word, PDF et CSV.
//!
//! ## Features
//!
//! - Parsing du sous-ensemble HTML des textes (paragraphes, italique, gras, entités)
//! - Regroupement par type littéraire (ordre éditorial) ou par marche (chronologique)
//! - Mise en page commune (couverture, table des matières, sections)
//! - Rendu `.docx` (`docx-rs`), PDF A4 (`printpdf`) et CSV pour tableur
//!
//! ## Usage
//!
//! ```rust,ignore
//! use textes_export::{export, ExportOptions, Format, GroupBy};
//!
//! let options = ExportOptions {
//!     group_by: GroupBy::Marche,
//!     ..Default::default()
//! };
//! let bytes = export(&textes, &options, Format::Docx)?;
//! std::fs::write("recueil.docx", bytes)?;
//! ```

pub mod error;
pub mod grouping;
pub mod html;
pub mod layout;
pub mod render;
pub mod types;

pub use error::ExportError;
pub use html::{parse_html, plain_text, strip_html};
pub use layout::build_document;
pub use render::Format;
pub use types::{Block, Document, ExportOptions, GroupBy, Paragraph, Run, TexteExport};

use std::path::{Path, PathBuf};

/// Exporte les textes dans le format demandé et retourne le fichier en mémoire
pub fn export(
    textes: &[TexteExport],
    options: &ExportOptions,
    format: Format,
) -> Result<Vec<u8>, ExportError> {
    tracing::info!(
        textes = textes.len(),
        format = %format,
        group_by = ?options.group_by,
        "Exporting texts"
    );

    match format {
        Format::Csv => render::csv::render(textes, options),
        Format::Docx => {
            let doc = build_document(textes, options)?;
            render::docx::render(&doc)
        }
        Format::Pdf => {
            let doc = build_document(textes, options)?;
            render::pdf::render(&doc, options.pdf_font.as_deref())
        }
    }
}

/// Exporte vers un fichier. Si `path` est un répertoire, le nom est dérivé
/// du titre et de l'extension du format.
pub fn export_to_file(
    textes: &[TexteExport],
    options: &ExportOptions,
    format: Format,
    path: &Path,
) -> Result<PathBuf, ExportError> {
    let target = if path.is_dir() {
        path.join(format!("{}.{}", file_stem(&options.title), format.extension()))
    } else {
        path.to_path_buf()
    };

    let bytes = export(textes, options, format)?;
    std::fs::write(&target, &bytes)?;

    tracing::info!(path = %target.display(), bytes = bytes.len(), "Export written");
    Ok(target)
}

/// Nom de fichier dérivé d'un titre: minuscules, alphanumérique, tirets
pub fn file_stem(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    for c in grouping::normalize_type(title).chars() {
        if c.is_alphanumeric() {
            stem.push(c);
        } else if !stem.ends_with('-') && !stem.is_empty() {
            stem.push('-');
        }
    }
    let stem = stem.trim_end_matches('-');
    if stem.is_empty() {
        "export".to_string()
    } else {
        stem.to_string()
    }
}
