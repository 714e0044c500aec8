//! Export CSV pour tableur
//!
//! UTF-8 avec BOM (ouverture directe dans Excel), séparateur `;`,
//! tous les champs entre guillemets.

use crate::grouping;
use crate::html::strip_html;
use crate::types::{ExportOptions, GroupBy, TexteExport};
use crate::ExportError;

const BOM: &str = "\u{feff}";
const HEADER: [&str; 8] = [
    "groupe", "id", "titre", "type", "marche", "ville", "date", "texte",
];

/// Une ligne par texte, dans l'ordre des groupes
pub fn render(textes: &[TexteExport], options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    if textes.is_empty() {
        return Err(ExportError::EmptyInput);
    }

    let groups = match options.group_by {
        GroupBy::Type => grouping::group_by_type(textes),
        GroupBy::Marche => grouping::group_by_marche(textes),
    };

    let mut out = String::from(BOM);
    push_row(&mut out, HEADER.iter().copied());

    for group in &groups {
        for texte in &group.textes {
            let date = texte
                .marche_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let body = strip_html(&texte.contenu);
            push_row(
                &mut out,
                [
                    group.label.as_str(),
                    texte.id.as_str(),
                    texte.titre.as_str(),
                    texte.type_texte.as_str(),
                    texte.marche_nom.as_deref().unwrap_or(""),
                    texte.ville.as_deref().unwrap_or(""),
                    date.as_str(),
                    body.as_str(),
                ],
            );
        }
    }

    Ok(out.into_bytes())
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (idx, field) in fields.into_iter().enumerate() {
        if idx > 0 {
            out.push(';');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\"\""),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out.push('"');
}
