//! Mise en page des textes en blocs indépendants du format de sortie

use chrono::{Datelike, NaiveDate};

use crate::grouping::{self, TexteGroup};
use crate::html::parse_html;
use crate::types::{Block, Document, ExportOptions, GroupBy, TexteExport};
use crate::ExportError;

const MOIS: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

/// Formate une date à la française: `16 octobre 2026`
pub fn format_date_fr(date: NaiveDate) -> String {
    let day = if date.day() == 1 {
        "1er".to_string()
    } else {
        date.day().to_string()
    };
    format!("{} {} {}", day, MOIS[date.month0() as usize], date.year())
}

fn count_label(count: usize) -> String {
    if count > 1 {
        format!("{} textes", count)
    } else {
        format!("{} texte", count)
    }
}

/// Construit le document: couverture, table des matières optionnelle,
/// une section par groupe, saut de page entre les groupes.
pub fn build_document(
    textes: &[TexteExport],
    options: &ExportOptions,
) -> Result<Document, ExportError> {
    if textes.is_empty() {
        return Err(ExportError::EmptyInput);
    }
    if options.title.trim().is_empty() {
        return Err(ExportError::invalid_option("title", "must not be empty"));
    }

    let groups = match options.group_by {
        GroupBy::Type => grouping::group_by_type(textes),
        GroupBy::Marche => grouping::group_by_marche(textes),
    };

    let mut blocks = Vec::new();

    // Couverture
    blocks.push(Block::CoverTitle(options.title.clone()));
    if let Some(subtitle) = &options.subtitle {
        blocks.push(Block::CoverLine(subtitle.clone()));
    }
    if let Some(author) = &options.author {
        blocks.push(Block::CoverLine(author.clone()));
    }
    blocks.push(Block::CoverLine(count_label(textes.len())));
    blocks.push(Block::CoverLine(format_date_fr(options.generated_on)));
    blocks.push(Block::PageBreak);

    if options.include_toc {
        blocks.push(Block::TableOfContents);
        blocks.push(Block::PageBreak);
    }

    for (group_idx, group) in groups.iter().enumerate() {
        blocks.push(Block::SectionHeading {
            title: group.label.clone(),
            detail: section_detail(group),
        });

        for (texte_idx, texte) in group.textes.iter().enumerate() {
            push_entry(&mut blocks, texte, options);
            if texte_idx + 1 < group.textes.len() {
                blocks.push(Block::Separator);
            }
        }

        if group_idx + 1 < groups.len() {
            blocks.push(Block::PageBreak);
        }
    }

    tracing::debug!(
        groups = groups.len(),
        textes = textes.len(),
        blocks = blocks.len(),
        "Document laid out"
    );

    Ok(Document {
        title: options.title.clone(),
        blocks,
    })
}

fn section_detail(group: &TexteGroup<'_>) -> String {
    let count = count_label(group.textes.len());
    match group.date {
        Some(date) => format!("{} · {}", format_date_fr(date), count),
        None => count,
    }
}

fn push_entry(blocks: &mut Vec<Block>, texte: &TexteExport, options: &ExportOptions) {
    let titre = texte.titre.trim();
    blocks.push(Block::EntryTitle(if titre.is_empty() {
        "Sans titre".to_string()
    } else {
        titre.to_string()
    }));

    if options.include_metadata {
        if let Some(meta) = entry_meta(texte, options.group_by) {
            blocks.push(Block::EntryMeta(meta));
        }
    }

    blocks.extend(parse_html(&texte.contenu).into_iter().map(Block::Body));
}

/// Ligne de métadonnées: le lieu quand on groupe par type, le type quand
/// on groupe par marche.
fn entry_meta(texte: &TexteExport, group_by: GroupBy) -> Option<String> {
    match group_by {
        GroupBy::Marche => Some(grouping::type_name(&texte.type_texte)),
        GroupBy::Type => {
            let mut parts: Vec<&str> = Vec::new();
            for part in [&texte.marche_nom, &texte.ville, &texte.region]
                .into_iter()
                .flatten()
            {
                let part = part.trim();
                if !part.is_empty() && !parts.contains(&part) {
                    parts.push(part);
                }
            }
            let mut meta = parts.join(", ");
            if let Some(date) = texte.marche_date {
                if !meta.is_empty() {
                    meta.push_str(" — ");
                }
                meta.push_str(&format_date_fr(date));
            }
            (!meta.is_empty()).then_some(meta)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Paragraph;

    fn options() -> ExportOptions {
        ExportOptions {
            generated_on: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            ..Default::default()
        }
    }

    fn texte(id: &str, type_texte: &str, contenu: &str) -> TexteExport {
        TexteExport {
            id: id.to_string(),
            titre: format!("Texte {}", id),
            contenu: contenu.to_string(),
            type_texte: type_texte.to_string(),
            marche_id: Some("m1".to_string()),
            marche_nom: Some("Bords de Loire".to_string()),
            ville: Some("Tours".to_string()),
            ..Default::default()
        }
    }

    fn count(doc: &Document, pred: impl Fn(&Block) -> bool) -> usize {
        doc.blocks.iter().filter(|b| pred(*b)).count()
    }

    #[test]
    fn test_format_date_fr() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(format_date_fr(date), "16 octobre 2026");
        let date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        assert_eq!(format_date_fr(date), "1er août 2024");
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            build_document(&[], &options()),
            Err(ExportError::EmptyInput)
        ));
    }

    #[test]
    fn test_cover_and_toc() {
        let textes = vec![texte("1", "haiku", "<p>vers</p>")];
        let doc = build_document(&textes, &options()).unwrap();

        assert_eq!(doc.blocks[0], Block::CoverTitle("La Fréquence du Vivant".into()));
        assert!(doc.blocks.contains(&Block::CoverLine("1 texte".into())));
        assert!(doc.blocks.contains(&Block::CoverLine("16 octobre 2026".into())));
        assert_eq!(count(&doc, |b| matches!(b, Block::TableOfContents)), 1);

        let doc = build_document(
            &textes,
            &ExportOptions {
                include_toc: false,
                ..options()
            },
        )
        .unwrap();
        assert_eq!(count(&doc, |b| matches!(b, Block::TableOfContents)), 0);
    }

    #[test]
    fn test_page_breaks_and_separators() {
        let textes = vec![
            texte("1", "haiku", "un"),
            texte("2", "haiku", "deux"),
            texte("3", "fable", "trois"),
        ];
        let doc = build_document(&textes, &options()).unwrap();

        // couverture + table des matières + une entre les deux groupes
        assert_eq!(count(&doc, |b| matches!(b, Block::PageBreak)), 3);
        assert_eq!(count(&doc, |b| matches!(b, Block::Separator)), 1);
        assert_eq!(doc.entry_count(), 3);
        assert!(doc.blocks.contains(&Block::SectionHeading {
            title: "Haïkus".into(),
            detail: "2 textes".into()
        }));
    }

    #[test]
    fn test_entry_metadata_depends_on_grouping() {
        let mut t = texte("1", "poème", "corps");
        t.marche_date = NaiveDate::from_ymd_opt(2024, 3, 12);
        let textes = vec![t];

        let doc = build_document(&textes, &options()).unwrap();
        assert!(doc.blocks.contains(&Block::EntryMeta(
            "Bords de Loire, Tours — 12 mars 2024".into()
        )));

        let doc = build_document(
            &textes,
            &ExportOptions {
                group_by: GroupBy::Marche,
                ..options()
            },
        )
        .unwrap();
        assert!(doc.blocks.contains(&Block::EntryMeta("Poème".into())));
        assert!(doc.blocks.contains(&Block::SectionHeading {
            title: "Bords de Loire (Tours)".into(),
            detail: "12 mars 2024 · 1 texte".into()
        }));
    }

    #[test]
    fn test_body_paragraphs_follow_title() {
        let textes = vec![texte("1", "haiku", "ligne un<br>ligne deux")];
        let doc = build_document(
            &textes,
            &ExportOptions {
                include_metadata: false,
                ..options()
            },
        )
        .unwrap();

        let idx = doc
            .blocks
            .iter()
            .position(|b| *b == Block::EntryTitle("Texte 1".into()))
            .unwrap();
        assert_eq!(doc.blocks[idx + 1], Block::Body(Paragraph::plain("ligne un")));
        assert_eq!(doc.blocks[idx + 2], Block::Body(Paragraph::plain("ligne deux")));
    }
}
