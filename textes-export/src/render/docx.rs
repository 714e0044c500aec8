//! Rendu Word (.docx) via docx-rs

use std::io::Cursor;

use docx_rs::{AlignmentType, BreakType, Docx, Style, StyleType};

use crate::types::{Block, Document, Paragraph};
use crate::ExportError;

// Identifiants de styles (tailles en demi-points)
const STYLE_COVER: &str = "FvCouverture";
const STYLE_SECTION: &str = "FvSection";
const STYLE_ENTRY: &str = "FvTitreTexte";
const STYLE_META: &str = "FvMeta";

const BODY_SIZE: usize = 24;
const ACCENT_COLOR: &str = "4A6B3A";
const SEPARATOR: &str = "❦";

fn styles(docx: Docx) -> Docx {
    docx.add_style(
        Style::new(STYLE_COVER, StyleType::Paragraph)
            .name("Couverture")
            .size(56)
            .bold(),
    )
    .add_style(
        Style::new(STYLE_SECTION, StyleType::Paragraph)
            .name("Section")
            .size(40)
            .bold()
            .color(ACCENT_COLOR),
    )
    .add_style(
        Style::new(STYLE_ENTRY, StyleType::Paragraph)
            .name("Titre de texte")
            .size(30)
            .bold(),
    )
    .add_style(
        Style::new(STYLE_META, StyleType::Paragraph)
            .name("Métadonnées")
            .size(20)
            .italic()
            .color("666666"),
    )
}

fn text_paragraph(text: &str, style: &str) -> docx_rs::Paragraph {
    docx_rs::Paragraph::new()
        .style(style)
        .add_run(docx_rs::Run::new().add_text(text))
}

fn body_paragraph(paragraph: &Paragraph) -> docx_rs::Paragraph {
    let mut p = docx_rs::Paragraph::new();
    for run in &paragraph.runs {
        let mut r = docx_rs::Run::new().add_text(run.text.as_str()).size(BODY_SIZE);
        if run.italic {
            r = r.italic();
        }
        if run.bold {
            r = r.bold();
        }
        p = p.add_run(r);
    }
    p
}

fn page_break() -> docx_rs::Paragraph {
    docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_break(BreakType::Page))
}

/// Produit le fichier .docx en mémoire
pub fn render(doc: &Document) -> Result<Vec<u8>, ExportError> {
    let mut docx = styles(Docx::new());

    for block in &doc.blocks {
        docx = match block {
            Block::CoverTitle(title) => {
                docx.add_paragraph(text_paragraph(title, STYLE_COVER).align(AlignmentType::Center))
            }
            Block::CoverLine(line) => docx.add_paragraph(
                docx_rs::Paragraph::new()
                    .align(AlignmentType::Center)
                    .add_run(docx_rs::Run::new().add_text(line.as_str()).size(28)),
            ),
            Block::TableOfContents => {
                docx = docx.add_paragraph(text_paragraph("Table des matières", STYLE_SECTION));
                for title in doc.section_titles() {
                    docx = docx.add_paragraph(
                        docx_rs::Paragraph::new()
                            .add_run(docx_rs::Run::new().add_text(title).size(BODY_SIZE)),
                    );
                }
                docx
            }
            Block::SectionHeading { title, detail } => docx
                .add_paragraph(text_paragraph(title, STYLE_SECTION))
                .add_paragraph(text_paragraph(detail, STYLE_META)),
            Block::EntryTitle(title) => docx.add_paragraph(text_paragraph(title, STYLE_ENTRY)),
            Block::EntryMeta(meta) => docx.add_paragraph(text_paragraph(meta, STYLE_META)),
            Block::Body(paragraph) => docx.add_paragraph(body_paragraph(paragraph)),
            Block::Separator => docx.add_paragraph(
                docx_rs::Paragraph::new().align(AlignmentType::Center).add_run(
                    docx_rs::Run::new()
                        .add_text(SEPARATOR)
                        .color(ACCENT_COLOR),
                ),
            ),
            Block::PageBreak => docx.add_paragraph(page_break()),
        };
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| ExportError::render("docx", e.to_string()))?;

    let bytes = buffer.into_inner();
    tracing::debug!(bytes = bytes.len(), "DOCX rendered");
    Ok(bytes)
}
