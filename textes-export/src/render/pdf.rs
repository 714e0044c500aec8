//! Rendu PDF (A4) via printpdf
//!
//! Mise en page simple: retour à la ligne glouton sur une largeur estimée
//! des glyphes, nouvelle page automatique en bas de page.

use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};

use crate::types::{Block, Document, Paragraph, Run};
use crate::ExportError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 25.0;
const TEXT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const PT_TO_MM: f32 = 0.352_778;
/// Largeur moyenne d'un glyphe, en fraction de la taille du corps
const GLYPH_RATIO: f32 = 0.48;
const LINE_SPACING: f32 = 1.35;

const BODY_SIZE: f32 = 11.5;
const LAYER_NAME: &str = "Texte";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

struct Fonts {
    regular: IndirectFontRef,
    italic: IndirectFontRef,
    bold: IndirectFontRef,
    bold_italic: IndirectFontRef,
}

impl Fonts {
    fn builtin(doc: &PdfDocumentReference) -> Result<Self, ExportError> {
        let load = |font: BuiltinFont| {
            doc.add_builtin_font(font)
                .map_err(|e| ExportError::render("pdf", e.to_string()))
        };
        Ok(Self {
            regular: load(BuiltinFont::TimesRoman)?,
            italic: load(BuiltinFont::TimesItalic)?,
            bold: load(BuiltinFont::TimesBold)?,
            bold_italic: load(BuiltinFont::TimesBoldItalic)?,
        })
    }

    /// Police TrueType externe: une seule graisse, utilisée pour tous les styles
    fn external(doc: &PdfDocumentReference, path: &Path) -> Result<Self, ExportError> {
        let reader = BufReader::new(File::open(path)?);
        let font = doc
            .add_external_font(reader)
            .map_err(|e| ExportError::render("pdf", format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            regular: font.clone(),
            italic: font.clone(),
            bold: font.clone(),
            bold_italic: font,
        })
    }

    fn pick(&self, italic: bool, bold: bool) -> &IndirectFontRef {
        match (italic, bold) {
            (false, false) => &self.regular,
            (true, false) => &self.italic,
            (false, true) => &self.bold,
            (true, true) => &self.bold_italic,
        }
    }
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_RATIO * PT_TO_MM
}

/// Mot insécable: caractères non blancs consécutifs, sur un ou plusieurs styles
struct Word {
    parts: Vec<Run>,
    /// Précédé d'un blanc dans le texte source
    spaced: bool,
    width: f32,
}

/// Blancs de coupure; les espaces insécables restent dans le mot
fn is_break(c: char) -> bool {
    c.is_whitespace() && c != '\u{a0}' && c != '\u{202f}'
}

fn split_words(runs: &[Run], size: f32) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut current: Option<Word> = None;
    let mut pending_space = false;

    for run in runs {
        for c in run.text.chars() {
            if is_break(c) {
                words.extend(current.take());
                pending_space = true;
                continue;
            }
            let word = current.get_or_insert_with(|| Word {
                parts: Vec::new(),
                spaced: std::mem::take(&mut pending_space),
                width: 0.0,
            });
            match word.parts.last_mut() {
                Some(part) if part.same_style(run) => part.text.push(c),
                _ => word.parts.push(Run {
                    text: c.to_string(),
                    italic: run.italic,
                    bold: run.bold,
                }),
            }
        }
    }
    words.extend(current);

    for word in &mut words {
        word.width = word.parts.iter().map(|p| text_width(&p.text, size)).sum();
    }
    words
}

/// Découpe glouton d'une suite de segments en lignes de largeur `max_width`.
///
/// Une espace n'est insérée qu'entre deux mots séparés par un blanc dans la
/// source. Les mots trop longs restent seuls sur leur ligne.
fn wrap_runs(runs: &[Run], size: f32, max_width: f32) -> Vec<Vec<Run>> {
    let mut lines: Vec<Vec<Run>> = Vec::new();
    let mut line: Vec<Run> = Vec::new();
    let mut width = 0.0_f32;

    for word in split_words(runs, size) {
        let space = if line.is_empty() || !word.spaced { "" } else { " " };
        let word_width = text_width(space, size) + word.width;

        if !line.is_empty() && width + word_width > max_width {
            lines.push(std::mem::take(&mut line));
            push_word(&mut line, "", &word.parts);
            width = word.width;
        } else {
            push_word(&mut line, space, &word.parts);
            width += word_width;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn push_word(line: &mut Vec<Run>, space: &str, parts: &[Run]) {
    // l'espace reste dans le segment précédent
    if let Some(last) = line.last_mut() {
        last.text.push_str(space);
    }
    for part in parts {
        match line.last_mut() {
            Some(last) if last.same_style(part) => last.text.push_str(&part.text),
            _ => line.push(part.clone()),
        }
    }
}

/// Ramène un texte dans le jeu WinAnsi des polices Times intégrées.
///
/// Les lettres à diacritique hors Latin-1 perdent leur accent; les autres
/// caractères non codables deviennent `?` et sont comptés dans `replaced`.
fn to_winansi<'a>(text: &'a str, replaced: &mut usize) -> Cow<'a, str> {
    if text.chars().all(is_winansi) {
        return Cow::Borrowed(text);
    }
    let converted = text
        .chars()
        .map(|c| {
            if is_winansi(c) {
                return c;
            }
            fold_latin(c).unwrap_or_else(|| {
                *replaced += 1;
                '?'
            })
        })
        .collect();
    Cow::Owned(converted)
}

fn is_winansi(c: char) -> bool {
    matches!(c, '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}')
        || "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ".contains(c)
}

fn fold_latin(c: char) -> Option<char> {
    let folded = match c {
        'ā' | 'ă' | 'ą' => 'a',
        'Ā' | 'Ă' | 'Ą' => 'A',
        'ć' | 'ĉ' | 'č' => 'c',
        'Ć' | 'Č' => 'C',
        'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'Ē' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'ğ' => 'g',
        'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'Ī' | 'İ' => 'I',
        'ł' => 'l',
        'Ł' => 'L',
        'ń' | 'ň' => 'n',
        'ō' | 'ŏ' | 'ő' => 'o',
        'Ō' | 'Ő' => 'O',
        'ř' => 'r',
        'ś' | 'ş' | 'ș' => 's',
        'Ś' | 'Ş' | 'Ș' => 'S',
        'ț' | 'ţ' => 't',
        'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'Ū' | 'Ů' | 'Ű' => 'U',
        'ź' | 'ż' => 'z',
        'Ź' | 'Ż' => 'Z',
        '\u{202f}' => '\u{a0}',
        '\u{2009}' | '\u{2007}' | '\u{200a}' => ' ',
        '\u{2032}' => '\'',
        '\u{2033}' => '"',
        _ => return None,
    };
    Some(folded)
}

struct PdfWriter {
    doc: PdfDocumentReference,
    fonts: Fonts,
    /// Polices intégrées: texte limité à WinAnsi
    builtin: bool,
    /// Caractères non codables remplacés par `?`
    replaced: usize,
    layer: PdfLayerReference,
    y: f32,
    page_has_content: bool,
    pages: usize,
}

impl PdfWriter {
    fn new(title: &str, font: Option<&Path>) -> Result<Self, ExportError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME);
        let fonts = match font {
            Some(path) => Fonts::external(&doc, path)?,
            None => Fonts::builtin(&doc)?,
        };
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            fonts,
            builtin: font.is_none(),
            replaced: 0,
            layer,
            y: PAGE_HEIGHT - MARGIN,
            page_has_content: false,
            pages: 1,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
        self.page_has_content = false;
        self.pages += 1;
    }

    /// Saut de page explicite: ignoré si la page courante est vide
    fn page_break(&mut self) {
        if self.page_has_content {
            self.new_page();
        }
    }

    fn space(&mut self, mm: f32) {
        if self.page_has_content {
            self.y -= mm;
        }
    }

    fn line(&mut self, runs: &[Run], size: f32, align: Align) {
        let height = size * PT_TO_MM * LINE_SPACING;
        if self.y - height < MARGIN {
            self.new_page();
        }
        self.y -= height;

        let total: f32 = runs.iter().map(|r| text_width(&r.text, size)).sum();
        let mut x = match align {
            Align::Left => MARGIN,
            Align::Center => MARGIN + ((TEXT_WIDTH - total) / 2.0).max(0.0),
        };
        for run in runs {
            let text = if self.builtin {
                to_winansi(&run.text, &mut self.replaced)
            } else {
                Cow::Borrowed(run.text.as_str())
            };
            let font = self.fonts.pick(run.italic, run.bold);
            self.layer
                .use_text(text.as_ref(), size, Mm(x), Mm(self.y), font);
            x += text_width(&run.text, size);
        }
        self.page_has_content = true;
    }

    fn paragraph(&mut self, runs: &[Run], size: f32, align: Align) {
        for line in wrap_runs(runs, size, TEXT_WIDTH) {
            self.line(&line, size, align);
        }
    }

    fn styled(&mut self, text: &str, size: f32, italic: bool, bold: bool, align: Align) {
        let run = Run {
            text: text.to_string(),
            italic,
            bold,
        };
        self.paragraph(std::slice::from_ref(&run), size, align);
    }

    fn body(&mut self, paragraph: &Paragraph) {
        if paragraph.is_empty() {
            // ligne blanche entre strophes
            self.space(BODY_SIZE * PT_TO_MM * LINE_SPACING);
        } else {
            self.paragraph(&paragraph.runs, BODY_SIZE, Align::Left);
        }
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let pages = self.pages;
        if self.replaced > 0 {
            tracing::warn!(
                replaced = self.replaced,
                "Characters outside WinAnsi replaced by '?', use an external font (--pdf-font)"
            );
        }
        let bytes = self
            .doc
            .save_to_bytes()
            .map_err(|e| ExportError::render("pdf", e.to_string()))?;
        tracing::debug!(pages, bytes = bytes.len(), "PDF rendered");
        Ok(bytes)
    }
}

/// Produit le PDF en mémoire
pub fn render(doc: &Document, font: Option<&Path>) -> Result<Vec<u8>, ExportError> {
    let mut writer = PdfWriter::new(&doc.title, font)?;

    for block in &doc.blocks {
        match block {
            Block::CoverTitle(title) => {
                // couverture au tiers de la page
                writer.y = PAGE_HEIGHT * 2.0 / 3.0;
                writer.styled(title, 28.0, false, true, Align::Center);
                writer.space(8.0);
            }
            Block::CoverLine(line) => {
                writer.styled(line, 14.0, false, false, Align::Center);
                writer.space(2.0);
            }
            Block::TableOfContents => {
                writer.styled("Table des matières", 20.0, false, true, Align::Left);
                writer.space(6.0);
                for title in doc.section_titles() {
                    writer.styled(title, 13.0, false, false, Align::Left);
                }
            }
            Block::SectionHeading { title, detail } => {
                writer.styled(title, 20.0, false, true, Align::Left);
                writer.styled(detail, 10.0, true, false, Align::Left);
                writer.space(8.0);
            }
            Block::EntryTitle(title) => {
                writer.space(4.0);
                writer.styled(title, 15.0, false, true, Align::Left);
            }
            Block::EntryMeta(meta) => {
                writer.styled(meta, 9.5, true, false, Align::Left);
                writer.space(2.0);
            }
            Block::Body(paragraph) => writer.body(paragraph),
            Block::Separator => {
                writer.space(3.0);
                writer.styled("* * *", 11.0, false, false, Align::Center);
                writer.space(3.0);
            }
            Block::PageBreak => writer.page_break(),
        }
    }

    writer.finish()
}
