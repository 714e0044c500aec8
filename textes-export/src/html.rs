//! Parser pour le sous-ensemble HTML stocké dans les textes
//!
//! Le contenu des textes est saisi dans un éditeur riche qui produit un HTML
//! restreint: `p`, `div`, `br`, `span`, `em`/`i`, `strong`/`b` et des entités.
//! Ce n'est pas un parser HTML complet: le découpage se fait par expressions
//! régulières, et seul l'imbrication simple des balises de style est gérée
//! (compteurs de profondeur, pas d'arbre).

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::types::{Paragraph, Run};

struct Patterns {
    /// `<br>` superflu juste avant une fermeture de bloc
    br_before_close: Regex,
    /// Frontière `</p><p>` entre deux blocs
    block_boundary: Regex,
    /// Balise de bloc ouvrante ou fermante
    block_tag: Regex,
    /// Saut de ligne `<br>`
    line_break: Regex,
    /// Balises de style (italique, gras)
    style_tag: Regex,
    /// Toute balise restante (span, font, u, ...)
    any_tag: Regex,
    /// Entités nommées ou numériques
    entity: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // Motifs constants: une erreur de compilation est un bug de ce module
        let compile = |p: &str| Regex::new(p).expect("invalid built-in HTML pattern");
        Patterns {
            br_before_close: compile(r"(?i)<br\s*/?>\s*(</(?:p|div)>)"),
            block_boundary: compile(r"(?i)</(?:p|div)>\s*<(?:p|div)(?:\s[^>]*)?>"),
            block_tag: compile(r"(?i)(?:</(?:p|div)>|<(?:p|div)(?:\s[^>]*)?>)[ \t]*\n?"),
            line_break: compile(r"(?i)<br\s*/?>[ \t]*\n?"),
            style_tag: compile(r"(?i)<(/?)(em|i|strong|b)(?:\s[^>]*)?>"),
            any_tag: compile(r"<[^>]*>"),
            entity: compile(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});"),
        }
    })
}

/// Séparateur interne des blocs `p`/`div`
const BLOCK: char = '\u{1}';

/// Profondeur des balises de style ouvertes
#[derive(Default)]
struct StyleDepth {
    italic: usize,
    bold: usize,
}

/// Parse le HTML d'un texte en paragraphes de segments stylés.
///
/// Les lignes vides intérieures sont conservées (séparations de strophes),
/// celles du début et de la fin sont supprimées. Un style ouvert traverse
/// les `<br>` et sauts de ligne, mais pas les limites de bloc.
pub fn parse_html(html: &str) -> Vec<Paragraph> {
    let p = patterns();

    let normalized = html
        .replace(BLOCK, "")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let separator = BLOCK.to_string();
    let normalized = p.br_before_close.replace_all(&normalized, "${1}");
    let normalized = p.block_boundary.replace_all(&normalized, separator.as_str());
    let normalized = p.block_tag.replace_all(&normalized, separator.as_str());
    let normalized = p.line_break.replace_all(&normalized, "\n");

    let mut paragraphs: Vec<Paragraph> = Vec::new();
    for block in normalized.split(BLOCK) {
        let mut depth = StyleDepth::default();
        for line in block.split('\n') {
            paragraphs.push(parse_inline(line, &mut depth, p));
        }
    }

    while paragraphs.last().is_some_and(Paragraph::is_empty) {
        paragraphs.pop();
    }
    let leading = paragraphs.iter().take_while(|p| p.is_empty()).count();
    paragraphs.drain(..leading);

    paragraphs
}

/// Texte brut d'une liste de paragraphes (un paragraphe par ligne)
pub fn plain_text(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .map(Paragraph::text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raccourci: HTML → texte brut
pub fn strip_html(html: &str) -> String {
    plain_text(&parse_html(html))
}

/// Découpe une ligne en segments selon les balises de style ouvertes
fn parse_inline(line: &str, depth: &mut StyleDepth, p: &Patterns) -> Paragraph {
    let mut runs: Vec<Run> = Vec::new();
    let mut last = 0;

    for caps in p.style_tag.captures_iter(line) {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        push_text(
            &mut runs,
            &line[last..tag.start()],
            depth.italic > 0,
            depth.bold > 0,
            p,
        );

        let closing = &caps[1] == "/";
        let counter = match caps[2].to_ascii_lowercase().as_str() {
            "em" | "i" => &mut depth.italic,
            _ => &mut depth.bold,
        };
        if closing {
            // Une fermeture orpheline est ignorée
            *counter = counter.saturating_sub(1);
        } else {
            *counter += 1;
        }
        last = tag.end();
    }
    push_text(&mut runs, &line[last..], depth.italic > 0, depth.bold > 0, p);

    trim_runs(&mut runs);
    Paragraph::new(runs)
}

/// Ajoute un segment, fusionné avec le précédent s'il a le même style
fn push_text(runs: &mut Vec<Run>, raw: &str, italic: bool, bold: bool, p: &Patterns) {
    if raw.is_empty() {
        return;
    }
    let without_tags = p.any_tag.replace_all(raw, "");
    let text = decode_entities_with(&without_tags, &p.entity);
    if text.is_empty() {
        return;
    }

    let run = Run { text, italic, bold };
    match runs.last_mut() {
        Some(prev) if prev.same_style(&run) => prev.text.push_str(&run.text),
        _ => runs.push(run),
    }
}

/// Supprime les espaces en bord de paragraphe, et les segments devenus vides
fn trim_runs(runs: &mut Vec<Run>) {
    while let Some(first) = runs.first_mut() {
        let trimmed = first.text.trim_start();
        if trimmed.is_empty() {
            runs.remove(0);
        } else {
            first.text = trimmed.to_string();
            break;
        }
    }
    while let Some(last) = runs.last_mut() {
        let trimmed = last.text.trim_end();
        if trimmed.is_empty() {
            runs.pop();
        } else {
            last.text = trimmed.to_string();
            break;
        }
    }
}

/// Décode les entités HTML nommées et numériques
pub fn decode_entities(text: &str) -> String {
    decode_entities_with(text, &patterns().entity)
}

fn decode_entities_with(text: &str, entity: &Regex) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    entity
        .replace_all(text, |caps: &Captures| match decode_entity(&caps[1]) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }

    let c = match name {
        "nbsp" => '\u{a0}',
        "thinsp" => '\u{2009}',
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "laquo" => '«',
        "raquo" => '»',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "middot" => '·',
        "deg" => '°',
        "copy" => '©',
        "agrave" => 'à',
        "acirc" => 'â',
        "ccedil" => 'ç',
        "eacute" => 'é',
        "egrave" => 'è',
        "ecirc" => 'ê',
        "euml" => 'ë',
        "icirc" => 'î',
        "iuml" => 'ï',
        "ocirc" => 'ô',
        "ugrave" => 'ù',
        "ucirc" => 'û',
        "uuml" => 'ü',
        "oelig" => 'œ',
        "aelig" => 'æ',
        "Agrave" => 'À',
        "Ccedil" => 'Ç',
        "Eacute" => 'É',
        "Egrave" => 'È',
        "Ecirc" => 'Ê',
        "OElig" => 'Œ',
        _ => return None,
    };
    Some(c)
}
