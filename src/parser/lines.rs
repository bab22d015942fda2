use std::sync::LazyLock;

use regex::Regex;

use crate::config::ParserConfig;

// Bodies start with a letter, a quote or an opening paren so "12 345" is not a code.
static CODE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?P<code>\d{2,3})\s+(?P<rest>[\p{L}„"“(].*?)\s*$"#).unwrap()
});
static AMOUNT_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<amt>\d{1,3}(?:[.\x{a0}\x{202f}]\d{3})+(?:,\d{1,2})?|\d+(?:,\d{1,2})?)\s*(?:EUR|€)?\s*$")
        .unwrap()
});
static AMOUNT_TRAILING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s(?P<amt>\d{1,3}(?:[.\x{a0}\x{202f}]\d{3})+(?:,\d{1,2})?|\d+(?:,\d{1,2})?)\s*(?:EUR|€)?\s*$")
        .unwrap()
});
// "Seite 3", "3 / 40", "Seite 3 von 40", "DE 12 DE"
static PAGE_ARTIFACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:(?:seite|page)\s+\d{1,4}(?:\s*(?:/|von|of)\s*\d{1,4})?|\d{1,4}\s*(?:/|von|of)\s*\d{1,4}|(?-i:[A-Z]{2}\s+\d{1,4}\s+[A-Z]{2}))\s*$")
        .unwrap()
});

/// One line of a dimension table, tagged by what it can mean to the row state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    Code { code: &'a str, rest: &'a str },
    Amount(&'a str),
    PageArtifact,
    Marker,
    Text(&'a str),
    Empty,
}

pub fn classify<'a>(line: &'a str, config: &ParserConfig) -> Line<'a> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Empty;
    }

    if let Some(caps) = CODE_LINE_RE.captures(line) {
        let code = caps.name("code").map_or("", |m| m.as_str());
        let rest = caps.name("rest").map_or("", |m| m.as_str());
        return Line::Code { code, rest };
    }

    if let Some(amt) = AMOUNT_ONLY_RE.captures(line).and_then(|c| c.name("amt")) {
        return Line::Amount(amt.as_str());
    }

    if PAGE_ARTIFACT_RE.is_match(trimmed) {
        return Line::PageArtifact;
    }

    if is_boundary_marker(line, config) {
        return Line::Marker;
    }

    Line::Text(trimmed)
}

/// Dimension marker, section heading or a repeated column header.
pub fn is_boundary_marker(line: &str, config: &ParserConfig) -> bool {
    config.dimension_re.is_match(line)
        || config.any_heading_re.is_match(line)
        || config.is_header(line)
}

/// Split a trailing amount token off a code line's tail.
///
/// Returns the description part and the raw amount; `None` if the tail does
/// not end in a number.
pub fn trailing_amount(rest: &str) -> Option<(&str, &str)> {
    let caps = AMOUNT_TRAILING_RE.captures(rest)?;
    let whole = caps.get(0)?;
    let amt = caps.name("amt")?;
    Some((rest[..whole.start()].trim(), amt.as_str()))
}

/// Classify every line of `text`, for debugging extraction output.
pub fn classify_lines<'a>(text: &'a str, config: &ParserConfig) -> Vec<Line<'a>> {
    text.lines().map(|l| classify(l, config)).collect()
}
