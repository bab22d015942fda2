use crate::config::ParserConfig;

/// One "Dimension N" sub-table: its marker label and the non-blank lines after its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionTable<'a> {
    pub index: u32,
    pub dimension_label: String,
    pub lines: Vec<&'a str>,
}

/// Result of locating tables in one block; `skipped` counts markers without a header.
#[derive(Debug, Default)]
pub struct LocatedTables<'a> {
    pub tables: Vec<DimensionTable<'a>>,
    pub skipped: usize,
}

/// Find every dimension table in a section block body, in document order.
///
/// A table's region starts after the first recognized column header following
/// its marker and ends at the next marker or section heading. Markers with no
/// header before that point are skipped entirely.
pub fn locate_tables<'a>(body: &'a str, config: &ParserConfig) -> LocatedTables<'a> {
    let markers: Vec<_> = config
        .dimension_re
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.name("marker")?.as_str();
            let index = caps.name("index")?.as_str().parse::<u32>().ok()?;
            Some((whole.start(), whole.end(), index, clean_label(label)))
        })
        .collect();

    let mut located = LocatedTables::default();
    for (i, (_, marker_end, index, label)) in markers.iter().enumerate() {
        let region_end = markers.get(i + 1).map_or(body.len(), |next| next.0);
        let region = &body[*marker_end..region_end];

        match table_lines(region, config) {
            Some(lines) => located.tables.push(DimensionTable {
                index: *index,
                dimension_label: label.clone(),
                lines,
            }),
            None => {
                tracing::debug!(dimension = %label, "no column header after marker, skipping table");
                located.skipped += 1;
            }
        }
    }
    located
}

/// Lines after the column header, cut at the next section heading.
///
/// The header must appear before that heading; one further down belongs to
/// another section.
fn table_lines<'a>(region: &'a str, config: &ParserConfig) -> Option<Vec<&'a str>> {
    let mut iter = region
        .lines()
        .take_while(|l| !config.any_heading_re.is_match(l))
        .skip_while(|l| !config.is_header(l));
    iter.next()?;

    let lines = iter
        .skip_while(|l| l.trim().is_empty() || config.is_header(l) || is_header_tail(l))
        .filter(|l| !l.trim().is_empty())
        .collect();
    Some(lines)
}

/// "(EUR)" left on its own line when a header wraps.
fn is_header_tail(line: &str) -> bool {
    matches!(line.trim(), "(EUR)" | "EUR" | "(€)")
}

fn clean_label(label: &str) -> String {
    label.replace(['\u{a0}', '\u{202f}'], " ").split_whitespace().collect::<Vec<_>>().join(" ")
}
