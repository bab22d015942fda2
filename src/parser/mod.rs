pub mod amount;
pub mod blocks;
pub mod context;
pub mod description;
pub mod lines;
pub mod records;
pub mod rows;
pub mod tables;

use serde::Serialize;

use crate::config::ParserConfig;
use records::RowRecord;
use rows::RowStats;

/// What one parse found, alongside the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub sections: usize,
    pub tables: usize,
    pub skipped_tables: usize,
    pub rows: RowStats,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub records: Vec<RowRecord>,
    pub report: ParseReport,
}

/// Pipeline: text → section blocks → context + dimension tables → rows → records.
///
/// Never fails on content: missing headings, headers or amounts just mean fewer records.
pub fn parse_text(text: &str, config: &ParserConfig) -> ParsedDocument {
    let text = text.replace("\r\n", "\n");
    let mut out = Vec::new();
    let mut report = ParseReport::default();

    for block in blocks::split_blocks(&text, config) {
        report.sections += 1;
        let ctx = context::extract_context(block.body, config);
        let located = tables::locate_tables(block.body, config);
        report.skipped_tables += located.skipped;
        tracing::debug!(
            section = %block.section_id,
            tables = located.tables.len(),
            skipped = located.skipped,
            "section block"
        );

        for table in &located.tables {
            report.tables += 1;
            let (rows, stats) = rows::reconstruct_rows(&table.lines, config);
            tracing::debug!(
                section = %block.section_id,
                dimension = table.index,
                emitted = stats.emitted,
                dropped = stats.dropped(),
                "table parsed"
            );
            report.rows.merge(&stats);
            out.extend(records::assemble(&block, &ctx, table, rows));
        }
    }

    ParsedDocument { records: out, report }
}

// ── Tests ──
