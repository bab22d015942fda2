use serde::Serialize;

use crate::config::{AmountCommit, ParserConfig};
use crate::parser::amount::{is_accepted_amount, normalize_amount};
use crate::parser::description::join_fragments;
use crate::parser::lines::{classify, trailing_amount, Line};

/// A row recovered from one dimension table, before context is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub code: String,
    pub description: String,
    pub amount: f64,
}

/// Counters for what the state machine kept and what it dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowStats {
    pub emitted: usize,
    /// Rows closed by a boundary, a new code or end of input before any amount.
    pub dropped_without_amount: usize,
    /// Standalone numeric lines below the amount threshold. Small numbers
    /// trailing a code line stay in the description and are not counted.
    pub rejected_small_numbers: usize,
    /// Lines seen while no row was open.
    pub noise_lines: usize,
    /// Emitted rows whose amount did not normalize.
    pub unparsed_amounts: usize,
}

impl RowStats {
    pub fn merge(&mut self, other: &RowStats) {
        self.emitted += other.emitted;
        self.dropped_without_amount += other.dropped_without_amount;
        self.rejected_small_numbers += other.rejected_small_numbers;
        self.noise_lines += other.noise_lines;
        self.unparsed_amounts += other.unparsed_amounts;
    }

    pub fn dropped(&self) -> usize {
        self.dropped_without_amount
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Accumulating {
        code: String,
        fragments: Vec<String>,
    },
    AmountPending {
        code: String,
        fragments: Vec<String>,
        amount: String,
    },
}

/// Row state machine for a single dimension table.
///
/// Owns the row under construction; a new instance is created per table so
/// nothing carries over between tables or blocks.
pub struct RowReconstructor<'c> {
    config: &'c ParserConfig,
    state: State,
    rows: Vec<RawRow>,
    stats: RowStats,
}

impl<'c> RowReconstructor<'c> {
    pub fn new(config: &'c ParserConfig) -> Self {
        RowReconstructor {
            config,
            state: State::Idle,
            rows: Vec::new(),
            stats: RowStats::default(),
        }
    }

    pub fn feed(&mut self, line: &str) {
        match classify(line, self.config) {
            Line::Empty => {}
            Line::Code { code, rest } => {
                self.close_row();
                self.open_row(code, rest);
            }
            Line::Amount(raw) => self.on_amount(raw),
            Line::PageArtifact | Line::Marker => self.close_row(),
            Line::Text(text) => match &mut self.state {
                State::Idle => self.stats.noise_lines += 1,
                State::Accumulating { fragments, .. } | State::AmountPending { fragments, .. } => {
                    fragments.push(text.to_string());
                }
            },
        }
    }

    /// Close whatever is open and hand back the rows.
    pub fn finish(mut self) -> (Vec<RawRow>, RowStats) {
        self.close_row();
        (self.rows, self.stats)
    }

    fn open_row(&mut self, code: &str, rest: &str) {
        if let Some((desc, amount)) = trailing_amount(rest) {
            if is_accepted_amount(amount, self.config.min_amount) {
                // Amount on the code line itself closes the row right away.
                let fragments = if desc.is_empty() { Vec::new() } else { vec![desc.to_string()] };
                self.emit(code.to_string(), fragments, amount.to_string());
                return;
            }
        }
        self.state = State::Accumulating {
            code: code.to_string(),
            fragments: vec![rest.to_string()],
        };
    }

    fn on_amount(&mut self, raw: &str) {
        if matches!(self.state, State::Idle) {
            self.stats.noise_lines += 1;
            return;
        }
        if !is_accepted_amount(raw, self.config.min_amount) {
            // Page numbers and percentages end the row instead of closing it.
            self.stats.rejected_small_numbers += 1;
            self.close_row();
            return;
        }

        let (code, fragments) = match std::mem::take(&mut self.state) {
            State::Accumulating { code, fragments } | State::AmountPending { code, fragments, .. } => {
                (code, fragments)
            }
            State::Idle => return,
        };
        match self.config.amount_commit {
            AmountCommit::Immediate => self.emit(code, fragments, raw.to_string()),
            AmountCommit::Deferred => {
                self.state = State::AmountPending {
                    code,
                    fragments,
                    amount: raw.to_string(),
                }
            }
        }
    }

    /// Row boundary: emit a row holding an amount, drop one without.
    fn close_row(&mut self) {
        match std::mem::take(&mut self.state) {
            State::Idle => {}
            State::Accumulating { code, .. } => {
                tracing::trace!(code = %code, "dropping row without amount");
                self.stats.dropped_without_amount += 1;
            }
            State::AmountPending { code, fragments, amount } => self.emit(code, fragments, amount),
        }
    }

    fn emit(&mut self, code: String, fragments: Vec<String>, raw_amount: String) {
        let amount = normalize_amount(&raw_amount);
        if amount.is_nan() {
            tracing::debug!(code = %code, raw = %raw_amount, "amount did not normalize");
            self.stats.unparsed_amounts += 1;
        }
        self.stats.emitted += 1;
        self.rows.push(RawRow {
            code,
            description: join_fragments(&fragments),
            amount,
        });
        self.state = State::Idle;
    }
}

/// Run the state machine over one table's lines.
pub fn reconstruct_rows(lines: &[&str], config: &ParserConfig) -> (Vec<RawRow>, RowStats) {
    let mut machine = RowReconstructor::new(config);
    for line in lines {
        machine.feed(line);
    }
    machine.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> (Vec<RawRow>, RowStats) {
        reconstruct_rows(lines, &ParserConfig::default())
    }

    fn run_immediate(lines: &[&str]) -> (Vec<RawRow>, RowStats) {
        let cfg = ParserConfig::builder()
            .amount_commit(AmountCommit::Immediate)
            .build()
            .unwrap();
        reconstruct_rows(lines, &cfg)
    }

    #[test]
    fn inline_amount_closes_row() {
        let (rows, stats) = run(&["001 Investitionen in Anlagevermögen 1.500.000,00"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, "001");
        assert_eq!(rows[0].description, "Investitionen in Anlagevermögen");
        assert_eq!(rows[0].amount, 1_500_000.0);
        assert_eq!(stats.emitted, 1);
    }

    #[test]
    fn wrapped_description_with_standalone_amount() {
        let (rows, _) = run(&[
            "002 Forschungs- und Innovationstätigkeiten in Förder-",
            "programmen kleiner Unternehmen",
            "2.250.000,00",
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].description,
            "Forschungs- und Innovationstätigkeiten in Förderprogrammen kleiner Unternehmen"
        );
        assert_eq!(rows[0].amount, 2_250_000.0);
    }

    #[test]
    fn code_after_code_drops_first() {
        let (rows, stats) = run(&["001 Ohne Betrag", "002 Mit Betrag 5.000,00"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, "002");
        assert_eq!(stats.dropped_without_amount, 1);
    }

    #[test]
    fn small_number_ends_row_without_amount() {
        let (rows, stats) = run(&["001 Breitband", "90", "Weiterer Text"]);
        assert!(rows.is_empty());
        assert_eq!(stats.rejected_small_numbers, 1);
        assert_eq!(stats.dropped_without_amount, 1);
        assert_eq!(stats.noise_lines, 1);
    }

    #[test]
    fn threshold_boundary() {
        let (rows, _) = run(&["001 A", "999"]);
        assert!(rows.is_empty());
        let (rows, _) = run(&["001 A", "1000"]);
        assert_eq!(rows[0].amount, 1000.0);
        let (rows, _) = run(&["001 A", "1.000"]);
        assert_eq!(rows[0].amount, 1000.0);
    }

    #[test]
    fn small_inline_number_stays_in_description() {
        let (rows, stats) = run(&["033 Gebiete mit 90", "4.000,00"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "Gebiete mit 90");
        assert_eq!(stats.rejected_small_numbers, 0);

        let (rows, stats) = run(&["041 Maßnahmen nach Artikel 3", "5.000,00"]);
        assert_eq!(rows[0].description, "Maßnahmen nach Artikel 3");
        assert_eq!(stats.rejected_small_numbers, 0);
    }

    #[test]
    fn page_artifact_drops_open_row() {
        let (rows, stats) = run(&["001 Text", "Seite 12", "1.000,00"]);
        assert!(rows.is_empty());
        assert_eq!(stats.dropped_without_amount, 1);
        assert_eq!(stats.noise_lines, 1);
    }

    #[test]
    fn repeated_header_drops_open_row() {
        let (rows, stats) = run(&["001 Text", "Code Beschreibung Betrag (EUR)", "1.000,00"]);
        assert!(rows.is_empty());
        assert_eq!(stats.dropped_without_amount, 1);
        assert_eq!(stats.noise_lines, 1);
    }

    #[test]
    fn marker_emits_pending_row() {
        let (rows, stats) = run(&["001 Text", "3.000,00", "Code Beschreibung Betrag (EUR)"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 3000.0);
        assert_eq!(stats.dropped(), 0);

        let (rows, _) = run(&["001 Text", "3.000,00", "Tabelle 5: Dimension 2 – Form der Finanzierung"]);
        assert_eq!(rows.len(), 1);
        let (rows, stats) = run(&["001 Text", "2.1.2 Spezifisches Ziel RSO1.2", "3.000,00"]);
        assert!(rows.is_empty());
        assert_eq!(stats.dropped(), 1);
    }

    #[test]
    fn deferred_keeps_trailing_continuation() {
        let (rows, _) = run(&["001 Energie", "3.000,00", "und Klima", "002 Wasser 4.000,00"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "Energie und Klima");
        assert_eq!(rows[0].amount, 3000.0);
    }

    #[test]
    fn immediate_commits_on_amount() {
        let (rows, stats) = run_immediate(&["001 Energie", "3.000,00", "und Klima", "002 Wasser 4.000,00"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "Energie");
        assert_eq!(stats.noise_lines, 1);
    }

    #[test]
    fn pending_amount_emitted_at_boundary_and_end() {
        let (rows, _) = run(&["001 Energie", "3.000,00", "Seite 4"]);
        assert_eq!(rows.len(), 1);
        let (rows, _) = run(&["001 Energie", "3.000,00"]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn later_amount_replaces_pending() {
        let (rows, _) = run(&["001 Energie", "3.000,00", "3.500,00"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 3500.0);
    }

    #[test]
    fn small_number_after_pending_amount_emits() {
        let (rows, stats) = run(&["001 Energie", "3.000,00", "7"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(stats.rejected_small_numbers, 1);
    }

    #[test]
    fn amount_without_code_is_noise() {
        let (rows, stats) = run(&["5.000,00", "Fußnote"]);
        assert!(rows.is_empty());
        assert_eq!(stats.noise_lines, 2);
    }

    #[test]
    fn unfinished_row_discarded_at_end() {
        let (rows, stats) = run(&["001 Etwas", "mehr Text"]);
        assert!(rows.is_empty());
        assert_eq!(stats.dropped(), 1);
    }

    #[test]
    fn state_does_not_leak_between_tables() {
        let cfg = ParserConfig::default();
        let (first, _) = reconstruct_rows(&["001 Offen"], &cfg);
        let (second, _) = reconstruct_rows(&["5.000,00"], &cfg);
        assert!(first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn stats_merge() {
        let mut total = RowStats { emitted: 1, ..RowStats::default() };
        total.merge(&RowStats { emitted: 2, dropped_without_amount: 1, ..RowStats::default() });
        assert_eq!(total.emitted, 3);
        assert_eq!(total.dropped(), 1);
    }
}
