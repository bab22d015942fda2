mod config;
mod db;
mod parser;
mod text_source;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{ParserConfig, Settings};
use crate::parser::records::COLUMNS;
use crate::parser::ParsedDocument;

#[derive(Parser)]
#[command(name = "alloc_extract", about = "Budget allocation tables from EU programme documents")]
struct Cli {
    /// Settings file (default: alloc_extract.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database (overrides the configured path)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse documents and print their rows
    Parse {
        /// PDF or extracted .txt files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// One JSON object per row instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Parse documents in parallel and store rows in SQLite
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Stored rows overview table
    Rows {
        /// Filter by section id (e.g. "2.1.1.1.3")
        #[arg(short, long)]
        section: Option<String>,
        /// Filter by dimension label prefix (e.g. "Dimension 1")
        #[arg(short, long)]
        dimension: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show document and row counts
    Stats,
    /// Show how each extracted line of a document is classified
    Lines { file: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let db_path = cli.database.clone().unwrap_or_else(|| settings.database.clone());

    let result = match cli.command {
        Commands::Parse { files, json } => {
            let cfg = settings.parser_config()?;
            let outcomes = parse_batch(&files, &cfg);
            let mut failed = 0;
            for outcome in &outcomes {
                let parsed = match &outcome.result {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        failed += 1;
                        continue;
                    }
                };
                if json {
                    for record in &parsed.records {
                        println!("{}", serde_json::to_string(record)?);
                    }
                } else {
                    print_records(outcome, parsed);
                }
            }
            if failed > 0 {
                println!("{} of {} documents failed.", failed, outcomes.len());
            }
            Ok(())
        }
        Commands::Ingest { files } => {
            let cfg = settings.parser_config()?;
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            println!("Ingesting {} documents into {}...", files.len(), db_path.display());
            let counts = ingest(&conn, &files, &cfg)?;
            println!(
                "Saved {} rows from {} documents ({} failed, {} rows dropped without amount).",
                counts.rows, counts.documents, counts.failed, counts.dropped
            );
            Ok(())
        }
        Commands::Rows { section, dimension, limit } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_rows(&conn, section.as_deref(), dimension.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No rows found. Run 'ingest' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<20} | {:<12} | {:<24} | {:<5} | {:<40} | {:>16} | {:<4}",
                "#", "Source", "Section", "Dimension", "Code", "Description", "Amount (EUR)", "Keep"
            );
            println!("{}", "-".repeat(145));

            for (i, r) in rows.iter().enumerate() {
                let amount = r.amount.map(|a| format!("{:.2}", a)).unwrap_or_else(|| "-".into());
                println!(
                    "{:>3} | {:<20} | {:<12} | {:<24} | {:<5} | {:<40} | {:>16} | {:<4}",
                    i + 1,
                    truncate(&r.source, 20),
                    r.section_id,
                    truncate(&r.dimension, 24),
                    r.code,
                    truncate(&r.description, 40),
                    amount,
                    if r.keep { "yes" } else { "no" }
                );
            }

            println!("\n{} rows", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Documents:        {}", s.documents);
            println!("Failed:           {}", s.failed);
            println!("Rows:             {}", s.rows);
            println!("Unparsed amounts: {}", s.unparsed_amounts);
            println!("Kept:             {}", s.kept);
            Ok(())
        }
        Commands::Lines { file } => {
            let cfg = settings.parser_config()?;
            let doc = text_source::load_document(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            let text = doc.text.replace("\r\n", "\n");
            for (n, (raw, line)) in text
                .lines()
                .zip(parser::lines::classify_lines(&text, &cfg))
                .enumerate()
            {
                println!("{:>5} {:<40} | {}", n + 1, truncate(&format!("{:?}", line), 40), truncate(raw, 80));
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Result of parsing one document. Failures are carried, never propagated.
struct DocumentOutcome {
    source: String,
    result: Result<ParsedDocument, String>,
    extractor: Option<&'static str>,
    char_count: usize,
}

fn parse_document(path: &Path, cfg: &ParserConfig) -> DocumentOutcome {
    let source = path.display().to_string();
    match text_source::load_document(path) {
        Ok(doc) => DocumentOutcome {
            result: Ok(parser::parse_text(&doc.text, cfg)),
            extractor: Some(doc.extractor),
            char_count: doc.text.chars().count(),
            source,
        },
        Err(e) => {
            warn!(source = %source, "skipping document: {}", e);
            DocumentOutcome {
                result: Err(e.to_string()),
                extractor: None,
                char_count: 0,
                source,
            }
        }
    }
}

fn progress_bar(len: usize) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Parse documents in parallel, one per task, keeping input order.
fn parse_batch(paths: &[PathBuf], cfg: &ParserConfig) -> Vec<DocumentOutcome> {
    use rayon::prelude::*;

    let pb = progress_bar(paths.len());
    let outcomes = paths
        .par_iter()
        .map(|p| {
            let outcome = parse_document(p, cfg);
            pb.inc(1);
            outcome
        })
        .collect();
    pb.finish_and_clear();
    outcomes
}

struct IngestCounts {
    documents: usize,
    failed: usize,
    rows: usize,
    dropped: usize,
}

fn ingest(
    conn: &rusqlite::Connection,
    paths: &[PathBuf],
    cfg: &ParserConfig,
) -> anyhow::Result<IngestCounts> {
    let mut counts = IngestCounts {
        documents: 0,
        failed: 0,
        rows: 0,
        dropped: 0,
    };

    for chunk in paths.chunks(64) {
        for outcome in parse_batch(chunk, cfg) {
            counts.documents += 1;
            let (doc, records) = match &outcome.result {
                Ok(parsed) => {
                    counts.rows += parsed.records.len();
                    counts.dropped += parsed.report.rows.dropped();
                    info!(
                        source = %outcome.source,
                        rows = parsed.records.len(),
                        tables = parsed.report.tables,
                        "parsed"
                    );
                    let doc = db::DocumentRow {
                        source: &outcome.source,
                        extractor: outcome.extractor,
                        error: None,
                        char_count: Some(outcome.char_count),
                    };
                    (doc, parsed.records.as_slice())
                }
                Err(e) => {
                    counts.failed += 1;
                    let doc = db::DocumentRow {
                        source: &outcome.source,
                        extractor: outcome.extractor,
                        error: Some(e.as_str()),
                        char_count: None,
                    };
                    (doc, &[][..])
                }
            };
            db::save_document(conn, &doc, records)
                .with_context(|| format!("Failed to save {}", outcome.source))?;
        }
    }

    Ok(counts)
}

fn print_records(outcome: &DocumentOutcome, parsed: &ParsedDocument) {
    const WIDTHS: [usize; 9] = [10, 6, 8, 8, 20, 24, 5, 40, 16];

    let report = &parsed.report;
    println!(
        "== {} ({}; {} sections, {} tables, {} skipped, {} rows dropped)",
        outcome.source,
        outcome.extractor.unwrap_or("-"),
        report.sections,
        report.tables,
        report.skipped_tables,
        report.rows.dropped()
    );
    if parsed.records.is_empty() {
        println!("No allocation rows found.\n");
        return;
    }

    let header: Vec<String> = COLUMNS
        .iter()
        .zip(WIDTHS)
        .map(|(name, w)| format!("{:<w$}", truncate(name, w), w = w))
        .collect();
    println!("{}", header.join(" | "));
    println!("{}", "-".repeat(WIDTHS.iter().sum::<usize>() + 3 * (WIDTHS.len() - 1)));

    for record in &parsed.records {
        let cells = record.cells();
        let line: Vec<String> = cells
            .iter()
            .zip(WIDTHS)
            .enumerate()
            .map(|(i, (cell, w))| {
                let cell = truncate(cell, w);
                if i == cells.len() - 1 {
                    format!("{:>w$}", cell, w = w)
                } else {
                    format!("{:<w$}", cell, w = w)
                }
            })
            .collect();
        println!("{}", line.join(" | "));
    }
    println!("\n{} rows\n", parsed.records.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("kurz", 10), "kurz");
        assert_eq!(truncate("Investitionen in Anlagevermögen", 10), "Investi...");
        assert_eq!(truncate("Übergangsregionen", 10).chars().count(), 10);
    }

    #[test]
    fn format_duration_units() {
        use std::time::Duration;
        assert_eq!(format_duration(Duration::from_secs(75)), "1m 15s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn missing_file_becomes_failed_outcome() {
        let outcome = parse_document(Path::new("tests/fixtures/missing.txt"), &ParserConfig::default());
        assert!(outcome.result.is_err());
        assert_eq!(outcome.extractor, None);
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let paths = vec![
            PathBuf::from("tests/fixtures/missing.pdf"),
            PathBuf::from("tests/fixtures/programme.txt"),
        ];
        let outcomes = parse_batch(&paths, &ParserConfig::default());
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].result.is_err());
        let parsed = outcomes[1].result.as_ref().unwrap();
        assert_eq!(parsed.records.len(), 7);
        assert_eq!(outcomes[1].extractor, Some("plain-text"));
    }

    #[test]
    fn ingest_fixture_into_memory_db() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let paths = vec![
            PathBuf::from("tests/fixtures/programme.txt"),
            PathBuf::from("tests/fixtures/missing.pdf"),
        ];
        let counts = ingest(&conn, &paths, &ParserConfig::default()).unwrap();
        assert_eq!(counts.documents, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.rows, 7);

        let stats = db::get_stats(&conn).unwrap();
        assert_eq!(stats.rows, 7);
        assert_eq!(stats.failed, 1);
    }
}
