use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "alloc_extract.toml";
const DEFAULT_DB_PATH: &str = "data/allocations.sqlite";
const ENV_PREFIX: &str = "ALLOC";

pub const DEFAULT_SECTION_TITLE: &str = "Indikative Aufschlüsselung";
pub const DEFAULT_PRIORITY_MARKER: &str = "Priorität";
pub const DEFAULT_OBJECTIVE_MARKER: &str = "Spezifisches Ziel";
pub const DEFAULT_DIMENSION_KEYWORD: &str = "Dimension";
pub const DEFAULT_MIN_AMOUNT: f64 = 1000.0;

/// Column header variants that open a dimension table.
pub const DEFAULT_HEADER_PATTERNS: &[&str] = &[
    r"(?i)^\s*code\s+beschreibung\s+betrag\b",
    r"(?i)\bcode\b.*\bbetrag\s*\(\s*eur\s*\)",
    r"(?i)^\s*code\s+description\s+amount\b",
];

/// What a standalone amount line does to the row under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountCommit {
    /// Remember the amount; the row is emitted at the next boundary.
    #[default]
    Deferred,
    /// Emit the row as soon as the amount line is seen.
    Immediate,
}

/// Where a section block's body begins relative to its heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyStart {
    #[default]
    AfterHeading,
    Heading,
}

/// Compiled parser configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub(crate) section_heading_re: Regex,
    pub(crate) any_heading_re: Regex,
    pub(crate) dimension_re: Regex,
    pub(crate) header_res: Vec<Regex>,
    pub(crate) priority_marker: String,
    pub(crate) objective_marker: String,
    pub(crate) priority_value_re: Regex,
    pub body_start: BodyStart,
    pub amount_commit: AmountCommit,
    pub min_amount: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        // Built-in patterns are static and known to compile.
        ParserConfigBuilder::default()
            .build()
            .expect("built-in parser patterns compile")
    }
}

impl ParserConfig {
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::default()
    }

    pub(crate) fn is_header(&self, line: &str) -> bool {
        self.header_res.iter().any(|re| re.is_match(line))
    }
}

/// Builder for [`ParserConfig`].
///
/// Takes plain strings; [`build()`](Self::build) escapes literal markers and
/// compiles header patterns, failing on the first invalid regex.
#[derive(Debug, Clone, Default)]
pub struct ParserConfigBuilder {
    section_title: Option<String>,
    priority_marker: Option<String>,
    objective_marker: Option<String>,
    dimension_keyword: Option<String>,
    header_patterns: Option<Vec<String>>,
    body_start: BodyStart,
    amount_commit: AmountCommit,
    min_amount: Option<f64>,
}

impl ParserConfigBuilder {
    pub fn section_title(mut self, title: impl Into<String>) -> Self {
        self.section_title = Some(title.into());
        self
    }

    pub fn priority_marker(mut self, marker: impl Into<String>) -> Self {
        self.priority_marker = Some(marker.into());
        self
    }

    pub fn objective_marker(mut self, marker: impl Into<String>) -> Self {
        self.objective_marker = Some(marker.into());
        self
    }

    pub fn dimension_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.dimension_keyword = Some(keyword.into());
        self
    }

    /// Replace the default column header variants.
    pub fn header_patterns(mut self, patterns: Vec<String>) -> Self {
        self.header_patterns = Some(patterns);
        self
    }

    pub fn body_start(mut self, start: BodyStart) -> Self {
        self.body_start = start;
        self
    }

    pub fn amount_commit(mut self, policy: AmountCommit) -> Self {
        self.amount_commit = policy;
        self
    }

    pub fn min_amount(mut self, min: f64) -> Self {
        self.min_amount = Some(min);
        self
    }

    pub fn build(self) -> Result<ParserConfig, regex::Error> {
        let title = self.section_title.as_deref().unwrap_or(DEFAULT_SECTION_TITLE);
        let keyword = self
            .dimension_keyword
            .as_deref()
            .unwrap_or(DEFAULT_DIMENSION_KEYWORD);
        let priority_marker = self
            .priority_marker
            .unwrap_or_else(|| DEFAULT_PRIORITY_MARKER.to_string());
        let objective_marker = self
            .objective_marker
            .unwrap_or_else(|| DEFAULT_OBJECTIVE_MARKER.to_string());

        // "2.1.1.1.3." / "2.A.1" followed by the section title, rest of line included.
        let section_heading_re = Regex::new(&format!(
            r"(?m)^[ \t]*(?P<id>(?:\d+|[A-Z])(?:\.(?:\d+|[A-Z]))+)\.?[ \t]+{}[^\n]*",
            regex::escape(title)
        ))?;
        // Short numeric components so "1.000 EUR" is never taken for a heading.
        let any_heading_re =
            Regex::new(r"^\s*(?:\d{1,2}|[A-Z])(?:\.(?:\d{1,2}|[A-Z]))+\.?\s+\p{L}")?;
        // Optional "Tabelle 4:" style prefix before the keyword.
        let dimension_re = Regex::new(&format!(
            r"(?m)^[ \t]*(?:\S+[ \t]+\d+[ \t]*[:.]?[ \t]*)?(?P<marker>{}[ \t]+(?P<index>\d+)\b[^\n]*)$",
            regex::escape(keyword)
        ))?;
        let priority_value_re = Regex::new(&format!(
            r"(?i){}\s*:?\s*(?P<value>\d+(?:\.\d+)*[A-Za-z]?)",
            regex::escape(&priority_marker)
        ))?;

        let header_res = match self.header_patterns {
            Some(patterns) => patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_HEADER_PATTERNS
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(ParserConfig {
            section_heading_re,
            any_heading_re,
            dimension_re,
            header_res,
            priority_marker,
            objective_marker,
            priority_value_re,
            body_start: self.body_start,
            amount_commit: self.amount_commit,
            min_amount: self.min_amount.unwrap_or(DEFAULT_MIN_AMOUNT),
        })
    }
}

/// User-facing settings, merged from file and `ALLOC_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub section_title: String,
    pub priority_marker: String,
    pub objective_marker: String,
    pub dimension_keyword: String,
    pub header_patterns: Vec<String>,
    pub body_start: BodyStart,
    pub amount_commit: AmountCommit,
    pub min_amount: f64,
    pub database: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            section_title: DEFAULT_SECTION_TITLE.to_string(),
            priority_marker: DEFAULT_PRIORITY_MARKER.to_string(),
            objective_marker: DEFAULT_OBJECTIVE_MARKER.to_string(),
            dimension_keyword: DEFAULT_DIMENSION_KEYWORD.to_string(),
            header_patterns: DEFAULT_HEADER_PATTERNS.iter().map(|p| p.to_string()).collect(),
            body_start: BodyStart::default(),
            amount_commit: AmountCommit::default(),
            min_amount: DEFAULT_MIN_AMOUNT,
            database: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    pub fn parser_config(&self) -> Result<ParserConfig> {
        ParserConfig::builder()
            .section_title(&self.section_title)
            .priority_marker(&self.priority_marker)
            .objective_marker(&self.objective_marker)
            .dimension_keyword(&self.dimension_keyword)
            .header_patterns(self.header_patterns.clone())
            .body_start(self.body_start)
            .amount_commit(self.amount_commit)
            .min_amount(self.min_amount)
            .build()
            .context("Invalid pattern in configuration")
    }
}
