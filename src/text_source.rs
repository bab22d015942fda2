use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{extractor}: {message}")]
    Pdf {
        extractor: &'static str,
        message: String,
    },

    #[error("{0} panicked on malformed document")]
    Panicked(&'static str),

    #[error("all extractors failed (primary: {primary}; secondary: {secondary})")]
    Exhausted {
        primary: Box<ExtractError>,
        secondary: Box<ExtractError>,
    },
}

/// Turns document bytes into UTF-8 text.
pub trait TextExtractor: Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Primary extractor backed by `pdf-extract`.
pub struct PdfExtract;

impl TextExtractor for PdfExtract {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        // pdf-extract panics on some malformed files instead of returning Err.
        let result = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));
        match result {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ExtractError::Pdf {
                extractor: self.name(),
                message: e.to_string(),
            }),
            Err(_) => Err(ExtractError::Panicked(self.name())),
        }
    }
}

/// Secondary extractor: page-by-page text through `lopdf`.
pub struct Lopdf;

impl TextExtractor for Lopdf {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let pdf_err = |e: lopdf::Error| ExtractError::Pdf {
            extractor: "lopdf",
            message: e.to_string(),
        };
        let document = lopdf::Document::load_mem(bytes).map_err(pdf_err)?;

        let mut text = String::new();
        for page_num in document.get_pages().keys() {
            match document.extract_text(&[*page_num]) {
                Ok(page) => {
                    text.push_str(&page);
                    text.push('\n');
                }
                Err(e) => debug!(page = page_num, "lopdf skipped page: {}", e),
            }
        }
        Ok(text)
    }
}

/// Extracted text and the extractor that produced it.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub extractor: &'static str,
}

/// Try `primary`; fall back to `secondary` once if it fails or yields no text.
pub fn extract_with_fallback(
    primary: &dyn TextExtractor,
    secondary: &dyn TextExtractor,
    bytes: &[u8],
) -> Result<Extracted, ExtractError> {
    let primary_err = match primary.extract(bytes) {
        Ok(text) if !text.trim().is_empty() => {
            return Ok(Extracted {
                text,
                extractor: primary.name(),
            });
        }
        Ok(_) => {
            debug!("{} returned no text, trying {}", primary.name(), secondary.name());
            None
        }
        Err(e) => {
            warn!("{} failed ({}), trying {}", primary.name(), e, secondary.name());
            Some(e)
        }
    };

    match secondary.extract(bytes) {
        Ok(text) => Ok(Extracted {
            text,
            extractor: secondary.name(),
        }),
        Err(secondary_err) => match primary_err {
            Some(primary_err) => Err(ExtractError::Exhausted {
                primary: Box::new(primary_err),
                secondary: Box::new(secondary_err),
            }),
            // Primary worked but found nothing; an empty document is not an error.
            None => Ok(Extracted {
                text: String::new(),
                extractor: primary.name(),
            }),
        },
    }
}

/// Load one document: `.txt` is taken as already-extracted text, anything else as PDF.
pub fn load_document(path: &Path) -> Result<Extracted, ExtractError> {
    let is_text = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
    if is_text {
        return Ok(Extracted {
            text: std::fs::read_to_string(path)?,
            extractor: "plain-text",
        });
    }
    let bytes = std::fs::read(path)?;
    extract_with_fallback(&PdfExtract, &Lopdf, &bytes)
}
