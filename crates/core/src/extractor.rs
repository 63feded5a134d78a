use crate::error::IngestError;
use lopdf::Document;
use std::panic;
use std::path::Path;
use tracing::{debug, warn};

const FORM_FEED: char = '\u{000c}';

/// Text of one PDF page. Page numbers are zero-based.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn name(&self) -> &'static str;
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

/// Fast page-by-page extraction through the document's content streams.
#[derive(Debug, Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no.saturating_sub(1),
                    text,
                });
            }
        }

        non_empty(pages, path)
    }
}

/// Slower layout-driven extraction that copes with fonts and encodings the
/// fast path rejects. Pages are recovered from form feeds when present.
#[derive(Debug, Default)]
pub struct CompatibilityExtractor;

impl PdfExtractor for CompatibilityExtractor {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        // pdf-extract panics on some malformed inputs instead of returning an error.
        let text = panic::catch_unwind(|| pdf_extract::extract_text(path))
            .map_err(|_| IngestError::PdfParse("pdf-extract aborted while parsing".to_string()))?
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let pages = text
            .split(FORM_FEED)
            .enumerate()
            .filter(|(_, page)| !page.trim().is_empty())
            .map(|(index, page)| PageText {
                number: index as u32,
                text: page.to_string(),
            })
            .collect();

        non_empty(pages, path)
    }
}

fn non_empty(pages: Vec<PageText>, path: &Path) -> Result<Vec<PageText>, IngestError> {
    if pages.is_empty() {
        return Err(IngestError::PdfParse(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }
    Ok(pages)
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    extract_with_fallback(&LopdfExtractor, &CompatibilityExtractor, path)
}

/// Runs `fast`, then `fallback` when the first one fails. Only fails when
/// both do, reporting both causes.
pub fn extract_with_fallback(
    fast: &dyn PdfExtractor,
    fallback: &dyn PdfExtractor,
    path: &Path,
) -> Result<Vec<PageText>, IngestError> {
    let fast_error = match fast.extract_pages(path) {
        Ok(pages) => {
            debug!(loader = fast.name(), pages = pages.len(), "loaded pdf");
            return Ok(pages);
        }
        Err(error) => error,
    };

    warn!(loader = fast.name(), error = %fast_error, "pdf loader failed, trying fallback");

    match fallback.extract_pages(path) {
        Ok(pages) => {
            debug!(loader = fallback.name(), pages = pages.len(), "loaded pdf");
            Ok(pages)
        }
        Err(fallback_error) => Err(IngestError::LoadersExhausted {
            fast: fast_error.to_string(),
            fallback: fallback_error.to_string(),
        }),
    }
}
