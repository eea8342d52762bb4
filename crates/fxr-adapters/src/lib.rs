//! Pure source extractors: raw documents in, loosely typed candidates out.

mod blob;
mod directory;
mod markup;
mod normalize;
mod realtime;
mod simple_table;
mod table;

use fxr_core::ScrapedRate;
use thiserror::Error;

pub use blob::{extract_blob_quote, BlobOffsets};
pub use directory::{absolute_url, extract_directory, DirectoryEntry};
pub use normalize::{parse_rate_text, percent_to_fraction, round6};
pub use realtime::extract_realtime_price;
pub use simple_table::SimpleTableExtractor;
pub use table::{discover_layout, ColumnLayout, ColumnStrategy, HeaderTableExtractor, COLUMN_STRATEGIES};

pub const CRATE_NAME: &str = "fxr-adapters";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("variable {0} not found")]
    VariableMissing(String),
    #[error("variable {variable} has {got} fields, need {need}")]
    InsufficientFields {
        variable: String,
        need: usize,
        got: usize,
    },
    #[error("invalid selector: {0}")]
    Selector(String),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("not a number: {0:?}")]
    InvalidNumber(String),
    #[error("no rate rows found for {0}")]
    NoRows(String),
}

/// A bank rate page parser bound to one source.
pub trait RateExtractor: Send + Sync {
    fn source_id(&self) -> &str;

    fn extract(&self, body: &str) -> Result<Vec<ScrapedRate>, ExtractError>;
}

/// Look up an extractor by the name used in the source registry.
pub fn extractor_for_source(kind: &str, source_id: &str) -> Option<Box<dyn RateExtractor>> {
    match kind {
        "simple_table" => Some(Box::new(SimpleTableExtractor::new(source_id))),
        "header_table" => Some(Box::new(HeaderTableExtractor::new(source_id))),
        _ => None,
    }
}
