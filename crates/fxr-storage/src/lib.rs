//! HTTP fetch + record store seams for rate ingestion.

mod fetch;
mod memory;
mod postgres;
mod store;

pub use fetch::{
    FetchError, FetchedResponse, Fetcher, HttpClientConfig, HttpFetcher, StaticFetcher,
    DEFAULT_FETCH_TIMEOUT,
};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{RateStore, StoreError};

pub const CRATE_NAME: &str = "fxr-storage";
