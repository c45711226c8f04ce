//! Data loading: fetch CSV exports by URL or path, decode them into Arrow
//! tables, and memoize the result per location.

mod error;
pub use error::FetchError;

pub mod cache;
pub mod decode;
pub mod fetcher;
pub mod loader;

pub use cache::TableCache;
pub use fetcher::{Fetch, FileFetcher, HttpFetcher, SourceFetcher};
pub use loader::TableLoader;
