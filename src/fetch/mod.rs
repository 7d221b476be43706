pub mod readings;

pub use readings::{FetchError, Reading, ReadingFetcher};
