pub mod history_blob;

pub use history_blob::HistoryBlob;
