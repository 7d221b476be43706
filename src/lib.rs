pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod server;
pub mod storage;

pub use error::{AppError, Result};
