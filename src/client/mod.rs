pub mod coordinator;
pub mod poller;
pub mod state;

pub use coordinator::FetchCoordinator;
pub use poller::Poller;
pub use state::{ErrorCategory, FetchState};
