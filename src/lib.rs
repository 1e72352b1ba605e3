pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod scenario;
pub mod stage;
pub mod table;
pub mod task;

pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
