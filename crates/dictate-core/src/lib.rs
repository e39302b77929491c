pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::DictateConfig;
pub use error::{DictateError, Result};
pub use events::SessionEvent;
pub use types::*;
