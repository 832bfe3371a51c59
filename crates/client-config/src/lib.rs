//! Configuration, file system paths, and logging setup for the Threadline client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, ServicePaths, DEFAULT_API_BASE_URL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
