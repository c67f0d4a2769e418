pub mod config;
pub mod error;

pub use config::SaltpackConfig;
pub use error::{CoreError, CoreResult};
