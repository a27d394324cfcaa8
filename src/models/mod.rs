pub mod config;
pub mod types;

pub use config::{Config, SiteConfig};
pub use types::*;
