pub mod error;
pub mod front_matter;
pub mod generator;
pub mod renderer;
pub mod watcher;

pub use error::{BuildError, ConfigError, FrontMatterError, PageError, PagesFailed, WatchError};
pub use generator::SiteBuilder;
pub use renderer::PageRenderer;
pub use watcher::{SiteWatcher, WatchHandle, WatchTarget};
