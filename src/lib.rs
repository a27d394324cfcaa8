pub mod core;
pub mod models;
pub mod theme;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{SiteBuilder, SiteWatcher};
pub use crate::models::{BuildReport, Page, RenderContext, SiteConfig};
pub use crate::theme::renderer::ThemeRenderer;
