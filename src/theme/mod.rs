pub mod renderer;

pub use renderer::{PartialRenderer, ThemeRenderer};
