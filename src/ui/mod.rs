//! Screen output.
//!
//! - **renderer**: placeholder grid, welcome banner and cursor placement

pub mod renderer;

pub use renderer::{teardown_frame, Renderer};
