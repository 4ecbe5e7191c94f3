//! Terminal output: status lines, colors, and column layout.

pub mod columns;
pub mod output;
pub mod theme;

pub use output::Output;
pub use theme::Theme;
