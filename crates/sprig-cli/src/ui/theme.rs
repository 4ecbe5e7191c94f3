//! UI Theme - colors and status icons shared by every command.

use crossterm::style::Color;

/// Default theme for sprig output
#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub colors: ColorScheme,
    pub icons: Icons,
}

/// Color scheme for UI elements
#[derive(Debug, Clone)]
pub struct ColorScheme {
    /// Package names (primary content)
    pub package_name: Color,
    /// Versions and specs
    pub version: Color,
    /// Paths and secondary info
    pub secondary: Color,
    /// Section headers
    pub header: Color,
    pub info: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            package_name: Color::Cyan,
            version: Color::White,
            secondary: Color::DarkGrey,
            header: Color::DarkGrey,
            info: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
        }
    }
}

/// Status icons for different states
#[derive(Debug, Clone)]
pub struct Icons {
    /// Success/completed state (✓)
    pub success: &'static str,
    /// Error/failed state (✗)
    pub error: &'static str,
    /// Warning state (⚠)
    pub warning: &'static str,
    /// Info state (ℹ)
    pub info: &'static str,
    /// Marks a version with a known checksum (●)
    pub checksum: &'static str,
    /// Marks a version without one (○)
    pub no_checksum: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            success: "✓",
            error: "✗",
            warning: "⚠",
            info: "ℹ",
            checksum: "●",
            no_checksum: "○",
        }
    }
}
