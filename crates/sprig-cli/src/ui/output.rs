//! Output handle used by commands.
//!
//! Status lines go to stdout, errors to stderr. Color is dropped when the
//! stream is not a terminal so piped output (graph, list) stays clean.

use std::io::IsTerminal;

use crossterm::style::Stylize;

use super::theme::Theme;

/// A cloneable handle for printing status messages.
#[derive(Debug, Clone)]
pub struct Output {
    theme: Theme,
    color: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output handle.
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            color: std::io::stdout().is_terminal(),
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Whether styled output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    fn icon(&self, icon: &'static str, color: crossterm::style::Color) -> String {
        if self.color {
            icon.with(color).to_string()
        } else {
            icon.to_string()
        }
    }

    /// Prints a section header.
    pub fn section(&self, title: &str) {
        if self.color {
            println!("{}", title.with(self.theme.colors.header).bold());
        } else {
            println!("{title}");
        }
    }

    pub fn info(&self, msg: &str) {
        let icon = self.icon(self.theme.icons.info, self.theme.colors.info);
        println!("  {icon} {msg}");
    }

    pub fn success(&self, msg: &str) {
        let icon = self.icon(self.theme.icons.success, self.theme.colors.success);
        println!("  {icon} {msg}");
    }

    pub fn warning(&self, msg: &str) {
        let icon = self.icon(self.theme.icons.warning, self.theme.colors.warning);
        println!("  {icon} {msg}");
    }

    pub fn error(&self, msg: &str) {
        let icon = self.icon(self.theme.icons.error, self.theme.colors.error);
        eprintln!("  {icon} {msg}");
    }

    /// A package name in the theme's package color.
    pub fn package(&self, name: &str) -> String {
        if self.color {
            name.with(self.theme.colors.package_name).to_string()
        } else {
            name.to_string()
        }
    }

    /// Secondary text such as paths.
    pub fn dim(&self, text: &str) -> String {
        if self.color {
            text.with(self.theme.colors.secondary).to_string()
        } else {
            text.to_string()
        }
    }
}
