//! Column layout for lists of names, filled top to bottom like `ls`.
//!
//! Columns are sized to their widest entry so narrow columns pack tightly.

use std::io::{self, Write};

/// Spaces between columns.
pub const PADDING: usize = 2;

const FALLBACK_WIDTH: usize = 80;

/// Width of the attached terminal, or 80 when there is none.
pub fn terminal_width() -> usize {
    crossterm::terminal::size()
        .ok()
        .map(|(cols, _)| usize::from(cols))
        .filter(|&cols| cols > 0)
        .unwrap_or(FALLBACK_WIDTH)
}

/// Row count and per-column widths chosen for a set of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub rows: usize,
    pub widths: Vec<usize>,
}

/// Pick the most columns whose lines stay narrower than `width`.
///
/// Falls back to a single column when even two do not fit.
pub fn layout<S: AsRef<str>>(items: &[S], width: usize, padding: usize) -> Layout {
    let lengths: Vec<usize> = items.iter().map(|s| s.as_ref().chars().count()).collect();
    let Some(&shortest) = lengths.iter().min() else {
        return Layout {
            rows: 0,
            widths: Vec::new(),
        };
    };

    let max_cols = ((width + padding) / (shortest + padding)).clamp(1, lengths.len());
    for cols in (2..=max_cols).rev() {
        let rows = lengths.len().div_ceil(cols);
        let widths: Vec<usize> = lengths
            .chunks(rows)
            .map(|col| col.iter().copied().max().unwrap_or(0))
            .collect();
        let line = widths.iter().sum::<usize>() + padding * (widths.len() - 1);
        if line < width {
            return Layout { rows, widths };
        }
    }

    Layout {
        rows: lengths.len(),
        widths: vec![lengths.iter().copied().max().unwrap_or(0)],
    }
}

/// Render `items` in columns, each line prefixed by `indent` spaces.
pub fn render<S: AsRef<str>>(items: &[S], width: usize, indent: usize) -> String {
    let width = width.saturating_sub(indent).max(1);
    let Layout { rows, widths } = layout(items, width, PADDING);

    let mut out = String::new();
    for row in 0..rows {
        out.push_str(&" ".repeat(indent));
        let cells: Vec<(usize, &str)> = widths
            .iter()
            .enumerate()
            .filter_map(|(col, &w)| items.get(col * rows + row).map(|s| (w, s.as_ref())))
            .collect();
        for (i, (w, cell)) in cells.iter().enumerate() {
            if i + 1 == cells.len() {
                out.push_str(cell);
            } else {
                let pad = w + PADDING - cell.chars().count();
                out.push_str(cell);
                out.push_str(&" ".repeat(pad));
            }
        }
        out.push('\n');
    }
    out
}

/// Write `items` in columns sized to the terminal.
pub fn colify<S: AsRef<str>>(out: &mut dyn Write, items: &[S], indent: usize) -> io::Result<()> {
    out.write_all(render(items, terminal_width(), indent).as_bytes())
}
