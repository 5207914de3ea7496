//! Pure rendering of a progress frame.

use crate::types::Item;

/// Width of the text bar in traced frames
const TEXT_BAR_WIDTH: u16 = 20;

const PAD: &str = "  ";
const FILLED: char = '█';
const EMPTY: char = '░';
const HELP: &str = "Press Ctrl+C to quit";

/// Snapshot of the values a frame is computed from
#[derive(Debug, Clone, Copy)]
pub struct ProgressView<'a> {
    /// Completed items
    pub current: u64,
    /// Expected total, once reported
    pub total: Option<u64>,
    /// Items in flight
    pub active: &'a [Item],
}

impl ProgressView<'_> {
    /// Completed fraction in `0.0..=1.0`; zero while the total is unknown or zero
    pub fn fraction(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => (self.current as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }
}

/// Completed and expected counts, `[current/total]`, with `?` for an unknown total
pub fn counts(view: &ProgressView<'_>) -> String {
    match view.total {
        Some(total) => format!("[{}/{}]", view.current, total),
        None => format!("[{}/?]", view.current),
    }
}

/// Items in flight, comma separated
pub fn active_line(view: &ProgressView<'_>) -> String {
    view.active
        .iter()
        .map(Item::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a full text frame: counts and active items, the bar, then the help line
pub fn render(view: &ProgressView<'_>) -> String {
    format!(
        "\n{PAD}{} {}\n{PAD}{}\n\n{PAD}{HELP}",
        counts(view),
        active_line(view),
        render_bar(view.fraction(), TEXT_BAR_WIDTH)
    )
}

/// Render the bar alone followed by the percentage
pub fn render_bar(fraction: f64, width: u16) -> String {
    let width = usize::from(width);
    let filled = ((fraction * width as f64).round() as usize).min(width);

    let mut bar = String::with_capacity(width * FILLED.len_utf8() + 5);
    bar.extend(std::iter::repeat_n(FILLED, filled));
    bar.extend(std::iter::repeat_n(EMPTY, width - filled));
    bar.push_str(&format!(" {:>3.0}%", fraction * 100.0));
    bar
}
