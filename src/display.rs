//! Terminal table for the session registry.
//!
//! Only the `State` column is colored; the color comes from a `Palette`
//! keyed on the record's state.

use crate::record::State;
use crate::registry::{RefreshListener, Registry};
use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, SetTitle},
};
use std::io::{self, Write};

pub const HEADERS: [&str; 5] = [
    "ID code",
    "Input time",
    "Output time",
    "Remaining",
    "State",
];
const CODE_COL: usize = 0;
const STATE_COL: usize = 4;
const SEPARATOR: &str = "  ";

/// State to background color mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub waiting: Color,
    pub active: Color,
    pub expired: Color,
    pub free: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            waiting: rgb(0xAD, 0xD8, 0xE6),
            active: rgb(0xFF, 0xFF, 0xE0),
            expired: rgb(0xD3, 0xD3, 0xD3),
            free: rgb(0x90, 0xEE, 0x90),
        }
    }
}

impl Palette {
    pub fn color_for(&self, state: State) -> Color {
        match state {
            State::Waiting => self.waiting,
            State::Active => self.active,
            State::Expired => self.expired,
            State::Free => self.free,
        }
    }
}

pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

/// Parse a `#RRGGBB` color
pub fn parse_hex_color(s: &str) -> Result<Color> {
    let Some(hex) = s.strip_prefix('#') else {
        bail!("Color '{}' must start with '#'", s);
    };
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Color '{}' must be #RRGGBB", s);
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    Ok(rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Formatting options shared by the plain and live renderers
#[derive(Debug, Clone)]
pub struct TableStyle {
    pub timestamp_format: String,
    pub title_format: String,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            timestamp_format: "%d/%m/%Y %H:%M".to_string(),
            title_format: "%H:%M:%S".to_string(),
        }
    }
}

impl TableStyle {
    pub fn title(&self, now: NaiveDateTime) -> String {
        format!("countboard - {}", now.format(&self.title_format))
    }
}

/// One rendered table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub cells: [String; 5],
    pub state: State,
}

pub fn table_rows(registry: &Registry, timestamp_format: &str) -> Vec<TableRow> {
    let fmt_time = |t: Option<NaiveDateTime>| {
        t.map(|t| t.format(timestamp_format).to_string())
            .unwrap_or_default()
    };
    registry
        .iter()
        .map(|(_, record)| TableRow {
            cells: [
                record.code.clone(),
                fmt_time(record.input_time),
                fmt_time(record.output_time),
                record.remaining().to_string(),
                record.state().to_string(),
            ],
            state: record.state(),
        })
        .collect()
}

/// Size every column to its widest cell. With a terminal width, the code
/// column grows to fill whatever is left.
pub fn column_widths(rows: &[TableRow], total_width: Option<usize>) -> [usize; 5] {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(&row.cells) {
            *w = (*w).max(cell.chars().count());
        }
    }

    if let Some(total) = total_width {
        let gaps = SEPARATOR.len() * (HEADERS.len() - 1);
        let used: usize = widths.iter().sum::<usize>() + gaps;
        if total > used {
            widths[CODE_COL] += total - used;
        }
    }
    widths
}

fn pad(cell: &str, width: usize) -> String {
    format!("{:<width$}", cell, width = width)
}

fn join_line(cells: &[String], widths: &[usize; 5]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(c, w)| pad(c, *w))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

fn header_cells() -> Vec<String> {
    HEADERS.iter().map(|h| h.to_string()).collect()
}

fn rule_cells(widths: &[usize; 5]) -> Vec<String> {
    widths.iter().map(|w| "-".repeat(*w)).collect()
}

/// Title and table as plain text, one row per line
pub fn render_plain(
    registry: &Registry,
    now: NaiveDateTime,
    style: &TableStyle,
) -> String {
    let rows = table_rows(registry, &style.timestamp_format);
    let widths = column_widths(&rows, None);

    let mut out = String::new();
    out.push_str(&style.title(now));
    out.push('\n');
    out.push_str(join_line(&header_cells(), &widths).trim_end());
    out.push('\n');
    out.push_str(join_line(&rule_cells(&widths), &widths).trim_end());
    out.push('\n');
    for row in &rows {
        out.push_str(join_line(&row.cells, &widths).trim_end());
        out.push('\n');
    }
    out
}

/// Live full-screen renderer, redrawn on every tick
pub struct Screen<W: Write> {
    out: W,
    style: TableStyle,
    palette: Option<Palette>,
    error: Option<io::Error>,
}

impl<W: Write> Screen<W> {
    /// `palette: None` draws without colors
    pub fn new(out: W, style: TableStyle, palette: Option<Palette>) -> Self {
        Self {
            out,
            style,
            palette,
            error: None,
        }
    }

    /// The first error hit while drawing, if any
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub fn draw(&mut self, registry: &Registry, now: NaiveDateTime) -> io::Result<()> {
        let rows = table_rows(registry, &self.style.timestamp_format);
        let width = terminal::size().ok().map(|(cols, _)| cols as usize);
        let widths = column_widths(&rows, width);
        let title = self.style.title(now);

        queue!(
            self.out,
            SetTitle(&title),
            Clear(ClearType::All),
            MoveTo(0, 0),
            Print(&title),
            MoveTo(0, 2),
            Print(join_line(&header_cells(), &widths)),
            MoveTo(0, 3),
            Print(join_line(&rule_cells(&widths), &widths))
        )?;

        for (i, row) in rows.iter().enumerate() {
            let y = u16::try_from(i + 4).unwrap_or(u16::MAX);
            let lead = join_line(&row.cells[..STATE_COL], &widths);
            queue!(self.out, MoveTo(0, y), Print(lead), Print(SEPARATOR))?;

            let state_cell = pad(&row.cells[STATE_COL], widths[STATE_COL]);
            match self.palette {
                Some(palette) => queue!(
                    self.out,
                    SetBackgroundColor(palette.color_for(row.state)),
                    SetForegroundColor(Color::Black),
                    Print(state_cell),
                    ResetColor
                )?,
                None => queue!(self.out, Print(state_cell))?,
            }
        }

        let footer = u16::try_from(rows.len() + 5).unwrap_or(u16::MAX);
        queue!(self.out, MoveTo(0, footer), Print("q/Esc to leave"))?;
        self.out.flush()
    }
}

impl<W: Write> RefreshListener for Screen<W> {
    fn on_refresh(&mut self, registry: &Registry, now: NaiveDateTime) {
        if let Err(e) = self.draw(registry, now) {
            self.error.get_or_insert(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::seed::demo_records;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn demo_registry() -> Registry {
        let mut reg = Registry::new();
        for r in demo_records(noon()) {
            reg.add(r);
        }
        reg.refresh_all(noon());
        reg
    }

    #[test]
    fn test_palette_maps_each_state() {
        let p = Palette::default();
        assert_eq!(p.color_for(State::Waiting), p.waiting);
        assert_eq!(p.color_for(State::Active), p.active);
        assert_eq!(p.color_for(State::Expired), p.expired);
        assert_eq!(p.color_for(State::Free), p.free);
        assert_ne!(p.waiting, p.free);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#90EE90").unwrap(), rgb(0x90, 0xEE, 0x90));
        assert!(parse_hex_color("90EE90").is_err());
        assert!(parse_hex_color("#90EE9").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
    }

    #[test]
    fn test_table_rows_use_derived_fields() {
        let reg = demo_registry();
        let rows = table_rows(&reg, "%d/%m/%Y %H:%M");
        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[0].cells,
            [
                "fix0001".to_string(),
                "01/01/2024 11:00".to_string(),
                "01/01/2024 11:10".to_string(),
                "0".to_string(),
                "EXPIRED".to_string(),
            ]
        );
        assert_eq!(rows[1].cells[3], "00:10:00");
        assert_eq!(rows[2].cells[1], "");
        assert_eq!(rows[2].state, State::Free);
        assert_eq!(rows[3].cells[3], "00:10");
    }

    #[test]
    fn test_column_widths_fill_code_column() {
        let reg = demo_registry();
        let rows = table_rows(&reg, "%d/%m/%Y %H:%M");
        let natural = column_widths(&rows, None);
        assert_eq!(natural, [7, 16, 16, 9, 7]);

        let filled = column_widths(&rows, Some(80));
        let total: usize = filled.iter().sum::<usize>() + SEPARATOR.len() * 4;
        assert_eq!(total, 80);
        assert_eq!(filled[1..], natural[1..]);

        // A narrow terminal never shrinks columns
        assert_eq!(column_widths(&rows, Some(10)), natural);
    }

    #[test]
    fn test_render_plain() {
        let reg = demo_registry();
        let out = render_plain(&reg, noon(), &TableStyle::default());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "countboard - 12:00:00");
        assert_eq!(
            lines[1],
            format!(
                "ID code  {}  {}  Remaining  State",
                pad("Input time", 16),
                pad("Output time", 16)
            )
        );
        assert_eq!(
            lines[3],
            format!(
                "fix0001  01/01/2024 11:00  01/01/2024 11:10  {}  EXPIRED",
                pad("0", 9)
            )
        );
        assert_eq!(lines[5], format!("fix0003{}FREE", " ".repeat(49)));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_render_plain_empty_registry() {
        let reg = Registry::new();
        let out = render_plain(&reg, noon(), &TableStyle::default());
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_screen_draws_on_refresh() {
        let mut reg = Registry::new();
        let output = noon() + chrono::TimeDelta::minutes(1);
        reg.add(Record::with_window("live", Some(noon()), Some(output)));
        let mut screen = Screen::new(Vec::new(), TableStyle::default(), None);
        reg.on_tick(noon(), &mut screen);
        assert!(screen.take_error().is_none());

        let text = String::from_utf8_lossy(&screen.out).to_string();
        assert!(text.contains("countboard - 12:00:00"));
        assert!(text.contains("live"));
        assert!(text.contains("00:01:00"));
        assert!(text.contains("ACTIVE"));
    }
}
