use std::fmt::Write;

use crossterm::style::{Color, Stylize};

use crate::bookmakers::{BOOKMAKERS, display_name};
use crate::diff::{Movement, OddsTable, TableDiff};
use crate::watch::Frame;

const RUNNER_HEADER: &str = "Runner";
const MISSING: &str = "-";

const DRIFT_FG: Color = Color::Rgb { r: 0x15, g: 0x57, b: 0x24 };
const DRIFT_BG: Color = Color::Rgb { r: 0xd4, g: 0xed, b: 0xda };
const SHORTEN_FG: Color = Color::Rgb { r: 0x72, g: 0x1c, b: 0x24 };
const SHORTEN_BG: Color = Color::Rgb { r: 0xf8, g: 0xd7, b: 0xda };

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Emit ANSI colours for moved prices.
    pub color: bool,
    /// Use bookmaker names instead of codes in the header.
    pub names: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: true,
            names: false,
        }
    }
}

fn pad(text: &str, width: usize) -> String {
    format!("{:<width$}", text, width = width)
}

fn pad_right(text: &str, width: usize) -> String {
    format!("{:>width$}", text, width = width)
}

fn paint(cell: String, movement: Movement, opts: RenderOptions) -> String {
    if !opts.color {
        return cell;
    }
    match movement {
        Movement::Drifted => cell.with(DRIFT_FG).on(DRIFT_BG).to_string(),
        Movement::Shortened => cell.with(SHORTEN_FG).on(SHORTEN_BG).to_string(),
        Movement::New | Movement::Unchanged => cell,
    }
}

pub fn render_table(table: &OddsTable, diff: &TableDiff, opts: RenderOptions) -> String {
    let headers: Vec<&str> = table
        .columns
        .iter()
        .map(|code| {
            if opts.names {
                display_name(code)
            } else {
                code.as_str()
            }
        })
        .collect();

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            row.cells
                .iter()
                .map(|c| c.map(|p| p.to_string()).unwrap_or_else(|| MISSING.to_string()))
                .collect()
        })
        .collect();

    let runner_width = table
        .rows
        .iter()
        .map(|r| r.runner.chars().count())
        .chain(std::iter::once(RUNNER_HEADER.len()))
        .max()
        .unwrap_or_default();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            cells
                .iter()
                .map(|row| row.get(col).map_or(0, |c| c.chars().count()))
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let mut out = String::new();

    let mut header_line = pad(RUNNER_HEADER, runner_width);
    for (header, width) in headers.iter().zip(&widths) {
        header_line.push_str(" │ ");
        header_line.push_str(&pad_right(header, *width));
    }
    let _ = writeln!(out, "{}", header_line.trim_end());

    let total_width = runner_width + widths.iter().map(|w| w + 3).sum::<usize>();
    let _ = writeln!(out, "{}", "─".repeat(total_width));

    for (i, (row, row_cells)) in table.rows.iter().zip(&cells).enumerate() {
        let mut line = pad(&row.runner, runner_width);
        for (j, (cell, width)) in row_cells.iter().zip(&widths).enumerate() {
            line.push_str(" │ ");
            line.push_str(&paint(pad_right(cell, *width), diff.movement(i, j), opts));
        }
        let _ = writeln!(out, "{}", line);
    }

    out
}

pub fn render_frame(frame: &Frame, opts: RenderOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Last updated: {}", frame.updated_at.format("%H:%M:%S"));
    let _ = writeln!(out, "{}", frame.title);
    let _ = writeln!(out);

    if frame.table.is_empty() {
        let _ = writeln!(out, "No runners to display.");
        return out;
    }

    out.push_str(&render_table(&frame.table, &frame.diff, opts));
    let _ = writeln!(out);
    let summary = frame.diff.summary();
    if opts.color && summary.changes() > 0 {
        let _ = writeln!(
            out,
            "{} ({} = drifted, {} = shortened)",
            summary,
            "green".with(DRIFT_FG).on(DRIFT_BG),
            "red".with(SHORTEN_FG).on(SHORTEN_BG)
        );
    } else {
        let _ = writeln!(out, "{}", summary);
    }
    out
}

pub fn render_bookmakers() -> String {
    let width = BOOKMAKERS
        .iter()
        .map(|(code, _)| code.len())
        .max()
        .unwrap_or_default();

    let mut out = String::new();
    for (code, name) in BOOKMAKERS {
        let _ = writeln!(out, "{}  {}", pad(code, width), name);
    }
    out
}
