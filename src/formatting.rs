//! Column-aligned tables for terminal output.

use crossterm::style::{Color, Stylize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

pub struct Table {
    headers: Vec<String>,
    align: Vec<Align>,
    rows: Vec<(Vec<String>, Option<Color>)>,
}

impl Table {
    /// Columns are centered unless listed in `left`.
    pub fn new(headers: &[&str], left: &[&str]) -> Self {
        Table {
            align: headers
                .iter()
                .map(|h| if left.contains(h) { Align::Left } else { Align::Center })
                .collect(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) -> &mut Self {
        self.rows.push((cells, None));
        self
    }

    pub fn colored_row(&mut self, cells: Vec<String>, color: Option<Color>) -> &mut Self {
        self.rows.push((cells, color));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for (cells, _) in &self.rows {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }

    fn line(&self, cells: &[String], widths: &[usize]) -> String {
        let padded: Vec<String> = widths
            .iter()
            .zip(&self.align)
            .enumerate()
            .map(|(i, (width, align))| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                match align {
                    Align::Left => format!("{cell:<width$}"),
                    Align::Center => format!("{cell:^width$}"),
                }
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    }

    /// Render the table; `styled` adds a bold header and row colors.
    pub fn render(&self, styled: bool) -> String {
        let widths = self.widths();
        let header = self.line(&self.headers, &widths);
        let mut lines = vec![if styled {
            header.bold().to_string()
        } else {
            header
        }];
        for (cells, color) in &self.rows {
            let line = self.line(cells, &widths);
            lines.push(match (styled, color) {
                (true, Some(color)) => line.with(*color).to_string(),
                _ => line,
            });
        }
        lines.join("\n")
    }
}
