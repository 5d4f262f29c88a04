use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::types::{Price, RunnerOdds};

/// A race's prices as a runner × bookmaker grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsTable {
    pub columns: Vec<String>,
    pub rows: Vec<OddsRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsRow {
    pub runner: String,
    pub cells: Vec<Option<Price>>,
}

/// How a cell moved since the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    /// No earlier snapshot of this runner to compare against.
    New,
    Unchanged,
    /// Price lengthened.
    Drifted,
    /// Price shortened.
    Shortened,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiff {
    pub cells: Vec<Vec<Movement>>,
    /// Rows whose runner had no earlier snapshot to compare against.
    pub new_rows: Vec<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSummary {
    pub drifted: usize,
    pub shortened: usize,
    pub new_runners: usize,
}

impl OddsTable {
    pub fn from_runners(runners: &[RunnerOdds]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for price in runners.iter().flat_map(|r| &r.prices) {
            if !columns.contains(&price.bookmaker) {
                columns.push(price.bookmaker.clone());
            }
        }

        let rows = runners
            .iter()
            .map(|r| OddsRow {
                runner: r.runner.clone(),
                cells: columns.iter().map(|c| r.price(c)).collect(),
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, runner: &str) -> Option<&OddsRow> {
        self.rows.iter().find(|r| r.runner == runner)
    }

    pub fn column_index(&self, bookmaker: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == bookmaker)
    }

    pub fn get(&self, runner: &str, bookmaker: &str) -> Option<Price> {
        let col = self.column_index(bookmaker)?;
        self.row(runner)
            .and_then(|r| r.cells.get(col).copied().flatten())
    }

    /// Compares every cell with the same runner and bookmaker in `previous`.
    pub fn diff(&self, previous: Option<&OddsTable>) -> TableDiff {
        let mut cells = Vec::with_capacity(self.rows.len());
        let mut new_rows = Vec::with_capacity(self.rows.len());

        for row in &self.rows {
            let Some((previous, prev_row)) =
                previous.and_then(|p| p.row(&row.runner).map(|r| (p, r)))
            else {
                cells.push(vec![Movement::New; row.cells.len()]);
                new_rows.push(true);
                continue;
            };

            cells.push(
                row.cells
                    .iter()
                    .zip(&self.columns)
                    .map(|(current, bookmaker)| {
                        let before = previous
                            .column_index(bookmaker)
                            .and_then(|col| prev_row.cells.get(col).copied().flatten());
                        compare(*current, before)
                    })
                    .collect(),
            );
            new_rows.push(false);
        }

        TableDiff { cells, new_rows }
    }
}

fn compare(current: Option<Price>, previous: Option<Price>) -> Movement {
    match (current, previous) {
        (Some(now), Some(before)) if now > before => Movement::Drifted,
        (Some(now), Some(before)) if now < before => Movement::Shortened,
        _ => Movement::Unchanged,
    }
}

impl TableDiff {
    pub fn movement(&self, row: usize, col: usize) -> Movement {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(Movement::Unchanged)
    }

    pub fn summary(&self) -> MovementSummary {
        let mut summary = MovementSummary {
            new_runners: self.new_rows.iter().filter(|n| **n).count(),
            ..Default::default()
        };
        for row in &self.cells {
            for movement in row {
                match movement {
                    Movement::Drifted => summary.drifted += 1,
                    Movement::Shortened => summary.shortened += 1,
                    _ => {}
                }
            }
        }
        summary
    }
}

impl MovementSummary {
    pub fn changes(&self) -> usize {
        self.drifted + self.shortened
    }
}

impl Display for MovementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} drifted, {} shortened",
            self.drifted, self.shortened
        )?;
        if self.new_runners > 0 {
            write!(f, ", {} new runner(s)", self.new_runners)?;
        }
        Ok(())
    }
}
