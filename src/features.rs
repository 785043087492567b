use chrono::{DateTime, Utc};

use crate::feed::Frame;
use crate::schema::{self, Source};
use crate::team::{Checkpoint, MatchAccumulator, Side, TeamAccumulator};
use crate::timeline::elapsed_minutes;

/// One side's view of a match, aligned with [`schema::feature_columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub side: Side,
    values: Vec<Option<f64>>,
}

impl FeatureRow {
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        schema::column_index(column).and_then(|idx| self.values[idx])
    }
}

/// A feature row as it was knowable at `minutes`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedRow {
    pub minutes: Checkpoint,
    pub row: FeatureRow,
}

impl ExpandedRow {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.row.get(column)
    }

    pub fn values(&self) -> &[Option<f64>] {
        self.row.values()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchFeatures {
    /// Blue, then red.
    pub rows: [FeatureRow; 2],
    pub last_minute: Option<i64>,
    pub frames_seen: usize,
}

fn diff(own: Option<u32>, opponent: Option<u32>) -> Option<f64> {
    match (own, opponent) {
        (Some(a), Some(b)) => Some(a as f64 - b as f64),
        _ => None,
    }
}

fn flag_value(flag: Option<bool>) -> Option<f64> {
    flag.map(|won| if won { 1.0 } else { 0.0 })
}

/// Builds the row of `own` against `opponent`. Unset slots stay `None`, and
/// so does any diff that involves one.
pub fn assemble_row(own: &TeamAccumulator, opponent: &TeamAccumulator) -> FeatureRow {
    let values = schema::feature_columns()
        .iter()
        .map(|column| match column.source {
            Source::Side => Some(own.side().as_feature()),
            Source::Flag(objective) => flag_value(own.flag(objective)),
            Source::Own(stat, c) => own.slot(stat, c).map(f64::from),
            Source::Opponent(stat, c) => opponent.slot(stat, c).map(f64::from),
            Source::Diff(stat, c) => diff(own.slot(stat, c), opponent.slot(stat, c)),
        })
        .collect();

    FeatureRow {
        side: own.side(),
        values,
    }
}

pub fn assemble(acc: &MatchAccumulator) -> [FeatureRow; 2] {
    [
        assemble_row(&acc.blue, &acc.red),
        assemble_row(&acc.red, &acc.blue),
    ]
}

pub fn build_match_features(frames: &[Frame], start: DateTime<Utc>) -> MatchFeatures {
    let mut acc = MatchAccumulator::default();
    for frame in frames {
        acc.observe_frame(frame, elapsed_minutes(start, frame.timestamp));
    }

    MatchFeatures {
        rows: assemble(&acc),
        last_minute: acc.last_minute(),
        frames_seen: frames.len(),
    }
}

/// Masks every column whose checkpoint comes after `minutes`.
pub fn truncate_row(row: &FeatureRow, minutes: Checkpoint) -> ExpandedRow {
    let values = schema::feature_columns()
        .iter()
        .zip(&row.values)
        .map(|(column, value)| match column.checkpoint() {
            Some(c) if c > minutes => None,
            _ => *value,
        })
        .collect();

    ExpandedRow {
        minutes,
        row: FeatureRow {
            side: row.side,
            values,
        },
    }
}

/// Four rows for minutes 10, 15, 20 and 25, in that order. The last one
/// carries the row unchanged.
pub fn expand(row: &FeatureRow) -> [ExpandedRow; 4] {
    Checkpoint::ALL.map(|c| truncate_row(row, c))
}

pub fn expand_all(rows: &[FeatureRow]) -> Vec<ExpandedRow> {
    rows.iter().flat_map(expand).collect()
}
