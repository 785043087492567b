//! Training-set preparation from Oracle's Elixir match data.
//!
//! The export carries one row per player plus two `position == "team"` rows
//! per game that already hold every `*at{m}` column the booster uses. We keep
//! the team rows, project them onto the live feature schema and expand each
//! into the four horizons with the same masking the live expander applies.

use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::schema::{self, MINUTES_COLUMN, SIDE_COLUMN};
use crate::team::Checkpoint;

pub const LABEL_COLUMN: &str = "result";

/// Team rows with schema columns and the label, all as Float64.
pub fn team_rows(raw: LazyFrame) -> LazyFrame {
    let mut select: Vec<Expr> = Vec::new();

    for column in schema::feature_columns() {
        let expr = if column.name == SIDE_COLUMN {
            when(col(SIDE_COLUMN).eq(lit("Blue")))
                .then(lit(1.0))
                .otherwise(lit(0.0))
        } else {
            col(&column.name).cast(DataType::Float64)
        };
        select.push(expr.alias(&column.name));
    }
    select.push(col(LABEL_COLUMN).cast(DataType::Float64).alias(LABEL_COLUMN));

    raw.filter(col("position").eq(lit("team"))).select(select)
}

/// One copy of `rows` per checkpoint with later checkpoints nulled and a
/// `minutes` column added.
pub fn expand_horizons(rows: LazyFrame) -> PolarsResult<LazyFrame> {
    let mut horizons: Vec<LazyFrame> = Vec::new();

    for minutes in Checkpoint::ALL {
        let mut masked: Vec<Expr> = schema::feature_columns()
            .iter()
            .filter(|column| column.checkpoint().is_some_and(|c| c > minutes))
            .map(|column| lit(Null {}).cast(DataType::Float64).alias(&column.name))
            .collect();
        masked.push(lit(minutes.minute() as i32).alias(MINUTES_COLUMN));

        horizons.push(rows.clone().with_columns(masked));
    }

    concat(horizons, UnionArgs::default())
}

pub fn prepare_training_set(csv_path: &Path, out_parquet: &Path) -> Result<usize> {
    if let Some(parent) = out_parquet.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let raw = LazyCsvReader::new(csv_path)
        .has_header(true)
        .with_infer_schema_length(Some(10_000))
        .finish()?;

    let mut df = expand_horizons(team_rows(raw))?.collect()?;

    let mut file = File::create(out_parquet)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;

    info!(
        rows = df.height(),
        out = %out_parquet.display(),
        "training set written"
    );
    Ok(df.height())
}
