use csv::Writer;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

use crate::error::{PredictError, Result};
use crate::features::ExpandedRow;
use crate::schema::{self, MINUTES_COLUMN};

/// Expanded rows tagged with the game they come from.
pub struct GameRows<'a> {
    pub game_id: &'a str,
    pub rows: &'a [ExpandedRow],
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes `.csv` or `.parquet` depending on the extension of `out`.
pub fn write_rows(out: &Path, games: &[GameRows]) -> Result<()> {
    ensure_parent(out)?;

    match out.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => write_csv(out, games),
        Some("parquet") => write_parquet(out, games),
        other => Err(PredictError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!(
                "Unsupported output extension '{}'. Supported: csv, parquet.",
                other.unwrap_or("")
            ),
        ))),
    }
}

/// CSV with `game_id`, the schema columns and `minutes`; nulls are empty fields.
pub fn write_csv(out: &Path, games: &[GameRows]) -> Result<()> {
    let mut writer = Writer::from_path(out)?;

    let mut header = vec!["game_id"];
    header.extend(schema::feature_names());
    header.push(MINUTES_COLUMN);
    writer.write_record(&header)?;

    for game in games {
        for row in game.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(game.game_id.to_string());
            record.extend(
                row.values()
                    .iter()
                    .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
            );
            record.push(row.minutes.minute().to_string());
            writer.write_record(&record)?;
        }
    }

    writer.flush()?;
    Ok(())
}

pub fn build_dataframe(games: &[GameRows]) -> std::result::Result<DataFrame, PolarsError> {
    let columns = schema::feature_columns();
    let mut game_id: Vec<String> = Vec::new();
    let mut minutes: Vec<i32> = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); columns.len()];

    for game in games {
        for row in game.rows {
            game_id.push(game.game_id.to_string());
            minutes.push(row.minutes.minute() as i32);
            for (column, value) in values.iter_mut().zip(row.values()) {
                column.push(*value);
            }
        }
    }

    let mut series = Vec::with_capacity(columns.len() + 2);
    series.push(Series::new("game_id", game_id));
    for (spec, column) in columns.iter().zip(values) {
        series.push(Series::new(&spec.name, column));
    }
    series.push(Series::new(MINUTES_COLUMN, minutes));

    DataFrame::new(series)
}

pub fn write_parquet(out: &Path, games: &[GameRows]) -> Result<()> {
    let mut df = build_dataframe(games)?;
    let mut file = File::create(out)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}
