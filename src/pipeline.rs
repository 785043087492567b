use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::FeedConfig;
use crate::error::{PredictError, Result};
use crate::features::{ExpandedRow, MatchFeatures, build_match_features, expand_all};
use crate::feed::WindowSource;
use crate::model::WinModel;
use crate::team::Side;
use crate::timeline::fetch_timeline;

#[derive(Debug, Clone, Serialize)]
pub struct GamePrediction {
    pub game_id: String,
    /// `[blue@10, red@10, blue@15, red@15, blue@20, red@20, blue@25, red@25]`
    pub probabilities: Vec<f64>,
    #[serde(skip)]
    pub rows: Vec<ExpandedRow>,
    pub last_minute: Option<i64>,
    pub frames_seen: usize,
}

/// Pairs blue and red scores per checkpoint. `rows` and `scores` must be the
/// output of [`expand_all`] over `[blue, red]` and its model scores.
pub fn interleave(rows: &[ExpandedRow], scores: &[f64]) -> Result<Vec<f64>> {
    if rows.len() != scores.len() {
        return Err(PredictError::Model(format!(
            "model returned {} scores for {} rows",
            scores.len(),
            rows.len()
        )));
    }

    let mut blue: Vec<(_, f64)> = Vec::new();
    let mut red: Vec<(_, f64)> = Vec::new();
    for (row, score) in rows.iter().zip(scores) {
        match row.row.side {
            Side::Blue => blue.push((row.minutes, *score)),
            Side::Red => red.push((row.minutes, *score)),
        }
    }

    blue.sort_by_key(|(minutes, _)| *minutes);
    red.sort_by_key(|(minutes, _)| *minutes);

    Ok(blue
        .into_iter()
        .zip(red)
        .flat_map(|((_, b), (_, r))| [b, r])
        .collect())
}

pub fn score_features(
    game_id: &str,
    features: MatchFeatures,
    model: &dyn WinModel,
) -> Result<GamePrediction> {
    let rows = expand_all(&features.rows);
    let scores = model.predict(&rows)?;
    let probabilities = interleave(&rows, &scores)?;

    info!(
        game_id,
        frames = features.frames_seen,
        last_minute = ?features.last_minute,
        "scored game"
    );

    Ok(GamePrediction {
        game_id: game_id.to_string(),
        probabilities,
        rows,
        last_minute: features.last_minute,
        frames_seen: features.frames_seen,
    })
}

/// Fetch, accumulate, assemble, expand and score one game.
pub fn predict_game(
    source: &dyn WindowSource,
    config: &FeedConfig,
    model: &dyn WinModel,
    game_id: &str,
    start: DateTime<Utc>,
) -> Result<GamePrediction> {
    let frames = fetch_timeline(source, config, game_id, start);
    let features = build_match_features(&frames, start);
    score_features(game_id, features, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::assemble;
    use crate::team::MatchAccumulator;

    struct MinutesModel;

    impl WinModel for MinutesModel {
        fn predict(&self, rows: &[ExpandedRow]) -> Result<Vec<f64>> {
            Ok(rows
                .iter()
                .map(|r| r.minutes.minute() as f64 + r.row.side.as_feature() / 2.0)
                .collect())
        }
    }

    #[test]
    fn interleaves_blue_and_red_by_checkpoint() {
        let features = MatchFeatures {
            rows: assemble(&MatchAccumulator::default()),
            last_minute: None,
            frames_seen: 0,
        };

        let prediction = score_features("g1", features, &MinutesModel).unwrap();

        assert_eq!(
            prediction.probabilities,
            vec![10.5, 10.0, 15.5, 15.0, 20.5, 20.0, 25.5, 25.0]
        );
        assert_eq!(prediction.rows.len(), 8);
    }

    #[test]
    fn score_count_mismatch_is_an_error() {
        let rows = expand_all(&assemble(&MatchAccumulator::default()));
        let err = interleave(&rows, &[0.5; 7]).unwrap_err();
        assert!(matches!(err, PredictError::Model(_)));
    }
}
