use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{PredictError, Result};
use crate::features::ExpandedRow;
use crate::schema;

/// Scores expanded rows. One probability (or raw margin) per row, same order.
pub trait WinModel: Send + Sync {
    fn predict(&self, rows: &[ExpandedRow]) -> Result<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    Logistic,
    LogitRaw,
}

#[derive(Debug, Clone)]
struct Tree {
    left: Vec<i32>,
    right: Vec<i32>,
    split_index: Vec<usize>,
    split_condition: Vec<f64>,
    default_left: Vec<bool>,
}

impl Tree {
    fn leaf_value(&self, features: &[Option<f64>]) -> Result<f64> {
        let mut node = 0usize;

        // Bounded by the node count so a malformed tree cannot spin.
        for _ in 0..=self.left.len() {
            let left = *self.left.get(node).ok_or_else(|| bad_node(node))?;
            if left < 0 {
                return Ok(self.split_condition[node]);
            }

            let feature = features.get(self.split_index[node]).copied().flatten();
            let go_left = match feature {
                Some(value) => value < self.split_condition[node],
                None => self.default_left[node],
            };

            let next = if go_left { left } else { self.right[node] };
            node = usize::try_from(next).map_err(|_| bad_node(node))?;
        }

        Err(PredictError::Model("tree traversal did not reach a leaf".to_string()))
    }
}

fn bad_node(node: usize) -> PredictError {
    PredictError::Model(format!("tree references missing node {}", node))
}

/// Gradient-boosted trees loaded from XGBoost's JSON model format.
#[derive(Debug, Clone)]
pub struct XgbBooster {
    trees: Vec<Tree>,
    base_margin: f64,
    objective: Objective,
    fill_missing_zero: bool,
}

// XGBoost JSON layout (only the parts we read).
#[derive(Deserialize)]
struct ModelFile {
    learner: Learner,
}

#[derive(Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveSection,
}

#[derive(Deserialize)]
struct GradientBooster {
    name: String,
    #[serde(default)]
    model: Option<GbTreeModel>,
}

#[derive(Deserialize)]
struct GbTreeModel {
    trees: Vec<RawTree>,
}

#[derive(Deserialize)]
struct RawTree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<usize>,
    split_conditions: Vec<f64>,
    default_left: Vec<Value>,
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Deserialize)]
struct ObjectiveSection {
    name: String,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl XgbBooster {
    pub fn load(path: &Path, fill_missing_zero: bool) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let booster = Self::from_json(&contents, fill_missing_zero)?;
        info!(
            path = %path.display(),
            trees = booster.trees.len(),
            "loaded booster"
        );
        Ok(booster)
    }

    pub fn from_json(contents: &str, fill_missing_zero: bool) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(contents)?;
        let learner = file.learner;

        if !learner.feature_names.is_empty() {
            let expected: Vec<&str> = schema::feature_names().collect();
            if learner.feature_names.iter().map(String::as_str).ne(expected.iter().copied()) {
                return Err(PredictError::SchemaMismatch(format!(
                    "model expects {} columns starting {:?}, pipeline emits {} starting {:?}",
                    learner.feature_names.len(),
                    learner.feature_names.first(),
                    expected.len(),
                    expected.first()
                )));
            }
        }

        let width = schema::feature_columns().len();
        if let Some(raw) = &learner.learner_model_param.num_feature {
            let num_feature: usize = raw
                .parse()
                .map_err(|_| PredictError::Model(format!("invalid num_feature '{}'", raw)))?;
            if num_feature != width {
                return Err(PredictError::SchemaMismatch(format!(
                    "model was trained on {} features, pipeline emits {}",
                    num_feature, width
                )));
            }
        }

        if learner.gradient_booster.name != "gbtree" {
            return Err(PredictError::Model(format!(
                "unsupported booster '{}', only gbtree is handled",
                learner.gradient_booster.name
            )));
        }

        let objective = match learner.objective.name.as_str() {
            "binary:logistic" | "reg:logistic" => Objective::Logistic,
            "binary:logitraw" => Objective::LogitRaw,
            other => {
                return Err(PredictError::Model(format!("unsupported objective '{}'", other)));
            }
        };

        let base_score: f64 = learner
            .learner_model_param
            .base_score
            .trim_matches(|c| c == '[' || c == ']')
            .parse()
            .map_err(|_| {
                PredictError::Model(format!(
                    "invalid base_score '{}'",
                    learner.learner_model_param.base_score
                ))
            })?;

        // Logistic models store base_score as a probability.
        let base_margin = match objective {
            Objective::Logistic => {
                let p = base_score.clamp(1e-16, 1.0 - 1e-16);
                (p / (1.0 - p)).ln()
            }
            Objective::LogitRaw => base_score,
        };

        let raw_trees = learner
            .gradient_booster
            .model
            .ok_or_else(|| PredictError::Model("gbtree model section missing".to_string()))?
            .trees;

        let mut trees = Vec::with_capacity(raw_trees.len());
        for (idx, raw) in raw_trees.into_iter().enumerate() {
            let n = raw.left_children.len();
            if [
                raw.right_children.len(),
                raw.split_indices.len(),
                raw.split_conditions.len(),
                raw.default_left.len(),
            ]
            .iter()
            .any(|len| *len != n)
            {
                return Err(PredictError::Model(format!(
                    "tree {} has inconsistent node arrays",
                    idx
                )));
            }

            // Leaves carry a dummy split index; only internal nodes must fit the schema.
            let out_of_range = raw
                .left_children
                .iter()
                .zip(&raw.split_indices)
                .find(|(left, split)| **left >= 0 && **split >= width);
            if let Some((_, split)) = out_of_range {
                return Err(PredictError::SchemaMismatch(format!(
                    "tree {} splits on feature {}, pipeline emits {}",
                    idx, split, width
                )));
            }

            trees.push(Tree {
                left: raw.left_children,
                right: raw.right_children,
                split_index: raw.split_indices,
                split_condition: raw.split_conditions,
                default_left: raw.default_left.iter().map(truthy).collect(),
            });
        }

        Ok(Self {
            trees,
            base_margin,
            objective,
            fill_missing_zero,
        })
    }

    fn score(&self, features: &[Option<f64>]) -> Result<f64> {
        let mut margin = self.base_margin;
        for tree in &self.trees {
            margin += tree.leaf_value(features)?;
        }

        Ok(match self.objective {
            Objective::Logistic => sigmoid(margin),
            Objective::LogitRaw => margin,
        })
    }
}

impl WinModel for XgbBooster {
    fn predict(&self, rows: &[ExpandedRow]) -> Result<Vec<f64>> {
        rows.iter()
            .map(|row| {
                if self.fill_missing_zero {
                    let filled: Vec<Option<f64>> =
                        row.values().iter().map(|v| Some(v.unwrap_or(0.0))).collect();
                    self.score(&filled)
                } else {
                    self.score(row.values())
                }
            })
            .collect()
    }
}
