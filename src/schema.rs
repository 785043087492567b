//! The ordered feature columns the booster was trained on.
//!
//! Assembler, expander, exporters and the model adapter all index rows
//! through this list, so there is exactly one place that decides the order.

use std::sync::OnceLock;

use crate::team::{Checkpoint, Objective, Stat};

pub const MINUTES_COLUMN: &str = "minutes";
pub const SIDE_COLUMN: &str = "side";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Side,
    Flag(Objective),
    Own(Stat, Checkpoint),
    Opponent(Stat, Checkpoint),
    /// Own minus opponent.
    Diff(Stat, Checkpoint),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub source: Source,
}

impl ColumnSpec {
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        match self.source {
            Source::Own(_, c) | Source::Opponent(_, c) | Source::Diff(_, c) => Some(c),
            Source::Side | Source::Flag(_) => None,
        }
    }
}

fn build_columns() -> Vec<ColumnSpec> {
    let mut columns = vec![ColumnSpec {
        name: SIDE_COLUMN.to_string(),
        source: Source::Side,
    }];

    for objective in Objective::ALL {
        columns.push(ColumnSpec {
            name: objective.column().to_string(),
            source: Source::Flag(objective),
        });
    }

    for checkpoint in Checkpoint::ALL {
        let m = checkpoint.minute();
        let mut push = |name: String, source: Source| columns.push(ColumnSpec { name, source });

        for stat in [Stat::Gold, Stat::CreepScore] {
            push(format!("{}at{}", stat.stem(), m), Source::Own(stat, checkpoint));
        }
        for stat in [Stat::Gold, Stat::CreepScore] {
            push(format!("opp_{}at{}", stat.stem(), m), Source::Opponent(stat, checkpoint));
        }
        for stat in [Stat::Gold, Stat::CreepScore] {
            push(format!("{}diffat{}", stat.stem(), m), Source::Diff(stat, checkpoint));
        }
        for stat in [Stat::Kills, Stat::Assists, Stat::Deaths] {
            push(format!("{}at{}", stat.stem(), m), Source::Own(stat, checkpoint));
        }
        for stat in [Stat::Kills, Stat::Assists, Stat::Deaths] {
            push(format!("opp_{}at{}", stat.stem(), m), Source::Opponent(stat, checkpoint));
        }
    }

    columns
}

pub fn feature_columns() -> &'static [ColumnSpec] {
    static COLUMNS: OnceLock<Vec<ColumnSpec>> = OnceLock::new();
    COLUMNS.get_or_init(build_columns)
}

pub fn feature_names() -> impl Iterator<Item = &'static str> {
    feature_columns().iter().map(|c| c.name.as_str())
}

pub fn column_index(name: &str) -> Option<usize> {
    feature_columns().iter().position(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn schema_has_fifty_four_unique_columns() {
        let names: Vec<&str> = feature_names().collect();
        assert_eq!(names.len(), 54);
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), 54);
    }

    #[test]
    fn schema_order_matches_training_layout() {
        let names: Vec<&str> = feature_names().collect();
        assert_eq!(
            &names[..18],
            &[
                "side",
                "firstblood",
                "firstdragon",
                "firstbaron",
                "firsttower",
                "firsttothreetowers",
                "goldat10",
                "csat10",
                "opp_goldat10",
                "opp_csat10",
                "golddiffat10",
                "csdiffat10",
                "killsat10",
                "assistsat10",
                "deathsat10",
                "opp_killsat10",
                "opp_assistsat10",
                "opp_deathsat10",
            ]
        );
        assert_eq!(names[18], "goldat15");
        assert_eq!(names[53], "opp_deathsat25");
    }

    #[test]
    fn checkpoint_metadata_follows_suffix() {
        for column in feature_columns() {
            match column.checkpoint() {
                Some(c) => assert!(column.name.ends_with(&c.minute().to_string())),
                None => assert!(!column.name.contains("at1") && !column.name.contains("at2")),
            }
        }
        assert_eq!(column_index("golddiffat20"), Some(6 + 2 * 12 + 4));
    }
}
