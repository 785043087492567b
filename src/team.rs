use serde::{Deserialize, Serialize};

use crate::feed::TeamFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Blue,
    Red,
}

impl Side {
    pub fn as_feature(&self) -> f64 {
        match self {
            Side::Blue => 1.0,
            Side::Red => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Checkpoint {
    At10,
    At15,
    At20,
    At25,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 4] = [
        Checkpoint::At10,
        Checkpoint::At15,
        Checkpoint::At20,
        Checkpoint::At25,
    ];

    pub fn minute(&self) -> i64 {
        match self {
            Checkpoint::At10 => 10,
            Checkpoint::At15 => 15,
            Checkpoint::At20 => 20,
            Checkpoint::At25 => 25,
        }
    }

    pub fn from_minute(minute: i64) -> Option<Checkpoint> {
        Checkpoint::ALL.into_iter().find(|c| c.minute() == minute)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Gold,
    CreepScore,
    Kills,
    Assists,
    Deaths,
}

impl Stat {
    pub const ALL: [Stat; 5] = [
        Stat::Gold,
        Stat::CreepScore,
        Stat::Kills,
        Stat::Assists,
        Stat::Deaths,
    ];

    pub fn stem(&self) -> &'static str {
        match self {
            Stat::Gold => "gold",
            Stat::CreepScore => "cs",
            Stat::Kills => "kills",
            Stat::Assists => "assists",
            Stat::Deaths => "deaths",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    fn read(&self, team: &TeamFrame) -> u32 {
        match self {
            Stat::Gold => team.total_gold,
            Stat::CreepScore => team.creep_score(),
            Stat::Kills => team.total_kills,
            Stat::Assists => team.assists(),
            Stat::Deaths => team.deaths(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Objective {
    FirstBlood,
    FirstDragon,
    FirstBaron,
    FirstTower,
    FirstToThreeTowers,
}

impl Objective {
    pub const ALL: [Objective; 5] = [
        Objective::FirstBlood,
        Objective::FirstDragon,
        Objective::FirstBaron,
        Objective::FirstTower,
        Objective::FirstToThreeTowers,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Objective::FirstBlood => "firstblood",
            Objective::FirstDragon => "firstdragon",
            Objective::FirstBaron => "firstbaron",
            Objective::FirstTower => "firsttower",
            Objective::FirstToThreeTowers => "firsttothreetowers",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    fn reached(&self, team: &TeamFrame) -> bool {
        match self {
            Objective::FirstBlood => team.total_kills > 0,
            Objective::FirstDragon => team.dragons.0 > 0,
            Objective::FirstBaron => team.barons.0 > 0,
            Objective::FirstTower => team.towers.0 > 0,
            Objective::FirstToThreeTowers => team.towers.0 >= 3,
        }
    }
}

/// Running state of one side over a match.
///
/// `None` means "not observed yet". A slot or flag is written at most once;
/// later frames never touch it again.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamAccumulator {
    side: Side,
    flags: [Option<bool>; 5],
    slots: [[Option<u32>; 4]; 5],
    last_minute: Option<i64>,
}

impl TeamAccumulator {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            flags: [None; 5],
            slots: [[None; 4]; 5],
            last_minute: None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn flag(&self, objective: Objective) -> Option<bool> {
        self.flags[objective.index()]
    }

    pub fn slot(&self, stat: Stat, checkpoint: Checkpoint) -> Option<u32> {
        self.slots[stat.index()][checkpoint.index()]
    }

    pub fn last_minute(&self) -> Option<i64> {
        self.last_minute
    }

    /// Feeds one frame. Frames must arrive in non-decreasing minute order.
    ///
    /// A missing own block leaves the state untouched. A missing opponent
    /// block only skips the first-objective comparison.
    pub fn observe(&mut self, own: Option<&TeamFrame>, opponent: Option<&TeamFrame>, minute: i64) {
        let Some(own) = own else {
            return;
        };

        self.last_minute = Some(self.last_minute.map_or(minute, |last| last.max(minute)));

        if let Some(opponent) = opponent {
            for objective in Objective::ALL {
                let flag = &mut self.flags[objective.index()];
                if flag.is_some() {
                    continue;
                }

                match (objective.reached(own), objective.reached(opponent)) {
                    (true, false) => *flag = Some(true),
                    (false, true) => *flag = Some(false),
                    // Both at once (or neither) says nothing about who was first.
                    _ => {}
                }
            }
        }

        let Some(checkpoint) = Checkpoint::from_minute(minute) else {
            return;
        };

        for stat in Stat::ALL {
            let slot = &mut self.slots[stat.index()][checkpoint.index()];
            if slot.is_none() {
                *slot = Some(stat.read(own));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchAccumulator {
    pub blue: TeamAccumulator,
    pub red: TeamAccumulator,
}

impl Default for MatchAccumulator {
    fn default() -> Self {
        Self {
            blue: TeamAccumulator::new(Side::Blue),
            red: TeamAccumulator::new(Side::Red),
        }
    }
}

impl MatchAccumulator {
    pub fn observe_frame(&mut self, frame: &crate::feed::Frame, minute: i64) {
        let blue = frame.blue_team.as_ref();
        let red = frame.red_team.as_ref();
        self.blue.observe(blue, red, minute);
        self.red.observe(red, blue, minute);
    }

    pub fn last_minute(&self) -> Option<i64> {
        match (self.blue.last_minute(), self.red.last_minute()) {
            (Some(b), Some(r)) => Some(b.max(r)),
            (b, r) => b.or(r),
        }
    }
}
