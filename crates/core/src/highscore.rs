//! High score records.
//!
//! A [`HighScore`] is stored and transmitted as a single flat `<highScore>`
//! element. Every attribute has a default, so older or partial records still
//! load.

use crate::element::{DecodeError, Element, ElementCodec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Most records kept in a [`HighScoreTable`].
pub const MAX_HIGH_SCORES: usize = 10;

/// Title awarded for a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Level {
    Continent,
    Country,
    City,
    MountainRange,
    River,
    BirdOfPrey,
    Tree,
    Flower,
    Rodent,
    FoulSmellingPlant,
    PoisonousPlant,
    SlimeMold,
    BloodSuckingInsect,
    InfectiousDisease,
    ParasiticWorm,
}

impl Level {
    /// Levels from best to worst.
    pub const ALL: [Level; 15] = [
        Level::Continent,
        Level::Country,
        Level::City,
        Level::MountainRange,
        Level::River,
        Level::BirdOfPrey,
        Level::Tree,
        Level::Flower,
        Level::Rodent,
        Level::FoulSmellingPlant,
        Level::PoisonousPlant,
        Level::SlimeMold,
        Level::BloodSuckingInsect,
        Level::InfectiousDisease,
        Level::ParasiticWorm,
    ];

    /// Lowest score that earns this level.
    pub const fn minimum_score(self) -> i64 {
        match self {
            Level::Continent => 15000,
            Level::Country => 12000,
            Level::City => 10000,
            Level::MountainRange => 8000,
            Level::River => 7000,
            Level::BirdOfPrey => 6000,
            Level::Tree => 5000,
            Level::Flower => 4000,
            Level::Rodent => 3200,
            Level::FoulSmellingPlant => 2400,
            Level::PoisonousPlant => 1600,
            Level::SlimeMold => 800,
            Level::BloodSuckingInsect => 400,
            Level::InfectiousDisease => 200,
            Level::ParasiticWorm => 0,
        }
    }

    /// Best level whose threshold `score` reaches. Negative scores get the
    /// worst level.
    pub fn for_score(score: i64) -> Level {
        Level::ALL
            .into_iter()
            .find(|level| score >= level.minimum_score())
            .unwrap_or(Level::ParasiticWorm)
    }

    /// Persisted name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Continent => "CONTINENT",
            Level::Country => "COUNTRY",
            Level::City => "CITY",
            Level::MountainRange => "MOUNTAIN_RANGE",
            Level::River => "RIVER",
            Level::BirdOfPrey => "BIRD_OF_PREY",
            Level::Tree => "TREE",
            Level::Flower => "FLOWER",
            Level::Rodent => "RODENT",
            Level::FoulSmellingPlant => "FOUL_SMELLING_PLANT",
            Level::PoisonousPlant => "POISONOUS_PLANT",
            Level::SlimeMold => "SLIME_MOLD",
            Level::BloodSuckingInsect => "BLOOD_SUCKING_INSECT",
            Level::InfectiousDisease => "INFECTIOUS_DISEASE",
            Level::ParasiticWorm => "PARASITIC_WORM",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("unknown level {s}"))
    }
}

/// Summary of one finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScore {
    /// Turn independence was won, 0 if never.
    pub independence_turn: u32,
    /// Player name.
    pub player_name: String,
    /// Nation identifier.
    pub nation_id: String,
    /// Nation type identifier.
    pub nation_type_id: String,
    /// Final score.
    pub score: i64,
    /// Title derived from the score when the record was made.
    pub level: Level,
    /// Display name of the nation.
    pub nation_name: String,
    /// Rule set the game was played with.
    pub rule_set: String,
    /// Difficulty level identifier.
    pub difficulty: String,
    /// Units at the end of the game.
    pub units: u32,
    /// Colonies at the end of the game.
    pub colonies: u32,
}

impl Default for HighScore {
    fn default() -> Self {
        Self {
            independence_turn: 0,
            player_name: String::new(),
            nation_id: "model.nation.dutch".to_string(),
            nation_type_id: "model.nationType.trade".to_string(),
            score: 0,
            level: Level::ParasiticWorm,
            nation_name: "Surinam".to_string(),
            rule_set: "freecol".to_string(),
            difficulty: "model.difficulty.medium".to_string(),
            units: 0,
            colonies: 0,
        }
    }
}

impl HighScore {
    /// Record for `player_name` with the level taken from `score`.
    pub fn new(player_name: impl Into<String>, score: i64) -> Self {
        Self {
            player_name: player_name.into(),
            score,
            level: Level::for_score(score),
            ..Self::default()
        }
    }
}

impl ElementCodec for HighScore {
    const TAG: &'static str = "highScore";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("independenceTurn", self.independence_turn)
            .with_attr("playerName", &self.player_name)
            .with_attr("nationID", &self.nation_id)
            .with_attr("nationTypeID", &self.nation_type_id)
            .with_attr("score", self.score)
            .with_attr("level", self.level)
            .with_attr("nationName", &self.nation_name)
            .with_attr("ruleSet", &self.rule_set)
            .with_attr("difficulty", &self.difficulty)
            .with_attr("units", self.units)
            .with_attr("colonies", self.colonies)
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        let defaults = HighScore::default();
        Ok(Self {
            independence_turn: element
                .parse_attr_or("independenceTurn", defaults.independence_turn)?,
            player_name: element
                .attr_or("playerName", &defaults.player_name)
                .to_string(),
            nation_id: element.attr_or("nationID", &defaults.nation_id).to_string(),
            nation_type_id: element
                .attr_or("nationTypeID", &defaults.nation_type_id)
                .to_string(),
            score: element.parse_attr_or("score", defaults.score)?,
            level: element.parse_attr_or("level", defaults.level)?,
            nation_name: element
                .attr_or("nationName", &defaults.nation_name)
                .to_string(),
            rule_set: element.attr_or("ruleSet", &defaults.rule_set).to_string(),
            difficulty: element
                .attr_or("difficulty", &defaults.difficulty)
                .to_string(),
            units: element.parse_attr_or("units", defaults.units)?,
            colonies: element.parse_attr_or("colonies", defaults.colonies)?,
        })
    }
}

/// Best scores, highest first, capped at [`MAX_HIGH_SCORES`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreTable {
    scores: Vec<HighScore>,
}

impl HighScoreTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; returns its rank, or `None` when it did not make the
    /// table. Ties keep the earlier record ahead.
    pub fn insert(&mut self, score: HighScore) -> Option<usize> {
        let rank = self
            .scores
            .iter()
            .position(|held| held.score < score.score)
            .unwrap_or(self.scores.len());
        if rank >= MAX_HIGH_SCORES {
            return None;
        }
        self.scores.insert(rank, score);
        self.scores.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    /// Records in rank order.
    pub fn scores(&self) -> &[HighScore] {
        &self.scores
    }
}
