//! Canonical scenario used across the workspace's tests.
//!
//! | id | owner | notes |
//! |---|---|---|
//! | `unit:1` (U1) | P1 | privateer, captures goods, 2 holds |
//! | `unit:2` (U2) | P2 | merchantman carrying 100 cotton |
//! | `unit:3` (U3) | P1 | free colonist next to S1, cannot speak to chiefs |
//! | `unit:4` (U4) | P1 | seasoned scout next to S1 |
//! | `settlement:1` (S1) | natives | Onondaga |

use tradewind_core::{Ability, Goods, HighScore, ObjectId};
use tradewind_world::{Game, GameBuilder, Player, Settlement, Tile, Unit};

/// Seed of the scenario game.
pub const SCENARIO_SEED: u64 = 1492;

/// Parse an identifier known to be valid.
pub fn id(raw: &str) -> ObjectId {
    ObjectId::parse(raw).unwrap_or_else(|err| panic!("invalid fixture id {raw:?}: {err}"))
}

/// Identifiers of the scenario objects.
#[derive(Debug, Clone)]
pub struct ScenarioIds {
    /// First human player.
    pub p1: ObjectId,
    /// Second human player.
    pub p2: ObjectId,
    /// Server administrator.
    pub admin: ObjectId,
    /// Native player owning S1.
    pub natives: ObjectId,
    /// P1's privateer.
    pub u1: ObjectId,
    /// P2's merchantman.
    pub u2: ObjectId,
    /// P1's free colonist.
    pub u3: ObjectId,
    /// P1's scout.
    pub u4: ObjectId,
    /// Native settlement.
    pub s1: ObjectId,
}

impl Default for ScenarioIds {
    fn default() -> Self {
        Self {
            p1: id("player:1"),
            p2: id("player:2"),
            admin: id("player:admin"),
            natives: id("player:natives"),
            u1: id("unit:1"),
            u2: id("unit:2"),
            u3: id("unit:3"),
            u4: id("unit:4"),
            s1: id("settlement:1"),
        }
    }
}

/// A fresh scenario game plus the identifiers in it.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Identifiers.
    pub ids: ScenarioIds,
    /// Authoritative game.
    pub game: Game,
}

/// Builder pre-populated with the scenario, for tests that add objects.
pub fn scenario_builder() -> GameBuilder {
    scenario_builder_with_seed(SCENARIO_SEED)
}

/// [`scenario_builder`] with another game seed.
pub fn scenario_builder_with_seed(seed: u64) -> GameBuilder {
    let ids = ScenarioIds::default();
    GameBuilder::new(seed)
        .dimensions(20, 20)
        .player(Player::new(ids.p1.clone(), "Stuyvesant"))
        .player(Player::new(ids.p2.clone(), "Minuit"))
        .player(Player::new(ids.admin.clone(), "Host").with_admin())
        .player(Player::new(ids.natives.clone(), "Iroquois").with_native())
        .settlement(Settlement::new(
            ids.s1.clone(),
            "Onondaga",
            ids.natives.clone(),
            Tile::new(10, 10),
            true,
        ))
        .unit(
            Unit::new(ids.u1.clone(), ids.p1.clone(), "model.unit.privateer", Tile::new(3, 3))
                .with_ability(Ability::Naval)
                .with_ability(Ability::CarryGoods)
                .with_ability(Ability::CaptureGoods)
                .with_holds(2),
        )
        .unit(
            Unit::new(ids.u2.clone(), ids.p2.clone(), "model.unit.merchantman", Tile::new(4, 3))
                .with_ability(Ability::Naval)
                .with_ability(Ability::CarryGoods)
                .with_holds(4)
                .with_cargo(Goods::new("model.goods.cotton", 100)),
        )
        .unit(Unit::new(
            ids.u3.clone(),
            ids.p1.clone(),
            "model.unit.freeColonist",
            Tile::new(9, 10),
        ))
        .unit(
            Unit::new(ids.u4.clone(), ids.p1.clone(), "model.unit.seasonedScout", Tile::new(11, 11))
                .with_ability(Ability::SpeakWithChief),
        )
        .high_score(HighScore::new("Stuyvesant", 8123))
        .high_score(HighScore::new("Minuit", 450))
}

/// The canonical scenario.
pub fn scenario() -> Scenario {
    seeded_scenario(SCENARIO_SEED)
}

/// The canonical scenario with another game seed.
pub fn seeded_scenario(seed: u64) -> Scenario {
    let game = scenario_builder_with_seed(seed)
        .build()
        .unwrap_or_else(|err| panic!("scenario fixture is inconsistent: {err:#}"));
    Scenario {
        ids: ScenarioIds::default(),
        game,
    }
}
