//! The authoritative game state.

use crate::model::{GameEntity, GameObject, Player, Settlement, Tile, Unit};
use crate::movement::MoveType;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tradewind_core::{
    Ability, GameOption, Goods, HighScore, HighScoreTable, IdentityRegistry, ObjectId,
    OptionGroup, RegistryError, ResolveError, Turn,
};

/// Group id of the map generator options.
pub const MAP_GENERATOR_OPTIONS: &str = "model.option.mapGeneratorOptions";

/// Default map generator options for a fresh game.
pub fn default_map_generator_options() -> OptionGroup {
    OptionGroup::new(MAP_GENERATOR_OPTIONS)
        .with_option(GameOption::integer("model.option.landMass", 40, 10, 80))
        .with_option(GameOption::integer("model.option.temperature", 2, 0, 4))
        .with_option(GameOption::integer("model.option.humidity", 2, 0, 4))
        .with_option(GameOption::boolean("model.option.importTerrain", false))
        .with_option(GameOption::text("model.option.mapGeneratorType", "classic"))
}

/// Lookup failure scoped to a submitting player.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The identifier does not resolve to an object of the expected kind.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The object exists but belongs to someone else.
    #[error("{id} is not owned by {player}")]
    NotOwned {
        /// Object identifier.
        id: ObjectId,
        /// Submitting player.
        player: ObjectId,
    },
    /// The settlement is not next to the unit.
    #[error("{settlement} is not adjacent to {unit}")]
    NotAdjacent {
        /// Acting unit.
        unit: ObjectId,
        /// Target settlement.
        settlement: ObjectId,
    },
}

/// Goods left behind by a unit that no longer exists, kept until looted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashedLoot {
    /// Owner of the lost unit.
    pub owner: ObjectId,
    /// Remaining goods.
    pub goods: Vec<Goods>,
}

/// Authoritative world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    seed: u64,
    turn: Turn,
    width: u32,
    height: u32,
    objects: IdentityRegistry<GameObject>,
    map_generator_options: OptionGroup,
    high_scores: HighScoreTable,
    loot_stash: BTreeMap<ObjectId, StashedLoot>,
}

impl Game {
    /// Empty game of the given size.
    pub fn new(seed: u64, width: u32, height: u32) -> Self {
        Self {
            seed,
            turn: Turn::FIRST,
            width,
            height,
            objects: IdentityRegistry::new(),
            map_generator_options: default_map_generator_options(),
            high_scores: HighScoreTable::new(),
            loot_stash: BTreeMap::new(),
        }
    }

    /// Seed for all game-logic randomness.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current turn.
    pub fn turn(&self) -> Turn {
        self.turn
    }

    /// Move to the next turn, restoring every unit's moves.
    pub fn advance_turn(&mut self, moves_per_turn: u32) {
        self.turn = self.turn.next();
        for (_, object) in self.objects.iter_mut() {
            if let GameObject::Unit(unit) = object {
                unit.moves_left = moves_per_turn;
            }
        }
    }

    /// Map size as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether `tile` lies on the map.
    pub fn contains_tile(&self, tile: Tile) -> bool {
        u32::try_from(tile.x).is_ok_and(|x| x < self.width)
            && u32::try_from(tile.y).is_ok_and(|y| y < self.height)
    }

    /// Every registered object, in identifier order.
    pub fn objects(&self) -> &IdentityRegistry<GameObject> {
        &self.objects
    }

    /// Register a new object.
    pub fn insert(&mut self, object: impl Into<GameObject>) -> Result<(), RegistryError> {
        let object = object.into();
        self.objects.register(object.id().clone(), object)
    }

    /// Unregister an object without side effects.
    pub fn remove(&mut self, id: &ObjectId) -> Option<GameObject> {
        self.objects.unregister(id)
    }

    /// Remove a unit lost in combat, stashing its cargo for a later loot.
    pub fn destroy_unit(&mut self, id: &ObjectId) -> Option<Unit> {
        if !matches!(self.objects.get(id), Some(GameObject::Unit(_))) {
            return None;
        }
        let Some(GameObject::Unit(unit)) = self.objects.unregister(id) else {
            return None;
        };
        if !unit.cargo.is_empty() {
            self.loot_stash.insert(
                unit.id.clone(),
                StashedLoot {
                    owner: unit.owner.clone(),
                    goods: unit.cargo.clone(),
                },
            );
        }
        Some(unit)
    }

    /// Stashed goods of a lost unit.
    pub fn stashed_loot(&self, loser: &ObjectId) -> Option<&StashedLoot> {
        self.loot_stash.get(loser)
    }

    /// Mutable stash entry.
    pub fn stashed_loot_mut(&mut self, loser: &ObjectId) -> Option<&mut StashedLoot> {
        self.loot_stash.get_mut(loser)
    }

    /// Drop an emptied stash entry.
    pub fn clear_stash(&mut self, loser: &ObjectId) {
        self.loot_stash.remove(loser);
    }

    /// Resolve `id` as a `T`.
    pub fn get_object<T: GameEntity>(&self, id: &ObjectId) -> Result<&T, ResolveError> {
        let object = self.objects.resolve(id, T::KIND)?;
        T::from_object(object).ok_or_else(|| ResolveError::NotFound {
            id: id.clone(),
            expected: T::KIND,
        })
    }

    /// Mutable form of [`Game::get_object`].
    pub fn get_object_mut<T: GameEntity>(&mut self, id: &ObjectId) -> Result<&mut T, ResolveError> {
        let object = self.objects.resolve_mut(id, T::KIND)?;
        T::from_object_mut(object).ok_or_else(|| ResolveError::NotFound {
            id: id.clone(),
            expected: T::KIND,
        })
    }

    /// Resolve `id` as a `T` owned by `player`.
    pub fn get_our_object<T>(&self, player: &ObjectId, id: &ObjectId) -> Result<&T, LookupError>
    where
        T: GameEntity,
    {
        let object = self.objects.resolve(id, T::KIND)?;
        if object.owner() != player {
            return Err(LookupError::NotOwned {
                id: id.clone(),
                player: player.clone(),
            });
        }
        Ok(self.get_object(id)?)
    }

    /// Resolve a settlement next to `unit`.
    pub fn adjacent_settlement(
        &self,
        unit: &Unit,
        settlement: &ObjectId,
    ) -> Result<&Settlement, LookupError> {
        let found: &Settlement = self.get_object(settlement)?;
        if !unit.tile.is_adjacent(found.tile) {
            return Err(LookupError::NotAdjacent {
                unit: unit.id.clone(),
                settlement: settlement.clone(),
            });
        }
        Ok(found)
    }

    /// Settlement standing on `tile`, if any.
    pub fn settlement_at(&self, tile: Tile) -> Option<&Settlement> {
        self.objects.iter().find_map(|(_, object)| match object {
            GameObject::Settlement(settlement) if settlement.tile == tile => Some(settlement),
            _ => None,
        })
    }

    /// Classify moving `unit` onto `target`.
    pub fn move_type(&self, unit: &Unit, target: Tile) -> MoveType {
        if !self.contains_tile(target) || !unit.tile.is_adjacent(target) {
            return MoveType::MoveIllegal;
        }
        if unit.moves_left == 0 {
            return MoveType::MoveNoMoves;
        }
        let Some(settlement) = self.settlement_at(target) else {
            return MoveType::Move;
        };
        if settlement.owner == unit.owner {
            return MoveType::Move;
        }
        if unit.has_ability(Ability::Naval) || !unit.has_ability(Ability::SpeakWithChief) {
            return MoveType::MoveNoAccessSettlement;
        }
        if settlement.native {
            MoveType::EnterIndianSettlementWithScout
        } else {
            MoveType::EnterForeignColonyWithScout
        }
    }

    /// Administrative standing of `player`; unknown players have none.
    pub fn is_admin(&self, player: &ObjectId) -> bool {
        self.get_object::<Player>(player)
            .is_ok_and(|player| player.admin)
    }

    /// Authoritative map generator options.
    pub fn map_generator_options(&self) -> &OptionGroup {
        &self.map_generator_options
    }

    /// Replace the authoritative map generator options.
    pub fn set_map_generator_options(&mut self, options: OptionGroup) {
        self.map_generator_options = options;
    }

    /// High score table.
    pub fn high_scores(&self) -> &HighScoreTable {
        &self.high_scores
    }

    /// Record a finished game's score; returns its rank if it made the table.
    pub fn record_high_score(&mut self, score: HighScore) -> Option<usize> {
        self.high_scores.insert(score)
    }
}

/// Incremental construction of a [`Game`] with referential checks.
#[derive(Debug, Clone)]
pub struct GameBuilder {
    seed: u64,
    width: u32,
    height: u32,
    players: Vec<Player>,
    units: Vec<Unit>,
    settlements: Vec<Settlement>,
    options: Option<OptionGroup>,
    high_scores: Vec<HighScore>,
}

impl GameBuilder {
    /// Start a 40x40 game with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            width: 40,
            height: 40,
            players: Vec::new(),
            units: Vec::new(),
            settlements: Vec::new(),
            options: None,
            high_scores: Vec::new(),
        }
    }

    /// Map size.
    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Add a player.
    pub fn player(mut self, player: Player) -> Self {
        self.players.push(player);
        self
    }

    /// Add a unit.
    pub fn unit(mut self, unit: Unit) -> Self {
        self.units.push(unit);
        self
    }

    /// Add a settlement.
    pub fn settlement(mut self, settlement: Settlement) -> Self {
        self.settlements.push(settlement);
        self
    }

    /// Override the map generator options.
    pub fn map_generator_options(mut self, options: OptionGroup) -> Self {
        self.options = Some(options);
        self
    }

    /// Seed the high score table.
    pub fn high_score(mut self, score: HighScore) -> Self {
        self.high_scores.push(score);
        self
    }

    /// Validate and assemble the game.
    pub fn build(self) -> Result<Game> {
        let mut game = Game::new(self.seed, self.width, self.height);
        if let Some(options) = self.options {
            game.set_map_generator_options(options);
        }
        for score in self.high_scores {
            game.record_high_score(score);
        }

        for player in self.players {
            let id = player.id.clone();
            game.insert(player)
                .with_context(|| format!("Failed to add player {id}"))?;
        }
        for settlement in self.settlements {
            check_placement(&game, &settlement.id, &settlement.owner, settlement.tile)?;
            if game.settlement_at(settlement.tile).is_some() {
                bail!("Settlement {} shares tile {}", settlement.id, settlement.tile);
            }
            let id = settlement.id.clone();
            game.insert(settlement)
                .with_context(|| format!("Failed to add settlement {id}"))?;
        }
        for unit in self.units {
            check_placement(&game, &unit.id, &unit.owner, unit.tile)?;
            let id = unit.id.clone();
            game.insert(unit)
                .with_context(|| format!("Failed to add unit {id}"))?;
        }
        Ok(game)
    }
}

fn check_placement(game: &Game, id: &ObjectId, owner: &ObjectId, tile: Tile) -> Result<()> {
    if game.get_object::<Player>(owner).is_err() {
        bail!("{id} is owned by unknown player {owner}");
    }
    if !game.contains_tile(tile) {
        bail!("{id} is placed off the map at {tile}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradewind_core::ObjectKind;

    fn id(raw: &str) -> ObjectId {
        ObjectId::parse(raw).unwrap()
    }

    fn small_game() -> Game {
        GameBuilder::new(9)
            .dimensions(10, 10)
            .player(Player::new(id("player:1"), "Stuyvesant"))
            .player(Player::new(id("player:natives"), "Iroquois").with_native())
            .settlement(Settlement::new(
                id("settlement:1"),
                "Onondaga",
                id("player:natives"),
                Tile::new(5, 5),
                true,
            ))
            .unit(
                Unit::new(id("unit:4"), id("player:1"), "model.unit.seasonedScout", Tile::new(4, 4))
                    .with_ability(Ability::SpeakWithChief),
            )
            .unit(Unit::new(
                id("unit:5"),
                id("player:1"),
                "model.unit.freeColonist",
                Tile::new(4, 5),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn get_our_object_checks_owner_and_kind() {
        let game = small_game();
        assert!(game
            .get_our_object::<Unit>(&id("player:1"), &id("unit:4"))
            .is_ok());
        assert_eq!(
            game.get_our_object::<Settlement>(&id("player:1"), &id("settlement:1")),
            Err(LookupError::NotOwned {
                id: id("settlement:1"),
                player: id("player:1"),
            })
        );
        assert!(matches!(
            game.get_our_object::<Unit>(&id("player:1"), &id("settlement:1")),
            Err(LookupError::Resolve(ResolveError::WrongKind {
                found: ObjectKind::Settlement,
                ..
            }))
        ));
    }

    #[test]
    fn move_types_for_settlement_entry() {
        let mut game = small_game();
        let target = Tile::new(5, 5);
        let scout: Unit = game.get_object::<Unit>(&id("unit:4")).unwrap().clone();
        let colonist: Unit = game.get_object::<Unit>(&id("unit:5")).unwrap().clone();
        assert_eq!(
            game.move_type(&scout, target),
            MoveType::EnterIndianSettlementWithScout
        );
        assert_eq!(
            game.move_type(&colonist, target),
            MoveType::MoveNoAccessSettlement
        );
        assert_eq!(game.move_type(&scout, Tile::new(7, 7)), MoveType::MoveIllegal);

        game.get_object_mut::<Unit>(&id("unit:4")).unwrap().moves_left = 0;
        let tired = game.get_object::<Unit>(&id("unit:4")).unwrap();
        assert_eq!(game.move_type(tired, target), MoveType::MoveNoMoves);
    }

    #[test]
    fn destroyed_units_leave_their_cargo_in_the_stash() {
        let mut game = small_game();
        game.get_object_mut::<Unit>(&id("unit:5"))
            .unwrap()
            .cargo
            .push(Goods::new("model.goods.furs", 50));
        assert!(game.destroy_unit(&id("unit:5")).is_some());
        assert!(!game.objects().contains(&id("unit:5")));
        let stash = game.stashed_loot(&id("unit:5")).unwrap();
        assert_eq!(stash.owner, id("player:1"));
        assert_eq!(stash.goods, vec![Goods::new("model.goods.furs", 50)]);
        assert!(game.destroy_unit(&id("settlement:1")).is_none());
    }

    #[test]
    fn builder_rejects_dangling_owner_and_duplicates() {
        let err = GameBuilder::new(1)
            .unit(Unit::new(
                id("unit:1"),
                id("player:ghost"),
                "model.unit.caravel",
                Tile::new(0, 0),
            ))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown player"));

        let err = GameBuilder::new(1)
            .player(Player::new(id("player:1"), "a"))
            .player(Player::new(id("player:1"), "b"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("player:1"));
    }

    #[test]
    fn admin_standing() {
        let mut game = small_game();
        assert!(!game.is_admin(&id("player:1")));
        assert!(!game.is_admin(&id("player:nobody")));
        game.insert(Player::new(id("player:admin"), "Host").with_admin())
            .unwrap();
        assert!(game.is_admin(&id("player:admin")));
    }
}
