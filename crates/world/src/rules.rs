//! Game-logic operations invoked by the authority after authorization.
//!
//! Each operation receives identifiers the dispatcher has already resolved and
//! checked, mutates the [`Game`] and describes the observable effect as a
//! [`DeltaSet`]. Operations either fully apply or leave the game untouched.

use crate::game::{Game, LookupError};
use crate::model::{Player, Settlement, Unit};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use tradewind_core::goods::{self, amount_of, slots_used};
use tradewind_core::{
    scoped_rng, Ability, Audience, ChangeRecord, DeltaSet, ElementCodec, Goods, MergeError,
    ObjectId, OptionGroup, ResolveError,
};

/// Score awarded for hearing the chief's tales.
pub const TALES_SCORE: i64 = 10;

/// Domain failure raised by game logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A referenced object could not be used.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The winner may not take goods.
    #[error("{0} can not capture goods")]
    CannotCapture(ObjectId),
    /// The loot request named no goods.
    #[error("no goods to loot")]
    NothingToLoot,
    /// Neither a live loser nor a stash entry exists.
    #[error("nothing to loot from {0}")]
    NoLootSource(ObjectId),
    /// The source does not hold the requested goods.
    #[error("{source_id} does not hold {amount} {goods_type}")]
    GoodsUnavailable {
        /// Loser identifier.
        source_id: ObjectId,
        /// Requested goods type.
        goods_type: String,
        /// Requested total amount.
        amount: u32,
    },
    /// A unit tried to loot itself.
    #[error("{0} can not loot itself")]
    SelfLoot(ObjectId),
    /// The requested or resulting amount does not fit a goods quantity.
    #[error("too much {goods_type} for {unit}")]
    GoodsOverflow {
        /// Unit whose cargo would overflow.
        unit: ObjectId,
        /// Goods type.
        goods_type: String,
    },
    /// The winner has no room for the goods.
    #[error("{unit} needs {needed} cargo slots but has {holds}")]
    NoCapacity {
        /// Winner identifier.
        unit: ObjectId,
        /// Slots the cargo would occupy.
        needed: u32,
        /// Slots available.
        holds: u32,
    },
    /// The option tree could not be merged.
    #[error("Map option merge failed: {0}")]
    Merge(#[from] MergeError),
}

impl From<ResolveError> for RuleError {
    fn from(value: ResolveError) -> Self {
        RuleError::Lookup(LookupError::Resolve(value))
    }
}

/// What the chief did for the scout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeakResult {
    /// Tales of nearby lands.
    Tales,
    /// A gift of beads (gold).
    Beads,
    /// The chief had nothing to say.
    Nothing,
    /// The scout was killed.
    Die,
}

impl SpeakResult {
    /// Wire form.
    pub const fn as_str(self) -> &'static str {
        match self {
            SpeakResult::Tales => "tales",
            SpeakResult::Beads => "beads",
            SpeakResult::Nothing => "nothing",
            SpeakResult::Die => "die",
        }
    }
}

impl fmt::Display for SpeakResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeakResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tales" => Ok(SpeakResult::Tales),
            "beads" => Ok(SpeakResult::Beads),
            "nothing" => Ok(SpeakResult::Nothing),
            "die" => Ok(SpeakResult::Die),
            other => Err(format!("unknown speak result {other}")),
        }
    }
}

/// Result of a successful speak-to-chief.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakOutcome {
    /// What happened.
    pub result: SpeakResult,
    /// Changes to propagate.
    pub delta: DeltaSet,
}

/// Domain operations, one per state-changing message variant.
pub trait GameLogic {
    /// Move `goods` from `loser` (or its stash) into `winner`.
    fn loot_cargo(
        &self,
        game: &mut Game,
        player: &ObjectId,
        winner: &ObjectId,
        loser: &ObjectId,
        goods: &[Goods],
    ) -> Result<DeltaSet, RuleError>;

    /// Let `unit` speak to the chief of `settlement`.
    fn scout_speak_to_chief(
        &self,
        game: &mut Game,
        player: &ObjectId,
        unit: &ObjectId,
        settlement: &ObjectId,
    ) -> Result<SpeakOutcome, RuleError>;

    /// Merge `options` into the authoritative map generator options and
    /// return the merged tree.
    fn update_map_generator_options(
        &self,
        game: &mut Game,
        options: &OptionGroup,
    ) -> Result<OptionGroup, RuleError>;
}

/// The standard rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    /// Pick a speak-to-chief result for `player` at `settlement` this turn.
    pub fn speak_result(game: &Game, player: &ObjectId, settlement: &Settlement) -> SpeakResult {
        if settlement.has_spoken_to(player) {
            return SpeakResult::Nothing;
        }
        let mut rng = scoped_rng(game.seed(), settlement.id.stable_hash(), game.turn());
        match rng.gen_range(0..100u32) {
            0..=9 => SpeakResult::Die,
            10..=39 => SpeakResult::Tales,
            40..=74 => SpeakResult::Beads,
            _ => SpeakResult::Nothing,
        }
    }

    /// Gold given with beads.
    pub fn beads_gold(game: &Game, settlement: &Settlement) -> i64 {
        let mut rng = scoped_rng(
            game.seed(),
            settlement.id.stable_hash().rotate_left(1),
            game.turn(),
        );
        rng.gen_range(50..=150)
    }
}

impl GameLogic for StandardRules {
    fn loot_cargo(
        &self,
        game: &mut Game,
        player: &ObjectId,
        winner: &ObjectId,
        loser: &ObjectId,
        goods: &[Goods],
    ) -> Result<DeltaSet, RuleError> {
        if goods.is_empty() {
            return Err(RuleError::NothingToLoot);
        }
        if winner == loser {
            return Err(RuleError::SelfLoot(winner.clone()));
        }
        let winning_unit: &Unit = game.get_our_object(player, winner)?;
        if !winning_unit.has_ability(Ability::CaptureGoods) {
            return Err(RuleError::CannotCapture(winner.clone()));
        }

        // Merge duplicate entries so availability is checked on totals.
        let mut requested: Vec<Goods> = Vec::new();
        for item in goods {
            if !goods::merge_into(&mut requested, item) {
                return Err(RuleError::GoodsOverflow {
                    unit: winner.clone(),
                    goods_type: item.goods_type.clone(),
                });
            }
        }

        let live_loser = game.get_object::<Unit>(loser).ok();
        let (loser_owner, source) = match live_loser {
            Some(unit) => (unit.owner.clone(), unit.cargo.clone()),
            None => {
                let stash = game
                    .stashed_loot(loser)
                    .ok_or_else(|| RuleError::NoLootSource(loser.clone()))?;
                (stash.owner.clone(), stash.goods.clone())
            }
        };
        let from_stash = live_loser.is_none();

        for item in &requested {
            if amount_of(&source, &item.goods_type) < item.amount {
                return Err(RuleError::GoodsUnavailable {
                    source_id: loser.clone(),
                    goods_type: item.goods_type.clone(),
                    amount: item.amount,
                });
            }
        }

        let mut cargo = winning_unit.cargo.clone();
        for item in &requested {
            if !goods::merge_into(&mut cargo, item) {
                return Err(RuleError::GoodsOverflow {
                    unit: winner.clone(),
                    goods_type: item.goods_type.clone(),
                });
            }
        }
        let needed = slots_used(&cargo);
        if needed > winning_unit.holds {
            return Err(RuleError::NoCapacity {
                unit: winner.clone(),
                needed,
                holds: winning_unit.holds,
            });
        }
        let winner_owner = winning_unit.owner.clone();

        let mut remaining = source;
        for item in &requested {
            goods::take_from(&mut remaining, item);
        }
        game.get_object_mut::<Unit>(winner)?.cargo = cargo;
        if from_stash {
            if remaining.is_empty() {
                game.clear_stash(loser);
            } else if let Some(stash) = game.stashed_loot_mut(loser) {
                stash.goods = remaining;
            }
        } else {
            game.get_object_mut::<Unit>(loser)?.cargo = remaining;
        }

        debug!(%winner, %loser, from_stash, "looted cargo");
        let mut delta = DeltaSet::new();
        delta.push(
            Audience::players([winner_owner, loser_owner]),
            ChangeRecord::transfer(winner.clone(), loser.clone(), requested),
        );
        Ok(delta)
    }

    fn scout_speak_to_chief(
        &self,
        game: &mut Game,
        player: &ObjectId,
        unit: &ObjectId,
        settlement: &ObjectId,
    ) -> Result<SpeakOutcome, RuleError> {
        let scout: &Unit = game.get_our_object(player, unit)?;
        let visited = game.adjacent_settlement(scout, settlement)?;
        let result = Self::speak_result(game, player, visited);
        let gold = match result {
            SpeakResult::Beads => Self::beads_gold(game, visited),
            _ => 0,
        };
        let owner = scout.owner.clone();

        let mut delta = DeltaSet::new();
        let visited = game.get_object_mut::<Settlement>(settlement)?;
        if visited.spoken_to.insert(player.clone()) {
            let spoken_to = visited.spoken_to_attr();
            delta.push(
                Audience::Only(player.clone()),
                ChangeRecord::update(settlement.clone(), "spokenTo", spoken_to),
            );
        }

        match result {
            SpeakResult::Die => {
                game.destroy_unit(unit);
                delta.push_public(ChangeRecord::remove(unit.clone()));
            }
            other => {
                game.get_object_mut::<Unit>(unit)?.moves_left = 0;
                delta.push(
                    Audience::Only(owner),
                    ChangeRecord::update(unit.clone(), "moves", 0),
                );
                let submitter = game.get_object_mut::<Player>(player)?;
                match other {
                    SpeakResult::Tales => submitter.score += TALES_SCORE,
                    SpeakResult::Beads => submitter.gold += gold,
                    _ => {}
                }
                if matches!(other, SpeakResult::Tales | SpeakResult::Beads) {
                    delta.push(
                        Audience::Only(player.clone()),
                        ChangeRecord::replace(player.clone(), submitter.to_element()),
                    );
                }
            }
        }

        debug!(%unit, %settlement, %result, "scout spoke to chief");
        Ok(SpeakOutcome { result, delta })
    }

    fn update_map_generator_options(
        &self,
        game: &mut Game,
        options: &OptionGroup,
    ) -> Result<OptionGroup, RuleError> {
        let mut merged = game.map_generator_options().clone();
        merged.merge(options)?;
        game.set_map_generator_options(merged.clone());
        Ok(merged)
    }
}
