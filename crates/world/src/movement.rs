//! Move classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What moving a unit onto a tile would mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveType {
    /// Ordinary move.
    Move,
    /// A scout enters a native settlement to meet the chief.
    EnterIndianSettlementWithScout,
    /// A scout enters a foreign colony.
    EnterForeignColonyWithScout,
    /// Illegal: no movement points left.
    MoveNoMoves,
    /// Illegal: this unit may not enter the settlement.
    MoveNoAccessSettlement,
    /// Illegal: the tile is not a neighbour or is off the map.
    MoveIllegal,
}

impl MoveType {
    /// Whether the move may be carried out.
    pub const fn is_legal(self) -> bool {
        matches!(
            self,
            MoveType::Move
                | MoveType::EnterIndianSettlementWithScout
                | MoveType::EnterForeignColonyWithScout
        )
    }

    /// Human-readable reason the move cannot be made in the requested way.
    pub const fn why_illegal(self) -> &'static str {
        match self {
            MoveType::Move => "Ordinary move, not a settlement visit",
            MoveType::EnterIndianSettlementWithScout => "Scout visit to a native settlement",
            MoveType::EnterForeignColonyWithScout => "Scout visit to a foreign colony",
            MoveType::MoveNoMoves => "Unit has no moves left",
            MoveType::MoveNoAccessSettlement => "Unit can not access the settlement",
            MoveType::MoveIllegal => "Illegal move",
        }
    }
}

impl fmt::Display for MoveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
