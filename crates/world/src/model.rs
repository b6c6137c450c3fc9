//! Authoritative model objects.
//!
//! Every object is registered in the game's identity registry under its
//! [`ObjectId`] and can be rendered as a snapshot [`Element`] for change
//! records and client replicas.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tradewind_core::ability::{format_abilities, parse_abilities};
use tradewind_core::goods::slots_used;
use tradewind_core::{
    Ability, DecodeError, Element, ElementCodec, Goods, Kinded, ObjectId, ObjectKind,
};

/// Map coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Tile {
    /// Create a tile coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance, so diagonal neighbours are at distance 1.
    pub fn distance(self, other: Tile) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Whether `other` is one of the eight neighbours.
    pub fn is_adjacent(self, other: Tile) -> bool {
        self.distance(other) == 1
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A participant: human, AI or native.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Identifier.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Administrative standing on this server.
    pub admin: bool,
    /// Native players own native settlements.
    pub native: bool,
    /// Treasury.
    pub gold: i64,
    /// Running score.
    pub score: i64,
}

impl Player {
    /// Non-admin, non-native player with an empty treasury.
    pub fn new(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            admin: false,
            native: false,
            gold: 0,
            score: 0,
        }
    }

    /// Builder granting administrative standing.
    pub fn with_admin(mut self) -> Self {
        self.admin = true;
        self
    }

    /// Builder marking the player as native.
    pub fn with_native(mut self) -> Self {
        self.native = true;
        self
    }
}

impl ElementCodec for Player {
    const TAG: &'static str = "player";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("id", &self.id)
            .with_attr("name", &self.name)
            .with_attr("admin", self.admin)
            .with_attr("native", self.native)
            .with_attr("gold", self.gold)
            .with_attr("score", self.score)
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        Ok(Self {
            id: element.id_attr("id")?,
            name: element.attr_or("name", "").to_string(),
            admin: element.parse_attr_or("admin", false)?,
            native: element.parse_attr_or("native", false)?,
            gold: element.parse_attr_or("gold", 0)?,
            score: element.parse_attr_or("score", 0)?,
        })
    }
}

/// A unit on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Identifier.
    pub id: ObjectId,
    /// Owning player.
    pub owner: ObjectId,
    /// Unit type such as `model.unit.privateer`.
    pub unit_type: String,
    /// Current position.
    pub tile: Tile,
    /// Movement points left this turn.
    pub moves_left: u32,
    /// Abilities granted by type and role.
    pub abilities: BTreeSet<Ability>,
    /// Cargo slots.
    pub holds: u32,
    /// Goods carried.
    pub cargo: Vec<Goods>,
}

impl Unit {
    /// Unit with three moves, no abilities and no cargo space.
    pub fn new(id: ObjectId, owner: ObjectId, unit_type: impl Into<String>, tile: Tile) -> Self {
        Self {
            id,
            owner,
            unit_type: unit_type.into(),
            tile,
            moves_left: 3,
            abilities: BTreeSet::new(),
            holds: 0,
            cargo: Vec::new(),
        }
    }

    /// Builder adding an ability.
    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.abilities.insert(ability);
        self
    }

    /// Builder setting cargo capacity.
    pub fn with_holds(mut self, holds: u32) -> Self {
        self.holds = holds;
        self
    }

    /// Builder adding cargo.
    pub fn with_cargo(mut self, goods: Goods) -> Self {
        if !tradewind_core::goods::merge_into(&mut self.cargo, &goods) {
            if let Some(held) = self
                .cargo
                .iter_mut()
                .find(|held| held.goods_type == goods.goods_type)
            {
                held.amount = u32::MAX;
            }
        }
        self
    }

    /// Builder setting the remaining moves.
    pub fn with_moves(mut self, moves_left: u32) -> Self {
        self.moves_left = moves_left;
        self
    }

    /// Whether the unit has `ability`.
    pub fn has_ability(&self, ability: Ability) -> bool {
        self.abilities.contains(&ability)
    }

    /// Whether the unit is owned by `player`.
    pub fn is_owned_by(&self, player: &ObjectId) -> bool {
        &self.owner == player
    }

    /// Cargo slots still free.
    pub fn free_slots(&self) -> u32 {
        self.holds.saturating_sub(slots_used(&self.cargo))
    }
}

impl ElementCodec for Unit {
    const TAG: &'static str = "unit";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("id", &self.id)
            .with_attr("owner", &self.owner)
            .with_attr("type", &self.unit_type)
            .with_attr("x", self.tile.x)
            .with_attr("y", self.tile.y)
            .with_attr("moves", self.moves_left)
            .with_attr("abilities", format_abilities(&self.abilities))
            .with_attr("holds", self.holds)
            .with_children(self.cargo.iter().map(Goods::to_element))
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        let raw_abilities = element.attr_or("abilities", "");
        let abilities =
            parse_abilities(raw_abilities).map_err(|reason| DecodeError::InvalidAttribute {
                tag: Self::TAG.to_string(),
                attribute: "abilities".to_string(),
                value: raw_abilities.to_string(),
                reason,
            })?;
        Ok(Self {
            id: element.id_attr("id")?,
            owner: element.id_attr("owner")?,
            unit_type: element.required_attr("type")?.to_string(),
            tile: Tile::new(element.parse_attr("x")?, element.parse_attr("y")?),
            moves_left: element.parse_attr_or("moves", 0)?,
            abilities,
            holds: element.parse_attr_or("holds", 0)?,
            cargo: element.children_as()?,
        })
    }
}

/// A colony or native settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Identifier.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Owning player.
    pub owner: ObjectId,
    /// Position.
    pub tile: Tile,
    /// Whether this is a native settlement.
    pub native: bool,
    /// Players whose scouts have spoken to the chief.
    pub spoken_to: BTreeSet<ObjectId>,
}

impl Settlement {
    /// Settlement nobody has visited yet.
    pub fn new(
        id: ObjectId,
        name: impl Into<String>,
        owner: ObjectId,
        tile: Tile,
        native: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            owner,
            tile,
            native,
            spoken_to: BTreeSet::new(),
        }
    }

    /// Whether a scout of `player` has already spoken to the chief.
    pub fn has_spoken_to(&self, player: &ObjectId) -> bool {
        self.spoken_to.contains(player)
    }

    /// `spokenTo` attribute form.
    pub fn spoken_to_attr(&self) -> String {
        self.spoken_to
            .iter()
            .map(ObjectId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl ElementCodec for Settlement {
    const TAG: &'static str = "settlement";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("id", &self.id)
            .with_attr("name", &self.name)
            .with_attr("owner", &self.owner)
            .with_attr("x", self.tile.x)
            .with_attr("y", self.tile.y)
            .with_attr("native", self.native)
            .with_attr("spokenTo", self.spoken_to_attr())
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        let raw = element.attr_or("spokenTo", "");
        let spoken_to = raw
            .split(',')
            .filter(|part| !part.is_empty())
            .map(|part| {
                ObjectId::parse(part).map_err(|err| DecodeError::InvalidAttribute {
                    tag: Self::TAG.to_string(),
                    attribute: "spokenTo".to_string(),
                    value: raw.to_string(),
                    reason: err.to_string(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            id: element.id_attr("id")?,
            name: element.attr_or("name", "").to_string(),
            owner: element.id_attr("owner")?,
            tile: Tile::new(element.parse_attr("x")?, element.parse_attr("y")?),
            native: element.parse_attr_or("native", false)?,
            spoken_to,
        })
    }
}

/// Any object held in the game registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameObject {
    /// A player.
    Player(Player),
    /// A unit.
    Unit(Unit),
    /// A settlement.
    Settlement(Settlement),
}

impl GameObject {
    /// Identifier of the wrapped object.
    pub fn id(&self) -> &ObjectId {
        match self {
            GameObject::Player(player) => &player.id,
            GameObject::Unit(unit) => &unit.id,
            GameObject::Settlement(settlement) => &settlement.id,
        }
    }

    /// Owning player; players own themselves.
    pub fn owner(&self) -> &ObjectId {
        match self {
            GameObject::Player(player) => &player.id,
            GameObject::Unit(unit) => &unit.owner,
            GameObject::Settlement(settlement) => &settlement.owner,
        }
    }

    /// Snapshot element.
    pub fn snapshot(&self) -> Element {
        match self {
            GameObject::Player(player) => player.to_element(),
            GameObject::Unit(unit) => unit.to_element(),
            GameObject::Settlement(settlement) => settlement.to_element(),
        }
    }
}

impl Kinded for GameObject {
    fn kind(&self) -> ObjectKind {
        match self {
            GameObject::Player(_) => ObjectKind::Player,
            GameObject::Unit(_) => ObjectKind::Unit,
            GameObject::Settlement(_) => ObjectKind::Settlement,
        }
    }
}

impl From<Player> for GameObject {
    fn from(value: Player) -> Self {
        GameObject::Player(value)
    }
}

impl From<Unit> for GameObject {
    fn from(value: Unit) -> Self {
        GameObject::Unit(value)
    }
}

impl From<Settlement> for GameObject {
    fn from(value: Settlement) -> Self {
        GameObject::Settlement(value)
    }
}

/// Typed view into [`GameObject`], used by generic lookups.
pub trait GameEntity: Sized {
    /// Kind requested when resolving this type.
    const KIND: ObjectKind;

    /// Borrow `Self` out of a registry entry.
    fn from_object(object: &GameObject) -> Option<&Self>;

    /// Mutably borrow `Self` out of a registry entry.
    fn from_object_mut(object: &mut GameObject) -> Option<&mut Self>;
}

macro_rules! game_entity {
    ($ty:ident, $kind:ident) => {
        impl GameEntity for $ty {
            const KIND: ObjectKind = ObjectKind::$kind;

            fn from_object(object: &GameObject) -> Option<&Self> {
                match object {
                    GameObject::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_object_mut(object: &mut GameObject) -> Option<&mut Self> {
                match object {
                    GameObject::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

game_entity!(Player, Player);
game_entity!(Unit, Unit);
game_entity!(Settlement, Settlement);

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> ObjectId {
        ObjectId::parse(raw).unwrap()
    }

    #[test]
    fn adjacency_includes_diagonals() {
        let origin = Tile::new(4, 4);
        assert!(origin.is_adjacent(Tile::new(5, 5)));
        assert!(origin.is_adjacent(Tile::new(3, 4)));
        assert!(!origin.is_adjacent(origin));
        assert!(!origin.is_adjacent(Tile::new(6, 4)));
    }

    #[test]
    fn unit_snapshot_round_trips_with_cargo() {
        let unit = Unit::new(
            id("unit:2"),
            id("player:2"),
            "model.unit.merchantman",
            Tile::new(3, 3),
        )
        .with_ability(Ability::Naval)
        .with_ability(Ability::CarryGoods)
        .with_holds(4)
        .with_cargo(Goods::new("model.goods.cotton", 100));
        let element = unit.to_element();
        assert_eq!(element.children().len(), 1);
        assert_eq!(Unit::from_element(&element).unwrap(), unit);
        assert_eq!(unit.free_slots(), 3);
    }

    #[test]
    fn settlement_snapshot_keeps_spoken_to() {
        let mut settlement = Settlement::new(
            id("settlement:1"),
            "Onondaga",
            id("player:natives"),
            Tile::new(6, 5),
            true,
        );
        settlement.spoken_to.insert(id("player:1"));
        let element = settlement.to_element();
        assert_eq!(element.attr("spokenTo"), Some("player:1"));
        assert_eq!(Settlement::from_element(&element).unwrap(), settlement);
    }

    #[test]
    fn typed_access_matches_kind() {
        let object = GameObject::from(Player::new(id("player:1"), "Stuyvesant"));
        assert_eq!(object.kind(), ObjectKind::Player);
        assert!(Player::from_object(&object).is_some());
        assert!(Unit::from_object(&object).is_none());
        assert_eq!(object.owner(), &id("player:1"));
    }
}
