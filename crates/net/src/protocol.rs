//! Protocol message definitions.
//!
//! Every command and event is one variant of [`Message`]. Variants are built
//! either from live model objects (sending side) or from a decoded
//! [`Element`] (receiving side); in the latter case only identifiers are
//! stored and resolution is deferred to the `get_*` accessors or to dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tradewind_core::{
    ChangeRecord, DecodeError, Element, ElementCodec, Goods, HighScore, ObjectId, OptionGroup,
    ResolveError,
};
use tradewind_world::{Game, Settlement, SpeakResult, Unit};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Protocol magic bytes to identify the tradewind protocol.
pub const PROTOCOL_MAGIC: &[u8; 8] = b"TWND\x00\x01\x00\x00";

/// Maximum goods entries in one loot request.
pub const MAX_LOOT_GOODS: usize = 16;

/// Maximum options in one option tree.
pub const MAX_OPTIONS: usize = 64;

/// Maximum change records in one update.
pub const MAX_UPDATE_RECORDS: usize = 1024;

/// Maximum high score entries in one reply.
pub const MAX_HIGH_SCORE_ENTRIES: usize = 100;

/// Maximum length of an error reason (bytes).
pub const MAX_REASON_LEN: usize = 512;

/// Maximum element nesting accepted from the wire.
pub const MAX_ELEMENT_DEPTH: usize = 8;

/// Loot goods from a defeated unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootCargoMessage {
    winner: ObjectId,
    loser: ObjectId,
    goods: Vec<Goods>,
}

impl LootCargoMessage {
    /// Request for `winner` to take `goods` from `loser_id`.
    ///
    /// The loser is named by identifier only; it may already have sunk.
    pub fn new(winner: &Unit, loser_id: ObjectId, goods: Vec<Goods>) -> Self {
        Self {
            winner: winner.id.clone(),
            loser: loser_id,
            goods,
        }
    }

    /// Resolve the winning unit.
    pub fn get_unit<'g>(&self, game: &'g Game) -> Result<&'g Unit, ResolveError> {
        game.get_object(&self.winner)
    }

    /// Winning unit identifier.
    pub fn winner_id(&self) -> &ObjectId {
        &self.winner
    }

    /// Losing unit identifier; not guaranteed to resolve.
    pub fn defender_id(&self) -> &ObjectId {
        &self.loser
    }

    /// Goods to loot.
    pub fn goods(&self) -> &[Goods] {
        &self.goods
    }

    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.goods.len() > MAX_LOOT_GOODS {
            return Err("Too many goods to loot");
        }
        if self.goods.iter().any(|goods| goods.amount == 0) {
            return Err("Loot amount must be positive");
        }
        Ok(())
    }
}

impl ElementCodec for LootCargoMessage {
    const TAG: &'static str = "lootCargo";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("winner", &self.winner)
            .with_attr("loser", &self.loser)
            .with_children(self.goods.iter().map(Goods::to_element))
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        Ok(Self {
            winner: element.id_attr("winner")?,
            loser: element.id_attr("loser")?,
            goods: element.children_as()?,
        })
    }
}

/// A scout asks to speak with a native chief.
///
/// Sent by the client without a result; echoed back by the server with the
/// result filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoutSpeakToChiefMessage {
    unit: ObjectId,
    settlement: ObjectId,
    result: Option<SpeakResult>,
}

impl ScoutSpeakToChiefMessage {
    /// Request for `unit` to speak to the chief of `settlement`.
    pub fn new(unit: &Unit, settlement: &Settlement, result: Option<SpeakResult>) -> Self {
        Self {
            unit: unit.id.clone(),
            settlement: settlement.id.clone(),
            result,
        }
    }

    /// Copy of this message carrying `result`.
    pub fn with_result(&self, result: SpeakResult) -> Self {
        Self {
            result: Some(result),
            ..self.clone()
        }
    }

    /// Resolve the scout.
    pub fn get_unit<'g>(&self, game: &'g Game) -> Result<&'g Unit, ResolveError> {
        game.get_object(&self.unit)
    }

    /// Resolve the settlement.
    pub fn get_settlement<'g>(&self, game: &'g Game) -> Result<&'g Settlement, ResolveError> {
        game.get_object(&self.settlement)
    }

    /// Scout identifier.
    pub fn unit_id(&self) -> &ObjectId {
        &self.unit
    }

    /// Settlement identifier.
    pub fn settlement_id(&self) -> &ObjectId {
        &self.settlement
    }

    /// Outcome, if the server has filled it in.
    pub fn result(&self) -> Option<SpeakResult> {
        self.result
    }

    /// Outcome in attribute form; empty when absent.
    pub fn result_str(&self) -> &'static str {
        self.result.map(SpeakResult::as_str).unwrap_or("")
    }
}

impl ElementCodec for ScoutSpeakToChiefMessage {
    const TAG: &'static str = "scoutSpeakToChief";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("unit", &self.unit)
            .with_attr("settlement", &self.settlement)
            .with_opt_attr("result", self.result)
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        let result = match element.attr_or("result", "") {
            "" => None,
            _ => Some(element.parse_attr::<SpeakResult>("result")?),
        };
        Ok(Self {
            unit: element.id_attr("unit")?,
            settlement: element.id_attr("settlement")?,
            result,
        })
    }
}

/// Replace the map generator options (admin only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMapGeneratorOptionsMessage {
    options: Option<OptionGroup>,
}

impl UpdateMapGeneratorOptionsMessage {
    /// Message carrying `options`.
    pub fn new(options: &OptionGroup) -> Self {
        Self {
            options: Some(options.clone()),
        }
    }

    /// Options tree; `None` when the sender omitted it.
    pub fn options(&self) -> Option<&OptionGroup> {
        self.options.as_ref()
    }

    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        match &self.options {
            Some(group) if group.options.len() > MAX_OPTIONS => Err("Too many options"),
            _ => Ok(()),
        }
    }
}

impl ElementCodec for UpdateMapGeneratorOptionsMessage {
    const TAG: &'static str = "updateMapGeneratorOptions";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG).with_children(self.options.iter().map(OptionGroup::to_element))
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        let options = match element.children() {
            [] => None,
            _ => Some(element.child_as::<OptionGroup>(0)?),
        };
        Ok(Self { options })
    }
}

/// High score query (no entries) or reply (entries in rank order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoresMessage {
    scores: Vec<HighScore>,
}

impl HighScoresMessage {
    /// Query for the server's table.
    pub fn query() -> Self {
        Self::default()
    }

    /// Reply carrying `scores`.
    pub fn reply(scores: &[HighScore]) -> Self {
        Self {
            scores: scores.to_vec(),
        }
    }

    /// Entries in rank order.
    pub fn scores(&self) -> &[HighScore] {
        &self.scores
    }

    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.scores.len() > MAX_HIGH_SCORE_ENTRIES {
            return Err("Too many high scores");
        }
        Ok(())
    }
}

impl ElementCodec for HighScoresMessage {
    const TAG: &'static str = "highScores";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG).with_children(self.scores.iter().map(HighScore::to_element))
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        Ok(Self {
            scores: element.children_as()?,
        })
    }
}

/// Change records for one recipient, to be applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessage {
    records: Vec<ChangeRecord>,
}

impl UpdateMessage {
    /// Update carrying `records`.
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    /// Records in application order.
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.records.len() > MAX_UPDATE_RECORDS {
            return Err("Too many change records");
        }
        Ok(())
    }
}

impl ElementCodec for UpdateMessage {
    const TAG: &'static str = "update";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG).with_children(self.records.iter().map(ChangeRecord::to_element))
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        Ok(Self {
            records: element
                .children()
                .iter()
                .map(ChangeRecord::from_element)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Category of a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An identifier did not resolve.
    Resolution,
    /// A precondition did not hold.
    Precondition,
    /// Game logic refused the operation.
    Rules,
    /// The message could not be decoded.
    Decode,
}

impl ErrorKind {
    /// Wire form.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Resolution => "resolution",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Rules => "rules",
            ErrorKind::Decode => "decode",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolution" => Ok(ErrorKind::Resolution),
            "precondition" => Ok(ErrorKind::Precondition),
            "rules" => Ok(ErrorKind::Rules),
            "decode" => Ok(ErrorKind::Decode),
            other => Err(format!("unknown error kind {other}")),
        }
    }
}

/// Rejection reported to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    kind: ErrorKind,
    reason: String,
}

impl ErrorMessage {
    /// Error of `kind` with a human-readable `reason`.
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.reason.len() > MAX_REASON_LEN {
            return Err("Error reason too long");
        }
        Ok(())
    }
}

impl ElementCodec for ErrorMessage {
    const TAG: &'static str = "error";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("kind", self.kind)
            .with_attr("reason", &self.reason)
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        Ok(Self {
            kind: element.parse_attr("kind")?,
            reason: element.attr_or("reason", "").to_string(),
        })
    }
}

/// Every message exchanged between clients and the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Loot goods from a defeated unit.
    LootCargo(LootCargoMessage),
    /// A scout speaks to a native chief.
    ScoutSpeakToChief(ScoutSpeakToChiefMessage),
    /// Replace the map generator options.
    UpdateMapGeneratorOptions(UpdateMapGeneratorOptionsMessage),
    /// High score query or reply.
    HighScores(HighScoresMessage),
    /// Filtered change records.
    Update(UpdateMessage),
    /// Client error.
    Error(ErrorMessage),
}

impl Message {
    /// Tags of every variant, in declaration order.
    pub const TAGS: [&'static str; 6] = [
        LootCargoMessage::TAG,
        ScoutSpeakToChiefMessage::TAG,
        UpdateMapGeneratorOptionsMessage::TAG,
        HighScoresMessage::TAG,
        UpdateMessage::TAG,
        ErrorMessage::TAG,
    ];

    /// Tag of this variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Message::LootCargo(_) => LootCargoMessage::TAG,
            Message::ScoutSpeakToChief(_) => ScoutSpeakToChiefMessage::TAG,
            Message::UpdateMapGeneratorOptions(_) => UpdateMapGeneratorOptionsMessage::TAG,
            Message::HighScores(_) => HighScoresMessage::TAG,
            Message::Update(_) => UpdateMessage::TAG,
            Message::Error(_) => ErrorMessage::TAG,
        }
    }

    /// Element form.
    pub fn to_element(&self) -> Element {
        match self {
            Message::LootCargo(msg) => msg.to_element(),
            Message::ScoutSpeakToChief(msg) => msg.to_element(),
            Message::UpdateMapGeneratorOptions(msg) => msg.to_element(),
            Message::HighScores(msg) => msg.to_element(),
            Message::Update(msg) => msg.to_element(),
            Message::Error(msg) => msg.to_element(),
        }
    }

    /// Decode by tag without checking limits.
    pub fn from_element(element: &Element) -> Result<Self, DecodeError> {
        Ok(match element.tag() {
            LootCargoMessage::TAG => Message::LootCargo(LootCargoMessage::from_element(element)?),
            ScoutSpeakToChiefMessage::TAG => {
                Message::ScoutSpeakToChief(ScoutSpeakToChiefMessage::from_element(element)?)
            }
            UpdateMapGeneratorOptionsMessage::TAG => Message::UpdateMapGeneratorOptions(
                UpdateMapGeneratorOptionsMessage::from_element(element)?,
            ),
            HighScoresMessage::TAG => {
                Message::HighScores(HighScoresMessage::from_element(element)?)
            }
            UpdateMessage::TAG => Message::Update(UpdateMessage::from_element(element)?),
            ErrorMessage::TAG => Message::Error(ErrorMessage::from_element(element)?),
            other => {
                return Err(DecodeError::UnknownMessage {
                    tag: other.to_string(),
                })
            }
        })
    }

    /// Decode an element received from an untrusted peer: depth check,
    /// decode, then limit verification.
    pub fn decode(element: &Element) -> Result<Self, DecodeError> {
        if element.depth() > MAX_ELEMENT_DEPTH {
            return Err(DecodeError::Limit {
                tag: element.tag().to_string(),
                reason: "Element nested too deeply".to_string(),
            });
        }
        let message = Self::from_element(element)?;
        message.verify().map_err(|reason| DecodeError::Limit {
            tag: message.tag().to_string(),
            reason: reason.to_string(),
        })?;
        Ok(message)
    }

    /// Verify message limits and validity.
    ///
    /// This should be called on all received messages to prevent DoS attacks.
    pub fn verify(&self) -> Result<(), &'static str> {
        match self {
            Message::LootCargo(msg) => msg.verify(),
            Message::ScoutSpeakToChief(_) => Ok(()),
            Message::UpdateMapGeneratorOptions(msg) => msg.verify(),
            Message::HighScores(msg) => msg.verify(),
            Message::Update(msg) => msg.verify(),
            Message::Error(msg) => msg.verify(),
        }
    }
}

macro_rules! message_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for Message {
            fn from(value: $ty) -> Self {
                Message::$variant(value)
            }
        }
    };
}

message_from!(LootCargo, LootCargoMessage);
message_from!(ScoutSpeakToChief, ScoutSpeakToChiefMessage);
message_from!(UpdateMapGeneratorOptions, UpdateMapGeneratorOptionsMessage);
message_from!(HighScores, HighScoresMessage);
message_from!(Update, UpdateMessage);
message_from!(Error, ErrorMessage);

#[cfg(test)]
mod tests {
    use super::*;
    use tradewind_core::GameOption;
    use tradewind_world::Tile;

    fn id(raw: &str) -> ObjectId {
        ObjectId::parse(raw).unwrap()
    }

    fn privateer() -> Unit {
        Unit::new(id("unit:1"), id("player:1"), "model.unit.privateer", Tile::new(3, 3))
    }

    fn onondaga() -> Settlement {
        Settlement::new(
            id("settlement:1"),
            "Onondaga",
            id("player:natives"),
            Tile::new(10, 10),
            true,
        )
    }

    #[test]
    fn loot_cargo_element_form() {
        let msg = LootCargoMessage::new(
            &privateer(),
            id("unit:2"),
            vec![Goods::new("model.goods.cotton", 100)],
        );
        assert_eq!(
            msg.to_element().to_string(),
            concat!(
                r#"<lootCargo winner="unit:1" loser="unit:2">"#,
                r#"<goods type="model.goods.cotton" amount="100"/>"#,
                "</lootCargo>"
            )
        );
        assert_eq!(LootCargoMessage::from_element(&msg.to_element()).unwrap(), msg);
    }

    #[test]
    fn speak_result_defaults_to_empty() {
        let scout = Unit::new(
            id("unit:4"),
            id("player:1"),
            "model.unit.seasonedScout",
            Tile::new(11, 11),
        );
        let request = ScoutSpeakToChiefMessage::new(&scout, &onondaga(), None);
        let element = request.to_element();
        assert_eq!(element.attr("result"), None);
        let decoded = ScoutSpeakToChiefMessage::from_element(&element).unwrap();
        assert_eq!(decoded.result_str(), "");

        let explicit_empty = element.clone().with_attr("result", "");
        assert_eq!(
            ScoutSpeakToChiefMessage::from_element(&explicit_empty).unwrap(),
            request
        );

        let echoed = request.with_result(SpeakResult::Beads);
        assert_eq!(echoed.to_element().attr("result"), Some("beads"));
        assert_eq!(
            ScoutSpeakToChiefMessage::from_element(&echoed.to_element()).unwrap(),
            echoed
        );
    }

    #[test]
    fn missing_required_attribute_is_decode_error() {
        let element = Element::new("lootCargo").with_attr("winner", "unit:1");
        assert!(matches!(
            Message::decode(&element),
            Err(DecodeError::MissingAttribute { ref attribute, .. }) if attribute == "loser"
        ));
    }

    #[test]
    fn mistyped_child_is_decode_error() {
        let element = LootCargoMessage::new(&privateer(), id("unit:2"), Vec::new())
            .to_element()
            .with_child(Element::new("unit"));
        assert!(matches!(
            Message::decode(&element),
            Err(DecodeError::UnexpectedTag { .. })
        ));
    }

    #[test]
    fn options_message_without_tree_decodes_as_absent() {
        let msg = Message::decode(&Element::new("updateMapGeneratorOptions")).unwrap();
        match msg {
            Message::UpdateMapGeneratorOptions(inner) => assert!(inner.options().is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(
            Message::decode(&Element::new("declareIndependence")),
            Err(DecodeError::UnknownMessage {
                tag: "declareIndependence".into()
            })
        );
    }

    #[test]
    fn limits_are_enforced() {
        let goods = (0..=MAX_LOOT_GOODS)
            .map(|i| Goods::new(format!("model.goods.g{i}"), 1))
            .collect();
        let msg = LootCargoMessage::new(&privateer(), id("unit:2"), goods);
        assert_eq!(msg.verify(), Err("Too many goods to loot"));
        assert!(matches!(
            Message::decode(&msg.to_element()),
            Err(DecodeError::Limit { .. })
        ));

        let zero = LootCargoMessage::new(
            &privateer(),
            id("unit:2"),
            vec![Goods::new("model.goods.furs", 0)],
        );
        assert_eq!(zero.verify(), Err("Loot amount must be positive"));

        let error = ErrorMessage::new(ErrorKind::Rules, "x".repeat(MAX_REASON_LEN + 1));
        assert_eq!(error.verify(), Err("Error reason too long"));

        let mut group = OptionGroup::new("model.option.mapGeneratorOptions");
        for i in 0..=MAX_OPTIONS {
            group = group.with_option(GameOption::boolean(format!("model.option.o{i}"), true));
        }
        assert_eq!(
            UpdateMapGeneratorOptionsMessage::new(&group).verify(),
            Err("Too many options")
        );
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut element = Element::new("leaf");
        for _ in 0..MAX_ELEMENT_DEPTH {
            element = Element::new("wrap").with_child(element);
        }
        let element = Element::new("update").with_child(element);
        assert!(matches!(
            Message::decode(&element),
            Err(DecodeError::Limit { .. })
        ));
    }

    #[test]
    fn tags_are_unique() {
        let mut tags = Message::TAGS.to_vec();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), Message::TAGS.len());
    }

    #[test]
    fn accessors_resolve_against_game() {
        let mut game = Game::new(1, 20, 20);
        game.insert(tradewind_world::Player::new(id("player:1"), "Stuyvesant"))
            .unwrap();
        game.insert(privateer()).unwrap();
        let msg = LootCargoMessage::new(&privateer(), id("unit:2"), Vec::new());
        assert_eq!(msg.get_unit(&game).unwrap().id, id("unit:1"));
        assert_eq!(msg.defender_id(), &id("unit:2"));

        let speak = ScoutSpeakToChiefMessage::new(&privateer(), &onondaga(), None);
        let err = speak.get_settlement(&game).unwrap_err();
        assert_eq!(err.to_string(), "no such settlement: settlement:1");
    }
}
