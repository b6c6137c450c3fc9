//! Authoritative dispatch.
//!
//! [`Authority::dispatch`] validates one decoded message against the current
//! game and the submitting player, invokes the matching [`GameLogic`]
//! operation and turns its [`DeltaSet`] into per-recipient messages. Nothing
//! here performs I/O; outbound messages are handed back to the caller.

use crate::error::ClientError;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};
use tradewind_core::{Ability, DeltaSet, ObjectId};
use tradewind_net::{
    decode_message, HighScoresMessage, LootCargoMessage, Message, ScoutSpeakToChiefMessage,
    UpdateMapGeneratorOptionsMessage, UpdateMessage,
};
use tradewind_world::{Game, GameLogic, MoveType, StandardRules, Unit};

/// A message addressed to one connected player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Receiving player.
    pub recipient: ObjectId,
    /// Message to deliver.
    pub message: Message,
}

impl Envelope {
    /// Address `message` to `recipient`.
    pub fn new(recipient: ObjectId, message: impl Into<Message>) -> Self {
        Self {
            recipient,
            message: message.into(),
        }
    }
}

/// Outcome of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The command was applied.
    Accepted {
        /// Changes produced by game logic.
        delta: DeltaSet,
    },
    /// The command was refused and the game left untouched.
    Rejected(ClientError),
}

impl Verdict {
    /// Whether the command was applied.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }

    /// Rejection reason, if any.
    pub fn error(&self) -> Option<&ClientError> {
        match self {
            Verdict::Accepted { .. } => None,
            Verdict::Rejected(error) => Some(error),
        }
    }
}

/// Verdict plus everything to send because of it, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// What happened.
    pub verdict: Verdict,
    /// Messages to hand to the transport.
    pub outbound: Vec<Envelope>,
}

impl Dispatch {
    fn rejected(player: &ObjectId, error: ClientError) -> Self {
        let outbound = vec![Envelope::new(player.clone(), error.to_message())];
        Self {
            verdict: Verdict::Rejected(error),
            outbound,
        }
    }

    /// Messages addressed to `player`.
    pub fn messages_for<'a>(&'a self, player: &'a ObjectId) -> impl Iterator<Item = &'a Message> {
        self.outbound
            .iter()
            .filter(move |envelope| &envelope.recipient == player)
            .map(|envelope| &envelope.message)
    }
}

/// Accepted command before fan-out.
struct Handled {
    delta: DeltaSet,
    direct: Vec<Envelope>,
}

impl Handled {
    fn delta(delta: DeltaSet) -> Self {
        Self {
            delta,
            direct: Vec::new(),
        }
    }
}

/// Owner of the authoritative [`Game`].
pub struct Authority<L: GameLogic = StandardRules> {
    game: Game,
    logic: L,
    connected: BTreeSet<ObjectId>,
}

impl Authority<StandardRules> {
    /// Authority running the standard rules.
    pub fn new(game: Game) -> Self {
        Self::with_logic(game, StandardRules)
    }
}

impl<L: GameLogic> Authority<L> {
    /// Authority running custom game logic.
    pub fn with_logic(game: Game, logic: L) -> Self {
        Self {
            game,
            logic,
            connected: BTreeSet::new(),
        }
    }

    /// Current authoritative state.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Take back the game.
    pub fn into_game(self) -> Game {
        self.game
    }

    /// Mark `player` as connected. Returns false if already connected.
    pub fn connect(&mut self, player: ObjectId) -> bool {
        info!(%player, "player connected");
        self.connected.insert(player)
    }

    /// Mark `player` as gone.
    pub fn disconnect(&mut self, player: &ObjectId) -> bool {
        info!(%player, "player disconnected");
        self.connected.remove(player)
    }

    /// Connected players in identifier order.
    pub fn connected(&self) -> &BTreeSet<ObjectId> {
        &self.connected
    }

    /// Decode a frame from `player` and dispatch it. Undecodable frames are
    /// rejected with a decode error and never reach game logic.
    pub fn dispatch_frame(&mut self, player: &ObjectId, frame: &[u8]) -> Dispatch {
        match decode_message(frame) {
            Ok(message) => self.dispatch(player, message),
            Err(err) => {
                warn!(%player, error = %err, "dropping undecodable frame");
                Dispatch::rejected(player, err.into())
            }
        }
    }

    /// Validate and apply one message from `player`.
    #[instrument(skip(self, message), fields(player = %player, tag = message.tag()))]
    pub fn dispatch(&mut self, player: &ObjectId, message: Message) -> Dispatch {
        let tag = message.tag();
        let snapshot = self.game.clone();
        let handled = match &message {
            Message::LootCargo(msg) => self.loot_cargo(player, msg),
            Message::ScoutSpeakToChief(msg) => self.scout_speak_to_chief(player, msg),
            Message::UpdateMapGeneratorOptions(msg) => {
                self.update_map_generator_options(player, msg)
            }
            Message::HighScores(msg) => self.high_scores(player, msg),
            Message::Update(_) | Message::Error(_) => Err(ClientError::precondition(format!(
                "<{tag}> is only sent by the server"
            ))),
        };

        match handled {
            Ok(handled) => {
                debug!(records = handled.delta.len(), "command accepted");
                let outbound = self.fan_out(player, &handled);
                Dispatch {
                    verdict: Verdict::Accepted {
                        delta: handled.delta,
                    },
                    outbound,
                }
            }
            Err(error) => {
                // Rejected commands leave no trace, whatever the logic did.
                self.game = snapshot;
                warn!(%player, tag, reason = error.reason(), "command rejected");
                Dispatch::rejected(player, error)
            }
        }
    }

    /// Direct replies first, then one update per recipient that can see at
    /// least one record.
    fn fan_out(&self, player: &ObjectId, handled: &Handled) -> Vec<Envelope> {
        let mut outbound = handled.direct.clone();
        if handled.delta.is_empty() {
            return outbound;
        }
        let mut recipients = self.connected.clone();
        recipients.insert(player.clone());
        for recipient in recipients {
            let records = handled.delta.visible_to(&recipient);
            if !records.is_empty() {
                outbound.push(Envelope::new(recipient, UpdateMessage::new(records)));
            }
        }
        outbound
    }

    fn loot_cargo(
        &mut self,
        player: &ObjectId,
        msg: &LootCargoMessage,
    ) -> Result<Handled, ClientError> {
        // The loser may be gone already; only the winner must resolve.
        self.game.get_our_object::<Unit>(player, msg.winner_id())?;
        let delta = self.logic.loot_cargo(
            &mut self.game,
            player,
            msg.winner_id(),
            msg.defender_id(),
            msg.goods(),
        )?;
        Ok(Handled::delta(delta))
    }

    fn scout_speak_to_chief(
        &mut self,
        player: &ObjectId,
        msg: &ScoutSpeakToChiefMessage,
    ) -> Result<Handled, ClientError> {
        let unit: &Unit = self.game.get_our_object(player, msg.unit_id())?;
        if !unit.has_ability(Ability::SpeakWithChief) {
            return Err(ClientError::precondition(format!(
                "Unit lacks ability to speak to chief: {}",
                unit.id
            )));
        }
        let settlement = self.game.adjacent_settlement(unit, msg.settlement_id())?;
        let move_type = self.game.move_type(unit, settlement.tile);
        if move_type != MoveType::EnterIndianSettlementWithScout {
            return Err(ClientError::precondition(format!(
                "Unable to enter {}: {}",
                settlement.name,
                move_type.why_illegal()
            )));
        }

        let outcome = self.logic.scout_speak_to_chief(
            &mut self.game,
            player,
            msg.unit_id(),
            msg.settlement_id(),
        )?;
        Ok(Handled {
            delta: outcome.delta,
            direct: vec![Envelope::new(player.clone(), msg.with_result(outcome.result))],
        })
    }

    fn update_map_generator_options(
        &mut self,
        player: &ObjectId,
        msg: &UpdateMapGeneratorOptionsMessage,
    ) -> Result<Handled, ClientError> {
        if !self.game.is_admin(player) {
            return Err(ClientError::precondition(format!("Not an admin: {player}")));
        }
        let Some(options) = msg.options() else {
            return Err(ClientError::precondition("No map options to merge"));
        };
        let merged = self
            .logic
            .update_map_generator_options(&mut self.game, options)?;

        let direct = self
            .connected
            .iter()
            .filter(|other| *other != player)
            .map(|other| {
                Envelope::new(other.clone(), UpdateMapGeneratorOptionsMessage::new(&merged))
            })
            .collect();
        Ok(Handled {
            delta: DeltaSet::new(),
            direct,
        })
    }

    fn high_scores(
        &mut self,
        player: &ObjectId,
        msg: &HighScoresMessage,
    ) -> Result<Handled, ClientError> {
        if !msg.scores().is_empty() {
            return Err(ClientError::precondition("High scores can not be submitted"));
        }
        let reply = HighScoresMessage::reply(self.game.high_scores().scores());
        Ok(Handled {
            delta: DeltaSet::new(),
            direct: vec![Envelope::new(player.clone(), reply)],
        })
    }
}
