//! Single-writer world lane.
//!
//! One tokio task owns the [`Authority`] and processes commands strictly in
//! arrival order. Frames are decoded on the caller's task before they enter
//! the lane. Outbound messages are pushed onto per-player unbounded queues;
//! the transport drains those queues outside the lane. A replay log that
//! stops accepting writes is dropped and the lane keeps serving.

use crate::authority::{Authority, Verdict};
use crate::error::ClientError;
use crate::replay::ReplayRecorder;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use tradewind_core::ObjectId;
use tradewind_net::{decode_message, Message};
use tradewind_world::{Game, GameLogic};

/// Capacity of the lane's command queue.
const LANE_QUEUE_DEPTH: usize = 256;

/// Messages waiting for one connected player.
pub type Outbox = mpsc::UnboundedReceiver<Message>;

enum LaneCommand {
    Connect {
        player: ObjectId,
        outbox: mpsc::UnboundedSender<Message>,
    },
    Disconnect {
        player: ObjectId,
    },
    Submit {
        player: ObjectId,
        message: Message,
        reply: oneshot::Sender<Verdict>,
    },
    Reject {
        player: ObjectId,
        error: ClientError,
    },
    Snapshot {
        reply: oneshot::Sender<Game>,
    },
}

/// Cloneable handle for submitting to a running lane.
#[derive(Clone)]
pub struct LaneHandle {
    commands: mpsc::Sender<LaneCommand>,
}

impl LaneHandle {
    async fn send(&self, command: LaneCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("World lane has shut down"))
    }

    /// Connect `player` and return the queue its messages arrive on.
    pub async fn connect(&self, player: ObjectId) -> Result<Outbox> {
        let (outbox, inbox) = mpsc::unbounded_channel();
        self.send(LaneCommand::Connect { player, outbox }).await?;
        Ok(inbox)
    }

    /// Disconnect `player`.
    pub async fn disconnect(&self, player: ObjectId) -> Result<()> {
        self.send(LaneCommand::Disconnect { player }).await
    }

    /// Dispatch a decoded message and wait for the verdict.
    pub async fn submit(&self, player: ObjectId, message: Message) -> Result<Verdict> {
        let (reply, verdict) = oneshot::channel();
        self.send(LaneCommand::Submit {
            player,
            message,
            reply,
        })
        .await?;
        verdict.await.context("World lane dropped the submission")
    }

    /// Decode `frame` and dispatch it. Frames that fail to decode never reach
    /// the authority; the submitter still gets the `<error>` in its outbox.
    pub async fn submit_frame(&self, player: ObjectId, frame: &[u8]) -> Result<Verdict> {
        match decode_message(frame) {
            Ok(message) => self.submit(player, message).await,
            Err(err) => {
                warn!(%player, error = %err, "dropping undecodable frame");
                let error = ClientError::from(err);
                self.send(LaneCommand::Reject {
                    player,
                    error: error.clone(),
                })
                .await?;
                Ok(Verdict::Rejected(error))
            }
        }
    }

    /// Copy of the authoritative game.
    pub async fn snapshot(&self) -> Result<Game> {
        let (reply, game) = oneshot::channel();
        self.send(LaneCommand::Snapshot { reply }).await?;
        game.await.context("World lane dropped the snapshot request")
    }
}

/// Start the lane. It runs until every [`LaneHandle`] is dropped and then
/// yields the final game.
pub fn spawn_lane<L>(
    authority: Authority<L>,
    recorder: Option<ReplayRecorder>,
) -> (LaneHandle, JoinHandle<Result<Game>>)
where
    L: GameLogic + Send + 'static,
{
    let (commands, queue) = mpsc::channel(LANE_QUEUE_DEPTH);
    let task = tokio::spawn(run_lane(authority, recorder, queue));
    (LaneHandle { commands }, task)
}

#[instrument(skip_all, fields(seed = authority.game().seed()))]
async fn run_lane<L: GameLogic>(
    mut authority: Authority<L>,
    mut recorder: Option<ReplayRecorder>,
    mut queue: mpsc::Receiver<LaneCommand>,
) -> Result<Game> {
    info!("world lane started");
    let mut outboxes: BTreeMap<ObjectId, mpsc::UnboundedSender<Message>> = BTreeMap::new();

    while let Some(command) = queue.recv().await {
        match command {
            LaneCommand::Connect { player, outbox } => {
                authority.connect(player.clone());
                outboxes.insert(player, outbox);
            }
            LaneCommand::Disconnect { player } => {
                authority.disconnect(&player);
                outboxes.remove(&player);
            }
            LaneCommand::Submit {
                player,
                message,
                reply,
            } => {
                let turn = authority.game().turn().0;
                let dispatch = authority.dispatch(&player, message.clone());
                if let Some(active) = recorder.as_mut() {
                    if let Err(err) = active.record(turn, &player, &message, &dispatch) {
                        error!(
                            error = %format!("{err:#}"),
                            "failed to record replay entry, recording stopped"
                        );
                        recorder = None;
                    }
                }

                for envelope in dispatch.outbound {
                    let delivered = outboxes
                        .get(&envelope.recipient)
                        .is_some_and(|outbox| outbox.send(envelope.message).is_ok());
                    if !delivered {
                        debug!(recipient = %envelope.recipient, "recipient not connected");
                    }
                }
                if reply.send(dispatch.verdict).is_err() {
                    debug!(%player, "submitter stopped waiting for verdict");
                }
            }
            LaneCommand::Reject { player, error } => {
                let delivered = outboxes
                    .get(&player)
                    .is_some_and(|outbox| outbox.send(error.to_message().into()).is_ok());
                if !delivered {
                    debug!(recipient = %player, "recipient not connected");
                }
            }
            LaneCommand::Snapshot { reply } => {
                let _ = reply.send(authority.game().clone());
            }
        }
    }

    if let Some(recorder) = recorder.as_mut() {
        match recorder.flush() {
            Ok(()) => info!(entries = recorder.entries_written(), "replay log closed"),
            Err(err) => error!(error = %format!("{err:#}"), "failed to flush replay log"),
        }
    }
    info!("world lane stopped");
    Ok(authority.into_game())
}
