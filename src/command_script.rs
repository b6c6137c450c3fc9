use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::BTreeSet, collections::VecDeque, fs, path::Path};
use tradewind_core::{Element, ObjectId};
use tradewind_net::Message;

#[derive(Debug, Deserialize)]
struct CommandScriptFile {
    steps: Vec<CommandScriptStepDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct CommandScriptStepDef {
    player: String,
    message: Element,
}

/// One scripted submission.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandScriptStep {
    pub player: ObjectId,
    pub message: Message,
}

/// Deterministic command script runner.
///
/// Scripts are a list of `{player, message}` steps submitted in file order.
/// Messages use the element form of the wire protocol and pass the same
/// decode and limit checks as frames from a client.
#[derive(Debug)]
pub struct CommandScript {
    pending: VecDeque<CommandScriptStep>,
}

impl CommandScript {
    /// Load a command script from a JSON file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read command script {}", path.display()))?;
        Self::from_str(&contents)
    }

    /// Load a command script from an in-memory JSON string.
    pub fn from_str(contents: &str) -> Result<Self> {
        let file: CommandScriptFile = serde_json::from_str(contents)?;
        if file.steps.is_empty() {
            anyhow::bail!("command script contains no steps");
        }

        let mut pending = VecDeque::with_capacity(file.steps.len());
        for (index, step) in file.steps.into_iter().enumerate() {
            let player = ObjectId::parse(step.player.trim())
                .with_context(|| format!("command script step {index} has an invalid player"))?;
            let message = Message::decode(&step.message)
                .with_context(|| format!("command script step {index} has an invalid message"))?;
            pending.push_back(CommandScriptStep { player, message });
        }

        Ok(Self { pending })
    }

    /// Players that submit at least one step, in identifier order.
    pub fn players(&self) -> BTreeSet<ObjectId> {
        self.pending.iter().map(|step| step.player.clone()).collect()
    }

    /// Take the next step.
    pub fn next_step(&mut self) -> Option<CommandScriptStep> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tradewind_net::HighScoresMessage;

    fn element_json(message: impl Into<Message>) -> serde_json::Value {
        serde_json::to_value(message.into().to_element()).unwrap()
    }

    #[test]
    fn loads_steps_in_file_order() {
        let script = json!({
            "steps": [
                { "player": "player:1", "message": element_json(HighScoresMessage::query()) },
                {
                    "player": "player:2",
                    "message": {
                        "tag": "scoutSpeakToChief",
                        "attributes": [["unit", "unit:4"], ["settlement", "settlement:1"]],
                        "children": []
                    }
                }
            ]
        });
        let mut script = CommandScript::from_str(&script.to_string()).unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.players().len(), 2);

        let first = script.next_step().unwrap();
        assert_eq!(first.player.as_str(), "player:1");
        assert_eq!(first.message, Message::HighScores(HighScoresMessage::query()));

        let second = script.next_step().unwrap();
        assert!(matches!(second.message, Message::ScoutSpeakToChief(_)));
        assert_eq!(script.len(), 0);
    }

    #[test]
    fn rejects_empty_scripts() {
        let err = CommandScript::from_str(r#"{ "steps": [] }"#).unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }

    #[test]
    fn rejects_unknown_messages() {
        let script = json!({
            "steps": [{
                "player": "player:1",
                "message": { "tag": "declareWar", "attributes": [], "children": [] }
            }]
        });
        let err = CommandScript::from_str(&script.to_string()).unwrap_err();
        assert!(format!("{err:#}").contains("step 0 has an invalid message"));
    }

    #[test]
    fn rejects_invalid_players() {
        let script = json!({
            "steps": [{ "player": "player 1", "message": element_json(HighScoresMessage::query()) }]
        });
        let err = CommandScript::from_str(&script.to_string()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid player"));
    }
}
