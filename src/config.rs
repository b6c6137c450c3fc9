use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tradewind_core::{Ability, Goods, ObjectId};
use tradewind_world::{Game, GameBuilder, Player, Settlement, Tile, Unit};

pub const DEFAULT_CONFIG_PATH: &str = "config/authority.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorityConfig {
    pub seed: u64,
    pub map_width: u32,
    pub map_height: u32,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Directory for replay logs; no log is written when unset.
    pub replay_dir: Option<PathBuf>,
    /// Command script to run.
    pub script: Option<PathBuf>,
    /// Directory for the final save and high score table.
    pub save_dir: Option<PathBuf>,
    pub scenario: ScenarioConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    pub players: Vec<PlayerConfig>,
    pub units: Vec<UnitConfig>,
    pub settlements: Vec<SettlementConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PlayerConfig {
    pub id: String,
    pub name: String,
    pub admin: bool,
    pub native: bool,
    pub gold: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnitConfig {
    pub id: String,
    pub owner: String,
    pub unit_type: String,
    pub x: i32,
    pub y: i32,
    pub moves: u32,
    pub holds: u32,
    /// Ability names such as `model.ability.navalUnit`.
    pub abilities: Vec<String>,
    pub cargo: Vec<Goods>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            owner: String::new(),
            unit_type: "model.unit.freeColonist".to_string(),
            x: 0,
            y: 0,
            moves: 3,
            holds: 0,
            abilities: Vec::new(),
            cargo: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SettlementConfig {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub x: i32,
    pub y: i32,
    pub native: bool,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            seed: 1492,
            map_width: 40,
            map_height: 40,
            log_filter: "info".to_string(),
            replay_dir: None,
            script: None,
            save_dir: None,
            scenario: ScenarioConfig::sample(),
        }
    }
}

impl ScenarioConfig {
    /// Two trading nations, a host and one native village.
    pub fn sample() -> Self {
        let player = |id: &str, name: &str| PlayerConfig {
            id: id.to_string(),
            name: name.to_string(),
            ..PlayerConfig::default()
        };
        Self {
            players: vec![
                player("player:1", "Stuyvesant"),
                player("player:2", "Minuit"),
                PlayerConfig {
                    admin: true,
                    ..player("player:admin", "Host")
                },
                PlayerConfig {
                    native: true,
                    ..player("player:natives", "Iroquois")
                },
            ],
            units: vec![
                UnitConfig {
                    id: "unit:1".to_string(),
                    owner: "player:1".to_string(),
                    unit_type: "model.unit.privateer".to_string(),
                    x: 3,
                    y: 3,
                    holds: 2,
                    abilities: vec![
                        Ability::Naval.as_str().to_string(),
                        Ability::CarryGoods.as_str().to_string(),
                        Ability::CaptureGoods.as_str().to_string(),
                    ],
                    ..UnitConfig::default()
                },
                UnitConfig {
                    id: "unit:2".to_string(),
                    owner: "player:2".to_string(),
                    unit_type: "model.unit.merchantman".to_string(),
                    x: 4,
                    y: 3,
                    holds: 4,
                    abilities: vec![
                        Ability::Naval.as_str().to_string(),
                        Ability::CarryGoods.as_str().to_string(),
                    ],
                    cargo: vec![Goods::new("model.goods.cotton", 100)],
                    ..UnitConfig::default()
                },
                UnitConfig {
                    id: "unit:4".to_string(),
                    owner: "player:1".to_string(),
                    unit_type: "model.unit.seasonedScout".to_string(),
                    x: 11,
                    y: 11,
                    abilities: vec![Ability::SpeakWithChief.as_str().to_string()],
                    ..UnitConfig::default()
                },
            ],
            settlements: vec![SettlementConfig {
                id: "settlement:1".to_string(),
                name: "Onondaga".to_string(),
                owner: "player:natives".to_string(),
                x: 10,
                y: 10,
                native: true,
            }],
        }
    }
}

fn parse_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse(raw).with_context(|| format!("Invalid {what} identifier {raw:?}"))
}

impl AuthorityConfig {
    /// Read and parse `path`, returning errors to the caller.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }

    /// Build the initial game described by the scenario table.
    pub fn build_game(&self) -> Result<Game> {
        let mut builder = GameBuilder::new(self.seed).dimensions(self.map_width, self.map_height);

        for def in &self.scenario.players {
            let mut player = Player::new(parse_id(&def.id, "player")?, def.name.clone());
            player.gold = def.gold;
            if def.admin {
                player = player.with_admin();
            }
            if def.native {
                player = player.with_native();
            }
            builder = builder.player(player);
        }

        for def in &self.scenario.units {
            let mut unit = Unit::new(
                parse_id(&def.id, "unit")?,
                parse_id(&def.owner, "owner")?,
                def.unit_type.clone(),
                Tile::new(def.x, def.y),
            )
            .with_moves(def.moves)
            .with_holds(def.holds);
            for name in &def.abilities {
                let ability: Ability = name
                    .parse()
                    .map_err(|err: String| anyhow::anyhow!(err))
                    .with_context(|| format!("Unit {} has an unknown ability", def.id))?;
                unit = unit.with_ability(ability);
            }
            for goods in &def.cargo {
                unit = unit.with_cargo(goods.clone());
            }
            builder = builder.unit(unit);
        }

        for def in &self.scenario.settlements {
            builder = builder.settlement(Settlement::new(
                parse_id(&def.id, "settlement")?,
                def.name.clone(),
                parse_id(&def.owner, "owner")?,
                Tile::new(def.x, def.y),
                def.native,
            ));
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn default_config_builds_sample_game() {
        let game = AuthorityConfig::default().build_game().unwrap();
        let admin = ObjectId::parse("player:admin").unwrap();
        assert!(game.is_admin(&admin));
        assert_eq!(game.dimensions(), (40, 40));
        let merchant: &Unit = game
            .get_object(&ObjectId::parse("unit:2").unwrap())
            .unwrap();
        assert_eq!(merchant.cargo, vec![Goods::new("model.goods.cotton", 100)]);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AuthorityConfig = toml::from_str("seed = 7\nlog_filter = \"debug\"").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.map_width, 40);
        assert_eq!(config.scenario.players.len(), 4);
    }

    #[test]
    fn unknown_ability_is_reported() {
        let mut config = AuthorityConfig::default();
        config.scenario.units[0].abilities.push("model.ability.teleport".to_string());
        let err = config.build_game().unwrap_err();
        assert!(format!("{err:#}").contains("unknown ability"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = env::temp_dir().join(format!(
            "tradewind_config_{}.toml",
            std::process::id()
        ));
        let mut config = AuthorityConfig::default();
        config.seed = 99;
        config.replay_dir = Some(PathBuf::from("replays"));
        config.save_to_path(&path).unwrap();

        let loaded = AuthorityConfig::read(&path).unwrap();
        assert_eq!(loaded.seed, 99);
        assert_eq!(loaded.replay_dir, Some(PathBuf::from("replays")));
        assert_eq!(loaded.scenario.units.len(), config.scenario.units.len());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AuthorityConfig::read(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
