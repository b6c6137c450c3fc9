//! tradewind - headless authority for a turn-based trading game
//!
//! Builds the configured scenario, then either runs a command script through
//! the world lane or verifies a recorded replay log.

mod command_script;
mod config;

use anyhow::{Context, Result};
use command_script::CommandScript;
use config::{AuthorityConfig, DEFAULT_CONFIG_PATH};
use std::collections::BTreeMap;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use tradewind_ai::{AiMain, AiUnit};
use tradewind_server::{spawn_lane, Authority, ReplayPlayer, ReplayRecorder, Verdict};
use tradewind_world::{Game, GameObject, SaveStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliOptions::parse(env::args().skip(1))?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let loaded = AuthorityConfig::read(&config_path);
    let log_filter = match &loaded {
        Ok(config) => config.log_filter.clone(),
        Err(_) => AuthorityConfig::default().log_filter,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter)),
        )
        .init();

    let mut config = match loaded {
        Ok(config) => config,
        // Only the default location may be absent or broken.
        Err(err) if cli.config.is_none() => {
            warn!("{err:#}. Using defaults");
            AuthorityConfig::default()
        }
        Err(err) => return Err(err),
    };
    cli.apply(&mut config);

    info!("Starting tradewind v{}", env!("CARGO_PKG_VERSION"));

    if let Some(path) = &cli.save_config {
        config.save_to_path(path)?;
        info!(path = %path.display(), "Wrote configuration");
        return Ok(());
    }

    let game = config.build_game().context("Failed to build scenario")?;
    info!(
        seed = game.seed(),
        objects = game.objects().len(),
        "Scenario ready"
    );

    if let Some(replay) = &cli.verify {
        return verify_replay(replay, game);
    }

    let Some(script_path) = config.script.clone() else {
        warn!("No command script configured; nothing to run");
        return Ok(());
    };
    let script = CommandScript::from_path(&script_path)?;
    info!(path = %script_path.display(), steps = script.len(), "Loaded command script");
    let game = run_script(&config, game, script).await?;

    sweep_ai(&game);
    if let Some(dir) = &config.save_dir {
        let store = SaveStore::new(dir)?;
        store.save_game("final", &game)?;
        store.save_high_scores(game.high_scores())?;
        info!(dir = %dir.display(), turn = %game.turn(), "Saved final game");
    }
    Ok(())
}

fn verify_replay(path: &Path, game: Game) -> Result<()> {
    let replay = ReplayPlayer::load(path)?;
    let mut authority = Authority::new(game);
    let mismatches = replay.verify(&mut authority)?;
    if mismatches.is_empty() {
        info!(
            entries = replay.entries().len(),
            "Replay reproduced every outcome"
        );
        return Ok(());
    }
    for mismatch in &mismatches {
        warn!(
            sequence = mismatch.sequence,
            expected = ?mismatch.expected,
            actual = ?mismatch.actual,
            "Replay diverged"
        );
    }
    anyhow::bail!(
        "{} of {} replay entries diverged",
        mismatches.len(),
        replay.entries().len()
    )
}

async fn run_script(
    config: &AuthorityConfig,
    game: Game,
    mut script: CommandScript,
) -> Result<Game> {
    let recorder = match &config.replay_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create replay directory {}", dir.display()))?;
            let path = dir.join(format!("replay-{}.jsonl", game.seed()));
            info!(path = %path.display(), "Recording replay");
            Some(ReplayRecorder::create(path, &game)?)
        }
        None => None,
    };

    let (lane, task) = spawn_lane(Authority::new(game), recorder);

    let mut outboxes = BTreeMap::new();
    for player in script.players() {
        let outbox = lane.connect(player.clone()).await?;
        outboxes.insert(player, outbox);
    }

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    while let Some(step) = script.next_step() {
        let tag = step.message.tag();
        match lane.submit(step.player.clone(), step.message).await? {
            Verdict::Accepted { delta } => {
                accepted += 1;
                info!(player = %step.player, tag, records = delta.len(), "Accepted");
            }
            Verdict::Rejected(error) => {
                rejected += 1;
                warn!(player = %step.player, tag, %error, "Rejected");
            }
        }
    }
    info!(accepted, rejected, "Command script finished");

    for (player, outbox) in &mut outboxes {
        let mut delivered = Vec::new();
        while let Ok(message) = outbox.try_recv() {
            delivered.push(message.tag());
        }
        info!(%player, messages = delivered.len(), tags = ?delivered, "Outbox drained");
    }

    drop(lane);
    drop(outboxes);
    task.await.context("World lane panicked")?
}

fn sweep_ai(game: &Game) {
    let session = AiMain::new();
    for (_, object) in game.objects().iter() {
        if let GameObject::Unit(unit) = object {
            if let Err(err) = AiUnit::register(&session, unit) {
                warn!(unit = %unit.id, %err, "Failed to shadow unit");
            }
        }
    }
    let report = session.check_integrity(game, true);
    info!(status = ?report.status, fixed = report.fixed, "AI sweep complete");
}

/// Command line options.
#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    script: Option<PathBuf>,
    replay_dir: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    seed: Option<u64>,
    verify: Option<PathBuf>,
    save_config: Option<PathBuf>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Result<Self> {
        let mut opts = CliOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => opts.config = Some(next_path(&mut args, "--config")?),
                "--script" => opts.script = Some(next_path(&mut args, "--script")?),
                "--replay-dir" => opts.replay_dir = Some(next_path(&mut args, "--replay-dir")?),
                "--save-dir" => opts.save_dir = Some(next_path(&mut args, "--save-dir")?),
                "--verify" => opts.verify = Some(next_path(&mut args, "--verify")?),
                "--save-config" => opts.save_config = Some(next_path(&mut args, "--save-config")?),
                "--seed" => {
                    let raw = args.next().context("--seed requires an integer")?;
                    let seed = raw
                        .parse::<u64>()
                        .with_context(|| format!("--seed must be an integer, got {raw:?}"))?;
                    opts.seed = Some(seed);
                }
                other => anyhow::bail!("Unknown argument {other:?}"),
            }
        }

        Ok(opts)
    }

    /// Command line values override the file.
    fn apply(&self, config: &mut AuthorityConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(script) = &self.script {
            config.script = Some(script.clone());
        }
        if let Some(dir) = &self.replay_dir {
            config.replay_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.save_dir {
            config.save_dir = Some(dir.clone());
        }
    }
}

fn next_path<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<PathBuf> {
    args.next()
        .map(PathBuf::from)
        .with_context(|| format!("{flag} requires a path"))
}
