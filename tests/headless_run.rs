use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tradewind_core::Goods;
use tradewind_testkit::id;
use tradewind_world::{SaveStore, Unit};

fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "tradewind_{label}_{:016x}",
        rand::random::<u64>()
    ));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn goods(goods_type: &str, amount: u32) -> serde_json::Value {
    json!({
        "tag": "goods",
        "attributes": [["type", goods_type], ["amount", amount.to_string()]],
        "children": []
    })
}

fn write_script(dir: &Path) -> PathBuf {
    let script = json!({
        "steps": [
            {
                "player": "player:1",
                "message": {
                    "tag": "lootCargo",
                    "attributes": [["winner", "unit:1"], ["loser", "unit:2"]],
                    "children": [goods("model.goods.cotton", 100)]
                }
            },
            {
                "player": "player:1",
                "message": {
                    "tag": "scoutSpeakToChief",
                    "attributes": [["unit", "unit:4"], ["settlement", "settlement:1"]],
                    "children": []
                }
            },
            {
                "player": "player:2",
                "message": { "tag": "highScores", "attributes": [], "children": [] }
            },
            {
                "player": "player:2",
                "message": {
                    "tag": "lootCargo",
                    "attributes": [["winner", "unit:1"], ["loser", "unit:2"]],
                    "children": [goods("model.goods.cotton", 10)]
                }
            }
        ]
    });
    let path = dir.join("script.json");
    std::fs::write(&path, script.to_string()).expect("write script");
    path
}

fn run(args: &[&str]) -> std::process::ExitStatus {
    Command::new(env!("CARGO_BIN_EXE_tradewind"))
        .args(args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("spawn tradewind")
}

#[test]
fn scripted_run_records_saves_and_verifies() {
    let dir = scratch_dir("run");
    let config = dir.join("authority.toml");
    let replays = dir.join("replays");
    let saves = dir.join("saves");
    let script = write_script(&dir);

    let status = run(&["--save-config", config.to_str().unwrap(), "--seed", "77"]);
    assert!(status.success(), "--save-config exited with {status}");
    assert!(config.exists());

    let status = run(&[
        "--config",
        config.to_str().unwrap(),
        "--script",
        script.to_str().unwrap(),
        "--replay-dir",
        replays.to_str().unwrap(),
        "--save-dir",
        saves.to_str().unwrap(),
    ]);
    assert!(status.success(), "scripted run exited with {status}");

    let replay = replays.join("replay-77.jsonl");
    let lines = std::fs::read_to_string(&replay).expect("read replay");
    // Header plus one entry per step.
    assert_eq!(lines.lines().count(), 5);

    let store = SaveStore::new(&saves).expect("open saves");
    let game = store.load_game("final").expect("load final game");
    assert_eq!(game.seed(), 77);
    let privateer: &Unit = game.get_object(&id("unit:1")).expect("privateer");
    assert_eq!(privateer.cargo, vec![Goods::new("model.goods.cotton", 100)]);
    let merchant: &Unit = game.get_object(&id("unit:2")).expect("merchant");
    assert!(merchant.cargo.is_empty());
    assert!(store.load_high_scores().is_ok());

    let status = run(&[
        "--config",
        config.to_str().unwrap(),
        "--verify",
        replay.to_str().unwrap(),
    ]);
    assert!(status.success(), "--verify exited with {status}");

    // A different seed is a different initial state.
    let status = run(&[
        "--config",
        config.to_str().unwrap(),
        "--seed",
        "78",
        "--verify",
        replay.to_str().unwrap(),
    ]);
    assert!(!status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn explicit_config_must_exist() {
    let dir = scratch_dir("missing");
    let status = run(&["--config", dir.join("absent.toml").to_str().unwrap()]);
    assert!(!status.success());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_flags_fail() {
    assert!(!run(&["--fullscreen"]).success());
}
