//! Determinism of dispatch and replay verification.

use proptest::prelude::*;
use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tradewind_core::{Goods, ObjectId};
use tradewind_net::{HighScoresMessage, LootCargoMessage, Message, ScoutSpeakToChiefMessage};
use tradewind_server::{Authority, Dispatch, RecordedOutcome, ReplayPlayer, ReplayRecorder};
use tradewind_testkit::{seeded_scenario, state_digest, Scenario, ScenarioIds};
use tradewind_world::{Game, Settlement, Unit};

fn temp_log(label: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    env::temp_dir().join(format!("tradewind_{label}_{timestamp}.jsonl"))
}

/// A short session touching every accepted and rejected path.
fn session(game: &Game, ids: &ScenarioIds) -> Vec<(ObjectId, Message)> {
    let privateer: &Unit = game.get_object(&ids.u1).unwrap();
    let scout: &Unit = game.get_object(&ids.u4).unwrap();
    let colonist: &Unit = game.get_object(&ids.u3).unwrap();
    let camp: &Settlement = game.get_object(&ids.s1).unwrap();
    let cotton = |amount| vec![Goods::new("model.goods.cotton", amount)];

    vec![
        (ids.p2.clone(), LootCargoMessage::new(privateer, ids.u2.clone(), cotton(50)).into()),
        (ids.p1.clone(), LootCargoMessage::new(privateer, ids.u2.clone(), cotton(60)).into()),
        (ids.p1.clone(), ScoutSpeakToChiefMessage::new(colonist, camp, None).into()),
        (ids.p1.clone(), ScoutSpeakToChiefMessage::new(scout, camp, None).into()),
        (ids.p1.clone(), ScoutSpeakToChiefMessage::new(scout, camp, None).into()),
        (ids.p1.clone(), LootCargoMessage::new(privateer, ids.u2.clone(), cotton(60)).into()),
        (ids.p2.clone(), HighScoresMessage::query().into()),
    ]
}

fn run(game: Game, steps: &[(ObjectId, Message)]) -> (Vec<Dispatch>, Game) {
    let mut authority = Authority::new(game);
    let dispatches = steps
        .iter()
        .map(|(player, message)| authority.dispatch(player, message.clone()))
        .collect();
    (dispatches, authority.into_game())
}

#[test]
fn identical_inputs_give_identical_outcomes() {
    let Scenario { ids, game } = seeded_scenario(7);
    let steps = session(&game, &ids);

    let (first, first_game) = run(game.clone(), &steps);
    let (second, second_game) = run(game, &steps);
    assert_eq!(first, second);
    assert_eq!(
        state_digest(&first_game).unwrap(),
        state_digest(&second_game).unwrap()
    );
}

#[test]
fn recorded_session_replays_cleanly() {
    let Scenario { ids, game } = seeded_scenario(1776);
    let steps = session(&game, &ids);
    let path = temp_log("session");

    let mut authority = Authority::new(game.clone());
    let mut recorder = ReplayRecorder::create(&path, authority.game()).unwrap();
    for (player, message) in &steps {
        let turn = authority.game().turn().0;
        let dispatch = authority.dispatch(player, message.clone());
        recorder.record(turn, player, message, &dispatch).unwrap();
    }
    recorder.flush().unwrap();

    let replay = ReplayPlayer::load(&path).unwrap();
    assert_eq!(replay.entries().len(), steps.len());
    assert!(matches!(
        replay.entries()[0].outcome,
        RecordedOutcome::Rejected { .. }
    ));
    assert!(matches!(
        replay.entries()[1].outcome,
        RecordedOutcome::Accepted { records: 1, .. }
    ));

    let mut fresh = Authority::new(game);
    assert!(replay.verify(&mut fresh).unwrap().is_empty());
    assert_eq!(fresh.game(), authority.game());
    std::fs::remove_file(&path).ok();
}

#[test]
fn replay_against_other_state_is_refused() {
    let Scenario { ids, game } = seeded_scenario(3);
    let path = temp_log("other_state");
    let mut recorder = ReplayRecorder::create(&path, &game).unwrap();
    let mut authority = Authority::new(game);
    let message: Message = HighScoresMessage::query().into();
    let dispatch = authority.dispatch(&ids.p1, message.clone());
    recorder.record(1, &ids.p1, &message, &dispatch).unwrap();
    recorder.flush().unwrap();

    let replay = ReplayPlayer::load(&path).unwrap();
    let mut other = Authority::new(seeded_scenario(4).game);
    let err = replay.verify(&mut other).unwrap_err();
    assert!(err.to_string().contains("Initial state"));
    std::fs::remove_file(&path).ok();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn dispatch_is_deterministic_for_any_seed(seed in any::<u64>()) {
        let Scenario { ids, game } = seeded_scenario(seed);
        let steps = session(&game, &ids);
        let (first, _) = run(game.clone(), &steps);
        let (second, _) = run(game, &steps);
        prop_assert_eq!(first, second);
    }
}
