//! Game-logic worldtests over the canonical scenario.

use proptest::prelude::*;
use tradewind_core::{Change, GameOption, Goods, OptionGroup, OptionValue};
use tradewind_testkit::{assert_unchanged, scenario, seeded_scenario, Scenario};
use tradewind_world::{
    GameLogic, LookupError, RuleError, Settlement, SpeakResult, StandardRules, Unit,
    MAP_GENERATOR_OPTIONS,
};

fn cotton(amount: u32) -> Vec<Goods> {
    vec![Goods::new("model.goods.cotton", amount)]
}

#[test]
fn loot_moves_cargo_and_records_transfer() {
    let Scenario { ids, mut game } = scenario();
    let delta = StandardRules
        .loot_cargo(&mut game, &ids.p1, &ids.u1, &ids.u2, &cotton(100))
        .unwrap();

    assert_eq!(delta.len(), 1);
    let record = delta.records().next().unwrap();
    assert_eq!(record.references(), vec![&ids.u1, &ids.u2]);
    assert!(matches!(&record.change, Change::TransferGoods { goods, .. } if goods == &cotton(100)));

    let u1: &Unit = game.get_object(&ids.u1).unwrap();
    let u2: &Unit = game.get_object(&ids.u2).unwrap();
    assert_eq!(u1.cargo, cotton(100));
    assert!(u2.cargo.is_empty());

    assert_eq!(delta.visible_to(&ids.p1).len(), 1);
    assert_eq!(delta.visible_to(&ids.p2).len(), 1);
    assert!(delta.visible_to(&ids.admin).is_empty());
}

#[test]
fn loot_by_non_owner_leaves_state_untouched() {
    let Scenario { ids, mut game } = scenario();
    let before = game.clone();
    let err = StandardRules
        .loot_cargo(&mut game, &ids.p2, &ids.u1, &ids.u2, &cotton(100))
        .unwrap_err();
    assert!(matches!(err, RuleError::Lookup(LookupError::NotOwned { .. })));
    assert_unchanged(&before, &game).unwrap();
}

#[test]
fn loot_checks_availability_and_capacity() {
    let Scenario { ids, mut game } = scenario();
    let err = StandardRules
        .loot_cargo(&mut game, &ids.p1, &ids.u1, &ids.u2, &cotton(150))
        .unwrap_err();
    assert!(matches!(err, RuleError::GoodsUnavailable { amount: 150, .. }));

    game.get_object_mut::<Unit>(&ids.u2).unwrap().cargo = cotton(300);
    let before = game.clone();
    let err = StandardRules
        .loot_cargo(&mut game, &ids.p1, &ids.u1, &ids.u2, &cotton(300))
        .unwrap_err();
    assert_eq!(
        err,
        RuleError::NoCapacity {
            unit: ids.u1.clone(),
            needed: 3,
            holds: 2,
        }
    );
    assert_unchanged(&before, &game).unwrap();
}

#[test]
fn loot_rejects_duplicate_amounts_that_overflow() {
    let Scenario { ids, mut game } = scenario();
    let before = game.clone();
    let requested = vec![
        Goods::new("model.goods.cotton", 1 << 31),
        Goods::new("model.goods.cotton", (1 << 31) + 50),
    ];
    let err = StandardRules
        .loot_cargo(&mut game, &ids.p1, &ids.u1, &ids.u2, &requested)
        .unwrap_err();
    assert_eq!(
        err,
        RuleError::GoodsOverflow {
            unit: ids.u1.clone(),
            goods_type: "model.goods.cotton".to_string(),
        }
    );
    assert_unchanged(&before, &game).unwrap();
}

#[test]
fn unit_can_not_loot_itself() {
    let Scenario { ids, mut game } = scenario();
    game.get_object_mut::<Unit>(&ids.u1).unwrap().cargo = cotton(100);
    let before = game.clone();
    let err = StandardRules
        .loot_cargo(&mut game, &ids.p1, &ids.u1, &ids.u1, &cotton(100))
        .unwrap_err();
    assert_eq!(err, RuleError::SelfLoot(ids.u1.clone()));
    assert_unchanged(&before, &game).unwrap();
    assert_eq!(game.get_object::<Unit>(&ids.u1).unwrap().cargo, cotton(100));
}

#[test]
fn loot_from_sunk_loser_uses_stash() {
    let Scenario { ids, mut game } = scenario();
    game.destroy_unit(&ids.u2).unwrap();

    let delta = StandardRules
        .loot_cargo(&mut game, &ids.p1, &ids.u1, &ids.u2, &cotton(60))
        .unwrap();
    assert_eq!(delta.visible_to(&ids.p2).len(), 1);
    assert_eq!(game.stashed_loot(&ids.u2).unwrap().goods, cotton(40));

    StandardRules
        .loot_cargo(&mut game, &ids.p1, &ids.u1, &ids.u2, &cotton(40))
        .unwrap();
    assert!(game.stashed_loot(&ids.u2).is_none());
    assert_eq!(
        StandardRules.loot_cargo(&mut game, &ids.p1, &ids.u1, &ids.u2, &cotton(1)),
        Err(RuleError::NoLootSource(ids.u2.clone()))
    );
}

#[test]
fn speaking_twice_yields_nothing() {
    let Scenario { ids, mut game } = scenario();
    let first = StandardRules
        .scout_speak_to_chief(&mut game, &ids.p1, &ids.u4, &ids.s1)
        .unwrap();
    let s1: &Settlement = game.get_object(&ids.s1).unwrap();
    assert!(s1.has_spoken_to(&ids.p1));
    assert!(!first.delta.is_empty());

    if first.result == SpeakResult::Die {
        assert!(game.get_object::<Unit>(&ids.u4).is_err());
        return;
    }
    assert_eq!(game.get_object::<Unit>(&ids.u4).unwrap().moves_left, 0);

    game.advance_turn(3);
    let second = StandardRules
        .scout_speak_to_chief(&mut game, &ids.p1, &ids.u4, &ids.s1)
        .unwrap();
    assert_eq!(second.result, SpeakResult::Nothing);
}

#[test]
fn map_generator_merge_replaces_authoritative_tree() {
    let Scenario { mut game, .. } = scenario();
    let incoming = OptionGroup::new(MAP_GENERATOR_OPTIONS)
        .with_option(GameOption::integer("model.option.landMass", 60, 0, 100));
    let merged = StandardRules
        .update_map_generator_options(&mut game, &incoming)
        .unwrap();
    assert_eq!(&merged, game.map_generator_options());
    assert_eq!(
        merged.get("model.option.landMass").unwrap().value,
        OptionValue::Integer(60)
    );

    let before = game.clone();
    let bogus = OptionGroup::new(MAP_GENERATOR_OPTIONS)
        .with_option(GameOption::boolean("model.option.unknown", true));
    assert!(matches!(
        StandardRules.update_map_generator_options(&mut game, &bogus),
        Err(RuleError::Merge(_))
    ));
    assert_unchanged(&before, &game).unwrap();
}

proptest! {
    #[test]
    fn speak_to_chief_is_deterministic(seed in any::<u64>()) {
        let Scenario { ids, game } = seeded_scenario(seed);
        let mut a = game.clone();
        let mut b = game;
        let left = StandardRules.scout_speak_to_chief(&mut a, &ids.p1, &ids.u4, &ids.s1).unwrap();
        let right = StandardRules.scout_speak_to_chief(&mut b, &ids.p1, &ids.u4, &ids.s1).unwrap();
        prop_assert_eq!(left, right);
        prop_assert_eq!(a, b);
    }
}
