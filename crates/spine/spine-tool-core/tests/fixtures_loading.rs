mod common;

use spine_tool::{AnimationRuntime, SkeletonData};
use spine_tool_test_fixtures::{skeletons, symbols};

#[test]
fn every_skeleton_fixture_parses() {
    common::init_tracing();
    for key in skeletons::keys() {
        let json = skeletons::json(&key).unwrap();
        let data = SkeletonData::from_json(&json)
            .unwrap_or_else(|e| panic!("fixture {key} failed to parse: {e}"));
        assert!(data.animation("idle").is_some(), "{key} has no idle");
    }
}

#[test]
fn hero_bones_and_durations() {
    let hero = common::skeleton("hero");
    assert_eq!(hero.animation_duration("attack"), Some(2.0));
    assert_eq!(hero.animation_duration("execute_attack"), Some(1.5));
    let hand = hero.find_bone("hand_r").unwrap();
    assert!((hand.position.x - 65.0).abs() < 1e-4);
    assert!((hand.position.y - 170.0).abs() < 1e-4);
    assert!(hero.find_bone("tail").is_none());
}

#[test]
fn legacy_skin_map_is_accepted() {
    let mut chest = common::skeleton("chest");
    assert!(chest.set_skin("gold").is_ok());
    assert!(chest.set_skin("platinum").is_err());
    assert_eq!(chest.skin(), Some("gold"));
}

#[test]
fn symbol_fixtures_index_valid_entries_only() {
    assert_eq!(symbols::keys(), ["chest", "hero", "victim"]);

    let chest = common::symbol_collection("chest");
    assert_eq!(chest.name, "chest");
    assert_eq!(chest.len(), 3);
    assert!(chest.get("chest_gold").is_none());
    assert_eq!(chest.get("chest_shake").unwrap().custom_speed, 2.0);
    assert_eq!(chest.get("chest_open").unwrap().blend_duration, 0.1);

    let hero = common::symbol_collection("hero");
    let ids: Vec<&str> = hero
        .sorted_by_priority()
        .into_iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(ids, ["hero_execute", "hero_attack", "hero_idle", "hero_taunt"]);
    assert_eq!(hero.by_tag("combat").len(), 2);
    assert!(hero.get("hero_idle").unwrap().is_looping);
    assert!(hero.get("hero_idle").unwrap().can_be_triggered);
    assert_eq!(hero.by_animation("taunt").unwrap().id, "hero_taunt");
}
