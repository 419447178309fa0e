mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spine_tool::{
    CompletionReason, DualTrackSynchronizer, ErrorKind, NodeId, SkeletonId, SpineToolError, Stage,
    SyncCompletion, SyncSettings, Vec3,
};

struct Duel {
    stage: Stage,
    hero: SkeletonId,
    victim: SkeletonId,
    sync: DualTrackSynchronizer,
    started: Rc<Cell<u32>>,
    completed: Rc<RefCell<Vec<SyncCompletion>>>,
}

impl Duel {
    fn new(settings: SyncSettings) -> Self {
        common::init_tracing();
        let mut stage = Stage::default();
        let hero = stage.spawn_skeleton("hero", common::skeleton("hero"));
        let victim = stage.spawn_skeleton("victim", common::skeleton("victim"));
        stage
            .controller_mut(hero)
            .unwrap()
            .set_symbols(common::symbol_collection("hero"));
        stage
            .controller_mut(victim)
            .unwrap()
            .set_symbols(common::symbol_collection("victim"));
        let hero_node = stage.skeleton_node(hero).unwrap();
        let victim_node = stage.skeleton_node(victim).unwrap();
        stage
            .scene_mut()
            .set_local_position(hero_node, Vec3::new(100.0, 0.0, 0.0))
            .unwrap();
        stage
            .scene_mut()
            .set_local_position(victim_node, Vec3::new(300.0, 0.0, 0.0))
            .unwrap();

        let mut sync = DualTrackSynchronizer::new(stage.config(), settings);
        let started = Rc::new(Cell::new(0));
        let completed = Rc::new(RefCell::new(Vec::new()));
        {
            let started = started.clone();
            sync.on_started(move |_, _| started.set(started.get() + 1));
            let completed = completed.clone();
            sync.on_completed(move |c| completed.borrow_mut().push(c.clone()));
        }
        sync.set_master(&mut stage, hero);
        sync.set_slave(victim);

        Self {
            stage,
            hero,
            victim,
            sync,
            started,
            completed,
        }
    }

    fn frame(&mut self, dt: f32) -> Option<SyncCompletion> {
        self.stage.update(dt);
        self.sync.update(&mut self.stage, dt)
    }

    fn run(&mut self, frames: usize, dt: f32) {
        for _ in 0..frames {
            self.frame(dt);
        }
    }

    fn node(&self, skeleton: SkeletonId) -> NodeId {
        self.stage.skeleton_node(skeleton).unwrap()
    }

    fn parent_of(&self, skeleton: SkeletonId) -> Option<NodeId> {
        self.stage.scene().node(self.node(skeleton)).unwrap().parent()
    }

    fn world(&self, node: NodeId) -> Vec3 {
        self.stage.scene().world_transform(node).unwrap().position
    }
}

fn near(a: Vec3, b: Vec3) -> bool {
    (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3 && (a.z - b.z).abs() < 1e-3
}

#[test]
fn natural_completion_fires_once_and_releases_the_slave() {
    let mut duel = Duel::new(SyncSettings::default());
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();

    assert!(duel.sync.is_syncing());
    assert_eq!(duel.started.get(), 1);
    assert_eq!(duel.parent_of(duel.victim), Some(duel.node(duel.hero)));
    let victim_scale = duel.stage.scene().node(duel.node(duel.victim)).unwrap().local.scale;
    assert!(victim_scale.x < 0.0);
    assert!((duel.sync.timeout().unwrap() - 1.75).abs() < 1e-6);
    assert_eq!(
        duel.stage.controller(duel.victim).unwrap().current_animation(),
        Some("execute_victim")
    );

    let mut completions = Vec::new();
    for _ in 0..30 {
        if let Some(c) = duel.frame(0.1) {
            completions.push(c);
        }
    }

    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].master_animation, "execute_attack");
    assert_eq!(completions[0].slave_animation, "execute_victim");
    assert_eq!(completions[0].reason, CompletionReason::Natural);
    assert_eq!(*duel.completed.borrow(), completions);
    assert!(!duel.sync.is_syncing());
    assert_eq!(duel.parent_of(duel.victim), None);
    assert!(!duel.stage.diagnostics().has(ErrorKind::SyncTimeout));
}

#[test]
fn released_slave_keeps_its_world_position() {
    let mut duel = Duel::new(SyncSettings {
        slave_local_offset: Vec3::new(40.0, 0.0, 0.0),
        ..SyncSettings::default()
    });
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    let during = duel.world(duel.node(duel.victim));
    assert!(near(during, Vec3::new(140.0, 0.0, 0.0)));

    duel.run(20, 0.1);
    assert_eq!(duel.parent_of(duel.victim), None);
    assert!(near(duel.world(duel.node(duel.victim)), during));
}

#[test]
fn stop_sync_never_raises_completion() {
    let mut duel = Duel::new(SyncSettings::default());
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    duel.run(5, 0.1);

    duel.sync.stop_sync(&mut duel.stage);
    assert!(!duel.sync.is_syncing());
    assert_eq!(duel.parent_of(duel.victim), None);
    assert!(duel.stage.controller(duel.hero).unwrap().current_entry().is_none());
    assert!(duel.stage.controller(duel.victim).unwrap().current_entry().is_none());

    duel.run(30, 0.1);
    assert!(duel.completed.borrow().is_empty());
    assert_eq!(duel.started.get(), 1);

    // A second stop is a no-op.
    duel.sync.stop_sync(&mut duel.stage);
    assert!(duel.completed.borrow().is_empty());
}

#[test]
fn restarting_tears_down_the_previous_session() {
    let mut duel = Duel::new(SyncSettings::default());
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    duel.run(5, 0.1);

    duel.sync
        .start_sync(&mut duel.stage, "taunt", "hit_react", false)
        .unwrap();
    assert_eq!(duel.started.get(), 2);
    assert_eq!(duel.sync.current_master_animation(), Some("taunt"));
    assert_eq!(duel.sync.current_slave_animation(), Some("hit_react"));
    assert_eq!(duel.parent_of(duel.victim), Some(duel.node(duel.hero)));
    assert_eq!(duel.stage.scene().node(duel.node(duel.hero)).unwrap().children().len(), 1);

    duel.run(30, 0.1);
    let completed = duel.completed.borrow();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].master_animation, "taunt");
    assert_eq!(completed[0].reason, CompletionReason::Natural);
}

#[test]
fn replaced_master_animation_falls_back_to_the_timeout() {
    let mut duel = Duel::new(SyncSettings::default());
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    duel.run(3, 0.1);
    duel.stage
        .controller_mut(duel.hero)
        .unwrap()
        .play("idle", true)
        .unwrap();

    let mut completion = None;
    for _ in 0..30 {
        if let Some(c) = duel.frame(0.1) {
            completion = Some(c);
            break;
        }
    }
    let completion = completion.unwrap();
    assert_eq!(completion.reason, CompletionReason::Timeout);
    assert_eq!(duel.stage.diagnostics().count(ErrorKind::SyncTimeout), 1);
    assert!(!duel.sync.is_syncing());
}

#[test]
fn explicit_timeout_overrides_the_animation_length() {
    let mut duel = Duel::new(SyncSettings {
        timeout: Some(0.5),
        ..SyncSettings::default()
    });
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", true)
        .unwrap();
    assert!(duel.sync.is_looping());
    assert_eq!(duel.sync.timeout(), Some(0.5));

    duel.run(4, 0.1);
    assert!(duel.sync.is_syncing());
    duel.run(2, 0.1);
    assert!(!duel.sync.is_syncing());
    assert_eq!(duel.completed.borrow()[0].reason, CompletionReason::Timeout);
}

#[test]
fn slave_rides_the_attach_bone() {
    let mut duel = Duel::new(SyncSettings {
        attach_bone: Some("hand_r".into()),
        ..SyncSettings::default()
    });
    let point = duel.sync.attach_point().unwrap();
    assert_eq!(
        duel.stage.scene().node(point).unwrap().name(),
        "AttachPoint_hand_r"
    );
    assert_eq!(
        duel.stage.scene().node(point).unwrap().parent(),
        Some(duel.node(duel.hero))
    );
    assert!(near(duel.world(point), Vec3::new(165.0, 170.0, 0.0)));

    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    duel.frame(0.1);
    assert_eq!(duel.parent_of(duel.victim), Some(point));
    assert!(near(
        duel.world(duel.node(duel.victim)),
        Vec3::new(165.0, 170.0, 0.0)
    ));

    // The point follows the master when it moves.
    let hero_node = duel.node(duel.hero);
    duel.stage
        .scene_mut()
        .set_local_position(hero_node, Vec3::new(0.0, 0.0, 0.0))
        .unwrap();
    duel.frame(0.1);
    assert!(near(duel.world(point), Vec3::new(65.0, 170.0, 0.0)));
}

#[test]
fn missing_attach_bone_falls_back_to_the_master() {
    let mut duel = Duel::new(SyncSettings::default());
    duel.sync.set_attach_bone(&mut duel.stage, "tail");
    assert!(duel.sync.attach_point().is_none());
    assert_eq!(duel.stage.diagnostics().count(ErrorKind::BoneNotFound), 1);

    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    assert_eq!(duel.parent_of(duel.victim), Some(duel.node(duel.hero)));
}

#[test]
fn retargeting_the_attach_bone_keeps_the_slave() {
    let mut duel = Duel::new(SyncSettings {
        attach_bone: Some("hand_r".into()),
        ..SyncSettings::default()
    });
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    duel.frame(0.1);
    let old_point = duel.sync.attach_point().unwrap();
    let victim_node = duel.node(duel.victim);

    duel.sync.set_attach_bone(&mut duel.stage, "hip");
    duel.frame(0.1);

    let hip = duel.sync.attach_point().unwrap();
    assert_ne!(hip, old_point);
    assert!(!duel.stage.scene().contains_node(old_point));
    assert!(duel.stage.scene().contains_node(victim_node));
    assert!(duel.stage.contains_skeleton(duel.victim));
    assert_eq!(duel.parent_of(duel.victim), Some(hip));
    assert!(near(duel.world(victim_node), Vec3::new(100.0, 120.0, 0.0)));
    assert_eq!(
        duel.stage.controller(duel.victim).unwrap().current_animation(),
        Some("execute_victim")
    );
    assert!(duel.sync.is_syncing());
}

#[test]
fn retargeting_to_a_missing_bone_moves_the_slave_to_the_master() {
    let mut duel = Duel::new(SyncSettings {
        attach_bone: Some("hand_r".into()),
        ..SyncSettings::default()
    });
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    duel.frame(0.1);
    let old_point = duel.sync.attach_point().unwrap();

    duel.sync.set_attach_bone(&mut duel.stage, "tail");
    duel.frame(0.1);

    assert!(duel.sync.attach_point().is_none());
    assert!(!duel.stage.scene().contains_node(old_point));
    assert!(duel.stage.contains_skeleton(duel.victim));
    assert_eq!(duel.parent_of(duel.victim), Some(duel.node(duel.hero)));
    assert!(near(
        duel.world(duel.node(duel.victim)),
        Vec3::new(100.0, 0.0, 0.0)
    ));
    assert_eq!(duel.stage.diagnostics().count(ErrorKind::BoneNotFound), 1);
    assert!(duel.sync.is_syncing());
}

#[test]
fn unparented_slave_is_placed_in_world_space() {
    let mut duel = Duel::new(SyncSettings {
        parent_slave_to_master: false,
        slave_local_offset: Vec3::new(30.0, 0.0, 0.0),
        ..SyncSettings::default()
    });
    let hero_node = duel.node(duel.hero);
    duel.stage
        .scene_mut()
        .set_local_scale(hero_node, Vec3::new(-1.0, 1.0, 1.0))
        .unwrap();

    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    let victim_node = duel.node(duel.victim);
    assert_eq!(duel.parent_of(duel.victim), None);
    assert!(near(duel.world(victim_node), Vec3::new(130.0, 0.0, 0.0)));
    // Faces the opposite way from the master.
    assert_eq!(duel.stage.scene().node(victim_node).unwrap().local.scale.x, 1.0);

    duel.sync
        .set_slave_offset(&mut duel.stage, Vec3::new(-30.0, 5.0, 0.0));
    assert!(near(duel.world(victim_node), Vec3::new(70.0, 5.0, 0.0)));
}

#[test]
fn slave_offset_moves_a_parented_slave() {
    let mut duel = Duel::new(SyncSettings::default());
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    duel.sync
        .set_slave_offset(&mut duel.stage, Vec3::new(25.0, 0.0, 0.0));
    assert_eq!(duel.sync.settings().slave_local_offset, Vec3::new(25.0, 0.0, 0.0));
    assert!(near(
        duel.world(duel.node(duel.victim)),
        Vec3::new(125.0, 0.0, 0.0)
    ));
}

#[test]
fn start_by_symbol_resolves_animations() {
    let mut duel = Duel::new(SyncSettings::default());
    duel.sync
        .start_sync_by_symbol(&mut duel.stage, "hero_execute", "victim_executed", false)
        .unwrap();
    assert_eq!(duel.sync.current_master_animation(), Some("execute_attack"));
    assert_eq!(duel.sync.current_slave_animation(), Some("execute_victim"));

    duel.run(25, 0.1);
    assert_eq!(duel.completed.borrow().len(), 1);
}

#[test]
fn unknown_symbol_or_animation_does_not_start() {
    let mut duel = Duel::new(SyncSettings::default());
    let err = duel
        .sync
        .start_sync_by_symbol(&mut duel.stage, "hero_execute", "victim_backflip", false)
        .unwrap_err();
    assert!(matches!(err, SpineToolError::SymbolNotFound { .. }));

    let err = duel
        .sync
        .start_sync(&mut duel.stage, "execute_attack", "moonwalk", false)
        .unwrap_err();
    assert!(matches!(err, SpineToolError::AnimationNotFound { .. }));

    assert!(!duel.sync.is_syncing());
    assert_eq!(duel.started.get(), 0);
    assert!(duel.stage.controller(duel.hero).unwrap().current_entry().is_none());
    assert_eq!(duel.parent_of(duel.victim), None);
}

#[test]
fn despawned_master_ends_the_session_silently() {
    let mut duel = Duel::new(SyncSettings::default());
    duel.sync
        .start_sync(&mut duel.stage, "execute_attack", "execute_victim", false)
        .unwrap();
    duel.run(3, 0.1);

    let hero_node = duel.node(duel.hero);
    let removed = duel.stage.despawn(hero_node);
    assert_eq!(removed.len(), 2);
    assert!(!duel.stage.contains_skeleton(duel.victim));

    assert!(duel.frame(0.1).is_none());
    assert!(!duel.sync.is_syncing());
    assert!(duel.completed.borrow().is_empty());
    assert!(duel.stage.diagnostics().has(ErrorKind::SyncPartnerMissing));
}
