use spine_tool::{
    CallbackResult, DualTrackSynchronizer, EventData, EventDescriptor, EventTarget,
    SimulatedSkeleton, Stage, SyncSettings, TargetType, Vec3,
};
use spine_tool_test_fixtures::skeletons;

struct Executioner;

impl Executioner {
    fn on_impact(&mut self, data: &EventData) -> CallbackResult {
        println!(
            "impact at {:.2}s (damage {})",
            data.track_time, data.int_param
        );
        Ok(())
    }
}

impl EventTarget for Executioner {
    fn target_type() -> TargetType<Self> {
        TargetType::new("Executioner")
            .inject(EventDescriptor::new("execute_attack", "on_impact", 0.5).with_int(999))
            .method_with_event("on_impact", Self::on_impact)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "spine_tool=info".into()))
        .init();

    let mut stage = Stage::default();
    let hero = stage.spawn_skeleton(
        "hero",
        SimulatedSkeleton::from_json(&skeletons::json("hero")?)?,
    );
    let victim = stage.spawn_skeleton(
        "victim",
        SimulatedSkeleton::from_json(&skeletons::json("victim")?)?,
    );
    let hero_node = stage.skeleton_node(hero).ok_or_else(|| anyhow::anyhow!("hero node"))?;
    stage.attach(hero_node, Executioner)?;

    let mut sync = DualTrackSynchronizer::new(
        stage.config(),
        SyncSettings {
            attach_bone: Some("hand_r".into()),
            slave_local_offset: Vec3::new(10.0, -40.0, 0.0),
            ..SyncSettings::default()
        },
    );
    sync.on_started(|master, slave| println!("sync started: {master} + {slave}"));
    sync.on_completed(|done| println!("sync completed: {:?}", done.reason));
    sync.set_master(&mut stage, hero);
    sync.set_slave(victim);
    sync.start_sync(&mut stage, "execute_attack", "execute_victim", false)?;

    let dt = 1.0 / 30.0;
    let mut frame = 0;
    while sync.is_syncing() {
        stage.update(dt);
        for event in &stage.outputs().events {
            println!("frame {frame:3}: {}", serde_json::to_string(event)?);
        }
        sync.update(&mut stage, dt);
        frame += 1;
    }
    Ok(())
}
