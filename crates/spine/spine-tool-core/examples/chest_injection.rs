use std::rc::Rc;

use spine_tool::{
    CallbackResult, EventData, EventDescriptor, EventTarget, Listener, SimulatedSkeleton,
    SymbolCollection, Stage, TargetType, NATIVE_EVENT_METHOD,
};
use spine_tool_test_fixtures::{skeletons, symbols};

#[derive(Default)]
struct Loot {
    coins: i32,
}

impl Loot {
    fn spill(&mut self, data: &EventData) -> CallbackResult {
        self.coins += data.int_param;
        Ok(())
    }

    fn on_spine_event(&mut self, data: &EventData) -> CallbackResult {
        println!("  tool event '{}' at {:.2}", data.event_name, data.normalized_time);
        Ok(())
    }
}

impl EventTarget for Loot {
    fn target_type() -> TargetType<Self> {
        TargetType::new("Loot")
            .inject(EventDescriptor::new("open", "spill", 0.9).with_int(25))
            .method_with_event("spill", Self::spill)
            .method_with_event(NATIVE_EVENT_METHOD, Self::on_spine_event)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "spine_tool=debug".into()))
        .init();

    let mut stage = Stage::default();
    let chest = stage.spawn_skeleton(
        "chest",
        SimulatedSkeleton::from_json(&skeletons::json("chest")?)?,
    );
    let node = stage.skeleton_node(chest).ok_or_else(|| anyhow::anyhow!("chest node"))?;
    let loot = stage.attach(node, Loot::default())?;

    let controller = stage.try_controller_mut(chest)?;
    controller.set_symbols(Rc::new(SymbolCollection::from_json(&symbols::json("chest")?)?));
    let shout: Listener = Rc::new(|data: &EventData| -> CallbackResult {
        println!("  listener: {} x{}", data.string_param, data.int_param);
        Ok(())
    });
    controller.add_event_listener("coin_burst", shout);
    controller.play_symbol("chest_open", false)?;

    for frame in 0..40 {
        stage.update(1.0 / 30.0);
        let fired = stage.outputs().fired(chest);
        if !fired.is_empty() {
            println!("frame {frame}: fired {fired:?}");
        }
    }

    let coins = stage.scene().get::<Loot>(loot).map_or(0, |l| l.coins);
    println!("coins spilled: {coins}");
    for event in stage.try_controller_mut(chest)?.injector().registered_events() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
