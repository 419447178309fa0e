#![allow(dead_code)]

use std::rc::Rc;

use spine_tool::{SimulatedSkeleton, SymbolCollection};
use spine_tool_test_fixtures::{skeletons, symbols};

pub fn init_tracing() {
    let default_filter = "spine_tool=debug";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn skeleton(name: &str) -> SimulatedSkeleton {
    let json = skeletons::json(name).expect("skeleton fixture");
    SimulatedSkeleton::from_json(&json).expect("skeleton fixture should parse")
}

pub fn symbol_collection(name: &str) -> Rc<SymbolCollection> {
    let json = symbols::json(name).expect("symbol fixture");
    Rc::new(SymbolCollection::from_json(&json).expect("symbol fixture should parse"))
}
