//! Example running one goal through the hub with in-process spokes
//!
//! This example shows how to:
//! - Register planner, coder and critic spokes
//! - Build a hub over the in-memory adapter
//! - Run a ticket and inspect the workcell it left behind
//!
//! No LLM is needed; the spokes are plain closures.

use captain_engine::hub::CaptainHub;
use captain_engine::memory::SyncMemoryAdapter;
use captain_engine::registry::{Runner, Spoke, SpokeRegistry};
use sdk::errors::Result;
use sdk::types::{OrchestrationRun, Role, Ticket};
use std::sync::Arc;

struct Template(&'static str);

impl Runner for Template {
    fn run(&self, prompt: &str) -> Result<String> {
        let first_line = prompt.lines().next().unwrap_or_default();
        Ok(format!("{} ({} chars of prompt, starting \"{}\")", self.0, prompt.len(), first_line))
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== Simple Run Example ===\n");

    let registry = Arc::new(SpokeRegistry::new());
    registry.register(Spoke::standard("planner", Role::Planner, 5, Arc::new(Template("1. outline 2. write"))));
    registry.register(Spoke::standard("coder", Role::Coder, 5, Arc::new(Template("fn main() {}"))));
    registry.register(Spoke::standard("critic", Role::Critic, 5, Arc::new(Template("OK"))));
    println!("✓ Registered {} spokes", registry.all().len());

    let memory = Arc::new(SyncMemoryAdapter::in_memory());
    let hub = CaptainHub::builder()
        .router(Arc::clone(&registry) as _)
        .memory(Arc::clone(&memory) as _)
        .build()?;
    println!("✓ Hub ready");

    let ticket = Ticket::new("demo-1", "Write a hello world program")
        .with_deliverables(["main.rs"])
        .with_constraints(["no dependencies"]);
    let result = hub.run_ticket(&OrchestrationRun::new("run-demo"), &ticket)?;

    println!("\nPlan:\n{}\n", result.plan);
    println!("Implementation:\n{}\n", result.implementation);
    println!("Review: {}", result.review);
    println!(
        "\nWorkcell {} collected; {} role space(s) still live",
        result.workcell_space_id,
        memory.live_spaces()
    );

    Ok(())
}
