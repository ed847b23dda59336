// End-to-end walkthrough: intent -> net -> verify -> simulate -> project

use petriflow::{
    // Compiler input
    IntentSpec, IntentStep,
    // Engine entry points
    AutomationGrammar, DagProjector, NetValidator, Simulator,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔄 Petriflow - Linear Workflow Demo");
    println!("===================================");
    println!();

    // 1. Describe the workflow as an intent spec
    let intent = IntentSpec::new("weekly report pipeline")
        .with_description("Fetch the weekly report, email it, then post to slack")
        .with_step(IntentStep::action("fetch", "Fetch the weekly report file"))
        .with_step(IntentStep::action("mail", "Send email with the report").depends_on("fetch"))
        .with_step(IntentStep::action("announce", "Post to slack").depends_on("mail"));

    println!("📋 Intent: {} ({} steps)", intent.name, intent.steps.len());

    // 2. Compile it into a Petri net
    let net = AutomationGrammar::new().compile(&intent)?;
    println!(
        "🕸️  Compiled net {}: {} places, {} transitions, {} arcs",
        net.id,
        net.places.len(),
        net.transitions.len(),
        net.arcs.len()
    );
    println!("🎯 Initial marking: {}", net.initial_marking);
    println!();

    // 3. Verify it statically
    let verification = NetValidator::with_defaults().verify(&net);
    println!(
        "🔍 Verification: {:?} ({} states explored)",
        verification.petri_status, verification.states_explored
    );
    for check in &verification.checks {
        println!("   {:?} {:?}: {}", check.check_type, check.status, check.message);
    }
    println!();

    // 4. Simulate it deterministically (seed 42)
    let simulation = Simulator::with_defaults().simulate(&net);
    println!(
        "▶️  Simulation: {:?} in {} step(s)",
        simulation.status, simulation.steps_executed
    );
    for event in &simulation.trace {
        println!(
            "   #{} {:?} {}",
            event.sequence,
            event.event_type,
            event.transition_id.as_deref().unwrap_or("-")
        );
    }
    println!("🏁 Final marking: {}", simulation.final_marking);
    println!();

    // 5. Project it back onto a task DAG
    let dag = DagProjector::new().project(&net)?;
    println!("🗺️  Task DAG: {} nodes, {} edges", dag.nodes.len(), dag.edges.len());
    for edge in &dag.edges {
        println!("   {} -> {} via {:?}", edge.from, edge.to, edge.places);
    }
    if let Some(root) = &dag.root_node_id {
        println!("🌱 Root task: {}", root);
    }

    Ok(())
}
