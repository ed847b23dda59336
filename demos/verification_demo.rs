// Verification walkthrough: deadlocks, counter-examples, and bounds

use petriflow::{
    Arc, Marking, NetValidator, PetriNet, Place, Simulator, Transition, ValidationConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Petriflow - Verification Demo");
    println!("================================");
    println!();

    // A net that deadlocks: t_drain needs two tokens, one is available
    let stuck = PetriNet::builder("underfunded drain")
        .add_place(Place::new("p_buffer", "Buffer"))
        .add_place(Place::new("p_done", "Done"))
        .add_transition(Transition::new("t_drain", "Drain the buffer"))
        .add_arc(Arc::with_weight("p_buffer", "t_drain", 2))
        .add_arc(Arc::new("t_drain", "p_done"))
        .initial_tokens("p_buffer", 1)
        .build()?;

    let verification = NetValidator::with_defaults().verify(&stuck);
    println!("🕸️  Net: {}", stuck.name);
    println!("   Status: {:?}", verification.petri_status);
    if let Some(witness) = &verification.counter_example {
        println!("   Counter-example: {}", witness.description);
        println!("   Failing marking: {}", witness.marking);
        println!("   Path from initial: {:?}", witness.path);
    }
    println!();

    // The simulator reports the same marking as a DEADLOCKED outcome
    let simulation = Simulator::with_defaults().simulate(&stuck);
    println!(
        "▶️  Simulation ended {:?} after {} step(s) at {}",
        simulation.status, simulation.steps_executed, simulation.final_marking
    );
    println!();

    // A resource pool with capacity 1 and two competing consumers stays
    // bounded, and both consumers are live
    let pool = PetriNet::builder("capacity-one pool")
        .add_place(Place::new("p_pool", "Pool").with_capacity(1))
        .add_place(Place::new("p_out_a", "Out A"))
        .add_place(Place::new("p_out_b", "Out B"))
        .add_transition(Transition::new("t_take_a", "Consumer A"))
        .add_transition(Transition::new("t_take_b", "Consumer B"))
        .add_arc(Arc::new("p_pool", "t_take_a"))
        .add_arc(Arc::new("p_pool", "t_take_b"))
        .add_arc(Arc::new("t_take_a", "p_out_a"))
        .add_arc(Arc::new("t_take_b", "p_out_b"))
        .initial_tokens("p_pool", 1)
        .build()?;

    let config = ValidationConfig {
        k_bound: 50,
        goal_marking: Some(Marking::single("p_out_a")),
        ..ValidationConfig::default()
    };
    let verification = NetValidator::new(config).verify(&pool);

    println!("🕸️  Net: {}", pool.name);
    println!(
        "   Status: {:?} ({} states explored)",
        verification.petri_status, verification.states_explored
    );
    for check in &verification.checks {
        println!("   {:?} {:?}: {}", check.check_type, check.status, check.message);
    }

    Ok(())
}
