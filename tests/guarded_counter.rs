//! A guard that stops firing once its context-derived condition goes
//! false, without producing a build or runtime error.

use std::sync::Arc;

use statechart::actor::{spawn_actor, ActorOptions};
use statechart::builder::MachineBuilder;
use statechart::config::MachineConfig;
use statechart::event::Event;
use statechart::machine::{Implementations, Machine};

#[derive(Clone, Default)]
struct Counter {
    count: i32,
}

#[tokio::test]
async fn guard_stops_incrementing_once_count_reaches_three() {
    let config: MachineConfig = serde_json::from_str(
        r#"{
            "states": {},
            "on": {
                "INC": { "target": null, "guard": "underLimit", "actions": ["increment"] }
            }
        }"#,
    )
    .unwrap();
    let def = MachineBuilder::from_config(config).build().unwrap();

    let implementations = Implementations::<Counter>::new()
        .guard("underLimit", |ctx: &Counter, _event| ctx.count < 3)
        .action("increment", |ctx, _event| ctx.count += 1);

    let machine = Machine::new(def, implementations);
    let actor = spawn_actor(
        Arc::new(machine),
        ActorOptions { context: Counter::default(), id: None, parent: None },
    );
    actor.start();

    let mut counts = Vec::new();
    for _ in 0..4 {
        actor.send(Event::new("INC")).unwrap();
        counts.push(actor.get_snapshot().context.count);
    }

    assert_eq!(counts, vec![1, 2, 3, 3]);
}
