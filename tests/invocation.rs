//! A promise invocation started on entry must not be able to deliver its
//! `done.invoke` event once the declaring state has been exited.

use std::sync::Arc;

use statechart::actor::{spawn_actor_with_clock, ActorOptions};
use statechart::adapter::from_promise;
use statechart::builder::MachineBuilder;
use statechart::config::MachineConfig;
use statechart::event::Event;
use statechart::machine::{Implementations, Machine};
use statechart::services::testing::{SequentialIdGenerator, VirtualClock};

#[tokio::test(start_paused = true)]
async fn cancel_before_resolution_prevents_the_done_transition() {
    let config: MachineConfig = serde_json::from_str(
        r#"{
            "initial": "working",
            "states": {
                "working": {
                    "invoke": [{ "id": "p0", "src": "worker", "onDone": "success" }],
                    "on": { "CANCEL": "cancelled" }
                },
                "success": {},
                "cancelled": {}
            }
        }"#,
    )
    .unwrap();
    let def = MachineBuilder::from_config(config).build().unwrap();

    let implementations = Implementations::<()>::new().logic(
        "worker",
        from_promise(|_input: serde_json::Value| async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Ok(serde_json::Value::Null)
        }),
    );
    let machine = Machine::new(def, implementations);
    let actor = spawn_actor_with_clock(
        Arc::new(machine),
        ActorOptions { context: (), id: None, parent: None },
        Arc::new(VirtualClock),
        Arc::new(SequentialIdGenerator::default()),
    );
    actor.start();
    assert!(actor.get_snapshot().matches_str("working"));

    tokio::time::advance(std::time::Duration::from_millis(30)).await;
    actor.send(Event::new("CANCEL")).unwrap();
    assert!(actor.get_snapshot().matches_str("cancelled"));

    tokio::time::advance(std::time::Duration::from_millis(170)).await;
    tokio::task::yield_now().await;
    assert!(actor.get_snapshot().matches_str("cancelled"));
}

#[tokio::test(start_paused = true)]
async fn uncancelled_invocation_still_fires_its_done_transition() {
    let config: MachineConfig = serde_json::from_str(
        r#"{
            "initial": "working",
            "states": {
                "working": {
                    "invoke": [{ "id": "p0", "src": "worker", "onDone": "success" }]
                },
                "success": {}
            }
        }"#,
    )
    .unwrap();
    let def = MachineBuilder::from_config(config).build().unwrap();

    let implementations = Implementations::<()>::new().logic(
        "worker",
        from_promise(|_input: serde_json::Value| async move { Ok(serde_json::Value::Null) }),
    );
    let machine = Machine::new(def, implementations);
    let actor = spawn_actor_with_clock(
        Arc::new(machine),
        ActorOptions { context: (), id: None, parent: None },
        Arc::new(VirtualClock),
        Arc::new(SequentialIdGenerator::default()),
    );
    actor.start();

    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert!(actor.get_snapshot().matches_str("success"));
}

#[tokio::test(start_paused = true)]
async fn a_failing_invocation_takes_its_ondone_error_transition() {
    let config: MachineConfig = serde_json::from_str(
        r#"{
            "initial": "working",
            "states": {
                "working": {
                    "invoke": [{ "id": "p0", "src": "worker", "onDone": "success", "onError": "failed" }]
                },
                "success": {},
                "failed": {}
            }
        }"#,
    )
    .unwrap();
    let def = MachineBuilder::from_config(config).build().unwrap();

    let implementations = Implementations::<()>::new().logic(
        "worker",
        from_promise(|_input: serde_json::Value| async move { Err("boom".to_string()) }),
    );
    let machine = Machine::new(def, implementations);
    let actor = spawn_actor_with_clock(
        Arc::new(machine),
        ActorOptions { context: (), id: None, parent: None },
        Arc::new(VirtualClock),
        Arc::new(SequentialIdGenerator::default()),
    );
    actor.start();

    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert!(actor.get_snapshot().matches_str("failed"));
}
