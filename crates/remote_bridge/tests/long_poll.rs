//! End-to-end behaviour of the command and long-poll pipelines against
//! in-process runtimes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use remote_bridge::{Bridge, BridgeConfig, PollOutcome};
use remote_core::{Command, Cursor, RemoteError, RequestContext, RuntimeEvent, Subscription};
use remote_runtime::{EngineRuntime, ObjectGraph, PermissionPolicy, Runtime, RuntimeRegistry};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

fn foo_runtime() -> Arc<EngineRuntime> {
    let graph = ObjectGraph::builder()
        .property("bar", json!(0))
        .method("getBar", |call| {
            let value = call.receiver.get("bar").unwrap_or(Value::Null);
            call.respond(vec![value]);
        })
        .build();
    Arc::new(EngineRuntime::new("foo", graph))
}

fn setup() -> (Arc<Bridge>, Arc<EngineRuntime>) {
    let registry = Arc::new(RuntimeRegistry::new());
    let foo = foo_runtime();
    registry.register(foo.clone());
    let bridge = Arc::new(Bridge::new(registry, BridgeConfig::default()));
    (bridge, foo)
}

fn commands(value: Value) -> Vec<Command> {
    serde_json::from_value(value).unwrap()
}

fn subscriptions(value: Value) -> Vec<Subscription> {
    serde_json::from_value(value).unwrap()
}

fn spawn_poll(
    bridge: &Arc<Bridge>,
    cursor: Cursor,
    subscriptions: Vec<Subscription>,
) -> JoinHandle<Result<PollOutcome, RemoteError>> {
    let bridge = Arc::clone(bridge);
    tokio::spawn(async move {
        bridge
            .poll_events(cursor, subscriptions, &RequestContext::new(), std::future::pending())
            .await
    })
}

async fn poll_now(bridge: &Bridge, cursor: Cursor, subscriptions: Vec<Subscription>) -> PollOutcome {
    bridge
        .poll_events(cursor, subscriptions, &RequestContext::new(), std::future::pending())
        .await
        .unwrap()
}

fn batch_events(outcome: &PollOutcome) -> Vec<RuntimeEvent> {
    outcome
        .batch()
        .map(|batch| batch.events.iter().flat_map(|w| w.events.clone()).collect())
        .unwrap_or_default()
}

fn tick_subscription() -> Vec<Subscription> {
    subscriptions(json!([{ "id": "t", "objPath": "foo", "event": "tick", "callback": true }]))
}

#[tokio::test]
async fn test_set_updates_runtime_without_callbacks() {
    let (bridge, foo) = setup();
    let events = bridge
        .process_commands(
            commands(json!([{ "objPath": "foo.bar", "cmd": "set", "args": 5 }])),
            &RequestContext::new(),
        )
        .await;
    assert!(events.is_empty());
    assert_eq!(serde_json::to_string(&events).unwrap(), "[]");
    assert_eq!(foo.graph().get("bar"), Some(json!(5)));
}

#[tokio::test]
async fn test_set_then_call_observes_value() {
    let (bridge, _foo) = setup();
    let ctx = RequestContext::new();
    bridge
        .process_commands(
            commands(json!([{ "objPath": "foo.bar", "cmd": "set", "args": "hello" }])),
            &ctx,
        )
        .await;
    let events = bridge
        .process_commands(
            commands(json!([{ "id": 1, "objPath": "foo.getBar", "cmd": "call", "callback": true }])),
            &ctx,
        )
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, json!(1));
    assert_eq!(events[0].args, vec![json!("hello")]);
}

#[tokio::test]
async fn test_unknown_runtime_does_not_affect_siblings() {
    let (bridge, foo) = setup();
    let events = bridge
        .process_commands(
            commands(json!([
                { "id": 1, "objPath": "ghost.bar", "cmd": "set", "args": 1, "callback": true },
                { "id": 2, "objPath": "foo.bar", "cmd": "set", "args": 2, "callback": true }
            ])),
            &RequestContext::new(),
        )
        .await;
    let ids: Vec<Value> = events.into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![json!(2)]);
    assert_eq!(foo.graph().get("bar"), Some(json!(2)));
}

#[tokio::test(start_paused = true)]
async fn test_live_event_flushed_after_linger() {
    let (bridge, foo) = setup();
    let start = Instant::now();

    let poll = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .poll_events(
                    Cursor::now(),
                    tick_subscription(),
                    &RequestContext::new(),
                    std::future::pending(),
                )
                .await
        }
    });

    time::sleep(Duration::from_millis(5)).await;
    let emitted = foo.emit("tick", json!({ "n": 1 }));

    let outcome = poll.await.unwrap().unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(10), "flushed early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(20), "flushed late: {elapsed:?}");

    let PollOutcome::Flushed(batch) = outcome else {
        panic!("expected linger flush, got {outcome:?}");
    };
    assert_eq!(batch.ts, emitted.ts);
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.events[0].id, json!("t"));
    assert_eq!(batch.events[0].events, vec![emitted]);
    assert_eq!(foo.events().listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_history_answers_immediately() {
    let (bridge, foo) = setup();
    let first = foo.emit("tick", json!(1));
    let second = foo.emit("tick", json!(2));
    foo.emit("other", json!(3));

    let start = Instant::now();
    let outcome = bridge
        .poll_events(
            Cursor::from_millis(0),
            tick_subscription(),
            &RequestContext::new(),
            std::future::pending(),
        )
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);

    let PollOutcome::Immediate(batch) = outcome else {
        panic!("expected immediate flush, got {outcome:?}");
    };
    assert!(batch.ts >= second.ts);
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.events[0].events, vec![first, second]);
    assert_eq!(foo.events().listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_poll_times_out_empty() {
    let (bridge, foo) = setup();
    let start = Instant::now();
    let outcome = bridge
        .poll_events(
            Cursor::now(),
            tick_subscription(),
            &RequestContext::new(),
            std::future::pending(),
        )
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_secs(60));
    let PollOutcome::TimedOut(batch) = outcome else {
        panic!("expected timeout flush, got {outcome:?}");
    };
    assert!(batch.is_empty());
    assert_eq!(serde_json::to_value(&batch).unwrap()["events"], json!([]));
    assert_eq!(foo.events().listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_and_removes_listener() {
    let (bridge, foo) = setup();
    let (hangup, hung_up) = oneshot::channel::<()>();

    let poll = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .poll_events(
                    Cursor::now(),
                    tick_subscription(),
                    &RequestContext::new(),
                    async move {
                        let _ = hung_up.await;
                    },
                )
                .await
        }
    });

    time::sleep(Duration::from_millis(20)).await;
    assert_eq!(foo.events().listener_count(), 1);
    hangup.send(()).unwrap();

    let outcome = poll.await.unwrap().unwrap();
    assert_eq!(outcome, PollOutcome::Cancelled);
    assert!(outcome.batch().is_none());
    assert_eq!(foo.events().listener_count(), 0);
    assert_eq!(bridge.aggregator().open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_poll_removes_listener() {
    let (bridge, foo) = setup();
    let poll = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .poll_events(
                    Cursor::now(),
                    tick_subscription(),
                    &RequestContext::new(),
                    std::future::pending(),
                )
                .await
        }
    });

    time::sleep(Duration::from_millis(20)).await;
    assert_eq!(foo.events().listener_count(), 1);
    poll.abort();
    assert!(poll.await.unwrap_err().is_cancelled());
    assert_eq!(foo.events().listener_count(), 0);
    assert_eq!(bridge.aggregator().open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_callbackless_subscriptions_skip_permission_check() {
    let checks = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(RuntimeRegistry::new());
    let counted = Arc::clone(&checks);
    let foo = Arc::new(
        EngineRuntime::new("foo", ObjectGraph::builder().build()).with_policy(
            PermissionPolicy::from_fn(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                true
            }),
        ),
    );
    registry.register(foo.clone());
    let bridge = Bridge::new(registry, BridgeConfig::default());

    foo.emit("tick", json!(1));
    let outcome = bridge
        .poll_events(
            Cursor::from_millis(0),
            subscriptions(json!([
                { "id": 1, "objPath": "foo", "event": "tick", "callback": false },
                { "id": 2, "objPath": "foo", "event": "tick", "callback": true },
                { "id": 3, "objPath": "foo", "event": "tick" }
            ])),
            &RequestContext::new(),
            std::future::pending(),
        )
        .await
        .unwrap();

    assert_eq!(checks.load(Ordering::SeqCst), 1);
    let batch = outcome.into_batch().unwrap();
    let ids: Vec<Value> = batch.events.iter().map(|w| w.id.clone()).collect();
    assert_eq!(ids, vec![json!(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_denied_runtime_is_silently_skipped() {
    let registry = Arc::new(RuntimeRegistry::new());
    let open = foo_runtime();
    let locked = Arc::new(
        EngineRuntime::new("locked", ObjectGraph::builder().build())
            .with_policy(PermissionPolicy::deny_all()),
    );
    registry.register(open.clone());
    registry.register(locked.clone());
    let bridge = Bridge::new(registry, BridgeConfig::default());

    open.emit("tick", json!("open"));
    locked.emit("tick", json!("locked"));

    let outcome = bridge
        .poll_events(
            Cursor::from_millis(0),
            subscriptions(json!([
                { "id": "a", "objPath": "locked", "event": "tick", "callback": true },
                { "id": "b", "objPath": "foo", "event": "tick", "callback": true },
                { "id": "c", "objPath": "ghost", "event": "tick", "callback": true }
            ])),
            &RequestContext::new(),
            std::future::pending(),
        )
        .await
        .unwrap();

    let batch = outcome.into_batch().unwrap();
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.events[0].id, json!("b"));
    assert_eq!(batch.events[0].events[0].data, json!("open"));
}

#[tokio::test(start_paused = true)]
async fn test_every_wrapper_carries_events() {
    let (bridge, foo) = setup();
    let poll = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .poll_events(
                    Cursor::now(),
                    subscriptions(json!([
                        { "id": 1, "objPath": "foo", "event": "tick", "callback": true },
                        { "id": 2, "objPath": "foo", "event": "score", "callback": true },
                        { "id": 3, "objPath": "foo", "event": "never", "callback": true }
                    ])),
                    &RequestContext::new(),
                    std::future::pending(),
                )
                .await
        }
    });

    time::sleep(Duration::from_millis(1)).await;
    foo.emit("tick", json!(1));
    foo.emit("score", json!(2));
    foo.emit("tick", json!(3));

    let batch = poll.await.unwrap().unwrap().into_batch().unwrap();
    assert_eq!(batch.events.len(), 2);
    assert!(batch.events.iter().all(|w| !w.events.is_empty()));
    let ticks = batch.events.iter().find(|w| w.id == json!(1)).unwrap();
    assert_eq!(ticks.events.len(), 2);
    assert_eq!(foo.events().listener_count(), 0);
}

// ── Cursor hand-off between consecutive polls ──────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_event_at_deadline_reported_exactly_once() {
    let (bridge, foo) = setup();
    let poll = spawn_poll(&bridge, Cursor::now(), tick_subscription());

    time::sleep(Duration::from_secs(60)).await;
    let emitted = foo.emit("tick", json!("edge"));

    let outcome = poll.await.unwrap().unwrap();
    let PollOutcome::TimedOut(batch) = &outcome else {
        panic!("expected timeout flush, got {outcome:?}");
    };
    let in_batch = batch_events(&outcome)
        .into_iter()
        .filter(|e| *e == emitted)
        .count();
    let next = foo.events().pull("tick", batch.ts);
    assert_eq!(in_batch + next.len(), 1);
    assert_eq!(foo.events().listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_linger_cursor_hands_off_without_gaps() {
    let (bridge, foo) = setup();
    let poll = spawn_poll(&bridge, Cursor::now(), tick_subscription());
    time::sleep(Duration::from_millis(1)).await;
    let first = foo.emit("tick", json!(1));
    let outcome = poll.await.unwrap().unwrap();
    assert!(matches!(outcome, PollOutcome::Flushed(_)));
    assert_eq!(batch_events(&outcome), vec![first]);

    let second = foo.emit("tick", json!(2));
    let cursor = outcome.batch().unwrap().ts;
    let next = poll_now(&bridge, cursor, tick_subscription()).await;
    assert!(matches!(next, PollOutcome::Immediate(_)));
    assert_eq!(batch_events(&next), vec![second]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_cursor_hands_off_without_gaps() {
    let (bridge, foo) = setup();
    let outcome = poll_now(&bridge, Cursor::now(), tick_subscription()).await;
    assert!(matches!(outcome, PollOutcome::TimedOut(_)));

    let late = foo.emit("tick", json!("late"));
    let cursor = outcome.batch().unwrap().ts;
    let next = poll_now(&bridge, cursor, tick_subscription()).await;
    assert_eq!(batch_events(&next), vec![late]);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_cursor_hands_off_without_gaps() {
    let (bridge, foo) = setup();
    let first = foo.emit("tick", json!(1));
    let outcome = poll_now(&bridge, Cursor::from_millis(0), tick_subscription()).await;
    assert!(matches!(outcome, PollOutcome::Immediate(_)));
    assert_eq!(batch_events(&outcome), vec![first]);

    let second = foo.emit("tick", json!(2));
    let cursor = outcome.batch().unwrap().ts;
    let next = poll_now(&bridge, cursor, tick_subscription()).await;
    assert_eq!(batch_events(&next), vec![second]);
}

#[tokio::test(start_paused = true)]
async fn test_burst_on_one_runtime_does_not_hide_another() {
    let registry = Arc::new(RuntimeRegistry::new());
    let a = Arc::new(EngineRuntime::new("a", ObjectGraph::builder().build()));
    let b = Arc::new(EngineRuntime::new("b", ObjectGraph::builder().build()));
    registry.register(a.clone());
    registry.register(b.clone());
    let bridge = Arc::new(Bridge::new(registry, BridgeConfig::default()));
    let subs = || {
        subscriptions(json!([
            { "id": "a", "objPath": "a", "event": "tick", "callback": true },
            { "id": "b", "objPath": "b", "event": "tick", "callback": true }
        ]))
    };

    let poll = spawn_poll(&bridge, Cursor::now(), subs());
    time::sleep(Duration::from_millis(1)).await;
    let burst: Vec<RuntimeEvent> = (0..50).map(|i| a.emit("tick", json!(i))).collect();
    let outcome = poll.await.unwrap().unwrap();
    assert_eq!(batch_events(&outcome), burst);

    let late = b.emit("tick", json!("late"));
    let cursor = outcome.batch().unwrap().ts;
    assert_eq!(b.events().pull("tick", cursor), vec![late.clone()]);

    let next = poll_now(&bridge, cursor, subs()).await;
    assert_eq!(batch_events(&next), vec![late]);
}
