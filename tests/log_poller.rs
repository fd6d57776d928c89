// tests/log_poller.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use composewatch::engine::{Clock, LogPoller, Pipeline};
use composewatch_test_utils::{
    ApplicationBuilder, FakeCompose, RecordingSink, eventually, init_tracing, with_timeout,
};

fn stepping_clock(start: u64) -> (Clock, Arc<AtomicU64>) {
    let now = Arc::new(AtomicU64::new(start));
    let source = now.clone();
    (Arc::new(move || source.load(Ordering::SeqCst)), now)
}

#[tokio::test]
async fn each_tick_polls_every_application_since_its_last_poll() {
    init_tracing();
    let pipeline = Arc::new(Pipeline::new());
    let compose = Arc::new(FakeCompose::new().with_logs("web", "GET / 200\n"));
    let sink = Arc::new(RecordingSink::new());
    let apps = vec![
        ApplicationBuilder::new("web").task("client").build(),
        ApplicationBuilder::new("api").task("main").build(),
    ];
    let (clock, now) = stepping_clock(1_700_000_000);

    let mut poller = LogPoller::new(pipeline, apps, compose.clone(), sink.clone()).with_clock(clock);

    poller.tick().await;
    now.store(1_700_000_001, Ordering::SeqCst);
    poller.tick().await;

    assert_eq!(
        compose.log_calls(),
        [
            ("web".to_string(), None),
            ("api".to_string(), None),
            ("web".to_string(), Some(1_700_000_000)),
            ("api".to_string(), Some(1_700_000_000)),
        ]
    );
    assert_eq!(poller.last_polled("web"), Some(1_700_000_001));

    // Empty output is not forwarded.
    let messages = sink.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|(app, text)| app == "web" && text == "GET / 200\n"));
}

#[tokio::test]
async fn polling_loop_runs_on_its_own_cadence_until_halted() {
    let pipeline = Arc::new(Pipeline::new());
    let compose = Arc::new(FakeCompose::new());
    let sink = Arc::new(RecordingSink::new());
    let apps = vec![ApplicationBuilder::new("web").task("client").build()];

    let poller = LogPoller::new(pipeline.clone(), apps, compose.clone(), sink);
    let handle = tokio::spawn(poller.run(Duration::from_millis(10)));

    let observed = compose.clone();
    eventually(|| observed.log_calls().len() >= 2).await;
    let calls = compose.log_calls();
    assert_eq!(calls[0].1, None);
    assert!(calls[1].1.is_some());

    pipeline.halt();
    with_timeout(handle).await.unwrap();
}
