// tests/image_and_restart.rs

use std::sync::Arc;
use std::time::Duration;

use composewatch::engine::{ImageScheduler, Pipeline, RestartScheduler, TickOutcome};
use composewatch_test_utils::{
    ApplicationBuilder, FakeCompose, FakeImageBuilder, RecordingReporter, composition, eventually,
    image_item, init_tracing, with_timeout,
};

fn image_scheduler(
    pipeline: &Arc<Pipeline>,
    builder: &Arc<FakeImageBuilder>,
    reporter: &Arc<RecordingReporter>,
) -> ImageScheduler {
    ImageScheduler::new(
        pipeline.clone(),
        builder.clone(),
        composition("docker"),
        reporter.clone(),
    )
}

#[tokio::test]
async fn image_wave_dedupes_and_requests_one_restart() {
    init_tracing();
    let pipeline = Arc::new(Pipeline::new());
    let builder = Arc::new(FakeImageBuilder::new());
    let reporter = Arc::new(RecordingReporter::new());
    let scheduler = image_scheduler(&pipeline, &builder, &reporter);

    let web = ApplicationBuilder::new("web").task("client").build();
    let api = ApplicationBuilder::new("api").task("main").build();
    pipeline.order_image(image_item(&web));
    pipeline.order_image(image_item(&api));
    pipeline.order_image(image_item(&web));

    assert_eq!(
        scheduler.tick().await,
        TickOutcome::Drained { processed: 3, failed: 0 }
    );
    assert_eq!(builder.built(), ["docker_web", "docker_api"]);
    assert_eq!(pipeline.restart_queue().len(), 1);
    assert!(pipeline.image_queue().is_locked());
}

#[tokio::test]
async fn locked_image_queue_is_left_alone() {
    let pipeline = Arc::new(Pipeline::new());
    let builder = Arc::new(FakeImageBuilder::new());
    let reporter = Arc::new(RecordingReporter::new());
    let scheduler = image_scheduler(&pipeline, &builder, &reporter);

    let web = ApplicationBuilder::new("web").task("client").build();
    pipeline.image_queue().lock();
    pipeline.order_image(image_item(&web));

    assert_eq!(scheduler.tick().await, TickOutcome::Locked);
    assert_eq!(pipeline.image_queue().len(), 1);
    assert!(builder.built().is_empty());
}

#[tokio::test]
async fn failed_image_suppresses_restart() {
    let pipeline = Arc::new(Pipeline::new());
    let builder = Arc::new(FakeImageBuilder::new().failing_on("api"));
    let reporter = Arc::new(RecordingReporter::new());
    let scheduler = image_scheduler(&pipeline, &builder, &reporter);

    let web = ApplicationBuilder::new("web").task("client").build();
    let api = ApplicationBuilder::new("api").task("main").build();
    pipeline.order_image(image_item(&web));
    pipeline.order_image(image_item(&api));

    assert_eq!(
        scheduler.tick().await,
        TickOutcome::Drained { processed: 2, failed: 1 }
    );
    assert_eq!(reporter.failed_images(), ["api"]);
    assert!(pipeline.restart_queue().is_empty());
}

#[tokio::test]
async fn many_triggers_cause_one_up() {
    let pipeline = Arc::new(Pipeline::new());
    let compose = Arc::new(FakeCompose::new());
    let scheduler = RestartScheduler::new(pipeline.clone(), compose.clone());

    for _ in 0..5 {
        pipeline.order_restart();
    }

    assert_eq!(
        scheduler.tick().await,
        TickOutcome::Drained { processed: 5, failed: 0 }
    );
    assert_eq!(compose.up_count(), 1);

    assert_eq!(scheduler.tick().await, TickOutcome::Idle);
    assert_eq!(compose.up_count(), 1);
}

#[tokio::test]
async fn failed_up_is_not_retried_and_loop_keeps_running() {
    init_tracing();
    let pipeline = Arc::new(Pipeline::new());
    let compose = Arc::new(FakeCompose::new().failing_up());
    let scheduler = RestartScheduler::new(pipeline.clone(), compose.clone());

    let handle = tokio::spawn(scheduler.run(Duration::from_millis(10)));

    pipeline.order_restart();
    let observed = compose.clone();
    eventually(|| observed.up_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(compose.up_count(), 1);
    assert!(pipeline.restart_queue().is_empty());

    pipeline.order_restart();
    let observed = compose.clone();
    eventually(|| observed.up_count() == 2).await;

    pipeline.halt();
    with_timeout(handle).await.unwrap();
}
