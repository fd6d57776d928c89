// tests/project_loading.rs

use std::path::Path;
use std::sync::Arc;

use composewatch::config::{DEFAULT_DESTINATION_FOLDER, Settings, Timing};
use composewatch::errors::ComposeWatchError;
use composewatch::project::{Collaborators, Project};
use composewatch_test_utils::{
    FakeCompose, FakeImageBuilder, FakeRunner, RecordingReporter, init_tracing,
};

const COMPOSE: &str = r#"
services:
  web:
    build:
      context: ../web
      dockerfile: Dockerfile
  cache:
    build: ../cache
  api:
    build:
      context: ../api
      dockerfile: docker/Dockerfile.dev
  db:
    image: postgres:16
"#;

const WEB_MANIFEST: &str = r#"
[[task]]
folder = "client"
cmd = "npm run build"
install = "npm ci"

[[task]]
folder = "server"
cmd = "npm run build:server"
rebuild_image = false
"#;

const API_MANIFEST: &str = r#"
[[task]]
cmd = "cargo build"
"#;

fn layout(root: &Path, with_api_manifest: bool) -> Settings {
    std::fs::create_dir_all(root.join("shop")).unwrap();
    std::fs::create_dir_all(root.join("web")).unwrap();
    std::fs::create_dir_all(root.join("api")).unwrap();
    std::fs::write(root.join("shop/docker-compose.yml"), COMPOSE).unwrap();
    std::fs::write(root.join("web/application.toml"), WEB_MANIFEST).unwrap();
    if with_api_manifest {
        std::fs::write(root.join("api/application.toml"), API_MANIFEST).unwrap();
    }

    Settings {
        name: "shop".to_string(),
        compose_file: root.join("shop/docker-compose.yml"),
        destination_folder: DEFAULT_DESTINATION_FOLDER.to_string(),
        temporary_folder: root.join("tmp"),
        compose_program: "docker-compose".to_string(),
        docker_program: "docker".to_string(),
        production: false,
        timing: Timing::default(),
    }
}

struct Fakes {
    runner: Arc<FakeRunner>,
    images: Arc<FakeImageBuilder>,
    compose: Arc<FakeCompose>,
    collaborators: Collaborators,
}

fn fakes(images: FakeImageBuilder) -> Fakes {
    let runner = Arc::new(FakeRunner::new());
    let images = Arc::new(images);
    let compose = Arc::new(FakeCompose::new());
    let collaborators = Collaborators {
        builder: runner.clone(),
        images: images.clone(),
        compose: compose.clone(),
        reporter: Arc::new(RecordingReporter::new()),
    };
    Fakes {
        runner,
        images,
        compose,
        collaborators,
    }
}

#[test]
fn locally_built_services_become_applications() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::load(layout(dir.path(), true)).unwrap();

    // `cache` uses the short build form and has no manifest; it is skipped.
    let names: Vec<&str> = project.applications().iter().map(|a| a.name()).collect();
    assert_eq!(names, ["api", "web"]);
    assert!(project.application("cache").is_none());
    assert_eq!(project.composition().image_prefix(), "shop");

    let web = project.application("web").unwrap();
    let tasks: Vec<&str> = web.tasks().iter().map(|t| t.name()).collect();
    assert_eq!(tasks, ["client", "server"]);
    assert!(web.dockerfile().unwrap().ends_with("web/Dockerfile"));

    let api = project.application("api").unwrap();
    assert!(api.dockerfile().unwrap().ends_with("api/docker/Dockerfile.dev"));
    assert_eq!(api.tasks()[0].name(), "main");
}

#[test]
fn missing_manifest_names_the_expected_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = Project::load(layout(dir.path(), false)).unwrap_err();

    match err {
        ComposeWatchError::ApplicationNotFound(path) => {
            assert!(path.ends_with("api/application.toml"));
        }
        other => panic!("expected ApplicationNotFound, got {other:?}"),
    }
}

#[test]
fn build_params_write_into_the_project_log_folder() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::load(layout(dir.path(), true)).unwrap();
    let web = project.application("web").unwrap();

    let params = project.build_params(web);
    let stream = params.output.unwrap();
    assert_eq!(
        stream.path().unwrap(),
        dir.path().join("tmp/shop/web/log/output")
    );
    assert_eq!(params.temporary_sub_folder.as_deref(), Some("shop/#APPLICATION_NAME#/"));
}

#[tokio::test]
async fn one_shot_build_builds_every_task_and_image() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let project = Project::load(layout(dir.path(), true)).unwrap();
    let f = fakes(FakeImageBuilder::new());

    project.build_all(&f.collaborators, true).await.unwrap();

    let mut started = f.runner.started();
    started.sort();
    assert_eq!(started, ["api:main", "web:client", "web:server"]);

    let mut built = f.images.built();
    built.sort();
    assert_eq!(built, ["shop_api", "shop_web"]);

    let mut pushed = f.images.pushed();
    pushed.sort();
    assert_eq!(pushed, ["shop_api", "shop_web"]);

    assert!(project.pipeline().restart_queue().is_empty());
    assert_eq!(f.compose.up_count(), 0);
}

#[tokio::test]
async fn one_shot_build_fails_on_image_failure() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::load(layout(dir.path(), true)).unwrap();
    let f = fakes(FakeImageBuilder::new().failing_on("web"));

    let err = project.build_all(&f.collaborators, true).await.unwrap_err();

    assert!(err.to_string().contains("image build"));
    assert!(f.images.pushed().is_empty());
}
