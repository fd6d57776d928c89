// src/project/mod.rs

//! The orchestrated project: applications discovered from the compose file,
//! their build contexts and output streams, and the [`Project`] value that
//! owns the pipeline for the whole run.

pub mod application;
pub mod backend;
pub mod context;
pub mod streams;
pub mod template;

use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use application::{Application, InstallStep, Task};
pub use backend::{AfterBuildHook, BuildBackend, CommandBackend, CommandHook, TaskParameters};
pub use context::{BuildContext, BuildParams};
pub use streams::{LogSink, LogStream, OutputStreams};

use crate::compose::{Composition, DockerCompose, DockerImageBuilder};
use crate::config::{APPLICATION_MANIFEST, Settings, load_manifest};
use crate::engine::{
    BuildItem, BuildScheduler, FailureReporter, ImageItem, ImageScheduler, LogPoller, LogReporter,
    Pipeline, RestartScheduler, ShutdownCoordinator, TickOutcome,
};
use crate::errors::{ComposeWatchError, Result};
use crate::exec::{ComposeControl, ImageBuilder, SourceBuilder, TaskBuilder};
use crate::watch::{WatchOptions, WatcherHandle, watch_composition, watch_task};

/// External collaborators the loops call into.
#[derive(Clone)]
pub struct Collaborators {
    pub builder: Arc<dyn SourceBuilder>,
    pub images: Arc<dyn ImageBuilder>,
    pub compose: Arc<dyn ComposeControl>,
    pub reporter: Arc<dyn FailureReporter>,
}

impl Collaborators {
    /// Shell-backed collaborators for a real run.
    pub fn real(settings: &Settings) -> Self {
        Self {
            builder: Arc::new(TaskBuilder),
            images: Arc::new(DockerImageBuilder::new(settings.docker_program.clone())),
            compose: Arc::new(DockerCompose::from_settings(settings)),
            reporter: Arc::new(LogReporter),
        }
    }
}

/// Everything one run works on. Built once at startup.
#[derive(Debug)]
pub struct Project {
    settings: Settings,
    composition: Arc<Composition>,
    applications: Vec<Arc<Application>>,
    pipeline: Arc<Pipeline>,
    streams: Arc<OutputStreams>,
}

impl Project {
    /// Read the compose file and every service's `application.toml`.
    pub fn load(settings: Settings) -> Result<Self> {
        let composition = Composition::load(&settings.compose_file)?;
        Self::from_composition(settings, composition)
    }

    pub fn from_composition(settings: Settings, composition: Composition) -> Result<Self> {
        let mut applications = Vec::new();
        for (code, build) in composition.schema() {
            let build_root = composition.folder().join(&build.context);
            let manifest_path = build_root.join(APPLICATION_MANIFEST);
            if !manifest_path.is_file() {
                return Err(ComposeWatchError::ApplicationNotFound(manifest_path));
            }

            let manifest = load_manifest(&manifest_path)?;
            let application = Application::from_manifest(code.clone(), &build_root, &manifest)
                .with_dockerfile(build_root.join(&build.dockerfile));
            debug!(application = %code, tasks = application.tasks().len(), "application loaded");
            applications.push(Arc::new(application));
        }

        let streams = OutputStreams::new(settings.temporary_folder.join(&settings.name));
        Ok(Self {
            settings,
            composition: Arc::new(composition),
            applications,
            pipeline: Arc::new(Pipeline::new()),
            streams: Arc::new(streams),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn composition(&self) -> &Arc<Composition> {
        &self.composition
    }

    pub fn applications(&self) -> &[Arc<Application>] {
        &self.applications
    }

    pub fn application(&self, code: &str) -> Option<&Arc<Application>> {
        self.applications.iter().find(|a| a.name() == code)
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn streams(&self) -> &Arc<OutputStreams> {
        &self.streams
    }

    /// Parameters shared by every build of this project, without output.
    pub fn params(&self) -> BuildParams {
        BuildParams {
            production: self.settings.production,
            destination_folder: self.settings.destination_folder.clone(),
            temporary_root: self.settings.temporary_folder.clone(),
            temporary_sub_folder: Some(self.settings.temporary_sub_folder()),
            image_name: None,
            use_install: true,
            output: None,
        }
    }

    /// [`params`](Self::params) writing into `application`'s log file.
    pub fn build_params(&self, application: &Application) -> BuildParams {
        BuildParams {
            output: Some(self.streams.stream(application.name())),
            ..self.params()
        }
    }

    pub fn build_item(&self, application: &Arc<Application>, task: &Arc<Task>) -> BuildItem {
        BuildItem::new(
            Arc::clone(application),
            Arc::clone(task),
            self.build_params(application),
        )
    }

    pub fn order_build(&self, application: &Arc<Application>, task: &Arc<Task>) {
        self.pipeline.order_build(self.build_item(application, task));
    }

    /// Order a build of every task of every application.
    pub fn order_all(&self) {
        for application in &self.applications {
            for task in application.tasks() {
                self.order_build(application, task);
            }
        }
    }

    pub fn order_restart(&self) {
        self.pipeline.order_restart();
    }

    /// Spawn the three schedulers and the log poller.
    pub fn spin_up(&self, collaborators: &Collaborators) -> Vec<JoinHandle<()>> {
        let timing = self.settings.timing;
        let sink: Arc<dyn LogSink> = self.streams.clone();

        let build = BuildScheduler::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&collaborators.builder),
            Arc::clone(&collaborators.reporter),
        );
        let images = ImageScheduler::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&collaborators.images),
            Arc::clone(&self.composition),
            Arc::clone(&collaborators.reporter),
        );
        let restart =
            RestartScheduler::new(Arc::clone(&self.pipeline), Arc::clone(&collaborators.compose));
        let poller = LogPoller::new(
            Arc::clone(&self.pipeline),
            self.applications.clone(),
            Arc::clone(&collaborators.compose),
            sink,
        );

        vec![
            tokio::spawn(build.run(timing.build_interval)),
            tokio::spawn(images.run(timing.image_interval)),
            tokio::spawn(restart.run(timing.restart_interval)),
            tokio::spawn(poller.run(timing.logs_interval)),
        ]
    }

    /// Watch every task's sources and the compose file.
    ///
    /// A watch that cannot be set up is logged and skipped.
    pub fn watch_all(&self) -> Vec<WatcherHandle> {
        let options = WatchOptions {
            aggregate_timeout: self.settings.timing.watch_aggregate_timeout,
            ..WatchOptions::default()
        };

        let mut handles = Vec::new();
        for application in &self.applications {
            for task in application.tasks() {
                let item = self.build_item(application, task);
                match watch_task(Arc::clone(&self.pipeline), item, options) {
                    Ok(handle) => handles.push(handle),
                    Err(err) => warn!(
                        application = %application.name(),
                        task = %task.name(),
                        error = %err,
                        "cannot watch task sources"
                    ),
                }
            }
        }

        match watch_composition(
            Arc::clone(&self.pipeline),
            self.composition.path(),
            options,
        ) {
            Ok(handle) => handles.push(handle),
            Err(err) => warn!(error = %err, "cannot watch the composition file"),
        }
        handles
    }

    pub fn shutdown_coordinator(&self, compose: Arc<dyn ComposeControl>) -> ShutdownCoordinator {
        ShutdownCoordinator::new(Arc::clone(&self.pipeline), compose, Arc::clone(&self.streams))
    }

    /// One-shot build: every task, then every image, optionally pushed.
    /// Nothing is watched and the composition is not restarted.
    pub async fn build_all(&self, collaborators: &Collaborators, push: bool) -> Result<()> {
        let builds = BuildScheduler::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&collaborators.builder),
            Arc::clone(&collaborators.reporter),
        );
        let images = ImageScheduler::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&collaborators.images),
            Arc::clone(&self.composition),
            Arc::clone(&collaborators.reporter),
        );

        self.order_all();
        if let TickOutcome::Drained { failed, .. } = builds.tick().await {
            if failed > 0 {
                self.streams.close_all().await;
                return Err(anyhow!("{failed} task build(s) failed").into());
            }
        }
        // The build queue is empty now; this tick releases the image queue.
        builds.tick().await;

        for application in &self.applications {
            self.pipeline.order_image(ImageItem {
                application: Arc::clone(application),
                params: self.build_params(application),
            });
        }
        if let TickOutcome::Drained { failed, .. } = images.tick().await {
            if failed > 0 {
                self.streams.close_all().await;
                return Err(anyhow!("{failed} image build(s) failed").into());
            }
        }
        self.pipeline.restart_queue().pop_all();

        if push {
            for application in &self.applications {
                let ctx = images.context_for(&ImageItem {
                    application: Arc::clone(application),
                    params: self.build_params(application),
                });
                collaborators.images.push(&ctx).await?;
            }
        }

        self.streams.close_all().await;
        info!(applications = self.applications.len(), "one-shot build finished");
        Ok(())
    }
}
