#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use composewatch::compose::Composition;
use composewatch::engine::{BuildItem, ImageItem};
use composewatch::project::{Application, BuildParams, CommandBackend, Task};

/// Builder for `Application` to simplify test setup.
///
/// Tasks get a `CommandBackend` running `true`; the fakes never run it.
pub struct ApplicationBuilder {
    name: String,
    root: PathBuf,
    tasks: Vec<Task>,
}

impl ApplicationBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            root: PathBuf::from("/apps").join(name),
            tasks: Vec::new(),
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Task whose success asks for an image rebuild.
    pub fn task(self, name: &str) -> Self {
        self.task_with(name, true)
    }

    /// Task whose success never rebuilds the image.
    pub fn task_without_image(self, name: &str) -> Self {
        self.task_with(name, false)
    }

    fn task_with(mut self, name: &str, rebuild_image: bool) -> Self {
        let backend = CommandBackend::new("true").with_rebuild_image(rebuild_image);
        self.tasks
            .push(Task::new(name, self.root.join(name), Arc::new(backend)));
        self
    }

    pub fn build(self) -> Arc<Application> {
        let mut app = Application::new(self.name, self.root.clone(), self.root);
        for task in self.tasks {
            app = app.with_task(task);
        }
        Arc::new(app)
    }
}

/// Build item for `task` of `app`. Panics if the task does not exist.
pub fn build_item(app: &Arc<Application>, task: &str) -> BuildItem {
    let task = app
        .task(task)
        .unwrap_or_else(|| panic!("no task {task} in {}", app.name()))
        .clone();
    BuildItem::new(Arc::clone(app), task, BuildParams::default())
}

pub fn image_item(app: &Arc<Application>) -> ImageItem {
    ImageItem {
        application: Arc::clone(app),
        params: BuildParams::default(),
    }
}

/// Empty composition whose image prefix is `folder`.
pub fn composition(folder: &str) -> Arc<Composition> {
    let path = format!("/srv/{folder}/docker-compose.yml");
    Arc::new(Composition::parse(path, "services: {}\n").expect("empty composition parses"))
}
