// src/project/template.rs

//! Path template substitution.
//!
//! Templates use `#PLACEHOLDER#` tokens:
//!
//! | token                | value                                  |
//! |----------------------|----------------------------------------|
//! | `#APPLICATION_NAME#` | application code from the compose file |
//! | `#TASK_NAME#`        | task name                              |
//! | `#TASK_FOLDER#`      | task folder, with a trailing slash     |
//! | `#MODE_NAME#`        | `development` or `production`          |
//! | `#CONTEXT_ID#`       | `<application>/<task>`                 |
//!
//! Tokens without a value in the given [`TemplateRefs`] are kept verbatim,
//! as are unknown tokens.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::project::{Application, Task};
use crate::types::Mode;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Z_]+)#").expect("placeholder regex is valid"));

/// What a template can refer to.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRefs<'a> {
    pub application: Option<&'a Application>,
    pub task: Option<&'a Task>,
    pub mode: Option<Mode>,
}

impl<'a> TemplateRefs<'a> {
    pub fn application(application: &'a Application) -> Self {
        Self {
            application: Some(application),
            ..Self::default()
        }
    }

    fn value_of(&self, token: &str) -> Option<String> {
        match token {
            "APPLICATION_NAME" => self.application.map(|a| a.name().to_string()),
            "TASK_NAME" => self.task.map(|t| t.name().to_string()),
            "TASK_FOLDER" => self
                .task
                .map(|t| format!("{}/", t.folder().display().to_string().trim_end_matches('/'))),
            "MODE_NAME" => self.mode.map(|m| m.as_str().to_string()),
            "CONTEXT_ID" => match (self.application, self.task) {
                (Some(a), Some(t)) => Some(format!("{}/{}", a.name(), t.name())),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Replace every known placeholder in `template`.
pub fn substitute<'t>(template: &'t str, refs: &TemplateRefs<'_>) -> Cow<'t, str> {
    PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        refs.value_of(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    })
}

/// Substitute, then root a relative result at the application's root folder.
pub fn resolve(template: &str, refs: &TemplateRefs<'_>) -> PathBuf {
    let filled = PathBuf::from(substitute(template, refs).into_owned());
    match refs.application {
        Some(app) if filled.is_relative() => app.root().join(filled),
        _ => filled,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::project::backend::CommandBackend;

    fn fixture() -> (Application, Arc<Task>) {
        let task = Task::new("client", "/apps/web/client", Arc::new(CommandBackend::new("make")));
        let app = Application::new("web", "/apps/web", "/apps/web").with_task(task);
        let task = app.tasks()[0].clone();
        (app, task)
    }

    #[test]
    fn fills_all_known_tokens() {
        let (app, task) = fixture();
        let refs = TemplateRefs {
            application: Some(&app),
            task: Some(&task),
            mode: Some(Mode::Production),
        };

        assert_eq!(
            substitute("#TASK_FOLDER#build/#MODE_NAME#/", &refs),
            "/apps/web/client/build/production/"
        );
        assert_eq!(substitute("tmp/#CONTEXT_ID#/#APPLICATION_NAME#", &refs), "tmp/web/client/web");
    }

    #[test]
    fn keeps_tokens_without_value() {
        let (app, _) = fixture();
        let refs = TemplateRefs::application(&app);

        assert_eq!(substitute("#APPLICATION_NAME#/#TASK_NAME#/#NOPE#", &refs), "web/#TASK_NAME#/#NOPE#");
    }

    #[test]
    fn relative_results_are_rooted_at_application() {
        let (app, task) = fixture();
        let refs = TemplateRefs {
            application: Some(&app),
            task: Some(&task),
            mode: Some(Mode::Development),
        };

        assert_eq!(resolve("dist/#MODE_NAME#", &refs), Path::new("/apps/web/dist/development"));
        assert_eq!(resolve("/var/out/#TASK_NAME#", &refs), Path::new("/var/out/client"));
    }
}
