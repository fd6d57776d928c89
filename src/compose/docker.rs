// src/compose/docker.rs

//! Production [`ImageBuilder`]: `docker build` and `docker push`.

use tracing::info;

use crate::errors::{ComposeWatchError, Result};
use crate::exec::{BuildCommand, ImageBuilder, OutputTarget, execute};
use crate::project::BuildContext;
use crate::types::BoxFuture;

#[derive(Debug, Clone)]
pub struct DockerImageBuilder {
    docker_program: String,
}

impl DockerImageBuilder {
    pub fn new(docker_program: impl Into<String>) -> Self {
        Self {
            docker_program: docker_program.into(),
        }
    }

    fn image_name<'a>(&self, ctx: &'a BuildContext) -> Result<&'a str> {
        ctx.image_name().ok_or_else(|| {
            ComposeWatchError::ConfigError(format!(
                "no image name for application {}",
                ctx.application().name()
            ))
        })
    }

    /// `docker build -t <image> -f <dockerfile> <build root>`.
    pub fn build_command(&self, ctx: &BuildContext) -> Result<BuildCommand> {
        let image = self.image_name(ctx)?;
        let dockerfile = ctx
            .dockerfile_path()
            .ok_or_else(|| ComposeWatchError::MissingDockerfile(ctx.application().name().to_string()))?;

        Ok(BuildCommand::new(&self.docker_program)
            .args(["build", "-t", image, "-f"])
            .arg(dockerfile.display().to_string())
            .arg(ctx.application().build_root().display().to_string())
            .current_dir(ctx.application().build_root()))
    }

    pub fn push_command(&self, ctx: &BuildContext) -> Result<BuildCommand> {
        let image = self.image_name(ctx)?;
        Ok(BuildCommand::new(&self.docker_program).args(["push", image]))
    }
}

impl Default for DockerImageBuilder {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ImageBuilder for DockerImageBuilder {
    fn build_image<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let command = self.build_command(ctx)?;
            info!(application = %ctx.application().name(), image = ?ctx.image_name(), "building image");
            ctx.log(&format!("\n# IMAGE BUILD: {} #\n", ctx.image_name().unwrap_or_default()))
                .await;
            execute(&command, &OutputTarget::from(ctx.output().cloned())).await
        })
    }

    fn push<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let command = self.push_command(ctx)?;
            info!(application = %ctx.application().name(), image = ?ctx.image_name(), "pushing image");
            execute(&command, &OutputTarget::from(ctx.output().cloned())).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::project::{Application, BuildParams};

    #[test]
    fn build_command_uses_discovered_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docker")).unwrap();
        std::fs::write(dir.path().join("docker/production.dockerfile"), "FROM scratch").unwrap();

        let app = Arc::new(Application::new("web", dir.path(), dir.path()));
        let params = BuildParams {
            production: true,
            ..BuildParams::default()
        };
        let mut ctx = BuildContext::for_application(params, app);
        ctx.set_image_name("shop_web");

        let cmd = DockerImageBuilder::default().build_command(&ctx).unwrap();
        assert_eq!(cmd.program, "docker");
        assert_eq!(cmd.args[..4], ["build", "-t", "shop_web", "-f"]);
        assert!(cmd.args[4].ends_with("docker/production.dockerfile"));
        assert_eq!(cmd.args[5], dir.path().display().to_string());
    }

    #[test]
    fn missing_dockerfile_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let app = Arc::new(Application::new("api", dir.path(), dir.path()));
        let mut ctx = BuildContext::for_application(BuildParams::default(), app);
        ctx.set_image_name("shop_api");

        let err = DockerImageBuilder::default().build_command(&ctx).unwrap_err();
        assert!(matches!(err, ComposeWatchError::MissingDockerfile(name) if name == "api"));
    }

    #[test]
    fn push_requires_image_name() {
        let dir = tempfile::tempdir().unwrap();
        let app = Arc::new(Application::new("api", dir.path(), dir.path()));
        let ctx = BuildContext::for_application(BuildParams::default(), app);

        assert!(DockerImageBuilder::default().push_command(&ctx).is_err());
    }
}
