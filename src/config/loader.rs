// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::CliArgs;
use crate::config::model::{
    ApplicationManifest, DEFAULT_DESTINATION_FOLDER, RawApplicationManifest, RawProjectConfig,
    Settings,
};
use crate::config::validate::validate_settings;
use crate::errors::{ComposeWatchError, Result};

/// Load a project config file and return the raw `RawProjectConfig`.
///
/// This only performs TOML deserialization. Use [`resolve_settings`] to merge
/// it with CLI flags and validate the result.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProjectConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawProjectConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load and validate an `application.toml`.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<ApplicationManifest> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawApplicationManifest = toml::from_str(&contents)?;
    ApplicationManifest::try_from(raw)
}

/// Helper to resolve the default config path: `composewatch.toml` in the
/// current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("composewatch.toml")
}

/// Merge the optional config file with CLI flags into validated [`Settings`].
///
/// An explicit `--config` must exist; the default path is only used when
/// present.
pub fn resolve_settings(args: &CliArgs) -> Result<Settings> {
    let (raw, base_dir) = match &args.config {
        Some(path) => (load_from_path(path)?, parent_dir(path)),
        None => {
            let path = default_config_path();
            if path.is_file() {
                (load_from_path(&path)?, parent_dir(&path))
            } else {
                (RawProjectConfig::default(), PathBuf::new())
            }
        }
    };

    settings_from_parts(raw, &base_dir, args)
}

/// Apply CLI overrides and defaults on top of a parsed config.
///
/// `base_dir` is the folder config-relative paths are resolved against.
pub fn settings_from_parts(
    raw: RawProjectConfig,
    base_dir: &Path,
    args: &CliArgs,
) -> Result<Settings> {
    let compose_file = match (&args.compose_file, &raw.project.compose_file) {
        (Some(cli), _) => cli.clone(),
        (None, Some(file)) => base_dir.join(file),
        (None, None) => {
            return Err(ComposeWatchError::ConfigError(
                "Composition file not specified: use --compose-file or [project].compose_file"
                    .to_string(),
            ));
        }
    };

    let name = args
        .name
        .clone()
        .or(raw.project.name)
        .unwrap_or_else(|| default_project_name(&compose_file));

    let destination_folder = args
        .destination_folder
        .clone()
        .or(raw.project.destination_folder)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DESTINATION_FOLDER.to_string());

    let temporary_folder = raw
        .project
        .temporary_folder
        .map(|dir| base_dir.join(dir))
        .unwrap_or_else(|| std::env::temp_dir().join("composewatch"));

    let settings = Settings {
        name,
        compose_file,
        destination_folder,
        temporary_folder,
        compose_program: raw.project.compose_program,
        docker_program: raw.project.docker_program,
        production: args.production,
        timing: raw.timing.into(),
    };

    validate_settings(&settings)?;
    Ok(settings)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::new(),
    }
}

/// Name of the folder holding the compose file, or `"composewatch"`.
fn default_project_name(compose_file: &Path) -> String {
    let absolute = compose_file
        .canonicalize()
        .unwrap_or_else(|_| compose_file.to_path_buf());
    absolute
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "composewatch".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cli_overrides_file_values() {
        let raw: RawProjectConfig = toml::from_str(
            r#"
[project]
name = "from-file"
compose_file = "docker/docker-compose.yml"

[timing]
build_interval = 50
"#,
        )
        .unwrap();

        let args = CliArgs {
            name: Some("from-cli".to_string()),
            ..CliArgs::default()
        };

        let settings = settings_from_parts(raw, Path::new("/work"), &args).unwrap();
        assert_eq!(settings.name, "from-cli");
        assert_eq!(settings.compose_file, PathBuf::from("/work/docker/docker-compose.yml"));
        assert_eq!(settings.timing.build_interval, Duration::from_millis(50));
        assert_eq!(settings.timing.logs_interval, Duration::from_millis(1000));
        assert_eq!(settings.destination_folder, DEFAULT_DESTINATION_FOLDER);
        assert_eq!(settings.compose_program, "docker-compose");
    }

    #[test]
    fn missing_compose_file_is_a_config_error() {
        let err = settings_from_parts(RawProjectConfig::default(), Path::new(""), &CliArgs::default())
            .unwrap_err();
        assert!(matches!(err, ComposeWatchError::ConfigError(msg) if msg.contains("Composition file")));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let raw: RawProjectConfig = toml::from_str("[timing]\nrestart_interval = 0\n").unwrap();
        let args = CliArgs {
            compose_file: Some(PathBuf::from("/srv/shop/docker-compose.yml")),
            ..CliArgs::default()
        };

        let err = settings_from_parts(raw, Path::new(""), &args).unwrap_err();
        assert!(matches!(err, ComposeWatchError::ConfigError(msg) if msg.contains("restart_interval")));
    }

    #[test]
    fn project_name_defaults_to_compose_folder() {
        let args = CliArgs {
            compose_file: Some(PathBuf::from("/srv/shop/docker-compose.yml")),
            ..CliArgs::default()
        };
        let settings = settings_from_parts(RawProjectConfig::default(), Path::new(""), &args).unwrap();
        assert_eq!(settings.name, "shop");
    }
}
