// src/lib.rs

pub mod cli;
pub mod compose;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod project;
pub mod types;
pub mod watch;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::resolve_settings;
use crate::engine::ShutdownOutcome;
use crate::project::{BuildContext, Collaborators, Project};
use crate::types::Mode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings (config file + CLI) and the compose file
/// - application discovery
/// - the schedulers and the log poller
/// - file watchers
/// - Ctrl-C handling and the shutdown sequence
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = resolve_settings(&args)?;
    let project = Project::load(settings)?;

    if args.dry_run {
        print_dry_run(&project);
        return Ok(());
    }

    let collaborators = Collaborators::real(project.settings());

    if args.once {
        project.build_all(&collaborators, args.push).await?;
        return Ok(());
    }

    let _loops = project.spin_up(&collaborators);
    if args.no_initial_build {
        info!("initial build skipped; bringing the composition up");
        project.order_restart();
    } else {
        project.order_all();
    }

    let coordinator = project.shutdown_coordinator(collaborators.compose.clone());
    coordinator.add_watchers(project.watch_all());
    info!("Watching files...");

    tokio::signal::ctrl_c().await?;
    info!("interrupt received; shutting down");

    tokio::select! {
        outcome = coordinator.shutdown() => {
            if outcome == ShutdownOutcome::StopFailed {
                warn!("composition was not stopped; exiting anyway");
            }
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                error!(error = %err, "failed to listen for Ctrl+C");
            }
            warn!("second interrupt; exiting immediately");
        }
    }

    Ok(())
}

/// Dry-run output: applications, tasks, resolved folders and image names.
fn print_dry_run(project: &Project) {
    let settings = project.settings();
    println!("composewatch dry-run");
    println!("  project = {}", settings.name);
    println!("  compose_file = {}", project.composition().path().display());
    println!("  mode = {}", Mode::from_production_flag(settings.production));
    println!();

    println!("applications ({}):", project.applications().len());
    for application in project.applications() {
        println!("  - {}", application.name());
        println!(
            "      image: {}",
            project.composition().make_image_name(application.name())
        );
        println!("      build_root: {}", application.build_root().display());

        let image_ctx = BuildContext::for_application(project.params(), application.clone());
        match image_ctx.dockerfile_path() {
            Some(path) => println!("      dockerfile: {}", path.display()),
            None => println!("      dockerfile: <missing>"),
        }

        for task in application.tasks() {
            let ctx = BuildContext::for_task(project.params(), application.clone(), task.clone());
            println!("      task {}:", task.name());
            println!("          folder: {}", task.folder().display());
            if let Some(src) = ctx.source_folder() {
                println!("          source: {}", src.display());
            }
            println!("          destination: {}", ctx.destination_folder().display());
            if let Some(install) = task.install() {
                println!("          install: {} ({})", install.command, install.manifest);
            }
            if !task.needs_image_rebuild() {
                println!("          rebuild_image: false");
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
