// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] spawns subprocesses and redirects their output into the
//!   per-application log streams.
//! - [`backend`] holds the collaborator traits the schedulers call
//!   ([`SourceBuilder`], [`ImageBuilder`], [`ComposeControl`]).
//! - [`source`] is the production task builder.
//! - [`install`] runs a task's dependency install step when its manifest
//!   changed.

pub mod backend;
pub mod command;
pub mod install;
pub mod source;

pub use backend::{ComposeControl, ImageBuilder, SourceBuilder};
pub use command::{BuildCommand, OutputTarget, capture, execute};
pub use source::{TaskBuilder, build_task};
