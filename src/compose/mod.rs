// src/compose/mod.rs

//! docker-compose integration.
//!
//! - [`composition`] parses the compose file into the set of locally built
//!   services and derives image names.
//! - [`control`] brings the composition up, stops it and reads container logs.
//! - [`docker`] builds and pushes application images.

pub mod composition;
pub mod control;
pub mod docker;

pub use composition::{Composition, ServiceBuild};
pub use control::DockerCompose;
pub use docker::DockerImageBuilder;
