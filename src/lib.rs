//! lgscript library.
//!
//! This module exposes the script interpreter together with the ECS
//! components, resources and systems that attach script instances to
//! entities, for use in integration tests and as a reusable library.

pub mod components;
pub mod resources;
pub mod systems;
