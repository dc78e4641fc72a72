//! ECS components used by the script host.
//!
//! Submodules overview
//! - [`scripted`] – scripts attached to an entity and the object id they run for
pub mod scripted;
