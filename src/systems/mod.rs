//! ECS systems driving the script host.
//!
//! Submodules overview
//! - [`scripting`] – loads and unloads script instances as [`Scripted`](crate::components::scripted::Scripted) components come and go
pub mod scripting;
