//! ECS resources made available to systems.
//!
//! This module groups the long-lived data injected into the ECS world:
//! the Lua interpreter, its configuration, and the record of which entity
//! holds which script instance.
//!
//! Overview
//! - `attachedscripts` – instance keys loaded on behalf of each entity
//! - `interpreterconfig` – settings loaded from the INI configuration file
//! - `script_interpreter` – Lua state, chunk and instance caches, protected calls
pub mod attachedscripts;
pub mod interpreterconfig;
pub mod script_interpreter;
