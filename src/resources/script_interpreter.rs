//! Embedded Lua script interpreter resource.
//!
//! This module hosts game scripts inside a single LuaJIT state. Each script is
//! compiled once per name and instantiated once per owning object, with its own
//! private global table ("environment").
//!
//! # Example
//!
//! ```no_run
//! use lgscript::resources::script_interpreter::{ReportMode, ScriptInterpreter};
//!
//! let interpreter = ScriptInterpreter::new(ReportMode::Editor).unwrap();
//! if let Some(door) = interpreter.load_script("door_open", 42) {
//!     interpreter.call_in(&door, "OnBeginScript", ());
//! }
//! interpreter.unload_script("door_open", 42);
//! ```
//!
//! # Caches
//!
//! - chunk cache: script name → compiled chunk, kept for the interpreter's lifetime
//! - instance cache: `(name, object id)` → [`ScriptInstance`]
//! - identity registry: [`InstanceId`] → environment table

mod bindings;
mod chunk;
mod environment;
mod error;
mod instance;
mod interpreter;
mod sink;
mod sources;
mod traceback;

pub use bindings::{HostBinding, ScriptBinding};
pub use error::ScriptError;
pub use instance::{InstanceId, InstanceKey, ScriptInstance};
pub use interpreter::{InterpreterOptions, InterpreterStats, ScriptInterpreter};
pub use sink::{LogSink, MemorySink, MessageSink};
pub use sources::{DirectorySource, MemorySource, ScriptSource, SourceLookup};
pub use traceback::ReportMode;
