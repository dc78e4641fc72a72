//! Interpreter error type.

use mlua::Error as LuaError;
use thiserror::Error;

use super::instance::InstanceKey;

/// Failures inside the interpreter.
///
/// These never leave [`load_script`](super::ScriptInterpreter::load_script) or
/// [`unload_script`](super::ScriptInterpreter::unload_script); they are logged
/// through the message sink instead.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("script not found [{name}]{diagnostic}")]
    NotFound { name: String, diagnostic: String },
    #[error("loader failed for [{name}]: {source}")]
    Loader {
        name: String,
        #[source]
        source: LuaError,
    },
    #[error("construction of [{0}] failed")]
    Construction(InstanceKey),
    #[error("recursive load of [{0}] rejected")]
    Recursive(InstanceKey),
    #[error("script [{0}] is not loaded")]
    NotLoaded(InstanceKey),
    #[error(transparent)]
    Lua(#[from] LuaError),
}
