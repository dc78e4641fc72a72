//! Error handler strategies for protected script execution.
//!
//! The interpreter installs one of two handlers as the `xpcall` message
//! handler for every module body and every call made on behalf of an
//! instance:
//!
//! - [`ReportMode::Editor`] – builds a `debug.traceback` and prints it,
//!   prefixed with the originating `[name:objid]` when known
//! - [`ReportMode::Runtime`] – passes the error value through untouched

use log::Level;
use mlua::prelude::*;
use std::rc::Rc;

use super::instance::InstanceKey;
use super::sink::MessageSink;

/// Placeholder used when the error value has no printable form.
const UNKNOWN_ERROR: &str = "Unknown error";

/// Traceback level: skips the handler and `debug.traceback` frames.
const FRAME_SKIP: i64 = 2;

/// Error reporting mode, fixed when the interpreter is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// Verbose reporting for the level editor.
    Editor,
    /// Silent reporting for the game runtime.
    #[default]
    Runtime,
}

impl ReportMode {
    pub fn from_editor(editor: bool) -> Self {
        if editor {
            ReportMode::Editor
        } else {
            ReportMode::Runtime
        }
    }

    pub fn is_editor(self) -> bool {
        self == ReportMode::Editor
    }
}

/// Creates the message handler for `mode`, attributed to `origin` if given.
pub(super) fn handler(
    lua: &Lua,
    mode: ReportMode,
    sink: Rc<dyn MessageSink>,
    origin: Option<InstanceKey>,
) -> LuaResult<LuaFunction> {
    match mode {
        ReportMode::Editor => lua.create_function(move |lua, err: LuaValue| {
            Ok(traceback(lua, sink.as_ref(), origin.as_ref(), err))
        }),
        ReportMode::Runtime => lua.create_function(|_, err: LuaValue| Ok(err)),
    }
}

fn traceback(
    lua: &Lua,
    sink: &dyn MessageSink,
    origin: Option<&InstanceKey>,
    err: LuaValue,
) -> LuaValue {
    let Some(traceback) = debug_traceback(lua) else {
        return err;
    };
    let message = error_message(&err);
    let text = match traceback.call::<String>((message, FRAME_SKIP)) {
        Ok(text) => text,
        Err(_) => return err,
    };
    match origin {
        Some(key) => sink.emit(Level::Error, &format!("!!! [{key}] {text}")),
        None => sink.emit(Level::Error, &format!("!!! {text}")),
    }
    if is_printable(&err) {
        lua.create_string(&text).map(LuaValue::String).unwrap_or(err)
    } else {
        err
    }
}

fn debug_traceback(lua: &Lua) -> Option<LuaFunction> {
    let debug: LuaTable = lua.globals().get("debug").ok()?;
    debug.get("traceback").ok()
}

fn is_printable(err: &LuaValue) -> bool {
    matches!(
        err,
        LuaValue::String(_) | LuaValue::Integer(_) | LuaValue::Number(_)
    )
}

/// Printable form of an error value.
pub(super) fn error_message(err: &LuaValue) -> String {
    match err {
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::Error(e) => e.to_string(),
        _ => UNKNOWN_ERROR.to_string(),
    }
}
