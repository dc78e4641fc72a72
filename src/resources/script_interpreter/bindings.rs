//! Domain bindings registered with the interpreter.
//!
//! Object, message and link bindings live outside this crate; they plug in
//! through [`ScriptBinding`]. [`HostBinding`] is the one binding shipped here.
//!
//! ```lua
//! -- From a script
//! host.log("Hello from Lua!")
//! host.log_warn("This is a warning")
//! ```

use log::Level;
use mlua::prelude::*;
use std::rc::Rc;

use super::instance::ScriptInstance;
use super::sink::MessageSink;

/// A set of script-visible APIs installed at interpreter construction.
pub trait ScriptBinding {
    fn name(&self) -> &str;

    /// Called once, after the core tables are installed and before the
    /// garbage collector is restarted.
    fn init(&self, lua: &Lua) -> LuaResult<()>;

    /// Called for every new environment, after `script` is set.
    fn environment(&self, _lua: &Lua, _env: &LuaTable, _instance: &ScriptInstance) -> LuaResult<()> {
        Ok(())
    }
}

/// Registers the `host` table with logging functions.
pub struct HostBinding {
    sink: Rc<dyn MessageSink>,
}

impl HostBinding {
    pub fn new(sink: Rc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    fn log_function(&self, lua: &Lua, level: Level) -> LuaResult<LuaFunction> {
        let sink = self.sink.clone();
        lua.create_function(move |_, msg: String| {
            sink.emit(level, &msg);
            Ok(())
        })
    }
}

impl ScriptBinding for HostBinding {
    fn name(&self) -> &str {
        "host"
    }

    fn init(&self, lua: &Lua) -> LuaResult<()> {
        let host = lua.create_table()?;

        // host.log(message) - General purpose logging
        host.set("log", self.log_function(lua, Level::Info)?)?;
        host.set("log_info", self.log_function(lua, Level::Info)?)?;
        host.set("log_warn", self.log_function(lua, Level::Warn)?)?;
        host.set("log_error", self.log_function(lua, Level::Error)?)?;

        lua.globals().set("host", host)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::script_interpreter::sink::MemorySink;

    #[test]
    fn test_host_table_routes_to_sink() {
        let lua = Lua::new();
        let sink = Rc::new(MemorySink::default());
        HostBinding::new(sink.clone()).init(&lua).unwrap();
        lua.load(r#"host.log("hi") host.log_warn("careful") host.log_error("bad")"#)
            .exec()
            .unwrap();
        assert_eq!(
            sink.lines(),
            vec![
                (Level::Info, "hi".to_string()),
                (Level::Warn, "careful".to_string()),
                (Level::Error, "bad".to_string()),
            ]
        );
    }
}
