//! Environment builder: runs a chunk's module body inside a private table.

use mlua::prelude::*;

use super::bindings::ScriptBinding;
use super::error::ScriptError;
use super::instance::ScriptInstance;

/// Installs a chunk's execution scope and restores the previous one on drop.
///
/// Scopes nest: a module body that loads another instance of its own script
/// gets its private table back once the inner construction finishes.
pub(super) struct ChunkScope<'a> {
    chunk: &'a LuaFunction,
    previous: LuaTable,
}

impl<'a> ChunkScope<'a> {
    /// `fallback` is restored if the chunk had no environment of its own.
    pub(super) fn enter(chunk: &'a LuaFunction, env: LuaTable, fallback: LuaTable) -> LuaResult<Self> {
        let previous = chunk.environment().unwrap_or(fallback);
        chunk.set_environment(env)?;
        Ok(Self { chunk, previous })
    }
}

impl Drop for ChunkScope<'_> {
    fn drop(&mut self) {
        // Only fails for non-Lua functions, which never get a scope.
        let _ = self.chunk.set_environment(self.previous.clone());
    }
}

/// Creates the environment table for `instance` and runs `chunk` in it once.
///
/// The body runs under `xpcall` with `handler` as the message handler. A
/// runtime error in the module body yields [`ScriptError::Construction`]; the
/// chunk's scope is reset to its previous table (the globals, outside nested
/// loads) on every path.
pub(super) fn build(
    lua: &Lua,
    chunk: &LuaFunction,
    instance: &ScriptInstance,
    xpcall: &LuaFunction,
    handler: &LuaFunction,
    bindings: &[Box<dyn ScriptBinding>],
) -> Result<LuaTable, ScriptError> {
    let globals = lua.globals();
    let env = lua.create_table_with_capacity(0, 2)?;
    let meta = lua.create_table()?;
    meta.set("__index", globals.clone())?;
    env.set_metatable(Some(meta))?;
    env.raw_set("script", lua.create_userdata(instance.clone())?)?;
    for binding in bindings {
        binding.environment(lua, &env, instance)?;
    }

    let ok = {
        let _scope = ChunkScope::enter(chunk, env.clone(), globals)?;
        let (ok, _): (bool, LuaValue) = xpcall.call((chunk.clone(), handler.clone()))?;
        ok
    };
    if ok {
        Ok(env)
    } else {
        Err(ScriptError::Construction(instance.key().clone()))
    }
}
