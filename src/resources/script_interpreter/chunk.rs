//! Chunk loader: resolves a script name through `package.loaders`.

use mlua::prelude::*;

use super::error::ScriptError;

/// Returns the loader table, or a configuration error if it is missing.
pub(super) fn loaders(lua: &Lua) -> Result<LuaTable, ScriptError> {
    let loaders = match lua.globals().get::<LuaValue>("package")? {
        LuaValue::Table(package) => package.get::<LuaValue>("loaders")?,
        _ => LuaValue::Nil,
    };
    match loaders {
        LuaValue::Table(loaders) => Ok(loaders),
        _ => Err(ScriptError::Config(
            "'package.loaders' must be a table".to_string(),
        )),
    }
}

/// Tries every loader in order until one returns a compiled chunk.
///
/// String results from loaders that miss are concatenated into the
/// diagnostic of [`ScriptError::NotFound`].
pub(super) fn find_chunk(lua: &Lua, name: &str) -> Result<LuaFunction, ScriptError> {
    let loaders = loaders(lua)?;
    let mut diagnostic = String::new();
    for loader in loaders.sequence_values::<LuaFunction>() {
        match loader?.call::<LuaValue>(name) {
            Ok(LuaValue::Function(chunk)) => return Ok(chunk),
            Ok(LuaValue::String(message)) => diagnostic.push_str(&message.to_string_lossy()),
            Ok(_) => {}
            Err(source) => {
                return Err(ScriptError::Loader {
                    name: name.to_string(),
                    source,
                });
            }
        }
    }
    Err(ScriptError::NotFound {
        name: name.to_string(),
        diagnostic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_loaders(lua: &Lua, code: &str) {
        lua.load(code).exec().unwrap();
    }

    #[test]
    fn test_first_matching_loader_wins() {
        let lua = Lua::new();
        with_loaders(
            &lua,
            r#"
            calls = {}
            package.loaders = {
                function(name) table.insert(calls, "a") return "\n\tnot in a" end,
                function(name) table.insert(calls, "b") return function() return name end end,
                function(name) table.insert(calls, "c") return function() end end,
            }
            "#,
        );
        let chunk = find_chunk(&lua, "door_open").unwrap();
        assert_eq!(chunk.call::<String>(()).unwrap(), "door_open");
        let calls: Vec<String> = lua.globals().get("calls").unwrap();
        assert_eq!(calls, vec!["a", "b"]);
    }

    #[test]
    fn test_diagnostics_are_concatenated() {
        let lua = Lua::new();
        with_loaders(
            &lua,
            r#"
            package.loaders = {
                function(name) return "\n\tno field '" .. name .. "'" end,
                function(name) return nil end,
                function(name) return "\n\tno file '" .. name .. ".lua'" end,
            }
            "#,
        );
        match find_chunk(&lua, "ghost") {
            Err(ScriptError::NotFound { name, diagnostic }) => {
                assert_eq!(name, "ghost");
                assert_eq!(diagnostic, "\n\tno field 'ghost'\n\tno file 'ghost.lua'");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_loader_table_is_config_error() {
        let lua = Lua::new();
        with_loaders(&lua, "package.loaders = nil");
        assert!(matches!(find_chunk(&lua, "x"), Err(ScriptError::Config(_))));
    }

    #[test]
    fn test_missing_package_is_config_error() {
        let lua = Lua::new();
        lua.globals().set("package", LuaValue::Nil).unwrap();
        assert!(matches!(loaders(&lua), Err(ScriptError::Config(_))));
    }

    #[test]
    fn test_raising_loader_aborts_search() {
        let lua = Lua::new();
        with_loaders(
            &lua,
            r#"
            reached = false
            package.loaders = {
                function(name) error("syntax error near 'end'") end,
                function(name) reached = true return function() end end,
            }
            "#,
        );
        assert!(matches!(find_chunk(&lua, "broken"), Err(ScriptError::Loader { .. })));
        assert!(!lua.globals().get::<bool>("reached").unwrap());
    }
}
