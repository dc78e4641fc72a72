//! Host-side source strategies for the chunk loader.
//!
//! A [`ScriptSource`] resolves a script name to a compiled chunk. Sources are
//! installed as ordinary `package.loaders` entries, right after
//! `package.preload` and ahead of the runtime's `package.path` and
//! `package.cpath` searchers, so they take part in the same lookup as
//! `require` and win over stray files on the search path.

use mlua::prelude::*;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

/// Result of asking a source for a script.
pub enum SourceLookup {
    /// Compiled, not yet executed chunk.
    Found(LuaFunction),
    /// Diagnostic appended to the combined "not found" message.
    Missing(String),
}

/// A strategy that resolves script names to compiled chunks.
pub trait ScriptSource {
    /// Looks up `name`. Errors abort the search (e.g. syntax errors).
    fn find(&self, lua: &Lua, name: &str) -> LuaResult<SourceLookup>;
}

/// Inserts `source` into `loaders` as a loader function at `position`.
///
/// Positions past the end append.
pub(super) fn install(
    lua: &Lua,
    loaders: &LuaTable,
    position: usize,
    source: Rc<dyn ScriptSource>,
) -> LuaResult<()> {
    let loader = lua.create_function(move |lua, name: String| {
        match source.find(lua, &name)? {
            SourceLookup::Found(chunk) => Ok(LuaValue::Function(chunk)),
            SourceLookup::Missing(diagnostic) => {
                Ok(LuaValue::String(lua.create_string(&diagnostic)?))
            }
        }
    })?;
    let position = position.clamp(1, loaders.raw_len() + 1);
    loaders.raw_insert(position as LuaInteger, loader)
}

/// Scripts held in memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemorySource {
    scripts: RefCell<FxHashMap<String, String>>,
    lookups: Cell<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_script(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    /// Adds or replaces a script. Chunks already compiled by the interpreter are not affected.
    pub fn insert(&self, name: impl Into<String>, source: impl Into<String>) {
        self.scripts.borrow_mut().insert(name.into(), source.into());
    }

    /// Number of times this source was asked for a script.
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl ScriptSource for MemorySource {
    fn find(&self, lua: &Lua, name: &str) -> LuaResult<SourceLookup> {
        self.lookups.set(self.lookups.get() + 1);
        let source = self.scripts.borrow().get(name).cloned();
        match source {
            Some(source) => Ok(SourceLookup::Found(
                lua.load(source).set_name(name).into_function()?,
            )),
            None => Ok(SourceLookup::Missing(format!(
                "\n\tno script '{name}' in memory"
            ))),
        }
    }
}

/// Scripts stored as files below a root directory.
///
/// Dotted names map to subdirectories: `doors.open` → `<root>/doors/open.lua`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        let mut path = self.root.join(name.replace('.', "/"));
        path.set_extension(&self.extension);
        path
    }
}

impl ScriptSource for DirectorySource {
    fn find(&self, lua: &Lua, name: &str) -> LuaResult<SourceLookup> {
        let path = self.path_for(name);
        match fs::read_to_string(&path) {
            Ok(source) => Ok(SourceLookup::Found(
                lua.load(source)
                    .set_name(format!("@{}", path.display()))
                    .into_function()?,
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SourceLookup::Missing(format!(
                "\n\tno file '{}'",
                path.display()
            ))),
            Err(e) => Err(LuaError::external(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(lookup: SourceLookup) -> LuaFunction {
        match lookup {
            SourceLookup::Found(chunk) => chunk,
            SourceLookup::Missing(diagnostic) => panic!("unexpected miss: {diagnostic}"),
        }
    }

    fn missing(lookup: SourceLookup) -> String {
        match lookup {
            SourceLookup::Found(_) => panic!("unexpected hit"),
            SourceLookup::Missing(diagnostic) => diagnostic,
        }
    }

    #[test]
    fn test_memory_source_compiles_known_script() {
        let lua = Lua::new();
        let source = MemorySource::new().with_script("answer", "return 42");
        let chunk = found(source.find(&lua, "answer").unwrap());
        assert_eq!(chunk.call::<i64>(()).unwrap(), 42);
        assert_eq!(source.lookups(), 1);
    }

    #[test]
    fn test_memory_source_reports_missing_script() {
        let lua = Lua::new();
        let source = MemorySource::new();
        let diagnostic = missing(source.find(&lua, "ghost").unwrap());
        assert_eq!(diagnostic, "\n\tno script 'ghost' in memory");
        assert_eq!(source.lookups(), 1);
    }

    #[test]
    fn test_memory_source_syntax_error_is_raised() {
        let lua = Lua::new();
        let source = MemorySource::new().with_script("broken", "local = ;");
        assert!(source.find(&lua, "broken").is_err());
    }

    #[test]
    fn test_directory_source_path_mapping() {
        let source = DirectorySource::new("/scripts", "lua");
        assert_eq!(source.path_for("door_open"), PathBuf::from("/scripts/door_open.lua"));
        assert_eq!(source.path_for("doors.open"), PathBuf::from("/scripts/doors/open.lua"));
    }

    #[test]
    fn test_directory_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lamp.lua"), "return 'lit'").unwrap();
        let lua = Lua::new();
        let source = DirectorySource::new(dir.path(), "lua");
        let chunk = found(source.find(&lua, "lamp").unwrap());
        assert_eq!(chunk.call::<String>(()).unwrap(), "lit");
    }

    #[test]
    fn test_directory_source_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let lua = Lua::new();
        let source = DirectorySource::new(dir.path(), "lua");
        let diagnostic = missing(source.find(&lua, "ghost").unwrap());
        assert!(diagnostic.starts_with("\n\tno file '"));
        assert!(diagnostic.contains("ghost.lua"));
    }

    #[test]
    fn test_install_inserts_at_position() {
        let lua = Lua::new();
        let loaders = lua.create_sequence_from(["preload", "path"]).unwrap();
        let source: Rc<dyn ScriptSource> = Rc::new(MemorySource::new());
        install(&lua, &loaders, 2, source).unwrap();
        assert_eq!(loaders.raw_len(), 3);
        assert!(matches!(loaders.raw_get::<LuaValue>(2).unwrap(), LuaValue::Function(_)));
        assert_eq!(loaders.raw_get::<String>(3).unwrap(), "path");
    }

    #[test]
    fn test_install_past_end_appends_loader() {
        let lua = Lua::new();
        let loaders = lua.create_table().unwrap();
        let source: Rc<dyn ScriptSource> = Rc::new(MemorySource::new().with_script("a", "return 1"));
        install(&lua, &loaders, 5, source).unwrap();
        let loader: LuaFunction = loaders.raw_get(1).unwrap();
        assert!(matches!(loader.call::<LuaValue>("a").unwrap(), LuaValue::Function(_)));
        assert!(matches!(loader.call::<LuaValue>("b").unwrap(), LuaValue::String(_)));
    }
}
