//! Script interpreter core: construction, load/unload and protected calls.
//!
//! The interpreter owns the Lua state and three caches. All access happens on
//! the host's script thread; the caches are never borrowed while Lua code
//! runs, so module bodies may load other scripts.

use log::Level;
use mlua::prelude::*;
use mlua::{LuaOptions, StdLib};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::bindings::ScriptBinding;
use super::chunk;
use super::environment;
use super::error::ScriptError;
use super::instance::{InstanceId, InstanceKey, ScriptInstance};
use super::sink::{LogSink, MessageSink};
use super::sources::{self, DirectorySource, ScriptSource};
use super::traceback::{self, ReportMode};
use crate::resources::interpreterconfig::InterpreterConfig;

/// Everything needed to build a [`ScriptInterpreter`].
pub struct InterpreterOptions {
    pub mode: ReportMode,
    pub sink: Rc<dyn MessageSink>,
    /// Source strategies, consulted in order ahead of the runtime's file searchers.
    pub sources: Vec<Rc<dyn ScriptSource>>,
    pub bindings: Vec<Box<dyn ScriptBinding>>,
}

impl InterpreterOptions {
    pub fn new(mode: ReportMode) -> Self {
        Self {
            mode,
            sink: Rc::new(LogSink),
            sources: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Options for the configured mode with a [`DirectorySource`] for the script directory.
    pub fn from_config(config: &InterpreterConfig) -> Self {
        Self::new(ReportMode::from_editor(config.editor)).with_source(Rc::new(
            DirectorySource::new(config.script_dir.clone(), config.extension.clone()),
        ))
    }

    pub fn with_sink(mut self, sink: Rc<dyn MessageSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_source(mut self, source: Rc<dyn ScriptSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_binding(mut self, binding: Box<dyn ScriptBinding>) -> Self {
        self.bindings.push(binding);
        self
    }
}

/// Counters reported by [`ScriptInterpreter::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterpreterStats {
    pub chunks: usize,
    pub instances: usize,
    pub environments: usize,
    pub memory_kb: usize,
}

#[derive(Default)]
struct ScriptCaches {
    /// Compiled chunks by script name.
    chunks: FxHashMap<String, LuaRegistryKey>,
    instances: FxHashMap<InstanceKey, ScriptInstance>,
    /// Environment tables by instance identity.
    registry: FxHashMap<InstanceId, LuaRegistryKey>,
}

/// `package.loaders` slot of the first host source, right after `package.preload`.
const FIRST_SOURCE_SLOT: usize = 2;

/// Marks a key as under construction until dropped.
struct InFlight<'a> {
    loading: &'a RefCell<FxHashSet<InstanceKey>>,
    key: InstanceKey,
}

impl<'a> InFlight<'a> {
    fn enter(loading: &'a RefCell<FxHashSet<InstanceKey>>, key: &InstanceKey) -> Result<Self, ScriptError> {
        if !loading.borrow_mut().insert(key.clone()) {
            return Err(ScriptError::Recursive(key.clone()));
        }
        Ok(Self {
            loading,
            key: key.clone(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.loading.borrow_mut().remove(&self.key);
    }
}

/// Lua interpreter hosting per-object script instances.
///
/// This is a `NonSend` resource because the Lua state is not thread-safe.
pub struct ScriptInterpreter {
    caches: RefCell<ScriptCaches>,
    loading: RefCell<FxHashSet<InstanceKey>>,
    bindings: Vec<Box<dyn ScriptBinding>>,
    sink: Rc<dyn MessageSink>,
    mode: ReportMode,
    next_id: Cell<u64>,
    /// Host sources installed so far; the next one goes after them.
    host_sources: Cell<usize>,
    /// `xpcall` captured at construction, immune to scripts replacing the global.
    xpcall: LuaFunction,
    lua: Lua,
}

impl ScriptInterpreter {
    /// Creates an interpreter that reports through the `log` crate.
    ///
    /// # Errors
    ///
    /// Returns an error if Lua initialization fails.
    pub fn new(mode: ReportMode) -> Result<Self, ScriptError> {
        Self::with_options(InterpreterOptions::new(mode))
    }

    /// Creates an interpreter, installs its sources and initializes every binding.
    ///
    /// # Errors
    ///
    /// Returns an error if Lua initialization, source installation or a
    /// binding's `init` fails.
    pub fn with_options(options: InterpreterOptions) -> Result<Self, ScriptError> {
        let InterpreterOptions {
            mode,
            sink,
            sources,
            bindings,
        } = options;

        // SAFETY: scripts are trusted game content; `debug` is needed for tracebacks.
        let lua = unsafe {
            Lua::unsafe_new_with(StdLib::ALL_SAFE | StdLib::DEBUG, LuaOptions::default())
        };
        let version: String = lua.globals().get("_VERSION")?;
        sink.emit(
            Level::Info,
            &format!(
                "=== This is lgscript {} using {}",
                env!("CARGO_PKG_VERSION"),
                version
            ),
        );
        lua.gc_stop();
        let xpcall: LuaFunction = lua.globals().get("xpcall")?;

        let interpreter = Self {
            caches: RefCell::new(ScriptCaches::default()),
            loading: RefCell::new(FxHashSet::default()),
            bindings,
            sink,
            mode,
            next_id: Cell::new(1),
            host_sources: Cell::new(0),
            xpcall,
            lua,
        };
        interpreter.install_print()?;
        for source in sources {
            interpreter.register_source(source)?;
        }
        for binding in &interpreter.bindings {
            binding.init(&interpreter.lua)?;
            interpreter.trace(format!("*** BINDING {}", binding.name()));
        }
        interpreter.lua.gc_restart();
        if cfg!(debug_assertions) {
            interpreter.lua.gc_collect()?;
            interpreter.trace_memory();
        }
        Ok(interpreter)
    }

    /// Replaces `print`: editor mode routes to the sink, runtime mode discards.
    fn install_print(&self) -> LuaResult<()> {
        let print = match self.mode {
            ReportMode::Editor => {
                let sink = self.sink.clone();
                self.lua.create_function(move |lua, args: LuaMultiValue| {
                    let tostring: LuaFunction = lua.globals().get("tostring")?;
                    let mut line = String::new();
                    for (i, arg) in args.into_iter().enumerate() {
                        let LuaValue::String(text) = tostring.call::<LuaValue>(arg)? else {
                            return Err(LuaError::runtime(
                                "'tostring' must return a string to 'print'",
                            ));
                        };
                        if i > 0 {
                            line.push('\t');
                        }
                        line.push_str(&text.to_string_lossy());
                    }
                    sink.emit(Level::Info, &line);
                    Ok(())
                })?
            }
            ReportMode::Runtime => self.lua.create_function(|_, _: LuaMultiValue| Ok(()))?,
        };
        self.lua.globals().set("print", print)
    }

    /// Adds a source strategy to `package.loaders`.
    ///
    /// Host sources are searched after `package.preload`, in registration
    /// order, and before the runtime's `package.path` and `package.cpath`
    /// searchers.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Config`] if `package.loaders` is not a table.
    pub fn register_source(&self, source: Rc<dyn ScriptSource>) -> Result<(), ScriptError> {
        let loaders = chunk::loaders(&self.lua)?;
        let position = FIRST_SOURCE_SLOT + self.host_sources.get();
        sources::install(&self.lua, &loaders, position, source)?;
        self.host_sources.set(self.host_sources.get() + 1);
        Ok(())
    }

    /// Returns the instance for `(name, obj_id)`, loading it on first use.
    ///
    /// A cache hit adds one reference. On any failure the problem is logged,
    /// nothing is cached and `None` is returned.
    pub fn load_script(&self, name: &str, obj_id: i32) -> Option<ScriptInstance> {
        let key = InstanceKey::new(name, obj_id);
        if let Some(instance) = self.instance_by_key(&key) {
            let refs = instance.add_ref();
            self.trace(format!("*** CACHE > {key} (refs {refs})"));
            return Some(instance);
        }
        match self.construct(key) {
            Ok(instance) => Some(instance),
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    fn construct(&self, key: InstanceKey) -> Result<ScriptInstance, ScriptError> {
        let _in_flight = InFlight::enter(&self.loading, &key)?;
        let chunk = self.chunk(key.name())?;
        let instance = ScriptInstance::new(self.next_identity(), key.clone());
        let handler = self.traceback_handler(Some(&instance))?;
        // A failed body leaves `instance` reachable only from its half-built
        // environment, which the collector reclaims.
        let env = environment::build(
            &self.lua,
            &chunk,
            &instance,
            &self.xpcall,
            &handler,
            &self.bindings,
        )?;
        let env_key = self.lua.create_registry_value(env)?;

        let mut caches = self.caches.borrow_mut();
        caches.instances.insert(key, instance.clone());
        caches.registry.insert(instance.id(), env_key);
        drop(caches);
        self.trace(format!("*** CACHE < {} {}", instance.key(), instance.id()));
        Ok(instance)
    }

    /// Cached chunk for `name`, compiling it through the loaders on a miss.
    fn chunk(&self, name: &str) -> Result<LuaFunction, ScriptError> {
        if let Some(key) = self.caches.borrow().chunks.get(name) {
            return Ok(self.lua.registry_value(key)?);
        }
        let chunk = chunk::find_chunk(&self.lua, name)?;
        let key = self.lua.create_registry_value(chunk.clone())?;
        self.caches.borrow_mut().chunks.insert(name.to_string(), key);
        self.trace(format!("*** CACHE < {name} (chunk)"));
        Ok(chunk)
    }

    fn next_identity(&self) -> InstanceId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        InstanceId::new(id)
    }

    fn report(&self, err: &ScriptError) {
        match err {
            ScriptError::NotFound { name, diagnostic } => {
                self.sink.emit(Level::Error, &format!("!!! Script not found [{name}]"));
                self.sink.emit(Level::Error, &format!("!!! {diagnostic}"));
            }
            // The traceback strategy already reported it, or stayed silent on purpose.
            ScriptError::Construction(_) => {}
            other => self.sink.emit(Level::Error, &format!("!!! {other}")),
        }
    }

    /// Releases one reference to `(name, obj_id)`.
    ///
    /// When the last reference goes, the instance and its environment leave
    /// the caches. The compiled chunk stays cached.
    pub fn unload_script(&self, name: &str, obj_id: i32) {
        let key = InstanceKey::new(name, obj_id);
        self.trace(format!("*** CACHE X {key}"));
        let mut caches = self.caches.borrow_mut();
        let Some(instance) = caches.instances.get(&key) else {
            drop(caches);
            self.sink.emit(
                Level::Warn,
                &format!("!!! Script not found. Possible memory leak. [{key}]"),
            );
            return;
        };
        let refs = instance.release();
        if refs > 0 {
            drop(caches);
            self.trace(format!("*** CACHE - {key} (refs {refs})"));
            return;
        }
        let Some(instance) = caches.instances.remove(&key) else {
            return;
        };
        let env_key = caches.registry.remove(&instance.id());
        drop(caches);

        if let Some(env_key) = env_key {
            if let Err(e) = self.lua.remove_registry_value(env_key) {
                self.sink.emit(Level::Error, &format!("!!! [{key}] {e}"));
            }
        }
        self.trace(format!("*** INSTANCE X {}", instance.id()));
        if cfg!(debug_assertions) && self.lua.gc_collect().is_ok() {
            self.trace_memory();
        }
    }

    /// Error handler for protected calls made on behalf of `instance`.
    pub fn traceback_handler(&self, instance: Option<&ScriptInstance>) -> LuaResult<LuaFunction> {
        traceback::handler(
            &self.lua,
            self.mode,
            self.sink.clone(),
            instance.map(|instance| instance.key().clone()),
        )
    }

    /// Calls `function` from the instance's environment under its traceback handler.
    ///
    /// Returns `None` if the function is not defined or raised an error.
    pub fn call_in(
        &self,
        instance: &ScriptInstance,
        function: &str,
        args: impl IntoLuaMulti,
    ) -> Option<LuaMultiValue> {
        match self.try_call_in(instance, function, args) {
            Ok(results) => results,
            Err(err) => {
                self.sink.emit(Level::Error, &format!("!!! [{}] {err}", instance.key()));
                None
            }
        }
    }

    fn try_call_in(
        &self,
        instance: &ScriptInstance,
        function: &str,
        args: impl IntoLuaMulti,
    ) -> Result<Option<LuaMultiValue>, ScriptError> {
        let env = self
            .environment(instance)
            .ok_or_else(|| ScriptError::NotLoaded(instance.key().clone()))?;
        let LuaValue::Function(func) = env.raw_get::<LuaValue>(function)? else {
            self.trace(format!("*** [{}] no function {function}", instance.key()));
            return Ok(None);
        };
        let handler = self.traceback_handler(Some(instance))?;
        let mut call_args = args.into_lua_multi(&self.lua)?;
        call_args.push_front(LuaValue::Function(handler));
        call_args.push_front(LuaValue::Function(func));
        let mut results = self.xpcall.call::<LuaMultiValue>(call_args)?;
        match results.pop_front() {
            Some(LuaValue::Boolean(true)) => Ok(Some(results)),
            _ => Ok(None),
        }
    }

    /// Environment table of a live instance.
    pub fn environment(&self, instance: &ScriptInstance) -> Option<LuaTable> {
        let caches = self.caches.borrow();
        let key = caches.registry.get(&instance.id())?;
        self.lua.registry_value(key).ok()
    }

    /// Live instance for `(name, obj_id)` without touching its reference count.
    pub fn instance(&self, name: &str, obj_id: i32) -> Option<ScriptInstance> {
        self.instance_by_key(&InstanceKey::new(name, obj_id))
    }

    fn instance_by_key(&self, key: &InstanceKey) -> Option<ScriptInstance> {
        self.caches.borrow().instances.get(key).cloned()
    }

    pub fn is_loaded(&self, name: &str, obj_id: i32) -> bool {
        self.caches
            .borrow()
            .instances
            .contains_key(&InstanceKey::new(name, obj_id))
    }

    pub fn is_chunk_cached(&self, name: &str) -> bool {
        self.caches.borrow().chunks.contains_key(name)
    }

    pub fn chunk_count(&self) -> usize {
        self.caches.borrow().chunks.len()
    }

    pub fn instance_count(&self) -> usize {
        self.caches.borrow().instances.len()
    }

    pub fn stats(&self) -> InterpreterStats {
        let caches = self.caches.borrow();
        InterpreterStats {
            chunks: caches.chunks.len(),
            instances: caches.instances.len(),
            environments: caches.registry.len(),
            memory_kb: self.lua.used_memory() / 1024,
        }
    }

    pub fn mode(&self) -> ReportMode {
        self.mode
    }

    /// Returns a reference to the underlying Lua state.
    ///
    /// Use this for advanced operations like registering custom userdata types.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    fn trace(&self, message: impl AsRef<str>) {
        self.sink.emit(Level::Debug, message.as_ref());
    }

    fn trace_memory(&self) {
        self.trace(format!("*** GCCOUNT {}Kb", self.lua.used_memory() / 1024));
    }
}

impl Drop for ScriptInterpreter {
    fn drop(&mut self) {
        if cfg!(debug_assertions) {
            let _ = self.lua.gc_collect();
            let (instances, environments) = {
                let caches = self.caches.borrow();
                (caches.instances.len(), caches.registry.len())
            };
            self.trace(format!("*** CACHE {instances} (should be 0)"));
            self.trace(format!("*** INSTANCE {environments} (should be 0)"));
            self.trace_memory();
        }
    }
}
