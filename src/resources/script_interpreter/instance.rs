//! Script instance handles and cache keys.

use mlua::prelude::*;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Instance cache key: one live instance per script name and owning object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    name: String,
    obj_id: i32,
}

impl InstanceKey {
    pub fn new(name: impl Into<String>, obj_id: i32) -> Self {
        Self {
            name: name.into(),
            obj_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn obj_id(&self) -> i32 {
        self.obj_id
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.obj_id)
    }
}

/// Opaque identity of a script instance, used as the identity registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(super) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct InstanceState {
    id: InstanceId,
    key: InstanceKey,
    refs: Cell<u32>,
}

/// Host-visible handle to one loaded script bound to one owning object.
///
/// Cloning the handle does not touch the reference count; only
/// [`load_script`](super::ScriptInterpreter::load_script) and
/// [`unload_script`](super::ScriptInterpreter::unload_script) do.
#[derive(Debug, Clone)]
pub struct ScriptInstance {
    inner: Rc<InstanceState>,
}

impl ScriptInstance {
    pub(super) fn new(id: InstanceId, key: InstanceKey) -> Self {
        Self {
            inner: Rc::new(InstanceState {
                id,
                key,
                refs: Cell::new(1),
            }),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    pub fn key(&self) -> &InstanceKey {
        &self.inner.key
    }

    pub fn name(&self) -> &str {
        self.inner.key.name()
    }

    pub fn obj_id(&self) -> i32 {
        self.inner.key.obj_id()
    }

    pub fn ref_count(&self) -> u32 {
        self.inner.refs.get()
    }

    /// True when both handles refer to the same instance.
    pub fn same_instance(&self, other: &ScriptInstance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(super) fn add_ref(&self) -> u32 {
        let refs = self.inner.refs.get().saturating_add(1);
        self.inner.refs.set(refs);
        refs
    }

    /// Drops one reference and returns how many remain.
    pub(super) fn release(&self) -> u32 {
        let refs = self.inner.refs.get().saturating_sub(1);
        self.inner.refs.set(refs);
        refs
    }
}

impl LuaUserData for ScriptInstance {
    fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| Ok(this.name().to_string()));
        fields.add_field_method_get("objid", |_, this| Ok(this.obj_id()));
        fields.add_field_method_get("refs", |_, this| Ok(this.ref_count()));
    }

    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
            Ok(format!("script: [{}] {}", this.key(), this.id()))
        });
    }
}
