//! Script attachment component.
//!
//! The [`Scripted`] component lists the scripts an entity runs and the object
//! id its instances are keyed by. Instances are loaded by
//! [`attach_scripts_system`](crate::systems::scripting::attach_scripts_system)
//! when the component is added and unloaded by
//! [`detach_scripts_system`](crate::systems::scripting::detach_scripts_system)
//! when it is removed or the entity is despawned.
//!
//! # Example
//!
//! ```
//! use lgscript::components::scripted::Scripted;
//!
//! let door = Scripted::new(42).with_script("door_open").with_script("lockable");
//! assert_eq!(door.scripts.len(), 2);
//! ```

use bevy_ecs::prelude::Component;

/// Scripts attached to a host object.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Scripted {
    /// Host object id passed to every instance as `script.objid`.
    pub obj_id: i32,
    /// Script names, loaded in order.
    pub scripts: Vec<String>,
}

impl Scripted {
    pub fn new(obj_id: i32) -> Self {
        Self {
            obj_id,
            scripts: Vec::new(),
        }
    }

    pub fn with_script(mut self, name: impl Into<String>) -> Self {
        self.scripts.push(name.into());
        self
    }
}
