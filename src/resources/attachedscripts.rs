//! Bookkeeping of script instances held by entities.
//!
//! Removal events only carry the entity, so the instance keys each entity
//! loaded are remembered here until
//! [`detach_scripts_system`](crate::systems::scripting::detach_scripts_system)
//! unloads them.

use bevy_ecs::prelude::*;
use rustc_hash::FxHashMap;

use crate::resources::script_interpreter::InstanceKey;

/// Instance keys loaded on behalf of each entity.
#[derive(Resource, Debug, Default)]
pub struct AttachedScripts {
    by_entity: FxHashMap<Entity, Vec<InstanceKey>>,
}

impl AttachedScripts {
    pub fn attach(&mut self, entity: Entity, key: InstanceKey) {
        self.by_entity.entry(entity).or_default().push(key);
    }

    /// Forgets `entity` and returns the keys it held.
    pub fn detach(&mut self, entity: Entity) -> Vec<InstanceKey> {
        self.by_entity.remove(&entity).unwrap_or_default()
    }

    pub fn keys(&self, entity: Entity) -> &[InstanceKey] {
        self.by_entity.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Entity, &Vec<InstanceKey>)> {
        self.by_entity.iter()
    }

    /// Number of entities holding at least one instance.
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}
