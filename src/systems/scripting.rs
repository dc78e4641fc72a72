//! Script lifecycle systems.
//!
//! - [`attach_scripts_system`] – loads instances for newly added [`Scripted`] components
//! - [`detach_scripts_system`] – unloads them when the component or entity goes away
//!
//! Both systems take the interpreter as a `NonSend` resource and must run on
//! the thread that created it.

use bevy_ecs::prelude::*;
use log::{debug, warn};

use crate::components::scripted::Scripted;
use crate::resources::attachedscripts::AttachedScripts;
use crate::resources::script_interpreter::{InstanceKey, ScriptInterpreter};

/// Loads every script listed on entities whose [`Scripted`] component was just added.
pub fn attach_scripts_system(
    query: Query<(Entity, &Scripted), Added<Scripted>>,
    interpreter: NonSend<ScriptInterpreter>,
    mut attached: ResMut<AttachedScripts>,
) {
    for (entity, scripted) in query.iter() {
        for name in &scripted.scripts {
            if interpreter.load_script(name, scripted.obj_id).is_some() {
                debug!("Attached script {}:{} to {:?}", name, scripted.obj_id, entity);
                attached.attach(entity, InstanceKey::new(name.as_str(), scripted.obj_id));
            } else {
                warn!(
                    "Entity {:?} failed to load script {}:{}",
                    entity, name, scripted.obj_id
                );
            }
        }
    }
}

/// Unloads the instances of entities that lost their [`Scripted`] component.
pub fn detach_scripts_system(
    mut removed: RemovedComponents<Scripted>,
    interpreter: NonSend<ScriptInterpreter>,
    mut attached: ResMut<AttachedScripts>,
) {
    for entity in removed.read() {
        for key in attached.detach(entity) {
            interpreter.unload_script(key.name(), key.obj_id());
            debug!("Detached script {} from {:?}", key, entity);
        }
    }
}
