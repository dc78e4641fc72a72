//! ECS Scripting Integration Tests
//!
//! These tests run the attach and detach systems in a schedule and check that
//! script instances follow the lifetime of their [`Scripted`] entities.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test ecs_scripting_integration
//! ```

use bevy_ecs::prelude::*;
use lgscript::components::scripted::Scripted;
use lgscript::resources::attachedscripts::AttachedScripts;
use lgscript::resources::interpreterconfig::InterpreterConfig;
use lgscript::resources::script_interpreter::{
    InstanceKey, InterpreterOptions, MemorySink, MemorySource, ReportMode, ScriptInterpreter,
};
use lgscript::systems::scripting::{attach_scripts_system, detach_scripts_system};
use std::fs;
use std::rc::Rc;

// =============================================================================
// Helpers
// =============================================================================

fn world_with(interpreter: ScriptInterpreter) -> (World, Schedule) {
    let mut world = World::new();
    world.insert_resource(AttachedScripts::default());
    world.insert_non_send_resource(interpreter);
    let mut schedule = Schedule::default();
    schedule.add_systems((attach_scripts_system, detach_scripts_system).chain());
    (world, schedule)
}

fn memory_interpreter() -> ScriptInterpreter {
    let source = MemorySource::new()
        .with_script("door_open", "opened = false")
        .with_script("lockable", "locked = true");
    let options = InterpreterOptions::new(ReportMode::Runtime)
        .with_sink(Rc::new(MemorySink::default()))
        .with_source(Rc::new(source));
    ScriptInterpreter::with_options(options).unwrap()
}

// =============================================================================
// Attach / Detach
// =============================================================================

#[test]
fn test_spawn_attaches_and_despawn_detaches() {
    let (mut world, mut schedule) = world_with(memory_interpreter());
    let door = world
        .spawn(Scripted::new(42).with_script("door_open").with_script("lockable"))
        .id();
    schedule.run(&mut world);

    {
        let interp = world.non_send_resource::<ScriptInterpreter>();
        assert!(interp.is_loaded("door_open", 42));
        assert!(interp.is_loaded("lockable", 42));
        let attached = world.resource::<AttachedScripts>();
        assert_eq!(
            attached.keys(door),
            &[InstanceKey::new("door_open", 42), InstanceKey::new("lockable", 42)]
        );
    }

    world.despawn(door);
    schedule.run(&mut world);

    let interp = world.non_send_resource::<ScriptInterpreter>();
    assert_eq!(interp.instance_count(), 0);
    assert_eq!(interp.chunk_count(), 2);
    assert!(world.resource::<AttachedScripts>().is_empty());
}

#[test]
fn test_attach_runs_once_per_component() {
    let (mut world, mut schedule) = world_with(memory_interpreter());
    world.spawn(Scripted::new(1).with_script("door_open"));
    schedule.run(&mut world);
    schedule.run(&mut world);

    let interp = world.non_send_resource::<ScriptInterpreter>();
    let door = interp.instance("door_open", 1).unwrap();
    assert_eq!(door.ref_count(), 1);
}

#[test]
fn test_entities_sharing_an_object_share_the_instance() {
    let (mut world, mut schedule) = world_with(memory_interpreter());
    let a = world.spawn(Scripted::new(7).with_script("door_open")).id();
    world.spawn(Scripted::new(7).with_script("door_open"));
    schedule.run(&mut world);

    assert_eq!(
        world
            .non_send_resource::<ScriptInterpreter>()
            .instance("door_open", 7)
            .unwrap()
            .ref_count(),
        2
    );

    world.entity_mut(a).remove::<Scripted>();
    schedule.run(&mut world);

    let interp = world.non_send_resource::<ScriptInterpreter>();
    let shared = interp.instance("door_open", 7).unwrap();
    assert_eq!(shared.ref_count(), 1);
    assert_eq!(world.resource::<AttachedScripts>().len(), 1);
}

#[test]
fn test_missing_script_is_not_recorded() {
    let (mut world, mut schedule) = world_with(memory_interpreter());
    let entity = world
        .spawn(Scripted::new(3).with_script("ghost").with_script("lockable"))
        .id();
    schedule.run(&mut world);

    let attached = world.resource::<AttachedScripts>();
    assert_eq!(attached.keys(entity), &[InstanceKey::new("lockable", 3)]);
}

#[test]
fn test_scripts_load_from_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lamp.lua"), "lit = script.objid > 0").unwrap();
    let mut config = InterpreterConfig::new();
    config.script_dir = dir.path().to_path_buf();
    let options = InterpreterOptions::from_config(&config).with_sink(Rc::new(MemorySink::default()));
    let (mut world, mut schedule) = world_with(ScriptInterpreter::with_options(options).unwrap());

    world.spawn(Scripted::new(5).with_script("lamp"));
    schedule.run(&mut world);

    let interp = world.non_send_resource::<ScriptInterpreter>();
    let lamp = interp.instance("lamp", 5).unwrap();
    let env = interp.environment(&lamp).unwrap();
    assert!(env.raw_get::<bool>("lit").unwrap());
}
