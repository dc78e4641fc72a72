//! lgscript main entry point.
//!
//! A small host for per-object Lua scripts written in Rust using:
//! - **mlua + LuaJIT** for the script interpreter
//! - **bevy_ecs** for attaching script instances to entities
//!
//! The executable loads the requested scripts for a set of object ids, lets
//! them run their module bodies, optionally calls a handler in each instance
//! and unloads everything again.
//!
//! # Running
//!
//! ```sh
//! cargo run -- --editor --scripts ./scripts --call OnBeginScript door_open:42 lamp:7
//! ```

use bevy_ecs::prelude::*;
use clap::Parser;
use lgscript::components::scripted::Scripted;
use lgscript::resources::attachedscripts::AttachedScripts;
use lgscript::resources::interpreterconfig::InterpreterConfig;
use lgscript::resources::script_interpreter::{
    HostBinding, InterpreterOptions, ScriptInterpreter,
};
use lgscript::systems::scripting::{attach_scripts_system, detach_scripts_system};
use log::{debug, info, warn};
use std::path::PathBuf;

/// lgscript: per-object Lua script host
#[derive(Parser)]
#[command(version, about = "Loads Lua scripts as per-object instances and runs them.")]
struct Cli {
    /// Configuration file (default: ./lgscript.ini).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Report script errors with tracebacks and show `print` output.
    #[arg(long)]
    editor: bool,

    /// Directory scripts are loaded from, overriding the configuration.
    #[arg(long, value_name = "DIR")]
    scripts: Option<PathBuf>,

    /// Global function to call in every loaded instance.
    #[arg(long, value_name = "FUNCTION")]
    call: Option<String>,

    /// Print cache statistics as JSON before exiting.
    #[arg(long)]
    stats: bool,

    /// Scripts to load, as NAME or NAME:OBJID (object id defaults to 0).
    #[arg(value_name = "NAME[:OBJID]", required = true)]
    targets: Vec<String>,
}

/// Splits `NAME[:OBJID]` at its last colon.
fn parse_target(target: &str) -> Result<(String, i32), String> {
    match target.rsplit_once(':') {
        Some((name, id)) if !name.is_empty() => id
            .parse::<i32>()
            .map(|id| (name.to_string(), id))
            .map_err(|e| format!("invalid object id in '{target}': {e}")),
        Some(_) => Err(format!("missing script name in '{target}'")),
        None => Ok((target.to_string(), 0)),
    }
}

/// Groups targets by object id, keeping first-seen order.
fn group_targets(targets: &[(String, i32)]) -> Vec<Scripted> {
    let mut objects: Vec<Scripted> = Vec::new();
    for (name, obj_id) in targets {
        match objects.iter_mut().find(|s| s.obj_id == *obj_id) {
            Some(scripted) => scripted.scripts.push(name.clone()),
            None => objects.push(Scripted::new(*obj_id).with_script(name.as_str())),
        }
    }
    objects
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let targets = match cli
        .targets
        .iter()
        .map(|t| parse_target(t))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    // --------------- Configuration ---------------
    let mut config = match &cli.config {
        Some(path) => InterpreterConfig::with_path(path),
        None => InterpreterConfig::new(),
    };
    if let Err(e) = config.load_from_file() {
        if cli.config.is_some() {
            warn!("{e}");
        } else {
            debug!("{e}; using defaults");
        }
    }
    if cli.editor {
        config.editor = true;
    }
    if let Some(dir) = cli.scripts {
        config.script_dir = dir;
    }

    // --------------- Interpreter ---------------
    let options = InterpreterOptions::from_config(&config);
    let host = HostBinding::new(options.sink.clone());
    let interpreter = match ScriptInterpreter::with_options(options.with_binding(Box::new(host))) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("Error creating script interpreter: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "Script interpreter ready in {} mode, scripts from {:?}",
        if interpreter.mode().is_editor() { "editor" } else { "runtime" },
        config.script_dir
    );

    // --------------- ECS world + resources ---------------
    let mut world = World::new();
    world.insert_resource(config);
    world.insert_resource(AttachedScripts::default());
    world.insert_non_send_resource(interpreter);

    let mut schedule = Schedule::default();
    schedule.add_systems((attach_scripts_system, detach_scripts_system).chain());

    let entities: Vec<Entity> = group_targets(&targets)
        .into_iter()
        .map(|scripted| world.spawn(scripted).id())
        .collect();
    schedule.run(&mut world);

    {
        let attached = world.resource::<AttachedScripts>();
        let interpreter = world.non_send_resource::<ScriptInterpreter>();
        info!(
            "Loaded {} instance(s) for {} object(s)",
            interpreter.instance_count(),
            attached.len()
        );
        if let Some(function) = &cli.call {
            for (entity, keys) in attached.iter() {
                for key in keys {
                    let Some(instance) = interpreter.instance(key.name(), key.obj_id()) else {
                        continue;
                    };
                    if let Some(results) = interpreter.call_in(&instance, function, ()) {
                        debug!("{key} {function} on {entity:?} returned {} value(s)", results.len());
                    }
                }
            }
        }
    }

    for entity in entities {
        world.despawn(entity);
    }
    schedule.run(&mut world);

    if cli.stats {
        let stats = world.non_send_resource::<ScriptInterpreter>().stats();
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing stats: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_defaults_object_id() {
        assert_eq!(parse_target("door_open").unwrap(), ("door_open".to_string(), 0));
    }

    #[test]
    fn test_parse_target_splits_at_last_colon() {
        assert_eq!(parse_target("ns:door:42").unwrap(), ("ns:door".to_string(), 42));
        assert_eq!(parse_target("door:-1").unwrap(), ("door".to_string(), -1));
    }

    #[test]
    fn test_parse_target_rejects_bad_ids() {
        assert!(parse_target("door:abc").is_err());
        assert!(parse_target(":42").is_err());
    }

    #[test]
    fn test_group_targets_by_object() {
        let targets = vec![
            ("door_open".to_string(), 42),
            ("lamp".to_string(), 7),
            ("lockable".to_string(), 42),
        ];
        let objects = group_targets(&targets);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].obj_id, 42);
        assert_eq!(objects[0].scripts, vec!["door_open".to_string(), "lockable".to_string()]);
        assert_eq!(objects[1].scripts, vec!["lamp".to_string()]);
    }
}
