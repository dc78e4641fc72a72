//! Interpreter configuration resource.
//!
//! Manages interpreter settings loaded from an INI configuration file.
//! Provides defaults for safe startup and methods to load/save configuration.
//!
//! # Configuration File Format
//!
//! ```ini
//! [interpreter]
//! editor = false
//!
//! [scripts]
//! path = ./scripts
//! extension = lua
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

/// Default safe values for startup
const DEFAULT_EDITOR: bool = false;
const DEFAULT_SCRIPT_DIR: &str = "./scripts";
const DEFAULT_EXTENSION: &str = "lua";
const DEFAULT_CONFIG_PATH: &str = "./lgscript.ini";

/// Interpreter configuration resource.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct InterpreterConfig {
    /// Verbose editor-mode error reporting and `print` output.
    pub editor: bool,
    /// Directory scripts are loaded from.
    pub script_dir: PathBuf,
    /// Script file extension, without the dot.
    pub extension: String,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpreterConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            editor: DEFAULT_EDITOR,
            script_dir: PathBuf::from(DEFAULT_SCRIPT_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;

        // [interpreter] section
        if let Some(editor) = config.getbool("interpreter", "editor").ok().flatten() {
            self.editor = editor;
        }

        // [scripts] section
        if let Some(path) = config.get("scripts", "path") {
            self.script_dir = PathBuf::from(path);
        }
        if let Some(extension) = config.get("scripts", "extension") {
            self.extension = extension.trim_start_matches('.').to_string();
        }

        info!(
            "Loaded config: editor={}, scripts={:?}, extension={}",
            self.editor, self.script_dir, self.extension
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        // [interpreter] section
        config.set("interpreter", "editor", Some(self.editor.to_string()));

        // [scripts] section
        config.set(
            "scripts",
            "path",
            Some(self.script_dir.to_string_lossy().into_owned()),
        );
        config.set("scripts", "extension", Some(self.extension.clone()));

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }
}
