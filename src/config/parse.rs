//! Settings discovery and task file loading

use crate::config::schema::validate_document;
use crate::config::types::{Settings, TaskDocument};
use crate::error::{AutomatonError, ConfigError, ConfigResult};
use crate::runner::TaskDef;
use serde_yaml::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file names to search for
pub const SETTINGS_FILE_NAMES: &[&str] = &["automaton.yml", "automaton.yaml"];

/// Task file extensions picked up by [`load_task_directory`]
const TASK_FILE_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Find the settings file by searching current and parent directories
pub fn find_settings_file() -> ConfigResult<PathBuf> {
    find_settings_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the settings file starting from a specific directory
pub fn find_settings_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in SETTINGS_FILE_NAMES {
            let settings_path = current_dir.join(file_name);
            searched_paths.push(settings_path.display().to_string());

            if settings_path.is_file() {
                return Ok(settings_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse settings from a string
pub fn parse_settings(yaml: &str) -> Result<Settings, AutomatonError> {
    // An empty file is a valid, all-default settings file
    let settings: Settings = if yaml.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(yaml)?
    };
    settings.validate()?;
    Ok(settings)
}

/// Parse a settings file from a path
pub fn parse_settings_file(path: &Path) -> Result<Settings, AutomatonError> {
    let contents = read_file(path)?;
    parse_settings(&contents)
}

/// Load settings with automatic discovery, falling back to defaults, then
/// apply environment overrides
pub fn load_settings() -> Result<Settings, AutomatonError> {
    let settings = match find_settings_file() {
        Ok(path) => {
            tracing::debug!("Loading settings from: {}", path.display());
            parse_settings_file(&path)?
        }
        Err(ConfigError::NotFound(_)) => Settings::default(),
        Err(e) => return Err(e.into()),
    };

    Ok(settings.apply_env()?)
}

/// Parse and validate a task document from a string
pub fn parse_task(yaml: &str) -> Result<TaskDocument, AutomatonError> {
    let raw: Value = serde_yaml::from_str(yaml)?;
    validate_document(&raw)?;
    Ok(serde_yaml::from_value(raw)?)
}

/// Parse and validate a task document from a file
pub fn parse_task_file(path: &Path) -> Result<TaskDocument, AutomatonError> {
    let contents = read_file(path)?;
    parse_task(&contents)
}

/// Task files directly inside `dir`, sorted, excluding settings files
pub fn task_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let dir_str = dir.to_str().ok_or_else(|| {
        ConfigError::Invalid(format!("'{}' is not valid UTF-8", dir.display()))
    })?;
    let base = glob::Pattern::escape(dir_str);

    let mut files = Vec::new();
    for ext in TASK_FILE_EXTENSIONS {
        let pattern = format!("{}/*.{}", base, ext);
        let entries = glob::glob(&pattern)
            .map_err(|e| ConfigError::Invalid(format!("Bad pattern '{}': {}", pattern, e)))?;

        for entry in entries {
            let path = entry.map_err(|e| ConfigError::ReadFile {
                path: e.path().to_path_buf(),
                error: e.to_string(),
            })?;
            let is_settings = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| SETTINGS_FILE_NAMES.contains(&n));
            if path.is_file() && !is_settings {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Load every task document in a directory
///
/// A document without an `id` takes the file stem as its id.
pub fn load_task_directory(dir: &Path) -> Result<Vec<TaskDef>, AutomatonError> {
    let mut tasks = Vec::new();

    for path in task_files(dir)? {
        tracing::debug!("Loading task from: {}", path.display());
        let mut doc = parse_task_file(&path)?;

        if doc.id.is_none() {
            doc.id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string);
        }

        tasks.push(TaskDef::from_document(doc));
    }

    Ok(tasks)
}

fn read_file(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_settings() {
        let settings = parse_settings("verbosity: 1\ncolor: false").unwrap();
        assert_eq!(settings.verbosity, 1);
        assert!(!settings.color);

        assert_eq!(parse_settings("").unwrap(), Settings::default());
    }

    #[test]
    fn test_parse_settings_rejects_bad_values() {
        assert!(matches!(
            parse_settings("verbosity: -5"),
            Err(AutomatonError::Config(ConfigError::Invalid(_)))
        ));
        assert!(matches!(
            parse_settings("colour: true"),
            Err(AutomatonError::Yaml(_))
        ));
    }

    #[test]
    fn test_find_settings_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("automaton.yml");
        let sub_dir = temp_dir.path().join("tasks");

        fs::create_dir(&sub_dir).unwrap();
        fs::write(&settings_path, "debug: true\n").unwrap();

        let found = find_settings_file_from(sub_dir).unwrap();
        assert_eq!(found, settings_path);
        assert!(parse_settings_file(&found).unwrap().debug);
    }

    #[test]
    fn test_settings_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_settings_file_from(temp_dir.path().to_path_buf());
        // A settings file further up the real filesystem would be found too
        if let Err(e) = result {
            assert!(matches!(e, ConfigError::NotFound(_)));
        }
    }

    #[test]
    fn test_parse_task_validates_before_deserializing() {
        let err = parse_task("id: t\ntasks:\n  - task: 7").unwrap_err();
        match err {
            AutomatonError::Validation(v) => assert_eq!(v.field, "tasks[0].task"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_load_task_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("b-clean.yml"),
            "description: Clean\ntasks: []\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("a.yaml"),
            "id: build\ntasks:\n  - task: b-clean\n",
        )
        .unwrap();
        fs::write(temp_dir.path().join("automaton.yml"), "debug: true\n").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let tasks = load_task_directory(temp_dir.path()).unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.label().to_string()).collect();
        assert_eq!(ids, vec!["build", "b-clean"]);
    }

    #[test]
    fn test_load_task_directory_missing() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_task_directory(&temp_dir.path().join("nope"));
        assert!(matches!(
            result,
            Err(AutomatonError::Config(ConfigError::Invalid(_)))
        ));
    }
}
