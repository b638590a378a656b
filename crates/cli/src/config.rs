//! TOML config loading. The only place in the workspace allowed to parse a
//! config file; every other crate only ever sees the validated `Config`
//! struct `context-core` defines.

use std::path::{Path, PathBuf};

use context_core::{Config, ConfigError};

/// Default config file name looked up relative to the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "context-engine.toml";

/// Load and validate a config file, falling back to `Config::default()` (with
/// `watch_roots` set to the current directory) when no file is given and
/// `context-engine.toml` isn't present in the working directory.
pub fn load(path: Option<&Path>, cwd: &Path) -> Result<Config, ConfigError> {
  let resolved = path.map(PathBuf::from).or_else(|| {
    let candidate = cwd.join(DEFAULT_CONFIG_FILE);
    candidate.exists().then_some(candidate)
  });

  let mut config = match resolved {
    Some(file) => {
      let text = std::fs::read_to_string(&file).map_err(|source| ConfigError::Io { path: file.display().to_string(), source })?;
      toml::from_str::<Config>(&text).map_err(|err| ConfigError::Parse(err.to_string()))?
    }
    None => Config::default(),
  };

  if config.watch_roots.is_empty() {
    config.watch_roots.push(cwd.to_string_lossy().to_string());
  }
  config.validate()?;
  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_falls_back_to_defaulted_cwd() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = load(None, dir.path()).unwrap();
    assert_eq!(config.watch_roots, vec![dir.path().to_string_lossy().to_string()]);
  }

  #[test]
  fn explicit_path_that_does_not_exist_is_an_io_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = load(Some(&dir.path().join("missing.toml")), dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
  }

  #[test]
  fn parses_a_partial_toml_file_over_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("context-engine.toml");
    std::fs::write(&file, format!("watch_roots = [\"{}\"]\ndebounce_ms = 250\n", dir.path().display())).unwrap();
    let config = load(Some(&file), dir.path()).unwrap();
    assert_eq!(config.debounce_ms, 250);
    assert_eq!(config.embedding.dim, 384);
  }
}
