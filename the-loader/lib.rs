pub mod config;

use std::{
  path::{
    Path,
    PathBuf,
  },
  sync::OnceLock,
};

use etcetera::base_strategy::{
  BaseStrategy,
  choose_base_strategy,
};

const APP_DIR: &str = "the-notes";

/// Name of the per-workspace directory holding local overrides.
pub const WORKSPACE_DIR: &str = ".the-notes";

static CONFIG_FILE: OnceLock<PathBuf> = OnceLock::new();

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

pub fn initialize_config_file(specified_file: Option<PathBuf>) {
  let config_file = specified_file.unwrap_or_else(default_config_file);
  ensure_parent_dir(&config_file);
  CONFIG_FILE.set(config_file).ok();
}

pub fn initialize_log_file(specified_file: Option<PathBuf>) {
  let log_file = specified_file.unwrap_or_else(default_log_file);
  ensure_parent_dir(&log_file);
  LOG_FILE.set(log_file).ok();
}

#[derive(Clone, Copy)]
enum BaseKind {
  Config,
  Data,
  Cache,
}

/// Resolve a base directory: the env override if set, otherwise the
/// platform directory for `kind`, otherwise the working directory.
fn base_dir(env_var: &str, kind: BaseKind) -> PathBuf {
  if let Ok(dir) = std::env::var(env_var) {
    return expand_tilde(Path::new(&dir));
  }
  match choose_base_strategy() {
    Ok(strategy) => {
      let base = match kind {
        BaseKind::Config => strategy.config_dir(),
        BaseKind::Data => strategy.data_dir(),
        BaseKind::Cache => strategy.cache_dir(),
      };
      base.join(APP_DIR)
    },
    Err(err) => {
      log::warn!("no home directory ({err}), falling back to the working directory");
      PathBuf::from(".").join(APP_DIR)
    },
  }
}

pub fn config_dir() -> PathBuf {
  base_dir("THE_NOTES_CONFIG_DIR", BaseKind::Config)
}

pub fn data_dir() -> PathBuf {
  base_dir("THE_NOTES_DATA_DIR", BaseKind::Data)
}

pub fn cache_dir() -> PathBuf {
  base_dir("THE_NOTES_CACHE_DIR", BaseKind::Cache)
}

/// Default location of the note store.
pub fn notes_dir() -> PathBuf {
  data_dir().join("notes")
}

/// Default location of user themes (`<name>.css`, plus `assets/`).
pub fn themes_dir() -> PathBuf {
  config_dir().join("themes")
}

pub fn config_file() -> PathBuf {
  CONFIG_FILE
    .get_or_init(|| {
      let path = default_config_file();
      ensure_parent_dir(&path);
      path
    })
    .clone()
}

pub fn log_file() -> PathBuf {
  LOG_FILE
    .get_or_init(|| {
      let path = default_log_file();
      ensure_parent_dir(&path);
      path
    })
    .clone()
}

pub fn workspace_config_file() -> PathBuf {
  find_workspace().0.join(WORKSPACE_DIR).join("config.toml")
}

pub fn default_log_file() -> PathBuf {
  cache_dir().join("the-notes.log")
}

/// Expand a leading `~` to the home directory. Paths without one, or with no
/// resolvable home directory, come back unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let Ok(rest) = path.strip_prefix("~") else {
    return path.to_owned();
  };
  match etcetera::home_dir() {
    Ok(home) => home.join(rest),
    Err(_) => path.to_owned(),
  }
}

/// Merge two TOML documents, merging values from `right` onto `left`
///
/// `merge_depth` sets the nesting depth up to which values are merged instead
/// of overridden. Tables present on both sides are unioned key by key with
/// `right` winning; arrays of tables are matched up by their `name` key.
///
/// `merge_toml_values(global, local, 3)` turns
///
/// ```toml
/// # global
/// theme = "github"
/// [session.autosave]
/// enable = true
/// after-delay-ms = 1500
/// ```
///
/// and
///
/// ```toml
/// # local
/// [session.autosave]
/// after-delay-ms = 500
/// ```
///
/// into a config with `theme = "github"`, autosave enabled, and a 500ms delay.
pub fn merge_toml_values(left: toml::Value, right: toml::Value, merge_depth: usize) -> toml::Value {
  use toml::Value;

  fn get_name(v: &Value) -> Option<&str> {
    v.get("name").and_then(Value::as_str)
  }

  match (left, right) {
    (Value::Array(mut left_items), Value::Array(right_items)) => {
      if merge_depth > 0 {
        left_items.reserve(right_items.len());
        for rvalue in right_items {
          let lvalue = get_name(&rvalue)
            .and_then(|rname| left_items.iter().position(|v| get_name(v) == Some(rname)))
            .map(|lpos| left_items.remove(lpos));
          let mvalue = match lvalue {
            Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
            None => rvalue,
          };
          left_items.push(mvalue);
        }
        Value::Array(left_items)
      } else {
        Value::Array(right_items)
      }
    },
    (Value::Table(mut left_map), Value::Table(right_map)) => {
      if merge_depth > 0 {
        for (rname, rvalue) in right_map {
          let merged = match left_map.remove(&rname) {
            Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
            None => rvalue,
          };
          left_map.insert(rname, merged);
        }
        Value::Table(left_map)
      } else {
        Value::Table(right_map)
      }
    },
    (_, value) => value,
  }
}

/// Finds the current workspace folder.
///
/// Searches upward from the CWD for a directory containing `.the-notes` or
/// `.git`. Returns `(workspace, false)` on success, `(CWD, true)` otherwise.
pub fn find_workspace() -> (PathBuf, bool) {
  match std::env::current_dir() {
    Ok(current_dir) => find_workspace_in(current_dir),
    Err(_) => (PathBuf::new(), true),
  }
}

pub fn find_workspace_in(dir: impl AsRef<Path>) -> (PathBuf, bool) {
  let dir = dir.as_ref();
  for ancestor in dir.ancestors() {
    if ancestor.join(WORKSPACE_DIR).exists() || ancestor.join(".git").exists() {
      return (ancestor.to_owned(), false);
    }
  }

  (dir.to_owned(), true)
}

fn default_config_file() -> PathBuf {
  config_dir().join("config.toml")
}

fn ensure_parent_dir(path: &Path) {
  if let Some(parent) = path.parent()
    && !parent.exists()
  {
    std::fs::create_dir_all(parent).ok();
  }
}
