///
/// # Runtime Settings
///
/// Process-wide configuration consumed by the runtime at `init`. Settings
/// come from an optional `progcall.toml` file and are then overridden by
/// environment variables:
///
/// | key | environment | meaning |
/// |-----|-------------|---------|
/// | `library_path` | `PROGCALL_LIBRARY_PATH` | directories searched for modules |
/// | `preload` | `PROGCALL_PRELOAD` | modules loaded eagerly at startup |
/// | `physical_cancel` | `PROGCALL_PHYSICAL_CANCEL` | allow cancel to unload modules |
/// | `load_case` | `PROGCALL_LOAD_CASE` | case of module file names (`off`, `lower`, `upper`) |
///
/// ## Example progcall.toml
///
/// ```toml
/// library_path = "/opt/app/modules:/opt/shared/modules"
/// preload = "utilities:dates"
/// physical_cancel = true
/// load_case = "lower"
/// ```
///
/// ## Effective Search Path
///
/// The working directory is always searched. When no library path is
/// configured (or it is just `.`) the search string is `.`; otherwise `.` is
/// appended after the configured directories. A non-`.` install directory is
/// appended last.
///

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::CallError;

/// Separator between entries of a path list.
pub const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Uniform case transform applied to module file names before the
/// filesystem search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NameConvert {
    #[default]
    Off,
    Lower,
    Upper,
}

impl NameConvert {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "off" | "none" | "0" => Some(NameConvert::Off),
            "lower" | "1" => Some(NameConvert::Lower),
            "upper" | "2" => Some(NameConvert::Upper),
            _ => None,
        }
    }

    pub fn apply(self, name: &str) -> String {
        match self {
            NameConvert::Off => name.to_string(),
            NameConvert::Lower => name.to_ascii_lowercase(),
            NameConvert::Upper => name.to_ascii_uppercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub library_path: Option<String>,
    pub preload: Option<String>,
    pub physical_cancel: bool,
    pub load_case: NameConvert,
    pub install_library_path: String,
    pub module_extension: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            library_path: None,
            preload: None,
            physical_cancel: false,
            load_case: NameConvert::Off,
            install_library_path: ".".to_string(),
            module_extension: std::env::consts::DLL_EXTENSION.to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, CallError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, CallError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CallError::Config {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Settings from the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, CallError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `PROGCALL_*` overrides obtained through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, CallError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("PROGCALL_LIBRARY_PATH") {
            self.library_path = Some(path);
        }
        if let Some(preload) = lookup("PROGCALL_PRELOAD") {
            self.preload = Some(preload);
        }
        if let Some(value) = lookup("PROGCALL_PHYSICAL_CANCEL") {
            self.physical_cancel = parse_bool(&value).ok_or_else(|| CallError::Config {
                source_name: "PROGCALL_PHYSICAL_CANCEL".to_string(),
                reason: format!("expected a boolean, got '{}'", value),
            })?;
        }
        if let Some(value) = lookup("PROGCALL_LOAD_CASE") {
            self.load_case = NameConvert::parse(&value).ok_or_else(|| CallError::Config {
                source_name: "PROGCALL_LOAD_CASE".to_string(),
                reason: format!("expected off, lower or upper, got '{}'", value),
            })?;
        }
        Ok(self)
    }

    /// The path list the search path is built from, with `.` and the install
    /// directory folded in and slashes normalized for the host.
    pub fn effective_library_path(&self) -> String {
        let sep = PATH_SEPARATOR;
        let install = self.install_library_path.as_str();
        let user = self.library_path.as_deref().filter(|p| !p.is_empty() && *p != ".");

        let combined = match (user, install == ".") {
            (None, true) => ".".to_string(),
            (None, false) => format!(".{}{}", sep, install),
            (Some(user), true) => format!("{}{}.", user, sep),
            (Some(user), false) => format!("{}{}.{}{}", user, sep, sep, install),
        };

        normalize_slashes(&combined)
    }
}

/// Rewrites the foreign directory separator into the host one.
pub fn normalize_slashes(path: &str) -> String {
    if cfg!(windows) {
        path.replace('/', "\\")
    } else {
        path.replace('\\', "/")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Some(true),
        "0" | "false" | "no" | "off" | "n" | "" => Some(false),
        _ => None,
    }
}
