//! User settings kept in `config.yaml`.
//!
//! The settings directory is `$CLIGPT_HOME` when set, otherwise `~/.cligpt`.
//! It also holds the session database.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{KnownModel, Model};

/// Environment variable that overrides the settings directory.
pub const HOME_ENV: &str = "CLIGPT_HOME";

const CONFIG_FILE: &str = "config.yaml";
const DATABASE_FILE: &str = "cligpt.db";
const TOKEN_PREFIX: &str = "sk-";
#[cfg(unix)]
const SETTINGS_MODE: u32 = 0o600;

/// Keyword that deactivates every persona.
pub const NO_PERSONA: &str = "none";

/// A named system instruction that seeds new sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub context: String,
    #[serde(default)]
    pub active: bool,
}

impl Persona {
    fn new(name: &str, context: &str) -> Self {
        Self {
            name: name.to_string(),
            context: context.to_string(),
            active: false,
        }
    }
}

/// Persistent user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Model used for chat and prompt requests.
    pub model: Model,

    /// API token; empty until the user sets one.
    pub token: String,

    /// Sampling temperature in `[0, 1]`; zero lets the server decide.
    pub temperature: f32,

    /// Reply length limit; zero lets the server decide.
    pub max_tokens: u32,

    /// Known personas, at most one of them active.
    pub personas: Vec<Persona>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: Model::Known(KnownModel::Gpt35Turbo),
            token: String::new(),
            temperature: 0.0,
            max_tokens: 0,
            personas: vec![
                Persona::new(
                    "developer",
                    "You provide short and concise answers about development in markdown.",
                ),
                Persona::new(
                    "writer",
                    "You are a writer who is creative and imaginative, you provide long and detailed answers.",
                ),
            ],
        }
    }
}

/// The settings directory for this user.
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(env::var_os(HOME_ENV), dirs::home_dir())
}

fn resolve_config_dir(override_dir: Option<OsString>, home: Option<PathBuf>) -> Result<PathBuf> {
    match override_dir {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => home.map(|home| home.join(".cligpt")).ok_or_else(|| {
            Error::configuration(
                format!("cannot determine the home directory; set {HOME_ENV}"),
                None,
            )
        }),
    }
}

/// Path of `config.yaml` inside `dir`.
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Path of the session database inside `dir`.
pub fn database_path(dir: &Path) -> PathBuf {
    dir.join(DATABASE_FILE)
}

impl Settings {
    /// Load settings from `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Self::default();
            settings.save(path)?;
            tracing::info!(path = %path.display(), "created default settings");
            return Ok(settings);
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("cannot read {}", path.display()), e))?;
        let settings: Self = serde_yaml::from_str(&content).map_err(|e| {
            Error::configuration(
                format!("{} is not valid settings YAML: {e}", path.display()),
                None,
            )
        })?;
        Ok(settings)
    }

    /// Write the settings to `path`, creating its directory.
    ///
    /// On unix the file is readable by its owner only, since it holds the
    /// API token.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("cannot create {}", parent.display()), e))?;
        }
        let content = serde_yaml::to_string(self)?;
        let cannot_write =
            |e: std::io::Error| Error::io(format!("cannot write {}", path.display()), e);

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(SETTINGS_MODE);
        }
        let mut file = options.open(path).map_err(cannot_write)?;
        // An existing file keeps its old mode through open()
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(SETTINGS_MODE))
                .map_err(cannot_write)?;
        }
        file.write_all(content.as_bytes()).map_err(cannot_write)?;
        Ok(())
    }

    pub fn set_token(&mut self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() || !token.starts_with(TOKEN_PREFIX) {
            return Err(Error::configuration(
                format!("an API token must start with {TOKEN_PREFIX:?}"),
                Some("token".to_string()),
            ));
        }
        self.token = token.to_string();
        Ok(())
    }

    /// Accepts `chatgpt`, `gpt4` or a full model id, in any case.
    pub fn set_model(&mut self, name: &str) -> Result<()> {
        let model: KnownModel = name.trim().parse().map_err(|_| {
            Error::configuration(
                format!(
                    "unknown model {name:?}; choose one of {}",
                    KnownModel::ALL
                        .iter()
                        .map(|m| format!("{} ({m})", m.alias()))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                Some("model".to_string()),
            )
        })?;
        self.model = Model::Known(model);
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(Error::configuration(
                "temperature must be between 0 and 1",
                Some("temperature".to_string()),
            ));
        }
        self.temperature = temperature;
        Ok(())
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = max_tokens;
    }

    /// Add an inactive persona.
    pub fn add_persona(&mut self, name: &str, context: &str) -> Result<()> {
        let (name, context) = (name.trim(), context.trim());
        if name.is_empty() || context.is_empty() {
            return Err(Error::configuration(
                "a persona needs both a name and a context",
                Some("persona".to_string()),
            ));
        }
        if name.eq_ignore_ascii_case(NO_PERSONA) || self.persona(name).is_some() {
            return Err(Error::configuration(
                format!("a persona named {name:?} already exists"),
                Some("persona".to_string()),
            ));
        }
        self.personas.push(Persona::new(name, context));
        Ok(())
    }

    /// Make `name` the only active persona; `none` deactivates them all.
    pub fn activate_persona(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(NO_PERSONA) {
            for persona in &mut self.personas {
                persona.active = false;
            }
            return Ok(());
        }
        if self.persona(name).is_none() {
            return Err(Error::configuration(
                format!("no persona named {name:?}"),
                Some("persona".to_string()),
            ));
        }
        for persona in &mut self.personas {
            persona.active = persona.name == name;
        }
        Ok(())
    }

    pub fn persona(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name == name)
    }

    pub fn active_persona(&self) -> Option<&Persona> {
        self.personas.iter().find(|p| p.active)
    }

    /// The API token, or a configuration error if none is set.
    pub fn require_token(&self) -> Result<&str> {
        if self.token.is_empty() {
            return Err(Error::configuration(
                "no API token configured; run `cligpt token` first",
                Some("token".to_string()),
            ));
        }
        Ok(&self.token)
    }
}
