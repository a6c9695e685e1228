//! Configuration for the intake service.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (YESSIR_*, LLM_*, STT_*, DB_NAME, ...)
//! 2. Config file (.yessir/config.yaml)
//! 3. Defaults
//!
//! API keys are read from the environment only.
//!
//! Config file discovery:
//! - Searches current directory and parents for .yessir/config.yaml
//! - `storage.home` is relative to the .yessir/ directory, `storage.db_path`
//!   to the project root

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, Serializer};

/// Directory holding the config file
pub const CONFIG_DIR: &str = ".yessir";

const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_DB_NAME: &str = "voice_assistant";
const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_SENDER: &str = "noreply@example.com";

const DEFAULT_LLM_URL: &str = "https://api.scaleway.ai/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "mistral-small-3.2-24b-instruct-2506";
const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_LLM_TEMPERATURE: f32 = 0.1;

const DEFAULT_STT_URL: &str = "https://api.scaleway.ai/v1/audio/transcriptions";
const DEFAULT_STT_MODEL: &str = "whisper-large-v3";
const DEFAULT_STT_TIMEOUT_SECONDS: u64 = 60;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub mail: MailSection,
    #[serde(default)]
    pub classifier: ServiceSection,
    #[serde(default)]
    pub transcription: ServiceSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    pub address: Option<String>,
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    /// State directory (relative to .yessir/)
    pub home: Option<String>,
    pub db_name: Option<String>,
    /// Database file (relative to the project root)
    pub db_path: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailSection {
    pub sender: Option<String>,
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceSection {
    pub url: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Only read for the classifier
    pub temperature: Option<f32>,
}

/// Resolved configuration
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub mail: MailSettings,
    pub classifier: ClassifierSettings,
    pub transcription: TranscriptionSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSettings {
    pub address: String,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageSettings {
    pub home: PathBuf,
    pub db_name: String,
    pub db_path: PathBuf,
    pub timeout_seconds: u64,
}

impl StorageSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MailSettings {
    pub sender: String,
    /// Reply address used when a command carries none
    pub default_recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifierSettings {
    #[serde(serialize_with = "serialize_masked")]
    pub api_key: Option<String>,
    pub url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionSettings {
    #[serde(serialize_with = "serialize_masked")]
    pub api_key: Option<String>,
    pub url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl TranscriptionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// YAML rendering with API keys masked
    pub fn to_masked_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to render configuration")
    }
}

/// Mask a secret, keeping the last four characters of long values
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    } else {
        "****".to_string()
    }
}

fn serialize_masked<S>(secret: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match secret {
        Some(secret) => serializer.serialize_str(&mask_secret(secret)),
        None => serializer.serialize_none(),
    }
}

/// Find config file by searching `start` and its parents
pub fn find_config_file_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Environment view that treats blank values as unset
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid {}={:?}: {}", name, raw, e)),
            None => Ok(None),
        }
    }
}

/// Resolve configuration from an optional config file and an env lookup.
///
/// `file` is the config file path together with its parsed contents.
pub fn resolve_with<F>(file: Option<(PathBuf, ConfigFile)>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };
    let (config_file, file) = match file {
        Some((path, parsed)) => (Some(path), parsed),
        None => (None, ConfigFile::default()),
    };

    // .yessir/ and the project root above it
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = config_dir.parent().unwrap_or(Path::new("."));

    let server = ServerSettings {
        address: env
            .get("YESSIR_ADDRESS")
            .or(file.server.address)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
        max_body_bytes: env
            .parse("YESSIR_MAX_BODY_BYTES")?
            .or(file.server.max_body_bytes)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES),
    };

    let home = match (env.get("YESSIR_HOME"), file.storage.home.as_deref()) {
        (Some(home), _) => PathBuf::from(home),
        (None, Some(home)) => resolve_path(config_dir, home),
        (None, None) => dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(CONFIG_DIR),
    };
    let db_name = env
        .get("DB_NAME")
        .or(file.storage.db_name)
        .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
    let db_path = match (env.get("YESSIR_DB_PATH"), file.storage.db_path.as_deref()) {
        (Some(path), _) => PathBuf::from(path),
        (None, Some(path)) => resolve_path(base_dir, path),
        (None, None) => home.join(format!("{}.sqlite3", db_name)),
    };
    let storage = StorageSettings {
        home,
        db_name,
        db_path,
        timeout_seconds: env
            .parse("STORE_TIMEOUT_SECONDS")?
            .or(file.storage.timeout_seconds)
            .unwrap_or(DEFAULT_STORE_TIMEOUT_SECONDS),
    };

    let sender = env
        .get("SENDER_EMAIL")
        .or(file.mail.sender)
        .unwrap_or_else(|| DEFAULT_SENDER.to_string());
    // Invites go back to the configured sender unless only the built-in one is known
    let default_recipient = env
        .get("RECIPIENT_EMAIL")
        .or(file.mail.recipient)
        .or_else(|| (sender != DEFAULT_SENDER).then(|| sender.clone()));
    let mail = MailSettings {
        sender,
        default_recipient,
    };

    let classifier = ClassifierSettings {
        api_key: env.get("LLM_API_KEY"),
        url: env
            .get("LLM_API_URL")
            .or(file.classifier.url)
            .unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
        model: env
            .get("LLM_MODEL")
            .or(file.classifier.model)
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        timeout_seconds: env
            .parse("LLM_TIMEOUT_SECONDS")?
            .or(file.classifier.timeout_seconds)
            .unwrap_or(DEFAULT_LLM_TIMEOUT_SECONDS),
        temperature: file
            .classifier
            .temperature
            .unwrap_or(DEFAULT_LLM_TEMPERATURE),
    };

    let transcription = TranscriptionSettings {
        api_key: env
            .get("STT_API_KEY")
            .or_else(|| env.get("SCALEWAY_API_KEY")),
        url: env
            .get("STT_API_URL")
            .or_else(|| env.get("SCALEWAY_API_URL"))
            .or(file.transcription.url)
            .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
        model: env
            .get("STT_MODEL")
            .or(file.transcription.model)
            .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
        timeout_seconds: env
            .parse("STT_TIMEOUT_SECONDS")?
            .or(file.transcription.timeout_seconds)
            .unwrap_or(DEFAULT_STT_TIMEOUT_SECONDS),
    };

    Ok(Config {
        config_file,
        server,
        storage,
        mail,
        classifier,
        transcription,
    })
}

/// Load configuration from all sources
pub fn load() -> Result<Config> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let file = match find_config_file_from(&cwd) {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            tracing::debug!(path = %path.display(), "Loaded config file");
            Some((path, parsed))
        }
        None => None,
    };

    resolve_with(file, |name| std::env::var(name).ok())
}
