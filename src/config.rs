//! Configuration for the assistant.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ALMEX_HOME, GROQ_API_KEY, ALMEX_GROQ_MODEL)
//! 2. Config file (.almex/config.yaml)
//! 3. Defaults (~/.almex)
//!
//! Config file discovery:
//! - Searches current directory and parents for .almex/config.yaml
//! - `paths.home` in the config file is relative to the .almex/ directory
//!
//! The resolved configuration is loaded once by the binary and passed down
//! explicitly; nothing in the library reads it from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub assistant: AssistantSettings,
    #[serde(default)]
    pub reminders: ReminderSettings,
    #[serde(default)]
    pub listener: ListenerSettings,
    #[serde(default)]
    pub groq: GroqSettings,
    #[serde(default)]
    pub speech: SpeechSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .almex/)
    pub home: Option<String>,
}

/// Persona settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    /// Name used when addressing the user in spoken reminders
    pub user_name: Option<String>,
}

/// Reminder engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    pub enabled: bool,

    /// Seconds between schedule polls (default: 60)
    pub tick_interval_secs: u64,

    /// Upper bound for a single delivery call (default: 10)
    pub delivery_timeout_secs: u64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: 60,
            delivery_timeout_secs: 10,
        }
    }
}

impl ReminderSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs.max(1))
    }
}

/// Audio activation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerSettings {
    pub enabled: bool,

    /// Capture rate in Hz (default: 16000)
    pub sample_rate: u32,

    /// Samples per analysed frame (default: 1024)
    pub frame_size: usize,

    /// Base activity threshold on normalized RMS energy (default: 0.02)
    pub activity_threshold: f32,

    /// Wake threshold as a multiple of the activity threshold (default: 2.0)
    pub wake_multiplier: f32,

    /// Silence that ends an active-listening window, in milliseconds
    /// (default: 10000)
    pub silence_timeout_ms: u64,

    /// Hard cap on one active-listening window, in seconds (default: 60)
    pub max_capture_secs: u64,

    /// Delay before reacquiring the microphone after a device failure
    pub retry_delay_secs: u64,

    /// Speak the assistant's reply after each exchange
    pub speak_responses: bool,

    /// Recorder command producing raw S16_LE mono PCM on stdout. The rate
    /// argument is appended from `sample_rate` unless the command sets one.
    pub capture_command: Vec<String>,

    /// Hold a sleep inhibitor while listening
    pub wake_lock: bool,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 16_000,
            frame_size: 1024,
            activity_threshold: 0.02,
            wake_multiplier: 2.0,
            silence_timeout_ms: 10_000,
            max_capture_secs: 60,
            retry_delay_secs: 5,
            speak_responses: true,
            capture_command: vec![
                "arecord".to_string(),
                "-q".to_string(),
                "-t".to_string(),
                "raw".to_string(),
                "-f".to_string(),
                "S16_LE".to_string(),
                "-c".to_string(),
                "1".to_string(),
            ],
            wake_lock: true,
        }
    }
}

impl ListenerSettings {
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    pub fn max_capture(&self) -> Duration {
        Duration::from_secs(self.max_capture_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs.max(1))
    }

    pub fn wake_threshold(&self) -> f32 {
        self.activity_threshold * self.wake_multiplier
    }

    /// Rate given explicitly in `capture_command` (`-r N`, `--rate N` or
    /// `--rate=N`), if any
    fn explicit_rate(&self) -> Option<&str> {
        let mut args = self.capture_command.iter().skip(1);
        while let Some(arg) = args.next() {
            if arg == "-r" || arg == "--rate" {
                return args.next().map(String::as_str);
            }
            if let Some(rate) = arg.strip_prefix("--rate=") {
                return Some(rate);
            }
        }
        None
    }

    /// The command actually spawned, recording at `sample_rate`
    pub fn recorder_command(&self) -> Vec<String> {
        let mut command = self.capture_command.clone();
        if self.explicit_rate().is_none() && !command.is_empty() {
            command.push("-r".to_string());
            command.push(self.sample_rate.to_string());
        }
        command
    }

    /// Reject a capture command whose rate disagrees with `sample_rate`;
    /// the WAV header is written from `sample_rate`.
    fn check_capture_rate(&self) -> Result<()> {
        if let Some(rate) = self.explicit_rate() {
            if rate.parse::<u32>().ok() != Some(self.sample_rate) {
                bail!(
                    "listener.capture_command records at {} but listener.sample_rate is {}",
                    rate,
                    self.sample_rate
                );
            }
        }
        Ok(())
    }
}

/// Groq (OpenAI-compatible) API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroqSettings {
    pub base_url: String,
    pub model: String,
    pub transcription_model: String,
    /// Transcription language hint (ISO-639-1), omitted when unset
    pub language: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Only ever read from GROQ_API_KEY
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GroqSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama3-8b-8192".to_string(),
            transcription_model: "whisper-large-v3".to_string(),
            language: None,
            max_tokens: 150,
            temperature: 0.7,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl GroqSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Text-to-speech settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// TTS program; the utterance is passed as the last argument.
    /// `None` logs utterances instead of speaking them.
    pub command: Option<String>,
    pub args: Vec<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            command: Some("espeak-ng".to_string()),
            args: vec!["-v".to_string(), "es".to_string()],
        }
    }
}

/// Desktop notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Notification program (notify-send compatible). `None` logs instead.
    pub command: Option<String>,
    pub app_name: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            command: Some("notify-send".to_string()),
            app_name: "Almex".to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the state directory
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub assistant: AssistantSettings,
    pub reminders: ReminderSettings,
    pub listener: ListenerSettings,
    pub groq: GroqSettings,
    pub speech: SpeechSettings,
    pub notifications: NotificationSettings,
}

impl ResolvedConfig {
    /// SQLite database holding schedules and conversation history
    pub fn database_path(&self) -> PathBuf {
        self.home.join("almex.db")
    }

    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let config_file = find_config_file();
        let (file, base) = match config_file {
            Some(ref path) => (load_config_file(path)?, path.parent().map(Path::to_path_buf)),
            None => (ConfigFile::default(), None),
        };
        resolve(file, config_file, base, |key| std::env::var(key).ok())
    }

}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".almex").join("config.yaml");
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
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse config YAML
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(serde_yaml::from_str(content)?)
}

/// Resolve a path that may be relative to the config file's directory
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

/// Merge file values, environment, and defaults
fn resolve(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    base: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let home = if let Some(env_home) = env("ALMEX_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(home_path), Some(base)) = (file.paths.home.as_deref(), base.as_deref()) {
        resolve_path(base, home_path)
    } else {
        dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".almex")
    };

    let mut groq = file.groq;
    groq.api_key = env("GROQ_API_KEY").filter(|k| !k.trim().is_empty());
    if let Some(model) = env("ALMEX_GROQ_MODEL") {
        groq.model = model;
    }

    file.listener.check_capture_rate()?;

    Ok(ResolvedConfig {
        home,
        config_file,
        assistant: file.assistant,
        reminders: file.reminders,
        listener: file.listener,
        groq,
        speech: file.speech,
        notifications: file.notifications,
    })
}

/// Ensure the state directory exists
pub fn ensure_home(config: &ResolvedConfig) -> Result<()> {
    std::fs::create_dir_all(&config.home)
        .with_context(|| format!("Failed to create {}", config.home.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_file_is_empty() {
        let file = parse_config("version: \"1\"\n").unwrap();
        let config = resolve(file, None, None, env_of(&[("ALMEX_HOME", "/tmp/almex")])).unwrap();

        assert_eq!(config.home, PathBuf::from("/tmp/almex"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/almex/almex.db"));
        assert_eq!(config.reminders.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.listener.silence_timeout(), Duration::from_secs(10));
        assert!((config.listener.wake_threshold() - 0.04).abs() < f32::EPSILON);
        assert!(config.groq.api_key.is_none());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let yaml = r#"
version: "1"
reminders:
  tick_interval_secs: 5
listener:
  silence_timeout_ms: 1500
  speak_responses: false
groq:
  model: llama-3.1-8b-instant
"#;
        let file = parse_config(yaml).unwrap();
        let config = resolve(
            file,
            None,
            None,
            env_of(&[("ALMEX_HOME", "/x"), ("GROQ_API_KEY", "gsk_test")]),
        )
        .unwrap();

        assert_eq!(config.reminders.tick_interval(), Duration::from_secs(5));
        assert!(config.reminders.enabled);
        assert_eq!(config.listener.silence_timeout(), Duration::from_millis(1500));
        assert_eq!(config.listener.frame_size, 1024);
        assert!(!config.listener.speak_responses);
        assert_eq!(config.groq.model, "llama-3.1-8b-instant");
        assert_eq!(config.groq.max_tokens, 150);
        assert_eq!(config.groq.api_key.as_deref(), Some("gsk_test"));
    }

    #[test]
    fn test_env_model_override() {
        let config = resolve(
            ConfigFile::default(),
            None,
            None,
            env_of(&[("ALMEX_HOME", "/x"), ("ALMEX_GROQ_MODEL", "other")]),
        )
        .unwrap();
        assert_eq!(config.groq.model, "other");
    }

    #[test]
    fn test_recorder_rate_follows_sample_rate() {
        let file = parse_config("listener:\n  sample_rate: 8000\n").unwrap();
        let config = resolve(file, None, None, env_of(&[("ALMEX_HOME", "/x")])).unwrap();

        let command = config.listener.recorder_command();
        assert_eq!(command[0], "arecord");
        assert_eq!(&command[command.len() - 2..], ["-r", "8000"]);
    }

    #[test]
    fn test_explicit_rate_kept_when_consistent() {
        let yaml = "listener:\n  sample_rate: 22050\n  capture_command: [rec, --rate=22050]\n";
        let file = parse_config(yaml).unwrap();
        let config = resolve(file, None, None, env_of(&[("ALMEX_HOME", "/x")])).unwrap();
        assert_eq!(config.listener.recorder_command(), vec!["rec", "--rate=22050"]);
    }

    #[test]
    fn test_mismatched_capture_rate_rejected() {
        let yaml = "listener:\n  sample_rate: 8000\n  capture_command: [arecord, -r, \"16000\"]\n";
        let file = parse_config(yaml).unwrap();
        let err = resolve(file, None, None, env_of(&[("ALMEX_HOME", "/x")])).unwrap_err();
        assert!(err.to_string().contains("records at 16000"));
    }

    #[test]
    fn test_home_relative_to_config_dir() {
        let temp = tempfile::tempdir().unwrap();
        let file = parse_config("paths:\n  home: state\n").unwrap();
        let config = resolve(file, None, Some(temp.path().to_path_buf()), env_of(&[])).unwrap();
        assert_eq!(config.home, temp.path().join("state"));
    }
}
