//! Command-line interface for almex.
//!
//! Provides commands for running the ambient host, managing the weekly
//! schedule, reviewing conversation history and inspecting configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    CommandNotifier, CommandSpeaker, GroqClient, LogNotifier, LogSpeaker, NotificationSink,
    SpeechSink,
};
use crate::audio::{InhibitWakeLock, NoopWakeLock, RecorderSource, WakeLock};
use crate::config::{ensure_home, ResolvedConfig};
use crate::core::{
    AmbientHost, Collaborators, Listener, RandomPhrases, ReminderEngine, ScheduleService,
    SystemClock,
};
use crate::store::{ConversationStore, SqliteStore};

pub mod schedule;

/// Fallback name used in spoken reminders
const DEFAULT_USER_NAME: &str = "friend";

/// almex - Ambient assistant with voice activation and schedule reminders
#[derive(Parser, Debug)]
#[command(name = "almex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ambient host (listener and reminders) until Ctrl+C
    Run {
        /// Do not start the audio listener
        #[arg(long)]
        no_listener: bool,

        /// Do not start the reminder engine
        #[arg(long)]
        no_reminders: bool,
    },

    /// Manage the weekly schedule
    Schedule {
        #[command(subcommand)]
        command: schedule::ScheduleCommands,
    },

    /// Show recent voice exchanges
    History {
        /// Maximum number of exchanges to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self, config: ResolvedConfig) -> Result<()> {
        match self.command {
            Commands::Run {
                no_listener,
                no_reminders,
            } => run_host(&config, !no_listener, !no_reminders).await,
            Commands::Schedule { command } => {
                let store = open_store(&config)?;
                schedule::execute(command, &ScheduleService::new(store))
            }
            Commands::History { limit } => show_history(&config, limit),
            Commands::Config => show_config(&config),
        }
    }
}

fn open_store(config: &ResolvedConfig) -> Result<Arc<SqliteStore>> {
    ensure_home(config)?;
    let path = config.database_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    Ok(Arc::new(store))
}

fn notification_sink(config: &ResolvedConfig) -> Arc<dyn NotificationSink> {
    match config.notifications.command.as_deref() {
        Some(command) => Arc::new(
            CommandNotifier::new(command, config.notifications.app_name.as_str())
                .with_timeout(config.reminders.delivery_timeout()),
        ),
        None => Arc::new(LogNotifier),
    }
}

fn speech_sink(config: &ResolvedConfig) -> Arc<dyn SpeechSink> {
    match config.speech.command.as_deref() {
        Some(command) => Arc::new(CommandSpeaker::new(command, config.speech.args.clone())),
        None => Arc::new(LogSpeaker),
    }
}

/// Wire everything together and run until Ctrl+C
async fn run_host(config: &ResolvedConfig, listener: bool, reminders: bool) -> Result<()> {
    let store = open_store(config)?;
    let speaker = speech_sink(config);
    let clock = Arc::new(SystemClock);
    let mut host = AmbientHost::new();

    if reminders && config.reminders.enabled {
        let user_name = config
            .assistant
            .user_name
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_NAME.to_string());
        host = host.with_reminders(ReminderEngine::new(
            store.clone(),
            notification_sink(config),
            speaker.clone(),
            clock.clone(),
            Arc::new(RandomPhrases),
            config.reminders.clone(),
            user_name,
        ));
    }

    if listener && config.listener.enabled {
        if config.groq.api_key.is_none() {
            tracing::warn!("GROQ_API_KEY is not set; captured speech will not be understood");
        }

        let groq = Arc::new(
            GroqClient::new(config.groq.clone(), &config.assistant)
                .context("Failed to create Groq client")?
                .with_schedules(store.clone()),
        );
        let wake_lock: Arc<dyn WakeLock> = if config.listener.wake_lock {
            Arc::new(InhibitWakeLock::new("Listening for voice commands"))
        } else {
            Arc::new(NoopWakeLock)
        };

        host = host.with_listener(Listener::new(
            Arc::new(RecorderSource::new(
                config.listener.recorder_command(),
                config.listener.frame_size,
            )),
            wake_lock,
            Collaborators {
                transcriber: groq.clone(),
                responder: groq,
                conversations: store.clone(),
                speaker,
            },
            clock,
            config.listener.clone(),
        ));
    }

    let handle = host.start();
    if handle.running().is_empty() {
        println!("Nothing to run: listener and reminders are both disabled");
        handle.stop().await;
        return Ok(());
    }

    println!("🎧 Almex running ({})", handle.running().join(", "));
    println!("    Press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!();
    println!("🛑 Stopping...");
    handle.stop().await;
    Ok(())
}

/// Show recent exchanges, newest first
fn show_history(config: &ResolvedConfig, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let turns = store.recent_turns(limit)?;

    if turns.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }

    for turn in turns {
        println!("[{}] {}", turn.id, turn.timestamp.format("%Y-%m-%d %H:%M"));
        println!("  You:   {}", turn.user_message);
        println!("  Almex: {}", turn.assistant_response);
        println!();
    }

    Ok(())
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("══════════════════════════════════════════════════════════════");
    println!("  Almex Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Database: {}", cfg.database_path().display());
    println!();
    println!("Reminders:");
    println!("  Enabled:          {}", cfg.reminders.enabled);
    println!("  Tick interval:    {}s", cfg.reminders.tick_interval_secs);
    println!("  Delivery timeout: {}s", cfg.reminders.delivery_timeout_secs);
    println!();
    println!("Listener:");
    println!("  Enabled:            {}", cfg.listener.enabled);
    println!("  Capture command:    {}", cfg.listener.recorder_command().join(" "));
    println!(
        "  Frame:              {} samples @ {} Hz",
        cfg.listener.frame_size, cfg.listener.sample_rate
    );
    println!(
        "  Thresholds:         activity {} / wake {}",
        cfg.listener.activity_threshold,
        cfg.listener.wake_threshold()
    );
    println!("  Silence timeout:    {}ms", cfg.listener.silence_timeout_ms);
    println!("  Max capture:        {}s", cfg.listener.max_capture_secs);
    println!("  Wake lock:          {}", cfg.listener.wake_lock);
    println!();
    println!("Groq:");
    println!("  Base URL:       {}", cfg.groq.base_url);
    println!("  Chat model:     {}", cfg.groq.model);
    println!("  Whisper model:  {}", cfg.groq.transcription_model);
    println!(
        "  API key:        {}",
        if cfg.groq.api_key.is_some() { "set" } else { "(not set)" }
    );
    println!();
    println!("Delivery:");
    println!(
        "  Notifications:  {}",
        cfg.notifications.command.as_deref().unwrap_or("(log only)")
    );
    println!(
        "  Speech:         {}",
        cfg.speech.command.as_deref().unwrap_or("(log only)")
    );

    Ok(())
}
