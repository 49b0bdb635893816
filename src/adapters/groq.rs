//! Groq API client for transcription and chat completion.
//!
//! Groq exposes an OpenAI-compatible surface:
//! - `POST {base}/audio/transcriptions` (multipart WAV upload)
//! - `POST {base}/chat/completions` (JSON)
//!
//! As a [`Responder`], chat failures come back as a readable error sentence
//! rather than an error.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::{CollaboratorError, Responder, Transcriber};
use crate::config::{AssistantSettings, GroqSettings};
use crate::domain::render_summary;
use crate::store::ScheduleStore;

/// Words that make a prompt schedule-related
const SCHEDULE_KEYWORDS: &[&str] = &[
    "schedule",
    "agenda",
    "calendar",
    "what do i have",
    "planned",
    "appointment",
    "meeting",
    "activity",
    "task",
    "today",
    "tomorrow",
    "this week",
    "next",
    "free time",
    "horario",
    "qué tengo",
    "que tengo",
    "cita",
    "reunión",
    "hoy",
    "mañana",
];

/// Groq API client
pub struct GroqClient {
    settings: GroqSettings,
    persona: String,
    /// Source of schedule context for schedule-related prompts
    schedules: Option<Arc<dyn ScheduleStore>>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl GroqClient {
    /// Create a client; the HTTP timeout comes from `settings`
    pub fn new(
        settings: GroqSettings,
        assistant: &AssistantSettings,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            settings,
            persona: persona(assistant.user_name.as_deref()),
            schedules: None,
            client,
        })
    }

    /// Attach a schedule store used for schedule-related questions
    pub fn with_schedules(mut self, schedules: Arc<dyn ScheduleStore>) -> Self {
        self.schedules = Some(schedules);
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&str, CollaboratorError> {
        self.settings
            .api_key
            .as_deref()
            .ok_or(CollaboratorError::NotConfigured("GROQ_API_KEY"))
    }

    /// Build the system prompt for a message
    fn system_prompt(&self, message: &str, context: &str) -> String {
        let mut prompt = format!("{}\n\n{}", self.persona, context);

        if is_schedule_query(message) {
            match self.schedules.as_ref().map(|s| s.all_active_entries()) {
                Some(Ok(entries)) => {
                    prompt.push_str("\n\n");
                    prompt.push_str(&render_summary(&entries));
                }
                Some(Err(e)) => tracing::warn!("Schedule context unavailable: {}", e),
                None => {}
            }
        }

        prompt
    }

    /// Send a chat completion request
    async fn chat(&self, message: &str, context: &str) -> Result<String, CollaboratorError> {
        let api_key = self.api_key()?;

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.system_prompt(message, context),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: message.to_string(),
                },
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body: api_error_message(&body),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CollaboratorError::InvalidResponse("no choices returned".to_string()))
    }
}

#[async_trait]
impl Transcriber for GroqClient {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, CollaboratorError> {
        let api_key = self.api_key()?;

        let file_part = Part::bytes(wav)
            .file_name("capture.wav")
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .text("model", self.settings.transcription_model.clone())
            .text("response_format", "json")
            .part("file", file_part);

        if let Some(language) = &self.settings.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(self.api_url("audio/transcriptions"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body: api_error_message(&body),
            });
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text.trim().to_string())
    }
}

#[async_trait]
impl Responder for GroqClient {
    async fn respond(&self, prompt: &str, context: &str) -> Result<String, CollaboratorError> {
        match self.chat(prompt, context).await {
            Ok(reply) => Ok(reply),
            Err(CollaboratorError::Api { status, .. }) => Ok(format!("Error: {}", status)),
            Err(e) => {
                tracing::warn!("Chat completion failed: {}", e);
                Ok(format!("Connection error: {}", e))
            }
        }
    }
}

/// Whether a message asks about the user's schedule
pub fn is_schedule_query(message: &str) -> bool {
    let lower = message.to_lowercase();
    SCHEDULE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Pull `error.message` out of an OpenAI-style error body, falling back to
/// the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn persona(user_name: Option<&str>) -> String {
    let user = user_name.unwrap_or("the user");
    format!(
        "You are Almex, a personal assistant for {user}.\n\
         - Keep answers concise and useful\n\
         - Professional but friendly tone\n\
         - Answers are spoken aloud, avoid lists and markup\n\
         - Remember the context of previous conversations\n\
         - You can see {user}'s weekly schedule when it is relevant"
    )
}
