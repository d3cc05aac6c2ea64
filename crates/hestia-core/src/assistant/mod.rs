//! The chat assistant: a transcript plus one outstanding completion at a time.

pub mod prompt;
pub mod provider;

use tracing::{info, instrument, warn};

use crate::model::Persona;
use crate::notify::Notice;

pub use prompt::{AssistantContext, system_instruction};
pub use provider::{CompletionProvider, CompletionRequest, GeminiProvider, GeminiSettings};

pub const APOLOGY: &str = "Lo siento, tuve una interferencia en mis sistemas. ¿Podrías repetir eso?";
pub const ANALYZING: &str = "Jarvis está analizando tu petición...";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

const FOLLOW_UP_KEYWORDS: [&str; 2] = ["tarea", "comprar"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Assistant,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Blank input, or a request is already outstanding.
    Ignored,
    Replied {
        reply: String,
        notice: Option<Notice>,
    },
}

#[derive(Debug, Clone)]
pub struct Assistant {
    persona: Persona,
    temperature: f64,
    transcript: Vec<ChatMessage>,
    pending: bool,
}

impl Assistant {
    pub fn new(persona: Persona, temperature: f64) -> Self {
        Self {
            persona,
            temperature,
            transcript: vec![ChatMessage {
                role: Role::Assistant,
                text: greeting(persona),
            }],
            pending: false,
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Records the user turn and marks the assistant pending. Returns the
    /// request to send, or `None` when the input must be ignored.
    pub fn begin(&mut self, input: &str, context: &AssistantContext<'_>) -> Option<CompletionRequest> {
        if self.pending || input.trim().is_empty() {
            return None;
        }
        self.transcript.push(ChatMessage {
            role: Role::User,
            text: input.to_string(),
        });
        self.pending = true;

        let context_json = context.to_json();
        Some(CompletionRequest {
            prompt: input.to_string(),
            persona: self.persona,
            system_instruction: system_instruction(self.persona, &context_json),
            context_json,
            temperature: self.temperature,
        })
    }

    /// Appends exactly one assistant turn and clears the pending state.
    /// Failures are replaced by the apology.
    pub fn finish(&mut self, result: anyhow::Result<String>) -> &ChatMessage {
        let text = match result {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "assistant request failed");
                APOLOGY.to_string()
            }
        };
        self.pending = false;
        self.transcript.push(ChatMessage {
            role: Role::Assistant,
            text,
        });
        &self.transcript[self.transcript.len() - 1]
    }

    #[instrument(skip_all)]
    pub async fn send(
        &mut self,
        provider: &dyn CompletionProvider,
        input: &str,
        context: &AssistantContext<'_>,
    ) -> SendOutcome {
        let Some(request) = self.begin(input, context) else {
            return SendOutcome::Ignored;
        };
        let result = provider.complete(&request).await;
        let reply = self.finish(result).text.clone();
        let notice = follow_up_notice(input);
        info!(notice = notice.is_some(), "assistant replied");
        SendOutcome::Replied { reply, notice }
    }
}

pub fn greeting(persona: Persona) -> String {
    format!(
        "Saludos, {}. Soy HESTIA. ¿En qué puedo asistirte hoy?",
        persona.label()
    )
}

/// Chores and shopping requests get an extra heads-up in the feed.
pub fn follow_up_notice(input: &str) -> Option<Notice> {
    let lowered = input.to_lowercase();
    FOLLOW_UP_KEYWORDS
        .iter()
        .any(|kw| lowered.contains(kw))
        .then(|| Notice::info(ANALYZING))
}
