use crate::models::{Message, Role};
use crate::traits::{CompletionMessage, CompletionModel, CompletionParams};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const HISTORY_WINDOW: usize = 6;
const CONTEXT_PREAMBLE: &str = "You are a helpful AI assistant. Here's our conversation so far:\n\n";

const DOCUMENT_KEYWORDS: [&str; 5] = ["name", "candidate", "pdf", "document", "file"];
const CAPABILITY_PHRASES: [&str; 3] = ["what can you do", "help", "assist"];
const GREETING_PATTERN: &str = r"\b(?:hello|hi|hey|greetings)\b";

pub const DOCUMENTS_FALLBACK: &str = "I can access the documents you've uploaded, but my primary language model is temporarily unavailable. Please try again in a moment so I can analyze your files and share detailed findings.";
pub const GREETING_FALLBACK: &str = "Hello! I'm a RAG Chat Assistant. I can see you have uploaded documents, but I'm currently experiencing some technical difficulties with my AI service. I'm here to help once the service is restored!";
pub const CAPABILITIES_FALLBACK: &str = "I'm a RAG (Retrieval-Augmented Generation) Chat Assistant! I can help you analyze uploaded PDF documents and answer questions about their content. I'm currently running on backup systems, but I'm still here to help!";
pub const GENERAL_FALLBACK: &str = "I understand you're asking about this topic, and I'll be ready to help as soon as my language model is back online. Feel free to upload documents or add more context in the meantime.";

/// Produces the assistant's reply. Never fails: when the model is missing or
/// both completion paths error, a canned reply is chosen from the message.
#[derive(Clone)]
pub struct ResponseGenerator {
    model: Option<Arc<dyn CompletionModel>>,
    params: CompletionParams,
    greeting: Regex,
}

impl ResponseGenerator {
    /// Fails only if the built-in greeting pattern does not compile.
    pub fn new(model: Option<Arc<dyn CompletionModel>>) -> Result<Self, regex::Error> {
        Ok(Self {
            model,
            params: CompletionParams::default(),
            greeting: Regex::new(GREETING_PATTERN)?,
        })
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub async fn generate_response(&self, message: &str, history: &[Message]) -> String {
        let Some(model) = &self.model else {
            warn!("completion model not configured, using fallback response");
            return self.fallback_response(message).to_string();
        };

        let prompt = build_prompt(message, history);
        debug!(prompt_chars = prompt.len(), "generating response");

        match model.chat(&[CompletionMessage::user(prompt.as_str())], self.params).await {
            Ok(reply) => {
                info!(reply_chars = reply.len(), "chat completion succeeded");
                return reply;
            }
            Err(error) => warn!(%error, "chat completion failed, trying text generation"),
        }

        match model.text_generation(&prompt, self.params).await {
            Ok(reply) => {
                info!(reply_chars = reply.len(), "text generation succeeded");
                reply
            }
            Err(error) => {
                error!(%error, "text generation failed, using fallback response");
                self.fallback_response(message).to_string()
            }
        }
    }

    /// Canned reply picked by the first matching category of the message.
    ///
    /// Greeting words only count as whole words, so "this" or "high" never
    /// select the greeting reply. A plain substring check would pick it for
    /// "is this right?"; here that message gets the general reply instead.
    /// Document keywords and capability phrases are still substring matches.
    pub fn fallback_response(&self, message: &str) -> &'static str {
        let lowered = message.to_lowercase();

        if DOCUMENT_KEYWORDS.iter().any(|word| lowered.contains(word)) {
            DOCUMENTS_FALLBACK
        } else if self.greeting.is_match(&lowered) {
            GREETING_FALLBACK
        } else if CAPABILITY_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
            CAPABILITIES_FALLBACK
        } else {
            GENERAL_FALLBACK
        }
    }
}

/// Prompt for a single user turn, preceded by the last few messages.
pub fn build_prompt(message: &str, history: &[Message]) -> String {
    if history.is_empty() {
        return format!("Human: {message}\n\nAssistant:");
    }

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut context = String::from(CONTEXT_PREAMBLE);
    for turn in &history[start..] {
        let speaker = match turn.role {
            Role::User => "Human",
            Role::Assistant => "Assistant",
        };
        context.push_str(&format!("{speaker}: {}\n", turn.content));
    }

    format!("{context}\n\nHuman: {message}\n\nAssistant:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedCompletion;
    use chrono::Utc;

    fn message(role: Role, content: &str) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: "chat".to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    fn generator(model: Option<Arc<dyn CompletionModel>>) -> ResponseGenerator {
        ResponseGenerator::new(model).expect("greeting pattern compiles")
    }

    #[test]
    fn greeting_pattern_compiles() {
        assert!(Regex::new(GREETING_PATTERN).is_ok());
        assert!(ResponseGenerator::new(None).is_ok());
    }

    #[test]
    fn prompt_without_history_is_a_single_turn() {
        assert_eq!(build_prompt("Hi there", &[]), "Human: Hi there\n\nAssistant:");
    }

    #[test]
    fn prompt_keeps_only_the_last_six_messages() {
        let history: Vec<Message> = (0..8)
            .map(|turn| {
                let role = if turn % 2 == 0 { Role::User } else { Role::Assistant };
                message(role, &format!("turn {turn}"))
            })
            .collect();

        let prompt = build_prompt("next", &history);

        assert!(prompt.starts_with(CONTEXT_PREAMBLE));
        assert!(!prompt.contains("turn 1\n"));
        assert!(prompt.contains("Human: turn 2\nAssistant: turn 3\n"));
        assert!(prompt.ends_with("Assistant: turn 7\n\n\nHuman: next\n\nAssistant:"));
    }

    #[tokio::test]
    async fn chat_reply_is_returned_as_is() {
        let model = Arc::new(ScriptedCompletion::new(Some("Pumps move fluid."), None));
        let generator = generator(Some(model.clone()));

        let reply = generator.generate_response("What do pumps do?", &[]).await;

        assert_eq!(reply, "Pumps move fluid.");
        assert_eq!(
            model.last_chat_prompt().as_deref(),
            Some("Human: What do pumps do?\n\nAssistant:")
        );
        assert!(model.generation_prompts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn text_generation_is_tried_when_chat_fails() {
        let model = Arc::new(ScriptedCompletion::new(None, Some("generated")));
        let generator = generator(Some(model.clone()));

        let reply = generator.generate_response("question", &[]).await;

        assert_eq!(reply, "generated");
        assert_eq!(model.generation_prompts.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn total_outage_uses_canned_reply() {
        let model = Arc::new(ScriptedCompletion::new(None, None));
        let generator = generator(Some(model));

        assert_eq!(
            generator.generate_response("Summarize the PDF", &[]).await,
            DOCUMENTS_FALLBACK
        );
    }

    #[tokio::test]
    async fn missing_model_uses_canned_reply() {
        let generator = generator(None);

        assert!(!generator.has_model());
        assert_eq!(generator.generate_response("hey", &[]).await, GREETING_FALLBACK);
    }

    #[test]
    fn fallback_categories_in_priority_order() {
        let generator = generator(None);

        assert_eq!(generator.fallback_response("Hello, which file is this?"), DOCUMENTS_FALLBACK);
        assert_eq!(generator.fallback_response("Hi!"), GREETING_FALLBACK);
        assert_eq!(generator.fallback_response("What can you do?"), CAPABILITIES_FALLBACK);
        assert_eq!(generator.fallback_response("Can you assist me"), CAPABILITIES_FALLBACK);
        assert_eq!(generator.fallback_response("Explain entropy"), GENERAL_FALLBACK);
    }

    #[test]
    fn greetings_match_whole_words_only() {
        let generator = generator(None);

        assert_eq!(generator.fallback_response("this is high priority"), GENERAL_FALLBACK);
        assert_eq!(generator.fallback_response("is this right?"), GENERAL_FALLBACK);
        assert_eq!(generator.fallback_response("hey, anyone there?"), GREETING_FALLBACK);
        assert_eq!(generator.fallback_response("GREETINGS, bot"), GREETING_FALLBACK);
    }
}
