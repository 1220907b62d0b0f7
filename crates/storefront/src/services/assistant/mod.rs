//! Chat assistant.
//!
//! The chat route stores the buyer's message, asks a [`ReplyGenerator`] for
//! an answer grounded in the catalog and recent history, and stores the
//! reply. Generators never fail: transport and format problems become fixed
//! fallback texts so the conversation always gets an answer.

mod catalog;
mod openai;

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{ChatMessage, Product};

pub use catalog::CatalogCache;
pub use openai::OpenAiClient;

/// Messages of history given to the generator.
pub const HISTORY_LIMIT: u32 = 5;

/// Reply when no API key is configured.
pub const NOT_INITIALIZED_REPLY: &str = "OpenAI client not initialized.";

/// Reply when the model answered without an `ai_response` field.
pub const UNPROCESSABLE_REPLY: &str = "I'm sorry, I couldn't process that.";

/// Reply when the model could not be reached.
pub const UNAVAILABLE_REPLY: &str =
    "I'm currently experiencing technical difficulties. Please try again later.";

/// Errors talking to the completion API. Logged, never returned to clients.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Produces the assistant's answer to one chat message.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// `history` is oldest first and may include `query` itself.
    async fn generate_reply(&self, history: &[ChatMessage], catalog: &str, query: &str)
    -> String;
}

/// Generator used when the assistant is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAssistant;

#[async_trait]
impl ReplyGenerator for DisabledAssistant {
    async fn generate_reply(&self, _: &[ChatMessage], _: &str, _: &str) -> String {
        NOT_INITIALIZED_REPLY.to_string()
    }
}

/// One line per product: `- {name}: ${price} (Category: {category})`.
#[must_use]
pub fn format_catalog(products: &[Product]) -> String {
    products.iter().fold(String::new(), |mut out, p| {
        let _ = writeln!(
            out,
            "- {}: ${} (Category: {})",
            p.name, p.discounted_price, p.category
        );
        out
    })
}

/// One line per message: `{sender_name}: {message}`.
#[must_use]
pub fn format_history(history: &[ChatMessage]) -> String {
    history.iter().fold(String::new(), |mut out, m| {
        let _ = writeln!(out, "{}: {}", m.sender_name, m.message);
        out
    })
}

/// System prompt with the conversation, query and catalog filled in.
#[must_use]
pub fn build_system_prompt(history: &[ChatMessage], catalog: &str, query: &str) -> String {
    let history = format_history(history);
    format!(
        r#"# BoostedLabs Support Assistant

## Role
You are the support assistant for BoostedLabs, a premium peptide wellness store.
Help customers with product information, pricing, general peptide questions and
purchasing guidance.

## Guidelines
- Greet customers warmly and offer help with products, recommendations or support.
- Treat the product catalog below as the source of truth for names and prices.
- Explain how peptides work, storage and reconstitution basics, and lifestyle
  factors that complement them.
- When a customer shares a goal, recommend relevant catalog products briefly.
- Never give dosing protocols, diagnoses, drug interactions or guaranteed results.
  Suggest a healthcare professional for personal guidance.
- Only record contact details the customer volunteers.
- Ask whether they need anything else before closing.

## Style
Friendly, knowledgeable and concise. Bullet points only for product lists or
comparisons. No pushy sales talk.

## Inputs

Conversation history:
{history}
Current query: {query}

Product catalog:
{catalog}
## Output
Respond with JSON only, no other text:
{{"ai_response": "<your reply>"}}

Never say "please wait" or "let me check". Never invent products that are not
in the catalog."#
    )
}

/// Pull the reply text out of the model's JSON answer.
///
/// Content that is not JSON is passed through unchanged.
#[must_use]
pub fn extract_reply(content: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Err(_) => content.to_string(),
        Ok(Value::Object(fields)) => match fields.get("ai_response") {
            Some(Value::String(text)) => text.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => UNPROCESSABLE_REPLY.to_string(),
        },
        Ok(_) => UNPROCESSABLE_REPLY.to_string(),
    }
}
