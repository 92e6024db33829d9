use serde::{Deserialize, Serialize};

use crate::chat_history::Message;
use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::JsonClient;

/// Approximate token accounting for one generation call.
///
/// Counts are character lengths, not tokenizer output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn estimate(messages: &[Message], response: &str) -> Self {
        let input_tokens = count_tokens(messages);
        let output_tokens = response.chars().count();
        Self { input_tokens, output_tokens, total_tokens: input_tokens + output_tokens }
    }
}

pub fn count_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.chars().count()).sum()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

/// Produces the assistant reply for a message list.
pub trait Generator: Send + Sync {
    fn generate(&self, messages: &[Message]) -> Result<Generation>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    messages: &'a [Message],
    temperature: f32,
    max_new_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for the `/generate` model-serving endpoint.
pub struct HttpGenerator {
    http: JsonClient,
    url: String,
    temperature: f32,
    max_new_tokens: u32,
}

impl HttpGenerator {
    pub fn new(url: impl Into<String>, temperature: f32, max_new_tokens: u32) -> Result<Self> {
        let http = JsonClient::new().map_err(RagError::GenerationService)?;
        Ok(Self { http, url: url.into(), temperature, max_new_tokens })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.api_url.llm_api_url.clone(), cfg.llm.temperature, cfg.llm.max_new_tokens)
    }
}

impl Generator for HttpGenerator {
    fn generate(&self, messages: &[Message]) -> Result<Generation> {
        let req = GenerateRequest {
            messages,
            temperature: self.temperature,
            max_new_tokens: self.max_new_tokens,
        };
        let res: GenerateResponse = self
            .http
            .post_json(&self.url, &req)
            .map_err(RagError::GenerationService)?;
        let usage = TokenUsage::estimate(messages, &res.response);
        Ok(Generation { text: res.response, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_counts_characters() {
        let messages = vec![Message::system("abc"), Message::user("héllo")];
        let usage = TokenUsage::estimate(&messages, "ok!");
        assert_eq!(usage.input_tokens, 8);
        assert_eq!(usage.output_tokens, 3);
        assert_eq!(usage.total_tokens, 11);
    }

    #[test]
    fn request_body_carries_messages_and_decoding() {
        let messages = vec![Message::user("hi")];
        let req = GenerateRequest { messages: &messages, temperature: 0.5, max_new_tokens: 64 };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["max_new_tokens"], 64);
    }
}
