//! Answer generation over retrieved exercises with an OpenAI-compatible chat model.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::error::ProviderError;
use crate::exercise::INSTRUCTIONS_KEY;
use crate::store::QueryMatch;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are a personal fitness assistant. Recommend exercises that fit the user's goal, \
experience level, available equipment and physical limitations. Only recommend exercises from the list provided \
with the question. For each one give the exercise name, type of activity, equipment, body parts targeted, muscle \
groups activated and step-by-step instructions. Suggest an alternative from the list when equipment is missing and \
say why. Keep answers concise, end with a short motivational note, and do not use markdown.";

#[derive(Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config("missing OpenAI API key"));
        }
        if config.chat_model.trim().is_empty() {
            return Err(ProviderError::config("missing chat model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ProviderError::config("invalid OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.chat_model.clone(),
        })
    }

    /// Asks the model to answer `question` using only the retrieved exercises.
    pub async fn answer(&self, question: &str, matches: &[QueryMatch]) -> Result<String, ProviderError> {
        let request = ChatRequest::for_question(&self.model, question, matches)?;

        tracing::info!(model = %self.model, "Asking chat model...");

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        parse_chat_response(&body)
    }
}

/// Exercise fields handed to the model, one object per match.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExerciseContext<'a> {
    exercise_name: &'a str,
    type_of_activity: Option<&'a str>,
    equipment: Option<&'a str>,
    body_part: Option<&'a str>,
    muscle_groups_activated: Option<&'a str>,
    instructions: Option<&'a str>,
}

impl<'a> ExerciseContext<'a> {
    fn from_match(hit: &'a QueryMatch) -> Self {
        Self {
            exercise_name: &hit.id,
            type_of_activity: metadata_field(hit, "type_of_activity"),
            equipment: metadata_field(hit, "type_of_equipment"),
            body_part: metadata_field(hit, "body_part"),
            muscle_groups_activated: metadata_field(hit, "muscle_groups_activated"),
            instructions: metadata_field(hit, INSTRUCTIONS_KEY),
        }
    }
}

fn metadata_field<'a>(hit: &'a QueryMatch, key: &str) -> Option<&'a str> {
    hit.metadata.get(key).map(String::as_str)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

impl<'a> ChatRequest<'a> {
    fn for_question(model: &'a str, question: &str, matches: &[QueryMatch]) -> Result<Self, ProviderError> {
        let context = matches.iter().map(ExerciseContext::from_match).collect::<Vec<_>>();
        let context = serde_json::to_string(&context)
            .map_err(|e| ProviderError::malformed(format!("failed to encode context: {}", e)))?;

        Ok(Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!(
                        "Exercises from the database:\n{}\n\nQuestion: {}",
                        context, question
                    ),
                },
            ],
        })
    }
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

fn parse_chat_response(body: &[u8]) -> Result<String, ProviderError> {
    let response: ChatResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::malformed(format!("failed to parse response: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ProviderError::malformed("response contained no answer"))
}
