// Social abstract generation through the Anthropic Messages API.
//
// Requests are sent with `stream: true` and the Server-Sent Events are
// collected into the completion text. Any failure degrades to a plain
// excerpt of the article so a row always gets an abstract.

use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde_json::Value;
use storymap_core::config::Config;
use thiserror::Error;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const TEMPERATURE: f64 = 0.6;
const EXCERPT_CHARS: usize = 1000;
const MAX_TEASER_WORDS: usize = 30;
const FALLBACK_WORDS: usize = 25;

#[derive(Debug, Error)]
pub enum TeaserError {
    #[error("failed to create event source: {0}")]
    EventSource(String),

    #[error("{0}")]
    Stream(String),

    #[error("stream ended without any content")]
    Empty,
}

// ---------------------------------------------------------------------------
// ClaudeClient
// ---------------------------------------------------------------------------

pub struct ClaudeClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key,
            model,
        }
    }

    /// Send requests to `api_url` instead of the public Messages endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Send a single user message and collect the streamed reply.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, TeaserError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "temperature": TEMPERATURE,
            "stream": true,
            "messages": [{ "role": "user", "content": prompt }]
        });

        let request = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let mut es = request
            .eventsource()
            .map_err(|e| TeaserError::EventSource(e.to_string()))?;

        let mut teaser = String::new();

        while let Some(event) = es.next().await {
            let msg = match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(msg)) => msg,
                Err(err) => {
                    es.close();
                    return Err(TeaserError::Stream(describe_stream_error(&err)));
                }
            };
            match StreamEvent::parse(&msg.event, &msg.data) {
                StreamEvent::Text(text) => teaser.push_str(&text),
                StreamEvent::Usage { input, output } => {
                    debug!(?input, ?output, model = %self.model, "teaser token usage");
                }
                StreamEvent::Stop => {
                    es.close();
                    return Ok(teaser);
                }
                StreamEvent::Ignored => {}
            }
        }

        if teaser.is_empty() {
            Err(TeaserError::Empty)
        } else {
            Ok(teaser)
        }
    }
}

// ---------------------------------------------------------------------------
// TeaserWriter
// ---------------------------------------------------------------------------

pub enum TeaserWriter {
    Active {
        client: ClaudeClient,
        max_tokens: u32,
    },
    Disabled,
}

impl TeaserWriter {
    /// `Active` only when teasers are enabled and an API key is configured.
    pub fn from_config(config: &Config) -> Self {
        if !config.teaser_enabled() {
            return TeaserWriter::Disabled;
        }
        match &config.credentials.anthropic_api_key {
            Some(key) => TeaserWriter::Active {
                client: ClaudeClient::new(key.trim().to_string(), config.teaser.model.clone()),
                max_tokens: config.teaser.max_tokens,
            },
            None => TeaserWriter::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, TeaserWriter::Active { .. })
    }

    /// A teaser for the article, or `None` when disabled or there is no text.
    pub async fn generate(&self, text: &str) -> Option<String> {
        let TeaserWriter::Active { client, max_tokens } = self else {
            return None;
        };
        let excerpt = excerpt(text);
        if excerpt.trim().is_empty() {
            return None;
        }

        match client.complete(&teaser_prompt(excerpt), *max_tokens).await {
            Ok(raw) => {
                let teaser = clean_teaser(&raw);
                if teaser.is_empty() {
                    Some(fallback_teaser(excerpt))
                } else {
                    Some(teaser)
                }
            }
            Err(e) => {
                warn!("teaser generation failed: {}", e);
                Some(fallback_teaser(excerpt))
            }
        }
    }
}

/// The first `EXCERPT_CHARS` characters of `text`.
fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn teaser_prompt(excerpt: &str) -> String {
    format!(
        "You are a local news social media editor following strict voice guidelines. \
Create a compelling teaser (under 30 words) from this story excerpt.

VOICE GUIDELINES:
- Use active voice consistently
- Lead with facts, not opinions
- Include quotes when available to show personal perspectives
- Use calls-to-action: explore, examine, investigate, discover
- Ask questions that the story can answer
- Show local community impact when relevant
- No clickbait or sensationalism
- Follow AP Style
- No oxford comma
- Be curious, tenacious, constructive, empathetic, clear, concise, certain, informative and friendly

STORY EXCERPT:
{excerpt}

Create a factual, engaging teaser under 30 words that makes readers want to explore the full story:"
    )
}

/// Strip surrounding quotes, collapse whitespace, and cap at 30 words.
pub fn clean_teaser(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() <= MAX_TEASER_WORDS {
        return words.join(" ");
    }
    let mut teaser = words[..MAX_TEASER_WORDS].join(" ");
    if !teaser.ends_with(['.', '!', '?']) {
        teaser.push_str("...");
    }
    teaser
}

pub fn fallback_teaser(excerpt: &str) -> String {
    let words: Vec<&str> = excerpt.split_whitespace().take(FALLBACK_WORDS).collect();
    format!("{}...", words.join(" "))
}

// ---------------------------------------------------------------------------
// Stream events
// ---------------------------------------------------------------------------

/// The parts of a Messages stream that matter for a teaser.
#[derive(Debug, PartialEq)]
pub(crate) enum StreamEvent {
    /// A `content_block_delta` carrying teaser text.
    Text(String),
    /// Token counts from `message_start` (input) or `message_delta` (output).
    Usage {
        input: Option<u64>,
        output: Option<u64>,
    },
    Stop,
    Ignored,
}

impl StreamEvent {
    pub(crate) fn parse(event: &str, data: &str) -> Self {
        if event == "message_stop" {
            return StreamEvent::Stop;
        }
        let Ok(v) = serde_json::from_str::<Value>(data) else {
            return StreamEvent::Ignored;
        };
        let tokens = |usage: Option<&Value>, key: &str| usage.and_then(|u| u.get(key)).and_then(Value::as_u64);
        match event {
            "content_block_delta" => v
                .pointer("/delta/text")
                .and_then(Value::as_str)
                .map(|text| StreamEvent::Text(text.to_string()))
                .unwrap_or(StreamEvent::Ignored),
            "message_start" => StreamEvent::Usage {
                input: tokens(v.pointer("/message/usage"), "input_tokens"),
                output: None,
            },
            "message_delta" => StreamEvent::Usage {
                input: None,
                output: tokens(v.get("usage"), "output_tokens"),
            },
            _ => StreamEvent::Ignored,
        }
    }
}

fn describe_stream_error(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _) => {
            format!("teaser request rejected with status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => format!("teaser request failed: {e}"),
        other => format!("teaser stream broke off: {other}"),
    }
}
