//! Follow-up chat about a single strategy.
//!
//! The relay forwards a conversation to the Anthropic Messages API and hands
//! the streamed reply back as [`ChatChunk`]s over a bounded channel. The
//! tax engine in [`crate::core`] never depends on this module.

mod error;
mod sse;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::{Strategy, TaxProfile, estimate_taxable_income, marginal_bracket};

pub use error::ChatError;
pub use sse::{LineBuffer, UpstreamEvent, parse_line};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            model: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 1024,
        }
    }
}

impl ChatConfig {
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_url.trim_end_matches('/'))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The parts of a strategy the assistant is told about.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StrategyBrief {
    pub name: String,
    pub description: String,
    pub eligibility_criteria: Vec<String>,
    pub implementation_steps: Vec<String>,
}

impl From<&Strategy> for StrategyBrief {
    fn from(strategy: &Strategy) -> Self {
        Self {
            name: strategy.name.to_string(),
            description: strategy.description.to_string(),
            eligibility_criteria: strategy
                .eligibility_criteria
                .iter()
                .map(|s| s.to_string())
                .collect(),
            implementation_steps: strategy
                .implementation_steps
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub strategy: StrategyBrief,
    pub profile: TaxProfile,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.strategy.name.trim().is_empty() {
            return Err(ChatError::invalid_request("strategy name is required"));
        }
        let Some(first) = self.messages.first() else {
            return Err(ChatError::invalid_request("at least one message is required"));
        };
        if first.role != ChatRole::User {
            return Err(ChatError::invalid_request(
                "conversation must start with a user message",
            ));
        }
        if self.messages.iter().any(|m| m.content.trim().is_empty()) {
            return Err(ChatError::invalid_request("messages must not be empty"));
        }
        Ok(())
    }
}

/// One piece of a streamed reply. `Done` marks normal completion and is
/// always the last item unless an `Error` is sent instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatChunk {
    Text(String),
    Done,
    Error(String),
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: &'a [ChatMessage],
    stream: bool,
}

pub fn build_system_prompt(strategy: &StrategyBrief, profile: &TaxProfile) -> String {
    let mut prompt = String::from(
        "You are a knowledgeable tax planning assistant. Answer follow-up questions about the \
         strategy below for this specific taxpayer. Be concrete, mention relevant IRS forms and \
         deadlines, and remind the user to confirm details with a tax professional.\n\n",
    );

    prompt.push_str(&format!(
        "Strategy: {}\nDescription: {}\n",
        strategy.name, strategy.description
    ));
    if !strategy.eligibility_criteria.is_empty() {
        prompt.push_str("Eligibility criteria:\n");
        for item in &strategy.eligibility_criteria {
            prompt.push_str(&format!("- {item}\n"));
        }
    }
    if !strategy.implementation_steps.is_empty() {
        prompt.push_str("Implementation steps:\n");
        for (i, step) in strategy.implementation_steps.iter().enumerate() {
            prompt.push_str(&format!("{}. {step}\n", i + 1));
        }
    }

    let mut facts = vec![
        format!("Filing status: {}", profile.filing_status.as_str()),
        format!("Age: {}", profile.age),
        format!("Salary: ${:.0}", profile.salary),
        format!("RSUs: ${:.0}", profile.rsu),
        format!("Dividends: ${:.0}", profile.dividends),
        format!("Capital gains: ${:.0}", profile.capital_gains),
        format!("Other income: ${:.0}", profile.other_income),
        format!("Total compensation: ${:.0}", profile.total_compensation),
        format!("401(k) contributions: ${:.0}", profile.retirement_401k),
        format!("Itemized deductions: ${:.0}", profile.itemized_deductions),
        format!("Homeowner: {}", yes_no(profile.homeowner)),
        format!("Has dependents: {}", yes_no(profile.has_dependents)),
    ];
    if !profile.state_of_residence.is_empty() {
        facts.push(format!("State: {}", profile.state_of_residence));
    }
    facts.push(format!(
        "Estimated taxable income: ${:.0}",
        estimate_taxable_income(profile)
    ));
    facts.push(format!(
        "Approximate marginal bracket: {}%",
        marginal_bracket(profile)
    ));

    prompt.push_str("\nTaxpayer profile:\n");
    for fact in facts {
        prompt.push_str(&format!("- {fact}\n"));
    }
    prompt
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[derive(Debug, Clone)]
pub struct ChatRelay {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatRelay {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Starts relaying the reply in a background task. Dropping the
    /// receiver stops the relay at its next send.
    pub fn stream_reply(&self, request: ChatRequest) -> mpsc::Receiver<ChatChunk> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let client = self.client.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            match relay(&client, &config, &request, &tx).await {
                Ok(()) => {
                    let _ = tx.send(ChatChunk::Done).await;
                }
                Err(ChatError::ClientGone) => debug!("Chat client went away mid-stream"),
                Err(e) => {
                    warn!("Chat relay failed: {e}");
                    let _ = tx.send(ChatChunk::Error(e.to_string())).await;
                }
            }
        });

        rx
    }
}

async fn relay(
    client: &reqwest::Client,
    config: &ChatConfig,
    request: &ChatRequest,
    tx: &mpsc::Sender<ChatChunk>,
) -> Result<(), ChatError> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ChatError::MissingApiKey)?;
    request.validate()?;

    let body = MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        system: build_system_prompt(&request.strategy, &request.profile),
        messages: &request.messages,
        stream: true,
    };

    info!(
        "Relaying chat about '{}' ({} messages)",
        request.strategy.name,
        request.messages.len()
    );

    let response = client
        .post(config.messages_url())
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ChatError::Upstream { status, body });
    }

    let mut lines = LineBuffer::default();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for line in lines.push(&chunk) {
            if forward_line(&line, tx).await? {
                return Ok(());
            }
        }
    }
    if let Some(line) = lines.finish() {
        forward_line(&line, tx).await?;
    }
    debug!("Chat stream ended without an explicit stop event");
    Ok(())
}

/// Returns `true` once the provider signals the end of the message.
async fn forward_line(line: &str, tx: &mpsc::Sender<ChatChunk>) -> Result<bool, ChatError> {
    let event = match parse_line(line) {
        Ok(event) => event,
        Err(ChatError::Decode(e)) => {
            warn!("Skipping undecodable chat event: {e}");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    match event {
        Some(UpstreamEvent::Text(text)) => {
            tx.send(ChatChunk::Text(text))
                .await
                .map_err(|_| ChatError::ClientGone)?;
            Ok(false)
        }
        Some(UpstreamEvent::Stop) => Ok(true),
        Some(UpstreamEvent::Error(message)) => Err(ChatError::Provider(message)),
        None => Ok(false),
    }
}
