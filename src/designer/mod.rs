//! AI-assisted level design: generation, edits, ideas and the chat assistant.
//!
//! Everything model-facing goes through [`LevelModel`]; the crate ships the
//! offline [`ProceduralModel`]. Every level a model produces is validated
//! before it is returned or stored.

mod procedural;
pub mod prompts;
mod service;

use serde::{Deserialize, Serialize};

use crate::level::LevelErrors;
use crate::storage::StoreError;

pub use procedural::ProceduralModel;
pub use service::{ChatOutcome, ChatStep, Designer, MAX_CHAT_STEPS};

/// Shape of the JSON object a model is asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectSchema {
    Level,
    /// `{ "ideas": [string; 4] }`
    Ideas,
}

#[derive(Clone, Debug)]
pub struct ObjectRequest {
    pub system: String,
    pub prompt: String,
    pub schema: ObjectSchema,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ModelMessage {
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        name: String,
        output: serde_json::Value,
    },
}

#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolSpec>,
}

/// One model turn: either tool calls to run, or final text (or both).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("model returned unusable output: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DesignerError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model output does not match the schema: {0}")]
    Schema(String),
    #[error(transparent)]
    InvalidLevel(#[from] LevelErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Backend that turns prompts into structured objects and chat turns.
pub trait LevelModel: Send + Sync {
    fn generate_object(&self, request: &ObjectRequest) -> Result<serde_json::Value, ModelError>;

    fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ModelError>;
}
