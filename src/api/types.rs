use serde::{Deserialize, Serialize};

use crate::designer::ModelMessage;
use crate::level::Level;

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn err(msg: impl Into<String>) -> ApiResponse<String> {
        ApiResponse {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// === Sets & levels ===

#[derive(Deserialize)]
pub struct CreateSetRequest {
    pub name: String,
    pub theme: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSet {
    pub set_id: String,
}

#[derive(Deserialize)]
pub struct CreateLevelRequest {
    pub title: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreatedLevel {
    pub level_id: String,
    pub set_id: String,
}

#[derive(Deserialize)]
pub struct UpdateLevelRequest {
    pub title: String,
    pub level: Level,
}

#[derive(Deserialize)]
pub struct AccountRequest {
    pub name: String,
}

// === AI ===

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Deserialize)]
pub struct EditRequest {
    pub instruction: String,
    pub level: Level,
}

#[derive(Deserialize, Default)]
pub struct IdeasRequest {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct IdeasResponse {
    pub ideas: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiRequest {
    #[serde(default)]
    pub messages: Vec<ModelMessage>,
    #[serde(default)]
    pub set_id: Option<String>,
    #[serde(default)]
    pub level_id: Option<String>,
}

// === Play ===

#[derive(Deserialize)]
pub struct LoadLevelRequest {
    pub level: Level,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlayResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_id: Option<String>,
    pub start_index: usize,
    pub level_count: usize,
    /// Subscribers the request reached, the runtime included.
    pub delivered: usize,
}

#[derive(Deserialize, Default)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}
