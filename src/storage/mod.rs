mod store;

use serde::{Deserialize, Serialize};

use crate::level::{ColorField, Level, LevelErrors};

pub use store::Store;

pub const MAX_SET_NAME: usize = 64;
pub const MAX_LEVEL_TITLE: usize = 64;
pub const MAX_USER_NAME: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Missing, or owned by someone else.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    InvalidLevel(#[from] LevelErrors),
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store snapshot: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub updated_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub theme: String,
    pub description: String,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub id: String,
    pub set_id: String,
    pub title: String,
    pub order: u32,
    pub level: Level,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetWithLevels {
    #[serde(flatten)]
    pub set: LevelSet,
    pub levels: Vec<LevelRecord>,
}

/// A level in the context of its set, as the play and builder pages need it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LevelInSet {
    pub set: LevelSet,
    pub level: LevelRecord,
    pub levels: Vec<LevelRecord>,
    /// Position of `level` within `levels`.
    pub start_index: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub set_id: String,
    pub user_id: String,
    pub created_at: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: u64,
}

/// Color fields to overwrite on a stored level; `None` leaves a field alone.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPatch {
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub hud_color: Option<String>,
    #[serde(default)]
    pub accent_color: Option<String>,
    #[serde(default)]
    pub platform_tint: Option<String>,
}

impl ColorPatch {
    pub fn fields(&self) -> impl Iterator<Item = (ColorField, &str)> + '_ {
        [
            (ColorField::BackgroundColor, &self.background_color),
            (ColorField::HudColor, &self.hud_color),
            (ColorField::AccentColor, &self.accent_color),
            (ColorField::PlatformTint, &self.platform_tint),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }

    pub fn apply(&self, level: &Level) -> Level {
        self.fields()
            .fold(level.clone(), |out, (field, value)| out.with_color(field, value))
    }
}

/// Trim `value` and require 1..=`max` characters.
pub(crate) fn bounded_text(what: &str, value: &str, max: usize) -> StoreResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(StoreError::InvalidInput(format!("{what} must not be empty")));
    }
    if len > max {
        return Err(StoreError::InvalidInput(format!(
            "{what} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn unix_ms_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Random 128-bit id rendered as 32 lowercase hex digits.
pub(crate) fn new_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}
