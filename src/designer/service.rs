use std::sync::Arc;

use bevy::log::{info, warn};
use serde::Serialize;
use serde_json::json;

use super::*;
use crate::level::{validate, Level};
use crate::storage::{ChatRole, LevelRecord, Store};

/// Upper bound on model turns in one chat request.
pub const MAX_CHAT_STEPS: usize = 4;

const TOOLS: [ToolSpec; 2] = [
    ToolSpec {
        name: "readLevel",
        description: "Read the current level JSON and metadata for a level the user owns.",
    },
    ToolSpec {
        name: "updateLevel",
        description: "Update a level JSON (and optional title) for a level the user owns.",
    },
];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChatStep {
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        id: String,
        name: String,
        output: serde_json::Value,
    },
    Text {
        text: String,
    },
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ChatOutcome {
    pub steps: Vec<ChatStep>,
    pub text: String,
    /// Level ids saved by `updateLevel` during this request.
    pub updated_levels: Vec<String>,
}

/// Generation, editing and chat on top of a [`LevelModel`] and the store.
#[derive(Clone)]
pub struct Designer {
    model: Arc<dyn LevelModel>,
    store: Store,
}

impl Designer {
    pub fn new(model: Arc<dyn LevelModel>, store: Store) -> Self {
        Self { model, store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn level_object(&self, system: String, prompt: String) -> Result<Level, DesignerError> {
        let value = self.model.generate_object(&ObjectRequest {
            system,
            prompt,
            schema: ObjectSchema::Level,
        })?;
        let level: Level =
            serde_json::from_value(value).map_err(|e| DesignerError::Schema(e.to_string()))?;
        validate(&level)?;
        Ok(level)
    }

    pub fn generate(&self, prompt: &str) -> Result<Level, DesignerError> {
        if prompt.trim().is_empty() {
            return Err(DesignerError::InvalidRequest("prompt must not be empty".into()));
        }
        self.level_object(prompts::level_designer(), prompts::generate_request(prompt))
    }

    pub fn generate_for_set(&self, title: &str, theme: &str) -> Result<Level, DesignerError> {
        self.level_object(
            prompts::level_designer(),
            prompts::create_level_request(title, theme),
        )
    }

    /// Generate a level from the set's theme and append it to the set.
    pub fn create_level(
        &self,
        user_id: &str,
        set_id: &str,
        title: &str,
    ) -> Result<LevelRecord, DesignerError> {
        let theme = self.store.get_owned_set_theme(user_id, set_id)?;
        let level = self.generate_for_set(title, &theme)?;
        let record = self.store.create_level(user_id, set_id, title, level)?;
        info!(
            "[Markie designer] Generated level {} ({}) in set {set_id}",
            record.id, record.title
        );
        Ok(record)
    }

    /// Ask the model to apply `instruction`. An invalid result is an error and
    /// the caller keeps `current` as is.
    pub fn edit(&self, instruction: &str, current: &Level) -> Result<Level, DesignerError> {
        if instruction.trim().is_empty() {
            return Err(DesignerError::InvalidRequest("instruction must not be empty".into()));
        }
        let prompt = prompts::edit_request(instruction, current)
            .map_err(|e| DesignerError::InvalidRequest(e.to_string()))?;
        self.level_object(prompts::LEVEL_EDITOR.to_string(), prompt)
            .inspect_err(|e| warn!("[Markie designer] Edit rejected: {e}"))
    }

    pub fn ideas(&self, theme: Option<&str>, prompt: Option<&str>) -> Result<Vec<String>, DesignerError> {
        let value = self.model.generate_object(&ObjectRequest {
            system: prompts::LEVEL_IDEAS.to_string(),
            prompt: prompts::ideas_request(theme, prompt),
            schema: ObjectSchema::Ideas,
        })?;
        let ideas: Vec<String> = serde_json::from_value(value["ideas"].clone())
            .map_err(|e| DesignerError::Schema(e.to_string()))?;
        if ideas.len() != 4 {
            return Err(DesignerError::Schema(format!(
                "expected 4 ideas, got {}",
                ideas.len()
            )));
        }
        Ok(ideas)
    }

    /// One chat request: record the user's message, let the model read and
    /// update levels through tools, then record its final reply.
    pub fn chat(
        &self,
        user_id: &str,
        set_id: &str,
        level_id: &str,
        messages: &[ModelMessage],
    ) -> Result<ChatOutcome, DesignerError> {
        if set_id.is_empty() || level_id.is_empty() {
            return Err(DesignerError::InvalidRequest("setId and levelId are required".into()));
        }
        let theme = self.store.get_owned_set_theme(user_id, set_id)?;
        let chat = self.store.get_or_create_chat_for_set(user_id, set_id)?;

        if let Some(ModelMessage::User { content }) = messages.last() {
            if !content.trim().is_empty() {
                self.store.add_chat_message(&chat.id, ChatRole::User, content)?;
            }
        }

        let mut request = ChatRequest {
            system: format!(
                "{}\n{}{level_id}",
                prompts::level_chat(&theme),
                prompts::ACTIVE_LEVEL_PREFIX
            ),
            messages: messages.to_vec(),
            tools: TOOLS.to_vec(),
        };
        let mut outcome = ChatOutcome::default();

        for _ in 0..MAX_CHAT_STEPS {
            let reply = self.model.chat(&request)?;
            if !reply.text.is_empty() {
                outcome.text = reply.text.clone();
                outcome.steps.push(ChatStep::Text {
                    text: reply.text.clone(),
                });
            }
            if reply.tool_calls.is_empty() {
                break;
            }
            request.messages.push(ModelMessage::Assistant {
                content: reply.text,
                tool_calls: reply.tool_calls.clone(),
            });
            for call in reply.tool_calls {
                outcome.steps.push(ChatStep::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                });
                let output = self.run_tool(user_id, &call, &mut outcome.updated_levels);
                outcome.steps.push(ChatStep::ToolResult {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    output: output.clone(),
                });
                request.messages.push(ModelMessage::Tool {
                    call_id: call.id,
                    name: call.name,
                    output,
                });
            }
        }

        if !outcome.text.trim().is_empty() {
            self.store
                .add_chat_message(&chat.id, ChatRole::Assistant, &outcome.text)?;
        }
        Ok(outcome)
    }

    fn run_tool(&self, user_id: &str, call: &ToolCall, updated: &mut Vec<String>) -> serde_json::Value {
        let Some(level_id) = call.input.get("levelId").and_then(|v| v.as_str()) else {
            return json!({ "error": "levelId is required." });
        };
        match call.name.as_str() {
            "readLevel" => match self.store.get_level_for_user(user_id, level_id) {
                Ok(record) => {
                    let mut level = record.level.clone();
                    if level.platform_tint.is_none() {
                        level.platform_tint = Some(level.accent_color.clone());
                    }
                    json!({ "levelId": record.id, "title": record.title, "level": level })
                }
                Err(_) => json!({ "error": "Level not found." }),
            },
            "updateLevel" => {
                let Ok(existing) = self.store.get_level_for_user(user_id, level_id) else {
                    return json!({ "error": "Level not found." });
                };
                let level: Level = match serde_json::from_value(call.input["level"].clone()) {
                    Ok(level) => level,
                    Err(e) => return json!({ "error": format!("level does not match the schema: {e}") }),
                };
                let title = call
                    .input
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&existing.title)
                    .to_string();
                match self
                    .store
                    .update_level(user_id, &existing.set_id, level_id, &title, level)
                {
                    Ok(record) => {
                        updated.push(record.id.clone());
                        json!({ "levelId": record.id, "title": record.title, "level": record.level })
                    }
                    Err(e) => json!({ "error": e.to_string() }),
                }
            }
            other => json!({ "error": format!("unknown tool {other}") }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designer::ProceduralModel;
    use crate::storage::StoreError;
    use std::sync::Mutex;

    fn designer() -> Designer {
        Designer::new(Arc::new(ProceduralModel::new()), Store::in_memory())
    }

    /// Model that always answers with a fixed object.
    struct FixedModel(serde_json::Value);

    impl LevelModel for FixedModel {
        fn generate_object(&self, _: &ObjectRequest) -> Result<serde_json::Value, ModelError> {
            Ok(self.0.clone())
        }

        fn chat(&self, _: &ChatRequest) -> Result<ChatReply, ModelError> {
            Err(ModelError::Unavailable("no chat".into()))
        }
    }

    /// Model that keeps calling tools forever and records how often it was asked.
    struct LoopingModel(Mutex<usize>);

    impl LevelModel for LoopingModel {
        fn generate_object(&self, _: &ObjectRequest) -> Result<serde_json::Value, ModelError> {
            Err(ModelError::Unavailable("no objects".into()))
        }

        fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ModelError> {
            *self.0.lock().unwrap() += 1;
            Ok(ChatReply {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: format!("call_{}", request.messages.len()),
                    name: "readLevel".into(),
                    input: json!({ "levelId": "whatever" }),
                }],
            })
        }
    }

    #[test]
    fn invalid_edits_are_rejected() {
        let mut broken = Level::default_for_theme("jungle");
        broken.level_map[1].push('@');
        let designer = Designer::new(
            Arc::new(FixedModel(serde_json::to_value(&broken).expect("json"))),
            Store::in_memory(),
        );
        let current = Level::default_for_theme("jungle");
        let err = designer
            .edit("add another spawn", &current)
            .expect_err("invalid level must be rejected");
        assert!(matches!(err, DesignerError::InvalidLevel(_)));
    }

    #[test]
    fn non_level_output_is_a_schema_error() {
        let designer = Designer::new(
            Arc::new(FixedModel(json!({ "levelMap": "nope" }))),
            Store::in_memory(),
        );
        assert!(matches!(
            designer.generate("anything"),
            Err(DesignerError::Schema(_))
        ));
    }

    #[test]
    fn create_level_uses_set_theme_and_next_order() {
        let designer = designer();
        let set = designer
            .store()
            .create_set("u1", "Volcano", "lava fire mountain")
            .expect("set");
        let first = designer.create_level("u1", &set.id, "Warmup").expect("level");
        let second = designer.create_level("u1", &set.id, "Meltdown").expect("level");
        assert_eq!((first.order, second.order), (1, 2));
        assert_eq!(first.level.tileset, crate::level::Tileset::Lava);
        assert!(matches!(
            designer.create_level("u2", &set.id, "Nope"),
            Err(DesignerError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn edit_applies_instruction() {
        let designer = designer();
        let current = Level::default_for_theme("jungle");
        let edited = designer.edit("remove the ghosts", &current).expect("edit");
        assert_eq!(edited.count_char('>'), 0);
        assert_eq!(edited.level_map.len(), current.level_map.len());
    }

    #[test]
    fn ideas_returns_four() {
        let ideas = designer().ideas(Some("ice"), None).expect("ideas");
        assert_eq!(ideas.len(), 4);
    }

    #[test]
    fn chat_reads_updates_and_records_transcript() {
        let designer = designer();
        let store = designer.store().clone();
        let set = store.create_set("u1", "Chat set", "jungle").expect("set");
        let record = store
            .create_level("u1", &set.id, "Start", Level::default_for_theme("jungle"))
            .expect("level");

        let outcome = designer
            .chat(
                "u1",
                &set.id,
                &record.id,
                &[ModelMessage::User {
                    content: "please remove all ghosts".into(),
                }],
            )
            .expect("chat");

        let names: Vec<&str> = outcome
            .steps
            .iter()
            .filter_map(|s| match s {
                ChatStep::ToolCall { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["readLevel", "updateLevel"]);
        assert_eq!(outcome.updated_levels, vec![record.id.clone()]);
        assert!(outcome.text.starts_with("Saved \"Start\""));

        let saved = store.get_level_for_user("u1", &record.id).expect("level");
        assert_eq!(saved.level.count_char('>'), 0);

        let transcript = store.chat_messages(&set.id);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, ChatRole::User);
        assert_eq!(transcript[1].role, ChatRole::Assistant);
    }

    #[test]
    fn chat_cannot_touch_other_users_levels() {
        let designer = designer();
        let store = designer.store().clone();
        let mine = store.create_set("u1", "Mine", "jungle").expect("set");
        let theirs = store.create_set("u2", "Theirs", "jungle").expect("set");
        let their_level = store
            .create_level("u2", &theirs.id, "Secret", Level::default_for_theme("jungle"))
            .expect("level");

        let outcome = designer
            .chat(
                "u1",
                &mine.id,
                &their_level.id,
                &[ModelMessage::User {
                    content: "remove all ghosts".into(),
                }],
            )
            .expect("chat");
        assert!(outcome.updated_levels.is_empty());
        assert!(outcome.text.contains("couldn't read"));
        let untouched = store.get_level_for_user("u2", &their_level.id).expect("level");
        assert_eq!(untouched.level, their_level.level);

        assert!(matches!(
            designer.chat("u1", &theirs.id, &their_level.id, &[]),
            Err(DesignerError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn chat_stops_after_the_step_limit() {
        let model = Arc::new(LoopingModel(Mutex::new(0)));
        let designer = Designer::new(model.clone(), Store::in_memory());
        let set = designer.store().create_set("u1", "Loop", "jungle").expect("set");
        let outcome = designer
            .chat(
                "u1",
                &set.id,
                "level",
                &[ModelMessage::User {
                    content: "hi".into(),
                }],
            )
            .expect("chat");
        assert_eq!(*model.0.lock().unwrap(), MAX_CHAT_STEPS);
        assert!(outcome.text.is_empty());
        assert_eq!(designer.store().chat_messages(&set.id).len(), 1);
    }
}
