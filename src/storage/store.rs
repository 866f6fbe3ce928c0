use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bevy::log::{info, warn};
use serde::{Deserialize, Serialize};

use super::*;
use crate::level::validate;

const SNAPSHOT_FILE: &str = "markie-store.json";

#[derive(Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    users: HashMap<String, User>,
    #[serde(default)]
    sets: HashMap<String, LevelSet>,
    #[serde(default)]
    levels: HashMap<String, LevelRecord>,
    #[serde(default)]
    chats: HashMap<String, Chat>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    /// Last timestamp handed out; keeps creation order strict within one millisecond.
    #[serde(default)]
    clock: u64,
}

impl StoreData {
    fn now(&mut self) -> u64 {
        self.clock = unix_ms_now().max(self.clock + 1);
        self.clock
    }

    fn owned_set(&self, user_id: &str, set_id: &str) -> StoreResult<&LevelSet> {
        self.sets
            .get(set_id)
            .filter(|set| set.user_id == user_id)
            .ok_or(StoreError::NotFound("set"))
    }

    /// The level plus its set, only when that set belongs to `user_id`.
    fn owned_level(&self, user_id: &str, level_id: &str) -> StoreResult<(&LevelSet, &LevelRecord)> {
        let level = self
            .levels
            .get(level_id)
            .ok_or(StoreError::NotFound("level"))?;
        let set = self
            .owned_set(user_id, &level.set_id)
            .map_err(|_| StoreError::NotFound("level"))?;
        Ok((set, level))
    }

    fn levels_of(&self, set_id: &str) -> Vec<LevelRecord> {
        let mut levels: Vec<LevelRecord> = self
            .levels
            .values()
            .filter(|level| level.set_id == set_id)
            .cloned()
            .collect();
        levels.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        levels
    }

    fn next_order(&self, set_id: &str) -> u32 {
        self.levels
            .values()
            .filter(|level| level.set_id == set_id)
            .map(|level| level.order)
            .max()
            .map(|max| max + 1)
            .unwrap_or(1)
    }

    fn touch_set(&mut self, set_id: &str, at: u64) {
        if let Some(set) = self.sets.get_mut(set_id) {
            set.updated_at = at;
        }
    }
}

/// Sets, levels, chats and users. Cloning shares the same underlying data.
#[derive(Clone)]
pub struct Store {
    data: Arc<RwLock<StoreData>>,
    snapshot_path: Option<PathBuf>,
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreData::default())),
            snapshot_path: None,
        }
    }

    /// Open a store persisted under `dir`, loading the previous snapshot if one exists.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SNAPSHOT_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(body) => serde_json::from_str(&body)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(e.into()),
        };
        info!(
            "[Markie store] Opened {} ({} sets, {} levels)",
            path.display(),
            data.sets.len(),
            data.levels.len()
        );
        Ok(Self {
            data: Arc::new(RwLock::new(data)),
            snapshot_path: Some(path),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write the snapshot file while still holding the write lock so snapshots land in order.
    fn persist(&self, data: &StoreData) -> StoreResult<()> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };
        let body = serde_json::to_string_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Apply `f` to a staged copy and publish it only once the snapshot is
    /// written. A failed operation or write leaves the store untouched.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> StoreResult<T>) -> StoreResult<T> {
        let mut data = self.write();
        let mut staged = data.clone();
        let out = f(&mut staged)?;
        if let Err(e) = self.persist(&staged) {
            warn!("[Markie store] Failed to write snapshot: {e}");
            return Err(e);
        }
        *data = staged;
        Ok(out)
    }

    // --- sets ---

    pub fn create_set(&self, user_id: &str, name: &str, theme: &str) -> StoreResult<LevelSet> {
        let name = bounded_text("name", name, MAX_SET_NAME)?;
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(StoreError::InvalidInput("theme must not be empty".into()));
        }
        self.mutate(|data| {
            let now = data.now();
            let set = LevelSet {
                id: new_id(),
                user_id: user_id.to_string(),
                name,
                theme: theme.to_string(),
                description: theme.to_string(),
                created_at: now,
                updated_at: now,
            };
            data.sets.insert(set.id.clone(), set.clone());
            Ok(set)
        })
    }

    /// Every set owned by `user_id`, newest first, each with its levels in play order.
    pub fn list_sets_with_levels(&self, user_id: &str) -> Vec<SetWithLevels> {
        let data = self.read();
        let mut sets: Vec<&LevelSet> = data
            .sets
            .values()
            .filter(|set| set.user_id == user_id)
            .collect();
        sets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sets.into_iter()
            .map(|set| SetWithLevels {
                set: set.clone(),
                levels: data.levels_of(&set.id),
            })
            .collect()
    }

    pub fn get_set_with_levels(&self, user_id: &str, set_id: &str) -> StoreResult<SetWithLevels> {
        let data = self.read();
        let set = data.owned_set(user_id, set_id)?.clone();
        let levels = data.levels_of(set_id);
        Ok(SetWithLevels { set, levels })
    }

    pub fn get_owned_set_theme(&self, user_id: &str, set_id: &str) -> StoreResult<String> {
        Ok(self.read().owned_set(user_id, set_id)?.theme.clone())
    }

    /// Remove a set together with its levels, its chat and the chat's messages.
    pub fn delete_set(&self, user_id: &str, set_id: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.owned_set(user_id, set_id)?;
            data.sets.remove(set_id);
            data.levels.retain(|_, level| level.set_id != set_id);
            let chats: Vec<String> = data
                .chats
                .values()
                .filter(|chat| chat.set_id == set_id)
                .map(|chat| chat.id.clone())
                .collect();
            data.messages.retain(|m| !chats.contains(&m.chat_id));
            data.chats.retain(|_, chat| chat.set_id != set_id);
            Ok(())
        })
    }

    // --- levels ---

    pub fn next_level_order(&self, user_id: &str, set_id: &str) -> StoreResult<u32> {
        let data = self.read();
        data.owned_set(user_id, set_id)?;
        Ok(data.next_order(set_id))
    }

    /// Append a level to the end of a set.
    pub fn create_level(
        &self,
        user_id: &str,
        set_id: &str,
        title: &str,
        level: Level,
    ) -> StoreResult<LevelRecord> {
        let title = bounded_text("title", title, MAX_LEVEL_TITLE)?;
        validate(&level)?;
        self.mutate(|data| {
            data.owned_set(user_id, set_id)?;
            let now = data.now();
            let record = LevelRecord {
                id: new_id(),
                set_id: set_id.to_string(),
                title,
                order: data.next_order(set_id),
                level,
                created_at: now,
                updated_at: now,
            };
            data.levels.insert(record.id.clone(), record.clone());
            data.touch_set(set_id, now);
            Ok(record)
        })
    }

    /// Replace the title and the whole level of a level in `set_id`.
    pub fn update_level(
        &self,
        user_id: &str,
        set_id: &str,
        level_id: &str,
        title: &str,
        level: Level,
    ) -> StoreResult<LevelRecord> {
        let title = bounded_text("title", title, MAX_LEVEL_TITLE)?;
        validate(&level)?;
        self.mutate(|data| {
            data.owned_set(user_id, set_id)?;
            let now = data.now();
            let record = data
                .levels
                .get_mut(level_id)
                .filter(|record| record.set_id == set_id)
                .ok_or(StoreError::NotFound("level"))?;
            record.title = title;
            record.level = level;
            record.updated_at = now;
            let out = record.clone();
            data.touch_set(set_id, now);
            Ok(out)
        })
    }

    /// Overwrite only the color fields present in `patch`.
    pub fn update_level_colors(
        &self,
        user_id: &str,
        level_id: &str,
        patch: &ColorPatch,
    ) -> StoreResult<LevelRecord> {
        if patch.is_empty() {
            return Err(StoreError::InvalidInput("no color fields given".into()));
        }
        self.mutate(|data| {
            let (_, current) = data.owned_level(user_id, level_id)?;
            let recolored = patch.apply(&current.level);
            validate(&recolored)?;
            let now = data.now();
            let record = data
                .levels
                .get_mut(level_id)
                .ok_or(StoreError::NotFound("level"))?;
            record.level = recolored;
            record.updated_at = now;
            Ok(record.clone())
        })
    }

    pub fn delete_level(&self, user_id: &str, set_id: &str, level_id: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.owned_set(user_id, set_id)?;
            let removed = data
                .levels
                .get(level_id)
                .is_some_and(|record| record.set_id == set_id);
            if !removed {
                return Err(StoreError::NotFound("level"));
            }
            data.levels.remove(level_id);
            let now = data.now();
            data.touch_set(set_id, now);
            Ok(())
        })
    }

    pub fn get_level_for_user(&self, user_id: &str, level_id: &str) -> StoreResult<LevelRecord> {
        let data = self.read();
        let (_, level) = data.owned_level(user_id, level_id)?;
        Ok(level.clone())
    }

    pub fn get_level_with_set(&self, user_id: &str, level_id: &str) -> StoreResult<LevelInSet> {
        let data = self.read();
        let (set, level) = data.owned_level(user_id, level_id)?;
        let levels = data.levels_of(&set.id);
        let start_index = levels
            .iter()
            .position(|record| record.id == level.id)
            .unwrap_or(0);
        Ok(LevelInSet {
            set: set.clone(),
            level: level.clone(),
            levels,
            start_index,
        })
    }

    // --- chats ---

    /// A set has at most one chat, keyed by the set id.
    pub fn get_or_create_chat_for_set(&self, user_id: &str, set_id: &str) -> StoreResult<Chat> {
        if let Some(chat) = self
            .read()
            .chats
            .get(set_id)
            .filter(|chat| chat.user_id == user_id)
        {
            return Ok(chat.clone());
        }
        self.mutate(|data| {
            data.owned_set(user_id, set_id)?;
            if let Some(chat) = data.chats.get(set_id) {
                return Ok(chat.clone());
            }
            let chat = Chat {
                id: set_id.to_string(),
                set_id: set_id.to_string(),
                user_id: user_id.to_string(),
                created_at: data.now(),
            };
            data.chats.insert(chat.id.clone(), chat.clone());
            Ok(chat)
        })
    }

    pub fn add_chat_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
    ) -> StoreResult<ChatMessage> {
        self.mutate(|data| {
            if !data.chats.contains_key(chat_id) {
                return Err(StoreError::NotFound("chat"));
            }
            let message = ChatMessage {
                id: new_id(),
                chat_id: chat_id.to_string(),
                role,
                content: content.to_string(),
                created_at: data.now(),
            };
            data.messages.push(message.clone());
            Ok(message)
        })
    }

    /// Messages of a chat, oldest first.
    pub fn chat_messages(&self, chat_id: &str) -> Vec<ChatMessage> {
        let data = self.read();
        let mut messages: Vec<ChatMessage> = data
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        messages
    }

    // --- users ---

    pub fn update_user_name(&self, user_id: &str, name: &str) -> StoreResult<User> {
        let name = bounded_text("name", name, MAX_USER_NAME)?;
        self.mutate(|data| {
            let now = data.now();
            let user = data.users.entry(user_id.to_string()).or_insert_with(|| User {
                id: user_id.to_string(),
                name: None,
                updated_at: now,
            });
            user.name = Some(name);
            user.updated_at = now;
            Ok(user.clone())
        })
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.read().users.get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level() -> Level {
        Level::default_for_theme("jungle")
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("markie-store-{tag}-{}", new_id()))
    }

    #[test]
    fn sets_list_newest_first_with_levels_in_order() {
        let store = Store::in_memory();
        let older = store.create_set("u1", "Older", "jungle").expect("set");
        let newer = store.create_set("u1", "Newer", "lava caves").expect("set");
        store.create_set("u2", "Theirs", "sky").expect("set");

        let a = store.create_level("u1", &older.id, "A", level()).expect("level");
        let b = store.create_level("u1", &older.id, "B", level()).expect("level");
        assert_eq!((a.order, b.order), (1, 2));
        assert_eq!(store.next_level_order("u1", &older.id).expect("order"), 3);
        assert_eq!(store.next_level_order("u1", &newer.id).expect("order"), 1);

        let listed = store.list_sets_with_levels("u1");
        let names: Vec<&str> = listed.iter().map(|s| s.set.name.as_str()).collect();
        assert_eq!(names, vec!["Newer", "Older"]);
        let titles: Vec<&str> = listed[1].levels.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(listed[0].set.description, "lava caves");
    }

    #[test]
    fn deleting_a_set_removes_its_levels_and_chat() {
        let store = Store::in_memory();
        let set = store.create_set("u1", "Doomed", "ice").expect("set");
        let keep = store.create_set("u1", "Keep", "ice").expect("set");
        let doomed_level = store.create_level("u1", &set.id, "L1", level()).expect("level");
        let kept_level = store.create_level("u1", &keep.id, "L1", level()).expect("level");
        let chat = store.get_or_create_chat_for_set("u1", &set.id).expect("chat");
        store
            .add_chat_message(&chat.id, ChatRole::User, "make it harder")
            .expect("message");

        assert!(matches!(
            store.delete_set("u2", &set.id),
            Err(StoreError::NotFound(_))
        ));
        store.delete_set("u1", &set.id).expect("delete");

        assert!(store.get_set_with_levels("u1", &set.id).is_err());
        assert!(store.get_level_for_user("u1", &doomed_level.id).is_err());
        assert!(store.chat_messages(&chat.id).is_empty());
        assert!(store.get_level_for_user("u1", &kept_level.id).is_ok());
    }

    #[test]
    fn other_users_cannot_read_or_change_levels() {
        let store = Store::in_memory();
        let set = store.create_set("owner", "Mine", "jungle").expect("set");
        let record = store.create_level("owner", &set.id, "One", level()).expect("level");

        assert!(matches!(
            store.get_level_for_user("intruder", &record.id),
            Err(StoreError::NotFound("level"))
        ));
        assert!(store.get_owned_set_theme("intruder", &set.id).is_err());
        assert!(store
            .update_level("intruder", &set.id, &record.id, "Pwned", level())
            .is_err());
        assert!(store.delete_level("intruder", &set.id, &record.id).is_err());
        assert!(store
            .get_or_create_chat_for_set("intruder", &set.id)
            .is_err());
        assert_eq!(
            store.get_level_for_user("owner", &record.id).expect("level").title,
            "One"
        );
    }

    #[test]
    fn color_edit_changes_only_that_field() {
        let store = Store::in_memory();
        let set = store.create_set("u1", "Colors", "jungle").expect("set");
        let record = store.create_level("u1", &set.id, "Tint", level()).expect("level");

        let patch = ColorPatch {
            hud_color: Some("#ABCDEF".into()),
            ..Default::default()
        };
        let updated = store
            .update_level_colors("u1", &record.id, &patch)
            .expect("recolor");
        assert_eq!(updated.level.hud_color, "#ABCDEF");
        assert_eq!(updated.level.background_color, record.level.background_color);
        assert_eq!(updated.level.accent_color, record.level.accent_color);
        assert_eq!(updated.level.level_map, record.level.level_map);

        let bad = ColorPatch {
            accent_color: Some("red".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_level_colors("u1", &record.id, &bad),
            Err(StoreError::InvalidLevel(_))
        ));
        assert_eq!(
            store.get_level_for_user("u1", &record.id).expect("level").level.hud_color,
            "#ABCDEF"
        );
    }

    #[test]
    fn invalid_levels_and_names_never_reach_storage() {
        let store = Store::in_memory();
        assert!(matches!(
            store.create_set("u1", "  ", "jungle"),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(store.create_set("u1", &"x".repeat(65), "jungle").is_err());
        let set = store.create_set("u1", "Valid", "jungle").expect("set");

        let mut ragged = level();
        ragged.level_map[0].push('=');
        assert!(matches!(
            store.create_level("u1", &set.id, "Ragged", ragged),
            Err(StoreError::InvalidLevel(_))
        ));
        assert!(store.get_set_with_levels("u1", &set.id).expect("set").levels.is_empty());
        assert!(store.update_user_name("u1", &"n".repeat(33)).is_err());
        assert_eq!(
            store.update_user_name("u1", " Ada ").expect("user").name.as_deref(),
            Some("Ada")
        );
    }

    #[test]
    fn level_with_set_reports_its_start_index() {
        let store = Store::in_memory();
        let set = store.create_set("u1", "Run", "jungle").expect("set");
        store.create_level("u1", &set.id, "First", level()).expect("level");
        let second = store.create_level("u1", &set.id, "Second", level()).expect("level");
        let found = store.get_level_with_set("u1", &second.id).expect("level");
        assert_eq!(found.start_index, 1);
        assert_eq!(found.levels.len(), 2);
        assert_eq!(found.set.id, set.id);
    }

    #[test]
    fn chat_messages_come_back_in_order() {
        let store = Store::in_memory();
        let set = store.create_set("u1", "Chatty", "jungle").expect("set");
        let chat = store.get_or_create_chat_for_set("u1", &set.id).expect("chat");
        assert_eq!(chat.id, set.id);
        assert_eq!(
            store.get_or_create_chat_for_set("u1", &set.id).expect("chat"),
            chat
        );
        store.add_chat_message(&chat.id, ChatRole::User, "one").expect("msg");
        store.add_chat_message(&chat.id, ChatRole::Assistant, "two").expect("msg");
        store.add_chat_message(&chat.id, ChatRole::User, "three").expect("msg");
        let contents: Vec<String> = store
            .chat_messages(&chat.id)
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = temp_dir("reopen");
        let set_id = {
            let store = Store::open(&dir).expect("open");
            let set = store.create_set("u1", "Saved", "jungle").expect("set");
            store.create_level("u1", &set.id, "Kept", level()).expect("level");
            set.id
        };
        let reopened = Store::open(&dir).expect("reopen");
        let set = reopened.get_set_with_levels("u1", &set_id).expect("set");
        assert_eq!(set.levels.len(), 1);
        assert_eq!(set.levels[0].title, "Kept");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_snapshot_write_leaves_state_unchanged() {
        let dir = temp_dir("unwritable");
        let store = Store::open(&dir).expect("open");
        let kept = store.create_set("u1", "Kept", "jungle").expect("set");

        // A directory where the temp file should go makes the write fail.
        let blocker = dir.join(SNAPSHOT_FILE).with_extension("json.tmp");
        std::fs::create_dir_all(&blocker).expect("blocker");

        assert!(matches!(
            store.create_set("u1", "Lost", "lava"),
            Err(StoreError::Io(_))
        ));
        assert!(matches!(
            store.delete_set("u1", &kept.id),
            Err(StoreError::Io(_))
        ));
        let names: Vec<String> = store
            .list_sets_with_levels("u1")
            .into_iter()
            .map(|s| s.set.name)
            .collect();
        assert_eq!(names, vec!["Kept"]);

        std::fs::remove_dir_all(&blocker).expect("unblock");
        store.create_set("u1", "Later", "cave").expect("set");
        let reopened = Store::open(&dir).expect("reopen");
        assert_eq!(reopened.list_sets_with_levels("u1").len(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
