use super::*;
use crate::storage::{ChatMessage, LevelRecord, LevelSet, SetWithLevels, User};

pub(super) async fn list_sets(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<SetWithLevels>> {
    ok(blocking(move || Ok(state.store.list_sets_with_levels(&user))).await?)
}

pub(super) async fn create_set(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateSetRequest>,
) -> ApiResult<CreatedSet> {
    let owner = user.clone();
    let set: LevelSet =
        blocking(move || Ok(state.store.create_set(&owner, &req.name, &req.theme)?)).await?;
    info!("[Markie API] Created set {} for {user}", set.id);
    ok(CreatedSet { set_id: set.id })
}

pub(super) async fn get_set(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(set_id): Path<String>,
) -> ApiResult<SetWithLevels> {
    ok(blocking(move || Ok(state.store.get_set_with_levels(&user, &set_id)?)).await?)
}

pub(super) async fn delete_set(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(set_id): Path<String>,
) -> ApiResult<String> {
    blocking(move || Ok(state.store.delete_set(&user, &set_id)?)).await?;
    ok("ok".to_string())
}

/// Generate a level from the set's theme and append it.
pub(super) async fn create_level(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(set_id): Path<String>,
    Json(req): Json<CreateLevelRequest>,
) -> ApiResult<CreatedLevel> {
    let target = set_id.clone();
    let record =
        blocking(move || Ok(state.designer.create_level(&user, &target, &req.title)?)).await?;
    ok(CreatedLevel {
        level_id: record.id,
        set_id,
    })
}

pub(super) async fn update_level(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((set_id, level_id)): Path<(String, String)>,
    Json(req): Json<UpdateLevelRequest>,
) -> ApiResult<LevelRecord> {
    ok(blocking(move || {
        Ok(state
            .store
            .update_level(&user, &set_id, &level_id, &req.title, req.level)?)
    })
    .await?)
}

pub(super) async fn delete_level(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((set_id, level_id)): Path<(String, String)>,
) -> ApiResult<String> {
    blocking(move || Ok(state.store.delete_level(&user, &set_id, &level_id)?)).await?;
    ok("ok".to_string())
}

pub(super) async fn get_level(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(level_id): Path<String>,
) -> ApiResult<crate::storage::LevelInSet> {
    ok(blocking(move || Ok(state.store.get_level_with_set(&user, &level_id)?)).await?)
}

pub(super) async fn update_level_colors(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(level_id): Path<String>,
    Json(patch): Json<ColorPatch>,
) -> ApiResult<LevelRecord> {
    ok(blocking(move || Ok(state.store.update_level_colors(&user, &level_id, &patch)?)).await?)
}

pub(super) async fn get_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<User> {
    let account = blocking(move || {
        Ok(state.store.user(&user).unwrap_or(User {
            id: user,
            name: None,
            updated_at: 0,
        }))
    })
    .await?;
    ok(account)
}

pub(super) async fn update_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AccountRequest>,
) -> ApiResult<User> {
    ok(blocking(move || Ok(state.store.update_user_name(&user, &req.name)?)).await?)
}

pub(super) async fn get_chat_transcript(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(set_id): Path<String>,
) -> ApiResult<Vec<ChatMessage>> {
    let messages = blocking(move || {
        let chat = state.store.get_or_create_chat_for_set(&user, &set_id)?;
        Ok(state.store.chat_messages(&chat.id))
    })
    .await?;
    ok(messages)
}
