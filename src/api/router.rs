use super::*;

pub(super) fn build_router(state: AppState, security: ApiSecurity) -> Router {
    Router::new()
        // Sets & levels
        .route("/sets", get(list_sets).post(create_set))
        .route("/sets/{set_id}", get(get_set).delete(delete_set))
        .route("/sets/{set_id}/levels", post(create_level))
        .route(
            "/sets/{set_id}/levels/{level_id}",
            put(update_level).delete(delete_level),
        )
        .route("/levels/{level_id}", get(get_level))
        .route("/levels/{level_id}/colors", patch(update_level_colors))
        .route("/account", get(get_account).post(update_account))
        .route("/chats/{set_id}", get(get_chat_transcript))
        // AI
        .route("/api/levels/generate", post(generate_level))
        .route("/api/levels/edit", post(edit_level))
        .route("/api/levels/ideas", post(level_ideas))
        .route("/api/chat", post(chat))
        // Play
        .route("/play/levels/{level_id}", post(play_level))
        .route("/play/sets/{set_id}", post(play_set))
        .route("/game/load_level", post(load_level))
        .route("/game/state", get(get_game_state))
        .route("/game/events", get(get_events))
        .route("/game/bridge/subscribe", get(subscribe_bridge))
        .with_state(state)
        .layer(middleware::from_fn_with_state(security, api_guard))
}
