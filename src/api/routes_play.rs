use super::*;

fn push_playlist(
    bridge: &EventBridge,
    levels: Vec<Level>,
    start_index: usize,
    set_id: Option<String>,
) -> PlayResponse {
    let level_count = levels.len();
    let start_index = start_index.min(level_count.saturating_sub(1));
    let delivered = bridge.emit(BridgeEvent::SetLevels {
        levels,
        start_index,
        set_id: set_id.clone(),
    });
    info!(
        "[Markie API] Pushed {level_count} level(s) starting at {start_index} to {delivered} subscriber(s)"
    );
    PlayResponse {
        set_id,
        start_index,
        level_count,
        delivered,
    }
}

/// Play the set a level belongs to, starting at that level.
pub(super) async fn play_level(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(level_id): Path<String>,
) -> ApiResult<PlayResponse> {
    let store = state.store.clone();
    let found = blocking(move || Ok(store.get_level_with_set(&user, &level_id)?)).await?;
    let levels = found.levels.into_iter().map(|r| r.level).collect();
    ok(push_playlist(
        &state.bridge,
        levels,
        found.start_index,
        Some(found.set.id),
    ))
}

pub(super) async fn play_set(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(set_id): Path<String>,
) -> ApiResult<PlayResponse> {
    let store = state.store.clone();
    let target = set_id.clone();
    let set = blocking(move || Ok(store.get_set_with_levels(&user, &target)?)).await?;
    if set.levels.is_empty() {
        return Err(ApiError::bad_request("This set has no levels yet"));
    }
    let levels = set.levels.into_iter().map(|r| r.level).collect();
    ok(push_playlist(&state.bridge, levels, 0, Some(set_id)))
}

/// Play a single unsaved level, e.g. one fresh from the AI prompt.
pub(super) async fn load_level(
    State(state): State<AppState>,
    Json(req): Json<LoadLevelRequest>,
) -> ApiResult<PlayResponse> {
    req.level
        .validate()
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let delivered = state.bridge.emit(BridgeEvent::LoadLevel { level: req.level });
    ok(PlayResponse {
        set_id: None,
        start_index: 0,
        level_count: 1,
        delivered,
    })
}

pub(super) async fn get_game_state(State(state): State<AppState>) -> ApiResult<RuntimeSnapshot> {
    ok(ask(&state.sender, ApiCommand::GetRuntime).await?)
}

pub(super) async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<GameEvent>> {
    ok(ask(&state.sender, |tx| ApiCommand::GetEvents(query.since, tx)).await?)
}

/// Server-sent stream of everything the runtime sends outward (navigation,
/// prompts, level readiness, deaths).
pub(super) async fn subscribe_bridge(State(state): State<AppState>) -> impl IntoResponse {
    let subscription = state.bridge.subscribe();
    let stream = async_stream::stream! {
        let mut tick = tokio::time::interval(std::time::Duration::from_millis(50));
        loop {
            tick.tick().await;
            for event in subscription.drain() {
                if event.direction() == Direction::Outbound {
                    yield Ok::<SseEvent, Infallible>(sse_json(event.name(), &event));
                }
            }
        }
    };
    Sse::new(stream).keep_alive(keep_alive())
}
