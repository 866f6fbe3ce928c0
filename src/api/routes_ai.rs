use super::*;

/// Rows first, so a client can draw the map while the rest arrives, then the
/// whole level.
fn level_stream(level: Level) -> Response {
    let stream = async_stream::stream! {
        for (index, row) in level.level_map.iter().enumerate() {
            yield Ok::<SseEvent, Infallible>(sse_json(
                "row",
                &serde_json::json!({ "index": index, "row": row }),
            ));
        }
        yield Ok::<SseEvent, Infallible>(sse_json("level", &level));
    };
    Sse::new(stream).keep_alive(keep_alive()).into_response()
}

pub(super) async fn generate_level(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let level = blocking(move || Ok(state.designer.generate(&req.prompt)?)).await?;
    Ok(level_stream(level))
}

pub(super) async fn edit_level(
    State(state): State<AppState>,
    Json(req): Json<EditRequest>,
) -> Result<Response, ApiError> {
    let level = blocking(move || Ok(state.designer.edit(&req.instruction, &req.level)?)).await?;
    Ok(level_stream(level))
}

pub(super) async fn level_ideas(
    State(state): State<AppState>,
    Json(req): Json<IdeasRequest>,
) -> ApiResult<IdeasResponse> {
    let ideas = blocking(move || {
        Ok(state
            .designer
            .ideas(req.theme.as_deref(), req.prompt.as_deref())?)
    })
    .await?;
    ok(IdeasResponse { ideas })
}

/// Streams each tool call, tool result and text turn, then a `done` event
/// listing the levels that were saved.
pub(super) async fn chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChatApiRequest>,
) -> Result<Response, ApiError> {
    let (Some(set_id), Some(level_id)) = (req.set_id.as_deref(), req.level_id.as_deref()) else {
        return Err(ApiError::bad_request("Invalid request"));
    };
    let (set_id, level_id) = (set_id.to_string(), level_id.to_string());
    let outcome = blocking(move || {
        Ok(state
            .designer
            .chat(&user, &set_id, &level_id, &req.messages)?)
    })
    .await?;
    let stream = async_stream::stream! {
        for step in &outcome.steps {
            let name = match step {
                crate::designer::ChatStep::ToolCall { .. } => "tool-call",
                crate::designer::ChatStep::ToolResult { .. } => "tool-result",
                crate::designer::ChatStep::Text { .. } => "text",
            };
            yield Ok::<SseEvent, Infallible>(sse_json(name, step));
        }
        yield Ok::<SseEvent, Infallible>(sse_json(
            "done",
            &serde_json::json!({ "text": outcome.text, "updatedLevels": outcome.updated_levels }),
        ));
    };
    Ok(Sse::new(stream).keep_alive(keep_alive()).into_response())
}
