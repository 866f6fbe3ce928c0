use super::*;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub(super) const USER_HEADER: &str = "x-user-id";

/// Identity of the caller, taken from the `x-user-id` header set by whatever
/// handles sessions in front of this API.
pub(super) struct CurrentUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CurrentUser(v.to_string()))
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

/// Error reply: a status code plus the usual `{ ok: false, error }` envelope.
#[derive(Debug)]
pub(super) struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub(super) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(super) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub(super) fn channel_closed() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Channel closed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::err(self.message))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            StoreError::InvalidLevel(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Io(_) | StoreError::Serde(_) => {
                error!("[Markie API] Store failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<DesignerError> for ApiError {
    fn from(e: DesignerError) -> Self {
        match e {
            DesignerError::Store(e) => e.into(),
            DesignerError::InvalidRequest(msg) => Self::bad_request(msg),
            DesignerError::InvalidLevel(issues) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, issues.to_string())
            }
            DesignerError::Model(_) | DesignerError::Schema(_) => {
                warn!("[Markie API] Model failure: {e}");
                Self::new(StatusCode::BAD_GATEWAY, e.to_string())
            }
        }
    }
}

pub(super) type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub(super) fn ok<T: serde::Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Run one query against the ECS world and wait for its answer.
pub(super) async fn ask<T>(
    sender: &Sender<ApiCommand>,
    make: impl FnOnce(tokio::sync::oneshot::Sender<T>) -> ApiCommand,
) -> Result<T, ApiError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    sender
        .send(make(tx))
        .map_err(|_| ApiError::channel_closed())?;
    rx.await.map_err(|_| ApiError::channel_closed())
}

/// Run store or model work on the blocking pool.
pub(super) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!("[Markie API] Blocking task failed: {e}");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })?
}

pub(super) fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(std::time::Duration::from_secs(5))
        .text("keep-alive")
}

pub(super) fn sse_json(event: &str, payload: &impl serde::Serialize) -> SseEvent {
    let data = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().event(event).data(data)
}
