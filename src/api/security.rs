use super::*;
use std::time::{Duration, Instant};

pub(super) const DEFAULT_API_RATE_LIMIT_PER_SEC: u32 = 180;

const RATE_WINDOW: Duration = Duration::from_secs(1);
/// Past this many tracked callers, idle buckets are swept.
const MAX_BUCKETS: usize = 4096;
const IDLE_BUCKET: Duration = Duration::from_secs(10);

/// Shared-secret check plus a fixed-window request budget per caller.
#[derive(Clone)]
pub(super) struct ApiSecurity {
    pub required_token: Option<String>,
    pub limiter: RateLimiter,
}

impl ApiSecurity {
    pub(super) fn new(required_token: Option<String>, rate_limit_per_sec: u32) -> Self {
        Self {
            required_token,
            limiter: RateLimiter::new(rate_limit_per_sec),
        }
    }

    pub(super) fn from_env() -> Self {
        let required_token = std::env::var("MARKIE_API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let rate_limit_per_sec = std::env::var("MARKIE_API_RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_API_RATE_LIMIT_PER_SEC);
        if required_token.is_some() {
            info!("[Markie API] Token required; limit {rate_limit_per_sec} req/s per caller");
        }
        Self::new(required_token, rate_limit_per_sec)
    }

    fn accepts(&self, headers: &axum::http::HeaderMap) -> bool {
        let Some(expected) = self.required_token.as_deref() else {
            return true;
        };
        presented_token(headers, "authorization")
            .map(|v| {
                v.strip_prefix("Bearer ")
                    .or_else(|| v.strip_prefix("bearer "))
                    .unwrap_or(v)
            })
            .is_some_and(|v| v == expected)
            || presented_token(headers, "x-api-key").is_some_and(|v| v == expected)
    }
}

fn presented_token<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Clone, Copy)]
struct RateWindow {
    start: Instant,
    count: u32,
}

#[derive(Clone)]
pub(super) struct RateLimiter {
    per_window: u32,
    windows: Arc<Mutex<HashMap<String, RateWindow>>>,
}

impl RateLimiter {
    pub(super) fn new(per_sec: u32) -> Self {
        Self {
            per_window: per_sec.max(1),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request for `key` at `now`; false once the window is spent.
    fn admit(&self, key: &str, now: Instant) -> bool {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if windows.len() > MAX_BUCKETS {
            windows.retain(|_, w| now.duration_since(w.start) < IDLE_BUCKET);
        }
        let window = windows.entry(key.to_string()).or_insert(RateWindow {
            start: now,
            count: 0,
        });
        if now.duration_since(window.start) >= RATE_WINDOW {
            *window = RateWindow {
                start: now,
                count: 0,
            };
        }
        window.count = window.count.saturating_add(1);
        window.count <= self.per_window
    }
}

/// Budgets follow the forwarded address. The player header only narrows the
/// key, so rotating it from one address cannot mint fresh budgets.
fn caller_key(headers: &axum::http::HeaderMap) -> String {
    let addr = presented_token(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| presented_token(headers, "x-real-ip"))
        .unwrap_or("local");
    format!("addr:{addr}")
}

pub(super) async fn api_guard(
    State(security): State<ApiSecurity>,
    req: Request,
    next: Next,
) -> Response {
    if !security.accepts(req.headers()) {
        return ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized: send Authorization: Bearer <MARKIE_API_TOKEN>",
        )
        .into_response();
    }
    let key = caller_key(req.headers());
    if !security.limiter.admit(&key, Instant::now()) {
        warn!("[Markie API] Rate limit hit for {key}");
        return ApiError::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }
    next.run(req).await
}
