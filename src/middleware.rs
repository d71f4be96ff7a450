use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{http_objects::ApiError, routes::RouteState};

pub const FUNCTION_KEY_HEADER: &str = "x-functions-key";
const FUNCTION_KEY_QUERY_PARAM: &str = "code";

/// Rejects requests that do not carry the configured function key, either
/// in the `x-functions-key` header or the `code` query parameter.
pub async fn require_function_key(
    State(state): State<RouteState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.function_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(FUNCTION_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            request.uri().query().and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(k, _)| k == FUNCTION_KEY_QUERY_PARAM)
                    .map(|(_, v)| v.into_owned())
            })
        });

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        _ => Err(ApiError::unauthorized("Unauthorized")),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
