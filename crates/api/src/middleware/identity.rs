//! Caller identity extractor for Axum handlers.
//!
//! Authentication happens upstream of this service; the gateway in front of
//! it forwards the verified user id in the `x-user-id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use lessonline_core::error::CoreError;
use lessonline_core::types::DbId;

use crate::error::AppError;

/// Header carrying the verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user a request acts for.
///
/// ```ignore
/// async fn my_handler(caller: Caller) -> AppResult<Json<()>> {
///     tracing::info!(user_id = caller.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: DbId,
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Missing {USER_ID_HEADER} header"
                )))
            })?;

        let user_id = raw
            .trim()
            .parse::<DbId>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Invalid {USER_ID_HEADER} header"
                )))
            })?;

        Ok(Caller { user_id })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::http::Request;

    use super::*;

    async fn extract(value: Option<&str>) -> Result<Caller, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(USER_ID_HEADER, v);
        }
        let (mut parts, _) = builder.body(()).expect("request").into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_the_user_id_header() {
        let caller = extract(Some(" 42 ")).await.expect("caller");
        assert_eq!(caller.user_id, 42);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        assert_matches!(
            extract(None).await,
            Err(AppError::Core(CoreError::Unauthorized(_)))
        );
        assert_matches!(
            extract(Some("abc")).await,
            Err(AppError::Core(CoreError::Unauthorized(_)))
        );
        assert_matches!(
            extract(Some("0")).await,
            Err(AppError::Core(CoreError::Unauthorized(_)))
        );
    }
}
