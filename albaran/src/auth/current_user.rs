use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    db::handlers::{Repository, Store},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument};

/// Pull the bearer token out of the `Authorization` header.
fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(Error::Unauthenticated { message: None })?;

    let value = header.to_str().map_err(|e| Error::BadRequest {
        message: format!("Invalid authorization header: {e}"),
    })?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(Error::Unauthenticated {
            message: Some("Expected a bearer token".to_string()),
        })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let claims = session::verify_session_token(bearer_token(parts)?, &state.config)?;

        // Tokens outlive account changes; the stored record is authoritative
        let user = state
            .store
            .users()
            .get_by_id(claims.sub)
            .await?
            .filter(|user| !user.deleted)
            .ok_or(Error::Unauthenticated {
                message: Some("Account no longer exists".to_string()),
            })?;

        debug!(user_id = %crate::types::abbrev_uuid(&user.id), "authenticated bearer token");
        Ok(CurrentUser::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/user");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def.ghi"))).unwrap(), "abc.def.ghi");
        assert!(matches!(bearer_token(&parts(None)), Err(Error::Unauthenticated { .. })));
        assert!(matches!(
            bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))),
            Err(Error::Unauthenticated { .. })
        ));
        assert!(matches!(bearer_token(&parts(Some("Bearer "))), Err(Error::Unauthenticated { .. })));
    }
}
