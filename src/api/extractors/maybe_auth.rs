use axum::{
    extract::{FromRequestParts, FromRef},
    http::{request::Parts, StatusCode},
};
use crate::state::AppState;
use crate::domain::models::user::User;
use crate::api::extractors::auth::{decode_access_token, user_from_claims};
use std::sync::Arc;
use tower_cookies::Cookies;
use tracing::{debug, Span};

/// Like `AuthUser` but treats a missing or invalid token as a guest.
pub struct MaybeAuthUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);

        let Some(cookies) = parts.extensions.get::<Cookies>() else {
            return Ok(MaybeAuthUser(None));
        };

        let access_token = match cookies.get("access_token") {
            Some(cookie) => cookie.value().to_string(),
            None => return Ok(MaybeAuthUser(None)),
        };

        let token_data = match decode_access_token(&access_token, &app_state.config.jwt_public_key) {
            Ok(data) => data,
            Err(status) => {
                debug!("MaybeAuth: treating request as guest ({})", status);
                return Ok(MaybeAuthUser(None));
            }
        };

        let user = user_from_claims(token_data.claims);
        Span::current().record("user_id", user.id.as_str());

        Ok(MaybeAuthUser(Some(user)))
    }
}
