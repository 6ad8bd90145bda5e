use axum::{extract::State, response::IntoResponse, Json, http::StatusCode};
use crate::state::AppState;
use crate::error::AppError;
use crate::api::dtos::{requests::{LoginRequest, SignupRequest}, responses::SignupResponse};
use crate::domain::models::{auth::{AuthResponse, UserProfile}, user::{SupportRole, User}};
use crate::domain::services::auth_service::TokenPair;
use std::sync::Arc;
use tower_cookies::{Cookies, Cookie};
use tower_cookies::cookie::SameSite;
use time::Duration;
use argon2::{password_hash::{SaltString, PasswordHasher}, PasswordHash, Argon2, PasswordVerifier};
use rand::rngs::OsRng;
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 8;

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = payload.name.trim();
    let email = payload.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!("Password must be at least {} characters", MIN_PASSWORD_LEN)));
    }

    if state.user_repo.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|_| AppError::Internal)?
        .to_string();

    let mut user = User::new(name.to_string(), email, password_hash, payload.role.unwrap_or_default());
    if state.config.support_agent_emails.contains(&user.email) {
        user.support_role = SupportRole::Agent;
        info!("Signup matches a configured support agent email");
    }
    let created = state.user_repo.create(&user).await?;

    info!("User signed up: {}", created.id);

    Ok((StatusCode::CREATED, Json(SignupResponse { user: UserProfile::from(&created) })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.trim().to_lowercase();
    let user = state.user_repo.find_by_email(&email).await?
        .ok_or(AppError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal)?;

    Argon2::default().verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            warn!("Failed login for user {}", user.id);
            AppError::Unauthorized
        })?;

    let tokens = state.auth_service.login(&user).await?;

    set_cookies(&cookies, &tokens, state.config.cookie_secure);

    info!("User logged in: {}", user.id);

    Ok(Json(AuthResponse {
        csrf_token: tokens.csrf_token,
        user: UserProfile::from(&user),
    }))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<impl IntoResponse, AppError> {
    let refresh_cookie = cookies.get("refresh_token").ok_or(AppError::Unauthorized)?;
    let raw_token = refresh_cookie.value().to_string();

    let record = state.auth_service.validate_refresh(&raw_token).await?;

    let user = state.user_repo.find_by_id(&record.user_id).await?
        .ok_or(AppError::Unauthorized)?;

    let tokens = state.auth_service.refresh(&raw_token, &user).await?;

    set_cookies(&cookies, &tokens, state.config.cookie_secure);

    info!("Token refreshed for user: {}", user.id);

    Ok(Json(AuthResponse {
        csrf_token: tokens.csrf_token,
        user: UserProfile::from(&user),
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<impl IntoResponse, AppError> {
    if let Some(cookie) = cookies.get("refresh_token") {
        let _ = state.auth_service.logout(cookie.value()).await;
    }

    cookies.remove(Cookie::build(("access_token", "")).path("/").into());
    cookies.remove(Cookie::build(("refresh_token", "")).path("/").into());

    info!("User logged out");

    Ok(StatusCode::OK)
}

fn session_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    cookie.set_max_age(max_age);
    cookie
}

fn set_cookies(cookies: &Cookies, tokens: &TokenPair, secure: bool) {
    cookies.add(session_cookie("access_token", tokens.access_token.clone(), Duration::minutes(15), secure));
    cookies.add(session_cookie("refresh_token", tokens.refresh_token.clone(), Duration::days(7), secure));
}
