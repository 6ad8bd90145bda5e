use axum::{extract::{State, Path}, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::auth::AuthUser;
use crate::api::dtos::requests::UpdateSupportRoleRequest;
use crate::domain::models::{auth::UserProfile, user::SupportRole};
use crate::error::AppError;
use std::sync::Arc;
use tracing::{info, warn};

/// Agents grant or revoke the agent role. The target's token keeps its old
/// role until the next refresh or login.
pub async fn update_support_role(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSupportRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    if user.support_role != SupportRole::Agent {
        warn!("User {} tried to change the support role of {}", user.id, id);
        return Err(AppError::Forbidden("Only support agents can change support roles".into()));
    }

    let updated = state.user_repo.update_support_role(&id, payload.support_role).await?
        .ok_or(AppError::NotFound("User not found".into()))?;

    info!("User {} set support role of {} to {}", user.id, updated.id, updated.support_role.as_str());

    Ok(Json(UserProfile::from(&updated)))
}
