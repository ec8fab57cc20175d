//! Registration, login, profile and user administration

use axum::extract::State;
use std::sync::Arc;
use uuid::Uuid;

use super::model::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
    User, UserProfile, normalize_email,
};
use crate::core::auth::{PasswordService, Role};
use crate::core::envelope::{Envelope, EnvelopeResponse};
use crate::core::error::{ApiError, AuthError, EntityError, Result};
use crate::core::extractors::{AdminUser, CurrentUser};
use crate::core::validation::{PathParams, Validated};
use crate::server::host::AppState;

// Argon2 blocks for tens of milliseconds; run it on the blocking pool
async fn hash_password(passwords: Arc<PasswordService>, plain: String) -> Result<String> {
    tokio::task::spawn_blocking(move || passwords.hash(&plain))
        .await
        .map_err(|e| ApiError::internal(format!("password worker failed: {e}")))?
}

async fn verify_password(
    passwords: Arc<PasswordService>,
    plain: String,
    hash: String,
) -> Result<bool> {
    tokio::task::spawn_blocking(move || passwords.verify(&plain, &hash))
        .await
        .map_err(|e| ApiError::internal(format!("password worker failed: {e}")))
}

/// The stored account behind a token; a deleted account invalidates its tokens
async fn account(state: &AppState, caller: &CurrentUser) -> Result<User> {
    state
        .stores
        .users
        .get(&caller.user_id)
        .await?
        .ok_or_else(|| AuthError::InvalidToken.into())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Validated(payload): Validated<RegisterRequest>,
) -> Result<EnvelopeResponse<AuthResponse>> {
    let email = normalize_email(&payload.email);
    if state.stores.users.find_by_email(&email).await?.is_some() {
        return Err(EntityError::already_exists("user", email).into());
    }

    let hash = hash_password(state.passwords.clone(), payload.password).await?;
    let user = state
        .stores
        .users
        .create(User::new(&payload.name, &email, hash, Role::Customer))
        .await?;
    let issued = state.tokens.issue(user.id, &user.email, user.role)?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(Envelope::created(
        "Account created",
        AuthResponse::new(&user, issued),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Validated(payload): Validated<LoginRequest>,
) -> Result<Envelope<AuthResponse>> {
    let email = normalize_email(&payload.email);
    let user = state.stores.users.find_by_email(&email).await?;

    // Unknown emails still pay for a verification so timing does not reveal them
    let hash = match &user {
        Some(user) => user.password_hash.clone(),
        None => state.passwords.decoy_hash().to_string(),
    };
    let valid = verify_password(state.passwords.clone(), payload.password, hash).await?;

    let user = match user {
        Some(user) if valid => user,
        Some(user) => {
            tracing::warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        None => {
            tracing::warn!("login rejected: unknown email");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let issued = state.tokens.issue(user.id, &user.email, user.role)?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Envelope::ok("Logged in", AuthResponse::new(&user, issued)))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, caller: CurrentUser) -> Result<Envelope<UserProfile>> {
    let user = account(&state, &caller).await?;
    Ok(Envelope::ok("Profile fetched", user.profile()))
}

/// PUT /api/auth/me
pub async fn update_me(
    State(state): State<AppState>,
    caller: CurrentUser,
    Validated(payload): Validated<UpdateProfileRequest>,
) -> Result<Envelope<UserProfile>> {
    let mut user = account(&state, &caller).await?;

    if let Some(name) = payload.name {
        user.name = name.trim().to_string();
    }
    if let Some(email) = payload.email {
        let email = normalize_email(&email);
        if email != user.email {
            if let Some(other) = state.stores.users.find_by_email(&email).await?
                && other.id != user.id
            {
                return Err(EntityError::already_exists("user", email).into());
            }
            user.email = email;
        }
    }
    user.touch();

    let user = state.stores.users.update(user).await?;
    tracing::info!(user_id = %user.id, "profile updated");
    Ok(Envelope::ok("Profile updated", user.profile()))
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    caller: CurrentUser,
    Validated(payload): Validated<ChangePasswordRequest>,
) -> Result<Envelope<UserProfile>> {
    let mut user = account(&state, &caller).await?;

    let valid = verify_password(
        state.passwords.clone(),
        payload.current_password,
        user.password_hash.clone(),
    )
    .await?;
    if !valid {
        tracing::warn!(user_id = %user.id, "password change rejected");
        return Err(AuthError::InvalidCredentials.into());
    }

    user.password_hash = hash_password(state.passwords.clone(), payload.new_password).await?;
    user.touch();
    let user = state.stores.users.update(user).await?;

    tracing::info!(user_id = %user.id, "password changed");
    Ok(Envelope::ok("Password updated", user.profile()))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Envelope<Vec<UserProfile>>> {
    let users = state.stores.users.list().await?;
    Ok(Envelope::ok(
        format!("{} users", users.len()),
        users.iter().map(User::profile).collect(),
    ))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParams(id): PathParams<Uuid>,
) -> Result<Envelope<UserProfile>> {
    let user = state
        .stores
        .users
        .get(&id)
        .await?
        .ok_or_else(|| EntityError::not_found("user", id))?;

    state.stores.users.delete(&id).await?;
    let favorites = state.stores.favorites.remove_for_user(&id).await?;

    tracing::info!(user_id = %id, admin = %admin.user_id, favorites, "user deleted");
    Ok(Envelope::ok("User deleted", user.profile()))
}
