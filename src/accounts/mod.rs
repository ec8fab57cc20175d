//! User accounts and authentication endpoints

pub mod handlers;
pub mod model;

pub use model::{AuthResponse, User, UserProfile};

use axum::Router;
use axum::routing::{delete, get, post, put};

use crate::config::SeedAdmin;
use crate::core::auth::{PasswordService, Role};
use crate::core::error::Result;
use crate::core::store::UserStore;
use crate::server::host::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/me", get(handlers::me).put(handlers::update_me))
        .route("/api/auth/password", put(handlers::change_password))
        .route("/api/users", get(handlers::list_users))
        .route("/api/users/{id}", delete(handlers::delete_user))
}

/// Create the configured admin account unless that email is already taken
///
/// Returns the new account, or `None` when nothing was created.
pub async fn seed_admin(
    users: &dyn UserStore,
    passwords: &PasswordService,
    seed: &SeedAdmin,
) -> Result<Option<User>> {
    let email = model::normalize_email(&seed.email);
    if let Some(existing) = users.find_by_email(&email).await? {
        if existing.role != Role::Admin {
            tracing::warn!(email = %email, "seed admin email belongs to a non-admin account");
        }
        return Ok(None);
    }

    let hash = passwords.hash(&seed.password)?;
    let admin = users
        .create(User::new(&seed.name, &email, hash, Role::Admin))
        .await?;
    tracing::info!(user_id = %admin.id, email = %admin.email, "seeded admin account");
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::storage::InMemoryDatabase;

    #[tokio::test]
    async fn test_seed_admin_is_idempotent() {
        let db = InMemoryDatabase::new();
        let stores = db.stores();
        let passwords = PasswordService::new(&AuthConfig::default()).unwrap();
        let seed = SeedAdmin {
            name: "Root".into(),
            email: "Root@Shop.test".into(),
            password: "changeme1".into(),
        };

        let created = seed_admin(stores.users.as_ref(), &passwords, &seed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.role, Role::Admin);
        assert_eq!(created.email, "root@shop.test");
        assert!(passwords.verify("changeme1", &created.password_hash));

        let again = seed_admin(stores.users.as_ref(), &passwords, &seed)
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(stores.users.list().await.unwrap().len(), 1);
    }
}
