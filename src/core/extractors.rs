//! Axum extractors for the caller's identity
//!
//! Each extractor reads the bearer token through the [`TokenService`] found
//! in router state, so handlers receive decoded claims instead of headers.
//!
//! - [`CurrentUser`]: a valid token is required
//! - [`OptionalUser`]: anonymous without a header, rejected with a bad one
//! - [`AdminUser`]: a valid token whose role claim is `admin`

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::{AuthContext, AuthPolicy, Role, TokenService};
use crate::core::error::{ApiError, AuthError};

/// An authenticated caller
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn context(&self) -> AuthContext {
        AuthContext::User {
            user_id: self.user_id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

impl TryFrom<AuthContext> for CurrentUser {
    type Error = ApiError;

    fn try_from(context: AuthContext) -> Result<Self, Self::Error> {
        match context {
            AuthContext::User {
                user_id,
                email,
                role,
            } => Ok(Self {
                user_id,
                email,
                role,
            }),
            AuthContext::Anonymous => Err(AuthError::MissingToken.into()),
        }
    }
}

fn context_from_parts<S>(parts: &Parts, state: &S) -> Result<AuthContext, ApiError>
where
    Arc<TokenService>: FromRef<S>,
{
    let tokens = Arc::<TokenService>::from_ref(state);
    tokens.extract_context(&parts.headers)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        CurrentUser::try_from(context_from_parts(parts, state)?)
    }
}

/// The caller's context, anonymous when no token is sent
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalUser(pub AuthContext);

impl<S> FromRequestParts<S> for OptionalUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(context_from_parts(parts, state)?))
    }
}

/// An authenticated caller holding the admin role
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = context_from_parts(parts, state)?;
        AuthPolicy::AdminOnly.enforce(&context)?;
        Ok(AdminUser(CurrentUser::try_from(context)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use axum::http::Request;
    use axum::http::header::AUTHORIZATION;

    #[derive(Clone)]
    struct TestState {
        tokens: Arc<TokenService>,
    }

    impl FromRef<TestState> for Arc<TokenService> {
        fn from_ref(state: &TestState) -> Self {
            state.tokens.clone()
        }
    }

    fn state() -> TestState {
        TestState {
            tokens: Arc::new(TokenService::new(&AuthConfig::default())),
        }
    }

    fn parts(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_current_user_requires_token() {
        let state = state();
        let err = CurrentUser::from_request_parts(&mut parts(None), &state)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_TOKEN");

        let issued = state
            .tokens
            .issue(Uuid::new_v4(), "a@b.co", Role::Customer)
            .unwrap();
        let user = CurrentUser::from_request_parts(&mut parts(Some(&issued.token)), &state)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_optional_user() {
        let state = state();
        let OptionalUser(ctx) = OptionalUser::from_request_parts(&mut parts(None), &state)
            .await
            .unwrap();
        assert_eq!(ctx, AuthContext::Anonymous);

        let err = OptionalUser::from_request_parts(&mut parts(Some("garbage")), &state)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_admin_user() {
        let state = state();
        let customer = state
            .tokens
            .issue(Uuid::new_v4(), "c@b.co", Role::Customer)
            .unwrap();
        let err = AdminUser::from_request_parts(&mut parts(Some(&customer.token)), &state)
            .await
            .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 403);

        let admin = state
            .tokens
            .issue(Uuid::new_v4(), "a@b.co", Role::Admin)
            .unwrap();
        let AdminUser(user) = AdminUser::from_request_parts(&mut parts(Some(&admin.token)), &state)
            .await
            .unwrap();
        assert!(user.is_admin());
    }
}
