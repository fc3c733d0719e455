//! Request extractors: the authenticated caller and JSON/query payloads
//! whose rejections use the API's error body.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use emsu_shared::Role;

use crate::api::AppState;
use crate::error::ServerError;

/// The caller behind a live bearer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub id: Uuid,
    pub role: Role,
}

impl AuthenticatedPrincipal {
    /// Fail with 403 unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), ServerError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ServerError::Forbidden(format!(
                "role {} may not perform this action",
                self.role
            )))
        }
    }

    /// Fail with 403 unless the caller is a principal or proprietor.
    pub fn require_leadership(&self) -> Result<(), ServerError> {
        if self.role.is_leadership() {
            Ok(())
        } else {
            Err(ServerError::Forbidden(format!(
                "role {} may not perform this action",
                self.role
            )))
        }
    }

    /// A `userId` supplied alongside the session must name the caller.
    pub fn check_self(&self, user_id: Option<Uuid>) -> Result<(), ServerError> {
        match user_id {
            Some(id) if id != self.id => {
                Err(ServerError::Forbidden("cannot act for another user".into()))
            }
            _ => Ok(()),
        }
    }
}

/// The token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedPrincipal {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ServerError::Unauthorized)?;

        let db = state.db.lock().await;
        let session = db.get_live_session(token)?.ok_or(ServerError::Unauthorized)?;
        let user = db
            .get_user(session.user_id)?
            .filter(|u| u.is_active)
            .ok_or(ServerError::Unauthorized)?;

        Ok(Self {
            id: user.id,
            role: user.role,
        })
    }
}

/// `Json<T>` whose rejection is a 400 with the API's error body.
pub struct Payload<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        Ok(Payload(value))
    }
}

/// `Query<T>` whose rejection is a 400 with the API's error body.
pub struct Params<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        Ok(Params(value))
    }
}

/// A `:id` path segment parsed as a UUID.
pub struct Id(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        Ok(Id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_gate() {
        let caller = AuthenticatedPrincipal {
            id: Uuid::new_v4(),
            role: Role::Teacher,
        };
        assert!(caller.require(&[Role::Teacher, Role::Principal]).is_ok());
        assert!(matches!(
            caller.require(&[Role::Proprietor]),
            Err(ServerError::Forbidden(_))
        ));
    }

    #[test]
    fn leadership_gate() {
        for (role, allowed) in [
            (Role::Principal, true),
            (Role::Proprietor, true),
            (Role::Teacher, false),
            (Role::Student, false),
        ] {
            let caller = AuthenticatedPrincipal {
                id: Uuid::new_v4(),
                role,
            };
            assert_eq!(caller.require_leadership().is_ok(), allowed, "{role}");
        }
    }

    #[test]
    fn bearer_token_is_trimmed() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer  abc ".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn user_id_must_match_caller() {
        let caller = AuthenticatedPrincipal {
            id: Uuid::new_v4(),
            role: Role::Parent,
        };
        assert!(caller.check_self(None).is_ok());
        assert!(caller.check_self(Some(caller.id)).is_ok());
        assert!(caller.check_self(Some(Uuid::new_v4())).is_err());
    }
}
