use crate::model::role::Role;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    error::{ErrorForbidden, ErrorUnauthorized},
};
use futures::future::{Ready, ready};
use serde::Serialize;
use utoipa::ToSchema;

/// Caller identity placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<String>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Not authenticated")),
        )
    }
}

impl AuthUser {
    /// Admins and super admins.
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ErrorForbidden("Admin only"))
        }
    }

    pub fn require_super_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::SuperAdmin {
            Ok(())
        } else {
            Err(ErrorForbidden("Super admin only"))
        }
    }

    /// Employee record the caller clocks for.
    pub fn employee_id(&self) -> actix_web::Result<&str> {
        self.employee_id
            .as_deref()
            .ok_or_else(|| ErrorForbidden("No employee profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, employee_id: Option<&str>) -> AuthUser {
        AuthUser {
            user_id: "u-1".into(),
            username: "ana".into(),
            email: None,
            role,
            employee_id: employee_id.map(str::to_string),
        }
    }

    #[test]
    fn role_gates() {
        assert!(user(Role::SuperAdmin, None).require_admin().is_ok());
        assert!(user(Role::Admin, None).require_admin().is_ok());
        assert!(user(Role::Employee, None).require_admin().is_err());

        assert!(user(Role::SuperAdmin, None).require_super_admin().is_ok());
        assert!(user(Role::Admin, None).require_super_admin().is_err());
    }

    #[test]
    fn employee_id_requires_link() {
        assert_eq!(user(Role::Employee, Some("E1")).employee_id().unwrap(), "E1");
        assert!(user(Role::Employee, None).employee_id().is_err());
    }

    #[actix_web::test]
    async fn extracts_from_extensions() {
        use actix_web::test::TestRequest;

        let req = TestRequest::default().to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());

        req.extensions_mut().insert(user(Role::Admin, None));
        let extracted = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted.role, Role::Admin);
    }
}
