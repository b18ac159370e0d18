use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Self-service registration. Accounts start unlinked; an admin links them
/// to an employee record.
#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserReq {
    #[schema(example = "ana.ruiz")]
    pub username: String,
    pub password: String,
    #[schema(example = "ana.ruiz@company.com", format = "email")]
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    pub username: String,
    pub password: String,
}

#[derive(FromRow)]
pub struct UserSql {
    pub id: String,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub employee_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// JWT payload. The role is deliberately absent: it is resolved from the
/// directory on every request so role changes apply immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub sub: String,
    pub email: Option<String>,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_cannot_pick_an_employee() {
        let body = r#"{"username": "mallory", "password": "x", "employee_id": "E1"}"#;
        assert!(serde_json::from_str::<UserReq>(body).is_err());

        let plain: UserReq =
            serde_json::from_str(r#"{"username": "ana", "password": "x"}"#).unwrap();
        assert_eq!(plain.username, "ana");
        assert!(plain.email.is_none());
    }
}
