use moka::future::Cache;
use serde::Serialize;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::debug;
use utoipa::ToSchema;

use super::error::StoreError;
use crate::model::employee::display_name;
use crate::model::role::Role;
use crate::utils::lookup_filter::CARD_FILTER;

/// Who is asking: the account id plus the e-mail it signed in with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

/// Employee resolved from a badge read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardHolder {
    pub employee_id: String,
    pub employee_name: String,
    /// Inactive employees are recognised but may not punch
    pub active: bool,
}

/// One employee as listed on the admin pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RosterEntry {
    pub employee_id: String,
    pub employee_name: String,
    pub active: bool,
    pub has_card: bool,
}

/// Lookups against the employee/profile directory.
#[allow(async_fn_in_trait)]
pub trait Directory {
    /// Role column of the profile with this account id.
    async fn role_by_user_id(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    /// Role column of the profile with this e-mail.
    async fn role_by_email(&self, email: &str) -> Result<Option<String>, StoreError>;

    async fn display_name(&self, employee_id: &str) -> Result<Option<String>, StoreError>;

    async fn find_by_card(&self, card_id: &str) -> Result<Option<CardHolder>, StoreError>;

    /// Every employee, ordered by name.
    async fn roster(&self) -> Result<Vec<RosterEntry>, StoreError>;

    /// Account id first; the e-mail is only consulted when the id has no profile.
    async fn resolve_role(&self, identity: &Identity) -> Result<Option<Role>, StoreError> {
        let raw = match self.role_by_user_id(&identity.user_id).await? {
            Some(role) => Some(role),
            None => match identity.email.as_deref().filter(|e| !e.is_empty()) {
                Some(email) => {
                    debug!(user_id = %identity.user_id, "No profile by id, trying e-mail");
                    self.role_by_email(email).await?
                }
                None => None,
            },
        };
        Ok(raw.as_deref().and_then(Role::from_column))
    }
}

#[derive(Clone)]
pub struct MySqlDirectory {
    pool: MySqlPool,
    names: Cache<String, String>,
}

impl MySqlDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            names: Cache::builder()
                .max_capacity(50_000)
                .time_to_live(Duration::from_secs(600))
                .build(),
        }
    }

    /// Drops a cached name after the employee record changed.
    pub async fn forget_name(&self, employee_id: &str) {
        self.names.invalidate(employee_id).await;
    }
}

impl Directory for MySqlDirectory {
    async fn role_by_user_id(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let role = sqlx::query_scalar::<_, Option<String>>("SELECT role FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role.flatten())
    }

    async fn role_by_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        let role = sqlx::query_scalar::<_, Option<String>>(
            "SELECT role FROM users WHERE email = ? LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role.flatten())
    }

    async fn display_name(&self, employee_id: &str) -> Result<Option<String>, StoreError> {
        if let Some(name) = self.names.get(employee_id).await {
            return Ok(Some(name));
        }

        let row = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT first_name, last_name FROM employees WHERE id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        let name = row.map(|(first, last)| display_name(&first, last.as_deref()));
        if let Some(name) = &name {
            self.names.insert(employee_id.to_string(), name.clone()).await;
        }
        Ok(name)
    }

    async fn find_by_card(&self, card_id: &str) -> Result<Option<CardHolder>, StoreError> {
        let card_id = card_id.trim();
        if !CARD_FILTER.might_contain(card_id) {
            debug!(card_id, "Card rejected by filter");
            return Ok(None);
        }

        let row = sqlx::query_as::<_, (String, String, Option<String>, String)>(
            r#"
            SELECT id, first_name, last_name, status
            FROM employees
            WHERE card_id = ?
            LIMIT 1
            "#,
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(employee_id, first, last, status)| CardHolder {
            employee_id,
            employee_name: display_name(&first, last.as_deref()),
            active: status == "active",
        }))
    }

    async fn roster(&self) -> Result<Vec<RosterEntry>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>, String, Option<String>)>(
            r#"
            SELECT id, first_name, last_name, status, card_id
            FROM employees
            ORDER BY first_name ASC, last_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(employee_id, first, last, status, card)| RosterEntry {
                employee_id,
                employee_name: display_name(&first, last.as_deref()),
                active: status == "active",
                has_card: card.is_some_and(|c| !c.trim().is_empty()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryDirectory;

    fn identity(user_id: &str, email: Option<&str>) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
        }
    }

    #[actix_web::test]
    async fn id_takes_precedence_over_email() {
        let dir = MemoryDirectory::default()
            .with_role_by_id("u1", "employee")
            .with_role_by_email("boss@corp.test", "super_admin");

        let role = dir
            .resolve_role(&identity("u1", Some("boss@corp.test")))
            .await
            .unwrap();
        assert_eq!(role, Some(Role::Employee));
    }

    #[actix_web::test]
    async fn email_is_used_when_id_has_no_profile() {
        let dir = MemoryDirectory::default().with_role_by_email("boss@corp.test", "super_admin");

        let role = dir
            .resolve_role(&identity("u2", Some("boss@corp.test")))
            .await
            .unwrap();
        assert_eq!(role, Some(Role::SuperAdmin));

        let none = dir.resolve_role(&identity("u2", None)).await.unwrap();
        assert_eq!(none, None);
    }

    #[actix_web::test]
    async fn unknown_role_value_resolves_to_none() {
        let dir = MemoryDirectory::default()
            .with_role_by_id("u3", "janitor")
            .with_role_by_email("x@corp.test", "admin");

        let role = dir
            .resolve_role(&identity("u3", Some("x@corp.test")))
            .await
            .unwrap();
        assert_eq!(role, None);
    }
}
