//! Postgres-backed directory.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | unique violation on `identities_email_active` | `Duplicate { field: "email" }` |
//! | unique violation on `identities_username_active` | `Duplicate { field: "username" }` |
//! | unique violation on `roles_name_key` | `Duplicate { field: "name" }` |
//! | foreign key violation | `NotFound` |
//! | anything else | `Unavailable` |
//!
//! Email and username uniqueness is a partial index over non-deleted rows, so
//! a soft-deleted identity releases both values.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use sesame_auth::{Identity, PendingReset, Profile, Role, RoleRecord};
use sesame_core::{IdentityId, RoleId};

use super::{IdentityStore, RoleStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    id UUID PRIMARY KEY,
    email TEXT NOT NULL,
    username TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    salutation TEXT,
    title TEXT,
    firstname TEXT,
    lastname TEXT,
    start_date DATE,
    holiday_days INTEGER NOT NULL DEFAULT 0,
    deleted BOOLEAN NOT NULL DEFAULT FALSE,
    reset_token TEXT,
    reset_expires_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS identities_email_active ON identities (email) WHERE NOT deleted;
CREATE UNIQUE INDEX IF NOT EXISTS identities_username_active ON identities (username) WHERE NOT deleted;
CREATE INDEX IF NOT EXISTS identities_reset_token ON identities (reset_token) WHERE reset_token IS NOT NULL;

CREATE TABLE IF NOT EXISTS roles (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL CONSTRAINT roles_name_key UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS identity_roles (
    identity_id UUID NOT NULL REFERENCES identities (id) ON DELETE CASCADE,
    role_id UUID NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
    PRIMARY KEY (identity_id, role_id)
);
"#;

const SELECT_IDENTITY: &str = r#"
SELECT
    i.id, i.email, i.username, i.password_hash,
    i.salutation, i.title, i.firstname, i.lastname, i.start_date, i.holiday_days,
    i.deleted, i.reset_token, i.reset_expires_at, i.created_at, i.updated_at,
    COALESCE(array_agg(r.name ORDER BY r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS role_names
FROM identities i
LEFT JOIN identity_roles ir ON ir.identity_id = i.id
LEFT JOIN roles r ON r.id = ir.role_id
"#;

/// An exact email match wins over a username match for the same login.
const LOGIN_FILTER: &str = "NOT i.deleted AND (i.email = $1 OR i.username = $1)";
const LOGIN_ORDER: &str = "(i.email = $1) DESC, i.created_at";

fn identity_sql(filter: &str, order: Option<&str>) -> String {
    match order {
        Some(order) => format!("{SELECT_IDENTITY} WHERE {filter} GROUP BY i.id ORDER BY {order} LIMIT 1"),
        None => format!("{SELECT_IDENTITY} WHERE {filter} GROUP BY i.id LIMIT 1"),
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

/// Directory backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they are missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn fetch_identity(
        &self,
        operation: &str,
        sql: String,
        bind: impl FnOnce(PgQuery<'_>) -> PgQuery<'_> + Send,
    ) -> Result<Option<Identity>, StoreError> {
        let row = bind(sqlx::query(&sql))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        row.map(|row| {
            IdentityRow::from_row(&row)
                .map(Identity::from)
                .map_err(|e| map_sqlx_error(operation, e))
        })
        .transpose()
    }
}

#[async_trait]
impl IdentityStore for PostgresDirectory {
    #[instrument(skip_all, err)]
    async fn find_by_login(&self, login: &str) -> Result<Option<Identity>, StoreError> {
        let login = login.to_string();
        self.fetch_identity(
            "find_by_login",
            identity_sql(LOGIN_FILTER, Some(LOGIN_ORDER)),
            |q| q.bind(login),
        )
        .await
    }

    #[instrument(skip_all, err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let email = email.to_string();
        self.fetch_identity(
            "find_by_email",
            identity_sql("NOT i.deleted AND i.email = $1", None),
            |q| q.bind(email),
        )
        .await
    }

    #[instrument(skip(self), fields(identity_id = %id), err)]
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        let id = *id.as_uuid();
        self.fetch_identity("find_by_id", identity_sql("i.id = $1", None), |q| q.bind(id))
            .await
    }

    #[instrument(skip_all, fields(identity_id = %identity.id), err)]
    async fn create(&self, identity: Identity) -> Result<Identity, StoreError> {
        let (reset_token, reset_expires_at) = split_reset(identity.pending_reset.as_ref());
        sqlx::query(
            r#"
            INSERT INTO identities (
                id, email, username, password_hash,
                salutation, title, firstname, lastname, start_date, holiday_days,
                deleted, reset_token, reset_expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(&identity.email)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(&identity.profile.salutation)
        .bind(&identity.profile.title)
        .bind(&identity.profile.firstname)
        .bind(&identity.profile.lastname)
        .bind(identity.profile.start_date)
        .bind(identity.profile.holiday_days)
        .bind(identity.deleted)
        .bind(reset_token)
        .bind(reset_expires_at)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_identity", e))?;

        Ok(Identity {
            roles: Vec::new(),
            ..identity
        })
    }

    #[instrument(skip_all, fields(identity_id = %identity.id), err)]
    async fn update(&self, identity: &Identity) -> Result<(), StoreError> {
        let (reset_token, reset_expires_at) = split_reset(identity.pending_reset.as_ref());
        let result = sqlx::query(
            r#"
            UPDATE identities SET
                email = $2, username = $3, password_hash = $4,
                salutation = $5, title = $6, firstname = $7, lastname = $8,
                start_date = $9, holiday_days = $10, deleted = $11,
                reset_token = $12, reset_expires_at = $13, updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(&identity.email)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(&identity.profile.salutation)
        .bind(&identity.profile.title)
        .bind(&identity.profile.firstname)
        .bind(&identity.profile.lastname)
        .bind(identity.profile.start_date)
        .bind(identity.profile.holiday_days)
        .bind(identity.deleted)
        .bind(reset_token)
        .bind(reset_expires_at)
        .bind(identity.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_identity", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, reset), fields(identity_id = %id), err)]
    async fn set_pending_reset(&self, id: IdentityId, reset: &PendingReset) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE identities SET reset_token = $2, reset_expires_at = $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&reset.token)
        .bind(reset.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_pending_reset", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, StoreError> {
        let token = token.to_string();
        self.fetch_identity(
            "find_by_reset_token",
            identity_sql(
                "NOT i.deleted AND i.reset_token = $1 AND i.reset_expires_at > $2",
                None,
            ),
            |q| q.bind(token).bind(now),
        )
        .await
    }

    #[instrument(skip_all, err)]
    async fn redeem_reset(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityId>, StoreError> {
        // Single statement: the row lock makes concurrent redemptions race to
        // exactly one winner.
        let row = sqlx::query(
            r#"
            UPDATE identities SET
                password_hash = $2, reset_token = NULL, reset_expires_at = NULL, updated_at = $3
            WHERE reset_token = $1 AND reset_expires_at > $3 AND NOT deleted
            RETURNING id
            "#,
        )
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("redeem_reset", e))?;

        row.map(|row| {
            row.try_get::<Uuid, _>("id")
                .map(IdentityId::from_uuid)
                .map_err(|e| map_sqlx_error("redeem_reset", e))
        })
        .transpose()
    }

    #[instrument(skip(self, roles), fields(identity_id = %id, role_count = roles.len()), err)]
    async fn assign_roles(&self, id: IdentityId, roles: &[RoleId]) -> Result<(), StoreError> {
        if roles.is_empty() {
            return Ok(());
        }
        let role_ids: Vec<Uuid> = roles.iter().map(|r| *r.as_uuid()).collect();
        sqlx::query(
            r#"
            INSERT INTO identity_roles (identity_id, role_id)
            SELECT $1, role_id FROM unnest($2::uuid[]) AS role_id
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .bind(role_ids)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assign_roles", e))?;
        Ok(())
    }
}

#[async_trait]
impl RoleStore for PostgresDirectory {
    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let rows = sqlx::query("SELECT id, name, description FROM roles ORDER BY name")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        rows.iter()
            .map(|row| role_from_row(row).map_err(|e| map_sqlx_error("list_roles", e)))
            .collect()
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn find_role(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role", e))?;
        row.map(|row| role_from_row(&row).map_err(|e| map_sqlx_error("find_role", e)))
            .transpose()
    }

    #[instrument(skip_all, err)]
    async fn find_roles_by_names(&self, names: &[Role]) -> Result<Vec<RoleRecord>, StoreError> {
        let names: Vec<String> = names.iter().map(|n| n.as_str().to_string()).collect();
        let rows = sqlx::query("SELECT id, name, description FROM roles WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_roles_by_names", e))?;
        rows.iter()
            .map(|row| role_from_row(row).map_err(|e| map_sqlx_error("find_roles_by_names", e)))
            .collect()
    }

    #[instrument(skip_all, fields(role_id = %role.id), err)]
    async fn create_role(&self, role: RoleRecord) -> Result<RoleRecord, StoreError> {
        sqlx::query("INSERT INTO roles (id, name, description) VALUES ($1, $2, $3)")
            .bind(role.id.as_uuid())
            .bind(role.name.as_str())
            .bind(&role.description)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_role", e))?;
        Ok(role)
    }

    #[instrument(skip_all, fields(role_id = %role.id), err)]
    async fn update_role(&self, role: &RoleRecord) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE roles SET name = $2, description = $3 WHERE id = $1")
            .bind(role.id.as_uuid())
            .bind(role.name.as_str())
            .bind(&role.description)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_role", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        Ok(result.rows_affected() > 0)
    }
}

fn split_reset(reset: Option<&PendingReset>) -> (Option<String>, Option<DateTime<Utc>>) {
    match reset {
        Some(r) => (Some(r.token.clone()), Some(r.expires_at)),
        None => (None, None),
    }
}

struct IdentityRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    salutation: Option<String>,
    title: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    start_date: Option<NaiveDate>,
    holiday_days: i32,
    deleted: bool,
    reset_token: Option<String>,
    reset_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role_names: Vec<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for IdentityRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(IdentityRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            salutation: row.try_get("salutation")?,
            title: row.try_get("title")?,
            firstname: row.try_get("firstname")?,
            lastname: row.try_get("lastname")?,
            start_date: row.try_get("start_date")?,
            holiday_days: row.try_get("holiday_days")?,
            deleted: row.try_get("deleted")?,
            reset_token: row.try_get("reset_token")?,
            reset_expires_at: row.try_get("reset_expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            role_names: row.try_get("role_names")?,
        })
    }
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        let pending_reset = match (row.reset_token, row.reset_expires_at) {
            (Some(token), Some(expires_at)) => Some(PendingReset { token, expires_at }),
            _ => None,
        };
        Identity {
            id: IdentityId::from_uuid(row.id),
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            profile: Profile {
                salutation: row.salutation,
                title: row.title,
                firstname: row.firstname,
                lastname: row.lastname,
                start_date: row.start_date,
                holiday_days: row.holiday_days,
            },
            deleted: row.deleted,
            pending_reset,
            roles: row.role_names.into_iter().map(Role::new).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn role_from_row(row: &PgRow) -> Result<RoleRecord, sqlx::Error> {
    let id: Uuid = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    Ok(RoleRecord {
        id: RoleId::from_uuid(id),
        name: Role::new(name),
        description: row.try_get("description")?,
    })
}

/// Field reported for a unique-constraint name.
fn duplicate_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("identities_email_active") => "email",
        Some("identities_username_active") => "username",
        Some("roles_name_key") => "name",
        Some("identities_pkey") | Some("roles_pkey") => "id",
        _ => "unknown",
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() {
                StoreError::Duplicate {
                    field: duplicate_field(db_err.constraint()),
                }
            } else if db_err.is_foreign_key_violation() {
                StoreError::NotFound
            } else {
                StoreError::Unavailable(format!(
                    "database error in {}: {}",
                    operation,
                    db_err.message()
                ))
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
