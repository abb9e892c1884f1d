//! User repository for `PostgreSQL`.
//!
//! Rows are decoded into [`User`] through [`UserRow`]; a row whose email or
//! referral code fails validation is reported as data corruption.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use garden_core::{Email, ReferralCode, ReferralId, UserId};

use super::{RepositoryError, UserRepository, map_unique_violation};
use crate::models::{NewUser, ProfileUpdate, User};

macro_rules! user_columns {
    () => {
        "id, email, name, first_name, last_name, is_admin, referral_code, referred_by, \
         token_version, created_at, updated_at"
    };
}

/// Raw `garden.user` row.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    first_name: Option<String>,
    last_name: Option<String>,
    is_admin: bool,
    referral_code: Option<String>,
    referred_by: Option<Uuid>,
    token_version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A user row joined with its password hash.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        let referral_code = r
            .referral_code
            .as_deref()
            .map(ReferralCode::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid referral code in database: {e}"))
            })?;

        Ok(Self {
            id: UserId::new(r.id),
            email,
            name: r.name,
            first_name: r.first_name,
            last_name: r.last_name,
            is_admin: r.is_admin,
            referral_code,
            referred_by: r.referred_by.map(UserId::new),
            token_version: r.token_version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// `PostgreSQL` implementation of [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(
        &self,
        query: &'static str,
        bind: impl for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
    ) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(query)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(concat!(
            "INSERT INTO garden.user ",
            "(id, email, password_hash, name, first_name, last_name, referred_by) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7) ",
            "RETURNING ",
            user_columns!()
        ))
        .bind(UserId::generate())
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.name)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.referred_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;

        let user = User::try_from(row)?;

        // Pending ledger entry for the referrer
        if let Some(referrer_id) = new_user.referred_by {
            sqlx::query(
                r"
                INSERT INTO garden.referral (id, referrer_id, referee_id)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(ReferralId::generate())
            .bind(referrer_id)
            .bind(user.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, "referral for this referee"))?;
        }

        tx.commit().await?;

        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_by(
            concat!("SELECT ", user_columns!(), " FROM garden.user WHERE id = $1"),
            id,
        )
        .await
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_by(
            concat!("SELECT ", user_columns!(), " FROM garden.user WHERE email = $1"),
            email.clone(),
        )
        .await
    }

    async fn get_by_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_by(
            concat!(
                "SELECT ",
                user_columns!(),
                " FROM garden.user WHERE referral_code = $1"
            ),
            code.clone(),
        )
        .await
    }

    async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(concat!(
            "SELECT ",
            user_columns!(),
            ", password_hash FROM garden.user WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        let user = User::try_from(r.user)?;
        Ok(Some((user, r.password_hash)))
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM garden.user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE garden.user ",
            "SET password_hash = $2, token_version = token_version + 1, updated_at = now() ",
            "WHERE id = $1 ",
            "RETURNING ",
            user_columns!()
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE garden.user SET ",
            "name = COALESCE($2, name), ",
            "first_name = CASE WHEN $3 THEN $4 ELSE first_name END, ",
            "last_name = CASE WHEN $5 THEN $6 ELSE last_name END, ",
            "updated_at = now() ",
            "WHERE id = $1 ",
            "RETURNING ",
            user_columns!()
        ))
        .bind(id)
        .bind(&update.name)
        .bind(update.first_name.is_some())
        .bind(update.first_name.clone().flatten())
        .bind(update.last_name.is_some())
        .bind(update.last_name.clone().flatten())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn assign_referral_code(
        &self,
        id: UserId,
        code: &ReferralCode,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE garden.user
            SET referral_code = $2, updated_at = now()
            WHERE id = $1 AND referral_code IS NULL
            ",
        )
        .bind(id)
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "referral code"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_referred_by(
        &self,
        id: UserId,
        referrer: UserId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE garden.user
            SET referred_by = $2, updated_at = now()
            WHERE id = $1 AND referred_by IS NULL AND id <> $2
            ",
        )
        .bind(id)
        .bind(referrer)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_admin(
        &self,
        email: &Email,
        is_admin: bool,
    ) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE garden.user SET is_admin = $2, updated_at = now() ",
            "WHERE email = $1 ",
            "RETURNING ",
            user_columns!()
        ))
        .bind(email)
        .bind(is_admin)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM garden.user")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
