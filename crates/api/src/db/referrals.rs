//! Referral ledger repository for `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use garden_core::{ReferralId, ReferralStatus, UserId};

use super::{ReferralRepository, RepositoryError, map_unique_violation};
use crate::models::ReferralEntry;

/// Raw `garden.referral` row.
#[derive(Debug, sqlx::FromRow)]
struct ReferralRow {
    id: ReferralId,
    referrer_id: UserId,
    referee_id: UserId,
    status: ReferralStatus,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReferralRow> for ReferralEntry {
    type Error = RepositoryError;

    fn try_from(r: ReferralRow) -> Result<Self, Self::Error> {
        // An active entry without an activation time (or the reverse) cannot
        // come from the repository's own writes.
        if r.status.is_active() != r.activated_at.is_some() {
            return Err(RepositoryError::DataCorruption(format!(
                "referral {} has status {} but activated_at {:?}",
                r.id, r.status, r.activated_at
            )));
        }

        Ok(Self {
            id: r.id,
            referrer_id: r.referrer_id,
            referee_id: r.referee_id,
            status: r.status,
            created_at: r.created_at,
            activated_at: r.activated_at,
        })
    }
}

/// `PostgreSQL` implementation of [`ReferralRepository`].
#[derive(Clone)]
pub struct PgReferralRepository {
    pool: PgPool,
}

impl PgReferralRepository {
    /// Create a new referral repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralRepository for PgReferralRepository {
    async fn create(
        &self,
        referrer_id: UserId,
        referee_id: UserId,
    ) -> Result<ReferralEntry, RepositoryError> {
        let row = sqlx::query_as::<_, ReferralRow>(
            r"
            INSERT INTO garden.referral (id, referrer_id, referee_id)
            VALUES ($1, $2, $3)
            RETURNING id, referrer_id, referee_id, status, created_at, activated_at
            ",
        )
        .bind(ReferralId::generate())
        .bind(referrer_id)
        .bind(referee_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "referral for this referee"))?;

        row.try_into()
    }

    async fn get_by_referee(
        &self,
        referee_id: UserId,
    ) -> Result<Option<ReferralEntry>, RepositoryError> {
        sqlx::query_as::<_, ReferralRow>(
            r"
            SELECT id, referrer_id, referee_id, status, created_at, activated_at
            FROM garden.referral
            WHERE referee_id = $1
            ",
        )
        .bind(referee_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ReferralEntry::try_from)
        .transpose()
    }

    async fn activate(
        &self,
        referee_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE garden.referral
            SET status = 'active', activated_at = $2
            WHERE referee_id = $1 AND status = 'pending'
            ",
        )
        .bind(referee_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_referrer(
        &self,
        referrer_id: UserId,
    ) -> Result<Vec<ReferralEntry>, RepositoryError> {
        sqlx::query_as::<_, ReferralRow>(
            r"
            SELECT id, referrer_id, referee_id, status, created_at, activated_at
            FROM garden.referral
            WHERE referrer_id = $1
            ORDER BY created_at
            ",
        )
        .bind(referrer_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ReferralEntry::try_from)
        .collect()
    }

    async fn counts(&self) -> Result<(i64, i64), RepositoryError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'active')
            FROM garden.referral
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
