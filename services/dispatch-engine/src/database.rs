use crate::errors::{DispatchEngineError, Result};
use crate::models::{EarningRow, ParcelRow, RiderRow};
use chrono::{DateTime, Utc};
use parcel_core::{
    cashout, CashoutPlan, DeliveryStatus, Earning, Parcel, PaymentStatus, Rider, RiderStatus,
    RiderWorkStatus,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use uuid::Uuid;

pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DispatchEngineError::Internal(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Register a rider profile
    pub async fn create_rider(
        &self,
        name: &str,
        email: &str,
        region: &str,
        district: &str,
    ) -> Result<Rider> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, RiderRow>(
            r#"
            INSERT INTO riders (id, name, email, region, district, status, work_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(region)
        .bind(district)
        .bind(RiderStatus::Pending.as_str())
        .bind(RiderWorkStatus::Available.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DispatchEngineError::Duplicate(format!("rider email {} already registered", email))
            }
            _ => DispatchEngineError::Database(e),
        })?;

        row.try_into()
    }

    /// Get rider by identity email
    pub async fn get_rider_by_email(&self, email: &str) -> Result<Option<Rider>> {
        let row = sqlx::query_as::<_, RiderRow>(
            r#"
            SELECT * FROM riders WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Rider::try_from).transpose()
    }

    /// Flip a rider's availability flag. Returns false when no profile
    /// exists for the email.
    pub async fn set_rider_work_status(
        &self,
        email: &str,
        work_status: RiderWorkStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE riders
            SET work_status = $1, updated_at = $2
            WHERE email = $3
            "#,
        )
        .bind(work_status.as_str())
        .bind(Utc::now())
        .bind(email)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Create a new parcel
    pub async fn create_parcel(
        &self,
        tracking_code: &str,
        title: &str,
        sender_region: &str,
        receiver_region: &str,
        cost: Decimal,
        created_by: &str,
    ) -> Result<Parcel> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            INSERT INTO parcels (
                id, tracking_code, title, sender_region, receiver_region,
                cost, delivery_status, payment_status, created_by,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tracking_code)
        .bind(title)
        .bind(sender_region)
        .bind(receiver_region)
        .bind(cost)
        .bind(DeliveryStatus::NotCollected.as_str())
        .bind(PaymentStatus::Unpaid.as_str())
        .bind(created_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// Get parcel by ID
    pub async fn get_parcel(&self, parcel_id: Uuid) -> Result<Option<Parcel>> {
        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            SELECT * FROM parcels WHERE id = $1
            "#,
        )
        .bind(parcel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Parcel::try_from).transpose()
    }

    /// Assign a rider, guarded on the parcel still being unassigned.
    /// `None` means the guard did not match (already assigned or picked up).
    pub async fn assign_rider(
        &self,
        parcel_id: Uuid,
        rider_name: &str,
        rider_email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Parcel>> {
        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            UPDATE parcels
            SET assigned_rider_name = $1,
                assigned_rider_email = $2,
                delivery_status = $3,
                assigned_at = $4,
                updated_at = $4
            WHERE id = $5 AND delivery_status = $6
            RETURNING *
            "#,
        )
        .bind(rider_name)
        .bind(rider_email)
        .bind(DeliveryStatus::RiderAssigned.as_str())
        .bind(now)
        .bind(parcel_id)
        .bind(DeliveryStatus::NotCollected.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Parcel::try_from).transpose()
    }

    /// Compare-and-swap status advance: the update only lands if the parcel
    /// still carries `expected` and `actor_email` is still the assigned
    /// rider. `None` means another writer won the race.
    pub async fn advance_delivery_status(
        &self,
        parcel_id: Uuid,
        actor_email: &str,
        expected: DeliveryStatus,
        to: DeliveryStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Parcel>> {
        let delivered_at = (to == DeliveryStatus::Delivered).then_some(now);

        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            UPDATE parcels
            SET delivery_status = $1,
                delivered_at = COALESCE($2, delivered_at),
                updated_at = $3
            WHERE id = $4 AND assigned_rider_email = $5 AND delivery_status = $6
            RETURNING *
            "#,
        )
        .bind(to.as_str())
        .bind(delivered_at)
        .bind(now)
        .bind(parcel_id)
        .bind(actor_email)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Parcel::try_from).transpose()
    }

    /// Record the payment gateway result, guarded on the parcel still being
    /// unpaid. `None` means the guard did not match.
    pub async fn record_payment(
        &self,
        parcel_id: Uuid,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Parcel>> {
        let row = sqlx::query_as::<_, ParcelRow>(
            r#"
            UPDATE parcels
            SET payment_status = $1, payment_transaction_id = $2, updated_at = $3
            WHERE id = $4 AND payment_status = $5
            RETURNING *
            "#,
        )
        .bind(PaymentStatus::Paid.as_str())
        .bind(transaction_id)
        .bind(now)
        .bind(parcel_id)
        .bind(PaymentStatus::Unpaid.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Parcel::try_from).transpose()
    }

    /// Delivered parcels for a rider, newest first
    pub async fn delivered_parcels_for_rider(&self, rider_email: &str) -> Result<Vec<Parcel>> {
        let rows = sqlx::query_as::<_, ParcelRow>(
            r#"
            SELECT * FROM parcels
            WHERE assigned_rider_email = $1 AND delivery_status = $2
            ORDER BY delivered_at DESC
            "#,
        )
        .bind(rider_email)
        .bind(DeliveryStatus::Delivered.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Parcel::try_from).collect()
    }

    /// Append one earning to the ledger. The unique parcel constraint makes
    /// duplicate delivery writes a no-op; returns whether a row landed.
    pub async fn insert_earning(&self, earning: &Earning) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO earnings (id, parcel_id, rider_email, amount, rule, status, created_at, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (parcel_id) DO NOTHING
            "#,
        )
        .bind(earning.id)
        .bind(earning.parcel_id)
        .bind(&earning.rider_email)
        .bind(earning.amount)
        .bind(earning.rule.as_str())
        .bind(earning.status.as_str())
        .bind(earning.created_at)
        .bind(earning.paid_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Ledger entry for a parcel, if any
    pub async fn get_earning_for_parcel(&self, parcel_id: Uuid) -> Result<Option<Earning>> {
        let row = sqlx::query_as::<_, EarningRow>(
            r#"
            SELECT * FROM earnings WHERE parcel_id = $1
            "#,
        )
        .bind(parcel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Earning::try_from).transpose()
    }

    /// Rider's full ledger slice, paid and unpaid, oldest first
    pub async fn earnings_for_rider(&self, rider_email: &str) -> Result<Vec<Earning>> {
        let rows = sqlx::query_as::<_, EarningRow>(
            r#"
            SELECT * FROM earnings
            WHERE rider_email = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(rider_email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Earning::try_from).collect()
    }

    /// Plan and settle a cash-out in one transaction.
    ///
    /// The rider's unpaid rows are read under row locks, the FIFO selection
    /// is computed, and the selected rows flip to paid in a single guarded
    /// bulk update. A row-count mismatch aborts the transaction.
    pub async fn settle_cashout(
        &self,
        rider_email: &str,
        requested: i64,
        now: DateTime<Utc>,
    ) -> Result<CashoutPlan> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, EarningRow>(
            r#"
            SELECT * FROM earnings
            WHERE rider_email = $1 AND status = 'unpaid'
            ORDER BY created_at ASC, id ASC
            FOR UPDATE
            "#,
        )
        .bind(rider_email)
        .fetch_all(&mut *tx)
        .await?;

        let unpaid: Vec<Earning> = rows
            .into_iter()
            .map(Earning::try_from)
            .collect::<Result<_>>()?;

        let plan = cashout::plan_cashout(&unpaid, requested)?;

        let result = sqlx::query(
            r#"
            UPDATE earnings
            SET status = 'paid', paid_at = $1
            WHERE id = ANY($2) AND status = 'unpaid'
            "#,
        )
        .bind(now)
        .bind(&plan.selected)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != plan.selected.len() as u64 {
            return Err(DispatchEngineError::Conflict(
                "cash-out selection changed concurrently".to_string(),
            ));
        }

        tx.commit().await?;

        Ok(plan)
    }

    /// Delivered parcels with no ledger entry (the detectable write gap)
    pub async fn delivered_parcels_missing_earnings(&self, limit: i64) -> Result<Vec<Parcel>> {
        let rows = sqlx::query_as::<_, ParcelRow>(
            r#"
            SELECT p.* FROM parcels p
            LEFT JOIN earnings e ON e.parcel_id = p.id
            WHERE p.delivery_status = $1 AND e.id IS NULL
            ORDER BY p.delivered_at ASC
            LIMIT $2
            "#,
        )
        .bind(DeliveryStatus::Delivered.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Parcel::try_from).collect()
    }
}
