use crate::errors::{AppError, ResultExt};
use crate::models::{
    subscription_status, AppointmentSummary, DepartmentStat, InviteRequest, OnboardingRecord,
    Organization, OrgTotals, Profile, StoreScore, Tier, WeekdayCount,
};
use crate::onboarding::WizardState;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Database storage for organizations, onboarding drafts, profiles,
/// billing event receipts, and dashboard aggregates.
pub struct OrgStorage {
    pool: PgPool,
}

impl OrgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ===== Onboarding drafts =====

    /// Creates an empty wizard draft and returns its id.
    pub async fn create_draft(&self) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        let state = serde_json::to_value(WizardState::new())
            .map_err(|e| AppError::InternalError(format!("Failed to serialize draft: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO onboarding_drafts (id, state, submitted, created_at)
            VALUES ($1, $2, false, now())
            "#,
        )
        .bind(id)
        .bind(state)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created onboarding draft {}", id);
        Ok(id)
    }

    /// Loads a draft's wizard state and submitted flag.
    pub async fn load_draft(&self, id: Uuid) -> Result<(WizardState, bool), AppError> {
        let row = sqlx::query_as::<_, (Value, bool)>(
            "SELECT state, submitted FROM onboarding_drafts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Onboarding draft {} not found", id)))?;

        let state: WizardState = serde_json::from_value(row.0)
            .map_err(|e| AppError::InternalError(format!("Corrupt draft state: {}", e)))?;

        Ok((state, row.1))
    }

    /// Persists the wizard state of an unsubmitted draft.
    /// Returns the number of rows touched (0 when already submitted).
    pub async fn save_draft(&self, id: Uuid, state: &WizardState) -> Result<u64, AppError> {
        let state = serde_json::to_value(state)
            .map_err(|e| AppError::InternalError(format!("Failed to serialize draft: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE onboarding_drafts
            SET state = $2, updated_at = now()
            WHERE id = $1 AND submitted = false
            "#,
        )
        .bind(id)
        .bind(state)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Finalizes a draft: creates the organization carrying the record and
    /// marks the draft submitted, in one transaction. Submitting a draft
    /// twice fails without creating a second organization.
    pub async fn submit_onboarding(
        &self,
        draft_id: Uuid,
        record: &OnboardingRecord,
    ) -> Result<Uuid, AppError> {
        let org_id = Uuid::new_v4();
        let name = record
            .business_name
            .clone()
            .ok_or_else(|| AppError::BadRequest("business name is required".to_string()))?;
        let tier = record.tier.unwrap_or(Tier::Free);
        let onboarding = serde_json::to_value(record)
            .map_err(|e| AppError::InternalError(format!("Failed to serialize record: {}", e)))?;

        let mut tx = self.pool.begin().await?;

        let marked = sqlx::query(
            r#"
            UPDATE onboarding_drafts
            SET submitted = true, updated_at = now()
            WHERE id = $1 AND submitted = false
            "#,
        )
        .bind(draft_id)
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() == 0 {
            return Err(AppError::BadRequest(
                "Onboarding was already submitted".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO organizations
                (id, name, tier, subscription_status, onboarding, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(org_id)
        .bind(&name)
        .bind(tier.as_str())
        .bind(subscription_status::PENDING)
        .bind(onboarding)
        .execute(&mut *tx)
        .await
        .context("Failed to persist organization")?;

        tx.commit().await?;

        tracing::info!("Onboarding submitted: org {} ({})", org_id, name);
        Ok(org_id)
    }

    // ===== Organizations =====

    pub async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let organization =
            sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(organization)
    }

    pub async fn organization_tier(&self, id: Uuid) -> Result<Option<String>, AppError> {
        let tier = sqlx::query_scalar::<_, String>("SELECT tier FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tier)
    }

    pub async fn staff_count(&self, org_id: Uuid) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles WHERE org_id = $1")
                .bind(org_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Stores the billing customer reference created for an organization.
    pub async fn set_billing_customer(
        &self,
        org_id: Uuid,
        customer_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE organizations
            SET billing_customer_id = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(org_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrites tier/status/period-end for the organization owning the
    /// billing customer reference. Returns the touched organization's id,
    /// or `None` for an unknown customer (a no-op, not an error).
    pub async fn apply_subscription_update(
        &self,
        customer_id: &str,
        tier: Tier,
        status: &str,
        current_period_end: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError> {
        let org_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE organizations
            SET tier = $2,
                subscription_status = $3,
                current_period_end = $4,
                updated_at = now()
            WHERE billing_customer_id = $1
            RETURNING id
            "#,
        )
        .bind(customer_id)
        .bind(tier.as_str())
        .bind(status)
        .bind(current_period_end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(org_id)
    }

    // ===== Billing event receipts =====

    /// Records a webhook event receipt. Returns false when the event id was
    /// seen before, so redeliveries are acknowledged without reprocessing.
    pub async fn record_billing_event(
        &self,
        event_id: &str,
        event_type: &str,
        payload_raw: Value,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO billing_events (event_id, event_type, payload_raw, status, received_at)
            VALUES ($1, $2, $3, 'received', now())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(payload_raw)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Marks a recorded event receipt with its processing outcome.
    pub async fn mark_billing_event(
        &self,
        event_id: &str,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE billing_events
            SET status = $2, error_message = $3, processed_at = now()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!("No billing event receipt found for {}", event_id);
        }

        Ok(())
    }

    // ===== Profiles =====

    pub async fn find_profile_by_token(&self, token: &str) -> Result<Option<Profile>, AppError> {
        let profile =
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE auth_token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        Ok(profile)
    }

    pub async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    /// Attaches an invited profile to an organization.
    ///
    /// The row is expected to pre-exist, provisioned by the hosted-auth
    /// signup trigger; this only updates it. Returns the rows touched so
    /// the caller can surface the missing-trigger gap explicitly.
    pub async fn attach_invited_profile(
        &self,
        profile_id: Uuid,
        invite: &InviteRequest,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET org_id = $2,
                first_name = $3,
                last_name = $4,
                role = $5,
                department = $6,
                phone = $7,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(profile_id)
        .bind(invite.org_id)
        .bind(&invite.first_name)
        .bind(&invite.last_name)
        .bind(invite.role.as_str())
        .bind(&invite.department)
        .bind(&invite.phone)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ===== Dashboard aggregates =====

    pub async fn upcoming_appointments(
        &self,
        org_id: Uuid,
        employee_id: Option<Uuid>,
    ) -> Result<Vec<AppointmentSummary>, AppError> {
        let appointments = sqlx::query_as::<_, AppointmentSummary>(
            r#"
            SELECT client_name, service_name, starts_at, status
            FROM appointments
            WHERE org_id = $1
              AND starts_at > now()
              AND ($2::uuid IS NULL OR employee_id = $2)
            ORDER BY starts_at ASC
            LIMIT 10
            "#,
        )
        .bind(org_id)
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(appointments)
    }

    /// (completed, booked) appointment counts for the current month.
    pub async fn month_counts(
        &self,
        org_id: Uuid,
        employee_id: Option<Uuid>,
    ) -> Result<(i64, i64), AppError> {
        let completed = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM appointments
            WHERE org_id = $1
              AND starts_at >= date_trunc('month', now())
              AND status = 'completed'
              AND ($2::uuid IS NULL OR employee_id = $2)
            "#,
        )
        .bind(org_id)
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await?;

        let booked = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM appointments
            WHERE org_id = $1
              AND starts_at >= date_trunc('month', now())
              AND ($2::uuid IS NULL OR employee_id = $2)
            "#,
        )
        .bind(org_id)
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((completed, booked))
    }

    pub async fn department_stats(&self, org_id: Uuid) -> Result<Vec<DepartmentStat>, AppError> {
        let stats = sqlx::query_as::<_, DepartmentStat>(
            r#"
            SELECT p.department AS department,
                   COUNT(DISTINCT p.id) AS headcount,
                   COUNT(a.id) AS appointments
            FROM profiles p
            LEFT JOIN appointments a
              ON a.employee_id = p.id
             AND a.starts_at >= now() - interval '7 days'
            WHERE p.org_id = $1 AND p.department IS NOT NULL
            GROUP BY p.department
            ORDER BY p.department
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stats)
    }

    pub async fn weekday_series(&self, org_id: Uuid) -> Result<Vec<WeekdayCount>, AppError> {
        let series = sqlx::query_as::<_, WeekdayCount>(
            r#"
            SELECT EXTRACT(DOW FROM starts_at)::int4 AS weekday,
                   COUNT(*) AS appointments
            FROM appointments
            WHERE org_id = $1
              AND starts_at >= now() - interval '30 days'
            GROUP BY weekday
            ORDER BY weekday
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(series)
    }

    pub async fn store_scores(&self, org_id: Uuid) -> Result<Vec<StoreScore>, AppError> {
        let scores = sqlx::query_as::<_, StoreScore>(
            "SELECT store_name, efficiency_score, revenue FROM store_metrics WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(scores)
    }

    pub async fn org_totals(&self, org_id: Uuid) -> Result<OrgTotals, AppError> {
        let totals = sqlx::query_as::<_, OrgTotals>(
            r#"
            SELECT
                (SELECT SUM(price) FROM appointments
                  WHERE org_id = $1 AND status = 'completed') AS total_revenue,
                (SELECT COUNT(*) FROM appointments WHERE org_id = $1) AS appointment_count,
                (SELECT COUNT(*) FROM profiles WHERE org_id = $1) AS active_staff
            "#,
        )
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }
}
