use crate::billing_client::BillingClient;
use crate::config::Config;
use crate::dashboard::{
    associate_view, department_head_view, executive_view, store_manager_view, DashboardView,
};
use crate::entitlements::{self, Feature, GateDecision};
use crate::errors::AppError;
use crate::models::{
    BookingNotificationRequest, CheckoutSessionRequest, InviteRequest, InviteResponse,
    NotificationResponse, OrganizationResponse, PortalSessionRequest, RedirectResponse, Role, Tier,
};
use crate::onboarding::WizardAction;
use crate::sms_client::{booking_message, normalize_recipient, ApprovalStatus, SmsClient};
use crate::snapshot_cache::{snapshot_key, DashboardSnapshot};
use crate::storage::OrgStorage;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Client for the billing provider (absent when not configured).
    pub billing_client: Option<BillingClient>,
    /// Client for the SMS gateway (absent when not configured).
    pub sms_client: Option<SmsClient>,
    /// Organization tier cache for the entitlement gate.
    /// Invalidated by the webhook sync when a subscription changes.
    pub tier_cache: Cache<Uuid, Tier>,
    /// Sealed dashboard snapshots per (organization, role).
    pub snapshot_cache: Cache<String, String>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "workforce-api",
            "version": "0.1.0"
        })),
    )
}

// ============ Onboarding wizard ============

#[derive(Debug, Serialize)]
pub struct DraftCreatedResponse {
    pub draft_id: Uuid,
    pub step: usize,
}

#[derive(Debug, Serialize)]
pub struct WizardStateResponse {
    pub draft_id: Uuid,
    pub step: usize,
    /// Whether the current step is complete enough to advance.
    pub step_valid: bool,
    pub submittable: bool,
    pub record: crate::models::OnboardingRecord,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub organization_id: Uuid,
    /// Where the client navigates after a confirmed submission.
    pub redirect: String,
}

/// POST /api/v1/onboarding
///
/// Starts a wizard draft with an empty record at step zero.
pub async fn create_onboarding_draft(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DraftCreatedResponse>, AppError> {
    let storage = OrgStorage::new(state.db.clone());
    let draft_id = storage.create_draft().await?;

    tracing::info!("Onboarding draft created: {}", draft_id);
    Ok(Json(DraftCreatedResponse { draft_id, step: 0 }))
}

/// POST /api/v1/onboarding/:id/actions
///
/// Applies one tagged wizard action (update/next/prev/toggles) to a draft
/// and returns the resulting state. Backward navigation always applies;
/// forward navigation is gated by the current step's validity.
pub async fn apply_wizard_action(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<Uuid>,
    Json(action): Json<WizardAction>,
) -> Result<Json<WizardStateResponse>, AppError> {
    let storage = OrgStorage::new(state.db.clone());
    let (mut wizard, submitted) = storage.load_draft(draft_id).await?;

    if submitted {
        return Err(AppError::BadRequest(
            "Onboarding was already submitted; the record is immutable".to_string(),
        ));
    }

    wizard.apply(action);

    if storage.save_draft(draft_id, &wizard).await? == 0 {
        // Lost a race with a concurrent submit
        return Err(AppError::BadRequest(
            "Onboarding was already submitted; the record is immutable".to_string(),
        ));
    }

    Ok(Json(WizardStateResponse {
        draft_id,
        step: wizard.step,
        step_valid: wizard.current_step_valid(),
        submittable: wizard.is_submittable(),
        record: wizard.record,
    }))
}

/// POST /api/v1/onboarding/:id/submit
///
/// One network write of the accumulated record. Failure leaves the draft
/// intact and resubmittable; success is exactly-once and returns the
/// dashboard redirect.
pub async fn submit_onboarding(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<Uuid>,
) -> Result<Json<SubmitResponse>, AppError> {
    let storage = OrgStorage::new(state.db.clone());
    let (wizard, submitted) = storage.load_draft(draft_id).await?;

    if submitted {
        return Err(AppError::BadRequest(
            "Onboarding was already submitted".to_string(),
        ));
    }

    let errors = crate::onboarding::validation_errors(&wizard.record);
    if !errors.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Onboarding record is incomplete: {}",
            errors.join("; ")
        )));
    }

    let organization_id = storage.submit_onboarding(draft_id, &wizard.record).await?;

    Ok(Json(SubmitResponse {
        success: true,
        organization_id,
        redirect: "/dashboard".to_string(),
    }))
}

// ============ Organizations & entitlements ============

/// GET /api/v1/orgs/:id
pub async fn get_organization(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<OrganizationResponse>, AppError> {
    let storage = OrgStorage::new(state.db.clone());
    let organization = storage
        .get_organization(org_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", org_id)))?;
    let staff_count = storage.staff_count(org_id).await?;

    Ok(Json(OrganizationResponse {
        organization,
        staff_count,
    }))
}

/// Resolves an organization's tier through the short-lived cache.
async fn resolve_tier(state: &Arc<AppState>, org_id: Uuid) -> Result<Tier, AppError> {
    if let Some(tier) = state.tier_cache.get(&org_id).await {
        return Ok(tier);
    }

    let storage = OrgStorage::new(state.db.clone());
    let tier = storage
        .organization_tier(org_id)
        .await?
        .map(|raw| Tier::from_db(&raw))
        .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", org_id)))?;

    state.tier_cache.insert(org_id, tier).await;
    Ok(tier)
}

/// GET /api/v1/orgs/:id/entitlements
pub async fn list_entitlements(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tier = resolve_tier(&state, org_id).await?;
    let features: Vec<&str> = entitlements::feature_set(tier)
        .iter()
        .map(|f| f.as_str())
        .collect();

    Ok(Json(json!({
        "organization_id": org_id,
        "tier": tier,
        "features": features,
    })))
}

#[derive(Debug, Deserialize)]
pub struct EntitlementCheckParams {
    pub org_id: Uuid,
    pub feature: String,
    /// Originally requested destination, echoed back on denial so
    /// navigation can resume after an upgrade.
    pub destination: Option<String>,
}

/// GET /api/v1/entitlements/check
///
/// Decides allow/deny for (organization tier, feature). Denials carry the
/// upgrade prompt; choosing a plan there flows into the checkout-session
/// endpoint.
pub async fn check_entitlement(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EntitlementCheckParams>,
) -> Result<Json<GateDecision>, AppError> {
    let feature = Feature::from_str(&params.feature).map_err(AppError::BadRequest)?;
    let tier = resolve_tier(&state, params.org_id).await?;

    let destination = params
        .destination
        .unwrap_or_else(|| format!("/features/{}", feature));

    let decision = entitlements::check(tier, feature, destination);
    if let GateDecision::Denied { .. } = &decision {
        tracing::info!(
            "Entitlement denied: org {} (tier {}) requested {}",
            params.org_id,
            tier,
            feature
        );
    }

    Ok(Json(decision))
}

// ============ Dashboards ============

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub role: String,
    /// Scopes the associate variant to one staff member's appointments.
    pub profile_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub organization_id: Uuid,
    pub role: Role,
    pub generated_at: DateTime<Utc>,
    pub view: serde_json::Value,
}

/// GET /api/v1/orgs/:id/dashboard?role=<role>
///
/// Builds the role's dashboard variant from aggregate reads, going through
/// the sealed snapshot cache.
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardResponse>, AppError> {
    let role = Role::from_str(&params.role).map_err(AppError::BadRequest)?;

    // Associate views are per-profile; only the shared variants are cached
    let cacheable = params.profile_id.is_none() && role != Role::Associate;
    let key = snapshot_key(org_id, role);

    if cacheable {
        if let Some(encoded) = state.snapshot_cache.get(&key).await {
            if let Some(snapshot) = DashboardSnapshot::decode_valid(&encoded) {
                if let Ok(view) = serde_json::from_str(&snapshot.payload) {
                    tracing::debug!("Dashboard snapshot HIT for {}", key);
                    return Ok(Json(DashboardResponse {
                        organization_id: org_id,
                        role,
                        generated_at: snapshot.generated_at,
                        view,
                    }));
                }
            } else {
                tracing::warn!("Dashboard snapshot for {} failed validation, refetching", key);
            }
        }
    }

    let storage = OrgStorage::new(state.db.clone());
    let organization = storage
        .get_organization(org_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", org_id)))?;

    let view = match role {
        Role::Associate => {
            let upcoming = storage
                .upcoming_appointments(org_id, params.profile_id)
                .await?;
            let (completed, booked) = storage.month_counts(org_id, params.profile_id).await?;
            DashboardView::Associate(associate_view(upcoming, completed, booked))
        }
        Role::DepartmentHead => {
            let departments = storage.department_stats(org_id).await?;
            let weekdays = storage.weekday_series(org_id).await?;
            DashboardView::DepartmentHead(department_head_view(departments, weekdays))
        }
        Role::StoreManager => {
            let scores = storage.store_scores(org_id).await?;
            DashboardView::StoreManager(store_manager_view(scores))
        }
        Role::Executive => {
            let totals = storage.org_totals(org_id).await?;
            DashboardView::Executive(executive_view(totals, &organization))
        }
    };

    tracing::debug!("Built {} dashboard for org {}", view.role(), org_id);

    let payload = serde_json::to_string(&view)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize view: {}", e)))?;
    let snapshot = DashboardSnapshot::seal(payload);

    if cacheable {
        state.snapshot_cache.insert(key, snapshot.encode()).await;
    }

    let view = serde_json::from_str(&snapshot.payload)
        .map_err(|e| AppError::InternalError(format!("Failed to reread view: {}", e)))?;

    Ok(Json(DashboardResponse {
        organization_id: org_id,
        role,
        generated_at: snapshot.generated_at,
        view,
    }))
}

// ============ Billing sessions ============

/// POST /api/v1/billing/checkout-session
///
/// Initiates a checkout for the chosen paid tier, creating the billing
/// customer reference on first use so later webhook events can be keyed
/// back to the organization.
pub async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckoutSessionRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let price_id = match request.tier {
        Tier::Free => {
            return Err(AppError::BadRequest(
                "The free tier does not require checkout".to_string(),
            ))
        }
        Tier::Solo => state.config.billing_price_solo.clone(),
        Tier::Business => state.config.billing_price_business.clone(),
    }
    .ok_or_else(|| {
        AppError::Configuration(format!(
            "No price configured for the {} tier",
            request.tier
        ))
    })?;

    let billing_client = state.billing_client.as_ref().ok_or_else(|| {
        AppError::Configuration("BILLING_SECRET_KEY not configured".to_string())
    })?;

    let storage = OrgStorage::new(state.db.clone());
    let organization = storage
        .get_organization(request.org_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", request.org_id)))?;

    let customer_id = match organization.billing_customer_id {
        Some(existing) => existing,
        None => {
            let created = billing_client
                .create_customer(&organization.name, organization.id)
                .await?;
            storage
                .set_billing_customer(organization.id, &created)
                .await?;
            created
        }
    };

    let success_url = format!("{}/dashboard?checkout=success", state.config.app_base_url);
    let cancel_url = format!("{}/upgrade?checkout=canceled", state.config.app_base_url);

    let url = billing_client
        .create_checkout_session(Some(&customer_id), &price_id, &success_url, &cancel_url)
        .await?;

    tracing::info!(
        "Checkout session created for org {} (tier {})",
        request.org_id,
        request.tier
    );
    Ok(Json(RedirectResponse { url }))
}

/// POST /api/v1/billing/portal-session
pub async fn create_portal_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PortalSessionRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let billing_client = state.billing_client.as_ref().ok_or_else(|| {
        AppError::Configuration("BILLING_SECRET_KEY not configured".to_string())
    })?;

    let storage = OrgStorage::new(state.db.clone());
    let organization = storage
        .get_organization(request.org_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", request.org_id)))?;

    let customer_id = organization.billing_customer_id.ok_or_else(|| {
        AppError::BadRequest("Organization has no billing customer yet".to_string())
    })?;

    let return_url = format!("{}/dashboard", state.config.app_base_url);
    let url = billing_client
        .create_portal_session(&customer_id, &return_url)
        .await?;

    Ok(Json(RedirectResponse { url }))
}

// ============ Invitations ============

/// Business-level invite failure. Deliberately not an `AppError`: the
/// endpoint answers 200 with the failure in the body, matching the calling
/// convention the frontend was built against.
#[derive(Debug)]
enum InviteSoftFailure {
    /// The signup trigger has not provisioned a profile row for this email
    /// yet. Known consistency gap; surfaced, not repaired.
    ProfileNotProvisioned,
    /// The profile already belongs to a different organization.
    AlreadyInOrganization,
    /// The update raced with something that removed the row.
    UpdateLost,
}

impl InviteSoftFailure {
    fn message(&self) -> &'static str {
        match self {
            InviteSoftFailure::ProfileNotProvisioned => {
                "No profile exists for this email yet; ask the invitee to complete signup first"
            }
            InviteSoftFailure::AlreadyInOrganization => {
                "This user already belongs to another organization"
            }
            InviteSoftFailure::UpdateLost => "Profile could not be updated; please retry",
        }
    }
}

/// POST /api/v1/orgs/invite
///
/// Attaches an invited staff member's profile to the inviter's
/// organization. Auth failures are real HTTP errors; business failures are
/// embedded in a 200 response (see `InviteSoftFailure`).
pub async fn invite_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<InviteRequest>,
) -> Result<Json<InviteResponse>, AppError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing bearer credential".to_string()))?;

    let storage = OrgStorage::new(state.db.clone());

    let inviter = storage
        .find_profile_by_token(token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown inviter".to_string()))?;

    if inviter.org_id != Some(request.org_id) {
        return Err(AppError::Unauthorized(
            "Inviter does not belong to this organization".to_string(),
        ));
    }

    match run_invite(&storage, &request).await? {
        Ok(profile_id) => {
            tracing::info!(
                "Invited {} into org {} as {}",
                request.email,
                request.org_id,
                request.role
            );
            Ok(Json(InviteResponse {
                success: true,
                message: format!("{} added to the organization", request.email),
                profile_id: Some(profile_id),
                error: None,
            }))
        }
        Err(failure) => {
            tracing::warn!("Invite for {} failed softly: {:?}", request.email, failure);
            Ok(Json(InviteResponse {
                success: false,
                message: "Invite could not be completed".to_string(),
                profile_id: None,
                error: Some(failure.message().to_string()),
            }))
        }
    }
}

/// The invite's business logic, separated from transport concerns.
async fn run_invite(
    storage: &OrgStorage,
    request: &InviteRequest,
) -> Result<Result<Uuid, InviteSoftFailure>, AppError> {
    // The profile row is provisioned by the hosted-auth signup trigger; if
    // it has not fired yet the invite cannot attach anything.
    let Some(profile) = storage.find_profile_by_email(&request.email).await? else {
        return Ok(Err(InviteSoftFailure::ProfileNotProvisioned));
    };

    if let Some(existing_org) = profile.org_id {
        if existing_org != request.org_id {
            return Ok(Err(InviteSoftFailure::AlreadyInOrganization));
        }
    }

    let rows = storage.attach_invited_profile(profile.id, request).await?;
    if rows == 0 {
        return Ok(Err(InviteSoftFailure::UpdateLost));
    }

    Ok(Ok(profile.id))
}

// ============ Notifications ============

/// POST /api/v1/notifications/booking
///
/// Formats one of the two booking templates and forwards it to the SMS
/// gateway. Missing credentials are a soft failure: the booking decision
/// already committed, so the caller still gets a 200 with `skipped: true`.
pub async fn send_booking_notification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookingNotificationRequest>,
) -> Result<Json<NotificationResponse>, AppError> {
    let status = ApprovalStatus::from_str(&request.status).map_err(AppError::BadRequest)?;

    for (field, value) in [
        ("client_name", &request.client_name),
        ("employee_name", &request.employee_name),
        ("date_time", &request.date_time),
        ("service_name", &request.service_name),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!("{} is required", field)));
        }
    }

    let recipient = normalize_recipient(&request.phone).ok_or_else(|| {
        AppError::BadRequest(format!("Invalid phone number: {}", request.phone))
    })?;

    let message = booking_message(
        status,
        &request.client_name,
        &request.employee_name,
        &request.date_time,
        &request.service_name,
    );

    let Some(sms_client) = state.sms_client.as_ref() else {
        tracing::warn!(
            "SMS credentials missing; skipping {} notification to {}",
            request.status,
            recipient
        );
        return Ok(Json(NotificationResponse {
            success: true,
            skipped: true,
            message: "Notification skipped: SMS provider not configured".to_string(),
        }));
    };

    sms_client.send_sms(&recipient, &message).await?;

    Ok(Json(NotificationResponse {
        success: true,
        skipped: false,
        message: format!("Notification sent to {}", recipient),
    }))
}
