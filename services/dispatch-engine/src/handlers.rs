use crate::errors::DispatchEngineError;
use crate::metrics;
use crate::models::{
    AdvanceStatusRequest, AssignRiderRequest, CashOutRequest, CreateParcelRequest,
    CreateRiderRequest, RecordPaymentRequest,
};
use crate::reconciliation::Reconciler;
use crate::security_middleware::Claims;
use crate::services::DispatchService;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use parcel_core::DeliveryStatus;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "dispatch-engine",
        "version": "1.0.0"
    }))
}

/// Actor identity placed in extensions by the auth middleware
fn actor(req: &HttpRequest) -> Result<Claims, DispatchEngineError> {
    req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or(DispatchEngineError::Unauthorized)
}

/// Create parcel endpoint
pub async fn create_parcel(
    service: web::Data<Arc<DispatchService>>,
    req: HttpRequest,
    request: web::Json<CreateParcelRequest>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    let parcel = service
        .create_parcel(request.into_inner(), &claims.sub)
        .await?;
    Ok(HttpResponse::Created().json(parcel))
}

/// Get parcel endpoint
pub async fn get_parcel(
    service: web::Data<Arc<DispatchService>>,
    parcel_id: web::Path<Uuid>,
) -> Result<HttpResponse, DispatchEngineError> {
    let parcel = service.get_parcel(*parcel_id).await?;
    Ok(HttpResponse::Ok().json(parcel))
}

/// Assign rider endpoint (admin only)
pub async fn assign_rider(
    service: web::Data<Arc<DispatchService>>,
    req: HttpRequest,
    parcel_id: web::Path<Uuid>,
    request: web::Json<AssignRiderRequest>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    if !claims.is_admin() {
        return Err(DispatchEngineError::Forbidden(
            "only admins assign riders".to_string(),
        ));
    }

    let parcel = service
        .assign_rider(*parcel_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(parcel))
}

/// Advance delivery status endpoint (assigned rider only)
pub async fn advance_status(
    service: web::Data<Arc<DispatchService>>,
    req: HttpRequest,
    parcel_id: web::Path<Uuid>,
    request: web::Json<AdvanceStatusRequest>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    let target = DeliveryStatus::from_str(&request.status).ok_or_else(|| {
        DispatchEngineError::Validation(format!(
            "unknown delivery status '{}'",
            request.status
        ))
    })?;

    let parcel = service
        .advance_delivery_status(*parcel_id, target, &claims.sub)
        .await?;
    Ok(HttpResponse::Ok().json(parcel))
}

/// Record payment endpoint (merchant or admin)
pub async fn record_payment(
    service: web::Data<Arc<DispatchService>>,
    req: HttpRequest,
    parcel_id: web::Path<Uuid>,
    request: web::Json<RecordPaymentRequest>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    if claims.role != "merchant" && !claims.is_admin() {
        return Err(DispatchEngineError::Forbidden(
            "only merchants record payments".to_string(),
        ));
    }

    let parcel = service
        .record_payment(*parcel_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(parcel))
}

/// Register rider endpoint; riders register themselves, admins anyone
pub async fn register_rider(
    service: web::Data<Arc<DispatchService>>,
    req: HttpRequest,
    request: web::Json<CreateRiderRequest>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    if !claims.is_admin() && request.email != claims.sub {
        return Err(DispatchEngineError::Forbidden(
            "riders can only register their own profile".to_string(),
        ));
    }

    let rider = service.register_rider(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(rider))
}

/// Fetch a rider profile; riders see their own, admins anyone's
pub async fn get_rider(
    service: web::Data<Arc<DispatchService>>,
    req: HttpRequest,
    email: web::Path<String>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    let email = email.into_inner();
    if !claims.is_admin() && email != claims.sub {
        return Err(DispatchEngineError::Forbidden(
            "riders can only view their own profile".to_string(),
        ));
    }

    let rider = service.get_rider(&email).await?;
    Ok(HttpResponse::Ok().json(rider))
}

#[derive(serde::Deserialize)]
pub struct EarningsQuery {
    rider: Option<String>,
}

/// Rider earnings summary endpoint; admins may query any rider
pub async fn rider_earnings(
    service: web::Data<Arc<DispatchService>>,
    req: HttpRequest,
    query: web::Query<EarningsQuery>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    let rider_email = match query.into_inner().rider {
        Some(rider) if claims.is_admin() => rider,
        Some(_) => {
            return Err(DispatchEngineError::Forbidden(
                "riders can only view their own earnings".to_string(),
            ))
        }
        None => claims.sub,
    };

    let summary = service.rider_earnings_summary(&rider_email).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Cash-out endpoint; always settles against the caller's own ledger
pub async fn cash_out(
    service: web::Data<Arc<DispatchService>>,
    req: HttpRequest,
    request: web::Json<CashOutRequest>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    let response = service.cash_out(&claims.sub, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[derive(serde::Deserialize)]
pub struct DiscrepancyQuery {
    limit: Option<i64>,
}

/// List ledger discrepancies endpoint (admin only)
pub async fn list_discrepancies(
    reconciler: web::Data<Arc<Reconciler>>,
    req: HttpRequest,
    query: web::Query<DiscrepancyQuery>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    if !claims.is_admin() {
        return Err(DispatchEngineError::Forbidden(
            "only admins run reconciliation".to_string(),
        ));
    }

    let limit = query.into_inner().limit.unwrap_or(100).clamp(1, 500);
    let discrepancies = reconciler.find_missing_earnings(limit).await?;

    Ok(HttpResponse::Ok().json(json!({
        "count": discrepancies.len(),
        "discrepancies": discrepancies
    })))
}

/// Audit one parcel's ledger entry (admin only)
pub async fn audit_parcel(
    reconciler: web::Data<Arc<Reconciler>>,
    req: HttpRequest,
    parcel_id: web::Path<Uuid>,
) -> Result<HttpResponse, DispatchEngineError> {
    let claims = actor(&req)?;
    if !claims.is_admin() {
        return Err(DispatchEngineError::Forbidden(
            "only admins run reconciliation".to_string(),
        ));
    }

    let discrepancy = reconciler.audit_parcel(*parcel_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "parcel_id": *parcel_id,
        "clean": discrepancy.is_none(),
        "discrepancy": discrepancy
    })))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/parcels", web::post().to(create_parcel))
            .route("/parcels/{parcel_id}", web::get().to(get_parcel))
            .route("/parcels/{parcel_id}/assign", web::post().to(assign_rider))
            .route("/parcels/{parcel_id}/status", web::patch().to(advance_status))
            .route("/parcels/{parcel_id}/payment", web::post().to(record_payment))
            .route("/riders", web::post().to(register_rider))
            .route("/riders/{email}", web::get().to(get_rider))
            .route("/earnings", web::get().to(rider_earnings))
            .route("/earnings/cashout", web::post().to(cash_out))
            .route(
                "/reconciliation/discrepancies",
                web::get().to(list_discrepancies),
            )
            .route(
                "/reconciliation/parcels/{parcel_id}",
                web::get().to(audit_parcel),
            ),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
