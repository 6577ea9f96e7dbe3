use crate::database::Database;
use crate::errors::{DispatchEngineError, Result};
use crate::metrics;
use crate::models::{
    AssignRiderRequest, CashOutRequest, CashOutResponse, CreateParcelRequest, CreateRiderRequest,
    DeliveryEvent, DeliveryEventType, DeliverySummary, EarningsSummaryResponse,
    RecordPaymentRequest,
};
use crate::nats::NatsProducer;
use chrono::Utc;
use parcel_core::{
    earning_for, ensure_assignable, plan_advance, AdvanceAction, DeliveryStatus, Earning, Parcel,
    Rider, RiderWorkStatus,
};
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct DispatchService {
    db: Arc<Database>,
    nats: Arc<NatsProducer>,
    redis: ConnectionManager,
    summary_ttl_seconds: u64,
}

impl DispatchService {
    pub async fn new(
        db: Arc<Database>,
        nats: Arc<NatsProducer>,
        redis: ConnectionManager,
        summary_ttl_seconds: u64,
    ) -> Self {
        DispatchService {
            db,
            nats,
            redis,
            summary_ttl_seconds,
        }
    }

    /// Create a parcel in `not_collected` with a fresh tracking code
    pub async fn create_parcel(
        &self,
        request: CreateParcelRequest,
        created_by: &str,
    ) -> Result<Parcel> {
        // Validate request
        validator::Validate::validate(&request)
            .map_err(|e| DispatchEngineError::Validation(e.to_string()))?;

        if request.cost <= Decimal::ZERO {
            return Err(DispatchEngineError::Validation(
                "parcel cost must be positive".to_string(),
            ));
        }

        let tracking_code = generate_tracking_code();

        let parcel = self
            .db
            .create_parcel(
                &tracking_code,
                &request.title,
                &request.sender_region,
                &request.receiver_region,
                request.cost,
                created_by,
            )
            .await?;

        self.publish_event(DeliveryEvent {
            event_type: DeliveryEventType::ParcelCreated,
            parcel_id: Some(parcel.id),
            tracking_code: Some(parcel.tracking_code.clone()),
            rider_email: None,
            amount: None,
            timestamp: Utc::now(),
            metadata: Some(serde_json::json!({
                "sender_region": parcel.sender_region,
                "receiver_region": parcel.receiver_region,
            })),
        })
        .await;

        metrics::PARCELS_CREATED.inc();

        info!(
            "Created parcel {} ({}) from {} to {} for {}",
            parcel.id, parcel.tracking_code, parcel.sender_region, parcel.receiver_region,
            created_by
        );

        Ok(parcel)
    }

    /// Get parcel by ID
    pub async fn get_parcel(&self, parcel_id: Uuid) -> Result<Parcel> {
        self.db
            .get_parcel(parcel_id)
            .await?
            .ok_or(DispatchEngineError::ParcelNotFound(parcel_id))
    }

    /// Register a rider profile
    pub async fn register_rider(&self, request: CreateRiderRequest) -> Result<Rider> {
        // Validate request
        validator::Validate::validate(&request)
            .map_err(|e| DispatchEngineError::Validation(e.to_string()))?;

        let rider = self
            .db
            .create_rider(
                &request.name,
                &request.email,
                &request.region,
                &request.district,
            )
            .await?;

        info!("Registered rider {} ({})", rider.email, rider.id);

        Ok(rider)
    }

    /// Look up a rider profile by identity email
    pub async fn get_rider(&self, email: &str) -> Result<Rider> {
        self.db
            .get_rider_by_email(email)
            .await?
            .ok_or_else(|| DispatchEngineError::RiderNotFound(email.to_string()))
    }

    /// Assign a rider to an unassigned parcel.
    ///
    /// Two writes: the parcel update (authoritative) and the rider
    /// availability flip. If the second write hits a database error the
    /// assignment stands and the caller sees `AssignmentIncomplete`.
    pub async fn assign_rider(
        &self,
        parcel_id: Uuid,
        request: AssignRiderRequest,
    ) -> Result<Parcel> {
        // Validate request
        validator::Validate::validate(&request)
            .map_err(|e| DispatchEngineError::Validation(e.to_string()))?;

        let parcel = self.get_parcel(parcel_id).await?;
        ensure_assignable(&parcel)?;

        let now = Utc::now();
        let updated = match self
            .db
            .assign_rider(parcel_id, &request.rider_name, &request.rider_email, now)
            .await?
        {
            Some(parcel) => parcel,
            None => {
                // Guard missed: another writer moved the parcel first
                let current = self.get_parcel(parcel_id).await?;
                ensure_assignable(&current)?;
                return Err(DispatchEngineError::Conflict(
                    "parcel was assigned concurrently".to_string(),
                ));
            }
        };

        match self
            .db
            .set_rider_work_status(&request.rider_email, RiderWorkStatus::InDelivery)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "No rider profile for {}; parcel {} assigned without availability update",
                    request.rider_email, parcel_id
                );
            }
            Err(e) => {
                error!(
                    "Rider availability update failed after assigning parcel {}: {}",
                    parcel_id, e
                );
                return Err(DispatchEngineError::AssignmentIncomplete(format!(
                    "parcel {} assigned to {} but rider availability was not updated",
                    parcel_id, request.rider_email
                )));
            }
        }

        self.publish_event(DeliveryEvent {
            event_type: DeliveryEventType::RiderAssigned,
            parcel_id: Some(updated.id),
            tracking_code: Some(updated.tracking_code.clone()),
            rider_email: Some(request.rider_email.clone()),
            amount: None,
            timestamp: now,
            metadata: None,
        })
        .await;

        metrics::RIDER_ASSIGNMENTS.inc();

        info!(
            "Assigned rider {} to parcel {} ({})",
            request.rider_email, updated.id, updated.tracking_code
        );

        Ok(updated)
    }

    /// Advance the delivery status as the assigned rider.
    ///
    /// Repeating `delivered` on a delivered parcel is a success no-op. The
    /// update is guarded on the observed status; a missed guard gets one
    /// re-check before reporting a conflict.
    pub async fn advance_delivery_status(
        &self,
        parcel_id: Uuid,
        target: DeliveryStatus,
        actor_email: &str,
    ) -> Result<Parcel> {
        let parcel = self.get_parcel(parcel_id).await?;

        let (to, completes_delivery) = match plan_advance(&parcel, target, actor_email)? {
            AdvanceAction::AlreadyDelivered => {
                info!(
                    "Parcel {} already delivered; advance by {} is a no-op",
                    parcel_id, actor_email
                );
                return Ok(parcel);
            }
            AdvanceAction::Transition {
                to,
                completes_delivery,
            } => (to, completes_delivery),
        };

        let now = Utc::now();
        let updated = match self
            .db
            .advance_delivery_status(parcel_id, actor_email, parcel.delivery_status, to, now)
            .await?
        {
            Some(parcel) => parcel,
            None => {
                // Guard missed: re-plan against the current row once
                let current = self.get_parcel(parcel_id).await?;
                return match plan_advance(&current, target, actor_email)? {
                    AdvanceAction::AlreadyDelivered => Ok(current),
                    AdvanceAction::Transition { .. } => Err(DispatchEngineError::Conflict(
                        "parcel status changed concurrently".to_string(),
                    )),
                };
            }
        };

        if completes_delivery {
            self.record_delivery_earning(&updated).await;
            self.restore_rider_availability(actor_email).await;

            metrics::PARCELS_DELIVERED.inc();

            self.publish_event(DeliveryEvent {
                event_type: DeliveryEventType::Delivered,
                parcel_id: Some(updated.id),
                tracking_code: Some(updated.tracking_code.clone()),
                rider_email: Some(actor_email.to_string()),
                amount: None,
                timestamp: now,
                metadata: None,
            })
            .await;
        } else {
            self.publish_event(DeliveryEvent {
                event_type: DeliveryEventType::StatusAdvanced,
                parcel_id: Some(updated.id),
                tracking_code: Some(updated.tracking_code.clone()),
                rider_email: Some(actor_email.to_string()),
                amount: None,
                timestamp: now,
                metadata: Some(serde_json::json!({ "status": to.as_str() })),
            })
            .await;
        }

        self.invalidate_summary_cache(actor_email).await;

        info!(
            "Parcel {} advanced to {} by {}",
            updated.id,
            updated.delivery_status.as_str(),
            actor_email
        );

        Ok(updated)
    }

    /// Record the payment gateway result for a parcel
    pub async fn record_payment(
        &self,
        parcel_id: Uuid,
        request: RecordPaymentRequest,
    ) -> Result<Parcel> {
        // Validate request
        validator::Validate::validate(&request)
            .map_err(|e| DispatchEngineError::Validation(e.to_string()))?;

        let parcel = self.get_parcel(parcel_id).await?;

        let now = Utc::now();
        let updated = match self
            .db
            .record_payment(parcel_id, &request.transaction_id, now)
            .await?
        {
            Some(parcel) => parcel,
            None => {
                return Err(DispatchEngineError::Duplicate(format!(
                    "payment already recorded for parcel {}",
                    parcel.id
                )));
            }
        };

        self.publish_event(DeliveryEvent {
            event_type: DeliveryEventType::PaymentRecorded,
            parcel_id: Some(updated.id),
            tracking_code: Some(updated.tracking_code.clone()),
            rider_email: None,
            amount: None,
            timestamp: now,
            metadata: Some(serde_json::json!({
                "transaction_id": request.transaction_id,
            })),
        })
        .await;

        info!(
            "Recorded payment {} for parcel {}",
            request.transaction_id, updated.id
        );

        Ok(updated)
    }

    /// Rider earnings summary: ledger entries joined to their delivered
    /// parcels, newest delivery first
    pub async fn rider_earnings_summary(
        &self,
        rider_email: &str,
    ) -> Result<EarningsSummaryResponse> {
        // Try cache first
        let cache_key = format!("earnings:summary:{}", rider_email);
        if let Ok(cached) = self.redis.clone().get::<String, String>(cache_key.clone()).await {
            if let Ok(summary) = serde_json::from_str::<EarningsSummaryResponse>(&cached) {
                metrics::CACHE_HITS.inc();
                return Ok(summary);
            }
        }
        metrics::CACHE_MISSES.inc();

        let parcels = self.db.delivered_parcels_for_rider(rider_email).await?;
        let earnings = self.db.earnings_for_rider(rider_email).await?;

        let (deliveries, total) = summarize_deliveries(&parcels, &earnings);
        let summary = EarningsSummaryResponse {
            rider_email: rider_email.to_string(),
            total,
            deliveries,
        };

        // Cache the result
        let cached = serde_json::to_string(&summary)
            .map_err(|e| DispatchEngineError::Internal(e.to_string()))?;
        let _: () = self
            .redis
            .clone()
            .set_ex(cache_key, cached, self.summary_ttl_seconds)
            .await
            .map_err(DispatchEngineError::Redis)?;

        Ok(summary)
    }

    /// Cash out part of a rider's unpaid balance.
    ///
    /// Whole earnings settle oldest-first until the request is covered; the
    /// response reports `paid = requested` and
    /// `remaining = unpaid before − requested`.
    pub async fn cash_out(
        &self,
        rider_email: &str,
        request: CashOutRequest,
    ) -> Result<CashOutResponse> {
        let now = Utc::now();
        let plan = self
            .db
            .settle_cashout(rider_email, request.amount, now)
            .await?;

        metrics::CASHOUTS_SETTLED.inc();
        metrics::CASHOUT_AMOUNT.observe(plan.requested as f64);

        self.publish_event(DeliveryEvent {
            event_type: DeliveryEventType::CashedOut,
            parcel_id: None,
            tracking_code: None,
            rider_email: Some(rider_email.to_string()),
            amount: Some(plan.requested),
            timestamp: now,
            metadata: Some(serde_json::json!({
                "settled_earnings": plan.selected.len(),
                "settled_total": plan.selected_total,
            })),
        })
        .await;

        self.invalidate_summary_cache(rider_email).await;

        info!(
            "Cashed out {} for {} ({} earnings settled, {} remaining unpaid)",
            plan.paid_amount(),
            rider_email,
            plan.selected.len(),
            plan.remaining_unpaid()
        );

        Ok(CashOutResponse {
            paid_amount: plan.paid_amount(),
            remaining_unpaid: plan.remaining_unpaid(),
        })
    }

    /// Helper: write the ledger entry for a delivered parcel.
    ///
    /// The delivery already stands, so failures here are logged instead of
    /// propagated; the reconciliation sweep reports any gap this leaves.
    async fn record_delivery_earning(&self, parcel: &Parcel) {
        let earning = match earning_for(parcel, Utc::now()) {
            Ok(earning) => earning,
            Err(e) => {
                error!(
                    "Could not compute earning for delivered parcel {}: {}",
                    parcel.id, e
                );
                return;
            }
        };

        match self.db.insert_earning(&earning).await {
            Ok(true) => {
                metrics::EARNINGS_RECORDED.inc();
                metrics::EARNING_AMOUNT.observe(earning.amount as f64);

                self.publish_event(DeliveryEvent {
                    event_type: DeliveryEventType::EarningRecorded,
                    parcel_id: Some(parcel.id),
                    tracking_code: Some(parcel.tracking_code.clone()),
                    rider_email: Some(earning.rider_email.clone()),
                    amount: Some(earning.amount),
                    timestamp: earning.created_at,
                    metadata: Some(serde_json::json!({ "rule": earning.rule.as_str() })),
                })
                .await;

                info!(
                    "Recorded earning {} ({}) for parcel {}",
                    earning.amount,
                    earning.rule.as_str(),
                    parcel.id
                );
            }
            Ok(false) => {
                info!(
                    "Ledger already holds an earning for parcel {}; skipped",
                    parcel.id
                );
            }
            Err(e) => {
                error!(
                    "Earning write failed for delivered parcel {}: {}",
                    parcel.id, e
                );
            }
        }
    }

    /// Helper: flip the rider back to available after a delivery, best effort
    async fn restore_rider_availability(&self, rider_email: &str) {
        match self
            .db
            .set_rider_work_status(rider_email, RiderWorkStatus::Available)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!("No rider profile for {}; availability not restored", rider_email);
            }
            Err(e) => {
                error!("Failed to restore availability for {}: {}", rider_email, e);
            }
        }
    }

    /// Helper: drop a rider's cached earnings summary
    async fn invalidate_summary_cache(&self, rider_email: &str) {
        let cache_key = format!("earnings:summary:{}", rider_email);
        if let Err(e) = self.redis.clone().del::<String, ()>(cache_key).await {
            warn!("Cache invalidation failed for {}: {}", rider_email, e);
        }
    }

    /// Helper: publish to NATS, logging instead of failing the request
    async fn publish_event(&self, event: DeliveryEvent) {
        let status = match self.nats.publish_delivery_event(&event).await {
            Ok(()) => "ok",
            Err(e) => {
                error!("Failed to publish {:?} event: {}", event.event_type, e);
                "error"
            }
        };
        metrics::NATS_MESSAGES_PUBLISHED
            .with_label_values(&["delivery.events", status])
            .inc();
    }
}

/// Join delivered parcels to their ledger entries.
///
/// Returns one summary line per parcel that has an earning, in the parcel
/// order given, plus the ledger total across all entries (paid and unpaid).
pub fn summarize_deliveries(
    parcels: &[Parcel],
    earnings: &[Earning],
) -> (Vec<DeliverySummary>, i64) {
    let by_parcel: HashMap<Uuid, &Earning> =
        earnings.iter().map(|e| (e.parcel_id, e)).collect();

    let deliveries = parcels
        .iter()
        .filter_map(|parcel| {
            by_parcel.get(&parcel.id).map(|earning| DeliverySummary {
                parcel_id: parcel.id,
                tracking_code: parcel.tracking_code.clone(),
                title: parcel.title.clone(),
                delivered_at: parcel.delivered_at,
                amount: earning.amount,
                rule: earning.rule,
            })
        })
        .collect();

    let total = earnings.iter().map(|e| e.amount).sum();

    (deliveries, total)
}

/// Random tracking code, e.g. `PR-7KQX2M9TLA`
pub fn generate_tracking_code() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..10)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("PR-{}", suffix)
}
