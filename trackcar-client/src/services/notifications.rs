//! The vehicle owner's sighting inbox.

use super::ServiceContext;
use super::collections::{NOTIFICATIONS, SIGHTINGS, STOLEN_CARS};
use super::stolen::{decode_reporter, decode_sighting, decode_stolen};
use crate::error::{ServiceError, ServiceResult, StoreResultExt};
use crate::guard::SubscriptionHandle;
use chrono::Utc;
use futures::future::try_join_all;
use tracing::debug;
use trackcar_store::{Direction, Document, Fields, Query, ReadFields};
use trackcar_types::{ANONYMOUS_REPORTER, NotificationDetails, Reporter, SightingNotification};

#[derive(Clone)]
pub struct NotificationService {
    ctx: ServiceContext,
}

impl NotificationService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Live inbox of the signed-in owner, most recent first.
    pub fn watch_inbox<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(Vec<SightingNotification>) + Send + Sync + 'static,
    {
        self.ctx.live.watch(
            "notification_inbox",
            Vec::new(),
            |principal| inbox_query(&principal.uid).into(),
            |snapshot| snapshot.iter().map(decode_notification).collect(),
            callback,
        )
    }

    pub async fn list(&self) -> ServiceResult<Vec<SightingNotification>> {
        let principal = self.ctx.identity.require()?;
        let snapshot = self
            .ctx
            .store
            .query(&inbox_query(&principal.uid))
            .await
            .or_upstream("failed to load notifications")?;
        Ok(snapshot.iter().map(decode_notification).collect())
    }

    pub async fn unread_count(&self) -> ServiceResult<usize> {
        let principal = self.ctx.identity.require()?;
        let query = Query::collection(NOTIFICATIONS)
            .where_eq("vehicleOwnerId", principal.uid.as_str())
            .where_eq("isRead", false);
        let snapshot = self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to count notifications")?;
        Ok(snapshot.len())
    }

    pub async fn mark_read(&self, notification_id: &str) -> ServiceResult<()> {
        let notification = self.get(notification_id).await?;
        if notification.is_read {
            return Ok(());
        }
        self.write_read(notification_id).await
    }

    /// Marks every unread notification read. Returns how many changed.
    pub async fn mark_all_read(&self) -> ServiceResult<usize> {
        let principal = self.ctx.identity.require()?;
        let query = Query::collection(NOTIFICATIONS)
            .where_eq("vehicleOwnerId", principal.uid.as_str())
            .where_eq("isRead", false);
        let unread = self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to load notifications")?;

        try_join_all(unread.iter().map(|doc| self.write_read(&doc.id))).await?;
        debug!(count = unread.len(), "notifications marked read");
        Ok(unread.len())
    }

    async fn write_read(&self, notification_id: &str) -> ServiceResult<()> {
        self.ctx
            .store
            .update(
                NOTIFICATIONS,
                notification_id,
                Fields::new().set("isRead", true).server_timestamp("readAt"),
            )
            .await
            .or_upstream("failed to mark notification as read")
    }

    async fn get(&self, notification_id: &str) -> ServiceResult<SightingNotification> {
        let principal = self.ctx.identity.require()?;
        self.ctx
            .store
            .get(NOTIFICATIONS, notification_id)
            .await
            .or_upstream("failed to load notification")?
            .filter(|doc| doc.str_field("vehicleOwnerId") == Some(principal.uid.as_str()))
            .map(|doc| decode_notification(&doc))
            .ok_or_else(|| ServiceError::not_found("notification"))
    }

    /// A notification with its sighting and stolen record. Either may be
    /// missing if it was never written or has since gone away.
    pub async fn details(&self, notification_id: &str) -> ServiceResult<NotificationDetails> {
        let notification = self.get(notification_id).await?;
        let (sighting, stolen) = futures::try_join!(
            async {
                self.ctx
                    .store
                    .get(SIGHTINGS, &notification.sighting_id)
                    .await
                    .or_upstream("failed to load sighting")
            },
            async {
                self.ctx
                    .store
                    .get(STOLEN_CARS, &notification.stolen_vehicle_id)
                    .await
                    .or_upstream("failed to load stolen vehicle")
            },
        )?;
        Ok(NotificationDetails {
            sighting: sighting.as_ref().and_then(decode_sighting),
            stolen_vehicle: stolen.as_ref().map(decode_stolen),
            notification,
        })
    }
}

fn inbox_query(owner: &str) -> Query {
    Query::collection(NOTIFICATIONS)
        .where_eq("vehicleOwnerId", owner)
        .order_by("createdAt", Direction::Descending)
}

fn decode_notification(doc: &Document) -> SightingNotification {
    SightingNotification {
        id: doc.id.clone(),
        vehicle_owner_id: doc.string_field("vehicleOwnerId"),
        stolen_vehicle_id: doc.string_field("stolenVehicleId"),
        sighting_id: doc.string_field("sightingId"),
        reported_by: doc
            .map_field("reportedBy")
            .map(decode_reporter)
            .unwrap_or_else(|| Reporter {
                user_id: String::new(),
                name: ANONYMOUS_REPORTER.to_string(),
                photo_url: None,
            }),
        message: doc.string_field("message"),
        is_read: doc.bool_field("isRead").unwrap_or(false),
        created_at: doc.datetime_field("createdAt").unwrap_or_else(Utc::now),
        read_at: doc.datetime_field("readAt"),
    }
}
