use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::metrics;
use crate::store::{NewNotification, RequisitionStore};

/// Writes notification rows; delivery to clients is handled by the database's
/// change feed, filtered on recipient.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn RequisitionStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn RequisitionStore>) -> Self {
        Self { store }
    }

    /// Sends one notification to every admin user.
    ///
    /// Returns how many rows were written. Failures are logged and reported as zero.
    #[instrument(skip(self, message))]
    pub async fn notify_admins(&self, title: &str, message: &str) -> usize {
        match self.insert_for_admins(title, message).await {
            Ok(sent) => {
                info!(sent, "Admin notifications written");
                sent
            }
            Err(e) => {
                metrics::record_failure("notify_admins");
                warn!(error = %e, "Failed to notify admins");
                0
            }
        }
    }

    async fn insert_for_admins(&self, title: &str, message: &str) -> Result<usize, ServiceError> {
        let notifications: Vec<NewNotification> = self
            .store
            .admin_user_ids()
            .await?
            .into_iter()
            .map(|recipient_id| NewNotification {
                recipient_id,
                title: title.to_string(),
                message: message.to_string(),
            })
            .collect();

        self.store.insert_notifications(notifications).await
    }
}
