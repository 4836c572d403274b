//! Failure reporting for errors swallowed at the worker and dispatcher
//! boundaries.

use std::sync::Arc;

use tally_core::{Notification, TallyError};
use tally_state::Notifier;
use tracing::error;

use crate::messages;

/// Logs failures and forwards them to the operator channel, if configured.
#[derive(Clone)]
pub struct OperatorReporter {
    notifier: Arc<dyn Notifier>,
    transport_id: Option<String>,
}

impl OperatorReporter {
    pub fn new(notifier: Arc<dyn Notifier>, transport_id: Option<String>) -> Self {
        Self {
            notifier,
            transport_id,
        }
    }

    /// Report a failure that will not reach any caller.
    pub async fn report(&self, context: &str, err: &TallyError) {
        error!(error = %err, transient = err.is_transient(), "{context}");

        if let Some(ref transport_id) = self.transport_id {
            self.notifier
                .send(Notification::new(
                    transport_id.clone(),
                    messages::operator_failure(context, &err.to_string()),
                ))
                .await;
        }
    }
}
