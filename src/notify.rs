//! Balance change notifications.
//!
//! Delivering email is an external capability consumed through the
//! [`Notifier`] trait. [`ChangeNotifier`] decides when a recomputed balance
//! moved enough to tell the employee about it.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::ledger::LedgerReader;
use crate::models::BalanceRecord;

/// Sends email on behalf of the engine.
pub trait Notifier: Send + Sync {
    /// Sends one message.
    fn send_email(&self, to: &str, subject: &str, body: &str) -> EngineResult<()>;
}

/// A [`Notifier`] that writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_email(&self, to: &str, subject: &str, body: &str) -> EngineResult<()> {
        info!(to, subject, body, "Balance notification");
        Ok(())
    }
}

/// Notifies employees when their available balance changes materially.
#[derive(Clone)]
pub struct ChangeNotifier {
    notifier: Arc<dyn Notifier>,
    ledger: LedgerReader,
    threshold_hours: Decimal,
}

impl ChangeNotifier {
    /// Notifies through `notifier` when available hours move by at least
    /// `threshold_hours`. Email addresses come from the ledger directory.
    pub fn new(notifier: Arc<dyn Notifier>, ledger: LedgerReader, threshold_hours: Decimal) -> Self {
        Self {
            notifier,
            ledger,
            threshold_hours,
        }
    }

    /// Returns true if the move from `previous` to `current` is material.
    pub fn is_material(&self, previous: &BalanceRecord, current: &BalanceRecord) -> bool {
        (current.available_hours - previous.available_hours).abs() >= self.threshold_hours
    }

    /// Sends a notification if the change is material and the employee has
    /// an email address. Failures are logged, never returned.
    pub fn balance_changed(&self, previous: &BalanceRecord, current: &BalanceRecord) {
        if !self.is_material(previous, current) {
            return;
        }

        let email = match self.ledger.employee(&current.user_id) {
            Ok(employee) => employee.email,
            Err(err) => {
                warn!(user_id = %current.user_id, error = %err, "Could not look up employee for notification");
                return;
            }
        };
        let Some(email) = email else {
            return;
        };

        let subject = format!("Your {} leave balance has changed", current.year);
        let body = format!(
            "Your available leave for {} changed from {} to {} hours.\n\
             Entitled: {} hours. Used: {} hours. Pending: {} hours.",
            current.year,
            previous.available_hours,
            current.available_hours,
            current.total_hours,
            current.used_hours,
            current.pending_hours
        );

        if let Err(err) = self.notifier.send_email(&email, &subject, &body) {
            warn!(user_id = %current.user_id, error = %err, "Failed to send balance notification");
        }
    }
}
