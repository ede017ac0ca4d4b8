// src/build/notify.rs

//! Escalation seam for critical failures.
//!
//! Delivery channels (email, SMS, chat) are external concerns; the engine
//! fires exactly one escalation per critical failure transition through this
//! trait.

use tracing::error;

/// Consumer of critical-failure escalations.
pub trait Notifier: Send + Sync {
    fn escalate(&self, build_id: &str, unit_id: &str, concerns: &[String]);
}

/// Default notifier: logs the escalation at error level.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn escalate(&self, build_id: &str, unit_id: &str, concerns: &[String]) {
        error!(
            build = %build_id,
            checkpoint = %unit_id,
            ?concerns,
            "critical checkpoint failure; escalating for human remediation"
        );
    }
}
