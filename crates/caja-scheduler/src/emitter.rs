//! # Event Emitter
//!
//! The "send notification" seam. The lifecycle service reports every logged
//! operation and every per-client failure here; what happens next (toast,
//! e-mail, websocket push) belongs to the caller.

use tracing::{error, info, warn};

use caja_core::{AutoOperationLogEntry, OperationStatus};

pub trait SchedulerEventEmitter: Send + Sync {
    /// Called after an operation log entry has been stored.
    fn emit_operation(&self, entry: &AutoOperationLogEntry);

    /// Called when a client's check failed inside a tick.
    fn emit_error(&self, client_id: &str, message: &str);
}

/// Drops every event. Default for tests.
pub struct NoOpEmitter;

impl SchedulerEventEmitter for NoOpEmitter {
    fn emit_operation(&self, _entry: &AutoOperationLogEntry) {}
    fn emit_error(&self, _client_id: &str, _message: &str) {}
}

/// Writes events to the tracing subscriber.
pub struct TracingEmitter;

impl SchedulerEventEmitter for TracingEmitter {
    fn emit_operation(&self, entry: &AutoOperationLogEntry) {
        match entry.status {
            OperationStatus::Failed => warn!(
                client_id = %entry.client_id,
                operation = %entry.operation_type,
                error = entry.error_message.as_deref().unwrap_or(""),
                "Automatic operation failed"
            ),
            _ => info!(
                client_id = %entry.client_id,
                operation = %entry.operation_type,
                status = %entry.status,
                notes = entry.notes.as_deref().unwrap_or(""),
                "Automatic operation"
            ),
        }
    }

    fn emit_error(&self, client_id: &str, message: &str) {
        error!(client_id = %client_id, error = %message, "Scheduler check failed");
    }
}
