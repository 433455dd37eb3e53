//! # Modhost Event System Errors
//!
//! [`EventSystemError`] describes a failed delivery to one receiver. The bus
//! logs these and moves on; they only reach callers through
//! [`deliver`](crate::event::bus::deliver).
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("System event '{event_name}' handler error in {receiver}: {reason}")]
    HandlerFailed {
        event_name: String,
        receiver: String,
        reason: String,
    },

    #[error("System event '{event_name}' handler panicked in {receiver}: {reason}")]
    HandlerPanicked {
        event_name: String,
        receiver: String,
        reason: String,
    },
}
