//! # Modhost Event Bus
//!
//! Broadcasts named signals, optionally carrying a payload, to every
//! registered module. Each receiver is offered the event through the most
//! specific handler it implements on [`EventReceiver`]:
//!
//! 1. [`on_typed`](EventReceiver::on_typed) when a payload is present,
//! 2. [`on_warmup`](EventReceiver::on_warmup) for the `Warmup` signal,
//! 3. [`on_system_event`](EventReceiver::on_system_event) with name and payload,
//! 4. [`on_named_event`](EventReceiver::on_named_event) with the name only.
//!
//! The first handler that reports [`Delivery::Handled`] (or fails) ends
//! delivery for that receiver. Failures are logged and never stop delivery to
//! the remaining receivers.
pub mod bus;
pub mod error;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::module_system::error::ModuleResult;
use crate::module_system::wrapper::ModuleWrapper;

pub use bus::broadcast;

/// Raised once after every load cycle
pub const SYSTEM_BOOT: &str = "SystemBoot";
/// Readiness signal carrying the memory module wrapper as payload
pub const MEMORY_READY: &str = "MemoryReady";
/// Final boot signal. Modules must treat repeats as no-ops.
pub const WAKE: &str = "Wake";
/// Warm-up signal routed to [`EventReceiver::on_warmup`]
pub const WARMUP: &str = "Warmup";

/// Untyped event payload
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A named signal plus an optional payload. Transient, never persisted.
#[derive(Clone)]
pub struct EventEnvelope {
    pub name: String,
    pub payload: Option<Payload>,
}

impl EventEnvelope {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), payload: None }
    }

    pub fn with_payload(name: impl Into<String>, payload: Payload) -> Self {
        Self { name: name.into(), payload: Some(payload) }
    }

    pub fn payload(&self) -> Option<&dyn Any> {
        self.payload.as_deref().map(|p| p as &dyn Any)
    }

    pub fn is_warmup(&self) -> bool {
        self.name.eq_ignore_ascii_case(WARMUP)
    }
}

impl fmt::Debug for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("name", &self.name)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// Outcome reported by an event handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The handler consumed the event; no further shapes are tried
    Handled,
    /// The handler does not apply; try the next, less specific shape
    Unhandled,
}

/// Optional event capability of a module. Every handler defaults to
/// [`Delivery::Unhandled`], so a module implements only what it cares about.
pub trait EventReceiver: Send + Sync {
    /// Strongly-typed handler. Downcast `payload` to the type you expect and
    /// return `Unhandled` when it is not that type.
    fn on_typed(&self, _name: &str, _payload: &dyn Any) -> ModuleResult<Delivery> {
        Ok(Delivery::Unhandled)
    }

    fn on_warmup(&self) -> ModuleResult<Delivery> {
        Ok(Delivery::Unhandled)
    }

    fn on_system_event(&self, _name: &str, _payload: Option<&dyn Any>) -> ModuleResult<Delivery> {
        Ok(Delivery::Unhandled)
    }

    fn on_named_event(&self, _name: &str) -> ModuleResult<Delivery> {
        Ok(Delivery::Unhandled)
    }
}

/// JSON rendering of a payload for receivers across the native ABI.
///
/// Supports `serde_json::Value`, `String`, `&'static str` and module wrappers
/// (rendered as `{"module": name, "type_name": ...}`); other types yield `None`.
pub fn payload_as_json(payload: &dyn Any) -> Option<serde_json::Value> {
    if let Some(v) = payload.downcast_ref::<serde_json::Value>() {
        Some(v.clone())
    } else if let Some(s) = payload.downcast_ref::<String>() {
        Some(serde_json::Value::String(s.clone()))
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        Some(serde_json::Value::String((*s).to_string()))
    } else {
        payload.downcast_ref::<ModuleWrapper>().map(|w| {
            serde_json::json!({
                "module": w.name(),
                "type_name": w.type_name(),
                "category": w.category(),
            })
        })
    }
}
