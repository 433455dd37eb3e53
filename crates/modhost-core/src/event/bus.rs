use std::sync::Arc;

use log::{debug, warn};

use crate::event::error::EventSystemError;
use crate::event::{Delivery, EventEnvelope, EventReceiver};
use crate::kernel::constants::DIAG_TARGET;
use crate::module_system::error::ModuleResult;
use crate::module_system::wrapper::{ModuleState, ModuleWrapper};
use crate::utils::guarded;

/// Delivers `envelope` to every wrapper in order and returns how many
/// receivers handled it. One receiver failing never stops the others.
pub fn broadcast(wrappers: &[Arc<ModuleWrapper>], envelope: &EventEnvelope, diagnostics: bool) -> usize {
    let mut handled = 0;
    for wrapper in wrappers {
        match deliver(wrapper, envelope) {
            Ok(Delivery::Handled) => {
                handled += 1;
                if diagnostics {
                    debug!(target: DIAG_TARGET, "Event '{}' handled by {}", envelope.name, wrapper.name());
                }
            }
            Ok(Delivery::Unhandled) => {
                if diagnostics {
                    debug!(target: DIAG_TARGET, "Event '{}' not handled by {}", envelope.name, wrapper.name());
                }
            }
            Err(e) => {
                wrapper.record_error(e.to_string());
                warn!("{}", e);
            }
        }
    }
    handled
}

/// Offers `envelope` to a single wrapper, most specific handler first.
/// Disposed wrappers and modules without an event capability are skipped.
pub fn deliver(wrapper: &ModuleWrapper, envelope: &EventEnvelope) -> Result<Delivery, EventSystemError> {
    if wrapper.state() == ModuleState::Disposed {
        return Ok(Delivery::Unhandled);
    }
    let Some(receiver) = wrapper.module().as_event_receiver() else {
        return Ok(Delivery::Unhandled);
    };

    match guarded(|| resolve(receiver, envelope)) {
        Ok(Ok(delivery)) => Ok(delivery),
        Ok(Err(e)) => Err(EventSystemError::HandlerFailed {
            event_name: envelope.name.clone(),
            receiver: wrapper.type_name().to_string(),
            reason: e.to_string(),
        }),
        Err(panic_msg) => Err(EventSystemError::HandlerPanicked {
            event_name: envelope.name.clone(),
            receiver: wrapper.type_name().to_string(),
            reason: panic_msg,
        }),
    }
}

fn resolve(receiver: &dyn EventReceiver, envelope: &EventEnvelope) -> ModuleResult<Delivery> {
    let name = envelope.name.as_str();

    if let Some(payload) = envelope.payload() {
        if receiver.on_typed(name, payload)? == Delivery::Handled {
            return Ok(Delivery::Handled);
        }
    }

    if envelope.is_warmup() && receiver.on_warmup()? == Delivery::Handled {
        return Ok(Delivery::Handled);
    }

    if receiver.on_system_event(name, envelope.payload())? == Delivery::Handled {
        return Ok(Delivery::Handled);
    }

    receiver.on_named_event(name)
}
