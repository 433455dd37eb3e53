use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::kernel::constants::DIAG_TARGET;
use crate::module_system::error::ModuleResult;
use crate::module_system::manager::ModuleManager;
use crate::module_system::wrapper::{ModuleState, ModuleWrapper};
use crate::utils::guarded;

enum Outcome {
    Answer(String),
    Silent,
    Failed(String),
}

fn run(wrapper: &ModuleWrapper, call: impl FnOnce() -> ModuleResult<Option<String>>) -> Outcome {
    match guarded(call) {
        Ok(Ok(Some(answer))) if !answer.is_empty() => Outcome::Answer(answer),
        Ok(Ok(_)) => Outcome::Silent,
        Ok(Err(e)) => {
            wrapper.record_error(e.to_string());
            Outcome::Failed(format!("(module {} invocation error: {})", wrapper.name(), e))
        }
        Err(panic_msg) => {
            wrapper.record_error(format!("panic: {}", panic_msg));
            Outcome::Failed(format!("(module {} invocation exception: {})", wrapper.name(), panic_msg))
        }
    }
}

/// Capability-probing invocation of one wrapper.
///
/// Order: the module's own `Processor`, then the wrapper's interceptor, and
/// only when neither entry point exists, the module's last response. A
/// failure at any step ends the chain with a descriptive string.
pub(crate) fn invoke_wrapper(wrapper: &ModuleWrapper, input: &str, diagnostics: bool) -> Option<String> {
    let module = wrapper.module();
    let processor = module.as_processor();
    let interceptor = wrapper.interceptor();

    if let Some(processor) = processor {
        if diagnostics {
            debug!(target: DIAG_TARGET, "Invoking {} via process entry point", wrapper.name());
        }
        match run(wrapper, || processor.process(input)) {
            Outcome::Answer(answer) => return Some(answer),
            Outcome::Failed(message) => return Some(message),
            Outcome::Silent => {}
        }
    }

    if let Some(interceptor) = interceptor.as_deref() {
        if diagnostics {
            debug!(target: DIAG_TARGET, "Invoking {} via wrapper interceptor", wrapper.name());
        }
        match run(wrapper, || interceptor.process(input)) {
            Outcome::Answer(answer) => return Some(answer),
            Outcome::Failed(message) => return Some(message),
            Outcome::Silent => {}
        }
    }

    if processor.is_some() || interceptor.is_some() {
        if diagnostics {
            debug!(target: DIAG_TARGET, "{} gave no answer", wrapper.name());
        }
        return None;
    }

    let provider = module.as_last_response()?;
    if diagnostics {
        debug!(target: DIAG_TARGET, "Reading last response of {}", wrapper.name());
    }
    match run(wrapper, || Ok(provider.last_response())) {
        Outcome::Answer(answer) => Some(answer),
        Outcome::Failed(message) => Some(message),
        Outcome::Silent => None,
    }
}

impl ModuleManager {
    /// Wrapper a dispatch call for `name` goes to, if it may be invoked
    fn dispatch_target(&self, name: &str) -> Option<Arc<ModuleWrapper>> {
        let wrapper = self.get_instance_by_name(name);
        let diagnostics = self.debug_logging();
        match wrapper {
            None => {
                if diagnostics {
                    debug!(target: DIAG_TARGET, "No module named '{}' to invoke", name);
                }
                None
            }
            Some(w) if w.state() == ModuleState::Disposed => {
                if diagnostics {
                    debug!(target: DIAG_TARGET, "Module {} is disposed, not invoking", w.name());
                }
                None
            }
            Some(w) if !w.is_enabled() => {
                if diagnostics {
                    debug!(target: DIAG_TARGET, "Module {} is disabled, not invoking", w.name());
                }
                None
            }
            Some(w) => Some(w),
        }
    }

    /// Invokes the module known as `name` with `input`.
    ///
    /// Returns `None` when no such module is registered or it gives no answer.
    /// Module failures come back as `Some` error text naming the module; this
    /// never panics and never returns an error.
    pub fn invoke_by_name(&self, name: &str, input: &str) -> Option<String> {
        let wrapper = self.dispatch_target(name)?;
        invoke_wrapper(&wrapper, input, self.debug_logging())
    }

    /// First non-empty answer from `candidates`, tried in order
    pub fn invoke_with_fallback<S: AsRef<str>>(&self, candidates: &[S], input: &str) -> Option<String> {
        candidates
            .iter()
            .find_map(|name| self.invoke_by_name(name.as_ref(), input))
    }

    /// Like [`invoke_by_name`](Self::invoke_by_name), on a blocking task raced
    /// against a timer.
    ///
    /// `timeout` overrides the wrapper's own `timeout_ms`; with neither set
    /// the call waits for the module. On timeout the module keeps running in
    /// the background, the wrapper records the timeout and a timeout string is
    /// returned.
    pub async fn invoke_by_name_async(&self, name: &str, input: &str, timeout: Option<Duration>) -> Option<String> {
        let wrapper = self.dispatch_target(name)?;
        let limit = timeout
            .or_else(|| match wrapper.timeout_ms() {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            })
            .filter(|d| !d.is_zero());
        let diagnostics = self.debug_logging();

        let task_wrapper = Arc::clone(&wrapper);
        let input = input.to_string();
        let task = tokio::task::spawn_blocking(move || invoke_wrapper(&task_wrapper, &input, diagnostics));

        let joined = match limit {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    wrapper.set_last_invocation_timed_out(true);
                    wrapper.record_error(format!("invocation timed out after {}ms", limit.as_millis()));
                    if diagnostics {
                        debug!(target: DIAG_TARGET, "Invocation of {} timed out", wrapper.name());
                    }
                    return Some(format!(
                        "(module {} invocation timed out after {}ms)",
                        wrapper.name(),
                        limit.as_millis()
                    ));
                }
            },
            None => task.await,
        };

        wrapper.set_last_invocation_timed_out(false);
        match joined {
            Ok(result) => result,
            Err(e) => Some(format!("(module {} invocation exception: {})", wrapper.name(), e)),
        }
    }

    /// Async [`invoke_with_fallback`](Self::invoke_with_fallback); `timeout`
    /// applies to each candidate separately.
    pub async fn invoke_with_fallback_async<S: AsRef<str>>(
        &self,
        candidates: &[S],
        input: &str,
        timeout: Option<Duration>,
    ) -> Option<String> {
        for name in candidates {
            if let Some(answer) = self.invoke_by_name_async(name.as_ref(), input, timeout).await {
                return Some(answer);
            }
        }
        None
    }
}
