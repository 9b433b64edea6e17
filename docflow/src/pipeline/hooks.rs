//! Lifecycle hooks.
//!
//! Hooks are best-effort observers: a callback error is logged and never
//! affects the run.

use crate::errors::ConfigError;
use crate::schema::{RunContext, StageError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use super::stage::StageSpec;

/// The five pipeline lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// Fired once before the stage loop starts.
    BeforeRun,
    /// Fired once after the stage loop completes without an abort.
    AfterRun,
    /// Fired before each executed stage.
    BeforeStage,
    /// Fired after each successfully executed stage.
    AfterStage,
    /// Fired when a stage fails after its retry budget.
    OnError,
}

impl HookEvent {
    /// All events, in lifecycle order.
    pub const ALL: [HookEvent; 5] = [
        HookEvent::BeforeRun,
        HookEvent::AfterRun,
        HookEvent::BeforeStage,
        HookEvent::AfterStage,
        HookEvent::OnError,
    ];

    /// The wire name of the event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeRun => "before_run",
            Self::AfterRun => "after_run",
            Self::BeforeStage => "before_stage",
            Self::AfterStage => "after_stage",
            Self::OnError => "on_error",
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookEvent {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before_run" => Ok(Self::BeforeRun),
            "after_run" => Ok(Self::AfterRun),
            "before_stage" => Ok(Self::BeforeStage),
            "after_stage" => Ok(Self::AfterStage),
            "on_error" => Ok(Self::OnError),
            other => Err(ConfigError::UnknownEvent(other.to_string())),
        }
    }
}

/// What a hook callback gets to see.
///
/// Every field except the event is optional so that callbacks keep working
/// as payloads grow.
#[derive(Debug)]
pub struct HookPayload<'a> {
    /// The event being dispatched.
    pub event: HookEvent,
    /// The run's context.
    pub context: &'a RunContext,
    /// The stage involved, for stage-scoped events.
    pub stage: Option<&'a StageSpec>,
    /// The error record, for `OnError`.
    pub error: Option<&'a StageError>,
}

/// A hook callback.
pub type HookCallback = Arc<dyn Fn(&HookPayload<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Registered callbacks, grouped by event.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<HookEvent, Vec<HookCallback>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for an event.
    pub fn register(&mut self, event: HookEvent, callback: HookCallback) {
        self.hooks.entry(event).or_default().push(callback);
    }

    /// Number of callbacks registered for an event.
    #[must_use]
    pub fn count(&self, event: HookEvent) -> usize {
        self.hooks.get(&event).map_or(0, Vec::len)
    }

    /// Dispatches an event to its callbacks.
    ///
    /// Callback errors are logged and swallowed.
    pub fn dispatch(&self, payload: &HookPayload<'_>) {
        let Some(callbacks) = self.hooks.get(&payload.event) else {
            return;
        };
        for callback in callbacks {
            if let Err(error) = callback(payload) {
                tracing::warn!(
                    event = %payload.event,
                    error = %error,
                    "Hook callback failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = HookEvent::ALL
            .iter()
            .map(|e| (e.as_str(), self.count(*e)))
            .collect();
        f.debug_struct("HookRegistry").field("counts", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_names_round_trip() {
        for event in HookEvent::ALL {
            assert_eq!(event.as_str().parse::<HookEvent>().unwrap(), event);
        }
    }

    #[test]
    fn test_unknown_event_name() {
        let err = "on_success".parse::<HookEvent>().unwrap_err();
        assert_eq!(err, ConfigError::UnknownEvent("on_success".to_string()));
    }

    #[test]
    fn test_dispatch_reaches_all_callbacks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        for _ in 0..3 {
            let calls = calls.clone();
            registry.register(
                HookEvent::BeforeRun,
                Arc::new(move |_payload| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }

        let context = RunContext::new("task");
        registry.dispatch(&HookPayload {
            event: HookEvent::BeforeRun,
            context: &context,
            stage: None,
            error: None,
        });

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(registry.count(HookEvent::BeforeRun), 3);
        assert_eq!(registry.count(HookEvent::AfterRun), 0);
    }

    #[test]
    fn test_failing_callback_does_not_stop_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();

        registry.register(
            HookEvent::OnError,
            Arc::new(|_payload| anyhow::bail!("observer broke")),
        );
        let calls_clone = calls.clone();
        registry.register(
            HookEvent::OnError,
            Arc::new(move |_payload| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let context = RunContext::new("task");
        registry.dispatch(&HookPayload {
            event: HookEvent::OnError,
            context: &context,
            stage: None,
            error: None,
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
