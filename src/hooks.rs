//! Change notification hooks
//!
//! Services announce state changes (registrations, submissions, moderation
//! decisions, relationship toggles) by triggering a named hook with a JSON
//! payload. Handlers are registered at start-up and run in priority order;
//! a handler may return a replacement payload for the handlers after it.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Hook callback type
pub type HookCallback = Arc<dyn Fn(&mut Value) -> Option<Value> + Send + Sync>;

/// Hook priority (lower = earlier)
pub const PRIORITY_EARLY: i32 = -100;
pub const PRIORITY_DEFAULT: i32 = 0;
pub const PRIORITY_LATE: i32 = 100;

struct HookHandler {
    callback: HookCallback,
    priority: i32,
    source: Option<String>,
}

/// Registry of hook handlers
pub struct HookManager {
    hooks: RwLock<HashMap<String, Vec<HookHandler>>>,
}

impl Default for HookManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HookManager {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// A manager that logs every notification at `info`.
    pub fn with_audit_log() -> Self {
        let manager = Self::new();
        for &name in hook_names::ALL {
            manager.register(
                name,
                move |data| {
                    tracing::info!(hook = name, payload = %data, "change notification");
                    None
                },
                PRIORITY_LATE,
                Some("audit_log".to_string()),
            );
        }
        manager
    }

    /// Register a hook handler.
    ///
    /// Handlers with equal priority run in registration order.
    pub fn register<F>(&self, name: &str, callback: F, priority: i32, source: Option<String>)
    where
        F: Fn(&mut Value) -> Option<Value> + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let handlers = hooks.entry(name.to_string()).or_default();

        handlers.push(HookHandler {
            callback: Arc::new(callback),
            priority,
            source,
        });
        handlers.sort_by_key(|h| h.priority);

        debug!("Registered hook handler for '{}' with priority {}", name, priority);
    }

    /// Remove every handler registered by `source`
    pub fn unregister_source(&self, source: &str) {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        for handlers in hooks.values_mut() {
            handlers.retain(|h| h.source.as_deref() != Some(source));
        }
    }

    /// Trigger a hook and return the (possibly replaced) payload
    pub fn trigger(&self, name: &str, mut data: Value) -> Value {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());

        if let Some(handlers) = hooks.get(name) {
            for handler in handlers {
                if let Some(result) = (handler.callback)(&mut data) {
                    data = result;
                }
            }
        }

        data
    }

    pub fn has_handlers(&self, name: &str) -> bool {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks.get(name).is_some_and(|h| !h.is_empty())
    }
}

/// Hook names with a trigger point in the services
pub mod hook_names {
    // services/user.rs
    pub const USER_REGISTER_AFTER: &str = "user_register_after";
    pub const USER_LOGIN_AFTER: &str = "user_login_after";
    pub const USER_LOGIN_FAILED: &str = "user_login_failed";
    pub const USER_STATUS_CHANGED: &str = "user_status_changed";
    pub const USER_PROFILE_UPDATED: &str = "user_profile_updated";

    // services/moderation.rs
    pub const CONTENT_AFTER_SUBMIT: &str = "content_after_submit";
    pub const CONTENT_STATUS_CHANGED: &str = "content_status_changed";

    // services/relationship.rs
    pub const RELATIONSHIP_TOGGLED: &str = "relationship_toggled";

    pub const ALL: &[&str] = &[
        USER_REGISTER_AFTER,
        USER_LOGIN_AFTER,
        USER_LOGIN_FAILED,
        USER_STATUS_CHANGED,
        USER_PROFILE_UPDATED,
        CONTENT_AFTER_SUBMIT,
        CONTENT_STATUS_CHANGED,
        RELATIONSHIP_TOGGLED,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_trigger_without_handlers_is_identity() {
        let manager = HookManager::new();
        let payload = json!({"id": 1});
        assert_eq!(manager.trigger("nothing_here", payload.clone()), payload);
        assert!(!manager.has_handlers("nothing_here"));
    }

    #[test]
    fn test_handlers_run_in_priority_order() {
        let manager = HookManager::new();
        let push = |label: &'static str| {
            move |data: &mut Value| -> Option<Value> {
                if let Some(arr) = data.as_array_mut() {
                    arr.push(json!(label));
                }
                None
            }
        };

        manager.register("order", push("late"), PRIORITY_LATE, None);
        manager.register("order", push("early"), PRIORITY_EARLY, None);
        manager.register("order", push("default"), PRIORITY_DEFAULT, None);

        let output = manager.trigger("order", json!([]));
        assert_eq!(output, json!(["early", "default", "late"]));
    }

    #[test]
    fn test_handler_can_replace_payload() {
        let manager = HookManager::new();
        manager.register("replace", |_| Some(json!({"replaced": true})), PRIORITY_DEFAULT, None);
        assert_eq!(manager.trigger("replace", json!({})), json!({"replaced": true}));
    }

    #[test]
    fn test_unregister_source() {
        let manager = HookManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        manager.register(
            hook_names::RELATIONSHIP_TOGGLED,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            },
            PRIORITY_DEFAULT,
            Some("counter".to_string()),
        );

        manager.trigger(hook_names::RELATIONSHIP_TOGGLED, json!({}));
        manager.unregister_source("counter");
        manager.trigger(hook_names::RELATIONSHIP_TOGGLED, json!({}));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!manager.has_handlers(hook_names::RELATIONSHIP_TOGGLED));
    }

    #[test]
    fn test_audit_log_covers_every_hook() {
        let manager = HookManager::with_audit_log();
        for name in hook_names::ALL {
            assert!(manager.has_handlers(name));
        }
    }
}
