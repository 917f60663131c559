//! Observer hooks for engine lifecycle events.
//!
//! Plugins opt in to a subset of event kinds and are notified in
//! registration order. Hook errors are logged at warn level and never
//! propagated; a hook must not block the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::assignment::Assignment;
use crate::check::{CheckRequest, CheckResult};
use crate::error::BoxError;
use crate::id::Id;
use crate::permission::Permission;
use crate::policy::Policy;
use crate::relation::RelationTuple;
use crate::role::Role;

/// Lifecycle event kinds a plugin can subscribe to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    /// Before an authorization check is evaluated.
    BeforeCheck,
    /// After an authorization check completes.
    AfterCheck,
    /// A role was created.
    RoleCreated,
    /// A role was updated.
    RoleUpdated,
    /// A role was deleted.
    RoleDeleted,
    /// A permission was created.
    PermissionCreated,
    /// A permission was deleted.
    PermissionDeleted,
    /// A permission was attached to a role.
    PermissionAttached,
    /// A permission was detached from a role.
    PermissionDetached,
    /// A role was assigned to a subject.
    RoleAssigned,
    /// A role was unassigned from a subject.
    RoleUnassigned,
    /// A relation tuple was written.
    RelationWritten,
    /// A relation tuple was deleted.
    RelationDeleted,
    /// A policy was created.
    PolicyCreated,
    /// A policy was updated.
    PolicyUpdated,
    /// A policy was deleted.
    PolicyDeleted,
    /// The engine is shutting down.
    Shutdown,
}

/// A lifecycle event with its payload, passed by reference to hooks.
#[derive(Clone, Copy, Debug)]
pub enum Event<'a> {
    /// Before an authorization check is evaluated.
    BeforeCheck(&'a CheckRequest),
    /// After an authorization check completes.
    AfterCheck(&'a CheckRequest, &'a CheckResult),
    /// A role was created.
    RoleCreated(&'a Role),
    /// A role was updated.
    RoleUpdated(&'a Role),
    /// A role was deleted.
    RoleDeleted(Id),
    /// A permission was created.
    PermissionCreated(&'a Permission),
    /// A permission was deleted.
    PermissionDeleted(Id),
    /// A permission was attached to a role.
    PermissionAttached {
        /// Role the permission was attached to.
        role_id: Id,
        /// Attached permission.
        permission_id: Id,
    },
    /// A permission was detached from a role.
    PermissionDetached {
        /// Role the permission was detached from.
        role_id: Id,
        /// Detached permission.
        permission_id: Id,
    },
    /// A role was assigned to a subject.
    RoleAssigned(&'a Assignment),
    /// A role was unassigned from a subject.
    RoleUnassigned(&'a Assignment),
    /// A relation tuple was written.
    RelationWritten(&'a RelationTuple),
    /// A relation tuple was deleted.
    RelationDeleted(Id),
    /// A policy was created.
    PolicyCreated(&'a Policy),
    /// A policy was updated.
    PolicyUpdated(&'a Policy),
    /// A policy was deleted.
    PolicyDeleted(Id),
    /// The engine is shutting down.
    Shutdown,
}

impl Event<'_> {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BeforeCheck(_) => EventKind::BeforeCheck,
            Event::AfterCheck(..) => EventKind::AfterCheck,
            Event::RoleCreated(_) => EventKind::RoleCreated,
            Event::RoleUpdated(_) => EventKind::RoleUpdated,
            Event::RoleDeleted(_) => EventKind::RoleDeleted,
            Event::PermissionCreated(_) => EventKind::PermissionCreated,
            Event::PermissionDeleted(_) => EventKind::PermissionDeleted,
            Event::PermissionAttached { .. } => EventKind::PermissionAttached,
            Event::PermissionDetached { .. } => EventKind::PermissionDetached,
            Event::RoleAssigned(_) => EventKind::RoleAssigned,
            Event::RoleUnassigned(_) => EventKind::RoleUnassigned,
            Event::RelationWritten(_) => EventKind::RelationWritten,
            Event::RelationDeleted(_) => EventKind::RelationDeleted,
            Event::PolicyCreated(_) => EventKind::PolicyCreated,
            Event::PolicyUpdated(_) => EventKind::PolicyUpdated,
            Event::PolicyDeleted(_) => EventKind::PolicyDeleted,
            Event::Shutdown => EventKind::Shutdown,
        }
    }
}

/// An observer notified of engine lifecycle events.
///
/// Hooks receive entities by reference and must not re-enter the engine
/// synchronously on the same request.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique human-readable name, used in hook-error logs.
    fn name(&self) -> &str;

    /// Event kinds this plugin wants to receive.
    fn subscriptions(&self) -> &[EventKind];

    /// Handles a subscribed event.
    async fn on_event(&self, event: Event<'_>) -> Result<(), BoxError>;
}

/// Holds registered plugins and dispatches lifecycle events.
///
/// Registration caches per-event dispatch lists so an emit iterates only
/// over the plugins subscribed to that event. The registry is effectively
/// immutable after engine wiring.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
    by_kind: HashMap<EventKind, Vec<usize>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin and indexes its subscriptions.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let index = self.plugins.len();
        for &kind in plugin.subscriptions() {
            let listeners = self.by_kind.entry(kind).or_default();
            if !listeners.contains(&index) {
                listeners.push(index);
            }
        }
        self.plugins.push(plugin);
    }

    /// Returns all registered plugins.
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Notifies every plugin subscribed to the event's kind, in
    /// registration order. Hook errors are logged and discarded.
    pub async fn emit(&self, event: Event<'_>) {
        let Some(listeners) = self.by_kind.get(&event.kind()) else {
            return;
        };
        for &index in listeners {
            let plugin = &self.plugins[index];
            if let Err(err) = plugin.on_event(event).await {
                warn!(
                    plugin = plugin.name(),
                    event = ?event.kind(),
                    error = %err,
                    "plugin hook error"
                );
            }
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::SubjectKind;
    use futures::executor::block_on;
    use std::sync::Mutex;

    struct RecordingPlugin {
        name: String,
        subscriptions: Vec<EventKind>,
        seen: Mutex<Vec<EventKind>>,
        fail: bool,
    }

    impl RecordingPlugin {
        fn new(name: &str, subscriptions: Vec<EventKind>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                subscriptions,
                seen: Mutex::new(Vec::new()),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl Plugin for RecordingPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn subscriptions(&self) -> &[EventKind] {
            &self.subscriptions
        }

        async fn on_event(&self, event: Event<'_>) -> Result<(), BoxError> {
            self.seen.lock().expect("poisoned lock").push(event.kind());
            if self.fail {
                return Err("hook failure".into());
            }
            Ok(())
        }
    }

    fn check_request() -> CheckRequest {
        CheckRequest::new(SubjectKind::User, "u1", "read", "document", "doc1")
    }

    #[test]
    fn emit_should_reach_only_subscribed_plugins() {
        let before = RecordingPlugin::new("before", vec![EventKind::BeforeCheck]);
        let shutdown = RecordingPlugin::new("shutdown", vec![EventKind::Shutdown]);

        let mut registry = PluginRegistry::new();
        registry.register(before.clone());
        registry.register(shutdown.clone());

        let req = check_request();
        block_on(registry.emit(Event::BeforeCheck(&req)));

        assert_eq!(
            *before.seen.lock().expect("poisoned lock"),
            vec![EventKind::BeforeCheck]
        );
        assert!(shutdown.seen.lock().expect("poisoned lock").is_empty());
    }

    #[test]
    fn emit_should_follow_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        struct Ordered {
            label: &'static str,
            order: Arc<Mutex<Vec<&'static str>>>,
        }

        #[async_trait]
        impl Plugin for Ordered {
            fn name(&self) -> &str {
                self.label
            }

            fn subscriptions(&self) -> &[EventKind] {
                &[EventKind::Shutdown]
            }

            async fn on_event(&self, _event: Event<'_>) -> Result<(), BoxError> {
                self.order.lock().expect("poisoned lock").push(self.label);
                Ok(())
            }
        }

        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(Ordered {
            label: "first",
            order: order.clone(),
        }));
        registry.register(Arc::new(Ordered {
            label: "second",
            order: order.clone(),
        }));

        block_on(registry.emit(Event::Shutdown));
        assert_eq!(*order.lock().expect("poisoned lock"), vec!["first", "second"]);
    }

    #[test]
    fn hook_errors_should_not_stop_later_plugins() {
        let failing = Arc::new(RecordingPlugin {
            name: "failing".to_string(),
            subscriptions: vec![EventKind::AfterCheck],
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        let after = RecordingPlugin::new("after", vec![EventKind::AfterCheck]);

        let mut registry = PluginRegistry::new();
        registry.register(failing.clone());
        registry.register(after.clone());

        let req = check_request();
        let result = CheckResult::default();
        block_on(registry.emit(Event::AfterCheck(&req, &result)));

        assert_eq!(after.seen.lock().expect("poisoned lock").len(), 1);
    }
}
