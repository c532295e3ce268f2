//! Target registry.
//!
//! This module provides a builder for registering target descriptors and a
//! frozen registry for immutable, thread-safe lookup.

use conduit_core::{ConfigError, TargetDescriptor, TargetId};
use std::{collections::HashMap, sync::Arc};

// ============================================================================
// RegistryBuilder - for constructing registries
// ============================================================================

/// Builder for constructing a [`TargetRegistry`].
///
/// Registering a [`TargetId`] twice is an error unless the builder was
/// created with [`allow_overwrite`](Self::allow_overwrite), in which case the
/// last registration wins.
///
/// # Example
/// ```ignore
/// let mut builder = RegistryBuilder::new();
/// builder.register(descriptor)?;
/// let registry = builder.build();
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    targets: HashMap<TargetId, Arc<TargetDescriptor>>,
    events: HashMap<String, TargetId>,
    allow_overwrite: bool,
}

impl RegistryBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or forbid replacing an existing registration.
    pub fn allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Register a descriptor.
    ///
    /// On error nothing is changed: neither the target nor any of its event
    /// mappings are inserted.
    pub fn register(&mut self, descriptor: TargetDescriptor) -> Result<(), ConfigError> {
        let id = descriptor.id().clone();
        let replaced = self.targets.contains_key(&id);
        if replaced && !self.allow_overwrite {
            return Err(ConfigError::DuplicateTarget(id));
        }
        if !self.allow_overwrite {
            for event in descriptor.events() {
                if let Some(existing) = self.events.get(event)
                    && *existing != id
                {
                    return Err(ConfigError::DuplicateEvent {
                        event: event.clone(),
                        existing: existing.clone(),
                        incoming: id,
                    });
                }
            }
        }

        if replaced {
            tracing::warn!(id = %id, "overwriting registered target");
            self.events.retain(|_, owner| *owner != id);
        }
        for event in descriptor.events() {
            if let Some(previous) = self.events.insert(event.clone(), id.clone())
                && previous != id
            {
                tracing::warn!(%event, from = %previous, to = %id, "remapping event");
            }
        }
        tracing::debug!(id = %id, "registered target");
        self.targets.insert(id, Arc::new(descriptor));
        Ok(())
    }

    /// Get the number of registered targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if the builder has no targets.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Build the immutable registry.
    pub fn build(self) -> TargetRegistry {
        TargetRegistry {
            targets: self.targets,
            events: self.events,
        }
    }
}

// ============================================================================
// TargetRegistry - immutable, thread-safe descriptor storage
// ============================================================================

/// An immutable, thread-safe map from target identity to descriptor.
///
/// Created by [`RegistryBuilder::build`]. Lookups never lock; share the
/// registry across threads via `Arc`.
#[derive(Default)]
pub struct TargetRegistry {
    targets: HashMap<TargetId, Arc<TargetDescriptor>>,
    events: HashMap<String, TargetId>,
}

impl TargetRegistry {
    /// Look up a target. Unknown ids are a hard error.
    pub fn lookup(&self, id: &TargetId) -> Result<Arc<TargetDescriptor>, ConfigError> {
        self.targets
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::InvalidTarget(id.clone()))
    }

    /// Resolve a declared event name to the target handling it.
    pub fn lookup_by_event(&self, event: &str) -> Option<&TargetId> {
        self.events.get(event)
    }

    /// Check whether a target is registered.
    pub fn contains(&self, id: &TargetId) -> bool {
        self.targets.contains_key(id)
    }

    /// Get the number of registered targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate over all descriptors, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TargetDescriptor>> {
        self.targets.values()
    }

    /// Iterate over `(event, target)` mappings.
    pub fn events(&self) -> impl Iterator<Item = (&str, &TargetId)> {
        self.events.iter().map(|(event, id)| (event.as_str(), id))
    }
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.targets.keys().map(ToString::to_string).collect();
        ids.sort();
        f.debug_struct("TargetRegistry")
            .field("targets", &ids)
            .field("events", &self.events.len())
            .finish()
    }
}
