//! Link-time class registration.
//!
//! Handler crates submit their classes with [`inventory`], and
//! [`DispatcherBuilder::collected`](crate::dispatcher::DispatcherBuilder::collected)
//! picks them all up:
//!
//! ```rust,ignore
//! conduit_std::inventory::submit! {
//!     ClassRegistration::new(|| profile_class().boxed())
//! }
//! ```

use crate::factory::Candidate;

/// A class submitted for collection.
///
/// Holds a constructor rather than the class itself, so every dispatcher
/// built from the collection gets its own declarations.
pub struct ClassRegistration {
    build: fn() -> Box<dyn Candidate>,
}

impl ClassRegistration {
    /// Register the class produced by `build`.
    pub const fn new(build: fn() -> Box<dyn Candidate>) -> Self {
        Self { build }
    }
}

inventory::collect!(ClassRegistration);

/// Build every submitted class, sorted by class name.
pub fn collected_classes() -> Vec<Box<dyn Candidate>> {
    let mut classes: Vec<Box<dyn Candidate>> = inventory::iter::<ClassRegistration>
        .into_iter()
        .map(|registration| (registration.build)())
        .collect();
    classes.sort_by(|a, b| a.class_name().cmp(b.class_name()));
    classes
}
