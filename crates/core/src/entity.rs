//! Entity trait: identity that survives state changes.

/// Anything addressed by a stable, strongly-typed identifier.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
