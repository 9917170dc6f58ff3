//! Entity arena and typed component stores.
//!
//! Components are stored in BTreeMap for deterministic iteration order.
//! Each component type has its own storage keyed by EntityId, with explicit
//! optional-returning accessors.
//!
//! # Invariants
//! - Iteration order is deterministic (BTreeMap).
//! - Accessors return `Option`; a missing component is a skip, never a fault.
//! - Handles come from the [`Arena`] and are local to one world instance.

pub mod arena;
pub mod components;
pub mod store;

pub use arena::Arena;
pub use components::{
    CollisionBody, Contact, Damaging, Emitter, GravityPoint, Health, LevelBounds, Lifetime,
    Movable, PlayerState, Serializable, Standing, collider,
};
pub use store::ComponentStore;
