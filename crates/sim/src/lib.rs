//! Authoritative simulation: shape penetration, continuous collision,
//! gravity accumulation, integration and the per-step pipeline.
//!
//! # Invariants
//! - The frame counter advances exactly once per step, in one place.
//! - Systems mutate components of existing entities only; creation and
//!   destruction happen inside [`World::step`] and the level builder.
//! - Iteration over entities is deterministic (arena order).

pub mod collision;
pub mod control;
pub mod geometry;
pub mod gravity;
pub mod integrate;
pub mod level;
pub mod sweep;
pub mod world;

pub use world::{StepReport, World};
