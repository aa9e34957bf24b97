//! # Composition Engine
//!
//! The composition engine drives a project through rendering and assembly
//! to produce the final montage.

pub mod engine;
pub mod sequencer;

// Re-exports for convenience
pub use engine::CompositionEngine;
pub use sequencer::AssemblySequencer;
