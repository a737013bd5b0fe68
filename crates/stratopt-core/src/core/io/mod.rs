//! Provides input/output functionality for structural model files.
//!
//! The [`traits::ModelFile`] trait is the common interface; [`bdf::BdfFile`] implements it
//! for Nastran bulk-data decks, preserving every line it does not need to change.

pub mod bdf;
pub mod traits;
