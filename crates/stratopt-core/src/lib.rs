//! # stratopt Core Library
//!
//! A library for black-box sizing optimization of structural finite-element models driven
//! by an external solver.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear separation of concerns,
//! making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`StructuralModel`), the
//!   bulk-data reader and writer, solver result sets, and the objective expression interpreter.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer evaluates trials. It includes the
//!   `ObjectiveEvaluator` that runs one trial end to end, the solver process manager, best-result
//!   tracking, and the interchangeable search backends.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer. It ties the
//!   `engine` and `core` together into a complete optimization run, either on the calling thread
//!   or on a dedicated worker thread with cooperative cancellation.

pub mod core;
pub mod engine;
pub mod workflows;
