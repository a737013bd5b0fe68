//! # Workflows Module
//!
//! This module provides the top-level entry point for running a structural optimization.
//!
//! ## Overview
//!
//! A workflow loads the model, resolves the design variables, captures the baseline mass,
//! drives the selected search backend through the trial pipeline, and finally persists a
//! summary. Whatever happens, it delivers exactly one terminal
//! [`Finished`](crate::engine::progress::Progress::Finished) event to the observer.
//!
//! ## Architecture
//!
//! - **Optimization Workflow** ([`optimize`]) - Synchronous [`optimize::run`] and the threaded
//!   [`optimize::spawn`] returning a cancellable [`optimize::RunHandle`].

pub mod optimize;
