//! # Engine Module
//!
//! This module implements the stateful side of a structural optimization run: turning a
//! vector of property multipliers into a scalar objective, and driving a search backend
//! over that objective.
//!
//! ## Overview
//!
//! A run owns one working copy of the structural model. Each trial scales the selected
//! properties, writes the model, runs the external solver, extracts the configured
//! responses, combines them through the objective expression, and hands a single number
//! back to the search. Failed trials never abort the run; they are recorded with a
//! sentinel objective instead.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run settings and their validating builder
//! - **Selection** ([`selection`], [`context`]) - Property selection and design-variable setup
//! - **Trial Pipeline** ([`evaluator`]) - The per-trial sequence, backed by [`solver`],
//!   [`extract`] and [`objective`]
//! - **State Tracking** ([`state`]) - Best-so-far snapshot and the append-only history
//! - **Search** ([`backend`]) - Gaussian-process and boosted-tree surrogate search, and
//!   differential evolution
//! - **Reporting** ([`progress`], [`summary`]) - Observer events and the end-of-run summary
//! - **Control** ([`cancel`], [`error`]) - Cooperative cancellation and error types

pub mod backend;
pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod objective;
pub mod progress;
pub mod selection;
pub mod solver;
pub mod state;
pub mod summary;
