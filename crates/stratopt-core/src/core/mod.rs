//! # Core Module
//!
//! This module provides the stateless building blocks the optimization engine works on.
//!
//! ## Overview
//!
//! Nothing in `core` knows about trials, searches, or solvers. It describes a structural
//! model, reads and writes it, reads the solver's results back, and evaluates the user's
//! objective expression over them.
//!
//! ## Architecture
//!
//! - **Structural Representation** ([`models`]) - Nodes, elements, properties, materials and mass
//! - **File I/O** ([`io`]) - The [`io::traits::ModelFile`] interface and the Nastran bulk-data format
//! - **Solver Results** ([`results`]) - Result sets addressed by load case and entity id
//! - **Objective Expressions** ([`expr`]) - A small interpreter over a fixed symbol table

pub mod expr;
pub mod io;
pub mod models;
pub mod results;
