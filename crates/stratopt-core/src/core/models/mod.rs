//! # Core Models Module
//!
//! This module contains the data structures used to represent a structural finite-element
//! model inside stratopt.
//!
//! ## Overview
//!
//! The models describe exactly what the optimizer needs to read, mutate and write back:
//!
//! - **Geometry** - grid point positions used for element areas and lengths
//! - **Connectivity** - elements with their ordered node references and property ids
//! - **Design variables** - property cards, some of which expose a tunable attribute
//! - **Mass** - material densities and the mass roll-up used by the mass penalty
//!
//! ## Key Components
//!
//! - [`model`] - The [`model::StructuralModel`] container and materials
//! - [`element`] - Element kinds and connectivity
//! - [`property`] - Property cards and the [`property::TunableKind`] classification
//! - [`mass`] - Structural mass computation
//! - [`ids`] - Identifier aliases matching the ids written in model files
//!
//! ## Usage
//!
//! ```ignore
//! use stratopt::core::models::model::StructuralModel;
//!
//! let (model, _) = BdfFile::read_from_path("wing.bdf")?;
//! for property in model.properties_iter() {
//!     println!("{} {:?}", property.card_name(), property.tunable_value());
//! }
//! let mass = model.mass()?;
//! ```

pub mod element;
pub mod ids;
pub mod mass;
pub mod model;
pub mod property;
