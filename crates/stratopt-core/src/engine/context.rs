use super::cancel::CancellationToken;
use super::config::{ConfigError, OptimizationConfig};
use super::progress::ProgressReporter;
use super::selection;
use crate::core::models::ids::PropertyId;
use crate::core::models::model::StructuralModel;
use crate::core::models::property::TunableKind;
use serde::Serialize;

/// Read-only view shared by every stage of a run.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub config: &'a OptimizationConfig,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: &'a CancellationToken,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a OptimizationConfig,
        reporter: &'a ProgressReporter<'a>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            reporter,
            cancel,
        }
    }
}

/// One design variable: a property whose tunable attribute is scaled by a multiplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TunableParameter {
    pub id: PropertyId,
    pub kind: TunableKind,
    /// Attribute value in the unmutated model.
    pub original: f64,
}

/// Selected properties, split by whether they can be tuned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    /// Ascending by property id; this order defines the parameter vector.
    pub tunable: Vec<TunableParameter>,
    /// Selected properties with no tunable attribute, with their card names.
    pub unsupported: Vec<(PropertyId, String)>,
    /// Explicitly selected ids that are absent from the model.
    pub missing: Vec<PropertyId>,
}

/// Resolves the selection expression against `model` and classifies each selected property.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSelection`] for a malformed expression and
/// [`ConfigError::NoTunableProperties`] if nothing tunable remains.
pub fn resolve_parameters(
    model: &StructuralModel,
    expression: &str,
) -> Result<ParameterSet, ConfigError> {
    let resolution = selection::resolve(expression, &model.property_ids())?;

    let mut set = ParameterSet {
        missing: resolution.missing,
        ..ParameterSet::default()
    };
    for id in resolution.ids {
        let Some(property) = model.property(id) else {
            continue;
        };
        match (property.tunable_kind(), property.tunable_value()) {
            (Some(kind), Some(original)) => set.tunable.push(TunableParameter { id, kind, original }),
            _ => set.unsupported.push((id, property.card_name().to_string())),
        }
    }

    if set.tunable.is_empty() {
        return Err(ConfigError::NoTunableProperties);
    }
    Ok(set)
}
