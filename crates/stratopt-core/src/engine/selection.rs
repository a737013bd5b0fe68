use super::config::ConfigError;
use crate::core::models::ids::PropertyId;
use std::collections::BTreeSet;
use tracing::warn;

/// Outcome of resolving a property selection expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Selected ids, deduplicated and ascending.
    pub ids: BTreeSet<PropertyId>,
    /// Explicitly listed ids that do not exist in the model.
    pub missing: Vec<PropertyId>,
}

fn parse_id(token: &str, whole: &str) -> Result<PropertyId, ConfigError> {
    token
        .trim()
        .parse::<PropertyId>()
        .map_err(|_| ConfigError::InvalidSelection {
            token: whole.to_string(),
        })
}

/// Resolves a selection expression against the ids present in the model.
///
/// The expression is either `all` (any case) or a comma-separated list of ids and
/// inclusive `start-end` ranges. Ranges select only ids that exist; an explicit id that
/// does not exist is dropped and reported in [`Resolution::missing`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSelection`] for an empty or non-numeric token.
pub fn resolve(expression: &str, all_ids: &[PropertyId]) -> Result<Resolution, ConfigError> {
    let expression = expression.trim().to_ascii_lowercase();
    let known: BTreeSet<PropertyId> = all_ids.iter().copied().collect();

    if expression == "all" {
        return Ok(Resolution {
            ids: known,
            missing: Vec::new(),
        });
    }

    let mut resolution = Resolution::default();
    for part in expression.split(',').map(str::trim) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_id(start, part)?;
                let end = parse_id(end, part)?;
                if start <= end {
                    resolution.ids.extend(known.range(start..=end));
                }
            }
            None => {
                let id = parse_id(part, part)?;
                if known.contains(&id) {
                    resolution.ids.insert(id);
                } else {
                    warn!(property = id, "Property not found in model");
                    resolution.missing.push(id);
                }
            }
        }
    }
    Ok(resolution)
}
