use super::config::ResponseSpec;
use super::error::TrialError;
use crate::core::results::set::ResultSet;

/// Pulls the configured response values out of a result set.
///
/// The load case is discovered on the first successful extraction and reused for every
/// later trial of the run.
#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    spec: ResponseSpec,
    load_case: Option<u32>,
}

impl ResponseExtractor {
    pub fn new(spec: ResponseSpec) -> Self {
        Self {
            spec,
            load_case: None,
        }
    }

    pub fn load_case(&self) -> Option<u32> {
        self.load_case
    }

    /// Returns one value per configured entity, in configuration order.
    pub fn extract(&mut self, results: &ResultSet) -> Result<Vec<f64>, TrialError> {
        let load_case = match self.load_case {
            Some(id) => id,
            None => results
                .first_load_case()
                .ok_or(TrialError::NoLoadCases)?,
        };
        let tables = results
            .load_case(load_case)
            .ok_or(TrialError::MissingLoadCase { load_case })?;
        let table = tables.table(self.spec.kind);
        let axes = self.spec.component.axes();

        let values = self
            .spec
            .entity_ids
            .iter()
            .map(|&id| {
                let row = table.get(&id).ok_or(TrialError::MissingEntity {
                    kind: self.spec.kind,
                    id,
                })?;
                Ok(match axes {
                    [axis] => row[*axis],
                    _ => axes.iter().map(|&a| row[a] * row[a]).sum::<f64>().sqrt(),
                })
            })
            .collect::<Result<Vec<_>, TrialError>>()?;

        self.load_case = Some(load_case);
        Ok(values)
    }
}
