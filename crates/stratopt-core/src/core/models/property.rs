use super::ids::{MaterialId, PropertyId};
use serde::Serialize;
use std::fmt;

/// The three kinds of tunable attribute the optimizer knows how to scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TunableKind {
    /// Flat scalar: the membrane thickness `T` of a `PSHELL`.
    Shell,
    /// First element of a sequence: the first ply thickness of a `PCOMP`.
    Composite,
    /// First dimension value: `DIM1` of a `PBARL` cross-section.
    BarSection,
}

impl TunableKind {
    pub fn card_name(&self) -> &'static str {
        match self {
            Self::Shell => "PSHELL",
            Self::Composite => "PCOMP",
            Self::BarSection => "PBARL",
        }
    }
}

impl fmt::Display for TunableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.card_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ply {
    pub material_id: MaterialId,
    pub thickness: f64,
    pub theta: f64,
}

/// Parsed payload of a property card.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyData {
    Shell {
        material_id: MaterialId,
        thickness: f64,
        nsm: f64,
    },
    Composite {
        plies: Vec<Ply>,
        nsm: f64,
    },
    BarSection {
        material_id: MaterialId,
        section: String,
        dimensions: Vec<f64>,
        nsm: f64,
    },
    /// A property card that is carried through but never tuned.
    Unsupported { card: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: PropertyId,
    pub data: PropertyData,
}

impl Property {
    pub fn new(id: PropertyId, data: PropertyData) -> Self {
        Self { id, data }
    }

    pub fn card_name(&self) -> &str {
        match &self.data {
            PropertyData::Shell { .. } => "PSHELL",
            PropertyData::Composite { .. } => "PCOMP",
            PropertyData::BarSection { .. } => "PBARL",
            PropertyData::Unsupported { card } => card,
        }
    }

    /// Returns the tunable attribute kind, or `None` when the card cannot be tuned.
    pub fn tunable_kind(&self) -> Option<TunableKind> {
        match &self.data {
            PropertyData::Shell { .. } => Some(TunableKind::Shell),
            PropertyData::Composite { plies, .. } if !plies.is_empty() => {
                Some(TunableKind::Composite)
            }
            PropertyData::BarSection { dimensions, .. } if !dimensions.is_empty() => {
                Some(TunableKind::BarSection)
            }
            _ => None,
        }
    }

    pub fn tunable_value(&self) -> Option<f64> {
        match &self.data {
            PropertyData::Shell { thickness, .. } => Some(*thickness),
            PropertyData::Composite { plies, .. } => plies.first().map(|p| p.thickness),
            PropertyData::BarSection { dimensions, .. } => dimensions.first().copied(),
            PropertyData::Unsupported { .. } => None,
        }
    }

    /// Overwrites the tunable attribute.
    ///
    /// # Return
    ///
    /// Returns `false` if the property has no tunable attribute; the property is left untouched.
    pub fn set_tunable_value(&mut self, value: f64) -> bool {
        match &mut self.data {
            PropertyData::Shell { thickness, .. } => {
                *thickness = value;
                true
            }
            PropertyData::Composite { plies, .. } => match plies.first_mut() {
                Some(ply) => {
                    ply.thickness = value;
                    true
                }
                None => false,
            },
            PropertyData::BarSection { dimensions, .. } => match dimensions.first_mut() {
                Some(dim) => {
                    *dim = value;
                    true
                }
                None => false,
            },
            PropertyData::Unsupported { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite(plies: Vec<f64>) -> Property {
        Property::new(
            2,
            PropertyData::Composite {
                plies: plies
                    .into_iter()
                    .map(|thickness| Ply {
                        material_id: 1,
                        thickness,
                        theta: 0.0,
                    })
                    .collect(),
                nsm: 0.0,
            },
        )
    }

    #[test]
    fn shell_thickness_is_the_tunable_attribute() {
        let mut prop = Property::new(
            1,
            PropertyData::Shell {
                material_id: 1,
                thickness: 2.0,
                nsm: 0.0,
            },
        );
        assert_eq!(prop.tunable_kind(), Some(TunableKind::Shell));
        assert_eq!(prop.tunable_value(), Some(2.0));
        assert!(prop.set_tunable_value(3.0));
        assert_eq!(prop.tunable_value(), Some(3.0));
    }

    #[test]
    fn composite_only_scales_the_first_ply() {
        let mut prop = composite(vec![0.5, 0.25]);
        assert!(prop.set_tunable_value(1.0));
        if let PropertyData::Composite { plies, .. } = &prop.data {
            assert_eq!(plies[0].thickness, 1.0);
            assert_eq!(plies[1].thickness, 0.25);
        } else {
            panic!("expected composite data");
        }
    }

    #[test]
    fn composite_without_plies_is_not_tunable() {
        let mut prop = composite(vec![]);
        assert_eq!(prop.tunable_kind(), None);
        assert!(!prop.set_tunable_value(1.0));
    }

    #[test]
    fn bar_section_tunes_first_dimension() {
        let mut prop = Property::new(
            3,
            PropertyData::BarSection {
                material_id: 1,
                section: "TUBE".into(),
                dimensions: vec![10.0, 8.0],
                nsm: 0.0,
            },
        );
        assert_eq!(prop.tunable_kind(), Some(TunableKind::BarSection));
        assert!(prop.set_tunable_value(12.0));
        assert_eq!(prop.tunable_value(), Some(12.0));
    }

    #[test]
    fn unsupported_cards_report_their_name_and_refuse_updates() {
        let mut prop = Property::new(
            4,
            PropertyData::Unsupported {
                card: "PSOLID".into(),
            },
        );
        assert_eq!(prop.card_name(), "PSOLID");
        assert_eq!(prop.tunable_kind(), None);
        assert!(!prop.set_tunable_value(1.0));
    }
}
