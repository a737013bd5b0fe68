use super::ids::{ElementId, NodeId, PropertyId};

/// Classifies the element cards the optimizer understands.
///
/// Only the kinds that contribute to structural mass or that carry a result
/// table are distinguished; every other card is kept as [`ElementKind::Other`]
/// so that it can still be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Four-noded shell (`CQUAD4`).
    Quad4,
    /// Three-noded shell (`CTRIA3`).
    Tria3,
    /// Two-noded beam (`CBAR`).
    Bar,
    /// Generalized spring/damper (`CBUSH`), massless.
    Bush,
    /// Concentrated point mass (`CONM2`).
    ConcentratedMass,
    /// Any other element card, identified by its card name.
    Other(String),
}

impl ElementKind {
    pub fn from_card(name: &str) -> Self {
        match name {
            "CQUAD4" => Self::Quad4,
            "CTRIA3" => Self::Tria3,
            "CBAR" => Self::Bar,
            "CBUSH" => Self::Bush,
            "CONM2" => Self::ConcentratedMass,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn card_name(&self) -> &str {
        match self {
            Self::Quad4 => "CQUAD4",
            Self::Tria3 => "CTRIA3",
            Self::Bar => "CBAR",
            Self::Bush => "CBUSH",
            Self::ConcentratedMass => "CONM2",
            Self::Other(name) => name,
        }
    }

    /// Number of grid points the card references in its leading node fields.
    pub fn node_count(&self) -> Option<usize> {
        match self {
            Self::Quad4 => Some(4),
            Self::Tria3 => Some(3),
            Self::Bar | Self::Bush => Some(2),
            Self::ConcentratedMass => Some(1),
            Self::Other(_) => None,
        }
    }
}

/// A single element of the structural model.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    /// Referenced property, absent for `CONM2` and unrecognized cards.
    pub property_id: Option<PropertyId>,
    /// Ordered node references.
    pub nodes: Vec<NodeId>,
    /// Lumped mass carried by a `CONM2`.
    pub point_mass: Option<f64>,
}

impl Element {
    pub fn new(id: ElementId, kind: ElementKind, property_id: Option<PropertyId>, nodes: Vec<NodeId>) -> Self {
        Self {
            id,
            kind,
            property_id,
            nodes,
            point_mass: None,
        }
    }

    pub fn point_mass(id: ElementId, node: NodeId, mass: f64) -> Self {
        Self {
            id,
            kind: ElementKind::ConcentratedMass,
            property_id: None,
            nodes: vec![node],
            point_mass: Some(mass),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_card_round_trips_known_names() {
        for name in ["CQUAD4", "CTRIA3", "CBAR", "CBUSH", "CONM2"] {
            assert_eq!(ElementKind::from_card(name).card_name(), name);
        }
    }

    #[test]
    fn unknown_cards_are_kept_as_other() {
        let kind = ElementKind::from_card("CHEXA");
        assert_eq!(kind, ElementKind::Other("CHEXA".to_string()));
        assert_eq!(kind.node_count(), None);
    }

    #[test]
    fn point_mass_constructor_sets_mass_and_node() {
        let element = Element::point_mass(900, 12, 3.5);
        assert_eq!(element.kind, ElementKind::ConcentratedMass);
        assert_eq!(element.nodes, vec![12]);
        assert_eq!(element.point_mass, Some(3.5));
        assert!(element.property_id.is_none());
    }
}
