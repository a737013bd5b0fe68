use super::element::Element;
use super::ids::{ElementId, MaterialId, NodeId, PropertyId};
use super::property::Property;
use nalgebra::Point3;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Duplicate {entity} id {id}")]
    DuplicateId { entity: &'static str, id: u32 },
}

/// An isotropic material; only the density takes part in the optimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub id: MaterialId,
    pub density: f64,
}

/// Represents a complete structural model: grid points, elements, properties and materials.
///
/// All collections are keyed by the identifiers found in the model file and are kept
/// ordered, so iteration (and therefore writing and mass summation) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct StructuralModel {
    nodes: BTreeMap<NodeId, Point3<f64>>,
    elements: BTreeMap<ElementId, Element>,
    properties: BTreeMap<PropertyId, Property>,
    materials: BTreeMap<MaterialId, Material>,
}

impl StructuralModel {
    /// Creates a new, empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a grid point.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateId`] if a node with the same id already exists.
    pub fn add_node(&mut self, id: NodeId, position: Point3<f64>) -> Result<(), ModelError> {
        if self.nodes.insert(id, position).is_some() {
            return Err(ModelError::DuplicateId { entity: "node", id });
        }
        Ok(())
    }

    /// Adds an element.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateId`] if an element with the same id already exists.
    pub fn add_element(&mut self, element: Element) -> Result<(), ModelError> {
        let id = element.id;
        if self.elements.insert(id, element).is_some() {
            return Err(ModelError::DuplicateId {
                entity: "element",
                id,
            });
        }
        Ok(())
    }

    /// Adds a property.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateId`] if a property with the same id already exists.
    pub fn add_property(&mut self, property: Property) -> Result<(), ModelError> {
        let id = property.id;
        if self.properties.insert(id, property).is_some() {
            return Err(ModelError::DuplicateId {
                entity: "property",
                id,
            });
        }
        Ok(())
    }

    /// Adds a material.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateId`] if a material with the same id already exists.
    pub fn add_material(&mut self, material: Material) -> Result<(), ModelError> {
        let id = material.id;
        if self.materials.insert(id, material).is_some() {
            return Err(ModelError::DuplicateId {
                entity: "material",
                id,
            });
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Point3<f64>> {
        self.nodes.get(&id)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(&id)
    }

    pub fn property_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        self.properties.get_mut(&id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn nodes_iter(&self) -> impl Iterator<Item = (&NodeId, &Point3<f64>)> {
        self.nodes.iter()
    }

    pub fn elements_iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn properties_iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    /// Returns all property ids in ascending order.
    pub fn property_ids(&self) -> Vec<PropertyId> {
        self.properties.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}
