use super::element::{Element, ElementKind};
use super::ids::{ElementId, MaterialId, NodeId, PropertyId};
use super::model::StructuralModel;
use super::property::PropertyData;
use nalgebra::Point3;
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MassError {
    #[error("Element {element} references missing node {node}")]
    MissingNode { element: ElementId, node: NodeId },
    #[error("Element {element} references missing property {property}")]
    MissingProperty {
        element: ElementId,
        property: PropertyId,
    },
    #[error("Property {property} references missing material {material}")]
    MissingMaterial {
        property: PropertyId,
        material: MaterialId,
    },
    #[error("Cross-section '{section}' of property {property} has no area formula")]
    UnsupportedSection { property: PropertyId, section: String },
    #[error("Cross-section '{section}' of property {property} needs {expected} dimensions")]
    MissingDimensions {
        property: PropertyId,
        section: String,
        expected: usize,
    },
}

impl StructuralModel {
    /// Computes the total structural mass of the model.
    ///
    /// Shells contribute `area * (rho * t + nsm)`, composites `area * (sum(rho_i * t_i) + nsm)`,
    /// bars `length * (rho * A + nsm)`, and `CONM2` cards their lumped mass. Elements whose
    /// property is not one of the understood kinds contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`MassError`] when a reference cannot be resolved or a bar cross-section
    /// has no area formula.
    pub fn mass(&self) -> Result<f64, MassError> {
        let mut total = 0.0;
        for element in self.elements_iter() {
            total += self.element_mass(element)?;
        }
        Ok(total)
    }

    fn element_mass(&self, element: &Element) -> Result<f64, MassError> {
        let measure = match element.kind {
            ElementKind::ConcentratedMass => return Ok(element.point_mass.unwrap_or(0.0)),
            ElementKind::Quad4 => {
                let [a, b, c, d] = self.corner_points::<4>(element)?;
                triangle_area(&a, &b, &c) + triangle_area(&a, &c, &d)
            }
            ElementKind::Tria3 => {
                let [a, b, c] = self.corner_points::<3>(element)?;
                triangle_area(&a, &b, &c)
            }
            ElementKind::Bar => {
                let [a, b] = self.corner_points::<2>(element)?;
                nalgebra::distance(&a, &b)
            }
            ElementKind::Bush | ElementKind::Other(_) => return Ok(0.0),
        };

        let Some(property_id) = element.property_id else {
            return Ok(0.0);
        };
        let property = self
            .property(property_id)
            .ok_or(MassError::MissingProperty {
                element: element.id,
                property: property_id,
            })?;

        let per_measure = match &property.data {
            PropertyData::Shell {
                material_id,
                thickness,
                nsm,
            } => self.density(property_id, *material_id)? * thickness + nsm,
            PropertyData::Composite { plies, nsm } => {
                let mut areal = *nsm;
                for ply in plies {
                    areal += self.density(property_id, ply.material_id)? * ply.thickness;
                }
                areal
            }
            PropertyData::BarSection {
                material_id,
                section,
                dimensions,
                nsm,
            } => {
                let area = section_area(property_id, section, dimensions)?;
                self.density(property_id, *material_id)? * area + nsm
            }
            PropertyData::Unsupported { .. } => 0.0,
        };

        Ok(measure * per_measure)
    }

    fn corner_points<const N: usize>(
        &self,
        element: &Element,
    ) -> Result<[Point3<f64>; N], MassError> {
        let mut points = [Point3::origin(); N];
        for (slot, node_id) in points.iter_mut().zip(element.nodes.iter()) {
            *slot = *self.node(*node_id).ok_or(MassError::MissingNode {
                element: element.id,
                node: *node_id,
            })?;
        }
        Ok(points)
    }

    fn density(&self, property: PropertyId, material: MaterialId) -> Result<f64, MassError> {
        self.material(material)
            .map(|m| m.density)
            .ok_or(MassError::MissingMaterial { property, material })
    }
}

fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    0.5 * (b - a).cross(&(c - a)).norm()
}

/// Cross-sectional area of a `PBARL` section.
pub fn section_area(
    property: PropertyId,
    section: &str,
    dimensions: &[f64],
) -> Result<f64, MassError> {
    let need = |expected: usize| -> Result<(), MassError> {
        if dimensions.len() < expected {
            return Err(MassError::MissingDimensions {
                property,
                section: section.to_string(),
                expected,
            });
        }
        Ok(())
    };

    let d = |i: usize| dimensions[i];

    let area = match section {
        "ROD" => {
            need(1)?;
            PI * d(0).powi(2)
        }
        "TUBE" => {
            need(2)?;
            PI * (d(0).powi(2) - d(1).powi(2))
        }
        "TUBE2" => {
            // Outer radius and wall thickness.
            need(2)?;
            PI * (d(0).powi(2) - (d(0) - d(1)).powi(2))
        }
        "BAR" => {
            need(2)?;
            d(0) * d(1)
        }
        "HEXA" => {
            // Corner length, width, height: a rectangle less four corner triangles.
            need(3)?;
            d(2) * (d(1) - d(0))
        }
        "BOX" => {
            // Width, height, side wall thickness, top/bottom wall thickness.
            need(4)?;
            d(0) * d(1) - (d(0) - 2.0 * d(2)) * (d(1) - 2.0 * d(3))
        }
        "CHAN" => {
            // Flange width, depth, web thickness, flange thickness.
            need(4)?;
            2.0 * d(0) * d(3) + (d(1) - 2.0 * d(3)) * d(2)
        }
        "CHAN1" | "I1" | "Z" => {
            // Flange overhang, web thickness, clear web depth, total depth.
            need(4)?;
            (d(3) - d(2)) * (d(0) + d(1)) + d(2) * d(1)
        }
        "CHAN2" => {
            // Leg thickness, base thickness, total height, base width.
            need(4)?;
            d(1) * d(3) + 2.0 * d(0) * (d(2) - d(1))
        }
        "CROSS" | "H" => {
            need(4)?;
            d(0) * d(3) + d(1) * d(2)
        }
        "HAT" => {
            // Height, thickness, top width, foot width. Webs run from the base
            // to the underside of the top.
            need(4)?;
            let t = d(1);
            t * d(2) + 2.0 * t * (d(0) - t) + 2.0 * t * d(3)
        }
        "L" | "T" | "T2" => {
            // Flange width, total height, flange thickness, web thickness.
            need(4)?;
            d(0) * d(2) + (d(1) - d(2)) * d(3)
        }
        "T1" => {
            need(4)?;
            d(0) * d(2) + d(3) * d(1)
        }
        "HAT1" => {
            // Total width, total height, top width, hat thickness, base plate thickness.
            need(5)?;
            let (width, height, t, base) = (d(0), d(1), d(3), d(4));
            width * base + width * t + 2.0 * t * (height - base - 2.0 * t)
        }
        "BOX1" => {
            // Width, height, then top, bottom, left and right wall thicknesses.
            need(6)?;
            d(0) * d(1) - (d(0) - d(4) - d(5)) * (d(1) - d(2) - d(3))
        }
        "I" => {
            // DIM1 depth, DIM2/DIM3 flange widths, DIM4 web, DIM5/DIM6 flange thicknesses.
            need(6)?;
            let (depth, w_bottom, w_top, t_web, t_bottom, t_top) =
                (d(0), d(1), d(2), d(3), d(4), d(5));
            w_bottom * t_bottom + w_top * t_top + (depth - t_bottom - t_top) * t_web
        }
        "DBOX" => {
            // Width, height, first cell width to the middle wall, left, middle and
            // right wall thicknesses, then top/bottom thicknesses of each cell.
            need(10)?;
            let (width, height, cell) = (d(0), d(1), d(2));
            let first = (cell - d(3)) * (height - d(6) - d(7));
            let second = (width - cell - d(4) - d(5)) * (height - d(8) - d(9));
            width * height - first - second
        }
        other => {
            return Err(MassError::UnsupportedSection {
                property,
                section: other.to_string(),
            });
        }
    };
    Ok(area)
}
