/// Identifier of a grid point, as written in the model file.
pub type NodeId = u32;
/// Identifier of an element, as written in the model file.
pub type ElementId = u32;
/// Identifier of a property card, as written in the model file.
pub type PropertyId = u32;
/// Identifier of a material card, as written in the model file.
pub type MaterialId = u32;
