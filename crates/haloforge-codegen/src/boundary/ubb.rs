use haloforge_ir::Stencil;

use super::{neighborhood_stencil_info, AdditionalData, StencilInfoEntry};
use crate::error::Result;

const VELOCITY_CALLBACK: &str =
    "std::function<Vector3<real_t>(const Cell &, const shared_ptr<StructuredBlockForest>&, IBlock&)>";

/// Velocity bounce-back: stores the wall velocity of each boundary link,
/// obtained from a user callback when the index list is filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VelocityHandler {
    stencil: Stencil,
    dim: usize,
}

impl VelocityHandler {
    /// Create the handler for a lattice of `stencil`'s dimension.
    pub fn new(stencil: &Stencil) -> Self {
        Self {
            stencil: Stencil::neighborhood_ordered(stencil.dim()),
            dim: stencil.dim(),
        }
    }
}

impl AdditionalData for VelocityHandler {
    fn constructor_arguments(&self) -> String {
        format!(", {}& velocityCallback ", VELOCITY_CALLBACK)
    }

    fn initialiser_list(&self) -> String {
        "elementInitaliser(velocityCallback),".to_string()
    }

    fn additional_arguments_for_fill_function(&self) -> String {
        "blocks, ".to_string()
    }

    fn additional_parameters_for_fill_function(&self) -> String {
        " const shared_ptr<StructuredBlockForest> &blocks, ".to_string()
    }

    fn additional_member_variable(&self) -> String {
        format!("{} elementInitaliser; ", VELOCITY_CALLBACK)
    }

    fn data_initialisation(&self, _direction: usize) -> Result<String> {
        let mut lines = vec![
            "Vector3<real_t> InitialisatonAdditionalData = elementInitaliser(Cell(it.x(), it.y(), it.z()), blocks, *block);"
                .to_string(),
        ];
        for axis in 0..self.dim {
            lines.push(format!(
                "element.vel_{axis} = InitialisatonAdditionalData[{axis}];",
                axis = axis
            ));
        }
        Ok(lines.join("\n"))
    }

    fn stencil_info(&self) -> Vec<StencilInfoEntry> {
        neighborhood_stencil_info(&self.stencil)
    }
}
