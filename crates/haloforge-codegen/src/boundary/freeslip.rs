use haloforge_ir::Stencil;

use super::{neighborhood_stencil_info, AdditionalData, StencilInfoEntry};
use crate::error::{CodegenError, Result};

const AXES: [&str; 3] = ["x", "y", "z"];

/// Free-slip reflection: stores the mirrored reference direction and the
/// discrete wall normal of each boundary link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeSlipHandler {
    stencil: Stencil,
    dim: usize,
    mirrored: Vec<Vec<usize>>,
}

impl FreeSlipHandler {
    /// Create the handler for a lattice of `stencil`'s dimension.
    pub fn new(stencil: &Stencil) -> Self {
        let dim = stencil.dim();
        let ordered = Stencil::neighborhood_ordered(dim);
        let mirrored = (0..dim)
            .map(|axis| {
                ordered
                    .iter()
                    .map(|d| ordered.index_of(&d.mirrored(axis)).unwrap_or(0))
                    .collect()
            })
            .collect();
        Self {
            stencil: ordered,
            dim,
            mirrored,
        }
    }

    /// Index of the direction mirrored along `axis`, per direction.
    pub fn mirror_table(&self, axis: usize) -> Option<&[usize]> {
        self.mirrored.get(axis).map(Vec::as_slice)
    }
}

impl AdditionalData for FreeSlipHandler {
    fn constructor_arguments(&self) -> String {
        String::new()
    }

    fn initialiser_list(&self) -> String {
        String::new()
    }

    fn additional_arguments_for_fill_function(&self) -> String {
        String::new()
    }

    fn additional_parameters_for_fill_function(&self) -> String {
        String::new()
    }

    fn additional_member_variable(&self) -> String {
        String::new()
    }

    fn data_initialisation(&self, direction: usize) -> Result<String> {
        let offset = self.stencil.get(direction).ok_or_else(|| {
            CodegenError::InvalidInput(format!(
                "direction index {} out of range for a stencil of {} directions",
                direction,
                self.stencil.len()
            ))
        })?;
        let inv = offset.inverse();
        let ref_dir = self
            .stencil
            .index_of(&inv)
            .ok_or_else(|| CodegenError::DirectionNotInStencil(inv.clone()))?;
        let o = offset.padded3();
        let n = inv.padded3();

        let mut lines: Vec<String> = self
            .mirrored
            .iter()
            .zip(AXES)
            .map(|(table, axis)| {
                let content = table
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                format!(
                    "const int32_t {}_axis_mirrored_stencil_dir [] = {{ {} }};",
                    axis, content
                )
            })
            .collect();

        lines.push(format!(
            "const Cell n = it.cell() + Cell({}, {}, {});",
            o[0], o[1], o[2]
        ));
        lines.push(format!("int32_t ref_dir = {}; // dir: {}", ref_dir, direction));
        lines.push("element.wnx = 0; // compute discrete normal vector of free slip wall".into());
        lines.push("element.wny = 0;".into());
        lines.push(format!(
            "if( flagField->isPartOfMaskSet( n.x() + {}, n.y(), n.z(), domainFlag ) )",
            n[0]
        ));
        lines.push("{".into());
        lines.push(format!("   element.wnx = {};", n[0]));
        lines.push("   ref_dir = x_axis_mirrored_stencil_dir[ ref_dir ];".into());
        lines.push("}".into());
        lines.push(format!(
            "if( flagField->isPartOfMaskSet( n.x(), n.y() + {}, n.z(), domainFlag ) )",
            n[1]
        ));
        lines.push("{".into());
        lines.push(format!("   element.wny = {};", n[1]));
        lines.push("   ref_dir = y_axis_mirrored_stencil_dir[ ref_dir ];".into());
        lines.push("}".into());

        if self.dim == 3 {
            lines.push("element.wnz = 0;".into());
            lines.push(format!(
                "if( flagField->isPartOfMaskSet( n.x(), n.y(), n.z() + {}, domainFlag ) )",
                n[2]
            ));
            lines.push("{".into());
            lines.push(format!("   element.wnz = {};", n[2]));
            lines.push("   ref_dir = z_axis_mirrored_stencil_dir[ ref_dir ];".into());
            lines.push("}".into());
            lines.push("// concave corner (neighbors are non-fluid)".into());
            lines.push("if( element.wnx == 0 && element.wny == 0 && element.wnz == 0 )".into());
            lines.push("{".into());
            lines.push(format!("   element.wnx = {};", n[0]));
            lines.push(format!("   element.wny = {};", n[1]));
            lines.push(format!("   element.wnz = {};", n[2]));
            lines.push(format!("   ref_dir = {};", direction));
            lines.push("}".into());
        } else {
            lines.push("// concave corner (neighbors are non-fluid)".into());
            lines.push("if( element.wnx == 0 && element.wny == 0 )".into());
            lines.push("{".into());
            lines.push(format!("   element.wnx = {};", n[0]));
            lines.push(format!("   element.wny = {};", n[1]));
            lines.push(format!("   ref_dir = {};", direction));
            lines.push("}".into());
        }
        lines.push("element.ref_dir = ref_dir;".into());
        Ok(lines.join("\n"))
    }

    fn stencil_info(&self) -> Vec<StencilInfoEntry> {
        neighborhood_stencil_info(&self.stencil)
    }
}
