use haloforge_ir::{Direction, Stencil};

use super::{AdditionalData, StencilInfoEntry, StreamingPattern, Timestep};
use crate::config::Target;
use crate::error::{CodegenError, Result};

const POSITION: [&str; 3] = ["it.x()", "it.y()", "it.z()"];

/// Extrapolation outflow: stores the populations next to the outflow wall
/// from which the outgoing ones are extrapolated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutflowHandler {
    stencil: Stencil,
    normal: Direction,
    streaming_pattern: StreamingPattern,
    timestep: Timestep,
    field_name: String,
    target: Target,
}

impl OutflowHandler {
    /// Create the handler; the normal must be nonzero along exactly one axis.
    pub fn new(
        stencil: &Stencil,
        normal: &[i32],
        streaming_pattern: StreamingPattern,
        timestep: Timestep,
        field_name: &str,
        target: Target,
    ) -> Result<Self> {
        let normal = Direction::try_from_slice(normal)?;
        if normal.nonzero_axes() != 1 {
            return Err(CodegenError::NonPlanarOutflow(normal));
        }
        if normal.dim() != stencil.dim() {
            return Err(CodegenError::InvalidInput(format!(
                "outflow normal {} does not match the {}D stencil",
                normal,
                stencil.dim()
            )));
        }
        Ok(Self {
            stencil: stencil.clone(),
            normal,
            streaming_pattern,
            timestep,
            field_name: field_name.to_string(),
            target,
        })
    }

    fn dim(&self) -> usize {
        self.stencil.dim()
    }

    /// Offset from the wall normal to the stencil direction at `index`.
    pub fn tangential_offset(&self, index: usize) -> Result<Direction> {
        let direction = self.stencil.get(index).ok_or_else(|| {
            CodegenError::InvalidInput(format!(
                "direction index {} out of range for a stencil of {} directions",
                index,
                self.stencil.len()
            ))
        })?;
        Ok(direction.sub(&self.normal))
    }

    /// Accessor arguments (`x, y, z, f`) of the values stored for `index`,
    /// keyed by element member.
    pub fn init_values(&self, index: usize) -> Result<Vec<(String, String)>> {
        let tangential = self.tangential_offset(index)?;
        let inverse = self
            .stencil
            .inverse_index(index)
            .ok_or_else(|| CodegenError::DirectionNotInStencil(tangential.clone()))?;
        let (offset, component) =
            self.streaming_pattern
                .out_access(self.timestep, &self.stencil, inverse)?;

        let mut position: Vec<String> = POSITION
            .iter()
            .take(self.dim())
            .enumerate()
            .map(|(axis, p)| {
                format!(
                    "{} + cell_idx_c({})",
                    p,
                    offset.component(axis) + tangential.component(axis)
                )
            })
            .collect();
        if self.dim() == 2 {
            position.push("0".to_string());
        }
        position.push(component.to_string());
        let position = position.join(", ");

        Ok(vec![
            ("pdf".to_string(), position.clone()),
            ("pdf_nd".to_string(), position),
        ])
    }
}

impl AdditionalData for OutflowHandler {
    fn constructor_arguments(&self) -> String {
        match self.target {
            Target::Gpu => format!(", BlockDataID {}CPUID_", self.field_name),
            Target::Cpu => String::new(),
        }
    }

    fn initialiser_list(&self) -> String {
        match self.target {
            Target::Gpu => format!("{f}CPUID({f}CPUID_),", f = self.field_name),
            Target::Cpu => String::new(),
        }
    }

    fn additional_arguments_for_fill_function(&self) -> String {
        String::new()
    }

    fn additional_parameters_for_fill_function(&self) -> String {
        String::new()
    }

    fn additional_member_variable(&self) -> String {
        format!("BlockDataID {}CPUID;", self.field_name)
    }

    fn additional_field_data(&self) -> String {
        let identifier = match self.target {
            Target::Gpu => "CPU",
            Target::Cpu => "",
        };
        format!(
            "auto {f} = block->getData< field::GhostLayerField<real_t, {q}> >({f}{id}ID); ",
            f = self.field_name,
            q = self.stencil.len(),
            id = identifier
        )
    }

    fn data_initialisation(&self, direction: usize) -> Result<String> {
        Ok(self
            .init_values(direction)?
            .into_iter()
            .map(|(key, value)| format!("element.{} = {}->get({});", key, self.field_name, value))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn stencil_info(&self) -> Vec<StencilInfoEntry> {
        self.stencil
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                (0..self.dim()).any(|axis| {
                    let n = self.normal.component(axis);
                    n != 0 && n == d.component(axis)
                })
            })
            .map(|(i, d)| StencilInfoEntry::new(i, d.padded3().to_vec()))
            .collect()
    }
}
