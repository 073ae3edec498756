//! Boundary additional-data generators.
//!
//! Some boundary conditions store per-link data next to the boundary index
//! list (a mirrored reference direction, a wall velocity, extrapolation
//! sources). A handler produces the C++ fragments a boundary class needs to
//! allocate and initialize that data.

mod freeslip;
mod outflow;
mod streaming;
mod ubb;

use std::fmt;

use haloforge_ir::Stencil;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Target;
use crate::error::{CodegenError, Result};

pub use freeslip::FreeSlipHandler;
pub use outflow::OutflowHandler;
pub use streaming::{StreamingPattern, Timestep};
pub use ubb::VelocityHandler;

/// One direction of a handler's stencil info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StencilInfoEntry {
    /// Index of the direction in the handler's stencil.
    pub index: usize,
    /// Offsets, padded to three components where the handler requires it.
    pub offsets: Vec<i32>,
    /// Offsets joined with `", "`.
    pub offsets_text: String,
}

impl StencilInfoEntry {
    pub(crate) fn new(index: usize, offsets: Vec<i32>) -> Self {
        let offsets_text = offsets
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            index,
            offsets,
            offsets_text,
        }
    }
}

/// Code fragments describing the additional data of a boundary condition.
pub trait AdditionalData {
    /// Extra constructor parameters (with a leading comma).
    fn constructor_arguments(&self) -> String;

    /// Extra member initializers (with a trailing comma).
    fn initialiser_list(&self) -> String;

    /// Extra arguments passed to the index-list fill function.
    fn additional_arguments_for_fill_function(&self) -> String;

    /// Extra parameters declared by the index-list fill function.
    fn additional_parameters_for_fill_function(&self) -> String;

    /// Extra member declaration.
    fn additional_member_variable(&self) -> String;

    /// Statements fetching extra field data inside the fill function.
    fn additional_field_data(&self) -> String {
        String::new()
    }

    /// Statements initializing one index-list element for `direction`.
    fn data_initialisation(&self, direction: usize) -> Result<String>;

    /// Directions the boundary iterates over.
    fn stencil_info(&self) -> Vec<StencilInfoEntry>;
}

/// Boundary conditions known to the generators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Bounce-back wall.
    NoSlip,
    /// Specular reflection at the wall.
    FreeSlip,
    /// Velocity bounce-back with a user-supplied wall velocity.
    Ubb,
    /// Extrapolation outflow through a planar wall.
    ExtrapolationOutflow {
        /// Outward wall normal.
        normal: Vec<i32>,
        /// Streaming pattern of the surrounding kernels.
        #[serde(default)]
        streaming_pattern: StreamingPattern,
        /// Time step the boundary is set up for.
        #[serde(default)]
        timestep: Timestep,
    },
    /// Any other boundary.
    Other {
        /// Class name of the boundary.
        name: String,
        /// The boundary stores per-link data.
        #[serde(default)]
        additional_data: bool,
    },
}

impl BoundaryKind {
    /// Check if the boundary stores per-link data.
    pub fn has_additional_data(&self) -> bool {
        match self {
            BoundaryKind::NoSlip => false,
            BoundaryKind::FreeSlip | BoundaryKind::Ubb => true,
            BoundaryKind::ExtrapolationOutflow { .. } => true,
            BoundaryKind::Other {
                additional_data, ..
            } => *additional_data,
        }
    }

    /// Class name of the boundary.
    pub fn name(&self) -> &str {
        match self {
            BoundaryKind::NoSlip => "NoSlip",
            BoundaryKind::FreeSlip => "FreeSlip",
            BoundaryKind::Ubb => "UBB",
            BoundaryKind::ExtrapolationOutflow { .. } => "ExtrapolationOutflow",
            BoundaryKind::Other { name, .. } => name,
        }
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The additional-data handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionalDataHandler {
    /// Free-slip reflection data.
    FreeSlip(FreeSlipHandler),
    /// Wall velocity data.
    Velocity(VelocityHandler),
    /// Outflow extrapolation data.
    Outflow(OutflowHandler),
}

impl AdditionalDataHandler {
    /// Select the handler of `boundary`.
    ///
    /// Returns `Ok(None)` if the boundary stores no additional data.
    pub fn for_boundary(
        boundary: &BoundaryKind,
        stencil: &Stencil,
        field_name: &str,
        target: Target,
    ) -> Result<Option<Self>> {
        if !boundary.has_additional_data() {
            debug!(boundary = %boundary, "boundary has no additional data");
            return Ok(None);
        }
        let handler = match boundary {
            BoundaryKind::FreeSlip => Self::FreeSlip(FreeSlipHandler::new(stencil)),
            BoundaryKind::Ubb => Self::Velocity(VelocityHandler::new(stencil)),
            BoundaryKind::ExtrapolationOutflow {
                normal,
                streaming_pattern,
                timestep,
            } => Self::Outflow(OutflowHandler::new(
                stencil,
                normal,
                *streaming_pattern,
                *timestep,
                field_name,
                target,
            )?),
            other => {
                return Err(CodegenError::NoHandlerForBoundaryKind(
                    other.name().to_string(),
                ))
            }
        };
        debug!(boundary = %boundary, dim = stencil.dim(), "selected additional data handler");
        Ok(Some(handler))
    }

    fn inner(&self) -> &dyn AdditionalData {
        match self {
            Self::FreeSlip(h) => h,
            Self::Velocity(h) => h,
            Self::Outflow(h) => h,
        }
    }
}

impl AdditionalData for AdditionalDataHandler {
    fn constructor_arguments(&self) -> String {
        self.inner().constructor_arguments()
    }

    fn initialiser_list(&self) -> String {
        self.inner().initialiser_list()
    }

    fn additional_arguments_for_fill_function(&self) -> String {
        self.inner().additional_arguments_for_fill_function()
    }

    fn additional_parameters_for_fill_function(&self) -> String {
        self.inner().additional_parameters_for_fill_function()
    }

    fn additional_member_variable(&self) -> String {
        self.inner().additional_member_variable()
    }

    fn additional_field_data(&self) -> String {
        self.inner().additional_field_data()
    }

    fn data_initialisation(&self, direction: usize) -> Result<String> {
        self.inner().data_initialisation(direction)
    }

    fn stencil_info(&self) -> Vec<StencilInfoEntry> {
        self.inner().stencil_info()
    }
}

/// Default stencil info: the neighbor-order stencil as-is.
pub(crate) fn neighborhood_stencil_info(stencil: &Stencil) -> Vec<StencilInfoEntry> {
    stencil
        .iter()
        .enumerate()
        .map(|(i, d)| StencilInfoEntry::new(i, d.offsets().to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection() {
        let s = Stencil::d3q19();
        let none = AdditionalDataHandler::for_boundary(&BoundaryKind::NoSlip, &s, "pdfs", Target::Cpu)
            .unwrap();
        assert!(none.is_none());

        let fs = AdditionalDataHandler::for_boundary(&BoundaryKind::FreeSlip, &s, "pdfs", Target::Cpu)
            .unwrap();
        assert!(matches!(fs, Some(AdditionalDataHandler::FreeSlip(_))));

        let ubb = AdditionalDataHandler::for_boundary(&BoundaryKind::Ubb, &s, "pdfs", Target::Cpu)
            .unwrap();
        assert!(matches!(ubb, Some(AdditionalDataHandler::Velocity(_))));
    }

    #[test]
    fn test_unknown_kind() {
        let kind = BoundaryKind::Other {
            name: "SimpleExtrapolation".into(),
            additional_data: true,
        };
        let err = AdditionalDataHandler::for_boundary(&kind, &Stencil::d2q9(), "pdfs", Target::Cpu)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No default additional data handler available for boundary of type SimpleExtrapolation"
        );

        let plain = BoundaryKind::Other {
            name: "Custom".into(),
            additional_data: false,
        };
        assert!(AdditionalDataHandler::for_boundary(&plain, &Stencil::d2q9(), "pdfs", Target::Cpu)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_kind_from_toml() {
        #[derive(Deserialize)]
        struct Job {
            boundary: BoundaryKind,
        }
        let job: Job = toml::from_str(
            r#"
            [boundary]
            type = "extrapolation_outflow"
            normal = [1, 0, 0]
            streaming_pattern = "aa"
            "#,
        )
        .unwrap();
        assert_eq!(
            job.boundary,
            BoundaryKind::ExtrapolationOutflow {
                normal: vec![1, 0, 0],
                streaming_pattern: StreamingPattern::Aa,
                timestep: Timestep::Even,
            }
        );
    }
}
