//! Streaming patterns and their pdf accessors.

use haloforge_ir::{Direction, Stencil};
use serde::{Deserialize, Serialize};

use crate::error::{CodegenError, Result};

/// How populations move between neighboring cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingPattern {
    /// Read from neighbors, write to the center of a second field.
    #[default]
    Pull,
    /// Read from the center, write to neighbors of a second field.
    Push,
    /// In-place AA pattern alternating between even and odd steps.
    Aa,
}

/// Time step parity of in-place patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timestep {
    /// Even step.
    #[default]
    Even,
    /// Odd step.
    Odd,
}

fn direction_at(stencil: &Stencil, index: usize) -> Result<&Direction> {
    stencil.get(index).ok_or_else(|| {
        CodegenError::InvalidInput(format!(
            "direction index {} out of range for a stencil of {} directions",
            index,
            stencil.len()
        ))
    })
}

fn inverse_at(stencil: &Stencil, index: usize) -> Result<usize> {
    let d = direction_at(stencil, index)?;
    stencil
        .inverse_index(index)
        .ok_or_else(|| CodegenError::DirectionNotInStencil(d.inverse()))
}

impl StreamingPattern {
    /// Offset and component population `index` is read from before collision.
    pub fn in_access(
        &self,
        timestep: Timestep,
        stencil: &Stencil,
        index: usize,
    ) -> Result<(Direction, usize)> {
        let d = direction_at(stencil, index)?;
        let zero = Direction::zero(stencil.dim());
        Ok(match (self, timestep) {
            (StreamingPattern::Pull, _) => (d.inverse(), index),
            (StreamingPattern::Push, _) | (StreamingPattern::Aa, Timestep::Even) => (zero, index),
            (StreamingPattern::Aa, Timestep::Odd) => (d.inverse(), inverse_at(stencil, index)?),
        })
    }

    /// Offset and component post-collision population `index` is written to.
    pub fn out_access(
        &self,
        timestep: Timestep,
        stencil: &Stencil,
        index: usize,
    ) -> Result<(Direction, usize)> {
        let d = direction_at(stencil, index)?;
        let zero = Direction::zero(stencil.dim());
        Ok(match (self, timestep) {
            (StreamingPattern::Pull, _) => (zero, index),
            (StreamingPattern::Push, _) | (StreamingPattern::Aa, Timestep::Odd) => (d.clone(), index),
            (StreamingPattern::Aa, Timestep::Even) => (zero, inverse_at(stencil, index)?),
        })
    }
}
