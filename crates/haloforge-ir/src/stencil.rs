//! Stencils: ordered, symmetric sets of neighbor directions.

use serde::Serialize;

use crate::{Direction, IrError, IrResult};

const D2Q9: [[i32; 2]; 9] = [
    [0, 0],
    [0, 1],
    [0, -1],
    [-1, 0],
    [1, 0],
    [-1, 1],
    [1, 1],
    [-1, -1],
    [1, -1],
];

// C N S W E T B NW NE SW SE TN TS TW TE BN BS BW BE TNE TNW TSE TSW BNE BNW BSE BSW
const D3Q27: [[i32; 3]; 27] = [
    [0, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [-1, 0, 0],
    [1, 0, 0],
    [0, 0, 1],
    [0, 0, -1],
    [-1, 1, 0],
    [1, 1, 0],
    [-1, -1, 0],
    [1, -1, 0],
    [0, 1, 1],
    [0, -1, 1],
    [-1, 0, 1],
    [1, 0, 1],
    [0, 1, -1],
    [0, -1, -1],
    [-1, 0, -1],
    [1, 0, -1],
    [1, 1, 1],
    [-1, 1, 1],
    [1, -1, 1],
    [-1, -1, 1],
    [1, 1, -1],
    [-1, 1, -1],
    [1, -1, -1],
    [-1, -1, -1],
];

/// An ordered, fixed sequence of neighbor directions.
///
/// Invariants (checked by [`Stencil::new`]): all directions share one
/// dimension (2 or 3), no direction repeats and every direction's inverse is
/// present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stencil {
    name: Option<String>,
    directions: Vec<Direction>,
}

impl Stencil {
    /// Create an unnamed stencil, validating its invariants.
    pub fn new(directions: Vec<Direction>) -> IrResult<Self> {
        Self::validate(&directions)?;
        Ok(Self {
            name: None,
            directions,
        })
    }

    /// Create a named stencil, validating its invariants.
    pub fn named(name: impl Into<String>, directions: Vec<Direction>) -> IrResult<Self> {
        let mut stencil = Self::new(directions)?;
        stencil.name = Some(name.into());
        Ok(stencil)
    }

    fn validate(directions: &[Direction]) -> IrResult<()> {
        let first = directions.first().ok_or(IrError::EmptyStencil)?;
        let dim = first.dim();
        if dim != 2 && dim != 3 {
            return Err(IrError::UnsupportedStencilDimension(dim));
        }
        for (i, d) in directions.iter().enumerate() {
            if d.dim() != dim {
                return Err(IrError::DimensionMismatch {
                    expected: dim,
                    actual: d.dim(),
                    direction: d.clone(),
                });
            }
            if directions[..i].contains(d) {
                return Err(IrError::DuplicateDirection(d.clone()));
            }
        }
        for d in directions {
            if !directions.contains(&d.inverse()) {
                return Err(IrError::AsymmetricStencil(d.clone()));
            }
        }
        Ok(())
    }

    fn from_table<const D: usize>(name: &str, table: &[[i32; D]], keep: usize) -> Self {
        Self {
            name: Some(name.to_string()),
            directions: table
                .iter()
                .take(keep)
                .map(|offsets| Direction::from_offsets(offsets.to_vec()))
                .collect(),
        }
    }

    /// D2Q9 lattice stencil.
    pub fn d2q9() -> Self {
        Self::from_table("D2Q9", &D2Q9, 9)
    }

    /// D3Q7 lattice stencil (center plus faces).
    pub fn d3q7() -> Self {
        Self::from_table("D3Q7", &D3Q27, 7)
    }

    /// D3Q15 lattice stencil (center, faces and corners).
    pub fn d3q15() -> Self {
        let mut stencil = Self::from_table("D3Q15", &D3Q27, 7);
        stencil.directions.extend(
            D3Q27[19..]
                .iter()
                .map(|offsets| Direction::from(*offsets)),
        );
        stencil
    }

    /// D3Q19 lattice stencil (center, faces and edges).
    pub fn d3q19() -> Self {
        Self::from_table("D3Q19", &D3Q27, 19)
    }

    /// D3Q27 lattice stencil (full first neighborhood).
    pub fn d3q27() -> Self {
        Self::from_table("D3Q27", &D3Q27, 27)
    }

    /// Look up a builtin stencil by name (case-insensitive).
    pub fn by_name(name: &str) -> IrResult<Self> {
        match name.to_uppercase().as_str() {
            "D2Q9" => Ok(Self::d2q9()),
            "D3Q7" => Ok(Self::d3q7()),
            "D3Q15" => Ok(Self::d3q15()),
            "D3Q19" => Ok(Self::d3q19()),
            "D3Q27" => Ok(Self::d3q27()),
            _ => Err(IrError::UnknownStencil(name.to_string())),
        }
    }

    /// Full first neighborhood in the block framework's direction order
    /// (C N S W E T B NW NE SW SE ... BSW); 2D omits top and bottom.
    pub fn neighborhood_ordered(dim: usize) -> Self {
        if dim == 2 {
            Self::from_table("D2Q9", &D2Q9, 9)
        } else {
            Self::from_table("D3Q27", &D3Q27, 27)
        }
    }

    /// Every offset in {-1, 0, 1}^dim in row-major order, zero included.
    pub fn full_neighborhood(dim: usize) -> Self {
        let dim = dim.clamp(2, 3);
        let mut directions = Vec::new();
        let range = -1..=1;
        for x in range.clone() {
            for y in range.clone() {
                if dim == 2 {
                    directions.push(Direction::from([x, y]));
                    continue;
                }
                for z in range.clone() {
                    directions.push(Direction::from([x, y, z]));
                }
            }
        }
        Self {
            name: None,
            directions,
        }
    }

    /// Stencil name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Spatial dimension.
    pub fn dim(&self) -> usize {
        self.directions.first().map(Direction::dim).unwrap_or(0)
    }

    /// Number of directions (Q).
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// Check if the stencil has no directions.
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// Directions in stencil order.
    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Iterate over directions in stencil order.
    pub fn iter(&self) -> std::slice::Iter<'_, Direction> {
        self.directions.iter()
    }

    /// Direction at `index`.
    pub fn get(&self, index: usize) -> Option<&Direction> {
        self.directions.get(index)
    }

    /// Index of `direction`.
    pub fn index_of(&self, direction: &Direction) -> Option<usize> {
        self.directions.iter().position(|d| d == direction)
    }

    /// Index of the inverse of the direction at `index`.
    pub fn inverse_index(&self, index: usize) -> Option<usize> {
        self.get(index).and_then(|d| self.index_of(&d.inverse()))
    }
}

impl<'a> IntoIterator for &'a Stencil {
    type Item = &'a Direction;
    type IntoIter = std::slice::Iter<'a, Direction>;

    fn into_iter(self) -> Self::IntoIter {
        self.directions.iter()
    }
}
