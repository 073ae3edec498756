//! Direction algebra.
//!
//! Integer offset vectors, their canonical names and the communication
//! fan-out of an access offset.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{IrError, IrResult};

/// Names for the negative / positive side of each axis (x, y, z).
const AXIS_NAMES: [(char, char); 3] = [('W', 'E'), ('S', 'N'), ('B', 'T')];

/// Integer offset vector naming a neighbor direction (1 to 3 components).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<i32>", into = "Vec<i32>")]
pub struct Direction(Vec<i32>);

impl Direction {
    /// Create a direction from a slice of offsets.
    pub fn try_from_slice(offsets: &[i32]) -> IrResult<Self> {
        if offsets.is_empty() || offsets.len() > 3 {
            return Err(IrError::InvalidDimension(offsets.len()));
        }
        Ok(Self(offsets.to_vec()))
    }

    /// Wrap offsets already known to have 1 to 3 components.
    pub(crate) fn from_offsets(offsets: Vec<i32>) -> Self {
        Self(offsets)
    }

    /// The zero vector of the given dimension.
    pub fn zero(dim: usize) -> Self {
        Self(vec![0; dim.clamp(1, 3)])
    }

    /// Offset components.
    pub fn offsets(&self) -> &[i32] {
        &self.0
    }

    /// Number of components.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Component along `axis`, zero beyond the vector's dimension.
    pub fn component(&self, axis: usize) -> i32 {
        self.0.get(axis).copied().unwrap_or(0)
    }

    /// Check if every component is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&c| c == 0)
    }

    /// Check if every component lies in {-1, 0, 1}.
    pub fn is_first_neighborhood(&self) -> bool {
        self.0.iter().all(|c| c.abs() <= 1)
    }

    /// Number of axes with a nonzero component.
    pub fn nonzero_axes(&self) -> usize {
        self.0.iter().filter(|&&c| c != 0).count()
    }

    /// The negated direction.
    pub fn inverse(&self) -> Self {
        Self(self.0.iter().map(|c| -c).collect())
    }

    /// The direction mirrored across `axis` (component negated).
    pub fn mirrored(&self, axis: usize) -> Self {
        let mut offsets = self.0.clone();
        if let Some(c) = offsets.get_mut(axis) {
            *c = -*c;
        }
        Self(offsets)
    }

    /// Component-wise difference `self - other`.
    pub fn sub(&self, other: &Direction) -> Self {
        Self(
            (0..self.dim().max(other.dim()))
                .map(|axis| self.component(axis) - other.component(axis))
                .collect(),
        )
    }

    /// Offsets padded with zeros to three components.
    pub fn padded3(&self) -> [i32; 3] {
        [self.component(0), self.component(1), self.component(2)]
    }

    /// Canonical direction name (`C`, `N`, `NE`, `TSW`, ...).
    pub fn name(&self) -> String {
        direction_name(&self.0)
    }
}

impl From<[i32; 2]> for Direction {
    fn from(offsets: [i32; 2]) -> Self {
        Self(offsets.to_vec())
    }
}

impl From<[i32; 3]> for Direction {
    fn from(offsets: [i32; 3]) -> Self {
        Self(offsets.to_vec())
    }
}

impl TryFrom<Vec<i32>> for Direction {
    type Error = IrError;

    fn try_from(offsets: Vec<i32>) -> Result<Self, Self::Error> {
        Self::try_from_slice(&offsets)
    }
}

impl From<Direction> for Vec<i32> {
    fn from(direction: Direction) -> Self {
        direction.0
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Canonical name of an offset vector.
///
/// Components are read z, y, x; a magnitude above one is written as a
/// numeric prefix (`(2, 0, 0)` → `2E`). The zero vector is `C`.
pub fn direction_name(offsets: &[i32]) -> String {
    let mut name = String::new();
    for axis in (0..offsets.len().min(3)).rev() {
        let value = offsets[axis];
        if value == 0 {
            continue;
        }
        let (negative, positive) = AXIS_NAMES[axis];
        if value.abs() > 1 {
            name.push_str(&value.abs().to_string());
        }
        name.push(if value < 0 { negative } else { positive });
    }
    if name.is_empty() {
        name.push('C');
    }
    name
}

/// Canonical communication directions that must carry an access at `offset`.
///
/// The zero vector maps to itself. Otherwise every bit pattern over the axes
/// is visited in ascending order (first axis most significant): a zero axis
/// of `offset` stays zero, a negative axis turns a set bit negative, and a
/// positive axis copies the bit. All-zero results are dropped and duplicates
/// removed, so a diagonal access fans out to every face and edge direction it
/// touches.
pub fn comm_directions(offset: &Direction) -> IrResult<Vec<Direction>> {
    if !offset.is_first_neighborhood() {
        return Err(IrError::UnsupportedHaloWidth {
            offset: offset.clone(),
        });
    }
    if offset.is_zero() {
        return Ok(vec![offset.clone()]);
    }

    let dim = offset.dim();
    let mut result: Vec<Direction> = Vec::new();
    for pattern in 0u32..(1 << dim) {
        let candidate: Vec<i32> = (0..dim)
            .map(|axis| {
                let bit = ((pattern >> (dim - 1 - axis)) & 1) as i32;
                match offset.0[axis] {
                    0 => 0,
                    -1 if bit == 1 => -1,
                    _ => bit,
                }
            })
            .collect();
        let candidate = Direction(candidate);
        if !candidate.is_zero() && !result.contains(&candidate) {
            result.push(candidate);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_offsets(dim: usize) -> Vec<Direction> {
        let mut result = vec![vec![]];
        for _ in 0..dim {
            result = result
                .into_iter()
                .flat_map(|prefix: Vec<i32>| {
                    [-1, 0, 1].into_iter().map(move |c| {
                        let mut v = prefix.clone();
                        v.push(c);
                        v
                    })
                })
                .collect();
        }
        result
            .into_iter()
            .map(|v| Direction::try_from_slice(&v).unwrap())
            .collect()
    }

    #[test]
    fn test_direction_names() {
        assert_eq!(Direction::from([0, 0, 0]).name(), "C");
        assert_eq!(Direction::from([0, 1, 0]).name(), "N");
        assert_eq!(Direction::from([1, 1, 0]).name(), "NE");
        assert_eq!(Direction::from([-1, 0, 1]).name(), "TW");
        assert_eq!(Direction::from([-1, -1, -1]).name(), "BSW");
        assert_eq!(Direction::from([1, -1]).name(), "SE");
        assert_eq!(Direction::from([2, 0, 0]).name(), "2E");
    }

    #[test]
    fn test_inverse_and_mirror() {
        let d = Direction::from([1, -1, 0]);
        assert_eq!(d.inverse(), Direction::from([-1, 1, 0]));
        assert_eq!(d.mirrored(1), Direction::from([1, 1, 0]));
        assert_eq!(d.mirrored(1).mirrored(1), d);
        assert_eq!(Direction::from([1, 0]).padded3(), [1, 0, 0]);
    }

    #[test]
    fn test_zero_offset() {
        let zero = Direction::zero(3);
        assert_eq!(comm_directions(&zero).unwrap(), vec![zero.clone()]);
    }

    #[test]
    fn test_face_offset_has_single_direction() {
        let dirs = comm_directions(&Direction::from([0, -1, 0])).unwrap();
        assert_eq!(dirs, vec![Direction::from([0, -1, 0])]);
    }

    #[test]
    fn test_diagonal_fan_out() {
        let dirs = comm_directions(&Direction::from([1, 1, 0])).unwrap();
        assert_eq!(
            dirs,
            vec![
                Direction::from([0, 1, 0]),
                Direction::from([1, 0, 0]),
                Direction::from([1, 1, 0]),
            ]
        );

        let dirs = comm_directions(&Direction::from([-1, 1, -1])).unwrap();
        assert_eq!(dirs.len(), 7);
        assert!(dirs.contains(&Direction::from([-1, 1, -1])));
        assert!(dirs.contains(&Direction::from([-1, 0, 0])));
        assert!(dirs.contains(&Direction::from([0, 0, -1])));
        assert!(dirs.contains(&Direction::from([0, 1, -1])));
    }

    #[test]
    fn test_fan_out_is_sign_preserving_subset_lattice() {
        for dim in [2, 3] {
            for offset in all_offsets(dim).into_iter().filter(|o| !o.is_zero()) {
                let dirs = comm_directions(&offset).unwrap();
                assert!(dirs.contains(&offset));
                // Every nonempty subset of the nonzero axes, signs kept.
                let nonzero: Vec<usize> =
                    (0..dim).filter(|&a| offset.component(a) != 0).collect();
                assert_eq!(dirs.len(), (1 << nonzero.len()) - 1);
                for d in &dirs {
                    assert!(d.is_first_neighborhood());
                    for axis in 0..dim {
                        let c = d.component(axis);
                        assert!(c == 0 || c == offset.component(axis));
                    }
                }
            }
        }
    }

    #[test]
    fn test_wide_offset_rejected() {
        let err = comm_directions(&Direction::from([0, 2, 0])).unwrap_err();
        assert!(matches!(err, IrError::UnsupportedHaloWidth { .. }));
    }

    #[test]
    fn test_invalid_dimension() {
        assert!(matches!(
            Direction::try_from_slice(&[0, 0, 0, 1]),
            Err(IrError::InvalidDimension(4))
        ));
    }
}
