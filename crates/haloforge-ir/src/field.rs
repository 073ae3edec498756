//! Typed fields and relative field accesses.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{direction_name, Direction, ScalarType};

/// Role of a field in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Regular simulation field.
    #[default]
    Generic,
    /// Linear communication buffer.
    Buffer,
}

/// A named, typed field over a structured grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Number of spatial dimensions.
    pub spatial_dimensions: usize,
    /// Shape of the per-cell index space (empty for scalar fields).
    #[serde(default)]
    pub index_shape: Vec<usize>,
    /// Element type.
    pub dtype: ScalarType,
    /// Field role.
    #[serde(default)]
    pub kind: FieldKind,
}

impl Field {
    /// Create a scalar field.
    pub fn new(name: impl Into<String>, spatial_dimensions: usize, dtype: ScalarType) -> Self {
        Self {
            name: name.into(),
            spatial_dimensions,
            index_shape: Vec::new(),
            dtype,
            kind: FieldKind::Generic,
        }
    }

    /// Set the per-cell index shape.
    pub fn with_index_shape(mut self, index_shape: impl Into<Vec<usize>>) -> Self {
        self.index_shape = index_shape.into();
        self
    }

    /// Create a one-dimensional communication buffer with `len` entries per cell.
    pub fn buffer(name: impl Into<String>, dtype: ScalarType, len: usize) -> Self {
        Self {
            name: name.into(),
            spatial_dimensions: 1,
            index_shape: vec![len],
            dtype,
            kind: FieldKind::Buffer,
        }
    }

    /// Number of index dimensions.
    pub fn index_dimensions(&self) -> usize {
        self.index_shape.len()
    }

    /// Number of values stored per cell.
    pub fn values_per_cell(&self) -> usize {
        self.index_shape.iter().product()
    }

    /// Access at the current cell.
    pub fn center(&self, index: impl Into<Vec<usize>>) -> FieldAccess {
        FieldAccess {
            field: self.clone(),
            offset: Direction::zero(self.spatial_dimensions),
            index: index.into(),
        }
    }

    /// Access at a relative cell.
    pub fn access(&self, offset: Direction, index: impl Into<Vec<usize>>) -> FieldAccess {
        FieldAccess {
            field: self.clone(),
            offset,
            index: index.into(),
        }
    }

    /// Center accesses for every index of the field, in row-major order.
    pub fn all_center_accesses(&self) -> Vec<FieldAccess> {
        let mut indices: Vec<Vec<usize>> = vec![Vec::new()];
        for &extent in &self.index_shape {
            indices = indices
                .into_iter()
                .flat_map(|prefix| {
                    (0..extent).map(move |i| {
                        let mut index = prefix.clone();
                        index.push(i);
                        index
                    })
                })
                .collect();
        }
        indices.into_iter().map(|index| self.center(index)).collect()
    }
}

/// A reference to a field value at a relative cell and optional component.
///
/// Equality, hashing and ordering use (field name, offset, index) only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAccess {
    /// Accessed field.
    pub field: Field,
    /// Relative cell offset.
    pub offset: Direction,
    /// Component index (empty for scalar fields).
    #[serde(default)]
    pub index: Vec<usize>,
}

impl FieldAccess {
    /// Name of the accessed field.
    pub fn field_name(&self) -> &str {
        &self.field.name
    }

    /// The same access at offset zero.
    pub fn centered(&self) -> FieldAccess {
        FieldAccess {
            field: self.field.clone(),
            offset: Direction::zero(self.offset.dim()),
            index: self.index.clone(),
        }
    }

    /// Check if the access targets the current cell.
    pub fn is_center(&self) -> bool {
        self.offset.is_zero()
    }

    fn key(&self) -> (&str, &Direction, &[usize]) {
        (&self.field.name, &self.offset, &self.index)
    }
}

impl PartialEq for FieldAccess {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for FieldAccess {}

impl Hash for FieldAccess {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for FieldAccess {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldAccess {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for FieldAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.field.name, direction_name(self.offset.offsets()))?;
        match self.index.as_slice() {
            [] => Ok(()),
            [i] => write!(f, "^{}", i),
            many => {
                let parts: Vec<String> = many.iter().map(|i| i.to_string()).collect();
                write!(f, "^({})", parts.join(","))
            }
        }
    }
}
