//! MPI datatype info.
//!
//! Instead of packing through a buffer, communication describes which
//! components of a single lattice field cross each face with MPI datatypes.
//! Only the component indices per direction are derived here.

use std::collections::{BTreeMap, BTreeSet};

use haloforge_ir::Assignment;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CodegenError, Result};
use crate::packinfo::{access_directions, collect_accesses, PackKind};
use crate::render::{RenderedFile, Renderer};

/// Component indices communicated per direction name.
pub type MpiDtypeSpec = BTreeMap<String, BTreeSet<usize>>;

/// Generated MPI datatype info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpiDtypeInfo {
    /// Class name.
    pub class_name: String,
    /// Namespace.
    pub namespace: String,
    /// Pull or push.
    pub kind: PackKind,
    /// The communicated field.
    pub field_name: String,
    /// Number of components of the field.
    pub f_size: usize,
    /// Indices per direction.
    pub spec: MpiDtypeSpec,
}

#[derive(Debug, Serialize)]
struct SpecEntry {
    direction: String,
    indices: String,
}

#[derive(Debug, Serialize)]
struct MpiDtypeContext<'a> {
    class_name: &'a str,
    namespace: &'a str,
    kind: String,
    field_name: &'a str,
    f_size: usize,
    spec: Vec<SpecEntry>,
}

impl MpiDtypeInfo {
    /// Render the header.
    pub fn render(&self, renderer: &Renderer) -> Result<Vec<RenderedFile>> {
        let context = MpiDtypeContext {
            class_name: &self.class_name,
            namespace: &self.namespace,
            kind: self.kind.to_string(),
            field_name: &self.field_name,
            f_size: self.f_size,
            spec: self
                .spec
                .iter()
                .map(|(direction, indices)| SpecEntry {
                    direction: direction.clone(),
                    indices: indices
                        .iter()
                        .map(usize::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect(),
        };
        let header = renderer.render("MpiDtypeInfo.h", &context)?;
        info!(class = %self.class_name, "rendered MPI datatype info");
        Ok(vec![RenderedFile::new(format!("{}.h", self.class_name), header)])
    }
}

/// Derive MPI datatype info from a kernel.
///
/// Exactly one field may be read (pull) or written (push), and it must have a
/// single index dimension.
pub fn mpi_dtype_info_from_kernel(
    assignments: &[Assignment],
    kind: PackKind,
    class_name: &str,
    namespace: &str,
) -> Result<MpiDtypeInfo> {
    let (reads, writes) = collect_accesses(assignments);
    let accesses = match kind {
        PackKind::Pull => reads,
        PackKind::Push => writes,
    };

    let fields: BTreeMap<&str, _> = accesses
        .iter()
        .map(|fa| (fa.field.name.as_str(), &fa.field))
        .collect();
    let field = match fields.len() {
        0 => return Err(CodegenError::NoFieldsToPack),
        1 => fields.values().next().copied().ok_or(CodegenError::NoFieldsToPack)?,
        _ => {
            return Err(CodegenError::MultipleFields(
                fields.keys().map(|k| k.to_string()).collect(),
            ))
        }
    };
    if field.index_dimensions() != 1 {
        return Err(CodegenError::UnsupportedFieldShape {
            field: field.name.clone(),
            index_dimensions: field.index_dimensions(),
        });
    }

    let mut spec = MpiDtypeSpec::new();
    for fa in &accesses {
        for direction in access_directions(fa, kind)? {
            spec.entry(direction.name())
                .or_default()
                .insert(fa.index[0]);
        }
    }
    debug!(%kind, field = %field.name, directions = spec.len(), "collected MPI datatype spec");

    Ok(MpiDtypeInfo {
        class_name: class_name.to_string(),
        namespace: namespace.to_string(),
        kind,
        field_name: field.name.clone(),
        f_size: field.index_shape[0],
        spec,
    })
}
