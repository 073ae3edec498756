//! Pack-info synthesis.
//!
//! Derives which field values must travel to which neighbor and builds the
//! pack / unpack kernels that move them through a linear buffer.
//!
//! ```text
//! COLLECT (accesses) → GROUP (direction sets) → COMPILE (kernels)
//!     → ASSEMBLE (context) → EMIT (files)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use haloforge_ir::{comm_directions, Assignment, Direction, Expr, Field, FieldAccess, ScalarType, Stencil};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compiler::{KernelBinding, KernelCompiler, KernelInfo};
use crate::config::{GenerationContext, KernelConfig, KernelOptions, Target};
use crate::error::{CodegenError, Result};
use crate::render::{RenderedFile, Renderer};

/// Whether a kernel reads its neighbors (pull) or writes to them (push).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackKind {
    /// Neighbor values are read; communicate the inverse of each read offset.
    #[default]
    Pull,
    /// Neighbor values are written; communicate each write offset.
    Push,
}

impl fmt::Display for PackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackKind::Pull => write!(f, "pull"),
            PackKind::Push => write!(f, "push"),
        }
    }
}

/// Reduction applied when unpacking into existing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionOp {
    /// `current + received`
    Add,
    /// `current - received`
    Sub,
    /// `current * received`
    Mul,
    /// `fmax(current, received)`
    Max,
    /// `fmin(current, received)`
    Min,
}

impl ReductionOp {
    /// Combine the current value with the received one.
    pub fn apply(&self, current: Expr, received: Expr) -> Expr {
        match self {
            ReductionOp::Add => current + received,
            ReductionOp::Sub => current - received,
            ReductionOp::Mul => current * received,
            ReductionOp::Max => Expr::call("fmax", vec![current, received]),
            ReductionOp::Min => Expr::call("fmin", vec![current, received]),
        }
    }
}

/// A set of communication directions sharing one pack kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DirectionSet(BTreeSet<Direction>);

impl DirectionSet {
    /// Set holding a single direction.
    pub fn single(direction: Direction) -> Self {
        Self(BTreeSet::from([direction]))
    }

    /// Directions in ascending offset order.
    pub fn iter(&self) -> impl Iterator<Item = &Direction> {
        self.0.iter()
    }

    /// Number of directions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical direction names.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(Direction::name).collect()
    }

    /// Names joined with `_`, as used in kernel names.
    pub fn key(&self) -> String {
        self.names().join("_")
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Accesses to communicate per direction set.
pub type PackSpec = BTreeMap<DirectionSet, BTreeSet<FieldAccess>>;

/// Options of one pack-info generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackInfoOptions {
    /// Name of the generated class.
    pub class_name: String,
    /// Inner namespace of the generated class.
    pub namespace: String,
    /// Reduction used when unpacking.
    pub operator: Option<ReductionOp>,
    /// Send ghost-layer values into the receiver's interior.
    pub gl_to_inner: bool,
    /// Kernel overrides.
    pub kernel: KernelOptions,
}

impl Default for PackInfoOptions {
    fn default() -> Self {
        Self {
            class_name: "PackInfo".to_string(),
            namespace: "pystencils".to_string(),
            operator: None,
            gl_to_inner: false,
            kernel: KernelOptions::default(),
        }
    }
}

impl PackInfoOptions {
    /// Options for a class name with defaults elsewhere.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the unpack reduction.
    pub fn with_operator(mut self, operator: ReductionOp) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Communicate ghost layers into the interior.
    pub fn with_gl_to_inner(mut self, gl_to_inner: bool) -> Self {
        self.gl_to_inner = gl_to_inner;
        self
    }

    /// Set kernel overrides.
    pub fn with_kernel_options(mut self, kernel: KernelOptions) -> Self {
        self.kernel = kernel;
        self
    }
}

/// Field accesses read and written by a list of assignments.
pub(crate) fn collect_accesses(
    assignments: &[Assignment],
) -> (BTreeSet<FieldAccess>, BTreeSet<FieldAccess>) {
    let mut reads = BTreeSet::new();
    let mut writes = BTreeSet::new();
    for a in assignments {
        reads.extend(a.reads());
        writes.extend(a.writes());
    }
    (reads, writes)
}

/// Communication directions of one neighbor access.
///
/// Zero offsets yield nothing; pull inverts the offset before fanning out.
pub(crate) fn access_directions(fa: &FieldAccess, kind: PackKind) -> Result<Vec<Direction>> {
    if !fa.offset.is_first_neighborhood() {
        return Err(CodegenError::UnsupportedHaloWidth(fa.offset.clone()));
    }
    if fa.offset.is_zero() {
        return Ok(Vec::new());
    }
    let comm = match kind {
        PackKind::Pull => fa.offset.inverse(),
        PackKind::Push => fa.offset.clone(),
    };
    Ok(comm_directions(&comm)?)
}

/// Derive the pack spec of a kernel.
///
/// Pull kernels communicate the centered version of every neighbor read;
/// push kernels communicate every neighbor write unchanged. Each
/// communication direction forms its own set.
pub fn pack_spec_from_kernel(assignments: &[Assignment], kind: PackKind) -> Result<PackSpec> {
    let (reads, writes) = collect_accesses(assignments);
    let accesses = match kind {
        PackKind::Pull => reads,
        PackKind::Push => writes,
    };

    let mut spec = PackSpec::new();
    for fa in &accesses {
        for direction in access_directions(fa, kind)? {
            let term = match kind {
                PackKind::Pull => fa.centered(),
                PackKind::Push => fa.clone(),
            };
            spec.entry(DirectionSet::single(direction))
                .or_default()
                .insert(term);
        }
    }
    debug!(%kind, accesses = accesses.len(), direction_sets = spec.len(), "collected pack spec");
    Ok(spec)
}

/// Pack spec communicating every component of `field` in one direction set.
///
/// The set defaults to the full first neighborhood of the field's dimension.
pub fn pack_spec_for_field(field: &Field, direction_subset: Option<&[Direction]>) -> PackSpec {
    let directions: DirectionSet = match direction_subset {
        Some(subset) if !subset.is_empty() => subset.iter().cloned().collect(),
        _ => Stencil::full_neighborhood(field.spatial_dimensions)
            .iter()
            .cloned()
            .collect(),
    };
    PackSpec::from([(directions, field.all_center_accesses().into_iter().collect())])
}

/// Dtype shared by every term; errors on none or several.
pub(crate) fn common_dtype<'a>(terms: impl IntoIterator<Item = &'a FieldAccess>) -> Result<ScalarType> {
    let fields: BTreeSet<(&str, ScalarType)> = terms
        .into_iter()
        .map(|fa| (fa.field.name.as_str(), fa.field.dtype))
        .collect();
    let dtypes: BTreeSet<ScalarType> = fields.iter().map(|(_, dtype)| *dtype).collect();
    match dtypes.len() {
        0 => Err(CodegenError::NoFieldsToPack),
        1 => Ok(dtypes.into_iter().next().unwrap_or(ScalarType::F64)),
        _ => Err(CodegenError::AmbiguousFieldSet {
            details: fields
                .iter()
                .map(|(name, dtype)| format!(" - {} [{}]", name, dtype))
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    }
}

/// Pack and unpack kernels of one direction set.
#[derive(Debug, Clone)]
pub struct DirectionKernels {
    /// Directions served.
    pub directions: DirectionSet,
    /// Buffer layout: term `i` lives at buffer index `i`.
    pub terms: Vec<FieldAccess>,
    /// Assignments compiled into the pack kernel.
    pub pack_assignments: Vec<Assignment>,
    /// Assignments compiled into the unpack kernel.
    pub unpack_assignments: Vec<Assignment>,
    /// Pack kernel (`buffer(i) = term_i`).
    pub pack: KernelInfo,
    /// Unpack kernel (`term_i = buffer(i)` or a reduction).
    pub unpack: KernelInfo,
}

impl DirectionKernels {
    /// Values communicated per cell.
    pub fn elements_per_cell(&self) -> usize {
        self.terms.len()
    }
}

/// All kernels of one pack info.
#[derive(Debug, Clone)]
pub struct KernelFamily {
    /// Per-direction-set kernels, ordered by direction set.
    pub kernels: Vec<DirectionKernels>,
    /// Buffer layout of the fused kernel: the sorted union of all terms.
    pub fused_terms: Vec<FieldAccess>,
    /// Kernel packing the union of all terms.
    pub fused_kernel: KernelInfo,
}

impl KernelFamily {
    /// Values per cell keyed by direction-set key.
    pub fn elements_per_cell(&self) -> BTreeMap<String, usize> {
        self.kernels
            .iter()
            .map(|k| (k.directions.key(), k.elements_per_cell()))
            .collect()
    }

    /// Locate the kernels serving `direction`.
    pub fn kernels_for(&self, direction: &Direction) -> Option<&DirectionKernels> {
        self.kernels
            .iter()
            .find(|k| k.directions.iter().any(|d| d == direction))
    }
}

/// A generated pack info.
#[derive(Debug, Clone)]
pub struct PackInfo {
    /// Class name.
    pub class_name: String,
    /// Namespace.
    pub namespace: String,
    /// Target hardware.
    pub target: Target,
    /// Element type of every communicated value.
    pub dtype: ScalarType,
    /// The communicated field.
    pub field_name: String,
    /// Values per cell of the communicated field.
    pub f_size: usize,
    /// Ghost-layer to interior mode.
    pub gl_to_inner: bool,
    /// Include directives required by the kernels.
    pub headers: Vec<String>,
    /// Kernels.
    pub family: KernelFamily,
}

#[derive(Debug, Serialize)]
struct DirectionKernelsContext {
    directions: Vec<String>,
    key: String,
    elements_per_cell: usize,
    pack: KernelBinding,
    unpack: KernelBinding,
    pack_setup: Vec<String>,
    unpack_setup: Vec<String>,
}

/// Template context of a pack info.
#[derive(Debug, Serialize)]
pub struct PackInfoContext {
    class_name: String,
    namespace: String,
    target: String,
    dtype: String,
    field_name: String,
    f_size: usize,
    gl_to_inner: bool,
    headers: Vec<String>,
    kernels: Vec<DirectionKernelsContext>,
    fused_kernel: KernelBinding,
    fused_setup: Vec<String>,
    fused_elements_per_cell: usize,
}

impl PackInfo {
    /// Build the template context.
    pub fn context(&self) -> Result<PackInfoContext> {
        let stream = match self.target {
            Target::Cpu => None,
            Target::Gpu => Some("stream"),
        };
        let buffer = format!("reinterpret_cast<{}*>(byte_buffer)", self.dtype.c_name());
        let kernels = self
            .family
            .kernels
            .iter()
            .map(|k| {
                Ok(DirectionKernelsContext {
                    directions: k.directions.names(),
                    key: k.directions.key(),
                    elements_per_cell: k.elements_per_cell(),
                    pack: k.pack.binding(stream)?,
                    unpack: k.unpack.binding(stream)?,
                    pack_setup: k.pack.field_parameter_setup("ci", &buffer),
                    unpack_setup: k.unpack.field_parameter_setup("ci", &buffer),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PackInfoContext {
            class_name: self.class_name.clone(),
            namespace: self.namespace.clone(),
            target: self.target.to_string(),
            dtype: self.dtype.c_name().to_string(),
            field_name: self.field_name.clone(),
            f_size: self.f_size,
            gl_to_inner: self.gl_to_inner,
            headers: self.headers.clone(),
            kernels,
            fused_kernel: self.family.fused_kernel.binding(stream)?,
            fused_setup: self.family.fused_kernel.field_parameter_setup("ci", &buffer),
            fused_elements_per_cell: self.family.fused_terms.len(),
        })
    }

    /// Render header and source (`.cpp` on CPU, `.cu` on GPU).
    pub fn render(&self, renderer: &Renderer) -> Result<Vec<RenderedFile>> {
        let context = self.context()?;
        let (header, source) = match self.target {
            Target::Cpu => ("CpuPackInfo.h", "CpuPackInfo.cpp"),
            Target::Gpu => ("GpuPackInfo.h", "GpuPackInfo.cu"),
        };
        let files = vec![
            RenderedFile::new(
                format!("{}.h", self.class_name),
                renderer.render(header, &context)?,
            ),
            RenderedFile::new(
                format!("{}.{}", self.class_name, self.target.source_extension()),
                renderer.render(source, &context)?,
            ),
        ];
        info!(class = %self.class_name, target = %self.target, "rendered pack info");
        Ok(files)
    }
}

/// Pack-info generator bound to a build context and a kernel compiler.
pub struct PackInfoGenerator<'a> {
    context: &'a GenerationContext,
    compiler: &'a dyn KernelCompiler,
}

impl<'a> PackInfoGenerator<'a> {
    /// Create a generator.
    pub fn new(context: &'a GenerationContext, compiler: &'a dyn KernelCompiler) -> Self {
        Self { context, compiler }
    }

    /// Pack info for the neighbor accesses of a kernel.
    pub fn from_kernel(
        &self,
        assignments: &[Assignment],
        kind: PackKind,
        options: &PackInfoOptions,
    ) -> Result<PackInfo> {
        let spec = pack_spec_from_kernel(assignments, kind)?;
        self.generate(&spec, options)
    }

    /// Pack info communicating every component of `field`.
    pub fn for_field(
        &self,
        field: &Field,
        direction_subset: Option<&[Direction]>,
        options: &PackInfoOptions,
    ) -> Result<PackInfo> {
        self.generate(&pack_spec_for_field(field, direction_subset), options)
    }

    /// Pack info for an explicit spec.
    pub fn generate(&self, spec: &PackSpec, options: &PackInfoOptions) -> Result<PackInfo> {
        let items: Vec<(&DirectionSet, Vec<FieldAccess>)> = spec
            .iter()
            .map(|(set, terms)| {
                let mut sorted: Vec<FieldAccess> = terms.iter().cloned().collect();
                sorted.sort_by_key(|t| t.to_string());
                (set, sorted)
            })
            .collect();

        let config = KernelConfig::from_context(self.context, &options.kernel)?.without_vectorization();
        let config_zero_gl = config.with_ghost_layers(0);

        let all_terms: BTreeSet<FieldAccess> =
            items.iter().flat_map(|(_, terms)| terms.iter().cloned()).collect();
        // Accesses compare by name only, so check every term before merging.
        let dtype = common_dtype(items.iter().flat_map(|(_, terms)| terms.iter()))?;
        let field_names: BTreeSet<String> =
            all_terms.iter().map(|fa| fa.field.name.clone()).collect();
        if field_names.len() > 1 {
            return Err(CodegenError::MultipleFields(field_names.into_iter().collect()));
        }
        let field = all_terms
            .iter()
            .next()
            .map(|fa| fa.field.clone())
            .ok_or(CodegenError::NoFieldsToPack)?;
        debug!(direction_sets = items.len(), terms = all_terms.len(), %dtype, "grouped pack terms");

        let mut kernels = Vec::with_capacity(items.len());
        for (set, terms) in items {
            if let Some(wide) = set.iter().find(|d| !d.is_first_neighborhood()) {
                return Err(CodegenError::UnsupportedHaloWidth(wide.clone()));
            }
            let buffer = Field::buffer("buffer", dtype, terms.len());
            let pack_assignments: Vec<Assignment> = terms
                .iter()
                .enumerate()
                .map(|(i, term)| Assignment::new(buffer.center([i]), term.clone()))
                .collect();
            let unpack_assignments: Vec<Assignment> = terms
                .iter()
                .enumerate()
                .map(|(i, term)| {
                    let received = Expr::from(buffer.center([i]));
                    let value = match options.operator {
                        None => received,
                        Some(op) => op.apply(Expr::from(term.clone()), received),
                    };
                    Assignment::new(term.clone(), value)
                })
                .collect();

            let key = set.key();
            let pack = self.compiler.compile(
                &format!("pack_{}", key),
                &pack_assignments,
                &config_zero_gl,
            )?;
            let unpack = self.compiler.compile(
                &format!("unpack_{}", key),
                &unpack_assignments,
                &config_zero_gl,
            )?;
            kernels.push(DirectionKernels {
                directions: set.clone(),
                terms,
                pack_assignments,
                unpack_assignments,
                pack: KernelInfo::new(pack),
                unpack: KernelInfo::new(unpack),
            });
        }

        let sorted_union: Vec<FieldAccess> = {
            let mut union: Vec<FieldAccess> = all_terms.into_iter().collect();
            union.sort_by_key(|t| t.to_string());
            union
        };
        let fused_buffer = Field::buffer("buffer", dtype, sorted_union.len());
        let fused_assignments: Vec<Assignment> = sorted_union
            .iter()
            .enumerate()
            .map(|(i, term)| Assignment::new(fused_buffer.center([i]), term.clone()))
            .collect();
        let fused = self
            .compiler
            .compile("fused_pack", &fused_assignments, &config)?;
        debug!(kernels = kernels.len() * 2 + 1, "compiled pack kernels");

        Ok(PackInfo {
            class_name: options.class_name.clone(),
            namespace: options.namespace.clone(),
            target: config.target(),
            dtype,
            field_name: field.name.clone(),
            f_size: field.values_per_cell(),
            gl_to_inner: options.gl_to_inner,
            headers: fused.headers.iter().cloned().collect(),
            family: KernelFamily {
                kernels,
                fused_terms: sorted_union,
                fused_kernel: KernelInfo::new(fused),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::LoopNestCompiler;

    fn pull_kernel(stencil: &Stencil) -> Vec<Assignment> {
        let q = stencil.len();
        let src = Field::new("src", stencil.dim(), ScalarType::F64).with_index_shape([q]);
        let dst = Field::new("dst", stencil.dim(), ScalarType::F64).with_index_shape([q]);
        stencil
            .iter()
            .enumerate()
            .map(|(i, d)| Assignment::new(dst.center([i]), src.access(d.inverse(), [i])))
            .collect()
    }

    #[test]
    fn test_pull_spec_groups_by_direction() {
        let spec = pack_spec_from_kernel(&pull_kernel(&Stencil::d2q9()), PackKind::Pull).unwrap();
        // Four faces plus four corners.
        assert_eq!(spec.len(), 8);
        let north = DirectionSet::single(Direction::from([0, 1]));
        // Populations moving north: N, NW, NE.
        let indices: Vec<usize> = spec[&north].iter().map(|fa| fa.index[0]).collect();
        assert_eq!(indices, vec![1, 5, 6]);
        assert!(spec.values().flatten().all(|fa| fa.is_center()));
        let corner = DirectionSet::single(Direction::from([1, 1]));
        assert_eq!(spec[&corner].len(), 1);
    }

    #[test]
    fn test_push_spec_keeps_offsets() {
        let stencil = Stencil::d2q9();
        let src = Field::new("src", 2, ScalarType::F64).with_index_shape([9]);
        let dst = Field::new("dst", 2, ScalarType::F64).with_index_shape([9]);
        let push: Vec<Assignment> = stencil
            .iter()
            .enumerate()
            .map(|(i, d)| Assignment::new(dst.access(d.clone(), [i]), src.center([i])))
            .collect();
        let spec = pack_spec_from_kernel(&push, PackKind::Push).unwrap();
        let east = DirectionSet::single(Direction::from([1, 0]));
        assert!(spec[&east]
            .iter()
            .all(|fa| fa.offset.component(0) == 1 && fa.field_name() == "dst"));
    }

    #[test]
    fn test_wide_access_rejected() {
        let f = Field::new("f", 3, ScalarType::F64);
        let g = Field::new("g", 3, ScalarType::F64);
        let a = vec![Assignment::new(g.center(vec![]), f.access(Direction::from([2, 0, 0]), vec![]))];
        assert!(matches!(
            pack_spec_from_kernel(&a, PackKind::Pull),
            Err(CodegenError::UnsupportedHaloWidth(_))
        ));
    }

    #[test]
    fn test_spec_for_field_defaults_to_neighborhood() {
        let f = Field::new("f", 3, ScalarType::F64).with_index_shape([4]);
        let spec = pack_spec_for_field(&f, None);
        let (set, terms) = spec.iter().next().unwrap();
        assert_eq!(set.len(), 27);
        assert_eq!(terms.len(), 4);
        let subset = [Direction::from([1, 0, 0]), Direction::from([-1, 0, 0])];
        let spec = pack_spec_for_field(&f, Some(&subset));
        assert_eq!(spec.keys().next().unwrap().names(), vec!["W", "E"]);
    }

    #[test]
    fn test_generate_kernel_names() {
        let ctx = GenerationContext::default();
        let compiler = LoopNestCompiler::new();
        let generator = PackInfoGenerator::new(&ctx, &compiler);
        let info = generator
            .from_kernel(
                &pull_kernel(&Stencil::d3q19()),
                PackKind::Pull,
                &PackInfoOptions::new("PdfPackInfo"),
            )
            .unwrap();
        assert_eq!(info.field_name, "src");
        assert_eq!(info.namespace, "pystencils");
        let names: Vec<&str> = info
            .family
            .kernels
            .iter()
            .map(|k| k.pack.artifact.function_name.as_str())
            .collect();
        assert!(names.contains(&"pack_N"));
        assert!(names.contains(&"pack_TE"));
        assert!(info
            .family
            .kernels
            .iter()
            .all(|k| k.unpack.artifact.function_name == format!("unpack_{}", k.directions.key())));
        // D3Q19 pulls five populations across each face.
        let east = info.family.kernels_for(&Direction::from([1, 0, 0])).unwrap();
        assert_eq!(east.elements_per_cell(), 5);
    }

    #[test]
    fn test_reduction_unpack() {
        let ctx = GenerationContext::default();
        let compiler = LoopNestCompiler::new();
        let f = Field::new("f", 3, ScalarType::F64);
        let info = PackInfoGenerator::new(&ctx, &compiler)
            .for_field(
                &f,
                Some(&[Direction::from([0, 1, 0])]),
                &PackInfoOptions::new("SumPackInfo").with_operator(ReductionOp::Add),
            )
            .unwrap();
        let unpack = &info.family.kernels[0].unpack.artifact.source;
        assert!(unpack.contains("_data_f[ctr_0*_stride_f_0 + ctr_1*_stride_f_1 + ctr_2*_stride_f_2] = _data_f["));
        assert!(unpack.contains(" + _data_buffer[1*buffer_idx + 0]"));
    }

    #[test]
    fn test_same_name_with_two_dtypes_rejected() {
        let ctx = GenerationContext::default();
        let compiler = LoopNestCompiler::new();
        let wide = Field::new("f", 3, ScalarType::F64).with_index_shape([2]);
        let narrow = Field::new("f", 3, ScalarType::F32).with_index_shape([2]);
        let mut spec = PackSpec::new();
        spec.insert(
            DirectionSet::single(Direction::from([0, 0, 1])),
            [wide.center([0]), narrow.center([1])].into_iter().collect(),
        );
        let err = PackInfoGenerator::new(&ctx, &compiler)
            .generate(&spec, &PackInfoOptions::new("Mixed"))
            .unwrap_err();
        assert!(matches!(err, CodegenError::AmbiguousFieldSet { .. }));
        let message = err.to_string();
        assert!(message.contains(" - f [float64]"));
        assert!(message.contains(" - f [float32]"));
    }

    #[test]
    fn test_fused_kernel_emitted() {
        let ctx = GenerationContext::default();
        let compiler = LoopNestCompiler::new();
        let renderer = Renderer::new().unwrap();
        let f = Field::new("f", 3, ScalarType::F64).with_index_shape([4]);
        let info = PackInfoGenerator::new(&ctx, &compiler)
            .for_field(&f, None, &PackInfoOptions::new("FPackInfo"))
            .unwrap();
        assert_eq!(info.family.fused_terms.len(), 4);

        let files = info.render(&renderer).unwrap();
        assert!(files[0].content.contains("void packAll(unsigned char * buffer, IBlock * block) const;"));
        let source = &files[1].content;
        assert!(source.contains("namespace internal_fused_pack {"));
        assert!(source.contains("void FPackInfo::packAll(unsigned char * byte_buffer, IBlock * block) const"));
        assert!(source.contains("double * RESTRICT _data_buffer = reinterpret_cast<double*>(byte_buffer);"));
        assert!(source.contains("    internal_fused_pack::fused_pack("));
        assert!(source.contains("f->xyzSize().numCells() * 4 * sizeof( double )"));
    }

    #[test]
    fn test_empty_spec() {
        let ctx = GenerationContext::default();
        let compiler = LoopNestCompiler::new();
        let err = PackInfoGenerator::new(&ctx, &compiler)
            .generate(&PackSpec::new(), &PackInfoOptions::default())
            .unwrap_err();
        assert!(matches!(err, CodegenError::NoFieldsToPack));
    }
}
