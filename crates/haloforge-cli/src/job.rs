//! TOML job files.
//!
//! A job file holds a build context and any number of generator sections:
//!
//! ```toml
//! [context]
//! double_accuracy = true
//!
//! [[pack_info]]
//! field = { name = "pdfs", index_shape = [19] }
//! stencil = "D3Q19"
//! kind = "pull"
//! options = { class_name = "PdfPackInfo", namespace = "lbm" }
//!
//! [[lattice_model]]
//! class_name = "SRTLatticeModel"
//! stencil = "D3Q19"
//! relaxation_rate = "omega"
//!
//! [[sweep]]
//! class_name = "StreamSweep"
//! field = { name = "pdfs", index_shape = [19] }
//! stencil = "D3Q19"
//! inner_outer_split = true
//! ```

use std::fs;
use std::path::Path;

use haloforge_codegen::{
    BoundaryKind, FieldLayout, GenerationContext, KernelOptions, LatticeModelOptions, LbMethod,
    PackInfoOptions, PackKind, RefinementScaling, SweepOptions, Target,
};
use haloforge_ir::{Assignment, Direction, Expr, Field, ScalarType, Stencil};
use serde::Deserialize;
use tracing::debug;

use crate::error::{CliError, CliResult};

fn default_dimensions() -> usize {
    3
}

fn default_dtype() -> ScalarType {
    ScalarType::F64
}

fn default_namespace() -> String {
    "lbm".to_string()
}

fn default_field_name() -> String {
    "pdfs".to_string()
}

fn default_true() -> bool {
    true
}

/// A whole job file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Job {
    /// Build context shared by all sections.
    pub context: GenerationContext,
    /// Pack infos to generate.
    pub pack_info: Vec<PackInfoJob>,
    /// MPI datatype infos to generate.
    pub mpi_dtype_info: Vec<MpiDtypeJob>,
    /// Boundary additional-data reports to generate.
    pub boundary: Vec<BoundaryJob>,
    /// Lattice models to generate.
    pub lattice_model: Vec<LatticeModelJob>,
    /// Streaming sweeps to generate.
    pub sweep: Vec<SweepJob>,
}

impl Job {
    /// Parse a job from TOML text.
    pub fn parse(text: &str) -> CliResult<Self> {
        let job: Job = toml::from_str(text)?;
        debug!(
            pack_infos = job.pack_info.len(),
            mpi_dtype_infos = job.mpi_dtype_info.len(),
            boundaries = job.boundary.len(),
            lattice_models = job.lattice_model.len(),
            sweeps = job.sweep.len(),
            "parsed job"
        );
        Ok(job)
    }

    /// Read and parse a job file.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path)?;
        let job = Self::parse(&text)?;
        if job.is_empty() {
            return Err(CliError::EmptyJob(path.display().to_string()));
        }
        Ok(job)
    }

    /// Check if the job has no generator sections.
    pub fn is_empty(&self) -> bool {
        self.pack_info.is_empty()
            && self.mpi_dtype_info.is_empty()
            && self.boundary.is_empty()
            && self.lattice_model.is_empty()
            && self.sweep.is_empty()
    }
}

/// Field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Number of spatial coordinates.
    #[serde(default = "default_dimensions")]
    pub spatial_dimensions: usize,
    /// Index shape (empty for scalar fields).
    #[serde(default)]
    pub index_shape: Vec<usize>,
    /// Element type.
    #[serde(default = "default_dtype")]
    pub dtype: ScalarType,
}

impl FieldSpec {
    /// Build the field.
    pub fn to_field(&self) -> Field {
        Field::new(self.name.clone(), self.spatial_dimensions, self.dtype)
            .with_index_shape(self.index_shape.clone())
    }
}

/// Pull or push streaming kernel of `stencil` from `field` into a
/// temporary `<field>_tmp`.
pub fn streaming_kernel(stencil: &Stencil, field: &FieldSpec, kind: PackKind) -> CliResult<Vec<Assignment>> {
    if field.spatial_dimensions != stencil.dim() || field.index_shape != [stencil.len()] {
        return Err(CliError::Config(format!(
            "field '{}' must be a {}D field with index shape [{}] to stream over the stencil",
            field.name,
            stencil.dim(),
            stencil.len()
        )));
    }
    let src = field.to_field();
    let dst = Field::new(format!("{}_tmp", field.name), field.spatial_dimensions, field.dtype)
        .with_index_shape(field.index_shape.clone());
    Ok(stencil
        .iter()
        .enumerate()
        .map(|(i, d)| match kind {
            PackKind::Pull => Assignment::new(dst.center([i]), src.access(d.inverse(), [i])),
            PackKind::Push => Assignment::new(dst.access(d.clone(), [i]), src.center([i])),
        })
        .collect())
}

/// `[[pack_info]]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PackInfoJob {
    /// Communicated field.
    pub field: FieldSpec,
    /// Derive the accesses from this stencil's streaming kernel.
    #[serde(default)]
    pub stencil: Option<String>,
    /// Streaming kind of the derived kernel.
    #[serde(default)]
    pub kind: PackKind,
    /// Direction subset when communicating the whole field.
    #[serde(default)]
    pub directions: Option<Vec<Vec<i32>>>,
    /// Generator options.
    #[serde(default)]
    pub options: PackInfoOptions,
}

impl PackInfoJob {
    /// Parsed direction subset.
    pub fn direction_subset(&self) -> CliResult<Option<Vec<Direction>>> {
        match &self.directions {
            None => Ok(None),
            Some(list) => list
                .iter()
                .map(|d| Direction::try_from_slice(d).map_err(CliError::from))
                .collect::<CliResult<Vec<_>>>()
                .map(Some),
        }
    }
}

/// `[[mpi_dtype_info]]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MpiDtypeJob {
    /// Generated class name.
    pub class_name: String,
    /// Namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Communicated field.
    pub field: FieldSpec,
    /// Stencil of the streaming kernel.
    pub stencil: String,
    /// Streaming kind.
    #[serde(default)]
    pub kind: PackKind,
}

/// `[[boundary]]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundaryJob {
    /// Report name.
    pub name: String,
    /// Lattice stencil.
    pub stencil: String,
    /// Population field name.
    #[serde(default = "default_field_name")]
    pub field_name: String,
    /// Target of the boundary sweep.
    #[serde(default)]
    pub target: Target,
    /// Boundary condition.
    pub boundary: BoundaryKind,
}

/// Number or symbol in a job file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Param {
    /// Numeric constant.
    Number(f64),
    /// Runtime parameter.
    Symbol(String),
}

impl Param {
    /// Symbolic value.
    pub fn to_expr(&self) -> Expr {
        match self {
            Param::Number(v) => Expr::float(*v),
            Param::Symbol(name) => Expr::symbol(name.clone()),
        }
    }
}

/// Refinement scaling section of a lattice model.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RefinementJob {
    /// Relaxation rates scaled with the standard rule.
    pub relaxation_rates: Vec<String>,
    /// Force parameters scaled by the inverse level factor.
    pub forces: Vec<String>,
}

impl RefinementJob {
    fn to_scaling(&self) -> Option<RefinementScaling> {
        if self.relaxation_rates.is_empty() && self.forces.is_empty() {
            return None;
        }
        let mut scaling = RefinementScaling::new();
        for rate in &self.relaxation_rates {
            scaling.add_standard_relaxation_rate_scaling(rate.as_str().into());
        }
        for force in &self.forces {
            scaling.add_force_scaling(force.as_str().into());
        }
        Some(scaling)
    }
}

/// `[[lattice_model]]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LatticeModelJob {
    /// Generated class name.
    pub class_name: String,
    /// Namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Lattice stencil.
    pub stencil: String,
    /// Relaxation rate.
    pub relaxation_rate: Param,
    /// Compressible equilibrium.
    #[serde(default = "default_true")]
    pub compressible: bool,
    /// Constant body force.
    #[serde(default)]
    pub force: Option<Vec<Param>>,
    /// Population field layout.
    #[serde(default)]
    pub field_layout: FieldLayout,
    /// Refinement scaling.
    #[serde(default)]
    pub refinement: RefinementJob,
    /// Kernel overrides.
    #[serde(default)]
    pub kernel: KernelOptions,
}

impl LatticeModelJob {
    /// Method described by the section.
    pub fn method(&self) -> CliResult<LbMethod> {
        let stencil = Stencil::by_name(&self.stencil)?;
        let mut method = LbMethod::srt(stencil, self.relaxation_rate.to_expr())?
            .with_compressible(self.compressible);
        if let Some(force) = &self.force {
            method = method.with_force(force.iter().map(Param::to_expr).collect());
        }
        Ok(method)
    }

    /// Generator options described by the section.
    pub fn options(&self) -> LatticeModelOptions {
        let mut options = LatticeModelOptions::new(self.class_name.clone())
            .with_namespace(self.namespace.clone())
            .with_field_layout(self.field_layout)
            .with_kernel_options(self.kernel.clone());
        if let Some(scaling) = self.refinement.to_scaling() {
            options = options.with_refinement_scaling(scaling);
        }
        options
    }
}

/// `[[sweep]]` section: a streaming sweep swapping `<field>_tmp` into the
/// field after every call.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepJob {
    /// Generated class name.
    pub class_name: String,
    /// Namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Streamed field.
    pub field: FieldSpec,
    /// Stencil of the streaming kernel.
    pub stencil: String,
    /// Streaming kind.
    #[serde(default)]
    pub kind: PackKind,
    /// Generate inner / outer entry points.
    #[serde(default)]
    pub inner_outer_split: bool,
    /// Ghost layers added to the iteration space.
    #[serde(default)]
    pub ghost_layers_to_include: usize,
    /// Scalars the sweep constructor always takes.
    #[serde(default)]
    pub varying_parameters: Vec<String>,
    /// Kernel overrides.
    #[serde(default)]
    pub kernel: KernelOptions,
}

impl SweepJob {
    /// Streaming kernel of the section.
    pub fn assignments(&self) -> CliResult<Vec<Assignment>> {
        let stencil = Stencil::by_name(&self.stencil)?;
        streaming_kernel(&stencil, &self.field, self.kind)
    }

    /// Generator options described by the section.
    pub fn options(&self) -> SweepOptions {
        SweepOptions::new(self.class_name.clone())
            .with_namespace(self.namespace.clone())
            .with_field_swap(self.field.name.clone(), format!("{}_tmp", self.field.name))
            .with_varying_parameters(self.varying_parameters.clone())
            .with_inner_outer_split(self.inner_outer_split)
            .with_ghost_layers_to_include(self.ghost_layers_to_include)
            .with_kernel_options(self.kernel.clone())
    }
}
