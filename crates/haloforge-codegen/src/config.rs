//! Build context and kernel configuration.
//!
//! A [`GenerationContext`] describes the build the generated code lands in.
//! [`KernelOptions`] are per-call overrides; both are resolved once into an
//! immutable [`KernelConfig`] by [`KernelConfig::from_context`].

use std::fmt;

use haloforge_ir::ScalarType;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CodegenError, Result};

/// Hardware target of generated kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Host code (C++).
    #[default]
    Cpu,
    /// CUDA device code.
    Gpu,
}

impl Target {
    /// Lowercase target name as used in templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Cpu => "cpu",
            Target::Gpu => "gpu",
        }
    }

    /// File extension of generated source files.
    pub fn source_extension(&self) -> &'static str {
        match self {
            Target::Cpu => "cpp",
            Target::Gpu => "cu",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build configuration of the simulation framework the code is generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationContext {
    /// Use double precision by default.
    pub double_accuracy: bool,
    /// The build has OpenMP enabled.
    pub openmp: bool,
    /// The build has CUDA enabled.
    pub cuda: bool,
    /// Optimize for the host machine (enables SIMD selection).
    pub optimize_for_localhost: bool,
    /// SIMD instruction sets of the host, weakest first.
    pub supported_instruction_sets: Vec<String>,
}

impl Default for GenerationContext {
    fn default() -> Self {
        Self {
            double_accuracy: true,
            openmp: false,
            cuda: false,
            optimize_for_localhost: false,
            supported_instruction_sets: Vec::new(),
        }
    }
}

impl GenerationContext {
    /// Create a context with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default precision.
    pub fn with_double_accuracy(mut self, double_accuracy: bool) -> Self {
        self.double_accuracy = double_accuracy;
        self
    }

    /// Enable or disable OpenMP support.
    pub fn with_openmp(mut self, openmp: bool) -> Self {
        self.openmp = openmp;
        self
    }

    /// Enable or disable CUDA support.
    pub fn with_cuda(mut self, cuda: bool) -> Self {
        self.cuda = cuda;
        self
    }

    /// Enable host optimization with the given instruction sets.
    pub fn with_localhost_optimization(mut self, instruction_sets: Vec<String>) -> Self {
        self.optimize_for_localhost = true;
        self.supported_instruction_sets = instruction_sets;
        self
    }

    /// Instruction set used when vectorizing for this build.
    pub fn vectorize_instruction_set(&self) -> Option<String> {
        if !self.optimize_for_localhost {
            return None;
        }
        match self.supported_instruction_sets.last() {
            Some(set) => Some(set.clone()),
            None => {
                warn!(
                    "Could not obtain supported vectorization instruction sets - defaulting to sse"
                );
                Some("sse".to_string())
            }
        }
    }
}

/// Resolved SIMD settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizeInfo {
    /// Instruction set; `None` disables vectorization.
    pub instruction_set: Option<String>,
    /// Innermost loop has unit stride.
    pub assume_inner_stride_one: bool,
    /// Field data is aligned.
    pub assume_aligned: bool,
    /// Use non-temporal stores.
    pub nontemporal: bool,
}

/// Partial SIMD overrides; unset fields take the build defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeOptions {
    /// Instruction set override.
    pub instruction_set: Option<String>,
    /// Unit-stride override.
    pub assume_inner_stride_one: Option<bool>,
    /// Alignment override.
    pub assume_aligned: Option<bool>,
    /// Non-temporal store override.
    pub nontemporal: Option<bool>,
}

/// Per-call overrides for kernel creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelOptions {
    /// Target hardware.
    pub target: Target,
    /// Element type; defaults by build precision.
    pub data_type: Option<ScalarType>,
    /// OpenMP parallelization; defaults to the build setting.
    pub cpu_openmp: Option<bool>,
    /// SIMD overrides.
    pub vectorize: Option<VectorizeOptions>,
    /// Ghost layers iterated by the kernel; defaults to the widest access.
    pub ghost_layers: Option<usize>,
}

impl KernelOptions {
    /// Create default options (CPU, build defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target.
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Set the data type.
    pub fn with_data_type(mut self, data_type: ScalarType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Request or forbid OpenMP.
    pub fn with_openmp(mut self, openmp: bool) -> Self {
        self.cpu_openmp = Some(openmp);
        self
    }

    /// Set SIMD overrides.
    pub fn with_vectorize(mut self, vectorize: VectorizeOptions) -> Self {
        self.vectorize = Some(vectorize);
        self
    }

    /// Set the number of ghost layers.
    pub fn with_ghost_layers(mut self, ghost_layers: usize) -> Self {
        self.ghost_layers = Some(ghost_layers);
        self
    }
}

/// Immutable, fully resolved kernel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelConfig {
    target: Target,
    data_type: ScalarType,
    cpu_openmp: bool,
    vectorize: Option<VectorizeInfo>,
    ghost_layers: Option<usize>,
}

impl KernelConfig {
    /// Resolve `options` against the build context.
    pub fn from_context(ctx: &GenerationContext, options: &KernelOptions) -> Result<Self> {
        if options.target == Target::Gpu && !ctx.cuda {
            return Err(CodegenError::CudaUnavailable);
        }

        let data_type = options
            .data_type
            .unwrap_or_else(|| ScalarType::float_for_precision(ctx.double_accuracy));

        if options.cpu_openmp == Some(true) && !ctx.openmp {
            warn!(
                "Code is generated with OpenMP pragmas but the build has OpenMP disabled; \
                 compilation might fail due to wrong compiler flags"
            );
        }
        let cpu_openmp = options.cpu_openmp.unwrap_or(ctx.openmp);

        let overrides = options.vectorize.clone().unwrap_or_default();
        let instruction_set = match overrides.instruction_set {
            Some(set) => Some(set),
            None => ctx.vectorize_instruction_set(),
        };
        let vectorize = VectorizeInfo {
            instruction_set,
            assume_inner_stride_one: overrides.assume_inner_stride_one.unwrap_or(true),
            assume_aligned: overrides.assume_aligned.unwrap_or(false),
            nontemporal: overrides.nontemporal.unwrap_or(false),
        };

        let config = Self {
            target: options.target,
            data_type,
            cpu_openmp,
            vectorize: Some(vectorize),
            ghost_layers: options.ghost_layers,
        };
        debug!(kernel_target = %config.target, dtype = %config.data_type, openmp = cpu_openmp, "resolved kernel config");
        Ok(config)
    }

    /// Target hardware.
    pub fn target(&self) -> Target {
        self.target
    }

    /// Element type.
    pub fn data_type(&self) -> ScalarType {
        self.data_type
    }

    /// OpenMP enabled.
    pub fn cpu_openmp(&self) -> bool {
        self.cpu_openmp
    }

    /// SIMD settings, `None` when vectorization is disabled.
    pub fn vectorize(&self) -> Option<&VectorizeInfo> {
        self.vectorize.as_ref()
    }

    /// Ghost layers, `None` for the compiler default.
    pub fn ghost_layers(&self) -> Option<usize> {
        self.ghost_layers
    }

    /// Copy with a fixed number of ghost layers.
    pub fn with_ghost_layers(&self, ghost_layers: usize) -> Self {
        Self {
            ghost_layers: Some(ghost_layers),
            ..self.clone()
        }
    }

    /// Copy with vectorization disabled.
    pub fn without_vectorization(&self) -> Self {
        Self {
            vectorize: None,
            ..self.clone()
        }
    }

    /// Copy with the unit-stride assumption replaced.
    pub fn with_inner_stride_one(&self, assume: bool) -> Self {
        let mut config = self.clone();
        if let Some(v) = config.vectorize.as_mut() {
            v.assume_inner_stride_one = assume;
        }
        config
    }
}
