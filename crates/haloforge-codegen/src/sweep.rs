//! Sweep class generation.
//!
//! Wraps one kernel in a block-framework sweep: block data ids and scalar
//! members set through the constructor, temporaries cached per block and
//! swapped after each call, and optionally separate inner and outer
//! iteration for communication hiding.

use std::collections::{BTreeMap, BTreeSet};

use haloforge_ir::{Assignment, Field, FieldKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compiler::{KernelBinding, KernelCompiler, KernelInfo, ParameterKind};
use crate::config::{GenerationContext, KernelConfig, KernelOptions, Target};
use crate::error::{CodegenError, Result};
use crate::render::{RenderedFile, Renderer};

/// Options of one sweep generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepOptions {
    /// Name of the generated class.
    pub class_name: String,
    /// Inner namespace of the generated class.
    pub namespace: String,
    /// `(field, temporary)` pairs; the temporary is allocated by the sweep
    /// and swapped with the field after every call.
    pub field_swaps: Vec<(String, String)>,
    /// Scalar parameters the constructor takes even if the kernel does not
    /// use them.
    pub varying_parameters: Vec<String>,
    /// Generate `inner` / `outer` entry points.
    pub inner_outer_split: bool,
    /// Ghost layers added to the iteration space of `operator()`.
    pub ghost_layers_to_include: usize,
    /// Kernel overrides.
    pub kernel: KernelOptions,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            class_name: "Sweep".to_string(),
            namespace: "pystencils".to_string(),
            field_swaps: Vec::new(),
            varying_parameters: Vec::new(),
            inner_outer_split: false,
            ghost_layers_to_include: 0,
            kernel: KernelOptions::default(),
        }
    }
}

impl SweepOptions {
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

    /// Swap `temporary` into `field` after every call.
    pub fn with_field_swap(mut self, field: impl Into<String>, temporary: impl Into<String>) -> Self {
        self.field_swaps.push((field.into(), temporary.into()));
        self
    }

    /// Set the varying parameters.
    pub fn with_varying_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.varying_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the inner / outer split.
    pub fn with_inner_outer_split(mut self, split: bool) -> Self {
        self.inner_outer_split = split;
        self
    }

    /// Set the ghost layers included by `operator()`.
    pub fn with_ghost_layers_to_include(mut self, ghost_layers: usize) -> Self {
        self.ghost_layers_to_include = ghost_layers;
        self
    }

    /// Set kernel overrides.
    pub fn with_kernel_options(mut self, kernel: KernelOptions) -> Self {
        self.kernel = kernel;
        self
    }
}

#[derive(Debug, Serialize)]
struct BlockField {
    name: String,
    field_type: String,
}

#[derive(Debug, Serialize)]
struct TemporaryField {
    name: String,
    original: String,
    field_type: String,
}

#[derive(Debug, Clone, Serialize)]
struct ScalarMember {
    c_type: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct SweepKernelView {
    #[serde(flatten)]
    binding: KernelBinding,
    setup: Vec<String>,
}

/// Template context of a sweep.
#[derive(Debug, Serialize)]
pub struct SweepContext {
    class_name: String,
    namespace: String,
    target: String,
    gpu: bool,
    field: String,
    constructor_parameters: String,
    initialiser_list: String,
    block_fields: Vec<BlockField>,
    temporaries: Vec<TemporaryField>,
    scalars: Vec<ScalarMember>,
    block_setup: Vec<String>,
    kernel: SweepKernelView,
    kernel_ghost_layers: usize,
    iteration_ghost_layers: usize,
    inner_outer_split: bool,
    headers: Vec<String>,
}

/// A generated sweep, ready to render.
#[derive(Debug, Clone)]
pub struct Sweep {
    /// Class name.
    pub class_name: String,
    /// Namespace.
    pub namespace: String,
    /// Target hardware.
    pub target: Target,
    /// Compiled kernel with its temporaries, swaps and varying parameters.
    pub kernel: KernelInfo,
    /// Fields accessed by the kernel, by name.
    pub fields: BTreeMap<String, Field>,
    /// Ghost layers the kernel skips on each side of its interval.
    pub kernel_ghost_layers: usize,
    /// Ghost layers added to the iteration space of `operator()`.
    pub ghost_layers_to_include: usize,
    /// Inner / outer entry points are generated.
    pub inner_outer_split: bool,
    /// Scalar type of varying parameters the kernel does not use.
    default_scalar_type: String,
}

impl Sweep {
    fn field_type(&self, field: &Field) -> String {
        match self.target {
            Target::Cpu => format!(
                "field::GhostLayerField<{}, {}>",
                field.dtype.c_name(),
                field.values_per_cell()
            ),
            Target::Gpu => format!("cuda::GPUField<{}>", field.dtype.c_name()),
        }
    }

    /// Scalar constructor arguments: kernel scalars plus varying parameters.
    fn scalars(&self) -> Vec<ScalarMember> {
        let mut scalars: BTreeMap<String, String> = self
            .kernel
            .parameters()
            .iter()
            .filter(|p| matches!(p.kind, ParameterKind::Scalar))
            .map(|p| (p.name.clone(), p.c_type.clone()))
            .collect();
        for name in &self.kernel.varying_parameters {
            scalars
                .entry(name.clone())
                .or_insert_with(|| self.default_scalar_type.clone());
        }
        scalars
            .into_iter()
            .map(|(name, c_type)| ScalarMember { c_type, name })
            .collect()
    }

    /// Build the template context.
    pub fn context(&self) -> Result<SweepContext> {
        let temporaries: BTreeSet<&str> = self
            .kernel
            .temporary_fields
            .iter()
            .map(String::as_str)
            .collect();
        let block_fields: Vec<BlockField> = self
            .fields
            .values()
            .filter(|f| !temporaries.contains(f.name.as_str()))
            .map(|f| BlockField {
                name: f.name.clone(),
                field_type: self.field_type(f),
            })
            .collect();
        let field = block_fields
            .first()
            .map(|f| f.name.clone())
            .ok_or_else(|| {
                CodegenError::InvalidInput(format!(
                    "sweep '{}' only accesses temporary fields",
                    self.class_name
                ))
            })?;

        let temporary_fields = self
            .kernel
            .field_swaps
            .iter()
            .filter_map(|(original, temporary)| {
                self.fields.get(temporary).map(|f| TemporaryField {
                    name: temporary.clone(),
                    original: original.clone(),
                    field_type: self.field_type(f),
                })
            })
            .collect::<Vec<_>>();
        let scalars = self.scalars();

        // Constructor arguments in alphabetical order, fields as block data ids.
        let mut arguments: Vec<(String, String)> = block_fields
            .iter()
            .map(|f| (f.name.clone(), format!("BlockDataID {}ID_", f.name)))
            .chain(
                scalars
                    .iter()
                    .map(|s| (s.name.clone(), format!("{} {}", s.c_type, s.name))),
            )
            .collect();
        arguments.sort();
        let constructor_parameters = arguments
            .into_iter()
            .map(|(_, declaration)| declaration)
            .collect::<Vec<_>>()
            .join(", ");

        let mut initialisers: Vec<String> = block_fields
            .iter()
            .map(|f| format!("{name}ID({name}ID_)", name = f.name))
            .chain(scalars.iter().map(|s| format!("{name}_({name})", name = s.name)))
            .collect();
        if self.inner_outer_split {
            initialisers.push("outerWidth_(Cell(1, 1, 1))".to_string());
        }

        let mut block_setup: Vec<String> = block_fields
            .iter()
            .map(|f| {
                format!(
                    "auto {name} = block->getData< {ty} >({name}ID);",
                    name = f.name,
                    ty = f.field_type
                )
            })
            .collect();
        for t in &temporary_fields {
            block_setup.extend([
                format!("{} * {};", t.field_type, t.name),
                "{".to_string(),
                format!("    auto it = cache_{}.find( block );", t.name),
                format!("    if( it != cache_{}.end() )", t.name),
                "    {".to_string(),
                format!("        {} = it->second;", t.name),
                "    }".to_string(),
                "    else".to_string(),
                "    {".to_string(),
                format!("        {} = {}->cloneUninitialized();", t.name, t.original),
                format!("        cache_{}[block] = {};", t.name, t.name),
                "    }".to_string(),
                "}".to_string(),
            ]);
        }
        block_setup.extend(
            self.kernel
                .parameters()
                .iter()
                .filter(|p| matches!(p.kind, ParameterKind::Scalar))
                .map(|p| format!("auto & {name} = this->{name}_;", name = p.name)),
        );

        let stream = match self.target {
            Target::Cpu => None,
            Target::Gpu => Some("stream"),
        };

        Ok(SweepContext {
            class_name: self.class_name.clone(),
            namespace: self.namespace.clone(),
            target: self.target.to_string(),
            gpu: self.target == Target::Gpu,
            field,
            constructor_parameters,
            initialiser_list: initialisers.join(", "),
            block_fields,
            temporaries: temporary_fields,
            scalars,
            block_setup,
            kernel: SweepKernelView {
                binding: self.kernel.binding(stream)?,
                setup: self.kernel.field_parameter_setup("ci", ""),
            },
            kernel_ghost_layers: self.kernel_ghost_layers,
            iteration_ghost_layers: self.kernel_ghost_layers + self.ghost_layers_to_include,
            inner_outer_split: self.inner_outer_split,
            headers: self.kernel.artifact.headers.iter().cloned().collect(),
        })
    }

    /// Render `<class>.h` and `<class>.cpp` (`.cu` on GPU).
    pub fn render(&self, renderer: &Renderer) -> Result<Vec<RenderedFile>> {
        let context = self.context()?;
        let files = vec![
            RenderedFile::new(
                format!("{}.h", self.class_name),
                renderer.render("Sweep.h", &context)?,
            ),
            RenderedFile::new(
                format!("{}.{}", self.class_name, self.target.source_extension()),
                renderer.render("Sweep.cpp", &context)?,
            ),
        ];
        info!(class = %self.class_name, target = %self.target, "rendered sweep");
        Ok(files)
    }
}

/// Sweep generator bound to a build context and a kernel compiler.
pub struct SweepGenerator<'a> {
    context: &'a GenerationContext,
    compiler: &'a dyn KernelCompiler,
}

impl<'a> SweepGenerator<'a> {
    /// Create a generator.
    pub fn new(context: &'a GenerationContext, compiler: &'a dyn KernelCompiler) -> Self {
        Self { context, compiler }
    }

    /// Compile `assignments` into the kernel of a sweep class.
    ///
    /// The kernel function is the lower-cased class name. It skips as many
    /// ghost layers as its widest neighbor access reaches.
    pub fn generate(&self, assignments: &[Assignment], options: &SweepOptions) -> Result<Sweep> {
        let config = KernelConfig::from_context(self.context, &options.kernel)?;

        let mut fields = BTreeMap::new();
        let mut kernel_ghost_layers = 0;
        for a in assignments {
            for fa in a.reads().into_iter().chain(a.writes()) {
                if fa.field.kind != FieldKind::Generic {
                    continue;
                }
                let reach = fa
                    .offset
                    .offsets()
                    .iter()
                    .map(|c| c.unsigned_abs() as usize)
                    .max()
                    .unwrap_or(0);
                kernel_ghost_layers = kernel_ghost_layers.max(reach);
                fields.entry(fa.field.name.clone()).or_insert(fa.field);
            }
        }

        for (field, temporary) in &options.field_swaps {
            for name in [field, temporary] {
                if !fields.contains_key(name) {
                    return Err(CodegenError::InvalidInput(format!(
                        "field swap ({}, {}) names '{}', which the kernel does not access",
                        field, temporary, name
                    )));
                }
            }
        }
        if options.inner_outer_split && fields.values().any(|f| f.spatial_dimensions != 3) {
            return Err(CodegenError::InvalidInput(
                "inner/outer split needs three-dimensional fields".to_string(),
            ));
        }

        let config = config.with_ghost_layers(kernel_ghost_layers);
        let function_name = options.class_name.to_lowercase();
        let artifact = self.compiler.compile(&function_name, assignments, &config)?;
        let kernel = KernelInfo::new(artifact)
            .with_temporary_fields(options.field_swaps.iter().map(|(_, t)| t.clone()).collect())
            .with_field_swaps(options.field_swaps.clone())
            .with_varying_parameters(options.varying_parameters.clone());
        debug!(
            class = %options.class_name,
            fields = fields.len(),
            kernel_ghost_layers,
            "compiled sweep kernel"
        );

        Ok(Sweep {
            class_name: options.class_name.clone(),
            namespace: options.namespace.clone(),
            target: config.target(),
            kernel,
            fields,
            kernel_ghost_layers,
            ghost_layers_to_include: options.ghost_layers_to_include,
            inner_outer_split: options.inner_outer_split,
            default_scalar_type: config.data_type().c_name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::LoopNestCompiler;
    use haloforge_ir::{Expr, ScalarType, Stencil};

    fn stream_kernel(stencil: &Stencil) -> Vec<Assignment> {
        let q = stencil.len();
        let src = Field::new("pdfs", stencil.dim(), ScalarType::F64).with_index_shape([q]);
        let dst = Field::new("pdfs_tmp", stencil.dim(), ScalarType::F64).with_index_shape([q]);
        stencil
            .iter()
            .enumerate()
            .map(|(i, d)| Assignment::new(dst.center([i]), src.access(d.inverse(), [i])))
            .collect()
    }

    fn scale_kernel() -> Vec<Assignment> {
        let src = Field::new("src", 3, ScalarType::F64);
        let dst = Field::new("dst", 3, ScalarType::F64);
        vec![Assignment::new(
            dst.center(vec![]),
            Expr::from(src.center(vec![])) * Expr::symbol("omega"),
        )]
    }

    fn generate(assignments: &[Assignment], options: &SweepOptions) -> Result<Sweep> {
        let ctx = GenerationContext::default().with_cuda(true);
        let compiler = LoopNestCompiler::new();
        SweepGenerator::new(&ctx, &compiler).generate(assignments, options)
    }

    #[test]
    fn test_streaming_sweep_swaps_temporary() {
        let options = SweepOptions::new("StreamSweep").with_field_swap("pdfs", "pdfs_tmp");
        let sweep = generate(&stream_kernel(&Stencil::d3q19()), &options).unwrap();
        assert_eq!(sweep.kernel.artifact.function_name, "streamsweep");
        assert_eq!(sweep.kernel.temporary_fields, vec!["pdfs_tmp".to_string()]);
        assert_eq!(sweep.kernel_ghost_layers, 1);

        let files = sweep.render(&Renderer::new().unwrap()).unwrap();
        assert_eq!(files[0].name, "StreamSweep.h");
        assert_eq!(files[1].name, "StreamSweep.cpp");
        let header = &files[0].content;
        assert!(header.contains("StreamSweep( BlockDataID pdfsID_ )"));
        assert!(header.contains(": pdfsID(pdfsID_)"));
        assert!(header.contains(
            "std::unordered_map< IBlock *, field::GhostLayerField<double, 19> * > cache_pdfs_tmp;"
        ));
        let source = &files[1].content;
        assert!(source.contains("auto pdfs = block->getData< field::GhostLayerField<double, 19> >(pdfsID);"));
        assert!(source.contains("        pdfs_tmp = pdfs->cloneUninitialized();"));
        assert!(source.contains("    ci.expand( cell_idx_c(1) );"));
        assert!(source.contains("    internal_streamsweep::streamsweep("));
        assert!(source.contains("    pdfs->swapDataPointers(pdfs_tmp);"));
        assert!(!source.contains("::outer("));
    }

    #[test]
    fn test_constructor_takes_varying_parameters() {
        let options = SweepOptions::new("Scale").with_varying_parameters(["alpha", "omega"]);
        let sweep = generate(&scale_kernel(), &options).unwrap();
        let context = sweep.context().unwrap();
        assert_eq!(
            context.constructor_parameters,
            "double alpha, BlockDataID dstID_, double omega, BlockDataID srcID_"
        );
        assert_eq!(
            context.initialiser_list,
            "dstID(dstID_), srcID(srcID_), alpha_(alpha), omega_(omega)"
        );
        // Only the scalar the kernel takes is bound locally.
        assert!(context.block_setup.contains(&"auto & omega = this->omega_;".to_string()));
        assert!(!context.block_setup.iter().any(|l| l.contains("alpha")));
        assert_eq!(context.field, "dst");
        assert_eq!(sweep.kernel_ghost_layers, 0);
    }

    #[test]
    fn test_ghost_layers_to_include() {
        let options = SweepOptions::new("StreamSweep")
            .with_field_swap("pdfs", "pdfs_tmp")
            .with_ghost_layers_to_include(2);
        let sweep = generate(&stream_kernel(&Stencil::d3q19()), &options).unwrap();
        assert_eq!(sweep.context().unwrap().iteration_ghost_layers, 3);
    }

    #[test]
    fn test_inner_outer_split() {
        let options = SweepOptions::new("StreamSweep")
            .with_field_swap("pdfs", "pdfs_tmp")
            .with_inner_outer_split(true);
        let sweep = generate(&stream_kernel(&Stencil::d3q19()), &options).unwrap();
        let files = sweep.render(&Renderer::new().unwrap()).unwrap();
        assert!(files[0].content.contains(": pdfsID(pdfsID_), outerWidth_(Cell(1, 1, 1))"));
        assert!(files[0].content.contains("void setOuterWidth( const Cell & outerWidth )"));
        let source = &files[1].content;
        assert!(source.contains("void StreamSweep::inner( IBlock * block )"));
        assert!(source.contains("void StreamSweep::outer( IBlock * block )"));
        assert!(source.contains("pdfs->getSliceBeforeGhostLayer(stencil::T, ci, outerWidth_[2], false);"));
        assert!(source.contains("ci.expand( Cell( -outerWidth_[0], -outerWidth_[1], -outerWidth_[2] ) );"));
        // The swap follows the full call and the outer part, not the inner one.
        assert_eq!(source.matches("pdfs->swapDataPointers(pdfs_tmp);").count(), 2);
    }

    #[test]
    fn test_invalid_swap_and_split_rejected() {
        let options = SweepOptions::new("Bad").with_field_swap("pdfs", "missing");
        assert!(matches!(
            generate(&stream_kernel(&Stencil::d3q19()), &options),
            Err(CodegenError::InvalidInput(_))
        ));

        let options = SweepOptions::new("Flat").with_inner_outer_split(true);
        assert!(matches!(
            generate(&stream_kernel(&Stencil::d2q9()), &options),
            Err(CodegenError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_gpu_sweep() {
        let options = SweepOptions::new("StreamSweep")
            .with_field_swap("pdfs", "pdfs_tmp")
            .with_kernel_options(KernelOptions::new().with_target(Target::Gpu));
        let sweep = generate(&stream_kernel(&Stencil::d3q19()), &options).unwrap();
        let files = sweep.render(&Renderer::new().unwrap()).unwrap();
        assert_eq!(files[1].name, "StreamSweep.cu");
        assert!(files[0].content.contains("void operator()( IBlock * block, cudaStream_t stream = nullptr );"));
        assert!(files[0].content.contains("cache_pdfs_tmp"));
        assert!(files[0].content.contains("cuda::GPUField<double> *"));
        assert!(files[1].content.contains("<<<_grid, _block, 0, stream>>>"));
    }
}
