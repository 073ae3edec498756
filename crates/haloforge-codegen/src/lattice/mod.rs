//! Lattice-model class generation.
//!
//! Builds the stream-collide, collide and stream kernels of an [`LbMethod`]
//! and renders a block-framework lattice model around them: weights,
//! equilibrium switches, macroscopic getters and setters and refinement
//! scaling of level-dependent parameters.

mod method;
mod refinement;

pub use method::LbMethod;
pub use refinement::{
    relaxation_rate_scaling, RefinementScaling, ScalingEntry, ScalingInfo, ScalingKind,
    ScalingParameter,
};

use haloforge_ir::{Assignment, Expr, Field, ScalarType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::boundary::{StreamingPattern, Timestep};
use crate::compiler::{KernelBinding, KernelCompiler, KernelInfo, ParameterKind};
use crate::config::{GenerationContext, KernelConfig, KernelOptions, Target};
use crate::error::{CodegenError, Result};
use crate::lowering::{equations_to_code, lower, print_typed, SubstitutionContext};
use crate::render::{RenderedFile, Renderer};
use crate::switch::build_switch;

const PDFS: &str = "pdfs";
const PDFS_TMP: &str = "pdfs_tmp";
const CELL_INTERVAL: &str = "const CellInterval ci = pdfs->xyzSizeWithGhostLayer();";

/// Memory layout of the population field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLayout {
    /// Structure of arrays; populations of one direction are contiguous.
    Fzyx,
    /// Array of structures; populations of one cell are contiguous.
    #[default]
    Zyxf,
}

impl FieldLayout {
    /// Check if the fastest-moving coordinate is spatial.
    pub fn inner_stride_one(&self) -> bool {
        matches!(self, FieldLayout::Fzyx)
    }
}

/// Options of one lattice-model generation.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeModelOptions {
    /// Generated class name.
    pub class_name: String,
    /// Namespace of the generated class.
    pub namespace: String,
    /// Level-dependent parameter scaling.
    pub refinement_scaling: Option<RefinementScaling>,
    /// Population field layout.
    pub field_layout: FieldLayout,
    /// Kernel options of the sweeps.
    pub kernel: KernelOptions,
}

impl LatticeModelOptions {
    /// Options for a class called `class_name` in namespace `lbm`.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            namespace: "lbm".to_string(),
            refinement_scaling: None,
            field_layout: FieldLayout::default(),
            kernel: KernelOptions::new(),
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the refinement scaling rules.
    pub fn with_refinement_scaling(mut self, scaling: RefinementScaling) -> Self {
        self.refinement_scaling = Some(scaling);
        self
    }

    /// Set the field layout.
    pub fn with_field_layout(mut self, layout: FieldLayout) -> Self {
        self.field_layout = layout;
        self
    }

    /// Set the kernel options.
    pub fn with_kernel_options(mut self, kernel: KernelOptions) -> Self {
        self.kernel = kernel;
        self
    }
}

/// The three sweeps of a lattice model.
#[derive(Debug, Clone)]
pub struct LatticeKernels {
    /// Fused pull-stream and collide, out of place.
    pub stream_collide: KernelInfo,
    /// Collision in place.
    pub collide: KernelInfo,
    /// Pull streaming, out of place.
    pub stream: KernelInfo,
}

/// Format `value` with 15 significant digits, the way weights are printed.
pub fn format_significant(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{:.1}", value);
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (14 - magnitude).max(0) as usize;
    format!("{:.*}", decimals, value)
}

fn weight_list(values: &[Expr], double_accuracy: bool) -> Result<String> {
    let suffix = if double_accuracy { "" } else { "f" };
    values
        .iter()
        .map(|w| {
            let value = w.evaluate(&mut |_| None).ok_or_else(|| {
                CodegenError::InvalidInput(format!("weight '{}' is not a number", w))
            })?;
            Ok(format!("{}{}", format_significant(value), suffix))
        })
        .collect::<Result<Vec<_>>>()
        .map(|v| v.join(","))
}

/// Name of the stencil used for ghost-layer exchange.
///
/// D3Q15 reaches the corner cells, which only the full D3Q27 neighborhood
/// communicates.
pub fn communication_stencil_name(stencil_name: &str) -> &str {
    if stencil_name == "D3Q15" {
        "D3Q27"
    } else {
        stencil_name
    }
}

#[derive(Debug, Serialize)]
struct Member {
    c_type: String,
    name: String,
}

/// Kernel binding plus the sweep-local declarations its call needs.
#[derive(Debug, Serialize)]
pub struct LatticeKernelView {
    #[serde(flatten)]
    binding: KernelBinding,
    setup: Vec<String>,
}

fn kernel_view(info: &KernelInfo) -> Result<LatticeKernelView> {
    let mut setup = vec![CELL_INTERVAL.to_string()];
    setup.extend(info.field_parameter_setup("ci", ""));
    setup.extend(info.parameters().iter().filter_map(|p| match p.kind {
        ParameterKind::Scalar => Some(format!("const {} {} = lm.{}_;", p.c_type, p.name, p.name)),
        _ => None,
    }));
    Ok(LatticeKernelView {
        binding: info.binding(None)?,
        setup,
    })
}

/// Template context of a lattice model.
#[derive(Debug, Serialize)]
pub struct LatticeModelContext {
    class_name: String,
    namespace: String,
    stencil_name: String,
    communication_stencil_name: String,
    q: usize,
    compressible: bool,
    has_velocity_shift: bool,
    members: Vec<Member>,
    need_block_offsets: [bool; 3],
    pdf_indices: Vec<usize>,
    momentum_components: Vec<String>,
    velocity_components: Vec<String>,
    weights: String,
    inverse_weights: String,
    equilibrium_from_direction: String,
    symmetric_equilibrium_from_direction: String,
    asymmetric_equilibrium_from_direction: String,
    equilibrium: Vec<String>,
    density_getters: String,
    density_velocity_setter_macroscopic_values: String,
    momentum_density_getter: String,
    macroscopic_velocity_shift: Vec<String>,
    refinement_scaling_info: Vec<ScalingInfo>,
    headers: Vec<String>,
    stream_collide_kernel: LatticeKernelView,
    collide_kernel: LatticeKernelView,
    stream_kernel: LatticeKernelView,
}

/// A generated lattice model, ready to render.
#[derive(Debug)]
pub struct LatticeModel {
    /// Class name.
    pub class_name: String,
    /// Compiled sweeps.
    pub kernels: LatticeKernels,
    context: LatticeModelContext,
}

impl LatticeModel {
    /// Template context.
    pub fn context(&self) -> &LatticeModelContext {
        &self.context
    }

    /// Render `<class>.h` and `<class>.cpp`.
    pub fn render(&self, renderer: &Renderer) -> Result<Vec<RenderedFile>> {
        let files = vec![
            RenderedFile::new(
                format!("{}.h", self.class_name),
                renderer.render("LatticeModel.h", &self.context)?,
            ),
            RenderedFile::new(
                format!("{}.cpp", self.class_name),
                renderer.render("LatticeModel.cpp", &self.context)?,
            ),
        ];
        info!(class = %self.class_name, "rendered lattice model");
        Ok(files)
    }
}

/// Lattice-model generator bound to a build context and a kernel compiler.
pub struct LatticeModelGenerator<'a> {
    context: &'a GenerationContext,
    compiler: &'a dyn KernelCompiler,
}

impl<'a> LatticeModelGenerator<'a> {
    /// Create a generator.
    pub fn new(context: &'a GenerationContext, compiler: &'a dyn KernelCompiler) -> Self {
        Self { context, compiler }
    }

    /// Compile the sweeps of `method` and assemble the model.
    pub fn generate(&self, method: &LbMethod, options: &LatticeModelOptions) -> Result<LatticeModel> {
        if options.kernel.target != Target::Cpu {
            return Err(CodegenError::UnsupportedTarget {
                generator: "lattice model".to_string(),
                target: options.kernel.target.to_string(),
            });
        }
        let config = KernelConfig::from_context(self.context, &options.kernel)?
            .with_inner_stride_one(options.field_layout.inner_stride_one());
        let kernels = self.compile_kernels(method, &config)?;
        self.assemble(method, kernels, options)
    }

    /// Compile the stream-collide, collide and stream kernels.
    pub fn compile_kernels(&self, method: &LbMethod, config: &KernelConfig) -> Result<LatticeKernels> {
        let stencil = method.stencil();
        let q = stencil.len();
        let dtype = config.data_type();
        let src = Field::new(PDFS, stencil.dim(), dtype).with_index_shape([q]);
        let dst = Field::new(PDFS_TMP, stencil.dim(), dtype).with_index_shape([q]);

        let f = method.pdf_symbols();
        let rho = LbMethod::density_symbol();
        let u = method.velocity_symbols();
        let macroscopic = method.velocity_equations(&f);
        let post = method.collide(&f, &rho, &u);

        let mut pulled = Vec::with_capacity(q);
        for i in 0..q {
            let (offset, component) =
                StreamingPattern::Pull.in_access(Timestep::Even, stencil, i)?;
            pulled.push(src.access(offset, [component]));
        }

        let mut stream_collide: Vec<Assignment> = f
            .iter()
            .zip(&pulled)
            .map(|(fi, access)| Assignment::new(fi.clone(), access.clone()))
            .collect();
        stream_collide.extend(macroscopic.iter().cloned());
        stream_collide.extend(
            post.iter()
                .enumerate()
                .map(|(i, value)| Assignment::new(dst.center([i]), value.clone())),
        );

        let mut collide: Vec<Assignment> = f
            .iter()
            .enumerate()
            .map(|(i, fi)| Assignment::new(fi.clone(), src.center([i])))
            .collect();
        collide.extend(macroscopic.iter().cloned());
        collide.extend(
            post.iter()
                .enumerate()
                .map(|(i, value)| Assignment::new(src.center([i]), value.clone())),
        );

        let stream: Vec<Assignment> = pulled
            .iter()
            .enumerate()
            .map(|(i, access)| Assignment::new(dst.center([i]), access.clone()))
            .collect();

        let swaps = vec![(PDFS.to_string(), PDFS_TMP.to_string())];
        let kernels = LatticeKernels {
            stream_collide: KernelInfo::new(self.compiler.compile(
                "kernel_streamCollide",
                &stream_collide,
                config,
            )?)
            .with_temporary_fields(vec![PDFS_TMP.to_string()])
            .with_field_swaps(swaps.clone()),
            collide: KernelInfo::new(self.compiler.compile("kernel_collide", &collide, config)?),
            stream: KernelInfo::new(self.compiler.compile("kernel_stream", &stream, config)?)
                .with_temporary_fields(vec![PDFS_TMP.to_string()])
                .with_field_swaps(swaps),
        };
        debug!(q, "compiled lattice kernels");
        Ok(kernels)
    }

    /// Assemble a model from already compiled kernels.
    pub fn assemble(
        &self,
        method: &LbMethod,
        kernels: LatticeKernels,
        options: &LatticeModelOptions,
    ) -> Result<LatticeModel> {
        let stencil = method.stencil();
        let stencil_name = stencil.name().ok_or(CodegenError::UnnamedStencil)?.to_string();
        let q = stencil.len();
        let dim = method.dim();
        let dtype = ScalarType::float_for_precision(self.context.double_accuracy);

        let need_block_offsets = [0, 1, 2]
            .map(|axis| kernels.stream_collide.has_parameter(&format!("block_offset_{}", axis)));
        let members = kernels
            .stream_collide
            .parameters()
            .iter()
            .filter(|p| matches!(p.kind, ParameterKind::Scalar) && !p.name.starts_with("block_offset_"))
            .map(|p| Member {
                c_type: p.c_type.clone(),
                name: p.name.clone(),
            })
            .collect();

        let inverse: Vec<Expr> = method
            .weights()
            .iter()
            .map(|w| Expr::int(1) / w.clone())
            .collect();

        let u_vector: Vec<Expr> = (0..dim).map(|i| Expr::indexed("u", i)).collect();
        let rules: Vec<(Expr, Expr)> = method
            .velocity_symbols()
            .into_iter()
            .zip(u_vector.iter().cloned())
            .collect();
        let equilibrium: Vec<Expr> = method
            .equilibrium()
            .iter()
            .map(|e| e.substitute_all(&rules))
            .collect();
        let (symmetric, antisymmetric): (Vec<Expr>, Vec<Expr>) =
            equilibrium.iter().map(|e| e.parity_split(&u_vector)).unzip();

        let f = method.pdf_symbols();
        let f_names: Vec<String> = (0..q).map(|i| format!("f_{}", i)).collect();
        let getter_ctx = SubstitutionContext::new("lm.", dtype).without_prefix(f_names.iter().cloned());
        let rho = LbMethod::density_symbol();
        let setter = method.equilibrium_input_from_init(&Expr::symbol("rho_in"), &u_vector);
        let setter_ctx = SubstitutionContext::new("lm.", dtype).without_prefix(["rho_in", "u"]);

        let (has_velocity_shift, macroscopic_velocity_shift) =
            match method.macroscopic_velocity_shift(&rho) {
                Some(shift) => {
                    let ctx = SubstitutionContext::new("lm.", dtype).without_prefix(["rho"]);
                    let mut lowered = shift
                        .iter()
                        .map(|e| lower(e, &ctx))
                        .collect::<Result<Vec<_>>>()?;
                    lowered.resize(3, "real_t(0)".to_string());
                    (true, lowered)
                }
                None => (false, Vec::new()),
            };

        let mut velocity_components: Vec<String> =
            method.velocity_symbols().iter().map(|u| u.to_string()).collect();
        velocity_components.resize(3, "real_t(0)".to_string());

        let refinement_scaling_info = match &options.refinement_scaling {
            Some(scaling) => scaling.lowered(dtype)?,
            None => Vec::new(),
        };

        let context = LatticeModelContext {
            class_name: options.class_name.clone(),
            namespace: options.namespace.clone(),
            communication_stencil_name: communication_stencil_name(&stencil_name).to_string(),
            stencil_name,
            q,
            compressible: method.compressible(),
            has_velocity_shift,
            members,
            need_block_offsets,
            pdf_indices: (0..q).collect(),
            momentum_components: method
                .momentum_density_symbols()
                .iter()
                .map(|m| m.to_string())
                .collect(),
            velocity_components,
            weights: weight_list(method.weights(), self.context.double_accuracy)?,
            inverse_weights: weight_list(&inverse, self.context.double_accuracy)?,
            equilibrium_from_direction: build_switch(stencil, &equilibrium, dtype)?,
            symmetric_equilibrium_from_direction: build_switch(stencil, &symmetric, dtype)?,
            asymmetric_equilibrium_from_direction: build_switch(stencil, &antisymmetric, dtype)?,
            equilibrium: equilibrium.iter().map(|e| print_typed(e, dtype)).collect(),
            density_getters: equations_to_code(&method.density_equations(&f), &getter_ctx)?,
            density_velocity_setter_macroscopic_values: equations_to_code(&setter, &setter_ctx)?,
            momentum_density_getter: equations_to_code(
                &method.momentum_density_equations(&f),
                &getter_ctx,
            )?,
            macroscopic_velocity_shift,
            refinement_scaling_info,
            headers: kernels.stream_collide.artifact.headers.iter().cloned().collect(),
            stream_collide_kernel: kernel_view(&kernels.stream_collide)?,
            collide_kernel: kernel_view(&kernels.collide)?,
            stream_kernel: kernel_view(&kernels.stream)?,
        };

        Ok(LatticeModel {
            class_name: options.class_name.clone(),
            kernels,
            context,
        })
    }
}
