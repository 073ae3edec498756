//! haloforge code generators
//!
//! Generates the C++/CUDA glue a block-structured stencil framework needs
//! around compiled kernels:
//!
//! - **Pack infos** copy the ghost-layer slices a kernel reads to and from
//!   communication buffers, one kernel pair per direction group.
//! - **MPI datatype infos** list the field components exchanged per direction.
//! - **Boundary data handlers** emit the per-link additional data of
//!   free-slip, velocity and extrapolation-outflow boundaries.
//! - **Lattice models** wrap the stream-collide sweeps of an SRT method in a
//!   lattice model class.
//! - **Sweeps** wrap one kernel in a sweep class that caches temporary
//!   fields, swaps them after each call and can split inner from outer
//!   iteration.
//!
//! Kernels are compiled through the [`KernelCompiler`] seam; templates are
//! rendered with Handlebars and written through an [`ArtifactSink`].
//!
//! # Example
//!
//! ```
//! use haloforge_codegen::{
//!     GenerationContext, LoopNestCompiler, PackInfoGenerator, PackInfoOptions, Renderer,
//! };
//! use haloforge_ir::{Field, ScalarType};
//!
//! let ctx = GenerationContext::default();
//! let compiler = LoopNestCompiler::new();
//! let pdfs = Field::new("pdfs", 3, ScalarType::F64).with_index_shape([19]);
//!
//! let info = PackInfoGenerator::new(&ctx, &compiler)
//!     .for_field(&pdfs, None, &PackInfoOptions::new("PdfPackInfo"))
//!     .unwrap();
//! let files = info.render(&Renderer::new().unwrap()).unwrap();
//! assert_eq!(files[0].name, "PdfPackInfo.h");
//! assert_eq!(files[1].name, "PdfPackInfo.cpp");
//! ```

#![warn(missing_docs)]

pub mod boundary;
pub mod compiler;
pub mod config;
pub mod error;
pub mod lattice;
pub mod lowering;
pub mod mpi;
pub mod packinfo;
pub mod render;
pub mod sink;
pub mod sweep;
pub mod switch;
pub mod templates;

pub use boundary::{
    AdditionalData, AdditionalDataHandler, BoundaryKind, FreeSlipHandler, OutflowHandler,
    StencilInfoEntry, StreamingPattern, Timestep, VelocityHandler,
};
pub use compiler::{
    GpuIndexing, KernelArtifact, KernelBinding, KernelCompiler, KernelInfo, KernelParameter,
    LoopNestCompiler, ParameterKind,
};
pub use config::{
    GenerationContext, KernelConfig, KernelOptions, Target, VectorizeInfo, VectorizeOptions,
};
pub use error::{CodegenError, Result};
pub use lattice::{
    FieldLayout, LatticeKernels, LatticeModel, LatticeModelGenerator, LatticeModelOptions,
    LbMethod, RefinementScaling, ScalingKind, ScalingParameter,
};
pub use lowering::{equations_to_code, lower, SubstitutionContext};
pub use mpi::{mpi_dtype_info_from_kernel, MpiDtypeInfo, MpiDtypeSpec};
pub use packinfo::{
    pack_spec_for_field, pack_spec_from_kernel, DirectionKernels, DirectionSet, KernelFamily,
    PackInfo, PackInfoGenerator, PackInfoOptions, PackKind, PackSpec, ReductionOp,
};
pub use render::{RenderedFile, Renderer};
pub use sink::{emit_all, ArtifactSink, DirectorySink, MemorySink};
pub use sweep::{Sweep, SweepContext, SweepGenerator, SweepOptions};
pub use switch::build_switch;
