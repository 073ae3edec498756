//! Kernel compilation seam.
//!
//! Generators hand assignment lists to a [`KernelCompiler`] and only look at
//! the resulting [`KernelArtifact`]: its name, ordered parameters, headers
//! and launch geometry. [`LoopNestCompiler`] is a deterministic reference
//! implementation that emits plain C++ loop nests or CUDA thread-indexed
//! kernels.

use std::collections::{BTreeMap, BTreeSet};

use haloforge_ir::{Assignment, CPrinter, Expr, Field, FieldAccess, FieldKind};
use serde::Serialize;
use tracing::debug;

use crate::config::{KernelConfig, Target};
use crate::error::{CodegenError, Result};
use crate::lowering::type_expr;

/// Role of a kernel parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterKind {
    /// Base pointer of a field.
    FieldPointer {
        /// Field name.
        field: String,
        /// Field is only read.
        read_only: bool,
    },
    /// Extent of a field along a spatial coordinate.
    FieldShape {
        /// Field name.
        field: String,
        /// Coordinate.
        coordinate: usize,
    },
    /// Stride of a field along a spatial or index coordinate.
    FieldStride {
        /// Field name.
        field: String,
        /// Coordinate.
        coordinate: usize,
    },
    /// Free scalar.
    Scalar,
}

/// One kernel function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelParameter {
    /// Parameter name in the kernel signature.
    pub name: String,
    /// C type.
    pub c_type: String,
    /// Role.
    #[serde(flatten)]
    pub kind: ParameterKind,
}

impl KernelParameter {
    /// Field this parameter belongs to, if any.
    pub fn field_name(&self) -> Option<&str> {
        match &self.kind {
            ParameterKind::FieldPointer { field, .. }
            | ParameterKind::FieldShape { field, .. }
            | ParameterKind::FieldStride { field, .. } => Some(field),
            ParameterKind::Scalar => None,
        }
    }
}

/// CUDA launch geometry of a kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuIndexing {
    /// Threads per block along x, y, z.
    pub block_size: [usize; 3],
    /// Ghost layers excluded from the iteration space on each side.
    pub ghost_layers: usize,
}

impl GpuIndexing {
    /// Block and grid extents for the given spatial shape expressions.
    pub fn call_parameters(&self, spatial_shape: &[String]) -> ([String; 3], [String; 3]) {
        let block = self.block_size.map(|b| b.to_string());
        let mut grid = [String::from("1"), String::from("1"), String::from("1")];
        for (axis, shape) in spatial_shape.iter().take(3).enumerate() {
            let b = self.block_size[axis];
            let interior = if self.ghost_layers == 0 {
                shape.clone()
            } else {
                format!("{} - {}", shape, 2 * self.ghost_layers)
            };
            grid[axis] = format!("({} + {} - 1) / {}", interior, b, b);
        }
        (block, grid)
    }
}

/// A compiled kernel function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelArtifact {
    /// Function name.
    pub function_name: String,
    /// Parameters in signature order.
    pub parameters: Vec<KernelParameter>,
    /// Target hardware.
    pub target: Target,
    /// Required include directives.
    pub headers: BTreeSet<String>,
    /// Function definition, wrapped in `namespace internal_<name>`.
    pub source: String,
    /// Launch geometry (GPU targets only).
    pub gpu_indexing: Option<GpuIndexing>,
    /// Names of all fields the kernel touches.
    pub fields_accessed: BTreeSet<String>,
}

/// Compiles assignment lists into kernel functions.
pub trait KernelCompiler: Send + Sync {
    /// Compile `assignments` into a function called `name`.
    fn compile(
        &self,
        name: &str,
        assignments: &[Assignment],
        config: &KernelConfig,
    ) -> Result<KernelArtifact>;
}

/// Reference compiler emitting one loop nest per kernel.
#[derive(Debug, Clone)]
pub struct LoopNestCompiler {
    block_size: [usize; 3],
}

impl Default for LoopNestCompiler {
    fn default() -> Self {
        Self {
            block_size: [64, 4, 2],
        }
    }
}

impl LoopNestCompiler {
    /// Create a compiler with the default CUDA block size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CUDA block size.
    pub fn with_block_size(mut self, block_size: [usize; 3]) -> Self {
        self.block_size = block_size;
        self
    }
}

fn counter(axis: usize) -> String {
    format!("ctr_{}", axis)
}

fn shifted(value: &str, by: usize) -> String {
    if by == 0 {
        value.to_string()
    } else {
        format!("({} - {})", value, by)
    }
}

/// Fields of a kernel, split into grid fields and linear buffers.
struct FieldTable {
    fields: BTreeMap<String, Field>,
    written: BTreeSet<String>,
}

impl FieldTable {
    fn collect(assignments: &[Assignment]) -> Self {
        let mut fields = BTreeMap::new();
        let mut written = BTreeSet::new();
        for a in assignments {
            for fa in a.writes() {
                written.insert(fa.field.name.clone());
                fields.entry(fa.field.name.clone()).or_insert(fa.field);
            }
            for fa in a.reads() {
                fields.entry(fa.field.name.clone()).or_insert(fa.field);
            }
        }
        Self { fields, written }
    }

    fn shape_field(&self) -> Option<&Field> {
        self.fields.values().find(|f| f.kind == FieldKind::Generic)
    }

    fn has_buffer(&self) -> bool {
        self.fields.values().any(|f| f.kind == FieldKind::Buffer)
    }
}

struct LoweredKernel<'a> {
    table: &'a FieldTable,
    shape_field: &'a Field,
    dim: usize,
    ghost_layers: usize,
    printer: CPrinter,
}

impl LoweredKernel<'_> {
    fn access_text(&self, fa: &FieldAccess) -> String {
        let name = &fa.field.name;
        if fa.field.kind == FieldKind::Buffer {
            let per_cell = fa.field.values_per_cell().max(1);
            let index = fa.index.first().copied().unwrap_or(0);
            return format!("_data_{}[{}*buffer_idx + {}]", name, per_cell, index);
        }
        let mut terms = Vec::new();
        for axis in 0..fa.field.spatial_dimensions {
            let offset = fa.offset.component(axis);
            let position = match offset {
                0 => counter(axis),
                o if o > 0 => format!("({} + {})", counter(axis), o),
                o => format!("({} - {})", counter(axis), -o),
            };
            terms.push(format!("{}*_stride_{}_{}", position, name, axis));
        }
        for (k, i) in fa.index.iter().enumerate() {
            terms.push(format!(
                "{}*_stride_{}_{}",
                i,
                name,
                fa.field.spatial_dimensions + k
            ));
        }
        format!("_data_{}[{}]", name, terms.join(" + "))
    }

    fn lower_expr(&self, expr: &Expr) -> String {
        let replaced = expr.map_leaves(&mut |leaf| match leaf {
            Expr::Access(fa) => Some(Expr::symbol(self.access_text(fa))),
            _ => None,
        });
        self.printer.print(&replaced)
    }

    fn statement(&self, a: &Assignment, dtype: &str) -> String {
        let rhs = self.lower_expr(&a.rhs);
        match &a.lhs {
            Expr::Access(fa) => format!("{} = {};", self.access_text(fa), rhs),
            other => format!("const {} {} = {};", dtype, self.printer.print(other), rhs),
        }
    }

    fn buffer_index(&self) -> String {
        let gl = self.ghost_layers;
        let sizes: Vec<String> = (0..self.dim)
            .map(|axis| {
                let size = format!("_size_{}_{}", self.shape_field.name, axis);
                if gl == 0 {
                    size
                } else {
                    format!("({} - {})", size, 2 * gl)
                }
            })
            .collect();
        let mut linear = shifted(&counter(self.dim - 1), gl);
        for axis in (0..self.dim - 1).rev() {
            linear = format!(
                "{} + {}*({})",
                shifted(&counter(axis), gl),
                sizes[axis],
                linear
            );
        }
        format!("const int64_t buffer_idx = {};", linear)
    }

    fn body(&self, assignments: &[Assignment], dtype: &str, indent: &str) -> Vec<String> {
        let mut lines = Vec::new();
        if self.table.has_buffer() {
            lines.push(format!("{}{}", indent, self.buffer_index()));
        }
        for a in assignments {
            lines.push(format!("{}{}", indent, self.statement(a, dtype)));
        }
        lines
    }
}

impl LoopNestCompiler {
    fn parameters(
        &self,
        table: &FieldTable,
        shape_field: &Field,
        assignments: &[Assignment],
        dtype: &str,
    ) -> Vec<KernelParameter> {
        let mut params = Vec::new();
        for (name, field) in &table.fields {
            let read_only = !table.written.contains(name);
            let qualifier = if read_only { "const " } else { "" };
            params.push(KernelParameter {
                name: format!("_data_{}", name),
                c_type: format!("{}{} * RESTRICT", qualifier, field.dtype.c_name()),
                kind: ParameterKind::FieldPointer {
                    field: name.clone(),
                    read_only,
                },
            });
        }
        for coordinate in 0..shape_field.spatial_dimensions {
            params.push(KernelParameter {
                name: format!("_size_{}_{}", shape_field.name, coordinate),
                c_type: "int64_t const".to_string(),
                kind: ParameterKind::FieldShape {
                    field: shape_field.name.clone(),
                    coordinate,
                },
            });
        }
        for (name, field) in &table.fields {
            if field.kind == FieldKind::Buffer {
                continue;
            }
            for coordinate in 0..field.spatial_dimensions + field.index_dimensions() {
                params.push(KernelParameter {
                    name: format!("_stride_{}_{}", name, coordinate),
                    c_type: "int64_t const".to_string(),
                    kind: ParameterKind::FieldStride {
                        field: name.clone(),
                        coordinate,
                    },
                });
            }
        }
        let locals: BTreeSet<String> = assignments
            .iter()
            .filter_map(|a| match &a.lhs {
                Expr::Symbol(s) => Some(s.name.clone()),
                _ => None,
            })
            .collect();
        let scalars: BTreeSet<String> = assignments
            .iter()
            .flat_map(|a| a.rhs.symbols())
            .map(|s| s.name)
            .filter(|name| !locals.contains(name))
            .collect();
        for name in scalars {
            params.push(KernelParameter {
                name,
                c_type: dtype.to_string(),
                kind: ParameterKind::Scalar,
            });
        }
        params
    }
}

impl KernelCompiler for LoopNestCompiler {
    fn compile(
        &self,
        name: &str,
        assignments: &[Assignment],
        config: &KernelConfig,
    ) -> Result<KernelArtifact> {
        let table = FieldTable::collect(assignments);
        let shape_field = table.shape_field().ok_or_else(|| {
            CodegenError::Compile(format!("kernel '{}' accesses no spatial field", name))
        })?;
        let dim = shape_field.spatial_dimensions.clamp(1, 3);
        let ghost_layers = config.ghost_layers().unwrap_or_else(|| {
            assignments
                .iter()
                .flat_map(|a| a.reads().into_iter().chain(a.writes()))
                .filter(|fa| fa.field.kind == FieldKind::Generic)
                .flat_map(|fa| fa.offset.offsets().to_vec())
                .map(|c| c.unsigned_abs() as usize)
                .max()
                .unwrap_or(0)
        });

        let dtype = config.data_type();
        let typed: Vec<Assignment> = assignments
            .iter()
            .map(|a| Assignment {
                lhs: a.lhs.clone(),
                rhs: type_expr(&a.rhs, dtype),
            })
            .collect();

        let lowered = LoweredKernel {
            table: &table,
            shape_field,
            dim,
            ghost_layers,
            printer: CPrinter::typed(dtype),
        };
        let parameters = self.parameters(&table, shape_field, assignments, dtype.c_name());
        let signature = parameters
            .iter()
            .map(|p| format!("{} {}", p.c_type, p.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut headers = BTreeSet::new();
        headers.insert("<math.h>".to_string());
        headers.insert("<stdint.h>".to_string());

        let mut lines = vec![format!("namespace internal_{} {{", name)];
        let gpu_indexing = match config.target() {
            Target::Cpu => {
                if config.cpu_openmp() {
                    headers.insert("<omp.h>".to_string());
                }
                lines.push(format!("static FUNC_PREFIX void {}({})", name, signature));
                lines.push("{".to_string());
                let mut indent = String::from("   ");
                for axis in (0..dim).rev() {
                    if axis == dim - 1 && config.cpu_openmp() {
                        lines.push(format!("{}#pragma omp parallel for schedule(static)", indent));
                    }
                    let ctr = counter(axis);
                    lines.push(format!(
                        "{indent}for (int64_t {ctr} = {gl}; {ctr} < _size_{f}_{axis} - {gl}; {ctr} += 1)",
                        indent = indent,
                        ctr = ctr,
                        gl = ghost_layers,
                        f = shape_field.name,
                        axis = axis
                    ));
                    lines.push(format!("{}{{", indent));
                    indent.push_str("   ");
                }
                lines.extend(lowered.body(&typed, dtype.c_name(), &indent));
                for _ in 0..dim {
                    indent.truncate(indent.len() - 3);
                    lines.push(format!("{}}}", indent));
                }
                lines.push("}".to_string());
                None
            }
            Target::Gpu => {
                let threads = ["x", "y", "z"];
                lines.push(format!(
                    "static FUNC_PREFIX __launch_bounds__({}) void {}({})",
                    self.block_size.iter().product::<usize>(),
                    name,
                    signature
                ));
                lines.push("{".to_string());
                let conditions: Vec<String> = (0..dim)
                    .map(|axis| {
                        format!(
                            "blockDim.{t}*blockIdx.{t} + threadIdx.{t} + {gl} < _size_{f}_{axis} - {gl}",
                            t = threads[axis],
                            gl = ghost_layers,
                            f = shape_field.name,
                            axis = axis
                        )
                    })
                    .collect();
                lines.push(format!("   if ({})", conditions.join(" && ")));
                lines.push("   {".to_string());
                for (axis, t) in threads.iter().enumerate().take(dim) {
                    lines.push(format!(
                        "      const int64_t {} = blockDim.{t}*blockIdx.{t} + threadIdx.{t} + {gl};",
                        counter(axis),
                        t = t,
                        gl = ghost_layers
                    ));
                }
                lines.extend(lowered.body(&typed, dtype.c_name(), "      "));
                lines.push("   }".to_string());
                lines.push("}".to_string());
                Some(GpuIndexing {
                    block_size: self.block_size,
                    ghost_layers,
                })
            }
        };
        lines.push(format!("}} // namespace internal_{}", name));

        debug!(kernel = name, parameters = parameters.len(), ghost_layers, "compiled kernel");
        Ok(KernelArtifact {
            function_name: name.to_string(),
            parameters,
            target: config.target(),
            headers,
            source: lines.join("\n"),
            gpu_indexing,
            fields_accessed: table.fields.keys().cloned().collect(),
        })
    }
}

/// A compiled kernel plus the sweep-level data needed to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInfo {
    /// Compiled kernel.
    pub artifact: KernelArtifact,
    /// Fields allocated internally as temporaries.
    pub temporary_fields: Vec<String>,
    /// Field pairs swapped after each invocation.
    pub field_swaps: Vec<(String, String)>,
    /// Parameters always accepted even if unused.
    pub varying_parameters: Vec<String>,
}

/// Template-facing view of a [`KernelInfo`].
#[derive(Debug, Clone, Serialize)]
pub struct KernelBinding {
    /// Function name.
    pub function_name: String,
    /// Parameters in signature order.
    pub parameters: Vec<KernelParameter>,
    /// Comma-separated call arguments.
    pub call_parameters: String,
    /// Invocation statement(s).
    pub invocation: String,
    /// Function definition.
    pub source: String,
    /// Temporaries.
    pub temporary_fields: Vec<String>,
    /// Swapped field pairs.
    pub field_swaps: Vec<(String, String)>,
}

impl KernelInfo {
    /// Wrap an artifact without temporaries or swaps.
    pub fn new(artifact: KernelArtifact) -> Self {
        Self {
            artifact,
            temporary_fields: Vec::new(),
            field_swaps: Vec::new(),
            varying_parameters: Vec::new(),
        }
    }

    /// Set temporary fields.
    pub fn with_temporary_fields(mut self, fields: Vec<String>) -> Self {
        self.temporary_fields = fields;
        self
    }

    /// Set field swaps.
    pub fn with_field_swaps(mut self, swaps: Vec<(String, String)>) -> Self {
        self.field_swaps = swaps;
        self
    }

    /// Set parameters accepted even if the kernel does not use them.
    pub fn with_varying_parameters(mut self, names: Vec<String>) -> Self {
        self.varying_parameters = names;
        self
    }

    /// Ordered parameters of the kernel.
    pub fn parameters(&self) -> &[KernelParameter] {
        &self.artifact.parameters
    }

    /// Check if the kernel takes a parameter called `name`.
    pub fn has_parameter(&self, name: &str) -> bool {
        self.artifact.parameters.iter().any(|p| p.name == name)
    }

    /// Comma-separated argument list.
    pub fn call_parameters(&self) -> String {
        self.artifact
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render the call statement.
    ///
    /// CPU kernels are called as `internal_f::f(args);`. GPU kernels get
    /// `_block` / `_grid` declarations and a launch on `stream` (default `0`);
    /// the grid is derived from `spatial_shape` or, when empty, from the
    /// kernel's shape parameters.
    pub fn invocation_code(&self, stream: Option<&str>, spatial_shape: &[String]) -> Result<String> {
        let name = &self.artifact.function_name;
        let args = self.call_parameters();
        let indexing = match (&self.artifact.target, &self.artifact.gpu_indexing) {
            (Target::Cpu, _) => return Ok(format!("internal_{}::{}({});", name, name, args)),
            (Target::Gpu, Some(indexing)) => indexing,
            (Target::Gpu, None) => {
                return Err(CodegenError::Compile(format!(
                    "GPU kernel '{}' has no launch geometry",
                    name
                )))
            }
        };

        let shape: Vec<String> = if spatial_shape.is_empty() {
            let mut shape_params: Vec<(usize, &str)> = self
                .artifact
                .parameters
                .iter()
                .filter_map(|p| match &p.kind {
                    ParameterKind::FieldShape { coordinate, .. } => {
                        Some((*coordinate, p.name.as_str()))
                    }
                    _ => None,
                })
                .collect();
            shape_params.sort();
            shape_params.into_iter().map(|(_, n)| n.to_string()).collect()
        } else {
            spatial_shape.to_vec()
        };
        if shape.is_empty() {
            return Err(CodegenError::Compile(format!(
                "No shape parameters in arguments of kernel '{}'; only kernels for generic field sizes can be launched",
                name
            )));
        }

        let (block, grid) = indexing.call_parameters(&shape);
        Ok([
            format!("dim3 _block(int({}), int({}), int({}));", block[0], block[1], block[2]),
            format!("dim3 _grid(int({}), int({}), int({}));", grid[0], grid[1], grid[2]),
            format!(
                "internal_{}::{}<<<_grid, _block, 0, {}>>>({});",
                name,
                name,
                stream.unwrap_or("0"),
                args
            ),
        ]
        .join("\n"))
    }

    /// Local declarations binding kernel parameters to block-framework field
    /// objects over the cell interval `interval`.
    pub fn field_parameter_setup(&self, interval: &str, buffer_expr: &str) -> Vec<String> {
        let axes = ["x", "y", "z", "f"];
        self.artifact
            .parameters
            .iter()
            .filter_map(|p| match &p.kind {
                ParameterKind::FieldPointer { field, .. } if field == "buffer" => {
                    Some(format!("{} {} = {};", p.c_type, p.name, buffer_expr))
                }
                ParameterKind::FieldPointer { field, .. } => Some(format!(
                    "{} {} = {}->dataAt({i}.xMin(), {i}.yMin(), {i}.zMin(), 0);",
                    p.c_type,
                    p.name,
                    field,
                    i = interval
                )),
                ParameterKind::FieldShape { coordinate, .. } => Some(format!(
                    "const int64_t {} = int64_t(cell_idx_c({}.{}Size()));",
                    p.name,
                    interval,
                    axes[(*coordinate).min(2)]
                )),
                ParameterKind::FieldStride { field, coordinate } => Some(format!(
                    "const int64_t {} = int64_t({}->{}Stride());",
                    p.name,
                    field,
                    axes[(*coordinate).min(3)]
                )),
                ParameterKind::Scalar => None,
            })
            .collect()
    }

    /// Template view with the invocation rendered for `stream`.
    pub fn binding(&self, stream: Option<&str>) -> Result<KernelBinding> {
        Ok(KernelBinding {
            function_name: self.artifact.function_name.clone(),
            parameters: self.artifact.parameters.clone(),
            call_parameters: self.call_parameters(),
            invocation: self.invocation_code(stream, &[])?,
            source: self.artifact.source.clone(),
            temporary_fields: self.temporary_fields.clone(),
            field_swaps: self.field_swaps.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationContext, KernelOptions};
    use haloforge_ir::{Direction, ScalarType};

    fn cpu_config() -> KernelConfig {
        KernelConfig::from_context(&GenerationContext::default(), &KernelOptions::new()).unwrap()
    }

    fn copy_kernel() -> Vec<Assignment> {
        let src = Field::new("src", 3, ScalarType::F64).with_index_shape([2]);
        let dst = Field::new("dst", 3, ScalarType::F64).with_index_shape([2]);
        vec![
            Assignment::new(dst.center([0]), src.access(Direction::from([-1, 0, 0]), [0])),
            Assignment::new(
                dst.center([1]),
                Expr::from(src.center([1])) * Expr::symbol("omega"),
            ),
        ]
    }

    #[test]
    fn test_parameter_order() {
        let artifact = LoopNestCompiler::new()
            .compile("copy", &copy_kernel(), &cpu_config())
            .unwrap();
        let names: Vec<&str> = artifact.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(&names[..2], ["_data_dst", "_data_src"]);
        assert_eq!(&names[2..5], ["_size_dst_0", "_size_dst_1", "_size_dst_2"]);
        assert_eq!(names.last(), Some(&"omega"));
        assert_eq!(artifact.parameters[1].c_type, "const double * RESTRICT");
        assert!(artifact.fields_accessed.contains("src"));
    }

    #[test]
    fn test_cpu_loop_nest() {
        let artifact = LoopNestCompiler::new()
            .compile("copy", &copy_kernel(), &cpu_config())
            .unwrap();
        assert!(artifact.source.starts_with("namespace internal_copy {"));
        assert!(artifact
            .source
            .contains("for (int64_t ctr_2 = 1; ctr_2 < _size_dst_2 - 1; ctr_2 += 1)"));
        assert!(artifact.source.contains("(ctr_0 - 1)*_stride_src_0"));
        assert!(artifact.source.contains("* omega"));
        assert!(artifact.gpu_indexing.is_none());
    }

    #[test]
    fn test_cpu_invocation() {
        let artifact = LoopNestCompiler::new()
            .compile("copy", &copy_kernel(), &cpu_config().with_ghost_layers(0))
            .unwrap();
        let info = KernelInfo::new(artifact);
        let code = info.invocation_code(None, &[]).unwrap();
        assert!(code.starts_with("internal_copy::copy(_data_dst, _data_src, _size_dst_0"));
        assert!(code.ends_with("omega);"));
    }

    #[test]
    fn test_gpu_invocation() {
        let ctx = GenerationContext::default().with_cuda(true);
        let config =
            KernelConfig::from_context(&ctx, &KernelOptions::new().with_target(Target::Gpu))
                .unwrap()
                .with_ghost_layers(0);
        let artifact = LoopNestCompiler::new()
            .compile("copy", &copy_kernel(), &config)
            .unwrap();
        let info = KernelInfo::new(artifact);
        let code = info.invocation_code(Some("stream"), &[]).unwrap();
        let lines: Vec<&str> = code.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "dim3 _block(int(64), int(4), int(2));");
        assert!(lines[1].starts_with("dim3 _grid(int((_size_dst_0 + 64 - 1) / 64)"));
        assert!(lines[2].starts_with("internal_copy::copy<<<_grid, _block, 0, stream>>>("));
    }

    #[test]
    fn test_custom_block_size() {
        let ctx = GenerationContext::default().with_cuda(true);
        let config =
            KernelConfig::from_context(&ctx, &KernelOptions::new().with_target(Target::Gpu))
                .unwrap()
                .with_ghost_layers(0);
        let artifact = LoopNestCompiler::new()
            .with_block_size([128, 1, 1])
            .compile("copy", &copy_kernel(), &config)
            .unwrap();
        assert!(artifact.source.contains("__launch_bounds__(128) void copy("));
        let indexing = artifact.gpu_indexing.as_ref().unwrap();
        assert_eq!(indexing.block_size, [128, 1, 1]);
        let code = KernelInfo::new(artifact).invocation_code(None, &[]).unwrap();
        assert!(code.starts_with("dim3 _block(int(128), int(1), int(1));"));
        assert!(code.ends_with(");") && code.contains("<<<_grid, _block, 0, 0>>>"));
    }

    #[test]
    fn test_buffer_kernel() {
        let field = Field::new("f", 2, ScalarType::F64).with_index_shape([3]);
        let buffer = Field::buffer("buffer", ScalarType::F64, 2);
        let pack = vec![
            Assignment::new(buffer.center([0]), field.center([0])),
            Assignment::new(buffer.center([1]), field.center([2])),
        ];
        let artifact = LoopNestCompiler::new()
            .compile("pack_N", &pack, &cpu_config().with_ghost_layers(0))
            .unwrap();
        assert!(artifact
            .source
            .contains("const int64_t buffer_idx = ctr_0 + _size_f_0*(ctr_1);"));
        assert!(artifact.source.contains("_data_buffer[2*buffer_idx + 1] ="));
        let info = KernelInfo::new(artifact);
        let setup = info.field_parameter_setup("ci", "buffer");
        assert_eq!(setup[0], "double * RESTRICT _data_buffer = buffer;");
        assert!(setup.iter().any(|l| l.contains("f->dataAt(ci.xMin()")));
    }

    #[test]
    fn test_buffer_only_kernel_rejected() {
        let buffer = Field::buffer("buffer", ScalarType::F64, 1);
        let a = vec![Assignment::new(buffer.center([0]), Expr::float(1.0))];
        assert!(matches!(
            LoopNestCompiler::new().compile("k", &a, &cpu_config()),
            Err(CodegenError::Compile(_))
        ));
    }
}
