//! End-to-end generator scenarios: from assignments to rendered files.

use haloforge_codegen::{
    emit_all, mpi_dtype_info_from_kernel, AdditionalData, AdditionalDataHandler, BoundaryKind,
    CodegenError, DirectionSet, FreeSlipHandler, GenerationContext, KernelOptions,
    LatticeModelGenerator, LatticeModelOptions, LbMethod, LoopNestCompiler, MemorySink,
    OutflowHandler, PackInfoGenerator, PackInfoOptions, PackKind, PackSpec, ReductionOp,
    Renderer, StreamingPattern, Target, Timestep,
};
use haloforge_ir::{Assignment, Direction, Expr, Field, FieldAccess, ScalarType, Stencil};
use std::collections::BTreeMap;

fn pull_kernel(stencil: &Stencil, dtype: ScalarType) -> Vec<Assignment> {
    let q = stencil.len();
    let src = Field::new("src", stencil.dim(), dtype).with_index_shape([q]);
    let dst = Field::new("dst", stencil.dim(), dtype).with_index_shape([q]);
    stencil
        .iter()
        .enumerate()
        .map(|(i, d)| Assignment::new(dst.center([i]), src.access(d.inverse(), [i])))
        .collect()
}

#[test]
fn test_pack_and_unpack_share_buffer_layout() {
    let ctx = GenerationContext::default();
    let compiler = LoopNestCompiler::new();
    let info = PackInfoGenerator::new(&ctx, &compiler)
        .from_kernel(
            &pull_kernel(&Stencil::d2q9(), ScalarType::F64),
            PackKind::Pull,
            &PackInfoOptions::new("PdfPackInfo"),
        )
        .unwrap();

    let east = info.family.kernels_for(&Direction::from([1, 0])).unwrap();
    let indices: Vec<usize> = east.terms.iter().map(|t| t.index[0]).collect();
    assert_eq!(indices, vec![4, 6, 8]);

    for (slot, component) in indices.iter().enumerate() {
        let term = format!(
            "_data_src[ctr_0*_stride_src_0 + ctr_1*_stride_src_1 + {}*_stride_src_2]",
            component
        );
        let buffer = format!("_data_buffer[3*buffer_idx + {}]", slot);
        assert!(east.pack.artifact.source.contains(&format!("{} = {};", buffer, term)));
        assert!(east.unpack.artifact.source.contains(&format!("{} = {};", term, buffer)));
    }
}

/// Run `assignments` for a single cell; `memory` holds every accessed value.
fn run_cell(assignments: &[Assignment], memory: &mut BTreeMap<FieldAccess, f64>) {
    for a in assignments {
        let value = a
            .rhs
            .evaluate(&mut |leaf| match leaf {
                Expr::Access(fa) => memory.get(fa).copied(),
                _ => None,
            })
            .unwrap();
        match &a.lhs {
            Expr::Access(fa) => {
                memory.insert(fa.clone(), value);
            }
            other => panic!("unexpected assignment target {}", other),
        }
    }
}

#[test]
fn test_pack_then_unpack_round_trip() {
    let ctx = GenerationContext::default();
    let compiler = LoopNestCompiler::new();
    let generator = PackInfoGenerator::new(&ctx, &compiler);
    let kernel = pull_kernel(&Stencil::d3q19(), ScalarType::F64);

    for operator in [None, Some(ReductionOp::Add)] {
        let mut options = PackInfoOptions::new("PdfPackInfo");
        if let Some(op) = operator {
            options = options.with_operator(op);
        }
        let info = generator.from_kernel(&kernel, PackKind::Pull, &options).unwrap();

        for kernels in &info.family.kernels {
            let sent: BTreeMap<FieldAccess, f64> = kernels
                .terms
                .iter()
                .enumerate()
                .map(|(i, term)| (term.clone(), 1.5 + i as f64))
                .collect();
            let mut sender = sent.clone();
            run_cell(&kernels.pack_assignments, &mut sender);

            let mut receiver: BTreeMap<FieldAccess, f64> = sender
                .into_iter()
                .filter(|(fa, _)| fa.field_name() == "buffer")
                .collect();
            assert_eq!(receiver.len(), kernels.elements_per_cell());

            let initial = if operator.is_some() { 0.25 } else { -7.0 };
            for term in &kernels.terms {
                receiver.insert(term.clone(), initial);
            }
            run_cell(&kernels.unpack_assignments, &mut receiver);

            for term in &kernels.terms {
                let expected = match operator {
                    None => sent[term],
                    Some(_) => initial + sent[term],
                };
                assert_eq!(receiver[term], expected, "{} in {}", term, kernels.directions.key());
            }
        }
    }
}

#[test]
fn test_output_independent_of_assignment_order() {
    let ctx = GenerationContext::default();
    let compiler = LoopNestCompiler::new();
    let renderer = Renderer::new().unwrap();
    let generator = PackInfoGenerator::new(&ctx, &compiler);
    let options = PackInfoOptions::new("PdfPackInfo");

    let forward = pull_kernel(&Stencil::d3q19(), ScalarType::F64);
    let mut shuffled = forward.clone();
    shuffled.reverse();
    shuffled.swap(0, 7);

    let a = generator
        .from_kernel(&forward, PackKind::Pull, &options)
        .unwrap()
        .render(&renderer)
        .unwrap();
    let b = generator
        .from_kernel(&shuffled, PackKind::Pull, &options)
        .unwrap()
        .render(&renderer)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_mixed_dtypes_name_both_fields() {
    let ctx = GenerationContext::default();
    let compiler = LoopNestCompiler::new();
    let a = Field::new("velocity", 3, ScalarType::F64).with_index_shape([3]);
    let b = Field::new("flags", 3, ScalarType::F32);
    let mut spec = PackSpec::new();
    spec.insert(
        DirectionSet::single(Direction::from([0, 0, 1])),
        [a.center([0]), b.center(Vec::<usize>::new())].into_iter().collect(),
    );
    let err = PackInfoGenerator::new(&ctx, &compiler)
        .generate(&spec, &PackInfoOptions::new("Mixed"))
        .unwrap_err();
    assert!(matches!(err, CodegenError::AmbiguousFieldSet { .. }));
    let message = err.to_string();
    assert!(message.contains(" - velocity [float64]"));
    assert!(message.contains(" - flags [float32]"));
}

#[test]
fn test_failed_generation_writes_nothing() {
    let ctx = GenerationContext::default();
    let compiler = LoopNestCompiler::new();
    let renderer = Renderer::new().unwrap();
    let sink = MemorySink::new();

    let result = PackInfoGenerator::new(&ctx, &compiler)
        .generate(&PackSpec::new(), &PackInfoOptions::new("Empty"))
        .and_then(|info| info.render(&renderer))
        .and_then(|files| emit_all(&sink, &files));
    assert!(result.is_err());
    assert!(sink.is_empty());
}

#[test]
fn test_pack_info_files_reach_sink() {
    let ctx = GenerationContext::default();
    let compiler = LoopNestCompiler::new();
    let renderer = Renderer::new().unwrap();
    let sink = MemorySink::new();
    let pdfs = Field::new("pdfs", 3, ScalarType::F64).with_index_shape([19]);

    let files = PackInfoGenerator::new(&ctx, &compiler)
        .for_field(&pdfs, None, &PackInfoOptions::new("PdfPackInfo"))
        .unwrap()
        .render(&renderer)
        .unwrap();
    let names = emit_all(&sink, &files).unwrap();
    assert_eq!(names, ["PdfPackInfo.h", "PdfPackInfo.cpp"]);
    let source = sink.get("PdfPackInfo.cpp").unwrap();
    assert!(source.contains("internal_fused_pack::fused_pack("));
    assert!(source.contains("namespace pystencils {"));
}

#[test]
fn test_gpu_pack_info_needs_cuda() {
    let compiler = LoopNestCompiler::new();
    let pdfs = Field::new("pdfs", 3, ScalarType::F64).with_index_shape([19]);
    let options = PackInfoOptions::new("GpuPdfPackInfo")
        .with_kernel_options(KernelOptions::new().with_target(Target::Gpu));

    let err = PackInfoGenerator::new(&GenerationContext::default(), &compiler)
        .for_field(&pdfs, None, &options)
        .unwrap_err();
    assert!(matches!(err, CodegenError::CudaUnavailable));

    let cuda = GenerationContext::default().with_cuda(true);
    let files = PackInfoGenerator::new(&cuda, &compiler)
        .for_field(&pdfs, None, &options)
        .unwrap()
        .render(&Renderer::new().unwrap())
        .unwrap();
    assert_eq!(files[1].name, "GpuPdfPackInfo.cu");
    assert!(files[1].content.contains("<<<_grid, _block, 0, stream>>>"));
}

#[test]
fn test_mpi_dtype_info_end_to_end() {
    let info = mpi_dtype_info_from_kernel(
        &pull_kernel(&Stencil::d2q9(), ScalarType::F64),
        PackKind::Pull,
        "PdfMpiDtypeInfo",
        "lbm",
    )
    .unwrap();
    let files = info.render(&Renderer::new().unwrap()).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "PdfMpiDtypeInfo.h");
    assert!(files[0].content.contains("case stencil::E:"));
    assert!(files[0].content.contains("return { 4, 6, 8 };"));
}

#[test]
fn test_free_slip_north_link() {
    let handler = AdditionalDataHandler::for_boundary(
        &BoundaryKind::FreeSlip,
        &Stencil::d3q19(),
        "pdfs",
        Target::Cpu,
    )
    .unwrap()
    .unwrap();
    let north = Stencil::neighborhood_ordered(3)
        .index_of(&Direction::from([0, 1, 0]))
        .unwrap();
    let code = handler.data_initialisation(north).unwrap();
    assert!(code.contains("const Cell n = it.cell() + Cell(0, 1, 0);"));
    assert!(code.contains("   element.wny = -1;"));
    assert_eq!(handler.stencil_info().len(), 27);
}

#[test]
fn test_free_slip_mirrors_are_involutions() {
    for stencil in [Stencil::d2q9(), Stencil::d3q27()] {
        let handler = FreeSlipHandler::new(&stencil);
        for axis in 0..stencil.dim() {
            let table = handler.mirror_table(axis).unwrap();
            assert!(table.iter().enumerate().all(|(i, &m)| table[m] == i));
        }
    }
}

#[test]
fn test_outflow_tangential_offset() {
    let stencil = Stencil::d3q19();
    let handler = OutflowHandler::new(
        &stencil,
        &[1, 0, 0],
        StreamingPattern::Pull,
        Timestep::Even,
        "pdfs",
        Target::Cpu,
    )
    .unwrap();
    let ne = stencil.index_of(&Direction::from([1, 1, 0])).unwrap();
    assert_eq!(handler.tangential_offset(ne).unwrap(), Direction::from([0, 1, 0]));
    // Only links leaving through the east face are stored.
    assert_eq!(handler.stencil_info().len(), 5);
}

#[test]
fn test_boundary_without_additional_data() {
    let handler = AdditionalDataHandler::for_boundary(
        &BoundaryKind::NoSlip,
        &Stencil::d3q19(),
        "pdfs",
        Target::Cpu,
    )
    .unwrap();
    assert!(handler.is_none());
}

#[test]
fn test_lattice_model_end_to_end() {
    let ctx = GenerationContext::default();
    let compiler = LoopNestCompiler::new();
    let method = LbMethod::srt(Stencil::d3q19(), Expr::symbol("omega")).unwrap();
    let sink = MemorySink::new();
    let files = LatticeModelGenerator::new(&ctx, &compiler)
        .generate(&method, &LatticeModelOptions::new("SRTLatticeModel"))
        .unwrap()
        .render(&Renderer::new().unwrap())
        .unwrap();
    emit_all(&sink, &files).unwrap();

    let header = sink.get("SRTLatticeModel.h").unwrap();
    assert!(header.contains("typedef stencil::D3Q19 Stencil;"));
    assert!(header.contains("static const bool compressible = true;"));
    let source = sink.get("SRTLatticeModel.cpp").unwrap();
    assert!(source.contains("internal_kernel_collide::kernel_collide("));
    assert!(source.contains("internal_kernel_stream::kernel_stream("));
    assert!(source.contains("const real_t SRTLatticeModel::w[19] = { 0.333333333333333,0.0555555555555556,"));
}
