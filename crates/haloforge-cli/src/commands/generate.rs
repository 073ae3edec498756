//! `haloforge generate` command - Run every generator section of a job file.

use std::path::Path;

use colored::Colorize;
use haloforge_codegen::{
    emit_all, mpi_dtype_info_from_kernel, AdditionalData, AdditionalDataHandler, ArtifactSink,
    DirectorySink, GenerationContext, LatticeModelGenerator, LoopNestCompiler, PackInfoGenerator,
    RenderedFile, Renderer, SweepGenerator,
};
use haloforge_ir::Stencil;
use serde_json::json;
use tracing::info;

use crate::error::CliResult;
use crate::job::{
    streaming_kernel, BoundaryJob, Job, LatticeModelJob, MpiDtypeJob, PackInfoJob, SweepJob,
};

/// Execute the `generate` command.
pub fn execute(file: &str, output: Option<&str>, dry_run: bool) -> CliResult<()> {
    let job = Job::load(Path::new(file))?;
    let output_dir = output.unwrap_or("generated");

    println!(
        "{} Generating from {}",
        "→".bright_cyan(),
        file.bright_white()
    );

    // Render everything first; a failing section leaves the output untouched.
    let files = render_job(&job)?;

    if dry_run {
        for file in &files {
            println!();
            println!("{}:", file.name.bright_white().underline());
            println!("{}", file.content.dimmed());
        }
        return Ok(());
    }

    let sink = DirectorySink::new(output_dir);
    let written = write_files(&sink, &files)?;
    for name in &written {
        println!(
            "    {} Written to {}",
            "✓".bright_green(),
            sink.root().join(name).display().to_string().bright_white()
        );
    }

    println!();
    println!(
        "{} Generated {} file(s)",
        "✓".bright_green().bold(),
        written.len().to_string().bright_white()
    );
    Ok(())
}

/// Write rendered files to `sink`.
pub fn write_files(sink: &dyn ArtifactSink, files: &[RenderedFile]) -> CliResult<Vec<String>> {
    Ok(emit_all(sink, files)?)
}

/// Render all sections of `job`.
pub fn render_job(job: &Job) -> CliResult<Vec<RenderedFile>> {
    let renderer = Renderer::new()?;
    let compiler = LoopNestCompiler::new();
    let mut files = Vec::new();

    for section in &job.pack_info {
        files.extend(pack_info(&job.context, &compiler, &renderer, section)?);
    }
    for section in &job.mpi_dtype_info {
        files.extend(mpi_dtype_info(&renderer, section)?);
    }
    for section in &job.boundary {
        files.push(boundary_report(section)?);
    }
    for section in &job.lattice_model {
        files.extend(lattice_model(&job.context, &compiler, &renderer, section)?);
    }
    for section in &job.sweep {
        files.extend(sweep(&job.context, &compiler, &renderer, section)?);
    }
    info!(files = files.len(), "rendered job");
    Ok(files)
}

fn pack_info(
    context: &GenerationContext,
    compiler: &LoopNestCompiler,
    renderer: &Renderer,
    section: &PackInfoJob,
) -> CliResult<Vec<RenderedFile>> {
    println!(
        "  {} Pack info {}",
        "•".dimmed(),
        section.options.class_name.bright_yellow()
    );
    let generator = PackInfoGenerator::new(context, compiler);
    let info = match &section.stencil {
        Some(name) => {
            let stencil = Stencil::by_name(name)?;
            let kernel = streaming_kernel(&stencil, &section.field, section.kind)?;
            generator.from_kernel(&kernel, section.kind, &section.options)?
        }
        None => {
            let subset = section.direction_subset()?;
            generator.for_field(&section.field.to_field(), subset.as_deref(), &section.options)?
        }
    };
    Ok(info.render(renderer)?)
}

fn mpi_dtype_info(renderer: &Renderer, section: &MpiDtypeJob) -> CliResult<Vec<RenderedFile>> {
    println!(
        "  {} MPI datatype info {}",
        "•".dimmed(),
        section.class_name.bright_yellow()
    );
    let stencil = Stencil::by_name(&section.stencil)?;
    let kernel = streaming_kernel(&stencil, &section.field, section.kind)?;
    let info = mpi_dtype_info_from_kernel(
        &kernel,
        section.kind,
        &section.class_name,
        &section.namespace,
    )?;
    Ok(info.render(renderer)?)
}

/// JSON report of a boundary's additional-data fragments.
pub fn boundary_report(section: &BoundaryJob) -> CliResult<RenderedFile> {
    println!(
        "  {} Boundary {} ({})",
        "•".dimmed(),
        section.name.bright_yellow(),
        section.boundary
    );
    let stencil = Stencil::by_name(&section.stencil)?;
    let handler = AdditionalDataHandler::for_boundary(
        &section.boundary,
        &stencil,
        &section.field_name,
        section.target,
    )?;

    let report = match handler {
        None => json!({
            "boundary": section.boundary.name(),
            "additional_data": false,
        }),
        Some(handler) => {
            let stencil_info = handler.stencil_info();
            let initialisation = stencil_info
                .iter()
                .map(|entry| {
                    Ok(json!({
                        "index": entry.index,
                        "offsets": entry.offsets_text,
                        "code": handler.data_initialisation(entry.index)?,
                    }))
                })
                .collect::<CliResult<Vec<_>>>()?;
            json!({
                "boundary": section.boundary.name(),
                "additional_data": true,
                "constructor_arguments": handler.constructor_arguments(),
                "initialiser_list": handler.initialiser_list(),
                "additional_arguments_for_fill_function": handler.additional_arguments_for_fill_function(),
                "additional_parameters_for_fill_function": handler.additional_parameters_for_fill_function(),
                "additional_member_variable": handler.additional_member_variable(),
                "additional_field_data": handler.additional_field_data(),
                "stencil_info": stencil_info,
                "data_initialisation": initialisation,
            })
        }
    };
    Ok(RenderedFile::new(
        format!("{}.json", section.name),
        serde_json::to_string_pretty(&report)?,
    ))
}

fn lattice_model(
    context: &GenerationContext,
    compiler: &LoopNestCompiler,
    renderer: &Renderer,
    section: &LatticeModelJob,
) -> CliResult<Vec<RenderedFile>> {
    println!(
        "  {} Lattice model {}",
        "•".dimmed(),
        section.class_name.bright_yellow()
    );
    let model = LatticeModelGenerator::new(context, compiler)
        .generate(&section.method()?, &section.options())?;
    Ok(model.render(renderer)?)
}

fn sweep(
    context: &GenerationContext,
    compiler: &LoopNestCompiler,
    renderer: &Renderer,
    section: &SweepJob,
) -> CliResult<Vec<RenderedFile>> {
    println!(
        "  {} Sweep {}",
        "•".dimmed(),
        section.class_name.bright_yellow()
    );
    let sweep = SweepGenerator::new(context, compiler)
        .generate(&section.assignments()?, &section.options())?;
    Ok(sweep.render(renderer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haloforge_codegen::MemorySink;

    #[test]
    fn test_render_job_sections() {
        let job = Job::parse(
            r#"
[[pack_info]]
field = { name = "pdfs", index_shape = [19] }
stencil = "D3Q19"
options = { class_name = "PdfPackInfo" }

[[boundary]]
name = "FreeSlip"
stencil = "D3Q19"
boundary = { type = "free_slip" }

[[boundary]]
name = "NoSlip"
stencil = "D3Q19"
boundary = { type = "no_slip" }
"#,
        )
        .unwrap();
        let files = render_job(&job).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            ["PdfPackInfo.h", "PdfPackInfo.cpp", "FreeSlip.json", "NoSlip.json"]
        );
        let report: serde_json::Value = serde_json::from_str(&files[2].content).unwrap();
        assert_eq!(report["additional_data"], true);
        assert_eq!(report["stencil_info"].as_array().unwrap().len(), 27);
        let no_slip: serde_json::Value = serde_json::from_str(&files[3].content).unwrap();
        assert_eq!(no_slip["additional_data"], false);
    }

    #[test]
    fn test_render_sweep_section() {
        let job = Job::parse(
            r#"
[[sweep]]
class_name = "StreamSweep"
field = { name = "pdfs", index_shape = [19] }
stencil = "D3Q19"
inner_outer_split = true
"#,
        )
        .unwrap();
        let files = render_job(&job).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["StreamSweep.h", "StreamSweep.cpp"]);
        assert!(files[0].content.contains("namespace lbm {"));
        assert!(files[1].content.contains("pdfs->swapDataPointers(pdfs_tmp);"));
        assert!(files[1].content.contains("void StreamSweep::outer( IBlock * block )"));
    }

    #[test]
    fn test_failing_section_writes_nothing() {
        let job = Job::parse(
            r#"
[[pack_info]]
field = { name = "pdfs", index_shape = [19] }
stencil = "D3Q19"
options = { class_name = "PdfPackInfo" }

[[lattice_model]]
class_name = "Bad"
stencil = "D3Q7"
relaxation_rate = "omega"
"#,
        )
        .unwrap();
        let sink = MemorySink::new();
        let result = render_job(&job).and_then(|files| write_files(&sink, &files));
        assert!(result.is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_execute_writes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::write(
            &job_path,
            r#"
[[mpi_dtype_info]]
class_name = "PdfMpi"
field = { name = "pdfs", index_shape = [19] }
stencil = "D3Q19"

[[lattice_model]]
class_name = "SRT"
stencil = "D3Q19"
relaxation_rate = "omega"
"#,
        )
        .unwrap();
        let out = dir.path().join("out");
        execute(
            job_path.to_str().unwrap(),
            Some(out.to_str().unwrap()),
            false,
        )
        .unwrap();
        assert!(out.join("PdfMpi.h").exists());
        assert!(out.join("SRT.h").exists());
        let source = std::fs::read_to_string(out.join("SRT.cpp")).unwrap();
        assert!(source.contains("kernel_streamCollide"));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::write(
            &job_path,
            "[[boundary]]\nname = \"Ubb\"\nstencil = \"D2Q9\"\nboundary = { type = \"ubb\" }\n",
        )
        .unwrap();
        let out = dir.path().join("out");
        execute(job_path.to_str().unwrap(), Some(out.to_str().unwrap()), true).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn test_empty_job_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::write(&job_path, "[context]\n").unwrap();
        let err = execute(job_path.to_str().unwrap(), None, true).unwrap_err();
        assert!(matches!(err, crate::error::CliError::EmptyJob(_)));
    }
}
