//! Convert command - turn manifests into a Sherpack pack
//!
//! Payloads that leave the values file are written to `files/` while the
//! batch runs; Pack.yaml, values.yaml and the templates are written once the
//! package is assembled. `--dry-run` keeps everything in memory.

use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use packgen_convert::{
    BatchReport, DirectorySink, FileSink, MemorySink, Package, PackageAssembler, Pipeline,
    ProcessingContext, ProcessorRegistry, prepare_output,
};

use super::{input_name, prepare};
use crate::InputArgs;
use crate::display::{byte_size, count_line, file_fingerprint, print_header, print_section, print_warnings};
use crate::error::{CliError, Result};

pub fn run(args: &InputArgs, output: Option<&Path>, force: bool, dry_run: bool, verbose: bool) -> Result<()> {
    let output_path = match output {
        Some(out) => out.to_path_buf(),
        None => std::env::current_dir()?.join(format!("{}-pack", input_name(&args.input))),
    };

    print_header("packgen convert", "manifests → Sherpack pack");
    println!(
        "  {} {}",
        style("Source:").dim(),
        style(args.input.display()).cyan()
    );
    println!(
        "  {} {}{}",
        style("Target:").dim(),
        style(output_path.display()).green(),
        if dry_run { style(" (dry run)").dim().to_string() } else { String::new() }
    );
    println!();

    let prepared = prepare(args)?;

    let sink: Arc<dyn FileSink> = if dry_run {
        Arc::new(MemorySink::new())
    } else {
        prepare_output(&output_path, force)?;
        Arc::new(DirectorySink::new(&output_path))
    };
    let ctx = ProcessingContext::from_config(prepared.pack, &prepared.config, sink);

    let registry = ProcessorRegistry::with_builtin()?;
    let (objects, load_warnings) = prepared.load.into_objects();
    let mut report = Pipeline::from_config(&prepared.config).run(&registry, &ctx, &objects);
    report.prepend_warnings(load_warnings);

    let package = PackageAssembler::new().assemble(&ctx, &report)?;
    let written = if dry_run {
        Vec::new()
    } else {
        package.write_to(&output_path)?
    };

    print_files(&package, &written, &output_path, dry_run);
    print_failures(&report);
    print_warnings(&package.warnings, verbose);
    print_summary(&report, &package);

    if dry_run {
        println!(
            "  {} {}",
            style("ℹ").cyan(),
            style("Dry run mode - no files were written").dim()
        );
        println!();
    }

    let failed = report.failed().count();
    if failed > 0 {
        return Err(CliError::ConversionFailed { failed });
    }
    Ok(())
}

fn print_files(package: &Package, written: &[PathBuf], output_path: &Path, dry_run: bool) {
    print_section("Generated Files");

    let marker = if dry_run { style("○").yellow() } else { style("✓").green().bold() };
    if dry_run {
        for path in ["Pack.yaml", "values.yaml"].into_iter().chain(package.templates.keys().map(String::as_str)) {
            println!("  {} {}", marker, path);
        }
    } else {
        for path in written {
            let relative = path.strip_prefix(output_path).unwrap_or(path);
            println!("  {} {}", marker, relative.display());
        }
    }

    if !package.files.is_empty() {
        println!();
        print_section("External Files");
        for file in &package.files {
            println!(
                "  {} {} {}",
                style("→").blue(),
                file.path,
                style(file_fingerprint(file)).dim()
            );
        }
    }
    println!();
}

fn print_failures(report: &BatchReport) {
    if !report.has_failures() {
        return;
    }
    print_section("Failed Resources");
    for (outcome, error) in report.failed() {
        println!("  {} {}", style("✗").red().bold(), style(&outcome.id).bold());
        println!("      {}", style(error).dim());
    }
    println!();
}

fn print_summary(report: &BatchReport, package: &Package) {
    let template_bytes: usize = package.templates.values().map(String::len).sum();

    print_section("Summary");
    println!(
        "  {}",
        style(count_line(report.processed().count(), "resource", Some("converted"))).green()
    );
    let skipped = report.skipped().count();
    if skipped > 0 {
        println!("  {}", style(count_line(skipped, "resource", Some("skipped (unsupported kind)"))).yellow());
    }
    let failed = report.failed().count();
    if failed > 0 {
        println!("  {}", style(count_line(failed, "resource", Some("failed"))).red().bold());
    }
    println!(
        "  {}",
        count_line(
            package.templates.len(),
            "template",
            Some(&format!("({})", byte_size(template_bytes)))
        )
    );
    println!(
        "  {}",
        count_line(package.files.len(), "external file", Some("(content-addressed)"))
    );
    println!("  {}", count_line(package.edges.len(), "dependency edge", None));
    let warnings = package.warnings.len();
    if warnings > 0 {
        println!("  {}", style(count_line(warnings, "note", None)).dim());
    }
    println!();
}
