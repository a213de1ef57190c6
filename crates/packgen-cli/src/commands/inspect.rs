//! Inspect command - show how each resource would be converted, without
//! writing anything

use console::style;
use serde::Serialize;
use std::sync::Arc;

use packgen_convert::{
    MemorySink, Pipeline, ProcessingContext, ProcessingResult, ProcessorRegistry, ResourceOutcome,
};

use super::prepare;
use crate::InputArgs;
use crate::display::file_fingerprint;
use crate::error::{CliError, Result};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceEntry<'a> {
    id: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(flatten)]
    result: Option<&'a ProcessingResult>,
}

impl<'a> ResourceEntry<'a> {
    fn new(outcome: &'a ResourceOutcome) -> Self {
        let (status, error, result) = match &outcome.result {
            Ok(r) if r.processed => ("processed", None, Some(r)),
            Ok(_) => ("skipped", None, None),
            Err(e) => ("failed", Some(e.to_string()), None),
        };
        Self {
            id: &outcome.id,
            status,
            error,
            result,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectOutput<'a> {
    pack: String,
    resources: Vec<ResourceEntry<'a>>,
    warnings: Vec<String>,
}

pub fn run(args: &InputArgs, json: bool) -> Result<()> {
    let prepared = prepare(args)?;
    let pack_name = prepared.pack.name.clone();
    let ctx = ProcessingContext::from_config(prepared.pack, &prepared.config, Arc::new(MemorySink::new()));

    let registry = ProcessorRegistry::with_builtin()?;
    let (objects, load_warnings) = prepared.load.into_objects();
    let mut report = Pipeline::from_config(&prepared.config).run(&registry, &ctx, &objects);
    report.prepend_warnings(load_warnings);

    if json {
        let output = InspectOutput {
            pack: pack_name,
            resources: report.outcomes.iter().map(ResourceEntry::new).collect(),
            warnings: report.warnings.iter().map(ToString::to_string).collect(),
        };
        let text = serde_json::to_string_pretty(&output).map_err(|e| CliError::Other {
            message: format!("cannot serialize inspection: {}", e),
        })?;
        println!("{}", text);
        return Ok(());
    }

    println!(
        "{} {} ({} resources)",
        style("Pack").cyan().bold(),
        pack_name,
        report.outcomes.len()
    );
    println!();

    for outcome in &report.outcomes {
        print_outcome(outcome);
    }

    if !report.warnings.is_empty() {
        println!("{}:", style("Notes").bold());
        for warning in &report.warnings {
            println!("  {}", warning);
        }
    }

    Ok(())
}

fn print_outcome(outcome: &ResourceOutcome) {
    match &outcome.result {
        Err(e) => {
            println!("{} {}", style("✗").red().bold(), style(&outcome.id).bold());
            println!("    {}", style(e).red());
        }
        Ok(result) if !result.processed => {
            println!("{} {} {}", style("○").yellow(), outcome.id, style("(no processor)").dim());
        }
        Ok(result) => {
            println!(
                "{} {} {}",
                style("✓").green().bold(),
                style(&outcome.id).bold(),
                style(format!("[{}]", result.processor.as_deref().unwrap_or("?"))).dim()
            );
            println!("    {}: {}", style("service").dim(), result.service_name);
            println!("    {}: {}", style("template").dim(), result.template_path);
            println!("    {}: {}", style("values").dim(), result.values_path);
            for key in &result.dependencies {
                println!("    {} {}", style("→").blue(), key);
            }
            for file in &result.external_files {
                println!(
                    "    {} {} {}",
                    style("▣").cyan(),
                    file.path,
                    style(file_fingerprint(file)).dim()
                );
            }
            for (flag, value) in &result.metadata {
                println!("    {}: {}", style(flag).dim(), value);
            }
        }
    }
    println!();
}
