use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use iac_synth::error::SynthesisError;
use iac_synth::manifest::ManifestSource;
use iac_synth::orchestrator::{CancellationToken, PipelinePaths, SynthesizeOptions};
use iac_synth::{explain_precedence, synthesize, validate};

/// Output format for `synthesize`/`explain-precedence`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(
    name = "iac-synth",
    version,
    about = "Deterministic infrastructure-as-code synthesizer.",
    long_about = "Parses a service manifest, validates it against its component schemas and cross-references, resolves the component dependency graph, and emits a provider-ready deployment plan with preserved logical IDs across re-synthesis."
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run schema and reference validation only; never aborts on findings.
    Validate(ManifestArgs),
    /// Run the full pipeline and emit a deployment plan.
    Synthesize(SynthesizeArgs),
    /// Show the 5-layer precedence trace for one component's config.
    ExplainPrecedence(ExplainArgs),
}

#[derive(Debug, Args)]
struct ManifestArgs {
    /// Path to the service manifest (YAML or JSON).
    #[arg(long)]
    manifest: PathBuf,

    /// Root directory holding `components/`, `base_manifest.schema.json`,
    /// and the config layer files.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Output format (text|json|yaml).
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct SynthesizeArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Target region, threaded into per-component context.
    #[arg(long, default_value = "us-east-1")]
    region: String,

    /// Target account id, threaded into per-component context.
    #[arg(long, default_value = "000000000000")]
    account_id: String,

    /// Persist the resolved logical-ID map back to `logical-id-map.json`.
    #[arg(long, default_value_t = false)]
    persist_logical_id_map: bool,

    /// Proceed even if drift analysis flags a critical, stateful
    /// replacement. Without this flag, a critical finding aborts synthesis
    /// when the on-disk logical-ID map requests `validateBeforePlan`.
    #[arg(long, default_value_t = false)]
    allow_drift: bool,
}

#[derive(Debug, Args)]
struct ExplainArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Name of the component to trace.
    #[arg(long)]
    component: String,
}

fn build_options(args: &ManifestArgs, region: &str, account_id: &str, persist: bool, allow_drift: bool) -> SynthesizeOptions {
    let mut options = SynthesizeOptions::new(PipelinePaths::under(&args.root), region, account_id);
    options.persist_logical_id_map = persist;
    options.allow_drift = allow_drift;
    options.cancellation = Some(CancellationToken::new());
    options
}

fn run(cli: CliArgs) -> iac_synth::Result<()> {
    match cli.command {
        Command::Validate(args) => {
            let options = build_options(&args, "us-east-1", "000000000000", false, false);
            let source = ManifestSource::Path(&args.manifest);
            let report = validate(source, &options)?;
            print_report(args.output, &report)
        }
        Command::Synthesize(args) => {
            let options = build_options(&args.manifest, &args.region, &args.account_id, args.persist_logical_id_map, args.allow_drift);
            let source = ManifestSource::Path(&args.manifest.manifest);
            let outcome = synthesize(source, &options)?;
            print_outcome(args.manifest.output, &outcome)
        }
        Command::ExplainPrecedence(args) => {
            let options = build_options(&args.manifest, "us-east-1", "000000000000", false, false);
            let source = ManifestSource::Path(&args.manifest.manifest);
            let trace = explain_precedence(&args.component, source, &options)?;
            print_precedence(args.manifest.output, &trace)
        }
    }
}

fn print_report(format: OutputFormat, report: &iac_synth::diagnostics::DiagnosticReport) -> iac_synth::Result<()> {
    match format {
        OutputFormat::Text => {
            if report.diagnostics.is_empty() {
                println!("no findings");
            } else {
                for diagnostic in &report.diagnostics {
                    println!("[{:?}] {} {}: {}", diagnostic.severity, diagnostic.code, diagnostic.path, diagnostic.message);
                }
            }
            Ok(())
        }
        OutputFormat::Json => print_json(report),
        OutputFormat::Yaml => print_yaml(report),
    }
}

fn print_outcome(format: OutputFormat, outcome: &iac_synth::SynthesisOutcome) -> iac_synth::Result<()> {
    match format {
        OutputFormat::Text => {
            println!("service {} ({}) -- {} resource(s)", outcome.plan.service, outcome.plan.environment, outcome.plan.resource_count());
            for resource in &outcome.plan.resources {
                println!("  {} [{}] logical_id={}", resource.component_name, resource.component_type, resource.logical_id);
            }
            if !outcome.report.diagnostics.is_empty() {
                println!("diagnostics:");
                for diagnostic in &outcome.report.diagnostics {
                    println!("  [{:?}] {} {}: {}", diagnostic.severity, diagnostic.code, diagnostic.path, diagnostic.message);
                }
            }
            Ok(())
        }
        OutputFormat::Json => print_json(outcome),
        OutputFormat::Yaml => print_yaml(outcome),
    }
}

fn print_precedence(format: OutputFormat, trace: &[iac_synth::config_builder::PrecedenceEntry]) -> iac_synth::Result<()> {
    match format {
        OutputFormat::Text => {
            for entry in trace {
                println!("{} = {} (layer={}, source={})", entry.path, entry.value, entry.layer.label(), entry.source);
            }
            Ok(())
        }
        OutputFormat::Json => print_json(trace),
        OutputFormat::Yaml => print_yaml(trace),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> iac_synth::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|err| SynthesisError::Schema(err.to_string()))?;
    println!("{text}");
    Ok(())
}

fn print_yaml<T: serde::Serialize>(value: &T) -> iac_synth::Result<()> {
    let text = serde_yaml_bw::to_string(value).map_err(|err| SynthesisError::Schema(err.to_string()))?;
    println!("{text}");
    Ok(())
}

fn main() {
    iac_synth::telemetry::init();
    let cli = CliArgs::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
