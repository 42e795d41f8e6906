// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! `tpf`: the build-time codegen CLI and a local dry-run service CLI for the
//! transport pipeline framework.
//!
//! - `tpf generate` runs the compiler against a pipeline template and writes
//!   the rendered artifacts plus the canonical ordered-step resource to disk.
//! - `tpf serve` hosts a previously-emitted ordered-step resource as a local
//!   JSON-shaped service, for exercising config loading and the health gate
//!   ahead of plugging in a generated transport server.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tpf_cli::config::{self, ConfigOverrides};
use tpf_cli::service::PipelineServiceHandle;
use tpf_cli::codegen;
use tpf_ir::order::OrderedStepList;
use tpf_ir::pipeline_config::Parallelism;
use tpf_ir::template::PipelineTemplate;
use tpf_runtime::execution_service::ExecutionServiceConfig;
use tpf_runtime::health::DEFAULT_STARTUP_TIMEOUT;
use tpf_runtime::registry::step_descriptor_map;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tpf", version, about = "Transport pipeline framework codegen and service CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a pipeline template and write its artifacts and order.json.
    Generate {
        /// Path to the pipeline template (.yaml/.yml/.json).
        #[arg(long)]
        template: PathBuf,
        /// Directory rendered artifacts and the order resource are written under.
        #[arg(long, default_value = "target/tpf-generated")]
        output: PathBuf,
    },
    /// Host a previously-generated order.json as a local JSON-shaped service.
    Serve {
        /// Path to the canonical ordered-step resource (see `tpf_ir::order::RESOURCE_PATH`).
        #[arg(long)]
        order: PathBuf,
        /// Path to an explicit pipeline.{yaml,json} config file; auto-discovered if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides `PipelineConfig::max_concurrency` for this run.
        #[arg(long)]
        max_concurrency: Option<usize>,
        /// Name reported in this service's observed state.
        #[arg(long, default_value = "tpf-service")]
        app_name: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate { template, output } => run_generate(&template, &output),
        Command::Serve {
            order,
            config,
            max_concurrency,
            app_name,
        } => run_serve(&order, config.as_deref(), max_concurrency, app_name),
    }
}

fn run_generate(template_path: &Path, output_dir: &Path) -> Result<()> {
    let template = PipelineTemplate::from_file(template_path)
        .with_context(|| format!("loading pipeline template '{}'", template_path.display()))?;
    template
        .validate()
        .with_context(|| format!("validating pipeline template '{}'", template_path.display()))?;

    let registered_steps: BTreeSet<String> = step_descriptor_map().into_keys().map(str::to_string).collect();
    let output = codegen::generate(template, registered_steps, output_dir)?;

    tracing::info!(
        artifacts = output.artifacts.len(),
        steps = output.ordered_steps.len(),
        output = %output_dir.display(),
        "generated pipeline artifacts"
    );
    Ok(())
}

fn run_serve(order_path: &Path, config_path: Option<&Path>, max_concurrency: Option<usize>, app_name: String) -> Result<()> {
    let order_json = std::fs::read_to_string(order_path)
        .with_context(|| format!("reading ordered-step resource '{}'", order_path.display()))?;
    let order: OrderedStepList = serde_json::from_str(&order_json)
        .with_context(|| format!("parsing '{}' as an ordered-step resource", order_path.display()))?;
    let step_count = order.as_slice().len();

    let overrides = ConfigOverrides {
        max_concurrency,
        parallelism: None::<Parallelism>,
    };
    let pipeline_config = config::load(config_path, overrides).context("loading pipeline configuration")?;

    let handle = PipelineServiceHandle::spawn::<serde_json::Value, _>(
        "tpf-serve",
        app_name,
        step_count,
        vec![],
        move || {
            Ok(ExecutionServiceConfig {
                order,
                pipeline_config,
                // No generated transport binding is linked into this binary, so every
                // registered factory's output is left untyped; `tpf serve` is a
                // configuration/health-gate dry run until a generated server supplies
                // its own downcast.
                downcast: Rc::new(|_name, _instance| None),
                parallel_overrides: HashMap::new(),
                startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            })
        },
    )
    .context("starting pipeline service")?;

    tracing::info!(steps = step_count, "pipeline service starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building the signal-handling runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("waiting for shutdown signal")?;

    let status = handle.status();
    tracing::info!(app = %status.app_name, health = ?status.health, "shutting down pipeline service");
    handle.shutdown_and_join().context("shutting down pipeline service")?;
    Ok(())
}
