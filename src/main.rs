use anyhow::{anyhow, Context, Result};
use clap::Parser;
use qe_build::config::{self, DependencySet, KNOWN_DEPENDENCIES};
use qe_build::env::{EnvOverlay, ProcessEnvironment};
use qe_build::evaluate::Evaluation;
use qe_build::harness::CtestRunner;
use qe_build::hooks;
use qe_build::version::Version;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, ConfigureArgs, InitArgs, RootArgs, TargetsArgs, TestArgs, VerifyArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Init(args) => run_init(args),
        Command::Configure(args) => run_configure(args),
        Command::Test(args) => run_test(args),
        Command::Verify(args) => run_verify(args),
        Command::Targets(args) => run_targets(args),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_init(args: InitArgs) -> Result<()> {
    if args.out.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            args.out.display()
        ));
    }
    let version = Version::parse(&args.qe_version).context("parse --qe-version")?;
    config::write_config(&args.out, &config::default_config(version))?;
    println!("Wrote build config to {}", args.out.display());
    Ok(())
}

#[derive(Serialize)]
struct ConfigureReport<'a> {
    args: &'a [String],
    plugin_artifacts: &'a [String],
    environment: &'a BTreeMap<String, String>,
}

fn run_configure(args: ConfigureArgs) -> Result<()> {
    let mut build = config::load_config(&args.config)?;
    let mut env = EnvOverlay::new(ProcessEnvironment);
    if args.detect_deps {
        let detected = DependencySet::detect(&env, KNOWN_DEPENDENCIES);
        build.dependencies.merge(&detected);
    }

    let resolution = hooks::configure(&build, &mut env).context("configure")?;

    if args.json {
        let report = ConfigureReport {
            args: resolution.args.as_slice(),
            plugin_artifacts: &resolution.plugin_artifacts,
            environment: env.writes(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("configopts: {}", resolution.args.to_shell_line());
    for (key, value) in env.writes() {
        println!("env: {key}={}", shell_words::quote(value));
    }
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    let mut build = config::load_config(&args.config)?;
    if let Some(parallel) = args.parallel {
        build.parallel = parallel;
    }

    let text = match (&args.harness_log, &args.build_dir) {
        (Some(log), _) => std::fs::read_to_string(log)
            .with_context(|| format!("read harness log {}", log.display()))?,
        (None, Some(build_dir)) => {
            let runner = CtestRunner::locate(args.ctest.as_deref())?;
            hooks::run_harness(&build, &runner, build_dir)?.text
        }
        (None, None) => return Err(anyhow!("either --build-dir or --harness-log is required")),
    };

    let evaluation = hooks::evaluate_test_output(&build, &text).context("test")?;
    report_evaluation(&evaluation, args.json)?;
    evaluation.into_result().context("test")?;
    if !args.json {
        println!("Test suite passed.");
    }
    Ok(())
}

fn report_evaluation(evaluation: &Evaluation, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(evaluation)?);
        return Ok(());
    }
    let summary = &evaluation.summary;
    println!(
        "Total tests passed {} out of {} ({:.2}%)",
        summary.passed_count(),
        summary.total_count,
        summary.percent_passed * 100.0
    );
    println!(
        "Failures: {} unallowed, {} allowed",
        evaluation.unallowed_failures.len(),
        evaluation.allowed_failures.len()
    );
    for line in &evaluation.unallowed_failures {
        println!("  {}", line.trim());
    }
    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<()> {
    let build = config::load_config(&args.config)?;
    let expected = hooks::verify(&build, &args.install_dir).context("verify")?;
    println!(
        "All {} expected files present under {}",
        expected.len(),
        args.install_dir.display()
    );
    Ok(())
}

fn run_targets(args: TargetsArgs) -> Result<()> {
    let build = config::load_config(&args.config)?;
    let expected = hooks::expected_artifacts(&build).context("derive expected files")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&expected)?);
        return Ok(());
    }
    for rel in &expected {
        println!("{rel}");
    }
    Ok(())
}
