//! Configure, test, and verify hooks.
//!
//! Each hook takes the full build snapshot and either succeeds or returns
//! the first error it hit. Nothing is remembered between calls: `verify`
//! re-runs resolution to learn which plugin binaries to expect rather than
//! relying on state left behind by `configure`.
use crate::artifacts::{derive, verify_artifacts, TARGET_CATALOG};
use crate::config::BuildConfig;
use crate::env::Environment;
use crate::error::Error;
use crate::evaluate::{evaluate, Evaluation};
use crate::harness::{concurrency_budget, HarnessOutput, HarnessRunner};
use crate::resolve::{apply_link_workaround, resolve_config, Resolution};
use std::collections::BTreeSet;
use std::path::Path;

/// Resolve build arguments, then apply environment side effects.
///
/// The linker workaround only touches `env` after resolution succeeded.
pub fn configure(config: &BuildConfig, env: &mut dyn Environment) -> Result<Resolution, Error> {
    let resolution = resolve_config(config)?;
    apply_link_workaround(
        config.build_shared_libs,
        config.toolchain.compiler_family,
        env,
    );
    tracing::info!(
        version = %config.version,
        args = resolution.args.len(),
        "configuration resolved"
    );
    Ok(resolution)
}

/// Evaluate harness output against the snapshot's thresholds without judging it.
pub fn evaluate_test_output(config: &BuildConfig, output: &str) -> Result<Evaluation, Error> {
    let features = &config.features;
    evaluate(
        output,
        &features.test_suite_allow_failures,
        features.test_suite_threshold,
        features.test_suite_max_failed,
    )
}

/// Run the harness in `build_dir` with the snapshot's concurrency budget.
pub fn run_harness(
    config: &BuildConfig,
    runner: &dyn HarnessRunner,
    build_dir: &Path,
) -> Result<HarnessOutput, Error> {
    let concurrency = concurrency_budget(config.parallel, config.features.test_suite_nprocs);
    runner.run(build_dir, concurrency)
}

/// Run the harness in `build_dir` and judge its output.
pub fn test(
    config: &BuildConfig,
    runner: &dyn HarnessRunner,
    build_dir: &Path,
) -> Result<Evaluation, Error> {
    let output = run_harness(config, runner, build_dir)?;
    evaluate_test_output(config, &output.text)?.into_result()
}

/// Binaries the build is expected to install, relative to the install root.
pub fn expected_artifacts(config: &BuildConfig) -> Result<BTreeSet<String>, Error> {
    let resolution = resolve_config(config)?;
    let targets = config.targets()?;
    Ok(derive(&targets, TARGET_CATALOG, &resolution.plugin_artifacts))
}

/// Check `install_root` for every expected binary and return the list checked.
pub fn verify(config: &BuildConfig, install_root: &Path) -> Result<BTreeSet<String>, Error> {
    let expected = expected_artifacts(config)?;
    verify_artifacts(install_root, &expected)?;
    Ok(expected)
}
