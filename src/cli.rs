//! CLI argument parsing for the configure/test/verify workflow.
//!
//! The CLI stays thin: every subcommand loads a snapshot and calls one hook.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Release recorded by `init` when `--qe-version` is not given.
pub const DEFAULT_VERSION: &str = "7.4";

/// Root CLI entrypoint for the configure/test/verify workflow.
#[derive(Parser, Debug)]
#[command(
    name = "qebuild",
    version,
    about = "Build configuration and test-suite verification for Quantum ESPRESSO",
    after_help = "Examples:\n  qebuild init --out qe.json --qe-version 7.3.1\n  qebuild configure --config qe.json --detect-deps\n  qebuild test --config qe.json --build-dir build\n  qebuild test --config qe.json --harness-log ctest.log\n  qebuild verify --config qe.json --install-dir /opt/qe/7.3.1",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Workflow step to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config snapshot.
    Init(InitArgs),
    /// Print the resolved CMake arguments.
    Configure(ConfigureArgs),
    /// Run the harness, or read a captured log, and apply the thresholds.
    Test(TestArgs),
    /// Check an install root for the expected binaries.
    Verify(VerifyArgs),
    /// List the expected binaries without touching the filesystem.
    Targets(TargetsArgs),
}

/// Arguments for `qebuild init`.
#[derive(Parser, Debug)]
#[command(about = "Write a default build config")]
pub struct InitArgs {
    /// Output path for the config JSON
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,

    /// Package version recorded in the config
    #[arg(long = "qe-version", value_name = "VERSION", default_value = DEFAULT_VERSION)]
    pub qe_version: String,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `qebuild configure`.
#[derive(Parser, Debug)]
#[command(about = "Resolve feature requests into CMake arguments")]
pub struct ConfigureArgs {
    /// Build config JSON
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Add dependencies found through EBROOT<NAME> variables
    #[arg(long)]
    pub detect_deps: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `qebuild test`.
///
/// Exactly one of `--build-dir` and `--harness-log` is required.
#[derive(Parser, Debug)]
#[command(about = "Run or evaluate the test suite")]
pub struct TestArgs {
    /// Build config JSON
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Build tree to run ctest in
    #[arg(long, value_name = "DIR", required_unless_present = "harness_log")]
    pub build_dir: Option<PathBuf>,

    /// ctest executable (defaults to ctest on PATH)
    #[arg(long, value_name = "PATH", requires = "build_dir")]
    pub ctest: Option<PathBuf>,

    /// Evaluate captured harness output instead of running ctest
    #[arg(long, value_name = "PATH", conflicts_with = "build_dir")]
    pub harness_log: Option<PathBuf>,

    /// Override the available parallelism from the config
    #[arg(long, value_name = "N")]
    pub parallel: Option<u32>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `qebuild verify`.
#[derive(Parser, Debug)]
#[command(about = "Check that expected binaries were installed")]
pub struct VerifyArgs {
    /// Build config JSON
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Install root containing bin/
    #[arg(long, value_name = "DIR")]
    pub install_dir: PathBuf,
}

/// Arguments for `qebuild targets`.
#[derive(Parser, Debug)]
#[command(about = "List the binaries a build is expected to install")]
pub struct TargetsArgs {
    /// Build config JSON
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn subcommand_help_comes_from_docs() {
        let root = RootArgs::command();
        let verify = root
            .get_subcommands()
            .find(|sub| sub.get_name() == "verify")
            .expect("verify subcommand");
        let about = verify.get_about().map(ToString::to_string).unwrap_or_default();
        assert!(about.contains("expected binaries"), "{about}");
    }

    #[test]
    fn test_needs_a_build_dir_or_a_log() {
        let err = RootArgs::try_parse_from(["qebuild", "test", "--config", "qe.json"])
            .expect_err("neither --build-dir nor --harness-log");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
