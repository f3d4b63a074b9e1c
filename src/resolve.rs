//! Feature requests to CMake arguments.
//!
//! Resolution runs in fixed rule groups (toolchain, libraries, plugins, test
//! infrastructure). Each rule validates its prerequisites before it appends
//! anything, and arguments accumulate in a local list that is only handed
//! out once every rule has passed, so a rejected combination never leaks a
//! partial configuration.
//!
//! ```text
//! toolchain   -DENABLE_MPI=ON -DENABLE_OPENMP=ON [-DQE_ENABLE_CUDA=ON -DQE_ENABLE_OPENACC=ON]
//! libraries   -DQE_ENABLE_SCALAPACK=ON -DQE_ENABLE_FOX=ON -DQE_ENABLE_LIBXC=ON ...
//! plugins     -DQE_ENABLE_PLUGINS=gipaw;pw2qmcpack
//! tests       -DQE_ENABLE_TEST=ON -DTESTCODE_NPROCS=<n> -DQE_CLOCK_SECONDS=ON
//! ```
//!
//! The Intel shared-library linker workaround is not an argument: it edits
//! `LDFLAGS` through [`apply_link_workaround`] and stays out of the list.
use crate::config::{
    BuildConfig, CompilerFamily, DependencySet, FeatureRequest, ToolchainCapabilities,
};
use crate::env::Environment;
use crate::error::Error;
use crate::version::Version;
use serde::Serialize;

/// Oldest release with a supported CMake build.
pub const MIN_SUPPORTED_VERSION: &str = "7.3";

/// Releases whose CMake build cannot combine ELPA with OpenMP.
const ELPA_OPENMP_BROKEN: &[&str] = &["7.3"];

/// Variable the link workaround appends to.
pub const LINKER_FLAGS_VAR: &str = "LDFLAGS";
/// Works around a "DSO missing from command line" link error (QE issue 667).
pub const COPY_DT_NEEDED_FLAG: &str = "-Wl,--copy-dt-needed-entries";

/// Release range a plugin builds on.
#[derive(Debug, Clone, Copy)]
enum VersionGate {
    Any,
    /// Broken on exactly this release.
    Not(&'static str),
    /// Unsupported on anything newer than this release.
    AtMost(&'static str),
}

struct PluginRule {
    name: &'static str,
    requested: fn(&FeatureRequest) -> bool,
    token: &'static str,
    artifacts: &'static [&'static str],
    gate: VersionGate,
}

const PLUGIN_RULES: &[PluginRule] = &[
    // qe-gipaw issue 19
    PluginRule {
        name: "GIPAW",
        requested: |features| features.with_gipaw,
        token: "gipaw",
        artifacts: &["gipaw.x"],
        gate: VersionGate::Not("7.3.1"),
    },
    // QE issue 666, d3q issue 13
    PluginRule {
        name: "D3Q",
        requested: |features| features.with_d3q,
        token: "d3q",
        artifacts: &[
            "d3_asr3.x",
            "d3_lw.x",
            "d3_q2r.x",
            "d3_qq2rr.x",
            "d3q.x",
            "d3_r2q.x",
            "d3_recenter.x",
            "d3_sparse.x",
            "d3_sqom.x",
            "d3_tk.x",
        ],
        gate: VersionGate::AtMost("7.0"),
    },
    PluginRule {
        name: "QMCPACK",
        requested: |features| features.with_qmcpack,
        token: "pw2qmcpack",
        artifacts: &["pw2qmcpack.x"],
        gate: VersionGate::Any,
    },
];

/// Ordered, append-only CMake argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildArgumentList(Vec<String>);

impl BuildArgumentList {
    fn push(&mut self, arg: impl Into<String>) {
        self.0.push(arg.into());
    }

    /// Arguments in emission order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `arg` was emitted verbatim.
    pub fn contains(&self, arg: &str) -> bool {
        self.0.iter().any(|existing| existing == arg)
    }

    /// Render as one shell-quoted line, e.g. for a `configopts` string.
    pub fn to_shell_line(&self) -> String {
        shell_words::join(&self.0)
    }
}

/// Resolver output: the argument list plus binaries the enabled plugins add.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    pub args: BuildArgumentList,
    /// Binary names, without the `bin/` prefix.
    pub plugin_artifacts: Vec<String>,
}

/// Resolve feature requests for `version` into CMake arguments.
///
/// Groups are emitted in order: toolchain, libraries, plugins, tests. The
/// first invalid combination or unsupported release is returned as
/// `Error::Configuration` and no arguments are produced.
pub fn resolve(
    features: &FeatureRequest,
    toolchain: &ToolchainCapabilities,
    dependencies: &DependencySet,
    version: &Version,
) -> Result<Resolution, Error> {
    let minimum = Version::parse(MIN_SUPPORTED_VERSION)?;
    if *version < minimum {
        return Err(Error::Configuration(format!(
            "the CMake build is implemented for versions >= {minimum} (got {version})"
        )));
    }

    let mut args = BuildArgumentList::default();
    add_toolchain_args(&mut args, features, toolchain);
    add_library_args(&mut args, features, toolchain, dependencies, version)?;
    let plugin_artifacts = add_plugin_args(&mut args, features, version)?;
    add_test_args(&mut args, features);

    tracing::debug!(
        version = %version,
        args = args.len(),
        plugin_artifacts = plugin_artifacts.len(),
        "resolved build arguments"
    );
    Ok(Resolution {
        args,
        plugin_artifacts,
    })
}

/// Resolve straight from a loaded snapshot.
pub fn resolve_config(config: &BuildConfig) -> Result<Resolution, Error> {
    resolve(
        &config.features,
        &config.toolchain,
        &config.dependencies,
        &config.version,
    )
}

fn add_toolchain_args(
    args: &mut BuildArgumentList,
    features: &FeatureRequest,
    toolchain: &ToolchainCapabilities,
) {
    if toolchain.usempi {
        args.push("-DENABLE_MPI=ON");
    }
    if toolchain.openmp {
        args.push("-DENABLE_OPENMP=ON");
    }
    if features.with_cuda {
        args.push("-DQE_ENABLE_CUDA=ON");
        args.push("-DQE_ENABLE_OPENACC=ON");
    }
}

fn add_library_args(
    args: &mut BuildArgumentList,
    features: &FeatureRequest,
    toolchain: &ToolchainCapabilities,
    dependencies: &DependencySet,
    version: &Version,
) -> Result<(), Error> {
    if features.with_scalapack {
        if !toolchain.usempi {
            return Err(Error::Configuration(
                "ScaLAPACK support requires MPI".to_string(),
            ));
        }
        args.push("-DQE_ENABLE_SCALAPACK=ON");
    }
    if features.with_fox {
        args.push("-DQE_ENABLE_FOX=ON");
    }
    if dependencies.contains("libxc") {
        args.push("-DQE_ENABLE_LIBXC=ON");
    }
    if dependencies.contains("ELPA") {
        if !features.with_scalapack {
            return Err(Error::Configuration(
                "ELPA support requires ScaLAPACK".to_string(),
            ));
        }
        if toolchain.openmp {
            for broken in ELPA_OPENMP_BROKEN {
                if *version == Version::parse(broken)? {
                    return Err(Error::Configuration(format!(
                        "QE {version} with CMake does not support ELPA with OpenMP"
                    )));
                }
            }
        }
        args.push("-DQE_ENABLE_ELPA=ON");
    }
    if dependencies.contains("HDF5") {
        args.push("-DQE_ENABLE_HDF5=ON");
    }
    Ok(())
}

fn add_plugin_args(
    args: &mut BuildArgumentList,
    features: &FeatureRequest,
    version: &Version,
) -> Result<Vec<String>, Error> {
    let mut tokens = Vec::new();
    let mut artifacts = Vec::new();
    for rule in PLUGIN_RULES {
        if !(rule.requested)(features) {
            continue;
        }
        match rule.gate {
            VersionGate::Any => {}
            VersionGate::Not(broken) => {
                if *version == Version::parse(broken)? {
                    return Err(Error::Configuration(format!(
                        "{} will fail to compile in QE {version}",
                        rule.name
                    )));
                }
            }
            VersionGate::AtMost(cutoff) => {
                let cutoff = Version::parse(cutoff)?;
                if *version > cutoff {
                    return Err(Error::Configuration(format!(
                        "{} is not supported in QE versions after {cutoff} (got {version})",
                        rule.name
                    )));
                }
            }
        }
        tokens.push(rule.token);
        artifacts.extend(rule.artifacts.iter().map(|name| name.to_string()));
    }
    if !tokens.is_empty() {
        args.push(format!("-DQE_ENABLE_PLUGINS={}", tokens.join(";")));
    }
    Ok(artifacts)
}

fn add_test_args(args: &mut BuildArgumentList, features: &FeatureRequest) {
    args.push("-DQE_ENABLE_TEST=ON");
    args.push(format!("-DTESTCODE_NPROCS={}", features.test_suite_nprocs));
    // Timings in seconds rather than d/h/m/s so benchmark output compares.
    args.push("-DQE_CLOCK_SECONDS=ON");
}

/// Append the Intel shared-library linker flag to `LDFLAGS`.
///
/// Returns the new `LDFLAGS` value when the workaround applied. This is a
/// side effect on `env`; the argument list is never touched.
pub fn apply_link_workaround(
    build_shared_libs: bool,
    compiler_family: CompilerFamily,
    env: &mut dyn Environment,
) -> Option<String> {
    if !build_shared_libs || compiler_family != CompilerFamily::Intel {
        return None;
    }
    let mut ldflags = env.var(LINKER_FLAGS_VAR).unwrap_or_default();
    ldflags.push_str(&format!(" {COPY_DT_NEEDED_FLAG} "));
    env.set_var(LINKER_FLAGS_VAR, &ldflags);
    tracing::info!(ldflags = %ldflags, "appended Intel shared-library linker workaround");
    Some(ldflags)
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
