//! Build targets to expected binaries.
//!
//! The catalog lists, per `make` target, the executables it installs under
//! `bin/`. Selection rules:
//! - no targets, `all`, or `all_currents` select every catalog entry;
//! - `pwall` selects `neb`, `ph`, `pp`, `pw`, and `pwcond`;
//! - unknown targets select nothing.
//!
//! Plugin binaries come from feature flags, not targets, and are always
//! added.
use crate::error::Error;
use std::collections::BTreeSet;
use std::path::Path;

/// Install-root subdirectory holding the executables.
pub const BIN_DIR: &str = "bin";

const ALL_TARGETS: &[&str] = &["all", "all_currents"];

const UMBRELLA_TARGETS: &[(&str, &[&str])] = &[("pwall", &["neb", "ph", "pp", "pw", "pwcond"])];

/// Build target name paired with the binaries it installs under [`BIN_DIR`].
pub type Catalog<'a> = &'a [(&'a str, &'a [&'a str])];

/// Targets of a Quantum ESPRESSO build and the binaries each installs.
pub const TARGET_CATALOG: Catalog<'static> = &[
    ("cp", &["cp.x", "cppp.x", "manycp.x", "wfdd.x"]),
    ("epw", &["epw.x"]),
    (
        "gwl",
        &[
            "abcoeff_to_eps.x",
            "bse_main.x",
            "graph.x",
            "gww_fit.x",
            "gww.x",
            "head.x",
            "memory_pw4gww.x",
            "pw4gww.x",
            "simple_bse.x",
            "simple_ip.x",
            "simple.x",
        ],
    ),
    ("hp", &["hp.x"]),
    ("ld1", &["ld1.x"]),
    ("neb", &["neb.x", "path_interpolation.x"]),
    (
        "ph",
        &[
            "alpha2f.x",
            "dynmat.x",
            "fd_ef.x",
            "fd.x",
            "lambda.x",
            "phcg.x",
            "postahc.x",
            "q2r.x",
            "dvscf_q2r.x",
            "epa.x",
            "fd_ifc.x",
            "fqha.x",
            "matdyn.x",
            "ph.x",
            "q2qstar.x",
        ],
    ),
    (
        "pp",
        &[
            "average.x",
            "dos_sp.x",
            "ef.x",
            "fermi_int_0.x",
            "fermi_proj.x",
            "fs.x",
            "molecularpdos.x",
            "pawplot.x",
            "plotband.x",
            "plotrho.x",
            "ppacf.x",
            "pp.x",
            "pw2bgw.x",
            "pw2gt.x",
            "pw2wannier90.x",
            "wannier_ham.x",
            "wfck2r.x",
            "bands.x",
            "dos.x",
            "epsilon.x",
            "fermi_int_1.x",
            "fermi_velocity.x",
            "initial_state.x",
            "open_grid.x",
            "plan_avg.x",
            "plotproj.x",
            "pmw.x",
            "pprism.x",
            "projwfc.x",
            "pw2critic.x",
            "pw2gw.x",
            "sumpdos.x",
            "wannier_plot.x",
        ],
    ),
    (
        "pw",
        &[
            "cell2ibrav.x",
            "ev.x",
            "ibrav2cell.x",
            "kpoints.x",
            "pwi2xsf.x",
            "pw.x",
            "scan_ibrav.x",
        ],
    ),
    ("pwcond", &["pwcond.x"]),
    (
        "tddfpt",
        &[
            "turbo_davidson.x",
            "turbo_eels.x",
            "turbo_lanczos.x",
            "turbo_magnon.x",
            "turbo_spectrum.x",
        ],
    ),
    ("upf", &["upfconv.x", "virtual_v2.x"]),
    (
        "xspectra",
        &["molecularnexafs.x", "spectra_correction.x", "xspectra.x"],
    ),
];

fn catalog_entry<'a>(catalog: Catalog<'a>, target: &str) -> Option<&'a [&'a str]> {
    catalog
        .iter()
        .find(|(name, _)| *name == target)
        .map(|(_, artifacts)| *artifacts)
}

fn umbrella_members(target: &str) -> Option<&'static [&'static str]> {
    UMBRELLA_TARGETS
        .iter()
        .find(|(name, _)| *name == target)
        .map(|(_, members)| *members)
}

/// Entries of `catalog` selected by a requested target list.
pub fn selected_targets<'a, S: AsRef<str>>(
    requested: &[S],
    catalog: Catalog<'a>,
) -> BTreeSet<&'a str> {
    let build_all =
        requested.is_empty() || requested.iter().any(|t| ALL_TARGETS.contains(&t.as_ref()));
    if build_all {
        return catalog.iter().map(|(name, _)| *name).collect();
    }

    let mut selected = BTreeSet::new();
    for target in requested.iter().map(|target| target.as_ref()) {
        let umbrella = umbrella_members(target);
        if let Some(members) = umbrella {
            for member in members {
                if let Some((name, _)) = catalog.iter().find(|(name, _)| name == member) {
                    selected.insert(*name);
                }
            }
        }
        if let Some((name, _)) = catalog.iter().find(|(name, _)| *name == target) {
            selected.insert(*name);
        } else if umbrella.is_none() {
            tracing::debug!(build_target = target, "no catalog entry; no binaries expected");
        }
    }
    selected
}

/// Expected files, relative to the install root, for the requested targets
/// looked up in `catalog`, plus any feature-conditional binaries.
///
/// Callers normally pass [`TARGET_CATALOG`].
pub fn derive<S: AsRef<str>, E: AsRef<str>>(
    requested: &[S],
    catalog: Catalog<'_>,
    extra_feature_artifacts: &[E],
) -> BTreeSet<String> {
    let mut artifacts = BTreeSet::new();
    for target in selected_targets(requested, catalog) {
        for name in catalog_entry(catalog, target).unwrap_or_default() {
            artifacts.insert(format!("{BIN_DIR}/{name}"));
        }
    }
    for name in extra_feature_artifacts {
        artifacts.insert(format!("{BIN_DIR}/{}", name.as_ref()));
    }
    artifacts
}

/// Check that every expected file exists under `install_root`.
pub fn verify_artifacts<'a, I>(install_root: &Path, expected: I) -> Result<usize, Error>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut checked = 0;
    let mut missing = Vec::new();
    for rel in expected {
        checked += 1;
        let path = install_root.join(rel);
        if path.is_file() {
            continue;
        }
        tracing::error!(file = %rel, root = %install_root.display(), "expected file missing");
        missing.push(rel.clone());
    }
    if !missing.is_empty() {
        return Err(Error::ArtifactMissing {
            root: install_root.to_path_buf(),
            missing,
        });
    }
    tracing::info!(checked, root = %install_root.display(), "all expected files present");
    Ok(checked)
}
