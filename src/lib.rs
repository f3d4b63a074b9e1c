//! Build configuration synthesis and test-suite verification for
//! Quantum ESPRESSO CMake builds.
//!
//! Three engines sit behind the lifecycle [`hooks`]:
//! - [`resolve`]: feature requests to validated CMake arguments;
//! - [`evaluate`]: harness output to a pass/fail decision;
//! - [`artifacts`]: build targets to the binaries a build must install.
pub mod artifacts;
pub mod config;
pub mod env;
pub mod error;
pub mod evaluate;
pub mod harness;
pub mod hooks;
pub mod resolve;
pub mod version;

pub use error::Error;
