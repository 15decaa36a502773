#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
pub mod netpol;
pub mod output;
mod synthesizer;

pub use self::{
    args::{Args, LogFormat, Verbosity},
    netpol::Synthesizer,
    output::Format,
    synthesizer::{Outcome, PoliciesSynthesizer},
};
pub use topology_analyzer_core::{Connection, ExposureMode};
pub use topology_analyzer_k8s_api::NetworkPolicy;
pub use topology_analyzer_k8s_finder::{ErrorKind, FsWalker, ProcessingError, Step, Visit, Walk};
