use crate::{
    output::{self, Format},
    PoliciesSynthesizer,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::{fs, io, path::PathBuf, str::FromStr};
use topology_analyzer_core::ExposureMode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// The environment variable overriding the log filter derived from the verbosity flags.
const LOG_ENV: &str = "TOPOLOGY_ANALYZER_LOG";

/// Infers the connectivity between the workloads declared in Kubernetes manifests
///
/// Connections are printed as a list of `{source, target, link}` objects, or, with `--netpols`,
/// as a list of NetworkPolicies allowing exactly the discovered traffic.
#[derive(Debug, Parser)]
#[clap(name = "topology-analyzer", version, about)]
pub struct Args {
    /// A directory or file to scan for manifests (may be repeated)
    #[clap(long = "dirpath", required = true)]
    dir_paths: Vec<PathBuf>,

    /// Writes the output to a file instead of stdout
    #[clap(long = "outputfile")]
    output_file: Option<PathBuf>,

    #[clap(long, default_value = "json")]
    format: Format,

    /// Synthesizes NetworkPolicies instead of reporting connections
    #[clap(long)]
    netpols: bool,

    /// Only logs errors
    #[clap(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Logs debugging detail
    #[clap(short, long)]
    verbose: bool,

    /// The port on which synthesized policies allow DNS lookups
    #[clap(long, default_value = "53")]
    dns_port: u16,

    /// Omits the DNS egress rule from synthesized policies
    #[clap(long, conflicts_with = "dns_port")]
    no_dns: bool,

    /// Exposure granted to services targeted by Routes and Ingresses (internal or external)
    #[clap(long, default_value = "internal")]
    exposure: ExposureMode,

    /// Stops at the first error, producing no output
    #[clap(long)]
    fail_fast: bool,

    #[clap(long, default_value = "plain")]
    log_format: LogFormat,
}

/// How much the tool logs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

// === impl Args ===

impl Args {
    #[inline]
    pub fn parse_and_run() -> Result<()> {
        let args = Self::parse();
        args.log_format.try_init(args.verbosity())?;
        args.run()
    }

    pub fn run(self) -> Result<()> {
        let dns_port = if self.no_dns {
            None
        } else {
            Some(self.dns_port)
        };
        let synthesizer = PoliciesSynthesizer::new()
            .with_fail_fast(self.fail_fast)
            .with_exposure_mode(self.exposure)
            .with_dns_port(dns_port);

        let fatal = if self.netpols {
            let outcome = synthesizer.policies_from_paths(&self.dir_paths);
            let fatal = outcome.fatal_error().map(ToString::to_string);
            if fatal.is_none() {
                self.write(|w| output::write_policies(w, self.format, outcome.output))?;
            }
            fatal
        } else {
            let outcome = synthesizer.connections_from_paths(&self.dir_paths);
            let fatal = outcome.fatal_error().map(ToString::to_string);
            if fatal.is_none() {
                self.write(|w| output::write_connections(w, self.format, &outcome.output))?;
            }
            fatal
        };

        if let Some(error) = fatal {
            bail!("analysis failed: {}", error);
        }
        Ok(())
    }

    fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    fn write(&self, write: impl FnOnce(&mut dyn io::Write) -> Result<()>) -> Result<()> {
        match self.output_file.as_ref() {
            Some(path) => {
                let mut file = fs::File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                write(&mut file)
            }
            None => {
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                write(&mut lock)
            }
        }
    }
}

// === impl Verbosity ===

impl Verbosity {
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Low,
            (false, true) => Self::High,
            (false, false) => Self::Medium,
        }
    }

    /// The log filter directive for this verbosity.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Low => "error",
            Self::Medium => "warn",
            Self::High => "debug",
        }
    }
}

// === impl LogFormat ===

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            s => Err(format!("invalid log format: {}", s)),
        }
    }
}

impl LogFormat {
    /// Installs a global subscriber logging to stderr.
    ///
    /// The filter is derived from `verbosity` unless the `TOPOLOGY_ANALYZER_LOG` environment
    /// variable is set.
    pub fn try_init(self, verbosity: Verbosity) -> Result<()> {
        let (filter, invalid) = match EnvFilter::try_from_env(LOG_ENV) {
            Ok(filter) => (filter, None),
            Err(error) => {
                let invalid = std::env::var_os(LOG_ENV).map(|_| error);
                (EnvFilter::new(verbosity.directive()), invalid)
            }
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr);
        match self {
            Self::Plain => builder.try_init(),
            Self::Json => builder.json().try_init(),
        }
        .map_err(|e| anyhow!(e))?;

        if let Some(error) = invalid {
            warn!(%error, "Ignoring invalid {}", LOG_ENV);
        }
        Ok(())
    }
}
