use anyhow::Result;
use serde::Serialize;
use std::{io, str::FromStr};
use topology_analyzer_core::Connection;
use topology_analyzer_k8s_api::{List, NetworkPolicy};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

// === impl Format ===

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            s => Err(format!("unsupported output format: {}", s)),
        }
    }
}

impl Format {
    fn write<W: io::Write, T: Serialize>(self, mut writer: W, value: &T) -> Result<()> {
        match self {
            Self::Json => {
                serde_json::to_writer_pretty(&mut writer, value)?;
                writeln!(writer)?;
            }
            Self::Yaml => serde_yaml::to_writer(&mut writer, value)?,
        }
        Ok(())
    }
}

/// Writes the connection report: a list of `{source?, target, link}` objects.
pub fn write_connections<W: io::Write>(
    writer: W,
    format: Format,
    connections: &[Connection],
) -> Result<()> {
    format.write(writer, &connections)
}

/// Writes policies as a `NetworkPolicyList`.
pub fn write_policies<W: io::Write>(
    writer: W,
    format: Format,
    policies: Vec<NetworkPolicy>,
) -> Result<()> {
    let list = List {
        items: policies,
        metadata: Default::default(),
    };
    format.write(writer, &list)
}
