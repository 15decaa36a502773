//! Typed dispatch over the manifest kinds relevant to connectivity analysis.
//!
//! A document is first decoded into its [`TypeMeta`] header. The header's kind is looked up in a
//! static table of parsers; kinds absent from the table are well-formed resources that the
//! analysis has no use for (e.g. `Pod`, `CronJob`, `Secret`).
//!
//! Dispatch is on the kind alone: a resource declared under an older API group (e.g. an
//! `apps/v1beta2` Deployment) is decoded as the current version of its kind.

use crate::{
    route::Route, ConfigMap, DaemonSet, Deployment, Ingress, Job, ObjectMeta, PodTemplateSpec,
    ReplicaSet, ReplicationController, Service, StatefulSet,
};
use kube::Resource;
use serde::{de::DeserializeOwned, Deserialize};
use serde_yaml::Value;

/// The `apiVersion`/`kind` header shared by every Kubernetes resource.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    pub api_version: String,
    pub kind: String,
}

/// A decoded resource of one of the accepted kinds.
#[derive(Clone, Debug)]
pub enum Manifest {
    ReplicaSet(ReplicaSet),
    ReplicationController(ReplicationController),
    Deployment(Deployment),
    DaemonSet(DaemonSet),
    StatefulSet(StatefulSet),
    Job(Job),
    Service(Service),
    ConfigMap(ConfigMap),
    Route(Route),
    Ingress(Ingress),
}

/// Decodes a document into a [`Manifest`] of a specific kind.
pub type Parse = fn(Value) -> Result<Manifest, serde_yaml::Error>;

/// The pieces of a pod-owning resource that describe its pods.
#[derive(Copy, Clone, Debug)]
pub struct WorkloadParts<'a> {
    pub kind: &'static str,
    pub metadata: &'a ObjectMeta,
    pub template: Option<&'a PodTemplateSpec>,
}

macro_rules! parser {
    ($variant:ident) => {{
        fn parse(value: Value) -> Result<Manifest, serde_yaml::Error> {
            decode(value).map(Manifest::$variant)
        }
        parse as Parse
    }};
}

const KINDS: &[(&str, Parse)] = &[
    ("ReplicaSet", parser!(ReplicaSet)),
    ("ReplicationController", parser!(ReplicationController)),
    ("Deployment", parser!(Deployment)),
    ("DaemonSet", parser!(DaemonSet)),
    ("StatefulSet", parser!(StatefulSet)),
    ("Job", parser!(Job)),
    ("Service", parser!(Service)),
    ("ConfigMap", parser!(ConfigMap)),
    ("Route", parser!(Route)),
    ("Ingress", parser!(Ingress)),
];

fn decode<T>(mut value: Value) -> Result<T, serde_yaml::Error>
where
    T: DeserializeOwned + Resource<DynamicType = ()>,
{
    if let Value::Mapping(fields) = &mut value {
        let api_version = T::api_version(&()).into_owned();
        fields.insert("apiVersion".into(), api_version.into());
    }
    serde_yaml::from_value(value)
}

// === impl TypeMeta ===

impl TypeMeta {
    /// Reads the header of a decoded document.
    ///
    /// Fails if either field is missing, is not a string, or is empty.
    pub fn from_value(value: &Value) -> Result<Self, serde_yaml::Error> {
        use serde::de::Error;

        let meta = Self::deserialize(value)?;
        if meta.api_version.is_empty() {
            return Err(serde_yaml::Error::custom("empty apiVersion"));
        }
        if meta.kind.is_empty() {
            return Err(serde_yaml::Error::custom("empty kind"));
        }
        Ok(meta)
    }
}

// === impl Manifest ===

impl Manifest {
    /// Returns the parser for `kind`, if the kind is relevant to the analysis.
    pub fn parser(kind: &str) -> Option<Parse> {
        KINDS
            .iter()
            .find(|(name, _)| *name == kind)
            .map(|(_, parse)| *parse)
    }

    /// Iterates over the names of all accepted kinds.
    pub fn kinds() -> impl Iterator<Item = &'static str> {
        KINDS.iter().map(|(name, _)| *name)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReplicaSet(_) => "ReplicaSet",
            Self::ReplicationController(_) => "ReplicationController",
            Self::Deployment(_) => "Deployment",
            Self::DaemonSet(_) => "DaemonSet",
            Self::StatefulSet(_) => "StatefulSet",
            Self::Job(_) => "Job",
            Self::Service(_) => "Service",
            Self::ConfigMap(_) => "ConfigMap",
            Self::Route(_) => "Route",
            Self::Ingress(_) => "Ingress",
        }
    }

    /// Returns the metadata and pod template of pod-owning kinds, or `None` for the others.
    pub fn workload_parts(&self) -> Option<WorkloadParts<'_>> {
        let (metadata, template) = match self {
            Self::ReplicaSet(rs) => (
                &rs.metadata,
                rs.spec.as_ref().and_then(|s| s.template.as_ref()),
            ),
            Self::ReplicationController(rc) => (
                &rc.metadata,
                rc.spec.as_ref().and_then(|s| s.template.as_ref()),
            ),
            Self::Deployment(d) => (&d.metadata, d.spec.as_ref().map(|s| &s.template)),
            Self::DaemonSet(ds) => (&ds.metadata, ds.spec.as_ref().map(|s| &s.template)),
            Self::StatefulSet(ss) => (&ss.metadata, ss.spec.as_ref().map(|s| &s.template)),
            Self::Job(job) => (&job.metadata, job.spec.as_ref().map(|s| &s.template)),
            Self::Service(_) | Self::ConfigMap(_) | Self::Route(_) | Self::Ingress(_) => {
                return None
            }
        };
        Some(WorkloadParts {
            kind: self.kind(),
            metadata,
            template,
        })
    }
}
