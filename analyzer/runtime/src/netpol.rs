//! Synthesizes `NetworkPolicy` objects that allow exactly the discovered connections.
//!
//! Connections are grouped by the pods they select: a group is a namespace and a set of pod
//! labels. Each group gets one policy selecting its pods, with:
//!
//! - an ingress rule per peer that connects to the group, listing the ports it connects to;
//! - an egress rule per peer the group connects to;
//! - optionally, an egress rule allowing DNS lookups.
//!
//! A connection whose caller is unknown can't be narrowed to a peer, so it is allowed from
//! anywhere on the service's ports. Workloads without pod labels get no policy of their own: no
//! selector can single out their pods.

use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};
use topology_analyzer_core::{Connection, Service, ServicePort, TargetPort, Workload};
use topology_analyzer_k8s_api::{
    labels::Map, IntOrString, LabelSelector, Labels, NetworkPolicy, NetworkPolicyEgressRule,
    NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort, NetworkPolicySpec, ObjectMeta,
};
use tracing::debug;

/// The label every namespace carries with its own name.
const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

/// Builds policies from connections.
#[derive(Clone, Debug, Default)]
pub struct Synthesizer {
    dns_port: Option<u16>,
}

/// Pods selected by one policy.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    namespace: String,
    labels: Labels,
}

#[derive(Debug)]
struct Group {
    name: String,
    ingress: BTreeMap<Peer, BTreeSet<Port>>,
    egress: BTreeMap<Peer, BTreeSet<Port>>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Peer {
    Anywhere,
    AnyNamespace,
    Pods {
        /// Set when the pods live in another namespace than the policy.
        namespace: Option<String>,
        labels: Labels,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Port {
    port: TargetPort,
    protocol: String,
}

// === impl Synthesizer ===

impl Synthesizer {
    /// The DNS port allowed by default.
    pub const DEFAULT_DNS_PORT: u16 = 53;

    /// Creates a synthesizer that allows DNS lookups on `dns_port`, if set.
    pub fn new(dns_port: Option<u16>) -> Self {
        Self { dns_port }
    }

    /// Returns one policy per group of pods involved in `connections`, ordered by namespace and
    /// labels.
    pub fn synthesize(&self, connections: &[Connection]) -> Vec<NetworkPolicy> {
        let mut groups = BTreeMap::<GroupKey, Group>::new();

        for conn in connections {
            let ports = match conn.port.as_ref() {
                Some(port) => vec![Port::from(port)],
                None => conn.link.ports.iter().map(Port::from).collect(),
            };

            if let Some(target) = group(&mut groups, &conn.target) {
                match conn.source.as_ref() {
                    Some(src) => {
                        let peer = Peer::pods(src, conn.target.namespace());
                        target.allow_ingress(peer, ports.iter().cloned());
                    }
                    None => target.allow_ingress(Peer::Anywhere, ports.iter().cloned()),
                }
                for peer in exposure_peers(&conn.link) {
                    target.allow_ingress(peer, conn.link.ports.iter().map(Port::from));
                }
            }

            if let Some(src) = conn.source.as_ref() {
                if let Some(source) = group(&mut groups, src) {
                    let peer = Peer::pods(&conn.target, src.namespace());
                    source.allow_egress(peer, ports);
                }
            }
        }

        let mut names = BTreeSet::new();
        groups
            .into_iter()
            .map(|(key, group)| {
                let name = unique_name(&mut names, &key.namespace, &group.name);
                self.policy(key, name, group)
            })
            .collect()
    }

    fn policy(&self, key: GroupKey, name: String, group: Group) -> NetworkPolicy {
        debug!(
            %name,
            ns = %key.namespace,
            ingress = group.ingress.len(),
            egress = group.egress.len(),
            "Synthesized policy"
        );

        let ingress = group
            .ingress
            .into_iter()
            .filter(|(_, ports)| !ports.is_empty())
            .map(|(peer, ports)| NetworkPolicyIngressRule {
                from: peer.into_peers(),
                ports: Some(ports.into_iter().map(Into::into).collect()),
            })
            .collect();

        let mut egress = group
            .egress
            .into_iter()
            .filter(|(_, ports)| !ports.is_empty())
            .map(|(peer, ports)| NetworkPolicyEgressRule {
                to: peer.into_peers(),
                ports: Some(ports.into_iter().map(Into::into).collect()),
            })
            .collect::<Vec<_>>();
        if let Some(port) = self.dns_port {
            egress.push(dns_rule(port));
        }

        NetworkPolicy {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(key.namespace).filter(|ns| !ns.is_empty()),
                ..Default::default()
            },
            spec: Some(NetworkPolicySpec {
                pod_selector: match_labels(key.labels),
                ingress: Some(ingress),
                egress: Some(egress),
                policy_types: Some(vec!["Ingress".to_string(), "Egress".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Returns the group selecting `workload`'s pods, or `None` if its pods carry no labels.
fn group<'g>(
    groups: &'g mut BTreeMap<GroupKey, Group>,
    workload: &Workload,
) -> Option<&'g mut Group> {
    if workload.labels.is_empty() {
        debug!(name = %workload.name(), ns = %workload.namespace(), "No pod labels to select");
        return None;
    }
    let key = GroupKey {
        namespace: workload.namespace().to_string(),
        labels: workload.labels.clone(),
    };
    let group = match groups.entry(key) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(Group {
            name: workload.name().to_string(),
            ingress: BTreeMap::new(),
            egress: BTreeMap::new(),
        }),
    };
    Some(group)
}

/// Names a policy `<workload>-netpol`, suffixed with a counter if the name is already taken in
/// the namespace.
fn unique_name(taken: &mut BTreeSet<(String, String)>, ns: &str, workload: &str) -> String {
    let base = format!("{}-netpol", workload);
    let mut name = base.clone();
    let mut n = 1;
    while !taken.insert((ns.to_string(), name.clone())) {
        n += 1;
        name = format!("{}-{}", base, n);
    }
    name
}

/// Peers implied by the service's exposure, in addition to discovered callers.
fn exposure_peers(svc: &Service) -> impl Iterator<Item = Peer> {
    let external = svc.exposed_externally.then_some(Peer::Anywhere);
    let cluster = svc.exposed_to_cluster.then_some(Peer::AnyNamespace);
    external.into_iter().chain(cluster)
}

fn dns_rule(port: u16) -> NetworkPolicyEgressRule {
    let ports = ["UDP", "TCP"]
        .iter()
        .map(|protocol| NetworkPolicyPort {
            port: Some(IntOrString::Int(port.into())),
            protocol: Some(protocol.to_string()),
            ..Default::default()
        })
        .collect();
    NetworkPolicyEgressRule {
        to: None,
        ports: Some(ports),
    }
}

fn match_labels(labels: Labels) -> LabelSelector {
    LabelSelector {
        match_labels: Some(Map::from(labels)).filter(|m| !m.is_empty()),
        ..Default::default()
    }
}

// === impl Group ===

impl Group {
    fn allow_ingress(&mut self, peer: Peer, ports: impl IntoIterator<Item = Port>) {
        self.ingress.entry(peer).or_default().extend(ports);
    }

    fn allow_egress(&mut self, peer: Peer, ports: impl IntoIterator<Item = Port>) {
        self.egress.entry(peer).or_default().extend(ports);
    }
}

// === impl Peer ===

impl Peer {
    /// The pods of `workload`, as seen from a policy in namespace `ns`.
    fn pods(workload: &Workload, ns: &str) -> Self {
        let namespace = Some(workload.namespace())
            .filter(|other| *other != ns)
            .map(String::from);
        Self::Pods {
            namespace,
            labels: workload.labels.clone(),
        }
    }

    /// Converts the peer to a rule's peer list; `None` allows all peers.
    fn into_peers(self) -> Option<Vec<NetworkPolicyPeer>> {
        match self {
            Self::Anywhere => None,
            Self::AnyNamespace => Some(vec![NetworkPolicyPeer {
                namespace_selector: Some(LabelSelector::default()),
                ..Default::default()
            }]),
            Self::Pods { namespace, labels } => {
                let namespace_selector = namespace.map(|ns| {
                    let mut labels = Map::new();
                    labels.insert(NAMESPACE_NAME_LABEL.to_string(), ns);
                    LabelSelector {
                        match_labels: Some(labels),
                        ..Default::default()
                    }
                });
                Some(vec![NetworkPolicyPeer {
                    pod_selector: Some(match_labels(labels)),
                    namespace_selector,
                    ..Default::default()
                }])
            }
        }
    }
}

// === impl Port ===

impl From<&ServicePort> for Port {
    fn from(port: &ServicePort) -> Self {
        Self {
            port: port.pod_port(),
            protocol: port.protocol.clone(),
        }
    }
}

impl From<Port> for NetworkPolicyPort {
    fn from(Port { port, protocol }: Port) -> Self {
        let port = match port {
            TargetPort::Number(n) => IntOrString::Int(n),
            TargetPort::Name(name) => IntOrString::String(name),
        };
        NetworkPolicyPort {
            port: Some(port),
            protocol: Some(protocol),
            ..Default::default()
        }
    }
}
