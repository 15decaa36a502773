use crate::{
    addr::{endpoint, strip_http},
    selector::are_selectors_contained,
    Service, ServicePort, Workload,
};
use serde::Serialize;
use tracing::{debug, trace};

/// A connection from a workload, through a service, to the workload behind it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Connection {
    /// The calling workload; absent when the service fronts the target but no caller was
    /// discovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Workload>,

    pub target: Workload,

    pub link: Service,

    /// The service port through which the source reaches the target. Absent together with the
    /// source.
    #[serde(skip)]
    pub port: Option<ServicePort>,
}

/// Indices into the workload and service sets.
#[derive(Copy, Clone, Debug)]
struct Edge {
    source: Option<usize>,
    target: usize,
    link: usize,
    port: Option<usize>,
}

/// Discovers the connections between `workloads` through `services`.
///
/// Each workload is a potential target: every service whose selectors are all contained in the
/// workload's labels fronts it. For each port of such a service, any other workload holding the
/// address `name:port` (optionally prefixed with `http://`) is a source. A fronting service without
/// any source still yields a connection with no source.
///
/// The ports through which each target is reached are recorded in its `used_ports`. Duplicate
/// connections are not removed.
pub fn discover_connections(workloads: &mut [Workload], services: &[Service]) -> Vec<Connection> {
    let mut edges = Vec::new();

    for (target, dst) in workloads.iter().enumerate() {
        let labels = dst.labels.selectors();
        for (link, svc) in services.iter().enumerate() {
            // A service without selectors doesn't front any pods.
            if svc.selectors.is_empty() || !are_selectors_contained(&labels, &svc.selectors) {
                continue;
            }
            trace!(service = %svc.id(), workload = %dst.id(), "Service selects workload");

            let before = edges.len();
            find_sources(workloads, target, svc, link, &mut edges);
            if edges.len() == before {
                debug!(service = %svc.id(), workload = %dst.id(), "No source found");
                edges.push(Edge {
                    source: None,
                    target,
                    link,
                    port: None,
                });
            }
        }
    }

    for edge in &edges {
        if let Some(port) = edge.port {
            workloads[edge.target]
                .used_ports
                .insert(services[edge.link].ports[port].port);
        }
    }

    edges
        .into_iter()
        .map(|edge| {
            let source = edge.source.map(|s| workloads[s].clone());
            let target = workloads[edge.target].clone();
            let link = services[edge.link].clone();
            let port = edge.port.map(|p| link.ports[p].clone());
            if let Some(src) = source.as_ref() {
                debug!(source = %src.id(), target = %target.id(), link = %link.id(), "Connection");
            }
            Connection {
                source,
                target,
                link,
                port,
            }
        })
        .collect()
}

/// Pushes an edge for every address of every workload other than `target` that matches one of
/// `svc`'s endpoints.
fn find_sources(
    workloads: &[Workload],
    target: usize,
    svc: &Service,
    link: usize,
    edges: &mut Vec<Edge>,
) {
    for (port, svc_port) in svc.ports.iter().enumerate() {
        let ep = endpoint(svc.name(), svc_port.port);
        for (source, src) in workloads.iter().enumerate() {
            if source == target {
                continue;
            }
            for addr in &src.network_addrs {
                if strip_http(addr) == ep {
                    edges.push(Edge {
                        source: Some(source),
                        target,
                        link,
                        port: Some(port),
                    });
                }
            }
        }
    }
}
