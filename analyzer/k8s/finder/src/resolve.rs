use crate::error::{Errors, ProcessingError, Stop};
use std::{collections::HashMap, mem};
use topology_analyzer_core::{is_network_address, ConfigMap, Workload};
use tracing::trace;

/// Replaces the config map references of every workload with the addresses they point at.
///
/// Must run once every config map has been scanned: a workload may be declared before the config
/// maps it references.
pub(crate) fn resolve_config_maps(
    workloads: &mut [Workload],
    config_maps: &HashMap<String, ConfigMap>,
    errors: &mut Errors,
) -> Result<(), Stop> {
    for workload in workloads.iter_mut() {
        let ns = workload.namespace().to_string();

        for name in mem::take(&mut workload.config_map_refs) {
            let full_name = ConfigMap::full_name(&ns, &name);
            match config_maps.get(&full_name) {
                Some(cm) => {
                    trace!(workload = %workload.id(), configmap = %full_name, "Resolved");
                    // Entries were already filtered on scan.
                    workload.network_addrs.extend(cm.data.values().cloned());
                }
                None => errors.push(ProcessingError::config_map_not_found(
                    full_name,
                    workload.name().to_string(),
                    workload.file_path.clone(),
                ))?,
            }
        }

        for key_ref in mem::take(&mut workload.config_map_key_refs) {
            let full_name = ConfigMap::full_name(&ns, &key_ref.name);
            let cm = match config_maps.get(&full_name) {
                Some(cm) => cm,
                None => {
                    errors.push(ProcessingError::config_map_not_found(
                        full_name,
                        workload.name().to_string(),
                        workload.file_path.clone(),
                    ))?;
                    continue;
                }
            };
            match cm.data.get(&key_ref.key) {
                Some(value) => {
                    if is_network_address(value) {
                        trace!(workload = %workload.id(), configmap = %full_name, key = %key_ref.key, "Resolved");
                        workload.network_addrs.push(value.clone());
                    }
                }
                None => errors.push(ProcessingError::config_map_key_not_found(
                    full_name,
                    key_ref.key,
                    workload.name().to_string(),
                    workload.file_path.clone(),
                ))?,
            }
        }
    }
    Ok(())
}
