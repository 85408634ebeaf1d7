//! rcorder(8)-style ordering of service descriptors

use super::ServiceDescriptor;
use crate::RcError;
use tracing::trace;

/// Order services so every `require` and `before` edge between them holds.
///
/// Edges naming services outside `services` (FILESYSTEMS, NETWORKING, ...)
/// are provided by the base system and ignored. Among services that are
/// free to start, input order wins.
pub fn boot_order(services: &[ServiceDescriptor]) -> Result<Vec<&'static str>, RcError> {
    let n = services.len();
    let index_of = |name: &str| services.iter().position(|s| s.name == name);

    // preds[i] lists services that must start before services[i]
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, service) in services.iter().enumerate() {
        for required in service.require {
            if let Some(j) = index_of(*required) {
                preds[i].push(j);
            }
        }
        for later in service.before {
            if let Some(j) = index_of(*later) {
                preds[j].push(i);
            }
        }
    }

    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let next = (0..n).find(|&i| !placed[i] && preds[i].iter().all(|&p| placed[p]));
        match next {
            Some(i) => {
                trace!("rcorder: {}", services[i].name);
                placed[i] = true;
                order.push(services[i].name);
            }
            None => return Err(RcError::Cycle(find_cycle(services, &preds, &placed))),
        }
    }

    Ok(order)
}

/// Walk predecessor edges among unplaced services until one repeats
fn find_cycle(services: &[ServiceDescriptor], preds: &[Vec<usize>], placed: &[bool]) -> Vec<String> {
    let Some(start) = placed.iter().position(|p| !p) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        // Every unplaced service has at least one unplaced predecessor
        let Some(&prev) = preds[current].iter().find(|&&p| !placed[p]) else {
            break;
        };
        if let Some(pos) = path.iter().position(|&i| i == prev) {
            // path runs against the edges; reverse it to read in start order
            let mut cycle = vec![services[prev].name.to_string()];
            cycle.extend(path[pos..].iter().rev().map(|&i| services[i].name.to_string()));
            return cycle;
        }
        path.push(prev);
        current = prev;
    }

    path.iter().map(|&i| services[i].name.to_string()).collect()
}
