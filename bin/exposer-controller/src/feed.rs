//! Turns raw watcher events into add/update/delete service events
//!
//! The cluster watch only delivers the current object. To hand the policy
//! both the old and the new snapshot of an update, the feed remembers the
//! last snapshot it saw for every service key. A relist (`Init` ..
//! `InitDone`) that no longer contains a cached key yields a delete for it.

use exposer_core::{ServiceEvent, ServiceSnapshot};
use k8s_openapi::api::core::v1::Service;
use kube_runtime::watcher;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Default)]
pub struct ServiceFeed {
    cache: HashMap<String, ServiceSnapshot>,
    /// Keys seen since the last `Init`, while a relist is in progress
    relist: Option<HashSet<String>>,
}

impl ServiceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of services currently known
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Translate one watcher event, in delivery order
    pub fn observe(&mut self, event: watcher::Event<Service>) -> Vec<ServiceEvent> {
        match event {
            watcher::Event::Apply(svc) => vec![self.apply(ServiceSnapshot::from(&svc))],
            watcher::Event::Delete(svc) => {
                let snapshot = ServiceSnapshot::from(&svc);
                self.cache.remove(&snapshot.key());
                vec![ServiceEvent::Deleted(snapshot)]
            }
            watcher::Event::Init => {
                debug!("Service relist started");
                self.relist = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(svc) => {
                let snapshot = ServiceSnapshot::from(&svc);
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(snapshot.key());
                }
                vec![self.apply(snapshot)]
            }
            watcher::Event::InitDone => self.finish_relist(),
        }
    }

    fn apply(&mut self, snapshot: ServiceSnapshot) -> ServiceEvent {
        match self.cache.insert(snapshot.key(), snapshot.clone()) {
            Some(old) => ServiceEvent::Updated { old, new: snapshot },
            None => ServiceEvent::Added(snapshot),
        }
    }

    fn finish_relist(&mut self) -> Vec<ServiceEvent> {
        let Some(seen) = self.relist.take() else {
            return Vec::new();
        };

        let mut gone: Vec<String> = self
            .cache
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        gone.sort();

        debug!(
            "Service relist finished: {} present, {} gone",
            seen.len(),
            gone.len()
        );

        gone.into_iter()
            .filter_map(|key| self.cache.remove(&key))
            .map(ServiceEvent::Deleted)
            .collect()
    }
}
