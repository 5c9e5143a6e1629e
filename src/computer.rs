//! Virtual quantum computers and the registry that holds them.
//!
//! Each computer has a fake queue time, drawn once when the registry is
//! built. Every job sent to that computer waits for that long before it
//! runs. The registry never changes after construction.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};

use crate::error::{ServerError, ServerResult};

/// Names of the computers registered by default.
pub const DEFAULT_COMPUTERS: [&str; 4] = ["GladOs", "HAL-9000", "TARS", "Quanti"];

/// Default upper bound for a randomized queue time.
pub const DEFAULT_MAX_QUEUE_TIME: Duration = Duration::from_secs(60);

/// A named execution target with a fixed simulated queue delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Computer {
    name: String,
    #[serde(serialize_with = "serialize_secs")]
    queue_time: Duration,
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

impl Computer {
    pub fn new(name: impl Into<String>, queue_time: Duration) -> Self {
        Self {
            name: name.into(),
            queue_time,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delay every job on this computer waits before running.
    pub fn queue_time(&self) -> Duration {
        self.queue_time
    }
}

/// Fixed set of computers, shared read-only by all requests.
#[derive(Debug, Clone)]
pub struct ComputerRegistry {
    computers: Vec<Arc<Computer>>,
}

impl ComputerRegistry {
    /// Build a registry from computers with known queue times.
    ///
    /// Fails if the list is empty or contains a name twice.
    pub fn from_computers(computers: Vec<Computer>) -> ServerResult<Self> {
        if computers.is_empty() {
            return Err(ServerError::Configuration(
                "at least one computer is required".into(),
            ));
        }
        let mut seen = FxHashSet::default();
        for computer in &computers {
            if !seen.insert(computer.name.as_str()) {
                return Err(ServerError::Configuration(format!(
                    "duplicate computer name: {}",
                    computer.name
                )));
            }
        }
        Ok(Self {
            computers: computers.into_iter().map(Arc::new).collect(),
        })
    }

    /// Build a registry with a queue time drawn uniformly from
    /// `[0, max_queue_time]` whole seconds for each name.
    pub fn randomized<I, S, R>(
        names: I,
        max_queue_time: Duration,
        rng: &mut R,
    ) -> ServerResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        R: Rng + ?Sized,
    {
        let max_secs = max_queue_time.as_secs();
        let computers = names
            .into_iter()
            .map(|name| Computer::new(name, Duration::from_secs(rng.gen_range(0..=max_secs))))
            .collect();
        Self::from_computers(computers)
    }

    /// All computers, in registration order.
    pub fn list(&self) -> &[Arc<Computer>] {
        &self.computers
    }

    /// Look up a computer by exact (case-sensitive) name.
    pub fn find(&self, name: &str) -> Option<Arc<Computer>> {
        self.computers.iter().find(|c| c.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.computers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.computers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn default_registry(seed: u64) -> ComputerRegistry {
        let mut rng = StdRng::seed_from_u64(seed);
        ComputerRegistry::randomized(DEFAULT_COMPUTERS, DEFAULT_MAX_QUEUE_TIME, &mut rng).unwrap()
    }

    #[test]
    fn test_randomized_within_bounds() {
        for seed in 0..20 {
            let registry = default_registry(seed);
            assert_eq!(registry.len(), 4);
            for computer in registry.list() {
                assert!(computer.queue_time() <= DEFAULT_MAX_QUEUE_TIME);
                assert_eq!(computer.queue_time().subsec_nanos(), 0);
            }
        }
    }

    #[test]
    fn test_seeded_registry_is_reproducible() {
        let a = default_registry(7);
        let b = default_registry(7);
        let times_a: Vec<_> = a.list().iter().map(|c| c.queue_time()).collect();
        let times_b: Vec<_> = b.list().iter().map(|c| c.queue_time()).collect();
        assert_eq!(times_a, times_b);
    }

    #[test]
    fn test_list_keeps_order() {
        let registry = default_registry(1);
        let names: Vec<_> = registry.list().iter().map(|c| c.name()).collect();
        assert_eq!(names, DEFAULT_COMPUTERS);
    }

    #[test]
    fn test_find_is_case_sensitive() {
        let registry = default_registry(1);
        assert_eq!(registry.find("GladOs").unwrap().name(), "GladOs");
        assert!(registry.find("glados").is_none());
        assert!(registry.find("Skynet").is_none());
    }

    #[test]
    fn test_find_returns_shared_instance() {
        let registry = default_registry(1);
        let a = registry.find("TARS").unwrap();
        let b = registry.find("TARS").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ComputerRegistry::from_computers(vec![
            Computer::new("TARS", Duration::ZERO),
            Computer::new("TARS", Duration::from_secs(1)),
        ])
        .unwrap_err();
        assert!(matches!(err, ServerError::Configuration(_)));
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(ComputerRegistry::from_computers(vec![]).is_err());
    }

    #[test]
    fn test_zero_max_queue_time() {
        let mut rng = StdRng::seed_from_u64(3);
        let registry = ComputerRegistry::randomized(["A", "B"], Duration::ZERO, &mut rng).unwrap();
        assert!(registry.list().iter().all(|c| c.queue_time() == Duration::ZERO));
    }

    #[test]
    fn test_computer_serializes_seconds() {
        let computer = Computer::new("Quanti", Duration::from_secs(42));
        assert_eq!(
            serde_json::to_value(&computer).unwrap(),
            json!({"name": "Quanti", "queue_time": 42})
        );
    }
}
