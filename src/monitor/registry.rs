// src/monitor/registry.rs
use crate::probe::Target;
use std::sync::{PoisonError, RwLock};

/// Insertion-ordered set of monitored targets.
///
/// Reads always copy the whole list so a cycle never observes a
/// half-applied update.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: RwLock<Vec<Target>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk insert used at startup. Returns how many targets were new.
    pub fn load_initial<I>(&self, targets: I) -> usize
    where
        I: IntoIterator<Item = Target>,
    {
        let mut current = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        let mut added = 0;
        for target in targets {
            if !current.contains(&target) {
                current.push(target);
                added += 1;
            }
        }
        added
    }

    /// Appends `target` unless it is already present. Returns whether it was added.
    pub fn add(&self, target: Target) -> bool {
        let mut current = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        if current.contains(&target) {
            return false;
        }
        current.push(target);
        true
    }

    pub fn snapshot(&self) -> Vec<Target> {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.targets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
