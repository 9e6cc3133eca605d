use std::collections::BTreeMap;

use crate::JobId;

/// Reference-counted set of job ids the push channel is subscribed to.
///
/// Membership, not wire history, is what gets replayed after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriptionRegistry {
    holders: BTreeMap<JobId, usize>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a holder. Returns true on the zero-to-one transition.
    pub(crate) fn acquire(&mut self, job_id: &str) -> bool {
        let count = self.holders.entry(job_id.to_string()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drops a holder. Returns true when the last holder went away.
    pub(crate) fn release(&mut self, job_id: &str) -> bool {
        let Some(count) = self.holders.get_mut(job_id) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.holders.remove(job_id);
            true
        } else {
            false
        }
    }

    pub fn holders(&self, job_id: &str) -> usize {
        self.holders.get(job_id).copied().unwrap_or(0)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.holders.contains_key(job_id)
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &JobId> {
        self.holders.keys()
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionRegistry;

    #[test]
    fn only_edges_report_transitions() {
        let mut registry = SubscriptionRegistry::new();
        assert!(registry.acquire("a"));
        assert!(!registry.acquire("a"));
        assert_eq!(registry.holders("a"), 2);

        assert!(!registry.release("a"));
        assert!(registry.contains("a"));
        assert!(registry.release("a"));
        assert!(!registry.contains("a"));
    }

    #[test]
    fn releasing_unknown_id_is_ignored() {
        let mut registry = SubscriptionRegistry::new();
        assert!(!registry.release("missing"));
        assert!(registry.is_empty());
    }
}
