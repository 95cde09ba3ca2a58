//! Cancelable one-shot save timers, one per (actor, container).

use std::collections::BTreeMap;

use crate::{ActorId, ContainerId};

#[derive(Debug, Default)]
pub struct SaveScheduler {
    due: BTreeMap<(ActorId, ContainerId), u64>,
}

impl SaveScheduler {
    /// Arm the timer for the pair, replacing any pending one.
    pub fn arm(&mut self, actor: ActorId, container: ContainerId, due_at: u64) {
        self.due.insert((actor, container), due_at);
    }

    pub fn cancel(&mut self, actor: ActorId, container: ContainerId) -> bool {
        self.due.remove(&(actor, container)).is_some()
    }

    pub fn cancel_actor(&mut self, actor: ActorId) {
        self.due.retain(|(a, _), _| *a != actor);
    }

    pub fn pending(&self, actor: ActorId, container: ContainerId) -> Option<u64> {
        self.due.get(&(actor, container)).copied()
    }

    /// Remove and return every timer due at or before `now`.
    pub fn take_due(&mut self, now: u64) -> Vec<(ActorId, ContainerId)> {
        let fired: Vec<(ActorId, ContainerId)> = self
            .due
            .iter()
            .filter(|(_, &at)| at <= now)
            .map(|(key, _)| *key)
            .collect();
        for key in &fired {
            self.due.remove(key);
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{actor, container};

    #[test]
    fn rearming_replaces_pending_timer() {
        let mut s = SaveScheduler::default();
        let (a, c) = (actor(1), container(1));
        s.arm(a, c, 5);
        s.arm(a, c, 9);
        assert!(s.take_due(5).is_empty());
        assert_eq!(s.take_due(9), vec![(a, c)]);
        assert!(s.take_due(100).is_empty());
    }

    #[test]
    fn cancel_actor_only_drops_that_actor() {
        let mut s = SaveScheduler::default();
        s.arm(actor(1), container(1), 3);
        s.arm(actor(1), container(2), 3);
        s.arm(actor(2), container(1), 3);
        s.cancel_actor(actor(1));
        assert_eq!(s.take_due(3), vec![(actor(2), container(1))]);
    }
}
