//! Per-actor click-rate guard.

use std::collections::{HashMap, VecDeque};

use crate::{ActorId, Constants};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstVerdict {
    Allowed,
    /// This click tripped the guard; blocked until the given quantum.
    Tripped { until: u64 },
    /// Already blocked.
    Blocked,
}

#[derive(Debug, Default)]
struct ClickWindow {
    clicks: VecDeque<u64>,
    blocked_until: Option<u64>,
}

#[derive(Debug, Default)]
pub struct BurstGuard {
    windows: HashMap<ActorId, ClickWindow>,
}

impl BurstGuard {
    /// Count one click at quantum `now` and judge it.
    pub fn record_click(&mut self, actor: ActorId, now: u64, constants: &Constants) -> BurstVerdict {
        let window = self.windows.entry(actor).or_default();
        match window.blocked_until {
            Some(until) if now < until => return BurstVerdict::Blocked,
            Some(_) => window.blocked_until = None,
            None => {}
        }

        window.clicks.push_back(now);
        let span = constants.burst_window_quanta.max(1);
        while window
            .clicks
            .front()
            .is_some_and(|&t| now.saturating_sub(t) >= span)
        {
            window.clicks.pop_front();
        }

        let in_quantum = window.clicks.iter().filter(|&&t| t == now).count();
        let in_window = window.clicks.len();
        if in_quantum >= constants.burst_quantum_threshold as usize
            || in_window >= constants.burst_window_threshold as usize
        {
            let until = now + constants.burst_cooldown_quanta;
            window.blocked_until = Some(until);
            window.clicks.clear();
            return BurstVerdict::Tripped { until };
        }
        BurstVerdict::Allowed
    }

    pub fn is_blocked(&self, actor: ActorId, now: u64) -> bool {
        self.windows
            .get(&actor)
            .and_then(|w| w.blocked_until)
            .is_some_and(|until| now < until)
    }

    pub fn forget(&mut self, actor: ActorId) {
        self.windows.remove(&actor);
    }
}
