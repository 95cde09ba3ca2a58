//! Mutation controller: turns raw click intents into storage edits, page and
//! sort changes and socket operations, behind the burst guard.

mod nav;
mod screens;
mod sockets;
mod storage;

use serde::{Deserialize, Serialize};

use crate::burst::BurstVerdict;
use crate::engine::StashEngine;
use crate::host::{give_or_drop, Host};
use crate::inventory::insert_into;
use crate::store::RecordStore;
use crate::{ActorId, EngineEvent, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Click {
    Primary,
    Secondary,
    ShiftPrimary,
    ShiftSecondary,
    /// The host's drop key over a slot.
    Drop,
}

/// Raw input delivered by the host for an open main view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Click { slot: usize, click: Click },
    /// Spread the cursor stack evenly over the listed slots.
    Drag { slots: Vec<usize> },
    /// Shift-transfer from the actor's own inventory into the view.
    TransferIn { inventory_slot: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Rejected,
    /// Cancelled by the burst guard.
    Blocked,
}

impl StashEngine {
    /// Apply one intent to the actor's open main view.
    pub fn handle(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        intent: Intent,
    ) -> Result<Outcome> {
        if self.sessions.get(actor).is_none() {
            return Ok(Outcome::Rejected);
        }
        let now = self.quantum;
        match self.bursts.record_click(actor, now, &self.content.constants) {
            BurstVerdict::Allowed => {}
            BurstVerdict::Blocked => return Ok(Outcome::Blocked),
            BurstVerdict::Tripped { until } => {
                tracing::warn!(actor = %actor, until, "click burst detected, input blocked");
                self.log.emit(
                    now,
                    EngineEvent::BurstBlocked {
                        actor,
                        until_quantum: until,
                    },
                );
                self.redistribute_cursor(host, actor);
                return Ok(Outcome::Blocked);
            }
        }

        let outcome = match intent {
            Intent::Click { slot, click } => self.click(store, host, actor, slot, click)?,
            Intent::Drag { slots } => self.drag(host, actor, &slots),
            Intent::TransferIn { inventory_slot } => self.transfer_in(host, actor, inventory_slot),
        };
        if outcome == Outcome::Rejected {
            // Resync the host's copy of the grid after a refused edit.
            self.show(host, actor);
        }
        Ok(outcome)
    }

    fn click(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        slot: usize,
        click: Click,
    ) -> Result<Outcome> {
        let Some(session) = self.sessions.get(actor) else {
            return Ok(Outcome::Rejected);
        };
        let layout = &session.layout;
        if slot < layout.storage_area {
            return Ok(self.storage_click(host, actor, slot, click));
        }
        if layout.prev_button == Some(slot) {
            return Ok(self.change_page(host, actor, false));
        }
        if layout.next_button == Some(slot) {
            return Ok(self.change_page(host, actor, true));
        }
        if layout.sort_button == Some(slot) {
            return self.sort_click(store, host, actor, click);
        }
        if let Some(socket) = layout.socket_at(slot) {
            return self.socket_click(store, host, actor, socket, click);
        }
        Ok(Outcome::Rejected)
    }

    /// Record an accepted storage edit and re-arm the debounced save.
    pub(crate) fn storage_edited(&mut self, host: &mut dyn Host, actor: ActorId) {
        let now = self.quantum;
        let Some(session) = self.sessions.get_mut(actor) else {
            return;
        };
        session.last_storage_edit = Some(now);
        let due = now + self.content.constants.debounce_quanta.max(1);
        self.saves.arm(actor, session.container, due);
        tracing::debug!(actor = %actor, container = %session.container, due, "save armed");
        host.show_view(actor, &session.title, &session.visible);
    }

    /// Move a stranded cursor item somewhere safe: compatible stacks and empty
    /// slots of the view first, then the actor's inventory, then the world.
    pub(crate) fn redistribute_cursor(&mut self, host: &mut dyn Host, actor: ActorId) {
        let Some(held) = host.cursor(actor) else {
            return;
        };
        host.set_cursor(actor, None);
        let total = held.amount;

        let mut rest = Some(held);
        if let Some(session) = self.sessions.get_mut(actor) {
            let accepts = self
                .content
                .container_def(&session.type_id)
                .is_some_and(|def| rest.as_ref().is_some_and(|item| def.accepts(item)));
            if let Some(item) = rest.take() {
                rest = if accepts {
                    let max = self.content.items.max_stack(&item.kind);
                    let valid = session.valid_slots;
                    insert_into(&mut session.visible[..valid], item, max, |_| true)
                } else {
                    Some(item)
                };
            }
        }
        let stored = total - rest.as_ref().map_or(0, |r| r.amount);
        if stored > 0 {
            self.storage_edited(host, actor);
        }
        let handover = rest
            .map(|item| give_or_drop(host, actor, item))
            .unwrap_or_default();

        tracing::info!(actor = %actor, stored, given = handover.given, dropped = handover.dropped, "cursor item redistributed");
        self.log.emit(
            self.quantum,
            EngineEvent::CursorRedistributed {
                actor,
                stored,
                given: handover.given,
                dropped: handover.dropped,
            },
        );
    }
}
