//! Edits to storage slots of the visible grid.

use super::{Click, Outcome};
use crate::catalog::ItemCatalog;
use crate::engine::StashEngine;
use crate::host::Host;
use crate::inventory::insert_into;
use crate::{ActorId, ContainerTypeDef, ItemStack};

type Exchange = (Option<ItemStack>, Option<ItemStack>);

/// Cursor/slot exchange for a plain or secondary click. `None` rejects the click.
/// Items may always leave storage; items entering it must pass the allow-list.
fn exchange(
    click: Click,
    cursor: Option<ItemStack>,
    slot: Option<ItemStack>,
    def: &ContainerTypeDef,
    catalog: &ItemCatalog,
) -> Option<Exchange> {
    if cursor.as_ref().is_some_and(|held| !def.accepts(held)) {
        return None;
    }
    match (click, cursor, slot) {
        (Click::Primary, None, Some(stack)) => Some((Some(stack), None)),
        (Click::Secondary, None, Some(mut stack)) => {
            let half = stack.amount.div_ceil(2);
            let taken = stack.clone().with_amount(half);
            stack.amount -= half;
            Some((Some(taken), (stack.amount > 0).then_some(stack)))
        }
        (Click::Primary, Some(held), None) => {
            let max = catalog.max_stack(&held.kind);
            if held.amount <= max {
                Some((None, Some(held)))
            } else {
                let rest = held.clone().with_amount(held.amount - max);
                Some((Some(rest), Some(held.with_amount(max))))
            }
        }
        (Click::Primary, Some(mut held), Some(mut stack)) if stack.is_similar(&held) => {
            let room = catalog.max_stack(&stack.kind).saturating_sub(stack.amount);
            let moved = room.min(held.amount);
            if moved == 0 {
                return None;
            }
            stack.amount += moved;
            held.amount -= moved;
            Some(((held.amount > 0).then_some(held), Some(stack)))
        }
        (Click::Primary | Click::Secondary, Some(held), Some(stack))
            if !stack.is_similar(&held) && held.amount <= catalog.max_stack(&held.kind) =>
        {
            Some((Some(stack), Some(held)))
        }
        (Click::Secondary, Some(mut held), None) => {
            let one = held.clone().with_amount(1);
            held.amount -= 1;
            Some(((held.amount > 0).then_some(held), Some(one)))
        }
        (Click::Secondary, Some(mut held), Some(mut stack))
            if stack.is_similar(&held) && stack.amount < catalog.max_stack(&stack.kind) =>
        {
            stack.amount += 1;
            held.amount -= 1;
            Some(((held.amount > 0).then_some(held), Some(stack)))
        }
        _ => None,
    }
}

impl StashEngine {
    pub(super) fn storage_click(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        slot: usize,
        click: Click,
    ) -> Outcome {
        let Some(session) = self.sessions.get_mut(actor) else {
            return Outcome::Rejected;
        };
        if !session.is_storage_slot(slot) {
            tracing::debug!(actor = %actor, slot, "click past the end of storage refused");
            return Outcome::Rejected;
        }
        let Some(def) = self.content.container_def(&session.type_id) else {
            return Outcome::Rejected;
        };

        match click {
            Click::ShiftPrimary | Click::ShiftSecondary => {
                let Some(stack) = session.visible[slot].take() else {
                    return Outcome::Rejected;
                };
                let total = stack.amount;
                let leftover = host.give(actor, stack);
                let moved = total - leftover.as_ref().map_or(0, |l| l.amount);
                session.visible[slot] = leftover;
                if moved == 0 {
                    return Outcome::Rejected;
                }
            }
            Click::Primary | Click::Secondary => {
                let cursor = host.cursor(actor);
                let current = session.visible[slot].clone();
                let Some((new_cursor, new_slot)) =
                    exchange(click, cursor, current, def, &self.content.items)
                else {
                    return Outcome::Rejected;
                };
                session.visible[slot] = new_slot;
                host.set_cursor(actor, new_cursor);
            }
            Click::Drop => return Outcome::Rejected,
        }
        self.storage_edited(host, actor);
        Outcome::Applied
    }

    /// Even split of the cursor stack. One bad slot cancels the whole drag.
    pub(super) fn drag(&mut self, host: &mut dyn Host, actor: ActorId, slots: &[usize]) -> Outcome {
        let Some(mut held) = host.cursor(actor) else {
            return Outcome::Rejected;
        };
        let Some(session) = self.sessions.get_mut(actor) else {
            return Outcome::Rejected;
        };
        let Some(def) = self.content.container_def(&session.type_id) else {
            return Outcome::Rejected;
        };
        let mut targets: Vec<usize> = Vec::with_capacity(slots.len());
        for &slot in slots {
            if !targets.contains(&slot) {
                targets.push(slot);
            }
        }
        let fits = |slot: usize| {
            session.is_storage_slot(slot)
                && session.visible[slot]
                    .as_ref()
                    .is_none_or(|stack| stack.is_similar(&held))
        };
        if targets.is_empty() || !def.accepts(&held) || !targets.iter().all(|&s| fits(s)) {
            tracing::warn!(actor = %actor, slots = ?slots, "drag refused");
            return Outcome::Rejected;
        }
        let per_slot = held.amount / targets.len() as u32;
        if per_slot == 0 {
            return Outcome::Rejected;
        }

        let max = self.content.items.max_stack(&held.kind);
        let mut placed = 0;
        for slot in targets {
            let existing = session.visible[slot].as_ref().map_or(0, |s| s.amount);
            let put = per_slot.min(max.saturating_sub(existing));
            if put == 0 {
                continue;
            }
            session.visible[slot] = Some(held.clone().with_amount(existing + put));
            held.amount -= put;
            placed += put;
        }
        if placed == 0 {
            return Outcome::Rejected;
        }
        host.set_cursor(actor, (held.amount > 0).then_some(held));
        self.storage_edited(host, actor);
        Outcome::Applied
    }

    /// Shift-transfer one inventory slot into the view's valid storage slots.
    pub(super) fn transfer_in(
        &mut self,
        host: &mut dyn Host,
        actor: ActorId,
        inventory_slot: usize,
    ) -> Outcome {
        let Some(item) = host.inventory_slot(actor, inventory_slot) else {
            return Outcome::Rejected;
        };
        let Some(session) = self.sessions.get_mut(actor) else {
            return Outcome::Rejected;
        };
        let accepted = self
            .content
            .container_def(&session.type_id)
            .is_some_and(|def| def.accepts(&item));
        if !accepted {
            tracing::debug!(actor = %actor, kind = %item.kind, "item not allowed in this container");
            return Outcome::Rejected;
        }
        let total = item.amount;
        let max = self.content.items.max_stack(&item.kind);
        let valid = session.valid_slots;
        let leftover = insert_into(&mut session.visible[..valid], item, max, |_| true);
        if leftover.as_ref().map_or(0, |l| l.amount) == total {
            return Outcome::Rejected;
        }
        host.set_inventory_slot(actor, inventory_slot, leftover);
        self.storage_edited(host, actor);
        Outcome::Applied
    }
}
