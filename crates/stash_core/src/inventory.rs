//! Stack arithmetic over slot arrays. Shared by the controller, the tick
//! engine and the module state machines.

use crate::ItemStack;

/// Merge `item` into similar stacks first, then into empty slots, visiting only
/// slots for which `eligible` holds. Returns whatever did not fit.
pub fn insert_into(
    slots: &mut [Option<ItemStack>],
    mut item: ItemStack,
    max_stack: u32,
    eligible: impl Fn(usize) -> bool,
) -> Option<ItemStack> {
    let max_stack = max_stack.max(1);
    for (i, slot) in slots.iter_mut().enumerate() {
        if item.amount == 0 {
            return None;
        }
        if !eligible(i) {
            continue;
        }
        if let Some(existing) = slot {
            if existing.is_similar(&item) && existing.amount < max_stack {
                let moved = (max_stack - existing.amount).min(item.amount);
                existing.amount += moved;
                item.amount -= moved;
            }
        }
    }
    for (i, slot) in slots.iter_mut().enumerate() {
        if item.amount == 0 {
            return None;
        }
        if !eligible(i) || slot.is_some() {
            continue;
        }
        let moved = max_stack.min(item.amount);
        *slot = Some(item.clone().with_amount(moved));
        item.amount -= moved;
    }
    (item.amount > 0).then_some(item)
}

/// How many units of `item` the slots could still absorb.
pub fn room_for(slots: &[Option<ItemStack>], item: &ItemStack, max_stack: u32) -> u32 {
    let max_stack = max_stack.max(1);
    slots
        .iter()
        .map(|slot| match slot {
            None => max_stack,
            Some(existing) if existing.is_similar(item) => max_stack.saturating_sub(existing.amount),
            Some(_) => 0,
        })
        .fold(0_u32, u32::saturating_add)
}

/// Remove one unit from the slot, clearing it when the stack runs out.
pub fn take_one(slot: &mut Option<ItemStack>) -> Option<ItemStack> {
    let stack = slot.as_mut()?;
    if stack.amount == 0 {
        *slot = None;
        return None;
    }
    stack.amount -= 1;
    let one = stack.clone().with_amount(1);
    if stack.amount == 0 {
        *slot = None;
    }
    Some(one)
}

/// Split off `amount` units, leaving the remainder (if any) in place.
pub fn split(slot: &mut Option<ItemStack>, amount: u32) -> Option<ItemStack> {
    let stack = slot.as_mut()?;
    let taken = amount.min(stack.amount);
    if taken == 0 {
        return None;
    }
    stack.amount -= taken;
    let out = stack.clone().with_amount(taken);
    if stack.amount == 0 {
        *slot = None;
    }
    Some(out)
}

pub fn total_amount(slots: &[Option<ItemStack>]) -> u64 {
    slots.iter().flatten().map(|s| u64::from(s.amount)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone(n: u32) -> Option<ItemStack> {
        Some(ItemStack::new("stone", n))
    }

    #[test]
    fn merges_before_filling_empty_slots() {
        let mut slots = vec![None, stone(60), None];
        let leftover = insert_into(&mut slots, ItemStack::new("stone", 10), 64, |_| true);
        assert!(leftover.is_none());
        assert_eq!(slots[0].as_ref().map(|s| s.amount), Some(6));
        assert_eq!(slots[1].as_ref().map(|s| s.amount), Some(64));
        assert!(slots[2].is_none());
    }

    #[test]
    fn returns_overflow_and_respects_eligibility() {
        let mut slots = vec![None, None, None];
        let leftover = insert_into(&mut slots, ItemStack::new("stone", 100), 64, |i| i != 0);
        assert!(slots[0].is_none());
        assert_eq!(leftover, None);
        assert_eq!(total_amount(&slots), 100);

        let mut full = vec![stone(64)];
        let leftover = insert_into(&mut full, ItemStack::new("stone", 3), 64, |_| true);
        assert_eq!(leftover.map(|s| s.amount), Some(3));
    }

    #[test]
    fn room_ignores_dissimilar_stacks() {
        let slots = vec![stone(10), Some(ItemStack::new("dirt", 1)), None];
        assert_eq!(room_for(&slots, &ItemStack::new("stone", 1), 64), 54 + 64);
    }

    #[test]
    fn take_one_clears_emptied_slot() {
        let mut slot = stone(1);
        assert_eq!(take_one(&mut slot).map(|s| s.amount), Some(1));
        assert!(slot.is_none());
        assert!(take_one(&mut slot).is_none());
    }

    #[test]
    fn split_caps_at_stack_size() {
        let mut slot = stone(5);
        assert_eq!(split(&mut slot, 3).map(|s| s.amount), Some(3));
        assert_eq!(split(&mut slot, 9).map(|s| s.amount), Some(2));
        assert!(slot.is_none());
    }
}
