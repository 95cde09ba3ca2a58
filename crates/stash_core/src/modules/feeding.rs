use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::catalog::{FoodProps, ItemCatalog};
use crate::{FeedingMode, FeedingPolicy, ItemKind, ItemStack};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedingState {
    /// Kinds this feeder may use, in priority order. Empty means any food.
    pub filter: Vec<ItemKind>,
    pub fed_total: u64,
}

fn overshoot(current: u32, food: &FoodProps, floor: u32) -> u32 {
    (current + food.nutrition).saturating_sub(floor)
}

fn rank(
    a: (usize, &FoodProps),
    b: (usize, &FoodProps),
    current: u32,
    policy: &FeedingPolicy,
) -> Ordering {
    let adverse = |f: &FoodProps| policy.avoid_adverse && f.adverse;
    adverse(a.1)
        .cmp(&adverse(b.1))
        .then_with(|| overshoot(current, a.1, policy.floor).cmp(&overshoot(current, b.1, policy.floor)))
        .then_with(|| b.1.nutrition.cmp(&a.1.nutrition))
        .then_with(|| b.1.richness.total_cmp(&a.1.richness))
        .then_with(|| a.0.cmp(&b.0))
}

/// Pick the storage slot to eat from, if any.
pub fn select_candidate(
    contents: &[Option<ItemStack>],
    catalog: &ItemCatalog,
    policy: &FeedingPolicy,
    filter: &[ItemKind],
    current: u32,
) -> Option<usize> {
    let food_at = |i: usize| {
        contents[i]
            .as_ref()
            .filter(|s| s.amount > 0 && !s.is_container() && !s.is_module())
            .and_then(|s| catalog.food(&s.kind))
    };

    match policy.mode {
        FeedingMode::Best => (0..contents.len())
            .filter(|&i| {
                filter.is_empty()
                    || contents[i]
                        .as_ref()
                        .is_some_and(|s| filter.contains(&s.kind))
            })
            .filter_map(|i| food_at(i).map(|f| (i, f)))
            .min_by(|&a, &b| rank(a, b, current, policy))
            .map(|(i, _)| i),
        FeedingMode::Ordered => {
            let order = if filter.is_empty() {
                policy.priority.as_slice()
            } else {
                filter
            };
            order.iter().find_map(|kind| {
                (0..contents.len()).find(|&i| {
                    food_at(i).is_some()
                        && contents[i].as_ref().is_some_and(|s| &s.kind == kind)
                })
            })
        }
    }
}
