use serde::{Deserialize, Serialize};

use crate::catalog::{CookRecipe, ItemCatalog};
use crate::ItemStack;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookingState {
    pub input: Option<ItemStack>,
    pub fuel: Option<ItemStack>,
    pub output: Option<ItemStack>,
    pub lit_time: u32,
    pub lit_duration: u32,
    pub cook_time: u32,
    pub cook_total: u32,
}

impl CookingState {
    pub fn is_lit(&self) -> bool {
        self.lit_time > 0
    }

    fn recipe<'a>(&self, catalog: &'a ItemCatalog) -> Option<&'a CookRecipe> {
        self.input
            .as_ref()
            .filter(|i| i.amount > 0)
            .and_then(|i| catalog.recipe(&i.kind))
    }

    fn output_has_room(&self, recipe: &CookRecipe, catalog: &ItemCatalog) -> bool {
        match &self.output {
            None => true,
            Some(out) => {
                out.kind == recipe.output
                    && out.name.is_none()
                    && out.tags.is_empty()
                    && out.amount + recipe.output_amount <= catalog.max_stack(&out.kind)
            }
        }
    }

    /// Light one fuel item. The emptied fuel slot takes the fuel's craft remainder.
    fn ignite(&mut self, catalog: &ItemCatalog) -> bool {
        let Some(fuel) = self.fuel.as_mut() else {
            return false;
        };
        let Some(burn) = catalog.fuel_quanta(&fuel.kind) else {
            return false;
        };
        let kind = fuel.kind.clone();
        fuel.amount = fuel.amount.saturating_sub(1);
        if fuel.amount == 0 {
            self.fuel = catalog
                .craft_remainder(&kind)
                .map(|rem| ItemStack::new(rem.clone(), 1));
        }
        self.lit_time = burn;
        self.lit_duration = burn;
        true
    }

    fn craft(&mut self, recipe: &CookRecipe) {
        if let Some(input) = self.input.as_mut() {
            input.amount -= 1;
            if input.amount == 0 {
                self.input = None;
            }
        }
        match self.output.as_mut() {
            Some(out) => out.amount += recipe.output_amount,
            None => self.output = Some(ItemStack::new(recipe.output.clone(), recipe.output_amount)),
        }
    }

    /// Advance by `d` quanta. Returns the number of crafts completed.
    pub fn step(&mut self, d: u32, catalog: &ItemCatalog) -> u32 {
        let ready = self
            .recipe(catalog)
            .is_some_and(|r| self.output_has_room(r, catalog));

        if !self.is_lit() && ready {
            self.ignite(catalog);
        }

        let mut crafts = 0;
        match self.recipe(catalog).cloned() {
            Some(recipe) if self.is_lit() && ready => {
                self.cook_total = recipe.cook_quanta.max(1);
                self.cook_time += d;
                while self.cook_time >= self.cook_total
                    && self.recipe(catalog).is_some()
                    && self.output_has_room(&recipe, catalog)
                {
                    self.craft(&recipe);
                    self.cook_time -= self.cook_total;
                    crafts += 1;
                }
            }
            _ => self.cook_time = self.cook_time.saturating_sub(d.saturating_mul(2)),
        }

        self.lit_time = self.lit_time.saturating_sub(d);
        crafts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::base_content;

    fn loaded(input: u32, fuel: u32) -> CookingState {
        CookingState {
            input: Some(ItemStack::new("raw_iron", input)),
            fuel: Some(ItemStack::new("coal", fuel)),
            ..CookingState::default()
        }
    }

    #[test]
    fn crafts_follow_accumulated_cook_time() {
        let content = base_content();
        let catalog = &content.items;
        let total = catalog.recipe("raw_iron").map(|r| r.cook_quanta).unwrap_or(0);
        let mut state = loaded(32, 8);
        let d = 7;
        let mut crafts = 0;
        for k in 1..=20 {
            crafts += state.step(d, catalog);
            assert_eq!(crafts, (k * d) / total);
        }
        assert_eq!(
            state.output.as_ref().map(|o| o.amount),
            Some(crafts)
        );
        assert_eq!(state.input.as_ref().map(|i| i.amount), Some(32 - crafts));
    }

    #[test]
    fn prior_cook_time_carries_into_later_crafts() {
        let content = base_content();
        let catalog = &content.items;
        let total = catalog.recipe("raw_iron").map(|r| r.cook_quanta).unwrap_or(0);
        let prior = 13;
        let mut state = CookingState {
            cook_time: prior,
            cook_total: total,
            ..loaded(32, 8)
        };
        let d = 7;
        let mut crafts = 0;
        for k in 1..=20 {
            crafts += state.step(d, catalog);
            assert_eq!(crafts, (prior + k * d) / total, "after step {k}");
        }
        assert_eq!(state.cook_time, (prior + 20 * d) % total);
        assert_eq!(state.input.as_ref().map(|i| i.amount), Some(32 - crafts));
    }

    #[test]
    fn large_step_completes_several_crafts() {
        let content = base_content();
        let catalog = &content.items;
        let total = catalog.recipe("raw_iron").map(|r| r.cook_quanta).unwrap_or(0);
        let mut state = loaded(10, 1);
        assert_eq!(state.step(total * 3, catalog), 3);
        assert_eq!(state.input.as_ref().map(|i| i.amount), Some(7));
    }

    #[test]
    fn unlit_without_input_cools_down() {
        let content = base_content();
        let mut state = CookingState {
            fuel: Some(ItemStack::new("coal", 4)),
            cook_time: 9,
            cook_total: 20,
            lit_time: 3,
            ..CookingState::default()
        };
        state.step(2, &content.items);
        assert_eq!(state.cook_time, 5);
        assert_eq!(state.lit_time, 1);
        assert_eq!(state.fuel.as_ref().map(|f| f.amount), Some(4));
        state.step(5, &content.items);
        assert_eq!((state.cook_time, state.lit_time), (0, 0));
    }

    #[test]
    fn full_output_blocks_fuel_use() {
        let content = base_content();
        let max = content.items.max_stack("iron_ingot");
        let mut state = loaded(4, 4);
        state.output = Some(ItemStack::new("iron_ingot", max));
        assert_eq!(state.step(100, &content.items), 0);
        assert_eq!(state.fuel.as_ref().map(|f| f.amount), Some(4));
        assert!(!state.is_lit());
    }

    #[test]
    fn spent_fuel_leaves_remainder() {
        let content = base_content();
        let mut state = CookingState {
            input: Some(ItemStack::new("raw_iron", 1)),
            fuel: Some(ItemStack::new("lava_bucket", 1)),
            ..CookingState::default()
        };
        state.step(1, &content.items);
        assert!(state.is_lit());
        assert_eq!(state.fuel.as_ref().map(|f| f.kind.as_str()), Some("bucket"));
    }
}
