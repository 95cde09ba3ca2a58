//! Item/material type system: stack sizes, ordering, food, fuel, recipes,
//! fluid containers and tracks, resolved from content once at startup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ItemKind, ItemStack};

const DEFAULT_MAX_STACK: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodProps {
    pub nutrition: u32,
    /// Secondary richness score used as a tie-break.
    #[serde(default)]
    pub richness: f32,
    /// Adverse secondary effects (poison, hunger, ...).
    #[serde(default)]
    pub adverse: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookRecipe {
    pub output: ItemKind,
    #[serde(default = "one")]
    pub output_amount: u32,
    pub cook_quanta: u32,
}

/// A full fluid container: which fluid it holds and what it becomes once emptied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidFill {
    pub fluid: String,
    pub empty: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub sound: String,
    pub duration_quanta: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: ItemKind,
    pub display_name: String,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    /// UI-category order; lower sorts first.
    #[serde(default)]
    pub category: u32,
    #[serde(default)]
    pub food: Option<FoodProps>,
    #[serde(default)]
    pub fuel_quanta: Option<u32>,
    #[serde(default)]
    pub cooking: Option<CookRecipe>,
    #[serde(default)]
    pub craft_remainder: Option<ItemKind>,
    #[serde(default)]
    pub fluid: Option<FluidFill>,
    #[serde(default)]
    pub track: Option<TrackInfo>,
}

impl ItemDef {
    pub fn basic(id: impl Into<ItemKind>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            max_stack: DEFAULT_MAX_STACK,
            category: 0,
            food: None,
            fuel_quanta: None,
            cooking: None,
            craft_remainder: None,
            fluid: None,
            track: None,
        }
    }
}

/// Registry of item definitions. Definition order is the registry order.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    defs: Vec<ItemDef>,
    index: HashMap<ItemKind, usize>,
}

impl ItemCatalog {
    pub fn new(defs: Vec<ItemDef>) -> Self {
        let index = defs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
        Self { defs, index }
    }

    pub fn defs(&self) -> &[ItemDef] {
        &self.defs
    }

    pub fn get(&self, kind: &str) -> Option<&ItemDef> {
        self.index.get(kind).map(|&i| &self.defs[i])
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    pub fn max_stack(&self, kind: &str) -> u32 {
        self.get(kind).map_or(DEFAULT_MAX_STACK, |d| d.max_stack.max(1))
    }

    /// Unknown kinds sort after every registered kind.
    pub fn registry_index(&self, kind: &str) -> usize {
        self.index.get(kind).copied().unwrap_or(usize::MAX)
    }

    pub fn category(&self, kind: &str) -> u32 {
        self.get(kind).map_or(u32::MAX, |d| d.category)
    }

    /// Custom name if set, else the registered display name, else the raw kind.
    pub fn display_name<'a>(&'a self, stack: &'a ItemStack) -> &'a str {
        if let Some(name) = stack.name.as_deref() {
            return name;
        }
        self.get(&stack.kind)
            .map_or(stack.kind.as_str(), |d| d.display_name.as_str())
    }

    pub fn food(&self, kind: &str) -> Option<&FoodProps> {
        self.get(kind).and_then(|d| d.food.as_ref())
    }

    pub fn fuel_quanta(&self, kind: &str) -> Option<u32> {
        self.get(kind).and_then(|d| d.fuel_quanta).filter(|&q| q > 0)
    }

    pub fn recipe(&self, kind: &str) -> Option<&CookRecipe> {
        self.get(kind).and_then(|d| d.cooking.as_ref())
    }

    pub fn craft_remainder(&self, kind: &str) -> Option<&ItemKind> {
        self.get(kind).and_then(|d| d.craft_remainder.as_ref())
    }

    pub fn fluid(&self, kind: &str) -> Option<&FluidFill> {
        self.get(kind).and_then(|d| d.fluid.as_ref())
    }

    /// Full container kind made by filling `empty` with `fluid`.
    pub fn filled_kind(&self, empty: &str, fluid: &str) -> Option<&ItemKind> {
        self.defs
            .iter()
            .find(|d| {
                d.fluid
                    .as_ref()
                    .is_some_and(|f| f.empty == empty && f.fluid == fluid)
            })
            .map(|d| &d.id)
    }

    pub fn track(&self, kind: &str) -> Option<&TrackInfo> {
        self.get(kind).and_then(|d| d.track.as_ref())
    }
}

fn default_max_stack() -> u32 {
    DEFAULT_MAX_STACK
}

fn one() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ItemCatalog {
        let mut bucket = ItemDef::basic("water_bucket", "Water Bucket");
        bucket.max_stack = 1;
        bucket.fluid = Some(FluidFill {
            fluid: "water".to_string(),
            empty: "bucket".to_string(),
        });
        ItemCatalog::new(vec![ItemDef::basic("bucket", "Bucket"), bucket])
    }

    #[test]
    fn unknown_kinds_sort_last_and_stack_to_default() {
        let c = catalog();
        assert_eq!(c.registry_index("bucket"), 0);
        assert_eq!(c.registry_index("nope"), usize::MAX);
        assert_eq!(c.max_stack("nope"), 64);
        assert_eq!(c.max_stack("water_bucket"), 1);
    }

    #[test]
    fn filled_kind_inverts_fluid_fill() {
        let c = catalog();
        assert_eq!(
            c.filled_kind("bucket", "water").map(String::as_str),
            Some("water_bucket")
        );
        assert!(c.filled_kind("bucket", "lava").is_none());
    }

    #[test]
    fn display_name_prefers_custom_name() {
        let c = catalog();
        let plain = ItemStack::new("bucket", 1);
        let named = ItemStack::new("bucket", 1).with_name("Pail");
        assert_eq!(c.display_name(&plain), "Bucket");
        assert_eq!(c.display_name(&named), "Pail");
    }
}
