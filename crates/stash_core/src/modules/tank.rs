use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;
use crate::{ItemKind, ItemStack, UiKinds};

/// Resource tank: either a fluid pool or a bottled pool, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankState {
    pub fluid_units: u32,
    pub fluid_kind: Option<String>,
    pub bottled_units: u32,
    pub bottled_mode: bool,
}

impl TankState {
    /// Restore the pool invariant. The pool selected by `bottled_mode` survives.
    pub fn clamp(&mut self, capacity: u32) {
        self.fluid_units = self.fluid_units.min(capacity);
        self.bottled_units = self.bottled_units.min(capacity);
        if self.bottled_mode {
            self.fluid_units = 0;
        } else {
            self.bottled_units = 0;
        }
        if self.fluid_units == 0 {
            self.fluid_kind = None;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fluid_units == 0 && self.bottled_units == 0
    }

    /// Accept one full container of `fluid`. Refuses a different fluid while units remain.
    pub fn fill(&mut self, fluid: &str, capacity: u32) -> bool {
        if self.bottled_mode || self.fluid_units >= capacity {
            return false;
        }
        if self.fluid_units > 0 && self.fluid_kind.as_deref() != Some(fluid) {
            return false;
        }
        self.fluid_units += 1;
        self.fluid_kind = Some(fluid.to_string());
        true
    }

    /// Take one unit out; returns the fluid it was.
    pub fn drain(&mut self) -> Option<String> {
        if self.bottled_mode || self.fluid_units == 0 {
            return None;
        }
        let fluid = self.fluid_kind.clone()?;
        self.fluid_units -= 1;
        if self.fluid_units == 0 {
            self.fluid_kind = None;
        }
        Some(fluid)
    }

    pub fn bottle(&mut self, capacity: u32) -> bool {
        if !self.bottled_mode || self.bottled_units >= capacity {
            return false;
        }
        self.bottled_units += 1;
        true
    }

    pub fn unbottle(&mut self) -> bool {
        if !self.bottled_mode || self.bottled_units == 0 {
            return false;
        }
        self.bottled_units -= 1;
        true
    }

    /// Switch pools. Only allowed while the active pool is empty.
    pub fn toggle_mode(&mut self) -> bool {
        let active = if self.bottled_mode {
            self.bottled_units
        } else {
            self.fluid_units
        };
        if active > 0 {
            return false;
        }
        self.bottled_mode = !self.bottled_mode;
        true
    }

    pub fn describe(&self, capacity: u32) -> Vec<String> {
        let mut lines = Vec::new();
        if self.bottled_mode {
            lines.push(format!("Bottled: {}/{capacity}", self.bottled_units));
        } else {
            match &self.fluid_kind {
                Some(fluid) => lines.push(format!("{fluid}: {}/{capacity}", self.fluid_units)),
                None => lines.push(format!("Empty: 0/{capacity}")),
            }
        }
        lines.push(format!(
            "Mode: {}",
            if self.bottled_mode { "bottled" } else { "fluid" }
        ));
        lines
    }

    /// Icon kind for the current contents: the filled container of the stored
    /// fluid, the bottled marker, or the module's own material when empty.
    pub fn icon_kind(&self, base: &ItemKind, ui: &UiKinds, catalog: &ItemCatalog) -> ItemKind {
        if self.bottled_mode && self.bottled_units > 0 {
            return ui.bottled.clone();
        }
        self.fluid_kind
            .as_deref()
            .filter(|_| self.fluid_units > 0)
            .and_then(|fluid| {
                catalog
                    .defs()
                    .iter()
                    .find(|d| d.fluid.as_ref().is_some_and(|f| f.fluid == fluid))
            })
            .map_or_else(|| base.clone(), |d| d.id.clone())
    }

    /// Recompute the socket icon from state.
    pub fn reskin(&self, snapshot: &ItemStack, capacity: u32, ui: &UiKinds, catalog: &ItemCatalog) -> ItemStack {
        let mut icon = snapshot.clone();
        icon.kind = self.icon_kind(&snapshot.kind, ui, catalog);
        icon.lore = self.describe(capacity);
        icon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_then_drain_round_trips_fluid() {
        let mut t = TankState::default();
        assert!(t.fill("water", 4));
        assert_eq!(t.fluid_units, 1);
        assert_eq!(t.fluid_kind.as_deref(), Some("water"));
        assert!(!t.fill("lava", 4));
        assert_eq!(t.drain().as_deref(), Some("water"));
        assert_eq!(t, TankState::default());
        assert!(t.drain().is_none());
    }

    #[test]
    fn fill_stops_at_capacity() {
        let mut t = TankState::default();
        for _ in 0..2 {
            assert!(t.fill("water", 2));
        }
        assert!(!t.fill("water", 2));
    }

    #[test]
    fn clamp_keeps_active_pool_only() {
        let mut t = TankState {
            fluid_units: 3,
            fluid_kind: Some("water".to_string()),
            bottled_units: 5,
            bottled_mode: false,
        };
        t.clamp(16);
        assert_eq!((t.fluid_units, t.bottled_units), (3, 0));

        let mut b = TankState {
            fluid_units: 3,
            fluid_kind: Some("water".to_string()),
            bottled_units: 50,
            bottled_mode: true,
        };
        b.clamp(16);
        assert_eq!((b.fluid_units, b.bottled_units), (0, 16));
        assert!(b.fluid_kind.is_none());
    }

    #[test]
    fn mode_switch_requires_empty_active_pool() {
        let mut t = TankState::default();
        assert!(t.fill("water", 4));
        assert!(!t.toggle_mode());
        t.drain();
        assert!(t.toggle_mode());
        assert!(t.bottle(4));
        assert!(!t.fill("water", 4));
        assert!(!t.toggle_mode());
        assert!(t.unbottle());
        assert!(t.toggle_mode());
        assert!(!t.bottled_mode);
    }
}
