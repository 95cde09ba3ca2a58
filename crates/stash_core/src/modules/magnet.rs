use serde::{Deserialize, Serialize};

use crate::{ItemKind, ItemStack};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetState {
    pub collected_total: u64,
}

/// Discard module: kinds on its list are voided into the audit log instead of stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardState {
    pub filter: Vec<ItemKind>,
    pub voided_total: u64,
}

impl DiscardState {
    /// An empty list voids nothing.
    pub fn intercepts(&self, kind: &str) -> bool {
        self.filter.iter().any(|k| k == kind)
    }
}

/// Loose items a magnet may pull in. Containers and modules are never collected.
pub fn collectable(stack: &ItemStack) -> bool {
    stack.amount > 0 && !stack.is_container() && !stack.is_module() && !stack.is_ui()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tags, TagValue};

    #[test]
    fn containers_and_modules_are_not_collectable() {
        assert!(collectable(&ItemStack::new("stone", 3)));
        let pouch = ItemStack::new("bundle", 1)
            .with_tag(tags::CONTAINER_TYPE, TagValue::Text("small".to_string()));
        let module = ItemStack::new("hopper", 1)
            .with_tag(tags::MODULE_TYPE, TagValue::Text("magnet".to_string()));
        assert!(!collectable(&pouch));
        assert!(!collectable(&module));
        assert!(!collectable(&ItemStack::new("stone", 0)));
    }

    #[test]
    fn empty_discard_list_voids_nothing() {
        let d = DiscardState::default();
        assert!(!d.intercepts("dirt"));
        let d = DiscardState {
            filter: vec!["dirt".to_string()],
            voided_total: 0,
        };
        assert!(d.intercepts("dirt"));
        assert!(!d.intercepts("stone"));
    }
}
