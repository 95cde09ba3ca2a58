//! Sort modes and the dense re-sort of logical contents.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{catalog::ItemCatalog, ItemStack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Registry,
    Category,
    Name,
    Amount,
    Attributes,
}

impl SortMode {
    pub const ALL: [SortMode; 5] = [
        Self::Registry,
        Self::Category,
        Self::Name,
        Self::Amount,
        Self::Attributes,
    ];

    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Registry => Self::Category,
            Self::Category => Self::Name,
            Self::Name => Self::Amount,
            Self::Amount => Self::Attributes,
            Self::Attributes => Self::Registry,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Registry => "Registry order",
            Self::Category => "Category",
            Self::Name => "Name",
            Self::Amount => "Amount",
            Self::Attributes => "Attributes",
        }
    }
}

/// Bucket order for names: short names, normal names, then names that
/// don't start with a letter or digit.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NameBucket {
    Short,
    Normal,
    Symbol,
}

fn name_bucket(name: &str) -> NameBucket {
    match name.chars().next() {
        Some(c) if c.is_alphanumeric() => {
            if name.chars().count() <= 2 {
                NameBucket::Short
            } else {
                NameBucket::Normal
            }
        }
        _ => NameBucket::Symbol,
    }
}

fn prefix(name: &str, len: usize) -> String {
    name.chars().take(len).collect()
}

fn compare_names(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    let (bucket_a, bucket_b) = (name_bucket(&a), name_bucket(&b));
    bucket_a.cmp(&bucket_b).then_with(|| match bucket_a {
        NameBucket::Short => a
            .chars()
            .count()
            .cmp(&b.chars().count())
            .then_with(|| a.cmp(&b)),
        NameBucket::Normal => prefix(&a, 3).cmp(&prefix(&b, 3)).then_with(|| a.cmp(&b)),
        NameBucket::Symbol => a.cmp(&b),
    })
}

/// Comparator for one sort mode; ties fall back to registry order, then name.
pub fn compare(a: &ItemStack, b: &ItemStack, mode: SortMode, catalog: &ItemCatalog) -> Ordering {
    let primary = match mode {
        SortMode::Registry => Ordering::Equal,
        SortMode::Category => catalog.category(&a.kind).cmp(&catalog.category(&b.kind)),
        SortMode::Name => compare_names(catalog.display_name(a), catalog.display_name(b)),
        SortMode::Amount => b.amount.cmp(&a.amount),
        SortMode::Attributes => b.attributes.len().cmp(&a.attributes.len()),
    };
    primary
        .then_with(|| {
            catalog
                .registry_index(&a.kind)
                .cmp(&catalog.registry_index(&b.kind))
        })
        .then_with(|| compare_names(catalog.display_name(a), catalog.display_name(b)))
}

/// Rewrite `contents` densely from index 0 in sorted order, keeping its length.
pub fn sort_contents(contents: &mut [Option<ItemStack>], mode: SortMode, catalog: &ItemCatalog) {
    let mut stacks: Vec<ItemStack> = contents.iter_mut().filter_map(Option::take).collect();
    stacks.sort_by(|a, b| compare(a, b, mode, catalog));
    for (slot, stack) in contents.iter_mut().zip(stacks) {
        *slot = Some(stack);
    }
}
