//! Content loading shared by the CLI and host integrations: container and
//! module type definitions, the item catalog and engine constants.

use anyhow::{bail, ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use stash_core::{
    Constants, ContainerTypeDef, Content, ItemCatalog, ItemDef, ModuleKind, ModuleTypeDef,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Sockets that fit in the nav row between the sort and next-page buttons.
pub const MAX_UPGRADE_SOCKETS: u32 = 5;

#[derive(Deserialize)]
struct ItemsFile {
    content_version: String,
    items: Vec<ItemDef>,
}

#[derive(Deserialize)]
struct ContainersFile {
    containers: Vec<ContainerTypeDef>,
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let raw = std::fs::read_to_string(dir.join(name)).with_context(|| format!("reading {name}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {name}"))
}

pub fn load_content(content_dir: impl AsRef<Path>) -> Result<Content> {
    let dir = content_dir.as_ref();
    let constants: Constants = read_json(dir, "constants.json")?;
    let items_file: ItemsFile = read_json(dir, "items.json")?;
    let containers_file: ContainersFile = read_json(dir, "containers.json")?;
    let modules: Vec<ModuleTypeDef> = read_json(dir, "modules.json")?;

    let content = assemble_content(
        items_file.content_version,
        constants,
        containers_file.containers,
        modules,
        items_file.items,
    )?;
    validate_content(&content)
        .with_context(|| format!("validating content in {}", dir.display()))?;
    tracing::info!(
        version = %content.content_version,
        containers = content.containers.len(),
        modules = content.modules.len(),
        items = content.items.defs().len(),
        "content loaded"
    );
    Ok(content)
}

/// Key the definition lists by id, rejecting duplicates.
pub fn assemble_content(
    content_version: String,
    constants: Constants,
    containers: Vec<ContainerTypeDef>,
    modules: Vec<ModuleTypeDef>,
    items: Vec<ItemDef>,
) -> Result<Content> {
    let mut seen = HashSet::new();
    for item in &items {
        ensure!(seen.insert(item.id.as_str()), "duplicate item id '{}'", item.id);
    }

    let mut container_map = HashMap::with_capacity(containers.len());
    for def in containers {
        let id = def.id.clone();
        if container_map.insert(id.clone(), def).is_some() {
            bail!("duplicate container type id '{id}'");
        }
    }

    let mut module_map = HashMap::with_capacity(modules.len());
    for def in modules {
        let id = def.id.clone();
        if module_map.insert(id.clone(), def).is_some() {
            bail!("duplicate module type id '{id}'");
        }
    }

    Ok(Content {
        content_version,
        constants,
        containers: container_map,
        modules: module_map,
        items: ItemCatalog::new(items),
    })
}

/// Validates cross-references and ranges in loaded content.
///
/// Catches mistakes like a recipe producing an unknown item, a container with
/// more sockets than the nav row holds, or a tank that can hold nothing.
pub fn validate_content(content: &Content) -> Result<()> {
    validate_constants(content)?;
    for item in content.items.defs() {
        validate_item(content, item)?;
    }

    let mut container_ids: Vec<&String> = content.containers.keys().collect();
    container_ids.sort();
    for id in container_ids {
        validate_container(content, &content.containers[id])?;
    }

    let mut module_ids: Vec<&String> = content.modules.keys().collect();
    module_ids.sort();
    for id in module_ids {
        validate_module(&content.modules[id])?;
    }
    Ok(())
}

fn validate_constants(content: &Content) -> Result<()> {
    let c = &content.constants;
    ensure!(c.tick_interval_quanta > 0, "tick_interval_quanta must be positive");
    ensure!(c.debounce_quanta > 0, "debounce_quanta must be positive");
    ensure!(
        c.burst_quantum_threshold > 0 && c.burst_window_threshold > 0,
        "burst thresholds must be positive"
    );
    ensure!(c.burst_window_quanta > 0, "burst_window_quanta must be positive");
    ensure!(
        c.magnet_radius >= 0.0 && c.playback_cue_radius >= 0.0,
        "radii must not be negative"
    );
    for kind in &c.feeding.priority {
        ensure!(
            content.items.contains(kind),
            "feeding priority '{kind}' is not a known item"
        );
    }
    Ok(())
}

fn validate_item(content: &Content, item: &ItemDef) -> Result<()> {
    let known = |kind: &str| content.items.contains(kind);
    ensure!(!item.id.is_empty(), "item has empty id");
    ensure!(item.max_stack > 0, "item '{}' has zero max_stack", item.id);

    if let Some(recipe) = &item.cooking {
        ensure!(
            known(&recipe.output),
            "item '{}' cooks into '{}', which is not a known item",
            item.id,
            recipe.output
        );
        ensure!(
            recipe.cook_quanta > 0 && recipe.output_amount > 0,
            "item '{}' has an empty cooking recipe",
            item.id
        );
    }
    if let Some(remainder) = &item.craft_remainder {
        ensure!(
            known(remainder),
            "item '{}' remainder '{remainder}' is not a known item",
            item.id
        );
    }
    if let Some(fill) = &item.fluid {
        ensure!(
            known(&fill.empty),
            "item '{}' empties into '{}', which is not a known item",
            item.id,
            fill.empty
        );
        ensure!(!fill.fluid.is_empty(), "item '{}' has an unnamed fluid", item.id);
    }
    if let Some(track) = &item.track {
        ensure!(
            track.duration_quanta > 0,
            "track '{}' has zero duration",
            item.id
        );
    }
    Ok(())
}

fn validate_container(content: &Content, def: &ContainerTypeDef) -> Result<()> {
    ensure!(!def.id.is_empty(), "container type has empty id");
    ensure!(def.rows > 0, "container type '{}' has no rows", def.id);
    ensure!(
        def.upgrade_sockets <= MAX_UPGRADE_SOCKETS,
        "container type '{}' has {} upgrade sockets, at most {MAX_UPGRADE_SOCKETS} fit the nav row",
        def.id,
        def.upgrade_sockets
    );
    ensure!(
        !def.display_material.is_empty(),
        "container type '{}' has no display material",
        def.id
    );
    for kind in &def.allowed_items {
        ensure!(
            content.items.contains(kind),
            "container type '{}' allows '{kind}', which is not a known item",
            def.id
        );
    }
    Ok(())
}

fn validate_module(def: &ModuleTypeDef) -> Result<()> {
    ensure!(!def.id.is_empty(), "module type has empty id");
    ensure!(
        !def.display_material.is_empty(),
        "module type '{}' has no display material",
        def.id
    );
    if def.kind == ModuleKind::Tank {
        ensure!(def.capacity > 0, "tank module '{}' has zero capacity", def.id);
    }
    if def.screen.is_some() {
        ensure!(
            def.has_secondary_action,
            "module type '{}' has a screen but no secondary action to open it",
            def.id
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::catalog::CookRecipe;
    use stash_core::test_fixtures::base_content;
    use stash_core::ScreenKind;

    fn with_items(content: &mut Content, edit: impl FnOnce(&mut Vec<ItemDef>)) {
        let mut defs = content.items.defs().to_vec();
        edit(&mut defs);
        content.items = ItemCatalog::new(defs);
    }

    fn error_text(content: &Content) -> String {
        format!("{:#}", validate_content(content).unwrap_err())
    }

    #[test]
    fn test_valid_content_passes_validation() {
        validate_content(&base_content()).unwrap();
    }

    #[test]
    fn test_too_many_sockets_rejected() {
        let mut content = base_content();
        content.containers.get_mut("large").unwrap().upgrade_sockets = 6;
        assert!(error_text(&content).contains("at most 5 fit the nav row"));
    }

    #[test]
    fn test_zero_capacity_tank_rejected() {
        let mut content = base_content();
        content.modules.get_mut("tank").unwrap().capacity = 0;
        assert!(error_text(&content).contains("zero capacity"));
    }

    #[test]
    fn test_screen_without_secondary_action_rejected() {
        let mut content = base_content();
        let magnet = content.modules.get_mut("magnet").unwrap();
        magnet.screen = Some(ScreenKind::Filter);
        magnet.has_secondary_action = false;
        assert!(error_text(&content).contains("no secondary action"));
    }

    #[test]
    fn test_recipe_output_unknown_item_rejected() {
        let mut content = base_content();
        with_items(&mut content, |defs| {
            let stone = defs.iter_mut().find(|d| d.id == "stone").unwrap();
            stone.cooking = Some(CookRecipe {
                output: "smooth_stone".to_string(),
                output_amount: 1,
                cook_quanta: 10,
            });
        });
        assert!(error_text(&content).contains("'smooth_stone', which is not a known item"));
    }

    #[test]
    fn test_unknown_remainder_and_fluid_empty_rejected() {
        let mut content = base_content();
        with_items(&mut content, |defs| defs.retain(|d| d.id != "bowl"));
        assert!(error_text(&content).contains("remainder 'bowl'"));

        let mut content = base_content();
        with_items(&mut content, |defs| defs.retain(|d| d.id != "bucket"));
        assert!(error_text(&content).contains("empties into 'bucket'"));
    }

    #[test]
    fn test_allow_list_unknown_item_rejected() {
        let mut content = base_content();
        content
            .containers
            .get_mut("ore_pouch")
            .unwrap()
            .allowed_items
            .push("unobtainium".to_string());
        assert!(error_text(&content).contains("allows 'unobtainium'"));
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut content = base_content();
        content.constants.tick_interval_quanta = 0;
        assert!(error_text(&content).contains("tick_interval_quanta"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let base = base_content();
        let small = base.containers["small"].clone();
        let err = assemble_content(
            "dup".to_string(),
            base.constants.clone(),
            vec![small.clone(), small],
            Vec::new(),
            Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate container type id 'small'"));

        let stone = ItemDef::basic("stone", "Stone");
        let err = assemble_content(
            "dup".to_string(),
            base.constants,
            Vec::new(),
            Vec::new(),
            vec![stone.clone(), stone],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate item id 'stone'"));
    }
}
