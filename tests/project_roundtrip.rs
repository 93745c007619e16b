//! Project save/load round trip

use addonpack::allocation::{AllocationManager, Drawable, PartitionKey, Sex};
use addonpack::config::LoaderConfig;
use addonpack::loader::{DetailWarning, DetailsLoader, LoadState, MockParser};
use addonpack::project::{load_project, save_project};
use addonpack::AllocatorConfig;
use std::sync::Arc;

#[test]
fn test_numbers_and_partitions_round_trip() -> addonpack::error::Result<()> {
    let temp_dir = std::env::temp_dir().join(format!("addonpack_project_{}", std::process::id()));
    let path = temp_dir.join("project.json");

    let config = AllocatorConfig {
        max_drawables_per_partition: 4,
        ..Default::default()
    };
    let mut manager = AllocationManager::new(config.clone());
    let hat = PartitionKey::component(Sex::Male, 3);
    let prop = PartitionKey::prop(Sex::Female, 1);
    for i in 0..6 {
        manager.add_drawable(Drawable::new(format!("uppr_{:03}_r.ydd", i), hat, true));
    }
    let mut with_texture = Drawable::new("p_eyes_000.ydd", prop, false);
    with_texture.add_texture("p_eyes_diff_000_a.ytd")?;
    manager.add_drawable(with_texture);
    let reserved = manager.reserve_slot(prop);

    save_project(&manager, &path)?;
    let restored = load_project(&path, config)?;

    assert_eq!(restored.addons().len(), manager.addons().len());
    for (original, loaded) in manager.addons().iter().zip(restored.addons()) {
        assert_eq!(original.name(), loaded.name());
        assert_eq!(loaded.capacity(), 4);
        let before: Vec<_> = original
            .drawables()
            .iter()
            .map(|d| (d.id(), d.key(), d.number(), d.name(), d.is_reserved()))
            .collect();
        let after: Vec<_> = loaded
            .drawables()
            .iter()
            .map(|d| (d.id(), d.key(), d.number(), d.name(), d.is_reserved()))
            .collect();
        assert_eq!(before, after);
    }

    let (_, drawable) = restored.find(reserved.id).expect("placeholder restored");
    assert!(drawable.is_reserved());
    assert!(restored
        .addons()
        .iter()
        .flat_map(|a| a.drawables())
        .all(|d| d.load_state() == LoadState::Unloaded && !d.is_new()));
    assert!(restored.validate().is_empty());

    let textured = restored.addons()[0]
        .drawables()
        .iter()
        .find(|d| d.key() == prop && !d.is_reserved())
        .expect("prop restored");
    assert_eq!(textured.textures().len(), 1);
    assert_eq!(textured.texture_name(0).as_deref(), Some("p_eyes_diff_000_a"));

    std::fs::remove_dir_all(temp_dir).ok();
    Ok(())
}

#[tokio::test]
async fn test_restored_drawable_keeps_texture_count() -> addonpack::error::Result<()> {
    let temp_dir = std::env::temp_dir().join(format!("addonpack_textures_{}", std::process::id()));
    let path = temp_dir.join("project.json");

    let mut manager = AllocationManager::new(AllocatorConfig::default());
    let mut shirt = Drawable::new("jbib_000_u.ydd", PartitionKey::component(Sex::Male, 11), false);
    shirt.add_texture("jbib_diff_000_a_uni.ytd")?;
    shirt.add_texture("jbib_diff_000_b_uni.ytd")?;
    let placement = manager.add_drawable(shirt);
    save_project(&manager, &path)?;

    let restored = load_project(&path, AllocatorConfig::default())?;
    let (_, drawable) = restored.find(placement.id).expect("shirt restored");
    assert_eq!(drawable.textures().len(), 2);

    let loader = DetailsLoader::new(Arc::new(MockParser::new()), LoaderConfig::default(), 20_000);
    let details = drawable.load_details_on_demand(&loader).await?;
    assert_eq!(details.attached_textures, 2);
    assert!(!details.warnings.contains(&DetailWarning::NoTextures));

    std::fs::remove_dir_all(temp_dir).ok();
    Ok(())
}
