//! Bounded-concurrency details loading

use addonpack::allocation::{
    AllocationManager, DeleteScope, Drawable, LoadPolicy, PartitionKey, Sex,
};
use addonpack::config::{AllocatorConfig, LoaderConfig};
use addonpack::error::Error;
use addonpack::loader::{DetailsLoader, Lod, LoadState, MockParser, ParsedDrawable};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn loader(parser: &MockParser) -> DetailsLoader {
    DetailsLoader::new(Arc::new(parser.clone()), LoaderConfig::default(), 20_000)
}

fn shirt(path: &str) -> Drawable {
    Drawable::new(path, PartitionKey::component(Sex::Male, 11), false)
}

#[tokio::test]
async fn test_concurrent_requests_share_one_parse() {
    let parser = MockParser::new().with_delay(Duration::from_millis(50));
    let loader = loader(&parser);
    let drawable = shirt("jbib_000_u.ydd");
    let handle = drawable.details_handle();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let loader = loader.clone();
            let handle = handle.clone();
            tokio::spawn(async move { loader.load(&handle).await })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap().unwrap());
    }

    assert_eq!(parser.calls(), 1);
    assert!(results.iter().all(|d| Arc::ptr_eq(d, &results[0])));
    assert_eq!(drawable.load_state(), LoadState::Loaded);
    assert_eq!(drawable.details().unwrap().polygons(Lod::High), Some(1200));
}

#[tokio::test]
async fn test_at_most_three_parses_in_flight() {
    let parser = MockParser::new().with_delay(Duration::from_millis(20));
    let loader = loader(&parser);
    let drawables: Vec<_> = (0..12).map(|i| shirt(&format!("jbib_{:03}_u.ydd", i))).collect();

    let tasks: Vec<_> = drawables
        .iter()
        .map(|d| {
            let loader = loader.clone();
            let handle = d.details_handle();
            tokio::spawn(async move { loader.load(&handle).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(parser.calls(), 12);
    assert!(parser.max_in_flight() <= 3, "saw {}", parser.max_in_flight());
    assert_eq!(loader.available_permits(), 3);
}

#[tokio::test]
async fn test_failure_is_reported_and_not_retried_automatically() {
    let parser = MockParser::new();
    parser.fail_on("broken.ydd");
    let loader = loader(&parser);
    let drawable = shirt("broken.ydd");

    let err = drawable.load_details_on_demand(&loader).await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(matches!(drawable.load_state(), LoadState::Failed(_)));
    assert!(drawable.details().is_none());
    assert_eq!(parser.calls(), 1);

    // An explicit request starts over
    parser.clear_failure(&PathBuf::from("broken.ydd"));
    let details = drawable.load_details_on_demand(&loader).await.unwrap();
    assert_eq!(parser.calls(), 2);
    assert_eq!(details.attached_textures, 0);
    assert_eq!(drawable.load_state(), LoadState::Loaded);
}

#[tokio::test]
async fn test_reserved_slot_has_nothing_to_load() {
    let parser = MockParser::new();
    let loader = loader(&parser);
    let reserved = Drawable::reserved(PartitionKey::prop(Sex::Female, 0));

    let err = reserved.load_details_on_demand(&loader).await.unwrap_err();
    assert!(matches!(err, Error::NoBackingFile(_)));
    assert_eq!(parser.calls(), 0);
    assert!(!loader.spawn_background(&reserved.details_handle()));
}

#[tokio::test]
async fn test_texture_edit_updates_loaded_details_without_reparse() {
    let parser = MockParser::new();
    parser.set_result(
        "jbib_000_u.ydd",
        ParsedDrawable {
            polygons_by_lod: BTreeMap::from([(Lod::High, 50_000)]),
            embedded_textures: Vec::new(),
        },
    );
    let loader = loader(&parser);
    let mut drawable = shirt("jbib_000_u.ydd");

    let before = drawable.load_details_on_demand(&loader).await.unwrap();
    assert_eq!(before.attached_textures, 0);

    drawable.add_texture("jbib_diff_000_a_uni.ytd").unwrap();
    let after = drawable.details().unwrap();
    assert_eq!(after.attached_textures, 1);
    assert_eq!(after.polygons(Lod::High), Some(50_000));
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(parser.calls(), 1);
}

#[tokio::test]
async fn test_eager_import_loads_in_background() {
    let parser = MockParser::new();
    let config = AllocatorConfig::default();
    let mut manager = AllocationManager::new(config.clone()).with_loader(DetailsLoader::new(
        Arc::new(parser.clone()),
        config.loader.clone(),
        config.polygon_warning_threshold,
    ));

    let paths = vec![PathBuf::from("jbib_000_u.ydd"), PathBuf::from("lowr_000_u.ydd")];
    let report = manager.add_drawables(&paths, Sex::Male, LoadPolicy::Eager);
    assert_eq!(report.loads_started, 2);

    let handles: Vec<_> = report
        .placed
        .iter()
        .map(|p| manager.details_handle(p.id).unwrap())
        .collect();
    let loader = manager.loader().unwrap().clone();
    for handle in &handles {
        loader.load(handle).await.unwrap();
    }
    // Joining the background loads does not parse again
    assert_eq!(parser.calls(), 2);
}

#[tokio::test]
async fn test_new_drawable_loads_in_background() {
    let parser = MockParser::new();
    let config = AllocatorConfig::default();
    let mut manager = AllocationManager::new(config.clone()).with_loader(DetailsLoader::new(
        Arc::new(parser.clone()),
        config.loader.clone(),
        config.polygon_warning_threshold,
    ));

    let placement = manager.add_drawable(shirt("jbib_000_u.ydd"));
    let (_, drawable) = manager.find(placement.id).unwrap();
    assert_ne!(drawable.load_state(), LoadState::Unloaded);

    let handle = manager.details_handle(placement.id).unwrap();
    manager.loader().unwrap().load(&handle).await.unwrap();
    assert_eq!(parser.calls(), 1);
}

#[tokio::test]
async fn test_on_demand_import_stays_unloaded() {
    let parser = MockParser::new();
    let config = AllocatorConfig::default();
    let mut manager = AllocationManager::new(config.clone()).with_loader(DetailsLoader::new(
        Arc::new(parser.clone()),
        config.loader.clone(),
        config.polygon_warning_threshold,
    ));

    let paths = vec![PathBuf::from("jbib_000_u.ydd")];
    let report = manager.add_drawables(&paths, Sex::Male, LoadPolicy::OnDemand);
    assert_eq!(report.loads_started, 0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let (_, drawable) = manager.find(report.placed[0].id).unwrap();
    assert_eq!(drawable.load_state(), LoadState::Unloaded);
    assert_eq!(parser.calls(), 0);
}

#[tokio::test]
async fn test_removed_while_loading_is_discarded() {
    let parser = MockParser::new().with_delay(Duration::from_millis(30));
    let config = AllocatorConfig::default();
    let mut manager = AllocationManager::new(config.clone()).with_loader(DetailsLoader::new(
        Arc::new(parser.clone()),
        config.loader.clone(),
        config.polygon_warning_threshold,
    ));

    let paths = vec![PathBuf::from("jbib_000_u.ydd")];
    let report = manager.add_drawables(&paths, Sex::Male, LoadPolicy::Eager);
    let id = report.placed[0].id;
    assert!(manager.find(id).unwrap().1.is_loading());

    let removed = manager.delete_drawables(&[id], DeleteScope::AllAddons, false);
    assert_eq!(removed.removed, vec![id]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(parser.calls(), 1);
    assert_eq!(manager.total_count(), 0);
}

#[tokio::test]
async fn test_waiter_times_out() {
    let parser = MockParser::new().with_delay(Duration::from_secs(5));
    let config = LoaderConfig {
        wait_timeout_secs: 0,
        ..Default::default()
    };
    let loader = DetailsLoader::new(Arc::new(parser.clone()), config, 20_000);
    let drawable = shirt("slow.ydd");

    let err = drawable.load_details_on_demand(&loader).await.unwrap_err();
    assert!(matches!(err, Error::LoadTimeout(_)));
    // The parse keeps running; the drawable stays in Loading
    assert!(drawable.is_loading());
}
