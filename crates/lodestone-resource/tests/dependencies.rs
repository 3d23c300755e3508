// Dependency declarations, require, and unrequire through the public facade

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use lodestone_resource::{
    FetchMode, Loader, LoaderConfig, LoaderError, MemoryFetcher, PathRule,
};

use common::{counting_callback, string_map};

#[tokio::test]
async fn test_require_loads_dependencies_first() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());
    let (callback, count) = counting_callback();

    loader
        .script()
        .declare(
            string_map(&[("main", &["util"])]),
            string_map(&[("util", &["/u.js"]), ("main", &["/m.js"])]),
        )
        .unwrap();
    loader.script().require(&["main"], Some(callback)).unwrap();
    loader.settle().await;

    assert_eq!(
        fetcher.installed_urls(),
        vec!["/u.js".to_string(), "/m.js".to_string()]
    );
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(loader.script().loaded("util"));
    assert!(loader.script().loaded("main"));
}

#[tokio::test]
async fn test_require_preserves_sibling_order_and_dedupes() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());

    loader
        .script()
        .declare(
            string_map(&[
                ("app", &["first", "second"]),
                ("first", &["base"]),
                ("second", &["base"]),
            ]),
            string_map(&[
                ("app", &["/app.js"]),
                ("first", &["/first.js"]),
                ("second", &["/second.js"]),
                ("base", &["/base.js"]),
            ]),
        )
        .unwrap();
    loader.script().require(&["app"], None).unwrap();
    loader.settle().await;

    assert_eq!(
        fetcher.installed_urls(),
        vec![
            "/base.js".to_string(),
            "/first.js".to_string(),
            "/second.js".to_string(),
            "/app.js".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_require_is_idempotent_once_loaded() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());

    loader
        .script()
        .declare(HashMap::new(), string_map(&[("util", &["/u.js"])]))
        .unwrap();
    loader.script().require(&["util"], None).unwrap();
    loader.settle().await;

    // Already loaded: the callback fires without another fetch
    let (callback, count) = counting_callback();
    loader.script().require(&["util"], Some(callback)).unwrap();
    loader.settle().await;

    assert_eq!(fetcher.installed_urls().len(), 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_require_rejects_cycles_without_dispatching() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());

    loader
        .script()
        .declare(
            string_map(&[("a", &["b"]), ("b", &["a"])]),
            string_map(&[("a", &["/a.js"]), ("b", &["/b.js"])]),
        )
        .unwrap();

    match loader.script().require(&["a"], None) {
        Err(LoaderError::CircularDependency(_)) => {}
        other => panic!("expected circular dependency error, got {:?}", other),
    }
    loader.settle().await;
    assert!(fetcher.records().is_empty());
}

#[tokio::test]
async fn test_require_rejects_undeclared_urls() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());

    loader
        .script()
        .declare(string_map(&[("main", &["util"])]), string_map(&[("main", &["/m.js"])]))
        .unwrap();

    match loader.script().require(&["main"], None) {
        Err(LoaderError::UnresolvedDependency(name)) => assert_eq!(name, "util"),
        other => panic!("expected unresolved dependency error, got {:?}", other),
    }
    loader.settle().await;
    assert!(fetcher.records().is_empty());
}

#[tokio::test]
async fn test_done_mark_satisfies_a_required_dependency() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());
    let (callback, count) = counting_callback();

    loader.script().done("analytics");
    loader
        .script()
        .declare(
            string_map(&[("app", &["analytics"])]),
            string_map(&[("app", &["/app.js"])]),
        )
        .unwrap();
    loader.script().require(&["app"], Some(callback)).unwrap();
    loader.settle().await;

    assert_eq!(fetcher.installed_urls(), vec!["/app.js".to_string()]);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unrequire_unloads_names_and_dependencies() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());

    loader
        .script()
        .declare(
            string_map(&[("main", &["util"])]),
            string_map(&[("util", &["/u.js"]), ("main", &["/m.js"])]),
        )
        .unwrap();
    loader.script().require(&["main"], None).unwrap();
    loader.settle().await;
    assert!(loader.script().loaded("main"));

    loader.script().unrequire(&["main"]).unwrap();
    assert!(!loader.script().loaded("main"));
    assert!(!loader.script().loaded("util"));

    // Requiring again re-fetches the whole chain
    loader.script().require(&["main"], None).unwrap();
    loader.settle().await;
    assert_eq!(fetcher.installed_urls().len(), 4);
}

#[tokio::test]
async fn test_declare_replaces_urls_per_name() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());

    loader
        .script()
        .declare(HashMap::new(), string_map(&[("main", &["/main-a.js"])]))
        .unwrap();
    loader.script().require(&["main"], None).unwrap();
    loader.settle().await;

    // Redeclare to a new version; a later require switches the URL set
    loader
        .script()
        .declare(HashMap::new(), string_map(&[("main", &["/main-b.js"])]))
        .unwrap();
    loader.script().unload("main");
    loader.script().require(&["main"], None).unwrap();
    loader.settle().await;

    assert_eq!(
        fetcher.installed_urls(),
        vec!["/main-a.js".to_string(), "/main-b.js".to_string()]
    );
    assert!(loader.script().loaded("main"));
}

#[tokio::test]
async fn test_path_rules_apply_to_declared_urls() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());

    loader.script().path(PathRule::Prefix("/static/".to_string()));
    loader
        .script()
        .declare(HashMap::new(), string_map(&[("util", &["util.js"])]))
        .unwrap();
    loader.script().require(&["util"], None).unwrap();
    loader.settle().await;

    assert_eq!(fetcher.installed_urls(), vec!["/static/util.js".to_string()]);
}

#[tokio::test]
async fn test_prefetch_on_declare_primes_declared_urls() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let config = LoaderConfig {
        prefetch_on_declare: true,
        ..LoaderConfig::default()
    };
    let loader = Loader::with_config(config, fetcher.clone());

    loader
        .script()
        .declare(HashMap::new(), string_map(&[("util", &["/u.js"])]))
        .unwrap();
    loader.settle().await;

    let records = fetcher.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "/u.js");
    assert_eq!(records[0].mode, FetchMode::Prime);

    // The prime does not count as a load
    assert!(!loader.script().loaded("util"));
}

#[tokio::test]
async fn test_disposed_loader_rejects_require() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let loader = Loader::new(fetcher.clone());
    loader.dispose();

    match loader.script().require(&["anything"], None) {
        Err(LoaderError::Disposed) => {}
        other => panic!("expected disposed error, got {:?}", other),
    }
}
