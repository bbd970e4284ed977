//! Apply-cycle semantics against a scripted store.

use gitfeed_core::{Category, Config, CoreError, FileLock, MemoryVersionManager};
use gitfeed_store::{DiffEntry, MockStore, StoreCall};
use gitfeed_sync::{Consumer, CycleState, SyncError};
use gitfeed_testkit::{Action, MemoryCategory};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn json(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

fn setup(store: &Arc<MockStore>) -> (TempDir, Arc<Config>, Consumer) {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(Config::builder(dir.path().join("repo")).build().unwrap());
    config.set_version_manager(Arc::new(MemoryVersionManager::starting_at("v0")));
    let consumer = Consumer::with_store(Arc::clone(&config), store.clone());
    (dir, config, consumer)
}

fn register(config: &Config, category: &MemoryCategory) {
    config.map_class(category.name(), [category.name()]);
    config.register(category.name(), category.handle());
}

fn logging(name: &str, log: &Arc<Mutex<Vec<String>>>) -> MemoryCategory {
    let log = Arc::clone(log);
    let label = name.to_string();
    MemoryCategory::with_hook(name, move |_, applied| {
        log.lock().push(format!("{label}:{}", applied.id));
        Ok(())
    })
}

fn version(config: &Config) -> String {
    config
        .version_manager()
        .unwrap()
        .version()
        .unwrap()
        .into_string()
}

#[test]
fn categories_follow_first_seen_order_without_ordering() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![
            DiffEntry::added("post/1.json", json(json!({"title": "a"}))),
            DiffEntry::added("author/1.json", json(json!({"name": "x"}))),
            DiffEntry::added("post/2.json", json(json!({"title": "b"}))),
        ],
    );
    let (_dir, config, consumer) = setup(&store);
    let log = Arc::new(Mutex::new(Vec::new()));
    register(&config, &logging("Post", &log));
    register(&config, &logging("Author", &log));

    let report = consumer.update().unwrap();

    assert_eq!(*log.lock(), ["Post:1", "Post:2", "Author:1"]);
    assert_eq!(
        report.categories,
        vec![Category::from("Post"), Category::from("Author")]
    );
    assert_eq!(report.changes_applied, 3);
}

#[test]
fn configured_ordering_comes_first() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![
            DiffEntry::added("post/1.json", json(json!({}))),
            DiffEntry::added("comment/1.json", json(json!({}))),
            DiffEntry::added("author/1.json", json(json!({}))),
        ],
    );
    let (_dir, config, consumer) = setup(&store);
    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["Post", "Comment", "Author"] {
        register(&config, &logging(name, &log));
    }
    config.set_ordering(Some(["Author", "Tag", "Post"]));

    consumer.update().unwrap();

    assert_eq!(*log.lock(), ["Author:1", "Post:1", "Comment:1"]);
}

#[test]
fn producer_categories_fan_out() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![DiffEntry::added("blog_post/7.json", json(json!({"title": "hi"})))],
    );
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::new("Post");
    let search = MemoryCategory::new("SearchEntry");
    config.map_class("BlogPost", ["Post", "SearchEntry", "Archived"]);
    config.register("Post", posts.handle());
    config.register("SearchEntry", search.handle());

    let report = consumer.update().unwrap();

    assert_eq!(report.changes_applied, 2);
    assert_eq!(posts.get("7").unwrap()["title"], "hi");
    assert_eq!(search.get("7").unwrap()["title"], "hi");
}

#[test]
fn existing_records_are_updated_and_deleted() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![
            DiffEntry::modified("post/1.json", json(json!({"title": "new"}))),
            DiffEntry::deleted("post/2.json"),
        ],
    );
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::new("Post");
    posts.seed("1", gitfeed_testkit::record(json!({"title": "old"})));
    posts.seed("2", gitfeed_testkit::record(json!({"title": "gone"})));
    register(&config, &posts);

    consumer.update().unwrap();

    assert_eq!(posts.ids(), ["1"]);
    assert_eq!(posts.get("1").unwrap()["title"], "new");
    let actions: Vec<Action> = posts.applied().iter().map(|a| a.action).collect();
    assert_eq!(actions, [Action::Update, Action::Delete]);
}

#[test]
fn deleting_an_unknown_record_does_nothing() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff("v0", "v1", vec![DiffEntry::deleted("post/9.json")]);
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::new("Post");
    register(&config, &posts);

    let report = consumer.update().unwrap();

    assert!(posts.applied().is_empty());
    assert!(report.is_empty());
    assert_eq!(version(&config), "v1");
}

#[test]
fn missing_capabilities_are_skipped() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![
            DiffEntry::modified("post/1.json", json(json!({"title": "new"}))),
            DiffEntry::added("post/2.json", json(json!({}))),
        ],
    );
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::read_only("Post");
    posts.seed("1", gitfeed_testkit::record(json!({"title": "old"})));
    register(&config, &posts);

    let report = consumer.update().unwrap();

    assert_eq!(report.changes_skipped, 2);
    assert_eq!(report.changes_applied, 0);
    assert_eq!(posts.get("1").unwrap()["title"], "old");
    assert_eq!(version(&config), "v1");
}

#[test]
fn undecodable_files_arrive_with_empty_payloads() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![DiffEntry::added("post/1.json", b"{not json".to_vec())],
    );
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::new("Post");
    register(&config, &posts);

    consumer.update().unwrap();

    assert!(posts.get("1").unwrap().is_empty());
}

#[test]
fn deferred_tasks_run_after_their_category_and_at_the_end() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![
            DiffEntry::added("post/1.json", json(json!({}))),
            DiffEntry::added("post/2.json", json(json!({}))),
            DiffEntry::added("author/1.json", json(json!({}))),
        ],
    );
    let (_dir, config, consumer) = setup(&store);
    let log = Arc::new(Mutex::new(Vec::<String>::new()));

    let sink = Arc::clone(&log);
    let posts = MemoryCategory::with_hook("Post", move |cycle, applied| {
        sink.lock().push(format!("apply post {}", applied.id));

        let id = applied.id.clone();
        let after_post = Arc::clone(&sink);
        cycle.after_current_class_finished(move || {
            after_post.lock().push(format!("after post {id}"));
            Ok(())
        })?;

        let after_author = Arc::clone(&sink);
        cycle.after_class_finished("Author", move || {
            after_author.lock().push("after author".into());
            Ok(())
        });

        let finished = Arc::clone(&sink);
        cycle.after_finished(move || {
            finished.lock().push("finished".into());
            Ok(())
        });
        Ok(())
    });
    let authors = logging("Author", &log);
    register(&config, &posts);
    register(&config, &authors);

    let report = consumer.update().unwrap();

    assert_eq!(
        *log.lock(),
        [
            "apply post 1",
            "apply post 2",
            "after post 1",
            "after post 2",
            "Author:1",
            "after author",
            "after author",
            "finished",
            "finished",
        ]
    );
    assert_eq!(report.callbacks_run, 6);
    assert_eq!(consumer.cycle().pending(), 0);
}

#[test]
fn deferred_task_for_a_finished_category_never_runs() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![
            DiffEntry::added("author/1.json", json(json!({}))),
            DiffEntry::added("post/1.json", json(json!({}))),
        ],
    );
    let (_dir, config, consumer) = setup(&store);
    let ran = Arc::new(Mutex::new(false));

    let flag = Arc::clone(&ran);
    let posts = MemoryCategory::with_hook("Post", move |cycle, _| {
        let flag = Arc::clone(&flag);
        cycle.after_class_finished("Author", move || {
            *flag.lock() = true;
            Ok(())
        });
        Ok(())
    });
    register(&config, &MemoryCategory::new("Author"));
    register(&config, &posts);

    consumer.update().unwrap();

    assert!(!*ran.lock());
    assert_eq!(consumer.cycle().pending(), 0);
}

#[test]
fn handler_failure_aborts_and_replays() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![
            DiffEntry::added("post/1.json", json(json!({"n": 1}))),
            DiffEntry::added("post/2.json", json(json!({"n": 2}))),
        ],
    );
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::new("Post");
    posts.fail_on("2");
    register(&config, &posts);

    let err = consumer.update().unwrap_err();
    match &err {
        SyncError::ApplyFailed { category, path, .. } => {
            assert_eq!(category, "Post");
            assert_eq!(path, "post/2.json");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(consumer.state(), CycleState::Aborted);
    assert_eq!(version(&config), "v0");
    assert_eq!(consumer.stats().cycles_aborted, 1);

    posts.heal("2");
    let report = consumer.update().unwrap();

    assert_eq!(report.changes_applied, 2);
    assert_eq!(posts.ids(), ["1", "2"]);
    assert_eq!(version(&config), "v1");
    assert_eq!(consumer.state(), CycleState::Idle);
}

#[test]
fn failing_deferred_task_aborts_the_cycle() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff("v0", "v1", vec![DiffEntry::added("post/1.json", json(json!({})))]);
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::with_hook("Post", |cycle, _| {
        cycle.after_finished(|| Err(CoreError::handler("reindex failed")));
        Ok(())
    });
    register(&config, &posts);

    let err = consumer.update().unwrap_err();

    assert!(matches!(err, SyncError::CallbackFailed { ref scope, .. } if scope == "cycle"));
    assert_eq!(version(&config), "v0");
    assert_eq!(consumer.cycle().pending(), 0);
}

#[test]
fn held_lock_skips_the_cycle() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff("v0", "v1", vec![DiffEntry::added("post/1.json", json(json!({})))]);
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::new("Post");
    register(&config, &posts);

    let held = FileLock::new(config.lock_file()).acquire().unwrap();
    let err = consumer.update().unwrap_err();

    assert!(err.is_lock_contention());
    assert!(err.is_retryable());
    assert_eq!(consumer.state(), CycleState::LockFailed);
    assert_eq!(consumer.stats().lock_failures, 1);
    assert!(posts.is_empty());
    assert_eq!(store.count_calls(|c| matches!(c, StoreCall::Diff(..))), 0);

    drop(held);
    consumer.update().unwrap();
    assert_eq!(posts.len(), 1);
}

#[test]
fn remote_update_fetches_and_moves_head() {
    let store = Arc::new(MockStore::new("v0"));
    store.script_fetch("v2");
    store.script_diff("v0", "v2", vec![DiffEntry::added("post/1.json", json(json!({})))]);

    let dir = TempDir::new().unwrap();
    let config = Arc::new(
        Config::builder(dir.path().join("repo"))
            .repo_url("file:///srv/feed.git")
            .build()
            .unwrap(),
    );
    config.set_version_manager(Arc::new(MemoryVersionManager::starting_at("v0")));
    let consumer = Consumer::with_store(Arc::clone(&config), store.clone());
    let posts = MemoryCategory::new("Post");
    register(&config, &posts);

    consumer.update().unwrap();

    let calls = store.calls();
    assert_eq!(calls[0], StoreCall::Fetch("origin".into(), "master".into()));
    assert_eq!(calls[1], StoreCall::ResetSoft("v2".into()));
    assert_eq!(version(&config), "v2");
    assert_eq!(posts.len(), 1);
}

#[test]
fn rollback_applies_the_inverse_diff() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff(
        "v0",
        "v1",
        vec![DiffEntry::added("post/1.json", json(json!({"n": 1})))],
    );
    store.script_diff("v1", "v0", vec![DiffEntry::deleted("post/1.json")]);
    let (_dir, config, consumer) = setup(&store);
    let posts = MemoryCategory::new("Post");
    register(&config, &posts);

    consumer.update().unwrap();
    assert_eq!(posts.len(), 1);

    let report = consumer.rollback().unwrap();

    assert_eq!(report.to.as_str(), "v0");
    assert!(posts.is_empty());
    assert_eq!(version(&config), "v0");
}

#[test]
fn applying_an_empty_range_only_moves_the_pointer() {
    let store = Arc::new(MockStore::new("v0"));
    let (_dir, config, consumer) = setup(&store);

    let report = consumer.update().unwrap();

    assert!(report.is_empty());
    assert_eq!(version(&config), "v0");
    assert_eq!(consumer.stats().cycles_completed, 1);
}

#[test]
fn panicking_handler_leaves_engine_restartable() {
    let store = Arc::new(MockStore::new("v1"));
    store.script_diff("v0", "v1", vec![DiffEntry::added("post/1.json", json(json!({})))]);
    let (_dir, config, consumer) = setup(&store);

    let armed = Arc::new(AtomicBool::new(true));
    let trip = Arc::clone(&armed);
    let posts = MemoryCategory::with_hook("Post", move |_, _| {
        if trip.swap(false, Ordering::SeqCst) {
            panic!("handler blew up");
        }
        Ok(())
    });
    register(&config, &posts);

    let unwound = panic::catch_unwind(AssertUnwindSafe(|| consumer.update()));

    assert!(unwound.is_err());
    assert_eq!(consumer.state(), CycleState::Aborted);
    assert_eq!(consumer.stats().cycles_aborted, 1);
    assert_eq!(version(&config), "v0");

    let report = consumer.update().unwrap();
    assert_eq!(report.changes_applied, 1);
    assert_eq!(consumer.state(), CycleState::Idle);
    assert_eq!(version(&config), "v1");
}
