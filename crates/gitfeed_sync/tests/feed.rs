//! End-to-end feeds over real git repositories.

use gitfeed_core::{
    write_back, Category, Config, FileContent, MemoryVersionManager, ProducerRecord, Record,
    RecordFormat, StoreVersionManager, VersionPointer, VersionedStore,
};
use gitfeed_store::{GitStore, NetworkLimits, WalkOrder};
use gitfeed_sync::{CommitSelector, Consumer, Producer, DEFAULT_COMMIT_MESSAGE};
use gitfeed_testkit::{record, MemoryCategory, TestFeed};
use serde_json::json;
use std::sync::Arc;

fn open_producer(feed: &TestFeed) -> Producer {
    let config = Arc::new(feed.producer_config().build().unwrap());
    Producer::open(config).unwrap()
}

fn open_consumer(feed: &TestFeed, name: &str) -> (Consumer, MemoryCategory) {
    let config = Arc::new(
        feed.consumer_config(name)
            .map_class("NsyncTestFoo", ["NsyncTestBar"])
            .build()
            .unwrap(),
    );
    config.set_version_manager(Arc::new(MemoryVersionManager::new()));
    let bars = MemoryCategory::new("NsyncTestBar");
    config.register("NsyncTestBar", bars.handle());
    (Consumer::open(config).unwrap(), bars)
}

fn remote_head(feed: &TestFeed) -> VersionPointer {
    let remote = GitStore::open(&feed.remote_path(), NetworkLimits::default()).unwrap();
    remote
        .list_commits("master", 1, 0, WalkOrder::NewestFirst)
        .unwrap()
        .remove(0)
}

#[test]
fn producer_bootstraps_and_pushes() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);

    assert!(producer.file_exists(".gitignore"));
    let history = producer.history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(remote_head(&feed), history[0]);
    assert!(producer.latest_changes().unwrap().is_empty());
}

#[test]
fn reopening_a_producer_does_not_bootstrap_again() {
    let feed = TestFeed::new();
    drop(open_producer(&feed));
    let producer = open_producer(&feed);
    assert_eq!(producer.history(10).unwrap().len(), 1);
}

#[test]
fn consumer_follows_producer_through_add_modify_delete() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);
    let (consumer, bars) = open_consumer(&feed, "alpha");

    producer
        .write_file(
            "nsync_test_foo/1.json",
            record(json!({"id": 1, "val": "Party"})),
            false,
        )
        .unwrap();
    producer
        .commit(DEFAULT_COMMIT_MESSAGE, &CommitSelector::All)
        .unwrap();

    let report = consumer.update().unwrap();
    assert_eq!(report.changes_applied, 1);
    assert_eq!(bars.get("1").unwrap()["val"], "Party");

    producer
        .write_file(
            "nsync_test_foo/1.json",
            record(json!({"id": 1, "val": "Quiet"})),
            false,
        )
        .unwrap();
    producer.commit("second", &CommitSelector::All).unwrap();
    consumer.update().unwrap();
    assert_eq!(bars.get("1").unwrap()["val"], "Quiet");

    producer.remove_file("nsync_test_foo/1.json").unwrap();
    producer.commit("third", &CommitSelector::All).unwrap();
    consumer.update().unwrap();
    assert!(bars.is_empty());

    assert_eq!(consumer.version().unwrap(), remote_head(&feed));
}

#[test]
fn fresh_consumer_replays_the_whole_history() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);
    for id in 1..=3 {
        producer
            .write_file(
                &format!("nsync_test_foo/{id}.json"),
                record(json!({"id": id})),
                false,
            )
            .unwrap();
        producer
            .commit(&format!("record {id}"), &CommitSelector::All)
            .unwrap();
    }

    let (consumer, bars) = open_consumer(&feed, "late");
    let first = consumer.version().unwrap();
    assert_eq!(
        first,
        producer
            .store()
            .list_commits("master", 1, 0, WalkOrder::OldestFirst)
            .unwrap()[0]
    );

    consumer.update().unwrap();
    assert_eq!(bars.ids(), ["1", "2", "3"]);
}

#[test]
fn consumer_rollback_restores_previous_state() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);
    let (consumer, bars) = open_consumer(&feed, "alpha");

    producer
        .write_file("nsync_test_foo/1.json", record(json!({"val": "Party"})), false)
        .unwrap();
    producer.commit("one", &CommitSelector::All).unwrap();
    consumer.update().unwrap();

    producer
        .write_file("nsync_test_foo/1.json", record(json!({"val": "Quiet"})), false)
        .unwrap();
    producer
        .write_file("nsync_test_foo/2.json", record(json!({"val": "New"})), false)
        .unwrap();
    producer.commit("two", &CommitSelector::All).unwrap();
    consumer.update().unwrap();
    assert_eq!(bars.len(), 2);

    consumer.rollback().unwrap();

    assert_eq!(bars.ids(), ["1"]);
    assert_eq!(bars.get("1").unwrap()["val"], "Party");
}

#[test]
fn selective_commit_leaves_other_changes_pending() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);

    for id in ["1", "2"] {
        producer
            .write_file(&format!("nsync_test_foo/{id}.json"), record(json!({"id": id})), false)
            .unwrap();
    }
    producer
        .write_file("nsync_test_bar/1.json", record(json!({"id": 1})), false)
        .unwrap();

    producer
        .commit("only foo 2", &CommitSelector::only("NsyncTestFoo", ["2"]))
        .unwrap();

    let pending = producer.latest_changes().unwrap();
    assert_eq!(pending.total_changes(), 2);
    assert_eq!(pending.get("NsyncTestFoo").unwrap()[0].id, "1");
    assert!(pending.contains("NsyncTestBar"));
}

#[test]
fn written_content_is_what_the_diff_returns() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);
    let v0 = producer.store().head().unwrap();

    let content = FileContent::from(record(json!({"id": 9, "tags": ["a", "b"]})));
    let bytes = content.to_bytes(RecordFormat::Json).unwrap();
    producer
        .write_file("nsync_test_foo/9.json", content, false)
        .unwrap();
    let v1 = producer.commit("nine", &CommitSelector::All).unwrap();

    let entries = producer.store().diff(&v0, &v1).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].content_at_new_version(), Some(bytes.as_slice()));
}

#[test]
fn local_consumer_reads_the_producer_repository() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);
    let v0 = producer.store().head().unwrap();

    producer
        .write_file("nsync_test_foo/1.json", record(json!({"id": 1})), false)
        .unwrap();
    producer.commit("one", &CommitSelector::All).unwrap();

    let config = Arc::new(
        feed.local_consumer_config()
            .map_class("NsyncTestFoo", ["NsyncTestBar"])
            .build()
            .unwrap(),
    );
    config.set_version_manager(Arc::new(MemoryVersionManager::starting_at(v0)));
    let bars = MemoryCategory::new("NsyncTestBar");
    config.register("NsyncTestBar", bars.handle());

    let consumer = Consumer::open(config).unwrap();
    consumer.update().unwrap();

    assert_eq!(bars.ids(), ["1"]);
}

#[test]
fn producer_rollback_reapplies_to_its_own_categories() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);
    let foos = MemoryCategory::new("NsyncTestFoo");
    producer
        .config()
        .register("NsyncTestFoo", foos.handle());
    let manager = StoreVersionManager::new(Arc::clone(producer.store()))
        .with_branch(producer.config().branch());
    producer.config().set_version_manager(Arc::new(manager));

    producer
        .write_file("nsync_test_foo/1.json", record(json!({"val": "Party"})), false)
        .unwrap();
    let v1 = producer.commit("one", &CommitSelector::All).unwrap();
    foos.seed("1", record(json!({"val": "Party"})));

    producer
        .write_file("nsync_test_foo/1.json", record(json!({"val": "Quiet"})), false)
        .unwrap();
    producer.commit("two", &CommitSelector::All).unwrap();
    foos.seed("1", record(json!({"val": "Quiet"})));

    let report = producer.rollback().unwrap();

    assert_eq!(report.to, v1);
    assert_eq!(foos.get("1").unwrap()["val"], "Party");
    assert_eq!(producer.store().head().unwrap(), v1);
    assert_eq!(remote_head(&feed), v1);
    let on_disk = std::fs::read(feed.producer_path().join("nsync_test_foo/1.json")).unwrap();
    let decoded: Record = serde_json::from_slice(&on_disk).unwrap();
    assert_eq!(decoded["val"], "Party");
}

struct Post {
    id: u32,
    title: &'static str,
    published: bool,
}

impl ProducerRecord for Post {
    fn category(&self) -> Category {
        Category::from("NsyncTestFoo")
    }

    fn sync_id(&self) -> String {
        self.id.to_string()
    }

    fn to_record(&self) -> Record {
        record(json!({"id": self.id, "title": self.title}))
    }

    fn should_sync(&self) -> bool {
        self.published
    }
}

#[test]
fn write_back_routes_through_the_active_producer() {
    let feed = TestFeed::new();
    let producer = open_producer(&feed);
    let (consumer, bars) = open_consumer(&feed, "alpha");
    let config: &Config = producer.config();

    let mut post = Post {
        id: 5,
        title: "hello",
        published: true,
    };
    write_back(config, &post).unwrap();
    producer.commit("publish", &CommitSelector::All).unwrap();
    consumer.update().unwrap();
    assert_eq!(bars.get("5").unwrap()["title"], "hello");

    post.published = false;
    write_back(config, &post).unwrap();
    producer.commit("unpublish", &CommitSelector::All).unwrap();
    consumer.update().unwrap();
    assert!(bars.is_empty());
}

#[test]
fn feeds_run_on_a_non_default_branch() {
    let feed = TestFeed::new();
    let producer = Producer::open(Arc::new(
        feed.producer_config().branch("main").build().unwrap(),
    ))
    .unwrap();
    let manager = StoreVersionManager::new(Arc::clone(producer.store()))
        .with_branch(producer.config().branch());
    producer.config().set_version_manager(Arc::new(manager));

    let config = Arc::new(
        feed.consumer_config("alpha")
            .branch("main")
            .map_class("NsyncTestFoo", ["NsyncTestBar"])
            .build()
            .unwrap(),
    );
    config.set_version_manager(Arc::new(MemoryVersionManager::new()));
    let bars = MemoryCategory::new("NsyncTestBar");
    config.register("NsyncTestBar", bars.handle());
    let consumer = Consumer::open(config).unwrap();

    producer
        .write_file("nsync_test_foo/1.json", record(json!({"val": "Party"})), false)
        .unwrap();
    let v1 = producer.commit("one", &CommitSelector::All).unwrap();
    consumer.update().unwrap();

    assert_eq!(bars.ids(), ["1"]);
    assert_eq!(consumer.version().unwrap(), v1);
    assert_eq!(producer.history(10).unwrap().len(), 2);
}
