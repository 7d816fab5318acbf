mod common;

use async_trait::async_trait;
use blobsync::{
    BatchDownloader, Converter, RemotePath, SyncConfig, SyncError, TransferFault,
    ValidationResult,
};
use common::{dir_listing, quiet_config, Fault, MemoryStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn remote() -> RemotePath {
    RemotePath::new("bucket", "data.parquet").unwrap()
}

fn parquet_store() -> MemoryStore {
    MemoryStore::new()
        .with_object("bucket/data.parquet/part-0001", b"first row group")
        .with_object("bucket/data.parquet/part-0002", b"second row group")
        .with_object("bucket/data.parquet/_SUCCESS", b"")
}

fn many_objects(count: usize) -> MemoryStore {
    (0..count).fold(MemoryStore::new(), |store, i| {
        store.with_object(
            &format!("bucket/data.parquet/part-{:04}", i),
            format!("payload for part {}", i).as_bytes(),
        )
    })
}

#[derive(Default)]
struct CountingConverter {
    calls: AtomicUsize,
}

#[async_trait]
impl Converter for CountingConverter {
    async fn convert(&self, input: &Path, output_root: &Path) -> Result<Option<PathBuf>, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(input.is_dir());
        Ok(Some(output_root.join("JSON_DATA")))
    }
}

#[tokio::test]
async fn marker_objects_are_never_fetched() {
    let store = Arc::new(parquet_store());
    let out = tempfile::tempdir().unwrap();
    let destination = out.path().join("data.parquet");

    let report = BatchDownloader::new(store.clone(), quiet_config(4))
        .download(&remote(), &destination)
        .await
        .unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(dir_listing(&destination), vec!["part-0001", "part-0002"]);
    assert_eq!(store.fetches_of("data.parquet/_SUCCESS"), 0);
    assert_eq!(
        std::fs::read(destination.join("part-0002")).unwrap(),
        b"second row group"
    );
}

#[tokio::test]
async fn every_object_lands_byte_identical() {
    const K: usize = 25;
    let store = Arc::new(many_objects(K));
    let out = tempfile::tempdir().unwrap();
    let destination = out.path().join("data.parquet");

    let report = BatchDownloader::new(store.clone(), quiet_config(4))
        .download(&remote(), &destination)
        .await
        .unwrap();

    assert_eq!(report.files, K);
    assert_eq!(dir_listing(&destination).len(), K);
    for i in 0..K {
        let got = std::fs::read(destination.join(format!("part-{:04}", i))).unwrap();
        assert_eq!(got, format!("payload for part {}", i).into_bytes());
    }
}

#[tokio::test]
async fn each_object_fetched_exactly_once_for_any_worker_count() {
    const K: usize = 12;
    for workers in [1, 4, K + 5] {
        let store = Arc::new(many_objects(K));
        let out = tempfile::tempdir().unwrap();

        let report = BatchDownloader::new(store.clone(), quiet_config(workers))
            .download(&remote(), &out.path().join("data.parquet"))
            .await
            .unwrap();

        assert_eq!(report.files, K, "workers = {}", workers);
        assert_eq!(store.fetch_calls(), K, "workers = {}", workers);
        for i in 0..K {
            assert_eq!(
                store.fetches_of(&format!("data.parquet/part-{:04}", i)),
                1,
                "workers = {}",
                workers
            );
        }
    }
}

#[tokio::test]
async fn persistent_failure_makes_exactly_three_attempts() {
    let store = Arc::new(parquet_store().with_fault(
        "data.parquet/part-0001",
        Fault::Reset,
        usize::MAX,
    ));
    let out = tempfile::tempdir().unwrap();

    let err = BatchDownloader::new(store.clone(), quiet_config(2))
        .download(&remote(), &out.path().join("data.parquet"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("bucket/data.parquet"));
    match err {
        SyncError::BatchDownload { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, SyncError::Transfer { .. }));
        }
        other => panic!("expected BatchDownload, got {other:?}"),
    }
    assert_eq!(store.list_calls(), 3);
    assert_eq!(store.fetches_of("data.parquet/part-0001"), 3);
}

#[tokio::test]
async fn retry_budget_is_configurable() {
    let store = Arc::new(parquet_store().with_fault(
        "data.parquet/part-0002",
        Fault::Truncate,
        usize::MAX,
    ));
    let out = tempfile::tempdir().unwrap();
    let config = SyncConfig {
        max_attempts: 5,
        ..quiet_config(2)
    };

    let err = BatchDownloader::new(store.clone(), config)
        .download(&remote(), &out.path().join("data.parquet"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::BatchDownload { attempts: 5, .. }));
    assert_eq!(store.list_calls(), 5);
}

#[tokio::test]
async fn unreachable_prefix_consumes_no_attempt() {
    let store = Arc::new(parquet_store());
    let out = tempfile::tempdir().unwrap();
    let missing = RemotePath::new("bucket", "missing.parquet").unwrap();

    let err = BatchDownloader::new(store.clone(), quiet_config(2))
        .download(&missing, &out.path().join("missing.parquet"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Connection(_)));
    assert_eq!(store.list_calls(), 0);
    assert_eq!(store.fetch_calls(), 0);
}

#[tokio::test]
async fn listing_failure_is_not_retried() {
    let store = Arc::new(parquet_store().with_list_error("listing timed out"));
    let out = tempfile::tempdir().unwrap();

    let err = BatchDownloader::new(store.clone(), quiet_config(2))
        .download(&remote(), &out.path().join("data.parquet"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Connection(_)));
    assert_eq!(store.list_calls(), 1);
}

#[tokio::test]
async fn truncated_write_is_retried_with_a_fresh_attempt() {
    let store = Arc::new(parquet_store().with_fault("data.parquet/part-0002", Fault::Truncate, 1));
    let out = tempfile::tempdir().unwrap();
    let destination = out.path().join("data.parquet");

    let report = BatchDownloader::new(store.clone(), quiet_config(2))
        .download(&remote(), &destination)
        .await
        .unwrap();

    assert_eq!(report.attempts, 2);
    // the second attempt re-listed and re-fetched everything
    assert_eq!(store.list_calls(), 2);
    assert_eq!(store.fetches_of("data.parquet/part-0001"), 2);
    assert_eq!(store.fetches_of("data.parquet/part-0002"), 2);
    assert_eq!(report.files, 2);
    assert_eq!(
        std::fs::read(destination.join("part-0002")).unwrap(),
        b"second row group"
    );
}

#[tokio::test]
async fn connection_reset_is_retried() {
    let store = Arc::new(parquet_store().with_fault("data.parquet/part-0001", Fault::Reset, 1));
    let out = tempfile::tempdir().unwrap();

    let report = BatchDownloader::new(store.clone(), quiet_config(1))
        .download(&remote(), &out.path().join("data.parquet"))
        .await
        .unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(store.fetches_of("data.parquet/part-0001"), 2);
}

#[tokio::test]
async fn hung_object_hits_deadline_and_is_retried() {
    let store = Arc::new(parquet_store().with_fault("data.parquet/part-0001", Fault::Hang, 1));
    let out = tempfile::tempdir().unwrap();
    let config = SyncConfig {
        object_timeout: Some(Duration::from_millis(50)),
        ..quiet_config(2)
    };

    let report = BatchDownloader::new(store.clone(), config)
        .download(&remote(), &out.path().join("data.parquet"))
        .await
        .unwrap();

    assert_eq!(report.attempts, 2);
}

#[tokio::test]
async fn hung_object_timeout_is_a_transfer_error() {
    let store = Arc::new(parquet_store().with_fault(
        "data.parquet/part-0001",
        Fault::Hang,
        usize::MAX,
    ));
    let out = tempfile::tempdir().unwrap();
    let config = SyncConfig {
        object_timeout: Some(Duration::from_millis(20)),
        max_attempts: 1,
        ..quiet_config(1)
    };

    let err = BatchDownloader::new(store, config)
        .download(&remote(), &out.path().join("data.parquet"))
        .await
        .unwrap_err();

    match err {
        SyncError::BatchDownload { attempts: 1, last, .. } => assert!(matches!(
            *last,
            SyncError::Transfer {
                source: TransferFault::TimedOut(_),
                ..
            }
        )),
        other => panic!("expected BatchDownload, got {other:?}"),
    }
}

#[tokio::test]
async fn undersized_validation_names_the_file() {
    let store = Arc::new(parquet_store().with_fault(
        "data.parquet/part-0002",
        Fault::Truncate,
        usize::MAX,
    ));
    let out = tempfile::tempdir().unwrap();

    let err = BatchDownloader::new(store, quiet_config(2))
        .download(&remote(), &out.path().join("data.parquet"))
        .await
        .unwrap_err();

    let SyncError::BatchDownload { last, .. } = err else {
        panic!("expected BatchDownload");
    };
    match *last {
        SyncError::Validation(ValidationResult::Incomplete { ref file, .. }) => {
            assert_eq!(file.name(), "part-0002")
        }
        ref other => panic!("expected validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn converter_runs_only_after_success() {
    let out = tempfile::tempdir().unwrap();
    let destination = out.path().join("data.parquet");

    let converter = CountingConverter::default();
    let ok = BatchDownloader::new(Arc::new(parquet_store()), quiet_config(2))
        .run(&remote(), &destination, &converter, out.path())
        .await
        .unwrap();
    assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ok.converted, Some(out.path().join("JSON_DATA")));

    let failing = Arc::new(parquet_store().with_fault(
        "data.parquet/part-0001",
        Fault::Reset,
        usize::MAX,
    ));
    let converter = CountingConverter::default();
    let err = BatchDownloader::new(failing, quiet_config(2))
        .run(&remote(), &destination, &converter, out.path())
        .await;
    assert!(err.is_err());
    assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stale_files_do_not_survive_an_attempt() {
    let out = tempfile::tempdir().unwrap();
    let destination = out.path().join("data.parquet");
    std::fs::create_dir_all(&destination).unwrap();
    std::fs::write(destination.join("part-9999"), b"left over from last week").unwrap();

    BatchDownloader::new(Arc::new(parquet_store()), quiet_config(2))
        .download(&remote(), &destination)
        .await
        .unwrap();

    assert_eq!(dir_listing(&destination), vec!["part-0001", "part-0002"]);
}
