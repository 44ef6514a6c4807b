//! File-backed snapshot store tests.

use mcpcheck_core::declaration::SnapshotProjection;
use mcpcheck_runner::snapshot::{ComparisonOutcome, SNAPSHOT_FORMAT_VERSION, SnapshotStore};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

type Outcome = Result<(), Box<dyn std::error::Error>>;

fn projection(properties: &[&str], exclude: &[&str]) -> SnapshotProjection {
    SnapshotProjection {
        properties: properties.iter().map(ToString::to_string).collect(),
        exclude: exclude.iter().map(ToString::to_string).collect(),
    }
}

#[tokio::test]
async fn test_directory_is_created_on_demand() -> Outcome {
    let root = TempDir::new()?;
    let store = SnapshotStore::new(root.path().join("nested").join("__snapshots__"));

    let comparison = store
        .compare("first", &json!({ "ok": true }), &SnapshotProjection::default(), true)
        .await?;

    assert_eq!(comparison.outcome, ComparisonOutcome::Created);
    assert!(store.path_for("first").exists());
    Ok(())
}

#[tokio::test]
async fn test_stored_data_is_normalized_and_projected() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path());
    let actual = json!({ "z": 1, "a": { "y": 2, "x": 3 }, "timestamp": "now" });

    store
        .compare("shape", &actual, &projection(&[], &["timestamp"]), true)
        .await?;

    let snapshot = store.load("shape").await?.ok_or("snapshot not written")?;
    assert_eq!(snapshot.name, "shape");
    assert_eq!(snapshot.data, json!({ "a": { "x": 3, "y": 2 }, "z": 1 }));
    assert_eq!(snapshot.metadata.version, SNAPSHOT_FORMAT_VERSION);
    assert_eq!(snapshot.metadata.exclude, vec!["timestamp".to_string()]);

    let text = std::fs::read_to_string(store.path_for("shape"))?;
    assert!(!text.contains("now"));
    Ok(())
}

#[tokio::test]
async fn test_comparison_in_check_mode_never_writes() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path());
    let projection = SnapshotProjection::default();
    store.compare("stable", &json!({ "a": 1 }), &projection, true).await?;
    let before = std::fs::read(store.path_for("stable"))?;

    for _ in 0..2 {
        let comparison = store
            .compare("stable", &json!({ "a": 1 }), &projection, false)
            .await?;
        assert!(comparison.matched());
        assert_eq!(comparison.outcome, ComparisonOutcome::Matched);
    }

    let mismatch = store
        .compare("stable", &json!({ "a": 2 }), &projection, false)
        .await?;
    assert_eq!(mismatch.outcome, ComparisonOutcome::Mismatched);

    assert_eq!(std::fs::read(store.path_for("stable"))?, before);
    Ok(())
}

#[tokio::test]
async fn test_matching_update_leaves_file_untouched() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path());
    let projection = SnapshotProjection::default();
    store.compare("same", &json!([1, 2]), &projection, true).await?;
    let before = std::fs::read(store.path_for("same"))?;

    let comparison = store.compare("same", &json!([1, 2]), &projection, true).await?;

    assert_eq!(comparison.outcome, ComparisonOutcome::Matched);
    assert_eq!(std::fs::read(store.path_for("same"))?, before);
    Ok(())
}

#[tokio::test]
async fn test_key_order_does_not_matter() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path());
    let projection = SnapshotProjection::default();
    store
        .compare("ordered", &json!({ "a": 1, "b": [ { "d": 4, "c": 3 } ] }), &projection, true)
        .await?;

    let comparison = store
        .compare("ordered", &json!({ "b": [ { "c": 3, "d": 4 } ], "a": 1 }), &projection, false)
        .await?;
    assert!(comparison.matched());
    Ok(())
}

#[tokio::test]
async fn test_projection_ignores_unselected_changes() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path());
    let selected = projection(&["content"], &[]);
    store
        .compare("partial", &json!({ "content": "x", "meta": 1 }), &selected, true)
        .await?;

    let comparison = store
        .compare("partial", &json!({ "content": "x", "meta": 2 }), &selected, false)
        .await?;
    assert!(comparison.matched());
    Ok(())
}

#[tokio::test]
async fn test_list_and_remove() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path());
    assert!(store.list().await?.is_empty());

    let projection = SnapshotProjection::default();
    store.compare("tool-b", &json!(1), &projection, true).await?;
    store.compare("tool-a", &json!(2), &projection, true).await?;
    std::fs::write(dir.path().join("README.md"), "not a snapshot")?;

    assert_eq!(store.list().await?, vec!["tool-a", "tool-b"]);

    assert!(store.remove("tool-a").await?);
    assert!(!store.remove("tool-a").await?);
    assert_eq!(store.list().await?, vec!["tool-b"]);
    Ok(())
}

#[tokio::test]
async fn test_list_on_missing_directory_is_empty() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path().join("absent"));
    assert!(store.list().await?.is_empty());
    assert!(store.load("anything").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_names_sharing_a_file_do_not_overwrite_each_other() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path());
    let projection = SnapshotProjection::default();
    assert_eq!(store.path_for("a:b"), store.path_for("a/b"));

    store.compare("a:b", &json!({ "v": 1 }), &projection, true).await?;
    let before = std::fs::read(store.path_for("a:b"))?;

    let err = store
        .compare("a/b", &json!({ "v": 2 }), &projection, true)
        .await
        .expect_err("file belongs to another snapshot");
    assert!(err.to_string().contains("already holds snapshot 'a:b'"));
    assert!(store.remove("a/b").await.is_err());

    assert_eq!(std::fs::read(store.path_for("a:b"))?, before);
    let kept = store.load("a:b").await?.ok_or("snapshot lost")?;
    assert_eq!(kept.data, json!({ "v": 1 }));
    Ok(())
}

#[tokio::test]
async fn test_projection_keeps_numeric_object_keys_on_disk() -> Outcome {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path());
    let selected = projection(&["scores[2]"], &[]);
    let actual = json!({ "scores": { "2": "b", "x": 1 } });

    store.compare("scores", &actual, &selected, true).await?;
    let snapshot = store.load("scores").await?.ok_or("snapshot not written")?;
    assert_eq!(snapshot.data, json!({ "scores": { "2": "b" } }));

    let comparison = store.compare("scores", &actual, &selected, false).await?;
    assert_eq!(comparison.outcome, ComparisonOutcome::Matched);
    Ok(())
}
