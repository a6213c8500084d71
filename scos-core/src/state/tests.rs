use crate::manifest::Manifest;
use crate::pipeline::merger::merge;
use crate::pipeline::release::build_release_command;
use crate::state::StateManager;
use crate::types::{ComponentRecord, ComponentStatus, FailureReason};

fn manifest() -> Manifest {
    Manifest::from_pairs([
        ("zeta", "reg/z@sha256:aaa"),
        ("alpha", "reg/a@sha256:bbb"),
        ("cluster-version-operator", "reg/cvo@sha256:ccc"),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_state_manager_init() {
    let manager = StateManager::new_in_memory().await.unwrap();
    assert!(manager.load_manifest().await.unwrap().is_none());
    assert!(manager.list_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_backed_database_survives_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("nested").join("state.db");

    let manager = StateManager::new(&path).await.unwrap();
    manager.save_manifest(&manifest()).await.unwrap();
    drop(manager);

    let reopened = StateManager::new(&path).await.unwrap();
    assert_eq!(reopened.load_manifest().await.unwrap(), Some(manifest()));
}

#[tokio::test]
async fn test_manifest_round_trip_keeps_order() {
    let manager = StateManager::new_in_memory().await.unwrap();
    manager.save_manifest(&manifest()).await.unwrap();

    let loaded = manager.load_manifest().await.unwrap().unwrap();
    assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["zeta", "alpha", "cluster-version-operator"]);
}

#[tokio::test]
async fn test_upsert_record_replaces_previous_state() {
    let manager = StateManager::new_in_memory().await.unwrap();
    let mut record = ComponentRecord::new("alpha", "reg/a@sha256:bbb");
    manager.upsert_record(&record).await.unwrap();

    record.vcs_url = Some("https://github.com/openshift/alpha".into());
    record.advance(ComponentStatus::MetadataResolved).unwrap();
    manager.upsert_record(&record).await.unwrap();

    let stored = manager.get_record("alpha").await.unwrap().unwrap();
    assert_eq!(stored, record);
    assert_eq!(manager.list_records().await.unwrap().len(), 1);
    assert!(manager.get_record("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_records_follows_manifest_order() {
    let manager = StateManager::new_in_memory().await.unwrap();
    manager.save_manifest(&manifest()).await.unwrap();
    for record in manifest().initial_records().iter().rev() {
        manager.upsert_record(record).await.unwrap();
    }

    let names: Vec<String> =
        manager.list_records().await.unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["zeta", "alpha", "cluster-version-operator"]);
}

#[tokio::test]
async fn test_build_tables_track_outcomes() {
    let manager = StateManager::new_in_memory().await.unwrap();

    let mut ok = ComponentRecord::new("alpha", "reg/a@sha256:bbb");
    ok.advance(ComponentStatus::Buildable).unwrap();
    manager.upsert_record(&ok).await.unwrap();
    assert_eq!(manager.list_buildable().await.unwrap(), vec!["alpha"]);

    ok.succeed("reg2/alpha@sha256:111".into()).unwrap();
    manager.upsert_record(&ok).await.unwrap();

    let mut bad = ComponentRecord::new("zeta", "reg/z@sha256:aaa");
    bad.advance(ComponentStatus::Buildable).unwrap();
    bad.fail(FailureReason::PushFailed, "denied").unwrap();
    manager.upsert_record(&bad).await.unwrap();

    let mut skipped = ComponentRecord::new("cluster-version-operator", "reg/cvo@sha256:ccc");
    skipped.vcs_url = Some("https://github.com/openshift/cvo".into());
    skipped.fail(FailureReason::CloneFailed, "not found").unwrap();
    manager.upsert_record(&skipped).await.unwrap();

    assert!(manager.list_buildable().await.unwrap().is_empty());
    assert_eq!(
        manager.list_replacements().await.unwrap(),
        vec![("alpha".to_string(), "reg2/alpha@sha256:111".to_string())]
    );

    let results = manager.list_build_results().await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].component, "alpha");
    assert_eq!(results[0].outcome, "succeeded");
    assert_eq!(results[1].reason, Some(FailureReason::PushFailed));

    let unbuildable = manager.list_unbuildable().await.unwrap();
    assert_eq!(unbuildable.len(), 1);
    assert_eq!(unbuildable[0].component, "cluster-version-operator");
    assert_eq!(unbuildable[0].reason, FailureReason::CloneFailed);
    assert_eq!(unbuildable[0].detail.as_deref(), Some("not found"));
}

#[tokio::test]
async fn test_replacing_record_clears_stale_build_rows() {
    let manager = StateManager::new_in_memory().await.unwrap();
    let mut built = ComponentRecord::new("alpha", "reg/a@sha256:bbb");
    built.succeed("reg2/alpha@sha256:111".into()).unwrap();
    manager.upsert_record(&built).await.unwrap();

    let fresh = ComponentRecord::new("alpha", "reg/a@sha256:fff");
    manager.upsert_record(&fresh).await.unwrap();

    assert!(manager.list_replacements().await.unwrap().is_empty());
    assert!(manager.list_build_results().await.unwrap().is_empty());
    assert_eq!(manager.get_record("alpha").await.unwrap(), Some(fresh));
}

#[tokio::test]
async fn test_final_artifacts_round_trip() {
    let manager = StateManager::new_in_memory().await.unwrap();
    let mut cvo = ComponentRecord::new("cluster-version-operator", "reg/cvo@sha256:ccc");
    cvo.succeed("reg2/cvo@sha256:ddd".into()).unwrap();

    let outcome = merge(&manifest(), &[cvo], "cluster-version-operator");
    manager.save_final_mapping(&outcome.mapping).await.unwrap();
    assert_eq!(manager.load_final_mapping().await.unwrap(), Some(outcome.mapping.clone()));

    let command = build_release_command(
        &outcome.mapping,
        "base:1",
        "out:1",
        outcome.base_image_override.as_deref(),
    );
    manager.save_release_command(&command).await.unwrap();
    manager.save_release_command(&command).await.unwrap();
    assert_eq!(manager.load_release_command().await.unwrap(), Some(command));

    manager.clear_release_command().await.unwrap();
    assert!(manager.load_release_command().await.unwrap().is_none());
}
