// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-to-end runs over real directory trees

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use sortwise::archive::ArchiveHandler;
use sortwise::config::{AppConfig, DuplicateAction};
use sortwise::coordinator::WatchCoordinator;
use sortwise::history::{History, UndoResult};
use sortwise::orchestrator::Orchestrator;
use sortwise::sorter::{RuleClassifier, SmartSorter};
use sortwise::watcher::WatchEvent;
use sortwise::ErrorKind;

fn config_for(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.watch_paths = vec![root.to_string_lossy().to_string()];
    config.ai_engine.enabled = false;
    config
}

fn rule_orchestrator(config: AppConfig, history: Option<History>) -> Orchestrator {
    Orchestrator::new(
        Arc::new(config),
        SmartSorter::new(Arc::new(RuleClassifier)),
        ArchiveHandler::default(),
        None,
        history,
    )
    .unwrap()
}

fn make_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

#[tokio::test]
async fn archive_contents_are_sorted_and_source_removed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    make_zip(
        &root.join("bundle.zip"),
        &[("invoice_march.pdf", b"%PDF-1.4"), ("holiday.jpg", b"\xff\xd8\xff")],
    );

    let mut config = config_for(root);
    config.rules.extract_archives = true;
    config.rules.delete_archives = true;
    let (_tx, rx) = watch::channel(false);

    let summary = rule_orchestrator(config, None).run(&rx).await.unwrap();

    assert_eq!(summary.extracted, 1);
    assert_eq!(summary.processed, 2);
    assert!(summary.errors.is_empty());
    assert!(!root.join("bundle.zip").exists());
    assert!(root.join("Finance/invoice_march.pdf").exists());
    assert!(root.join("Images/holiday.jpg").exists());
}

#[tokio::test]
async fn corrupt_archive_is_kept_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("broken.zip"), b"this is not a zip file").unwrap();

    let mut config = config_for(root);
    config.rules.extract_archives = true;
    config.rules.delete_archives = true;
    let (_tx, rx) = watch::channel(false);

    let summary = rule_orchestrator(config, None).run(&rx).await.unwrap();

    assert_eq!(summary.extracted, 0);
    assert_eq!(summary.errored(), 1);
    assert_eq!(summary.errors[0].kind, ErrorKind::Archive);
    assert!(root.join("Archives/broken.zip").exists());
    assert!(!root.join("broken").exists());
}

#[tokio::test]
async fn quarantined_duplicate_and_undo() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("inbox");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("a.txt"), b"same").unwrap();
    fs::write(root.join("b.txt"), b"same").unwrap();

    let mut config = config_for(&root);
    config.rules.duplicate_action = DuplicateAction::Quarantine;
    let history_path = dir.path().join("history.jsonl");
    let (_tx, rx) = watch::channel(false);

    let orchestrator = rule_orchestrator(config, Some(History::new(history_path.clone())));
    let summary = orchestrator.run(&rx).await.unwrap();

    assert_eq!(summary.duplicates, 1);
    assert!(root.join("Documents/a.txt").exists());
    assert!(root.join(".duplicates/b.txt").exists());
    assert!(!root.join("b.txt").exists());

    let history = History::new(history_path);
    let entries = history.get_undoable().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(history.undo(&entries[0]).unwrap(), UndoResult::Restored);
    assert!(root.join("a.txt").exists());
}

#[tokio::test]
async fn separate_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    let sorted = dir.path().join("sorted");
    fs::create_dir(&inbox).unwrap();
    fs::create_dir_all(inbox.join("nested/deeper")).unwrap();
    fs::write(inbox.join("nested/deeper/song.mp3"), b"ID3").unwrap();
    fs::write(inbox.join("main.rs"), b"fn main() {}").unwrap();

    let mut config = config_for(&inbox);
    config.output_dir = Some(sorted.to_string_lossy().to_string());
    config.rules.sort_by_type = true;
    let (_tx, rx) = watch::channel(false);

    let summary = rule_orchestrator(config, None).run(&rx).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert!(sorted.join("Audio/mp3/song.mp3").exists());
    assert!(sorted.join("Code/rs/main.rs").exists());
}

#[tokio::test]
async fn watch_cycle_sorts_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let mut config = config_for(&root);
    config.watch.debounce_ms = 50;
    config.watch.stability_timeout_secs = 0;
    let config = Arc::new(config);

    let orchestrator = Arc::new(
        Orchestrator::new(
            config.clone(),
            SmartSorter::new(Arc::new(RuleClassifier)),
            ArchiveHandler::default(),
            None,
            None,
        )
        .unwrap(),
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut coordinator = WatchCoordinator::new(config, orchestrator);
    let handle = tokio::spawn(async move {
        coordinator.run(events_rx, stop_rx).await.map(|_| coordinator)
    });

    let photo = root.join("IMG_0042.png");
    fs::write(&photo, b"\x89PNG").unwrap();
    events_tx.send(WatchEvent::created(&photo)).unwrap();

    let target = root.join("Images/IMG_0042.png");
    for _ in 0..50 {
        if target.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(target.exists());

    stop_tx.send(true).unwrap();
    let coordinator = handle.await.unwrap().unwrap();
    assert_eq!(coordinator.runs(), 1);
    assert_eq!(coordinator.state().tracked(), 1);
}
