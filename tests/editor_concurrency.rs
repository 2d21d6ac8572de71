//! Concurrent use of one editor instance.

use civic_board::{
    BoardConfig, Category, DocumentStore, Editor, EditorState, MemoryStore, NewRecord, OrderBy,
    Record, RecordId, RecordPatch, Repository, Selection, StoreResult, SubmitOutcome,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Store whose writes block until the test releases them.
struct GatedStore {
    inner: MemoryStore,
    entered: Sender<()>,
    release: Receiver<()>,
    writes: AtomicUsize,
}

impl GatedStore {
    fn gate(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let _ = self.entered.send(());
        let _ = self.release.recv();
    }
}

impl DocumentStore for GatedStore {
    fn create_record(&self, payload: &NewRecord) -> StoreResult<RecordId> {
        self.gate();
        self.inner.create_record(payload)
    }

    fn list_records(&self, order: OrderBy) -> StoreResult<Vec<Record>> {
        self.inner.list_records(order)
    }

    fn update_record(&self, id: &RecordId, patch: &RecordPatch) -> StoreResult<()> {
        self.gate();
        self.inner.update_record(id, patch)
    }

    fn delete_record(&self, id: &RecordId) -> StoreResult<()> {
        self.gate();
        self.inner.delete_record(id)
    }
}

fn gated() -> (Arc<GatedStore>, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = bounded(16);
    let (release_tx, release_rx) = bounded(16);
    let store = Arc::new(GatedStore {
        inner: MemoryStore::new(),
        entered: entered_tx,
        release: release_rx,
        writes: AtomicUsize::new(0),
    });
    (store, entered_rx, release_tx)
}

#[test]
fn test_double_submit_writes_once() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (store, entered, release) = gated();
    let config = BoardConfig::default();
    let repository = Arc::new(Repository::new(config.clone(), store.clone()));
    let editor = Arc::new(Editor::new(&config));

    editor.open_for_create(Selection::Only(Category::CivilDefense));
    editor.update_fields(|f| {
        f.title = "Alagamento".into();
        f.body = "Rua inundada".into();
    });

    let first = {
        let (editor, repository) = (editor.clone(), repository.clone());
        thread::spawn(move || editor.submit(&repository))
    };

    // Wait until the first submit is inside the store
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(editor.is_submitting());
    assert!(!editor.close());

    let second = {
        let (editor, repository) = (editor.clone(), repository.clone());
        thread::spawn(move || editor.submit(&repository))
    };
    assert_eq!(
        second.join().unwrap().unwrap(),
        SubmitOutcome::AlreadySubmitting
    );
    assert_eq!(
        editor.submit(&repository).unwrap(),
        SubmitOutcome::AlreadySubmitting
    );

    release.send(()).unwrap();
    let outcome = first.join().unwrap().unwrap();
    assert!(matches!(outcome, SubmitOutcome::Saved(_)));

    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner.len(), 1);
    assert_eq!(repository.len(), 1);
    assert_eq!(editor.state(), EditorState::Closed);
}

#[test]
fn test_many_racing_submits_write_once() {
    let (store, entered, release) = gated();
    let config = BoardConfig::default();
    let repository = Arc::new(Repository::new(config.clone(), store.clone()));
    let editor = Arc::new(Editor::new(&config));

    editor.open_for_create(Selection::All);
    editor.update_fields(|f| {
        f.title = "t".into();
        f.body = "b".into();
    });

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (editor, repository) = (editor.clone(), repository.clone());
            thread::spawn(move || editor.submit(&repository))
        })
        .collect();

    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    release.send(()).unwrap();

    let outcomes: Vec<SubmitOutcome> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    let saved = outcomes
        .iter()
        .filter(|o| matches!(o, SubmitOutcome::Saved(_)))
        .count();
    assert_eq!(saved, 1);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}
