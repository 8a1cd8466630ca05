//! Two instances racing for the same chain position.

mod common;

use common::{
    commit_and_push, engine, pushed_link, HookStore, MemoryEngine, StickyStore, ALWAYS_FINAL,
};
use reposync_engine::{PushOutcome, SyncError};
use reposync_storage::InMemoryBlobStore;
use std::path::Path;
use std::sync::mpsc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::tempdir;

const BASE: [&str; 4] = ["base 1", "base 2", "base 3", "base 4"];

struct Race {
    store: Arc<InMemoryBlobStore>,
    a: MemoryEngine<HookStore>,
    b: Arc<MemoryEngine<Arc<InMemoryBlobStore>>>,
    b_result: mpsc::Receiver<Result<PushOutcome, SyncError>>,
}

/// Both instances hold links 1 to 4 and one local commit each, so both push
/// position 5. B's whole push runs inside A's next upload, before or after
/// A's object lands.
fn race(root: &Path, b_lands_first: bool) -> Race {
    let store = Arc::new(InMemoryBlobStore::new());
    let seed = engine("seed", store.clone(), root, ALWAYS_FINAL);
    for message in BASE {
        commit_and_push(&seed, &[message]);
    }

    let b = Arc::new(engine("b", store.clone(), root, ALWAYS_FINAL));
    assert_eq!(b.pull().unwrap(), BASE.len());
    b.repo().commit("from b").unwrap();

    let (tx, b_result) = mpsc::channel();
    let racer = b.clone();
    let hooked = HookStore::new(
        store.clone(),
        b_lands_first,
        Box::new(move || {
            let _ = tx.send(racer.push());
        }),
    );
    let a = engine("a", hooked, root, ALWAYS_FINAL);
    assert_eq!(a.pull().unwrap(), BASE.len());
    a.repo().commit("from a").unwrap();

    Race {
        store,
        a,
        b,
        b_result,
    }
}

#[test]
fn later_upload_evicts_itself() {
    let dir = tempdir().unwrap();
    let race = race(dir.path(), true);
    let before = race.a.local_state().unwrap();

    let (uploaded, canonical_tail) = match race.a.push() {
        Err(SyncError::Conflict {
            uploaded,
            canonical_tail,
        }) => (uploaded, canonical_tail),
        other => panic!("expected Conflict, got {other:?}"),
    };
    let (b_link, b_name) = pushed_link(race.b_result.recv().unwrap().unwrap());

    assert_eq!(b_link.position(), (5, 1));
    assert_eq!(canonical_tail, Some(b_name.clone()));
    assert!(!race.store.contains(&uploaded));
    assert!(race.store.contains(&b_name));
    assert_eq!(race.a.local_state().unwrap(), before);
    assert!(!race.a.state_store().lease_exists());
}

#[test]
fn earlier_upload_wins_and_loser_is_deleted() {
    let dir = tempdir().unwrap();
    let race = race(dir.path(), false);

    let (a_link, a_name) = pushed_link(race.a.push().unwrap());
    assert_eq!(a_link.position(), (5, 1));

    let uploaded = match race.b_result.recv().unwrap() {
        Err(SyncError::Conflict {
            uploaded,
            canonical_tail,
        }) => {
            assert_eq!(canonical_tail, Some(a_name.clone()));
            uploaded
        }
        other => panic!("expected Conflict, got {other:?}"),
    };
    assert!(!race.store.contains(&uploaded));
    assert_eq!(race.store.len(), BASE.len() + 1);
    assert!(race.store.contains(&a_name));
}

#[test]
fn loser_pulls_then_pushes_on_top() {
    let dir = tempdir().unwrap();
    let race = race(dir.path(), true);
    let err = race.a.push().unwrap_err();
    assert!(err.is_conflict());
    assert!(err.is_retryable_after_pull());
    race.b_result.recv().unwrap().unwrap();

    assert_eq!(race.a.pull().unwrap(), 1);
    assert_eq!(
        race.a.repo().history(),
        vec!["base 1", "base 2", "base 3", "base 4", "from b", "from a"]
    );

    let (link, _) = pushed_link(race.a.push().unwrap());
    assert_eq!(link.position(), (6, 1));

    assert_eq!(race.b.pull().unwrap(), 1);
    assert_eq!(race.b.repo().history(), race.a.repo().history());
}

#[test]
fn next_verified_push_collects_a_stuck_loser() {
    let dir = tempdir().unwrap();
    let store = Arc::new(InMemoryBlobStore::new());
    let a = engine("a", store.clone(), dir.path(), ALWAYS_FINAL);
    for message in BASE {
        commit_and_push(&a, &[message]);
    }

    let sticky = StickyStore::new(store.clone());
    sticky.refuse_deletes.store(true, Ordering::SeqCst);
    let b = engine("b", sticky, dir.path(), ALWAYS_FINAL);
    assert_eq!(b.pull().unwrap(), BASE.len());
    b.repo().commit("from b").unwrap();

    // A takes position 5 while B still believes 4 is the tail.
    let (a_link, a_name) = commit_and_push(&a, &["from a"]);
    assert_eq!(a_link.position(), (5, 1));

    let uploaded = match b.push() {
        Err(SyncError::Conflict {
            uploaded,
            canonical_tail,
        }) => {
            assert_eq!(canonical_tail, Some(a_name.clone()));
            uploaded
        }
        other => panic!("expected Conflict, got {other:?}"),
    };
    assert!(store.contains(&uploaded));
    assert_eq!(store.len(), BASE.len() + 2);

    a.repo().commit("a again").unwrap();
    match a.push().unwrap() {
        PushOutcome::Pushed {
            link, collected, ..
        } => {
            assert_eq!(link.position(), (6, 1));
            assert!(collected >= 1);
        }
        PushOutcome::UpToDate => panic!("expected a push, got UpToDate"),
    }
    assert!(!store.contains(&uploaded));
    assert!(store.contains(&a_name));
    assert_eq!(store.len(), BASE.len() + 2);
}
