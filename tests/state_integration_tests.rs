//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events for a full validate → patch → finish cycle
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads
//! - Keeps a patched folder blocked until another folder is selected

use camino::Utf8PathBuf;
use ptbr_installer::services::edition::{EditionDetector, TranslationLayout};
use ptbr_installer::services::readiness::{self, ReadinessFact, StaticFacts};
use ptbr_installer::services::{FailureKind, PatchPhase};
use ptbr_installer::{InstallerState, StateChange, StateManager};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{Duration, timeout};

const ALL_STATIC: StaticFacts = StaticFacts {
    tool_present: true,
    tool_dependency_present: true,
    asset_tree_present: true,
};

struct Fixture {
    _temp_dir: TempDir,
    game_dir: Utf8PathBuf,
    detector: EditionDetector,
}

fn create_fixture() -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let game_dir = root.join("Until Then");
    fs::create_dir_all(&game_dir).unwrap();
    fs::write(game_dir.join("UntilThen.pck"), b"small demo archive").unwrap();

    let detector = EditionDetector::new(
        "UntilThen.pck",
        1500,
        TranslationLayout {
            base: root.join("translation"),
            demo_subdir: "Demo".to_string(),
            full_subdir: "Full".to_string(),
            main_subdir: "main".to_string(),
        },
    );

    Fixture {
        _temp_dir: temp_dir,
        game_dir,
        detector,
    }
}

fn ready_manager(fixture: &Fixture) -> StateManager {
    let state = StateManager::with_state(InstallerState::new(ALL_STATIC, false));
    state.set_game_path(Some(fixture.game_dir.clone()));
    let validation = readiness::validate(Some(&fixture.game_dir), &ALL_STATIC, &fixture.detector);
    state.apply_validation(&validation);
    state
}

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<StateChange>) -> StateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_validation_events_emitted() {
    let fixture = create_fixture();
    let state = Arc::new(StateManager::with_state(InstallerState::new(ALL_STATIC, false)));
    let mut rx = state.subscribe();

    state.set_game_path(Some(fixture.game_dir.clone()));
    let validation = readiness::validate(Some(&fixture.game_dir), &ALL_STATIC, &fixture.detector);
    state.apply_validation(&validation);

    assert_eq!(
        next_event(&mut rx).await,
        StateChange::PathChanged {
            path: Some(fixture.game_dir.clone())
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::ReadinessChanged {
            ready: true,
            unmet: vec![]
        }
    );
    assert!(state.read(|s| s.can_apply()));
}

#[tokio::test]
async fn test_missing_archive_reports_unmet_facts() {
    let fixture = create_fixture();
    fs::remove_file(fixture.game_dir.join("UntilThen.pck")).unwrap();

    let state = StateManager::with_state(InstallerState::new(ALL_STATIC, false));
    state.set_game_path(Some(fixture.game_dir.clone()));
    let validation = readiness::validate(Some(&fixture.game_dir), &ALL_STATIC, &fixture.detector);
    let changes = state.apply_validation(&validation);

    // Static facts held before, so only the path-dependent ones are unmet and
    // readiness itself did not change
    assert!(changes.is_empty());
    assert_eq!(
        state.read(|s| s.readiness.unmet()),
        vec![ReadinessFact::ArchiveLocated, ReadinessFact::EditionDetected]
    );
    assert!(!state.read(|s| s.can_apply()));
    assert!(state.read(|s| s.last_validated_path.is_none()));
}

#[tokio::test]
async fn test_patch_cycle_events() {
    let fixture = create_fixture();
    let state = Arc::new(ready_manager(&fixture));
    let mut rx = state.subscribe();

    state.start_patch();
    assert_eq!(next_event(&mut rx).await, StateChange::PatchStarted);
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::ControlsLockChanged { locked: true }
    );

    state.set_progress(40);
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::ProgressUpdated { percent: 40 }
    );

    state.finish_patch(PatchPhase::Succeeded);
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::PatchFinished {
            phase: PatchPhase::Succeeded
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::ProgressUpdated { percent: 100 }
    );

    state.reset_session();
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::ProgressUpdated { percent: 0 }
    );
    assert_eq!(next_event(&mut rx).await, StateChange::StateReset);
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.set_keep_backup(true);

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        assert_eq!(next_event(rx).await, StateChange::SettingsChanged);
    }
}

#[test]
fn test_patched_folder_blocked_until_path_changes() {
    let fixture = create_fixture();
    let state = ready_manager(&fixture);

    state.start_patch();
    state.finish_patch(PatchPhase::Succeeded);
    state.reset_session();

    assert!(state.read(|s| s.already_patched()));
    assert!(!state.read(|s| s.can_apply()));

    // Re-selecting the same folder keeps the guard
    state.set_game_path(Some(fixture.game_dir.clone()));
    assert!(state.read(|s| s.already_patched()));

    state.set_game_path(Some(fixture.game_dir.join("..").join("Other")));
    assert!(!state.read(|s| s.already_patched()));
    assert!(state.read(|s| s.patch_applied_to_path.is_none()));
}

#[test]
fn test_failed_patch_allows_retry() {
    let fixture = create_fixture();
    let state = ready_manager(&fixture);

    state.start_patch();
    assert!(!state.read(|s| s.can_apply()));

    state.finish_patch(PatchPhase::Failed(FailureKind::Subprocess));
    state.reset_session();

    assert!(!state.read(|s| s.controls_locked));
    assert!(state.read(|s| s.can_apply()));
}

#[test]
fn test_concurrent_progress_updates() {
    let state = Arc::new(StateManager::new());
    state.start_patch();

    let handles: Vec<_> = (1..=8u8)
        .map(|i| {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                for step in 0..10u8 {
                    state.set_progress(i * 10 + step);
                    let _ = state.read(|s| s.progress);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let progress = state.read(|s| s.progress);
    assert!((10..=89).contains(&progress));
    assert!(state.read(|s| s.is_patching()));
}
