//! Capturing and restoring controllers.

mod common;

use common::*;
use flagstate::checkpoint::SNAPSHOT_VERSION;
use flagstate::{ControllerSnapshot, SnapshotError};

#[test]
fn snapshot_captures_configuration_and_flags() {
    let (controller, _) = controller_with(RecorderFactory {
        saved: Some(vec![7]),
        ..RecorderFactory::default()
    });
    controller.set_state_stack_enabled(true).unwrap();
    controller.set_max_state_stack_size(3).unwrap();
    controller.lock_event(&[4]).unwrap();
    controller
        .set_share_state_param(Some("share".to_string()))
        .unwrap();
    controller.add_state(EAT | WORK, None).unwrap();
    controller.add_global_state(SLEEP, None).unwrap();

    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert!(!snapshot.id.is_empty());
    assert_eq!(snapshot.current_flags, EAT | WORK);
    assert_eq!(snapshot.global_flags, SLEEP);
    assert_eq!(snapshot.max_stack_size, 3);
    assert_eq!(snapshot.locked_events, vec![4]);
    assert_eq!(snapshot.current_saves.get(&EAT), Some(&vec![7]));
    assert_eq!(snapshot.global_saves.len(), 1);
}

#[test]
fn restore_rebuilds_states_and_hands_back_blobs() {
    let (source, _) = controller_with(RecorderFactory {
        saved: Some(vec![1, 2]),
        ..RecorderFactory::default()
    });
    source.set_state_cache_enabled(true).unwrap();
    source.lock_event(&[8, 9]).unwrap();
    source.add_state(EAT | WORK, None).unwrap();
    source.add_global_state(SLEEP, None).unwrap();
    let json = source.snapshot().unwrap().to_json().unwrap();

    let (target, factory) = controller();
    let snapshot = ControllerSnapshot::<String>::from_json(&json).unwrap();
    target.restore(&snapshot).unwrap();

    assert_eq!(target.current_state_flags().unwrap(), EAT | WORK);
    assert_eq!(target.global_state_flags().unwrap(), SLEEP);
    assert!(target.is_state_cache_enabled().unwrap());
    assert_eq!(target.locked_events().unwrap(), vec![8, 9]);
    assert_eq!(
        take(&factory.log),
        vec![
            "enter:Sleep:1",
            "enter:Work:1",
            "enter:Eat:1",
            "restore:Sleep:Some([1, 2])",
            "restore:Work:Some([1, 2])",
            "restore:Eat:Some([1, 2])",
        ]
    );
}

#[test]
fn restore_replaces_existing_states() {
    let (source, _) = controller();
    source.add_state(SLEEP, None).unwrap();
    let bytes = source.snapshot().unwrap().to_bytes().unwrap();

    let (target, factory) = controller();
    target.add_state(EAT, None).unwrap();
    target.add_global_state(WORK, None).unwrap();
    take(&factory.log);

    let snapshot = ControllerSnapshot::<String>::from_bytes(&bytes).unwrap();
    target.restore(&snapshot).unwrap();

    assert_eq!(target.current_state_flags().unwrap(), SLEEP);
    assert_eq!(target.global_state_flags().unwrap(), 0);
    assert_eq!(
        take(&factory.log),
        vec![
            "exit:Work",
            "dispose:Work",
            "exit:Eat",
            "dispose:Eat",
            "enter:Sleep:1",
            "restore:Sleep:None",
        ]
    );
}

#[test]
fn snapshots_from_other_versions_are_rejected() {
    let (controller, _) = controller();
    let mut snapshot = controller.snapshot().unwrap();
    snapshot.version = SNAPSHOT_VERSION + 1;
    let json = snapshot.to_json().unwrap();

    assert!(matches!(
        ControllerSnapshot::<String>::from_json(&json),
        Err(SnapshotError::UnsupportedVersion { .. })
    ));
}
