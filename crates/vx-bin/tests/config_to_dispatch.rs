use core_actions::{CommandStateMachine, DispatchResult, MachineError, Session};
use core_config::{CONFIG_FILE_NAME, load_from};
use pretty_assertions::assert_eq;
use std::fs;

// Configuration file on disk through to dispatched commands.
#[test]
fn configured_mappings_drive_the_machine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &path,
        r#"
[input]
timeoutlen = 300

[[mappings]]
mode = "insert"
lhs = "jk"
rhs = "<esc>"

[[mappings]]
lhs = "<space>w"
rhs = ":focus-pane-next"
"#,
    )
    .unwrap();

    let config = load_from(Some(path)).unwrap();
    let mut session = Session::from_config(&config).unwrap();
    assert_eq!(session.input.timeoutlen, 300);
    let mut machine = CommandStateMachine::new();

    let results = machine.feed_notation(&mut session, "ijk").unwrap();
    match results.last() {
        Some(DispatchResult::Dispatched(cmd)) => assert_eq!(cmd.name, "enter-normal-mode"),
        other => panic!("unexpected {other:?}"),
    }

    let results = machine.feed_notation(&mut session, "<space>w").unwrap();
    match results.last() {
        Some(DispatchResult::Dispatched(cmd)) => assert_eq!(cmd.name, "focus-pane-next"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn invalid_mapping_in_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &path,
        "[[mappings]]\nlhs = \"Q\"\nrhs = \":no-such-command\"\n",
    )
    .unwrap();

    let config = load_from(Some(path)).unwrap();
    match Session::from_config(&config) {
        Err(MachineError::InvalidMapping { index, lhs, .. }) => {
            assert_eq!(index, 0);
            assert_eq!(lhs, "Q");
        }
        other => panic!("expected invalid mapping, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "[input\ntimeout = ").unwrap();
    let config = load_from(Some(path)).unwrap();
    let session = Session::from_config(&config).unwrap();
    assert!(session.input.timeout);
    assert_eq!(session.input.timeoutlen, 1000);
}
