//! Error conversions and messages of the shared error type.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use taskweave_core::*;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// 1. Foreign errors convert through `?`
// ---------------------------------------------------------------------------

fn parse_json(input: &str) -> TaskweaveResult<serde_json::Value> {
    Ok(serde_json::from_str(input)?)
}

fn read_missing() -> TaskweaveResult<Vec<u8>> {
    Ok(std::fs::read("/definitely/not/a/real/taskweave/path")?)
}

#[test]
fn json_error_converts() {
    let err = parse_json("{not json").unwrap_err();
    assert!(matches!(err, TaskweaveError::Json(_)));
    assert!(err.to_string().starts_with("JSON error"));
}

#[test]
fn io_error_converts() {
    let err = read_missing().unwrap_err();
    assert!(matches!(err, TaskweaveError::Io(_)));
}

// ---------------------------------------------------------------------------
// 2. Construction-time errors carry the offending ids
// ---------------------------------------------------------------------------

#[test]
fn invalid_dependency_mentions_both_ids() {
    let task = Uuid::new_v4();
    let dependency = Uuid::new_v4();
    let err = TaskweaveError::InvalidDependency { task, dependency };
    let msg = err.to_string();
    assert!(msg.contains(&task.to_string()));
    assert!(msg.contains(&dependency.to_string()));
    assert!(!err.is_task_level());
}

#[test]
fn unknown_dependency_mentions_names() {
    let err = TaskweaveError::UnknownDependency {
        task: "review".into(),
        name: "tests".into(),
    };
    assert_eq!(
        err.to_string(),
        "Unknown dependency: task 'review' depends on undefined task 'tests'"
    );
}

#[test]
fn invalid_transition_is_readable() {
    let task = Uuid::new_v4();
    let err = TaskweaveError::InvalidTransition {
        task,
        from: "completed".into(),
        to: "in_progress".into(),
    };
    assert!(err.to_string().ends_with("completed -> in_progress"));
}
