use std::path::PathBuf;

use serde_json::Value;
use task_tracker::error::{exit_codes, Error, JsonError};

#[test]
fn every_error_exits_with_failure() {
    let errors = [
        Error::NotFound("01-missing".to_string()),
        Error::Validation("bad input".to_string()),
        Error::Structural("no index".to_string()),
        Error::InvalidConfig("bad config".to_string()),
    ];
    for err in errors {
        assert_eq!(err.exit_code(), exit_codes::FAILURE);
    }
}

#[test]
fn kinds_are_stable_tags() {
    assert_eq!(Error::NotFound("x".to_string()).kind(), "not_found");
    assert_eq!(Error::format("a.md", "bad").kind(), "format");
    assert_eq!(
        Error::LockFailed(PathBuf::from(".claude/tasks/.lock")).kind(),
        "lock_failed"
    );
    let io = Error::from(std::io::Error::other("disk full"));
    assert_eq!(io.kind(), "operation_failed");
}

#[test]
fn details_include_ambiguous_candidates() {
    let err = Error::AmbiguousReference {
        input: "3".to_string(),
        candidates: vec!["03-api".to_string(), "03-cli".to_string()],
    };
    let details = err.details().expect("details");
    assert_eq!(details["input"], Value::String("3".to_string()));
    assert_eq!(details["candidates"][1], Value::String("03-cli".to_string()));
    assert!(err.to_string().contains("03-api, 03-cli"));
}

#[test]
fn json_error_carries_kind_and_message() {
    let err = Error::format("tasks/01-x.md", "missing header fence");
    let json = serde_json::to_value(JsonError::from(&err)).expect("serialize");
    assert_eq!(json["ok"], Value::Bool(false));
    assert_eq!(json["kind"], "format");
    assert_eq!(json["details"]["path"], "tasks/01-x.md");
    assert!(json["error"]
        .as_str()
        .unwrap_or("")
        .contains("missing header fence"));
}

#[test]
fn json_error_omits_empty_details() {
    let err = Error::Validation("title cannot be empty".to_string());
    let json = serde_json::to_value(JsonError::from(&err)).expect("serialize");
    assert!(json.get("details").is_none());
}
