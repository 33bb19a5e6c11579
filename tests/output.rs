use serde::Serialize;
use serde_json::Value;
use task_tracker::error::Error;
use task_tracker::output::{error_json, format_human, success_json, HumanOutput};

#[derive(Serialize)]
struct Sample {
    id: String,
    count: usize,
}

#[test]
fn format_human_includes_sections() {
    let mut human = HumanOutput::new("Task added");
    human.push_summary("ID", "01-setup");
    human.push_detail("created .claude/tasks/01-setup.md");
    human.push_warning("02-api still depends on removed task 01-setup");
    human.push_next_step("task start 01-setup");

    let rendered = format_human(&human);
    assert!(rendered.contains("Task added"));
    assert!(rendered.contains("Summary:"));
    assert!(rendered.contains("- ID: 01-setup"));
    assert!(rendered.contains("Details:"));
    assert!(rendered.contains("Warnings:"));
    assert!(rendered.contains("Next steps:"));
    assert!(rendered.contains("- task start 01-setup"));
}

#[test]
fn format_human_omits_empty_sections() {
    let human = HumanOutput::new("0 task(s)");
    assert_eq!(format_human(&human), "0 task(s)");
}

#[test]
fn success_json_flattens_data() {
    let data = Sample {
        id: "01-setup".to_string(),
        count: 2,
    };
    let value: Value =
        serde_json::from_str(&success_json(&data, &[]).expect("json")).expect("parse");
    assert_eq!(value["ok"], Value::Bool(true));
    assert_eq!(value["id"], "01-setup");
    assert_eq!(value["count"], 2);
    assert!(value.get("warnings").is_none());
}

#[test]
fn success_json_includes_warnings_when_present() {
    let data = Sample {
        id: "01-setup".to_string(),
        count: 0,
    };
    let warnings = vec!["skipped 02-bad".to_string()];
    let value: Value =
        serde_json::from_str(&success_json(&data, &warnings).expect("json")).expect("parse");
    assert_eq!(value["warnings"][0], "skipped 02-bad");
}

#[test]
fn error_json_is_failure_envelope() {
    let err = Error::NotFound("04-gone".to_string());
    let value: Value = serde_json::from_str(&error_json(&err).expect("json")).expect("parse");
    assert_eq!(value["ok"], Value::Bool(false));
    assert_eq!(value["kind"], "not_found");
    assert_eq!(value["error"], "Task not found: 04-gone");
}
