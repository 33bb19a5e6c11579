mod support;

use predicates::str::contains;

#[test]
fn task_help_works() {
    support::task_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("durable task memory"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init", "add", "remove", "update", "list", "show", "next", "start", "done", "block",
        "unblock", "note", "notes", "move", "render",
    ];

    for cmd in subcommands {
        support::task_cmd()
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn commands_outside_a_store_fail_with_hint() {
    let project = support::TestProject::new();
    project
        .cmd()
        .args(["list", "--human"])
        .assert()
        .code(1)
        .stderr(contains("task init"));
}
