//! CLI help output specs.

use crate::prelude::*;

#[test]
fn no_args_shows_usage() {
    cli().fails_with(2).stderr_has("Usage:");
}

#[test]
fn help_shows_usage() {
    cli().args(["--help"]).passes().stdout_has("Usage:");
}

#[test]
fn help_lists_noun_subcommands() {
    cli()
        .args(["--help"])
        .passes()
        .stdout_has("status")
        .stdout_has("job")
        .stdout_has("sandbox")
        .stdout_has("workspace")
        .stdout_has("exposure")
        .stdout_has("events");
}

#[test]
fn sandbox_help_shows_verbs() {
    cli()
        .args(["sandbox", "--help"])
        .passes()
        .stdout_has("start")
        .stdout_has("stop")
        .stdout_has("revert")
        .stdout_has("destroy");
}

#[test]
fn version_flag_reports_version() {
    cli().args(["--version"]).passes().stdout_has("0.1");
}
