// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::strategies::arb_pidfile_contents;
use proptest::prelude::*;

#[test]
fn missing_file_is_not_yet_run() {
    let contents = PidfileContents::parse("drone1", None).unwrap();
    assert_eq!(contents.state(), RunState::NotYetRun);
}

#[test]
fn empty_file_is_not_yet_run() {
    let contents = PidfileContents::parse("drone1", Some("")).unwrap();
    assert_eq!(contents, PidfileContents::default());
}

#[test]
fn pid_only_is_running() {
    let contents = PidfileContents::parse("drone1", Some("123\n")).unwrap();
    assert_eq!(contents.state(), RunState::Running);
    assert_eq!(contents.process, Some(Process::new("drone1", 123)));
}

#[test]
fn full_file_is_exited() {
    let contents = PidfileContents::parse("drone1", Some("123\n1\n4\n")).unwrap();
    assert_eq!(contents.state(), RunState::Exited { exit_status: 1, num_tests_failed: 4 });
}

#[yare::parameterized(
    bad_pid      = { "abc\n",         PidfileError::BadNumber { line: 0, value: "abc".into() } },
    bad_status   = { "12\nx\n0\n",    PidfileError::BadNumber { line: 1, value: "x".into() } },
    no_count     = { "12\n0\n",       PidfileError::MissingTestCount },
    four_lines   = { "1\n2\n3\n4\n",  PidfileError::TooManyLines(4) },
)]
fn malformed_pidfiles(text: &str, expected: PidfileError) {
    assert_eq!(PidfileContents::parse("d", Some(text)), Err(expected));
}

#[test]
fn pidfile_id_display_is_path() {
    let id = PidfileId::new("/drone/results/1-me/host1/.autoserv_execute");
    assert_eq!(id.to_string(), "/drone/results/1-me/host1/.autoserv_execute");
}

proptest! {
    #[test]
    fn written_contents_parse_back(contents in arb_pidfile_contents()) {
        let drone = contents.process.as_ref().map(|p| p.drone.clone()).unwrap_or_default();
        let parsed = PidfileContents::parse(&drone, Some(&contents.to_file_text())).unwrap();
        prop_assert_eq!(parsed, contents);
    }
}
