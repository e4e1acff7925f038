mod common;

use std::time::Duration;

use common::{FakeRemote, Op};
use refsync::refs::{RefSync, RefSyncError};
use refsync::remote::{Classify, ErrorClass, RefState};
use refsync::retry::{RetryCounter, RetryPolicy};
use tokio::time::Instant;

const SHA: &str = "0123456789abcdef0123456789abcdef01234567";
const OTHER_SHA: &str = "fedcba9876543210fedcba9876543210fedcba98";
const WAIT: Duration = Duration::from_millis(100);

fn sync(remote: FakeRemote) -> RefSync<FakeRemote> {
    RefSync::new(remote, RetryPolicy::fixed(3, Duration::from_millis(250)))
}

#[tokio::test(start_paused = true)]
async fn create_waits_until_branch_is_readable() {
    let sync = sync(FakeRemote::with_lag(3));
    let start = Instant::now();

    let created = sync
        .create_branch_and_verify("release", SHA, 10, WAIT)
        .await
        .expect("create");

    assert_eq!(created, Some(RefState::new("release", SHA)));
    assert_eq!(sync.api().calls(Op::CreateBranch), 1);
    // One pre-check read, then three polls until the write replicates.
    assert_eq!(sync.api().calls(Op::GetBranch), 4);
    assert_eq!(start.elapsed(), WAIT * 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_create_issues_one_create_call() {
    let sync = sync(FakeRemote::with_lag(2));

    let first = sync
        .create_branch_and_verify("release", SHA, 10, WAIT)
        .await
        .expect("first create");
    let second = sync
        .create_branch_and_verify("release", SHA, 10, WAIT)
        .await
        .expect("second create");

    assert_eq!(first, second);
    assert_eq!(sync.api().calls(Op::CreateBranch), 1);
}

#[tokio::test(start_paused = true)]
async fn create_over_branch_at_other_commit_is_rejected_by_remote() {
    let remote = FakeRemote::with_lag(0);
    remote.seed_branch("release", OTHER_SHA);
    let sync = sync(remote);

    let err = sync
        .create_branch_and_verify("release", SHA, 10, WAIT)
        .await
        .expect_err("branch exists elsewhere");

    assert_eq!(err.to_string(), "API error (400): Branch already exists");
    assert_eq!(sync.api().calls(Op::CreateBranch), 1);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_create_returns_none_but_may_still_land() {
    let sync = sync(FakeRemote::with_lag(10));

    let created = sync
        .create_branch_and_verify("release", SHA, 3, WAIT)
        .await
        .expect("create");

    assert_eq!(created, None);
    assert_eq!(sync.api().branch_commit("release").as_deref(), Some(SHA));

    let mut seen = None;
    for _ in 0..10 {
        seen = sync.get_branch("release").await.expect("read");
        if seen.is_some() {
            break;
        }
    }
    assert_eq!(seen, Some(RefState::new("release", SHA)));
}

#[tokio::test(start_paused = true)]
async fn create_retries_transient_failures() {
    let remote = FakeRemote::with_lag(1);
    remote
        .fail_next(Op::CreateBranch, 503)
        .fail_next(Op::CreateBranch, 504);
    let counter = RetryCounter::new();
    let sync = RefSync::new(
        remote,
        RetryPolicy::fixed(3, Duration::from_millis(250)).with_callback(counter.callback()),
    );
    let start = Instant::now();

    let created = sync
        .create_branch_and_verify("release", SHA, 5, WAIT)
        .await
        .expect("create");

    assert!(created.is_some());
    assert_eq!(sync.api().calls(Op::CreateBranch), 3);
    assert_eq!(counter.get(), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn create_does_not_retry_fatal_failures() {
    let remote = FakeRemote::with_lag(0);
    remote.fail_next(Op::CreateBranch, 403);
    let sync = sync(remote);
    let start = Instant::now();

    let err = sync
        .create_branch_and_verify("release", SHA, 5, WAIT)
        .await
        .expect_err("forbidden");

    match err {
        RefSyncError::Remote(e) => {
            assert_eq!(e.class(), ErrorClass::Fatal);
            assert!(e.suppressed().is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(sync.api().calls(Op::CreateBranch), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_keep_every_failure() {
    let remote = FakeRemote::with_lag(0);
    for status in [502, 503, 504, 502] {
        remote.fail_next(Op::CreateBranch, status);
    }
    let sync = sync(remote);

    let err = sync
        .create_branch_and_verify("release", SHA, 5, WAIT)
        .await
        .expect_err("retries exhausted");

    let RefSyncError::Remote(e) = err else {
        panic!("expected remote error");
    };
    assert_eq!(e.error().status(), Some(502));
    let suppressed: Vec<_> = e.suppressed().iter().filter_map(|s| s.status()).collect();
    assert_eq!(suppressed, vec![502, 503, 504]);
    assert_eq!(sync.api().calls(Op::CreateBranch), 4);
}

#[tokio::test(start_paused = true)]
async fn read_errors_other_than_not_found_propagate() {
    let remote = FakeRemote::with_lag(0);
    remote.fail_next(Op::GetBranch, 500);
    let sync = sync(remote);

    let err = sync.get_branch("main").await.expect_err("server error");
    assert!(matches!(err, RefSyncError::Remote(_)));
    assert!(!sync.branch_exists("main").await.expect("retry read"));
}

#[tokio::test(start_paused = true)]
async fn deleting_absent_branch_succeeds_without_polling() {
    let sync = sync(FakeRemote::with_lag(5));

    let deleted = sync
        .delete_branch_and_verify("gone", 10, WAIT)
        .await
        .expect("delete");

    assert!(deleted);
    assert_eq!(sync.api().calls(Op::DeleteBranch), 1);
    assert_eq!(sync.api().calls(Op::GetBranch), 0);
}

#[tokio::test(start_paused = true)]
async fn delete_polls_until_branch_disappears() {
    let remote = FakeRemote::with_lag(2);
    remote.seed_branch("feature", SHA);
    let sync = sync(remote);

    let deleted = sync
        .delete_branch_and_verify("feature", 10, WAIT)
        .await
        .expect("delete");

    assert!(deleted);
    assert_eq!(sync.api().calls(Op::GetBranch), 2);
    assert!(!sync.branch_exists("feature").await.expect("read"));
}

#[tokio::test(start_paused = true)]
async fn delete_with_zero_tries_reports_unconfirmed() {
    let remote = FakeRemote::with_lag(2);
    remote.seed_branch("feature", SHA);
    let sync = sync(remote);

    let deleted = sync
        .delete_branch_and_verify("feature", 0, WAIT)
        .await
        .expect("delete");

    assert!(!deleted);
    assert_eq!(sync.api().calls(Op::GetBranch), 0);
    assert_eq!(sync.api().branch_commit("feature"), None);
}

#[tokio::test(start_paused = true)]
async fn branch_from_source_waits_for_source() {
    let remote = FakeRemote::with_lag(2);
    let sync = sync(remote);

    // Source was created moments ago and is not yet readable.
    refsync::remote::RefApi::create_branch(sync.api(), "develop", SHA)
        .await
        .expect("seed source");

    let created = sync
        .create_branch_from_source_branch("feature", "develop", 10, WAIT)
        .await
        .expect("create");

    assert_eq!(created, Some(RefState::new("feature", SHA)));
    assert_eq!(sync.api().calls(Op::CreateBranch), 2);
}

#[tokio::test(start_paused = true)]
async fn branch_from_missing_source_creates_nothing() {
    let sync = sync(FakeRemote::with_lag(0));

    let created = sync
        .create_branch_from_source_branch("feature", "develop", 3, WAIT)
        .await
        .expect("no error");

    assert_eq!(created, None);
    assert_eq!(sync.api().calls(Op::CreateBranch), 0);
    assert_eq!(sync.api().calls(Op::GetBranch), 3);
}

#[tokio::test(start_paused = true)]
async fn protected_branch_from_tag() {
    let remote = FakeRemote::with_lag(1);
    remote.seed_tag("v1.0.0", SHA);
    let sync = sync(remote);

    let branch = sync
        .create_protected_branch_from_tag("release-1.0", "v1.0.0", 10, WAIT)
        .await
        .expect("create");

    assert_eq!(branch, RefState::new("release-1.0", SHA));
    assert!(sync.api().is_protected("release-1.0"));
    assert_eq!(sync.api().calls(Op::ProtectBranch), 1);
}

#[tokio::test(start_paused = true)]
async fn protected_branch_from_missing_tag_is_conflict() {
    let sync = sync(FakeRemote::with_lag(0));

    let err = sync
        .create_protected_branch_from_tag("release-1.0", "v1.0.0", 10, WAIT)
        .await
        .expect_err("missing tag");

    assert!(matches!(err, RefSyncError::Conflict { .. }));
    assert_eq!(sync.api().calls(Op::CreateBranch), 0);
}

#[tokio::test(start_paused = true)]
async fn protected_branch_is_not_protected_when_unconfirmed() {
    let remote = FakeRemote::with_lag(20);
    remote.seed_tag("v1.0.0", SHA);
    let sync = sync(remote);

    let err = sync
        .create_protected_branch_from_tag("release-1.0", "v1.0.0", 3, WAIT)
        .await
        .expect_err("not visible in time");

    assert!(matches!(err, RefSyncError::Unverified { .. }));
    assert_eq!(sync.api().calls(Op::ProtectBranch), 0);
}

#[tokio::test]
async fn tag_lookup_maps_not_found_to_none() {
    let remote = FakeRemote::with_lag(0);
    remote.seed_tag("v1.0.0", SHA);
    let sync = sync(remote);

    assert!(sync.tag_exists("v1.0.0").await.expect("read"));
    assert_eq!(sync.get_tag("v2.0.0").await.expect("read"), None);
}
