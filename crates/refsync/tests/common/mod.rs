//! In-memory remote with eventually consistent branch reads.
//!
//! Writes land immediately in the authoritative state, but `get_branch`
//! only observes them after `lag` further reads. Failures can be queued per
//! operation and are served before the operation does any work.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use refsync::remote::{BranchInfo, CommitInfo, Page, RefApi, RefState, RemoteError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetBranch,
    CreateBranch,
    DeleteBranch,
    GetTag,
    ProtectBranch,
    ListBranches,
    ListCommits,
}

enum Change {
    Upsert(String, String),
    Remove(String),
}

struct Pending {
    change: Change,
    reads_left: u32,
}

#[derive(Default)]
struct State {
    lag: u32,
    truth: HashMap<String, String>,
    visible: HashMap<String, String>,
    pending: Vec<Pending>,
    tags: HashMap<String, String>,
    protected: HashSet<String>,
    commits: Vec<CommitInfo>,
    report_totals: bool,
    failures: HashMap<Op, VecDeque<u16>>,
    calls: HashMap<Op, u32>,
}

impl State {
    fn enter(&mut self, op: Op) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(status) => Err(RemoteError::api(status, format!("injected {status}"))),
            None => Ok(()),
        }
    }

    fn publish(&mut self, change: Change) {
        if self.lag == 0 {
            apply(&mut self.visible, change);
        } else {
            let reads_left = self.lag;
            self.pending.push(Pending { change, reads_left });
        }
    }

    /// Advance replication by one read.
    fn tick(&mut self) {
        for p in &mut self.pending {
            p.reads_left = p.reads_left.saturating_sub(1);
        }
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.reads_left == 0);
        self.pending = waiting;
        for p in ready {
            apply(&mut self.visible, p.change);
        }
    }
}

fn apply(map: &mut HashMap<String, String>, change: Change) {
    match change {
        Change::Upsert(name, commit) => {
            map.insert(name, commit);
        }
        Change::Remove(name) => {
            map.remove(&name);
        }
    }
}

#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
}

impl FakeRemote {
    /// A remote where branch writes become readable after `lag` reads.
    pub fn with_lag(lag: u32) -> Self {
        let remote = Self::default();
        remote.state().lag = lag;
        remote
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake remote lock poisoned")
    }

    /// Seed a branch that is already visible.
    pub fn seed_branch(&self, name: &str, commit: &str) -> &Self {
        let mut state = self.state();
        state.truth.insert(name.to_string(), commit.to_string());
        state.visible.insert(name.to_string(), commit.to_string());
        drop(state);
        self
    }

    pub fn seed_tag(&self, name: &str, commit: &str) -> &Self {
        self.state().tags.insert(name.to_string(), commit.to_string());
        self
    }

    /// Seed `count` commits, newest first, ids `c000`, `c001`, ...
    pub fn seed_commits(&self, count: usize, report_totals: bool) -> &Self {
        let mut state = self.state();
        state.commits = (0..count)
            .map(|i| CommitInfo {
                id: format!("c{i:03}"),
                short_id: format!("c{i:03}"),
                title: format!("Commit {i}"),
                author_name: "Jane Doe".to_string(),
                committed_at: None,
            })
            .collect();
        state.report_totals = report_totals;
        drop(state);
        self
    }

    /// Fail the next call of `op` with `status`. Queued failures are served
    /// in order.
    pub fn fail_next(&self, op: Op, status: u16) -> &Self {
        self.state().failures.entry(op).or_default().push_back(status);
        self
    }

    pub fn calls(&self, op: Op) -> u32 {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Authoritative commit of a branch, regardless of read lag.
    pub fn branch_commit(&self, name: &str) -> Option<String> {
        self.state().truth.get(name).cloned()
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.state().protected.contains(name)
    }
}

#[async_trait]
impl RefApi for FakeRemote {
    async fn get_branch(&self, name: &str) -> Result<RefState> {
        let mut state = self.state();
        state.enter(Op::GetBranch)?;
        state.tick();
        state
            .visible
            .get(name)
            .map(|commit| RefState::new(name, commit.as_str()))
            .ok_or_else(|| RemoteError::not_found(format!("404 Branch Not Found: {name}")))
    }

    async fn create_branch(&self, name: &str, commit_id: &str) -> Result<RefState> {
        let mut state = self.state();
        state.enter(Op::CreateBranch)?;
        if state.truth.contains_key(name) {
            return Err(RemoteError::api(400, "Branch already exists"));
        }
        state.truth.insert(name.to_string(), commit_id.to_string());
        state.publish(Change::Upsert(name.to_string(), commit_id.to_string()));
        Ok(RefState::new(name, commit_id))
    }

    async fn delete_branch(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.enter(Op::DeleteBranch)?;
        if state.truth.remove(name).is_none() {
            return Err(RemoteError::not_found(format!("404 Branch Not Found: {name}")));
        }
        state.publish(Change::Remove(name.to_string()));
        Ok(())
    }

    async fn get_tag(&self, name: &str) -> Result<RefState> {
        let mut state = self.state();
        state.enter(Op::GetTag)?;
        state
            .tags
            .get(name)
            .map(|commit| RefState::new(name, commit.as_str()))
            .ok_or_else(|| RemoteError::not_found(format!("404 Tag Not Found: {name}")))
    }

    async fn protect_branch(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.enter(Op::ProtectBranch)?;
        if !state.truth.contains_key(name) {
            return Err(RemoteError::not_found(format!("404 Branch Not Found: {name}")));
        }
        state.protected.insert(name.to_string());
        Ok(())
    }

    async fn list_branches_page(&self, page: u32, per_page: u32) -> Result<Page<BranchInfo>> {
        let mut state = self.state();
        state.enter(Op::ListBranches)?;
        let mut branches: Vec<BranchInfo> = state
            .visible
            .iter()
            .map(|(name, commit)| BranchInfo {
                name: name.clone(),
                commit_id: commit.clone(),
                protected: state.protected.contains(name),
                default: name == "main",
            })
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(slice_page(branches, page, per_page, true))
    }

    async fn list_commits_page(
        &self,
        _ref_name: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<CommitInfo>> {
        let mut state = self.state();
        state.enter(Op::ListCommits)?;
        let commits = state.commits.clone();
        let report_totals = state.report_totals;
        Ok(slice_page(commits, page, per_page, report_totals))
    }
}

fn slice_page<T>(all: Vec<T>, page: u32, per_page: u32, report_totals: bool) -> Page<T> {
    let total = all.len();
    let per = per_page.max(1) as usize;
    let start = (page.saturating_sub(1) as usize).saturating_mul(per);
    let items: Vec<T> = all.into_iter().skip(start).take(per).collect();
    let has_next = start + per < total;

    let page = Page::new(items, page, per_page, has_next);
    if report_totals {
        page.with_totals(total as u64, total.div_ceil(per) as u32)
    } else {
        page
    }
}
