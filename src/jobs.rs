//! The Job Table: an ordered collection of live jobs keyed by small integer
//! job ids, shared between the main loop and the child-status reaper.
//!
//! The table never blocks and never touches the process group it describes
//! beyond recording identifiers — callers are responsible for serializing
//! access against the reaper by blocking the child-status signal (see
//! [`crate::signals`]) around any critical section that reads or mutates it.

use crate::parser::Command;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Foreground,
    Background,
    Stopped,
}

/// One pipeline submitted by the user, tracked from fork until every
/// process in its group has exited.
pub struct Job {
    pub jid: usize,
    /// Process-group id shared by every process in the pipeline; equals the
    /// pid of the first-forked child.
    pub pgrp: libc::pid_t,
    pub status: JobStatus,
    pub commands: Vec<Command>,
    pub bg_marker: bool,
}

impl Job {
    /// The full argument vector of the pipeline's first stage, joined by
    /// spaces, for the `jobs`/`Stopped`/`Running` display lines.
    pub fn display_argv(&self) -> String {
        match self.commands.first() {
            Some(cmd) => cmd.argv.join(" "),
            None => String::new(),
        }
    }
}

/// Ordered sequence of live jobs, in insertion order. Every operation is
/// synchronous and non-blocking.
#[derive(Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Job id the next `append`ed job should use: `last.jid + 1` when the
    /// table is non-empty, otherwise 1. Ids are never reused while their
    /// job is live; removed ids may recur.
    pub fn next_jid(&self) -> usize {
        match self.jobs.last() {
            Some(job) => job.jid + 1,
            None => 1,
        }
    }

    pub fn append(&mut self, job: Job) {
        self.jobs.push(job);
    }

    pub fn remove(&mut self, jid: usize) -> Option<Job> {
        let index = self.jobs.iter().position(|j| j.jid == jid)?;
        Some(self.jobs.remove(index))
    }

    pub fn find(&self, jid: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.jid == jid)
    }

    pub fn find_mut(&mut self, jid: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.jid == jid)
    }

    pub fn find_by_pgrp(&self, pgrp: libc::pid_t) -> Option<&Job> {
        self.jobs.iter().find(|j| j.pgrp == pgrp)
    }

    pub fn find_by_pgrp_mut(&mut self, pgrp: libc::pid_t) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.pgrp == pgrp)
    }

    /// Remove and return the job whose `pgrp == pid`, if any.
    pub fn remove_by_pgrp(&mut self, pgrp: libc::pid_t) -> Option<Job> {
        let index = self.jobs.iter().position(|j| j.pgrp == pgrp)?;
        Some(self.jobs.remove(index))
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Command;

    fn make_job(jid: usize, pgrp: libc::pid_t, status: JobStatus) -> Job {
        Job {
            jid,
            pgrp,
            status,
            commands: vec![Command {
                argv: vec!["sleep".to_string(), "30".to_string()],
                input_redirect: None,
                output_redirect: None,
                append: false,
            }],
            bg_marker: status != JobStatus::Foreground,
        }
    }

    #[test]
    fn next_jid_starts_at_one() {
        let table = JobTable::new();
        assert_eq!(table.next_jid(), 1);
    }

    #[test]
    fn next_jid_is_last_plus_one() {
        let mut table = JobTable::new();
        table.append(make_job(1, 100, JobStatus::Background));
        table.append(make_job(2, 200, JobStatus::Background));
        assert_eq!(table.next_jid(), 3);
    }

    #[test]
    fn next_jid_resets_when_table_empties() {
        let mut table = JobTable::new();
        table.append(make_job(1, 100, JobStatus::Background));
        table.remove(1);
        assert!(table.is_empty());
        assert_eq!(table.next_jid(), 1);
    }

    #[test]
    fn jids_are_not_reused_while_live_but_may_recur_after_removal() {
        let mut table = JobTable::new();
        table.append(make_job(1, 100, JobStatus::Background));
        table.append(make_job(2, 200, JobStatus::Background));
        table.remove(1);
        // id 1 is free again even though 2 is still live
        assert_eq!(table.find(1).is_none(), true);
        assert_eq!(table.find(2).is_some(), true);
    }

    #[test]
    fn find_by_pgrp_round_trips() {
        let mut table = JobTable::new();
        table.append(make_job(1, 4242, JobStatus::Background));
        assert_eq!(table.find_by_pgrp(4242).unwrap().jid, 1);
        assert!(table.find_by_pgrp(9999).is_none());
    }

    #[test]
    fn display_argv_joins_full_vector() {
        let job = make_job(1, 100, JobStatus::Background);
        assert_eq!(job.display_argv(), "sleep 30");
    }
}
