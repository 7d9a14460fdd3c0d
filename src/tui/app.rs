//! Application state for the interactive form.
//!
//! Pure state machine: key handling and batch-event application are
//! separated from terminal I/O so the whole form can be tested without a
//! terminal.

use crate::config::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::jobs::{BatchEvent, BatchSummary, JobResult};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

/// Where the form currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Collecting a selection and a concurrency level.
    Selecting,
    /// Batch dispatched, results streaming in. No cancellation.
    Running,
    /// All jobs completed; summary available.
    Done,
}

/// Live status of one listed job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Not yet part of a running batch.
    Pending,
    /// Selected and submitted, waiting for a worker slot.
    Queued,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Succeeded { rows: usize, minutes: f64 },
    /// Finished with an error.
    Failed { message: String },
}

/// One row in the job list.
#[derive(Debug, Clone)]
pub struct JobEntry {
    pub name: String,
    pub selected: bool,
    pub state: JobState,
}

/// Actions the event loop must perform on behalf of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Dispatch the selected jobs.
    StartBatch,
    /// Write the summary report to disk.
    SaveReport,
    /// Leave the application.
    Quit,
}

/// Interactive form state.
pub struct App {
    pub jobs: Vec<JobEntry>,
    pub cursor: usize,
    pub concurrency: usize,
    pub phase: Phase,
    /// Jobs submitted in the current batch.
    pub submitted: usize,
    /// Jobs completed so far in the current batch.
    pub completed: usize,
    pub summary: Option<BatchSummary>,
    pub report_path: Option<PathBuf>,
    /// One-line message shown in the footer.
    pub status_line: Option<String>,
    pub running: bool,
}

impl App {
    /// Creates the form over the discovered job names.
    pub fn new(job_names: Vec<String>, default_concurrency: usize) -> Self {
        let jobs = job_names
            .into_iter()
            .map(|name| JobEntry {
                name,
                selected: false,
                state: JobState::Pending,
            })
            .collect();

        Self {
            jobs,
            cursor: 0,
            concurrency: default_concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            phase: Phase::Selecting,
            submitted: 0,
            completed: 0,
            summary: None,
            report_path: None,
            status_line: None,
            running: true,
        }
    }

    /// Handles one key press, returning an action for the event loop.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        // Ctrl+C always leaves, even mid-batch (the process exits; jobs
        // are not cancellable).
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.running = false;
            return Some(Action::Quit);
        }

        match self.phase {
            Phase::Selecting => self.handle_selecting_key(key),
            Phase::Running => None, // no cancellation once started
            Phase::Done => self.handle_done_key(key),
        }
    }

    fn handle_selecting_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
                Some(Action::Quit)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_cursor(-1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_cursor(1);
                None
            }
            KeyCode::Char(' ') => {
                self.toggle_current();
                None
            }
            KeyCode::Char('a') => {
                self.toggle_all();
                None
            }
            KeyCode::Left => {
                self.adjust_concurrency(-1);
                None
            }
            KeyCode::Right => {
                self.adjust_concurrency(1);
                None
            }
            KeyCode::Enter => {
                if self.jobs.is_empty() {
                    self.status_line = Some("No SQL files found".to_string());
                    None
                } else if self.selected_count() == 0 {
                    self.status_line = Some("Select at least one query (Space)".to_string());
                    None
                } else {
                    Some(Action::StartBatch)
                }
            }
            _ => None,
        }
    }

    fn handle_done_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
                Some(Action::Quit)
            }
            KeyCode::Char('s') => Some(Action::SaveReport),
            _ => None,
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.jobs.is_empty() {
            return;
        }
        let len = self.jobs.len() as isize;
        self.cursor = (self.cursor as isize + delta).rem_euclid(len) as usize;
    }

    fn toggle_current(&mut self) {
        if let Some(entry) = self.jobs.get_mut(self.cursor) {
            entry.selected = !entry.selected;
        }
    }

    fn toggle_all(&mut self) {
        let all_selected = !self.jobs.is_empty() && self.jobs.iter().all(|j| j.selected);
        for entry in &mut self.jobs {
            entry.selected = !all_selected;
        }
    }

    fn adjust_concurrency(&mut self, delta: isize) {
        let next = self.concurrency as isize + delta;
        self.concurrency = (next.max(MIN_CONCURRENCY as isize) as usize).min(MAX_CONCURRENCY);
    }

    /// Number of currently selected jobs.
    pub fn selected_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.selected).count()
    }

    /// Names of the selected jobs, in list order.
    pub fn selected_names(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| j.selected)
            .map(|j| j.name.clone())
            .collect()
    }

    /// Marks the batch as dispatched and enters the running phase.
    ///
    /// `submitted` is the number of jobs actually dispatched. Dispatch
    /// goes by name, so with duplicate stems it can exceed the number of
    /// selected entries; every entry sharing a selected name is queued.
    pub fn start_batch(&mut self, submitted: usize) {
        self.submitted = submitted;
        self.completed = 0;
        self.summary = None;
        self.report_path = None;
        self.status_line = None;
        let selected = self.selected_names();
        for entry in &mut self.jobs {
            if selected.contains(&entry.name) {
                entry.state = JobState::Queued;
            }
        }
        self.phase = Phase::Running;
    }

    /// Applies one progress event from the orchestrator.
    pub fn apply_event(&mut self, event: BatchEvent) {
        match event {
            BatchEvent::JobStarted { job_name } => {
                self.set_state(&job_name, JobState::Running);
            }
            BatchEvent::JobFinished { result } => {
                self.completed += 1;
                let state = job_state_for(&result);
                self.set_state(&result.job_name.clone(), state);
            }
        }
    }

    /// Records the finished batch.
    pub fn finish_batch(&mut self, summary: BatchSummary) {
        self.completed = summary.len();
        self.summary = Some(summary);
        self.phase = Phase::Done;
    }

    /// Fraction of submitted jobs completed, in [0, 1].
    pub fn progress_ratio(&self) -> f64 {
        if self.submitted == 0 {
            0.0
        } else {
            self.completed as f64 / self.submitted as f64
        }
    }

    fn set_state(&mut self, job_name: &str, state: JobState) {
        // Duplicate stems produce entries with the same name; update the
        // first one not already in the target lifecycle position.
        let entry = self
            .jobs
            .iter_mut()
            .filter(|j| j.name == job_name)
            .find(|j| match state {
                JobState::Running => j.state == JobState::Queued,
                _ => j.state == JobState::Running || j.state == JobState::Queued,
            });
        if let Some(entry) = entry {
            entry.state = state;
        }
    }
}

fn job_state_for(result: &JobResult) -> JobState {
    match result.failure_message() {
        None => JobState::Succeeded {
            rows: result.row_count,
            minutes: result.duration_minutes(),
        },
        Some(msg) => JobState::Failed {
            message: msg.to_string(),
        },
    }
}
