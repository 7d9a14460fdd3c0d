//! Interactive terminal form.
//!
//! A checklist of the discovered query files, a worker-count control,
//! and a progress view over a running batch. The form drives the same
//! orchestrator as the batch CLI; once a batch starts it runs to
//! completion.

pub mod app;
mod ui;

pub use app::App;

use crate::config::Config;
use crate::db::PostgresFactory;
use crate::error::{HarvestError, Result};
use crate::export::{run_timestamp, write_summary, SpreadsheetWriter};
use crate::jobs::{list_jobs, BatchEvent, BatchRunner, BatchSummary, QueryJob};
use app::{Action, Phase};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::panic;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Messages sent from the batch task to the main loop.
#[derive(Debug)]
pub enum AsyncMessage {
    /// Incremental progress from the orchestrator.
    Batch(BatchEvent),
    /// The batch finished; carries the full summary.
    BatchDone(BatchSummary),
}

/// The interactive form runner.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    /// Creates a new form instance, initializing the terminal.
    pub fn new() -> Result<Self> {
        let terminal = Self::setup_terminal()?;
        Ok(Self { terminal })
    }

    fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()
            .map_err(|e| HarvestError::internal(format!("Failed to enable raw mode: {e}")))?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)
            .map_err(|e| HarvestError::internal(format!("Failed to enter alternate screen: {e}")))?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)
            .map_err(|e| HarvestError::internal(format!("Failed to create terminal: {e}")))?;

        Ok(terminal)
    }

    fn restore_terminal(&mut self) -> Result<()> {
        disable_raw_mode()
            .map_err(|e| HarvestError::internal(format!("Failed to disable raw mode: {e}")))?;

        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(|e| HarvestError::internal(format!("Failed to leave alternate screen: {e}")))?;

        self.terminal
            .show_cursor()
            .map_err(|e| HarvestError::internal(format!("Failed to show cursor: {e}")))?;

        Ok(())
    }

    /// Runs the form over the given configuration.
    pub async fn run(&mut self, config: Config) -> Result<()> {
        // Restore the terminal on panic so the shell stays usable.
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            original_hook(panic_info);
        }));

        let jobs = list_jobs(&config.sql_dir);
        info!("Found {} query file(s) in {}", jobs.len(), config.sql_dir.display());

        let mut app_state = App::new(
            jobs.iter().map(|j| j.name.clone()).collect(),
            config.max_threads,
        );

        let result = self.run_event_loop(&mut app_state, &config, jobs).await;

        let _ = panic::take_hook();
        result
    }

    async fn run_event_loop(
        &mut self,
        app_state: &mut App,
        config: &Config,
        jobs: Vec<QueryJob>,
    ) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<AsyncMessage>();

        loop {
            self.terminal
                .draw(|frame| ui::render(frame, app_state))
                .map_err(|e| HarvestError::internal(format!("Failed to draw: {e}")))?;

            if !app_state.running {
                break;
            }

            tokio::select! {
                event_result = tokio::task::spawn_blocking(|| {
                    let tick_rate = std::time::Duration::from_millis(100);
                    if crossterm::event::poll(tick_rate).unwrap_or(false) {
                        crossterm::event::read().ok()
                    } else {
                        None
                    }
                }) => {
                    if let Ok(Some(crossterm::event::Event::Key(key))) = event_result {
                        if let Some(action) = app_state.handle_key(key) {
                            self.perform_action(action, app_state, config, &jobs, tx.clone());
                        }
                    }
                }

                Some(msg) = rx.recv() => {
                    handle_async_message(msg, app_state);
                }
            }
        }

        Ok(())
    }

    fn perform_action(
        &mut self,
        action: Action,
        app_state: &mut App,
        config: &Config,
        jobs: &[QueryJob],
        tx: mpsc::UnboundedSender<AsyncMessage>,
    ) {
        match action {
            Action::Quit => {}
            Action::StartBatch => {
                let selected = app_state.selected_names();
                let batch: Vec<QueryJob> = jobs
                    .iter()
                    .filter(|j| selected.contains(&j.name))
                    .cloned()
                    .collect();

                app_state.start_batch(batch.len());
                spawn_batch(batch, config, app_state.concurrency, tx);
            }
            Action::SaveReport => {
                let Some(summary) = &app_state.summary else {
                    return;
                };
                match write_summary(summary, &config.output_dir, &run_timestamp()) {
                    Ok(path) => {
                        app_state.report_path = Some(path);
                        app_state.status_line = None;
                    }
                    Err(e) => {
                        error!("Failed to save report: {e}");
                        app_state.status_line = Some(format!("Failed to save report: {e}"));
                    }
                }
            }
        }
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}

/// Spawns the batch in the background, forwarding progress to the loop.
fn spawn_batch(
    jobs: Vec<QueryJob>,
    config: &Config,
    concurrency: usize,
    tx: mpsc::UnboundedSender<AsyncMessage>,
) {
    let factory = Arc::new(PostgresFactory::new(config.connection.clone()));
    let writer = SpreadsheetWriter::new(&config.output_dir);
    let runner = BatchRunner::new(factory, writer).with_concurrency(concurrency);

    tokio::spawn(async move {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<BatchEvent>();

        let forward_tx = tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                if forward_tx.send(AsyncMessage::Batch(event)).is_err() {
                    break;
                }
            }
        });

        let summary = runner.run(jobs, Some(progress_tx)).await;
        let _ = forwarder.await;
        let _ = tx.send(AsyncMessage::BatchDone(summary));
    });
}

fn handle_async_message(msg: AsyncMessage, app_state: &mut App) {
    match msg {
        AsyncMessage::Batch(event) => {
            if app_state.phase == Phase::Running {
                app_state.apply_event(event);
            }
        }
        AsyncMessage::BatchDone(summary) => {
            app_state.finish_batch(summary);
        }
    }
}

/// Runs the interactive form end to end.
pub async fn run(config: Config) -> Result<()> {
    let mut tui = Tui::new()?;
    tui.run(config).await
}
