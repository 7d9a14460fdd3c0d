//! Rendering for the interactive form.

use super::app::{App, JobState, Phase};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame,
};

/// Renders the whole form.
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(3),    // job list
            Constraint::Length(3), // progress / concurrency
            Constraint::Length(4), // footer
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_job_list(frame, app, chunks[1]);
    render_progress(frame, app, chunks[2]);
    render_footer(frame, app, chunks[3]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.phase {
        Phase::Selecting => format!(
            "sqlharvest - {} queries found, {} selected",
            app.jobs.len(),
            app.selected_count()
        ),
        Phase::Running => format!(
            "sqlharvest - running {} of {} job(s)",
            app.completed, app.submitted
        ),
        Phase::Done => match &app.summary {
            Some(summary) => format!(
                "sqlharvest - done: {} succeeded, {} failed in {:.2} min",
                summary.success_count(),
                summary.failure_count(),
                summary.total_duration.as_secs_f64() / 60.0
            ),
            None => "sqlharvest - done".to_string(),
        },
    };

    let header = Paragraph::new(title)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn render_job_list(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .jobs
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let cursor = if i == app.cursor && app.phase == Phase::Selecting {
                "> "
            } else {
                "  "
            };
            let checkbox = if entry.selected { "[x]" } else { "[ ]" };

            let (status, style) = match &entry.state {
                JobState::Pending => (String::new(), Style::default()),
                JobState::Queued => ("queued".to_string(), Style::default().fg(Color::DarkGray)),
                JobState::Running => ("running...".to_string(), Style::default().fg(Color::Yellow)),
                JobState::Succeeded { rows, minutes } => (
                    format!("{rows} rows in {minutes:.2} min"),
                    Style::default().fg(Color::Green),
                ),
                JobState::Failed { message } => (
                    format!("failed: {message}"),
                    Style::default().fg(Color::Red),
                ),
            };

            ListItem::new(Line::from(vec![
                Span::raw(format!("{cursor}{checkbox} ")),
                Span::raw(format!("{:<30}", entry.name)),
                Span::styled(status, style),
            ]))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Queries"));
    frame.render_widget(list, area);
}

fn render_progress(frame: &mut Frame, app: &App, area: Rect) {
    match app.phase {
        Phase::Selecting => {
            let text = format!("Parallel workers: {} (Left/Right to adjust, 1-10)", app.concurrency);
            let para = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("Concurrency"));
            frame.render_widget(para, area);
        }
        Phase::Running | Phase::Done => {
            let label = format!("{}/{}", app.completed, app.submitted);
            let gauge = Gauge::default()
                .block(Block::default().borders(Borders::ALL).title("Progress"))
                .gauge_style(Style::default().fg(Color::Cyan))
                .ratio(app.progress_ratio().clamp(0.0, 1.0))
                .label(label);
            frame.render_widget(gauge, area);
        }
    }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let hints = match app.phase {
        Phase::Selecting => {
            "Space select | a all | Up/Down move | Left/Right workers | Enter start | q quit"
        }
        Phase::Running => "Running... (Ctrl+C to abort the process)",
        Phase::Done => "s save report | q quit",
    };

    let mut lines = vec![Line::from(hints)];
    if let Some(status) = &app.status_line {
        lines.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(path) = &app.report_path {
        lines.push(Line::from(Span::styled(
            format!("Report saved: {}", path.display()),
            Style::default().fg(Color::Green),
        )));
    }

    let footer = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}
