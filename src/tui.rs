use anyhow::Result;
use directories::BaseDirs;
use crossterm::{
    event::{self as term, DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::{AppState, Event, InputEdit, Screen};
use crate::controller::Controller;
use crate::models::AnalysisResult;
use crate::skills::extract_skills;

const TICK: Duration = Duration::from_millis(100);

/// Presentation-only state that the controller does not need to know about.
#[derive(Default)]
struct View {
    path_prompt: Option<String>,
    scroll_offset: u16,
}

impl View {
    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run(controller: &mut Controller) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableBracketedPaste)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, controller);

    // Restore terminal
    stdout().execute(DisableBracketedPaste)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    controller: &mut Controller,
) -> Result<()> {
    let mut view = View::default();

    loop {
        controller.poll();
        terminal.draw(|frame| draw(frame, &controller.state, &view))?;

        if !term::poll(TICK)? {
            continue;
        }
        match term::read()? {
            term::Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    break;
                }
                if handle_key(key.code, controller, &mut view) {
                    break;
                }
            }
            term::Event::Paste(text) => handle_paste(text, controller, &mut view),
            _ => {}
        }
    }
    Ok(())
}

/// Returns true when the user asked to quit.
fn handle_key(code: KeyCode, controller: &mut Controller, view: &mut View) -> bool {
    match controller.state.screen {
        Screen::CheckingCredential => matches!(code, KeyCode::Char('q') | KeyCode::Esc),

        Screen::CredentialSetup => {
            match code {
                KeyCode::Esc => return true,
                KeyCode::Enter => controller.dispatch(Event::SubmitCredential),
                KeyCode::Backspace => controller.dispatch(Event::CredentialInput(InputEdit::Backspace)),
                KeyCode::Char(c) => controller.dispatch(Event::CredentialInput(InputEdit::Push(c))),
                _ => {}
            }
            false
        }

        Screen::Ready | Screen::Analyzing => {
            if let Some(path) = view.path_prompt.as_mut() {
                match code {
                    KeyCode::Esc => view.path_prompt = None,
                    KeyCode::Backspace => {
                        path.pop();
                    }
                    KeyCode::Char(c) => path.push(c),
                    KeyCode::Enter => {
                        let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
                        let path = expand_home(path.trim(), home.as_deref());
                        view.path_prompt = None;
                        controller.load_resume_file(&path);
                    }
                    _ => {}
                }
                return false;
            }

            match code {
                KeyCode::Char('q') | KeyCode::Esc => return true,
                KeyCode::Char('a') => controller.dispatch(Event::AnalyzeRequested),
                KeyCode::Char('o') if !controller.state.is_analyzing() => {
                    view.path_prompt = Some(String::new());
                }
                KeyCode::Char('c') => controller.dispatch(Event::ResumeEdited(String::new())),
                KeyCode::Char('x') => controller.dispatch(Event::DismissError),
                KeyCode::Char('J') | KeyCode::PageDown => view.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => view.scroll_up(),
                _ => {}
            }
            false
        }
    }
}

fn handle_paste(text: String, controller: &mut Controller, view: &mut View) {
    if let Some(path) = view.path_prompt.as_mut() {
        path.push_str(text.trim());
        return;
    }
    match controller.state.screen {
        Screen::CredentialSetup => {
            for c in text.trim().chars() {
                controller.dispatch(Event::CredentialInput(InputEdit::Push(c)));
            }
        }
        Screen::Ready => controller.dispatch(Event::ResumeEdited(text)),
        _ => {}
    }
}

fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn draw(frame: &mut Frame, state: &AppState, view: &View) {
    match state.screen {
        Screen::CheckingCredential => {
            let loading = Paragraph::new("Loading...")
                .block(Block::default().borders(Borders::ALL).title(" Resume Job Matcher "));
            frame.render_widget(loading, frame.area());
        }
        Screen::CredentialSetup => draw_setup(frame, state),
        Screen::Ready | Screen::Analyzing => draw_main(frame, state, view),
    }
}

fn draw_setup(frame: &mut Frame, state: &AppState) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Enter Gemini API Key",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("> {}", "*".repeat(state.credential_input.chars().count()))),
        Line::from(""),
        Line::from(Span::styled(
            "Enter: save   Esc: quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if let Some(error) = &state.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(error.as_str(), Style::default().fg(Color::Red))));
    }

    let setup = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" API Key Setup "))
        .wrap(Wrap { trim: false });
    frame.render_widget(setup, frame.area());
}

fn draw_main(frame: &mut Frame, state: &AppState, view: &View) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Min(8),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let inputs = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    frame.render_widget(job_panel(state), inputs[0]);
    frame.render_widget(resume_panel(state), inputs[1]);

    draw_result(frame, state, view, rows[1]);

    let status = match &state.error {
        Some(error) => Line::from(Span::styled(error.as_str(), Style::default().fg(Color::Red))),
        None if state.is_analyzing() => Line::from(Span::styled(
            "Analyzing...",
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(""),
    };
    frame.render_widget(Paragraph::new(status), rows[2]);

    let footer = match &view.path_prompt {
        Some(path) => Paragraph::new(format!(" Resume PDF path: {}_", path)),
        None => Paragraph::new(
            " a:analyze  o:open PDF  paste:set resume  c:clear resume  J/K:scroll  x:dismiss  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[3]);
}

fn job_panel(state: &AppState) -> Paragraph<'_> {
    let mut lines: Vec<Line> = Vec::new();
    if state.job_description.is_empty() {
        lines.push(Line::from(Span::styled(
            "(No job description found on this page)",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        let keywords = extract_skills(&state.job_description);
        if !keywords.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("Detected keywords: {}", keywords.join(", ")),
                Style::default().fg(Color::Cyan),
            )));
            lines.push(Line::from(""));
        }
        for line in state.job_description.lines() {
            lines.push(Line::from(line));
        }
    }

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Job Description "))
        .wrap(Wrap { trim: false })
}

fn resume_panel(state: &AppState) -> Paragraph<'_> {
    let body = if state.resume.is_empty() {
        Text::from(Span::styled(
            "(Paste your resume or press 'o' to upload a PDF)",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::raw(state.resume.as_str())
    };

    Paragraph::new(body)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Resume ({} chars) ",
            state.resume.chars().count()
        )))
        .wrap(Wrap { trim: false })
}

fn draw_result(frame: &mut Frame, state: &AppState, view: &View, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Match Analysis ");
    let Some(analysis) = &state.analysis else {
        let hint = Paragraph::new(Span::styled(
            "Press 'a' to analyze your resume against this job.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(hint, area);
        return;
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(score_color(analysis.match_percentage)))
        .percent(u16::from(analysis.match_percentage))
        .label(format!("{}% Match", analysis.match_percentage));
    frame.render_widget(gauge, parts[0]);

    let detail = Paragraph::new(build_detail(analysis))
        .wrap(Wrap { trim: false })
        .scroll((view.scroll_offset, 0));
    frame.render_widget(detail, parts[1]);
}

fn score_color(score: u8) -> Color {
    match score {
        75..=100 => Color::Green,
        50..=74 => Color::Yellow,
        _ => Color::Red,
    }
}

fn build_detail(analysis: &AnalysisResult) -> Text<'_> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let skills = &analysis.analysis.skills;
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Skills", bold)));
    lines.push(Line::from(vec![
        Span::styled("  Matching: ", Style::default().fg(Color::Green)),
        Span::raw(skills.matching.join(", ")),
    ]));
    lines.push(Line::from(vec![
        Span::styled("  Missing:  ", Style::default().fg(Color::Red)),
        Span::raw(skills.missing.join(", ")),
    ]));

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Experience Analysis", bold)));
    for line in analysis.analysis.experience.analysis.lines() {
        lines.push(Line::from(format!("  {}", line)));
    }

    if !analysis.suggestions.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Suggestions", bold)));
        for suggestion in &analysis.suggestions {
            lines.push(Line::from(format!("  • {}", suggestion)));
        }
    }

    Text::from(lines)
}
