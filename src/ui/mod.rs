pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use crate::query::Query;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, ListState, Paragraph};
use renderfns::{draw_footer, draw_header, HeaderInfo};
use std::fmt::Display;
use std::future::Future;
use view::Notice;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let [header, content, footer] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  let shortcuts = app.shortcuts();
  let title = app.title();
  let user = app.user_label();
  draw_header(
    frame,
    header,
    &HeaderInfo {
      title: &title,
      user: user.as_deref(),
      online: app.is_online(),
      login_required: app.login_required(),
      shortcuts: &shortcuts,
    },
  );

  if let Some(view) = app.current_view_mut() {
    view.render(frame, content);
  }
  app.command_input().render_overlay(frame, content);

  draw_footer(frame, footer, &app.breadcrumb(), app.notice());
}

/// Keep a list selection inside `0..len`, selecting the first row when
/// rows appear.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
  } else {
    match state.selected() {
      Some(i) if i >= len => state.select(Some(len - 1)),
      None => state.select(Some(0)),
      _ => {}
    }
  }
}

/// j/k/arrows/g/G movement. Returns true if the key was a movement key.
pub fn navigate_list(state: &mut ListState, key: KeyEvent, len: usize) -> bool {
  match key.code {
    KeyCode::Char('j') | KeyCode::Down => state.select_next(),
    KeyCode::Char('k') | KeyCode::Up => state.select_previous(),
    KeyCode::Char('g') | KeyCode::Home => state.select_first(),
    KeyCode::Char('G') | KeyCode::End => state.select(len.checked_sub(1)),
    _ => return false,
  }
  true
}

/// Bordered block with a centered title.
pub fn titled_block(title: String, color: Color) -> Block<'static> {
  Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(color))
}

/// List title reflecting load state, e.g. ` Contacts (12) `.
pub fn list_title(name: &str, loading: bool, error: Option<&str>, count: usize) -> String {
  if let Some(e) = error {
    format!(" {} (error: {}) ", name, e)
  } else if loading {
    format!(" {} (loading...) ", name)
  } else {
    format!(" {} ({}) ", name, count)
  }
}

/// Dimmed message in place of an empty list.
pub fn render_placeholder(frame: &mut Frame, area: Rect, block: Block, text: &str) {
  let paragraph = Paragraph::new(text)
    .block(block)
    .style(Style::default().fg(Color::DarkGray));
  frame.render_widget(paragraph, area);
}

pub fn highlight_style() -> Style {
  Style::default()
    .bg(Color::DarkGray)
    .add_modifier(Modifier::BOLD)
}

pub fn today() -> chrono::NaiveDate {
  chrono::Local::now().date_naive()
}

/// A write in flight. Resolves once into a footer notice.
pub struct Mutation {
  query: Query<String>,
}

impl Mutation {
  /// Run `future`; on success `describe` turns its output into the notice.
  pub fn start<T, E, Fut, D>(future: Fut, describe: D) -> Self
  where
    T: Send + 'static,
    E: Display + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    D: FnOnce(T) -> String + Send + 'static,
  {
    Self {
      query: Query::once(async move { future.await.map(describe) }),
    }
  }

  /// `Some` exactly once, when the write finishes.
  pub fn poll(&mut self) -> Option<Result<String, String>> {
    if !self.query.poll() {
      return None;
    }
    if let Some(message) = self.query.data() {
      return Some(Ok(message.clone()));
    }
    self.query.error().map(|e| Err(e.to_string()))
  }
}

/// Poll an optional mutation, clearing it when done.
pub fn poll_mutation(slot: &mut Option<Mutation>) -> Option<Result<String, String>> {
  let outcome = slot.as_mut()?.poll()?;
  *slot = None;
  Some(outcome)
}

impl From<Result<String, String>> for Notice {
  fn from(outcome: Result<String, String>) -> Self {
    match outcome {
      Ok(message) => Notice::info(message),
      Err(error) => Notice::error(error),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;
  use std::time::Duration;

  #[test]
  fn test_ensure_valid_selection() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));

    state.select(Some(5));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }

  #[test]
  fn test_navigate_list() {
    let mut state = ListState::default().with_selected(Some(0));
    let key = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
    assert!(navigate_list(&mut state, key('G'), 4));
    assert_eq!(state.selected(), Some(3));
    assert!(!navigate_list(&mut state, key('x'), 4));
  }

  #[test]
  fn test_list_title() {
    assert_eq!(list_title("Tasks", true, None, 0), " Tasks (loading...) ");
    assert_eq!(list_title("Tasks", false, Some("boom"), 0), " Tasks (error: boom) ");
    assert_eq!(list_title("Tasks", false, None, 7), " Tasks (7) ");
  }

  #[tokio::test]
  async fn test_mutation_reports_once() {
    let mut slot = Some(Mutation::start(
      async { Ok::<_, String>(3) },
      |n| format!("{} rows", n),
    ));
    let mut outcome = None;
    for _ in 0..100 {
      outcome = poll_mutation(&mut slot);
      if outcome.is_some() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(outcome, Some(Ok("3 rows".to_string())));
    assert!(slot.is_none());

    let mut failed = Some(Mutation::start(async { Err::<(), _>("denied") }, |_| String::new()));
    let mut outcome = None;
    for _ in 0..100 {
      outcome = poll_mutation(&mut failed);
      if outcome.is_some() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(outcome, Some(Err("denied".to_string())));
  }
}
