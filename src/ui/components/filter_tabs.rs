use super::KeyResult;
use crate::api::types::{TaskStatus, UserRole};
use crate::ui::renderfns::truncate;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// A value a list can be narrowed to.
pub trait TabOption: Clone + PartialEq {
  fn tab_label(&self) -> String;
}

impl TabOption for TaskStatus {
  fn tab_label(&self) -> String {
    self.label().to_string()
  }
}

impl TabOption for UserRole {
  fn tab_label(&self) -> String {
    self.label().to_string()
  }
}

impl TabOption for String {
  fn tab_label(&self) -> String {
    self.clone()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTabsEvent {
  SelectionChanged,
}

/// Row of `All | a | b | ...` tabs cycled with `[` and `]`.
#[derive(Debug, Clone)]
pub struct FilterTabs<T: TabOption> {
  label: &'static str,
  options: Vec<T>,
  selected: usize, // 0 = All, 1+ = index into options
}

impl<T: TabOption> FilterTabs<T> {
  pub fn new(label: &'static str, options: Vec<T>) -> Self {
    Self {
      label,
      options,
      selected: 0,
    }
  }

  /// The chosen option, or `None` for All.
  pub fn selected(&self) -> Option<&T> {
    self.selected.checked_sub(1).and_then(|i| self.options.get(i))
  }

  /// Replace the options, keeping the current choice if it still exists.
  pub fn set_options(&mut self, options: Vec<T>) {
    let current = self.selected().cloned();
    self.options = options;
    self.selected = current
      .and_then(|c| self.options.iter().position(|o| *o == c))
      .map(|i| i + 1)
      .unwrap_or(0);
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FilterTabsEvent> {
    if self.options.is_empty() {
      return KeyResult::NotHandled;
    }
    let total = self.options.len() + 1;
    match key.code {
      KeyCode::Char(']') | KeyCode::PageDown => {
        self.selected = (self.selected + 1) % total;
        KeyResult::Event(FilterTabsEvent::SelectionChanged)
      }
      KeyCode::Char('[') | KeyCode::PageUp => {
        self.selected = (self.selected + total - 1) % total;
        KeyResult::Event(FilterTabsEvent::SelectionChanged)
      }
      _ => KeyResult::NotHandled,
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let active = Style::default().fg(Color::Black).bg(Color::Cyan);
    let idle = Style::default().fg(Color::Gray);

    let mut spans = vec![
      Span::styled(format!("[{}] ", self.label), Style::default().fg(Color::Yellow)),
      Span::styled(" All ", if self.selected == 0 { active } else { idle }),
    ];
    for (idx, option) in self.options.iter().enumerate() {
      spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
      let style = if self.selected == idx + 1 { active } else { idle };
      spans.push(Span::styled(
        format!(" {} ", truncate(&option.tab_label(), 15)),
        style,
      ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_cycles_through_all_and_wraps() {
    let mut tabs = FilterTabs::new("status", TaskStatus::ALL.to_vec());
    assert_eq!(tabs.selected(), None);

    tabs.handle_key(key(KeyCode::Char(']')));
    assert_eq!(tabs.selected(), Some(&TaskStatus::Pending));

    tabs.handle_key(key(KeyCode::Char('[')));
    tabs.handle_key(key(KeyCode::Char('[')));
    assert_eq!(tabs.selected(), Some(&TaskStatus::Cancelled));
  }

  #[test]
  fn test_set_options_keeps_choice() {
    let mut tabs = FilterTabs::new("category", vec!["general".to_string(), "legal".to_string()]);
    tabs.handle_key(key(KeyCode::Char(']')));
    tabs.handle_key(key(KeyCode::Char(']')));
    assert_eq!(tabs.selected().map(String::as_str), Some("legal"));

    tabs.set_options(vec!["legal".to_string(), "tax".to_string()]);
    assert_eq!(tabs.selected().map(String::as_str), Some("legal"));

    tabs.set_options(vec!["tax".to_string()]);
    assert_eq!(tabs.selected(), None);
  }

  #[test]
  fn test_empty_options_pass_keys_through() {
    let mut tabs: FilterTabs<String> = FilterTabs::new("category", Vec::new());
    assert_eq!(tabs.handle_key(key(KeyCode::Char(']'))), KeyResult::NotHandled);
  }
}
