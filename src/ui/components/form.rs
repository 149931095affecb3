use super::input::{InputResult, TextInput};
use super::overlay;
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

#[derive(Debug, Clone)]
struct FormField {
  label: &'static str,
  input: TextInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Values in field order
  Submitted(Vec<String>),
  Cancelled,
}

/// Modal form: Tab/Down and BackTab/Up move between fields, Enter on the
/// last field submits, Esc cancels. Validation is left to the stores.
#[derive(Debug, Clone)]
pub struct Form {
  title: &'static str,
  fields: Vec<FormField>,
  focus: usize,
}

impl Form {
  pub fn new(title: &'static str) -> Self {
    Self {
      title,
      fields: Vec::new(),
      focus: 0,
    }
  }

  pub fn field(mut self, label: &'static str) -> Self {
    self.fields.push(FormField {
      label,
      input: TextInput::new(),
    });
    self
  }

  pub fn field_with(mut self, label: &'static str, value: &str) -> Self {
    let mut input = TextInput::new();
    input.set_value(value);
    self.fields.push(FormField { label, input });
    self
  }

  pub fn secret(mut self, label: &'static str) -> Self {
    self.fields.push(FormField {
      label,
      input: TextInput::masked(),
    });
    self
  }

  fn values(&self) -> Vec<String> {
    self
      .fields
      .iter()
      .map(|f| f.input.value().trim().to_string())
      .collect()
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    let count = self.fields.len();
    if count == 0 {
      return KeyResult::Event(FormEvent::Cancelled);
    }
    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.focus = (self.focus + 1) % count;
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus = (self.focus + count - 1) % count;
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.fields[self.focus].input.handle_key(key) {
      InputResult::Submitted(_) if self.focus + 1 < count => {
        self.focus += 1;
        KeyResult::Handled
      }
      InputResult::Submitted(_) => KeyResult::Event(FormEvent::Submitted(self.values())),
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let height = self.fields.len() as u16 + 3;
    let inner = overlay::frame_box(
      frame,
      overlay::centered(area, 64, height),
      self.title,
      Color::Yellow,
    );
    let label_width = self
      .fields
      .iter()
      .map(|f| f.label.len())
      .max()
      .unwrap_or(0);

    let mut lines: Vec<Line> = self
      .fields
      .iter()
      .enumerate()
      .map(|(i, field)| {
        let focused = i == self.focus;
        let value = if focused {
          field.input.display()
        } else {
          field.input.shown()
        };
        let label_style = if focused {
          Style::default().fg(Color::Cyan).bold()
        } else {
          Style::default().fg(Color::DarkGray)
        };
        Line::from(vec![
          Span::styled(format!("{:>width$}: ", field.label, width = label_width), label_style),
          Span::raw(value),
        ])
      })
      .collect();
    lines.push(Line::styled(
      "Tab next · Enter submit · Esc cancel",
      Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(Paragraph::new(lines), inner);
  }
}

/// Yes/no prompt for destructive actions.
#[derive(Debug, Clone)]
pub struct Confirm {
  message: String,
}

impl Confirm {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  /// `Event(true)` on y, `Event(false)` on n or Esc; every other key is
  /// swallowed.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<bool> {
    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') => KeyResult::Event(true),
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => KeyResult::Event(false),
      _ => KeyResult::Handled,
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let inner = overlay::frame_box(frame, overlay::centered(area, 60, 4), "Confirm", Color::Red);
    frame.render_widget(
      Paragraph::new(vec![
        Line::raw(self.message.as_str()),
        Line::styled("y confirm · n cancel", Style::default().fg(Color::DarkGray)),
      ]),
      inner,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_text(form: &mut Form, text: &str) {
    for c in text.chars() {
      form.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_enter_advances_then_submits() {
    let mut form = Form::new("New contact").field("First").field_with("Type", "client");
    type_text(&mut form, " Ada ");
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert_eq!(
      form.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(FormEvent::Submitted(vec!["Ada".to_string(), "client".to_string()]))
    );
  }

  #[test]
  fn test_tab_wraps_and_esc_cancels() {
    let mut form = Form::new("Upload").field("Path").secret("PIN");
    form.handle_key(key(KeyCode::BackTab));
    type_text(&mut form, "12");
    form.handle_key(key(KeyCode::Tab));
    type_text(&mut form, "/tmp/a.pdf");
    assert_eq!(form.values(), vec!["/tmp/a.pdf".to_string(), "12".to_string()]);
    assert_eq!(form.handle_key(key(KeyCode::Esc)), KeyResult::Event(FormEvent::Cancelled));
  }

  #[test]
  fn test_confirm() {
    let mut confirm = Confirm::new("Delete contact?");
    assert_eq!(confirm.handle_key(key(KeyCode::Char('x'))), KeyResult::Handled);
    assert_eq!(confirm.handle_key(key(KeyCode::Char('y'))), KeyResult::Event(true));
    assert_eq!(confirm.handle_key(key(KeyCode::Esc)), KeyResult::Event(false));
  }
}
