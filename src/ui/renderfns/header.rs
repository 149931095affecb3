use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// What the header needs to know about the app.
#[derive(Debug, Clone)]
pub struct HeaderInfo<'a> {
  pub title: &'a str,
  pub user: Option<&'a str>,
  pub online: bool,
  pub login_required: bool,
  pub shortcuts: &'a [ShortcutInfo],
}

/// Draw the header bar: logo, title, connection state and shortcuts.
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo) {
  let sep = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let mut spans = vec![
    Span::styled(" exdesk ", Style::default().fg(Color::Cyan).bold()),
    sep(),
    Span::styled(format!(" {} ", info.title), Style::default().fg(Color::White)),
    sep(),
  ];

  spans.extend(connection_spans(info.online));

  if let Some(user) = info.user {
    spans.push(sep());
    spans.push(Span::styled(format!(" {} ", user), Style::default().fg(Color::Yellow)));
  }

  if info.login_required {
    spans.push(Span::styled(
      " LOGIN REQUIRED: run `exdesk login` ",
      Style::default().fg(Color::White).bg(Color::Red).bold(),
    ));
  }

  spans.push(Span::raw("  "));
  let mut shortcuts: Vec<&ShortcutInfo> = info.shortcuts.iter().collect();
  shortcuts.sort_by_key(|s| s.priority);
  for (i, shortcut) in shortcuts.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("   "));
    }
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn connection_spans(online: bool) -> Vec<Span<'static>> {
  if online {
    vec![
      Span::styled(" ● ", Style::default().fg(Color::Green)),
      Span::styled("online ", Style::default().fg(Color::Green)),
    ]
  } else {
    vec![
      Span::styled(" ● ", Style::default().fg(Color::Red)),
      Span::styled("offline ", Style::default().fg(Color::Red).bold()),
    ]
  }
}
