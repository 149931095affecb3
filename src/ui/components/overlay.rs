use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear};

/// Area for a floating box anchored at the top-left of `area`.
pub fn anchored(area: Rect, height: u16) -> Rect {
  let width = (area.width * 60 / 100).clamp(30.min(area.width), 60);
  Rect::new(
    area.x + 1.min(area.width),
    area.y + 1.min(area.height),
    width.min(area.width.saturating_sub(1)),
    height.min(area.height.saturating_sub(1)),
  )
}

/// Area for a box centered in `area`.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}

/// Clear `area`, draw a titled border, and return the inner area.
pub fn frame_box(frame: &mut Frame, area: Rect, title: &str, color: Color) -> Rect {
  frame.render_widget(Clear, area);
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(color))
    .title(format!(" {} ", title));
  let inner = block.inner(area);
  frame.render_widget(block, area);
  inner
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_centered_fits_inside() {
    let area = Rect::new(0, 0, 100, 40);
    assert_eq!(centered(area, 50, 10), Rect::new(25, 15, 50, 10));
    assert_eq!(centered(Rect::new(0, 0, 20, 5), 50, 10), Rect::new(0, 0, 20, 5));
  }

  #[test]
  fn test_anchored_clamps_width() {
    let area = Rect::new(0, 2, 200, 40);
    assert_eq!(anchored(area, 3), Rect::new(1, 3, 60, 3));
    let narrow = Rect::new(0, 0, 20, 10);
    assert_eq!(anchored(narrow, 3).width, 19);
  }
}
