mod audit_log;
mod contact_list;
mod document_list;
mod exchange_detail;
mod exchange_list;
mod notifications;
mod practice_panther;
mod reports;
mod task_list;
mod user_list;

pub use audit_log::AuditLogView;
pub use contact_list::ContactListView;
pub use document_list::DocumentListView;
pub use exchange_detail::ExchangeDetailView;
pub use exchange_list::ExchangeListView;
pub use notifications::NotificationsView;
pub use practice_panther::PracticePantherView;
pub use reports::ReportsView;
pub use task_list::TaskListView;
pub use user_list::UserListView;

use crate::commands::CommandId;
use crate::context::AppContext;
use crate::ui::view::View;

/// The view a `:` command switches to. Commands that are actions rather
/// than screens have none.
pub fn root_view(id: CommandId, ctx: &AppContext) -> Option<Box<dyn View>> {
  let view: Box<dyn View> = match id {
    CommandId::Exchanges => Box::new(ExchangeListView::new(ctx.clone())),
    CommandId::Tasks => Box::new(TaskListView::new(ctx.clone())),
    CommandId::Contacts => Box::new(ContactListView::new(ctx.clone())),
    CommandId::Documents => Box::new(DocumentListView::new(ctx.clone())),
    CommandId::Users => Box::new(UserListView::new(ctx.clone())),
    CommandId::Audit => Box::new(AuditLogView::new(ctx.clone())),
    CommandId::Reports => Box::new(ReportsView::new(ctx.clone())),
    CommandId::Notifications => Box::new(NotificationsView::new(ctx.clone())),
    CommandId::PracticePanther => Box::new(PracticePantherView::new(ctx.clone())),
    CommandId::ClearCache | CommandId::Logout | CommandId::Quit => return None,
  };
  Some(view)
}

pub fn root_exchanges(ctx: &AppContext) -> Box<dyn View> {
  Box::new(ExchangeListView::new(ctx.clone()))
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use crate::ui::view::ViewAction;
  use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
  use ratatui::backend::TestBackend;
  use ratatui::Terminal;
  use std::time::Duration;
  use wiremock::MockServer;

  pub(crate) fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
  }

  pub(crate) fn code(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  pub(crate) fn type_text(view: &mut dyn View, text: &str) {
    for c in text.chars() {
      view.handle_key(key(c));
    }
  }

  /// Tick until `done` holds, collecting any actions the view returns.
  pub(crate) async fn tick_until<V: View>(
    view: &mut V,
    done: impl Fn(&V) -> bool,
  ) -> Vec<ViewAction> {
    let mut actions = Vec::new();
    for _ in 0..200 {
      match view.tick() {
        ViewAction::None => {}
        action => actions.push(action),
      }
      if done(view) {
        return actions;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("view did not settle");
  }

  /// Render into an off-screen buffer and return its text.
  pub(crate) fn render_text(view: &mut dyn View) -> String {
    let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
    terminal.draw(|frame| view.render(frame, frame.area())).unwrap();
    let buffer = terminal.backend().buffer().clone();
    buffer
      .content()
      .chunks(buffer.area.width as usize)
      .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
      .collect::<Vec<_>>()
      .join("\n")
  }

  #[tokio::test]
  async fn test_root_view_per_command() {
    let server = MockServer::start().await;
    let ctx = context_for(&server);
    let view = root_view(CommandId::Contacts, &ctx).unwrap();
    assert_eq!(view.breadcrumb_label(), "Contacts");
    assert!(root_view(CommandId::ClearCache, &ctx).is_none());
    assert!(root_view(CommandId::Quit, &ctx).is_none());
  }
}
