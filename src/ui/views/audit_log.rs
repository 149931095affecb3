use std::sync::Arc;

use crate::api::service::audit_page;
use crate::api::types::{AuditLog, AuditLogFilter, Page};
use crate::api::ApiService;
use crate::cache::{QueryKey, ResponseCache};
use crate::context::AppContext;
use crate::query::{CacheBinding, CachedQuery, QueryOptions};
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::renderfns::{format_timestamp, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{
  ensure_valid_selection, highlight_style, navigate_list, render_placeholder, titled_block,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};

/// Paged audit trail, newest first. `/` filters by action. Pages already
/// seen are served from the general cache.
pub struct AuditLogView {
  api: ApiService,
  cache: Arc<ResponseCache>,
  filter: AuditLogFilter,
  query: CachedQuery<Page<AuditLog>>,
  list_state: ListState,
  search: SearchInput,
}

impl AuditLogView {
  pub fn new(ctx: AppContext) -> Self {
    let api = ctx.api.clone();
    let cache = Arc::clone(&ctx.caches.general);
    let filter = AuditLogFilter::default();
    let query = Self::load(&api, &cache, &filter);
    Self {
      api,
      cache,
      filter,
      query,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn load(
    api: &ApiService,
    cache: &Arc<ResponseCache>,
    filter: &AuditLogFilter,
  ) -> CachedQuery<Page<AuditLog>> {
    let key = QueryKey::AuditLogs {
      filter: filter.describe(),
      page: filter.page,
    };
    let api = api.clone();
    let fetch_filter = filter.clone();
    let page_filter = filter.clone();
    CachedQuery::new(
      CacheBinding::new(Arc::clone(cache), key),
      QueryOptions::default(),
      move || {
        let api = api.clone();
        let filter = fetch_filter.clone();
        async move { api.get_audit_rows(&filter).await }
      },
      move |raw| audit_page(&page_filter, raw),
    )
  }

  /// Show the page `filter` now points at.
  fn reload(&mut self) {
    self.query = Self::load(&self.api, &self.cache, &self.filter);
    self.list_state.select(Some(0));
  }

  fn logs(&self) -> &[AuditLog] {
    self.query.data().map(|p| p.items.as_slice()).unwrap_or(&[])
  }

  fn has_more(&self) -> bool {
    self.query.data().is_some_and(|p| p.has_more)
  }

  fn title(&self) -> String {
    let filter = self.filter.describe();
    let filter = if filter.is_empty() {
      String::new()
    } else {
      format!(" [{}]", filter)
    };
    let state = if let Some(e) = self.query.error() {
      format!("error: {}", e)
    } else if self.query.is_loading() {
      "loading...".to_string()
    } else {
      format!("{} rows", self.logs().len())
    };
    format!(" Audit log{} page {} ({}) ", filter, self.filter.page, state)
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let block = titled_block(self.title(), Color::Blue);
    if self.logs().is_empty() && !self.query.is_loading() {
      render_placeholder(frame, area, block, "No audit entries.");
      return;
    }

    let items: Vec<ListItem> = self
      .logs()
      .iter()
      .map(|log| {
        let entity = match (&log.entity_type, &log.entity_id) {
          (Some(t), Some(id)) => format!("{}:{}", t, id),
          (Some(t), None) => t.clone(),
          _ => "-".to_string(),
        };
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<18}", format_timestamp(log.created_at)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(
            format!("{:<24}", truncate(&log.action, 23)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(format!("{:<34}", truncate(&entity, 33))),
          Span::styled(
            log.user_id.clone().unwrap_or_default(),
            Style::default().fg(Color::Cyan),
          ),
        ]))
      })
      .collect();

    let len = items.len();
    ensure_valid_selection(&mut self.list_state, len);
    let list = List::new(items)
      .block(block)
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn render_details(&self, frame: &mut Frame, area: Rect) {
    let selected = self.list_state.selected().and_then(|i| self.logs().get(i));
    let text = match selected {
      Some(log) if !log.details.is_null() => {
        serde_json::to_string_pretty(&log.details).unwrap_or_default()
      }
      Some(_) => "(no details)".to_string(),
      None => String::new(),
    };
    let ip = selected
      .and_then(|log| log.ip_address.as_deref())
      .map(|ip| format!(" Details from {} ", ip))
      .unwrap_or_else(|| " Details ".to_string());
    let paragraph = Paragraph::new(text)
      .block(titled_block(ip, Color::DarkGray))
      .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
  }
}

impl View for AuditLogView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Submitted(action)) => {
        let action = action.trim();
        self.filter.action = (!action.is_empty()).then(|| action.to_string());
        self.filter.page = 1;
        self.reload();
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Changed(_)) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    let len = self.logs().len();
    if navigate_list(&mut self.list_state, key, len) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('n') | KeyCode::Char(']') if self.has_more() => {
        self.filter.page += 1;
        self.reload();
      }
      KeyCode::Char('p') | KeyCode::Char('[') if self.filter.page > 1 => {
        self.filter.page -= 1;
        self.reload();
      }
      KeyCode::Char('c') if self.filter.action.is_some() => {
        self.filter.action = None;
        self.filter.page = 1;
        self.reload();
      }
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [list, details] =
      Layout::vertical([Constraint::Percentage(65), Constraint::Percentage(35)]).areas(area);
    self.render_list(frame, list);
    self.render_details(frame, details);
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Audit".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    ViewAction::None
  }

  fn is_capturing_input(&self) -> bool {
    self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "action").with_priority(12),
      ShortcutInfo::new("n/p", "page").with_priority(14),
      ShortcutInfo::new("c", "clear filter").with_priority(16),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
