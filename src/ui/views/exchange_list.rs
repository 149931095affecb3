use std::sync::Arc;

use crate::api::types::{Exchange, ExchangesResponse, NewExchange};
use crate::api::ApiError;
use crate::cache::{CacheResult, QueryKey};
use crate::context::AppContext;
use crate::query::Query;
use crate::stores::{format_currency, matches_term, require_fields};
use crate::ui::components::{Form, FormEvent, KeyResult, SearchInput};
use crate::ui::renderfns::{deadline_label, exchange_status_color, truncate};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};
use crate::ui::views::ExchangeDetailView;
use crate::ui::{
  ensure_valid_selection, highlight_style, navigate_list, poll_mutation, render_placeholder,
  titled_block, today, Mutation,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

/// All exchanges visible to the user, served through the smart API so the
/// list survives going offline.
pub struct ExchangeListView {
  ctx: AppContext,
  query: Query<CacheResult<ExchangesResponse>>,
  list_state: ListState,
  search: SearchInput,
  create: Option<Form>,
  mutation: Option<Mutation>,
}

impl ExchangeListView {
  pub fn new(ctx: AppContext) -> Self {
    let smart = ctx.smart.clone();
    let mut query = Query::new(move || {
      let smart = smart.clone();
      async move { smart.get_exchanges().await }
    });
    query.fetch();

    Self {
      ctx,
      query,
      list_state: ListState::default(),
      search: SearchInput::new(),
      create: None,
      mutation: None,
    }
  }

  fn create_form() -> Form {
    Form::new("New exchange")
      .field("Name")
      .field("Client")
      .field("Value")
      .field("Relinquished property")
  }

  fn submit_create(&mut self, values: Vec<String>) -> ViewAction {
    let [name, client, value, address] = <[String; 4]>::try_from(values).unwrap_or_default();
    let exchange_value = if value.is_empty() {
      None
    } else {
      match parse_amount(&value) {
        Some(amount) => Some(amount),
        None => return ViewAction::Notify(Notice::error(format!("Invalid value: {}", value))),
      }
    };

    let exchange = NewExchange {
      name,
      client_name: Some(client).filter(|c| !c.is_empty()),
      exchange_value,
      relinquished_property_address: Some(address).filter(|a| !a.is_empty()),
    };
    let api = self.ctx.api.clone();
    let cache = Arc::clone(&self.ctx.caches.exchanges);
    let future = async move {
      require_fields(&[&exchange.name])?;
      let created = api.create_exchange(&exchange).await?;
      cache.delete(&QueryKey::Exchanges.cache_key());
      Ok::<_, ApiError>(created)
    };
    self.mutation = Some(Mutation::start(future, |e: Exchange| {
      format!("Created exchange {}", e.name)
    }));
    ViewAction::None
  }

  fn exchanges(&self) -> Vec<&Exchange> {
    let term = self.search.query();
    self
      .query
      .data()
      .map(|r| r.data.exchanges.as_slice())
      .unwrap_or(&[])
      .iter()
      .filter(|e| {
        matches_term(
          term,
          &[
            Some(e.name.as_str()),
            e.client_name.as_deref(),
            e.relinquished_property_address.as_deref(),
            Some(e.status.label()),
          ],
        )
      })
      .collect()
  }

  fn title(&self, count: usize) -> String {
    let base = if let Some(e) = self.query.error() {
      format!(" Exchanges (error: {})", e)
    } else if self.query.is_loading() {
      " Exchanges (loading...)".to_string()
    } else {
      format!(" Exchanges ({})", count)
    };
    let source = self
      .query
      .data()
      .filter(|r| r.is_degraded())
      .map(|r| format!(" [{}]", r.source.label()))
      .unwrap_or_default();
    format!("{}{}{} ", base, source, self.search.title_suffix())
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let today = today();
    let exchanges = self.exchanges();
    let len = exchanges.len();
    let block = titled_block(self.title(len), Color::Blue);

    if exchanges.is_empty() && !self.query.is_loading() {
      let text = if self.query.is_error() {
        "Failed to load exchanges. Press 'r' to retry."
      } else {
        "No exchanges found."
      };
      render_placeholder(frame, area, block, text);
      return;
    }

    let items: Vec<ListItem> = exchanges
      .iter()
      .map(|exchange| {
        let (deadline, deadline_color) = deadline_label(exchange.next_deadline(today), today);
        let value = exchange
          .exchange_value
          .map(format_currency)
          .unwrap_or_else(|| "-".to_string());
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<11}", exchange.status.label()),
            Style::default().fg(exchange_status_color(exchange.status)),
          ),
          Span::raw(format!("{:<36}", truncate(&exchange.name, 35))),
          Span::styled(
            format!("{:<22}", truncate(exchange.client_name.as_deref().unwrap_or("-"), 21)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(format!("{:>14}  ", value)),
          Span::styled(deadline, Style::default().fg(deadline_color)),
        ]))
      })
      .collect();

    ensure_valid_selection(&mut self.list_state, len);
    let list = List::new(items)
      .block(block)
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for ExchangeListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(form) = &mut self.create {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          self.create = None;
          return self.submit_create(values);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.create = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match self.search.handle_key(key) {
      KeyResult::Event(_) => {
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    let len = self.exchanges().len();
    if navigate_list(&mut self.list_state, key, len) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('n') => self.create = Some(Self::create_form()),
      KeyCode::Enter => {
        let selected = self
          .list_state
          .selected()
          .and_then(|i| self.exchanges().get(i).map(|e| (*e).clone()));
        if let Some(exchange) = selected {
          return ViewAction::Push(Box::new(ExchangeDetailView::new(
            self.ctx.clone(),
            exchange,
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
    if let Some(form) = &self.create {
      form.render(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Exchanges".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    match poll_mutation(&mut self.mutation) {
      Some(outcome) => {
        if outcome.is_ok() {
          self.query.refetch();
        }
        ViewAction::Notify(outcome.into())
      }
      None => ViewAction::None,
    }
  }

  fn is_capturing_input(&self) -> bool {
    self.search.is_active() || self.create.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(12),
      ShortcutInfo::new("enter", "open").with_priority(14),
      ShortcutInfo::new("n", "new").with_priority(18),
      ShortcutInfo::new("r", "reload").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

/// Dollar amount typed by a user: `$1,250,000` or `1250000.50`.
fn parse_amount(input: &str) -> Option<f64> {
  let digits: String = input
    .trim()
    .trim_start_matches('$')
    .chars()
    .filter(|c| *c != ',')
    .collect();
  digits
    .parse::<f64>()
    .ok()
    .filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use crate::ui::views::tests::{code, key, render_text, tick_until, type_text};
  use serde_json::json;
  use crate::ui::view::NoticeLevel;
  use wiremock::matchers::{body_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn server_with_exchanges() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/exchanges"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "exchanges": [
          { "id": "e1", "name": "Maple St", "status": "45D", "client_name": "Acme",
            "exchange_value": 1250000.0 },
          { "id": "e2", "name": "Oak Ave", "status": "COMPLETED", "client_name": "Birch LLC" }
        ]
      })))
      .mount(&server)
      .await;
    server
  }

  #[tokio::test]
  async fn test_lists_and_searches_exchanges() {
    let server = server_with_exchanges().await;
    let mut view = ExchangeListView::new(context_for(&server));
    tick_until(&mut view, |v| v.query.is_success()).await;
    assert_eq!(view.exchanges().len(), 2);

    let screen = render_text(&mut view);
    assert!(screen.contains("Maple St"));
    assert!(screen.contains("$1,250,000"));

    view.handle_key(key('/'));
    assert!(view.is_capturing_input());
    type_text(&mut view, "birch");
    view.handle_key(code(KeyCode::Enter));
    assert!(!view.is_capturing_input());
    let names: Vec<_> = view.exchanges().iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec!["Oak Ave"]);
  }

  #[tokio::test]
  async fn test_enter_opens_detail() {
    let server = server_with_exchanges().await;
    let mut view = ExchangeListView::new(context_for(&server));
    tick_until(&mut view, |v| v.query.is_success()).await;
    render_text(&mut view);

    view.handle_key(key('j'));
    match view.handle_key(code(KeyCode::Enter)) {
      ViewAction::Push(detail) => assert_eq!(detail.breadcrumb_label(), "Oak Ave"),
      other => panic!("expected push, got {:?}", other),
    }
  }

  #[test]
  fn test_parse_amount() {
    assert_eq!(parse_amount("$1,250,000"), Some(1_250_000.0));
    assert_eq!(parse_amount(" 900000.5 "), Some(900_000.5));
    assert_eq!(parse_amount("a lot"), None);
    assert_eq!(parse_amount("-5"), None);
  }

  #[tokio::test]
  async fn test_create_posts_and_reloads_list() {
    let server = server_with_exchanges().await;
    Mock::given(method("POST"))
      .and(path("/exchanges"))
      .and(body_json(json!({
        "name": "Pine Rd",
        "client_name": "Cedar Trust",
        "exchange_value": 750000.0
      })))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({
        "exchange": { "id": "e3", "name": "Pine Rd", "status": "PENDING" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let ctx = context_for(&server);
    let mut view = ExchangeListView::new(ctx.clone());
    tick_until(&mut view, |v| v.query.is_success()).await;
    assert!(ctx.caches.exchanges.has("exchanges"));

    view.handle_key(key('n'));
    assert!(view.is_capturing_input());
    type_text(&mut view, "Pine Rd");
    view.handle_key(code(KeyCode::Enter));
    type_text(&mut view, "Cedar Trust");
    view.handle_key(code(KeyCode::Enter));
    type_text(&mut view, "$750,000");
    view.handle_key(code(KeyCode::Enter));
    view.handle_key(code(KeyCode::Enter));
    assert!(!view.is_capturing_input());

    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Created exchange Pine Rd"
    ));
    assert!(view.query.is_loading());
  }

  #[tokio::test]
  async fn test_create_rejects_bad_value() {
    let server = server_with_exchanges().await;
    let mut view = ExchangeListView::new(context_for(&server));

    view.handle_key(key('n'));
    type_text(&mut view, "Pine Rd");
    view.handle_key(code(KeyCode::Enter));
    view.handle_key(code(KeyCode::Enter));
    type_text(&mut view, "lots");
    view.handle_key(code(KeyCode::Enter));
    match view.handle_key(code(KeyCode::Enter)) {
      ViewAction::Notify(n) => {
        assert_eq!(n.level, NoticeLevel::Error);
        assert_eq!(n.text, "Invalid value: lots");
      }
      other => panic!("expected notice, got {:?}", other),
    }
    assert!(view.mutation.is_none());
  }
}
