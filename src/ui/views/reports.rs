use crate::api::types::DashboardStats;
use crate::cache::CacheResult;
use crate::context::AppContext;
use crate::query::Query;
use crate::stores::{format_currency, ReportsStore};
use crate::ui::renderfns::{deadline_label, exchange_status_color, source_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{titled_block, today};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Gauge, Paragraph};

const DEADLINE_WINDOW_DAYS: i64 = 30;
const BAR_WIDTH: usize = 30;
const TASK_WINDOW_DAYS: i64 = 7;

/// Dashboard of figures derived from the exchange and task lists, plus the
/// backend's own counters.
pub struct ReportsView {
  store: ReportsStore,
  stats: Query<CacheResult<DashboardStats>>,
}

impl ReportsView {
  pub fn new(ctx: AppContext) -> Self {
    let smart = ctx.smart.clone();
    let mut stats = Query::new(move || {
      let smart = smart.clone();
      async move { smart.get_dashboard_stats().await }
    });
    stats.fetch();

    Self {
      store: ReportsStore::new(ctx.api.clone(), &ctx.caches),
      stats,
    }
  }

  fn summary_lines(&self) -> Vec<Line<'static>> {
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
    let mut lines = vec![Line::from(vec![
      label("Exchanges: "),
      Span::raw(format!("{:<6}", self.store.exchanges().len())),
      label("Active: "),
      Span::styled(
        format!("{:<6}", self.store.active_count()),
        Style::default().fg(Color::Yellow),
      ),
      label("Portfolio value: "),
      Span::styled(
        format_currency(self.store.total_value()),
        Style::default().fg(Color::Green).bold(),
      ),
    ])];

    match (self.stats.data(), self.stats.error()) {
      (Some(result), _) => {
        let s = &result.data;
        let mut spans = vec![
          label("Backend: "),
          Span::raw(format!(
            "{} exchanges ({} completed) · {} pending tasks · {} overdue · {} documents · {} users",
            s.total_exchanges,
            s.completed_exchanges,
            s.pending_tasks,
            s.overdue_tasks,
            s.total_documents,
            s.total_users
          )),
        ];
        if result.is_degraded() {
          spans.push(Span::styled(
            format!("  [{}]", result.source.label()),
            Style::default().fg(source_color(result.source)),
          ));
        }
        lines.push(Line::from(spans));
      }
      (None, Some(e)) => lines.push(Line::styled(
        format!("Backend stats unavailable: {}", e),
        Style::default().fg(Color::Red),
      )),
      (None, None) => lines.push(Line::styled(
        "Loading backend stats...",
        Style::default().fg(Color::DarkGray),
      )),
    }
    lines
  }

  fn breakdown_lines(&self) -> Vec<Line<'static>> {
    let breakdown = self.store.status_breakdown();
    let max = breakdown.iter().map(|s| s.count).max().unwrap_or(0).max(1);
    breakdown
      .into_iter()
      .map(|s| {
        let width = (s.count * BAR_WIDTH).div_ceil(max);
        let color = exchange_status_color(s.status);
        Line::from(vec![
          Span::raw(format!("{:<12}", s.status.label())),
          Span::styled("█".repeat(width), Style::default().fg(color)),
          Span::raw(format!(" {}", s.count)),
        ])
      })
      .collect()
  }

  fn deadline_lines(&self) -> Vec<Line<'static>> {
    let today = today();
    let upcoming = self.store.upcoming_deadlines(today, DEADLINE_WINDOW_DAYS);
    if upcoming.is_empty() {
      return vec![Line::styled(
        format!("Nothing due in the next {} days", DEADLINE_WINDOW_DAYS),
        Style::default().fg(Color::DarkGray),
      )];
    }
    upcoming
      .into_iter()
      .map(|(exchange, date)| {
        let (label, color) = deadline_label(Some(date), today);
        Line::from(vec![
          Span::styled(format!("{:<18}", label), Style::default().fg(color)),
          Span::raw(truncate(&exchange.name, 40)),
        ])
      })
      .collect()
  }
}

impl View for ReportsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.store.refresh();
        self.stats.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [summary, middle, tasks] = Layout::vertical([
      Constraint::Length(4),
      Constraint::Min(6),
      Constraint::Length(5),
    ])
    .areas(area);
    let [breakdown, deadlines] =
      Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(middle);

    let title = if let Some(e) = self.store.error() {
      format!(" Reports (error: {}) ", e)
    } else if self.store.is_loading() {
      " Reports (loading...) ".to_string()
    } else {
      " Reports ".to_string()
    };
    frame.render_widget(
      Paragraph::new(self.summary_lines()).block(titled_block(title, Color::Blue)),
      summary,
    );
    frame.render_widget(
      Paragraph::new(self.breakdown_lines())
        .block(titled_block(" Exchanges by status ".to_string(), Color::Blue)),
      breakdown,
    );
    frame.render_widget(
      Paragraph::new(self.deadline_lines()).block(titled_block(
        format!(" Deadlines, next {} days ", DEADLINE_WINDOW_DAYS),
        Color::Blue,
      )),
      deadlines,
    );

    let today = today();
    let task_stats = self.store.task_stats(today);
    let due_soon = self.store.tasks_due_soon(today, TASK_WINDOW_DAYS).len();
    let [counts, gauge] =
      Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(
        titled_block(" Tasks ".to_string(), Color::Blue).inner(tasks),
      );
    frame.render_widget(titled_block(" Tasks ".to_string(), Color::Blue), tasks);
    frame.render_widget(
      Paragraph::new(format!(
        "{} total · {} pending · {} in progress · {} completed · {} cancelled · {} overdue · {} due in {} days",
        task_stats.total,
        task_stats.pending,
        task_stats.in_progress,
        task_stats.completed,
        task_stats.cancelled,
        task_stats.overdue,
        due_soon,
        TASK_WINDOW_DAYS
      )),
      counts,
    );
    frame.render_widget(
      Gauge::default()
        .gauge_style(Style::default().fg(Color::Green))
        .percent(task_stats.completion_rate())
        .label(format!("{}% complete", task_stats.completion_rate())),
      gauge,
    );
  }

  fn breadcrumb_label(&self) -> String {
    "Reports".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.store.poll();
    self.stats.poll();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use crate::ui::views::tests::{render_text, tick_until};
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_renders_derived_figures() {
    let server = MockServer::start().await;
    let due = (today() + chrono::Duration::days(3)).to_string();
    Mock::given(method("GET"))
      .and(path("/exchanges"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "exchanges": [
          { "id": "e1", "name": "Maple St", "status": "45D", "exchange_value": 1000000.0 },
          { "id": "e2", "name": "Oak Ave", "status": "180D", "exchange_value": 250000.0 },
          { "id": "e3", "name": "Elm Ct", "status": "COMPLETED" }
        ]
      })))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "tasks": [
          { "id": "t1", "title": "a", "status": "completed" },
          { "id": "t2", "title": "b", "status": "pending", "due_date": due }
        ]
      })))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/dashboard/stats"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "stats": { "total_exchanges": 3, "total_users": 9 }
      })))
      .mount(&server)
      .await;

    let mut view = ReportsView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading() && !v.stats.is_loading()).await;

    let screen = render_text(&mut view);
    assert!(screen.contains("$1,250,000"));
    assert!(screen.contains("50% complete"));
    assert!(screen.contains("1 due in 7 days"));
    assert!(screen.contains("9 users"));
    assert!(screen.contains("Completed"));
  }
}
