pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

/// Clamp a list selection to `len` items, selecting the first when nothing is.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let [header_area, content_area, footer_area] = Layout::vertical([
    Constraint::Length(1), // Header
    Constraint::Min(1),    // Current view
    Constraint::Length(1), // Breadcrumb and status
  ])
  .areas(frame.area());

  let shortcuts = app.shortcuts();
  renderfns::draw_header(
    frame,
    header_area,
    app.backend_label(),
    app.account_label(),
    &shortcuts,
  );

  if let Some(view) = app.current_view_mut() {
    view.render(frame, content_area);
  }
  app.command_input().render_overlay(frame, content_area);

  let breadcrumb = app.breadcrumb();
  renderfns::draw_footer(frame, footer_area, &breadcrumb, app.status());
}
