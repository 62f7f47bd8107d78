use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap,
};
use ratatui::Frame;
use regex::Regex;
use time::OffsetDateTime;
use unicode_width::UnicodeWidthStr;

use crate::app::actions::{NotificationLevel, ReviewStatus};
use crate::app::state::{DashboardState, FocusPane, LoadStatus, OverlayState, RecordDetail};
use crate::highlight::build_highlight_regex;
use crate::model::display_category;

pub fn draw_app(frame: &mut Frame, state: &DashboardState, table_state: &mut TableState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.size());

    render_tabs(frame, state, vertical[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(vertical[1]);

    render_table(frame, state, table_state, columns[0]);
    render_detail(frame, state, columns[1]);

    let status = Paragraph::new(build_status_line(state))
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(status, vertical[2]);

    render_overlay(frame, state);
}

fn render_tabs(frame: &mut Frame, state: &DashboardState, area: Rect) {
    let sections = state.sections();
    let titles: Vec<Line> = sections
        .iter()
        .map(|section| {
            let count = state.collections().len(*section);
            match state.load_status(*section) {
                LoadStatus::Failed(_) => Line::from(vec![
                    Span::raw(format!("{} ", section.title())),
                    Span::styled("!", Style::default().fg(Color::Red)),
                ]),
                LoadStatus::NotLoaded => Line::from(format!("{} …", section.title())),
                LoadStatus::Loaded(_) => Line::from(format!("{} ({count})", section.title())),
            }
        })
        .collect();
    let selected = sections
        .iter()
        .position(|section| *section == state.active)
        .unwrap_or(0);
    let title = match state.admin_name() {
        Some(name) => format!("Estate Desk · {name}"),
        None => "Estate Desk · signed out".to_string(),
    };
    let tabs = Tabs::new(titles)
        .block(Block::default().title(title).borders(Borders::ALL))
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn render_table(
    frame: &mut Frame,
    state: &DashboardState,
    table_state: &mut TableState,
    area: Rect,
) {
    let border_style = if matches!(state.focus, FocusPane::Table) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let highlight_regex = build_highlight_regex(&[state.filter().id_query().to_string()]);
    let highlight_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let shows_category = state.active.has_category();

    let rows_data = state.rows();
    let rows: Vec<Row> = rows_data
        .iter()
        .map(|row| {
            let pending = state.is_pending(state.active, &row.id);
            let id_style = if pending {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            let mut cells = vec![Cell::from(Line::from(highlight_line(
                row.id.as_str(),
                highlight_regex.as_ref(),
                highlight_style,
                id_style,
            )))];
            if shows_category {
                cells.push(Cell::from(display_category(row.category)));
            }
            cells.push(Cell::from(row.label.clone()));
            cells.push(Cell::from(row.created.clone()));
            Row::new(cells)
        })
        .collect();

    let mut header = vec!["ID"];
    let mut widths = vec![Constraint::Length(26)];
    if shows_category {
        header.push("Type");
        widths.push(Constraint::Length(12));
    }
    header.extend(["Summary", "Created"]);
    widths.extend([Constraint::Min(16), Constraint::Length(17)]);

    let total = state.collections().len(state.active);
    let title = if state.filter().is_empty() {
        format!("{} ({total})", state.active.title())
    } else {
        format!("{} ({}/{total})", state.active.title(), rows_data.len())
    };

    if rows.is_empty() {
        let message = match state.load_status(state.active) {
            LoadStatus::Failed(err) => format!("Could not load {}: {err}", state.active.title()),
            LoadStatus::NotLoaded => "Loading… (Ctrl-r to refresh)".to_string(),
            LoadStatus::Loaded(_) if total > 0 => "No records match the filter.".to_string(),
            LoadStatus::Loaded(_) => format!("No {} right now.", state.active.title()),
        };
        let empty = Paragraph::new(message).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border_style),
        );
        frame.render_widget(empty, area);
        return;
    }

    let table = Table::new(rows, widths)
        .header(
            Row::new(header).style(
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::BOLD),
            ),
        )
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, table_state);
}

fn render_detail(frame: &mut Frame, state: &DashboardState, area: Rect) {
    let border_style = if matches!(state.focus, FocusPane::Detail) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let text = state
        .selected_detail()
        .map(detail_text)
        .unwrap_or_else(|| Text::from("Select a record to see its details."));
    let detail = Paragraph::new(text)
        .block(
            Block::default()
                .title("Details")
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(detail, area);
}

fn detail_text(detail: RecordDetail) -> Text<'static> {
    let mut lines = vec![
        Line::from(Span::styled(
            detail.heading,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(field_lines(detail.fields));
    if !detail.attachments.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Documents ({})", detail.attachments.len()),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for attachment in detail.attachments {
            lines.push(Line::from(Span::styled(
                format!("• {}", attachment.url),
                Style::default().fg(Color::Blue),
            )));
        }
    }
    Text::from(lines)
}

fn field_lines(fields: Vec<(&'static str, String)>) -> Vec<Line<'static>> {
    let key_width = fields
        .iter()
        .map(|(key, _)| key.width())
        .max()
        .unwrap_or(0);
    fields
        .into_iter()
        .map(|(key, value)| {
            let padding = " ".repeat(key_width.saturating_sub(key.width()));
            Line::from(vec![
                Span::styled(format!("{key}{padding}  "), Style::default().fg(Color::Gray)),
                Span::raw(value),
            ])
        })
        .collect()
}

fn build_status_line(state: &DashboardState) -> Text<'static> {
    if let Some(input) = &state.filter_input {
        let mut spans = vec![
            Span::styled("Filter /", Style::default().fg(Color::Cyan)),
            Span::styled(
                input.buffer.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled("▌", Style::default().fg(Color::Cyan)),
        ];
        if let Some(error) = &input.error {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                format!("! {error}"),
                Style::default().fg(Color::Red),
            ));
        }
        return Text::from(Line::from(spans));
    }

    let total = state.rows().len();
    let position = if total == 0 {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, total)
    };
    let mut spans = vec![
        Span::raw("Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
    ];
    for chip in state.filter_chips() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("[{chip}]"),
            Style::default().fg(Color::Green),
        ));
    }
    if let LoadStatus::Failed(err) = state.load_status(state.active) {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(err, Style::default().fg(Color::Red)));
    }
    if let Some(message) = &state.status_message {
        let style = match state.latest_notification() {
            Some(notification) if notification.text == *message => match notification.level {
                NotificationLevel::Success => Style::default().fg(Color::Green),
                NotificationLevel::Error => Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD),
            },
            _ => Style::default().fg(Color::White),
        };
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(message.clone(), style));
    }
    spans.push(Span::styled(
        "  ? help",
        Style::default().fg(Color::DarkGray),
    ));
    Text::from(Line::from(spans))
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    if let Some(re) = regex {
        let mut spans = Vec::new();
        let mut last = 0;
        for mat in re.find_iter(text) {
            if mat.start() > last {
                spans.push(Span::styled(
                    text[last..mat.start()].to_string(),
                    base_style,
                ));
            }
            spans.push(Span::styled(mat.as_str().to_string(), highlight_style));
            last = mat.end();
        }
        if last < text.len() {
            spans.push(Span::styled(text[last..].to_string(), base_style));
        }
        if spans.is_empty() {
            spans.push(Span::styled(text.to_string(), base_style));
        }
        spans
    } else {
        vec![Span::styled(text.to_string(), base_style)]
    }
}

fn render_overlay(frame: &mut Frame, state: &DashboardState) {
    match &state.overlay {
        Some(OverlayState::Confirm(prepared)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let verb = prepared.action.kind.to_string();
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("Really {verb} this {}?", prepared.action.section.noun().to_lowercase()),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(prepared.label.clone()),
                Line::from(Span::styled(
                    format!("ID {}", prepared.id),
                    Style::default().fg(Color::Gray),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter to confirm • Esc to cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title(format!("Confirm {verb}"))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Reviewed) => {
            let area = centered_rect(70, 60, frame.size());
            frame.render_widget(Clear, area);
            let mut lines: Vec<Line> = state
                .decisions()
                .map(|decision| {
                    let style = match decision.to {
                        ReviewStatus::Approved => Style::default().fg(Color::Green),
                        _ => Style::default().fg(Color::Red),
                    };
                    Line::from(vec![
                        Span::styled(format!("{:<9}", decision.to.to_string()), style),
                        Span::styled(
                            format!("{:<22}", decision.section.title()),
                            Style::default().fg(Color::Gray),
                        ),
                        Span::raw(
                            decision
                                .label
                                .clone()
                                .unwrap_or_else(|| decision.id.to_string()),
                        ),
                    ])
                })
                .collect();
            if lines.is_empty() {
                lines.push(Line::from("Nothing reviewed yet this session."));
            }
            let paragraph = Paragraph::new(lines).block(
                Block::default()
                    .title("Reviewed (Esc to close)")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Profile) => {
            let area = centered_rect(50, 40, frame.size());
            frame.render_widget(Clear, area);
            let lines = match (&state.profile, state.signed_in) {
                (Some(profile), _) => field_lines(profile.summary_at(OffsetDateTime::now_utc())),
                (None, true) => vec![Line::from("Signed in with an opaque token.")],
                (None, false) => vec![
                    Line::from("Not signed in."),
                    Line::from(Span::styled(
                        "Run `estatedesk login <token>` to manage protected sections.",
                        Style::default().fg(Color::Gray),
                    )),
                ],
            };
            let paragraph = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title("Admin profile (Esc to close)")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Help) => {
            let area = centered_rect(50, 60, frame.size());
            frame.render_widget(Clear, area);
            let keys = [
                ("Tab / Shift-Tab", "next / previous section"),
                ("1-7", "jump to section"),
                ("j / k", "move selection"),
                ("Enter", "toggle details focus"),
                ("/", "filter (type:<kind> <id>)"),
                ("t", "cycle property type"),
                ("c", "clear filter"),
                ("a", "accept / verify"),
                ("x", "reject"),
                ("d", "delete"),
                ("v", "reviewed this session"),
                ("p", "admin profile"),
                ("Ctrl-r", "refresh"),
                ("q", "quit"),
            ];
            let lines: Vec<Line> = keys
                .iter()
                .map(|(key, what)| {
                    Line::from(vec![
                        Span::styled(
                            format!("{key:<16}"),
                            Style::default()
                                .fg(Color::Cyan)
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(*what),
                    ])
                })
                .collect();
            let paragraph = Paragraph::new(lines).block(
                Block::default()
                    .title("Keys (Esc to close)")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::api::{ActionKind, ApiClient};
    use crate::app::actions::ActionDispatcher;
    use crate::model::{Attachment, PropertyCategory, PropertyListing, RecordId, Section};
    use crate::session::AdminProfile;
    use crate::search::{CategoryFilter, FilterCriteria};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn dashboard() -> DashboardState {
        let mut state = DashboardState::new(Section::Properties);
        state.collections_mut().properties = vec![PropertyListing {
            id: RecordId::new("ab12cd"),
            title: "Corner plot".into(),
            property_type: Some(PropertyCategory::Land),
            location: "Nashik".into(),
            price: None,
            owner_name: None,
            owner_contact: None,
            description: None,
            images: vec![Attachment {
                url: "https://cdn/img.jpg".into(),
                public_id: "img".into(),
            }],
            created_at: None,
        }];
        state
    }

    #[test]
    fn highlight_splits_around_matches() {
        let regex = build_highlight_regex(&["12".into()]);
        let spans = highlight_line("ab12cd", regex.as_ref(), Style::default(), Style::default());
        let parts: Vec<_> = spans.iter().map(|span| span.content.to_string()).collect();
        assert_eq!(parts, vec!["ab", "12", "cd"]);
    }

    #[test]
    fn draws_rows_and_details() {
        let state = dashboard();
        let backend = TestBackend::new(140, 30);
        let mut terminal = Terminal::new(backend).expect("terminal");
        let mut table_state = TableState::default();
        table_state.select(Some(0));
        terminal
            .draw(|frame| draw_app(frame, &state, &mut table_state))
            .expect("draw");
        let text = buffer_text(&terminal);
        assert!(text.contains("ab12cd"));
        assert!(text.contains("Corner plot (Nashik)"));
        assert!(text.contains("Documents (1)"));
    }

    fn render(state: &DashboardState) -> String {
        let backend = TestBackend::new(140, 30);
        let mut terminal = Terminal::new(backend).expect("terminal");
        let mut table_state = TableState::default();
        terminal
            .draw(|frame| draw_app(frame, state, &mut table_state))
            .expect("draw");
        buffer_text(&terminal)
    }

    #[tokio::test]
    async fn accepted_listing_shows_as_approved() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"success":true}"#);
        let api = ApiClient::new(transport);
        let dispatcher = ActionDispatcher::new(&api);
        let mut state = dashboard();

        let prepared = state.prepare_action(ActionKind::Accept).expect("prepared");
        state.perform(&dispatcher, &prepared).await;
        assert!(state.rows().is_empty());

        state.overlay = Some(OverlayState::Reviewed);
        let text = render(&state);
        assert!(text.contains("approved"));
        assert!(text.contains("Corner plot (Nashik)"));
    }

    #[test]
    fn reviewed_panel_without_decisions_says_so() {
        let mut state = dashboard();
        state.overlay = Some(OverlayState::Reviewed);
        assert!(render(&state).contains("Nothing reviewed yet this session."));
    }

    #[test]
    fn profile_panel_shows_token_claims() {
        let mut state = dashboard();
        state.signed_in = true;
        state.profile = Some(AdminProfile {
            id: Some("65f0".into()),
            admin_id: Some("root".into()),
            issued_at: None,
            expires_at: None,
        });
        state.overlay = Some(OverlayState::Profile);
        let text = render(&state);
        assert!(text.contains("Estate Desk · root"));
        assert!(text.contains("65f0"));
        assert!(text.contains("active"));
    }

    #[test]
    fn profile_panel_when_signed_out() {
        let mut state = dashboard();
        state.overlay = Some(OverlayState::Profile);
        let text = render(&state);
        assert!(text.contains("signed out"));
        assert!(text.contains("Not signed in."));
    }

    #[test]
    fn empty_filter_result_is_explained() {
        let mut state = dashboard();
        state.set_filter(FilterCriteria::new(CategoryFilter::All, "zz"));
        let backend = TestBackend::new(140, 30);
        let mut terminal = Terminal::new(backend).expect("terminal");
        let mut table_state = TableState::default();
        terminal
            .draw(|frame| draw_app(frame, &state, &mut table_state))
            .expect("draw");
        assert!(buffer_text(&terminal).contains("No records match the filter."));
    }
}
