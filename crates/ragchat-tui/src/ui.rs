use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use ragchat_core::{ChatRole, InputBuffer, OperationKind, Slot};

use crate::app::{App, IndexField, InputMode, Screen};

/// Parse a line of text and convert **bold** and `code` markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else if c == '`' {
            let mut code = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '`' {
                    found_close = true;
                    break;
                }
                code.push(c);
            }

            if found_close && !code.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(code, Style::default().fg(Color::Green)));
            } else {
                current_text.push('`');
                current_text.push_str(&code);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Index => render_index_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let busy: Vec<&str> = OperationKind::ALL
        .iter()
        .filter(|kind| app.view.guards.is_busy(**kind))
        .map(|kind| kind.as_str())
        .collect();
    let busy_indicator = if busy.is_empty() {
        String::new()
    } else {
        format!(" [{}…]", busy.join(", "))
    };

    let title = Line::from(vec![
        Span::styled(" RAG Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.view.mode.display_name()),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ),
        Span::styled(format!(" {}", app.base_url), Style::default().fg(Color::Gray)),
        Span::styled(busy_indicator, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Chat => " CHAT ",
        Screen::Index => " INDEX ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let pairs: Vec<[Span; 2]> = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => vec![
            hint(" i ", " type "),
            hint(" j/k ", " scroll "),
            hint(" m ", " mode "),
            hint(" Tab ", " index "),
            hint(" r ", " status "),
            hint(" q ", " quit "),
        ],
        (Screen::Chat, InputMode::Editing) => vec![
            hint(" Enter ", " send "),
            hint(" Esc ", " done "),
        ],
        (Screen::Index, InputMode::Normal) => vec![
            hint(" i ", " edit "),
            hint(" s ", " index "),
            hint(" x ", " reindex "),
            hint(" r ", " status "),
            hint(" Tab ", " chat "),
            hint(" q ", " quit "),
        ],
        (Screen::Index, InputMode::Editing) => vec![
            hint(" Tab ", " field "),
            hint(" Enter ", " next/run "),
            hint(" Esc ", " done "),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(pairs.into_iter().flatten());

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", app.view.mode.display_name()));

    let chat_text = if app.view.messages.is_empty() && !app.view.thinking {
        Text::from(Span::styled(
            "Start a conversation by typing a message below.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.view.messages {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                ChatRole::Assistant if msg.is_error() => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(Span::styled(
                            line.to_string(),
                            Style::default().fg(Color::Red),
                        )));
                    }
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                    if !msg.citations.is_empty() {
                        lines.push(Line::from(Span::styled(
                            "Sources:",
                            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                        )));
                        for (i, citation) in msg.citations.iter().enumerate() {
                            lines.push(Line::from(vec![
                                Span::styled(format!(" [{}] ", i + 1), Style::default().fg(Color::Magenta)),
                                Span::raw(citation.location()),
                            ]));
                            if let Some(first) = citation.snippet.lines().next() {
                                if !first.trim().is_empty() {
                                    lines.push(Line::from(Span::styled(
                                        format!("     {}", first.trim()),
                                        Style::default().fg(Color::DarkGray),
                                    )));
                                }
                            }
                        }
                    }
                }
            }
            lines.push(Line::default());
        }

        if app.view.thinking {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    let title = if app.view.thinking {
        " Waiting for answer... "
    } else if editing {
        " Ask (Enter to send, Esc to stop typing) "
    } else {
        " Ask (i to type) "
    };
    let border_color = if app.view.thinking {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else if app.view.can_send {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    render_input(frame, input_area, &app.view.input, title, border_color, editing);
}

/// Single-line input box that scrolls horizontally to keep the cursor visible.
fn render_input(
    frame: &mut Frame,
    area: Rect,
    input: &InputBuffer,
    title: &str,
    border_color: Color,
    show_cursor: bool,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input
        .text()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if show_cursor {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_index_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [form_area, status_area] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(area);

    let [repo_area, root_area, result_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(form_area);

    let editing = app.input_mode == InputMode::Editing;
    let field_color = |field: IndexField| {
        if app.index_field != field {
            Color::DarkGray
        } else if editing {
            Color::Yellow
        } else {
            Color::Cyan
        }
    };

    render_input(
        frame,
        repo_area,
        &app.repo_input,
        " Repository name ",
        field_color(IndexField::RepoName),
        editing && app.index_field == IndexField::RepoName,
    );
    render_input(
        frame,
        root_area,
        &app.root_input,
        " Root path (optional) ",
        field_color(IndexField::RootPath),
        editing && app.index_field == IndexField::RootPath,
    );

    render_index_result(app, frame, result_area);

    let [corpus_area, reindex_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(5),
    ])
    .areas(status_area);

    render_corpus_status(app, frame, corpus_area);
    render_reindex_result(app, frame, reindex_area);
}

fn render_index_result(app: &App, frame: &mut Frame, area: Rect) {
    let indexing = app.view.guards.is_busy(OperationKind::Index);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if indexing { Color::Yellow } else { Color::DarkGray }))
        .title(" Last index run ");

    let label = Style::default().fg(Color::Gray);
    let row = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<20}", name), label),
            Span::raw(value),
        ])
    };

    let mut lines: Vec<Line> = Vec::new();
    if indexing {
        lines.push(Line::from(Span::styled(
            "Indexing...",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    }

    match &app.view.index {
        Slot::Empty if !indexing => lines.push(Line::from(Span::styled(
            "No index run yet. Press i to enter a repository, then s to index.",
            Style::default().fg(Color::DarkGray),
        ))),
        Slot::Empty => {}
        Slot::Failed(msg) => lines.push(Line::from(Span::styled(
            format!("Error: {}", msg),
            Style::default().fg(Color::Red),
        ))),
        Slot::Ready(result) => {
            lines.push(row("Repository id", result.repository_id.to_string()));
            lines.push(row("Files scanned", result.files_scanned.to_string()));
            lines.push(row("Files indexed", result.files_indexed.to_string()));
            lines.push(row("Files skipped", result.files_skipped.to_string()));
            lines.push(row("Documents upserted", result.documents_upserted.to_string()));
            lines.push(row("Chunks created", result.chunks_created.to_string()));
            lines.push(row("Chunks embedded", result.chunks_embedded.to_string()));
            lines.push(row(
                "Elapsed",
                format!("{:.1}s", result.elapsed_ms_total as f64 / 1000.0),
            ));
            if let Some(err) = &result.embedding_error {
                lines.push(Line::from(Span::styled(
                    format!("Embedding error: {}", err),
                    Style::default().fg(Color::Red),
                )));
            }
        }
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_corpus_status(app: &App, frame: &mut Frame, area: Rect) {
    let refreshing = app.view.guards.is_busy(OperationKind::Status);
    let title = if refreshing {
        " Corpus status (refreshing...) "
    } else {
        " Corpus status (r to refresh) "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    let Some(status) = app.view.status else {
        let text = match app.view.guards.get(OperationKind::Status).last_error() {
            Some(err) => Line::from(Span::styled(
                format!("Status unknown: {}", err),
                Style::default().fg(Color::Red),
            )),
            None => Line::from(Span::styled("Loading...", Style::default().fg(Color::DarkGray))),
        };
        frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), area);
        return;
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [counts_area, gauge_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(inner);

    let label = Style::default().fg(Color::Gray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("{:<20}", "Repositories"), label),
            Span::raw(status.repository_count.to_string()),
        ]),
        Line::from(vec![
            Span::styled(format!("{:<20}", "Documents"), label),
            Span::raw(status.document_count.to_string()),
        ]),
        Line::from(vec![
            Span::styled(format!("{:<20}", "Chunks"), label),
            Span::raw(status.chunks_total.to_string()),
        ]),
        Line::from(vec![
            Span::styled(format!("{:<20}", "With embedding"), label),
            Span::raw(status.chunks_with_embedding.to_string()),
        ]),
        Line::from(vec![
            Span::styled(format!("{:<20}", "Missing embedding"), label),
            Span::styled(
                status.chunks_missing_embedding.to_string(),
                if status.chunks_missing_embedding > 0 {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                },
            ),
        ]),
    ];
    if let Some(warning) = &app.view.status_warning {
        lines.push(Line::from(Span::styled(
            format!("Warning: {}", warning),
            Style::default().fg(Color::Yellow),
        )));
    }
    // Stale-but-present: the last good snapshot stays up, the failure is noted.
    if let Some(err) = app.view.guards.get(OperationKind::Status).last_error() {
        lines.push(Line::from(Span::styled(
            format!("Last refresh failed: {}", err),
            Style::default().fg(Color::Red),
        )));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), counts_area);

    let coverage = status.embedding_coverage();
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .ratio(coverage)
        .label(format!("{:.0}% embedded", coverage * 100.0));
    frame.render_widget(gauge, gauge_area);
}

fn render_reindex_result(app: &App, frame: &mut Frame, area: Rect) {
    let reindexing = app.view.guards.is_busy(OperationKind::Reindex);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if reindexing { Color::Yellow } else { Color::DarkGray }))
        .title(" Embedding backfill (x to run) ");

    let line = if reindexing {
        Line::from(Span::styled(
            "Backfilling embeddings...",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
    } else {
        match &app.view.reindex {
            Slot::Empty => Line::from(Span::styled("Not run yet.", Style::default().fg(Color::DarkGray))),
            Slot::Ready(summary) => Line::from(summary.clone()),
            Slot::Failed(msg) => Line::from(Span::styled(
                format!("Error: {}", msg),
                Style::default().fg(Color::Red),
            )),
        }
    };

    frame.render_widget(Paragraph::new(line).block(block).wrap(Wrap { trim: true }), area);
}
