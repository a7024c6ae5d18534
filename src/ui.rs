use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::analysis::UploadState;
use crate::app::{App, FEATURES, InputMode, RegisterStep, Screen};
use crate::i18n::{LANGUAGES, language_info};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Home => render_home(app, frame, body_area),
        Screen::Register => render_register(app, frame, body_area),
        Screen::Dashboard => {
            if app.active_feature.is_some() {
                render_feature_chat(app, frame, body_area);
            } else {
                render_feature_grid(app, frame, body_area);
            }
        }
    }

    render_footer(app, frame, footer_area);

    if app.show_language_picker {
        render_language_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let language = language_info(app.language);
    let title = format!(" 🌾 {} ", app.t("app_name"));
    let right = format!(" {} ", language.native_name);

    let [left_area, right_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(right.chars().count() as u16),
    ])
    .areas(area);

    let left = Paragraph::new(title).style(
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(left, left_area);

    let lang = Paragraph::new(right).style(Style::default().fg(Color::Yellow));
    frame.render_widget(lang, right_area);
}

fn render_home(app: &App, frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::default(),
        Line::from(Span::styled(
            app.t("app_name"),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            app.t("tagline"),
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        Line::from(format!("r  {}", app.t("register"))),
        Line::from(format!("d  {}", app.t("open_dashboard"))),
        Line::from(format!("l  {}", app.t("choose_language"))),
    ];

    let block = Block::default().borders(Borders::ALL);
    let home = Paragraph::new(lines)
        .alignment(ratatui::layout::Alignment::Center)
        .block(block);
    frame.render_widget(home, area);
}

fn render_register(app: &App, frame: &mut Frame, area: Rect) {
    let prompt_key = match app.register_step {
        RegisterStep::Name => "registration_welcome",
        RegisterStep::Phone => "registration_phone",
        RegisterStep::Passcode => "registration_passcode",
        RegisterStep::Success => "registration_success",
    };

    let [prompt_area, input_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(3),
    ])
    .areas(area);

    let prompt = Paragraph::new(format!("🤖 {}", app.t(prompt_key)))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", app.t("register"))));
    frame.render_widget(prompt, prompt_area);

    let (value, placeholder) = match app.register_step {
        RegisterStep::Name => (app.name_input.clone(), app.t("registration_name_placeholder")),
        RegisterStep::Phone => (app.phone_input.clone(), app.t("registration_phone_placeholder")),
        RegisterStep::Passcode => (
            "•".repeat(app.passcode_input.chars().count()),
            app.t("registration_passcode_placeholder"),
        ),
        RegisterStep::Success => (String::new(), app.t("get_started")),
    };

    let (text, style) = if value.is_empty() {
        (placeholder, Style::default().fg(Color::DarkGray))
    } else {
        (value, Style::default())
    };

    let input = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(input, input_area);
}

fn render_feature_grid(app: &mut App, frame: &mut Frame, area: Rect) {
    let [greeting_area, grid_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let greeting_text = app
        .messages
        .first()
        .map(|m| m.text.clone())
        .unwrap_or_else(|| app.t("ai_greeting"));
    let greeting = Paragraph::new(format!("🤖 {}", greeting_text))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(greeting, greeting_area);

    let items: Vec<ListItem> = FEATURES
        .iter()
        .map(|f| {
            ListItem::new(vec![
                Line::from(Span::styled(
                    format!(" {} ", app.t(f.title_key)),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("   {} ", app.t(f.desc_key)),
                    Style::default().fg(Color::Gray),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Green)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, grid_area, &mut app.feature_state);
}

fn render_feature_chat(app: &App, frame: &mut Frame, area: Rect) {
    let feature = app.active_feature.map(|i| &FEATURES[i]);
    let show_uploader = app.active_analysis_type().is_some();

    let constraints = if show_uploader {
        vec![
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(3),
        ]
    } else {
        vec![Constraint::Min(0), Constraint::Length(3)]
    };
    let areas = Layout::vertical(constraints).split(area);

    // Message list
    let mut lines: Vec<Line> = Vec::new();
    for (i, msg) in app.messages.iter().enumerate() {
        let selected = app.selected_message == Some(i);
        let speaking = app.speaking_message == Some(i);

        let (prefix, color) = if msg.is_user {
            ("You", Color::Cyan)
        } else {
            ("🤖", Color::Green)
        };
        let marker = if speaking { " 🔊" } else { "" };
        let mut style = Style::default().fg(color).add_modifier(Modifier::BOLD);
        if selected {
            style = style.bg(Color::DarkGray);
        }
        lines.push(Line::from(Span::styled(format!("{}:{}", prefix, marker), style)));
        for text_line in msg.text.lines() {
            lines.push(Line::from(format!("  {}", text_line)));
        }
        lines.push(Line::default());
    }

    if app.reply_pending {
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("🤖 {}{}", app.t("analyzing"), dots),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let title = feature
        .map(|f| format!(" {} ", app.t(f.title_key)))
        .unwrap_or_default();
    let chat = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(chat, areas[0]);

    // Image uploader panel
    if show_uploader {
        render_uploader(app, frame, areas[1]);
    }

    // Compose bar
    let input_area = areas[areas.len() - 1];
    let listening = app.speech.is_listening();
    let (text, style) = if listening {
        (
            format!("🎤 {}", app.t("listening")),
            Style::default().fg(Color::Red),
        )
    } else if app.input.is_empty() && app.input_mode == InputMode::Normal {
        (app.t("type_message"), Style::default().fg(Color::DarkGray))
    } else {
        (app.input.clone(), Style::default())
    };

    let border = if app.input_mode == InputMode::Editing && !listening {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let compose = Paragraph::new(text).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    frame.render_widget(compose, input_area);
}

fn render_uploader(app: &App, frame: &mut Frame, area: Rect) {
    let (text, color) = match app.uploader.state() {
        UploadState::Empty => (format!("o  {}", app.t("choose_image")), Color::Gray),
        UploadState::Previewing => {
            let source = app
                .uploader
                .image()
                .map(|i| i.source.clone())
                .unwrap_or_default();
            (
                format!("{}  —  a: {}  x: {}", source, app.t("analyze_image"), app.t("clear_image")),
                Color::Yellow,
            )
        }
        UploadState::Uploading => (app.t("uploading"), Color::Cyan),
        UploadState::Analyzing => (app.t("analyzing"), Color::Cyan),
        UploadState::Complete => (format!("o  {}", app.t("choose_image")), Color::Green),
        UploadState::Failed => (
            app.uploader
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| app.t("analysis_failed")),
            Color::Red,
        ),
    };

    let text = if let Some(path) = &app.path_prompt {
        format!("📷 {}_", path)
    } else {
        text
    };

    let panel = Paragraph::new(text)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", app.t("choose_image"))));
    frame.render_widget(panel, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    if let Some(status) = &app.status {
        let line = Paragraph::new(status.clone()).style(Style::default().fg(Color::Red));
        frame.render_widget(line, area);
        return;
    }

    let hints: Vec<Span> = match (app.screen, app.active_feature.is_some(), app.input_mode) {
        (Screen::Home, _, _) => vec![
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Register, _, _) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(format!(" {} ", app.t("continue")), label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" back ", label_style),
        ],
        (Screen::Dashboard, false, _) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" move ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" open ", label_style),
            Span::styled(" l ", key_style),
            Span::styled(" language ", label_style),
        ],
        (Screen::Dashboard, true, InputMode::Normal) => vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" m ", key_style),
            Span::styled(" mic ", label_style),
            Span::styled(" s ", key_style),
            Span::styled(format!(" {} ", app.t("speak")), label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" back ", label_style),
        ],
        (Screen::Dashboard, true, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(format!(" {} ", app.t("send")), label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" done ", label_style),
        ],
    };

    let footer = Paragraph::new(Line::from(hints));
    frame.render_widget(footer, area);
}

fn render_language_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(40, LANGUAGES.len() as u16 + 2, area);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = LANGUAGES
        .iter()
        .map(|l| ListItem::new(format!(" {}  {} ", l.native_name, l.name)))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", app.t("choose_language"))),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Green)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.language_state);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}
