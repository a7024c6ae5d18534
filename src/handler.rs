use std::path::Path;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, InputMode, RegisterStep, Screen};
use crate::i18n::LANGUAGES;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.drain_signals();
            app.poll_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Any keypress clears the transient notification line.
    app.status = None;

    if app.show_language_picker {
        handle_language_picker(app, key);
        return Ok(());
    }

    match app.screen {
        Screen::Home => handle_home(app, key),
        Screen::Register => handle_register(app, key),
        Screen::Dashboard => handle_dashboard(app, key),
    }
    Ok(())
}

fn handle_language_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            let i = app.language_state.selected().unwrap_or(0);
            app.language_state.select(Some((i + 1).min(LANGUAGES.len() - 1)));
        }
        KeyCode::Char('k') | KeyCode::Up => {
            let i = app.language_state.selected().unwrap_or(0);
            app.language_state.select(Some(i.saturating_sub(1)));
        }
        KeyCode::Enter => {
            if let Some(i) = app.language_state.selected() {
                app.set_language(LANGUAGES[i].code);
            }
            app.show_language_picker = false;
        }
        KeyCode::Esc => {
            app.show_language_picker = false;
        }
        _ => {}
    }
}

fn open_language_picker(app: &mut App) {
    let current = LANGUAGES.iter().position(|l| l.code == app.language);
    app.language_state.select(current.or(Some(0)));
    app.show_language_picker = true;
}

fn handle_home(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('l') => open_language_picker(app),
        KeyCode::Char('r') => {
            app.register_step = RegisterStep::Name;
            app.screen = Screen::Register;
        }
        KeyCode::Char('d') | KeyCode::Enter => {
            if app.registered() {
                app.enter_dashboard();
            } else {
                app.register_step = RegisterStep::Name;
                app.screen = Screen::Register;
            }
        }
        _ => {}
    }
}

fn handle_register(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.screen = Screen::Home,
        KeyCode::Enter => app.register_continue(),
        KeyCode::Backspace => app.register_backspace(),
        KeyCode::Char(c) => app.register_input_char(c),
        _ => {}
    }
}

fn handle_dashboard(app: &mut App, key: KeyEvent) {
    if app.active_feature.is_some() {
        handle_feature_chat(app, key);
    } else {
        handle_feature_grid(app, key);
    }
}

fn handle_feature_grid(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('l') => open_language_picker(app),
        KeyCode::Esc | KeyCode::Char('h') => app.screen = Screen::Home,
        KeyCode::Char('j') | KeyCode::Down => {
            let i = app.feature_state.selected().unwrap_or(0);
            app.feature_state
                .select(Some((i + 1).min(crate::app::FEATURES.len() - 1)));
        }
        KeyCode::Char('k') | KeyCode::Up => {
            let i = app.feature_state.selected().unwrap_or(0);
            app.feature_state.select(Some(i.saturating_sub(1)));
        }
        KeyCode::Enter => {
            if let Some(i) = app.feature_state.selected() {
                app.open_feature(i);
            }
        }
        _ => {}
    }
}

fn handle_feature_chat(app: &mut App, key: KeyEvent) {
    // Image path prompt takes over all input while open.
    if app.path_prompt.is_some() {
        handle_path_prompt(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Editing => handle_compose(app, key),
        InputMode::Normal => handle_chat_normal(app, key),
    }
}

fn handle_path_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.path_prompt = None,
        KeyCode::Backspace => {
            if let Some(p) = app.path_prompt.as_mut() {
                p.pop();
            }
        }
        KeyCode::Enter => {
            let Some(path) = app.path_prompt.take() else { return };
            if let Err(e) = app.uploader.select_file(Path::new(path.trim())) {
                // Validation errors come back as translation keys.
                let key = e.to_string();
                let message = match key.as_str() {
                    "invalid_image" | "image_too_large" => app.t(&key),
                    _ => key,
                };
                app.status = Some(message);
            }
        }
        KeyCode::Char(c) => {
            if let Some(p) = app.path_prompt.as_mut() {
                p.push(c);
            }
        }
        _ => {}
    }
}

fn handle_compose(app: &mut App, key: KeyEvent) {
    // The compose bar is disabled while a listening session is active;
    // the transcript lands in the input through the speech signal.
    if app.speech.is_listening() {
        if key.code == KeyCode::Esc {
            app.speech.stop_listening();
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.input.push('\n');
            } else {
                app.submit_message();
            }
        }
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) => app.input.push(c),
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc => app.close_feature(),
        KeyCode::Char('i') => app.input_mode = InputMode::Editing,
        KeyCode::Char('l') => open_language_picker(app),
        KeyCode::Char('m') => app.toggle_listening(),
        KeyCode::Char('j') | KeyCode::Down => {
            let last = app.messages.len().saturating_sub(1);
            let next = match app.selected_message {
                Some(i) => (i + 1).min(last),
                None => last,
            };
            app.selected_message = Some(next);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            let next = match app.selected_message {
                Some(i) => i.saturating_sub(1),
                None => app.messages.len().saturating_sub(1),
            };
            app.selected_message = Some(next);
        }
        KeyCode::Char('s') => {
            // Speak the selected message, or the latest assistant reply.
            let idx = app
                .selected_message
                .filter(|&i| !app.messages[i].is_user)
                .or_else(|| app.messages.iter().rposition(|m| !m.is_user));
            if let Some(idx) = idx {
                app.toggle_speak(idx);
            }
        }
        KeyCode::Char('o') => {
            if app.active_analysis_type().is_some() && !app.uploader.is_busy() {
                app.path_prompt = Some(String::new());
            }
        }
        KeyCode::Char('a') => app.trigger_analyze(),
        KeyCode::Char('x') => {
            if !app.uploader.is_busy() {
                app.uploader.clear();
            }
        }
        _ => {}
    }
}
