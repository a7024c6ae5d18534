use anyhow::Result;
use tracing_subscriber::EnvFilter;

use kisan_mitra::{app::App, config::Config, handler, tui, ui};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to a file; stdout belongs to the terminal UI.
    let _guard = init_logging();

    let config_path = Config::config_path()?;
    let config = Config::load()?;
    let mut app = App::new(config, config_path)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event).await?,
            None => break,
        }
    }

    tui::restore()?;
    Ok(())
}

fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let dir = dirs::data_dir()?.join("kisan-mitra").join("logs");
    std::fs::create_dir_all(&dir).ok()?;

    let appender = tracing_appender::rolling::daily(dir, "kisan-mitra.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}
