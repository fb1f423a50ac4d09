mod app;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use geopol_map::logging::init_logging;
use geopol_map::{FeatureCollection, MapConfig};
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Police facilities of Stuttgart on a terminal map
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GeoJSON file with the facilities (defaults to the built-in Stuttgart set)
    #[arg(short, long)]
    features: Option<PathBuf>,

    /// Start with clustering enabled
    #[arg(long)]
    clustering: bool,

    /// Initial zoom level
    #[arg(short, long)]
    zoom: Option<f64>,
}

fn load_config(args: &Args) -> Result<MapConfig> {
    let mut config = match &args.config {
        Some(path) => MapConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => MapConfig::default(),
    };
    if args.clustering {
        config.clustering.enabled = true;
    }
    if let Some(zoom) = args.zoom {
        config.view.zoom = zoom;
    }
    if let Some(path) = &args.features {
        config.data.features = Some(path.clone());
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_features(config: &MapConfig) -> Result<FeatureCollection> {
    match &config.data.features {
        Some(path) => FeatureCollection::load(path)
            .with_context(|| format!("loading features from {}", path.display())),
        None => Ok(FeatureCollection::stuttgart()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _log_guard = init_logging(&config.logging).context("initializing logging")?;
    let features = load_features(&config)?;
    info!(features = features.len(), clustering = config.clustering.enabled, "starting");

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, config, features);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Handle mouse events for selecting, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        // Scroll wheel zooms towards the mouse position
        MouseEventKind::ScrollUp => app.zoom_at(mouse.column, mouse.row, 1.0),
        MouseEventKind::ScrollDown => app.zoom_at(mouse.column, mouse.row, -1.0),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-4, 0),
        MouseEventKind::ScrollRight => app.pan(4, 0),
        MouseEventKind::Down(MouseButton::Left) => app.press(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.release(mouse.column, mouse.row),
        MouseEventKind::Moved => app.set_mouse_pos(mouse.column, mouse.row),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, config: MapConfig, features: FeatureCollection) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(config, features, size.width as usize, size.height as usize);

    loop {
        app.tick();

        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') => app.quit(),
                    KeyCode::Esc => app.close_popup(),

                    // Pan with hjkl or arrow keys
                    KeyCode::Left | KeyCode::Char('h') => app.pan(-4, 0),
                    KeyCode::Right | KeyCode::Char('l') => app.pan(4, 0),
                    KeyCode::Up | KeyCode::Char('k') => app.pan(0, -2),
                    KeyCode::Down | KeyCode::Char('j') => app.pan(0, 2),

                    // Zoom
                    KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                    KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                    KeyCode::Char('c') | KeyCode::Char('C') => app.toggle_clustering(),
                    KeyCode::Char('r') => app.reinit(),

                    _ => {}
                },
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
