use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plantwatch::duration::parse_duration;
use plantwatch::ui::{self, Theme};
use plantwatch::{events, App, ClientConfig, Snapshot, TelemetryClient};

#[derive(Parser, Debug)]
#[command(name = "plantwatch")]
#[command(about = "Live telemetry dashboard for water-treatment plant gateways")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gateway endpoint (host:port), overrides the config file
    #[arg(short, long)]
    connect: Option<String>,

    /// Name of the event that carries telemetry frames
    #[arg(long)]
    event: Option<String>,

    /// Minimum time between accepted readings (e.g., "10s", "1m")
    #[arg(long)]
    min_interval: Option<String>,

    /// Do not reconnect after the connection is lost
    #[arg(long)]
    no_reconnect: bool,

    /// Log snapshot changes to stderr instead of drawing the dashboard
    #[arg(long)]
    headless: bool,

    /// Write logs to this file (dashboard mode logs nothing otherwise)
    #[arg(long, conflicts_with = "headless")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;
    let config = load_config(&args)?;

    let rt = Runtime::new()?;
    let connector = config.connector();
    let client = TelemetryClient::new(config, connector);

    if args.headless {
        run_headless(&rt, client)
    } else {
        run_tui(&rt, client)
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if args.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else if let Some(ref path) = args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    }

    Ok(())
}

/// Config file and environment first, then command-line overrides.
fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(args.config.as_deref())?;

    if let Some(ref endpoint) = args.connect {
        config.endpoint = endpoint.clone();
    }
    if let Some(ref event) = args.event {
        config.event = event.clone();
    }
    if let Some(ref interval) = args.min_interval {
        config.min_interval = parse_duration(interval)?;
    }
    if args.no_reconnect {
        config.session.reconnect = false;
    }

    config.validate()?;
    Ok(config)
}

/// Log every snapshot change until interrupted.
fn run_headless(rt: &Runtime, mut client: TelemetryClient) -> Result<()> {
    rt.block_on(async {
        let _subscription = client.subscribe(log_snapshot);

        client.start()?;
        info!(endpoint = %client.config().endpoint, "Watching gateway, press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        client.stop().await;

        let stats = client.stats();
        info!(
            accepted = stats.accepted,
            throttled = stats.throttled,
            malformed = stats.malformed,
            dropped_offline = stats.dropped_offline,
            "Shutting down"
        );
        Ok::<_, anyhow::Error>(())
    })
}

fn log_snapshot(snapshot: &Snapshot) {
    let reading = snapshot.latest_reading();
    let values: Vec<String> = reading
        .iter()
        .map(|(id, m)| format!("{}={} {}", id, m.value, m.unit))
        .collect();

    info!(
        status = %snapshot.connection_status(),
        timestamp = reading.timestamp(),
        "{}",
        values.join(", ")
    );
}

/// Run the dashboard until the user quits
fn run_tui(rt: &Runtime, client: TelemetryClient) -> Result<()> {
    let theme = Theme::auto_detect();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let mut app = App::new(client, rt.handle().clone(), theme);
    app.connect();

    let result = run_app(&mut terminal, &mut app);
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        app.refresh();
        terminal.draw(|frame| ui::render(frame, app))?;

        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            events::handle_key_event(app, key);
        }
    }

    Ok(())
}
