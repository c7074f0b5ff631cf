use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use panel_autohide::actor::autohide::Autohide;
use panel_autohide::actor::panel::{Panel, Request};
use panel_autohide::actor::{self, sink};
use panel_autohide::common::config::Config;
use panel_autohide::common::log;
use panel_autohide::sys::hyprland::{HyprlandEvents, HyprlandIpc, SocketPaths};
use panel_autohide::sys::signal;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(version, about = "Hide a panel until the pointer reaches the top edge")]
struct Cli {
    /// Config file to load instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output whose top edge drives the panel. Defaults to the focused one.
    #[arg(long)]
    output: Option<String>,

    /// Raise log verbosity; repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the resolved configuration and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() -> anyhow::Result<()> {
    sigpipe::reset();
    let cli = Cli::parse();
    log::init(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.output.is_some() {
        config.panel.output = cli.output;
    }
    if cli.print_config {
        config.autohide = config.autohide.validated();
        print!("{}", config.to_toml());
        return Ok(());
    }

    // Before any thread exists, so all of them inherit the mask.
    let signals = signal::block_shutdown_signals().context("blocking shutdown signals")?;

    let paths = SocketPaths::from_env()?;
    debug!(?paths, "using hyprland sockets");
    let ipc = HyprlandIpc::new(paths.clone());
    let events = Arc::new(
        HyprlandEvents::spawn(paths.events).context("starting hyprland event listener")?,
    );

    let (tx, rx) = actor::channel();
    {
        let tx = tx.clone();
        signal::forward_shutdown(signals, move |_| {
            _ = tx.send(Request::Shutdown);
        })
        .context("starting signal thread")?;
    }

    let mut autohide = Autohide::start(config.autohide, ipc.clone(), events.clone(), tx)?;
    let panel = Panel::new(
        rx,
        autohide.shared(),
        sink::from_settings(&config.panel),
        ipc,
        config.panel.output,
    );
    panel.run();

    autohide.stop();
    events.shutdown();
    info!("bye");
    Ok(())
}
