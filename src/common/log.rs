use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;
use tracing_tree::time::Uptime;

/// Maps the `-v` count to a default filter. `RUST_LOG` wins when it is set.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "panel_autohide=info",
        1 => "panel_autohide=debug",
        _ => "panel_autohide=trace",
    }
}

pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let tree = HierarchicalLayer::default()
        .with_writer(std::io::stderr)
        .with_indent_amount(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_timer(Uptime::default());

    // A subscriber may already be installed (tests, embedding).
    _ = Registry::default().with(filter).with(tree).try_init();
}
