use anyhow::Result;
use clap::Parser;
use tracing::info;

use hyprkan::cli::Args;
use hyprkan::config::Config;
use hyprkan::kanata::KanataClient;
use hyprkan::{commands, daemon, wm};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);
    run(args).await
}

/// Filter format: "hyprkan=LEVEL" ensures only our crate logs at the
/// configured level. RUST_LOG overrides everything.
fn init_logging(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("hyprkan={}", args.effective_log_level()))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let mut kanata = KanataClient::new(args.port);

    // One-shot commands
    if args.layers {
        return commands::print_layers(&mut kanata).await;
    }
    if let Some(layer) = &args.change_layer {
        return commands::change_layer(&mut kanata, layer).await;
    }
    if let Some(coords) = &args.set_mouse {
        return commands::set_mouse(&mut kanata, coords[0], coords[1]).await;
    }
    if let Some(key) = &args.fake_key {
        return commands::fake_key(&mut kanata, &key[0], &key[1]).await;
    }
    if args.current_layer_name {
        return commands::print_current_layer_name(&mut kanata).await;
    }
    if args.current_layer_info {
        return commands::print_current_layer_info(&mut kanata).await;
    }
    if let Some(delay) = args.win {
        return commands::print_window(delay).await;
    }

    // Daemon mode
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;
    info!("Loaded {} rules from {:?}", config.rules.len(), config_path);

    let layer_names = kanata.layer_names().await?;
    config.validate_layers(&layer_names)?;

    let source = wm::detect()?;
    daemon::run(config, kanata, source).await
}
