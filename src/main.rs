use anyhow::Result;
use hostdeck::{Config, DashboardService};
use log::{error, info, warn, LevelFilter};
use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) || args.contains(&"-v".to_string()) {
        println!("hostdeck {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        println!("hostdeck - Host Administration Dashboard");
        println!("Version: {}", env!("CARGO_PKG_VERSION"));
        println!("\nUsage: {} [OPTIONS]\n", args[0]);
        println!("Options:");
        println!("  --help, -h          Show this help message");
        println!("  --version, -v       Show version information");
        println!("  --debug             Enable debug logging");
        println!("  --config <path>     Read configuration from a JSON file");
        println!("  --listen <addr>     Override the listen address (default: 0.0.0.0:4545)");
        println!("\nEnvironment Variables:");
        println!("  HOSTDECK_CONFIG=<path>   Configuration file when --config is not given");
        println!("  HOSTDECK_LISTEN=<addr>   Override the listen address");
        println!("  RUST_LOG=<level>         Set log level (error|warn|info|debug)");
        return Ok(());
    }

    let debug_mode = args.contains(&"--debug".to_string());

    let mut config_path: Option<PathBuf> = None;
    let mut listen_override: Option<String> = None;
    for i in 0..args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            config_path = Some(PathBuf::from(&args[i + 1]));
        } else if args[i] == "--listen" && i + 1 < args.len() {
            listen_override = Some(args[i + 1].clone());
        }
    }

    // Without RUST_LOG the logger admits everything and the global max level
    // does the filtering, so the configured level can apply after loading.
    let filter_from_env = env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace")).init();
    if !filter_from_env {
        log::set_max_level(if debug_mode { LevelFilter::Debug } else { LevelFilter::Info });
    }

    let mut config = Config::load(config_path.as_deref())?;
    if !filter_from_env && !debug_mode {
        log::set_max_level(config.log_filter());
    }

    if let Some(listen) = listen_override {
        info!("Listen address override specified: {}", listen);
        config.listen_addr = listen;
    }

    info!("Starting hostdeck v{}", env!("CARGO_PKG_VERSION"));
    if debug_mode {
        info!("Debug mode enabled");
    }
    warn!("The dashboard has no authentication; bind it to a trusted interface only");

    let mut service = DashboardService::new(config, debug_mode);
    if let Err(e) = service.initialize().await {
        error!("Failed to initialize dashboard: {:#}", e);
        return Err(e);
    }

    if let Err(e) = service.run().await {
        error!("Dashboard error: {:#}", e);
        return Err(e);
    }

    info!("hostdeck stopped");
    Ok(())
}
