//! Dashboard service: binds the listener, serves the router, sweeps caches

use crate::server::{self, AppState};
use crate::Config;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::{select, time};

/// How often expired feed results are dropped from memory
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct DashboardService {
    config: Config,
    debug_mode: bool,
    listener: Option<TcpListener>,
}

impl DashboardService {
    pub fn new(config: Config, debug_mode: bool) -> Self {
        if debug_mode {
            debug!("Initializing dashboard in debug mode");
            debug!("Configuration: {:?}", config);
        }

        Self {
            config,
            debug_mode,
            listener: None,
        }
    }

    /// Bind the listen address and report missing host tools
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing dashboard...");

        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen_addr))?;
        self.listener = Some(listener);

        let tools = &self.config.tools;
        for program in [
            &tools.service_manager,
            &tools.package_manager,
            &tools.package_lister,
            &tools.network_scanner,
            &tools.web_scanner,
            &tools.shell,
            &tools.log_reader,
            &self.config.escalation_program,
        ]
        .into_iter()
        .chain(self.config.deadline_program.as_ref())
        {
            if !program_available(program) {
                warn!("'{}' not found in PATH, actions using it will fail", program);
            }
        }

        info!("Dashboard initialized successfully");
        Ok(())
    }

    /// Address actually bound, once initialized
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn run_until<S>(mut self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        if self.listener.is_none() {
            self.initialize().await?;
        }
        let listener = self
            .listener
            .take()
            .context("Dashboard listener was not initialized")?;

        info!("Starting dashboard main loop");
        if self.debug_mode {
            debug!("Monitored services: {:?}", self.config.monitored_services);
        }

        let state = Arc::new(AppState::from_config(self.config)?);
        let app = server::router(state.clone());
        let server = server::serve(listener, app, shutdown);
        tokio::pin!(server);

        let mut sweep = time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            select! {
                result = &mut server => {
                    info!("Dashboard stopped");
                    return result;
                }
                _ = sweep.tick() => {
                    let purged = state.feeds.purge_expired();
                    if purged > 0 {
                        debug!("Dropped {} expired feed results", purged);
                    }
                }
            }
        }
    }
}

fn program_available(program: &str) -> bool {
    if program.contains('/') {
        return Path::new(program).is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
