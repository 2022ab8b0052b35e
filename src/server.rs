//! HTTP surface of the dashboard
//!
//! Every route answers JSON. Action failures are reported in the body as
//! `{"status": "error", "message": ...}` with HTTP 200, the way the dashboard
//! front end expects; only unknown news topics produce a 404.

use crate::collector::{Connection, DataCollector, DiagnosticReport, SystemSnapshot};
use crate::commands::actions::ScanTool;
use crate::commands::package_management::PackageOperation;
use crate::commands::service_control::ServiceOperation;
use crate::commands::{ActionError, ActionResult, CommandExecutor, ControlAction, ControlActions, Execute};
use crate::config::Config;
use crate::feeds::{FeedAggregator, FeedEntry, FeedFetcher, HttpFeedFetcher};
use crate::search::{SearchResult, WebSearch};
use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Everything the handlers share
pub struct AppState<E = CommandExecutor, F = HttpFeedFetcher> {
    pub config: Config,
    pub actions: ControlActions<E>,
    pub feeds: FeedAggregator<F>,
    pub search: WebSearch,
    pub collector: DataCollector,
}

impl AppState {
    /// State wired to real processes and real HTTP sources
    pub fn from_config(config: Config) -> Result<Self> {
        let executor = CommandExecutor::with_escalation(
            config.escalation_program.clone(),
            config.escalation_args.clone(),
        )
        .with_deadline_program(config.deadline_program.clone());
        let fetcher = HttpFeedFetcher::new(Duration::from_secs(config.feeds.request_timeout_secs))?;
        Self::new(config, executor, fetcher)
    }
}

impl<E: Execute, F: FeedFetcher> AppState<E, F> {
    pub fn new(config: Config, executor: E, fetcher: F) -> Result<Self> {
        let actions = ControlActions::new(executor, config.tools.clone(), config.syslog_path.clone());
        let feeds = FeedAggregator::new(
            fetcher,
            Duration::from_secs(config.feeds.ttl_secs),
            config.feeds.entries_per_source,
            config.feeds.cache_capacity,
        );
        let search = WebSearch::new(
            config.search_url.clone(),
            Duration::from_secs(config.feeds.request_timeout_secs),
        )?;
        let collector = DataCollector::new(Duration::from_millis(config.metrics_ttl_ms));

        Ok(Self {
            config,
            actions,
            feeds,
            search,
            collector,
        })
    }
}

/// JSON body of a POST action
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionReply {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchResult>>,
}

impl ActionReply {
    fn success() -> Self {
        Self {
            status: "success".to_string(),
            ..Default::default()
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

impl From<ActionError> for ActionReply {
    fn from(e: ActionError) -> Self {
        Self::error(e.message)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServiceForm {
    pub service_name: String,
    pub action: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PackageForm {
    pub package_name: String,
    pub action: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PentestForm {
    pub tool: String,
    pub target: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TerminalForm {
    pub command: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchForm {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Overview {
    pub name: String,
    pub version: String,
    pub hostname: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatuses {
    pub services: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackageListing {
    pub packages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogView {
    pub logs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewsView {
    pub topic: String,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkView {
    pub connections: Vec<Connection>,
}

type Shared<E, F> = State<Arc<AppState<E, F>>>;

/// Build the dashboard router over `state`
pub fn router<E, F>(state: Arc<AppState<E, F>>) -> Router
where
    E: Execute + 'static,
    F: FeedFetcher + 'static,
{
    Router::new()
        .route("/", get(overview))
        .route("/services", get(list_services::<E, F>).post(control_service::<E, F>))
        .route("/packages", get(list_packages::<E, F>).post(control_package::<E, F>))
        .route("/pentest", post(run_scan::<E, F>))
        .route("/terminal", post(run_terminal::<E, F>))
        .route("/search", post(run_search::<E, F>))
        .route("/news/:topic", get(news::<E, F>))
        .route("/logs", get(logs::<E, F>))
        .route("/system", get(system::<E, F>))
        .route("/network", get(network::<E, F>))
        .route("/diagnostics", get(diagnostics::<E, F>))
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<S>(listener: TcpListener, router: Router, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Dashboard listening on http://{}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}

async fn overview() -> Json<Overview> {
    Json(Overview {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        hostname: hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    })
}

async fn list_services<E: Execute, F: FeedFetcher>(State(state): Shared<E, F>) -> Json<ServiceStatuses> {
    let statuses = state
        .actions
        .service_statuses(&state.config.monitored_services)
        .await;
    Json(ServiceStatuses {
        services: statuses.into_iter().collect(),
    })
}

async fn control_service<E: Execute, F: FeedFetcher>(
    State(state): Shared<E, F>,
    Form(form): Form<ServiceForm>,
) -> Json<ActionReply> {
    let Some(operation) = ServiceOperation::parse(&form.action) else {
        return Json(ActionReply::error("Invalid action"));
    };

    let action = ControlAction::ServiceControl {
        service: form.service_name,
        operation,
    };
    Json(completed_reply(state.actions.run(action).await))
}

async fn list_packages<E: Execute, F: FeedFetcher>(State(state): Shared<E, F>) -> Json<PackageListing> {
    let packages = match state.actions.run(ControlAction::PackageList).await {
        Ok(ActionResult::Packages(packages)) => packages,
        Ok(_) => Vec::new(),
        Err(e) => {
            error!("Package listing failed: {}", e);
            Vec::new()
        }
    };
    Json(PackageListing { packages })
}

async fn control_package<E: Execute, F: FeedFetcher>(
    State(state): Shared<E, F>,
    Form(form): Form<PackageForm>,
) -> Json<ActionReply> {
    let Some(operation) = PackageOperation::parse(&form.action) else {
        return Json(ActionReply::error("Invalid action"));
    };

    let action = ControlAction::PackageControl {
        package: form.package_name,
        operation,
    };
    Json(completed_reply(state.actions.run(action).await))
}

async fn run_scan<E: Execute, F: FeedFetcher>(
    State(state): Shared<E, F>,
    Form(form): Form<PentestForm>,
) -> Json<ActionReply> {
    let Some(tool) = ScanTool::parse(&form.tool) else {
        return Json(ActionReply::error("Invalid tool"));
    };

    let reply = match state
        .actions
        .run(ControlAction::Scan {
            tool,
            target: form.target,
        })
        .await
    {
        Ok(result) => ActionReply {
            result: Some(into_text(result)),
            ..ActionReply::success()
        },
        Err(e) => e.into(),
    };
    Json(reply)
}

async fn run_terminal<E: Execute, F: FeedFetcher>(
    State(state): Shared<E, F>,
    Form(form): Form<TerminalForm>,
) -> Json<ActionReply> {
    let reply = match state
        .actions
        .run(ControlAction::Shell {
            command: form.command,
        })
        .await
    {
        Ok(result) => ActionReply {
            output: Some(into_text(result)),
            ..ActionReply::success()
        },
        Err(e) => e.into(),
    };
    Json(reply)
}

async fn run_search<E: Execute, F: FeedFetcher>(
    State(state): Shared<E, F>,
    Form(form): Form<SearchForm>,
) -> Json<ActionReply> {
    Json(ActionReply {
        results: Some(state.search.search(&form.query).await),
        ..ActionReply::success()
    })
}

async fn news<E: Execute, F: FeedFetcher>(
    State(state): Shared<E, F>,
    Path(topic): Path<String>,
) -> Result<Json<NewsView>, StatusCode> {
    let topic = state.config.topic(&topic).ok_or(StatusCode::NOT_FOUND)?;
    let entries = state.feeds.fetch(topic).await;

    Ok(Json(NewsView {
        topic: topic.name.clone(),
        entries,
    }))
}

async fn logs<E: Execute, F: FeedFetcher>(State(state): Shared<E, F>) -> Json<LogView> {
    let logs = match state.actions.run(ControlAction::LogTail).await {
        Ok(ActionResult::Lines(lines)) => lines,
        Ok(_) => Vec::new(),
        Err(e) => vec![e.message],
    };
    Json(LogView { logs })
}

async fn system<E: Execute, F: FeedFetcher>(
    State(state): Shared<E, F>,
) -> Result<Json<SystemSnapshot>, (StatusCode, Json<ActionReply>)> {
    state.collector.collect().await.map(Json).map_err(metrics_failure)
}

async fn network<E: Execute, F: FeedFetcher>(State(state): Shared<E, F>) -> Json<NetworkView> {
    let connections = state.collector.connections().await.unwrap_or_else(|e| {
        error!("Error getting network info: {:#}", e);
        Vec::new()
    });
    Json(NetworkView { connections })
}

async fn diagnostics<E: Execute, F: FeedFetcher>(
    State(state): Shared<E, F>,
) -> Result<Json<DiagnosticReport>, (StatusCode, Json<ActionReply>)> {
    state
        .collector
        .diagnostics()
        .await
        .map(Json)
        .map_err(metrics_failure)
}

fn metrics_failure(e: anyhow::Error) -> (StatusCode, Json<ActionReply>) {
    error!("Error getting system info: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ActionReply::error("Failed to read system metrics")),
    )
}

fn completed_reply(result: Result<ActionResult, ActionError>) -> ActionReply {
    match result {
        Ok(result) => ActionReply {
            message: Some(into_text(result)),
            ..ActionReply::success()
        },
        Err(e) => e.into(),
    }
}

fn into_text(result: ActionResult) -> String {
    match result {
        ActionResult::Completed(text) | ActionResult::Output(text) => text,
        ActionResult::Active(active) => active.to_string(),
        ActionResult::Packages(lines) | ActionResult::Lines(lines) => lines.join("\n"),
    }
}
