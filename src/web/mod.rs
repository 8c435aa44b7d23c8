//! Notification server: streams tick reports of a running simulation

use std::{
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    engine::{EngineBuilder, EngineSettings},
    report::TickReport,
    scenario::Scenario,
    world::World,
};

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_ticks: u64,
    pub report: Option<TickReport>,
    pub completed: bool,
}

#[derive(Clone)]
struct AppState {
    broadcaster: broadcast::Sender<String>,
    latest_report: Arc<Mutex<Option<TickReport>>>,
    total_ticks: u64,
    scenario_name: String,
    simulation_done: Arc<AtomicBool>,
}

impl AppState {
    fn envelope(&self) -> StateEnvelope {
        StateEnvelope {
            scenario: self.scenario_name.clone(),
            total_ticks: self.total_ticks,
            report: self
                .latest_report
                .lock()
                .ok()
                .and_then(|guard| guard.clone()),
            completed: self.simulation_done.load(Ordering::SeqCst),
        }
    }
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    /// Resume from this world instead of building the scenario's.
    pub world: Option<World>,
    pub ticks: u64,
    pub snapshot_interval: u64,
    pub snapshot_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        world,
        ticks,
        snapshot_interval,
        snapshot_dir,
        host,
        port,
    } = config;

    let scenario_name = scenario.name.clone();
    let mut world = match world {
        Some(world) => world,
        None => scenario.build_world()?,
    };
    let settings = EngineSettings {
        scenario_name: scenario_name.clone(),
        snapshot_interval_ticks: snapshot_interval,
        snapshot_dir,
        report_interval_ticks: scenario.logging.report_interval_ticks,
    };
    let mut engine = EngineBuilder::new(settings).with_standard_passes().build();

    let (tx, _) = broadcast::channel::<String>(512);
    let latest_report: Arc<Mutex<Option<TickReport>>> = Arc::new(Mutex::new(None));
    let simulation_done = Arc::new(AtomicBool::new(false));

    let latest_for_sim = latest_report.clone();
    let done_for_sim = simulation_done.clone();
    let tx_for_sim = tx.clone();

    let sim_handle = tokio::task::spawn_blocking(move || -> Result<World> {
        let result = engine.run_with_hook(&mut world, ticks, |report| {
            if let Ok(mut guard) = latest_for_sim.lock() {
                *guard = Some(report.clone());
            }
            if let Ok(payload) = serde_json::to_string(report) {
                let _ = tx_for_sim.send(payload);
            }
        });
        done_for_sim.store(true, Ordering::SeqCst);
        result.map(|()| world)
    });

    let state = Arc::new(AppState {
        broadcaster: tx,
        latest_report,
        total_ticks: ticks,
        scenario_name: scenario_name.clone(),
        simulation_done,
    });

    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(world)) => info!(
                scenario = %scenario_name,
                date = world.current_date(),
                population = world.total_population(),
                "simulation completed"
            ),
            Ok(Err(err)) => error!("simulation error: {err:?}"),
            Err(err) => error!("simulation task failed: {err:?}"),
        }
    });

    let router = Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/events", get(stream_events))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("notification server listening on http://{addr} (Ctrl+C to stop)");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down notification server");
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    Json(state.envelope())
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().event("tick").data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
