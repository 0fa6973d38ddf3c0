//! Offkit Smoke Harness
//!
//! Runs the offline shim end to end against a canned origin: register the
//! shell worker, activate it, serve precached paths from cache, let a miss
//! fall through to the network, optionally yank the network away, then roll
//! the shell version forward and check the old cache is swept. Prints a
//! JSON summary of cache and network counters when the script completes.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use http::StatusCode;
use offkit_common::{init_logging, LogConfig, LogFormat};
use offkit_platform::{FetchRequest, Navigator, StaticNetwork, WorkerHost};
use offkit_sw::{
    register_on_load, RegistrationStatus, ShellManifest, ShellWorker, DEFAULT_SCRIPT_URL,
};
use serde_json::json;
use tracing::{error, info};

const QUOTES_PATH: &str = "/api/quotes";
const V2_CACHE_NAME: &str = "offkit-shell-v2";

/// Parse command line arguments
struct Args {
    json: bool,
    offline: bool,
    log_filter: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut json = false;
        let mut offline = false;
        let mut log_filter = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => {
                    json = true;
                }
                "--offline" => {
                    offline = true;
                }
                "--log-filter" => {
                    log_filter = args.next();
                }
                _ => {}
            }
        }

        Self {
            json,
            offline,
            log_filter,
        }
    }
}

fn check(condition: bool, what: &str) -> Result<(), Box<dyn Error>> {
    if condition {
        Ok(())
    } else {
        Err(format!("check failed: {what}").into())
    }
}

async fn run(args: &Args) -> Result<serde_json::Value, Box<dyn Error>> {
    let v1 = ShellManifest::default();

    // Canned origin: the shell paths plus one API route outside the shell.
    let network = Arc::new(StaticNetwork::new());
    for path in &v1.precache {
        network
            .route(path.clone(), StatusCode::OK, format!("v1 body of {path}"))
            .await;
    }
    network
        .route(QUOTES_PATH, StatusCode::OK, r#"["stay calm and cache on"]"#)
        .await;

    let host = Arc::new(WorkerHost::new(network.clone()));
    let navigator = Navigator::with_service_worker(host.clone());

    info!(cache = %v1.cache_name, "Page load: registering shell worker");
    let status = register_on_load(
        &navigator,
        DEFAULT_SCRIPT_URL,
        Arc::new(ShellWorker::new(v1.clone())),
    )
    .await;
    check(status == RegistrationStatus::Registered, "v1 registration")?;
    host.activate().await?;

    // Shell paths come from cache, with no further network traffic.
    for path in &v1.precache {
        let response = host.handle_fetch(&FetchRequest::get(path.clone())).await?;
        check(response.from_cache, "shell path served from cache")?;
        check(network.hits(path).await == 1, "no refetch of a cached path")?;
    }

    // A miss goes to the network every time; nothing is written back.
    for _ in 0..2 {
        let response = host.handle_fetch(&FetchRequest::get(QUOTES_PATH)).await?;
        check(!response.from_cache, "API response came from the network")?;
    }
    check(network.hits(QUOTES_PATH).await == 2, "one network call per miss")?;

    if args.offline {
        info!("Going offline");
        network.set_offline(true);

        let response = host.handle_fetch(&FetchRequest::get("/dashboard")).await?;
        check(response.from_cache, "shell served while offline")?;

        let api = host.handle_fetch(&FetchRequest::get(QUOTES_PATH)).await;
        check(api.is_err(), "uncached path fails while offline")?;
        info!("Offline check passed, restoring network");
        network.set_offline(false);
    }

    // Roll the shell forward: new version name, same paths, fresh bodies.
    for path in &v1.precache {
        network
            .route(path.clone(), StatusCode::OK, format!("v2 body of {path}"))
            .await;
    }
    let v2 = v1.with_version(V2_CACHE_NAME);
    info!(cache = %v2.cache_name, "Page load: registering updated shell worker");
    let status = register_on_load(
        &navigator,
        DEFAULT_SCRIPT_URL,
        Arc::new(ShellWorker::new(v2.clone())),
    )
    .await;
    check(status == RegistrationStatus::Registered, "v2 registration")?;
    host.activate().await?;

    let response = host.handle_fetch(&FetchRequest::get("/")).await?;
    check(response.from_cache, "updated shell served from cache")?;
    check(response.body == "v2 body of /", "updated shell body")?;

    let storage = host.caches.read().await;
    check(storage.has(V2_CACHE_NAME), "v2 cache present")?;
    check(!storage.has(&v1.cache_name), "v1 cache swept on activation")?;

    let stats = storage.stats();
    let active = host.active().await;
    Ok(json!({
        "caches": storage.keys(),
        "cache_stats": {
            "hits": stats.hits,
            "misses": stats.misses,
            "hit_rate": (stats.hit_rate() * 100.0).round() / 100.0,
        },
        "network": {
            "total_fetches": network.total_hits().await,
            "api_fetches": network.hits(QUOTES_PATH).await,
        },
        "active_worker": active.map(|info| json!({
            "id": info.id.raw(),
            "script": info.script_url,
            "state": info.state.as_str(),
        })),
        "registrations": host.registration_count(),
    }))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = LogConfig::default();
    if args.json {
        config = config.with_format(LogFormat::Json);
    }
    if let Some(ref filter) = args.log_filter {
        config = config.with_filter(filter.clone());
    }
    init_logging(config);

    info!(
        offline = args.offline,
        json = args.json,
        "Starting Offkit Smoke Harness"
    );

    match run(&args).await {
        Ok(summary) => {
            match serde_json::to_string_pretty(&summary) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => {
                    error!(error = %e, "Failed to render summary");
                    return ExitCode::FAILURE;
                }
            }
            info!("Smoke run passed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Smoke run failed");
            ExitCode::FAILURE
        }
    }
}
