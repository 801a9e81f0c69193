// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! nereid-live CLI entrypoint.
//!
//! By default this serves the live viewer, the history API and MCP over streamable HTTP at
//! `http://127.0.0.1:<port>/` and `http://127.0.0.1:<port>/mcp`.
//!
//! Use `--mcp` to serve MCP over stdio instead (the viewer server keeps running alongside), or
//! `--watch` to attach a headless viewer to a running instance.

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use nereid_live::config::{Config, ConfigOverrides};
use nereid_live::http::{self, AppState};
use nereid_live::hub::BroadcastHub;
use nereid_live::mcp::NereidLiveMcp;
use nereid_live::store::HistoryStore;
use nereid_live::viewer::{BackoffPolicy, ViewerClient, ViewerEvent, VisibilityFlag, WsConnector};
use rmcp::transport::{
    streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
    StreamableHttpService,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tracing::{info, warn};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--data-dir <dir>] [--port <port>] [--work-dir <dir>] [--no-open] [--durable-writes] [--verbose]\n  {program} --mcp [--data-dir <dir>] [--port <port>] [--work-dir <dir>] [--no-open] [--durable-writes] [--verbose]\n  {program} --watch [<ws-url>] [--port <port>] [--verbose]\n\nThe default mode serves the viewer at `http://127.0.0.1:<port>/` and MCP over streamable HTTP at `/mcp`.\n--mcp serves MCP over stdio; the viewer server still runs on --port.\n--watch attaches a headless viewer (default `ws://127.0.0.1:<port>/ws`) and prints what it receives.\n\n--port selects the port (0 = ephemeral; default {default_port}, env NEREID_LIVE_PORT).\n--data-dir overrides where the history is kept (env NEREID_LIVE_DATA_DIR).\n--work-dir sets the directory whose repository names new collections (default: current dir).\n--no-open never launches a browser (env NEREID_LIVE_NO_OPEN=1).\n--durable-writes opts into slower, best-effort durable persistence (fsync/sync where supported).\n--verbose enables debug logging (or set NEREID_LIVE_LOG / RUST_LOG).",
        default_port = nereid_live::config::DEFAULT_HTTP_PORT,
    );
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliOptions {
    mcp: bool,
    /// `Some(None)` watches the local default endpoint.
    watch: Option<Option<String>>,
    data_dir: Option<String>,
    port: Option<u16>,
    work_dir: Option<String>,
    no_open: bool,
    durable_writes: bool,
    verbose: bool,
}

impl CliOptions {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_dir: self.data_dir.as_ref().map(PathBuf::from),
            port: self.port,
            no_open: self.no_open,
            work_dir: self.work_dir.as_ref().map(PathBuf::from),
            durable_writes: self.durable_writes,
        }
    }
}

fn parse_options(args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut args = args.peekable();
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mcp" => {
                if options.mcp {
                    return Err(());
                }
                options.mcp = true;
            }
            "--watch" => {
                if options.watch.is_some() {
                    return Err(());
                }
                let url = args.next_if(|next| !next.starts_with('-'));
                options.watch = Some(url);
            }
            "--data-dir" => {
                if options.data_dir.is_some() {
                    return Err(());
                }
                options.data_dir = Some(args.next().ok_or(())?);
            }
            "--port" => {
                if options.port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let port: u16 = raw.parse().map_err(|_| ())?;
                options.port = Some(port);
            }
            "--work-dir" => {
                if options.work_dir.is_some() {
                    return Err(());
                }
                options.work_dir = Some(args.next().ok_or(())?);
            }
            "--no-open" => {
                if options.no_open {
                    return Err(());
                }
                options.no_open = true;
            }
            "--durable-writes" => {
                if options.durable_writes {
                    return Err(());
                }
                options.durable_writes = true;
            }
            "--verbose" | "-v" => {
                if options.verbose {
                    return Err(());
                }
                options.verbose = true;
            }
            _ => return Err(()),
        }
    }

    if options.watch.is_some() {
        let server_only = options.mcp
            || options.data_dir.is_some()
            || options.work_dir.is_some()
            || options.no_open
            || options.durable_writes;
        if server_only {
            return Err(());
        }
    }

    Ok(options)
}

fn mcp_http_service(mcp: NereidLiveMcp) -> StreamableHttpService<NereidLiveMcp, LocalSessionManager> {
    let config = StreamableHttpServerConfig {
        stateful_mode: true,
        ..StreamableHttpServerConfig::default()
    };
    let session_manager = Arc::new(LocalSessionManager::default());
    StreamableHttpService::new(move || Ok(mcp.clone()), session_manager, config)
}

async fn watch(url: String, policy: BackoffPolicy) -> Result<(), Box<dyn Error>> {
    let handle = ViewerClient::new(WsConnector::new(url.as_str()), VisibilityFlag::new(true))
        .with_policy(policy)
        .spawn();
    let mut events = handle.subscribe();
    handle.start();
    info!(%url, "watching");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ViewerEvent::StateChanged { from, to }) => eprintln!("state: {from} -> {to}"),
                Ok(ViewerEvent::DiagramAdopted { diagram, .. }) => println!("{diagram}\n"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "watcher fell behind"),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    handle.shutdown();
    Ok(())
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "nereid-live".to_owned());

        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        nereid_live::logging::init(options.verbose);
        let config = Config::from_env(options.overrides())?;
        let stdio = options.mcp;
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

        if let Some(url) = options.watch {
            let url = url.unwrap_or_else(|| {
                http::ws_url(SocketAddr::from(([127, 0, 0, 1], config.http_port)))
            });
            return runtime.block_on(watch(url, config.backoff));
        }

        let store = HistoryStore::new(&config.data_root).with_durability(config.durability);
        let hub = BroadcastHub::new(config.visibility_timeout);
        info!(path = %store.history_path().display(), "history file");

        runtime.block_on(async move {
            let listener = match tokio::net::TcpListener::bind(("127.0.0.1", config.http_port)).await
            {
                Ok(listener) => Some(listener),
                // Stdio clients still get history and validation without the live channel.
                Err(err) if stdio => {
                    warn!(
                        port = config.http_port,
                        error = %err,
                        "viewer server unavailable; diagrams are recorded but not pushed"
                    );
                    None
                }
                Err(err) => return Err(Box::new(err) as Box<dyn Error>),
            };
            let addr = match &listener {
                Some(listener) => listener.local_addr()?,
                None => SocketAddr::from(([127, 0, 0, 1], config.http_port)),
            };

            let mcp = NereidLiveMcp::new(store.clone(), hub.clone(), http::viewer_url(addr))
                .with_work_dir(&config.work_dir)
                .with_auto_open(config.auto_open);

            let mut router = http::router(AppState { store, hub });
            if !stdio {
                router = router.nest_service("/mcp", mcp_http_service(mcp.clone()));
            }

            let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
            let server = listener.map(|listener| {
                info!(viewer = %http::viewer_url(addr), "serving");
                tokio::spawn(serve(listener, router, shutdown_rx))
            });

            if stdio {
                mcp.serve_stdio().await?;
            } else {
                tokio::signal::ctrl_c().await?;
                info!("shutting down");
            }

            let _ = shutdown_tx.send(());
            if let Some(server) = server {
                let _ = server.await;
            }
            Ok::<(), Box<dyn Error>>(())
        })?;

        Ok(())
    })();

    if let Err(err) = result {
        eprintln!("nereid-live: {err}");
        std::process::exit(1);
    }
}

async fn serve(listener: TcpListener, router: Router, shutdown: oneshot::Receiver<()>) {
    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = shutdown.await;
    });
    if let Err(err) = serve.await {
        warn!(error = %err, "viewer server error");
    }
}
