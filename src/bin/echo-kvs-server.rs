#[macro_use]
extern crate slog;

use echo_kvs::thread_pool::{
    NaiveThreadPool, RayonThreadPool, SharedQueueThreadPool, ThreadPool, ThreadPoolVariant,
};
use echo_kvs::{EchoService, ListenAddr, Result, RpcServer, ServerConfig, StorageHandle};
use slog::Drain;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use structopt::StructOpt;

fn main() {
    let opt = ServerCliOpt::from_args();
    let code = {
        let logger = root_logger(opt.verbose);
        match run(opt, &logger) {
            Ok(()) => 0,
            Err(err) => {
                crit!(logger, "Server failed"; "error" => %err);
                1
            }
        }
    };
    std::process::exit(code);
}

fn run(opt: ServerCliOpt, logger: &slog::Logger) -> Result<()> {
    let config = opt.into_config()?;
    let addr = config.listen_addr()?;
    info!(logger, "Loaded configuration"; "config" => ?config);

    // no server can run without its storage, failing to open it aborts the startup
    let storage = StorageHandle::open(&config.db_path, logger)?;
    match config.pool {
        ThreadPoolVariant::Naive => serve::<NaiveThreadPool>(&config, &addr, &storage, logger)?,
        ThreadPoolVariant::SharedQueue => {
            serve::<SharedQueueThreadPool>(&config, &addr, &storage, logger)?
        }
        ThreadPoolVariant::Rayon => serve::<RayonThreadPool>(&config, &addr, &storage, logger)?,
    }

    // the server has stopped serving requests, no one observes the store being closed
    storage.close();
    Ok(())
}

fn serve<P>(
    config: &ServerConfig,
    addr: &ListenAddr,
    storage: &StorageHandle,
    logger: &slog::Logger,
) -> Result<()>
where
    P: ThreadPool,
{
    let pool = P::new(config.threads())?;
    let service = EchoService::new(
        storage.engine(),
        config.echo_attachment,
        Some(logger.clone()),
    );
    let server = RpcServer::bind(
        addr,
        service,
        pool,
        config.server_options(),
        Some(logger.clone()),
    )?;

    let handle = server.handle();
    let logger = logger.clone();
    let (ready_tx, ready_rx) = mpsc::channel();
    thread::spawn(move || {
        match wait_for_shutdown_signal(ready_tx) {
            Ok(()) => info!(logger, "Received shutdown signal"),
            Err(err) => error!(logger, "Could not listen for shutdown signals"; "error" => %err),
        }
        handle.stop();
    });

    // calls are served only once a signal can stop the server
    ready_rx.recv().ok();
    server.run()
}

/// Block until the process is asked to quit. `ready` is signaled once the handlers are installed.
fn wait_for_shutdown_signal(ready: mpsc::Sender<()>) -> std::io::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(shutdown_signal(ready))
}

#[cfg(unix)]
async fn shutdown_signal(ready: mpsc::Sender<()>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    ready.send(()).ok();
    tokio::select! {
        _ = interrupt.recv() => Ok(()),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal(ready: mpsc::Sender<()>) -> std::io::Result<()> {
    ready.send(()).ok();
    tokio::signal::ctrl_c().await
}

fn root_logger(verbose: bool) -> slog::Logger {
    let level = if verbose {
        slog::Level::Debug
    } else {
        slog::Level::Info
    };
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

#[derive(Debug, StructOpt)]
#[structopt(about = "Serves a key-value store through the Echo RPC method")]
struct ServerCliOpt {
    /// JSON file with the server settings, flags take precedence over it
    #[structopt(long = "config", parse(from_os_str))]
    config: Option<PathBuf>,

    /// TCP port of this server [default: 8000]
    #[structopt(long = "port")]
    port: Option<u16>,

    /// Server listen address, may be IPV4/IPV6 `ip:port` or `unix:<path>`. If this is set, the
    /// flag port will be ignored
    #[structopt(long = "listen-addr")]
    listen_addr: Option<String>,

    /// Connection will be closed if there is no read operation during the last
    /// `idle-timeout-s` seconds [default: -1, disabled]
    #[structopt(long = "idle-timeout-s", allow_hyphen_values = true)]
    idle_timeout_s: Option<i64>,

    /// Maximum duration of server's logoff state, waiting for client to close connection before
    /// server stops [default: 2000]
    #[structopt(long = "logoff-ms")]
    logoff_ms: Option<u64>,

    /// Echo attachment as well
    #[structopt(long = "echo-attachment")]
    echo_attachment: bool,

    /// Directory of the store, removed when the server stops [default: /tmp/experiment_rocksdb]
    #[structopt(long = "db-path", parse(from_os_str))]
    db_path: Option<PathBuf>,

    /// Thread pool serving the connections: naive, shared-queue, or rayon [default: shared-queue]
    #[structopt(long = "pool")]
    pool: Option<ThreadPoolVariant>,

    /// Number of worker threads [default: number of CPUs]
    #[structopt(long = "threads")]
    threads: Option<u32>,

    /// Log every request
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
}

impl ServerCliOpt {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match self.config {
            Some(path) => ServerConfig::from_json_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(idle_timeout_s) = self.idle_timeout_s {
            config.idle_timeout_s = idle_timeout_s;
        }
        if let Some(logoff_ms) = self.logoff_ms {
            config.logoff_ms = logoff_ms;
        }
        if self.echo_attachment {
            config.echo_attachment = true;
        }
        if let Some(db_path) = self.db_path {
            config.db_path = db_path;
        }
        if let Some(pool) = self.pool {
            config.pool = pool;
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        Ok(config)
    }
}
