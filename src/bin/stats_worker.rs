use std::{error::Error, process};

use clap::Parser;
use log::info;
use stats_worker::{
    Dispatcher, TestRunProcessor,
    config::{self, DEFAULT_QUEUE, DEFAULT_REDIS_URL, QueueEndpoint},
    dispatch::DEFAULT_CLASSES,
    memory::SysinfoProbe,
    storage::PgSampleStore,
    worker::{FixedBackoff, QueuePoller, Supervisor, TcpDialer},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Run as a background service draining the job queue
    #[arg(long)]
    service: bool,
    /// ID of the test_runs row to attach results to (omit to run the service)
    #[arg(long)]
    test_run_id: Option<i64>,
    /// Same as --test-run-id
    id: Option<i64>,
    /// Queue endpoint
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    redis_url: String,
    /// Queue name; jobs are popped from `queue:<name>`
    #[arg(long, env = "WORKER_QUEUE", default_value = DEFAULT_QUEUE)]
    queue: String,
    /// Comma separated job classes to process
    #[arg(long, env = "WORKER_CLASSES")]
    classes: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Local development settings; a missing file is fine.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    ctrlc::set_handler(|| {
        info!("interrupted, exiting");
        process::exit(130);
    })?;

    let dsn = config::database_dsn_from_env()?;
    let mut store = PgSampleStore::connect(&dsn)?;
    store.ping()?;
    let mut processor = TestRunProcessor::new(store, SysinfoProbe::new());

    let id = cli.test_run_id.or(cli.id);
    if cli.service || id.is_none() {
        return run_service(&cli, processor);
    }

    match id {
        Some(id) if id != 0 => {
            processor.run(id)?;
            Ok(())
        }
        _ => Err("missing --test-run-id <id> argument or --service".into()),
    }
}

fn run_service(
    cli: &Cli,
    processor: TestRunProcessor<PgSampleStore, SysinfoProbe>,
) -> Result<(), Box<dyn Error>> {
    let endpoint = QueueEndpoint::from_url(&cli.redis_url)?;
    let queue = config::queue_key(&cli.queue);

    let classes = cli
        .classes
        .as_deref()
        .map(config::parse_classes)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CLASSES.map(String::from).to_vec());
    info!("accepting job classes {classes:?}");

    let mut dispatcher = Dispatcher::new(classes, processor);
    let mut supervisor = Supervisor::new(
        TcpDialer::new(endpoint.address.clone()),
        FixedBackoff::default(),
        endpoint.handshake(),
        QueuePoller::new(queue),
    );

    supervisor.run(&mut dispatcher)?;
    Ok(())
}
