//! Two-role demo pipeline over the courier substrate.
//!
//! An ingestor publishes placeholder game events on an interval; a processor
//! consumes and acknowledges them. Both roles share one in-memory broker but
//! own separate connections, exactly as two processes against a real broker
//! would. Ctrl-C stops both roles cooperatively; each role closes its own
//! connection on the way out.

mod events;
mod logging;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, info_span, Instrument};

use courier_core::app::{
    ConnectionManager, PublishLoop, ShutdownController, ShutdownSignal, Worker,
};
use courier_core::domain::{BrokerConfig, CourierError, QueueSpec};
use courier_core::impls::InMemoryBroker;
use courier_core::typed::TypedHandler;

use crate::events::{GameEvent, GameEventProcessor, GameEventSource};

#[derive(Debug, Parser)]
#[command(name = "courier", about = "Interval publisher and worker over a shared queue")]
struct Args {
    /// Durable queue both roles use.
    #[arg(long, default_value = "game_events")]
    queue: String,

    /// Seconds between published events.
    #[arg(long, default_value_t = 10)]
    interval: u64,

    /// Broker host.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Broker port.
    #[arg(long, default_value_t = 5672)]
    port: u16,
}

async fn run_ingestor(
    broker: InMemoryBroker,
    config: BrokerConfig,
    queue: QueueSpec,
    interval: Duration,
    mut shutdown: ShutdownSignal,
) -> Result<(), CourierError> {
    let manager = ConnectionManager::new(broker, config);
    let Some(connection) = manager.connect(&mut shutdown).await else {
        return Ok(());
    };
    PublishLoop::new(
        connection,
        queue,
        interval,
        Box::new(GameEventSource::new()),
        shutdown,
    )
    .run()
    .await
}

async fn run_processor(
    broker: InMemoryBroker,
    config: BrokerConfig,
    queue: QueueSpec,
    mut shutdown: ShutdownSignal,
) -> Result<(), CourierError> {
    let manager = ConnectionManager::new(broker, config);
    let Some(connection) = manager.connect(&mut shutdown).await else {
        return Ok(());
    };
    let handler: Arc<TypedHandler<GameEvent, _>> = Arc::new(TypedHandler::new(GameEventProcessor));
    Worker::new(connection, queue, handler, shutdown).run().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let args = Args::parse();

    let broker = InMemoryBroker::new();
    let config = BrokerConfig {
        host: args.host,
        port: args.port,
        ..BrokerConfig::default()
    };
    let queue = QueueSpec::durable(&args.queue);
    let interval = Duration::from_secs(args.interval);

    info!(queue = %queue.name, interval_secs = args.interval, "starting pipeline");

    let (controller, signal) = ShutdownController::new();

    // A role that exits for any reason takes the other one down with it.
    let processor = tokio::spawn({
        let controller = controller.clone();
        let role = run_processor(broker.clone(), config.clone(), queue.clone(), signal.clone());
        async move {
            let result = role.await;
            controller.trigger();
            result
        }
        .instrument(info_span!("role", service_name = "processor"))
    });

    let ingestor = tokio::spawn({
        let controller = controller.clone();
        let role = run_ingestor(broker, config, queue, interval, signal);
        async move {
            let result = role.await;
            controller.trigger();
            result
        }
        .instrument(info_span!("role", service_name = "ingestor"))
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal, stopping pipeline");
            controller.trigger();
        }
    });

    let ingestor_result = ingestor.await?;
    let processor_result = processor.await?;

    info!("pipeline shutdown complete");
    ingestor_result?;
    processor_result?;
    Ok(())
}
