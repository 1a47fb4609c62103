use std::sync::Arc;

use clap::Parser;
use sdn_slicectl::api::server;
use sdn_slicectl::config::{catalog::SliceCatalog, topology::TopologyDto};
use sdn_slicectl::domain::driver::{LoggingSwitchDriver, SwitchDriver, TcpSwitchDriver};
use sdn_slicectl::domain::lifecycle::SliceLifecycleManager;
use sdn_slicectl::domain::shaper::{ProcessShaper, Shaper};
use sdn_slicectl::logger;

/// On-demand network-slicing controller (spec.md §1, §6).
#[derive(Parser, Debug)]
#[command(name = "slicectl-controller")]
struct Args {
    /// Path to the slice catalog JSON document.
    #[arg(long, default_value = "config/slices.json")]
    catalog: String,

    /// Path to the topology/host declaration JSON document.
    #[arg(long, default_value = "config/topology.json")]
    topology: String,

    /// Address the Control API listens on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// If set, connect to a remote switch agent at this address instead of
    /// using the logging driver.
    #[arg(long)]
    switch_agent: Option<String>,

    /// Script invoked to create an edge shaper queue.
    #[arg(long, default_value = "scripts/queue_create.sh")]
    queue_create_script: String,

    /// Script invoked to destroy an edge shaper queue.
    #[arg(long, default_value = "scripts/queue_delete.sh")]
    queue_delete_script: String,
}

fn main() {
    logger::init();
    let args = Args::parse();

    let catalog = match SliceCatalog::from_json_file(&args.catalog) {
        Ok(c) => c,
        Err(e) => {
            log::error!("failed to load slice catalog from '{}': {}", args.catalog, e);
            std::process::exit(1);
        }
    };

    let topology_dto = match TopologyDto::from_json_file(&args.topology) {
        Ok(t) => t,
        Err(e) => {
            log::error!("failed to load topology from '{}': {}", args.topology, e);
            std::process::exit(1);
        }
    };
    let (graph, host_locator) = match topology_dto.build() {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("invalid topology declaration: {}", e);
            std::process::exit(1);
        }
    };

    let driver: Box<dyn SwitchDriver> = match args.switch_agent {
        Some(addr) => match addr.parse() {
            Ok(socket_addr) => match TcpSwitchDriver::connect(socket_addr) {
                Ok(driver) => Box::new(driver),
                Err(e) => {
                    log::error!("failed to connect to switch agent at {}: {}", addr, e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                log::error!("invalid --switch-agent address '{}': {}", addr, e);
                std::process::exit(1);
            }
        },
        None => Box::new(LoggingSwitchDriver),
    };

    let shaper: Box<dyn Shaper> = Box::new(ProcessShaper::new(args.queue_create_script, args.queue_delete_script));

    let manager = Arc::new(SliceLifecycleManager::new(catalog, host_locator, graph, driver, shaper));

    if let Err(e) = server::serve(&args.listen, manager) {
        log::error!("control API server failed: {}", e);
        std::process::exit(1);
    }
}
