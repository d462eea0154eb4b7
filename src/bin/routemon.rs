//! routemon command-line entry point.
//!
//! Resolves the session's plain nodes, connects to the visualizer and runs
//! the monitor until Ctrl-C.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use routemon::capture::{check_capture_tools, VcmdTcpdump};
use routemon::config::{parse_address, DEFAULT_LAYER};
use routemon::inventory::rest::DEFAULT_BASE_URL;
use routemon::{
    CaptureFilter, Inventory, MonitorConfig, MonitorService, NodeId, Protocol, RestInventory,
    RouteMonitorError, SessionId, ShutdownFlag, SnapshotInventory, TopologyVisualizerClient,
    VisualizerConfig,
};

/// Draws the live path of a traced flow on the topology visualizer.
#[derive(Debug, Parser)]
#[command(name = "routemon", version, about)]
struct Args {
    /// Node the traced packets originate from.
    #[arg(long = "src-id", env = "ROUTEMON_SRC_ID")]
    src_id: NodeId,

    /// Session to monitor (default: first running session).
    #[arg(long, env = "ROUTEMON_SESSION")]
    session: Option<SessionId>,

    /// Source address of the traced flow.
    #[arg(long, env = "ROUTEMON_SRC", default_value = "10.0.0.20", value_parser = parse_ip)]
    src: IpAddr,

    /// Destination address of the traced flow.
    #[arg(long, env = "ROUTEMON_DST", default_value = "10.0.2.20", value_parser = parse_ip)]
    dst: IpAddr,

    /// Protocol of the traced flow (icmp, tcp, udp).
    #[arg(long, env = "ROUTEMON_PROTOCOL", default_value = "icmp")]
    protocol: Protocol,

    /// Visualizer host.
    #[arg(long = "sdt-host", env = "ROUTEMON_SDT_HOST", default_value = "127.0.0.1")]
    sdt_host: String,

    /// Visualizer port.
    #[arg(long = "sdt-port", env = "ROUTEMON_SDT_PORT", default_value_t = 50000)]
    sdt_port: u16,

    /// Visualizer layer the path is drawn on.
    #[arg(long, env = "ROUTEMON_LAYER", default_value = DEFAULT_LAYER)]
    layer: String,

    /// Emulator daemon REST endpoint.
    #[arg(long = "core-url", env = "ROUTEMON_CORE_URL", default_value = DEFAULT_BASE_URL)]
    core_url: String,

    /// Read the inventory from a JSON snapshot instead of the daemon.
    #[arg(long = "inventory-file", env = "ROUTEMON_INVENTORY_FILE")]
    inventory_file: Option<PathBuf>,
}

fn parse_ip(value: &str) -> Result<IpAddr, String> {
    parse_address(value).map_err(|e| e.to_string())
}

impl Args {
    fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            session: self.session,
            filter: CaptureFilter {
                source: self.src,
                destination: self.dst,
                protocol: self.protocol,
            },
            visualizer: VisualizerConfig {
                host: self.sdt_host.clone(),
                port: self.sdt_port,
                layer: self.layer.clone(),
            },
            ..MonitorConfig::new(self.src_id)
        }
    }

    fn inventory(&self) -> Result<Box<dyn Inventory>, RouteMonitorError> {
        Ok(match &self.inventory_file {
            Some(path) => Box::new(SnapshotInventory::from_path(path)?),
            None => Box::new(RestInventory::new(self.core_url.clone())?),
        })
    }
}

fn run(args: &Args) -> Result<(), RouteMonitorError> {
    check_capture_tools()?;

    let config = args.monitor_config();
    let inventory = args.inventory()?;
    let service = MonitorService::new(config.clone(), inventory.as_ref(), Arc::new(VcmdTcpdump))?;
    for node in service.nodes() {
        info!(node = %node.id, name = %node.name, channel = %node.channel, "monitoring node");
    }

    let sink = TopologyVisualizerClient::connect(&config.visualizer)?;

    let stop = ShutdownFlag::new();
    let handler_stop = stop.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_stop.stop()) {
        error!(error = %err, "failed to install Ctrl-C handler");
    }

    info!(
        filter = %config.filter.expression(),
        source = %config.source_node,
        visualizer = %config.visualizer.address(),
        "route monitor running, press Ctrl-C to stop"
    );
    service.run(sink, &stop)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "route monitor failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
