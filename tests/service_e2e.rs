use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;

use routemon::capture::{CaptureHandle, CaptureLauncher};
use routemon::{
    CaptureFilter, InventoryError, ListenerError, MonitorConfig, MonitorService, MonitoredNode,
    NodeId, RouteMonitorError, ShutdownFlag, SnapshotInventory, TopologyVisualizerClient,
    VisualizerConfig,
};

/// Emits a fixed TTL line per node every few milliseconds until the
/// listener releases the capture.
struct ScriptedLauncher {
    ttls: HashMap<NodeId, u32>,
    launches: AtomicUsize,
}

impl ScriptedLauncher {
    fn new(ttls: &[(u32, u32)]) -> Self {
        Self {
            ttls: ttls.iter().map(|&(n, t)| (NodeId::new(n), t)).collect(),
            launches: AtomicUsize::new(0),
        }
    }
}

impl CaptureLauncher for ScriptedLauncher {
    fn launch(
        &self,
        node: &MonitoredNode,
        _filter: &CaptureFilter,
    ) -> Result<CaptureHandle, ListenerError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let ttl = *self.ttls.get(&node.id).ok_or(ListenerError::SpawnFailed {
            node: node.id,
            message: "no script".to_string(),
        })?;

        let (tx, rx) = bounded(16);
        thread::spawn(move || loop {
            let header = format!("IP (tos 0x0, ttl {ttl}, id 1, offset 0, flags [DF], proto ICMP (1), length 84)");
            if tx.send(header).is_err() || tx.send("    10.0.0.20 > 10.0.2.20: ICMP echo request".to_string()).is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        });
        Ok(CaptureHandle::from_lines(node.id, rx))
    }
}

fn inventory() -> SnapshotInventory {
    SnapshotInventory::from_json(
        r#"{"sessions": [{"id": 1, "nodes": [
            {"id": 1, "name": "n1", "type": 0},
            {"id": 2, "name": "n2", "type": 0},
            {"id": 3, "name": "n3", "type": 0},
            {"id": 4, "name": "switch4", "type": 4}
        ]}]}"#,
    )
    .unwrap()
}

fn fast_config(source: u32, port: u16) -> MonitorConfig {
    MonitorConfig {
        visualizer: VisualizerConfig {
            port,
            ..VisualizerConfig::default()
        },
        poll_interval: Duration::from_millis(5),
        dead_time: Duration::from_millis(100),
        route_interval: Duration::from_millis(30),
        ..MonitorConfig::new(NodeId::new(source))
    }
}

#[test]
fn service_publishes_path_and_cleans_up_on_stop() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let collector = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        BufReader::new(stream)
            .lines()
            .map(Result::unwrap)
            .collect::<Vec<String>>()
    });

    // n1 is the source; n3 saw the largest hop-count, then n2.
    let launcher = Arc::new(ScriptedLauncher::new(&[(1, 64), (2, 62), (3, 63)]));
    let config = fast_config(1, port);
    let service = MonitorService::new(config.clone(), &inventory(), launcher.clone()).unwrap();
    let ids: Vec<_> = service.nodes().iter().map(|n| n.id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let sink = TopologyVisualizerClient::connect(&config.visualizer).unwrap();
    let stop = ShutdownFlag::new();
    let run_stop = stop.clone();
    let runner = thread::spawn(move || service.run(sink, &run_stop));

    thread::sleep(Duration::from_millis(300));
    stop.stop();
    runner.join().unwrap().unwrap();
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 3);

    let lines = collector.join().unwrap();
    assert_eq!(lines[0], "layer \"CORE Route\"");
    assert!(lines.contains(&"link 3,2,3-2-r linkLayer \"CORE Route\" line yellow,3".to_string()));
    assert!(lines.contains(&"link 2,1,2-1-r linkLayer \"CORE Route\" line yellow,3".to_string()));
    assert!(!lines.iter().any(|l| l.contains("4,") && l.starts_with("link ")));

    // Every drawn edge has been deleted by the time the connection closes.
    let mut outstanding: HashMap<String, i32> = HashMap::new();
    for line in &lines {
        if let Some(id) = line.strip_prefix("link ").and_then(|r| r.split(' ').next()) {
            *outstanding.entry(id.to_string()).or_default() += 1;
        } else if let Some(id) = line.strip_prefix("delete link,") {
            *outstanding.entry(id.to_string()).or_default() -= 1;
        }
    }
    assert!(outstanding.values().all(|&count| count == 0), "{outstanding:?}");
}

#[test]
fn session_without_plain_nodes_aborts_before_listening() {
    let inventory = SnapshotInventory::from_json(
        r#"{"sessions": [{"id": 1, "nodes": [{"id": 4, "type": 4}, {"id": 5, "type": 6}]}]}"#,
    )
    .unwrap();
    let launcher = Arc::new(ScriptedLauncher::new(&[]));

    let err = MonitorService::new(MonitorConfig::new(NodeId::new(1)), &inventory, launcher.clone())
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        RouteMonitorError::Inventory(InventoryError::NoEligibleNodes { .. })
    ));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_inventory_aborts() {
    let inventory = SnapshotInventory::from_json(r#"{"sessions": []}"#).unwrap();
    let err = MonitorService::new(
        MonitorConfig::new(NodeId::new(1)),
        &inventory,
        Arc::new(ScriptedLauncher::new(&[])),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RouteMonitorError::Inventory(InventoryError::NoSessions)
    ));
}

#[test]
fn failed_listener_does_not_stop_the_others() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let collector = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        BufReader::new(stream)
            .lines()
            .map(Result::unwrap)
            .collect::<Vec<String>>()
    });

    // No script for n3: its listener fails to launch.
    let launcher = Arc::new(ScriptedLauncher::new(&[(1, 64), (2, 60)]));
    let config = fast_config(1, port);
    let service = MonitorService::new(config.clone(), &inventory(), launcher).unwrap();
    let sink = TopologyVisualizerClient::connect(&config.visualizer).unwrap();

    let stop = ShutdownFlag::new();
    let run_stop = stop.clone();
    let runner = thread::spawn(move || service.run(sink, &run_stop));
    thread::sleep(Duration::from_millis(200));
    stop.stop();
    runner.join().unwrap().unwrap();

    let lines = collector.join().unwrap();
    assert!(lines.contains(&"link 2,1,2-1-r linkLayer \"CORE Route\" line yellow,3".to_string()));
}
