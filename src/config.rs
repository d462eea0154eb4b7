//! Monitor configuration.
//!
//! Everything the monitor needs is carried in a `MonitorConfig` value handed
//! to `MonitorService` at construction. There are no process-wide settings.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::node::{NodeId, SessionId};

/// Default visualizer layer name.
pub const DEFAULT_LAYER: &str = "CORE Route";

/// Capture protocol filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// ICMP (ping) traffic.
    #[default]
    Icmp,
    /// TCP traffic.
    Tcp,
    /// UDP traffic.
    Udp,
}

impl Protocol {
    /// The filter keyword understood by the capture tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Icmp => "icmp",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "icmp" => Ok(Self::Icmp),
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(ConfigError::UnknownProtocol {
                value: s.to_string(),
            }),
        }
    }
}

/// Source/destination/protocol triple every listener filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFilter {
    /// Packet source address.
    pub source: IpAddr,
    /// Packet destination address.
    pub destination: IpAddr,
    /// Packet protocol.
    pub protocol: Protocol,
}

impl Default for CaptureFilter {
    fn default() -> Self {
        Self {
            source: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 20)),
            destination: IpAddr::V4(Ipv4Addr::new(10, 0, 2, 20)),
            protocol: Protocol::Icmp,
        }
    }
}

impl CaptureFilter {
    /// Capture filter expression, e.g. `src host 10.0.0.20 and dst host 10.0.2.20 and icmp`.
    #[must_use]
    pub fn expression(&self) -> String {
        format!(
            "src host {} and dst host {} and {}",
            self.source, self.destination, self.protocol
        )
    }
}

/// Where the visualization sink lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizerConfig {
    /// Sink host.
    pub host: String,
    /// Sink TCP port.
    pub port: u16,
    /// Layer all path edges are drawn on.
    pub layer: String,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50000,
            layer: DEFAULT_LAYER.to_string(),
        }
    }
}

impl VisualizerConfig {
    /// `host:port` form used for connecting and in error messages.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Full monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Node the traced packets originate from; always drawn last in the path.
    pub source_node: NodeId,
    /// Session to monitor. `None` picks the first running session.
    pub session: Option<SessionId>,
    /// Capture filter shared by every listener.
    pub filter: CaptureFilter,
    /// Visualization sink.
    pub visualizer: VisualizerConfig,
    /// How long a listener waits for a capture line before checking liveness.
    pub poll_interval: Duration,
    /// Silence after which a node is dropped from the path.
    pub dead_time: Duration,
    /// Reconciliation cadence.
    pub route_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source_node: NodeId::new(1),
            session: None,
            filter: CaptureFilter::default(),
            visualizer: VisualizerConfig::default(),
            poll_interval: Duration::from_secs(1),
            dead_time: Duration::from_secs(3),
            route_interval: Duration::from_secs(3),
        }
    }
}

impl MonitorConfig {
    /// Creates a configuration with defaults for everything but the source node.
    #[must_use]
    pub fn new(source_node: NodeId) -> Self {
        Self {
            source_node,
            ..Self::default()
        }
    }
}

/// Parses an IP address argument.
///
/// # Errors
///
/// Returns `ConfigError::InvalidAddress` if `value` is not an IPv4/IPv6 address.
pub fn parse_address(value: &str) -> Result<IpAddr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_parses_case_insensitively() {
        assert_eq!("ICMP".parse::<Protocol>().unwrap(), Protocol::Icmp);
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!(" udp ".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert!(matches!(
            "sctp".parse::<Protocol>(),
            Err(ConfigError::UnknownProtocol { .. })
        ));
    }

    #[test]
    fn filter_expression_matches_capture_syntax() {
        let filter = CaptureFilter::default();
        assert_eq!(
            filter.expression(),
            "src host 10.0.0.20 and dst host 10.0.2.20 and icmp"
        );
    }

    #[test]
    fn default_timings() {
        let cfg = MonitorConfig::new(NodeId::new(4));
        assert_eq!(cfg.source_node, NodeId::new(4));
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.dead_time, Duration::from_secs(3));
        assert_eq!(cfg.route_interval, Duration::from_secs(3));
        assert_eq!(cfg.visualizer.address(), "127.0.0.1:50000");
    }

    #[test]
    fn parse_address_rejects_garbage() {
        assert!(parse_address("10.0.0.1").is_ok());
        assert!(parse_address("::1").is_ok());
        assert_eq!(
            parse_address("10.0.0"),
            Err(ConfigError::InvalidAddress {
                value: "10.0.0".to_string()
            })
        );
    }
}
