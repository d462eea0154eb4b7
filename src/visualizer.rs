//! Client for the topology visualizer's line protocol.
//!
//! The sink accepts newline-terminated ASCII commands over TCP. The monitor
//! only needs three of them:
//!
//! - `layer "<name>"` once at startup
//! - `link <id> linkLayer "<name>" line <color>,<width>` to draw an edge
//! - `delete link,<id>` to remove it again
//!
//! The client is the only owner of the connection and of the set of edges
//! currently drawn, so it needs no locking.

use std::fmt;
use std::io::Write;
use std::net::TcpStream;

use tracing::debug;

use crate::config::VisualizerConfig;
use crate::error::VisualizationError;
use crate::node::NodeId;

/// Edge color used for path links.
pub const LINK_COLOR: &str = "yellow";
/// Edge width used for path links.
pub const LINK_WIDTH: u32 = 3;

/// A directed edge between two consecutive nodes of the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathEdge {
    /// Upstream end.
    pub from: NodeId,
    /// Downstream end.
    pub to: NodeId,
}

impl PathEdge {
    #[must_use]
    #[allow(missing_docs)]
    pub const fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }

    /// Stable sink identifier: `<from>,<to>,<from>-<to>-r`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{0},{1},{0}-{1}-r", self.from, self.to)
    }
}

impl fmt::Display for PathEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// Destination for published path edges.
pub trait PathSink {
    /// Draws one edge and starts tracking it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be delivered.
    fn add_path_edge(&mut self, edge: PathEdge) -> Result<(), VisualizationError>;

    /// Removes every tracked edge.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete command could not be delivered; edges not
    /// yet deleted remain tracked.
    fn clear_path_edges(&mut self) -> Result<(), VisualizationError>;

    /// Number of edges currently tracked as drawn.
    fn displayed_count(&self) -> usize;

    /// Releases the sink. Nothing is sent afterwards.
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// Session wrapper over a visualizer connection.
pub struct TopologyVisualizerClient<W: Write = TcpStream> {
    writer: W,
    layer: String,
    displayed: Vec<String>,
}

impl TopologyVisualizerClient<TcpStream> {
    /// Connects to the configured sink and declares the layer.
    ///
    /// # Errors
    ///
    /// `VisualizationError::ConnectFailed` if the sink is unreachable,
    /// `VisualizationError::SendFailed` if the layer declaration fails.
    pub fn connect(cfg: &VisualizerConfig) -> Result<Self, VisualizationError> {
        let addr = cfg.address();
        let stream = TcpStream::connect(&addr).map_err(|e| VisualizationError::ConnectFailed {
            addr: addr.clone(),
            message: e.to_string(),
        })?;
        let _ = stream.set_nodelay(true);
        debug!(%addr, layer = %cfg.layer, "connected to visualizer");
        Self::with_writer(stream, &cfg.layer)
    }
}

impl<W: Write> TopologyVisualizerClient<W> {
    /// Wraps an already open transport and declares the layer on it.
    ///
    /// # Errors
    ///
    /// Returns `VisualizationError::SendFailed` if the layer declaration fails.
    pub fn with_writer(writer: W, layer: &str) -> Result<Self, VisualizationError> {
        let mut client = Self {
            writer,
            layer: layer.to_string(),
            displayed: Vec::new(),
        };
        client.send(&format!("layer \"{layer}\""))?;
        Ok(client)
    }

    /// Layer name edges are drawn on.
    #[must_use]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Identifiers of the edges currently drawn, in the order they were added.
    #[must_use]
    pub fn displayed(&self) -> &[String] {
        &self.displayed
    }

    /// Borrow the underlying transport.
    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consumes the client and returns the transport without sending anything.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn send(&mut self, command: &str) -> Result<(), VisualizationError> {
        let fail = |e: std::io::Error| VisualizationError::SendFailed {
            command: command.to_string(),
            message: e.to_string(),
        };
        self.writer.write_all(command.as_bytes()).map_err(fail)?;
        self.writer.write_all(b"\n").map_err(fail)?;
        self.writer.flush().map_err(fail)
    }
}

impl<W: Write> PathSink for TopologyVisualizerClient<W> {
    fn add_path_edge(&mut self, edge: PathEdge) -> Result<(), VisualizationError> {
        let id = edge.id();
        // Tracked before sending: a partially written add still gets deleted.
        self.displayed.push(id.clone());
        let command = format!(
            "link {id} linkLayer \"{}\" line {LINK_COLOR},{LINK_WIDTH}",
            self.layer
        );
        self.send(&command)
    }

    fn clear_path_edges(&mut self) -> Result<(), VisualizationError> {
        while let Some(id) = self.displayed.first().cloned() {
            self.send(&format!("delete link,{id}"))?;
            self.displayed.remove(0);
        }
        Ok(())
    }

    fn displayed_count(&self) -> usize {
        self.displayed.len()
    }

    fn close(mut self) {
        let _ = self.writer.flush();
        debug!(layer = %self.layer, "visualizer session closed");
    }
}

impl<W: Write> fmt::Debug for TopologyVisualizerClient<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyVisualizerClient")
            .field("layer", &self.layer)
            .field("displayed", &self.displayed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that accepts `budget` writes and then fails every call.
    struct FlakyWriter {
        out: Vec<u8>,
        budget: usize,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink gone"));
            }
            self.budget -= 1;
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn lines(client: &TopologyVisualizerClient<Vec<u8>>) -> Vec<String> {
        String::from_utf8(client.get_ref().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn edge_id_format() {
        let edge = PathEdge::new(NodeId::new(3), NodeId::new(1));
        assert_eq!(edge.id(), "3,1,3-1-r");
        assert_eq!(edge.to_string(), "3->1");
    }

    #[test]
    fn construction_declares_layer() {
        let client = TopologyVisualizerClient::with_writer(Vec::new(), "CORE Route").unwrap();
        assert_eq!(lines(&client), vec!["layer \"CORE Route\""]);
        assert_eq!(client.displayed_count(), 0);
    }

    #[test]
    fn add_then_clear_emits_link_and_delete() {
        let mut client = TopologyVisualizerClient::with_writer(Vec::new(), "L").unwrap();
        client
            .add_path_edge(PathEdge::new(NodeId::new(1), NodeId::new(2)))
            .unwrap();
        assert_eq!(client.displayed(), &["1,2,1-2-r".to_string()]);

        client.clear_path_edges().unwrap();
        assert_eq!(
            lines(&client),
            vec![
                "layer \"L\"",
                "link 1,2,1-2-r linkLayer \"L\" line yellow,3",
                "delete link,1,2,1-2-r",
            ]
        );
        assert_eq!(client.displayed_count(), 0);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut client = TopologyVisualizerClient::with_writer(Vec::new(), "L").unwrap();
        client
            .add_path_edge(PathEdge::new(NodeId::new(5), NodeId::new(6)))
            .unwrap();
        client.clear_path_edges().unwrap();
        assert_eq!(client.displayed_count(), 0);
        client.clear_path_edges().unwrap();
        assert_eq!(client.displayed_count(), 0);
        assert_eq!(lines(&client).len(), 3);
    }

    #[test]
    fn failed_clear_keeps_undeleted_edges() {
        // layer: 2 writes, 2 links: 4 writes, first delete: 2 writes, then fail.
        let writer = FlakyWriter {
            out: Vec::new(),
            budget: 8,
        };
        let mut client = TopologyVisualizerClient::with_writer(writer, "L").unwrap();
        client
            .add_path_edge(PathEdge::new(NodeId::new(1), NodeId::new(2)))
            .unwrap();
        client
            .add_path_edge(PathEdge::new(NodeId::new(2), NodeId::new(3)))
            .unwrap();

        let err = client.clear_path_edges().unwrap_err();
        assert!(matches!(err, VisualizationError::SendFailed { .. }));
        assert_eq!(client.displayed(), &["2,3,2-3-r".to_string()]);
    }

    #[test]
    fn failed_add_is_still_tracked() {
        let writer = FlakyWriter {
            out: Vec::new(),
            budget: 2,
        };
        let mut client = TopologyVisualizerClient::with_writer(writer, "L").unwrap();
        let res = client.add_path_edge(PathEdge::new(NodeId::new(7), NodeId::new(8)));
        assert!(res.is_err());
        assert_eq!(client.displayed_count(), 1);
    }
}
