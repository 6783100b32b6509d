//! Starting and stopping a set of nodes together.

use crate::error::{GraphError, NodeFailure, StartError};

use super::node::{DEFAULT_BUFFER_WORDS, Node};

/// A set of uniquely named nodes run as one graph.
///
/// # Example
///
/// ```rust,ignore
/// let mut group = Group::new();
/// group.add(source.clone())?;
/// group.add(sink.clone())?;
/// source.output(0).connect(&sink.input(0))?;
/// group.go(true)?;
/// // ...
/// group.stop();
/// ```
#[derive(Debug)]
pub struct Group {
    nodes: Vec<Node>,
    default_words: usize,
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Group {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            default_words: DEFAULT_BUFFER_WORDS,
        }
    }

    /// Sets the default buffer size applied to every member.
    pub fn set_default_words(&mut self, words: usize) {
        self.default_words = words;
        for node in &self.nodes {
            node.set_default_words(words);
        }
    }

    /// Adds a node. Names must be unique within the group.
    pub fn add(&mut self, node: Node) -> Result<(), GraphError> {
        if self.get(node.name()).is_some() {
            return Err(GraphError::DuplicateName(node.name().to_string()));
        }
        node.set_default_words(self.default_words);
        self.nodes.push(node);
        Ok(())
    }

    /// Removes a node by name, stopping it and disconnecting its ports. A
    /// port whose neighbour is still running stays connected with a warning.
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.name() == name)?;
        let node = self.nodes.remove(index);
        node.stop();
        for i in 0..node.input_count().unwrap_or(0) {
            if node.input(i).is_connected()
                && let Err(err) = node.input(i).disconnect()
            {
                tracing::warn!(node = %name, input = i, %err, "input left connected on removal");
            }
        }
        for o in 0..node.output_count().unwrap_or(0) {
            if let Err(err) = node.output(o).disconnect() {
                tracing::warn!(node = %name, output = o, %err, "output left connected on removal");
            }
        }
        Some(node)
    }

    /// Looks up a node by name.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Every member, in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Starts every node. With `wait`, blocks until every node has settled;
    /// if any failed, every node is stopped again and the failures returned.
    pub fn go(&self, wait: bool) -> Result<(), StartError> {
        tracing::info!(nodes = self.nodes.len(), "starting group");
        for node in &self.nodes {
            node.start();
        }
        if wait {
            self.wait_until_going()
        } else {
            Ok(())
        }
    }

    /// Blocks until every node has settled. On failure, stops the group and
    /// reports every node that did not reach the running state.
    pub fn wait_until_going(&self) -> Result<(), StartError> {
        let failures: Vec<NodeFailure> = self
            .nodes
            .iter()
            .filter_map(|node| {
                node.wait_until_going().err().map(|kind| NodeFailure {
                    node: node.name().to_string(),
                    kind,
                })
            })
            .collect();
        if failures.is_empty() {
            return Ok(());
        }
        let err = StartError { failures };
        tracing::warn!(%err, "group failed to start");
        self.stop();
        Err(err)
    }

    /// Stops every node. Stopping a stopped group does nothing.
    pub fn stop(&self) {
        for node in &self.nodes {
            node.stop();
        }
    }

    /// Clears every buffer and processor state. The group must be stopped.
    pub fn reset(&self) -> Result<(), GraphError> {
        for node in &self.nodes {
            node.reset()?;
        }
        Ok(())
    }
}
