//! Node and stage registry for sluice signal graphs.
//!
//! This crate provides a registry for discovering and instantiating graph
//! components by string id. It is built once and passed by reference; there
//! is no global instance.
//!
//! # Features
//!
//! - **Discovery**: List every component with its descriptor
//! - **Factory Pattern**: Create processors, stages, or whole nodes by id
//! - **Pooling**: A stage requested as a node comes wrapped in a
//!   [`WorkerPool`] so it can be scaled across workers
//! - **Fusion**: `"a+b"` builds a [`Combination`] of two registered stages
//!
//! # Example
//!
//! ```rust
//! use sluice_registry::{Category, Registry};
//!
//! let registry = Registry::new();
//!
//! for d in registry.all() {
//!     println!("{}: {}", d.id, d.description);
//! }
//!
//! let window = registry.create_node("window", "frames").unwrap();
//! assert_eq!(window.type_name(), "window");
//!
//! let fused = registry.create_stage("window+sum").unwrap();
//! assert_eq!(fused.type_name(), "window+sum");
//!
//! assert!(!registry.in_category(Category::Spectral).is_empty());
//! ```

use std::sync::Arc;

use sluice_core::{Combination, Node, PoolOptions, Processor, StageFactory, StatelessStage, WorkerPool};
use sluice_stages::{Collector, Discard, Framer, Gain, Magnitude, Ramp, Sine, Sum};

/// Separator for fused stage ids.
pub const FUSE: char = '+';

/// Category of component for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Produces samples without inputs.
    Source,
    /// Consumes samples without outputs.
    Sink,
    /// Cuts streams into frames.
    Framing,
    /// Frequency-domain analysis.
    Spectral,
    /// Gain, reductions, and other simple transforms.
    Utility,
}

impl Category {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            Category::Source => "Source",
            Category::Sink => "Sink",
            Category::Framing => "Framing",
            Category::Spectral => "Spectral",
            Category::Utility => "Utility",
        }
    }

    /// Every category, in listing order.
    pub const ALL: [Category; 5] = [
        Category::Source,
        Category::Framing,
        Category::Spectral,
        Category::Utility,
        Category::Sink,
    ];
}

/// Whether a component runs on its own thread or as a schedulable stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A [`Processor`] driven directly by a node.
    Node,
    /// A [`StatelessStage`], run through a [`WorkerPool`] when used as a node.
    Stage,
}

/// Describes a component in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Unique identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Category for organization.
    pub category: Category,
    /// Node or stage.
    pub kind: Kind,
}

/// Factory function type for processors.
pub type ProcessorFn = fn() -> Box<dyn Processor>;

/// Factory function type for stages.
pub type StageFn = fn() -> Box<dyn StatelessStage>;

#[derive(Clone, Copy)]
enum Factory {
    Processor(ProcessorFn),
    Stage(StageFn),
}

struct Entry {
    descriptor: Descriptor,
    factory: Factory,
}

/// Registry of every available node processor and stage.
pub struct Registry {
    entries: Vec<Entry>,
    pool_options: PoolOptions,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("ids", &self.ids())
            .field("pool_options", &self.pool_options)
            .finish()
    }
}

impl Registry {
    /// Create a new registry with all built-in components registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(8),
            pool_options: PoolOptions::default(),
        };
        registry.register_builtins();
        registry
    }

    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            pool_options: PoolOptions::default(),
        }
    }

    /// Sets the scheduling options given to pools this registry creates.
    pub fn with_pool_options(mut self, options: PoolOptions) -> Self {
        self.pool_options = options;
        self
    }

    /// Scheduling options given to new pools.
    pub fn pool_options(&self) -> PoolOptions {
        self.pool_options
    }

    fn register_builtins(&mut self) {
        self.register_processor(
            Descriptor {
                id: "ramp",
                name: "Ramp",
                description: "Counting source with optional segment plungers",
                category: Category::Source,
                kind: Kind::Node,
            },
            || Box::new(Ramp::new()),
        );
        self.register_processor(
            Descriptor {
                id: "sine",
                name: "Sine",
                description: "Sine test tone",
                category: Category::Source,
                kind: Kind::Node,
            },
            || Box::new(Sine::new()),
        );
        self.register_stage(
            Descriptor {
                id: "window",
                name: "Window",
                description: "Overlapping, optionally tapered frames",
                category: Category::Framing,
                kind: Kind::Stage,
            },
            || Box::new(Framer::default()),
        );
        self.register_stage(
            Descriptor {
                id: "magnitude",
                name: "Magnitude",
                description: "Short-time FFT magnitude spectrum",
                category: Category::Spectral,
                kind: Kind::Stage,
            },
            || Box::new(Magnitude::default()),
        );
        self.register_stage(
            Descriptor {
                id: "sum",
                name: "Sum",
                description: "Sum of the words of each sample",
                category: Category::Utility,
                kind: Kind::Stage,
            },
            || Box::new(Sum::new()),
        );
        self.register_stage(
            Descriptor {
                id: "gain",
                name: "Gain",
                description: "Fixed gain in dB",
                category: Category::Utility,
                kind: Kind::Stage,
            },
            || Box::new(Gain::default()),
        );
        self.register_processor(
            Descriptor {
                id: "collector",
                name: "Collector",
                description: "Records samples and segment boundaries",
                category: Category::Sink,
                kind: Kind::Node,
            },
            || Box::new(Collector::new()),
        );
        self.register_processor(
            Descriptor {
                id: "discard",
                name: "Discard",
                description: "Drains its input",
                category: Category::Sink,
                kind: Kind::Node,
            },
            || Box::new(Discard::new()),
        );
    }

    /// Registers a processor. A later registration under the same id wins.
    pub fn register_processor(&mut self, descriptor: Descriptor, factory: ProcessorFn) {
        self.insert(descriptor, Factory::Processor(factory));
    }

    /// Registers a stage. A later registration under the same id wins.
    pub fn register_stage(&mut self, descriptor: Descriptor, factory: StageFn) {
        self.insert(descriptor, Factory::Stage(factory));
    }

    fn insert(&mut self, descriptor: Descriptor, factory: Factory) {
        assert!(
            !descriptor.id.contains(FUSE),
            "component id '{}' may not contain '{FUSE}'",
            descriptor.id
        );
        self.entries.retain(|e| e.descriptor.id != descriptor.id);
        self.entries.push(Entry {
            descriptor,
            factory,
        });
    }

    fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.descriptor.id == id)
    }

    /// Returns descriptors for all registered components.
    pub fn all(&self) -> Vec<&Descriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors in a specific category.
    pub fn in_category(&self, category: Category) -> Vec<&Descriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Every registered id.
    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.descriptor.id).collect()
    }

    /// Get a descriptor by id.
    pub fn get(&self, id: &str) -> Option<&Descriptor> {
        self.entry(id).map(|e| &e.descriptor)
    }

    /// Returns true if `id` can be instantiated, fused ids included.
    pub fn contains(&self, id: &str) -> bool {
        self.entry(id).is_some() || (id.contains(FUSE) && self.stage_factory(id).is_some())
    }

    /// Create a stage by id. `"a+b"` fuses registered stages left to right.
    pub fn create_stage(&self, id: &str) -> Option<Box<dyn StatelessStage>> {
        let mut parts = id.split(FUSE);
        let mut stage = self.single_stage(parts.next()?)?;
        for part in parts {
            stage = Box::new(Combination::new(stage, self.single_stage(part)?));
        }
        Some(stage)
    }

    fn single_stage(&self, id: &str) -> Option<Box<dyn StatelessStage>> {
        match self.entry(id.trim())?.factory {
            Factory::Stage(f) => Some(f()),
            Factory::Processor(_) => None,
        }
    }

    /// A shareable factory for stage `id`, as a worker pool needs.
    pub fn stage_factory(&self, id: &str) -> Option<StageFactory> {
        let parts: Vec<StageFn> = id
            .split(FUSE)
            .map(|part| match self.entry(part.trim())?.factory {
                Factory::Stage(f) => Some(f),
                Factory::Processor(_) => None,
            })
            .collect::<Option<_>>()?;
        Some(Arc::new(move || {
            let mut stage = parts[0]();
            for f in &parts[1..] {
                stage = Box::new(Combination::new(stage, f()));
            }
            stage
        }))
    }

    /// Create a pool running stage `id`, with no workers yet.
    pub fn create_pool(&self, id: &str) -> Option<WorkerPool> {
        Some(WorkerPool::new(self.stage_factory(id)?, self.pool_options))
    }

    /// Create the processor for `id`. Stages come wrapped in a pool.
    pub fn create_processor(&self, id: &str) -> Option<Box<dyn Processor>> {
        if let Some(Entry {
            factory: Factory::Processor(f),
            ..
        }) = self.entry(id)
        {
            return Some(f());
        }
        self.create_pool(id)
            .map(|pool| Box::new(pool) as Box<dyn Processor>)
    }

    /// Create an unconfigured node named `name` running component `id`.
    pub fn create_node(&self, id: &str, name: &str) -> Option<Node> {
        let processor = self.create_processor(id)?;
        tracing::debug!(id, name, "node created");
        Some(Node::new(name, processor))
    }

    /// Returns the number of registered components.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{Properties, Window};

    #[test]
    fn test_registry_creation() {
        let registry = Registry::new();
        assert_eq!(registry.len(), 8);
        assert!(Registry::empty().is_empty());
    }

    #[test]
    fn test_get_descriptor() {
        let registry = Registry::new();
        let magnitude = registry.get("magnitude").unwrap();
        assert_eq!(magnitude.name, "Magnitude");
        assert_eq!(magnitude.kind, Kind::Stage);
        assert_eq!(magnitude.category, Category::Spectral);
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_by_category() {
        let registry = Registry::new();
        assert_eq!(registry.in_category(Category::Source).len(), 2);
        assert_eq!(registry.in_category(Category::Sink).len(), 2);
        assert_eq!(registry.in_category(Category::Utility).len(), 2);
        let listed: usize = Category::ALL.iter().map(|&c| registry.in_category(c).len()).sum();
        assert_eq!(listed, registry.len());
    }

    #[test]
    fn test_all_components_can_be_created() {
        let registry = Registry::new();
        for d in registry.all() {
            let node = registry.create_node(d.id, d.id);
            assert!(node.is_some(), "failed to create {}", d.id);
            assert_eq!(node.unwrap().type_name(), d.id);
            assert_eq!(registry.create_stage(d.id).is_some(), d.kind == Kind::Stage);
        }
    }

    #[test]
    fn test_fused_ids() {
        let registry = Registry::new();
        let mut fused = registry.create_stage("window+sum").unwrap();
        fused
            .init_from_properties(&Properties::new().with("size", 8usize).with("hop", 4usize))
            .unwrap();
        assert_eq!(fused.window(), Window::new(8, 4, 1));
        assert!(registry.contains("window+gain+sum"));
        assert!(!registry.contains("window+ramp"));
        assert!(registry.create_stage("window+bogus").is_none());
        assert_eq!(registry.create_node("gain+sum", "g").unwrap().type_name(), "gain+sum");
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = Registry::new();
        registry.register_stage(
            Descriptor {
                id: "sum",
                name: "Total",
                description: "Replacement",
                category: Category::Utility,
                kind: Kind::Stage,
            },
            || Box::new(Sum::new()),
        );
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.get("sum").unwrap().name, "Total");
    }
}
