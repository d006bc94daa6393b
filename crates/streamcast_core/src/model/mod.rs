//! Model types: distributions, streams, settings, and the model graph.
//!
//! The model owns an id-keyed map of streams plus an explicit display-order
//! list. The display order doubles as the deterministic iteration order for
//! the graph algorithms (map iteration order is not stable across runs).
//! Validity is checked by an explicit [`Model::validate`] pass, not enforced
//! by construction: transient invalid states are allowed during edits.

pub mod distribution;
pub mod results;
pub mod stream;

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

pub use distribution::{Distribution, PreviewPoint, PERCENTILE_SAMPLES};
pub use results::{
    BreakevenResult, CashflowMonthStats, DeterministicResult, IrrMonteCarloResult,
    MonteCarloResult, NpvMonteCarloResult, TornadoParameter, TornadoResult,
};
pub use stream::{Stream, StreamType};

use crate::error::ModelError;

/// What the calculator solves for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalculationMode {
    #[default]
    #[serde(rename = "NPV")]
    Npv,
    #[serde(rename = "IRR")]
    Irr,
}

fn default_forecast_months() -> usize {
    60
}

fn default_discount_rate() -> Distribution {
    Distribution::Fixed { value: 0.10 }
}

fn default_terminal_growth_rate() -> f64 {
    0.025
}

/// Global model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Forecast horizon in months.
    #[serde(default = "default_forecast_months")]
    pub forecast_months: usize,
    #[serde(default = "default_discount_rate")]
    pub discount_rate: Distribution,
    /// Perpetuity growth rate used for terminal values.
    #[serde(default = "default_terminal_growth_rate")]
    pub terminal_growth_rate: f64,
    /// Optional global annual escalation applied to every stream.
    #[serde(default)]
    pub escalation_rate: Option<Distribution>,
    #[serde(default)]
    pub calculation_mode: CalculationMode,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            forecast_months: default_forecast_months(),
            discount_rate: default_discount_rate(),
            terminal_growth_rate: default_terminal_growth_rate(),
            escalation_rate: None,
            calculation_mode: CalculationMode::Npv,
        }
    }
}

/// Wire shape of a model: streams as a list in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub name: String,
    pub settings: ModelSettings,
    pub streams: Vec<Stream>,
    #[serde(default)]
    pub stream_order: Vec<String>,
}

/// A named collection of streams plus settings. The single handle every
/// calculation entry point takes; the engine never assumes an ambient model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ModelSnapshot", into = "ModelSnapshot")]
pub struct Model {
    pub name: String,
    pub settings: ModelSettings,
    streams: FxHashMap<String, Stream>,
    stream_order: Vec<String>,
}

impl Model {
    pub fn new(name: impl Into<String>, settings: ModelSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            streams: FxHashMap::default(),
            stream_order: Vec::new(),
        }
    }

    /// Insert or replace a stream. New ids are appended to the display order.
    pub fn add_stream(&mut self, stream: Stream) {
        let id = stream.id.clone();
        self.streams.insert(id.clone(), stream);
        if !self.stream_order.contains(&id) {
            self.stream_order.push(id);
        }
    }

    /// Remove a stream. Former children become orphaned roots: their parent
    /// references are cleared, never cascaded.
    pub fn remove_stream(&mut self, stream_id: &str) -> Result<(), ModelError> {
        if self.streams.remove(stream_id).is_none() {
            return Err(ModelError::StreamNotFound(stream_id.to_string()));
        }
        self.stream_order.retain(|id| id != stream_id);
        for stream in self.streams.values_mut() {
            if stream.parent_stream_id.as_deref() == Some(stream_id) {
                stream.parent_stream_id = None;
            }
        }
        Ok(())
    }

    /// Replace the display order. The new order must name every stream
    /// exactly once.
    pub fn reorder_streams(&mut self, new_order: Vec<String>) -> Result<(), ModelError> {
        for id in &new_order {
            if !self.streams.contains_key(id) {
                return Err(ModelError::StreamNotFound(id.clone()));
            }
        }
        let new_set: FxHashSet<&String> = new_order.iter().collect();
        if new_set.len() != new_order.len() || new_set.len() != self.streams.len() {
            return Err(ModelError::InvalidOrder(
                "order list must include all streams exactly once".to_string(),
            ));
        }
        self.stream_order = new_order;
        Ok(())
    }

    #[must_use]
    pub fn stream(&self, id: &str) -> Option<&Stream> {
        self.streams.get(id)
    }

    pub fn stream_mut(&mut self, id: &str) -> Option<&mut Stream> {
        self.streams.get_mut(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Streams in display order.
    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.stream_order.iter().filter_map(|id| self.streams.get(id))
    }

    #[must_use]
    pub fn stream_order(&self) -> &[String] {
        &self.stream_order
    }

    /// Direct children of `parent_id`, in display order.
    #[must_use]
    pub fn get_children(&self, parent_id: &str) -> Vec<&Stream> {
        self.streams()
            .filter(|s| s.parent_stream_id.as_deref() == Some(parent_id))
            .collect()
    }

    /// Advisory validation pass. Must be run before calculation entry
    /// points; mutation methods never invoke it implicitly.
    ///
    /// Checks, in order: parent references resolve, conversion rates are in
    /// `[0, 1]`, the parent/child graph is acyclic (DFS with a recursion
    /// stack, independent of the topological sort), and in NPV mode the
    /// deterministic discount rate exceeds the terminal growth rate.
    pub fn validate(&self) -> Result<(), ModelError> {
        for stream in self.streams() {
            if let Some(parent) = &stream.parent_stream_id {
                if !self.streams.contains_key(parent) {
                    return Err(ModelError::DanglingParent {
                        stream: stream.id.clone(),
                        parent: parent.clone(),
                    });
                }
                if !(0.0..=1.0).contains(&stream.conversion_rate) {
                    return Err(ModelError::InvalidConversionRate {
                        stream: stream.id.clone(),
                        rate: stream.conversion_rate,
                    });
                }
            }
        }

        let children = self.child_adjacency();
        let mut visited = FxHashSet::default();
        let mut on_stack = FxHashSet::default();
        for id in &self.stream_order {
            if !visited.contains(id.as_str())
                && Self::dfs_has_cycle(id, &children, &mut visited, &mut on_stack)
            {
                return Err(ModelError::CircularDependency);
            }
        }

        if self.settings.calculation_mode == CalculationMode::Npv {
            let dr = self.settings.discount_rate.deterministic(None);
            if dr <= self.settings.terminal_growth_rate {
                return Err(ModelError::DiscountNotAboveGrowth {
                    discount_rate: dr,
                    growth_rate: self.settings.terminal_growth_rate,
                });
            }
        }

        Ok(())
    }

    /// A valid evaluation order (parents before children) via Kahn's
    /// algorithm, ties broken by display order. Fails on cycles rather than
    /// returning a partial order.
    pub fn execution_order(&self) -> Result<Vec<String>, ModelError> {
        let children = self.child_adjacency();
        // Seed from the streams themselves: an id in the display order with
        // no backing stream must not enter the sort.
        let mut in_degree: FxHashMap<&str, usize> = self
            .streams()
            .map(|s| (s.id.as_str(), 0))
            .collect();
        for stream in self.streams() {
            if let Some(parent) = &stream.parent_stream_id {
                // Dangling parents contribute no edge; validate() reports them.
                if self.streams.contains_key(parent) {
                    *in_degree.entry(stream.id.as_str()).or_default() += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = self
            .stream_order
            .iter()
            .map(String::as_str)
            .filter(|id| in_degree.get(id).copied() == Some(0))
            .collect();
        let mut order = Vec::with_capacity(self.streams.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            if let Some(kids) = children.get(id) {
                for kid in kids {
                    let deg = in_degree.entry(kid).or_default();
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(kid);
                    }
                }
            }
        }

        if order.len() != self.streams.len() {
            return Err(ModelError::CircularDependency);
        }
        Ok(order)
    }

    /// Parent -> children edges, children listed in display order.
    fn child_adjacency(&self) -> FxHashMap<&str, Vec<&str>> {
        let mut children: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for stream in self.streams() {
            if let Some(parent) = &stream.parent_stream_id {
                if self.streams.contains_key(parent) {
                    children
                        .entry(parent.as_str())
                        .or_default()
                        .push(stream.id.as_str());
                }
            }
        }
        children
    }

    fn dfs_has_cycle<'a>(
        node: &'a str,
        children: &FxHashMap<&'a str, Vec<&'a str>>,
        visited: &mut FxHashSet<&'a str>,
        on_stack: &mut FxHashSet<&'a str>,
    ) -> bool {
        visited.insert(node);
        on_stack.insert(node);
        if let Some(kids) = children.get(node) {
            for kid in kids {
                if !visited.contains(kid) {
                    if Self::dfs_has_cycle(kid, children, visited, on_stack) {
                        return true;
                    }
                } else if on_stack.contains(kid) {
                    return true;
                }
            }
        }
        on_stack.remove(node);
        false
    }
}

impl From<Model> for ModelSnapshot {
    fn from(model: Model) -> Self {
        let mut streams: Vec<Stream> = model
            .stream_order
            .iter()
            .filter_map(|id| model.streams.get(id).cloned())
            .collect();
        // Streams missing from the display order are appended at the end.
        for (id, stream) in &model.streams {
            if !model.stream_order.contains(id) {
                streams.push(stream.clone());
            }
        }
        ModelSnapshot {
            name: model.name,
            settings: model.settings,
            streams,
            stream_order: model.stream_order,
        }
    }
}

impl From<ModelSnapshot> for Model {
    fn from(snapshot: ModelSnapshot) -> Self {
        let mut model = Model::new(snapshot.name, snapshot.settings);
        for stream in snapshot.streams {
            model.add_stream(stream);
        }
        if !snapshot.stream_order.is_empty() {
            // A partial order on the wire is legal; streams it omits are
            // appended in insertion order so they stay visible to iteration
            // and the graph algorithms.
            let appended = std::mem::replace(&mut model.stream_order, snapshot.stream_order);
            for id in appended {
                if !model.stream_order.contains(&id) {
                    model.stream_order.push(id);
                }
            }
        }
        model
    }
}
