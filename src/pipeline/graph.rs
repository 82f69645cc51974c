//! Task dependency graph for one job run.

use crate::error::{Error, Result};
use crate::rules::Rule;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::BTreeMap;
use std::fmt;

/// A unit of work in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    LoadData,
    Rule(Rule),
    Report,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::LoadData => f.write_str("load_data"),
            Task::Rule(rule) => write!(f, "{}", rule),
            Task::Report => f.write_str("print_report"),
        }
    }
}

/// Directed acyclic graph of tasks; an edge `a -> b` means `b` needs `a`.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    graph: DiGraph<Task, ()>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The job's fixed shape: load once, fan out to every rule, join in the report.
    pub fn standard() -> Self {
        let mut graph = Self::new();
        let load = graph.add_task(Task::LoadData);
        let report = graph.add_task(Task::Report);

        for rule in Rule::ALL {
            let node = graph.add_task(Task::Rule(rule));
            graph.add_dependency(load, node);
            graph.add_dependency(node, report);
        }
        graph
    }

    pub fn add_task(&mut self, task: Task) -> NodeIndex {
        self.graph.add_node(task)
    }

    pub fn add_dependency(&mut self, upstream: NodeIndex, downstream: NodeIndex) {
        self.graph.add_edge(upstream, downstream, ());
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Group tasks into stages that can run once every earlier stage is done.
    ///
    /// A task's stage is one past the latest stage of its dependencies.
    /// Within a stage, tasks keep the order they were added in.
    pub fn stages(&self) -> Result<Vec<Vec<Task>>> {
        let order = toposort(&self.graph, None).map_err(|cycle| {
            Error::TaskGraph(format!(
                "dependency cycle through {}",
                self.graph[cycle.node_id()]
            ))
        })?;

        let mut level: BTreeMap<NodeIndex, usize> = BTreeMap::new();
        for node in &order {
            let stage = self
                .graph
                .neighbors_directed(*node, Direction::Incoming)
                .filter_map(|upstream| level.get(&upstream))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level.insert(*node, stage);
        }

        let depth = level.values().copied().max().map_or(0, |d| d + 1);
        let mut stages: Vec<Vec<NodeIndex>> = vec![Vec::new(); depth];
        for (node, stage) in &level {
            stages[*stage].push(*node);
        }

        Ok(stages
            .into_iter()
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .collect())
    }
}
