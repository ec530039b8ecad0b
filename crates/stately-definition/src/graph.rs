use std::collections::{HashMap, HashSet, VecDeque};

use crate::definition::StateGraph;

/// Transition structure of one [`StateGraph`] for traversal and analysis.
///
/// Edges cover every way control can move between states of the same graph:
/// `Next`, Choice targets and `Default`, and `Catch` targets.
#[derive(Debug, Clone)]
pub struct Graph {
  start_at: String,
  /// Adjacency list: state -> states it can transition to.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: state -> states that can transition to it.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// States where the graph can finish.
  terminals: HashSet<String>,
}

impl Graph {
  pub fn new(graph: &StateGraph) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut terminals = HashSet::new();

    for name in graph.states.keys() {
      adjacency.entry(name.clone()).or_default();
      reverse_adjacency.entry(name.clone()).or_default();
    }

    for (name, state) in &graph.states {
      for to in state.successors() {
        // Dangling targets are reported by the validator, not modelled here.
        if !graph.states.contains_key(to) {
          continue;
        }
        adjacency.entry(name.clone()).or_default().push(to.to_string());
        reverse_adjacency
          .entry(to.to_string())
          .or_default()
          .push(name.clone());
      }
      if state.is_terminal() {
        terminals.insert(name.clone());
      }
    }

    Self {
      start_at: graph.start_at.clone(),
      adjacency,
      reverse_adjacency,
      terminals,
    }
  }

  /// States a given state can transition to.
  pub fn downstream(&self, name: &str) -> &[String] {
    self
      .adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// States that can transition to a given state.
  pub fn upstream(&self, name: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn is_terminal(&self, name: &str) -> bool {
    self.terminals.contains(name)
  }

  /// States reachable from `StartAt`, including it.
  pub fn reachable(&self) -> HashSet<String> {
    walk(&self.start_at, |name| self.downstream(name))
  }

  /// States from which some terminal state can be reached.
  pub fn can_finish(&self) -> HashSet<String> {
    let mut seen = HashSet::new();
    for terminal in &self.terminals {
      seen.extend(walk(terminal, |name| self.upstream(name)));
    }
    seen
  }
}

fn walk<'a>(start: &str, next: impl Fn(&str) -> &'a [String]) -> HashSet<String> {
  let mut seen = HashSet::new();
  let mut queue = VecDeque::from([start.to_string()]);
  while let Some(name) = queue.pop_front() {
    if !seen.insert(name.clone()) {
      continue;
    }
    for to in next(&name) {
      if !seen.contains(to) {
        queue.push_back(to.clone());
      }
    }
  }
  seen
}
