// src/graph/executor.rs

//! Bounded-parallel graph execution
//!
//! Runs a caller-supplied action over every vertex of a `DirectedGraph`,
//! honoring precedence edges:
//!
//! - a vertex's action starts only after all of its direct predecessors
//!   completed successfully (happens-before along every edge)
//! - independent subgraphs run concurrently, bounded by the job limit
//! - when an action fails, the transitive successors of its vertex are
//!   skipped; sibling subgraphs run to completion
//! - cancellation is cooperative: in-flight actions finish, nothing new
//!   starts
//!
//! The call is synchronous: it returns once all reachable work has finished
//! or failed.

use crate::graph::DirectedGraph;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use tracing::debug;

/// What went wrong, per vertex, in a failed run
#[derive(Debug)]
pub struct ExecutionReport<V, E> {
    /// Vertices whose action returned an error, with that error
    pub failed: Vec<(V, E)>,

    /// Vertices that never ran: a transitive predecessor failed, or the run
    /// was cancelled before they were scheduled
    pub skipped: Vec<V>,
}

#[derive(Debug)]
pub enum ExecutionError<V, E> {
    /// The graph contains non-trivial strongly connected components; this is
    /// a configuration error and nothing was executed
    Cycle(Vec<Vec<V>>),

    /// Some actions failed or were skipped
    Failures(ExecutionReport<V, E>),
}

/// Bounded worker pool over a precedence graph
pub struct Executor {
    jobs: usize,
    cancel: Arc<AtomicBool>,
}

struct State<V, E> {
    /// Vertices still waiting on predecessors, with their unmet count
    waiting: HashMap<V, usize>,

    /// Vertices whose predecessors all completed; ordered so the smallest
    /// vertex (highest-priority repository) is picked first
    ready: BTreeSet<V>,

    running: usize,
    failed: Vec<(V, E)>,
    skipped: BTreeSet<V>,
}

fn lock<'a, V, E>(state: &'a Mutex<State<V, E>>) -> MutexGuard<'a, State<V, E>> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl Executor {
    /// Create an executor running at most `jobs` actions concurrently
    pub fn new(jobs: usize) -> Self {
        Self {
            jobs: jobs.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for cooperative cancellation
    ///
    /// Once set, in-flight actions are allowed to finish but no new actions
    /// are scheduled; unstarted vertices are reported as skipped.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Execute `action` over every vertex, honoring precedence edges
    ///
    /// Returns `Ok(())` only if every vertex's action succeeded. A cyclic
    /// graph is rejected up front without executing anything.
    pub fn run<V, E, F>(
        &self,
        graph: &DirectedGraph<V>,
        action: F,
    ) -> Result<(), ExecutionError<V, E>>
    where
        V: Clone + Eq + Hash + Ord + Send + Sync,
        E: Send,
        F: Fn(&V) -> Result<(), E> + Sync,
    {
        let components = graph.cycles();
        if !components.is_empty() {
            return Err(ExecutionError::Cycle(components));
        }
        if graph.is_empty() {
            return Ok(());
        }

        let mut waiting = HashMap::new();
        let mut ready = BTreeSet::new();
        for vertex in graph.vertices() {
            let unmet = graph.predecessors(vertex).len();
            if unmet == 0 {
                ready.insert(vertex.clone());
            } else {
                waiting.insert(vertex.clone(), unmet);
            }
        }

        let state = Mutex::new(State {
            waiting,
            ready,
            running: 0,
            failed: Vec::new(),
            skipped: BTreeSet::new(),
        });
        let wakeup = Condvar::new();
        let workers = self.jobs.min(graph.len());
        debug!("Executing {} vertices on {} workers", graph.len(), workers);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| self.worker(graph, &action, &state, &wakeup));
            }
        });

        let state = state.into_inner().unwrap_or_else(|e| e.into_inner());
        if state.failed.is_empty() && state.skipped.is_empty() {
            Ok(())
        } else {
            let mut failed = state.failed;
            failed.sort_by(|a, b| a.0.cmp(&b.0));
            Err(ExecutionError::Failures(ExecutionReport {
                failed,
                skipped: state.skipped.into_iter().collect(),
            }))
        }
    }

    fn worker<V, E, F>(
        &self,
        graph: &DirectedGraph<V>,
        action: &F,
        state: &Mutex<State<V, E>>,
        wakeup: &Condvar,
    ) where
        V: Clone + Eq + Hash + Ord + Send + Sync,
        E: Send,
        F: Fn(&V) -> Result<(), E> + Sync,
    {
        let mut guard = lock(state);
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                // Everything not yet started is skipped
                let unstarted: Vec<V> = guard
                    .ready
                    .iter()
                    .chain(guard.waiting.keys())
                    .cloned()
                    .collect();
                guard.ready.clear();
                guard.waiting.clear();
                guard.skipped.extend(unstarted);
            }

            if let Some(vertex) = guard.ready.pop_first() {
                guard.running += 1;
                drop(guard);

                let result = action(&vertex);

                guard = lock(state);
                guard.running -= 1;
                match result {
                    Ok(()) => {
                        for successor in graph.successors(&vertex) {
                            if let Some(unmet) = guard.waiting.get_mut(&successor) {
                                *unmet -= 1;
                                if *unmet == 0 {
                                    guard.waiting.remove(&successor);
                                    guard.ready.insert(successor);
                                }
                            }
                        }
                    }
                    Err(error) => {
                        // A failed vertex takes its transitive successors
                        // with it; unrelated subgraphs keep running
                        for descendant in graph.descendants(&vertex) {
                            let was_pending = guard.waiting.remove(&descendant).is_some()
                                || guard.ready.remove(&descendant);
                            if was_pending {
                                guard.skipped.insert(descendant);
                            }
                        }
                        guard.failed.push((vertex, error));
                    }
                }
                wakeup.notify_all();
            } else if guard.running == 0 && guard.waiting.is_empty() {
                // All work is finished, failed, or skipped
                wakeup.notify_all();
                return;
            } else {
                guard = wakeup.wait(guard).unwrap_or_else(|e| e.into_inner());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn graph(edges: &[(&str, &str)], isolated: &[&str]) -> DirectedGraph<String> {
        let mut graph = DirectedGraph::new();
        for &(from, to) in edges {
            graph.add_edge(from.to_string(), to.to_string());
        }
        for &vertex in isolated {
            graph.add_vertex(vertex.to_string());
        }
        graph
    }

    #[test]
    fn test_chain_runs_in_precedence_order() {
        let graph = graph(&[("a", "b"), ("b", "c")], &[]);
        let executed = StdMutex::new(Vec::new());

        let executor = Executor::new(4);
        executor
            .run(&graph, |v: &String| -> Result<(), String> {
                executed.lock().unwrap().push(v.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(*executed.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_failure_skips_descendants_but_not_siblings() {
        let graph = graph(&[("a", "b"), ("b", "c")], &["d"]);
        let executed = StdMutex::new(Vec::new());

        let executor = Executor::new(4);
        let err = executor
            .run(&graph, |v: &String| {
                executed.lock().unwrap().push(v.clone());
                if v == "a" {
                    Err(format!("{} broke", v))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        let executed = executed.lock().unwrap();
        assert!(executed.contains(&"d".to_string()));
        assert!(!executed.contains(&"b".to_string()));
        assert!(!executed.contains(&"c".to_string()));

        match err {
            ExecutionError::Failures(report) => {
                assert_eq!(report.failed.len(), 1);
                assert_eq!(report.failed[0].0, "a");
                assert_eq!(report.skipped, vec!["b".to_string(), "c".to_string()]);
            }
            ExecutionError::Cycle(_) => panic!("unexpected cycle report"),
        }
    }

    #[test]
    fn test_cycle_reported_without_executing() {
        let graph = graph(&[("x", "y"), ("y", "x")], &["z"]);
        let executed = StdMutex::new(Vec::new());

        let executor = Executor::new(4);
        let err = executor
            .run(&graph, |v: &String| -> Result<(), String> {
                executed.lock().unwrap().push(v.clone());
                Ok(())
            })
            .unwrap_err();

        assert!(executed.lock().unwrap().is_empty());
        match err {
            ExecutionError::Cycle(components) => {
                assert_eq!(components.len(), 1);
                let mut cycle = components[0].clone();
                cycle.sort();
                assert_eq!(cycle, vec!["x".to_string(), "y".to_string()]);
            }
            ExecutionError::Failures(_) => panic!("expected a cycle report"),
        }
    }

    #[test]
    fn test_single_worker_picks_smallest_ready_vertex() {
        let mut graph = DirectedGraph::new();
        for v in [3u32, 1, 2] {
            graph.add_vertex(v);
        }
        let executed = StdMutex::new(Vec::new());

        Executor::new(1)
            .run(&graph, |v: &u32| -> Result<(), ()> {
                executed.lock().unwrap().push(*v);
                Ok(())
            })
            .unwrap();

        assert_eq!(*executed.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_cancellation_skips_unstarted_vertices() {
        let graph = graph(&[("a", "b"), ("b", "c")], &[]);
        let executor = Executor::new(1);
        let cancel = executor.cancel_handle();

        let err = executor
            .run(&graph, |v: &String| -> Result<(), String> {
                if v == "a" {
                    cancel.store(true, Ordering::SeqCst);
                }
                Ok(())
            })
            .unwrap_err();

        match err {
            ExecutionError::Failures(report) => {
                assert!(report.failed.is_empty());
                assert_eq!(report.skipped, vec!["b".to_string(), "c".to_string()]);
            }
            ExecutionError::Cycle(_) => panic!("unexpected cycle report"),
        }
    }

    #[test]
    fn test_many_vertices_with_bounded_workers() {
        let mut graph = DirectedGraph::new();
        for v in 0u32..50 {
            graph.add_vertex(v);
        }
        // A few precedence constraints in the middle
        graph.add_edge(10, 11);
        graph.add_edge(11, 12);

        let count = StdMutex::new(0usize);
        Executor::new(3)
            .run(&graph, |_: &u32| -> Result<(), ()> {
                *count.lock().unwrap() += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(*count.lock().unwrap(), 50);
    }

    #[test]
    fn test_empty_graph_succeeds() {
        let graph: DirectedGraph<u32> = DirectedGraph::new();
        let result: Result<(), ExecutionError<u32, ()>> =
            Executor::new(4).run(&graph, |_| Ok(()));
        assert!(result.is_ok());
    }
}
