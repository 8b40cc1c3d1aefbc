//! Task graph index (Arc<str> optimized)
//!
//! Indexes every task at any nesting depth by name, with two edge sets:
//! `then` transitions (flow) and `depends_on` / data edges (dependencies).

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::task::{walk_tasks, Task, END_FLOW};

/// Graph of named tasks and the edges between them
pub struct FlowGraph {
    /// task -> `then` / switch targets
    successors: FxHashMap<Arc<str>, Vec<Arc<str>>>,
    /// task -> tasks it depends on
    predecessors: FxHashMap<Arc<str>, Vec<Arc<str>>>,
    /// All task names, declaration order, depth-first
    task_ids: Vec<Arc<str>>,
    task_set: FxHashSet<Arc<str>>,
}

impl FlowGraph {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut task_ids: Vec<Arc<str>> = Vec::with_capacity(tasks.len());
        let mut task_set: FxHashSet<Arc<str>> = FxHashSet::default();

        // Create Arc<str> once per task, reuse everywhere
        walk_tasks(tasks, &mut |task| {
            let id: Arc<str> = Arc::from(task.name());
            if task_set.insert(Arc::clone(&id)) {
                task_ids.push(id);
            }
        });

        let intern = |name: &str| -> Arc<str> {
            task_set
                .get(name)
                .cloned()
                .unwrap_or_else(|| Arc::from(name))
        };

        let mut successors: FxHashMap<Arc<str>, Vec<Arc<str>>> = FxHashMap::default();
        let mut predecessors: FxHashMap<Arc<str>, Vec<Arc<str>>> = FxHashMap::default();

        walk_tasks(tasks, &mut |task| {
            let id = intern(task.name());
            let targets = task
                .next()
                .into_iter()
                .chain(task.config().flow_targets())
                .filter(|t| *t != END_FLOW);
            for target in targets {
                successors
                    .entry(Arc::clone(&id))
                    .or_default()
                    .push(intern(target));
            }
            for dep in task.dependencies() {
                predecessors
                    .entry(Arc::clone(&id))
                    .or_default()
                    .push(intern(dep));
            }
        });

        Self {
            successors,
            predecessors,
            task_ids,
            task_set,
        }
    }

    /// Check if task exists at any depth
    #[inline]
    pub fn contains(&self, task_id: &str) -> bool {
        self.task_set.contains(task_id)
    }

    pub fn task_ids(&self) -> &[Arc<str>] {
        &self.task_ids
    }

    /// Get dependencies of a task (returns Arc<str> slice)
    #[inline]
    pub fn get_dependencies(&self, task_id: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.predecessors
            .get(task_id)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }

    /// Get flow successors of a task
    #[inline]
    pub fn get_successors(&self, task_id: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.successors
            .get(task_id)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }

    /// Check if there's a flow path from `from` to `to` (BFS)
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }

        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut queue: VecDeque<&str> = VecDeque::new();

        queue.push_back(from);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            for neighbor in self.get_successors(current) {
                if neighbor.as_ref() == to {
                    return true;
                }
                if visited.insert(neighbor.as_ref()) {
                    queue.push_back(neighbor.as_ref());
                }
            }
        }

        false
    }

    /// First dependency cycle found, as `[a, b, ..., a]`
    pub fn find_cycle(&self) -> Option<Vec<Arc<str>>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'g>(
            graph: &'g FlowGraph,
            node: &'g Arc<str>,
            marks: &mut FxHashMap<&'g str, Mark>,
            stack: &mut Vec<&'g Arc<str>>,
        ) -> Option<Vec<Arc<str>>> {
            match marks.get(node.as_ref()) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == node)?;
                    let mut cycle: Vec<Arc<str>> =
                        stack[start..].iter().map(|n| Arc::clone(n)).collect();
                    cycle.push(Arc::clone(node));
                    return Some(cycle);
                }
                None => {}
            }

            marks.insert(node.as_ref(), Mark::Visiting);
            stack.push(node);
            for dep in graph.get_dependencies(node) {
                if let Some(cycle) = visit(graph, dep, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(node.as_ref(), Mark::Done);
            None
        }

        let mut marks = FxHashMap::default();
        let mut stack = Vec::new();
        self.task_ids
            .iter()
            .find_map(|id| visit(self, id, &mut marks, &mut stack))
    }
}
