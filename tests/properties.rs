#![allow(missing_docs)]

use chain_graph::{
    error::ChainGraphError,
    graph::{ChainGraph, build::ChainGraphBuilder},
    logical::{BuildApi, LogicalModel},
    node::TaskKind,
    types::{ChainNodeId, ChainRegisterId, HashSet},
};
use proptest::prelude::*;

/// A random DAG over nodes `0..n`: edges only go from a lower to a higher
/// index, so the generated topology is acyclic by construction.
#[derive(Debug, Clone)]
struct DagProblem {
    n: usize,
    edges: Vec<(usize, usize)>,
    times: Vec<u8>,
}

impl DagProblem {
    fn successors(&self, node: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|&&(src, _)| src == node)
            .map(|&(_, dst)| dst)
            .collect()
    }

    /// Brute-force DFS reachability, including `src == dst`.
    fn reaches(&self, src: usize, dst: usize) -> bool {
        let mut stack = vec![src];
        let mut seen = vec![false; self.n];
        while let Some(node) = stack.pop() {
            if node == dst {
                return true;
            }
            if std::mem::replace(&mut seen[node], true) {
                continue;
            }
            stack.extend(self.successors(node));
        }
        false
    }

    /// Maximum total time over every path from `src` to any of `ends`, by
    /// exhaustive enumeration.
    fn max_path_time(&self, src: usize, ends: &[usize]) -> Option<u32> {
        let here = u32::from(self.times[src]);
        let mut best = ends.contains(&src).then_some(here);
        for succ in self.successors(src) {
            if let Some(tail) = self.max_path_time(succ, ends) {
                best = best.max(Some(here + tail));
            }
        }
        best
    }
}

fn dag_problem() -> impl Strategy<Value = DagProblem> {
    (2usize..=10)
        .prop_flat_map(|n| {
            let pairs = n * (n - 1) / 2;
            (
                Just(n),
                prop::collection::vec(prop::bool::weighted(0.35), pairs),
                prop::collection::vec(0u8..5, n),
            )
        })
        .prop_map(|(n, mask, times)| {
            let edges = (0..n)
                .flat_map(|src| ((src + 1)..n).map(move |dst| (src, dst)))
                .zip(mask)
                .filter_map(|(edge, keep)| keep.then_some(edge))
                .collect();
            DagProblem { n, edges, times }
        })
}

/// Builds the problem with one register per node that has successors,
/// consumed by all of them.
fn build(problem: &DagProblem) -> (ChainGraph, Vec<ChainNodeId>, Vec<(ChainRegisterId, usize)>) {
    let mut builder = ChainGraphBuilder::new();
    let ids: Vec<ChainNodeId> = (0..problem.n)
        .map(|i| {
            builder
                .add_node(format!("n{i}"), TaskKind::Forward)
                .expect("node must be created")
        })
        .collect();
    let mut registers = vec![];
    for src in 0..problem.n {
        let succs = problem.successors(src);
        if succs.is_empty() {
            continue;
        }
        let register = builder
            .add_register(ids[src])
            .expect("register must be created");
        for dst in succs {
            builder
                .consume(ids[dst], register)
                .expect("consumer must be wired");
        }
        registers.push((register, src));
    }
    let graph = builder.freeze().expect("freeze must succeed");
    (graph, ids, registers)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reachability_matches_brute_force(problem in dag_problem()) {
        let (graph, ids, _) = build(&problem);
        for a in 0..problem.n {
            for b in 0..problem.n {
                prop_assert_eq!(graph.is_reachable(ids[a], ids[b]), problem.reaches(a, b));
            }
            // No node reaches itself through a non-trivial path.
            let descendants = graph
                .reachability()
                .descendants(ids[a])
                .expect("every node is indexed");
            prop_assert!(!descendants.contains(&ids[a]));
        }
    }

    #[test]
    fn subgraph_members_lie_between_producer_and_consumers(problem in dag_problem()) {
        let (graph, ids, registers) = build(&problem);
        for (register, src) in registers {
            let subgraph = graph.subgraph(register).expect("every register has a subgraph");
            let ends = problem.successors(src);
            for k in 0..problem.n {
                let expected = problem.reaches(src, k)
                    && ends.iter().any(|&end| problem.reaches(k, end));
                prop_assert_eq!(subgraph.contains(ids[k]), expected);
            }
        }
    }

    #[test]
    fn critical_path_is_optimal_and_deterministic(problem in dag_problem()) {
        let (graph, ids, registers) = build(&problem);
        let index_of = |id: ChainNodeId| {
            ids.iter().position(|&candidate| candidate == id).expect("known node")
        };
        let time = |id: ChainNodeId| f64::from(problem.times[index_of(id)]);
        let paths = graph
            .chain_register_id_to_path_chain_node_ids(time)
            .expect("paths must be computed");
        prop_assert_eq!(paths.len(), registers.len());

        for (register, src) in registers {
            let ends = problem.successors(src);
            let path: Vec<usize> = paths[&register].iter().map(|&id| index_of(id)).collect();
            prop_assert_eq!(path.first().copied(), Some(src));
            prop_assert!(ends.contains(path.last().expect("path is never empty")));
            for hop in path.windows(2) {
                prop_assert!(problem.edges.contains(&(hop[0], hop[1])));
            }
            let total: u32 = path.iter().map(|&node| u32::from(problem.times[node])).sum();
            prop_assert_eq!(Some(total), problem.max_path_time(src, &ends));

            let again = graph.longest_path(register, time).expect("path must be computed");
            prop_assert_eq!(&again, &paths[&register]);
        }
    }
}

/// A random training step: parameters first, then operators reading earlier
/// registers, then a head operator reading the last output and every
/// parameter, whose output is the loss.
#[derive(Debug, Clone)]
struct StepPlan {
    models: usize,
    ops: Vec<Vec<usize>>,
}

impl LogicalModel for StepPlan {
    fn describe(&self, api: &mut impl BuildApi) -> Result<(), ChainGraphError> {
        let mut available = vec![];
        let mut models = vec![];
        for i in 0..self.models {
            let model = api.model(&format!("w{i}"))?;
            available.push(model);
            models.push(model);
        }
        for (i, picks) in self.ops.iter().enumerate() {
            let inputs: Vec<ChainRegisterId> = if available.is_empty() {
                vec![]
            } else {
                picks.iter().map(|&pick| available[pick % available.len()]).collect()
            };
            let out = api.op(&format!("op{i}"), &inputs)?;
            available.push(out);
        }
        let mut head_inputs = models;
        head_inputs.extend(available.last().copied());
        let head = api.op("head", &head_inputs)?;
        api.loss(head)
    }
}

fn step_plan() -> impl Strategy<Value = StepPlan> {
    (
        0usize..3,
        prop::collection::vec(prop::collection::vec(0usize..16, 0..3), 0..6),
    )
        .prop_map(|(models, ops)| StepPlan { models, ops })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn training_steps_are_well_formed(plan in step_plan()) {
        let graph = ChainGraph::build(&plan).expect("build must succeed");

        let node_ids: Vec<i64> = graph.nodes().map(|node| node.chain_node_id().get()).collect();
        let register_ids: Vec<i64> = graph
            .registers()
            .map(|register| register.chain_register_id().get())
            .collect();
        let all: HashSet<i64> = node_ids.iter().chain(&register_ids).copied().collect();
        prop_assert_eq!(all.len(), node_ids.len() + register_ids.len());

        for node in graph.nodes() {
            let descendants = graph
                .reachability()
                .descendants(node.chain_node_id())
                .expect("every node is indexed");
            prop_assert!(!descendants.contains(&node.chain_node_id()));
        }

        let fw_map = graph.chain_node_id_to_fw_chain_node_id();
        for node in graph.nodes() {
            if node.task_kind() == TaskKind::Backward {
                let fw = graph.node(fw_map[&node.chain_node_id()]).expect("forward exists");
                prop_assert_eq!(fw.task_kind(), TaskKind::Forward);
                prop_assert_eq!(fw.name(), node.name());
            }
        }

        let paths = graph
            .chain_register_id_to_default_path_chain_node_ids()
            .expect("paths must be computed");
        for register in graph.registers() {
            prop_assert!(!register.consumers().is_empty());
            let path = &paths[&register.chain_register_id()];
            prop_assert_eq!(path.first().copied(), Some(register.producer()));
            let last = path.last().expect("path is never empty");
            prop_assert!(register.consumers().contains(last));
        }
    }
}
