/// Correlation graph over high-scoring wallets.
///
/// Two flagged wallets are linked when they front-ran the target on the same
/// tokens at nearly the same time, which points at a shared signal source.

use ferret_core::{CoordinationScore, CorrelationEdge, SECONDS_PER_HOUR};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::config::NetworkSettings;

#[derive(Debug, Clone)]
pub struct NetworkCorrelator {
    settings: NetworkSettings,
}

impl NetworkCorrelator {
    pub fn new(settings: NetworkSettings) -> Self {
        Self { settings }
    }

    /// Edge between `a` and `b`, if they qualify.
    pub fn correlate_pair(&self, a: &CoordinationScore, b: &CoordinationScore) -> Option<CorrelationEdge> {
        let b_tokens: HashSet<&str> = b.shared_purchases.iter().map(|s| s.token_mint.as_str()).collect();
        let mut tokens: Vec<String> = a
            .shared_purchases
            .iter()
            .filter(|s| b_tokens.contains(s.token_mint.as_str()))
            .map(|s| s.token_mint.clone())
            .collect();
        tokens.sort();
        tokens.dedup();

        if tokens.len() < self.settings.min_shared_tokens.max(1) {
            return None;
        }

        let deltas: Vec<f64> = tokens
            .iter()
            .filter_map(|mint| {
                let ta = a.shared_purchase(mint)?.candidate_timestamp;
                let tb = b.shared_purchase(mint)?.candidate_timestamp;
                Some((ta - tb).abs() as f64 / SECONDS_PER_HOUR)
            })
            .collect();
        let avg_time_delta_hours = deltas.iter().sum::<f64>() / deltas.len() as f64;

        if avg_time_delta_hours >= self.settings.max_avg_delta_hours {
            return None;
        }

        Some(CorrelationEdge {
            wallet_a: a.wallet.clone(),
            wallet_b: b.wallet.clone(),
            shared_tokens: tokens.len(),
            avg_time_delta_hours,
            tokens,
        })
    }

    /// Graph over every score at or above the cutoff.
    pub fn correlate(&self, scores: &[CoordinationScore]) -> CoordinationGraph {
        let flagged: Vec<&CoordinationScore> = scores
            .iter()
            .filter(|s| s.final_score >= self.settings.min_score)
            .collect();

        let mut graph = CoordinationGraph::default();
        for score in &flagged {
            graph.add_wallet(&score.wallet);
        }

        for (i, a) in flagged.iter().enumerate() {
            for b in flagged.iter().skip(i + 1) {
                if let Some(edge) = self.correlate_pair(a, b) {
                    debug!(
                        wallet_a = %edge.wallet_a,
                        wallet_b = %edge.wallet_b,
                        shared = edge.shared_tokens,
                        avg_delta_h = edge.avg_time_delta_hours,
                        "Correlated wallets"
                    );
                    graph.add_edge(edge);
                }
            }
        }

        info!(
            wallets = graph.node_count(),
            edges = graph.edge_count(),
            clusters = graph.clusters().len(),
            "Coordination network built"
        );
        graph
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoordinationGraph {
    graph: UnGraph<String, CorrelationEdge>,
    index: HashMap<String, NodeIndex>,
}

impl CoordinationGraph {
    fn add_wallet(&mut self, wallet: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(wallet) {
            return idx;
        }
        let idx = self.graph.add_node(wallet.to_string());
        self.index.insert(wallet.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, edge: CorrelationEdge) {
        let a = self.add_wallet(&edge.wallet_a);
        let b = self.add_wallet(&edge.wallet_b);
        self.graph.add_edge(a, b, edge);
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edges(&self) -> Vec<&CorrelationEdge> {
        self.graph.edge_weights().collect()
    }

    pub fn neighbors(&self, wallet: &str) -> Vec<&str> {
        let mut out: Vec<&str> = match self.index.get(wallet) {
            Some(&idx) => self.graph.neighbors(idx).map(|n| self.graph[n].as_str()).collect(),
            None => Vec::new(),
        };
        out.sort_unstable();
        out
    }

    /// Connected groups of two or more wallets, largest first.
    pub fn clusters(&self) -> Vec<Vec<String>> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut clusters = Vec::new();

        for start in self.graph.node_indices() {
            if visited.contains(&start) {
                continue;
            }
            let mut members = Vec::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                if !visited.insert(node) {
                    continue;
                }
                members.push(self.graph[node].clone());
                stack.extend(self.graph.neighbors(node).filter(|n| !visited.contains(n)));
            }
            if members.len() > 1 {
                members.sort();
                clusters.push(members);
            }
        }

        clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        clusters
    }
}
