// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Concurrent condition-tree evaluation.
//!
//! Leaves are independent network calls, so they are fanned out through a
//! bounded `JoinSet` instead of awaited sequentially. The boolean fold over
//! the tree happens after all leaf outcomes are in; combinators are
//! commutative, so completion order never changes the result.
//!
//! Failure policy is fail-closed throughout: an oracle error or a missed
//! deadline produces a failed leaf with `error` populated, and admission is
//! never granted on inconclusive evidence.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::chain::{BalanceOracle, BalanceQuery};

use super::{ConditionNode, LeafCondition};

/// Default cap on concurrent leaf queries per evaluation. Public RPC
/// endpoints rate-limit aggressively; eight in flight is plenty.
const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Default outer deadline for a whole-tree evaluation.
const DEFAULT_DEADLINE_SECS: u64 = 30;

/// Outcome of a single leaf condition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafResult {
    pub leaf_id: usize,
    pub passed: bool,
    /// Observed on-chain value (base units), when the query succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<String>,
    /// Oracle error or timeout; distinct from "condition not met"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of evaluating one gate's tree for one wallet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub gate_id: String,
    pub wallet_address: String,
    pub passed: bool,
    pub leaf_results: Vec<LeafResult>,
    pub evaluated_at: DateTime<Utc>,
}

/// Walks condition trees and joins concurrent oracle queries.
pub struct Evaluator {
    oracle: Arc<dyn BalanceOracle>,
    max_concurrency: usize,
    deadline: Duration,
}

impl Evaluator {
    pub fn new(oracle: Arc<dyn BalanceOracle>) -> Self {
        Self {
            oracle,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Evaluate `tree` for `wallet`, producing per-leaf detail and the
    /// folded pass/fail outcome.
    pub async fn evaluate(
        &self,
        gate_id: &str,
        tree: &ConditionNode,
        wallet: Address,
    ) -> EvaluationResult {
        let leaves: Vec<(usize, LeafCondition)> = tree
            .leaves()
            .into_iter()
            .map(|(id, leaf)| (id, leaf.clone()))
            .collect();
        let leaf_count = leaves.len();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut set: JoinSet<LeafResult> = JoinSet::new();

        for (leaf_id, leaf) in leaves {
            let oracle = self.oracle.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                // Semaphore closed only if the evaluator is dropped mid-flight.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return errored_leaf(leaf_id, "evaluation cancelled"),
                };
                evaluate_leaf(oracle.as_ref(), leaf_id, &leaf, wallet).await
            });
        }

        // Collect incrementally against an absolute deadline: leaves that
        // finish in time keep their real outcome even if a sibling stalls.
        let mut results: Vec<Option<LeafResult>> = vec![None; leaf_count];
        let deadline = tokio::time::Instant::now() + self.deadline;
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok(leaf_result))) => {
                    let leaf_id = leaf_result.leaf_id;
                    results[leaf_id] = Some(leaf_result);
                }
                Ok(Some(Err(e))) => {
                    tracing::error!(gate_id, error = %e, "leaf task panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(gate_id, "evaluation deadline exceeded, unfinished leaves fail");
                    set.abort_all();
                    break;
                }
            }
        }

        // Leaves that panicked or missed the deadline still get a reported,
        // failed outcome.
        let leaf_results: Vec<LeafResult> = results
            .into_iter()
            .enumerate()
            .map(|(id, slot)| {
                slot.unwrap_or_else(|| errored_leaf(id, "evaluation deadline exceeded"))
            })
            .collect();

        let mut next_leaf = 0usize;
        let passed = fold(tree, &leaf_results, &mut next_leaf);

        EvaluationResult {
            gate_id: gate_id.to_string(),
            wallet_address: format!("{wallet:#x}"),
            passed,
            leaf_results,
            evaluated_at: Utc::now(),
        }
    }
}

/// Evaluate one leaf: query the oracle, apply the comparator.
async fn evaluate_leaf(
    oracle: &dyn BalanceOracle,
    leaf_id: usize,
    leaf: &LeafCondition,
    wallet: Address,
) -> LeafResult {
    // Parse failures can only happen for trees that bypassed registry
    // validation; they are reported as errored leaves, not panics.
    let quantity = match leaf.parsed_quantity() {
        Ok(q) => q,
        Err(e) => return errored_leaf(leaf_id, e.to_string()),
    };
    let token_id = match leaf.parsed_token_id() {
        Ok(t) => t,
        Err(e) => return errored_leaf(leaf_id, e.to_string()),
    };
    let contract = match &leaf.contract_address {
        None => None,
        Some(raw) => match crate::chain::client::parse_address(raw) {
            Ok(addr) => Some(addr),
            Err(e) => return errored_leaf(leaf_id, e.to_string()),
        },
    };

    let query = BalanceQuery {
        chain: leaf.chain.clone(),
        standard: leaf.asset_standard,
        contract,
        token_id,
        wallet,
    };

    match oracle.observe(&query).await {
        Ok(observed) => LeafResult {
            leaf_id,
            passed: leaf.comparator.compare(observed, quantity),
            observed_value: Some(observed.to_string()),
            error: None,
        },
        Err(e) => errored_leaf(leaf_id, e.to_string()),
    }
}

fn errored_leaf(leaf_id: usize, error: impl Into<String>) -> LeafResult {
    LeafResult {
        leaf_id,
        passed: false,
        observed_value: None,
        error: Some(error.into()),
    }
}

/// Fold leaf outcomes back through the tree. `next_leaf` tracks the
/// pre-order position, matching the ids assigned at flatten time.
fn fold(node: &ConditionNode, leaf_results: &[LeafResult], next_leaf: &mut usize) -> bool {
    match node {
        ConditionNode::Leaf(_) => {
            let passed = leaf_results
                .get(*next_leaf)
                .map(|r| r.passed)
                .unwrap_or(false);
            *next_leaf += 1;
            passed
        }
        ConditionNode::Group(group) => {
            // Children must all be folded to keep leaf numbering aligned,
            // so no short-circuit here; the queries already ran anyway.
            let child_outcomes: Vec<bool> = group
                .children
                .iter()
                .map(|child| fold(child, leaf_results, next_leaf))
                .collect();
            match group.combinator {
                super::Combinator::And => child_outcomes.iter().all(|p| *p),
                super::Combinator::Or => child_outcomes.iter().any(|p| *p),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::ChainClientError;
    use crate::conditions::{AssetStandard, Combinator, Comparator, GroupCondition};
    use alloy::primitives::U256;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::str::FromStr;

    const TOKEN_X: &str = "0x5425890298aed601595a70AB815c96711a31Bc65";
    const TOKEN_Y: &str = "0x76568BEd5Acf1A5Cd888773C8cAe9ea2a9131A63";

    /// Oracle with a fixed balance table; contracts not in the table error.
    struct MockOracle {
        balances: HashMap<String, U256>,
    }

    impl MockOracle {
        fn new(entries: &[(&str, u64)]) -> Self {
            let balances = entries
                .iter()
                .map(|(key, bal)| (key.to_lowercase(), U256::from(*bal)))
                .collect();
            Self { balances }
        }
    }

    #[async_trait]
    impl BalanceOracle for MockOracle {
        async fn observe(&self, query: &BalanceQuery) -> Result<U256, ChainClientError> {
            let key = match query.contract {
                Some(contract) => format!("{contract:#x}"),
                None => "native".to_string(),
            };
            self.balances
                .get(&key)
                .copied()
                .ok_or_else(|| ChainClientError::RpcError("endpoint unreachable".to_string()))
        }
    }

    fn wallet() -> Address {
        Address::from_str("0x00000000000000000000000000000000000000aa").unwrap()
    }

    fn leaf(contract: &str, comparator: Comparator, quantity: &str) -> ConditionNode {
        ConditionNode::Leaf(LeafCondition {
            chain: "fuji".to_string(),
            contract_address: Some(contract.to_string()),
            asset_standard: AssetStandard::Erc20,
            token_id: None,
            method: None,
            comparator,
            quantity: quantity.to_string(),
        })
    }

    fn and(children: Vec<ConditionNode>) -> ConditionNode {
        ConditionNode::Group(GroupCondition {
            combinator: Combinator::And,
            children,
        })
    }

    fn or(children: Vec<ConditionNode>) -> ConditionNode {
        ConditionNode::Group(GroupCondition {
            combinator: Combinator::Or,
            children,
        })
    }

    fn evaluator(oracle: MockOracle) -> Evaluator {
        Evaluator::new(Arc::new(oracle))
    }

    #[tokio::test]
    async fn gte_passes_at_exact_boundary() {
        let eval = evaluator(MockOracle::new(&[(TOKEN_X, 100)]));
        let tree = leaf(TOKEN_X, Comparator::Gte, "100");
        let result = eval.evaluate("gate-1", &tree, wallet()).await;
        assert!(result.passed);
        assert_eq!(result.leaf_results[0].observed_value.as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn gt_fails_at_exact_boundary() {
        let eval = evaluator(MockOracle::new(&[(TOKEN_X, 100)]));
        let tree = leaf(TOKEN_X, Comparator::Gt, "100");
        let result = eval.evaluate("gate-1", &tree, wallet()).await;
        assert!(!result.passed);
        assert!(result.leaf_results[0].error.is_none());
    }

    #[tokio::test]
    async fn and_group_requires_all_children() {
        let eval = evaluator(MockOracle::new(&[(TOKEN_X, 150), (TOKEN_Y, 5)]));
        let tree = and(vec![
            leaf(TOKEN_X, Comparator::Gte, "100"),
            leaf(TOKEN_Y, Comparator::Gte, "10"),
        ]);
        let result = eval.evaluate("gate-1", &tree, wallet()).await;
        assert!(!result.passed);
        assert!(result.leaf_results[0].passed);
        assert!(!result.leaf_results[1].passed);
    }

    #[tokio::test]
    async fn or_group_requires_any_child() {
        let eval = evaluator(MockOracle::new(&[(TOKEN_X, 0), (TOKEN_Y, 50)]));
        let tree = or(vec![
            leaf(TOKEN_X, Comparator::Gte, "100"),
            leaf(TOKEN_Y, Comparator::Gte, "10"),
        ]);
        let result = eval.evaluate("gate-1", &tree, wallet()).await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn oracle_error_fails_closed_in_and_group() {
        // TOKEN_Y missing from the table: its leaf errors.
        let eval = evaluator(MockOracle::new(&[(TOKEN_X, 150)]));
        let tree = and(vec![
            leaf(TOKEN_X, Comparator::Gte, "100"),
            leaf(TOKEN_Y, Comparator::Gte, "1"),
        ]);
        let result = eval.evaluate("gate-1", &tree, wallet()).await;
        assert!(!result.passed, "errored leaf must never be vacuously true");
        let errored = &result.leaf_results[1];
        assert!(!errored.passed);
        assert!(errored.error.as_deref().unwrap().contains("unreachable"));
        assert!(errored.observed_value.is_none());
    }

    #[tokio::test]
    async fn every_leaf_is_reported() {
        let eval = evaluator(MockOracle::new(&[(TOKEN_X, 1), (TOKEN_Y, 1)]));
        let tree = or(vec![
            leaf(TOKEN_X, Comparator::Gte, "1"),
            and(vec![
                leaf(TOKEN_Y, Comparator::Gte, "1"),
                leaf(TOKEN_X, Comparator::Eq, "1"),
            ]),
        ]);
        let result = eval.evaluate("gate-1", &tree, wallet()).await;
        assert_eq!(result.leaf_results.len(), 3);
        let ids: Vec<usize> = result.leaf_results.iter().map(|r| r.leaf_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    /// Oracle that stalls on one contract and answers instantly otherwise.
    struct StallingOracle {
        stalled: String,
    }

    #[async_trait]
    impl BalanceOracle for StallingOracle {
        async fn observe(&self, query: &BalanceQuery) -> Result<U256, ChainClientError> {
            if let Some(contract) = query.contract {
                if format!("{contract:#x}") == self.stalled.to_lowercase() {
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                }
            }
            Ok(U256::from(100u64))
        }
    }

    #[tokio::test]
    async fn deadline_keeps_outcomes_of_finished_leaves() {
        let eval = Evaluator::new(Arc::new(StallingOracle {
            stalled: TOKEN_Y.to_string(),
        }))
        .with_deadline(std::time::Duration::from_millis(200));
        let tree = and(vec![
            leaf(TOKEN_X, Comparator::Gte, "100"),
            leaf(TOKEN_Y, Comparator::Gte, "100"),
        ]);

        let result = eval.evaluate("gate-1", &tree, wallet()).await;
        assert!(!result.passed);

        // The fast leaf finished before the deadline and reports its
        // observed value; only the stalled leaf is marked errored.
        let fast = &result.leaf_results[0];
        assert!(fast.passed);
        assert_eq!(fast.observed_value.as_deref(), Some("100"));
        let stalled = &result.leaf_results[1];
        assert!(!stalled.passed);
        assert!(stalled.error.as_deref().unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn evaluation_is_deterministic() {
        let tree = and(vec![
            leaf(TOKEN_X, Comparator::Gte, "100"),
            or(vec![
                leaf(TOKEN_Y, Comparator::Gt, "0"),
                leaf(TOKEN_X, Comparator::Eq, "150"),
            ]),
        ]);
        for _ in 0..10 {
            let eval = evaluator(MockOracle::new(&[(TOKEN_X, 150), (TOKEN_Y, 0)]));
            let result = eval.evaluate("gate-1", &tree, wallet()).await;
            assert!(result.passed);
        }
    }
}
