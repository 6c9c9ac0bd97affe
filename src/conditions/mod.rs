// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Condition model: a typed, immutable boolean expression tree over
//! on-chain leaf conditions.
//!
//! Trees are validated once, at registry write time. After that the
//! evaluator can assume a well-formed tree: bounded depth, non-empty
//! groups, integer quantities, and the per-standard field requirements
//! (contract addresses, token ids) all hold.

pub mod evaluator;

pub use evaluator::{EvaluationResult, Evaluator, LeafResult};

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum nesting depth of a condition tree.
pub const MAX_TREE_DEPTH: usize = 8;

/// Maximum children per group node.
pub const MAX_GROUP_CHILDREN: usize = 32;

/// Maximum leaf conditions per gate.
pub const MAX_LEAVES: usize = 64;

/// Boolean combinator for group nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    Or,
}

/// Token standard a leaf condition queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AssetStandard {
    #[serde(rename = "NATIVE")]
    Native,
    #[serde(rename = "ERC20")]
    Erc20,
    #[serde(rename = "ERC721")]
    Erc721,
    #[serde(rename = "ERC1155")]
    Erc1155,
}

/// Comparison operator applied to the observed on-chain value.
///
/// Semantics are exact arbitrary-precision integer comparisons; `==` is an
/// exact match, never approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Comparator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
}

impl Comparator {
    /// Apply the comparator: `observed <op> quantity`.
    pub fn compare(&self, observed: U256, quantity: U256) -> bool {
        match self {
            Comparator::Gte => observed >= quantity,
            Comparator::Gt => observed > quantity,
            Comparator::Lte => observed <= quantity,
            Comparator::Lt => observed < quantity,
            Comparator::Eq => observed == quantity,
        }
    }
}

/// A node in the condition tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConditionNode {
    Group(GroupCondition),
    Leaf(LeafCondition),
}

/// Boolean combination of child conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupCondition {
    pub combinator: Combinator,
    #[schema(no_recursion)]
    pub children: Vec<ConditionNode>,
}

/// An atomic, verifiable on-chain fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeafCondition {
    /// Symbolic chain name (must be registered)
    pub chain: String,
    /// Token contract; required for all standards except NATIVE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub asset_standard: AssetStandard,
    /// Specific token id (decimal string); required for ERC1155,
    /// optional for ERC721 (ownership vs. collection balance)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Informational query method name; derived from the standard when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub comparator: Comparator,
    /// Threshold in base units, as a base-10 integer string. Never a float:
    /// wei-scale amounts overflow f64 silently.
    pub quantity: String,
}

impl LeafCondition {
    /// Parse the quantity threshold. Guaranteed to succeed after `validate`.
    pub fn parsed_quantity(&self) -> Result<U256, ConditionError> {
        parse_integer(&self.quantity)
            .ok_or_else(|| ConditionError::InvalidQuantity(self.quantity.clone()))
    }

    /// Parse the token id, if present.
    pub fn parsed_token_id(&self) -> Result<Option<U256>, ConditionError> {
        match &self.token_id {
            None => Ok(None),
            Some(raw) => parse_integer(raw)
                .map(Some)
                .ok_or_else(|| ConditionError::InvalidTokenId(raw.clone())),
        }
    }
}

/// Parse a non-empty base-10 integer string. Rejects signs, decimals and
/// whitespace outright rather than coercing.
fn parse_integer(raw: &str) -> Option<U256> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(raw, 10).ok()
}

/// Validation failures for condition trees, reported at registry write time.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("group node must have at least one child")]
    EmptyGroup,

    #[error("group node has {0} children (max {MAX_GROUP_CHILDREN})")]
    TooManyChildren(usize),

    #[error("condition tree exceeds max depth {MAX_TREE_DEPTH}")]
    DepthExceeded,

    #[error("condition tree has more than {MAX_LEAVES} leaf conditions")]
    TooManyLeaves,

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("quantity is not a base-unit integer string: {0:?}")]
    InvalidQuantity(String),

    #[error("token id is not an integer string: {0:?}")]
    InvalidTokenId(String),

    #[error("{0:?} condition requires a contract address")]
    MissingContract(AssetStandard),

    #[error("invalid contract address: {0}")]
    InvalidContract(String),

    #[error("ERC1155 condition requires a token id")]
    MissingTokenId,
}

impl ConditionNode {
    /// Validate the tree against the grammar and the chain registry.
    ///
    /// `chain_known` decouples validation from the concrete registry so the
    /// model stays testable without environment setup.
    pub fn validate(&self, chain_known: &dyn Fn(&str) -> bool) -> Result<(), ConditionError> {
        if self.leaves().len() > MAX_LEAVES {
            return Err(ConditionError::TooManyLeaves);
        }
        self.validate_node(chain_known, 1)
    }

    fn validate_node(
        &self,
        chain_known: &dyn Fn(&str) -> bool,
        depth: usize,
    ) -> Result<(), ConditionError> {
        if depth > MAX_TREE_DEPTH {
            return Err(ConditionError::DepthExceeded);
        }
        match self {
            ConditionNode::Group(group) => {
                if group.children.is_empty() {
                    return Err(ConditionError::EmptyGroup);
                }
                if group.children.len() > MAX_GROUP_CHILDREN {
                    return Err(ConditionError::TooManyChildren(group.children.len()));
                }
                for child in &group.children {
                    child.validate_node(chain_known, depth + 1)?;
                }
                Ok(())
            }
            ConditionNode::Leaf(leaf) => validate_leaf(leaf, chain_known),
        }
    }

    /// All leaf conditions in pre-order, paired with their stable leaf ids.
    pub fn leaves(&self) -> Vec<(usize, &LeafCondition)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<(usize, &'a LeafCondition)>) {
        match self {
            ConditionNode::Group(group) => {
                for child in &group.children {
                    child.collect_leaves(out);
                }
            }
            ConditionNode::Leaf(leaf) => {
                let id = out.len();
                out.push((id, leaf));
            }
        }
    }
}

fn validate_leaf(
    leaf: &LeafCondition,
    chain_known: &dyn Fn(&str) -> bool,
) -> Result<(), ConditionError> {
    if !chain_known(&leaf.chain) {
        return Err(ConditionError::UnknownChain(leaf.chain.clone()));
    }

    leaf.parsed_quantity()?;
    leaf.parsed_token_id()?;

    match leaf.asset_standard {
        AssetStandard::Native => Ok(()),
        AssetStandard::Erc20 | AssetStandard::Erc721 | AssetStandard::Erc1155 => {
            let contract = leaf
                .contract_address
                .as_deref()
                .ok_or(ConditionError::MissingContract(leaf.asset_standard))?;
            crate::chain::client::parse_address(contract)
                .map_err(|_| ConditionError::InvalidContract(contract.to_string()))?;
            if leaf.asset_standard == AssetStandard::Erc1155 && leaf.token_id.is_none() {
                return Err(ConditionError::MissingTokenId);
            }
            Ok(())
        }
    }
}
