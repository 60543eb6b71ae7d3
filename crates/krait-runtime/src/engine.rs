//! Reactive fragment engine
//!
//! A named-fragment store driving incremental re-evaluation through the
//! sandbox. Each fragment is a single analyzable statement; the symbols it
//! produces become nodes in the dependency graph and edits propagate to
//! the downstream closure. Re-submitting a fragment whose structural
//! signature is unchanged is a no-op, so formatting edits never trigger
//! re-evaluation.
//!
//! Every fragment runs in a fresh namespace seeded with the current values
//! of its dependencies. A failed dependency simply leaves its symbols
//! unbound, so the dependent fragment fails with its own NameError.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;

use crate::analysis::{self, FragmentKind};
use crate::graph::{DependencyGraph, GraphError};
use crate::sandbox::{Sandbox, SandboxError, SandboxPolicy, Value};
use crate::signature::{self, Signature};

/// Fragment engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The source is not one of the fragment kinds the engine manages.
    #[error("fragment '{name}' is not supported: {diagnostic}")]
    Unsupported { name: String, diagnostic: String },

    /// Two live fragments may not produce the same symbol.
    #[error("symbol '{symbol}' is already produced by fragment '{holder}'")]
    DuplicateSymbol { symbol: String, holder: String },

    /// The edit would make the dependency graph cyclic.
    #[error(transparent)]
    Cycle(#[from] GraphError),

    #[error("unknown fragment '{0}'")]
    UnknownFragment(String),
}

/// Evaluation state of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentState {
    /// Inserted or invalidated; not yet (re-)evaluated
    Pending,
    /// Last evaluation completed and its symbol values are current
    Ready,
    /// Last evaluation failed; see [`FragmentEngine::failure`]
    Failed,
}

#[derive(Debug, Clone)]
struct Fragment {
    source: String,
    signature: Signature,
    kind: FragmentKind,
    produced: BTreeSet<String>,
    dependencies: BTreeSet<String>,
    state: FragmentState,
    failure: Option<SandboxError>,
}

/// Store of named fragments with incremental re-evaluation.
pub struct FragmentEngine {
    sandbox: Sandbox,
    fragments: BTreeMap<String, Fragment>,
    graph: DependencyGraph,
    /// symbol -> name of the fragment producing it
    producers: BTreeMap<String, String>,
    /// current values of symbols whose producer is Ready
    values: BTreeMap<String, Value>,
}

impl FragmentEngine {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self {
            sandbox: Sandbox::new(policy),
            fragments: BTreeMap::new(),
            graph: DependencyGraph::new(),
            producers: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Fragment names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn state(&self, name: &str) -> Option<FragmentState> {
        self.fragments.get(name).map(|fragment| fragment.state)
    }

    /// The error from the fragment's last evaluation, if it failed.
    pub fn failure(&self, name: &str) -> Option<&SandboxError> {
        self.fragments
            .get(name)
            .and_then(|fragment| fragment.failure.as_ref())
    }

    /// Current value of a produced symbol. Stale until [`evaluate`] runs.
    ///
    /// [`evaluate`]: Self::evaluate
    pub fn value(&self, symbol: &str) -> Option<&Value> {
        self.values.get(symbol)
    }

    /// Insert or replace a fragment.
    ///
    /// The source must analyze as an expression, function definition, or
    /// import. An expression fragment binds its value to the fragment
    /// name; the other kinds bind their produced symbols. Replacing a
    /// fragment with structurally identical source is a no-op. An edit
    /// that would produce an already-claimed symbol or a dependency cycle
    /// leaves the engine unchanged.
    pub fn insert(&mut self, name: &str, source: &str) -> Result<(), EngineError> {
        let signature = signature::sign(source);
        if let Some(existing) = self.fragments.get(name) {
            if existing.signature == signature {
                return Ok(());
            }
        }

        let classification = analysis::analyze_source(source).into_result().map_err(
            |diagnostic| EngineError::Unsupported {
                name: name.to_string(),
                diagnostic: diagnostic.to_string(),
            },
        )?;

        let produced: BTreeSet<String> = match classification.kind {
            FragmentKind::Expression => [name.to_string()].into(),
            _ => classification.produced_symbols.clone(),
        };
        for symbol in &produced {
            if let Some(holder) = self.producers.get(symbol) {
                if holder != name {
                    return Err(EngineError::DuplicateSymbol {
                        symbol: symbol.clone(),
                        holder: holder.clone(),
                    });
                }
            }
        }

        // stage the graph edit; a failure restores the snapshot
        let graph_snapshot = self.graph.clone();
        let old_produced = self
            .fragments
            .get(name)
            .map(|old| old.produced.clone())
            .unwrap_or_default();
        self.unlink(name, &old_produced);
        if let Err(error) = self.link(name, &produced, &classification.dependencies) {
            self.graph = graph_snapshot;
            for symbol in &produced {
                if self.producers.get(symbol).is_some_and(|holder| holder == name) {
                    self.producers.remove(symbol);
                }
            }
            for symbol in &old_produced {
                self.producers.insert(symbol.clone(), name.to_string());
            }
            return Err(error);
        }

        for symbol in old_produced.difference(&produced) {
            self.values.remove(symbol);
        }
        // dependents of symbols this edit dropped must notice too
        for symbol in produced.union(&old_produced) {
            self.invalidate_downstream(symbol);
        }
        self.fragments.insert(
            name.to_string(),
            Fragment {
                source: source.to_string(),
                signature,
                kind: classification.kind,
                produced,
                dependencies: classification.dependencies,
                state: FragmentState::Pending,
                failure: None,
            },
        );
        Ok(())
    }

    /// Remove a fragment. Its symbols disappear; dependents keep their
    /// latent edges and fail with a NameError at the next evaluation.
    pub fn remove(&mut self, name: &str) -> Result<(), EngineError> {
        let fragment = self
            .fragments
            .remove(name)
            .ok_or_else(|| EngineError::UnknownFragment(name.to_string()))?;
        for symbol in &fragment.produced {
            self.invalidate_downstream(symbol);
        }
        self.unlink(name, &fragment.produced);
        for symbol in &fragment.produced {
            self.values.remove(symbol);
        }
        Ok(())
    }

    /// Re-run every pending fragment in dependency order, each in a fresh
    /// namespace seeded with its dependencies' current values. Returns the
    /// names of the fragments that were evaluated, in execution order.
    pub fn evaluate(&mut self) -> Vec<String> {
        let order = self
            .graph
            .topological_order()
            .expect("insert rolls back cyclic edits");

        let mut evaluated = Vec::new();
        let mut seen = BTreeSet::new();
        for symbol in order {
            let Some(name) = self.producers.get(&symbol).cloned() else {
                continue;
            };
            if !seen.insert(name.clone()) {
                continue;
            }
            let pending = matches!(
                self.fragments.get(&name).map(|f| f.state),
                Some(FragmentState::Pending)
            );
            if pending {
                self.run_fragment(&name);
                evaluated.push(name);
            }
        }
        evaluated
    }

    fn run_fragment(&mut self, name: &str) {
        let Some(fragment) = self.fragments.get(name) else {
            return;
        };
        let source = fragment.source.clone();
        let kind = fragment.kind;
        let produced = fragment.produced.clone();

        let mut seed = BTreeMap::new();
        for dependency in &fragment.dependencies {
            if let Some(value) = self.values.get(dependency) {
                seed.insert(dependency.clone(), value.clone());
            }
        }

        let outcome: Result<BTreeMap<String, Value>, SandboxError> = match kind {
            FragmentKind::Expression => self
                .sandbox
                .eval_seeded(&source, seed)
                .map(|value| BTreeMap::from([(name.to_string(), value)])),
            _ => self.sandbox.execute_seeded(&source, seed).into_bindings(),
        };

        let fragment = self.fragments.get_mut(name).expect("fragment present");
        match outcome {
            Ok(bindings) => {
                for symbol in &produced {
                    let value = bindings.get(symbol).cloned().unwrap_or(Value::None);
                    self.values.insert(symbol.clone(), value);
                }
                fragment.state = FragmentState::Ready;
                fragment.failure = None;
            }
            Err(error) => {
                for symbol in &produced {
                    self.values.remove(symbol);
                }
                fragment.state = FragmentState::Failed;
                fragment.failure = Some(error);
            }
        }
    }

    /// Register `name` as the producer of `produced` and wire the graph.
    fn link(
        &mut self,
        name: &str,
        produced: &BTreeSet<String>,
        dependencies: &BTreeSet<String>,
    ) -> Result<(), EngineError> {
        for symbol in produced {
            self.graph.add_node(symbol)?;
            self.producers.insert(symbol.clone(), name.to_string());
        }
        for symbol in produced {
            for dependency in dependencies {
                self.graph.add_edge(symbol, dependency)?;
            }
        }
        Ok(())
    }

    /// Drop `name`'s producer claims and graph nodes. Symbol values are
    /// left alone so a failed staging can roll back without losing them.
    fn unlink(&mut self, name: &str, produced: &BTreeSet<String>) {
        for symbol in produced {
            if self.producers.get(symbol).is_some_and(|holder| holder == name) {
                self.producers.remove(symbol);
            }
            self.graph.remove_node(symbol);
        }
    }

    /// Mark every fragment downstream of `symbol` pending.
    fn invalidate_downstream(&mut self, symbol: &str) {
        for affected in self.graph.affected_by(symbol) {
            if let Some(holder) = self.producers.get(&affected) {
                if let Some(fragment) = self.fragments.get_mut(holder) {
                    fragment.state = FragmentState::Pending;
                }
            }
        }
    }
}

impl std::fmt::Debug for FragmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentEngine")
            .field("fragments", &self.fragments.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
