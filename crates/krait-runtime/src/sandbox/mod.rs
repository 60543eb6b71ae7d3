//! Capability-scoped execution sandbox
//!
//! A sandbox runs untrusted fragments against a [`SandboxPolicy`]: the
//! policy's allow-lists decide what resolves, its guards mediate every
//! attribute access, item access, and import, and a static check refuses
//! escape-hatch syntax before anything executes. Execution never panics;
//! every outcome is a value. Security decisions are reported through an
//! [`AuditLogger`].
//!
//! ```
//! use krait_runtime::sandbox::{Sandbox, SandboxPolicy};
//!
//! let sandbox = Sandbox::new(SandboxPolicy::baseline());
//! let result = sandbox.execute("x = 1 + 2");
//! assert_eq!(result.bindings().unwrap()["x"].to_string(), "3");
//! ```

pub mod audit;
pub mod builtins;
pub mod guards;
mod interp;
pub mod modules;
pub mod policy;
pub mod static_check;
pub mod value;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::parser::{self, ParseError};

pub use audit::{AuditEntry, AuditEvent, AuditLogger, MemoryAuditLogger, NullAuditLogger};
pub use guards::{AttributeGuard, GuardConfig, ImportGuard, ItemAccess, ItemGuard};
pub use policy::{PolicyError, SandboxPolicy};
pub use static_check::StaticViolation;
pub use value::{Fault, FaultKind, Value};

use crate::ast::StmtKind;
use interp::Interp;

/// Any way a sandboxed run can fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SandboxError {
    /// The source did not parse
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    /// The static check refused the fragment before execution
    #[error("rejected by static check: {}", format_violations(.0))]
    StaticRejection(Vec<StaticViolation>),

    /// A guard vetoed a mediated operation at runtime
    #[error("guard denied {capability} on {detail}")]
    GuardDenial { capability: String, detail: String },

    /// Import refused by the module allow-list or the import guard
    #[error("import of module '{module}' is not permitted")]
    ImportDenied { module: String },

    /// Executed code raised a runtime fault
    #[error(transparent)]
    Fault(#[from] Fault),
}

fn format_violations(violations: &[StaticViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of [`Sandbox::execute`]: either the top-level bindings the
/// fragment produced, or the error that stopped it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    outcome: Result<BTreeMap<String, Value>, SandboxError>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The produced bindings, if the run completed.
    pub fn bindings(&self) -> Option<&BTreeMap<String, Value>> {
        self.outcome.as_ref().ok()
    }

    /// The error, if the run did not complete.
    pub fn failure(&self) -> Option<&SandboxError> {
        self.outcome.as_ref().err()
    }

    pub fn into_bindings(self) -> Result<BTreeMap<String, Value>, SandboxError> {
        self.outcome
    }
}

/// A configured sandbox. Cheap to clone; runs share the policy and the
/// audit logger but nothing else, so each execution is isolated.
#[derive(Clone)]
pub struct Sandbox {
    policy: SandboxPolicy,
    audit: Arc<dyn AuditLogger>,
}

impl Sandbox {
    /// Sandbox with the given policy and no audit logging.
    pub fn new(policy: SandboxPolicy) -> Self {
        Self {
            policy,
            audit: Arc::new(NullAuditLogger),
        }
    }

    /// Attach an audit logger. Loggers are shared handles, so the caller
    /// keeps its own view of the entries.
    pub fn with_audit(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Parse, statically check, and execute a fragment in a fresh
    /// namespace. Returns the top-level bindings it produced.
    pub fn execute(&self, source: &str) -> ExecutionResult {
        self.execute_seeded(source, BTreeMap::new())
    }

    /// Like [`execute`](Self::execute), but with pre-bound names visible
    /// to the fragment.
    pub(crate) fn execute_seeded(
        &self,
        source: &str,
        seed: BTreeMap<String, Value>,
    ) -> ExecutionResult {
        let outcome = self.run_checked(source, seed, |interp, module| interp.run(module));
        if let Ok(bindings) = &outcome {
            self.audit.log(AuditEvent::RunCompleted {
                bindings: bindings.len(),
            });
        }
        ExecutionResult { outcome }
    }

    /// Evaluate a single expression and return its value.
    pub fn eval(&self, source: &str) -> Result<Value, SandboxError> {
        self.eval_seeded(source, BTreeMap::new())
    }

    pub(crate) fn eval_seeded(
        &self,
        source: &str,
        seed: BTreeMap<String, Value>,
    ) -> Result<Value, SandboxError> {
        let outcome = self.run_checked(source, seed, |interp, module| {
            match module.body.as_slice() {
                [stmt] => match &stmt.kind {
                    StmtKind::Expr { value } => interp.eval(value),
                    _ => Err(ParseError::new("expected an expression", 1, 1).into()),
                },
                _ => Err(ParseError::new("expected a single expression", 1, 1).into()),
            }
        });
        if outcome.is_ok() {
            self.audit.log(AuditEvent::RunCompleted { bindings: 0 });
        }
        outcome
    }

    /// Shared parse / static-check / execute pipeline. Logs every failure
    /// class; completion is logged by the caller, which knows the binding
    /// count.
    fn run_checked<T>(
        &self,
        source: &str,
        seed: BTreeMap<String, Value>,
        run: impl FnOnce(Interp<'_>, &crate::ast::Module) -> Result<T, SandboxError>,
    ) -> Result<T, SandboxError> {
        let module = parser::parse(source)?;

        let violations = static_check::check(&module, source);
        if !violations.is_empty() {
            for violation in &violations {
                self.audit.log(AuditEvent::StaticRejection {
                    detail: violation.to_string(),
                });
            }
            return Err(SandboxError::StaticRejection(violations));
        }

        let outcome = run(Interp::new(&self.policy, seed), &module);
        match &outcome {
            Ok(_) => {}
            Err(SandboxError::GuardDenial { capability, detail }) => {
                self.audit.log(AuditEvent::GuardDenied {
                    capability: capability.clone(),
                    detail: detail.clone(),
                });
            }
            Err(SandboxError::ImportDenied { module }) => {
                self.audit.log(AuditEvent::ImportDenied {
                    module: module.clone(),
                });
            }
            Err(SandboxError::Fault(fault)) => {
                self.audit.log(AuditEvent::RunFaulted {
                    kind: fault.kind.as_str().to_string(),
                });
            }
            Err(_) => {}
        }
        outcome
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
