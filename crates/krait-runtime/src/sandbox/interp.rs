//! Guarded tree-walking evaluator
//!
//! Executes a parsed fragment against a namespace built from the policy's
//! allow-lists. Every attribute get/set, every subscript/iteration/unpack,
//! and every import is routed through the policy guards; a denial is an
//! error, never a silent no-op. Values follow the copy-on-write model, so
//! mutating method calls and subscript stores write back through the frame
//! the receiver's name resolved from, and a detached method only ever
//! mutates its own snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::{
    Alias, BinOpKind, BoolOpKind, CmpOpKind, Expr, ExprKind, Keyword, Module, Stmt, StmtKind,
    UnaryOpKind,
};
use crate::sandbox::guards::ItemAccess;
use crate::sandbox::policy::SandboxPolicy;
use crate::sandbox::value::{
    compare_values, iter_elements, values_equal, BoundMethod, Fault, FunctionValue, Value,
    ValueDict, ValueList,
};
use crate::sandbox::{builtins, modules, SandboxError};

/// Call depth cap. Deep recursion becomes a reportable RecursionError
/// fault instead of exhausting the host stack.
const MAX_CALL_DEPTH: usize = 100;

/// Control flow signal for break, continue, and return
#[derive(Debug, Clone, PartialEq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

type Exec<T> = Result<T, SandboxError>;

/// One execution's interpreter state. Built fresh per call; the root frame
/// is private to the run and returned as the binding set on completion.
pub(super) struct Interp<'a> {
    policy: &'a SandboxPolicy,
    /// Frame stack: index 0 is the run's root scope, later entries are
    /// function call frames. Name lookup checks the current frame, then
    /// the root, then the policy's builtins.
    frames: Vec<BTreeMap<String, Value>>,
    call_depth: usize,
}

impl<'a> Interp<'a> {
    pub(super) fn new(policy: &'a SandboxPolicy, seed: BTreeMap<String, Value>) -> Self {
        Self {
            policy,
            frames: vec![seed],
            call_depth: 0,
        }
    }

    /// Execute every statement and return the root scope's bindings.
    pub(super) fn run(mut self, module: &Module) -> Exec<BTreeMap<String, Value>> {
        for stmt in &module.body {
            // break/continue/return cannot escape to the top level; the
            // parser rejects them outside their constructs
            self.exec_stmt(stmt)?;
        }
        Ok(self.frames.swap_remove(0))
    }

    /// Evaluate a single expression under the same guards.
    pub(super) fn eval(mut self, expr: &Expr) -> Exec<Value> {
        self.eval_expr(expr)
    }

    // === Statements ===

    fn exec_body(&mut self, body: &[Stmt]) -> Exec<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Exec<Flow> {
        match &stmt.kind {
            StmtKind::Expr { value } => {
                self.eval_expr(value)?;
                Ok(Flow::Normal)
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval_expr(value)?;
                for target in targets {
                    self.assign_target(target, value.clone())?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.eval_expr(target)?;
                let operand = self.eval_expr(value)?;
                let updated = binary_op(*op, &current, &operand)?;
                self.assign_target(target, updated)?;
                Ok(Flow::Normal)
            }
            StmtKind::FunctionDef { name, params, body } => {
                // defaults are evaluated once, at definition time
                let mut defaults = Vec::new();
                for param in &params.args {
                    if let Some(default) = &param.default {
                        defaults.push(self.eval_expr(default)?);
                    }
                }
                let function = FunctionValue {
                    name: name.clone(),
                    params: params.args.iter().map(|p| p.name.clone()).collect(),
                    defaults,
                    vararg: params.vararg.clone(),
                    kwarg: params.kwarg.clone(),
                    body: body.clone(),
                };
                self.bind(name.clone(), Value::Function(Arc::new(function)));
                Ok(Flow::Normal)
            }
            StmtKind::Return { value } => {
                let value = match value {
                    Some(value) => self.eval_expr(value)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If { test, body, orelse } => {
                if self.eval_expr(test)?.is_truthy() {
                    self.exec_body(body)
                } else {
                    self.exec_body(orelse)
                }
            }
            StmtKind::While { test, body } => {
                while self.eval_expr(test)?.is_truthy() {
                    match self.exec_body(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval_expr(iter)?;
                self.check_item(&iterable, ItemAccess::Iterate)?;
                let elements = iter_elements(&iterable).ok_or_else(|| {
                    Fault::type_error(format!(
                        "'{}' object is not iterable",
                        iterable.type_name()
                    ))
                })?;
                for element in elements {
                    self.assign_target(target, element)?;
                    match self.exec_body(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Import { names } => {
                for alias in names {
                    self.check_import(&alias.name)?;
                    self.bind(
                        alias.bound_name(true).to_string(),
                        Value::Module(Arc::from(alias.name.as_str())),
                    );
                }
                Ok(Flow::Normal)
            }
            StmtKind::ImportFrom { module, names } => {
                self.check_import(module)?;
                for alias in names {
                    let value = self.import_member(module, alias)?;
                    self.bind(alias.bound_name(false).to_string(), value);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Pass => Ok(Flow::Normal),
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
        }
    }

    // === Assignment targets ===

    fn assign_target(&mut self, target: &Expr, value: Value) -> Exec<()> {
        match &target.kind {
            ExprKind::Name { id, .. } => {
                self.bind(id.clone(), value);
                Ok(())
            }
            ExprKind::Tuple { elts, .. } => {
                self.check_item(&value, ItemAccess::Unpack)?;
                let elements = iter_elements(&value).ok_or_else(|| {
                    Fault::type_error(format!(
                        "cannot unpack non-iterable {} object",
                        value.type_name()
                    ))
                })?;
                if elements.len() != elts.len() {
                    return Err(Fault::value_error(format!(
                        "expected {} values to unpack, got {}",
                        elts.len(),
                        elements.len()
                    ))
                    .into());
                }
                for (elt, element) in elts.iter().zip(elements) {
                    self.assign_target(elt, element)?;
                }
                Ok(())
            }
            ExprKind::Attribute {
                value: base, attr, ..
            } => {
                let receiver = self.eval_expr(base)?;
                self.check_attribute("set", &receiver, attr)?;
                // nothing in the value model carries settable attributes
                Err(Fault::type_error(format!(
                    "cannot set attribute '{}' on '{}' object",
                    attr,
                    receiver.type_name()
                ))
                .into())
            }
            ExprKind::Subscript {
                value: base, index, ..
            } => self.assign_subscript(base, index, value),
            _ => Err(Fault::type_error("cannot assign to this expression").into()),
        }
    }

    /// Store into `base[index]`, writing the mutation back through the
    /// simple name the container chain is rooted at.
    fn assign_subscript(&mut self, base: &Expr, index: &Expr, value: Value) -> Exec<()> {
        let index = self.eval_expr(index)?;
        let (root, path) = self.subscript_path(base)?;

        let mut container = self
            .lookup(&root)
            .ok_or_else(|| Fault::name_error(&root))?;
        {
            let mut slot = &mut container;
            for step in &path {
                self.check_item(slot, ItemAccess::Get)?;
                slot = get_item_mut(slot, step)?;
            }
            self.check_item(slot, ItemAccess::Set)?;
            set_item(slot, &index, value)?;
        }
        self.rebind(root, container);
        Ok(())
    }

    /// Flatten a subscript-store base into its root name and the evaluated
    /// indices leading to the slot (`xs[i][j] = v` gives `("xs", [i, j])`
    /// with `base` being `xs[i]`).
    fn subscript_path(&mut self, base: &Expr) -> Exec<(String, Vec<Value>)> {
        match &base.kind {
            ExprKind::Name { id, .. } => Ok((id.clone(), Vec::new())),
            ExprKind::Subscript { value, index, .. } => {
                let index = self.eval_expr(index)?;
                let (root, mut path) = self.subscript_path(value)?;
                path.push(index);
                Ok((root, path))
            }
            _ => Err(Fault::type_error(
                "subscript assignment target must be rooted at a name",
            )
            .into()),
        }
    }

    // === Expressions ===

    fn eval_expr(&mut self, expr: &Expr) -> Exec<Value> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::Str(s) => Ok(Value::string(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::NoneLit => Ok(Value::None),
            ExprKind::Name { id, .. } => self.resolve_name(id),
            ExprKind::Attribute { value, attr, .. } => {
                let receiver = self.eval_expr(value)?;
                self.get_attribute(&receiver, attr)
            }
            ExprKind::Subscript { value, index, .. } => {
                let container = self.eval_expr(value)?;
                let index = self.eval_expr(index)?;
                self.check_item(&container, ItemAccess::Get)?;
                Ok(get_item(&container, &index)?)
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => self.eval_call(func, args, keywords),
            ExprKind::BinOp { left, op, right } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                Ok(binary_op(*op, &left, &right)?)
            }
            ExprKind::UnaryOp { op, operand } => {
                let operand = self.eval_expr(operand)?;
                Ok(unary_op(*op, &operand)?)
            }
            ExprKind::BoolOp { op, values } => {
                let (last, rest) = values.split_last().expect("bool chain is non-empty");
                for value in rest {
                    let value = self.eval_expr(value)?;
                    match op {
                        BoolOpKind::And if !value.is_truthy() => return Ok(value),
                        BoolOpKind::Or if value.is_truthy() => return Ok(value),
                        _ => {}
                    }
                }
                self.eval_expr(last)
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut left = self.eval_expr(left)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    let right = self.eval_expr(comparator)?;
                    if !self.compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::IfExp { test, body, orelse } => {
                if self.eval_expr(test)?.is_truthy() {
                    self.eval_expr(body)
                } else {
                    self.eval_expr(orelse)
                }
            }
            ExprKind::Tuple { elts, .. } => {
                let mut values = Vec::with_capacity(elts.len());
                for elt in elts {
                    values.push(self.eval_expr(elt)?);
                }
                Ok(Value::tuple(values))
            }
            ExprKind::List { elts } => {
                let mut values = Vec::with_capacity(elts.len());
                for elt in elts {
                    values.push(self.eval_expr(elt)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::Dict { keys, values } => {
                let mut map = ValueDict::new();
                for (key, value) in keys.iter().zip(values) {
                    let key = match self.eval_expr(key)? {
                        Value::Str(s) => s.as_ref().clone(),
                        other => {
                            return Err(Fault::type_error(format!(
                                "dict keys must be strings, not '{}'",
                                other.type_name()
                            ))
                            .into())
                        }
                    };
                    map.insert(key, self.eval_expr(value)?);
                }
                Ok(Value::Dict(map))
            }
        }
    }

    fn eval_call(&mut self, func: &Expr, args: &[Expr], keywords: &[Keyword]) -> Exec<Value> {
        // receiver.method(...) mutates through the name it was read from,
        // so the call site handles attribute targets itself
        if let ExprKind::Attribute { value, attr, .. } = &func.kind {
            let receiver = self.eval_expr(value)?;
            self.check_attribute("get", &receiver, attr)?;

            if let Value::Module(module) = &receiver {
                let module = module.clone();
                let member = modules::member(&module, attr).ok_or_else(|| {
                    Fault::new(
                        crate::sandbox::value::FaultKind::AttributeError,
                        format!("module '{}' has no attribute '{}'", module, attr),
                    )
                })?;
                let (args, kwargs) = self.eval_arguments(args, keywords)?;
                return self.call_value(member, args, kwargs);
            }

            let (args, kwargs) = self.eval_arguments(args, keywords)?;
            let mut receiver = receiver;
            let result = call_method(&mut receiver, attr, &args, &kwargs)?;
            if let ExprKind::Name { id, .. } = &value.kind {
                self.rebind(id.clone(), receiver);
            }
            return Ok(result);
        }

        let callee = self.eval_expr(func)?;
        let (args, kwargs) = self.eval_arguments(args, keywords)?;
        self.call_value(callee, args, kwargs)
    }

    fn eval_arguments(
        &mut self,
        args: &[Expr],
        keywords: &[Keyword],
    ) -> Exec<(Vec<Value>, Vec<(String, Value)>)> {
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            positional.push(self.eval_expr(arg)?);
        }
        let mut named = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            named.push((keyword.arg.clone(), self.eval_expr(&keyword.value)?));
        }
        Ok((positional, named))
    }

    fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Exec<Value> {
        match callee {
            Value::Builtin(name) => match name.split_once('.') {
                Some((module, func)) => Ok(modules::call(module, func, &args, &kwargs)?),
                None => Ok(builtins::call(&name, &args, &kwargs)?),
            },
            Value::Function(function) => self.call_function(&function, args, kwargs),
            Value::BoundMethod(method) => {
                // detached method: mutations land in the snapshot only
                let mut receiver = method.receiver.clone();
                Ok(call_method(&mut receiver, &method.method, &args, &kwargs)?)
            }
            other => Err(Fault::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))
            .into()),
        }
    }

    fn call_function(
        &mut self,
        function: &FunctionValue,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Exec<Value> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(Fault::recursion().into());
        }
        let frame = bind_parameters(function, args, kwargs)?;

        self.call_depth += 1;
        self.frames.push(frame);
        let flow = self.exec_body(&function.body);
        self.frames.pop();
        self.call_depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    // === Names and scopes ===

    /// Bind in the current frame.
    fn bind(&mut self, name: String, value: Value) {
        self.frames
            .last_mut()
            .expect("frame stack is never empty")
            .insert(name, value);
    }

    /// Write a mutated container back through the frame `name` resolved
    /// from, so `xs[0] = v` or `xs.append(v)` inside a function reaches a
    /// root-scope `xs` instead of shadowing it with a local copy.
    fn rebind(&mut self, name: String, value: Value) {
        let current = self.frames.len() - 1;
        let frame = if current > 0
            && !self.frames[current].contains_key(&name)
            && self.frames[0].contains_key(&name)
        {
            0
        } else {
            current
        };
        self.frames[frame].insert(name, value);
    }

    /// Current frame, then root frame, then allow-listed builtins.
    fn lookup(&self, name: &str) -> Option<Value> {
        let current = self.frames.last().expect("frame stack is never empty");
        if let Some(value) = current.get(name) {
            return Some(value.clone());
        }
        if self.frames.len() > 1 {
            if let Some(value) = self.frames[0].get(name) {
                return Some(value.clone());
            }
        }
        None
    }

    fn resolve_name(&self, name: &str) -> Exec<Value> {
        if let Some(value) = self.lookup(name) {
            return Ok(value);
        }
        if self.policy.builtins.contains(name) && builtins::is_builtin(name) {
            return Ok(Value::builtin(name.to_string()));
        }
        Err(Fault::name_error(name).into())
    }

    // === Guard checks ===

    fn check_attribute(&self, access: &str, receiver: &Value, attr: &str) -> Exec<()> {
        let target = match receiver {
            Value::Module(name) => name.as_ref(),
            other => other.type_name(),
        };
        if self.policy.attribute_guard.allows(target, attr) {
            Ok(())
        } else {
            Err(SandboxError::GuardDenial {
                capability: format!("attribute {}", access),
                detail: format!("{}.{}", target, attr),
            })
        }
    }

    fn check_item(&self, container: &Value, access: ItemAccess) -> Exec<()> {
        if self.policy.item_guard.allows(container.type_name(), access) {
            Ok(())
        } else {
            Err(SandboxError::GuardDenial {
                capability: format!("item {}", access.as_str()),
                detail: container.type_name().to_string(),
            })
        }
    }

    /// The module allow-list and the import guard must both agree, and the
    /// module must exist in the registry. "Guarded but unknown" is denied.
    fn check_import(&self, module: &str) -> Exec<()> {
        if self.policy.modules.contains(module)
            && self.policy.import_guard.allows(module)
            && modules::is_module(module)
        {
            Ok(())
        } else {
            Err(SandboxError::ImportDenied {
                module: module.to_string(),
            })
        }
    }

    fn import_member(&self, module: &str, alias: &Alias) -> Exec<Value> {
        if alias.name == "*" {
            // unreachable behind the static check, but never a no-op
            return Err(SandboxError::GuardDenial {
                capability: "import".to_string(),
                detail: format!("from {} import *", module),
            });
        }
        modules::member(module, &alias.name).ok_or_else(|| {
            Fault::new(
                crate::sandbox::value::FaultKind::AttributeError,
                format!("cannot import name '{}' from '{}'", alias.name, module),
            )
            .into()
        })
    }

    fn get_attribute(&self, receiver: &Value, attr: &str) -> Exec<Value> {
        self.check_attribute("get", receiver, attr)?;
        match receiver {
            Value::Module(module) => modules::member(module, attr).ok_or_else(|| {
                Fault::new(
                    crate::sandbox::value::FaultKind::AttributeError,
                    format!("module '{}' has no attribute '{}'", module, attr),
                )
                .into()
            }),
            other if is_method(other.type_name(), attr) => {
                Ok(Value::BoundMethod(Arc::new(BoundMethod {
                    receiver: other.clone(),
                    method: Arc::from(attr),
                })))
            }
            other => Err(Fault::attribute_error(other.type_name(), attr).into()),
        }
    }

    fn compare(&self, op: CmpOpKind, left: &Value, right: &Value) -> Exec<bool> {
        match op {
            CmpOpKind::Eq => Ok(values_equal(left, right)),
            CmpOpKind::NotEq => Ok(!values_equal(left, right)),
            CmpOpKind::Lt => Ok(compare_values(left, right)?.is_lt()),
            CmpOpKind::LtE => Ok(compare_values(left, right)?.is_le()),
            CmpOpKind::Gt => Ok(compare_values(left, right)?.is_gt()),
            CmpOpKind::GtE => Ok(compare_values(left, right)?.is_ge()),
            CmpOpKind::In => self.membership(left, right),
            CmpOpKind::NotIn => Ok(!self.membership(left, right)?),
            CmpOpKind::Is => Ok(left == right),
            CmpOpKind::IsNot => Ok(left != right),
        }
    }

    /// `needle in haystack`. Membership iterates the container, so the
    /// item guard applies.
    fn membership(&self, needle: &Value, haystack: &Value) -> Exec<bool> {
        self.check_item(haystack, ItemAccess::Iterate)?;
        match haystack {
            Value::Str(s) => match needle {
                Value::Str(sub) => Ok(s.contains(sub.as_str())),
                other => Err(Fault::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))
                .into()),
            },
            Value::Dict(map) => match needle {
                Value::Str(key) => Ok(map.contains_key(key)),
                _ => Ok(false),
            },
            Value::Tuple(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
            Value::List(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
            other => Err(Fault::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))
            .into()),
        }
    }
}

/// Bind call arguments to a function's parameters, producing its frame.
fn bind_parameters(
    function: &FunctionValue,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<BTreeMap<String, Value>, Fault> {
    let mut frame = BTreeMap::new();
    let param_count = function.params.len();

    let mut args = args.into_iter();
    for param in &function.params {
        match args.next() {
            Some(value) => {
                frame.insert(param.clone(), value);
            }
            None => break,
        }
    }
    let extra: Vec<Value> = args.collect();
    if !extra.is_empty() && function.vararg.is_none() {
        return Err(Fault::type_error(format!(
            "{}() takes {} positional arguments but {} were given",
            function.name,
            param_count,
            param_count + extra.len()
        )));
    }

    for (name, value) in kwargs {
        if function.params.contains(&name) {
            if frame.contains_key(&name) {
                return Err(Fault::type_error(format!(
                    "{}() got multiple values for argument '{}'",
                    function.name, name
                )));
            }
            frame.insert(name, value);
        } else if let Some(kwarg) = &function.kwarg {
            let entry = frame
                .entry(kwarg.clone())
                .or_insert_with(|| Value::Dict(ValueDict::new()));
            if let Value::Dict(map) = entry {
                map.insert(name, value);
            }
        } else {
            return Err(Fault::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                function.name, name
            )));
        }
    }

    // defaults align with the trailing positional parameters
    let first_defaulted = param_count - function.defaults.len();
    for (offset, default) in function.defaults.iter().enumerate() {
        let param = &function.params[first_defaulted + offset];
        if !frame.contains_key(param) {
            frame.insert(param.clone(), default.clone());
        }
    }

    for param in &function.params {
        if !frame.contains_key(param) {
            return Err(Fault::type_error(format!(
                "{}() missing required argument: '{}'",
                function.name, param
            )));
        }
    }
    if let Some(vararg) = &function.vararg {
        frame.insert(vararg.clone(), Value::tuple(extra));
    }
    if let Some(kwarg) = &function.kwarg {
        frame
            .entry(kwarg.clone())
            .or_insert_with(|| Value::Dict(ValueDict::new()));
    }
    Ok(frame)
}

// === Operators ===

fn binary_op(op: BinOpKind, left: &Value, right: &Value) -> Result<Value, Fault> {
    match op {
        BinOpKind::Add => add_values(left, right),
        BinOpKind::Sub => numeric_op(op, left, right, i64::checked_sub, |a, b| a - b),
        BinOpKind::Mult => multiply_values(left, right),
        BinOpKind::Div => divide_values(left, right),
        BinOpKind::FloorDiv => floor_divide_values(left, right),
        BinOpKind::Mod => modulo_values(left, right),
        BinOpKind::Pow => power_values(left, right),
    }
}

fn operand_type_error(op: BinOpKind, left: &Value, right: &Value) -> Fault {
    Fault::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn numeric_op(
    op: BinOpKind,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, Fault> {
    match (left.as_int(), right.as_int()) {
        (Some(a), Some(b)) => int_op(a, b)
            .map(Value::Int)
            .ok_or_else(|| Fault::overflow("integer overflow")),
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(operand_type_error(op, left, right)),
        },
    }
}

fn add_values(left: &Value, right: &Value) -> Result<Value, Fault> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.as_slice().to_vec();
            items.extend_from_slice(b.as_slice());
            Ok(Value::list(items))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            let mut items = a.as_ref().clone();
            items.extend_from_slice(b);
            Ok(Value::tuple(items))
        }
        _ => numeric_op(BinOpKind::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

fn multiply_values(left: &Value, right: &Value) -> Result<Value, Fault> {
    let repeat = |count: i64| usize::try_from(count).unwrap_or(0);
    match (left, right) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let count = repeat(*n);
            repeated_len(s.len(), count, "string")?;
            Ok(Value::string(s.repeat(count)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            let count = repeat(*n);
            let mut out = Vec::with_capacity(repeated_len(items.len(), count, "list")?);
            for _ in 0..count {
                out.extend_from_slice(items.as_slice());
            }
            Ok(Value::list(out))
        }
        _ => numeric_op(BinOpKind::Mult, left, right, i64::checked_mul, |a, b| a * b),
    }
}

/// Total length of a sequence repetition; the repeat count is untrusted,
/// so an overflowing product is a fault, never a host panic.
fn repeated_len(len: usize, count: usize, what: &str) -> Result<usize, Fault> {
    len.checked_mul(count)
        .ok_or_else(|| Fault::overflow(format!("repeated {} is too long", what)))
}

fn divide_values(left: &Value, right: &Value) -> Result<Value, Fault> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => {
            if b == 0.0 {
                // message depends on whether the operands were integral
                if left.as_int().is_some() && right.as_int().is_some() {
                    Err(Fault::zero_division("division by zero"))
                } else {
                    Err(Fault::zero_division("float division by zero"))
                }
            } else {
                Ok(Value::Float(a / b))
            }
        }
        _ => Err(operand_type_error(BinOpKind::Div, left, right)),
    }
}

fn floor_divide_values(left: &Value, right: &Value) -> Result<Value, Fault> {
    match (left.as_int(), right.as_int()) {
        (Some(a), Some(b)) => {
            if b == 0 {
                return Err(Fault::zero_division("integer division or modulo by zero"));
            }
            Ok(Value::Int(floor_div(a, b)))
        }
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => {
                if b == 0.0 {
                    Err(Fault::zero_division("float floor division by zero"))
                } else {
                    Ok(Value::Float((a / b).floor()))
                }
            }
            _ => Err(operand_type_error(BinOpKind::FloorDiv, left, right)),
        },
    }
}

fn modulo_values(left: &Value, right: &Value) -> Result<Value, Fault> {
    match (left.as_int(), right.as_int()) {
        (Some(a), Some(b)) => {
            if b == 0 {
                return Err(Fault::zero_division("integer division or modulo by zero"));
            }
            Ok(Value::Int(floor_mod(a, b)))
        }
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => {
                if b == 0.0 {
                    Err(Fault::zero_division("float modulo"))
                } else {
                    Ok(Value::Float(a - b * (a / b).floor()))
                }
            }
            _ => Err(operand_type_error(BinOpKind::Mod, left, right)),
        },
    }
}

/// Floor division, rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> i64 {
    let quotient = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        quotient - 1
    } else {
        quotient
    }
}

/// Modulo whose sign follows the divisor.
fn floor_mod(a: i64, b: i64) -> i64 {
    let remainder = a % b;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        remainder + b
    } else {
        remainder
    }
}

fn power_values(left: &Value, right: &Value) -> Result<Value, Fault> {
    match (left.as_int(), right.as_int()) {
        (Some(base), Some(exponent)) if exponent >= 0 => u32::try_from(exponent)
            .ok()
            .and_then(|exponent| base.checked_pow(exponent))
            .map(Value::Int)
            .ok_or_else(|| Fault::overflow("integer overflow")),
        _ => match (left.as_float(), right.as_float()) {
            (Some(base), Some(exponent)) => {
                if base == 0.0 && exponent < 0.0 {
                    Err(Fault::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ))
                } else {
                    Ok(Value::Float(base.powf(exponent)))
                }
            }
            _ => Err(operand_type_error(BinOpKind::Pow, left, right)),
        },
    }
}

fn unary_op(op: UnaryOpKind, operand: &Value) -> Result<Value, Fault> {
    match op {
        UnaryOpKind::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOpKind::USub => match operand {
            Value::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| Fault::overflow("integer overflow")),
            Value::Bool(b) => Ok(Value::Int(-(*b as i64))),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(Fault::type_error(format!(
                "bad operand type for unary -: '{}'",
                other.type_name()
            ))),
        },
        UnaryOpKind::UAdd => match operand {
            Value::Int(_) | Value::Float(_) => Ok(operand.clone()),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            other => Err(Fault::type_error(format!(
                "bad operand type for unary +: '{}'",
                other.type_name()
            ))),
        },
    }
}

// === Item access ===

fn sequence_index(len: usize, index: &Value, kind: &str) -> Result<usize, Fault> {
    let raw = index.as_int().ok_or_else(|| {
        Fault::type_error(format!(
            "{} indices must be integers, not '{}'",
            kind,
            index.type_name()
        ))
    })?;
    let resolved = if raw < 0 { raw + len as i64 } else { raw };
    if resolved < 0 || resolved >= len as i64 {
        Err(Fault::index_error(format!("{} index out of range", kind)))
    } else {
        Ok(resolved as usize)
    }
}

fn get_item(container: &Value, index: &Value) -> Result<Value, Fault> {
    match container {
        Value::List(items) => {
            let at = sequence_index(items.len(), index, "list")?;
            Ok(items.get(at).cloned().unwrap_or(Value::None))
        }
        Value::Tuple(items) => {
            let at = sequence_index(items.len(), index, "tuple")?;
            Ok(items[at].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let at = sequence_index(chars.len(), index, "string")?;
            Ok(Value::string(chars[at].to_string()))
        }
        Value::Dict(map) => match index {
            Value::Str(key) => map
                .get(key)
                .cloned()
                .ok_or_else(|| Fault::key_error(key)),
            other => Err(Fault::type_error(format!(
                "dict keys must be strings, not '{}'",
                other.type_name()
            ))),
        },
        other => Err(Fault::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Mutable view into a nested container slot, for chained subscript stores.
fn get_item_mut<'v>(container: &'v mut Value, index: &Value) -> Result<&'v mut Value, Fault> {
    match container {
        Value::List(items) => {
            let at = sequence_index(items.len(), index, "list")?;
            Ok(items.get_mut(at).expect("index checked above"))
        }
        Value::Dict(map) => match index {
            Value::Str(key) => match map.get_mut(key) {
                Some(slot) => Ok(slot),
                None => Err(Fault::key_error(key)),
            },
            other => Err(Fault::type_error(format!(
                "dict keys must be strings, not '{}'",
                other.type_name()
            ))),
        },
        other => Err(Fault::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn set_item(container: &mut Value, index: &Value, value: Value) -> Result<(), Fault> {
    match container {
        Value::List(items) => {
            let at = sequence_index(items.len(), index, "list")
                .map_err(|fault| match fault.kind {
                    crate::sandbox::value::FaultKind::IndexError => {
                        Fault::index_error("list assignment index out of range")
                    }
                    _ => fault,
                })?;
            items.set(at, value);
            Ok(())
        }
        Value::Dict(map) => match index {
            Value::Str(key) => {
                map.insert(key.as_ref().clone(), value);
                Ok(())
            }
            other => Err(Fault::type_error(format!(
                "dict keys must be strings, not '{}'",
                other.type_name()
            ))),
        },
        other => Err(Fault::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

// === Methods ===

const STR_METHODS: &[&str] = &[
    "endswith", "find", "join", "lower", "replace", "split", "startswith", "strip", "upper",
];
const LIST_METHODS: &[&str] = &[
    "append", "clear", "count", "index", "insert", "pop", "remove", "reverse",
];
const DICT_METHODS: &[&str] = &["clear", "get", "items", "keys", "pop", "update", "values"];

fn is_method(type_name: &str, attr: &str) -> bool {
    match type_name {
        "str" => STR_METHODS.contains(&attr),
        "list" => LIST_METHODS.contains(&attr),
        "dict" => DICT_METHODS.contains(&attr),
        _ => false,
    }
}

/// Invoke a method on a receiver. Mutating methods update `receiver` in
/// place; the caller decides whether that mutation is written back.
fn call_method(
    receiver: &mut Value,
    method: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> Result<Value, Fault> {
    if let Some((key, _)) = kwargs.first() {
        return Err(Fault::type_error(format!(
            "{}() got an unexpected keyword argument '{}'",
            method, key
        )));
    }
    match receiver {
        Value::Str(s) => str_method(s, method, args),
        Value::List(items) => list_method(items, method, args),
        Value::Dict(map) => dict_method(map, method, args),
        other => Err(Fault::attribute_error(other.type_name(), method)),
    }
}

fn arity(method: &str, args: &[Value], expected: usize) -> Result<(), Fault> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Fault::type_error(format!(
            "{}() takes {} argument(s) ({} given)",
            method,
            expected,
            args.len()
        )))
    }
}

fn str_argument<'a>(method: &str, value: &'a Value) -> Result<&'a str, Fault> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Fault::type_error(format!(
            "{}() argument must be str, not '{}'",
            method,
            other.type_name()
        ))),
    }
}

fn str_method(s: &Arc<String>, method: &str, args: &[Value]) -> Result<Value, Fault> {
    match method {
        "upper" => {
            arity("upper", args, 0)?;
            Ok(Value::string(s.to_uppercase()))
        }
        "lower" => {
            arity("lower", args, 0)?;
            Ok(Value::string(s.to_lowercase()))
        }
        "strip" => {
            arity("strip", args, 0)?;
            Ok(Value::string(s.trim().to_string()))
        }
        "split" => match args {
            [] => Ok(Value::list(
                s.split_whitespace().map(Value::string).collect(),
            )),
            [sep] => {
                let sep = str_argument("split", sep)?;
                if sep.is_empty() {
                    return Err(Fault::value_error("empty separator"));
                }
                Ok(Value::list(s.split(sep).map(Value::string).collect()))
            }
            _ => Err(Fault::type_error(format!(
                "split() takes at most 1 argument ({} given)",
                args.len()
            ))),
        },
        "join" => {
            arity("join", args, 1)?;
            let elements = iter_elements(&args[0]).ok_or_else(|| {
                Fault::type_error(format!("can only join an iterable, not '{}'", args[0].type_name()))
            })?;
            let mut parts = Vec::with_capacity(elements.len());
            for element in &elements {
                parts.push(str_argument("join", element)?.to_string());
            }
            Ok(Value::string(parts.join(s.as_str())))
        }
        "replace" => {
            arity("replace", args, 2)?;
            let old = str_argument("replace", &args[0])?;
            let new = str_argument("replace", &args[1])?;
            Ok(Value::string(s.replace(old, new)))
        }
        "startswith" => {
            arity("startswith", args, 1)?;
            Ok(Value::Bool(s.starts_with(str_argument("startswith", &args[0])?)))
        }
        "endswith" => {
            arity("endswith", args, 1)?;
            Ok(Value::Bool(s.ends_with(str_argument("endswith", &args[0])?)))
        }
        "find" => {
            arity("find", args, 1)?;
            let needle = str_argument("find", &args[0])?;
            match s.find(needle) {
                // byte offset converted to a character offset
                Some(at) => Ok(Value::Int(s[..at].chars().count() as i64)),
                None => Ok(Value::Int(-1)),
            }
        }
        _ => Err(Fault::attribute_error("str", method)),
    }
}

fn list_method(items: &mut ValueList, method: &str, args: &[Value]) -> Result<Value, Fault> {
    match method {
        "append" => {
            arity("append", args, 1)?;
            items.push(args[0].clone());
            Ok(Value::None)
        }
        "pop" => match args {
            [] => items
                .pop()
                .ok_or_else(|| Fault::index_error("pop from empty list")),
            [index] => {
                let at = sequence_index(items.len(), index, "list")
                    .map_err(|_| Fault::index_error("pop index out of range"))?;
                Ok(items.remove(at).expect("index checked above"))
            }
            _ => Err(Fault::type_error(format!(
                "pop() takes at most 1 argument ({} given)",
                args.len()
            ))),
        },
        "insert" => {
            arity("insert", args, 2)?;
            let raw = args[0].as_int().ok_or_else(|| {
                Fault::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    args[0].type_name()
                ))
            })?;
            let at = if raw < 0 {
                (raw + items.len() as i64).max(0) as usize
            } else {
                raw as usize
            };
            items.insert(at, args[1].clone());
            Ok(Value::None)
        }
        "remove" => {
            arity("remove", args, 1)?;
            let found = items
                .iter()
                .position(|item| values_equal(item, &args[0]));
            match found {
                Some(at) => {
                    items.remove(at);
                    Ok(Value::None)
                }
                None => Err(Fault::value_error("list.remove(x): x not in list")),
            }
        }
        "reverse" => {
            arity("reverse", args, 0)?;
            items.reverse();
            Ok(Value::None)
        }
        "clear" => {
            arity("clear", args, 0)?;
            items.clear();
            Ok(Value::None)
        }
        "count" => {
            arity("count", args, 1)?;
            let count = items
                .iter()
                .filter(|item| values_equal(item, &args[0]))
                .count();
            Ok(Value::Int(count as i64))
        }
        "index" => {
            arity("index", args, 1)?;
            items
                .iter()
                .position(|item| values_equal(item, &args[0]))
                .map(|at| Value::Int(at as i64))
                .ok_or_else(|| {
                    Fault::value_error(format!("{} is not in list", args[0].repr()))
                })
        }
        _ => Err(Fault::attribute_error("list", method)),
    }
}

fn dict_method(map: &mut ValueDict, method: &str, args: &[Value]) -> Result<Value, Fault> {
    let key_argument = |method: &str, value: &Value| -> Result<String, Fault> {
        match value {
            Value::Str(s) => Ok(s.as_ref().clone()),
            other => Err(Fault::type_error(format!(
                "{}() key must be str, not '{}'",
                method,
                other.type_name()
            ))),
        }
    };
    match method {
        "get" => match args {
            [key] => {
                let key = key_argument("get", key)?;
                Ok(map.get(&key).cloned().unwrap_or(Value::None))
            }
            [key, default] => {
                let key = key_argument("get", key)?;
                Ok(map.get(&key).cloned().unwrap_or_else(|| default.clone()))
            }
            _ => Err(Fault::type_error(format!(
                "get() takes 1 or 2 arguments ({} given)",
                args.len()
            ))),
        },
        "keys" => {
            arity("keys", args, 0)?;
            Ok(Value::list(
                map.keys().map(|k| Value::string(k.clone())).collect(),
            ))
        }
        "values" => {
            arity("values", args, 0)?;
            Ok(Value::list(map.values().cloned().collect()))
        }
        "items" => {
            arity("items", args, 0)?;
            Ok(Value::list(
                map.iter()
                    .map(|(k, v)| Value::tuple(vec![Value::string(k.clone()), v.clone()]))
                    .collect(),
            ))
        }
        "pop" => match args {
            [key] => {
                let key = key_argument("pop", key)?;
                map.remove(&key).ok_or_else(|| Fault::key_error(&key))
            }
            [key, default] => {
                let key = key_argument("pop", key)?;
                Ok(map.remove(&key).unwrap_or_else(|| default.clone()))
            }
            _ => Err(Fault::type_error(format!(
                "pop() takes 1 or 2 arguments ({} given)",
                args.len()
            ))),
        },
        "update" => {
            arity("update", args, 1)?;
            match &args[0] {
                Value::Dict(other) => {
                    for (key, value) in other.iter() {
                        map.insert(key.clone(), value.clone());
                    }
                    Ok(Value::None)
                }
                other => Err(Fault::type_error(format!(
                    "update() argument must be dict, not '{}'",
                    other.type_name()
                ))),
            }
        }
        "clear" => {
            arity("clear", args, 0)?;
            map.clear();
            Ok(Value::None)
        }
        _ => Err(Fault::attribute_error("dict", method)),
    }
}
