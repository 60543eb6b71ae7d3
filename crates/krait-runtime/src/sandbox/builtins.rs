//! Builtin function registry
//!
//! The closed set of callables a policy may expose. Dispatch is by name:
//! a `Value::Builtin` carries only its registry key, and the interpreter
//! funnels every call back through [`call`]. Conversion and error
//! conventions follow the embedded language.

use std::cmp::Ordering;

use crate::sandbox::value::{compare_values, iter_elements, Fault, Value};

/// Names of every registered builtin.
pub const NAMES: &[&str] = &[
    "abs", "bool", "float", "int", "len", "max", "min", "range", "round", "sorted", "str", "sum",
];

/// Check if a name is a registry builtin
pub fn is_builtin(name: &str) -> bool {
    NAMES.contains(&name)
}

/// Iterate over every registered builtin name
pub fn names() -> impl Iterator<Item = &'static str> {
    NAMES.iter().copied()
}

/// Call a registry builtin by name
pub fn call(name: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    match name {
        "abs" => builtin_abs(args, kwargs),
        "bool" => builtin_bool(args, kwargs),
        "float" => builtin_float(args, kwargs),
        "int" => builtin_int(args, kwargs),
        "len" => builtin_len(args, kwargs),
        "max" => builtin_max(args, kwargs),
        "min" => builtin_min(args, kwargs),
        "range" => builtin_range(args, kwargs),
        "round" => builtin_round(args, kwargs),
        "sorted" => builtin_sorted(args, kwargs),
        "str" => builtin_str(args, kwargs),
        "sum" => builtin_sum(args, kwargs),
        _ => Err(Fault::name_error(name)),
    }
}

fn no_kwargs(name: &str, kwargs: &[(String, Value)]) -> Result<(), Fault> {
    match kwargs.first() {
        None => Ok(()),
        Some((key, _)) => Err(Fault::type_error(format!(
            "{}() got an unexpected keyword argument '{}'",
            name, key
        ))),
    }
}

fn exactly_one<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, Fault> {
    match args {
        [value] => Ok(value),
        _ => Err(Fault::type_error(format!(
            "{}() takes exactly one argument ({} given)",
            name,
            args.len()
        ))),
    }
}

/// abs(x)
fn builtin_abs(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    no_kwargs("abs", kwargs)?;
    match exactly_one("abs", args)? {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| Fault::overflow("integer overflow")),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(Fault::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

/// bool(x=False)
fn builtin_bool(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    no_kwargs("bool", kwargs)?;
    if args.len() > 1 {
        return Err(Fault::type_error(format!(
            "bool() takes at most 1 argument ({} given)",
            args.len()
        )));
    }
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

/// float(x=0.0)
fn builtin_float(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    no_kwargs("float", kwargs)?;
    if args.len() > 1 {
        return Err(Fault::type_error(format!(
            "float() takes at most 1 argument ({} given)",
            args.len()
        )));
    }
    let Some(value) = args.first() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Float(n) => Ok(Value::Float(*n)),
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Bool(b) => Ok(Value::Float(*b as i64 as f64)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            Fault::value_error(format!("could not convert string to float: '{}'", s))
        }),
        other => Err(Fault::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

/// int(x=0), truncating floats toward zero
fn builtin_int(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    no_kwargs("int", kwargs)?;
    if args.len() > 1 {
        return Err(Fault::type_error(format!(
            "int() takes at most 1 argument ({} given)",
            args.len()
        )));
    }
    let Some(value) = args.first() else {
        return Ok(Value::Int(0));
    };
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(n) => float_to_int(*n),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            Fault::value_error(format!("invalid literal for int() with base 10: '{}'", s))
        }),
        other => Err(Fault::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

pub(crate) fn float_to_int(n: f64) -> Result<Value, Fault> {
    if n.is_nan() {
        return Err(Fault::value_error("cannot convert float NaN to integer"));
    }
    if n.is_infinite() {
        return Err(Fault::overflow("cannot convert float infinity to integer"));
    }
    let truncated = n.trunc();
    // i64::MAX as f64 rounds up to 2^63, so that bound must be exclusive.
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(Fault::overflow("integer overflow"));
    }
    Ok(Value::Int(truncated as i64))
}

/// len(x)
fn builtin_len(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    no_kwargs("len", kwargs)?;
    let length = match exactly_one("len", args)? {
        Value::Str(s) => s.chars().count(),
        Value::Tuple(items) => items.len(),
        Value::List(items) => items.len(),
        Value::Dict(map) => map.len(),
        other => {
            return Err(Fault::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(length as i64))
}

/// max(iterable) or max(a, b, ...)
fn builtin_max(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    extremum("max", args, kwargs, Ordering::Greater)
}

/// min(iterable) or min(a, b, ...)
fn builtin_min(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    extremum("min", args, kwargs, Ordering::Less)
}

fn extremum(
    name: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
    keep: Ordering,
) -> Result<Value, Fault> {
    no_kwargs(name, kwargs)?;
    let candidates: Vec<Value> = match args {
        [] => {
            return Err(Fault::type_error(format!(
                "{} expected at least 1 argument, got 0",
                name
            )))
        }
        [single] => iter_elements(single).ok_or_else(|| {
            Fault::type_error(format!("'{}' object is not iterable", single.type_name()))
        })?,
        many => many.to_vec(),
    };
    // Ties keep the earliest candidate.
    let mut result: Option<Value> = None;
    for candidate in candidates {
        result = Some(match result {
            None => candidate,
            Some(best) => {
                if compare_values(&candidate, &best)? == keep {
                    candidate
                } else {
                    best
                }
            }
        });
    }
    result.ok_or_else(|| Fault::value_error(format!("{}() arg is an empty sequence", name)))
}

/// range(stop) or range(start, stop[, step]), materialized as a list
fn builtin_range(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    no_kwargs("range", kwargs)?;
    let mut bounds = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Int(n) => bounds.push(*n),
            Value::Bool(b) => bounds.push(*b as i64),
            other => {
                return Err(Fault::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    other.type_name()
                )))
            }
        }
    }
    let (start, stop, step) = match bounds.as_slice() {
        [] => {
            return Err(Fault::type_error("range expected at least 1 argument, got 0"))
        }
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        more => {
            return Err(Fault::type_error(format!(
                "range expected at most 3 arguments, got {}",
                more.len()
            )))
        }
    };
    if step == 0 {
        return Err(Fault::value_error("range() arg 3 must not be zero"));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::list(items))
}

/// round(x[, ndigits]) with half-to-even tie breaking
fn builtin_round(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    let mut ndigits: Option<&Value> = args.get(1);
    for (key, value) in kwargs {
        if key != "ndigits" {
            return Err(Fault::type_error(format!(
                "round() got an unexpected keyword argument '{}'",
                key
            )));
        }
        if ndigits.is_some() {
            return Err(Fault::type_error(
                "round() got multiple values for argument 'ndigits'",
            ));
        }
        ndigits = Some(value);
    }
    if args.is_empty() || args.len() > 2 {
        return Err(Fault::type_error(format!(
            "round() takes 1 or 2 arguments ({} given)",
            args.len()
        )));
    }
    let digits = match ndigits {
        None | Some(Value::None) => None,
        Some(Value::Int(n)) => Some(*n),
        Some(Value::Bool(b)) => Some(*b as i64),
        Some(other) => {
            return Err(Fault::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                other.type_name()
            )))
        }
    };
    match (&args[0], digits) {
        (Value::Int(n), None) => Ok(Value::Int(*n)),
        (Value::Bool(b), None) => Ok(Value::Int(*b as i64)),
        (Value::Int(n), Some(d)) => round_int(*n, d),
        (Value::Bool(b), Some(d)) => round_int(*b as i64, d),
        (Value::Float(n), None) => float_to_int(round_half_even(*n)),
        (Value::Float(n), Some(d)) => {
            if !n.is_finite() {
                return Ok(Value::Float(*n));
            }
            let scale = 10f64.powi(d.clamp(-400, 400) as i32);
            let scaled = n * scale;
            if !scaled.is_finite() {
                return Ok(Value::Float(*n));
            }
            Ok(Value::Float(round_half_even(scaled) / scale))
        }
        (other, _) => Err(Fault::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

/// Round an integer to a multiple of 10^-ndigits (ties to even).
fn round_int(n: i64, ndigits: i64) -> Result<Value, Fault> {
    if ndigits >= 0 {
        return Ok(Value::Int(n));
    }
    let Some(scale) = (-ndigits)
        .try_into()
        .ok()
        .and_then(|shift: u32| 10i128.checked_pow(shift))
    else {
        return Ok(Value::Int(0));
    };
    let wide = n as i128;
    let quotient = wide.div_euclid(scale);
    let remainder = wide.rem_euclid(scale);
    let rounded = match (remainder * 2).cmp(&scale) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal => {
            if quotient % 2 == 0 {
                quotient
            } else {
                quotient + 1
            }
        }
    };
    i64::try_from(rounded * scale)
        .map(Value::Int)
        .map_err(|_| Fault::overflow("integer overflow"))
}

fn round_half_even(n: f64) -> f64 {
    let floor = n.floor();
    let diff = n - floor;
    if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else if floor.rem_euclid(2.0) == 0.0 {
        floor
    } else {
        floor + 1.0
    }
}

/// sorted(iterable, reverse=False)
fn builtin_sorted(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    let mut reverse = false;
    for (key, value) in kwargs {
        if key == "reverse" {
            reverse = value.is_truthy();
        } else {
            return Err(Fault::type_error(format!(
                "sorted() got an unexpected keyword argument '{}'",
                key
            )));
        }
    }
    let value = exactly_one("sorted", args)?;
    let mut items = iter_elements(value).ok_or_else(|| {
        Fault::type_error(format!("'{}' object is not iterable", value.type_name()))
    })?;
    // Flipping the comparator (rather than reversing afterwards) keeps the
    // sort stable for equal keys, matching the reference semantics.
    let mut fault = None;
    items.sort_by(|a, b| {
        let ordering = if reverse {
            compare_values(b, a)
        } else {
            compare_values(a, b)
        };
        ordering.unwrap_or_else(|f| {
            if fault.is_none() {
                fault = Some(f);
            }
            Ordering::Equal
        })
    });
    match fault {
        Some(f) => Err(f),
        None => Ok(Value::list(items)),
    }
}

/// str(x='')
fn builtin_str(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    no_kwargs("str", kwargs)?;
    match args {
        [] => Ok(Value::string("")),
        [value] => Ok(Value::string(value.to_string())),
        _ => Err(Fault::type_error(format!(
            "str() takes at most 1 argument ({} given)",
            args.len()
        ))),
    }
}

/// sum(iterable, start=0)
fn builtin_sum(args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    let mut start: Option<&Value> = args.get(1);
    for (key, value) in kwargs {
        if key != "start" {
            return Err(Fault::type_error(format!(
                "sum() got an unexpected keyword argument '{}'",
                key
            )));
        }
        if start.is_some() {
            return Err(Fault::type_error(
                "sum() got multiple values for argument 'start'",
            ));
        }
        start = Some(value);
    }
    if args.is_empty() || args.len() > 2 {
        return Err(Fault::type_error(format!(
            "sum() takes 1 or 2 arguments ({} given)",
            args.len()
        )));
    }
    let elements = iter_elements(&args[0]).ok_or_else(|| {
        Fault::type_error(format!("'{}' object is not iterable", args[0].type_name()))
    })?;
    let mut acc = match start {
        None => Value::Int(0),
        Some(Value::Str(_)) => {
            return Err(Fault::type_error(
                "sum() can't sum strings [use ''.join(seq) instead]",
            ))
        }
        Some(value) => value.clone(),
    };
    for item in &elements {
        acc = add_numeric(&acc, item)?;
    }
    Ok(acc)
}

fn add_numeric(a: &Value, b: &Value) -> Result<Value, Fault> {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => x
            .checked_add(y)
            .map(Value::Int)
            .ok_or_else(|| Fault::overflow("integer overflow")),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(Value::Float(x + y)),
            _ => Err(Fault::type_error(format!(
                "unsupported operand type(s) for +: '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::value::FaultKind;

    fn call_ok(name: &str, args: Vec<Value>) -> Value {
        call(name, &args, &[]).unwrap()
    }

    fn call_err(name: &str, args: Vec<Value>) -> Fault {
        call(name, &args, &[]).unwrap_err()
    }

    #[test]
    fn test_registry_names_round_trip() {
        for name in names() {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("eval"));
        assert!(!is_builtin("print"));
    }

    #[test]
    fn test_abs() {
        assert_eq!(call_ok("abs", vec![Value::Int(-5)]), Value::Int(5));
        assert_eq!(call_ok("abs", vec![Value::Float(-2.5)]), Value::Float(2.5));
        assert_eq!(call_ok("abs", vec![Value::Bool(true)]), Value::Int(1));

        let err = call_err("abs", vec![Value::Int(i64::MIN)]);
        assert_eq!(err.kind, FaultKind::OverflowError);
        let err = call_err("abs", vec![Value::string("x")]);
        assert_eq!(err.kind, FaultKind::TypeError);
    }

    #[test]
    fn test_bool_and_float_and_int_conversions() {
        assert_eq!(call_ok("bool", vec![]), Value::Bool(false));
        assert_eq!(call_ok("bool", vec![Value::string("x")]), Value::Bool(true));

        assert_eq!(call_ok("float", vec![Value::Int(2)]), Value::Float(2.0));
        assert_eq!(
            call_ok("float", vec![Value::string(" 1.5 ")]),
            Value::Float(1.5)
        );
        let err = call_err("float", vec![Value::string("abc")]);
        assert_eq!(err.kind, FaultKind::ValueError);

        assert_eq!(call_ok("int", vec![Value::Float(2.9)]), Value::Int(2));
        assert_eq!(call_ok("int", vec![Value::Float(-2.9)]), Value::Int(-2));
        assert_eq!(call_ok("int", vec![Value::string("42")]), Value::Int(42));
        let err = call_err("int", vec![Value::Float(f64::NAN)]);
        assert_eq!(err.kind, FaultKind::ValueError);
        let err = call_err("int", vec![Value::Float(f64::INFINITY)]);
        assert_eq!(err.kind, FaultKind::OverflowError);
    }

    #[test]
    fn test_len_counts_characters() {
        assert_eq!(call_ok("len", vec![Value::string("héllo")]), Value::Int(5));
        assert_eq!(
            call_ok("len", vec![Value::list(vec![Value::Int(1), Value::Int(2)])]),
            Value::Int(2)
        );
        let err = call_err("len", vec![Value::Int(3)]);
        assert_eq!(err.kind, FaultKind::TypeError);
    }

    #[test]
    fn test_max_min() {
        assert_eq!(
            call_ok("max", vec![Value::Int(1), Value::Int(3), Value::Int(2)]),
            Value::Int(3)
        );
        assert_eq!(
            call_ok(
                "min",
                vec![Value::list(vec![Value::Int(4), Value::Int(1), Value::Int(2)])]
            ),
            Value::Int(1)
        );

        let err = call_err("max", vec![Value::list(vec![])]);
        assert_eq!(err.kind, FaultKind::ValueError);
        let err = call_err("max", vec![Value::Int(1), Value::string("a")]);
        assert_eq!(err.kind, FaultKind::TypeError);
    }

    #[test]
    fn test_range() {
        assert_eq!(
            call_ok("range", vec![Value::Int(3)]),
            Value::list(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            call_ok("range", vec![Value::Int(2), Value::Int(5)]),
            Value::list(vec![Value::Int(2), Value::Int(3), Value::Int(4)])
        );
        assert_eq!(
            call_ok("range", vec![Value::Int(5), Value::Int(1), Value::Int(-2)]),
            Value::list(vec![Value::Int(5), Value::Int(3)])
        );
        assert_eq!(call_ok("range", vec![Value::Int(-1)]), Value::list(vec![]));

        let err = call_err("range", vec![Value::Int(1), Value::Int(5), Value::Int(0)]);
        assert_eq!(err.kind, FaultKind::ValueError);
        let err = call_err("range", vec![Value::Float(1.0)]);
        assert_eq!(err.kind, FaultKind::TypeError);
    }

    #[test]
    fn test_round_ties_to_even() {
        assert_eq!(call_ok("round", vec![Value::Float(2.5)]), Value::Int(2));
        assert_eq!(call_ok("round", vec![Value::Float(3.5)]), Value::Int(4));
        assert_eq!(call_ok("round", vec![Value::Float(-2.5)]), Value::Int(-2));
        assert_eq!(call_ok("round", vec![Value::Float(2.4)]), Value::Int(2));
        assert_eq!(call_ok("round", vec![Value::Int(7)]), Value::Int(7));
    }

    #[test]
    fn test_round_with_ndigits() {
        assert_eq!(
            call_ok("round", vec![Value::Float(2.345), Value::Int(2)]),
            Value::Float(2.35)
        );
        assert_eq!(
            call_ok("round", vec![Value::Int(15), Value::Int(-1)]),
            Value::Int(20)
        );
        assert_eq!(
            call_ok("round", vec![Value::Int(25), Value::Int(-1)]),
            Value::Int(20)
        );
        let result = call(
            "round",
            &[Value::Float(2.5)],
            &[("ndigits".to_string(), Value::Int(0))],
        )
        .unwrap();
        assert_eq!(result, Value::Float(2.0));
    }

    #[test]
    fn test_sorted() {
        let out = call_ok(
            "sorted",
            vec![Value::list(vec![Value::Int(3), Value::Int(1), Value::Int(2)])],
        );
        assert_eq!(
            out,
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );

        let out = call(
            "sorted",
            &[Value::list(vec![Value::Int(1), Value::Int(3)])],
            &[("reverse".to_string(), Value::Bool(true))],
        )
        .unwrap();
        assert_eq!(out, Value::list(vec![Value::Int(3), Value::Int(1)]));

        let out = call_ok("sorted", vec![Value::string("cab")]);
        assert_eq!(
            out,
            Value::list(vec![
                Value::string("a"),
                Value::string("b"),
                Value::string("c")
            ])
        );

        let err = call_err(
            "sorted",
            vec![Value::list(vec![Value::Int(1), Value::string("a")])],
        );
        assert_eq!(err.kind, FaultKind::TypeError);
    }

    #[test]
    fn test_str() {
        assert_eq!(call_ok("str", vec![]), Value::string(""));
        assert_eq!(call_ok("str", vec![Value::Int(42)]), Value::string("42"));
        assert_eq!(call_ok("str", vec![Value::Float(2.0)]), Value::string("2.0"));
        assert_eq!(call_ok("str", vec![Value::None]), Value::string("None"));
    }

    #[test]
    fn test_sum() {
        assert_eq!(
            call_ok(
                "sum",
                vec![Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])]
            ),
            Value::Int(6)
        );
        assert_eq!(
            call_ok(
                "sum",
                vec![
                    Value::list(vec![Value::Int(1), Value::Float(0.5)]),
                    Value::Int(10)
                ]
            ),
            Value::Float(11.5)
        );

        let err = call_err(
            "sum",
            vec![Value::list(vec![Value::Int(i64::MAX), Value::Int(1)])],
        );
        assert_eq!(err.kind, FaultKind::OverflowError);

        let err = call_err(
            "sum",
            vec![Value::list(vec![]), Value::string("")],
        );
        assert_eq!(err.kind, FaultKind::TypeError);
        assert!(err.message.contains("can't sum strings"));
    }

    #[test]
    fn test_unknown_keyword_arguments_rejected() {
        let err = call(
            "len",
            &[Value::string("x")],
            &[("key".to_string(), Value::None)],
        )
        .unwrap_err();
        assert_eq!(err.kind, FaultKind::TypeError);
        assert!(err.message.contains("unexpected keyword argument"));
    }

    #[test]
    fn test_unknown_builtin_is_name_error() {
        let err = call_err("open", vec![]);
        assert_eq!(err.kind, FaultKind::NameError);
    }
}
