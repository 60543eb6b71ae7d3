//! Module registry
//!
//! The importable surface: `math` (functions and constants) and `string`
//! (constants). Imports resolve against this table once the policy
//! allow-list and import guard agree; attribute access on a module handle
//! resolves here too, after the attribute guard agrees. A module that is
//! not in this table never materializes, whatever the policy says.

use crate::sandbox::builtins::float_to_int;
use crate::sandbox::value::{Fault, Value};

/// Names of every registered module.
pub const NAMES: &[&str] = &["math", "string"];

/// Check if a name is a registry module
pub fn is_module(name: &str) -> bool {
    NAMES.contains(&name)
}

/// Iterate over every registered module name
pub fn names() -> impl Iterator<Item = &'static str> {
    NAMES.iter().copied()
}

const MATH_FUNCTIONS: &[&str] = &[
    "acos", "asin", "atan", "atan2", "ceil", "cos", "degrees", "exp", "fabs", "floor", "fmod",
    "hypot", "log", "log10", "log2", "pow", "radians", "sin", "sqrt", "tan", "trunc",
];

const ASCII_LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const ASCII_UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;
const WHITESPACE: &str = " \t\n\r\x0b\x0c";

/// Look up a module member for attribute access or a from-import.
/// Functions come back as qualified `Value::Builtin` entries.
pub fn member(module: &str, name: &str) -> Option<Value> {
    match module {
        "math" => math_member(name),
        "string" => string_member(name),
        _ => None,
    }
}

fn math_member(name: &str) -> Option<Value> {
    match name {
        "pi" => Some(Value::Float(std::f64::consts::PI)),
        "e" => Some(Value::Float(std::f64::consts::E)),
        "tau" => Some(Value::Float(std::f64::consts::TAU)),
        "inf" => Some(Value::Float(f64::INFINITY)),
        "nan" => Some(Value::Float(f64::NAN)),
        name if MATH_FUNCTIONS.contains(&name) => Some(Value::builtin(format!("math.{}", name))),
        _ => None,
    }
}

fn string_member(name: &str) -> Option<Value> {
    match name {
        "ascii_lowercase" => Some(Value::string(ASCII_LOWERCASE)),
        "ascii_uppercase" => Some(Value::string(ASCII_UPPERCASE)),
        "ascii_letters" => Some(Value::string(format!(
            "{}{}",
            ASCII_LOWERCASE, ASCII_UPPERCASE
        ))),
        "digits" => Some(Value::string(DIGITS)),
        "hexdigits" => Some(Value::string("0123456789abcdefABCDEF")),
        "octdigits" => Some(Value::string("01234567")),
        "punctuation" => Some(Value::string(PUNCTUATION)),
        "whitespace" => Some(Value::string(WHITESPACE)),
        "printable" => Some(Value::string(format!(
            "{}{}{}{}{}",
            DIGITS, ASCII_LOWERCASE, ASCII_UPPERCASE, PUNCTUATION, WHITESPACE
        ))),
        _ => None,
    }
}

/// Call a qualified module function (`module.func`)
pub fn call(
    module: &str,
    func: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> Result<Value, Fault> {
    match module {
        "math" => math_call(func, args, kwargs),
        _ => Err(Fault::name_error(&format!("{}.{}", module, func))),
    }
}

fn math_call(func: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Fault> {
    if let Some((key, _)) = kwargs.first() {
        return Err(Fault::type_error(format!(
            "math.{}() got an unexpected keyword argument '{}'",
            func, key
        )));
    }
    match func {
        "acos" => {
            let x = real_arg("acos", args)?;
            if !(-1.0..=1.0).contains(&x) {
                return Err(domain_error());
            }
            Ok(Value::Float(x.acos()))
        }
        "asin" => {
            let x = real_arg("asin", args)?;
            if !(-1.0..=1.0).contains(&x) {
                return Err(domain_error());
            }
            Ok(Value::Float(x.asin()))
        }
        "atan" => Ok(Value::Float(real_arg("atan", args)?.atan())),
        "atan2" => {
            let (y, x) = real_pair("atan2", args)?;
            Ok(Value::Float(y.atan2(x)))
        }
        "ceil" => float_to_int(real_arg("ceil", args)?.ceil()),
        "cos" => Ok(Value::Float(real_arg("cos", args)?.cos())),
        "degrees" => Ok(Value::Float(real_arg("degrees", args)?.to_degrees())),
        "exp" => {
            let x = real_arg("exp", args)?;
            let result = x.exp();
            if result.is_infinite() && x.is_finite() {
                return Err(Fault::overflow("math range error"));
            }
            Ok(Value::Float(result))
        }
        "fabs" => Ok(Value::Float(real_arg("fabs", args)?.abs())),
        "floor" => float_to_int(real_arg("floor", args)?.floor()),
        "fmod" => {
            let (x, y) = real_pair("fmod", args)?;
            if y == 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x % y))
        }
        "hypot" => {
            let mut result = 0.0f64;
            for arg in args {
                result = result.hypot(real_value(arg)?);
            }
            Ok(Value::Float(result))
        }
        "log" => math_log(args),
        "log10" => {
            let x = real_arg("log10", args)?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.log10()))
        }
        "log2" => {
            let x = real_arg("log2", args)?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.log2()))
        }
        "pow" => {
            let (x, y) = real_pair("pow", args)?;
            math_pow(x, y).map(Value::Float)
        }
        "radians" => Ok(Value::Float(real_arg("radians", args)?.to_radians())),
        "sin" => Ok(Value::Float(real_arg("sin", args)?.sin())),
        "sqrt" => {
            let x = real_arg("sqrt", args)?;
            if x < 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.sqrt()))
        }
        "tan" => Ok(Value::Float(real_arg("tan", args)?.tan())),
        "trunc" => float_to_int(real_arg("trunc", args)?.trunc()),
        _ => Err(Fault::attribute_error("module", func)),
    }
}

/// log(x) natural, or log(x, base)
fn math_log(args: &[Value]) -> Result<Value, Fault> {
    match args {
        [x] => {
            let x = real_value(x)?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.ln()))
        }
        [x, base] => {
            let x = real_value(x)?;
            let base = real_value(base)?;
            if x <= 0.0 || base <= 0.0 {
                return Err(domain_error());
            }
            let denominator = base.ln();
            if denominator == 0.0 {
                return Err(Fault::zero_division("float division by zero"));
            }
            Ok(Value::Float(x.ln() / denominator))
        }
        _ => Err(Fault::type_error(format!(
            "math.log() takes 1 or 2 arguments ({} given)",
            args.len()
        ))),
    }
}

fn math_pow(x: f64, y: f64) -> Result<f64, Fault> {
    if x == 0.0 && y < 0.0 {
        return Err(domain_error());
    }
    let result = x.powf(y);
    if result.is_nan() && !x.is_nan() && !y.is_nan() {
        return Err(domain_error());
    }
    if result.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(Fault::overflow("math range error"));
    }
    Ok(result)
}

fn real_arg(func: &str, args: &[Value]) -> Result<f64, Fault> {
    match args {
        [value] => real_value(value),
        _ => Err(Fault::type_error(format!(
            "math.{}() takes exactly one argument ({} given)",
            func,
            args.len()
        ))),
    }
}

fn real_pair(func: &str, args: &[Value]) -> Result<(f64, f64), Fault> {
    match args {
        [a, b] => Ok((real_value(a)?, real_value(b)?)),
        _ => Err(Fault::type_error(format!(
            "math.{}() takes exactly 2 arguments ({} given)",
            func,
            args.len()
        ))),
    }
}

fn real_value(value: &Value) -> Result<f64, Fault> {
    value
        .as_float()
        .ok_or_else(|| Fault::type_error(format!("must be real number, not {}", value.type_name())))
}

fn domain_error() -> Fault {
    Fault::value_error("math domain error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::value::FaultKind;

    #[test]
    fn test_registry_names() {
        assert!(is_module("math"));
        assert!(is_module("string"));
        assert!(!is_module("os"));
        assert_eq!(names().count(), 2);
    }

    #[test]
    fn test_math_constants() {
        assert_eq!(
            member("math", "pi"),
            Some(Value::Float(std::f64::consts::PI))
        );
        assert_eq!(
            member("math", "tau"),
            Some(Value::Float(std::f64::consts::TAU))
        );
        assert!(matches!(member("math", "inf"), Some(Value::Float(n)) if n.is_infinite()));
    }

    #[test]
    fn test_math_functions_are_qualified_builtins() {
        assert_eq!(member("math", "sqrt"), Some(Value::builtin("math.sqrt")));
        assert_eq!(member("math", "nothere"), None);
    }

    #[test]
    fn test_string_constants() {
        assert_eq!(
            member("string", "digits"),
            Some(Value::string("0123456789"))
        );
        let letters = member("string", "ascii_letters").unwrap();
        assert_eq!(
            letters,
            Value::string("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ")
        );
        assert_eq!(member("string", "frobnicate"), None);
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(
            call("math", "sqrt", &[Value::Int(9)], &[]).unwrap(),
            Value::Float(3.0)
        );
        let err = call("math", "sqrt", &[Value::Float(-1.0)], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ValueError);
        assert_eq!(err.message, "math domain error");
    }

    #[test]
    fn test_floor_ceil_trunc_return_ints() {
        assert_eq!(
            call("math", "floor", &[Value::Float(2.7)], &[]).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            call("math", "ceil", &[Value::Float(2.1)], &[]).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            call("math", "trunc", &[Value::Float(-2.7)], &[]).unwrap(),
            Value::Int(-2)
        );
        let err = call("math", "floor", &[Value::Float(f64::INFINITY)], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::OverflowError);
    }

    #[test]
    fn test_log_variants() {
        assert_eq!(
            call("math", "log", &[Value::Float(std::f64::consts::E)], &[]).unwrap(),
            Value::Float(1.0)
        );
        assert_eq!(
            call("math", "log", &[Value::Int(8), Value::Int(2)], &[]).unwrap(),
            Value::Float(3.0)
        );

        let err = call("math", "log", &[Value::Int(0)], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ValueError);
        let err = call("math", "log", &[Value::Int(8), Value::Int(1)], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ZeroDivisionError);
    }

    #[test]
    fn test_exp_and_pow_range_errors() {
        let err = call("math", "exp", &[Value::Int(1000)], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::OverflowError);
        assert_eq!(err.message, "math range error");

        let err = call("math", "pow", &[Value::Int(0), Value::Int(-1)], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ValueError);
        let err = call("math", "pow", &[Value::Float(-2.0), Value::Float(0.5)], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ValueError);
        assert_eq!(
            call("math", "pow", &[Value::Int(2), Value::Int(10)], &[]).unwrap(),
            Value::Float(1024.0)
        );
    }

    #[test]
    fn test_fmod_and_hypot() {
        assert_eq!(
            call("math", "fmod", &[Value::Float(7.5), Value::Int(2)], &[]).unwrap(),
            Value::Float(1.5)
        );
        let err = call("math", "fmod", &[Value::Int(1), Value::Int(0)], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ValueError);

        assert_eq!(
            call("math", "hypot", &[Value::Int(3), Value::Int(4)], &[]).unwrap(),
            Value::Float(5.0)
        );
    }

    #[test]
    fn test_degrees_radians_round_trip() {
        let half_turn = call("math", "radians", &[Value::Int(180)], &[]).unwrap();
        assert_eq!(half_turn, Value::Float(std::f64::consts::PI));
        let back = call("math", "degrees", &[half_turn], &[]).unwrap();
        assert_eq!(back, Value::Float(180.0));
    }

    #[test]
    fn test_non_numeric_argument_rejected() {
        let err = call("math", "sin", &[Value::string("x")], &[]).unwrap_err();
        assert_eq!(err.kind, FaultKind::TypeError);
        assert!(err.message.contains("must be real number"));
    }

    #[test]
    fn test_keyword_arguments_rejected() {
        let err = call(
            "math",
            "sqrt",
            &[Value::Int(4)],
            &[("x".to_string(), Value::Int(4))],
        )
        .unwrap_err();
        assert_eq!(err.kind, FaultKind::TypeError);
    }
}
