//! Tree-walking evaluator over [serde_json::Value] bindings.

use crate::{
    ast::{BinaryOp, ComprehensionOp, Expr, Literal, UnaryOp},
    builtin::Builtin,
    env::Env,
    error::EvalError,
};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Evaluate a parsed expression against a binding of variable names to
/// values.
pub(crate) fn evaluate(
    expr: &Expr,
    env: &Env,
    binding: &Map<String, Value>,
) -> Result<Value, EvalError> {
    let mut interpreter = Interpreter {
        env,
        binding,
        scopes: Vec::new(),
    };
    interpreter.eval(expr)
}

struct Interpreter<'a> {
    env: &'a Env,
    binding: &'a Map<String, Value>,
    /// Comprehension-bound variables, innermost last.
    scopes: Vec<(String, Value)>,
}

impl Interpreter<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)?),
            Expr::Ident(name) => self.lookup(name),
            Expr::Member { object, field } => {
                let object = self.eval(object)?;
                member(&object, field)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                indexed(&object, &index)
            }
            Expr::Call {
                target,
                function,
                args,
            } => self.call(target.as_deref(), function, args),
            Expr::Comprehension {
                target,
                op,
                var,
                body,
            } => self.comprehension(target, *op, var, body),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                unary(*op, value)
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond)?;
                match cond {
                    Value::Bool(true) => self.eval(then),
                    Value::Bool(false) => self.eval(otherwise),
                    other => Err(EvalError::type_mismatch("?:", "bool", type_name(&other))),
                }
            }
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(values))
            }
            Expr::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::String(s) => s,
                        other => {
                            return Err(EvalError::type_mismatch(
                                "map key",
                                "string",
                                type_name(&other),
                            ));
                        }
                    };
                    map.insert(key, self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    fn lookup(&mut self, name: &str) -> Result<Value, EvalError> {
        for (scoped, value) in self.scopes.iter().rev() {
            if scoped == name {
                return Ok(value.clone());
            }
        }
        if let Some(value) = self.binding.get(name) {
            return Ok(value.clone());
        }
        if self.env.declares_variable(name) {
            return Err(EvalError::IncompleteData(format!(
                "variable `{name}` is not bound yet"
            )));
        }
        Err(EvalError::UnknownIdentifier(name.to_string()))
    }

    fn call(
        &mut self,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
    ) -> Result<Value, EvalError> {
        // `has` is a special form: its argument must be allowed to fail.
        if target.is_none() && function == Builtin::Has.name() {
            let [arg] = args else {
                return Err(EvalError::InvalidArgument {
                    function: function.to_string(),
                    message: format!("expected 1 argument, got {}", args.len()),
                });
            };
            return match self.eval(arg) {
                Ok(_) => Ok(Value::Bool(true)),
                Err(err) if err.is_incomplete_data() => Ok(Value::Bool(false)),
                Err(err) => Err(err),
            };
        }

        let mut values = Vec::with_capacity(args.len() + 1);
        if let Some(receiver) = target {
            values.push(self.eval(receiver)?);
        }
        for arg in args {
            values.push(self.eval(arg)?);
        }

        match Builtin::function(function) {
            Some(Builtin::Size) => builtin_size(&values),
            Some(Builtin::Matches) => builtin_matches(&values),
            Some(Builtin::String) => builtin_string(&values),
            Some(Builtin::Int) => builtin_int(&values),
            Some(Builtin::Double) => builtin_double(&values),
            Some(Builtin::Bool) => builtin_bool(&values),
            Some(Builtin::Has) => Err(EvalError::InvalidArgument {
                function: function.to_string(),
                message: "`has` cannot be used as a method".to_string(),
            }),
            Some(
                Builtin::Filter
                | Builtin::Map
                | Builtin::All
                | Builtin::Exists
                | Builtin::ExistsOne,
            ) => Err(EvalError::InvalidArgument {
                function: function.to_string(),
                message: "comprehension macros require a receiver".to_string(),
            }),
            None => Err(EvalError::UnknownFunction(function.to_string())),
        }
    }

    fn comprehension(
        &mut self,
        target: &Expr,
        op: ComprehensionOp,
        var: &str,
        body: &Expr,
    ) -> Result<Value, EvalError> {
        let items = match self.eval(target)? {
            Value::Array(items) => items,
            Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
            other => {
                return Err(EvalError::type_mismatch(
                    op.name(),
                    "list or map",
                    type_name(&other),
                ));
            }
        };

        let mut kept = Vec::new();
        let mut matched = 0usize;
        for item in items {
            self.scopes.push((var.to_string(), item.clone()));
            let result = self.eval(body);
            self.scopes.pop();
            let result = result?;

            match op {
                ComprehensionOp::Map => kept.push(result),
                _ => match result {
                    Value::Bool(true) => {
                        matched += 1;
                        if op == ComprehensionOp::Filter {
                            kept.push(item);
                        }
                    }
                    Value::Bool(false) => {
                        if op == ComprehensionOp::All {
                            return Ok(Value::Bool(false));
                        }
                    }
                    other => {
                        return Err(EvalError::type_mismatch(
                            op.name(),
                            "bool",
                            type_name(&other),
                        ));
                    }
                },
            }
        }

        match op {
            ComprehensionOp::Filter | ComprehensionOp::Map => Ok(Value::Array(kept)),
            ComprehensionOp::All => Ok(Value::Bool(true)),
            ComprehensionOp::Exists => Ok(Value::Bool(matched > 0)),
            ComprehensionOp::ExistsOne => Ok(Value::Bool(matched == 1)),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        // Short-circuiting forms first.
        match op {
            BinaryOp::And => {
                return match self.eval(lhs)? {
                    Value::Bool(false) => Ok(Value::Bool(false)),
                    Value::Bool(true) => match self.eval(rhs)? {
                        Value::Bool(b) => Ok(Value::Bool(b)),
                        other => Err(EvalError::type_mismatch("&&", "bool", type_name(&other))),
                    },
                    other => Err(EvalError::type_mismatch("&&", "bool", type_name(&other))),
                };
            }
            BinaryOp::Or => {
                return match self.eval(lhs)? {
                    Value::Bool(true) => Ok(Value::Bool(true)),
                    Value::Bool(false) => match self.eval(rhs)? {
                        Value::Bool(b) => Ok(Value::Bool(b)),
                        other => Err(EvalError::type_mismatch("||", "bool", type_name(&other))),
                    },
                    other => Err(EvalError::type_mismatch("||", "bool", type_name(&other))),
                };
            }
            _ => {}
        }

        let lhs = self.eval(lhs)?;
        let rhs = self.eval(rhs)?;

        match op {
            BinaryOp::Add => add(lhs, rhs),
            BinaryOp::Sub => arithmetic(op, lhs, rhs),
            BinaryOp::Mul => arithmetic(op, lhs, rhs),
            BinaryOp::Div => arithmetic(op, lhs, rhs),
            BinaryOp::Mod => arithmetic(op, lhs, rhs),
            BinaryOp::Eq => Ok(Value::Bool(value_eq(&lhs, &rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!value_eq(&lhs, &rhs))),
            BinaryOp::Lt => compare(op, &lhs, &rhs, |o| o == Ordering::Less),
            BinaryOp::Le => compare(op, &lhs, &rhs, |o| o != Ordering::Greater),
            BinaryOp::Gt => compare(op, &lhs, &rhs, |o| o == Ordering::Greater),
            BinaryOp::Ge => compare(op, &lhs, &rhs, |o| o != Ordering::Less),
            BinaryOp::In => contains(&lhs, &rhs),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }
}

fn literal_value(literal: &Literal) -> Result<Value, EvalError> {
    Ok(match literal {
        Literal::Int(n) => Value::Number(Number::from(*n)),
        Literal::UInt(n) => Value::Number(Number::from(*n)),
        Literal::Double(n) => Value::Number(
            Number::from_f64(*n)
                .ok_or_else(|| EvalError::ArithmeticOverflow("double literal".to_string()))?,
        ),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    })
}

fn member(object: &Value, field: &str) -> Result<Value, EvalError> {
    match object {
        Value::Object(map) => map.get(field).cloned().ok_or_else(|| {
            EvalError::IncompleteData(format!("no such key `{field}`"))
        }),
        Value::Null => Err(EvalError::IncompleteData(format!(
            "cannot access `{field}` on null"
        ))),
        other => Err(EvalError::type_mismatch(
            format!("member access `.{field}`"),
            "map",
            type_name(other),
        )),
    }
}

fn indexed(object: &Value, index: &Value) -> Result<Value, EvalError> {
    match (object, index) {
        (Value::Array(items), Value::Number(n)) => {
            let idx = n
                .as_u64()
                .ok_or_else(|| EvalError::type_mismatch("index", "non-negative integer", "number"))?
                as usize;
            items
                .get(idx)
                .cloned()
                .ok_or(EvalError::IndexOutOfRange {
                    index: idx,
                    len: items.len(),
                })
        }
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().ok_or_else(|| {
            EvalError::IncompleteData(format!("no such key `{key}`"))
        }),
        (Value::Null, _) => Err(EvalError::IncompleteData(
            "cannot index into null".to_string(),
        )),
        (other, _) => Err(EvalError::type_mismatch(
            "index",
            "list or map",
            type_name(other),
        )),
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                let negated = i
                    .checked_neg()
                    .ok_or_else(|| EvalError::ArithmeticOverflow("-".to_string()))?;
                Ok(Value::Number(Number::from(negated)))
            } else if let Some(f) = n.as_f64() {
                number_from_f64(-f, "-")
            } else {
                Err(EvalError::ArithmeticOverflow("-".to_string()))
            }
        }
        (UnaryOp::Not, other) => Err(EvalError::type_mismatch("!", "bool", type_name(&other))),
        (UnaryOp::Neg, other) => Err(EvalError::type_mismatch("-", "number", type_name(&other))),
    }
}

fn add(lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (lhs @ Value::Number(_), rhs @ Value::Number(_)) => {
            arithmetic(BinaryOp::Add, lhs, rhs)
        }
        (lhs, rhs) => Err(EvalError::type_mismatch(
            "+",
            "two numbers, strings, or lists",
            format!("{} and {}", type_name(&lhs), type_name(&rhs)),
        )),
    }
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    let (Value::Number(a), Value::Number(b)) = (&lhs, &rhs) else {
        return Err(EvalError::type_mismatch(
            op.to_string(),
            "numbers",
            format!("{} and {}", type_name(&lhs), type_name(&rhs)),
        ));
    };

    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                a.checked_div(b)
            }
            BinaryOp::Mod => {
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                a.checked_rem(b)
            }
            _ => unreachable!("not an arithmetic operator"),
        };
        let result = result.ok_or_else(|| EvalError::ArithmeticOverflow(op.to_string()))?;
        return Ok(Value::Number(Number::from(result)));
    }

    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                a.checked_div(b)
            }
            BinaryOp::Mod => {
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                a.checked_rem(b)
            }
            _ => unreachable!("not an arithmetic operator"),
        };
        let result = result.ok_or_else(|| EvalError::ArithmeticOverflow(op.to_string()))?;
        return Ok(Value::Number(Number::from(result)));
    }

    let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
        return Err(EvalError::ArithmeticOverflow(op.to_string()));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::Mod => {
            return Err(EvalError::type_mismatch("%", "integers", "doubles"));
        }
        _ => unreachable!("not an arithmetic operator"),
    };
    number_from_f64(result, &op.to_string())
}

fn compare(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    accept: impl Fn(Ordering) -> bool,
) -> Result<Value, EvalError> {
    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => num_cmp(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match ordering {
        Some(ordering) => Ok(Value::Bool(accept(ordering))),
        None => Err(EvalError::type_mismatch(
            op.to_string(),
            "two numbers or two strings",
            format!("{} and {}", type_name(lhs), type_name(rhs)),
        )),
    }
}

fn contains(needle: &Value, haystack: &Value) -> Result<Value, EvalError> {
    match haystack {
        Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| value_eq(item, needle)))),
        Value::Object(map) => match needle {
            Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
            other => Err(EvalError::type_mismatch(
                "in",
                "string key",
                type_name(other),
            )),
        },
        other => Err(EvalError::type_mismatch(
            "in",
            "list or map",
            type_name(other),
        )),
    }
}

fn builtin_size(args: &[Value]) -> Result<Value, EvalError> {
    let [value] = args else {
        return Err(EvalError::InvalidArgument {
            function: "size".to_string(),
            message: format!("expected 1 argument, got {}", args.len()),
        });
    };
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(EvalError::type_mismatch(
                "size",
                "string, list, or map",
                type_name(other),
            ));
        }
    };
    Ok(Value::Number(Number::from(len as u64)))
}

fn builtin_matches(args: &[Value]) -> Result<Value, EvalError> {
    let [subject, pattern] = args else {
        return Err(EvalError::InvalidArgument {
            function: "matches".to_string(),
            message: format!("expected 2 arguments, got {}", args.len()),
        });
    };
    let (Value::String(subject), Value::String(pattern)) = (subject, pattern) else {
        return Err(EvalError::type_mismatch(
            "matches",
            "string subject and string pattern",
            format!("{} and {}", type_name(subject), type_name(pattern)),
        ));
    };
    let re = regex::Regex::new(pattern).map_err(|e| EvalError::InvalidArgument {
        function: "matches".to_string(),
        message: e.to_string(),
    })?;
    Ok(Value::Bool(re.is_match(subject)))
}

fn builtin_string(args: &[Value]) -> Result<Value, EvalError> {
    let [value] = args else {
        return Err(EvalError::InvalidArgument {
            function: "string".to_string(),
            message: format!("expected 1 argument, got {}", args.len()),
        });
    };
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => {
            return Err(EvalError::type_mismatch(
                "string",
                "string, number, or bool",
                type_name(other),
            ));
        }
    };
    Ok(Value::String(s))
}

fn builtin_int(args: &[Value]) -> Result<Value, EvalError> {
    let [value] = args else {
        return Err(EvalError::InvalidArgument {
            function: "int".to_string(),
            message: format!("expected 1 argument, got {}", args.len()),
        });
    };
    let n = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(f) = n.as_f64() {
                f as i64
            } else {
                return Err(EvalError::ArithmeticOverflow("int".to_string()));
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|e| EvalError::InvalidArgument {
            function: "int".to_string(),
            message: e.to_string(),
        })?,
        other => {
            return Err(EvalError::type_mismatch(
                "int",
                "number or string",
                type_name(other),
            ));
        }
    };
    Ok(Value::Number(Number::from(n)))
}

fn builtin_double(args: &[Value]) -> Result<Value, EvalError> {
    let [value] = args else {
        return Err(EvalError::InvalidArgument {
            function: "double".to_string(),
            message: format!("expected 1 argument, got {}", args.len()),
        });
    };
    let f = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EvalError::ArithmeticOverflow("double".to_string()))?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|e| EvalError::InvalidArgument {
            function: "double".to_string(),
            message: e.to_string(),
        })?,
        other => {
            return Err(EvalError::type_mismatch(
                "double",
                "number or string",
                type_name(other),
            ));
        }
    };
    number_from_f64(f, "double")
}

fn builtin_bool(args: &[Value]) -> Result<Value, EvalError> {
    let [value] = args else {
        return Err(EvalError::InvalidArgument {
            function: "bool".to_string(),
            message: format!("expected 1 argument, got {}", args.len()),
        });
    };
    let b = match value {
        Value::Bool(b) => *b,
        Value::String(s) => match s.as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(EvalError::InvalidArgument {
                    function: "bool".to_string(),
                    message: format!("`{other}` is neither `true` nor `false`"),
                });
            }
        },
        other => {
            return Err(EvalError::type_mismatch(
                "bool",
                "bool or string",
                type_name(other),
            ));
        }
    };
    Ok(Value::Bool(b))
}

/// Numeric equality is by value, so `1`, `1u`, and `1.0` compare equal.
pub(crate) fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => num_cmp(a, b) == Some(Ordering::Equal),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| value_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| value_eq(v, other)))
        }
        _ => a == b,
    }
}

fn num_cmp(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    let (a, b) = (a.as_f64()?, b.as_f64()?);
    a.partial_cmp(&b)
}

fn number_from_f64(f: f64, context: &str) -> Result<Value, EvalError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| EvalError::ArithmeticOverflow(context.to_string()))
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
