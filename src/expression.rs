//! Restricted condition expressions
//!
//! A small, closed expression language evaluated against the pipeline
//! variables. It exists so branch conditions can be written the way pipeline
//! authors expect (`len(ocr_result) > 0 and retries < 3`) without handing them
//! a general interpreter.
//!
//! # Grammar
//!
//! ```text
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := not_expr ("and" not_expr)*
//! not_expr   := "not" not_expr | comparison
//! comparison := additive (cmp_op additive)*          chained like a < b < c
//! cmp_op     := == | != | <= | >= | < | > | in | not in
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "//" | "/" | "%") unary)*
//! unary      := ("-" | "+") unary | postfix
//! postfix    := primary ("[" or_expr "]")*
//! primary    := number | string | list | "(" or_expr ")" | call | name
//! call       := builtin "(" (or_expr ("," or_expr)*)? ")"
//! ```
//!
//! Names resolve only to variables. The only callable names are the
//! built-ins `len`, `str`, `int`, `float`, `bool`, `any` and `all`. There is
//! no attribute access and no way to reach anything outside the variable map.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, satisfy},
    combinator::{all_consuming, map, map_res, not, recognize, value, verify},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};
use thiserror::Error;

/// Errors raised while parsing or evaluating an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("cannot parse expression '{expression}': {reason}")]
    Syntax { expression: String, reason: String },

    #[error("name '{0}' is not defined")]
    UnknownName(String),

    #[error("'{0}' is not an allowed function")]
    UnknownFunction(String),

    #[error("{func}() takes exactly one argument ({given} given)")]
    Arity { func: Builtin, given: usize },

    #[error("type error: {0}")]
    Type(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,
}

type EvalResult<T> = std::result::Result<T, ExpressionError>;

/// Functions callable from an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Bool,
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Name(String),
    Call(String, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

const RESERVED: [&str; 4] = ["and", "or", "not", "in"];

// =============================================================================
// Parsing
// =============================================================================

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A keyword that is not the prefix of a longer identifier.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(kw), not(satisfy(is_ident_char)))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Expr> {
    alt((
        map_res(recognize(tuple((digit1, char('.'), digit0))), |s: &str| {
            s.parse::<f64>().map(|f| Expr::Literal(Value::from(f)))
        }),
        map_res(digit1, |s: &str| {
            s.parse::<i64>().map(|n| Expr::Literal(Value::from(n)))
        }),
    ))(input)
}

fn string_literal(input: &str) -> IResult<&str, Expr> {
    map(
        alt((
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        )),
        |s: &str| Expr::Literal(Value::String(s.to_string())),
    )(input)
}

fn list_literal(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), or_expr),
            ws(char(']')),
        ),
        Expr::List,
    )(input)
}

fn parenthesized(input: &str) -> IResult<&str, Expr> {
    delimited(ws(char('(')), or_expr, ws(char(')')))(input)
}

fn call(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = identifier(input)?;
    let (rest, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), or_expr),
        ws(char(')')),
    )(rest)?;
    Ok((rest, Expr::Call(name.to_string(), args)))
}

fn name_or_constant(input: &str) -> IResult<&str, Expr> {
    map(
        verify(identifier, |s: &str| !RESERVED.contains(&s)),
        |s: &str| match s {
            "True" | "true" => Expr::Literal(Value::Bool(true)),
            "False" | "false" => Expr::Literal(Value::Bool(false)),
            "None" | "null" => Expr::Literal(Value::Null),
            _ => Expr::Name(s.to_string()),
        },
    )(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        number,
        string_literal,
        list_literal,
        parenthesized,
        call,
        name_or_constant,
    )))(input)
}

fn postfix(input: &str) -> IResult<&str, Expr> {
    let (rest, base) = primary(input)?;
    let (rest, indices) = many0(delimited(ws(char('[')), or_expr, ws(char(']'))))(rest)?;
    let expr = indices
        .into_iter()
        .fold(base, |acc, idx| Expr::Index(Box::new(acc), Box::new(idx)));
    Ok((rest, expr))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| {
            Expr::Unary(UnaryOp::Neg, Box::new(e))
        }),
        map(preceded(ws(char('+')), unary), |e| {
            Expr::Unary(UnaryOp::Pos, Box::new(e))
        }),
        postfix,
    ))(input)
}

fn fold_binary(first: Expr, tail: Vec<(BinaryOp, Expr)>) -> Expr {
    tail.into_iter().fold(first, |acc, (op, rhs)| {
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    })
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (rest, first) = unary(input)?;
    let (rest, tail) = many0(pair(
        ws(alt((
            value(BinaryOp::FloorDiv, tag("//")),
            value(BinaryOp::Mul, tag("*")),
            value(BinaryOp::Div, tag("/")),
            value(BinaryOp::Mod, tag("%")),
        ))),
        unary,
    ))(rest)?;
    Ok((rest, fold_binary(first, tail)))
}

fn additive(input: &str) -> IResult<&str, Expr> {
    let (rest, first) = term(input)?;
    let (rest, tail) = many0(pair(
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        ))),
        term,
    ))(rest)?;
    Ok((rest, fold_binary(first, tail)))
}

fn cmp_op(input: &str) -> IResult<&str, CmpOp> {
    ws(alt((
        value(CmpOp::Eq, tag("==")),
        value(CmpOp::Ne, tag("!=")),
        value(CmpOp::Le, tag("<=")),
        value(CmpOp::Ge, tag(">=")),
        value(CmpOp::Lt, tag("<")),
        value(CmpOp::Gt, tag(">")),
        value(CmpOp::NotIn, pair(keyword("not"), ws(keyword("in")))),
        value(CmpOp::In, keyword("in")),
    )))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (rest, first) = additive(input)?;
    let (rest, chain) = many0(pair(cmp_op, additive))(rest)?;
    if chain.is_empty() {
        Ok((rest, first))
    } else {
        Ok((rest, Expr::Compare(Box::new(first), chain)))
    }
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(keyword("not")), not_expr), |e| {
            Expr::Unary(UnaryOp::Not, Box::new(e))
        }),
        comparison,
    ))(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (rest, first) = not_expr(input)?;
    let (rest, tail) = many0(preceded(ws(keyword("and")), not_expr))(rest)?;
    let expr = tail
        .into_iter()
        .fold(first, |acc, e| Expr::And(Box::new(acc), Box::new(e)));
    Ok((rest, expr))
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (rest, first) = and_expr(input)?;
    let (rest, tail) = many0(preceded(ws(keyword("or")), and_expr))(rest)?;
    let expr = tail
        .into_iter()
        .fold(first, |acc, e| Expr::Or(Box::new(acc), Box::new(e)));
    Ok((rest, expr))
}

// =============================================================================
// Values
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            Value::Number(n) => n.as_i64().map(Self::Int).or_else(|| n.as_f64().map(Self::Float)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::Int(i) => i == 0,
            Self::Float(f) => f == 0.0,
        }
    }

    fn into_value(self) -> EvalResult<Value> {
        match self {
            Self::Int(i) => Ok(Value::from(i)),
            Self::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| ExpressionError::Type(format!("{f} is not a finite number"))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Truthiness: empty containers, zero, `None` and `False` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => match (left, right) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
            }
            _ => left == right,
        },
    }
}

fn ordering(left: &Value, right: &Value) -> EvalResult<Option<Ordering>> {
    match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(Some(a.cmp(&b))),
        (Some(a), Some(b)) => Ok(a.as_f64().partial_cmp(&b.as_f64())),
        _ => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
            _ => Err(ExpressionError::Type(format!(
                "ordering not supported between '{}' and '{}'",
                type_name(left),
                type_name(right)
            ))),
        },
    }
}

fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match (container, item) {
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::String(_), other) => Err(ExpressionError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            type_name(other)
        ))),
        (Value::Array(items), _) => Ok(items.iter().any(|v| values_equal(v, item))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        (Value::Object(_), _) => Ok(false),
        (other, _) => Err(ExpressionError::Type(format!(
            "argument of type '{}' is not iterable",
            type_name(other)
        ))),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> EvalResult<bool> {
    let ord = |wanted: fn(Ordering) -> bool| -> EvalResult<bool> {
        Ok(ordering(left, right)?.is_some_and(wanted))
    };
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::Ne => Ok(!values_equal(left, right)),
        CmpOp::Lt => ord(Ordering::is_lt),
        CmpOp::Le => ord(Ordering::is_le),
        CmpOp::Gt => ord(Ordering::is_gt),
        CmpOp::Ge => ord(Ordering::is_ge),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
    }
}

fn floor_div(a: i64, b: i64) -> EvalResult<i64> {
    let q = a.checked_div(b).ok_or(ExpressionError::Overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn modulo_int(a: i64, b: i64) -> EvalResult<i64> {
    let r = a.checked_rem(b).ok_or(ExpressionError::Overflow)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn modulo_float(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    if op == BinaryOp::Add {
        match (left, right) {
            (Value::String(a), Value::String(b)) => return Ok(Value::String(format!("{a}{b}"))),
            (Value::Array(a), Value::Array(b)) => {
                return Ok(Value::Array(a.iter().chain(b).cloned().collect()));
            }
            _ => {}
        }
    }

    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(ExpressionError::Type(format!(
            "unsupported operand types for {}: '{}' and '{}'",
            op.symbol(),
            type_name(left),
            type_name(right)
        )));
    };

    if matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod) && b.is_zero() {
        return Err(ExpressionError::DivisionByZero);
    }

    let result = match (op, a, b) {
        (BinaryOp::Add, Num::Int(x), Num::Int(y)) => {
            Num::Int(x.checked_add(y).ok_or(ExpressionError::Overflow)?)
        }
        (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => {
            Num::Int(x.checked_sub(y).ok_or(ExpressionError::Overflow)?)
        }
        (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => {
            Num::Int(x.checked_mul(y).ok_or(ExpressionError::Overflow)?)
        }
        (BinaryOp::FloorDiv, Num::Int(x), Num::Int(y)) => Num::Int(floor_div(x, y)?),
        (BinaryOp::Mod, Num::Int(x), Num::Int(y)) => Num::Int(modulo_int(x, y)?),
        (BinaryOp::Add, x, y) => Num::Float(x.as_f64() + y.as_f64()),
        (BinaryOp::Sub, x, y) => Num::Float(x.as_f64() - y.as_f64()),
        (BinaryOp::Mul, x, y) => Num::Float(x.as_f64() * y.as_f64()),
        (BinaryOp::Div, x, y) => Num::Float(x.as_f64() / y.as_f64()),
        (BinaryOp::FloorDiv, x, y) => Num::Float((x.as_f64() / y.as_f64()).floor()),
        (BinaryOp::Mod, x, y) => Num::Float(modulo_float(x.as_f64(), y.as_f64())),
    };
    result.into_value()
}

fn normalize_index(idx: &Value, len: usize) -> EvalResult<usize> {
    let Some(Num::Int(i)) = Num::of(idx).filter(|_| !idx.is_boolean()) else {
        return Err(ExpressionError::Type(format!(
            "indices must be integers, not {}",
            type_name(idx)
        )));
    };
    let len_i = len as i64;
    let pos = if i < 0 { i + len_i } else { i };
    if (0..len_i).contains(&pos) {
        Ok(pos as usize)
    } else {
        Err(ExpressionError::Index(format!("index {i} out of range")))
    }
}

fn index(target: &Value, idx: &Value) -> EvalResult<Value> {
    match target {
        Value::Array(items) => Ok(items[normalize_index(idx, items.len())?].clone()),
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::String(
                chars[normalize_index(idx, chars.len())?].to_string(),
            ))
        }
        Value::Object(map) => match idx {
            Value::String(key) => map
                .get(key)
                .cloned()
                .ok_or_else(|| ExpressionError::Index(format!("key '{key}' not found"))),
            other => Err(ExpressionError::Type(format!(
                "dict keys must be strings, not {}",
                type_name(other)
            ))),
        },
        other => Err(ExpressionError::Type(format!(
            "'{}' object is not subscriptable",
            type_name(other)
        ))),
    }
}

fn elements(func: Builtin, value: &Value) -> EvalResult<Vec<bool>> {
    match value {
        Value::Array(items) => Ok(items.iter().map(truthy).collect()),
        Value::String(s) => Ok(s.chars().map(|_| true).collect()),
        Value::Object(map) => Ok(map.keys().map(|k| !k.is_empty()).collect()),
        other => Err(ExpressionError::Type(format!(
            "{func}() argument of type '{}' is not iterable",
            type_name(other)
        ))),
    }
}

fn call_builtin(func: Builtin, args: &[Value]) -> EvalResult<Value> {
    let [arg] = args else {
        return Err(ExpressionError::Arity {
            func,
            given: args.len(),
        });
    };

    match func {
        Builtin::Len => match arg {
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Array(a) => Ok(Value::from(a.len())),
            Value::Object(o) => Ok(Value::from(o.len())),
            other => Err(ExpressionError::Type(format!(
                "object of type '{}' has no len()",
                type_name(other)
            ))),
        },
        Builtin::Str => Ok(Value::String(to_text(arg))),
        Builtin::Int => match (arg, Num::of(arg)) {
            (_, Some(Num::Int(i))) => Ok(Value::from(i)),
            (_, Some(Num::Float(f))) if f.is_finite() => Ok(Value::from(f.trunc() as i64)),
            (Value::String(s), _) => s.trim().parse::<i64>().map(Value::from).map_err(|_| {
                ExpressionError::Type(format!("invalid literal for int(): '{s}'"))
            }),
            (other, _) => Err(ExpressionError::Type(format!(
                "int() argument must be a string or a number, not '{}'",
                type_name(other)
            ))),
        },
        Builtin::Float => match (arg, Num::of(arg)) {
            (_, Some(n)) => Num::Float(n.as_f64()).into_value(),
            (Value::String(s), _) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| {
                    ExpressionError::Type(format!("could not convert string to float: '{s}'"))
                })
                .and_then(|f| Num::Float(f).into_value()),
            (other, _) => Err(ExpressionError::Type(format!(
                "float() argument must be a string or a number, not '{}'",
                type_name(other)
            ))),
        },
        Builtin::Bool => Ok(Value::Bool(truthy(arg))),
        Builtin::Any => Ok(Value::Bool(elements(func, arg)?.into_iter().any(|b| b))),
        Builtin::All => Ok(Value::Bool(elements(func, arg)?.into_iter().all(|b| b))),
    }
}

fn eval(expr: &Expr, vars: &HashMap<String, Value>) -> EvalResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::List(items) => items
            .iter()
            .map(|e| eval(e, vars))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        Expr::Name(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownName(name.clone())),
        Expr::Call(name, args) => {
            let func = Builtin::from_str(name)
                .map_err(|_| ExpressionError::UnknownFunction(name.clone()))?;
            let args = args
                .iter()
                .map(|e| eval(e, vars))
                .collect::<EvalResult<Vec<_>>>()?;
            call_builtin(func, &args)
        }
        Expr::Index(target, idx) => index(&eval(target, vars)?, &eval(idx, vars)?),
        Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!truthy(&eval(inner, vars)?))),
        Expr::Unary(op, inner) => {
            let v = eval(inner, vars)?;
            match (op, Num::of(&v)) {
                (UnaryOp::Neg, Some(Num::Int(i))) => {
                    Ok(Value::from(i.checked_neg().ok_or(ExpressionError::Overflow)?))
                }
                (UnaryOp::Neg, Some(Num::Float(f))) => Num::Float(-f).into_value(),
                (_, Some(n)) => n.into_value(),
                (_, None) => Err(ExpressionError::Type(format!(
                    "bad operand type for unary operator: '{}'",
                    type_name(&v)
                ))),
            }
        }
        Expr::Binary(op, l, r) => arithmetic(*op, &eval(l, vars)?, &eval(r, vars)?),
        Expr::Compare(first, chain) => {
            let mut left = eval(first, vars)?;
            for (op, next) in chain {
                let right = eval(next, vars)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::And(l, r) => {
            let lv = eval(l, vars)?;
            if truthy(&lv) { eval(r, vars) } else { Ok(lv) }
        }
        Expr::Or(l, r) => {
            let lv = eval(l, vars)?;
            if truthy(&lv) { Ok(lv) } else { eval(r, vars) }
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        match all_consuming(delimited(multispace0, or_expr, multispace0))(source) {
            Ok((_, ast)) => Ok(Self {
                source: source.to_string(),
                ast,
            }),
            Err(e) => Err(ExpressionError::Syntax {
                expression: source.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to a value.
    pub fn evaluate(&self, vars: &HashMap<String, Value>) -> Result<Value, ExpressionError> {
        eval(&self.ast, vars)
    }

    /// Evaluate and apply truthiness.
    pub fn is_true(&self, vars: &HashMap<String, Value>) -> Result<bool, ExpressionError> {
        self.evaluate(vars).map(|v| truthy(&v))
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse and evaluate `source` as a condition in one step.
pub fn evaluate_condition(
    source: &str,
    vars: &HashMap<String, Value>,
) -> Result<bool, ExpressionError> {
    Expression::parse(source)?.is_true(vars)
}
