//! The stack-machine evaluator.
//!
//! Steps run per seed node: axis traversal, node test, predicates with a
//! (position, size) scoped to that seed's candidate list in axis order. The
//! per-seed results are then merged, deduplicated by node identity, and
//! sorted into document order before the next op sees them.

use super::axes;
use super::compiler::{self, CompiledExpr, CompiledStep, Op, Predicate};
use super::functions;
use super::parser::{Axis, BinaryOp};
use super::value::Value;
use crate::doc::{DocumentAccess, NodeId, NodeKind};
use crate::error::EvalError;
use std::collections::HashSet;

pub struct EvalContext<'a, D: DocumentAccess> {
    pub doc: &'a D,
    pub node: NodeId,
    pub position: usize,
    pub size: usize,
}

/// Evaluate `xpath` with the document root as the context node.
pub fn evaluate<D: DocumentAccess>(doc: &D, xpath: &str) -> Result<Value, EvalError> {
    let compiled = compiler::compile(xpath)?;
    let ctx = EvalContext {
        doc,
        node: doc.document(),
        position: 1,
        size: 1,
    };
    eval_compiled(&compiled, &ctx)
}

/// Evaluate `xpath` relative to an arbitrary context node.
pub fn evaluate_from<D: DocumentAccess>(
    doc: &D,
    node: NodeId,
    xpath: &str,
) -> Result<Value, EvalError> {
    let compiled = compiler::compile(xpath)?;
    let ctx = EvalContext {
        doc,
        node,
        position: 1,
        size: 1,
    };
    eval_compiled(&compiled, &ctx)
}

pub(crate) fn eval_compiled<D: DocumentAccess>(
    expr: &CompiledExpr,
    ctx: &EvalContext<'_, D>,
) -> Result<Value, EvalError> {
    let mut stack: Vec<Value> = Vec::with_capacity(4);

    for op in &expr.ops {
        match op {
            Op::Root => stack.push(Value::NodeSet(vec![ctx.doc.document()])),
            Op::Context => stack.push(Value::NodeSet(vec![ctx.node])),

            Op::Step(step) => {
                let v = stack.pop().unwrap_or_else(Value::empty_nodeset);
                let nodes = match v {
                    Value::NodeSet(n) => n,
                    other => return Err(EvalError::NotANodeSet(other.kind_name())),
                };
                stack.push(eval_step(ctx.doc, &nodes, step)?);
            }

            Op::Filter(pred) => {
                let v = stack.pop().unwrap_or_else(Value::empty_nodeset);
                let nodes = match v {
                    Value::NodeSet(n) => n,
                    other => return Err(EvalError::NotANodeSet(other.kind_name())),
                };
                let kept = filter_by_expr(ctx.doc, &nodes, pred)?;
                stack.push(Value::NodeSet(kept));
            }

            Op::Union => {
                let right = stack.pop().unwrap_or_else(Value::empty_nodeset);
                let left = stack.pop().unwrap_or_else(Value::empty_nodeset);
                match (left, right) {
                    (Value::NodeSet(l), Value::NodeSet(r)) => {
                        let mut seen: HashSet<NodeId> = l.iter().copied().collect();
                        let mut merged = l;
                        for n in r {
                            if seen.insert(n) {
                                merged.push(n);
                            }
                        }
                        merged.sort_by(|&a, &b| ctx.doc.document_order(a, b));
                        stack.push(Value::NodeSet(merged));
                    }
                    (l, r) => {
                        let offender = if l.is_nodeset() { r } else { l };
                        return Err(EvalError::NotANodeSet(offender.kind_name()));
                    }
                }
            }

            Op::Number(n) => stack.push(Value::Number(*n)),
            Op::Literal(s) => stack.push(Value::String(s.clone())),
            Op::Variable(name) => return Err(EvalError::Variable(name.clone())),

            Op::Negate => {
                let v = stack.pop().unwrap_or(Value::Number(f64::NAN));
                stack.push(Value::Number(-number_of(ctx.doc, &v)));
            }

            Op::Binary(op) => {
                let right = stack.pop().unwrap_or_else(Value::empty_nodeset);
                let left = stack.pop().unwrap_or_else(Value::empty_nodeset);
                stack.push(apply_binary(ctx.doc, *op, &left, &right));
            }

            Op::Call(name, argc) => {
                let split = stack.len().saturating_sub(*argc);
                let args = stack.split_off(split);
                let result = functions::call(name, args, ctx)?;
                stack.push(result);
            }
        }
    }

    Ok(stack.pop().unwrap_or_else(Value::empty_nodeset))
}

fn eval_step<D: DocumentAccess>(
    doc: &D,
    seeds: &[NodeId],
    step: &CompiledStep,
) -> Result<Value, EvalError> {
    let principal = if step.axis == Axis::Attribute {
        NodeKind::Attribute
    } else {
        NodeKind::Element
    };

    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut merged: Vec<NodeId> = Vec::new();
    for &seed in seeds {
        let mut candidates: Vec<NodeId> = axes::axis_nodes(doc, seed, step.axis)
            .into_iter()
            .filter(|&n| axes::test_matches(doc, n, &step.test, principal))
            .collect();
        for pred in &step.predicates {
            candidates = apply_predicate(doc, candidates, pred)?;
            if candidates.is_empty() {
                break;
            }
        }
        for n in candidates {
            if seen.insert(n) {
                merged.push(n);
            }
        }
    }
    merged.sort_by(|&a, &b| doc.document_order(a, b));
    Ok(Value::NodeSet(merged))
}

fn apply_predicate<D: DocumentAccess>(
    doc: &D,
    candidates: Vec<NodeId>,
    pred: &Predicate,
) -> Result<Vec<NodeId>, EvalError> {
    match pred {
        Predicate::Position(k) => Ok(candidates
            .get(*k - 1)
            .map(|&n| vec![n])
            .unwrap_or_default()),
        Predicate::AttrEq(name, value) => Ok(candidates
            .into_iter()
            .filter(|&n| doc.attribute(n, name).as_deref() == Some(value.as_str()))
            .collect()),
        Predicate::Expr(expr) => filter_by_expr(doc, &candidates, expr),
    }
}

/// The general predicate: each candidate evaluates the inner expression with
/// position/size scoped to this candidate list; a numeric result selects by
/// position, anything else converts to boolean.
fn filter_by_expr<D: DocumentAccess>(
    doc: &D,
    candidates: &[NodeId],
    expr: &CompiledExpr,
) -> Result<Vec<NodeId>, EvalError> {
    let size = candidates.len();
    let mut kept = Vec::new();
    for (i, &n) in candidates.iter().enumerate() {
        let ctx = EvalContext {
            doc,
            node: n,
            position: i + 1,
            size,
        };
        let v = eval_compiled(expr, &ctx)?;
        let keep = match v {
            Value::Number(num) => (i + 1) as f64 == num,
            other => other.boolean(),
        };
        if keep {
            kept.push(n);
        }
    }
    Ok(kept)
}

/// XPath string() of a value, resolving node-sets through the document.
pub(crate) fn string_of<D: DocumentAccess>(doc: &D, v: &Value) -> String {
    match v {
        Value::NodeSet(nodes) => nodes
            .first()
            .map(|&n| doc.string_value(n))
            .unwrap_or_default(),
        Value::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Number(n) => Value::format_number(*n),
        Value::String(s) => s.clone(),
    }
}

/// XPath number() of a value, resolving node-sets through the document.
pub(crate) fn number_of<D: DocumentAccess>(doc: &D, v: &Value) -> f64 {
    match v {
        Value::NodeSet(_) => Value::parse_number(&string_of(doc, v)),
        Value::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => *n,
        Value::String(s) => Value::parse_number(s),
    }
}

fn apply_binary<D: DocumentAccess>(doc: &D, op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Or => Value::Boolean(l.boolean() || r.boolean()),
        BinaryOp::And => Value::Boolean(l.boolean() && r.boolean()),
        BinaryOp::Eq => Value::Boolean(compare_eq(doc, l, r, false)),
        BinaryOp::Ne => Value::Boolean(compare_eq(doc, l, r, true)),
        BinaryOp::Lt => Value::Boolean(compare_rel(doc, l, r, |a, b| a < b)),
        BinaryOp::Le => Value::Boolean(compare_rel(doc, l, r, |a, b| a <= b)),
        BinaryOp::Gt => Value::Boolean(compare_rel(doc, l, r, |a, b| a > b)),
        BinaryOp::Ge => Value::Boolean(compare_rel(doc, l, r, |a, b| a >= b)),
        BinaryOp::Add => Value::Number(number_of(doc, l) + number_of(doc, r)),
        BinaryOp::Sub => Value::Number(number_of(doc, l) - number_of(doc, r)),
        BinaryOp::Mul => Value::Number(number_of(doc, l) * number_of(doc, r)),
        BinaryOp::Div => Value::Number(number_of(doc, l) / number_of(doc, r)),
        BinaryOp::Mod => Value::Number(number_of(doc, l) % number_of(doc, r)),
    }
}

/// `=` / `!=` per XPath 1.0 §3.4. Node-set comparisons are existential.
fn compare_eq<D: DocumentAccess>(doc: &D, l: &Value, r: &Value, negate: bool) -> bool {
    let eq = |a: &str, b: &str| if negate { a != b } else { a == b };
    match (l, r) {
        (Value::NodeSet(ln), Value::NodeSet(rn)) => {
            let rvals: Vec<String> = rn.iter().map(|&n| doc.string_value(n)).collect();
            ln.iter().any(|&a| {
                let av = doc.string_value(a);
                rvals.iter().any(|bv| eq(&av, bv))
            })
        }
        (Value::NodeSet(nodes), Value::Number(num))
        | (Value::Number(num), Value::NodeSet(nodes)) => nodes.iter().any(|&n| {
            let nv = Value::parse_number(&doc.string_value(n));
            if negate {
                nv != *num
            } else {
                nv == *num
            }
        }),
        (Value::NodeSet(nodes), Value::String(s))
        | (Value::String(s), Value::NodeSet(nodes)) => {
            nodes.iter().any(|&n| eq(&doc.string_value(n), s))
        }
        (Value::NodeSet(_), Value::Boolean(b)) | (Value::Boolean(b), Value::NodeSet(_)) => {
            let ls = if l.is_nodeset() { l } else { r };
            let val = ls.boolean() == *b;
            if negate {
                !val
            } else {
                val
            }
        }
        _ => {
            // Neither is a node-set: booleans dominate, then numbers.
            let val = if matches!(l, Value::Boolean(_)) || matches!(r, Value::Boolean(_)) {
                l.boolean() == r.boolean()
            } else if matches!(l, Value::Number(_)) || matches!(r, Value::Number(_)) {
                number_of(doc, l) == number_of(doc, r)
            } else {
                string_of(doc, l) == string_of(doc, r)
            };
            if negate {
                !val
            } else {
                val
            }
        }
    }
}

/// `<` `<=` `>` `>=`: numeric comparison, existential over node-sets.
fn compare_rel<D: DocumentAccess>(
    doc: &D,
    l: &Value,
    r: &Value,
    cmp: fn(f64, f64) -> bool,
) -> bool {
    match (l, r) {
        (Value::NodeSet(ln), Value::NodeSet(rn)) => {
            let rvals: Vec<f64> = rn
                .iter()
                .map(|&n| Value::parse_number(&doc.string_value(n)))
                .collect();
            ln.iter().any(|&a| {
                let av = Value::parse_number(&doc.string_value(a));
                rvals.iter().any(|&bv| cmp(av, bv))
            })
        }
        (Value::NodeSet(nodes), other) => {
            let rv = number_of(doc, other);
            nodes
                .iter()
                .any(|&n| cmp(Value::parse_number(&doc.string_value(n)), rv))
        }
        (other, Value::NodeSet(nodes)) => {
            let lv = number_of(doc, other);
            nodes
                .iter()
                .any(|&n| cmp(lv, Value::parse_number(&doc.string_value(n))))
        }
        _ => cmp(number_of(doc, l), number_of(doc, r)),
    }
}
