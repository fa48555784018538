//! Compiles the AST into a flat op sequence for the stack evaluator, detects
//! fast-path predicate shapes, and caches compiled forms in a bounded LRU
//! keyed by the source string.

use super::parser::{self, Axis, BinaryOp, Expr, NodeTest, Step};
use crate::error::CompileError;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Compiled-expression cache shared by every evaluation in the process; the
/// only shared mutable state in the crate. Concurrent misses may each compile
/// and the last writer wins (compilation is deterministic).
static CACHE: Mutex<Option<LruCache<String, CompiledExpr>>> = Mutex::new(None);

const CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone)]
pub enum Op {
    /// Push the document root node.
    Root,
    /// Push the context node.
    Context,
    /// Pop a node-set, apply one location step per seed, push the merged
    /// document-ordered result.
    Step(CompiledStep),
    /// Pop a node-set, filter it with a predicate expression.
    Filter(CompiledExpr),
    /// Pop two node-sets, push their deduplicated union.
    Union,
    Number(f64),
    Literal(String),
    /// Pop `argc` arguments, call the named function.
    Call(String, usize),
    Binary(BinaryOp),
    Negate,
    /// Always an evaluation error; kept as an op so compilation succeeds.
    Variable(String),
}

#[derive(Debug, Clone)]
pub struct CompiledStep {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone)]
pub enum Predicate {
    /// `[N]` with a positive integer literal.
    Position(usize),
    /// `[@name = 'literal']` in either operand order.
    AttrEq(String, String),
    /// Anything else.
    Expr(CompiledExpr),
}

impl CompiledExpr {
    fn from_ast(expr: &Expr) -> CompiledExpr {
        let mut ops = Vec::new();
        compile_expr(expr, &mut ops);
        CompiledExpr { ops }
    }
}

fn compile_expr(expr: &Expr, ops: &mut Vec<Op>) {
    match expr {
        Expr::Root => ops.push(Op::Root),
        Expr::Number(n) => ops.push(Op::Number(*n)),
        Expr::Literal(s) => ops.push(Op::Literal(s.clone())),
        Expr::Variable(name) => ops.push(Op::Variable(name.clone())),
        Expr::Negate(inner) => {
            compile_expr(inner, ops);
            ops.push(Op::Negate);
        }
        Expr::Binary(l, op, r) => {
            compile_expr(l, ops);
            compile_expr(r, ops);
            ops.push(Op::Binary(*op));
        }
        Expr::Union(l, r) => {
            compile_expr(l, ops);
            compile_expr(r, ops);
            ops.push(Op::Union);
        }
        Expr::Path(base, step) => {
            compile_expr(base, ops);
            ops.push(Op::Step(compile_step(step)));
        }
        Expr::RelativeStep(step) => {
            ops.push(Op::Context);
            ops.push(Op::Step(compile_step(step)));
        }
        Expr::Filter(base, pred) => {
            compile_expr(base, ops);
            ops.push(Op::Filter(CompiledExpr::from_ast(pred)));
        }
        Expr::Function(name, args) => {
            for arg in args {
                compile_expr(arg, ops);
            }
            ops.push(Op::Call(name.clone(), args.len()));
        }
    }
}

fn compile_step(step: &Step) -> CompiledStep {
    CompiledStep {
        axis: step.axis,
        test: step.test.clone(),
        predicates: step.predicates.iter().map(compile_predicate).collect(),
    }
}

fn compile_predicate(pred: &Expr) -> Predicate {
    // [N]
    if let Expr::Number(n) = pred {
        if *n > 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 {
            return Predicate::Position(*n as usize);
        }
    }
    // [@name = 'literal'] / ['literal' = @name]
    if let Expr::Binary(l, BinaryOp::Eq, r) = pred {
        if let (Some(name), Some(value)) = (attr_name_of(l), literal_of(r)) {
            return Predicate::AttrEq(name, value);
        }
        if let (Some(value), Some(name)) = (literal_of(l), attr_name_of(r)) {
            return Predicate::AttrEq(name, value);
        }
    }
    Predicate::Expr(CompiledExpr::from_ast(pred))
}

fn attr_name_of(expr: &Expr) -> Option<String> {
    if let Expr::RelativeStep(step) = expr {
        if step.axis == Axis::Attribute && step.predicates.is_empty() {
            match &step.test {
                NodeTest::Name(n) => return Some(n.clone()),
                NodeTest::Prefixed(p, l) => return Some(format!("{p}:{l}")),
                _ => {}
            }
        }
    }
    None
}

fn literal_of(expr: &Expr) -> Option<String> {
    if let Expr::Literal(s) = expr {
        Some(s.clone())
    } else {
        None
    }
}

/// Compile through the shared LRU cache.
pub fn compile(xpath: &str) -> Result<CompiledExpr, CompileError> {
    {
        let mut guard = CACHE.lock().unwrap_or_else(|e| e.into_inner());
        let cache = guard.get_or_insert_with(|| {
            LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).expect("nonzero capacity"))
        });
        if let Some(hit) = cache.get(xpath) {
            return Ok(hit.clone());
        }
    }

    let ast = parser::parse(xpath)?;
    let compiled = CompiledExpr::from_ast(&ast);

    {
        let mut guard = CACHE.lock().unwrap_or_else(|e| e.into_inner());
        let cache = guard.get_or_insert_with(|| {
            LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).expect("nonzero capacity"))
        });
        cache.put(xpath.to_string(), compiled.clone());
    }
    Ok(compiled)
}

/// Compile without touching the cache.
pub fn compile_uncached(xpath: &str) -> Result<CompiledExpr, CompileError> {
    Ok(CompiledExpr::from_ast(&parser::parse(xpath)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_absolute_path() {
        let c = compile_uncached("/root").unwrap();
        assert!(matches!(c.ops[0], Op::Root));
        assert!(matches!(c.ops[1], Op::Step(_)));
    }

    #[test]
    fn position_fast_path() {
        let c = compile_uncached("a[3]").unwrap();
        let Op::Step(step) = &c.ops[1] else {
            panic!("expected step")
        };
        assert!(matches!(step.predicates[0], Predicate::Position(3)));
    }

    #[test]
    fn attr_equality_fast_path_both_orders() {
        for src in ["a[@id='x']", "a['x'=@id]", "a[@id=\"x\"]"] {
            let c = compile_uncached(src).unwrap();
            let Op::Step(step) = &c.ops[1] else {
                panic!("expected step")
            };
            assert!(
                matches!(&step.predicates[0], Predicate::AttrEq(n, v) if n == "id" && v == "x"),
                "no fast path for {src}"
            );
        }
    }

    #[test]
    fn general_predicate_is_not_fast_pathed() {
        let c = compile_uncached("a[position() = last()]").unwrap();
        let Op::Step(step) = &c.ops[1] else {
            panic!("expected step")
        };
        assert!(matches!(step.predicates[0], Predicate::Expr(_)));
        // Fractional and non-positive numbers take the general path too.
        let c = compile_uncached("a[1.5]").unwrap();
        let Op::Step(step) = &c.ops[1] else {
            panic!("expected step")
        };
        assert!(matches!(step.predicates[0], Predicate::Expr(_)));
    }

    #[test]
    fn cache_round_trip() {
        let a = compile("//cache-test-item").unwrap();
        let b = compile("//cache-test-item").unwrap();
        assert_eq!(a.ops.len(), b.ops.len());
    }

    #[test]
    fn compile_errors_surface() {
        assert!(compile("//[").is_err());
        assert!(compile_uncached("count(").is_err());
    }
}
