//! The XPath 1.0 core function library.
//!
//! Node-set: position, last, count, local-name, namespace-uri, name, id
//! (always an error here — DTDs are not processed). String: string, concat,
//! starts-with, contains, substring, substring-before, substring-after,
//! string-length, normalize-space, translate. Boolean: boolean, not, true,
//! false, lang. Number: number, sum, floor, ceiling, round.

use super::eval::{number_of, string_of, EvalContext};
use super::value::Value;
use crate::doc::{DocumentAccess, NodeId};
use crate::error::EvalError;

pub fn call<D: DocumentAccess>(
    name: &str,
    args: Vec<Value>,
    ctx: &EvalContext<'_, D>,
) -> Result<Value, EvalError> {
    match name {
        "position" => {
            expect_args("position", &args, 0, 0)?;
            Ok(Value::Number(ctx.position as f64))
        }
        "last" => {
            expect_args("last", &args, 0, 0)?;
            Ok(Value::Number(ctx.size as f64))
        }
        "count" => {
            expect_args("count", &args, 1, 1)?;
            match &args[0] {
                Value::NodeSet(nodes) => Ok(Value::Number(nodes.len() as f64)),
                other => Err(EvalError::NotANodeSet(other.kind_name())),
            }
        }
        "local-name" => named_node_property(&args, ctx, "local-name", |doc, n| {
            doc.local_name(n).unwrap_or("").to_string()
        }),
        "namespace-uri" => named_node_property(&args, ctx, "namespace-uri", |doc, n| {
            doc.namespace_uri(n).map(|c| c.into_owned()).unwrap_or_default()
        }),
        "name" => named_node_property(&args, ctx, "name", |doc, n| {
            doc.name(n).unwrap_or("").to_string()
        }),
        "id" => Err(EvalError::IdDisabled),

        "string" => {
            expect_args("string", &args, 0, 1)?;
            Ok(Value::String(match args.first() {
                Some(v) => string_of(ctx.doc, v),
                None => ctx.doc.string_value(ctx.node),
            }))
        }
        "concat" => {
            if args.len() < 2 {
                return Err(EvalError::Signature {
                    function: "concat",
                    reason: "requires at least 2 arguments",
                });
            }
            Ok(Value::String(
                args.iter().map(|a| string_of(ctx.doc, a)).collect(),
            ))
        }
        "starts-with" => {
            expect_args("starts-with", &args, 2, 2)?;
            let s = string_of(ctx.doc, &args[0]);
            let prefix = string_of(ctx.doc, &args[1]);
            Ok(Value::Boolean(s.starts_with(&prefix)))
        }
        "contains" => {
            expect_args("contains", &args, 2, 2)?;
            let s = string_of(ctx.doc, &args[0]);
            let needle = string_of(ctx.doc, &args[1]);
            Ok(Value::Boolean(s.contains(&needle)))
        }
        "substring" => {
            expect_args("substring", &args, 2, 3)?;
            let s = string_of(ctx.doc, &args[0]);
            let start = xpath_round(number_of(ctx.doc, &args[1]));
            let end = match args.get(2) {
                Some(len) => start + xpath_round(number_of(ctx.doc, len)),
                None => f64::INFINITY,
            };
            // 1-based character positions; NaN comparisons reject everything.
            let out: String = s
                .chars()
                .enumerate()
                .filter(|(i, _)| {
                    let p = (*i + 1) as f64;
                    p >= start && p < end
                })
                .map(|(_, c)| c)
                .collect();
            Ok(Value::String(out))
        }
        "substring-before" => {
            expect_args("substring-before", &args, 2, 2)?;
            let s = string_of(ctx.doc, &args[0]);
            let pat = string_of(ctx.doc, &args[1]);
            Ok(Value::String(
                s.find(&pat).map(|p| s[..p].to_string()).unwrap_or_default(),
            ))
        }
        "substring-after" => {
            expect_args("substring-after", &args, 2, 2)?;
            let s = string_of(ctx.doc, &args[0]);
            let pat = string_of(ctx.doc, &args[1]);
            Ok(Value::String(
                s.find(&pat)
                    .map(|p| s[p + pat.len()..].to_string())
                    .unwrap_or_default(),
            ))
        }
        "string-length" => {
            expect_args("string-length", &args, 0, 1)?;
            let s = match args.first() {
                Some(v) => string_of(ctx.doc, v),
                None => ctx.doc.string_value(ctx.node),
            };
            Ok(Value::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            expect_args("normalize-space", &args, 0, 1)?;
            let s = match args.first() {
                Some(v) => string_of(ctx.doc, v),
                None => ctx.doc.string_value(ctx.node),
            };
            let normalized = s
                .split(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            Ok(Value::String(normalized))
        }
        "translate" => {
            expect_args("translate", &args, 3, 3)?;
            let s = string_of(ctx.doc, &args[0]);
            let from: Vec<char> = string_of(ctx.doc, &args[1]).chars().collect();
            let to: Vec<char> = string_of(ctx.doc, &args[2]).chars().collect();
            let out: String = s
                .chars()
                .filter_map(|c| match from.iter().position(|&f| f == c) {
                    Some(i) => to.get(i).copied(),
                    None => Some(c),
                })
                .collect();
            Ok(Value::String(out))
        }

        "boolean" => {
            expect_args("boolean", &args, 1, 1)?;
            Ok(Value::Boolean(args[0].boolean()))
        }
        "not" => {
            expect_args("not", &args, 1, 1)?;
            Ok(Value::Boolean(!args[0].boolean()))
        }
        "true" => {
            expect_args("true", &args, 0, 0)?;
            Ok(Value::Boolean(true))
        }
        "false" => {
            expect_args("false", &args, 0, 0)?;
            Ok(Value::Boolean(false))
        }
        "lang" => {
            expect_args("lang", &args, 1, 1)?;
            let target = string_of(ctx.doc, &args[0]).to_ascii_lowercase();
            Ok(Value::Boolean(lang_matches(ctx.doc, ctx.node, &target)))
        }

        "number" => {
            expect_args("number", &args, 0, 1)?;
            Ok(Value::Number(match args.first() {
                Some(v) => number_of(ctx.doc, v),
                None => Value::parse_number(&ctx.doc.string_value(ctx.node)),
            }))
        }
        "sum" => {
            expect_args("sum", &args, 1, 1)?;
            match &args[0] {
                Value::NodeSet(nodes) => {
                    let total: f64 = nodes
                        .iter()
                        .map(|&n| Value::parse_number(&ctx.doc.string_value(n)))
                        .sum();
                    Ok(Value::Number(total))
                }
                other => Err(EvalError::NotANodeSet(other.kind_name())),
            }
        }
        "floor" => {
            expect_args("floor", &args, 1, 1)?;
            Ok(Value::Number(number_of(ctx.doc, &args[0]).floor()))
        }
        "ceiling" => {
            expect_args("ceiling", &args, 1, 1)?;
            Ok(Value::Number(number_of(ctx.doc, &args[0]).ceil()))
        }
        "round" => {
            expect_args("round", &args, 1, 1)?;
            Ok(Value::Number(xpath_round(number_of(ctx.doc, &args[0]))))
        }

        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn expect_args(
    function: &'static str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        Err(EvalError::Signature {
            function,
            reason: if min == max {
                "wrong number of arguments"
            } else {
                "wrong number of arguments for this form"
            },
        })
    } else {
        Ok(())
    }
}

/// Shared shape of local-name() / namespace-uri() / name(): optional node-set
/// argument, defaulting to the context node; empty node-set gives "".
fn named_node_property<D: DocumentAccess>(
    args: &[Value],
    ctx: &EvalContext<'_, D>,
    function: &'static str,
    get: impl Fn(&D, NodeId) -> String,
) -> Result<Value, EvalError> {
    expect_args(function, args, 0, 1)?;
    let node = match args.first() {
        None => Some(ctx.node),
        Some(Value::NodeSet(nodes)) => nodes.first().copied(),
        Some(other) => return Err(EvalError::NotANodeSet(other.kind_name())),
    };
    Ok(Value::String(
        node.map(|n| get(ctx.doc, n)).unwrap_or_default(),
    ))
}

/// `round()` per XPath: ties go toward positive infinity.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

/// Walk ancestor-or-self looking for `xml:lang`; exact case-insensitive match
/// or a hyphenated subtag prefix ("en" matches "en-US").
fn lang_matches<D: DocumentAccess>(doc: &D, start: NodeId, target: &str) -> bool {
    let mut node = Some(start);
    while let Some(n) = node {
        if let Some(lang) = doc.attribute(n, "xml:lang") {
            let lang = lang.to_ascii_lowercase();
            return lang == target
                || (lang.starts_with(target) && lang.as_bytes().get(target.len()) == Some(&b'-'));
        }
        node = doc.parent(n);
    }
    false
}
