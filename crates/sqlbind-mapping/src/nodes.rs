//! Dynamic SQL fragment trees.
//!
//! A statement's SQL is a tree of nodes applied against a
//! [`DynamicContext`]. Static text appends itself; conditional and
//! iteration nodes decide what their subtrees contribute. A tree with any
//! non-static node is "dynamic" and is re-evaluated per call; a fully
//! static tree is evaluated once at registration.

use sqlbind_types::Value;

use crate::context::DynamicContext;
use crate::error::BindingError;
use crate::expr::compile;

/// One node of a dynamic SQL tree.
#[derive(Debug, Clone)]
pub enum SqlNode {
    /// Plain SQL text.
    Static(String),
    /// SQL text containing `${…}` raw substitutions, resolved per call.
    Text(String),
    /// A sequence of child nodes.
    Mixed(Vec<SqlNode>),
    /// Contents apply only when `test` evaluates truthy.
    If {
        /// The guard expression.
        test: String,
        /// Subtree applied on a truthy guard.
        contents: Box<SqlNode>,
    },
    /// First truthy branch wins; `otherwise` applies when none does.
    Choose {
        /// Guarded branches, in order.
        whens: Vec<(String, SqlNode)>,
        /// Fallback branch.
        otherwise: Option<Box<SqlNode>>,
    },
    /// Wraps its contents with a prefix/suffix and strips unwanted
    /// leading/trailing fragments; contributes nothing when the contents
    /// come out empty.
    Trim {
        /// Subtree producing the body.
        contents: Box<SqlNode>,
        /// Prepended when the body is non-empty.
        prefix: Option<String>,
        /// Appended when the body is non-empty.
        suffix: Option<String>,
        /// Leading fragments removed from the body (first match wins).
        prefix_overrides: Vec<String>,
        /// Trailing fragments removed from the body (first match wins).
        suffix_overrides: Vec<String>,
    },
    /// `WHERE` clause: prefixes `WHERE`, strips a leading `AND`/`OR`.
    Where(Box<SqlNode>),
    /// `SET` clause: prefixes `SET`, strips a trailing comma.
    Set(Box<SqlNode>),
    /// Expands contents once per element of a bound collection.
    Foreach {
        /// Property path of the collection to iterate.
        collection: String,
        /// Per-element alias bound inside the subtree.
        item: Option<String>,
        /// Per-element index/key alias.
        index: Option<String>,
        /// Emitted before the first element.
        open: Option<String>,
        /// Emitted after the last element.
        close: Option<String>,
        /// Emitted between elements.
        separator: Option<String>,
        /// Subtree expanded per element.
        contents: Box<SqlNode>,
    },
    /// Binds `name` to the result of evaluating `value` for the rest of
    /// the evaluation.
    Bind {
        /// New binding name.
        name: String,
        /// Expression producing the bound value.
        value: String,
    },
}

impl SqlNode {
    /// Whether this tree needs per-call evaluation.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        match self {
            SqlNode::Static(_) => false,
            SqlNode::Mixed(children) => children.iter().any(SqlNode::is_dynamic),
            _ => true,
        }
    }

    /// Apply this node to the context, appending SQL text and bindings.
    ///
    /// Returns whether the node contributed (an `If` with a falsy guard
    /// did not; a `Choose` reports whether any branch fired).
    pub fn apply(&self, ctx: &mut DynamicContext) -> Result<bool, BindingError> {
        match self {
            SqlNode::Static(text) => {
                ctx.append_sql(text);
                Ok(true)
            }
            SqlNode::Text(text) => {
                let substituted = substitute(text, ctx)?;
                ctx.append_sql(&substituted);
                Ok(true)
            }
            SqlNode::Mixed(children) => {
                for child in children {
                    child.apply(ctx)?;
                }
                Ok(true)
            }
            SqlNode::If { test, contents } => {
                if compile(test)?.eval_bool(ctx)? {
                    contents.apply(ctx)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            SqlNode::Choose { whens, otherwise } => {
                for (test, branch) in whens {
                    if compile(test)?.eval_bool(ctx)? {
                        branch.apply(ctx)?;
                        return Ok(true);
                    }
                }
                if let Some(fallback) = otherwise {
                    fallback.apply(ctx)?;
                    return Ok(true);
                }
                Ok(false)
            }
            SqlNode::Trim {
                contents,
                prefix,
                suffix,
                prefix_overrides,
                suffix_overrides,
            } => apply_trim(
                ctx,
                contents,
                prefix.as_deref(),
                suffix.as_deref(),
                prefix_overrides,
                suffix_overrides,
            ),
            SqlNode::Where(contents) => apply_trim(
                ctx,
                contents,
                Some("WHERE"),
                None,
                &["AND ".to_string(), "OR ".to_string()],
                &[],
            ),
            SqlNode::Set(contents) => {
                apply_trim(ctx, contents, Some("SET"), None, &[], &[",".to_string()])
            }
            SqlNode::Foreach {
                collection,
                item,
                index,
                open,
                close,
                separator,
                contents,
            } => apply_foreach(
                ctx,
                collection,
                item.as_deref(),
                index.as_deref(),
                open.as_deref(),
                close.as_deref(),
                separator.as_deref(),
                contents,
            ),
            SqlNode::Bind { name, value } => {
                let bound = compile(value)?.eval(ctx)?;
                ctx.bind(name.clone(), bound);
                Ok(true)
            }
        }
    }
}

/// Resolve every `${…}` in `text` against the context.
fn substitute(text: &str, ctx: &DynamicContext) -> Result<String, BindingError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body_start = start + 2;
        let Some(len) = rest[body_start..].find('}') else {
            return Err(BindingError::UnknownProperty {
                property: rest[body_start..].to_string(),
            });
        };
        let property = rest[body_start..body_start + len].trim();
        let value = ctx
            .lookup(property)
            .ok_or_else(|| BindingError::UnknownProperty {
                property: property.to_string(),
            })?;
        out.push_str(&value.to_string());
        rest = &rest[body_start + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn apply_trim(
    ctx: &mut DynamicContext,
    contents: &SqlNode,
    prefix: Option<&str>,
    suffix: Option<&str>,
    prefix_overrides: &[String],
    suffix_overrides: &[String],
) -> Result<bool, BindingError> {
    let start = ctx.sql_len();
    let applied = contents.apply(ctx)?;
    let body = ctx.split_sql_at(start);
    let mut text = body.trim().to_string();
    if text.is_empty() {
        return Ok(applied);
    }
    for stripped in prefix_overrides {
        if text.len() >= stripped.len() && text[..stripped.len()].eq_ignore_ascii_case(stripped) {
            text = text[stripped.len()..].trim_start().to_string();
            break;
        }
    }
    for stripped in suffix_overrides {
        if text.len() >= stripped.len()
            && text[text.len() - stripped.len()..].eq_ignore_ascii_case(stripped)
        {
            text = text[..text.len() - stripped.len()].trim_end().to_string();
            break;
        }
    }
    if text.is_empty() {
        return Ok(applied);
    }
    let mut full = String::new();
    if let Some(prefix) = prefix {
        full.push_str(prefix);
        full.push(' ');
    }
    full.push_str(&text);
    if let Some(suffix) = suffix {
        full.push(' ');
        full.push_str(suffix);
    }
    ctx.append_sql(&full);
    Ok(applied)
}

#[allow(clippy::too_many_arguments)]
fn apply_foreach(
    ctx: &mut DynamicContext,
    collection: &str,
    item: Option<&str>,
    index: Option<&str>,
    open: Option<&str>,
    close: Option<&str>,
    separator: Option<&str>,
    contents: &SqlNode,
) -> Result<bool, BindingError> {
    let Some(value) = ctx.lookup(collection).cloned() else {
        return Err(BindingError::Expression {
            expression: collection.to_string(),
            message: "foreach collection is not bound".to_string(),
        });
    };
    let entries: Vec<(Value, Value)> = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Value::Int(i as i64), v))
            .collect(),
        Value::Map(map) => map
            .into_iter()
            .map(|(k, v)| (Value::Text(k), v))
            .collect(),
        other => {
            return Err(BindingError::Expression {
                expression: collection.to_string(),
                message: format!("foreach collection is {}, not iterable", other.type_name()),
            });
        }
    };
    if entries.is_empty() {
        return Ok(true);
    }

    if let Some(open) = open {
        ctx.append_sql(open);
    }
    for (i, (index_value, item_value)) in entries.into_iter().enumerate() {
        if i > 0 {
            if let Some(separator) = separator {
                ctx.append_sql(separator);
            }
        }
        // Bindings minted per iteration survive the evaluation so the
        // scanner can resolve the rewritten placeholders afterwards.
        let n = ctx.unique_number();
        let mut aliases = Vec::new();
        if let Some(item) = item {
            let minted = format!("__frch_{item}_{n}");
            ctx.bind(minted.clone(), item_value.clone());
            ctx.bind(item.to_string(), item_value.clone());
            aliases.push((item.to_string(), minted));
        }
        if let Some(index) = index {
            let minted = format!("__frch_{index}_{n}");
            ctx.bind(minted.clone(), index_value.clone());
            ctx.bind(index.to_string(), index_value.clone());
            aliases.push((index.to_string(), minted));
        }
        let start = ctx.sql_len();
        contents.apply(ctx)?;
        let mut body = ctx.split_sql_at(start);
        for (alias, minted) in &aliases {
            body = rewrite_alias_refs(&body, alias, minted);
        }
        ctx.append_raw(&body);
    }
    if let Some(close) = close {
        ctx.append_sql(close);
    }
    Ok(true)
}

/// Rewrite `#{alias…}` placeholders to the minted per-iteration binding.
fn rewrite_alias_refs(text: &str, alias: &str, minted: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start + 2]);
        let body = &rest[start + 2..start + end];
        let (property, attrs) = match body.split_once(',') {
            Some((p, a)) => (p, Some(a)),
            None => (body, None),
        };
        let trimmed = property.trim();
        if trimmed == alias {
            out.push_str(minted);
        } else if let Some(tail) = trimmed.strip_prefix(alias).and_then(|t| t.strip_prefix('.')) {
            out.push_str(minted);
            out.push('.');
            out.push_str(tail);
        } else {
            out.push_str(property);
        }
        if let Some(attrs) = attrs {
            out.push(',');
            out.push_str(attrs);
        }
        out.push('}');
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    out
}
