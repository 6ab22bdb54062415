//! Recursive evaluation of the grammar graph.
//!
//! Every node parses to `Ok(Some(values))` on a match, `Ok(None)` on a miss
//! (no tokens consumed, no effects kept), or `Err` on a hard error. Branch
//! attempts use checkpoint/truncate so failed alternatives leave no trace on
//! the effect stream.

use unicase::UniCase;

use indexmap::IndexSet;

use crate::compile::lookahead::{Decision, TokenMatcher};
use crate::error::ParseError;
use crate::grammar::GroupMode;
use crate::graph::{Grammar, Node, NodeId, RecordNode};
use crate::printer::describe;
use crate::recover::{Outcome, Recover};
use crate::token::{Token, TokenKind};

use super::context::Context;
use super::effects::{EffectOp, Emit};

pub(crate) fn parse_node(
    grammar: &Grammar,
    id: NodeId,
    ctx: &mut Context<'_>,
) -> Result<Option<Vec<Emit>>, ParseError> {
    match grammar.node(id) {
        Node::Placeholder => unreachable!("placeholder in a finished grammar"),
        Node::Record(record) => parse_record(grammar, record, ctx),
        Node::Variant {
            construct, inner, ..
        } => {
            let at = ctx.lex.peek().pos.clone();
            match parse_node(grammar, *inner, ctx)? {
                None => Ok(None),
                Some(mut values) => {
                    let src = match values.pop() {
                        Some(Emit::Slot(src)) if values.is_empty() => src,
                        _ => {
                            return Err(ParseError::Conversion {
                                pos: at,
                                message: "variant did not produce a single value".to_string(),
                            });
                        }
                    };
                    let slot = ctx.fresh_slot();
                    ctx.effects.push(EffectOp::Wrap {
                        id: slot,
                        src,
                        construct: *construct,
                        at,
                    });
                    Ok(Some(vec![Emit::Slot(slot)]))
                }
            }
        }
        Node::Disjunction { alts, table } => {
            if let Some(table) = table {
                return match decide(table, ctx) {
                    None => Ok(None),
                    Some(index) => parse_node(grammar, alts[index], ctx),
                };
            }
            for alt in alts {
                let branch = ctx.branch();
                match parse_node(grammar, *alt, ctx) {
                    Ok(Some(values)) => return Ok(Some(values)),
                    Ok(None) => ctx.discard(branch),
                    Err(error) => {
                        // A branch that got past the lookahead budget was the
                        // intended one; its error is final.
                        if ctx.consumed_since(&branch) > ctx.config.lookahead {
                            return Err(error);
                        }
                        ctx.discard(branch);
                    }
                }
            }
            Ok(None)
        }
        Node::Sequence { items } => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                match parse_node(grammar, *item, ctx)? {
                    Some(values) => out.extend(values),
                    None if i == 0 => return Ok(None),
                    None => {
                        let expected = describe(grammar, *item);
                        return Err(ctx.unexpected(expected));
                    }
                }
            }
            Ok(Some(out))
        }
        Node::Capture { field, inner } => {
            let at = ctx.lex.peek().pos.clone();
            match parse_node(grammar, *inner, ctx)? {
                None => Ok(None),
                Some(values) => {
                    if !values.is_empty() {
                        ctx.effects.push(EffectOp::Set {
                            apply: field.apply,
                            values,
                            at,
                        });
                    }
                    Ok(Some(Vec::new()))
                }
            }
        }
        Node::Reference { kind, .. } => {
            let token = ctx.lex.peek();
            if token.kind == *kind {
                let token = ctx.lex.next_token();
                Ok(Some(vec![Emit::Token(token)]))
            } else {
                Ok(None)
            }
        }
        Node::Literal {
            text, kind, raw, ..
        } => {
            let token = if *raw {
                ctx.lex.peek_raw()
            } else {
                ctx.lex.peek()
            };
            if token.is_eof() {
                return Ok(None);
            }
            let kind_ok = kind.is_none_or(|k| token.kind == k);
            let fold = ctx.config.case_insensitive.contains(&token.kind);
            if kind_ok && text_eq(text, &token.value, fold) {
                let token = if *raw {
                    ctx.lex.next_raw()
                } else {
                    ctx.lex.next_token()
                };
                Ok(Some(vec![Emit::Token(token)]))
            } else {
                Ok(None)
            }
        }
        Node::Group { inner, mode, table } => match mode {
            GroupMode::Once => parse_node(grammar, *inner, ctx),
            GroupMode::NonEmpty => {
                let before = ctx.lex.cursor();
                match parse_node(grammar, *inner, ctx)? {
                    None => Ok(None),
                    Some(values) => {
                        if ctx.lex.cursor() == before {
                            let expected = format!("non-empty {}", describe(grammar, *inner));
                            return Err(ctx.unexpected(expected));
                        }
                        Ok(Some(values))
                    }
                }
            }
            GroupMode::ZeroOrOne => {
                if let Some(table) = table {
                    if decide(table, ctx).is_none() {
                        return Ok(Some(Vec::new()));
                    }
                }
                let branch = ctx.branch();
                match parse_node(grammar, *inner, ctx) {
                    Ok(Some(values)) => Ok(Some(values)),
                    Ok(None) => {
                        ctx.discard(branch);
                        Ok(Some(Vec::new()))
                    }
                    Err(error) => {
                        if ctx.consumed_since(&branch) > ctx.config.lookahead {
                            return Err(error);
                        }
                        ctx.discard(branch);
                        Ok(Some(Vec::new()))
                    }
                }
            }
            GroupMode::ZeroOrMore => {
                let mut out = Vec::new();
                repeat(grammar, *inner, table.as_ref(), ctx, &mut out)?;
                Ok(Some(out))
            }
            GroupMode::OneOrMore => {
                let mut out = match parse_node(grammar, *inner, ctx)? {
                    None => return Ok(None),
                    Some(values) => values,
                };
                repeat(grammar, *inner, table.as_ref(), ctx, &mut out)?;
                Ok(Some(out))
            }
        },
        Node::Negation { inner } => {
            if ctx.lex.peek().is_eof() {
                return Ok(None);
            }
            let branch = ctx.branch();
            ctx.enter_probe();
            let probed = parse_node(grammar, *inner, ctx);
            ctx.leave_probe();
            ctx.discard(branch);
            match probed {
                Ok(Some(_)) => Ok(None),
                _ => {
                    let token = ctx.lex.next_token();
                    Ok(Some(vec![Emit::Token(token)]))
                }
            }
        }
        Node::Lookahead { positive, inner } => {
            let branch = ctx.branch();
            ctx.enter_probe();
            let probed = parse_node(grammar, *inner, ctx);
            ctx.leave_probe();
            ctx.discard(branch);
            let matched = matches!(probed, Ok(Some(_)));
            if matched == *positive {
                Ok(Some(Vec::new()))
            } else {
                Ok(None)
            }
        }
        Node::Range { lo, hi } => {
            let token = ctx.lex.peek();
            if !token.is_eof()
                && lo.as_str() <= token.value.as_str()
                && token.value.as_str() <= hi.as_str()
            {
                let token = ctx.lex.next_token();
                Ok(Some(vec![Emit::Token(token)]))
            } else {
                Ok(None)
            }
        }
        Node::Custom { parse, .. } => {
            let branch = ctx.branch();
            match (parse.as_ref())(&mut ctx.lex) {
                Ok(Some(value)) => {
                    let slot = ctx.fresh_slot();
                    ctx.effects.push(EffectOp::Ready { id: slot, value });
                    Ok(Some(vec![Emit::Slot(slot)]))
                }
                Ok(None) | Err(ParseError::NoMatch) => {
                    ctx.discard(branch);
                    Ok(None)
                }
                Err(error) => {
                    ctx.note_error(&error);
                    Err(error)
                }
            }
        }
    }
}

/// Greedy repetition tail: appends matches of `inner` until it misses, makes
/// no progress, or the enter-table rules it out.
fn repeat(
    grammar: &Grammar,
    inner: NodeId,
    table: Option<&Decision>,
    ctx: &mut Context<'_>,
    out: &mut Vec<Emit>,
) -> Result<(), ParseError> {
    loop {
        if let Some(table) = table {
            if decide(table, ctx).is_none() {
                return Ok(());
            }
        }
        let branch = ctx.branch();
        match parse_node(grammar, inner, ctx) {
            Ok(Some(values)) => {
                // A zero-consumption iteration would repeat forever.
                if ctx.lex.cursor() == branch.cursor.0 {
                    ctx.discard(branch);
                    return Ok(());
                }
                out.extend(values);
            }
            Ok(None) => {
                ctx.discard(branch);
                return Ok(());
            }
            Err(error) => {
                if ctx.consumed_since(&branch) > ctx.config.lookahead {
                    return Err(error);
                }
                ctx.discard(branch);
                return Ok(());
            }
        }
    }
}

fn parse_record(
    grammar: &Grammar,
    record: &RecordNode,
    ctx: &mut Context<'_>,
) -> Result<Option<Vec<Emit>>, ParseError> {
    let start = ctx.lex.peek().pos.clone();
    let outer = ctx.branch();
    ctx.effects.push(EffectOp::Begin { make: record.make });
    if let Some(apply) = record.pos {
        ctx.effects.push(EffectOp::Set {
            apply,
            values: Vec::new(),
            at: start.clone(),
        });
    }
    let body_mark = ctx.effects.len();

    let mut attempts = 0usize;
    let mut accumulated = false;
    let mut last_cursor = ctx.lex.cursor();
    loop {
        match parse_node(grammar, record.expr, ctx) {
            Ok(Some(_)) => break,
            Ok(None) => {
                if attempts == 0 {
                    ctx.discard(outer);
                    return Ok(None);
                }
                // A retried body that misses ends the episode with whatever
                // fields were applied before the failure.
                break;
            }
            Err(error) => {
                if matches!(error, ParseError::Recovery { .. }) {
                    return Err(error);
                }
                let strategy = match &ctx.config.recovery {
                    Some(strategy) if !ctx.in_probe() => strategy.clone(),
                    _ => return Err(error),
                };
                let mut recover = Recover {
                    lex: &mut ctx.lex,
                    attempts,
                };
                let outcome = strategy.recover(&mut recover, &error);
                // Only resumptions count towards the accumulator; a failed
                // strategy propagates the error itself.
                if !matches!(outcome, Outcome::Failed) && !accumulated {
                    accumulated = true;
                    ctx.recovered.push(error.clone());
                    if ctx.recovered.len() >= ctx.config.max_errors {
                        let errors = std::mem::take(&mut ctx.recovered);
                        return Err(ParseError::Recovery { errors });
                    }
                }
                match outcome {
                    Outcome::Recovered => break,
                    Outcome::Retry => {
                        attempts += 1;
                        let cursor = ctx.lex.cursor();
                        if cursor == last_cursor {
                            return Err(error);
                        }
                        last_cursor = cursor;
                        ctx.effects.truncate(body_mark);
                    }
                    Outcome::Failed => return Err(error),
                }
            }
        }
    }

    if let Some(apply) = record.end_pos {
        let end = ctx.lex.peek().pos.clone();
        ctx.effects.push(EffectOp::Set {
            apply,
            values: Vec::new(),
            at: end,
        });
    }
    let slot = ctx.fresh_slot();
    ctx.effects.push(EffectOp::End { id: slot });
    Ok(Some(vec![Emit::Slot(slot)]))
}

/// Applies a decision table at the current cursor.
fn decide(table: &Decision, ctx: &Context<'_>) -> Option<usize> {
    'entry: for (matchers, index) in &table.entries {
        for (i, matcher) in matchers.iter().enumerate() {
            if !matcher_matches(matcher, ctx.lex.peek_n(i), &ctx.config.case_insensitive) {
                continue 'entry;
            }
        }
        return Some(*index);
    }
    None
}

fn matcher_matches(
    matcher: &TokenMatcher,
    token: &Token,
    case_insensitive: &IndexSet<TokenKind>,
) -> bool {
    if token.is_eof() {
        return false;
    }
    match matcher {
        TokenMatcher::Kind(kind) => token.kind == *kind,
        TokenMatcher::Text { text, kind } => {
            kind.is_none_or(|k| token.kind == k)
                && text_eq(text, &token.value, case_insensitive.contains(&token.kind))
        }
        TokenMatcher::Range { lo, hi } => {
            lo.as_str() <= token.value.as_str() && token.value.as_str() <= hi.as_str()
        }
    }
}

fn text_eq(a: &str, b: &str, fold: bool) -> bool {
    if fold {
        UniCase::new(a) == UniCase::new(b)
    } else {
        a == b
    }
}
