//! Deferred mutations recorded during a parse.
//!
//! Nodes never touch the output value directly; they append effect ops.
//! Branches remember the stream length and truncate back to it when they are
//! discarded, so a failed alternative leaves no trace. The stream is replayed
//! once, after the outermost commit, by [`materialize`].

use std::any::Any;
use std::collections::HashMap;

use crate::capture::{Value, Values};
use crate::error::ParseError;
use crate::production::{ApplyFn, ConstructFn, MakeFn};
use crate::token::{Position, Token};

/// Identifies one completed value within a single parse.
pub(crate) type SlotId = u32;

/// A value as recorded in the stream: a token, or a reference to a value
/// completed by an earlier op.
#[derive(Debug)]
pub(crate) enum Emit {
    Token(Token),
    Slot(SlotId),
}

pub(crate) enum EffectOp {
    /// Allocate a fresh record and make it the construction target.
    Begin { make: MakeFn },
    /// Apply captured values to a field of the innermost open record.
    Set {
        apply: ApplyFn,
        values: Vec<Emit>,
        at: Position,
    },
    /// Close the innermost open record, completing value `id`.
    End { id: SlotId },
    /// Rewrap a completed value (enum variant construction).
    Wrap {
        id: SlotId,
        src: SlotId,
        construct: ConstructFn,
        at: Position,
    },
    /// A value produced whole by a custom parser.
    Ready { id: SlotId, value: Box<dyn Any> },
}

/// Append-only op log with watermark truncation.
#[derive(Default)]
pub(crate) struct EffectStream {
    ops: Vec<EffectOp>,
}

impl EffectStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: EffectOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Drops everything a discarded branch recorded.
    pub fn truncate(&mut self, watermark: usize) {
        self.ops.truncate(watermark);
    }

    pub fn into_ops(self) -> Vec<EffectOp> {
        self.ops
    }
}

/// Replays the op stream, building the output value bottom-up.
///
/// With `root` set, returns that completed value. Without it (partial
/// materialization after a failure) unfinished records are closed as-is and
/// the outermost one is returned, so callers can inspect the fields populated
/// up to the failure point.
pub(crate) fn materialize(
    ops: Vec<EffectOp>,
    root: Option<SlotId>,
) -> Result<Option<Box<dyn Any>>, ParseError> {
    let mut stack: Vec<Box<dyn Any>> = Vec::new();
    let mut done: HashMap<SlotId, Box<dyn Any>> = HashMap::new();

    for op in ops {
        match op {
            EffectOp::Begin { make } => stack.push(make()),
            EffectOp::Set { apply, values, at } => {
                let mut resolved = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Emit::Token(token) => resolved.push(Value::Token(token)),
                        Emit::Slot(id) => match done.remove(&id) {
                            Some(node) => resolved.push(Value::Node(node)),
                            None => continue,
                        },
                    }
                }
                let Some(target) = stack.last_mut() else {
                    continue;
                };
                apply(target.as_mut(), &mut Values::new(resolved), &at)?;
            }
            EffectOp::End { id } => {
                if let Some(value) = stack.pop() {
                    done.insert(id, value);
                }
            }
            EffectOp::Wrap {
                id,
                src,
                construct,
                at,
            } => {
                if let Some(value) = done.remove(&src) {
                    done.insert(id, construct(value, &at)?);
                }
            }
            EffectOp::Ready { id, value } => {
                done.insert(id, value);
            }
        }
    }

    if let Some(id) = root {
        return Ok(done.remove(&id));
    }
    // Partial result: the outermost unfinished record, if any.
    Ok(stack.into_iter().next())
}
