//! State-machine lexer with regex rules per state.
//!
//! A definition is a map from state name to an ordered rule list. Rules may
//! push or pop lexer states, and patterns may interpolate `\N` back-references
//! against the capture groups of the rule that pushed the current state. Rule
//! names starting with a lowercase letter are consumed without being emitted.
//!
//! The definition is serde-compatible with the JSON form
//! `{"Root":[["Name","pattern","action?"],…]}` where an action is one of
//! `{"type":"push","state":…}`, `{"type":"pop"}`, `{"type":"return"}`,
//! `{"type":"include","state":…}`.

use std::collections::HashMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Lexer, LexerDef, Symbols};
use crate::error::{BuildError, LexerError};
use crate::token::{Position, Token, TokenKind};

/// The state name every definition must start in.
pub const ROOT: &str = "Root";

/// What a rule does to the state stack after matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Enter `state`, remembering this rule's capture groups.
    Push { state: String },
    /// Leave the current state.
    Pop,
    /// Leave the current state, back to whichever state pushed it.
    Return,
    /// Splice `state`'s rules in place of this rule. Resolved when the
    /// definition is built; never present at lex time.
    Include { state: String },
}

impl Action {
    pub fn push(state: impl Into<String>) -> Self {
        Self::Push {
            state: state.into(),
        }
    }

    pub fn include(state: impl Into<String>) -> Self {
        Self::Include {
            state: state.into(),
        }
    }
}

/// One lexer rule: a name, an anchored regex pattern, an optional action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub pattern: String,
    pub action: Option<Action>,
}

impl Rule {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            action: None,
        }
    }

    pub fn with_action(name: impl Into<String>, pattern: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            action: Some(action),
        }
    }
}

// The wire form of a rule is a 2- or 3-element array, not an object.
impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.action.is_some() { 3 } else { 2 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.name)?;
        seq.serialize_element(&self.pattern)?;
        if let Some(action) = &self.action {
            seq.serialize_element(action)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuleVisitor;

        impl<'de> Visitor<'de> for RuleVisitor {
            type Value = Rule;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [name, pattern, action?] array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Rule, A::Error> {
                let name: String = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let pattern: String = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
                let action: Option<Action> = seq.next_element()?;
                Ok(Rule {
                    name,
                    pattern,
                    action,
                })
            }
        }

        deserializer.deserialize_seq(RuleVisitor)
    }
}

/// Ordered state map, the serializable grammar of a stateful lexer.
pub type Rules = IndexMap<String, Vec<Rule>>;

#[derive(Debug)]
struct CompiledRule {
    name: String,
    pattern: String,
    action: Option<Action>,
    kind: TokenKind,
    elided: bool,
    has_backref: bool,
    /// Present for patterns without back-references; those compile once.
    regex: Option<Regex>,
}

/// A compiled stateful lexer definition. Immutable and shareable.
#[derive(Debug)]
pub struct StatefulDef {
    states: IndexMap<String, Vec<CompiledRule>>,
    symbols: Symbols,
    match_longest: bool,
}

impl StatefulDef {
    /// Validates and compiles `rules`.
    ///
    /// Splices `Include` actions, verifies state references, pre-compiles
    /// patterns without back-references, and assigns token kinds to rule
    /// names in declaration order.
    pub fn new(rules: Rules) -> Result<Self, BuildError> {
        if !rules.contains_key(ROOT) {
            return Err(BuildError::MissingRootState);
        }

        let mut symbols = Symbols::new();
        let mut next_kind: TokenKind = 1;
        let mut states = IndexMap::new();

        for (state, _) in &rules {
            let mut seen = IndexSet::new();
            seen.insert(state.clone());
            let flat = splice(&rules, state, &mut seen)?;

            let mut compiled = Vec::with_capacity(flat.len());
            for rule in flat {
                if let Some(Action::Push { state: target }) = &rule.action {
                    if !rules.contains_key(target) {
                        return Err(BuildError::UnknownState {
                            state: target.clone(),
                        });
                    }
                }

                let kind = match symbols.kind(&rule.name) {
                    Some(kind) => kind,
                    None => {
                        let kind = next_kind;
                        next_kind += 1;
                        symbols.insert(rule.name.clone(), kind);
                        kind
                    }
                };

                let has_backref = pattern_has_backref(&rule.pattern);
                let regex = if has_backref {
                    None
                } else {
                    Some(compile(&rule.pattern).map_err(|message| {
                        BuildError::InvalidPattern {
                            rule: rule.name.clone(),
                            message,
                        }
                    })?)
                };

                let elided = rule
                    .name
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_lowercase());

                compiled.push(CompiledRule {
                    name: rule.name,
                    pattern: rule.pattern,
                    action: rule.action,
                    kind,
                    elided,
                    has_backref,
                    regex,
                });
            }
            states.insert(state.clone(), compiled);
        }

        Ok(Self {
            states,
            symbols,
            match_longest: false,
        })
    }

    /// Evaluate every rule of a state and keep the longest match instead of
    /// the first one. Ties go to the earlier rule.
    pub fn match_longest(mut self) -> Self {
        self.match_longest = true;
        self
    }
}

/// Resolves `Include` actions into a flat rule list.
fn splice(rules: &Rules, state: &str, seen: &mut IndexSet<String>) -> Result<Vec<Rule>, BuildError> {
    let list = rules.get(state).ok_or_else(|| BuildError::UnknownState {
        state: state.to_string(),
    })?;

    let mut out = Vec::with_capacity(list.len());
    for rule in list {
        if let Some(Action::Include { state: target }) = &rule.action {
            if !seen.insert(target.clone()) {
                return Err(BuildError::RecursiveInclude {
                    state: target.clone(),
                });
            }
            out.extend(splice(rules, target, seen)?);
            seen.swap_remove(target);
        } else {
            out.push(rule.clone());
        }
    }
    Ok(out)
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|e| e.to_string())
}

/// True if the pattern contains a `\N` back-reference.
fn pattern_has_backref(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(d) if d.is_ascii_digit() => return true,
                _ => {}
            }
        }
    }
    false
}

/// Replaces `\N` with the regex-quoted text of the N-th parent capture group.
fn interpolate(pattern: &str, groups: &[String]) -> Result<String, usize> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(d) if d.is_ascii_digit() => {
                let index = d.to_digit(10).unwrap() as usize;
                chars.next();
                let text = groups.get(index).ok_or(index)?;
                out.push_str(&regex_syntax::escape(text));
            }
            _ => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
        }
    }
    Ok(out)
}

impl LexerDef for StatefulDef {
    fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    fn lexer<'i>(
        &'i self,
        filename: &str,
        input: &'i str,
    ) -> Result<Box<dyn Lexer + 'i>, LexerError> {
        Ok(Box::new(StatefulLexer {
            def: self,
            input,
            pos: Position::start(filename),
            stack: vec![Frame {
                state: self.states.get_index_of(ROOT).expect("Root checked at build"),
                groups: Vec::new(),
            }],
            cache: HashMap::new(),
        }))
    }
}

struct Frame {
    /// Index into `StatefulDef::states`.
    state: usize,
    /// Capture groups of the rule that pushed this frame; back-reference
    /// interpolation source for the frame's rules.
    groups: Vec<String>,
}

/// A running stateful lexer. One per parse; holds the state stack and the
/// cache of regexes materialized from back-references.
pub struct StatefulLexer<'d, 'i> {
    def: &'d StatefulDef,
    input: &'i str,
    pos: Position,
    stack: Vec<Frame>,
    cache: HashMap<String, Regex>,
}

impl StatefulLexer<'_, '_> {
    fn state_name(&self) -> &str {
        let frame = self.stack.last().expect("stack is never empty");
        self.def
            .states
            .get_index(frame.state)
            .map(|(name, _)| name.as_str())
            .unwrap_or(ROOT)
    }

    /// Attempts `rule` at the current position. Returns the match length and
    /// capture groups (index 0 is the whole match).
    fn try_match(
        &mut self,
        state: usize,
        index: usize,
        rest: &str,
    ) -> Result<Option<(usize, Vec<String>)>, LexerError> {
        let def = self.def;
        let rule = &def.states[state][index];
        let regex = if let Some(regex) = &rule.regex {
            regex
        } else {
            let parent_groups = &self.stack.last().expect("stack is never empty").groups;
            let pattern = interpolate(&rule.pattern, parent_groups).map_err(|index| {
                LexerError::Backref {
                    pos: self.pos.clone(),
                    rule: rule.name.clone(),
                    index,
                }
            })?;
            if !self.cache.contains_key(&pattern) {
                let compiled = compile(&pattern).map_err(|message| LexerError::Pattern {
                    pos: self.pos.clone(),
                    rule: rule.name.clone(),
                    message,
                })?;
                self.cache.insert(pattern.clone(), compiled);
            }
            &self.cache[&pattern]
        };

        Ok(regex.captures(rest).map(|caps| {
            let whole = caps.get(0).expect("group 0 always present");
            let groups = caps
                .iter()
                .map(|g| g.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();
            (whole.len(), groups)
        }))
    }
}

impl Lexer for StatefulLexer<'_, '_> {
    fn next_token(&mut self) -> Result<Token, LexerError> {
        loop {
            let def = self.def;
            if self.pos.offset >= self.input.len() {
                return Ok(Token::eof(self.pos.clone()));
            }
            let rest = &self.input[self.pos.offset..];
            let state = self.stack.last().expect("stack is never empty").state;
            let rule_count = def.states[state].len();

            let mut winner: Option<(usize, usize, Vec<String>)> = None;
            for index in 0..rule_count {
                if let Some((len, groups)) = self.try_match(state, index, rest)? {
                    let better = match &winner {
                        Some((_, best, _)) => len > *best,
                        None => true,
                    };
                    if better {
                        winner = Some((index, len, groups));
                    }
                    if !self.def.match_longest {
                        break;
                    }
                }
            }

            let Some((index, len, groups)) = winner else {
                let fragment: String = rest.chars().take(12).collect();
                return Err(LexerError::NoMatch {
                    pos: self.pos.clone(),
                    state: self.state_name().to_string(),
                    fragment,
                });
            };

            let rule = &def.states[state][index];
            if len == 0 && rule.action.is_none() {
                return Err(LexerError::ZeroWidthMatch {
                    pos: self.pos.clone(),
                    rule: rule.name.clone(),
                });
            }

            match &rule.action {
                Some(Action::Push { state: target }) => {
                    let target = def
                        .states
                        .get_index_of(target.as_str())
                        .expect("push target checked at build");
                    self.stack.push(Frame {
                        state: target,
                        groups,
                    });
                }
                Some(Action::Pop) | Some(Action::Return) => {
                    if self.stack.len() <= 1 {
                        return Err(LexerError::PopOnRoot {
                            pos: self.pos.clone(),
                            rule: rule.name.clone(),
                        });
                    }
                    self.stack.pop();
                }
                Some(Action::Include { .. }) => unreachable!("includes spliced at build"),
                None => {}
            }

            let text = &rest[..len];
            let start = self.pos.clone();
            self.pos.advance(text);

            let (kind, name_elided) = (rule.kind, rule.elided);
            if name_elided {
                continue;
            }
            return Ok(Token::new(kind, text, start));
        }
    }
}
