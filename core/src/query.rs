//! Boolean and phrase query evaluation over one or two index segments.
//!
//! A boolean query goes through three steps: lexing (operators kept,
//! words normalized with the indexing pipeline), infix -> postfix
//! conversion, and a stack evaluation that defers AND operands so a whole
//! conjunction can be intersected shortest-first.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{IrError, Result};
use crate::index::InvertedIndex;
use crate::postings::PostingsList;
use crate::tokenizer::{biword_key, Tokenizer};

lazy_static! {
    static ref QUERY_TOKEN: Regex = Regex::new(r"\(|\)|[^\s()]+").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    Term(String),
    And,
    Or,
    Not,
    Open,
    Close,
}

impl QueryToken {
    fn is_operator(&self) -> bool {
        matches!(self, QueryToken::And | QueryToken::Or | QueryToken::Not)
    }
}

/// Splits a boolean query on whitespace and parentheses. Operators match
/// case-insensitively; every other word goes through the indexing pipeline
/// whole, and words that normalize away (stop words) are dropped.
pub fn lex(query: &str, tokenizer: &Tokenizer) -> Vec<QueryToken> {
    QUERY_TOKEN
        .find_iter(query)
        .filter_map(|m| {
            let raw = m.as_str();
            match raw.to_ascii_uppercase().as_str() {
                "AND" => Some(QueryToken::And),
                "OR" => Some(QueryToken::Or),
                "NOT" => Some(QueryToken::Not),
                "(" => Some(QueryToken::Open),
                ")" => Some(QueryToken::Close),
                _ => tokenizer.query_term(raw).map(QueryToken::Term),
            }
        })
        .collect()
}

/// Shunting-yard conversion. AND and OR share precedence and associate
/// left; NOT is pushed without popping so it binds to the next operand.
pub fn to_postfix(tokens: Vec<QueryToken>) -> Result<Vec<QueryToken>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<QueryToken> = Vec::new();
    for token in tokens {
        match token {
            QueryToken::Term(_) => output.push(token),
            QueryToken::Not | QueryToken::Open => stack.push(token),
            QueryToken::And | QueryToken::Or => {
                while matches!(stack.last(), Some(top) if top.is_operator()) {
                    output.extend(stack.pop());
                }
                stack.push(token);
            }
            QueryToken::Close => loop {
                match stack.pop() {
                    Some(QueryToken::Open) => break,
                    Some(op) => output.push(op),
                    None => return Err(IrError::malformed("unmatched ')'")),
                }
            },
        }
    }
    while let Some(op) = stack.pop() {
        if op == QueryToken::Open {
            return Err(IrError::malformed("unmatched '('"));
        }
        output.push(op);
    }
    Ok(output)
}

/// Read view over the primary segment and the optional auxiliary one.
///
/// Every id in `auxiliary` is greater than every id in `primary`.
#[derive(Clone, Copy)]
pub struct SegmentView<'a> {
    pub primary: &'a InvertedIndex,
    pub auxiliary: Option<&'a InvertedIndex>,
}

impl<'a> SegmentView<'a> {
    pub fn new(primary: &'a InvertedIndex, auxiliary: Option<&'a InvertedIndex>) -> Self {
        Self { primary, auxiliary }
    }

    /// Postings for `term` across both segments; missing terms are empty.
    pub fn postings(&self, term: &str) -> PostingsList {
        let base = self.primary.get(term);
        let aux = self.auxiliary.and_then(|idx| idx.get(term));
        match (base, aux) {
            (Some(base), Some(aux)) => {
                let mut merged = base.clone();
                merged.merge(aux);
                merged
            }
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) => PostingsList::new(),
        }
    }
}

/// A value on the evaluation stack.
#[derive(Debug)]
enum Operand {
    Resolved(PostingsList),
    /// Conjunction whose intersection has not been computed yet.
    PendingAnd(Vec<PostingsList>),
}

impl Operand {
    fn resolve(self) -> PostingsList {
        match self {
            Operand::Resolved(plist) => plist,
            Operand::PendingAnd(group) => intersect_all(group),
        }
    }

    fn into_group(self) -> Vec<PostingsList> {
        match self {
            Operand::Resolved(plist) => vec![plist],
            Operand::PendingAnd(group) => group,
        }
    }
}

/// Intersects shortest-first so each step is bounded by the smallest list.
pub fn intersect_all(mut lists: Vec<PostingsList>) -> PostingsList {
    lists.sort_by_key(PostingsList::len);
    let mut iter = lists.into_iter();
    let Some(first) = iter.next() else {
        return PostingsList::new();
    };
    iter.fold(first, |acc, next| {
        if acc.is_empty() { acc } else { acc.intersection(&next) }
    })
}

/// Evaluates a postfix expression. `universe_size` bounds NOT.
pub fn evaluate(postfix: &[QueryToken], view: SegmentView<'_>, universe_size: usize) -> Result<PostingsList> {
    let mut stack: Vec<Operand> = Vec::new();
    let pop = |stack: &mut Vec<Operand>, op: &str| {
        stack.pop().ok_or_else(|| IrError::malformed(format!("{op} is missing an operand")))
    };
    for token in postfix {
        match token {
            QueryToken::Term(term) => stack.push(Operand::Resolved(view.postings(term))),
            QueryToken::And => {
                let right = pop(&mut stack, "AND")?;
                let left = pop(&mut stack, "AND")?;
                let mut group = left.into_group();
                group.extend(right.into_group());
                stack.push(Operand::PendingAnd(group));
            }
            QueryToken::Or => {
                let right = pop(&mut stack, "OR")?.resolve();
                let left = pop(&mut stack, "OR")?.resolve();
                stack.push(Operand::Resolved(left.union(&right)));
            }
            QueryToken::Not => {
                let operand = pop(&mut stack, "NOT")?.resolve();
                stack.push(Operand::Resolved(operand.negation(universe_size)));
            }
            QueryToken::Open | QueryToken::Close => {
                return Err(IrError::malformed("parenthesis in postfix expression"));
            }
        }
    }
    match (stack.pop(), stack.is_empty()) {
        (None, _) => Ok(PostingsList::new()),
        (Some(result), true) => Ok(result.resolve()),
        (Some(_), false) => Err(IrError::malformed("operands without an operator")),
    }
}

/// Lex, convert and evaluate in one go. Deleted ids are not filtered here.
pub fn boolean_query(query: &str, tokenizer: &Tokenizer, view: SegmentView<'_>, universe_size: usize) -> Result<PostingsList> {
    let postfix = to_postfix(lex(query, tokenizer))?;
    tracing::debug!(query, ?postfix, "evaluating boolean query");
    evaluate(&postfix, view, universe_size)
}

/// Documents containing every adjacent word pair of `phrase`.
///
/// `biwords` must be a view over the biword segments.
pub fn phrase_query(phrase: &str, tokenizer: &Tokenizer, biwords: SegmentView<'_>) -> PostingsList {
    let words = tokenizer.words(phrase);
    let lists: Vec<PostingsList> = words
        .windows(2)
        .map(|pair| biwords.postings(&biword_key(&pair[0], &pair[1])))
        .collect();
    match lists.len() {
        0 => PostingsList::new(),
        1 => lists.into_iter().next().unwrap_or_default(),
        _ => intersect_all(lists),
    }
}
