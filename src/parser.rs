//! Filter expression parser using nom.
//!
//! The CLI `--where` flag and the browsing server's `?where=` parameter take
//! filters as text. Conditions are separated by commas and conjoined.
//!
//! ```text
//! rating>=3, header='good', rid=1..5, desc!=null
//! ──┬─── ┬┬   ──────┬─────  ───┬───
//!   │    ││         │          └── inclusive range (BETWEEN)
//!   │    ││         └── quoted text
//!   │    │└── value
//!   │    └── operator: = == != <> > >= < <=
//!   └── column
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{ModelError, ModelResult};
use crate::filter::{Condition, Filter};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Parse a comma-separated filter expression. Blank input is the empty
/// filter.
pub fn parse_filter(input: &str) -> ModelResult<Filter> {
    if input.trim().is_empty() {
        return Ok(Filter::all());
    }

    let parsed = delimited(
        multispace0,
        separated_list1(delimited(multispace0, char(','), multispace0), condition),
        multispace0,
    )(input);

    match parsed {
        Ok(("", conditions)) => Ok(conditions
            .into_iter()
            .fold(Filter::new(), |filter, (column, cond)| filter.with(column, cond))),
        Ok((remaining, _)) => Err(ModelError::parse(
            input.len() - remaining.len(),
            format!("Unexpected trailing content: '{}'", remaining),
        )),
        Err(e) => Err(to_parse_error(input, e)),
    }
}

/// Parse exactly one condition, e.g. `rating>=3`.
pub fn parse_condition(input: &str) -> ModelResult<(String, Condition)> {
    match delimited(multispace0, condition, multispace0)(input) {
        Ok(("", parsed)) => Ok(parsed),
        Ok((remaining, _)) => Err(ModelError::parse(
            input.len() - remaining.len(),
            format!("Unexpected trailing content: '{}'", remaining),
        )),
        Err(e) => Err(to_parse_error(input, e)),
    }
}

fn to_parse_error(input: &str, e: nom::Err<nom::error::Error<&str>>) -> ModelError {
    match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => ModelError::parse(
            input.len() - e.input.len(),
            format!("expected a condition like column=value, found '{}'", e.input),
        ),
        nom::Err::Incomplete(_) => ModelError::parse(input.len(), "unexpected end of input"),
    }
}

/// Parse a single condition.
fn condition(input: &str) -> IResult<&str, (String, Condition)> {
    let (input, column) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, op) = operator(input)?;
    let (input, _) = multispace0(input)?;

    if op == Op::Eq {
        if let Ok((rest, (low, high))) = range(input) {
            return Ok((rest, (column.to_string(), Condition::Between(low, high))));
        }
    }

    let (input, v) = value_literal(input)?;
    let cond = match op {
        Op::Eq => Condition::Eq(v),
        Op::Ne => Condition::Ne(v),
        Op::Gt => Condition::Gt(v),
        Op::Gte => Condition::Gte(v),
        Op::Lt => Condition::Lt(v),
        Op::Lte => Condition::Lte(v),
    };
    Ok((input, (column.to_string(), cond)))
}

/// Parse an identifier (column name).
fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn operator(input: &str) -> IResult<&str, Op> {
    alt((
        value(Op::Gte, tag(">=")),
        value(Op::Lte, tag("<=")),
        value(Op::Ne, tag("!=")),
        value(Op::Ne, tag("<>")),
        value(Op::Eq, tag("==")),
        value(Op::Eq, char('=')),
        value(Op::Gt, char('>')),
        value(Op::Lt, char('<')),
    ))(input)
}

/// Parse `low..high`.
fn range(input: &str) -> IResult<&str, (Value, Value)> {
    pair(
        value_literal,
        preceded(delimited(multispace0, tag(".."), multispace0), value_literal),
    )(input)
}

/// Parse a value.
fn value_literal(input: &str) -> IResult<&str, Value> {
    alt((quoted_string, number, bare_word))(input)
}

/// Parse a number (integer or float) that is not the prefix of a word.
fn number(input: &str) -> IResult<&str, Value> {
    let (input, num_str) = terminated(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        not(peek(satisfy(|c: char| c.is_alphanumeric() || c == '_'))),
    )(input)?;

    let parsed = if num_str.contains('.') {
        num_str.parse().ok().map(Value::Float)
    } else {
        num_str.parse().ok().map(Value::Int)
    };
    // Integers past i64 stay text.
    Ok((input, parsed.unwrap_or_else(|| Value::Text(num_str.to_string()))))
}

/// Parse a quoted string; `''` inside stands for one quote.
fn quoted_string(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('\'')(input)?;
    let mut content = String::new();
    let mut rest = input;
    loop {
        let (after, chunk) = take_while(|c: char| c != '\'')(rest)?;
        content.push_str(chunk);
        let (after, _) = char('\'')(after)?;
        match char::<&str, nom::error::Error<&str>>('\'')(after) {
            Ok((after, _)) => {
                content.push('\'');
                rest = after;
            }
            Err(_) => return Ok((after, Value::Text(content))),
        }
    }
}

/// Bare word: `null`, `true`, `false` or plain text.
fn bare_word(input: &str) -> IResult<&str, Value> {
    map(
        take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '@' | '/')),
        |word: &str| match word.to_ascii_lowercase().as_str() {
            "null" => Value::Null,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Text(word.to_string()),
        },
    )(input)
}
