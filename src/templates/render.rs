// ABOUTME: Template renderer replacing :name placeholders with positional $n binds
// ABOUTME: Skips casts, quoted and dollar-quoted literals, quoted identifiers and comments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::iter::Peekable;
use std::str::CharIndices;

use super::params::ValidatedParams;
use crate::errors::{AppError, AppResult};
use crate::sql::SqlValue;

/// Template rendered into parameterized SQL
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    /// SQL with `$1..$n` placeholders
    pub sql: String,
    /// Values for each position, in order
    pub values: Vec<SqlValue>,
}

enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Render a template against validated parameters
///
/// Every occurrence gets its own position, so a name used twice binds twice.
///
/// # Errors
///
/// Returns `InvalidInput` naming the first placeholder with no validated value
pub fn render(template: &str, params: &ValidatedParams) -> AppResult<RenderedStatement> {
    let mut sql = String::with_capacity(template.len());
    let mut values = Vec::new();

    for segment in scan(template) {
        match segment {
            Segment::Text(text) => sql.push_str(text),
            Segment::Placeholder(name) => {
                let value = params
                    .get(name)
                    .ok_or_else(|| AppError::invalid_input(format!("missing parameter: {name}")))?;
                values.push(value.clone());
                sql.push('$');
                sql.push_str(&values.len().to_string());
            }
        }
    }

    Ok(RenderedStatement { sql, values })
}

/// Placeholder names in encounter order (duplicates kept)
#[must_use]
pub fn placeholder_names(template: &str) -> Vec<String> {
    scan(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.to_owned()),
            Segment::Text(_) => None,
        })
        .collect()
}

fn scan(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut chars = template.char_indices().peekable();
    let mut text_start = 0;
    let mut previous = '\0';

    while let Some((i, c)) = chars.next() {
        match c {
            'e' | 'E' if !is_ident_char(previous) && next_is(&mut chars, '\'') => {
                chars.next();
                skip_escape_string(&mut chars);
            }
            '$' if !is_ident_char(previous) => {
                if let Some(tag) = dollar_tag(&template[i + 1..]) {
                    let body_start = i + tag.len() + 2;
                    let delimiter = format!("${tag}$");
                    let end = template[body_start..]
                        .find(&delimiter)
                        .map_or(template.len(), |at| body_start + at + delimiter.len());
                    while chars.next_if(|&(j, _)| j < end).is_some() {}
                }
            }
            '\'' => skip_quoted(&mut chars, '\''),
            '"' => skip_quoted(&mut chars, '"'),
            '-' if next_is(&mut chars, '-') => skip_line_comment(&mut chars),
            '/' if next_is(&mut chars, '*') => skip_block_comment(&mut chars),
            ':' if next_is(&mut chars, ':') => {
                chars.next();
            }
            ':' if chars
                .peek()
                .is_some_and(|&(_, n)| n.is_ascii_alphabetic() || n == '_') =>
            {
                let name_start = i + 1;
                let mut name_end = name_start;
                while let Some(&(j, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name_end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if text_start < i {
                    segments.push(Segment::Text(&template[text_start..i]));
                }
                segments.push(Segment::Placeholder(&template[name_start..name_end]));
                text_start = name_end;
            }
            _ => {}
        }
        previous = c;
    }

    if text_start < template.len() {
        segments.push(Segment::Text(&template[text_start..]));
    }
    segments
}

fn next_is(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    chars.peek().is_some_and(|&(_, c)| c == expected)
}

const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

// Tag of a `$tag$` opener; `rest` starts right after the first `$`
fn dollar_tag(rest: &str) -> Option<&str> {
    let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))?;
    let tag = &rest[..end];
    if tag.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    rest[end..].starts_with('$').then_some(tag)
}

// Backslash escapes anything, including the quote
fn skip_escape_string(chars: &mut Peekable<CharIndices<'_>>) {
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\'' if next_is(chars, '\'') => {
                chars.next();
            }
            '\'' => return,
            _ => {}
        }
    }
}

// A doubled quote inside a quoted run is an escaped quote
fn skip_quoted(chars: &mut Peekable<CharIndices<'_>>, quote: char) {
    while let Some((_, c)) = chars.next() {
        if c == quote {
            if next_is(chars, quote) {
                chars.next();
            } else {
                return;
            }
        }
    }
}

fn skip_line_comment(chars: &mut Peekable<CharIndices<'_>>) {
    for (_, c) in chars.by_ref() {
        if c == '\n' {
            return;
        }
    }
}

fn skip_block_comment(chars: &mut Peekable<CharIndices<'_>>) {
    chars.next();
    let mut previous = '\0';
    for (_, c) in chars.by_ref() {
        if previous == '*' && c == '/' {
            return;
        }
        previous = c;
    }
}
