//! String search filters (RFC 4515 subset) for the in-memory directory.
//!
//! Supports `&`, `|`, `!`, presence, equality, approximate (treated as
//! equality), substring, `>=` and `<=`. Matching is case-insensitive.
//! Values that parse as integers compare numerically.

use crate::protocol::SearchEntry;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equality(String, String),
    Substring {
        attribute: String,
        parts: Vec<String>,
    },
    GreaterOrEqual(String, String),
    LessOrEqual(String, String),
}

impl Filter {
    /// Parse a filter string. A bare `attr=value` without parentheses is
    /// accepted.
    pub(crate) fn parse(input: &str) -> Option<Filter> {
        let input = input.trim();
        let owned;
        let input = if input.starts_with('(') {
            input
        } else {
            owned = format!("({})", input);
            owned.as_str()
        };
        let (filter, rest) = parse_filter(input)?;
        rest.trim().is_empty().then_some(filter)
    }

    pub(crate) fn matches(&self, entry: &SearchEntry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(filter) => !filter.matches(entry),
            // Every entry has an object class, whether or not it was stored.
            Filter::Present(attribute) if attribute.eq_ignore_ascii_case("objectClass") => true,
            Filter::Present(attribute) => entry.values(attribute).is_some_and(|v| !v.is_empty()),
            Filter::Equality(attribute, value) => any_value(entry, attribute, |v| {
                compare_values(v, value) == Ordering::Equal
            }),
            Filter::Substring { attribute, parts } => {
                any_value(entry, attribute, |v| substring_match(v, parts))
            }
            Filter::GreaterOrEqual(attribute, value) => any_value(entry, attribute, |v| {
                compare_values(v, value) != Ordering::Less
            }),
            Filter::LessOrEqual(attribute, value) => any_value(entry, attribute, |v| {
                compare_values(v, value) != Ordering::Greater
            }),
        }
    }
}

fn any_value<F>(entry: &SearchEntry, attribute: &str, predicate: F) -> bool
where
    F: Fn(&str) -> bool,
{
    entry
        .values(attribute)
        .is_some_and(|values| values.iter().any(|v| predicate(v)))
}

/// Ordering used for filters and server-side sorting.
pub(crate) fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

fn substring_match(value: &str, parts: &[String]) -> bool {
    let value = value.to_lowercase();
    let last = parts.len().saturating_sub(1);
    let mut position = 0;
    for (index, part) in parts.iter().enumerate() {
        let part = part.to_lowercase();
        if part.is_empty() {
            continue;
        }
        if index == 0 {
            if !value.starts_with(&part) {
                return false;
            }
            position = part.len();
        } else if index == last {
            return value.len() >= position + part.len() && value.ends_with(&part);
        } else {
            match value[position..].find(&part) {
                Some(found) => position += found + part.len(),
                None => return false,
            }
        }
    }
    true
}

fn parse_filter(input: &str) -> Option<(Filter, &str)> {
    let body = input.strip_prefix('(')?;
    match body.chars().next()? {
        '&' => {
            let (filters, rest) = parse_list(&body[1..])?;
            Some((Filter::And(filters), rest))
        }
        '|' => {
            let (filters, rest) = parse_list(&body[1..])?;
            Some((Filter::Or(filters), rest))
        }
        '!' => {
            let (inner, rest) = parse_filter(body[1..].trim_start())?;
            let rest = rest.trim_start().strip_prefix(')')?;
            Some((Filter::Not(Box::new(inner)), rest))
        }
        _ => {
            let end = body.find(')')?;
            let item = parse_item(&body[..end])?;
            Some((item, &body[end + 1..]))
        }
    }
}

fn parse_list(mut input: &str) -> Option<(Vec<Filter>, &str)> {
    let mut filters = Vec::new();
    loop {
        input = input.trim_start();
        if let Some(rest) = input.strip_prefix(')') {
            return Some((filters, rest));
        }
        let (filter, rest) = parse_filter(input)?;
        filters.push(filter);
        input = rest;
    }
}

fn parse_item(item: &str) -> Option<Filter> {
    let (attribute, operator, value) = if let Some(i) = item.find(">=") {
        (&item[..i], ">=", &item[i + 2..])
    } else if let Some(i) = item.find("<=") {
        (&item[..i], "<=", &item[i + 2..])
    } else if let Some(i) = item.find("~=") {
        (&item[..i], "=", &item[i + 2..])
    } else {
        let i = item.find('=')?;
        (&item[..i], "=", &item[i + 1..])
    };

    let attribute = attribute.trim();
    if attribute.is_empty() {
        return None;
    }
    let attribute = attribute.to_string();
    let value = value.to_string();

    Some(match operator {
        ">=" => Filter::GreaterOrEqual(attribute, value),
        "<=" => Filter::LessOrEqual(attribute, value),
        _ if value == "*" => Filter::Present(attribute),
        _ if value.contains('*') => Filter::Substring {
            attribute,
            parts: value.split('*').map(str::to_string).collect(),
        },
        _ => Filter::Equality(attribute, value),
    })
}
