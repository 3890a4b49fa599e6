//! Built-in rules
//!
//! Every rule follows the registry calling convention
//! `(value, params) -> RuleResult`. Parameters arrive as written in the rule
//! string (usually JSON strings) and are coerced here. Arrays are validated
//! element-wise unless the rule is about the collection itself.

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use super::outcome::RuleResult;
use super::registry::{RuleOptions, RuleRegistry, ValidateFn};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap()
});

type RuleFn = fn(&Value, &[Value]) -> bool;

/// Registers every built-in rule on `registry`.
pub fn register_all(registry: &RuleRegistry) {
    let plain = RuleOptions::default();
    let rules: [(&str, RuleFn, RuleOptions); 20] = [
        ("after", after, plain.target().date()),
        ("alpha", alpha, plain),
        ("alpha_num", alpha_num, plain),
        ("before", before, plain.target().date()),
        ("between", between, plain),
        ("confirmed", confirmed, plain.target()),
        ("date_format", date_format, plain.date()),
        ("email", email, plain),
        ("excluded", excluded, plain),
        ("included", included, plain),
        ("is", is, plain),
        ("is_not", is_not, plain),
        ("max", max, plain),
        ("max_value", max_value, plain),
        ("min", min, plain),
        ("min_value", min_value, plain),
        ("numeric", numeric, plain),
        ("regex", regex, plain),
        ("required", required, plain),
        ("date_between", date_between, plain.date()),
    ];

    for (name, rule, options) in rules {
        let validate: ValidateFn =
            Arc::new(move |value: &Value, params: &[Value]| RuleResult::Bool(rule(value, params)));
        registry.insert(name.to_owned(), validate, options);
    }
}

// ============================================================================
// PRESENCE
// ============================================================================

/// `required[:invalidate_false]`
pub fn required(value: &Value, params: &[Value]) -> bool {
    let invalidate_false = params.first().is_some_and(truthy);
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Bool(b) => *b || !invalidate_false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// FORMAT
// ============================================================================

pub fn email(value: &Value, _params: &[Value]) -> bool {
    each(value, |text| EMAIL_REGEX.is_match(text))
}

pub fn alpha(value: &Value, _params: &[Value]) -> bool {
    each(value, |text| text.chars().all(char::is_alphabetic))
}

pub fn alpha_num(value: &Value, _params: &[Value]) -> bool {
    each(value, |text| text.chars().all(char::is_alphanumeric))
}

/// Digits only.
pub fn numeric(value: &Value, _params: &[Value]) -> bool {
    each(value, |text| {
        !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
    })
}

/// `regex:pattern`; an invalid pattern never matches.
pub fn regex(value: &Value, params: &[Value]) -> bool {
    let Some(pattern) = params.first().and_then(text) else {
        return false;
    };
    match Regex::new(&pattern) {
        Ok(re) => each(value, |text| re.is_match(text)),
        Err(err) => {
            tracing::warn!(%pattern, error = %err, "Invalid regex rule pattern");
            false
        }
    }
}

// ============================================================================
// SIZE
// ============================================================================

/// `min:length` on character count.
pub fn min(value: &Value, params: &[Value]) -> bool {
    let Some(length) = param_number(params, 0) else {
        return false;
    };
    if value.is_null() {
        return false;
    }
    each(value, |text| text.chars().count() as f64 >= length)
}

/// `max:length` on character count.
pub fn max(value: &Value, params: &[Value]) -> bool {
    let Some(length) = param_number(params, 0) else {
        return false;
    };
    if value.is_null() {
        return length >= 0.0;
    }
    each(value, |text| text.chars().count() as f64 <= length)
}

pub fn min_value(value: &Value, params: &[Value]) -> bool {
    compare_number(value, params, |n, min| n >= min)
}

pub fn max_value(value: &Value, params: &[Value]) -> bool {
    compare_number(value, params, |n, max| n <= max)
}

/// `between:min,max`, inclusive.
pub fn between(value: &Value, params: &[Value]) -> bool {
    let (Some(low), Some(high)) = (param_number(params, 0), param_number(params, 1)) else {
        return false;
    };
    each(value, |text| {
        text.trim()
            .parse::<f64>()
            .is_ok_and(|n| n >= low && n <= high)
    })
}

// ============================================================================
// EQUALITY
// ============================================================================

pub fn is(value: &Value, params: &[Value]) -> bool {
    params
        .first()
        .is_some_and(|expected| same(value, expected))
}

pub fn is_not(value: &Value, params: &[Value]) -> bool {
    !is(value, params)
}

/// `included:a,b,c`
pub fn included(value: &Value, params: &[Value]) -> bool {
    each(value, |text| {
        params.iter().any(|p| self::text(p).as_deref() == Some(text))
    })
}

/// `excluded:a,b,c`
pub fn excluded(value: &Value, params: &[Value]) -> bool {
    value.is_null()
        || each(value, |text| {
            !params.iter().any(|p| self::text(p).as_deref() == Some(text))
        })
}

/// `confirmed:target`; the first parameter is the target field's value.
pub fn confirmed(value: &Value, params: &[Value]) -> bool {
    params.first().is_some_and(|target| same(value, target))
}

// ============================================================================
// DATES
// ============================================================================

/// `date_format:format`
pub fn date_format(value: &Value, params: &[Value]) -> bool {
    let Some(format) = params.first().and_then(text) else {
        return false;
    };
    text(value).is_some_and(|v| parse_date(&v, &format).is_some())
}

/// `after:target[,inclusion]` plus the appended date format.
pub fn after(value: &Value, params: &[Value]) -> bool {
    compare_dates(value, params, |date, target, inclusive| {
        date > target || (inclusive && date == target)
    })
}

/// `before:target[,inclusion]` plus the appended date format.
pub fn before(value: &Value, params: &[Value]) -> bool {
    compare_dates(value, params, |date, target, inclusive| {
        date < target || (inclusive && date == target)
    })
}

/// `date_between:min,max` plus the appended date format; inclusive.
pub fn date_between(value: &Value, params: &[Value]) -> bool {
    let [low, high, format, ..] = params else {
        return false;
    };
    let (Some(format), Some(value)) = (text(format), text(value)) else {
        return false;
    };
    let parse = |v: &Value| text(v).and_then(|t| parse_date(&t, &format));
    match (parse_date(&value, &format), parse(low), parse(high)) {
        (Some(date), Some(low), Some(high)) => date >= low && date <= high,
        _ => false,
    }
}

fn compare_dates(
    value: &Value,
    params: &[Value],
    cmp: impl Fn(NaiveDateTime, NaiveDateTime, bool) -> bool,
) -> bool {
    let (target, inclusive, format) = match params {
        [target, inclusion, format, ..] => (target, truthy(inclusion), format),
        [target, format] => (target, false, format),
        _ => return false,
    };
    let Some(format) = text(format) else {
        return false;
    };
    let date = text(value).and_then(|v| parse_date(&v, &format));
    let target = text(target).and_then(|t| parse_date(&t, &format));
    match (date, target) {
        (Some(date), Some(target)) => cmp(date, target, inclusive),
        _ => false,
    }
}

/// Parses a date or datetime with a chrono `strftime` format.
pub fn parse_date(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ============================================================================
// HELPERS
// ============================================================================

/// String form of scalars; `None` for null, arrays and objects.
fn text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn each(value: &Value, check: impl Fn(&str) -> bool) -> bool {
    match value {
        Value::Array(items) => items
            .iter()
            .all(|item| text(item).is_some_and(|t| check(&t))),
        other => text(other).is_some_and(|t| check(&t)),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn param_number(params: &[Value], index: usize) -> Option<f64> {
    params.get(index).and_then(number)
}

fn compare_number(value: &Value, params: &[Value], cmp: impl Fn(f64, f64) -> bool) -> bool {
    let Some(limit) = param_number(params, 0) else {
        return false;
    };
    match value {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .all(|item| number(item).is_some_and(|n| cmp(n, limit))),
        other => number(other).is_some_and(|n| cmp(n, limit)),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true" || s == "1",
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

// Loose equality: numbers and their string forms compare equal.
fn same(a: &Value, b: &Value) -> bool {
    a == b || matches!((text(a), text(b)), (Some(x), Some(y)) if x == y)
}
