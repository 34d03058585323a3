//! Narrow parsing step from a remote JSON payload to a [`Draw`].
//!
//! The remote API has used different field names across endpoints and
//! versions, so each field is read from the first present key of a fixed
//! list. A key counts as present unless its value is empty: `null`, `false`,
//! numeric zero, `""`, `[]` or `{}`. An empty value falls through to the
//! next key.
//!
//! | field          | keys (in order)              | when absent      |
//! |----------------|------------------------------|------------------|
//! | contest number | `concurso`, `numero`         | error            |
//! | draw date      | `data`, `dataApuracao`       | `""`             |
//! | numbers        | `dezenas`, `listaDezenas`    | `[]`             |

use serde_json::{Map, Value};

use crate::error::ErrorCode;
use crate::model::{ContestNumber, Draw};

pub const CONTEST_KEYS: [&str; 2] = ["concurso", "numero"];
pub const DATE_KEYS: [&str; 2] = ["data", "dataApuracao"];
pub const NUMBERS_KEYS: [&str; 2] = ["dezenas", "listaDezenas"];

/// Why a JSON value could not be read as a non-negative integer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoercionError {
    #[error("text {0:?} is not an integer")]
    Text(String),

    #[error("{0} is negative")]
    Negative(i64),

    #[error("{0} has a fractional part")]
    Fractional(f64),

    #[error("{0} does not fit the target integer type")]
    OutOfRange(String),

    #[error("JSON {0} cannot be read as an integer")]
    WrongType(&'static str),
}

/// A fetched payload that cannot become a [`Draw`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("payload has no contest number (expected one of: concurso, numero)")]
    MissingContest,

    #[error("field `{field}` is not a valid integer: {source}")]
    NotAnInteger {
        field: String,
        #[source]
        source: CoercionError,
    },

    #[error("field `{field}` must be a list of numbers, found JSON {found}")]
    NotAList { field: &'static str, found: &'static str },
}

impl NormalizationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::MalformedPayload
    }
}

/// Map a remote payload to the canonical record shape.
///
/// # Errors
///
/// Returns [`NormalizationError`] when the contest number is missing or any
/// integer field fails coercion. Date and numbers default when absent.
pub fn normalize(payload: &Map<String, Value>) -> Result<Draw, NormalizationError> {
    let (contest_key, contest_value) =
        first_present(payload, &CONTEST_KEYS).ok_or(NormalizationError::MissingContest)?;
    let contest_number =
        coerce_u64(contest_value).map_err(|source| NormalizationError::NotAnInteger {
            field: contest_key.to_string(),
            source,
        })?;

    let draw_date = first_present(payload, &DATE_KEYS)
        .map(|(_, value)| value_to_text(value))
        .unwrap_or_default();

    let numbers = match first_present(payload, &NUMBERS_KEYS) {
        Some((key, value)) => coerce_numbers(key, value)?,
        None => Vec::new(),
    };

    Ok(Draw {
        contest_number,
        draw_date,
        numbers,
    })
}

fn first_present<'a>(
    payload: &'a Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    keys.iter().find_map(|key| {
        payload
            .get(*key)
            .filter(|value| is_present(value))
            .map(|value| (*key, value))
    })
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_numbers(field: &'static str, value: &Value) -> Result<Vec<u32>, NormalizationError> {
    let elements: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        // Some mirrors publish the list as comma-separated text.
        Value::String(text) => text
            .split(',')
            .map(|part| Value::String(part.to_string()))
            .collect(),
        other => {
            return Err(NormalizationError::NotAList {
                field,
                found: json_type(other),
            });
        }
    };

    elements
        .iter()
        .enumerate()
        .map(|(idx, element)| {
            coerce_u64(element)
                .and_then(|n| u32::try_from(n).map_err(|_| CoercionError::OutOfRange(n.to_string())))
                .map_err(|source| NormalizationError::NotAnInteger {
                    field: format!("{field}[{idx}]"),
                    source,
                })
        })
        .collect()
}

/// Coerce a JSON scalar to a non-negative integer.
///
/// Accepts integers, integral floats, and decimal text (surrounding
/// whitespace and leading zeros allowed, e.g. `" 07"`).
///
/// # Errors
///
/// Returns [`CoercionError`] for booleans, containers, fractional values,
/// negative values, and unparseable text.
pub fn coerce_u64(value: &Value) -> Result<ContestNumber, CoercionError> {
    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                return Ok(n);
            }
            if let Some(n) = number.as_i64() {
                return Err(CoercionError::Negative(n));
            }
            let float = number.as_f64().unwrap_or(f64::NAN);
            integral_float(float)
        }
        Value::String(text) => parse_integer_text(text),
        other => Err(CoercionError::WrongType(json_type(other))),
    }
}

fn parse_integer_text(text: &str) -> Result<u64, CoercionError> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if let Ok(n) = digits.parse::<u64>() {
        return Ok(n);
    }
    match trimmed.parse::<i64>() {
        Ok(n) if n < 0 => Err(CoercionError::Negative(n)),
        _ => Err(CoercionError::Text(text.to_string())),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
fn integral_float(float: f64) -> Result<u64, CoercionError> {
    if !float.is_finite() || float.fract() != 0.0 {
        return Err(CoercionError::Fractional(float));
    }
    if float < 0.0 {
        return Err(CoercionError::Negative(float as i64));
    }
    // 2^64 as f64; anything at or above it cannot be represented.
    if float >= 18_446_744_073_709_551_616.0 {
        return Err(CoercionError::OutOfRange(float.to_string()));
    }
    Ok(float as u64)
}

pub(crate) const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn primary_field_names() {
        let payload = object(json!({
            "concurso": 2750,
            "data": "01/01/2026",
            "dezenas": ["01", "10", "18", "25", "39", "56"],
            "acumulou": true
        }));
        let draw = normalize(&payload).expect("normalizes");
        assert_eq!(draw.contest_number, 2750);
        assert_eq!(draw.draw_date, "01/01/2026");
        assert_eq!(draw.numbers, [1, 10, 18, 25, 39, 56]);
    }

    #[test]
    fn alternate_field_names_produce_same_shape() {
        let primary = object(json!({
            "concurso": "3200",
            "data": "01/01/2026",
            "dezenas": [1, 2, 3]
        }));
        let alternate = object(json!({
            "numero": 3200,
            "dataApuracao": "01/01/2026",
            "listaDezenas": ["01", "02", "03"]
        }));
        assert_eq!(
            normalize(&primary).expect("primary"),
            normalize(&alternate).expect("alternate")
        );
    }

    #[test]
    fn first_present_key_wins() {
        let payload = object(json!({
            "concurso": 10,
            "numero": 99,
            "data": "",
            "dataApuracao": "02/02/2026",
            "dezenas": [],
            "listaDezenas": [7, 8]
        }));
        let draw = normalize(&payload).expect("normalizes");
        assert_eq!(draw.contest_number, 10);
        assert_eq!(draw.draw_date, "02/02/2026");
        assert_eq!(draw.numbers, [7, 8]);
    }

    #[test]
    fn zero_and_false_fall_through_to_the_next_key() {
        let draw = normalize(&object(json!({ "concurso": 0, "numero": 7 }))).expect("normalize");
        assert_eq!(draw.contest_number, 7);

        let draw =
            normalize(&object(json!({ "concurso": false, "numero": "8" }))).expect("normalize");
        assert_eq!(draw.contest_number, 8);

        let payload = object(json!({ "concurso": 9, "data": 0, "dataApuracao": "01/01/2026" }));
        let draw = normalize(&payload).expect("normalize");
        assert_eq!(draw.draw_date, "01/01/2026");
    }

    #[test]
    fn zero_contest_alone_is_missing() {
        let err = normalize(&object(json!({ "concurso": 0 }))).unwrap_err();
        assert_eq!(err, NormalizationError::MissingContest);
        let err = normalize(&object(json!({ "concurso": 0.0, "numero": null }))).unwrap_err();
        assert_eq!(err, NormalizationError::MissingContest);
    }

    #[test]
    fn date_and_numbers_default_when_absent() {
        let draw = normalize(&object(json!({ "numero": 5 }))).expect("normalizes");
        assert_eq!(draw.draw_date, "");
        assert!(draw.numbers.is_empty());
    }

    #[test]
    fn numbers_keep_source_order() {
        let draw = normalize(&object(json!({ "concurso": 1, "dezenas": [56, 3, 41] })))
            .expect("normalizes");
        assert_eq!(draw.numbers, [56, 3, 41]);
    }

    #[test]
    fn comma_separated_numbers_are_accepted() {
        let draw = normalize(&object(json!({ "concurso": 1, "dezenas": "05, 12,33" })))
            .expect("normalizes");
        assert_eq!(draw.numbers, [5, 12, 33]);
    }

    #[test]
    fn missing_contest_is_rejected() {
        let err = normalize(&object(json!({ "data": "x", "dezenas": [1] }))).unwrap_err();
        assert_eq!(err, NormalizationError::MissingContest);

        let null = normalize(&object(json!({ "concurso": null }))).unwrap_err();
        assert_eq!(null, NormalizationError::MissingContest);
    }

    #[test]
    fn non_numeric_contest_reports_field_and_cause() {
        let err = normalize(&object(json!({ "concurso": "abc" }))).unwrap_err();
        match err {
            NormalizationError::NotAnInteger { field, source } => {
                assert_eq!(field, "concurso");
                assert_eq!(source, CoercionError::Text("abc".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_drawn_number_names_its_index() {
        let err = normalize(&object(json!({ "numero": 1, "listaDezenas": [1, "x", 3] })))
            .unwrap_err();
        assert!(err.to_string().contains("listaDezenas[1]"));
    }

    #[test]
    fn non_list_numbers_are_rejected() {
        let err = normalize(&object(json!({ "concurso": 1, "dezenas": { "a": 1 } }))).unwrap_err();
        assert!(matches!(err, NormalizationError::NotAList { field: "dezenas", .. }));
    }

    #[test]
    fn coercion_rules() {
        assert_eq!(coerce_u64(&json!(7)), Ok(7));
        assert_eq!(coerce_u64(&json!(" 0042 ")), Ok(42));
        assert_eq!(coerce_u64(&json!(3.0)), Ok(3));
        assert_eq!(coerce_u64(&json!(-1)), Err(CoercionError::Negative(-1)));
        assert_eq!(coerce_u64(&json!("-4")), Err(CoercionError::Negative(-4)));
        assert_eq!(coerce_u64(&json!(2.5)), Err(CoercionError::Fractional(2.5)));
        assert_eq!(coerce_u64(&json!(true)), Err(CoercionError::WrongType("boolean")));
        assert!(coerce_u64(&json!([1])).is_err());
    }
}
