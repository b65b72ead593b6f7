//! Pipeline primitives: converters, validators, and metadata-driven wrappers.
//!
//! A [`Converter`] turns a raw string into a typed value. A [`Validator`]
//! accepts or rejects a typed value. A [`Wrapper`] takes a field's
//! [`Metadata`] and a converter and returns a new converter with extra stages;
//! wrappers never mutate the converter they are given.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;

use crate::error::{BoxError, BuildError, ValidationError};
use crate::meta::{self, Metadata};

/// Raw string to typed value.
pub type Converter<T> = Arc<dyn Fn(&str) -> Result<T, BoxError> + Send + Sync>;

/// A finished converter for one field. Built fresh per field per load.
pub type Pipeline<T> = Converter<T>;

/// Typed value to success or error.
pub type Validator<T> = Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// Metadata-driven converter transform. Errors here are setup errors.
pub type Wrapper<T> = Arc<dyn Fn(&Metadata, Converter<T>) -> Result<Converter<T>, BuildError> + Send + Sync>;

pub fn converter<T, F>(f: F) -> Converter<T>
where
    F: Fn(&str) -> Result<T, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn validator<T, F>(f: F) -> Validator<T>
where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn wrapper<T, F>(f: F) -> Wrapper<T>
where
    F: Fn(&Metadata, Converter<T>) -> Result<Converter<T>, BuildError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Run `converter`, then `validator` on its output. The validator's error is
/// passed through untouched.
pub fn pipe<T: 'static>(converter: Converter<T>, validator: Validator<T>) -> Converter<T> {
    Arc::new(move |raw: &str| -> Result<T, BoxError> {
        let value = converter(raw)?;
        validator(&value)?;
        Ok(value)
    })
}

/// Like [`pipe`] with validators run in order, stopping at the first failure.
/// An empty list returns `converter` itself.
pub fn pipe_multiple<T: 'static>(converter: Converter<T>, validators: Vec<Validator<T>>) -> Converter<T> {
    if validators.is_empty() {
        return converter;
    }
    let combined: Validator<T> = Arc::new(move |value: &T| -> Result<(), BoxError> {
        for validate in &validators {
            validate(value)?;
        }
        Ok(())
    });
    pipe(converter, combined)
}

/// Apply wrappers in sequence, threading the converter through each.
pub fn compose_wrappers<T: 'static>(wrappers: Vec<Wrapper<T>>) -> Wrapper<T> {
    Arc::new(move |meta: &Metadata, converter: Converter<T>| -> Result<Converter<T>, BuildError> {
        wrappers
            .iter()
            .try_fold(converter, |converter, wrap| wrap(meta, converter))
    })
}

/// Inclusive `min` / `max` bounds, parsed with the field's own converter.
/// Values that do not compare with a bound (a float `NaN`) are rejected.
pub fn bounds<T: PartialOrd + Send + Sync + 'static>() -> Wrapper<T> {
    Arc::new(|meta: &Metadata, converter: Converter<T>| -> Result<Converter<T>, BuildError> {
        let min = parse_bound(meta, meta::MIN, &converter)?;
        let max = parse_bound(meta, meta::MAX, &converter)?;

        let mut validators: Vec<Validator<T>> = Vec::new();
        if let Some((raw, min)) = min {
            validators.push(Arc::new(move |value: &T| -> Result<(), BoxError> {
                if !matches!(value.partial_cmp(&min), Some(Ordering::Greater | Ordering::Equal)) {
                    return Err(ValidationError::BelowMin { min: raw.clone() }.into());
                }
                Ok(())
            }));
        }
        if let Some((raw, max)) = max {
            validators.push(Arc::new(move |value: &T| -> Result<(), BoxError> {
                if !matches!(value.partial_cmp(&max), Some(Ordering::Less | Ordering::Equal)) {
                    return Err(ValidationError::AboveMax { max: raw.clone() }.into());
                }
                Ok(())
            }));
        }
        Ok(pipe_multiple(converter, validators))
    })
}

fn parse_bound<T>(
    meta: &Metadata,
    annotation: &str,
    converter: &Converter<T>,
) -> Result<Option<(String, T)>, BuildError> {
    let Some(raw) = meta.get(annotation) else {
        return Ok(None);
    };
    let bound = converter(raw).map_err(|e| BuildError::InvalidAnnotation {
        annotation: annotation.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some((raw.to_string(), bound)))
}

/// Require the raw input to match the `pattern` annotation. The expression is
/// anchored by the caller, not implicitly.
pub fn pattern<T: 'static>() -> Wrapper<T> {
    Arc::new(|meta: &Metadata, converter: Converter<T>| -> Result<Converter<T>, BuildError> {
        let Some(raw_pattern) = meta.get(meta::PATTERN) else {
            return Ok(converter);
        };
        let regex = Regex::new(raw_pattern).map_err(|e| BuildError::InvalidAnnotation {
            annotation: meta::PATTERN.to_string(),
            value: raw_pattern.to_string(),
            reason: e.to_string(),
        })?;
        let checked: Converter<T> = Arc::new(move |raw: &str| -> Result<T, BoxError> {
            if !regex.is_match(raw) {
                return Err(ValidationError::PatternMismatch {
                    pattern: regex.as_str().to_string(),
                }
                .into());
            }
            converter(raw)
        });
        Ok(checked)
    })
}

/// The metadata wrapper every ordered built-in type uses. Bounds are parsed
/// with the bare converter; the pattern only guards the field's raw input.
pub fn ordered<T: PartialOrd + Send + Sync + 'static>() -> Wrapper<T> {
    compose_wrappers(vec![bounds(), pattern()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn parse_u32() -> Converter<u32> {
        converter(|raw: &str| Ok(raw.parse::<u32>()?))
    }

    fn even() -> Validator<u32> {
        validator(|v: &u32| {
            if v % 2 == 0 {
                Ok(())
            } else {
                Err("odd".into())
            }
        })
    }

    #[test]
    fn pipe_runs_validator_after_success() {
        let p = pipe(parse_u32(), even());
        assert_eq!(p("4").unwrap(), 4);
        assert_eq!(p("3").unwrap_err().to_string(), "odd");
    }

    #[test]
    fn pipe_skips_validator_on_conversion_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let counting = validator(move |_: &u32| {
            seen.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        });
        let p = pipe(parse_u32(), counting);
        assert!(p("x").is_err());
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn pipe_multiple_empty_returns_same_converter() {
        let base = parse_u32();
        let piped = pipe_multiple(base.clone(), vec![]);
        assert!(Arc::ptr_eq(&base, &piped));
    }

    #[test]
    fn pipe_multiple_stops_at_first_failure() {
        let never = validator(|_: &u32| -> Result<(), BoxError> { panic!("should not run") });
        let p = pipe_multiple(parse_u32(), vec![even(), never]);
        assert_eq!(p("5").unwrap_err().to_string(), "odd");
    }

    #[test]
    fn bounds_are_inclusive() {
        let meta = crate::meta!(min = 10, max = 20);
        let p = bounds::<u32>()(&meta, parse_u32()).unwrap();
        assert_eq!(p("10").unwrap(), 10);
        assert_eq!(p("20").unwrap(), 20);
        let below = p("9").unwrap_err();
        assert_eq!(
            below.downcast_ref::<ValidationError>(),
            Some(&ValidationError::BelowMin { min: "10".into() })
        );
        assert!(p("21").is_err());
    }

    #[test]
    fn unparsable_bound_is_build_error() {
        let meta = crate::meta!(min = "ten");
        let err = bounds::<u32>()(&meta, parse_u32()).err().unwrap();
        match err {
            BuildError::InvalidAnnotation { annotation, value, .. } => {
                assert_eq!(annotation, "min");
                assert_eq!(value, "ten");
            }
            other => panic!("Expected InvalidAnnotation, got: {other:?}"),
        }
    }

    #[test]
    fn pattern_checks_raw_input() {
        let meta = crate::meta!(pattern = "^[0-9]{2}$");
        let p = pattern::<u32>()(&meta, parse_u32()).unwrap();
        assert_eq!(p("42").unwrap(), 42);
        assert!(p("420").is_err());
    }

    #[test]
    fn bounds_are_not_checked_against_pattern() {
        let meta = crate::meta!(pattern = "^[1-9][0-9]*$", min = 0, max = 100);
        let p = ordered::<u32>()(&meta, parse_u32()).unwrap();
        assert_eq!(p("5").unwrap(), 5);
        assert!(p("05").unwrap_err().downcast_ref::<ValidationError>().is_some());
        assert_eq!(
            p("101").unwrap_err().downcast_ref::<ValidationError>(),
            Some(&ValidationError::AboveMax { max: "100".into() })
        );
    }

    #[test]
    fn nan_is_outside_every_bound() {
        let parse_f64: Converter<f64> = converter(|raw: &str| Ok(raw.parse::<f64>()?));
        let p = bounds::<f64>()(&crate::meta!(min = "0.0"), parse_f64.clone()).unwrap();
        assert!(p("NaN").is_err());
        let p = bounds::<f64>()(&crate::meta!(max = "1.0"), parse_f64).unwrap();
        assert!(p("NaN").is_err());
        assert_eq!(p("1.0").unwrap(), 1.0);
    }

    #[test]
    fn bad_pattern_is_build_error() {
        let meta = crate::meta!(pattern = "(");
        assert!(pattern::<u32>()(&meta, parse_u32()).is_err());
    }

    #[test]
    fn no_annotations_leaves_converter_alone() {
        let base = parse_u32();
        let p = ordered::<u32>()(&Metadata::new(), base.clone()).unwrap();
        assert!(Arc::ptr_eq(&base, &p));
    }

    #[test]
    fn compose_aborts_on_first_wrapper_error() {
        let failing: Wrapper<u32> = wrapper(|_, _| Err(BuildError::Custom("boom".into())));
        let never: Wrapper<u32> = wrapper(|_, _| panic!("should not run"));
        let composed = compose_wrappers(vec![failing, never]);
        let err = composed(&Metadata::new(), parse_u32()).err().unwrap();
        assert_eq!(err.to_string(), "boom");
    }
}
