//! Test assertion helpers.
//!
//! Every macro here evaluates to the unwrapped value on success, so tests can keep working with
//! the result:
//!
//! ```
//! use ember_macros::{assert_ok, assert_matches};
//!
//! let value = assert_ok!("42".parse::<i32>());
//! let doubled = assert_matches!(Some(value * 2), Some(v) => v);
//! assert_eq!(doubled, 84);
//! ```
//!
//! Only compiled with the `assertion-macros` feature, which crates enable for their
//! dev-dependencies.

/// Unwrap an `Ok`, panicking with the `Debug` rendering of the error otherwise.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {{
        match $expr {
            ::std::result::Result::Ok(val) => val,
            ::std::result::Result::Err(err) => {
                panic!("assertion failed: expected Ok, got Err({:?})", err);
            }
        }
    }};
}

/// Unwrap an `Err`, panicking with the `Debug` rendering of the value otherwise.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {{
        match $expr {
            ::std::result::Result::Ok(val) => {
                panic!("assertion failed: expected Err, got Ok({:?})", val);
            }
            ::std::result::Result::Err(err) => err,
        }
    }};
}

#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {{
        match $expr {
            ::std::option::Option::Some(val) => val,
            ::std::option::Option::None => {
                panic!("assertion failed: expected Some, got None");
            }
        }
    }};
}

#[macro_export]
macro_rules! assert_none {
    ($expr:expr) => {{
        if let ::std::option::Option::Some(val) = $expr {
            panic!("assertion failed: expected None, got Some({:?})", val);
        };
    }};
}

/// Match an expression against a pattern, evaluating `$output` with the pattern bindings.
///
/// The forms without an output evaluate to `()`. An optional `if` guard is supported.
#[macro_export]
macro_rules! assert_matches {
    ($expr:expr, $pat:pat_param if $guard:expr => $output:expr) => {{
        match $expr {
            $pat if $guard => $output,
            ref other => panic!(
                "assertion failed: {:?} does not match {} if {}",
                other,
                stringify!($pat),
                stringify!($guard)
            ),
        }
    }};
    ($expr:expr, $pat:pat_param if $guard:expr) => {
        $crate::assert_matches!($expr, $pat if $guard => ())
    };
    ($expr:expr, $pat:pat_param => $output:expr) => {{
        match $expr {
            $pat => $output,
            ref other => panic!(
                "assertion failed: {:?} does not match {}",
                other,
                stringify!($pat)
            ),
        }
    }};
    ($expr:expr, $pat:pat_param) => {
        $crate::assert_matches!($expr, $pat => ())
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_result_assertions_unwrap() {
        let ok: Result<i32, &str> = Ok(7);
        assert_eq!(assert_ok!(ok), 7);
        let err: Result<i32, &str> = Err("nope");
        assert_eq!(assert_err!(err), "nope");
    }

    #[test]
    fn test_option_assertions_unwrap() {
        assert_eq!(assert_some!(Some("x")), "x");
        assert_none!(None::<u8>);
    }

    #[test]
    fn test_matches_binds_output() {
        let pair = (1, Some(2));
        let inner = assert_matches!(pair, (1, Some(v)) => v);
        assert_eq!(inner, 2);
        assert_matches!(pair.1, Some(_));
        assert_matches!(pair, (_, Some(v)) if v > 1);
    }

    #[test]
    #[should_panic(expected = "expected Ok")]
    fn test_assert_ok_panics_on_err() {
        let err: Result<i32, &str> = Err("boom");
        assert_ok!(err);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_assert_matches_panics_on_mismatch() {
        assert_matches!(Some(3), None);
    }
}
