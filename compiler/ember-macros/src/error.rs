//! Declaration of compiler diagnostic error types.
//!
//! Every compiler stage collects its user-facing errors into a single enum, where each variant
//! wraps one diagnostic struct. [`declare_error_type`] generates that enum together with the
//! `From` conversions, forwarding both the message and the miette diagnostic data to the wrapped
//! struct.

#[macro_export]
macro_rules! declare_error_type {
    {
        #[error($msg:expr)]
        $vis:vis enum $type_name:ident {
            $($name:ident($ty:ty),)*
        }
    } => {
        #[derive(thiserror::Error, miette::Diagnostic, Debug)]
        #[error($msg)]
        $vis enum $type_name {
            $(
                #[error(transparent)]
                #[diagnostic(transparent)]
                $name(#[from] $ty),
            )*
        }
    }
}

#[cfg(test)]
mod tests {
    use miette::Diagnostic;
    use thiserror::Error;

    #[derive(Error, Diagnostic, Debug)]
    #[diagnostic(code(test::first))]
    #[error("first went wrong")]
    struct FirstError;

    #[derive(Error, Diagnostic, Debug)]
    #[error("second went wrong: {reason}")]
    struct SecondError {
        reason: String,
    }

    declare_error_type! {
        #[error("test error: {0}")]
        enum TestError {
            First(FirstError),
            Second(SecondError),
        }
    }

    #[test]
    fn test_declared_error_forwards_message_and_code() {
        let err = TestError::from(FirstError);
        assert_eq!(err.to_string(), "first went wrong");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("test::first"));
        let err = TestError::from(SecondError {
            reason: "bad input".to_string(),
        });
        assert_eq!(err.to_string(), "second went wrong: bad input");
    }
}
