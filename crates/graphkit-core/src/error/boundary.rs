/// Define an error boundary: a `From` conversion between two error types.
///
/// Crates at a layer boundary (transport → SDK, core → SDK) declare how a
/// lower-layer error maps into their own error type once, and then use `?`
/// everywhere else.
///
/// # Syntax
///
/// ```ignore
/// error_boundary!(SourceError => TargetError, |err_var| {
///     // conversion logic returning TargetError
/// });
/// ```
///
/// # Example
///
/// ```
/// use graphkit_core::error_boundary;
/// use graphkit_core::cancel::Cancelled;
///
/// #[derive(Debug, thiserror::Error)]
/// enum SendError {
///     #[error("send was cancelled")]
///     Cancelled,
///     #[error("parse error: {0}")]
///     Parse(String),
/// }
///
/// error_boundary!(Cancelled => SendError, |_e| SendError::Cancelled);
/// error_boundary!(std::num::ParseIntError => SendError, |e| {
///     SendError::Parse(e.to_string())
/// });
///
/// fn attempts(header: &str) -> Result<u32, SendError> {
///     Ok(header.parse::<u32>()?)
/// }
///
/// assert!(matches!(attempts("x"), Err(SendError::Parse(_))));
/// ```
#[macro_export]
macro_rules! error_boundary {
    ($inner:ty => $outer:ty, |$err:ident| $body:expr) => {
        impl ::std::convert::From<$inner> for $outer {
            fn from($err: $inner) -> $outer {
                $body
            }
        }
    };
}
