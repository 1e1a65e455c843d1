//! Diagnostic plumbing shared by every compiler stage.
//!
//! Two kinds of failures exist in the compiler. Internal invariant violations abort through
//! [`ice!`]. User-facing errors never abort; they are recorded in a [`Diagnostics`] sink and the
//! stage that raised them continues with a poisoned result.

use miette::Diagnostic;

#[macro_export]
macro_rules! ice {
    ($message:expr) => {{
        let message = $message;
        let file = file!();
        let line = line!();
        let column = column!();
        panic!(
            "internal compiler error ({}:{}:{}):\n{}",
            file, line, column, message
        )
    }};
}

/// Position in a [`Diagnostics`] sink that can be restored with [`Diagnostics::truncate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiagnosticMark(usize);

/// A non-fatal collection of user-facing diagnostics.
///
/// Diagnostics are kept in the order they were reported. Speculative work records a mark up front
/// and truncates back to it if the speculation is thrown away.
#[derive(Debug)]
pub struct Diagnostics<E: Diagnostic> {
    reports: Vec<E>,
}

impl<E: Diagnostic> Default for Diagnostics<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Diagnostic> Diagnostics<E> {
    pub fn new() -> Self {
        Self {
            reports: Vec::new(),
        }
    }

    pub fn report(&mut self, error: impl Into<E>) {
        self.reports.push(error.into());
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn mark(&self) -> DiagnosticMark {
        DiagnosticMark(self.reports.len())
    }

    /// Check if anything was reported since `mark`.
    pub fn has_reported_since(&self, mark: DiagnosticMark) -> bool {
        self.reports.len() > mark.0
    }

    /// Drop every diagnostic reported after `mark`.
    pub fn truncate(&mut self, mark: DiagnosticMark) {
        self.reports.truncate(mark.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.reports.iter()
    }

    pub fn into_vec(self) -> Vec<E> {
        self.reports
    }
}

impl<E: Diagnostic> IntoIterator for Diagnostics<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::Diagnostics;
    use ember_macros::assert_some;
    use miette::Diagnostic;
    use thiserror::Error;

    #[derive(Error, Diagnostic, Debug)]
    #[error("sample {0}")]
    struct SampleError(u32);

    #[test]
    fn test_truncate_to_mark_drops_later_reports() {
        let mut sink = Diagnostics::<SampleError>::new();
        sink.report(SampleError(1));
        let mark = sink.mark();
        assert!(!sink.has_reported_since(mark));
        sink.report(SampleError(2));
        sink.report(SampleError(3));
        assert!(sink.has_reported_since(mark));
        sink.truncate(mark);
        assert_eq!(sink.len(), 1);
        let first = assert_some!(sink.iter().next());
        assert_eq!(first.0, 1);
    }

    #[test]
    #[should_panic(expected = "internal compiler error")]
    fn test_ice_panics_with_location() {
        ice!("broken invariant");
    }
}
