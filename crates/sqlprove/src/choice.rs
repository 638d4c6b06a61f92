//! A tagged two-way alternative.
//!
//! `Choice` carries exactly one of two payloads and remembers which. It is
//! used for call-site parameters that accept either of two value shapes; the
//! combinator synthesizes one representative per side.

/// One of two values, tagged by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice<A, B> {
    First(A),
    Second(B),
}

impl<A, B> Choice<A, B> {
    /// The first payload, if this is the first side.
    pub fn first(self) -> Option<A> {
        match self {
            Choice::First(a) => Some(a),
            Choice::Second(_) => None,
        }
    }

    /// The second payload, if this is the second side.
    pub fn second(self) -> Option<B> {
        match self {
            Choice::First(_) => None,
            Choice::Second(b) => Some(b),
        }
    }

    /// Collapse both sides into one result.
    pub fn fold<R>(self, on_first: impl FnOnce(A) -> R, on_second: impl FnOnce(B) -> R) -> R {
        match self {
            Choice::First(a) => on_first(a),
            Choice::Second(b) => on_second(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_dispatches_by_side() {
        let a: Choice<i32, String> = Choice::First(7);
        let b: Choice<i32, String> = Choice::Second("x".to_string());
        assert_eq!(a.fold(|n| n * 2, |_| 0), 14);
        assert_eq!(b.fold(|_| 0, |s| s.len() as i32), 1);
    }

    #[test]
    fn accessors_return_only_their_side() {
        let a: Choice<i32, bool> = Choice::First(1);
        assert_eq!(a.first(), Some(1));
        assert_eq!(a.second(), None);
    }
}
