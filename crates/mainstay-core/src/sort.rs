//! Comparator sort with an auxiliary context
//!
//! The comparator receives a caller-supplied context value on every
//! invocation, so parameterized comparisons need no global or
//! thread-local state. The context is captured together with the
//! comparator in an adapter closure handed to the native two-argument
//! sort; nothing escapes the call and concurrent sorts on other threads
//! cannot observe each other's context.

use std::cmp::Ordering;

/// Stable in-place sort; `ctx` is passed unchanged to every comparison.
pub fn sort_with_context<T, C: ?Sized>(
    items: &mut [T],
    cmp: fn(&T, &T, &C) -> Ordering,
    ctx: &C,
) {
    items.sort_by(|a, b| cmp(a, b, ctx));
}

/// Unstable sibling of [`sort_with_context`]; equal elements may be
/// reordered.
pub fn sort_unstable_with_context<T, C: ?Sized>(
    items: &mut [T],
    cmp: fn(&T, &T, &C) -> Ordering,
    ctx: &C,
) {
    items.sort_unstable_by(|a, b| cmp(a, b, ctx));
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Direction {
        descending: bool,
    }

    fn by_direction(a: &i32, b: &i32, ctx: &Direction) -> Ordering {
        if ctx.descending {
            b.cmp(a)
        } else {
            a.cmp(b)
        }
    }

    #[test]
    fn ascending_with_context() {
        let mut v = [5, 3, 1, 4, 2];
        sort_with_context(&mut v, by_direction, &Direction { descending: false });
        assert_eq!(v, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn descending_with_context() {
        let mut v = [5, 3, 1, 4, 2];
        sort_with_context(&mut v, by_direction, &Direction { descending: true });
        assert_eq!(v, [5, 4, 3, 2, 1]);
    }

    #[test]
    fn comparator_sees_the_caller_context_every_call() {
        use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
        static EXPECTED: AtomicUsize = AtomicUsize::new(0);
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        fn check(a: &i32, b: &i32, ctx: &Direction) -> Ordering {
            assert_eq!(
                std::ptr::from_ref(ctx) as usize,
                EXPECTED.load(AtomicOrdering::Relaxed)
            );
            CALLS.fetch_add(1, AtomicOrdering::Relaxed);
            by_direction(a, b, ctx)
        }

        let ctx = Direction { descending: false };
        EXPECTED.store(std::ptr::from_ref(&ctx) as usize, AtomicOrdering::Relaxed);
        let mut v = [9, 1, 8, 2, 7, 3];
        sort_with_context(&mut v, check, &ctx);
        assert_eq!(v, [1, 2, 3, 7, 8, 9]);
        assert!(CALLS.load(AtomicOrdering::Relaxed) >= 5);
    }

    #[test]
    fn unstable_sorts_too() {
        let mut v = [2, 1, 2, 0];
        sort_unstable_with_context(&mut v, by_direction, &Direction { descending: false });
        assert_eq!(v, [0, 1, 2, 2]);
    }
}
