//! Single-flight, single-argument memoization with optional ttl.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::key::MemoizeArgs;

struct MemoizedValue<A, R, E> {
    args: A,
    result: Result<R, E>,
    timestamp: Instant,
}

/// A pull-through cache over a single-argument function `f(args) -> Result<R, E>`.
///
/// `call` holds one exclusive lock for its entire duration, including the
/// invocation of `f` on a miss or ttl refresh, this serializes every
/// caller of the same [`Memoized`] instance but guarantees at most one
/// concurrent invocation of `f` per argument (in fact, per instance), which
/// is the single-flight property this type exists to provide. Errors are
/// cached exactly like successes and returned verbatim to every caller
/// inside the ttl window.
///
/// Storage is a linear, insertion-ordered list with no eviction, intended
/// for low-cardinality argument spaces.
pub struct Memoized<A, R, E, F> {
    values: Mutex<Vec<MemoizedValue<A, R, E>>>,
    ttl: Duration,
    f: F,
}

impl<A, R, E, F> Memoized<A, R, E, F>
where
    A: MemoizeArgs,
    R: Clone,
    E: Clone,
    F: Fn(A) -> Result<R, E>,
{
    /// Memoizes `f` with no ttl, once computed, a result is cached forever.
    pub fn new(f: F) -> Self {
        Self::with_ttl(f, Duration::ZERO)
    }

    /// Memoizes `f`, recomputing a cached argument's result once `ttl` has
    /// elapsed since it was last computed. `ttl = Duration::ZERO` means
    /// "never recompute".
    pub fn with_ttl(f: F, ttl: Duration) -> Self {
        Self {
            values: Mutex::new(Vec::new()),
            ttl,
            f,
        }
    }

    /// Returns `f(args)`, from cache if a live entry exists, otherwise by
    /// invoking `f` and caching the result (success or error) under the
    /// current time.
    pub fn call(&self, args: A) -> Result<R, E> {
        let mut values = self.values.lock();
        let now = Instant::now();

        if let Some(existing) = values.iter_mut().find(|v| v.args == args) {
            if self.ttl.is_zero() || now.saturating_duration_since(existing.timestamp) < self.ttl {
                return existing.result.clone();
            }
            let result = (self.f)(args);
            existing.result = result.clone();
            existing.timestamp = now;
            return result;
        }

        let result = (self.f)(args.clone());
        values.push(MemoizedValue {
            args,
            result: result.clone(),
            timestamp: now,
        });
        result
    }

    /// Number of distinct arguments currently memoized.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Whether no arguments have been memoized yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, PartialEq, Eq, Hash)]
    struct Arg(&'static str);
    impl MemoizeArgs for Arg {}

    #[test]
    fn deduplicates_repeated_arguments() {
        let calls = AtomicUsize::new(0);
        let m = Memoized::new(|a: Arg| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(a.0)
        });

        assert_eq!(m.call(Arg("foo")), Ok("foo"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(m.call(Arg("bar")), Ok("bar"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(m.call(Arg("foo")), Ok("foo"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn errors_are_cached_like_successes() {
        let calls = AtomicUsize::new(0);
        let m = Memoized::new(|a: Arg| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<&'static str, _>(format!("failed on {}", a.0))
        });

        assert!(m.call(Arg("foo")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(m.call(Arg("foo")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recomputes_after_ttl_elapses() {
        let calls = AtomicUsize::new(0);
        let m = Memoized::with_ttl(
            |a: Arg| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(a.0)
            },
            Duration::from_millis(1),
        );

        assert_eq!(m.call(Arg("foo")), Ok("foo"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(m.call(Arg("foo")), Ok("foo"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(m.call(Arg("foo")), Ok("foo"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
