//! Per-query table aliases.

/// Hands out `t0`, `t1`, ... for the lifetime of one compilation.
///
/// A table reached along several paths (or joined to itself) gets a fresh
/// alias each time, so generated joins never collide.
#[derive(Debug, Default)]
pub struct AliasAllocator {
    next: usize,
}

impl AliasAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> String {
        let alias = format!("t{}", self.next);
        self.next += 1;
        alias
    }

    /// Number of aliases issued so far.
    pub fn issued(&self) -> usize {
        self.next
    }
}
