//! Key filters for primary-key enumeration.

/// Comparison operator applied between a stored key and a reference value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Key equals the reference value.
    Eq,
    /// Key differs from the reference value.
    Ne,
    /// Key is strictly greater (lexicographic).
    Gt,
    /// Key is greater or equal (lexicographic).
    Ge,
    /// Key is strictly smaller (lexicographic).
    Lt,
    /// Key is smaller or equal (lexicographic).
    Le,
}

/// A filter over row keys: zero or more comparators that must all hold,
/// plus an optional `(offset, count)` window applied after filtering.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    comparators: Vec<(CompareOp, String)>,
    limit: Option<(usize, usize)>,
}

impl Condition {
    /// Creates an empty condition matching every key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the key to equal `value`.
    #[must_use]
    pub fn eq(mut self, value: impl Into<String>) -> Self {
        self.comparators.push((CompareOp::Eq, value.into()));
        self
    }

    /// Requires the key to differ from `value`.
    #[must_use]
    pub fn ne(mut self, value: impl Into<String>) -> Self {
        self.comparators.push((CompareOp::Ne, value.into()));
        self
    }

    /// Requires the key to be strictly greater than `value`.
    #[must_use]
    pub fn gt(mut self, value: impl Into<String>) -> Self {
        self.comparators.push((CompareOp::Gt, value.into()));
        self
    }

    /// Requires the key to be greater than or equal to `value`.
    #[must_use]
    pub fn ge(mut self, value: impl Into<String>) -> Self {
        self.comparators.push((CompareOp::Ge, value.into()));
        self
    }

    /// Requires the key to be strictly smaller than `value`.
    #[must_use]
    pub fn lt(mut self, value: impl Into<String>) -> Self {
        self.comparators.push((CompareOp::Lt, value.into()));
        self
    }

    /// Requires the key to be smaller than or equal to `value`.
    #[must_use]
    pub fn le(mut self, value: impl Into<String>) -> Self {
        self.comparators.push((CompareOp::Le, value.into()));
        self
    }

    /// Restricts the answer to `count` keys starting at `offset`.
    #[must_use]
    pub fn limit(mut self, offset: usize, count: usize) -> Self {
        self.limit = Some((offset, count));
        self
    }

    /// Whether `key` satisfies every comparator.
    #[must_use]
    pub fn is_match(&self, key: &str) -> bool {
        self.comparators.iter().all(|(op, value)| match op {
            CompareOp::Eq => key == value,
            CompareOp::Ne => key != value,
            CompareOp::Gt => key > value.as_str(),
            CompareOp::Ge => key >= value.as_str(),
            CompareOp::Lt => key < value.as_str(),
            CompareOp::Le => key <= value.as_str(),
        })
    }

    /// Applies the limit window to an already filtered, ordered key list.
    #[must_use]
    pub fn apply_limit(&self, keys: Vec<String>) -> Vec<String> {
        match self.limit {
            Some((offset, count)) => keys.into_iter().skip(offset).take(count).collect(),
            None => keys,
        }
    }

    /// A copy of this condition with the limit window removed.
    ///
    /// Chained stores are queried without the window so it can be applied
    /// exactly once, over the merged key set.
    #[must_use]
    pub fn without_limit(&self) -> Self {
        Self {
            comparators: self.comparators.clone(),
            limit: None,
        }
    }
}
