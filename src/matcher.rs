use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32Str};

/// Fuzzy scorer shared by the list-backed modules.
///
/// `Matcher` keeps scratch buffers and is not `Sync`, so modules create one
/// per query rather than sharing it across worker threads.
pub struct FuzzyMatcher {
    matcher: Matcher,
    buf: Vec<char>,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyMatcher {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
            buf: Vec::new(),
        }
    }

    /// Score of `haystack` against `query`, `None` on no match.
    pub fn score(&mut self, query: &str, haystack: &str) -> Option<u32> {
        let pattern = Pattern::parse(query, CaseMatching::Smart, Normalization::Smart);
        pattern.score(Utf32Str::new(haystack, &mut self.buf), &mut self.matcher)
    }

    /// Indices of matching items with their scores, best first.
    ///
    /// Equal scores keep input order so repeated queries render identically.
    /// `keep_going` is polled between items; returning false stops the scan
    /// and yields what was ranked so far.
    pub fn rank<T>(
        &mut self,
        query: &str,
        items: &[T],
        key: impl Fn(&T) -> &str,
        mut keep_going: impl FnMut() -> bool,
    ) -> Vec<(usize, u32)> {
        let pattern = Pattern::parse(query, CaseMatching::Smart, Normalization::Smart);
        let mut ranked = Vec::new();

        for (i, item) in items.iter().enumerate() {
            if !keep_going() {
                break;
            }
            let haystack = Utf32Str::new(key(item), &mut self.buf);
            if let Some(score) = pattern.score(haystack, &mut self.matcher) {
                ranked.push((i, score));
            }
        }

        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}
