// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `/`-joined namespace path used to prefix keys contributed inside nested
//! context scopes.

/// Current namespace path for one execution context. Initially empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespacePath {
    path: String,
}

/// Token returned by [`NamespacePath::push`], carrying the prior path.
/// Consumed by [`NamespacePath::pop`]; move semantics make each token usable
/// at most once.
#[derive(Debug)]
pub struct PathToken {
    prev: String,
}

impl NamespacePath {
    /// Append a segment, returning a token that restores the prior path.
    pub fn push(&mut self, segment: &str) -> PathToken {
        let prev = std::mem::take(&mut self.path);
        self.path = if prev.is_empty() {
            segment.to_string()
        } else {
            format!("{prev}/{segment}")
        };
        PathToken { prev }
    }

    /// Restore the path captured by `token`.
    pub fn pop(&mut self, token: PathToken) {
        self.path = token.prev;
    }

    /// Prefix `key` with the current path, or return it unchanged when the
    /// path is empty.
    pub fn qualify(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}/{key}", self.path)
        }
    }

    /// The current path string.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify_empty_path() {
        let path = NamespacePath::default();
        assert_eq!(path.qualify("score"), "score");
    }

    #[test]
    fn test_push_joins_segments() {
        let mut path = NamespacePath::default();
        let t1 = path.push("science");
        assert_eq!(path.as_str(), "science");
        let t2 = path.push("physics");
        assert_eq!(path.as_str(), "science/physics");
        assert_eq!(path.qualify("score"), "science/physics/score");

        path.pop(t2);
        assert_eq!(path.as_str(), "science");
        path.pop(t1);
        assert!(path.is_empty());
    }

    #[test]
    fn test_pop_restores_exact_prior_path() {
        let mut path = NamespacePath::default();
        let _outer = path.push("a");
        let inner = path.push("b");
        let deepest = path.push("c");
        path.pop(deepest);
        path.pop(inner);
        assert_eq!(path.as_str(), "a");
    }
}
