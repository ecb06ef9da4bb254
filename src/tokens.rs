// src/tokens.rs
//! Token registry: a bounded, bidirectional LRU between opaque 64-bit
//! tokens and canonical keys.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::types::{Key, Token, BAD_TOKEN};

/// Default registry capacity. This should be enough for anyone.
pub const DEFAULT_TOKEN_CAPACITY: usize = 640 * (1 << 10);

struct Registry {
    forward: LruCache<Token, Key>,
    reverse: HashMap<Key, Token, ahash::RandomState>,
    rng: SmallRng,
}

pub struct TokenRegistry {
    inner: Mutex<Registry>,
}

impl TokenRegistry {
    /// `capacity` must be nonzero; callers validate through the pool
    /// configuration.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Registry {
                forward: LruCache::new(capacity),
                reverse: HashMap::default(),
                rng: SmallRng::from_entropy(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().forward.cap().get()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intern `(uri, options)` and return its token. An already-interned
    /// key is promoted and answers its existing token; otherwise a fresh
    /// unique token is drawn, evicting the LRU mapping when full.
    pub fn get_token(&self, uri: &str, options: &[String]) -> Token {
        let key = Key::new(uri, options);
        let mut inner = self.inner.lock();
        let Registry {
            forward,
            reverse,
            rng,
        } = &mut *inner;

        if let Some(&token) = reverse.get(&key) {
            // Promote the mapping so a hot key is not the eviction victim.
            let _ = forward.get(&token);
            return token;
        }

        let token = loop {
            let candidate: Token = rng.gen();
            if candidate != BAD_TOKEN && !forward.contains(&candidate) {
                break candidate;
            }
        };
        if let Some((_, evicted_key)) = forward.push(token, key.clone()) {
            reverse.remove(&evicted_key);
        }
        reverse.insert(key, token);
        token
    }

    /// Current key for `token`, promoting the mapping to most recent.
    /// [`BAD_TOKEN`] answers absent without consulting the registry.
    pub fn query_token(&self, token: Token) -> Option<Key> {
        if token == BAD_TOKEN {
            return None;
        }
        self.inner.lock().forward.get(&token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: usize) -> TokenRegistry {
        TokenRegistry::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn opts(options: &[&str]) -> Vec<String> {
        options.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn same_key_answers_the_same_token() {
        let registry = registry(16);
        let options = opts(&["-r", "bilinear"]);
        let first = registry.get_token("geo.tif", &options);
        let second = registry.get_token("geo.tif", &options);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_keys_answer_distinct_tokens() {
        let registry = registry(16);
        let a = registry.get_token("geo.tif", &opts(&["-r", "bilinear"]));
        let b = registry.get_token("geo.tif", &opts(&["-r", "near"]));
        let c = registry.get_token("geo2.tif", &opts(&["-r", "bilinear"]));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn eviction_invalidates_the_oldest_token() {
        let registry = registry(2);
        let a = registry.get_token("a.tif", &[]);
        let b = registry.get_token("b.tif", &[]);
        let c = registry.get_token("c.tif", &[]);
        assert!(registry.query_token(a).is_none());
        assert!(registry.query_token(b).is_some());
        assert!(registry.query_token(c).is_some());
        // The evicted key can be re-interned; it gets a fresh token.
        let a2 = registry.get_token("a.tif", &[]);
        assert_ne!(a2, BAD_TOKEN);
        assert_eq!(registry.query_token(a2).unwrap().uri, "a.tif");
    }

    #[test]
    fn bad_token_is_always_absent() {
        let registry = registry(4);
        assert!(registry.query_token(BAD_TOKEN).is_none());
    }
}
