//! Proxy selection.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a proxy is picked for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyStrategy {
    #[default]
    Random,
    RoundRobin,
}

impl ProxyStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyStrategy::Random => "random",
            ProxyStrategy::RoundRobin => "round_robin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "random" => Some(ProxyStrategy::Random),
            "round_robin" | "roundrobin" => Some(ProxyStrategy::RoundRobin),
            _ => None,
        }
    }
}

/// Picks one of `len` proxies per request.
#[derive(Debug)]
pub struct ProxyRotation {
    len: usize,
    strategy: ProxyStrategy,
    cursor: AtomicUsize,
}

impl ProxyRotation {
    pub fn new(len: usize, strategy: ProxyStrategy) -> Self {
        Self {
            len,
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> ProxyStrategy {
        self.strategy
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the proxy for the next request, or `None` when no proxies
    /// are configured.
    pub fn next_index(&self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let index = match self.strategy {
            ProxyStrategy::Random => rand::thread_rng().gen_range(0..self.len),
            ProxyStrategy::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % self.len,
        };
        Some(index)
    }
}

/// Parse a comma separated proxy list, dropping blanks.
pub fn parse_proxy_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rotation() {
        let rotation = ProxyRotation::new(0, ProxyStrategy::Random);
        assert!(rotation.is_empty());
        assert_eq!(rotation.next_index(), None);
    }

    #[test]
    fn test_round_robin_cycles() {
        let rotation = ProxyRotation::new(3, ProxyStrategy::RoundRobin);
        let picks: Vec<_> = (0..6).filter_map(|_| rotation.next_index()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_random_stays_in_bounds() {
        let rotation = ProxyRotation::new(4, ProxyStrategy::Random);
        for _ in 0..100 {
            let index = rotation.next_index().unwrap();
            assert!(index < 4);
        }
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            ProxyStrategy::from_str("round-robin"),
            Some(ProxyStrategy::RoundRobin)
        );
        assert_eq!(ProxyStrategy::from_str("RANDOM"), Some(ProxyStrategy::Random));
        assert_eq!(ProxyStrategy::from_str("sticky"), None);
    }

    #[test]
    fn test_parse_proxy_list() {
        assert_eq!(
            parse_proxy_list("http://a:8080, ,socks5://b:1080"),
            vec!["http://a:8080", "socks5://b:1080"]
        );
    }
}
