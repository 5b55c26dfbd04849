//! `Accept-Encoding` parsing and codec selection.

use crate::registry::{CodecDescriptor, CodecId};

/// One parsed `token;q=weight` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Preference {
    /// Lowercased coding token, `*` or `identity` included.
    pub token: String,
    /// Clamped to `[0.0, 1.0]`; `0.0` is an explicit rejection.
    pub q: f64,
}

impl Preference {
    fn is_concrete(&self) -> bool {
        self.token != "*" && self.token != "identity"
    }
}

/// Parse a header value into preferences in header order.
///
/// A token listed twice keeps its first position and its last weight.
/// Malformed or non-finite weights count as `1.0`.
pub fn parse_accept_encoding(header: &str) -> Vec<Preference> {
    let mut prefs: Vec<Preference> = Vec::new();
    for part in header.split(',') {
        let mut segments = part.split(';');
        let token = match segments.next().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_ascii_lowercase(),
            _ => continue,
        };
        let q = segments
            .map(str::trim)
            .find_map(|param| {
                let (name, value) = param.split_once('=')?;
                name.trim().eq_ignore_ascii_case("q").then(|| parse_q(value))
            })
            .unwrap_or(1.0);

        match prefs.iter_mut().find(|p| p.token == token) {
            Some(existing) => existing.q = q,
            None => prefs.push(Preference { token, q }),
        }
    }
    prefs
}

fn parse_q(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(q) if q.is_finite() => q.clamp(0.0, 1.0),
        _ => 1.0,
    }
}

/// Picks the best codec for a request from a list of available codecs.
///
/// The wildcard fallback order is policy, not protocol, so it is configurable.
#[derive(Debug, Clone)]
pub struct Negotiator {
    wildcard_order: Vec<CodecId>,
}

impl Default for Negotiator {
    /// Most compressing first: brotli, zstd, gzip, lz4.
    fn default() -> Self {
        Self {
            wildcard_order: vec![CodecId::Brotli, CodecId::Zstd, CodecId::Gzip, CodecId::Lz4],
        }
    }
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `order` for `*` fallback. Codecs left out are never chosen through
    /// the wildcard, only through an explicit token.
    pub fn with_wildcard_order(order: Vec<CodecId>) -> Self {
        Self {
            wildcard_order: order,
        }
    }

    pub fn wildcard_order(&self) -> &[CodecId] {
        &self.wildcard_order
    }

    /// `None` means no codec applies: either the client asked for identity or
    /// nothing acceptable is available. The caller decides between serving
    /// uncompressed and rejecting.
    pub fn negotiate(&self, header: &str, available: &[CodecDescriptor]) -> Option<CodecDescriptor> {
        let prefs = parse_accept_encoding(header);
        if prefs.is_empty() {
            return None;
        }

        let mut concrete: Vec<&Preference> = prefs
            .iter()
            .filter(|p| p.is_concrete() && p.q > 0.0)
            .collect();
        // stable: ties keep header order
        concrete.sort_by(|a, b| b.q.total_cmp(&a.q));
        for pref in concrete {
            if let Some(d) = available.iter().find(|d| d.wire_token == pref.token) {
                return Some(*d);
            }
        }

        let weight = |token: &str| prefs.iter().find(|p| p.token == token).map(|p| p.q);

        if weight("*").is_some_and(|q| q > 0.0) {
            let chosen = self.wildcard_order.iter().find_map(|id| {
                let d = available.iter().find(|d| d.id == *id)?;
                let rejected = weight(d.wire_token) == Some(0.0);
                (!rejected).then_some(*d)
            });
            if chosen.is_some() {
                return chosen;
            }
        }

        // identity with q > 0, or nothing acceptable
        None
    }
}
