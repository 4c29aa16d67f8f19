// src/topic_match.rs
//
// Topic ids look like `d1t3` (domain 1, task 3). Content items may carry a
// direct `topic` tag, a `category`, or only a `domain`. Matching runs an
// ordered list of rules and the first rule that selects anything wins, so a
// topic with directly tagged items never mixes in domain-wide fallbacks.

use crate::models::{Flashcard, Question};
use log::debug;

/// Anything that can be filed under a topic.
pub trait Tagged {
    fn topic(&self) -> Option<&str>;
    fn category(&self) -> Option<&str>;
    fn domain(&self) -> Option<&str>;
}

impl Tagged for Flashcard {
    fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
    fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}

impl Tagged for Question {
    fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
    fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// `item.topic == topic_id`
    Topic,
    /// `item.category == topic_id`, ignoring ASCII case
    Category,
    /// The item's domain equals the domain prefix of `topic_id`
    /// (`d1t3` -> `d1`; items may say `d1`, `D1` or `domain1`).
    Domain,
}

impl MatchRule {
    pub fn matches(&self, item: &impl Tagged, topic_id: &str) -> bool {
        match self {
            MatchRule::Topic => item.topic() == Some(topic_id),
            MatchRule::Category => item
                .category()
                .is_some_and(|c| c.eq_ignore_ascii_case(topic_id)),
            MatchRule::Domain => match (domain_number(topic_id), item.domain()) {
                (Some(wanted), Some(domain)) => domain_number(domain) == Some(wanted),
                _ => false,
            },
        }
    }
}

pub const DEFAULT_RULES: [MatchRule; 3] =
    [MatchRule::Topic, MatchRule::Category, MatchRule::Domain];

#[derive(Debug, Clone)]
pub struct TopicMatcher {
    rules: Vec<MatchRule>,
}

impl Default for TopicMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl TopicMatcher {
    pub fn new(rules: Vec<MatchRule>) -> Self {
        Self { rules }
    }

    /// Items for `topic_id` under the first rule that yields any. Bank order
    /// is preserved.
    pub fn select<'a, T: Tagged>(&self, items: &'a [T], topic_id: &str) -> Vec<&'a T> {
        for rule in &self.rules {
            let hits: Vec<&T> = items.iter().filter(|i| rule.matches(*i, topic_id)).collect();
            if !hits.is_empty() {
                debug!(
                    "[Match] '{}' -> {} items via {:?}",
                    topic_id,
                    hits.len(),
                    rule
                );
                return hits;
            }
        }
        debug!("[Match] '{}' -> no items", topic_id);
        Vec::new()
    }
}

/// Extracts the domain number from `d1t3`, `d1`, `D2` or `domain2`.
fn domain_number(id: &str) -> Option<u32> {
    let lower = id.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("domain")
        .or_else(|| lower.strip_prefix('d'))?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
