//! Minimal robots.txt support: `User-agent`, `Allow` and `Disallow` only.
//!
//! The longest matching rule wins and `Allow` wins a tie. `Crawl-delay`,
//! `Sitemap` and `$` anchors are not interpreted.

use crate::fetch::Fetcher;
use crate::glob::Glob;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use url::Url;

/// Whether a rule grants or denies access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Allow,
    Disallow,
}

#[derive(Debug, Clone)]
struct RobotsRule {
    kind: RuleKind,
    pattern: Glob,
}

/// Rules from every robots.txt group that applies to our user agent
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    rules: Vec<RobotsRule>,
}

impl RobotsRules {
    /// Rule set that allows everything (missing or unreachable robots.txt)
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse robots.txt text, keeping rules from groups addressed to `*` or to
    /// `user_agent` (case-insensitive exact match).
    pub fn parse(text: &str, user_agent: &str) -> Self {
        let mut rules = Vec::new();
        let mut applies = false;
        // Consecutive User-agent lines share the group that follows them
        let mut in_agent_run = false;

        for raw in text.lines() {
            let line = match raw.find('#') {
                Some(idx) => &raw[..idx],
                None => raw,
            }
            .trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            if key.eq_ignore_ascii_case("user-agent") {
                let matched = value == "*" || value.eq_ignore_ascii_case(user_agent);
                applies = if in_agent_run { applies || matched } else { matched };
                in_agent_run = true;
            } else if key.eq_ignore_ascii_case("allow") {
                in_agent_run = false;
                if applies {
                    rules.push(RobotsRule {
                        kind: RuleKind::Allow,
                        pattern: Glob::new(value),
                    });
                }
            } else if key.eq_ignore_ascii_case("disallow") {
                in_agent_run = false;
                // An empty Disallow disallows nothing
                if applies && !value.is_empty() {
                    rules.push(RobotsRule {
                        kind: RuleKind::Disallow,
                        pattern: Glob::new(value),
                    });
                }
            }
        }

        Self { rules }
    }

    /// Number of rules collected from applying groups
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no applying rule was found
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate a URL path against the collected rules
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<(usize, RuleKind)> = None;

        for rule in &self.rules {
            let Some(len) = rule.pattern.prefix_match_len(path) else {
                continue;
            };
            let wins = match best {
                None => true,
                Some((best_len, _)) if len > best_len => true,
                Some((best_len, best_kind)) => {
                    len == best_len
                        && rule.kind == RuleKind::Allow
                        && best_kind == RuleKind::Disallow
                }
            };
            if wins {
                best = Some((len, rule.kind));
            }
        }

        !matches!(best, Some((_, RuleKind::Disallow)))
    }
}

/// Per-origin robots.txt cache.
///
/// Each origin is fetched at most once; workers that ask for an origin while
/// its fetch is in flight wait for that fetch instead of issuing another.
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<RobotsRules>>>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the origin of `url`, fetching `{origin}/robots.txt` on first use
    pub async fn rules_for(
        &self,
        url: &Url,
        fetcher: &Fetcher,
        user_agent: &str,
    ) -> Arc<RobotsRules> {
        let origin = url.origin().ascii_serialization();
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(origin.clone()).or_default())
        };

        cell.get_or_init(|| async {
            let robots_url = format!("{}/robots.txt", origin);
            match fetcher.fetch_text(&robots_url).await {
                Some(text) => {
                    let rules = RobotsRules::parse(&text, user_agent);
                    ::log::debug!("Loaded {} robots rules from {}", rules.len(), robots_url);
                    Arc::new(rules)
                }
                None => {
                    ::log::debug!("No usable robots.txt at {}, allowing all", robots_url);
                    Arc::new(RobotsRules::allow_all())
                }
            }
        })
        .await
        .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longer_allow_beats_shorter_disallow() {
        let rules = RobotsRules::parse(
            "User-agent: *\nDisallow: /a/*\nAllow: /a/public/*\n",
            "harvester",
        );
        assert!(rules.is_allowed("/a/public/x"));
        assert!(!rules.is_allowed("/a/private"));
        assert!(rules.is_allowed("/b"));
    }

    #[test]
    fn test_allow_wins_ties() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /x\nAllow: /x\n", "harvester");
        assert!(rules.is_allowed("/x"));

        // Order of the rules does not matter
        let rules = RobotsRules::parse("User-agent: *\nAllow: /x\nDisallow: /x\n", "harvester");
        assert!(rules.is_allowed("/x"));
    }

    #[test]
    fn test_root_disallow() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /\n", "harvester");
        assert!(!rules.is_allowed("/"));
        assert!(!rules.is_allowed("/anything"));
    }

    #[test]
    fn test_non_matching_rules_are_ignored() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /private/*\n", "harvester");
        assert!(rules.is_allowed("/public/page"));
        assert!(!rules.is_allowed("/private/page"));
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n", "harvester");
        assert!(rules.is_empty());
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn test_only_applying_groups_are_collected() {
        let text = "\
# comment line
User-agent: OtherBot
Disallow: /

User-agent: Harvester
Disallow: /drafts/ # inline comment

User-agent: *
Disallow: /tmp/
";
        let rules = RobotsRules::parse(text, "harvester");
        assert_eq!(rules.len(), 2);
        assert!(rules.is_allowed("/"));
        assert!(!rules.is_allowed("/drafts/one"));
        assert!(!rules.is_allowed("/tmp/file"));
    }

    #[test]
    fn test_consecutive_user_agents_share_a_group() {
        let text = "User-agent: harvester\nUser-agent: OtherBot\nDisallow: /secret\n";
        let rules = RobotsRules::parse(text, "Harvester");
        assert!(!rules.is_allowed("/secret"));

        let rules = RobotsRules::parse(text, "ThirdBot");
        assert!(rules.is_allowed("/secret"));
    }

    #[test]
    fn test_case_insensitive_directives_and_crlf() {
        let rules = RobotsRules::parse("user-agent: *\r\nDISALLOW: /x\r\n", "harvester");
        assert!(!rules.is_allowed("/x/y"));
    }
}
