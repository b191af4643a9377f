use crate::config::AllowListConfig;
use crate::fetch::Fetcher;
use crate::glob::Glob;
use crate::robots::RobotsCache;
use crate::utils::host_key;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Why a URL was or was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyReason {
    NotInAllowlist,
    PathNotAllowed,
    RobotsDisallow,
    Ok,
}

impl fmt::Display for PolicyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            PolicyReason::NotInAllowlist => "not-in-allowlist",
            PolicyReason::PathNotAllowed => "path-not-allowed",
            PolicyReason::RobotsDisallow => "robots-disallow",
            PolicyReason::Ok => "ok",
        };
        f.write_str(reason)
    }
}

/// Outcome of the policy gate for one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: PolicyReason,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: PolicyReason::Ok,
        }
    }

    pub fn deny(reason: PolicyReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Compiled host + path allow-list
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    hosts: HashMap<String, Vec<Glob>>,
}

impl AllowList {
    /// Compile every path glob once
    pub fn new(config: AllowListConfig) -> Self {
        let hosts = config
            .into_host_globs()
            .into_iter()
            .map(|(host, globs)| {
                let compiled = globs.iter().map(|g| Glob::new(g)).collect();
                (host, compiled)
            })
            .collect();
        Self { hosts }
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    /// Host and path check, without robots.txt
    pub fn check(&self, url: &Url) -> PolicyDecision {
        let Some(globs) = host_key(url).and_then(|host| self.hosts.get(&host)) else {
            return PolicyDecision::deny(PolicyReason::NotInAllowlist);
        };

        // No globs configured for the host means no path restriction
        if globs.is_empty() || globs.iter().any(|glob| glob.matches(url.path())) {
            PolicyDecision::allow()
        } else {
            PolicyDecision::deny(PolicyReason::PathNotAllowed)
        }
    }
}

/// Allow-list match followed by robots.txt evaluation
#[derive(Debug)]
pub struct PolicyGate {
    allow_list: AllowList,
    robots: RobotsCache,
    user_agent: String,
}

impl PolicyGate {
    pub fn new(allow_list: AllowList, user_agent: &str) -> Self {
        Self {
            allow_list,
            robots: RobotsCache::new(),
            user_agent: user_agent.to_string(),
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Decide whether `url` may be fetched.
    ///
    /// robots.txt is only consulted for URLs that pass the allow-list, so
    /// hosts outside the allow-list are never contacted.
    pub async fn evaluate(&self, url: &Url, fetcher: &Fetcher) -> PolicyDecision {
        let decision = self.allow_list.check(url);
        if !decision.allowed {
            return decision;
        }

        let rules = self.robots.rules_for(url, fetcher, &self.user_agent).await;
        if rules.is_allowed(url.path()) {
            PolicyDecision::allow()
        } else {
            PolicyDecision::deny(PolicyReason::RobotsDisallow)
        }
    }
}
