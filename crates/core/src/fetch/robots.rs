//! robots.txt parsing and a per-origin cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// Parsed robots.txt.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

impl RobotsRules {
    /// Rules that allow everything (missing or unreadable robots.txt).
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut in_agent_block = false;

        for raw in content.lines() {
            let line = raw.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // consecutive user-agent lines share one group
                    if !in_agent_block && !current.agents.is_empty() {
                        groups.push(std::mem::take(&mut current));
                    }
                    current.agents.push(value.to_ascii_lowercase());
                    in_agent_block = true;
                }
                "allow" | "disallow" => {
                    in_agent_block = false;
                    if current.agents.is_empty() {
                        continue;
                    }
                    // an empty Disallow allows everything
                    if value.is_empty() {
                        continue;
                    }
                    current.rules.push(Rule {
                        allow: key == "allow",
                        pattern: value.to_string(),
                    });
                }
                _ => {
                    in_agent_block = false;
                }
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }

        Self { groups }
    }

    /// Whether `user_agent` may fetch `path` (path plus optional query).
    ///
    /// The group with the longest agent token contained in `user_agent` is
    /// used, falling back to `*`. Within a group the longest matching rule
    /// wins and `Allow` wins ties.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let agent = user_agent.to_ascii_lowercase();
        let group = self
            .groups
            .iter()
            .filter_map(|g| {
                g.agents
                    .iter()
                    .filter(|a| a.as_str() != "*" && agent.contains(a.as_str()))
                    .map(|a| a.len())
                    .max()
                    .map(|len| (len, g))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, g)| g)
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

        let Some(group) = group else {
            return true;
        };

        let mut best: Option<(usize, bool)> = None;
        for rule in &group.rules {
            if pattern_matches(&rule.pattern, path) {
                let len = rule.pattern.len();
                best = match best {
                    Some((best_len, best_allow))
                        if best_len > len || (best_len == len && best_allow) =>
                    {
                        Some((best_len, best_allow))
                    }
                    _ => Some((len, rule.allow)),
                };
            }
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }

    pub fn is_url_allowed(&self, user_agent: &str, url: &Url) -> bool {
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        self.is_allowed(user_agent, &path)
    }
}

/// Prefix match with `*` wildcards and an optional `$` end anchor.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            if !path.starts_with(part) {
                return false;
            }
            pos = part.len();
            continue;
        }
        if part.is_empty() {
            continue;
        }
        match path[pos..].find(part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }

    if anchored {
        // the last literal segment must end the path
        match parts.last() {
            Some(last) if !last.is_empty() && parts.len() > 1 => path.ends_with(last),
            Some(_) if parts.len() > 1 => true,
            _ => pos == path.len(),
        }
    } else {
        true
    }
}

/// Origin key (`scheme://host[:port]`) for the cache.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// robots.txt rules cached per origin for the life of the process.
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: RwLock<HashMap<String, Arc<RobotsRules>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, origin: &str) -> Option<Arc<RobotsRules>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(origin)
            .cloned()
    }

    pub fn insert(&self, origin: impl Into<String>, rules: RobotsRules) -> Arc<RobotsRules> {
        let rules = Arc::new(rules);
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(origin.into(), Arc::clone(&rules));
        rules
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
