//! Security policy checks applied before any command is dispatched.
//!
//! Two independent checks: a per-tool disable list (default-allow) and a
//! destination deny-list matched against the host of the URL a command
//! targets. Both fail closed.

use std::collections::HashSet;
use std::sync::RwLock;

use url::Url;

use crate::protocol::Command;

/// Externally-configured policy. Hot-reloadable as a whole value.
#[derive(Debug, Clone, Default)]
pub struct SecurityPolicy {
    /// Tool identifiers (see [`Command::tool_id`]) that are refused.
    pub disabled_tools: HashSet<String>,
    /// Domains for which destination-targeting commands are refused.
    /// An entry matches the host itself and any of its subdomains.
    pub denied_domains: Vec<String>,
}

#[derive(Debug)]
pub struct SecurityGate {
    policy: RwLock<SecurityPolicy>,
}

impl SecurityGate {
    pub fn new(policy: SecurityPolicy) -> Self {
        SecurityGate {
            policy: RwLock::new(policy),
        }
    }

    /// Swap in a new policy. Checks already in flight finish against the
    /// snapshot they read; later checks see the new value.
    pub fn replace(&self, policy: SecurityPolicy) {
        match self.policy.write() {
            Ok(mut guard) => *guard = policy,
            Err(poisoned) => *poisoned.into_inner() = policy,
        }
    }

    pub fn snapshot(&self) -> SecurityPolicy {
        match self.policy.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_command_allowed(&self, command: &Command) -> bool {
        !self.snapshot().disabled_tools.contains(command.tool_id())
    }

    /// Whether the deny-list refuses this destination. An unparseable URL or
    /// one without a host is denied.
    pub fn is_destination_denied(&self, destination: &str) -> bool {
        let policy = self.snapshot();
        if policy.denied_domains.is_empty() {
            // Still refuse garbage destinations even with an empty list.
            return destination_host(destination).is_none();
        }
        let Some(host) = destination_host(destination) else {
            tracing::warn!(%destination, "Unparseable destination, denying");
            return true;
        };
        policy
            .denied_domains
            .iter()
            .any(|domain| host_matches(&host, domain))
    }
}

impl Default for SecurityGate {
    fn default() -> Self {
        SecurityGate::new(SecurityPolicy::default())
    }
}

fn destination_host(destination: &str) -> Option<String> {
    let url = Url::parse(destination).ok()?;
    url.host_str().map(|h| h.to_ascii_lowercase())
}

fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches("*.").to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(denied: &[&str]) -> SecurityGate {
        SecurityGate::new(SecurityPolicy {
            disabled_tools: HashSet::new(),
            denied_domains: denied.iter().map(|d| d.to_string()).collect(),
        })
    }

    #[test]
    fn disabled_tool_is_refused() {
        let gate = SecurityGate::new(SecurityPolicy {
            disabled_tools: ["execute-javascript-in-browser".to_string()]
                .into_iter()
                .collect(),
            denied_domains: Vec::new(),
        });
        let denied = Command::ExecuteJavascript {
            tab_id: 1,
            code: "1".into(),
        };
        let allowed = Command::GetTabList;
        assert!(!gate.is_command_allowed(&denied));
        assert!(gate.is_command_allowed(&allowed));
    }

    #[test]
    fn deny_list_matches_host_and_subdomains() {
        let gate = gate(&["blocked.example"]);
        assert!(gate.is_destination_denied("https://blocked.example"));
        assert!(gate.is_destination_denied("https://www.blocked.example/path?q=1"));
        assert!(gate.is_destination_denied("https://BLOCKED.example"));
        assert!(!gate.is_destination_denied("https://notblocked.example"));
        assert!(!gate.is_destination_denied("https://example.com"));
    }

    #[test]
    fn wildcard_prefix_is_tolerated() {
        let gate = gate(&["*.blocked.example"]);
        assert!(gate.is_destination_denied("https://a.blocked.example"));
        assert!(gate.is_destination_denied("https://blocked.example"));
    }

    #[test]
    fn unparseable_destination_is_denied() {
        let sec_gate = gate(&["blocked.example"]);
        assert!(sec_gate.is_destination_denied("not a url"));
        assert!(sec_gate.is_destination_denied("file:///etc/passwd"));
        // Fail closed even with nothing configured.
        assert!(gate(&[]).is_destination_denied("not a url"));
        assert!(!gate(&[]).is_destination_denied("https://example.com"));
    }

    #[test]
    fn replace_swaps_the_whole_policy() {
        let gate = gate(&["blocked.example"]);
        assert!(gate.is_destination_denied("https://blocked.example"));
        gate.replace(SecurityPolicy {
            disabled_tools: HashSet::new(),
            denied_domains: vec!["other.example".into()],
        });
        assert!(!gate.is_destination_denied("https://blocked.example"));
        assert!(gate.is_destination_denied("https://other.example"));
    }
}
