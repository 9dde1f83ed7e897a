//! Edge router model: the HTTP listener in front of the report handler.
//!
//! Requests whose `Host` header names the load balancer itself are forwarded
//! to the report handler; everything else gets a fixed `Nope!`. This keeps
//! scanners that hit the bare IP address away from the table scan. It is not
//! access control: anyone who knows the DNS name gets through.

use aws_lambda_events::event::alb::AlbTargetGroupResponse;

use crate::contract::{alb_response, TEXT_PLAIN};

pub const HTTP_LISTENER_PORT: u16 = 80;
pub const REPORT_RULE_PRIORITY: u32 = 1;
pub const REJECTION_BODY: &str = "Nope!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    /// The DNS name the load balancer was assigned at deploy time.
    OwnDnsName,
    Exact(String),
}

impl HostPattern {
    fn matches(&self, host: &str, own_dns_name: &str) -> bool {
        let expected = match self {
            Self::OwnDnsName => own_dns_name,
            Self::Exact(value) => value.as_str(),
        };
        strip_port(host).eq_ignore_ascii_case(expected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerAction {
    ForwardToReport,
    FixedResponse {
        status_code: u16,
        content_type: String,
        body: String,
    },
}

impl ListenerAction {
    pub fn fixed_rejection() -> Self {
        Self::FixedResponse {
            status_code: 200,
            content_type: TEXT_PLAIN.to_string(),
            body: REJECTION_BODY.to_string(),
        }
    }

    /// The response the load balancer answers with itself, if any.
    pub fn fixed_response(&self) -> Option<AlbTargetGroupResponse> {
        match self {
            Self::ForwardToReport => None,
            Self::FixedResponse {
                status_code,
                content_type,
                body,
            } => Some(alb_response(*status_code, content_type, body.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerRule {
    pub name: String,
    pub priority: u32,
    pub host_headers: Vec<HostPattern>,
    pub action: ListenerAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub port: u16,
    pub rules: Vec<ListenerRule>,
    pub default_action: ListenerAction,
}

impl Listener {
    pub fn report_listener() -> Self {
        Self {
            port: HTTP_LISTENER_PORT,
            rules: vec![ListenerRule {
                name: "EnsureHasHostHeader".to_string(),
                priority: REPORT_RULE_PRIORITY,
                host_headers: vec![HostPattern::OwnDnsName],
                action: ListenerAction::ForwardToReport,
            }],
            default_action: ListenerAction::fixed_rejection(),
        }
    }

    /// Rules are evaluated by ascending priority; the first match wins and a
    /// request without a `Host` header only ever reaches the default action.
    pub fn route(&self, host: Option<&str>, own_dns_name: &str) -> &ListenerAction {
        let Some(host) = host else {
            return &self.default_action;
        };

        let mut rules: Vec<&ListenerRule> = self.rules.iter().collect();
        rules.sort_by_key(|rule| rule.priority);

        rules
            .into_iter()
            .find(|rule| {
                rule.host_headers
                    .iter()
                    .any(|pattern| pattern.matches(host, own_dns_name))
            })
            .map(|rule| &rule.action)
            .unwrap_or(&self.default_action)
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{response_content_type, response_text};

    const DNS_NAME: &str = "reporter-1234.eu-west-1.elb.amazonaws.com";

    #[test]
    fn matching_host_is_forwarded() {
        let listener = Listener::report_listener();
        assert_eq!(
            listener.route(Some(DNS_NAME), DNS_NAME),
            &ListenerAction::ForwardToReport
        );
    }

    #[test]
    fn host_match_ignores_case_and_port() {
        let listener = Listener::report_listener();
        let host = "Reporter-1234.EU-WEST-1.elb.amazonaws.com:80";
        assert_eq!(
            listener.route(Some(host), DNS_NAME),
            &ListenerAction::ForwardToReport
        );
    }

    #[test]
    fn other_hosts_get_fixed_nope() {
        let listener = Listener::report_listener();

        for host in [Some("203.0.113.10"), Some("example.com"), None] {
            let action = listener.route(host, DNS_NAME);
            let response = action
                .fixed_response()
                .expect("non-matching hosts should not be forwarded");
            assert_eq!(response.status_code, 200);
            assert_eq!(response_text(&response), Some("Nope!"));
            assert_eq!(response_content_type(&response), Some("text/plain"));
        }
    }

    #[test]
    fn lower_priority_number_wins() {
        let mut listener = Listener::report_listener();
        listener.rules.push(ListenerRule {
            name: "Maintenance".to_string(),
            priority: 0,
            host_headers: vec![HostPattern::OwnDnsName],
            action: ListenerAction::FixedResponse {
                status_code: 503,
                content_type: TEXT_PLAIN.to_string(),
                body: "maintenance".to_string(),
            },
        });

        let response = listener
            .route(Some(DNS_NAME), DNS_NAME)
            .fixed_response()
            .expect("maintenance rule should answer");
        assert_eq!(response.status_code, 503);
    }

    #[test]
    fn exact_pattern_matches_literal_host() {
        let mut listener = Listener::report_listener();
        listener.rules[0]
            .host_headers
            .push(HostPattern::Exact("reports.example.com".to_string()));

        assert_eq!(
            listener.route(Some("reports.example.com"), DNS_NAME),
            &ListenerAction::ForwardToReport
        );
    }
}
