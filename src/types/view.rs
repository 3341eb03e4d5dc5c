use chrono::{DateTime, Duration, Utc};
use std::net::IpAddr;

use crate::types::account::AccountId;

/// Repeat visits by the same viewer inside this window count once.
pub const VIEW_WINDOW_HOURS: i64 = 1;

/// Who looked at a question: a signed-in account or, failing that, a client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Account(AccountId),
    Address(String),
}

impl Viewer {
    pub fn identify(account: Option<AccountId>, address: Option<String>) -> Option<Self> {
        match (account, address) {
            (Some(id), _) => Some(Viewer::Account(id)),
            (None, Some(address)) => Some(Viewer::Address(address)),
            (None, None) => None,
        }
    }
}

/// Picks the client address, preferring the first `X-Forwarded-For` hop when it is an IP.
pub fn client_address(forwarded_for: Option<&str>, remote: Option<String>) -> Option<String> {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
        .map(|address| address.to_string())
        .or(remote)
}

pub fn should_record_view(last_view: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_view {
        None => true,
        Some(last) => now - last > Duration::hours(VIEW_WINDOW_HOURS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_view_is_recorded() {
        assert!(should_record_view(None, Utc::now()));
    }

    #[test]
    fn views_within_the_hour_count_once() {
        let now = Utc::now();
        assert!(!should_record_view(Some(now - Duration::minutes(59)), now));
        assert!(should_record_view(Some(now - Duration::minutes(61)), now));
    }

    #[test]
    fn forwarded_address_wins() {
        assert_eq!(
            client_address(Some("203.0.113.7, 10.0.0.1"), Some("10.0.0.2".to_string())),
            Some("203.0.113.7".to_string())
        );
        assert_eq!(
            client_address(Some(" "), Some("10.0.0.2".to_string())),
            Some("10.0.0.2".to_string())
        );
        assert_eq!(client_address(None, None), None);
    }

    #[test]
    fn forwarded_hop_must_be_an_ip() {
        let remote = Some("10.0.0.2".to_string());
        let long = "x".repeat(60);
        assert_eq!(client_address(Some(&long), remote.clone()), remote);
        assert_eq!(client_address(Some("unknown, 10.0.0.1"), remote.clone()), remote);
        assert_eq!(
            client_address(Some("2001:db8::1"), remote),
            Some("2001:db8::1".to_string())
        );
    }

    #[test]
    fn accounts_take_precedence_over_addresses() {
        assert_eq!(
            Viewer::identify(Some(AccountId(3)), Some("10.0.0.2".to_string())),
            Some(Viewer::Account(AccountId(3)))
        );
        assert_eq!(Viewer::identify(None, None), None);
    }
}
