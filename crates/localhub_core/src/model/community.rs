//! Communities (tenants) and their memberships.
//!
//! # Invariants
//! - `domain` is a valid host name, unique case-insensitively.
//! - One membership per `(user, community)` pair.
//! - Role hierarchy is `admin ⊇ moderator ⊇ member`.

use super::{now_ms, require_text, ValidationError};
use crate::text::extract_hashtags;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type CommunityId = Uuid;

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(localhost|([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\.?)$")
        .expect("valid domain regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub domain: String,
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub terms: String,
    pub content_warning_tags: String,
    pub email_domain: Option<String>,
    pub public: bool,
    pub active: bool,
    pub admin_id: Option<Uuid>,
    pub blacklisted_email_domains: String,
    pub blacklisted_email_addresses: String,
    pub created: i64,
    pub updated: i64,
}

impl Community {
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            name: name.into(),
            tagline: String::new(),
            description: String::new(),
            terms: String::new(),
            content_warning_tags: "#nsfw".to_string(),
            email_domain: None,
            public: true,
            active: true,
            admin_id: None,
            blacklisted_email_domains: String::new(),
            blacklisted_email_addresses: String::new(),
            created: now,
            updated: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, 255)?;
        if !is_valid_domain(&self.domain) {
            return Err(ValidationError::InvalidDomain(self.domain.clone()));
        }
        if let Some(email_domain) = self.email_domain.as_deref() {
            if !is_valid_domain(email_domain) {
                return Err(ValidationError::InvalidDomain(email_domain.to_string()));
            }
        }
        Ok(())
    }

    /// Email domain if configured, else the community domain.
    pub fn email_domain(&self) -> &str {
        self.email_domain
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(&self.domain)
    }

    pub fn absolute_url(&self) -> String {
        format!("http://{}", self.domain)
    }

    /// Joins a site-relative path onto the community URL.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.absolute_url(), path.trim_start_matches('/'))
    }

    /// Builds a full address from a local part, e.g. `no-reply@example.com`.
    pub fn resolve_email(&self, local_part: &str) -> String {
        format!("{local_part}@{}", self.email_domain())
    }

    /// Tags that hide content behind a warning by default.
    pub fn content_warning_tags(&self) -> BTreeSet<String> {
        extract_hashtags(&self.content_warning_tags)
    }

    /// Checks whether an address or its domain is blacklisted.
    pub fn is_email_blacklisted(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        if self
            .blacklisted_email_addresses
            .split_whitespace()
            .any(|address| address.to_lowercase() == email)
        {
            return true;
        }
        let Some((_, domain)) = email.split_once('@') else {
            return false;
        };
        self.blacklisted_email_domains
            .split_whitespace()
            .any(|blocked| blocked.to_lowercase() == domain)
    }
}

pub fn is_valid_domain(value: &str) -> bool {
    value.len() <= 100 && DOMAIN_RE.is_match(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "member" => Some(Self::Member),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Admins have moderator rights; moderators have member rights.
    pub fn includes(self, other: Role) -> bool {
        self >= other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub community_id: CommunityId,
    pub role: Role,
    pub active: bool,
    pub created: i64,
}

impl Membership {
    pub fn new(user_id: Uuid, community_id: CommunityId, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            community_id,
            role,
            active: true,
            created: now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_domain, Community, Role};

    #[test]
    fn resolves_urls_and_emails_against_domain() {
        let mut community = Community::new("demo.localhub.social", "Demo");
        assert_eq!(
            community.resolve_url("/posts/1/"),
            "http://demo.localhub.social/posts/1/"
        );
        assert_eq!(
            community.resolve_email("no-reply"),
            "no-reply@demo.localhub.social"
        );
        community.email_domain = Some("mail.example.com".to_string());
        assert_eq!(community.resolve_email("no-reply"), "no-reply@mail.example.com");
    }

    #[test]
    fn blacklist_matches_address_or_domain_case_insensitively() {
        let mut community = Community::new("example.com", "Example");
        community.blacklisted_email_addresses = "Spammer@Gmail.com".to_string();
        community.blacklisted_email_domains = "bad.org  worse.net".to_string();
        assert!(community.is_email_blacklisted("spammer@gmail.com "));
        assert!(community.is_email_blacklisted("anyone@WORSE.net"));
        assert!(!community.is_email_blacklisted("friend@gmail.com"));
    }

    #[test]
    fn content_warning_tags_default_to_nsfw() {
        let community = Community::new("example.com", "Example");
        assert!(community.content_warning_tags().contains("nsfw"));
    }

    #[test]
    fn domain_validation() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("localhost"));
        assert!(!is_valid_domain("not a domain"));
        assert!(!is_valid_domain("http://example.com"));
    }

    #[test]
    fn role_hierarchy() {
        assert!(Role::Admin.includes(Role::Moderator));
        assert!(Role::Moderator.includes(Role::Member));
        assert!(!Role::Member.includes(Role::Moderator));
    }
}
