use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

pub const SUBJECT_HEADER: &str = "x-callabo-subject";
pub const EMAIL_HEADER: &str = "x-callabo-email";
pub const NAME_HEADER: &str = "x-callabo-name";

/// An authenticated caller as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Subject {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), email: None, name: None }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Who is calling. `None` means anonymous.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_subject(&self) -> Option<Subject>;
}

/// A fixed caller, or nobody.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Subject>);

impl StaticIdentity {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn subject(subject: Subject) -> Self {
        Self(Some(subject))
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_subject(&self) -> Option<Subject> {
        self.0.clone()
    }
}

/// Caller identity forwarded by an authenticating proxy in request headers.
#[derive(Debug, Clone, Default)]
pub struct HeaderIdentity(Option<Subject>);

impl HeaderIdentity {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let subject = value(SUBJECT_HEADER).map(|id| Subject {
            id,
            email: value(EMAIL_HEADER),
            name: value(NAME_HEADER),
        });
        Self(subject)
    }
}

#[async_trait]
impl IdentityProvider for HeaderIdentity {
    async fn current_subject(&self) -> Option<Subject> {
        self.0.clone()
    }
}
