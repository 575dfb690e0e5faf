//! Lookup table from content type to notification adapter.

use super::adapter::{
    ActivityAdapter, Adapter, CommentAdapter, CommunityAdapter, InviteAdapter,
    JoinRequestAdapter, MessageAdapter, UserAdapter,
};
use crate::model::content::ContentType;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateContentType(ContentType),
    UnregisteredContentType(ContentType),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateContentType(value) => {
                write!(f, "adapter already registered for {value}")
            }
            Self::UnregisteredContentType(value) => write!(f, "no adapter registered for {value}"),
        }
    }
}

impl Error for RegistryError {}

/// Adapters keyed by the content type they render.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<ContentType, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one adapter per content type.
    pub fn with_defaults() -> Self {
        let mut adapters: BTreeMap<ContentType, Arc<dyn Adapter>> = BTreeMap::new();
        for content_type in ContentType::ALL {
            let adapter: Arc<dyn Adapter> = match content_type {
                ContentType::Post | ContentType::Photo | ContentType::Event | ContentType::Poll => {
                    Arc::new(ActivityAdapter::new(content_type))
                }
                ContentType::Comment => Arc::new(CommentAdapter),
                ContentType::Message => Arc::new(MessageAdapter),
                ContentType::User => Arc::new(UserAdapter),
                ContentType::JoinRequest => Arc::new(JoinRequestAdapter),
                ContentType::Invite => Arc::new(InviteAdapter),
                ContentType::Community => Arc::new(CommunityAdapter),
            };
            adapters.insert(content_type, adapter);
        }
        Self { adapters }
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> Result<(), RegistryError> {
        let content_type = adapter.content_type();
        if self.adapters.contains_key(&content_type) {
            return Err(RegistryError::DuplicateContentType(content_type));
        }
        self.adapters.insert(content_type, adapter);
        Ok(())
    }

    pub fn get(&self, content_type: ContentType) -> Result<Arc<dyn Adapter>, RegistryError> {
        self.adapters
            .get(&content_type)
            .cloned()
            .ok_or(RegistryError::UnregisteredContentType(content_type))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{AdapterRegistry, RegistryError};
    use crate::notifications::adapter::MessageAdapter;
    use crate::model::content::ContentType;
    use std::sync::Arc;

    #[test]
    fn defaults_cover_every_content_type() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.len(), ContentType::ALL.len());
        for content_type in ContentType::ALL {
            let adapter = registry.get(content_type).expect("adapter");
            assert_eq!(adapter.content_type(), content_type);
        }
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(MessageAdapter)).expect("first");
        let err = registry
            .register(Arc::new(MessageAdapter))
            .expect_err("duplicate");
        assert_eq!(err, RegistryError::DuplicateContentType(ContentType::Message));
    }

    #[test]
    fn get_reports_unregistered_type() {
        let registry = AdapterRegistry::new();
        let err = registry.get(ContentType::Post).err().expect("missing");
        assert_eq!(err, RegistryError::UnregisteredContentType(ContentType::Post));
    }
}
