use super::{ResourceError, ResourceProvider, SharedResourceData};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Resources registered ahead of time under a path key.
#[derive(Debug, Default)]
pub struct InMemoryResourceProvider {
    resources: RwLock<HashMap<String, SharedResourceData>>,
}

impl InMemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` under `path`, replacing anything already there.
    ///
    /// Fails only if the store's lock is poisoned.
    pub fn add(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<(), ResourceError> {
        let path = path.into();
        let mut resources = self.resources.write().map_err(|_| ResourceError::LoadFailed {
            path: path.clone(),
            message: "resource store lock poisoned".to_string(),
        })?;
        resources.insert(path, Arc::new(data.into()));
        Ok(())
    }

    pub fn remove(&self, path: &str) -> Option<SharedResourceData> {
        self.resources.write().ok()?.remove(path)
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.resources.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceProvider for InMemoryResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let resources = self.resources.read().map_err(|_| ResourceError::LoadFailed {
            path: path.to_string(),
            message: "resource store lock poisoned".to_string(),
        })?;
        resources
            .get(path)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.resources
            .read()
            .map(|r| r.contains_key(path))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "InMemoryResourceProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_load_and_overwrite() {
        let provider = InMemoryResourceProvider::new();
        provider.add("books.xsl", "<original/>").unwrap();
        provider.add("books.xsl", "<updated/>").unwrap();

        assert_eq!(&*provider.load("books.xsl").unwrap(), b"<updated/>");
        assert_eq!(provider.len(), 1);
        assert!(provider.exists("books.xsl"));
    }

    #[test]
    fn test_missing_and_removed() {
        let provider = InMemoryResourceProvider::new();
        assert!(matches!(provider.load("nope.xsl"), Err(ResourceError::NotFound(_))));

        provider.add("gone.xsl", Vec::<u8>::new()).unwrap();
        assert!(provider.remove("gone.xsl").is_some());
        assert!(!provider.exists("gone.xsl"));
        assert!(provider.is_empty());
    }
}
