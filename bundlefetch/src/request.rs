//! Explicit load-request record.
//!
//! Callers build a [`LoadRequest`] instead of threading positional,
//! overloaded arguments through the API; the core never guesses argument
//! identity. A request names either paths or a directory, optionally a
//! bundle (the registry's first-registered session otherwise) and a
//! resource kind.

use crate::source::ResourceKind;

/// One load operation's arguments, fully spelled out.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    /// Target bundle name; `None` routes to the default session.
    pub bundle: Option<String>,
    /// Asset paths to load. Empty when `dir` is set.
    pub paths: Vec<String>,
    /// Directory to load instead of individual paths.
    pub dir: Option<String>,
    /// Resource kind passed through to the source.
    pub kind: Option<ResourceKind>,
}

impl LoadRequest {
    /// Starts a request for the named paths.
    pub fn paths<I, S>(paths: I) -> LoadRequestBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LoadRequestBuilder {
            inner: LoadRequest {
                paths: paths.into_iter().map(Into::into).collect(),
                ..Default::default()
            },
        }
    }

    /// Starts a request for everything under a directory.
    pub fn dir(dir: impl Into<String>) -> LoadRequestBuilder {
        LoadRequestBuilder {
            inner: LoadRequest {
                dir: Some(dir.into()),
                ..Default::default()
            },
        }
    }
}

/// Builder for [`LoadRequest`].
#[derive(Debug, Clone)]
pub struct LoadRequestBuilder {
    inner: LoadRequest,
}

impl LoadRequestBuilder {
    /// Targets a specific bundle.
    pub fn bundle(mut self, name: impl Into<String>) -> Self {
        self.inner.bundle = Some(name.into());
        self
    }

    /// Sets the resource kind.
    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.inner.kind = Some(kind);
        self
    }

    /// Finishes the request.
    pub fn build(self) -> LoadRequest {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_request() {
        let request = LoadRequest::paths(["a.png", "b.png"])
            .bundle("main")
            .kind(ResourceKind::Binary)
            .build();
        assert_eq!(request.paths, vec!["a.png", "b.png"]);
        assert_eq!(request.bundle.as_deref(), Some("main"));
        assert!(request.dir.is_none());
        assert_eq!(request.kind, Some(ResourceKind::Binary));
    }

    #[test]
    fn test_dir_request() {
        let request = LoadRequest::dir("ui").build();
        assert_eq!(request.dir.as_deref(), Some("ui"));
        assert!(request.paths.is_empty());
        assert!(request.bundle.is_none());
    }
}
