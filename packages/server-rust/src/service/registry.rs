//! Compilation backend registry: maps languages to compile capabilities.

use std::collections::HashMap;
use std::sync::Arc;

use judge_dispatch_core::Language;

use crate::backend::{toolchain_backend_for, CompileBackend, ToolchainConfig};

/// Result of resolving a stored language string.
#[derive(Clone)]
pub enum Resolution {
    /// A backend is registered; invoke it.
    Compile(Arc<dyn CompileBackend>),
    /// Supported language with no compile step; forward unchanged.
    PassThrough(Language),
    /// Outside the supported set; the request must be dropped.
    Unsupported,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compile(backend) => f.debug_tuple("Compile").field(&backend.name()).finish(),
            Self::PassThrough(lang) => f.debug_tuple("PassThrough").field(lang).finish(),
            Self::Unsupported => f.write_str("Unsupported"),
        }
    }
}

/// Read-only language -> backend mapping, built once at startup.
///
/// Every language in [`Language::ALL`] is supported; only languages with a
/// registered backend get a compile step.
pub struct BackendRegistry {
    backends: HashMap<Language, Arc<dyn CompileBackend>>,
}

impl BackendRegistry {
    /// Create a registry with no backends (every supported language passes through).
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Registry with toolchain backends for the given languages.
    ///
    /// Languages without a toolchain are logged and left as pass-through.
    #[must_use]
    pub fn with_toolchains(languages: &[Language], config: &ToolchainConfig) -> Self {
        let mut registry = Self::new();
        for &language in languages {
            match toolchain_backend_for(language, config) {
                Some(backend) => registry.register(language, backend),
                None => tracing::warn!(%language, "no toolchain for language, leaving as pass-through"),
            }
        }
        registry
    }

    /// Register (or replace) the backend for a language.
    pub fn register(&mut self, language: Language, backend: Arc<dyn CompileBackend>) {
        tracing::info!(%language, backend = backend.name(), "compilation backend registered");
        self.backends.insert(language, backend);
    }

    /// Resolve a stored language string.
    #[must_use]
    pub fn resolve(&self, language: &str) -> Resolution {
        let Some(language) = Language::from_wire(language) else {
            return Resolution::Unsupported;
        };
        match self.backends.get(&language) {
            Some(backend) => Resolution::Compile(Arc::clone(backend)),
            None => Resolution::PassThrough(language),
        }
    }

    /// Languages with a registered backend, sorted.
    #[must_use]
    pub fn compiled_languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self.backends.keys().copied().collect();
        languages.sort();
        languages
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use judge_dispatch_core::{Route, Submission};

    use super::*;
    use crate::backend::CompileError;

    struct NamedBackend(&'static str);

    #[async_trait]
    impl CompileBackend for NamedBackend {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn compile(&self, submission: &Submission, _route: Route) -> Result<Submission, CompileError> {
            Ok(submission.clone())
        }
    }

    #[test]
    fn registered_language_resolves_to_backend() {
        let mut registry = BackendRegistry::new();
        registry.register(Language::Cpp, Arc::new(NamedBackend("fake-cc")));

        match registry.resolve("cpp") {
            Resolution::Compile(backend) => assert_eq!(backend.name(), "fake-cc"),
            other => panic!("expected Compile, got {other:?}"),
        }
    }

    #[test]
    fn supported_without_backend_passes_through() {
        let mut registry = BackendRegistry::new();
        registry.register(Language::Cpp, Arc::new(NamedBackend("fake-cc")));

        for (wire, lang) in [
            ("python", Language::Python),
            ("java", Language::Java),
            ("js", Language::JavaScript),
        ] {
            assert!(matches!(registry.resolve(wire), Resolution::PassThrough(l) if l == lang));
        }
    }

    #[test]
    fn unknown_language_is_unsupported() {
        let registry = BackendRegistry::new();
        assert!(matches!(registry.resolve("ruby"), Resolution::Unsupported));
        assert!(matches!(registry.resolve("Cpp"), Resolution::Unsupported));
        assert!(matches!(registry.resolve(""), Resolution::Unsupported));
    }

    #[test]
    fn with_toolchains_skips_interpreted_languages() {
        let registry = BackendRegistry::with_toolchains(
            &[Language::Cpp, Language::Python],
            &ToolchainConfig::default(),
        );
        assert_eq!(registry.compiled_languages(), vec![Language::Cpp]);
        assert!(matches!(registry.resolve("python"), Resolution::PassThrough(_)));
    }
}
