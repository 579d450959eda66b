//! Language analyzer registry.
//!
//! Central registration point for all language analyzers. The registry
//! is initialized once at startup and provides thread-safe access to
//! language-specific analyzers. A language with no registered analyzer
//! falls through to the chunker's line-based fallback path.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::LanguageAnalyzer;
use crate::types::Language;

/// Global registry instance.
static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Get the global language analyzer registry.
pub fn global_registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Registry of language analyzers.
pub struct Registry {
    analyzers: HashMap<Language, Box<dyn LanguageAnalyzer>>,
}

impl Registry {
    /// Create a new registry with every available analyzer registered.
    fn new() -> Self {
        use super::languages::{
            c, cpp, csharp, css, document, go, java, javascript, kotlin, php, python, ruby, rust,
            swift, typescript,
        };

        let mut analyzers: HashMap<Language, Box<dyn LanguageAnalyzer>> = HashMap::new();

        analyzers.insert(Language::Python, Box::new(python::PythonAnalyzer));
        analyzers.insert(Language::Rust, Box::new(rust::RustAnalyzer));
        analyzers.insert(Language::TypeScript, Box::new(typescript::TypeScriptAnalyzer));
        analyzers.insert(Language::JavaScript, Box::new(javascript::JavaScriptAnalyzer));
        analyzers.insert(Language::Go, Box::new(go::GoAnalyzer));
        analyzers.insert(Language::Java, Box::new(java::JavaAnalyzer));
        analyzers.insert(Language::C, Box::new(c::CAnalyzer));
        analyzers.insert(Language::Cpp, Box::new(cpp::CppAnalyzer));
        analyzers.insert(Language::CSharp, Box::new(csharp::CSharpAnalyzer));
        analyzers.insert(Language::Css, Box::new(css::CssAnalyzer));
        analyzers.insert(Language::Ruby, Box::new(ruby::RubyAnalyzer));
        analyzers.insert(Language::Php, Box::new(php::PhpAnalyzer));
        analyzers.insert(Language::Swift, Box::new(swift::SwiftAnalyzer));
        analyzers.insert(Language::Kotlin, Box::new(kotlin::KotlinAnalyzer));

        // Document formats use section-based text splitting rather than a
        // tree-sitter grammar; one analyzer instance per format tag.
        for lang in [
            Language::Markdown,
            Language::Toml,
            Language::Yaml,
            Language::Json,
            Language::Html,
            Language::Shell,
        ] {
            analyzers.insert(lang, Box::new(document::DocumentAnalyzer::new(lang)));
        }

        Self { analyzers }
    }

    /// Get the analyzer for a given language.
    pub fn get(&self, language: Language) -> Option<&dyn LanguageAnalyzer> {
        self.analyzers.get(&language).map(std::convert::AsRef::as_ref)
    }

    /// List all registered languages.
    pub fn languages(&self) -> Vec<Language> {
        self.analyzers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_every_code_language() {
        let reg = global_registry();
        for lang in [
            Language::Python,
            Language::Rust,
            Language::TypeScript,
            Language::JavaScript,
            Language::Go,
            Language::Java,
            Language::C,
            Language::Cpp,
            Language::CSharp,
            Language::Css,
            Language::Ruby,
            Language::Php,
            Language::Swift,
            Language::Kotlin,
        ] {
            assert!(reg.get(lang).is_some(), "missing analyzer for {lang}");
        }
    }

    #[test]
    fn test_registry_has_document_formats() {
        let reg = global_registry();
        assert!(reg.get(Language::Markdown).is_some());
        assert!(reg.get(Language::Json).is_some());
    }

    #[test]
    fn test_registry_returns_none_for_unknown() {
        let reg = global_registry();
        assert!(reg.get(Language::Unknown).is_none());
    }
}
