//! Element registry
//!
//! Custom element definitions and the set of element kinds allowed to host
//! a shadow. Defining a custom element makes it attach-eligible.

use std::collections::{HashMap, HashSet};

use crate::{ShadowError, ShadowResult};

/// Built-in element kinds that may host a shadow
pub const DEFAULT_ATTACHABLE: &[&str] = &[
    "article", "aside", "blockquote", "body", "div", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "main", "nav", "p", "section", "span",
];

const RESERVED: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Custom element definition
#[derive(Debug, Clone, Default)]
pub struct ElementDefinition {
    pub name: String,
    /// Refuse shadow attachment even though the name is defined
    pub disable_shadow: bool,
}

#[derive(Debug)]
pub struct ElementRegistry {
    definitions: HashMap<String, ElementDefinition>,
    attachable: HashSet<String>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            attachable: DEFAULT_ATTACHABLE.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Define a custom element. `definition.name` is overwritten with `name`.
    pub fn define(&mut self, name: &str, mut definition: ElementDefinition) -> ShadowResult<()> {
        if !Self::is_valid_name(name) {
            return Err(ShadowError::NotSupported(format!("'{}' is not a valid custom element name", name)));
        }
        if self.definitions.contains_key(name) {
            return Err(ShadowError::NotSupported(format!("'{}' is already defined", name)));
        }

        definition.name = name.to_string();
        if !definition.disable_shadow {
            self.attachable.insert(name.to_string());
        }
        tracing::debug!("defined custom element {}", name);
        self.definitions.insert(name.to_string(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ElementDefinition> {
        self.definitions.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// May an element of this kind host a shadow
    pub fn can_attach(&self, local_name: &str) -> bool {
        self.attachable.contains(local_name)
    }

    fn is_valid_name(name: &str) -> bool {
        name.contains('-')
            && name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
            && !name.chars().any(|c| c.is_ascii_uppercase())
            && !RESERVED.contains(&name)
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(ElementRegistry::is_valid_name("my-element"));
        assert!(ElementRegistry::is_valid_name("app-header"));
        assert!(!ElementRegistry::is_valid_name("myelement")); // no hyphen
        assert!(!ElementRegistry::is_valid_name("My-Element"));
        assert!(!ElementRegistry::is_valid_name("-element"));
        assert!(!ElementRegistry::is_valid_name("font-face"));
    }

    #[test]
    fn test_define() {
        let mut registry = ElementRegistry::new();
        assert!(!registry.can_attach("my-element"));

        registry.define("my-element", ElementDefinition::default()).unwrap();
        assert!(registry.is_defined("my-element"));
        assert!(registry.can_attach("my-element"));
        assert_eq!(registry.get("my-element").unwrap().name, "my-element");

        assert!(matches!(
            registry.define("my-element", ElementDefinition::default()),
            Err(ShadowError::NotSupported(_))
        ));
        assert!(matches!(
            registry.define("plain", ElementDefinition::default()),
            Err(ShadowError::NotSupported(_))
        ));
    }

    #[test]
    fn test_defaults_and_disabled_shadow() {
        let mut registry = ElementRegistry::new();
        for name in ["div", "span", "h3", "body", "blockquote"] {
            assert!(registry.can_attach(name), "{name}");
        }
        assert!(!registry.can_attach("input"));
        assert!(!registry.can_attach("slot"));

        let definition = ElementDefinition {
            disable_shadow: true,
            ..Default::default()
        };
        registry.define("no-shadow", definition).unwrap();
        assert!(registry.is_defined("no-shadow"));
        assert!(!registry.can_attach("no-shadow"));
    }
}
