use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Splits a `style` attribute into `(property, value)` pairs.
///
/// Fragments without a `:` are dropped, as are fragments with an empty property
/// name. When a property repeats, the last value wins but the property keeps the
/// position of its first occurrence.
pub fn parse_style_declarations(style: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for fragment in style.split(';') {
        let Some((name, value)) = fragment.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().to_string();
        match out.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = value,
            None => out.push((name.to_string(), value)),
        }
    }
    out
}

/// Declarations of one node's `style` attribute plus a shared link to the
/// mapping of its container. Lookups fall through the parent chain.
#[derive(Debug, Clone, Default)]
pub struct StyleMapping {
    local: Vec<(String, String)>,
    parent: Option<Arc<StyleMapping>>,
}

impl StyleMapping {
    /// A root mapping (no parent) built from a `style` attribute.
    pub fn parse(style: &str) -> Self {
        Self {
            local: parse_style_declarations(style),
            parent: None,
        }
    }

    /// Mapping for an element nested inside the element owning `parent`.
    pub fn child_of(parent: Option<&Arc<StyleMapping>>, style: &str) -> Self {
        Self {
            local: parse_style_declarations(style),
            parent: parent.cloned(),
        }
    }

    pub fn parent(&self) -> Option<&StyleMapping> {
        self.parent.as_deref()
    }

    /// Local value first, then the nearest ancestor defining `property`.
    pub fn get(&self, property: &str) -> Option<&str> {
        let mut current = Some(self);
        while let Some(mapping) = current {
            if let Some((_, value)) = mapping.local.iter().find(|(name, _)| name == property) {
                return Some(value.as_str());
            }
            current = mapping.parent.as_deref();
        }
        None
    }

    pub fn lookup<'a>(&'a self, property: &str, default: &'a str) -> &'a str {
        self.get(property).unwrap_or(default)
    }

    /// Like [`StyleMapping::get`] but with any leading `#` removed.
    pub fn lookup_color(&self, property: &str) -> Option<&str> {
        self.get(property)
            .map(|value| value.strip_prefix('#').unwrap_or(value))
    }

    /// Every property visible at this node, each exactly once. Local names come
    /// first, then ancestors' names nearest-first.
    pub fn keys(&self) -> Vec<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(mapping) = current {
            for (name, _) in &mapping.local {
                if seen.insert(name.as_str()) {
                    out.push(name.as_str());
                }
            }
            current = mapping.parent.as_deref();
        }
        out
    }

    /// Canonical form of the effective cascade: sorted, shadowing resolved.
    pub fn effective(&self) -> StyleKey {
        let mut pairs: Vec<(String, String)> = self
            .keys()
            .into_iter()
            .filter_map(|name| {
                self.get(name)
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        pairs.sort();
        StyleKey(pairs)
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_deref();
        while let Some(mapping) = current {
            depth += 1;
            current = mapping.parent.as_deref();
        }
        depth
    }
}

impl PartialEq for StyleMapping {
    fn eq(&self, other: &Self) -> bool {
        self.effective() == other.effective()
    }
}

impl Eq for StyleMapping {}

impl Hash for StyleMapping {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.effective().hash(state);
    }
}

/// Sorted effective `(property, value)` pairs of a cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleKey(Vec<(String, String)>);

impl StyleKey {
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.0
            .binary_search_by(|(name, _)| name.as_str().cmp(property))
            .ok()
            .map(|idx| self.0[idx].1.as_str())
    }

    /// Stable short identifier, identical across runs for identical cascades.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.0 {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0xffu8]);
        }
        let digest = hasher.finalize();
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for StyleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, (name, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_keeps_well_formed_fragments() {
        assert_eq!(parse_style_declarations("key: value"), pairs(&[("key", "value")]));
        assert_eq!(parse_style_declarations("key: value;"), pairs(&[("key", "value")]));
        assert_eq!(
            parse_style_declarations("key: value; k: v"),
            pairs(&[("key", "value"), ("k", "v")])
        );
        assert!(parse_style_declarations("invalid; style").is_empty());
        assert_eq!(
            parse_style_declarations("partially: valid; style"),
            pairs(&[("partially", "valid")])
        );
    }

    #[test]
    fn parse_splits_on_first_colon_and_last_value_wins() {
        let parsed = parse_style_declarations(
            "background: url(http://x/y.png); color: red; : orphan; color: blue",
        );
        assert_eq!(
            parsed,
            pairs(&[("background", "url(http://x/y.png)"), ("color", "blue")])
        );
    }

    #[test]
    fn lookup_walks_the_parent_chain() {
        let parent = Arc::new(StyleMapping::parse("parent: mother"));
        let child = StyleMapping::child_of(Some(&parent), "child: daughter");
        assert_eq!(child.get("parent"), Some("mother"));
        assert_eq!(child.lookup("missing", "fallback"), "fallback");
        let mut keys = child.keys();
        keys.sort();
        assert_eq!(keys, vec!["child", "parent"]);
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn child_definitions_shadow_ancestors() {
        let parent = Arc::new(StyleMapping::parse("parent: mother; child: son"));
        let child = StyleMapping::child_of(Some(&parent), "child: daughter");
        assert_eq!(child.get("parent"), Some("mother"));
        assert_eq!(child.get("child"), Some("daughter"));
        let mut keys = child.keys();
        keys.sort();
        assert_eq!(keys, vec!["child", "parent"]);
        assert_eq!(
            child.effective().pairs(),
            pairs(&[("child", "daughter"), ("parent", "mother")]).as_slice()
        );
    }

    #[test]
    fn color_lookup_strips_hash() {
        let mapping = StyleMapping::parse("color: #ff0000; background-color: 00ff00");
        assert_eq!(mapping.lookup_color("color"), Some("ff0000"));
        assert_eq!(mapping.lookup_color("background-color"), Some("00ff00"));
        assert_eq!(mapping.lookup_color("border-left-color"), None);
    }

    #[test]
    fn equality_uses_the_effective_cascade() {
        let table = Arc::new(StyleMapping::parse("font-weight: bold"));
        let inherited = StyleMapping::child_of(Some(&table), "color: red");
        let flat = StyleMapping::parse("color: red; font-weight: bold");
        assert_eq!(inherited, flat);
        assert_eq!(inherited.effective().fingerprint(), flat.effective().fingerprint());

        let other = StyleMapping::parse("color: red");
        assert_ne!(inherited, other);
        assert_ne!(inherited.effective().fingerprint(), other.effective().fingerprint());
    }

    #[test]
    fn style_key_lookup_and_display() {
        let key = StyleMapping::parse("z-index: 2; color: red").effective();
        assert_eq!(key.get("color"), Some("red"));
        assert_eq!(key.get("font"), None);
        assert_eq!(key.to_string(), "color: red; z-index: 2");
    }
}
