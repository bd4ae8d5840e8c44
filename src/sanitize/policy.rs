//! Allowlist configuration for the HTML sanitizer.
//!
//! A policy lists the markup that may survive sanitization. Everything that is
//! not listed is removed: tags, attributes and URL schemes are never permitted
//! by default.
//!
//! Disallowed tags are handled uniformly. The tag and all of its attributes are
//! removed and its inner text is kept, except for the tags listed as
//! *content-dropping* (`script`, `style`, `iframe`, ...), whose whole subtree
//! is discarded.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Tags permitted by the blog's rich-text policy.
pub const DEFAULT_ALLOWED_TAGS: &[&str] = &[
    "p",
    "br",
    "strong",
    "em",
    "u",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "a",
    "blockquote",
    "code",
    "pre",
    "div",
];

/// Attributes permitted on any surviving tag.
pub const DEFAULT_GENERIC_ATTRIBUTES: &[&str] = &["title"];

/// URL schemes permitted in link-like attributes.
pub const DEFAULT_URL_SCHEMES: &[&str] = &["http", "https"];

/// Tags removed together with everything inside them.
pub const DEFAULT_CONTENT_DROPPING_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "noembed", "noframes", "template",
    "textarea", "xmp",
];

/// Invalid policy definitions rejected by [`PolicyBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A tag was both allowed and marked as content-dropping.
    ConflictingTag(&'static str),
    /// Tag-specific attributes were declared for a tag that is not allowed.
    UnlistedTag(&'static str),
    /// Inline event handlers (`on*`) can never be allowlisted.
    EventHandlerAttribute(&'static str),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::ConflictingTag(tag) => {
                write!(f, "tag <{tag}> cannot be both allowed and content-dropping")
            }
            PolicyError::UnlistedTag(tag) => {
                write!(f, "attributes declared for tag <{tag}> which is not allowed")
            }
            PolicyError::EventHandlerAttribute(attr) => {
                write!(f, "event handler attribute '{attr}' cannot be allowed")
            }
        }
    }
}

impl std::error::Error for PolicyError {}

/// Immutable allowlist of tags, attributes and URL schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationPolicy {
    allowed_tags: BTreeSet<&'static str>,
    generic_attributes: BTreeSet<&'static str>,
    tag_attributes: BTreeMap<&'static str, BTreeSet<&'static str>>,
    url_schemes: BTreeSet<&'static str>,
    content_dropping_tags: BTreeSet<&'static str>,
}

impl SanitizationPolicy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    pub fn allowed_tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.allowed_tags.iter().copied()
    }

    pub fn generic_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.generic_attributes.iter().copied()
    }

    pub fn tag_attributes(
        &self,
    ) -> impl Iterator<Item = (&'static str, impl Iterator<Item = &'static str> + '_)> + '_ {
        self.tag_attributes
            .iter()
            .map(|(tag, attrs)| (*tag, attrs.iter().copied()))
    }

    pub fn url_schemes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.url_schemes.iter().copied()
    }

    pub fn content_dropping_tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.content_dropping_tags.iter().copied()
    }
}

/// The rich-text policy used for every blog payload: basic formatting,
/// headings, lists, quotes, code and `http(s)` links.
impl Default for SanitizationPolicy {
    fn default() -> Self {
        SanitizationPolicy {
            allowed_tags: DEFAULT_ALLOWED_TAGS.iter().copied().collect(),
            generic_attributes: DEFAULT_GENERIC_ATTRIBUTES.iter().copied().collect(),
            tag_attributes: BTreeMap::from([("a", BTreeSet::from(["href"]))]),
            url_schemes: DEFAULT_URL_SCHEMES.iter().copied().collect(),
            content_dropping_tags: DEFAULT_CONTENT_DROPPING_TAGS.iter().copied().collect(),
        }
    }
}

/// Builder for custom policies. Starts empty: nothing is allowed and nothing
/// drops content until listed.
#[derive(Debug, Default, Clone)]
pub struct PolicyBuilder {
    allowed_tags: BTreeSet<&'static str>,
    generic_attributes: BTreeSet<&'static str>,
    tag_attributes: BTreeMap<&'static str, BTreeSet<&'static str>>,
    url_schemes: BTreeSet<&'static str>,
    content_dropping_tags: BTreeSet<&'static str>,
}

impl PolicyBuilder {
    pub fn allow_tags(mut self, tags: impl IntoIterator<Item = &'static str>) -> Self {
        self.allowed_tags.extend(tags);
        self
    }

    pub fn allow_attributes(mut self, attrs: impl IntoIterator<Item = &'static str>) -> Self {
        self.generic_attributes.extend(attrs);
        self
    }

    pub fn allow_tag_attributes(
        mut self,
        tag: &'static str,
        attrs: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        self.tag_attributes.entry(tag).or_default().extend(attrs);
        self
    }

    pub fn allow_url_schemes(mut self, schemes: impl IntoIterator<Item = &'static str>) -> Self {
        self.url_schemes.extend(schemes);
        self
    }

    pub fn drop_content_of(mut self, tags: impl IntoIterator<Item = &'static str>) -> Self {
        self.content_dropping_tags.extend(tags);
        self
    }

    pub fn build(self) -> Result<SanitizationPolicy, PolicyError> {
        if let Some(tag) = self
            .allowed_tags
            .intersection(&self.content_dropping_tags)
            .next()
        {
            return Err(PolicyError::ConflictingTag(*tag));
        }

        if let Some(tag) = self
            .tag_attributes
            .keys()
            .find(|tag| !self.allowed_tags.contains(*tag))
        {
            return Err(PolicyError::UnlistedTag(*tag));
        }

        let all_attributes = self
            .generic_attributes
            .iter()
            .chain(self.tag_attributes.values().flatten());
        for attr in all_attributes {
            if attr.len() > 2 && attr.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("on")) {
                return Err(PolicyError::EventHandlerAttribute(*attr));
            }
        }

        Ok(SanitizationPolicy {
            allowed_tags: self.allowed_tags,
            generic_attributes: self.generic_attributes,
            tag_attributes: self.tag_attributes,
            url_schemes: self.url_schemes,
            content_dropping_tags: self.content_dropping_tags,
        })
    }
}
