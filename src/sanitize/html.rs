use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};

use super::policy::SanitizationPolicy;

/// Cleans a single text value. Implementations must be pure and must never
/// fail: malformed input degrades to plain text.
pub trait TextSanitizer: Send + Sync {
    fn sanitize_text(&self, input: &str) -> String;
}

/// Clean HTML content using the ammonia library, configured from a
/// [`SanitizationPolicy`].
///
/// This is an allowlist strategy: tags, attributes and URL schemes outside the
/// policy are removed, event handlers (`onclick`, ...) never survive, and
/// `javascript:` style links lose their `href`.
///
/// Note:
/// 1. Text without a `<` cannot carry markup and is returned byte-for-byte.
///    This keeps already-encoded entities (`&lt;script&gt;`) and plain prose
///    untouched.
/// 2. Disallowed tags are unwrapped (their text is kept), except the policy's
///    content-dropping tags, which disappear with everything inside them.
/// 3. Links keep exactly the attributes the policy lists; no `rel` is added.
/// 4. The parser swallows one newline right after `<pre>` and the serializer
///    does not write it back, so it is restored here. Without that, every
///    pass over a `<pre>` block would lose a leading line.
pub struct HtmlSanitizer {
    cleaner: Builder<'static>,
}

impl HtmlSanitizer {
    pub fn new(policy: SanitizationPolicy) -> Self {
        let mut cleaner = Builder::default();

        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = policy
            .tag_attributes()
            .map(|(tag, attrs)| (tag, attrs.collect()))
            .collect();

        cleaner
            .tags(policy.allowed_tags().collect())
            .clean_content_tags(policy.content_dropping_tags().collect())
            .generic_attributes(policy.generic_attributes().collect())
            .tag_attributes(tag_attributes)
            .url_schemes(policy.url_schemes().collect())
            .url_relative(UrlRelative::PassThrough)
            .link_rel(None)
            .strip_comments(true);

        HtmlSanitizer { cleaner }
    }

    /// `None` in, `None` out: absence of data is not run through the policy.
    pub fn sanitize_opt(&self, input: Option<&str>) -> Option<String> {
        input.map(|value| self.sanitize_text(value))
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        HtmlSanitizer::new(SanitizationPolicy::default())
    }
}

impl TextSanitizer for HtmlSanitizer {
    fn sanitize_text(&self, input: &str) -> String {
        if input.trim().is_empty() || !contains_markup(input) {
            return input.to_owned();
        }

        restore_pre_newlines(self.cleaner.clean(input).to_string())
    }
}

fn contains_markup(input: &str) -> bool {
    input.contains('<')
}

/// Doubles the newline that opens the text of each `<pre>` element.
///
/// Works on serializer output, where text `<` is always escaped and attribute
/// values are always double-quoted.
fn restore_pre_newlines(html: String) -> String {
    if !html.contains("<pre") {
        return html;
    }

    let mut out = String::with_capacity(html.len() + 8);
    let mut rest = html.as_str();
    while let Some(start) = rest.find("<pre") {
        let after_name = &rest[start + 4..];
        if !after_name.starts_with(['>', ' ']) {
            out.push_str(&rest[..start + 4]);
            rest = after_name;
            continue;
        }

        let Some(tag_len) = start_tag_len(after_name) else {
            break;
        };
        let body = start + 4 + tag_len;
        out.push_str(&rest[..body]);
        if rest[body..].starts_with('\n') {
            out.push('\n');
        }
        rest = &rest[body..];
    }
    out.push_str(rest);
    out
}

/// Length up to and including the `>` that closes a start tag, skipping any
/// `>` inside quoted attribute values.
fn start_tag_len(tag: &str) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in tag.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '>' if !quoted => return Some(i + 1),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(input: &str) -> String {
        HtmlSanitizer::default().sanitize_text(input)
    }

    #[test]
    fn removes_script_but_keeps_surrounding_text() {
        let result = clean("Hello <script>alert('XSS')</script> World");
        assert!(result.contains("Hello"));
        assert!(result.contains("World"));
        assert!(!result.contains("<script>"));
        assert!(!result.contains("alert"));
    }

    #[test]
    fn removes_every_script_block() {
        let result = clean("<script>alert(1)</script>Text<script>alert(2)</script>");
        assert_eq!(result, "Text");
    }

    #[test]
    fn strips_event_handlers_and_unlisted_attributes_from_allowed_tags() {
        let result = clean("<div onclick='alert(123)' class='x'>Safe</div>");
        assert_eq!(result, "<div>Safe</div>");
    }

    #[test]
    fn removes_iframes_with_their_source() {
        let result = clean("Content <iframe src='http://evil.com'></iframe> more content");
        assert!(!result.contains("<iframe"));
        assert!(!result.contains("evil.com"));
        assert!(result.contains("more content"));
    }

    #[test]
    fn removes_style_blocks() {
        let result = clean("Text <style>body{display:none;}</style> more text");
        assert!(!result.contains("<style>"));
        assert!(!result.contains("display:none"));
    }

    #[test]
    fn drops_javascript_links() {
        let result = clean("<a href='javascript:alert(1)'>Click</a>");
        assert!(!result.contains("javascript:"));
        assert!(!result.contains("alert"));
        assert!(result.contains("Click"));
    }

    #[test]
    fn keeps_https_links() {
        let result = clean("<a href='https://example.com'>Visit Example</a>");
        assert_eq!(result, r#"<a href="https://example.com">Visit Example</a>"#);
    }

    #[test]
    fn keeps_allowed_formatting() {
        let result = clean("<p>Paragraph</p><br><strong>Bold</strong><em>Italic</em>");
        assert!(result.contains("<p>Paragraph</p>"));
        assert!(result.contains("<br"));
        assert!(result.contains("<strong>Bold</strong>"));
        assert!(result.contains("<em>Italic</em>"));
    }

    #[test]
    fn unwraps_disallowed_tags_but_keeps_their_text() {
        let result = clean("<section data-value='safe' onclick='unsafe()'>Content</section>");
        assert_eq!(result, "Content");

        let result = clean("<span style='color:red'>Red</span> and <b>bold</b>");
        assert_eq!(result, "Red and bold");
    }

    #[test]
    fn drops_content_of_object_and_embed() {
        let result = clean("<object data='malicious.swf'>fallback</object><embed src='bad.swf'>");
        assert!(!result.contains("<object"));
        assert!(!result.contains("<embed"));
        assert!(!result.contains("fallback"));
    }

    #[test]
    fn removes_forms_and_inputs() {
        let result = clean("<form action='/malicious'><input type='text'></form>");
        assert!(!result.contains("<form"));
        assert!(!result.contains("<input"));
        assert!(!result.contains("malicious"));
    }

    #[test]
    fn keeps_encoded_markup_untouched() {
        let input = "Text &lt;script&gt;alert('XSS')&lt;/script&gt;";
        assert_eq!(clean(input), input);
    }

    #[test]
    fn plain_text_is_returned_unchanged() {
        for input in [
            "This is plain text without any HTML",
            "User'; DROP TABLE Users; --",
            "a > b && c",
            "  leading and trailing  ",
        ] {
            assert_eq!(clean(input), input);
        }
    }

    #[test]
    fn empty_and_absent_input_pass_through() {
        let sanitizer = HtmlSanitizer::default();
        assert_eq!(sanitizer.sanitize_text(""), "");
        assert_eq!(sanitizer.sanitize_text("   "), "   ");
        assert_eq!(sanitizer.sanitize_opt(None), None);
    }

    #[test]
    fn malformed_markup_does_not_panic() {
        for input in ["<", "<<>>", "<div", "<a href=", "</p></p><p", "<scr<script>ipt>x"] {
            let result = clean(input);
            assert!(!result.contains("<script"));
        }
    }

    #[test]
    fn pre_blocks_keep_their_leading_blank_lines() {
        assert_eq!(clean("<pre>\n\nx</pre>"), "<pre>\n\nx</pre>");
        assert_eq!(clean("<pre>\nx</pre>"), "<pre>x</pre>");
        assert_eq!(
            clean("<p>a</p><pre title=\"t\">\n\n  code</pre><pre>y</pre>"),
            "<p>a</p><pre title=\"t\">\n\n  code</pre><pre>y</pre>"
        );
    }

    #[test]
    fn text_mentioning_pre_is_left_alone() {
        assert_eq!(restore_pre_newlines("<p>\n</p>".to_string()), "<p>\n</p>");
        assert_eq!(
            restore_pre_newlines("<prefix>\nx".to_string()),
            "<prefix>\nx"
        );
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        for input in [
            "Hello <script>alert('XSS')</script> World",
            "<div onclick='x()'>A &amp; B</div>",
            "<p>one<p>two",
            "<a href='javascript:alert(1)' title='t'>x</a>",
            "<ul><li>unterminated",
            "plain & simple",
            "<pre>\n\nx</pre>",
            "<pre title='a>b'>\n\n\ny</pre>",
        ] {
            let once = clean(input);
            assert_eq!(clean(&once), once, "not idempotent for {input:?}");
        }
    }
}
