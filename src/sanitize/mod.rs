// src/sanitize/mod.rs

//! Input sanitization.
//!
//! [`InputSanitizer`] is the single entry point used by handlers: one string
//! at a time through [`InputSanitizer::sanitize_input`], or a whole request
//! object graph through [`InputSanitizer::sanitize_object`].

pub mod graph;
pub mod html;
mod impls;
pub mod policy;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub use graph::{GraphWalker, Sanitize, SanitizeError, WalkReport};
pub use html::{HtmlSanitizer, TextSanitizer};
pub use policy::{PolicyBuilder, PolicyError, SanitizationPolicy};

/// Shared, immutable sanitization service. Cloning is cheap.
#[derive(Clone)]
pub struct InputSanitizer {
    text: Arc<dyn TextSanitizer>,
}

impl InputSanitizer {
    pub fn new(policy: SanitizationPolicy) -> Self {
        Self::with_text_sanitizer(HtmlSanitizer::new(policy))
    }

    pub fn with_text_sanitizer(text: impl TextSanitizer + 'static) -> Self {
        InputSanitizer {
            text: Arc::new(text),
        }
    }

    pub fn sanitize_input(&self, input: &str) -> String {
        self.text.sanitize_text(input)
    }

    pub fn sanitize_opt(&self, input: Option<&str>) -> Option<String> {
        input.map(|value| self.sanitize_input(value))
    }

    /// Sanitizes every string reachable from `root` in place and hands the
    /// same object back.
    ///
    /// `root` may be borrowed out of an `Rc<RefCell<_>>` that the graph links
    /// back to; that cell is treated as already visited.
    pub fn sanitize_object<'a, T>(&self, root: &'a mut T) -> Result<&'a mut T, SanitizeError>
    where
        T: Sanitize + ?Sized,
    {
        let report = graph::walk(self.text.as_ref(), root)?;
        self.log_report(root.node_name(), &report);
        Ok(root)
    }

    /// Sanitizes a shared root and returns the same handle.
    pub fn sanitize_shared<T>(&self, root: &Rc<RefCell<T>>) -> Result<Rc<RefCell<T>>, SanitizeError>
    where
        T: Sanitize + 'static,
    {
        let mut handle = Rc::clone(root);
        self.sanitize_object(&mut handle)?;
        Ok(handle)
    }

    fn log_report(&self, type_name: &str, report: &WalkReport) {
        tracing::debug!(
            target: "sanitize",
            type_name,
            strings = report.strings_visited,
            changed = report.strings_changed,
            shared_nodes = report.shared_nodes,
            "object graph sanitized"
        );

        if report.strings_changed > 0 {
            tracing::warn!(
                target: "sanitize",
                type_name,
                changed = report.strings_changed,
                "potentially dangerous markup removed from input"
            );
        }
    }
}

impl Default for InputSanitizer {
    fn default() -> Self {
        InputSanitizer::new(SanitizationPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Profile {
        bio: String,
        website: Option<String>,
        age: u32,
    }

    impl Sanitize for Profile {
        fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
            walker.text(&mut self.bio);
            walker.optional_text(&mut self.website);
        }
    }

    #[test]
    fn sanitize_input_applies_the_default_policy() {
        let sanitizer = InputSanitizer::default();
        assert_eq!(
            sanitizer.sanitize_input("<div onclick='alert(123)'>Safe</div>"),
            "<div>Safe</div>"
        );
        assert_eq!(sanitizer.sanitize_opt(None), None);
    }

    #[test]
    fn sanitize_object_returns_the_same_object() {
        let sanitizer = InputSanitizer::default();
        let mut profile = Profile {
            bio: "hi<script>steal()</script>".to_string(),
            website: None,
            age: 30,
        };
        let address = &profile as *const Profile;

        let returned = sanitizer.sanitize_object(&mut profile).unwrap();

        assert!(std::ptr::eq(returned as *const Profile, address));
        assert_eq!(returned.bio, "hi");
        assert_eq!(returned.age, 30);
    }

    #[test]
    fn sanitize_shared_returns_the_same_allocation() {
        let sanitizer = InputSanitizer::default();
        let shared = Rc::new(RefCell::new(Profile {
            bio: "<iframe src='x'></iframe>bio".to_string(),
            website: Some("<b>site</b>".to_string()),
            age: 1,
        }));

        let returned = sanitizer.sanitize_shared(&shared).unwrap();

        assert!(Rc::ptr_eq(&returned, &shared));
        assert_eq!(shared.borrow().bio, "bio");
        assert_eq!(shared.borrow().website.as_deref(), Some("site"));
    }

    #[test]
    fn root_borrowed_from_a_self_linked_cell_is_sanitized() {
        #[derive(Default)]
        struct Thread {
            title: String,
            replies: Vec<Rc<RefCell<Thread>>>,
        }

        impl Sanitize for Thread {
            fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
                walker.text(&mut self.title);
                walker.each(&mut self.replies);
            }
        }

        let sanitizer = InputSanitizer::default();
        let reply = Rc::new(RefCell::new(Thread {
            title: "re<script>x()</script>".to_string(),
            ..Default::default()
        }));
        let thread = Rc::new(RefCell::new(Thread {
            title: "C<script>alert(1)</script>".to_string(),
            replies: vec![Rc::clone(&reply)],
        }));
        reply.borrow_mut().replies.push(Rc::clone(&thread));
        thread.borrow_mut().replies.push(Rc::clone(&thread));

        let result = sanitizer
            .sanitize_object(&mut *thread.borrow_mut())
            .map(|root| root.title.clone());

        assert_eq!(result, Ok("C".to_string()));
        assert_eq!(reply.borrow().title, "re");

        thread.borrow_mut().replies.clear();
        reply.borrow_mut().replies.clear();
    }

    #[test]
    fn sanitize_input_is_idempotent() {
        let sanitizer = InputSanitizer::default();
        for input in [
            "<pre>\n\nx</pre>",
            "<pre>\n\n\n\ncode\n</pre>",
            "<p>a</p><pre title=\"a>b\">\n\nz</pre>",
            "<listing>\n\nx</listing>",
            "<textarea>\n\nx</textarea>after",
            "<div><pre>\nkept</pre></div>",
            "<scr<script>ipt>alert(1)</script>",
            "&lt;b&gt; <i>x</i>",
        ] {
            let once = sanitizer.sanitize_input(input);
            assert_eq!(sanitizer.sanitize_input(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn custom_policy_is_honoured() {
        let policy = SanitizationPolicy::builder()
            .allow_tags(["b"])
            .drop_content_of(["script"])
            .build()
            .unwrap();
        let sanitizer = InputSanitizer::new(policy);

        assert_eq!(sanitizer.sanitize_input("<b>x</b><i>y</i>"), "<b>x</b>y");
    }
}
