//! [`Sanitize`] for containers and shared handles.
//!
//! Containers forward to their elements. Strings held directly by a container
//! (`Vec<String>`, map keys) are not visited; a type that wants them cleaned
//! calls [`GraphWalker::text`] on each element itself.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex, RwLock};

use super::graph::{GraphWalker, Sanitize};

impl<T: Sanitize> Sanitize for Option<T> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        if let Some(value) = self {
            value.sanitize_with(walker);
        }
    }
}

impl<T: Sanitize + ?Sized> Sanitize for Box<T> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        (**self).sanitize_with(walker);
    }
}

impl<T: Sanitize> Sanitize for [T] {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.each(self.iter_mut());
    }
}

impl<T: Sanitize, const N: usize> Sanitize for [T; N] {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.each(self.iter_mut());
    }
}

impl<T: Sanitize> Sanitize for Vec<T> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.each(self.iter_mut());
    }
}

impl<T: Sanitize> Sanitize for VecDeque<T> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.each(self.iter_mut());
    }
}

impl<K, V: Sanitize, S> Sanitize for HashMap<K, V, S> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.each(self.values_mut());
    }
}

impl<K, V: Sanitize> Sanitize for BTreeMap<K, V> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.each(self.values_mut());
    }
}

impl<T: Sanitize + 'static> Sanitize for Rc<RefCell<T>> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        let node: Rc<RefCell<dyn Sanitize>> = self.clone();
        walker.schedule_local(node);
    }
}

impl Sanitize for Rc<RefCell<dyn Sanitize>> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.schedule_local(Rc::clone(self));
    }
}

/// Back-references are followed while their target is alive.
impl<T: Sanitize + 'static> Sanitize for Weak<RefCell<T>> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        if let Some(node) = self.upgrade() {
            let node: Rc<RefCell<dyn Sanitize>> = node;
            walker.schedule_local(node);
        }
    }
}

impl<T: Sanitize + 'static> Sanitize for Arc<Mutex<T>> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        let node: Arc<Mutex<dyn Sanitize>> = self.clone();
        walker.schedule_locked(node);
    }
}

impl<T: Sanitize + 'static> Sanitize for Arc<RwLock<T>> {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        let node: Arc<RwLock<dyn Sanitize>> = self.clone();
        walker.schedule_read_write(node);
    }
}
