// Iskra Environments - Namespace Frame Stacks
//
// An environment is seven independent namespaces, each an ordered stack of
// frames scanned from front (innermost) to back (outermost). Frames are
// shared by reference: a derived environment clones the stack of handles
// and pushes a fresh frame in front, so the caller's bindings stay visible
// and mutations through any handle are seen by every holder.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::symbol::SymbolId;
use crate::types::ValueId;

/// One binding frame in one namespace
pub type Frame = Rc<RefCell<HashMap<SymbolId, ValueId>>>;

/// An ordered stack of frames; index 0 is the innermost frame
#[derive(Debug, Clone)]
pub struct NamespaceStack {
    frames: Vec<Frame>,
}

impl NamespaceStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    /// Scan frames front-to-back and return the first hit
    pub fn get(&self, key: SymbolId) -> Option<ValueId> {
        for frame in &self.frames {
            if let Some(&v) = frame.borrow().get(&key) {
                return Some(v);
            }
        }
        None
    }

    /// Mutate the innermost frame containing key; false if absent
    pub fn set(&self, key: SymbolId, value: ValueId) -> bool {
        for frame in &self.frames {
            let mut map = frame.borrow_mut();
            if map.contains_key(&key) {
                map.insert(key, value);
                return true;
            }
        }
        false
    }

    /// Insert into the frontmost frame, shadowing any outer binding
    pub fn define(&self, key: SymbolId, value: ValueId) {
        self.frames[0].borrow_mut().insert(key, value);
    }

    /// Insert into the frontmost frame; false if the key is already
    /// bound there (immutable-binding for the tag namespaces)
    pub fn define_tag(&self, key: SymbolId, value: ValueId) -> bool {
        let mut map = self.frames[0].borrow_mut();
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, value);
        true
    }

    /// Push a fresh empty frame at the front
    pub fn push_frame(&mut self) {
        self.frames.insert(0, Frame::default());
    }
}

impl Default for NamespaceStack {
    fn default() -> Self {
        Self::new()
    }
}

/// The six lexical namespaces plus the deep-bound dynamic one.
///
/// A symbol may be bound in several namespaces at once with distinct
/// values; the evaluator picks the namespace from the position of the
/// reference, never from the symbol itself.
#[derive(Debug, Clone)]
pub struct Environment {
    pub variable: NamespaceStack,
    pub function: NamespaceStack,
    pub macros: NamespaceStack,
    pub dynamic: NamespaceStack,
    pub block_tag: NamespaceStack,
    pub tagbody_tag: NamespaceStack,
    pub catch_tag: NamespaceStack,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            variable: NamespaceStack::new(),
            function: NamespaceStack::new(),
            macros: NamespaceStack::new(),
            dynamic: NamespaceStack::new(),
            block_tag: NamespaceStack::new(),
            tagbody_tag: NamespaceStack::new(),
            catch_tag: NamespaceStack::new(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
