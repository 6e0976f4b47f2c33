use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::tags::TagRegistry;
use crate::variable::Constant;

/// State owned by one expansion run: the tag registry, the interned numeric
/// constants and the generator for internal loop-variable names.
///
/// Nothing here is global, so independent documents can be expanded side by
/// side with one session each.
pub struct Session {
    registry: TagRegistry,
    constants: RefCell<HashMap<i64, Rc<Constant>>>,
    generated: Cell<usize>,
}

impl Session {
    pub fn new(registry: TagRegistry) -> Self {
        Session {
            registry,
            constants: RefCell::new(HashMap::new()),
            generated: Cell::new(0),
        }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// The interned constant for `value`.
    pub fn constant(&self, value: i64) -> Rc<Constant> {
        self.constants
            .borrow_mut()
            .entry(value)
            .or_insert_with(|| Rc::new(Constant(value)))
            .clone()
    }

    /// A variable name no document can spell (user names start with a
    /// letter or underscore).
    pub fn fresh_name(&self) -> String {
        let n = self.generated.get() + 1;
        self.generated.set(n);
        format!("${}", n)
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(TagRegistry::standard())
    }
}
