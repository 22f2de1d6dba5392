use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;

pub type Builtin = fn(&[String]) -> Vec<String>;

#[derive(Clone)]
pub enum Binding {
    Value(String),
    Builtin(Builtin),
}

/// Chained symbol table used to evaluate make strings.
///
/// Lookups fall back to the parent scope; a name bound in a child shadows
/// the parent's binding.
#[derive(Clone, Default)]
pub struct Scope<'p> {
    bindings: HashMap<String, Binding>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(parent: &'p Scope<'p>) -> Self {
        Self {
            bindings: HashMap::new(),
            parent: Some(parent),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), Binding::Value(value.into()));
    }

    pub fn set_func(&mut self, name: impl Into<String>, func: Builtin) {
        self.bindings.insert(name.into(), Binding::Builtin(func));
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.and_then(|parent| parent.lookup(name)))
    }

    /// Value of a variable; undefined variables are empty.
    pub fn get(&self, name: &str) -> String {
        match self.lookup(name) {
            Some(Binding::Value(value)) => value.clone(),
            _ => String::new(),
        }
    }

    pub fn call(&self, name: &str, args: &[String]) -> Vec<String> {
        match self.lookup(name) {
            Some(Binding::Builtin(func)) => func(args),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_child_shadows_parent() {
        let mut root = Scope::new();
        root.set("A", "root");
        root.set("B", "root");
        let mut child = Scope::child(&root);
        child.set("A", "child");
        assert_eq!(child.get("A"), "child");
        assert_eq!(child.get("B"), "root");
        assert_eq!(root.get("A"), "root");
    }

    #[test]
    fn test_undefined_is_empty() {
        let scope = Scope::new();
        assert_eq!(scope.get("NOPE"), "");
        assert!(scope.call("nope", &[]).is_empty());
    }

    #[test]
    fn test_call_builtin_through_parent() {
        let mut root = Scope::new();
        root.set_func("twice", |args| args.iter().chain(args).cloned().collect());
        let child = Scope::child(&root);
        assert_eq!(child.call("twice", &["x".into()]), vec!["x", "x"]);
        // a builtin has no plain value
        assert_eq!(child.get("twice"), "");
    }
}
