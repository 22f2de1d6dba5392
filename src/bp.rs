use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

mod printer;

pub use printer::{print, print_expression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Bool,
    String,
    List,
    Map,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Bool => "bool",
            Type::String => "string",
            Type::List => "list",
            Type::Map => "map",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    String(String),
    Bool(bool),
    List(Vec<Expression>),
    Map(Vec<Property>),
    /// Reference to a blueprint variable of the given type.
    Variable(String, Type),
    Operator(Box<Operator>),
}

/// `lhs + rhs`, the only operator blueprint has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub args: [Expression; 2],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Text following `//` on each line.
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Property(Property),
    Comment(Comment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub ty: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Expression,
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Module(Module),
    Assignment(Assignment),
    Comment(Comment),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    pub defs: Vec<Definition>,
}

impl Expression {
    pub fn string(s: impl Into<String>) -> Self {
        Expression::String(s.into())
    }

    pub fn concat(lhs: Expression, rhs: Expression) -> Self {
        Expression::Operator(Box::new(Operator { args: [lhs, rhs] }))
    }

    pub fn ty(&self) -> Type {
        match self {
            Expression::String(_) => Type::String,
            Expression::Bool(_) => Type::Bool,
            Expression::List(_) => Type::List,
            Expression::Map(_) => Type::Map,
            Expression::Variable(_, ty) => *ty,
            Expression::Operator(op) => op.args[0].ty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expression::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Expression]> {
        match self {
            Expression::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Expression>> {
        match self {
            Expression::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Expression::Variable(name, _) => Some(name),
            _ => None,
        }
    }
}

impl Property {
    pub fn new(name: impl Into<String>, value: Expression) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Comment {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

impl Module {
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            items: Vec::new(),
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.items.iter().filter_map(|item| match item {
            Item::Property(prop) => Some(prop),
            Item::Comment(_) => None,
        })
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties().find(|prop| prop.name == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.items.iter_mut().find_map(|item| match item {
            Item::Property(prop) if prop.name == name => Some(prop),
            _ => None,
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn push_property(&mut self, prop: Property) {
        self.items.push(Item::Property(prop));
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Property> {
        let index = self
            .items
            .iter()
            .position(|item| matches!(item, Item::Property(prop) if prop.name == name))?;
        match self.items.remove(index) {
            Item::Property(prop) => Some(prop),
            Item::Comment(_) => None,
        }
    }

    pub fn rename_property(&mut self, from: &str, to: &str) {
        for item in &mut self.items {
            if let Item::Property(prop) = item
                && prop.name == from
            {
                prop.name = to.into();
            }
        }
    }

    /// Values of a string-list property made only of literals.
    pub fn string_list(&self, name: &str) -> Option<Vec<&str>> {
        self.property(name)?
            .value
            .as_list()?
            .iter()
            .map(Expression::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_operator_takes_type_of_lhs() {
        let expr = Expression::concat(
            Expression::Variable("X".into(), Type::List),
            Expression::List(vec![]),
        );
        assert_eq!(expr.ty(), Type::List);
    }

    #[test]
    fn test_module_property_helpers() {
        let mut module = Module::new("cc_binary");
        module.push_property(Property::new("name", Expression::string("a")));
        module.items.push(Item::Comment(Comment::new(vec![" note".into()])));
        module.push_property(Property::new(
            "srcs",
            Expression::List(vec![Expression::string("a.c"), Expression::string("b.c")]),
        ));

        assert_eq!(module.string_list("srcs"), Some(vec!["a.c", "b.c"]));
        module.rename_property("srcs", "files");
        assert!(module.has("files"));
        assert!(module.remove_property("name").is_some());
        assert!(!module.has("name"));
        assert_eq!(module.items.len(), 2);
    }
}
