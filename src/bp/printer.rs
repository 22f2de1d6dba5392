use alloc::string::String;

use super::{Assignment, Comment, Definition, Expression, File, Item, Module, Property};

const INDENT: &str = "    ";

/// Renders a blueprint file.
pub fn print(file: &File) -> String {
    let mut printer = Printer { out: String::new() };
    let mut prev: Option<&Definition> = None;
    for def in &file.defs {
        if let Some(prev) = prev {
            let blank = match (prev, def) {
                (Definition::Module(_), _) => true,
                (Definition::Comment(_), _) => false,
                (_, Definition::Module(_)) => true,
                _ => false,
            };
            if blank {
                printer.out.push('\n');
            }
        }
        printer.definition(def);
        prev = Some(def);
    }
    printer.out
}

/// Renders a single expression as it would appear at the top level.
pub fn print_expression(expr: &Expression) -> String {
    let mut printer = Printer { out: String::new() };
    printer.expression(expr, 0);
    printer.out
}

struct Printer {
    out: String,
}

impl Printer {
    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
    }

    fn definition(&mut self, def: &Definition) {
        match def {
            Definition::Module(module) => self.module(module),
            Definition::Assignment(assignment) => self.assignment(assignment),
            Definition::Comment(comment) => self.comment(comment, 0),
        }
    }

    fn module(&mut self, module: &Module) {
        self.out.push_str(&module.ty);
        self.out.push_str(" {\n");
        for item in &module.items {
            match item {
                Item::Property(prop) => self.property(prop, 1),
                Item::Comment(comment) => self.comment(comment, 1),
            }
        }
        self.out.push_str("}\n");
    }

    fn assignment(&mut self, assignment: &Assignment) {
        self.out.push_str(&assignment.name);
        self.out.push_str(if assignment.append { " += " } else { " = " });
        self.expression(&assignment.value, 0);
        self.out.push('\n');
    }

    fn comment(&mut self, comment: &Comment, level: usize) {
        for line in &comment.lines {
            self.indent(level);
            self.out.push_str("//");
            self.out.push_str(line);
            self.out.push('\n');
        }
    }

    fn property(&mut self, prop: &Property, level: usize) {
        self.indent(level);
        self.out.push_str(&prop.name);
        self.out.push_str(": ");
        self.expression(&prop.value, level);
        self.out.push_str(",\n");
    }

    fn expression(&mut self, expr: &Expression, level: usize) {
        match expr {
            Expression::String(s) => self.string(s),
            Expression::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Expression::Variable(name, _) => self.out.push_str(name),
            Expression::Operator(op) => {
                self.expression(&op.args[0], level);
                self.out.push_str(" + ");
                self.expression(&op.args[1], level);
            }
            Expression::List(values) => match values.as_slice() {
                [] => self.out.push_str("[]"),
                [single] if !matches!(single, Expression::List(_) | Expression::Map(_)) => {
                    self.out.push('[');
                    self.expression(single, level);
                    self.out.push(']');
                }
                values => {
                    self.out.push_str("[\n");
                    for value in values {
                        self.indent(level + 1);
                        self.expression(value, level + 1);
                        self.out.push_str(",\n");
                    }
                    self.indent(level);
                    self.out.push(']');
                }
            },
            Expression::Map(props) if props.is_empty() => self.out.push_str("{}"),
            Expression::Map(props) => {
                self.out.push_str("{\n");
                for prop in props {
                    self.property(prop, level + 1);
                }
                self.indent(level);
                self.out.push('}');
            }
        }
    }

    fn string(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bp::Type;
    use alloc::vec;

    fn s(value: &str) -> Expression {
        Expression::string(value)
    }

    #[test]
    fn test_print_module() {
        let mut module = Module::new("cc_library_shared");
        module.items.push(Item::Comment(Comment::new(vec![" comment".into()])));
        module.push_property(Property::new("name", s("test")));
        module.push_property(Property::new("srcs", Expression::List(vec![s("a.c")])));
        module.push_property(Property::new(
            "cflags",
            Expression::List(vec![s("-DA=\"b\""), s("-Wall")]),
        ));
        module.push_property(Property::new(
            "target",
            Expression::Map(vec![Property::new(
                "darwin",
                Expression::Map(vec![Property::new("enabled", Expression::Bool(false))]),
            )]),
        ));
        let file = File {
            defs: vec![Definition::Module(module)],
        };

        let expected = r#"cc_library_shared {
    // comment
    name: "test",
    srcs: ["a.c"],
    cflags: [
        "-DA=\"b\"",
        "-Wall",
    ],
    target: {
        darwin: {
            enabled: false,
        },
    },
}
"#;
        assert_eq!(print(&file), expected);
    }

    #[test]
    fn test_print_assignments_and_operators() {
        let file = File {
            defs: vec![
                Definition::Comment(Comment::new(vec!["top".into()])),
                Definition::Assignment(Assignment {
                    name: "FOO".into(),
                    value: Expression::List(vec![s("a")]),
                    append: false,
                }),
                Definition::Assignment(Assignment {
                    name: "FOO".into(),
                    value: Expression::List(vec![]),
                    append: true,
                }),
                Definition::Module(Module {
                    ty: "cc_binary".into(),
                    items: vec![Item::Property(Property::new(
                        "srcs",
                        Expression::concat(
                            Expression::List(vec![s("a.c")]),
                            Expression::Variable("FOO".into(), Type::List),
                        ),
                    ))],
                }),
                Definition::Comment(Comment::new(vec!["tail".into()])),
            ],
        };
        let expected = "//top\nFOO = [\"a\"]\nFOO += []\n\ncc_binary {\n    srcs: [\"a.c\"] + FOO,\n}\n\n//tail\n";
        assert_eq!(print(&file), expected);
    }

    #[test]
    fn test_empty_module_and_map() {
        let mut module = Module::new("java_library");
        module.push_property(Property::new("optimize", Expression::Map(vec![])));
        let file = File {
            defs: vec![Definition::Module(module)],
        };
        assert_eq!(print(&file), "java_library {\n    optimize: {},\n}\n");
    }

    #[test]
    fn test_print_expression() {
        let expr = Expression::concat(
            Expression::Variable("FOO".into(), Type::String),
            s("/bar"),
        );
        assert_eq!(print_expression(&expr), "FOO + \"/bar\"");
    }
}
