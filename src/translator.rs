//! Translation of parsed makefile nodes into blueprint definitions.
//!
//! The translator walks the nodes once, in order. `include $(CLEAR_VARS)`
//! opens a working module, `LOCAL_*` assignments fill it, and an include of
//! a module type such as `$(BUILD_SHARED_LIBRARY)` closes it. Anything that
//! can't be expressed is kept as an error comment quoting the source, so the
//! output can be fixed by hand.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::mem;

use hashbrown::{HashMap, HashSet};
use log::{debug, trace};

mod builtins;
mod error;
mod properties;
mod rewrite;
mod split;
mod values;


pub use error::TranslateError;
pub use properties::Rules;

use self::builtins::android_scope;
use self::error::bail_type;
use self::properties::{CLEAR_VARS, INCLUDE_IGNORED, strip_property_suffix};
use self::values::{Values, add_values};
use crate::bp::{self, Comment, Definition, Expression, File, Item, Module, Property, Type};
use crate::parser::{Assignment, AssignmentKind, Directive, MakeString, Node};
use crate::scope::Scope;

/// Translates a parsed makefile.
pub fn translate(rules: &Rules, nodes: &[Node]) -> File {
    let mut translator = Translator::new(rules);
    for node in nodes {
        translator.node(node);
    }
    translator.finish()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Conditional {
    cond: String,
    eq: bool,
}

impl Conditional {
    fn describe(&self, eq: bool) -> String {
        let eq = if eq { "eq" } else { "neq" };
        format!("{} {}", eq, self.cond)
    }
}

/// What the rewrite strategies see of an assignment.
struct Assign<'a> {
    value: &'a MakeString,
    prefix: Option<&'static str>,
    append: bool,
}

struct Translator<'r> {
    rules: &'r Rules,
    scope: Scope<'static>,
    defs: Vec<Definition>,
    module: Option<Module>,
    globals: HashSet<String>,
    renames: HashMap<String, String>,
    conds: Vec<Option<Conditional>>,
    /// Position of each property of the working module, by dotted name.
    module_index: HashMap<String, usize>,
    /// Index into `conds` of the conditional opened inside the working
    /// module; it prefixes `LOCAL_` assignments.
    assignment_cond: Option<usize>,
}

impl<'r> Translator<'r> {
    fn new(rules: &'r Rules) -> Self {
        Self {
            rules,
            scope: android_scope(rules),
            defs: Vec::new(),
            module: None,
            module_index: HashMap::new(),
            globals: HashSet::new(),
            renames: HashMap::new(),
            conds: Vec::new(),
            assignment_cond: None,
        }
    }

    fn values(&self) -> Values<'_> {
        Values {
            scope: &self.scope,
            renames: &self.renames,
        }
    }

    fn to_bp(&self, value: &MakeString, ty: Type) -> Result<Expression, TranslateError> {
        self.values().to_bp(value, ty)
    }

    fn node(&mut self, node: &Node) {
        trace!("{}: {}", node.pos(), node.dump());
        match node {
            Node::Comment(comment) => {
                // continuation lines keep their own `#`
                let lines = comment
                    .text
                    .split('\n')
                    .enumerate()
                    .map(|(i, line)| match i {
                        0 => line,
                        _ => line.strip_prefix('#').unwrap_or(line),
                    })
                    .map(String::from)
                    .collect();
                self.push_comment(Comment::new(lines));
            }
            Node::Assignment(assignment) => self.assignment(node, assignment),
            Node::Directive(directive) => self.directive(node, directive),
            Node::Rule(_) | Node::Expression(_) => self.error(node, "unsupported line"),
        }
    }

    fn finish(mut self) -> File {
        if let Some(module) = self.module.take() {
            let unfinished = module.properties().next().is_some();
            self.discard_module(module);
            if unfinished {
                let msg = "module not finished with an include of a module type";
                self.push_comment(error_comment(msg, ""));
            }
        }
        File { defs: self.defs }
    }

    fn push_comment(&mut self, comment: Comment) {
        match &mut self.module {
            Some(module) => module.items.push(Item::Comment(comment)),
            None => self.defs.push(Definition::Comment(comment)),
        }
    }

    fn error(&mut self, node: &Node, msg: &str) {
        self.push_comment(error_comment(msg, &node.dump()));
    }

    fn warning(&mut self, msg: &str) {
        let line = format!(" ANDROIDMK TRANSLATION WARNING: {msg}");
        self.push_comment(Comment::new(alloc::vec![line]));
    }

    fn directive(&mut self, node: &Node, directive: &Directive) {
        match directive.name.as_str() {
            "include" | "-include" | "sinclude" => self.include(node, directive),
            "ifeq" | "ifneq" | "ifdef" | "ifndef" => {
                let cond = directive.args.dump();
                let eq = matches!(directive.name.as_str(), "ifeq" | "ifdef");
                if self.rules.conditional(&cond).is_none() {
                    self.error(node, "unsupported conditional");
                    self.conds.push(None);
                    return;
                }
                self.conds.push(Some(Conditional { cond, eq }));
                if self.module.is_some() {
                    match self.assignment_cond {
                        None => self.assignment_cond = Some(self.conds.len() - 1),
                        Some(_) => self.error(node, "unsupported nested conditional in module"),
                    }
                }
            }
            "else" => match self.conds.last_mut() {
                None => self.error(node, "missing if before else"),
                Some(None) => {}
                Some(Some(cond)) => cond.eq = !cond.eq,
            },
            "endif" => match self.conds.pop() {
                None => self.error(node, "missing if before endif"),
                Some(_) => {
                    if self.assignment_cond == Some(self.conds.len()) {
                        self.assignment_cond = None;
                    }
                }
            },
            _ => self.error(node, "unsupported directive"),
        }
    }

    fn include(&mut self, node: &Node, directive: &Directive) {
        let path = directive.args.value(&self.scope);
        let path = path.trim();
        if path == CLEAR_VARS {
            self.reset_module();
        } else if path == INCLUDE_IGNORED {
            // other makefiles are translated on their own
        } else if let Some(ty) = self.rules.module_type(path) {
            if self.module.is_none() {
                self.missing_clear_vars();
            }
            self.module_conditionals(node);
            self.make_module(ty);
        } else {
            self.error(node, "unsupported include");
        }
    }

    /// Disables the module outside of the conditionals it is defined in.
    fn module_conditionals(&mut self, node: &Node) {
        let conds: Vec<Conditional> = self.conds.iter().flatten().cloned().collect();
        for cond in conds {
            let prefix = self
                .rules
                .conditional(&cond.cond)
                .and_then(|translation| translation.prefix(!cond.eq));
            let result = match prefix {
                Some(prefix) => {
                    self.set_variable(false, Some(prefix), "enabled", Expression::Bool(false), true)
                }
                None => Err(TranslateError::Unsupported(
                    format!("no translation for conditional {}", cond.describe(!cond.eq)).into(),
                )),
            };
            if let Err(err) = result {
                self.error(node, err.message());
            }
        }
    }

    fn reset_module(&mut self) {
        if let Some(module) = self.module.take() {
            self.discard_module(module);
        }
        self.module = Some(Module::new(""));
        self.module_index.clear();
    }

    fn missing_clear_vars(&mut self) {
        self.warning(
            "No 'include $(CLEAR_VARS)' detected before first assignment; clearing vars now",
        );
        self.reset_module();
    }

    /// Drops an unfinished module, keeping the comments written into it.
    fn discard_module(&mut self, module: Module) {
        for item in module.items {
            if let Item::Comment(comment) = item {
                self.defs.push(Definition::Comment(comment));
            }
        }
    }

    fn make_module(&mut self, ty: &str) {
        let Some(mut module) = self.module.take() else {
            return;
        };
        module.ty = ty.to_string();
        debug!(
            "finished {} module with {} properties",
            module.ty,
            module.properties().count()
        );
        self.defs.push(Definition::Module(module));
        self.module_index.clear();
    }

    fn assignment(&mut self, node: &Node, assignment: &Assignment) {
        if !assignment.name.is_const() {
            self.error(node, "unsupported non-const variable name");
            return;
        }
        if assignment.target.is_some() {
            self.error(node, "unsupported target assignment");
            return;
        }

        let mut name = assignment.name.value(&self.scope).trim().to_string();
        if name.contains('-') {
            let renamed = name.replace('-', "_dash_");
            self.warning(&format!(
                "Variable names cannot contain: \"-\". Renamed \"{name}\" to \"{renamed}\""
            ));
            self.renames.insert(mem::take(&mut name), renamed.clone());
            name = renamed;
        }

        let cond = self
            .assignment_cond
            .and_then(|index| self.conds.get(index).cloned().flatten());
        let mut base = name.as_str();
        let mut prefix = None;
        if name.starts_with("LOCAL_") {
            if let Some((stripped, suffix_prefix)) = strip_property_suffix(&name) {
                base = stripped;
                prefix = Some(suffix_prefix);
            }
            if let Some(cond) = &cond {
                if prefix.is_some() {
                    self.error(
                        node,
                        "prefix assignment inside conditional, skipping conditional",
                    );
                } else {
                    let translation = self.rules.conditional(&cond.cond);
                    match translation.and_then(|t| t.prefix(cond.eq)) {
                        Some(cond_prefix) => prefix = Some(cond_prefix),
                        None => {
                            let msg = format!(
                                "no translation for conditional {}",
                                cond.describe(cond.eq)
                            );
                            self.error(node, &msg);
                            return;
                        }
                    }
                }
            }
        } else if let Some(cond) = &cond {
            let msg = format!("conditional {} on global assignment", cond.describe(cond.eq));
            self.error(node, &msg);
        }

        let ctx = Assign {
            value: &assignment.value,
            prefix,
            append: assignment.kind == AssignmentKind::Append,
        };
        let result = match self.rules.rewrite(base) {
            Some(rewrite) => self.rewrite(rewrite, &ctx),
            None if base.starts_with("LOCAL_") => Err(TranslateError::Unsupported(
                format!("unsupported assignment to {base}").into(),
            )),
            None => self
                .to_bp(ctx.value, Type::List)
                .and_then(|value| self.set_variable(ctx.append, None, base, value, false)),
        };
        if let Err(err) = result {
            self.error(node, err.message());
        }
    }

    /// Assigns a module property (`local`) or a global variable.
    fn set_variable(
        &mut self,
        append: bool,
        prefix: Option<&str>,
        name: &str,
        value: Expression,
        local: bool,
    ) -> Result<(), TranslateError> {
        let name = match prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        };

        if local {
            if self.module.is_none() {
                self.missing_clear_vars();
            }
            let Some(module) = &mut self.module else {
                return Ok(());
            };
            return set_property(module, &mut self.module_index, &name, value, append);
        }

        let append = if self.globals.contains(&name) {
            if !append {
                return Err(TranslateError::Conflict(
                    format!("cannot assign a variable multiple times: \"{name}\"").into(),
                ));
            }
            true
        } else {
            self.globals.insert(name.clone());
            false
        };
        self.defs.push(Definition::Assignment(bp::Assignment {
            name,
            value,
            append,
        }));
        Ok(())
    }
}

fn error_comment(msg: &str, source: &str) -> Comment {
    let mut lines = alloc::vec![format!(" ANDROIDMK TRANSLATION ERROR: {msg}")];
    if !source.is_empty() {
        lines.extend(source.split('\n').map(|line| format!(" {line}")));
    }
    Comment::new(lines)
}

/// A module's own properties, or the properties of a map inside it.
trait PropertyList {
    fn at(&mut self, index: usize) -> Option<&mut Property>;
    fn append(&mut self, prop: Property) -> usize;
}

impl PropertyList for Vec<Item> {
    fn at(&mut self, index: usize) -> Option<&mut Property> {
        match self.get_mut(index)? {
            Item::Property(prop) => Some(prop),
            Item::Comment(_) => None,
        }
    }

    fn append(&mut self, prop: Property) -> usize {
        self.push(Item::Property(prop));
        self.len() - 1
    }
}

impl PropertyList for Vec<Property> {
    fn at(&mut self, index: usize) -> Option<&mut Property> {
        self.get_mut(index)
    }

    fn append(&mut self, prop: Property) -> usize {
        self.push(prop);
        self.len() - 1
    }
}

/// Sets a dotted property such as `target.darwin.srcs`, creating the maps
/// on the way. `append` adds to an existing value, otherwise the value is
/// replaced. A rejected addition leaves the earlier value in place.
///
/// `index` maps every dotted name already in the module to its position
/// within its parent.
fn set_property(
    module: &mut Module,
    index: &mut HashMap<String, usize>,
    name: &str,
    value: Expression,
    append: bool,
) -> Result<(), TranslateError> {
    let mut list: &mut dyn PropertyList = &mut module.items;
    let mut end = 0;
    let mut parts = name.split('.').peekable();
    while let Some(part) = parts.next() {
        end += part.len();
        let path = &name[..end];
        end += 1;
        let last = parts.peek().is_none();
        let position = match (index.get(path).copied(), last) {
            (Some(position), true) => {
                let Some(prop) = list.at(position) else {
                    bail_type!("cannot assign {}", name);
                };
                prop.value = match append {
                    true => add_values(Some(prop.value.clone()), value).map_err(|err| {
                        TranslateError::Type(format!("unsupported addition: {err}").into())
                    })?,
                    false => value,
                };
                return Ok(());
            }
            (None, true) => {
                let position = list.append(Property::new(part, value));
                index.insert(path.to_string(), position);
                return Ok(());
            }
            (Some(position), false) => position,
            (None, false) => {
                let position = list.append(Property::new(part, Expression::Map(Vec::new())));
                index.insert(path.to_string(), position);
                position
            }
        };
        let Some(prop) = list.at(position) else {
            bail_type!("cannot assign {}", name);
        };
        list = match &mut prop.value {
            Expression::Map(props) => props,
            _ => bail_type!("cannot assign {}: {} is not a map", name, part),
        };
    }
    Ok(())
}
