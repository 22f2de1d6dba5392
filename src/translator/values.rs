use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use super::error::{TranslateError, bail_type, bail_unsupported};
use crate::bp::{Expression, Type};
use crate::parser::{MakeString, Variable};
use crate::scope::Scope;

/// Converts make values into blueprint expressions.
pub(super) struct Values<'a> {
    pub scope: &'a Scope<'a>,
    pub renames: &'a HashMap<String, String>,
}

impl Values<'_> {
    pub fn to_bp(&self, ms: &MakeString, ty: Type) -> Result<Expression, TranslateError> {
        match ty {
            Type::List => self.to_list(ms),
            Type::String => Ok(self.to_string(ms)?.unwrap_or_else(|| Expression::string(""))),
            Type::Bool => self.to_bool(ms),
            Type::Map => bail_type!("cannot convert a make value into a map"),
        }
    }

    fn variable_name(&self, variable: &Variable) -> Result<String, TranslateError> {
        if !variable.name.is_const() {
            bail_unsupported!("dynamic variable names unsupported: {}", variable.dump());
        }
        let name = variable.name.value(self.scope);
        Ok(self.renames.get(&name).cloned().unwrap_or(name))
    }

    /// `None` for an empty value.
    pub fn to_string(&self, ms: &MakeString) -> Result<Option<Expression>, TranslateError> {
        let mut val: Option<Expression> = None;
        let mut strip_top = false;
        for (s, variable) in ms.chunks() {
            let s = unescaped(s);
            let s = match (strip_top, s.strip_prefix('/')) {
                (false, _) => s.as_str(),
                (true, Some(rest)) => rest,
                (true, None) => {
                    val = Some(add_string(val, ".")?);
                    s.as_str()
                }
            };
            strip_top = false;
            if !s.is_empty() {
                val = Some(add_string(val, s)?);
            }

            let Some(variable) = variable else { continue };
            if variable.is_dollar() {
                val = Some(add_string(val, "$")?);
            } else if let Some(ret) = variable.eval_function(self.scope) {
                match ret.as_slice() {
                    [] => {}
                    [single] => val = Some(add_string(val, single)?),
                    _ => bail_type!("Unexpected list value {}", ret.join(" ")),
                }
            } else {
                let name = self.variable_name(variable)?;
                if name == "TOP" {
                    strip_top = true;
                } else {
                    val = Some(add_values(val, Expression::Variable(name, Type::String))?);
                }
            }
        }
        if strip_top {
            val = Some(add_string(val, ".")?);
        }
        Ok(val)
    }

    pub fn to_list(&self, ms: &MakeString) -> Result<Expression, TranslateError> {
        let mut lists: Vec<Expression> = Vec::new();
        let mut current: Vec<Expression> = Vec::new();
        for word in ms.words() {
            let Some(variable) = word.single_variable() else {
                if let Some(s) = self.to_string(&word)? {
                    current.push(s);
                }
                continue;
            };
            if variable.is_dollar() {
                current.push(Expression::string("$"));
            } else if let Some(ret) = variable.eval_function(self.scope) {
                current.extend(
                    ret.into_iter()
                        .filter(|s| !s.is_empty())
                        .map(Expression::String),
                );
            } else {
                let name = self.variable_name(variable)?;
                if name == "TOP" {
                    current.push(Expression::string("."));
                } else {
                    if !current.is_empty() {
                        lists.push(Expression::List(core::mem::take(&mut current)));
                    }
                    lists.push(Expression::Variable(name, Type::List));
                }
            }
        }
        if !current.is_empty() {
            lists.push(Expression::List(current));
        }

        let mut lists = lists.into_iter();
        let Some(first) = lists.next() else {
            return Ok(Expression::List(Vec::new()));
        };
        lists.try_fold(first, |val, next| add_values(Some(val), next))
    }

    pub fn to_bool(&self, ms: &MakeString) -> Result<Expression, TranslateError> {
        if !ms.is_const() {
            if let Some(variable) = ms.single_variable() {
                let name = self.variable_name(variable)?;
                return Ok(Expression::Variable(name, Type::Bool));
            }
            bail_type!("non-const bool expression {}", ms.dump());
        }
        string_to_bool(ms.value(self.scope).trim())
    }
}

fn unescaped(s: &str) -> String {
    MakeString::simple(s, Default::default()).value(&Scope::new())
}

fn string_to_bool(s: &str) -> Result<Expression, TranslateError> {
    match s {
        "true" => Ok(Expression::Bool(true)),
        "false" | "" => Ok(Expression::Bool(false)),
        // LOCAL_RTTI_FLAG
        "-frtti" => Ok(Expression::Bool(true)),
        _ => bail_type!("unexpected bool value {}", s),
    }
}

/// Appends literal text, folding it into a trailing literal when possible.
fn add_string(val: Option<Expression>, s: &str) -> Result<Expression, TranslateError> {
    match val {
        Some(Expression::String(mut prev)) => {
            prev.push_str(s);
            Ok(Expression::String(prev))
        }
        Some(Expression::Operator(mut op)) if matches!(op.args[1], Expression::String(_)) => {
            if let Expression::String(prev) = &mut op.args[1] {
                prev.push_str(s);
            }
            Ok(Expression::Operator(op))
        }
        val => add_values(val, Expression::string(s)),
    }
}

/// `lhs + rhs`, promoting a string operand next to a list.
pub fn add_values(lhs: Option<Expression>, rhs: Expression) -> Result<Expression, TranslateError> {
    let Some(lhs) = lhs else {
        return Ok(rhs);
    };
    let (lhs, rhs) = match (lhs.ty(), rhs.ty()) {
        (Type::String, Type::List) => (Expression::List(vec![lhs]), rhs),
        (Type::List, Type::String) => (lhs, Expression::List(vec![rhs])),
        (Type::Bool, Type::Bool) | (Type::Map, Type::Map) => {
            bail_type!("cannot add {} values", lhs.ty())
        }
        (a, b) if a != b => bail_type!("cannot concatenate {} with {}", a, b),
        _ => (lhs, rhs),
    };
    Ok(Expression::concat(lhs, rhs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Node, parse};

    fn value_of(line: &str) -> MakeString {
        match parse(line).ok().and_then(|nodes| nodes.into_iter().next()) {
            Some(Node::Assignment(a)) => a.value,
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    fn convert(line: &str, ty: Type) -> Result<Expression, TranslateError> {
        let mut scope = Scope::new();
        scope.set_func("my-dir", |_| vec![".".into()]);
        scope.set_func("all-java-files-under", |args| {
            args[0]
                .split_whitespace()
                .map(|dir| alloc::format!("{dir}/**/*.java"))
                .collect()
        });
        let renames = HashMap::from_iter([("a-b".into(), "a_dash_b".into())]);
        let values = Values {
            scope: &scope,
            renames: &renames,
        };
        values.to_bp(&value_of(line), ty)
    }

    fn s(v: &str) -> Expression {
        Expression::string(v)
    }

    fn var(name: &str, ty: Type) -> Expression {
        Expression::Variable(name.into(), ty)
    }

    #[test]
    fn test_literal_list() {
        assert_eq!(
            convert("X := a.c  b.c", Type::List),
            Ok(Expression::List(vec![s("a.c"), s("b.c")]))
        );
        assert_eq!(convert("X :=", Type::List), Ok(Expression::List(vec![])));
    }

    #[test]
    fn test_bare_variable_interrupts_list() {
        assert_eq!(
            convert("X := a.c $(FOO) b.c", Type::List),
            Ok(Expression::concat(
                Expression::concat(Expression::List(vec![s("a.c")]), var("FOO", Type::List)),
                Expression::List(vec![s("b.c")]),
            ))
        );
    }

    #[test]
    fn test_function_expands_in_list() {
        assert_eq!(
            convert("X := $(call all-java-files-under, src tests)", Type::List),
            Ok(Expression::List(vec![
                s("src/**/*.java"),
                s("tests/**/*.java")
            ]))
        );
    }

    #[test]
    fn test_string_with_variable() {
        assert_eq!(
            convert("X := $(LOCAL_PATH)/include", Type::String),
            Ok(Expression::concat(var("LOCAL_PATH", Type::String), s("/include")))
        );
        assert_eq!(
            convert("X := $(call my-dir)/foo", Type::String),
            Ok(s("./foo"))
        );
    }

    #[test]
    fn test_top_is_dropped() {
        assert_eq!(
            convert("X := $(TOP)/system/core/include", Type::List),
            Ok(Expression::List(vec![s("system/core/include")]))
        );
        assert_eq!(
            convert("X := $(TOP)", Type::List),
            Ok(Expression::List(vec![s(".")]))
        );
    }

    #[test]
    fn test_renamed_variable_reference() {
        assert_eq!(
            convert("X := $(a-b)", Type::List),
            Ok(var("a_dash_b", Type::List))
        );
    }

    #[test]
    fn test_bool() {
        assert_eq!(convert("X := true", Type::Bool), Ok(Expression::Bool(true)));
        assert_eq!(convert("X :=", Type::Bool), Ok(Expression::Bool(false)));
        assert_eq!(convert("X := -frtti", Type::Bool), Ok(Expression::Bool(true)));
        assert_eq!(convert("X := $(FLAG)", Type::Bool), Ok(var("FLAG", Type::Bool)));
        assert!(convert("X := maybe", Type::Bool).is_err());
        assert!(convert("X := a$(FLAG)", Type::Bool).is_err());
    }

    #[test]
    fn test_add_values() {
        let list = add_values(Some(s("a")), Expression::List(vec![s("b")]));
        assert_eq!(
            list,
            Ok(Expression::concat(
                Expression::List(vec![s("a")]),
                Expression::List(vec![s("b")])
            ))
        );
        assert!(add_values(Some(Expression::Bool(true)), Expression::Bool(false)).is_err());
        assert!(add_values(Some(Expression::Bool(true)), s("x")).is_err());
        assert_eq!(add_values(None, s("x")), Ok(s("x")));
    }
}
