use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;

use super::error::{TranslateError, bail_type};
use crate::bp::{Expression, Type};

pub(super) type Lists = BTreeMap<&'static str, Expression>;

/// Partitions a list value by the key `classify` assigns to each element.
///
/// `a + b` is split on both sides and the parts sharing a key are joined
/// back with `+`, so every element lands in exactly one result keeping its
/// relative order.
pub(super) fn split_bp_list<F>(value: Expression, classify: &mut F) -> Result<Lists, TranslateError>
where
    F: FnMut(Expression) -> Result<(&'static str, Expression), TranslateError>,
{
    let mut lists = Lists::new();
    match value {
        Expression::Operator(op) => {
            let [lhs, rhs] = op.args;
            let lhs = split_bp_list(lhs, classify)?;
            let mut rhs = split_bp_list(rhs, classify)?;
            for (key, value) in lhs {
                let value = match rhs.remove(key) {
                    Some(other) => Expression::concat(value, other),
                    None => value,
                };
                lists.insert(key, value);
            }
            lists.extend(rhs);
        }
        Expression::List(values) => {
            for value in values {
                let (key, value) = classify(value)?;
                let list = lists
                    .entry(key)
                    .or_insert_with(|| Expression::List(vec![]));
                if let Some(values) = list.as_list_mut() {
                    values.push(value);
                }
            }
        }
        value => {
            let (key, value) = classify(value)?;
            let value = match value.ty() {
                Type::List => value,
                _ => Expression::List(vec![value]),
            };
            lists.insert(key, value);
        }
    }
    Ok(lists)
}

/// Sorts paths into `"local"` ones under `$(LOCAL_PATH)`, made relative,
/// and `"global"` ones.
pub(super) fn classify_local_or_global_path(
    value: Expression,
) -> Result<(&'static str, Expression), TranslateError> {
    match value {
        Expression::Variable(ref name, _) if name == "LOCAL_PATH" => {
            Ok(("local", Expression::string(".")))
        }
        Expression::Operator(op) => {
            if op.args[0].ty() != Type::String {
                bail_type!("expected a string path, got {}", op.args[0].ty());
            }
            let relative = match &op.args {
                [Expression::Variable(name, _), Expression::String(rest)] if name == "LOCAL_PATH" => {
                    Some(String::from(rest.trim_start_matches('/')))
                }
                _ => None,
            };
            match relative {
                Some(rest) if rest.is_empty() => Ok(("local", Expression::string("."))),
                Some(rest) => Ok(("local", Expression::String(rest))),
                None => Ok(("global", Expression::Operator(op))),
            }
        }
        Expression::Bool(_) | Expression::Map(_) | Expression::List(_) => {
            bail_type!("expected a string path, got {}", value.ty())
        }
        value => Ok(("global", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn s(v: &str) -> Expression {
        Expression::string(v)
    }

    fn local_path(rest: &str) -> Expression {
        Expression::concat(Expression::Variable("LOCAL_PATH".into(), Type::String), s(rest))
    }

    #[test]
    fn test_classify_paths() {
        assert_eq!(
            classify_local_or_global_path(local_path("/include")),
            Ok(("local", s("include")))
        );
        assert_eq!(
            classify_local_or_global_path(Expression::Variable("LOCAL_PATH".into(), Type::String)),
            Ok(("local", s(".")))
        );
        assert_eq!(
            classify_local_or_global_path(s("system/core")),
            Ok(("global", s("system/core")))
        );
        let other = Expression::concat(Expression::Variable("OUT".into(), Type::String), s("/gen"));
        assert_eq!(
            classify_local_or_global_path(other.clone()),
            Ok(("global", other))
        );
        assert!(classify_local_or_global_path(Expression::Bool(true)).is_err());
    }

    #[test]
    fn test_split_list() {
        let value = Expression::List(vec![local_path("/a"), s("b"), local_path("/c"), s("d")]);
        let lists = split_bp_list(value, &mut classify_local_or_global_path).unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists["local"], Expression::List(vec![s("a"), s("c")]));
        assert_eq!(lists["global"], Expression::List(vec![s("b"), s("d")]));
    }

    #[test]
    fn test_split_operator_merges_same_keys() {
        let value = Expression::concat(
            Expression::List(vec![s("a"), local_path("/b")]),
            Expression::concat(
                Expression::Variable("EXTRA".into(), Type::List),
                Expression::List(vec![s("c")]),
            ),
        );
        let lists = split_bp_list(value, &mut classify_local_or_global_path).unwrap();
        assert_eq!(lists["local"], Expression::List(vec![s("b")]));
        assert_eq!(
            lists["global"],
            Expression::concat(
                Expression::List(vec![s("a")]),
                Expression::concat(
                    Expression::Variable("EXTRA".into(), Type::List),
                    Expression::List(vec![s("c")]),
                ),
            )
        );
    }

    #[test]
    fn test_every_element_is_kept() {
        let words = ["x.c", "y.logtags", "z.c", "w.logtags"];
        let value = Expression::List(words.iter().map(|w| s(w)).collect());
        let lists = split_bp_list(value, &mut |value: Expression| {
            let key = match value.as_str() {
                Some(v) if v.ends_with(".logtags") => "logtags",
                _ => "srcs",
            };
            Ok((key, value))
        })
        .unwrap();
        let total: Vec<String> = lists
            .values()
            .flat_map(|list| list.as_list().unwrap_or_default())
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
        assert_eq!(total.len(), words.len());
        assert_eq!(lists["srcs"], Expression::List(vec![s("x.c"), s("z.c")]));
    }
}
