use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use super::error::{TranslateError, bail_type, bail_unsupported};
use super::properties::Rewrite;
use super::split::{Lists, classify_local_or_global_path, split_bp_list};
use super::values::add_values;
use super::{Assign, Translator, error_comment};
use crate::bp::{Expression, Type};
use crate::parser::Variable;

const SANITIZERS: &[&str] = &["never", "address", "coverage", "thread", "undefined", "cfi"];

enum Ldflag {
    Flag,
    VersionScript(String),
    Unrecognized,
}

/// Recognises `-Wl,--version-script,$(LOCAL_PATH)/path`.
fn ldflag(value: &Expression) -> Ldflag {
    let Expression::Operator(outer) = value else {
        return Ldflag::Flag;
    };
    let Expression::Operator(inner) = &outer.args[0] else {
        return Ldflag::Flag;
    };
    if inner.args[0].as_str() != Some("-Wl,--version-script,") {
        return Ldflag::Flag;
    }
    match (&inner.args[1], &outer.args[1]) {
        (Expression::Variable(name, _), Expression::String(path)) if name == "LOCAL_PATH" => {
            Ldflag::VersionScript(path.trim_start_matches('/').into())
        }
        _ => Ldflag::Unrecognized,
    }
}

fn is_empty_list(value: &Expression) -> bool {
    value.as_list().is_some_and(|values| values.is_empty())
}

/// Elements of a list, or of `+` joined lists.
fn list_items(value: Expression) -> Vec<Expression> {
    match value {
        Expression::List(values) => values,
        Expression::Operator(op) => {
            let [lhs, rhs] = op.args;
            let mut items = list_items(lhs);
            items.extend(list_items(rhs));
            items
        }
        value => vec![value],
    }
}

fn literal_name(variable: &Variable) -> Option<&str> {
    match variable.name.strings.as_slice() {
        [name] if variable.name.is_const() && !name.is_empty() => Some(name),
        _ => None,
    }
}

impl Translator<'_> {
    pub(super) fn rewrite(&mut self, rewrite: Rewrite, ctx: &Assign) -> Result<(), TranslateError> {
        match rewrite {
            Rewrite::Standard(name, ty) => {
                let value = self.to_bp(ctx.value, ty)?;
                self.set_local(ctx, name, value)
            }
            Rewrite::Skip => Ok(()),
            Rewrite::ThirtyTwoBitOnly => match self.to_bp(ctx.value, Type::Bool)? {
                Expression::Bool(true) => self.set_variable(
                    false,
                    ctx.prefix,
                    "compile_multilib",
                    Expression::string("32"),
                    true,
                ),
                Expression::Bool(false) => Ok(()),
                _ => bail_type!("value should evaluate to boolean literal"),
            },
            Rewrite::IncludeDirs { global, local } => {
                let value = self.to_bp(ctx.value, Type::List)?;
                let lists = split_bp_list(value, &mut classify_local_or_global_path)?;
                self.assign_lists(ctx, lists, &[("global", global), ("local", local)])
            }
            Rewrite::LocalizePathList(name) => {
                let paths = self.localize_paths(ctx)?;
                self.set_local(ctx, name, paths)
            }
            Rewrite::LocalizePath(name) => {
                let mut paths = list_items(self.localize_paths(ctx)?);
                match paths.len() {
                    0 => self.set_local(ctx, name, Expression::List(Vec::new())),
                    1 => {
                        let path = paths.remove(0);
                        self.set_local(ctx, name, path)
                    }
                    _ => bail_type!("Expected single value for {}", name),
                }
            }
            Rewrite::Ldflags => self.ldflags(ctx),
            Rewrite::PrebuiltClass => {
                let class = ctx.value.value(&self.scope);
                let class = class.trim();
                let class = match self.rules.is_prebuilt_class(class) {
                    true => class,
                    false => "prebuilt",
                };
                self.scope.set("BUILD_PREBUILT", class);
                Ok(())
            }
            Rewrite::Stem => {
                let value = self.to_bp(ctx.value, Type::String)?;
                let (name, value) = match value {
                    Expression::Operator(op)
                        if op.args[0].as_variable() == Some("LOCAL_MODULE") =>
                    {
                        let [_, suffix] = op.args;
                        ("suffix", suffix)
                    }
                    value => ("stem", value),
                };
                self.set_local(ctx, name, value)
            }
            Rewrite::HostOs => self.host_os(ctx),
            Rewrite::Sanitize(sub) => self.sanitize(ctx, sub),
            Rewrite::Strip => {
                let Expression::String(option) = self.to_bp(ctx.value, Type::String)? else {
                    bail_unsupported!("unsupported strip expression");
                };
                let sub = match option.as_str() {
                    "false" => "none",
                    "true" => "all",
                    "keep_symbols" => "keep_symbols",
                    _ => bail_type!("unexpected strip option: {}", option),
                };
                let name = format!("strip.{sub}");
                self.set_variable(false, ctx.prefix, &name, Expression::Bool(true), true)
            }
            Rewrite::Cflags => {
                // make needs the quotes escaped, blueprint strings don't
                let mut value = ctx.value.clone();
                value.replace_literal("\\\"", "\"");
                let value = self.to_bp(&value, Type::List)?;
                self.set_local(ctx, "cflags", value)
            }
            Rewrite::Invert(name) => match self.to_bp(ctx.value, Type::Bool)? {
                Expression::Bool(value) => self.set_local(ctx, name, Expression::Bool(!value)),
                _ => bail_type!("value should evaluate to boolean literal"),
            },
            Rewrite::ProguardEnabled => self.proguard(ctx),
            Rewrite::ModulePath => self.module_path(ctx),
            Rewrite::Tags => {
                if ctx.value.dump().trim() == "optional" {
                    return Ok(());
                }
                let value = self.to_bp(ctx.value, Type::List)?;
                if value.as_list().is_some_and(|tags| tags.is_empty()) {
                    return Ok(());
                }
                self.set_local(ctx, "tags", value)
            }
            Rewrite::SrcFiles => {
                let value = self.to_bp(ctx.value, Type::List)?;
                let lists = split_bp_list(value, &mut |value: Expression| {
                    let key = match value.as_str() {
                        Some(file) if file.ends_with(".logtags") => "logtags",
                        _ => "srcs",
                    };
                    Ok((key, value))
                })?;
                self.assign_lists(ctx, lists, &[("logtags", "logtags"), ("srcs", "srcs")])
            }
            Rewrite::ArmMode => {
                let value = self.to_bp(ctx.value, Type::String)?;
                self.set_variable(ctx.append, Some("arch.arm"), "instruction_set", value, true)
            }
        }
    }

    fn set_local(&mut self, ctx: &Assign, name: &str, value: Expression) -> Result<(), TranslateError> {
        self.set_variable(ctx.append, ctx.prefix, name, value, true)
    }

    /// Assigns the non-empty partitions, in the order of `names`. Keys sharing
    /// a property name are joined.
    fn assign_lists(
        &mut self,
        ctx: &Assign,
        mut lists: Lists,
        names: &[(&str, &'static str)],
    ) -> Result<(), TranslateError> {
        let mut merged: Vec<(&'static str, Expression)> = Vec::new();
        for &(key, name) in names {
            let Some(component) = lists.remove(key) else {
                continue;
            };
            if is_empty_list(&component) {
                continue;
            }
            match merged.iter_mut().find(|(prev, _)| *prev == name) {
                Some((_, value)) => {
                    let prev = mem::replace(value, Expression::List(Vec::new()));
                    *value = add_values(Some(prev), component)?;
                }
                None => merged.push((name, component)),
            }
        }
        for (name, value) in merged {
            self.set_local(ctx, name, value)?;
        }
        Ok(())
    }

    /// Paths relative to the makefile. Only `$(LOCAL_PATH)` anchored paths
    /// can be made relative.
    fn localize_paths(&self, ctx: &Assign) -> Result<Expression, TranslateError> {
        let value = self.to_bp(ctx.value, Type::List)?;
        let mut lists = split_bp_list(value, &mut classify_local_or_global_path)?;
        if lists.contains_key("global") {
            bail_unsupported!("Only $(LOCAL_PATH)/.. values are allowed");
        }
        Ok(lists
            .remove("local")
            .unwrap_or_else(|| Expression::List(Vec::new())))
    }

    fn ldflags(&mut self, ctx: &Assign) -> Result<(), TranslateError> {
        let value = self.to_bp(ctx.value, Type::List)?;
        let mut unrecognized = false;
        let mut lists = split_bp_list(value, &mut |value: Expression| match ldflag(&value) {
            Ldflag::Flag => Ok(("ldflags", value)),
            Ldflag::Unrecognized => {
                unrecognized = true;
                Ok(("ldflags", value))
            }
            Ldflag::VersionScript(path) => Ok(("version", Expression::String(path))),
        })?;
        if unrecognized {
            self.push_comment(error_comment("Unrecognized version-script", &ctx.value.dump()));
        }

        if let Some(ldflags) = lists.remove("ldflags").filter(|v| !is_empty_list(v)) {
            self.set_local(ctx, "ldflags", ldflags)?;
        }

        let scripts = lists.remove("version").map(list_items).unwrap_or_default();
        let mut scripts = scripts.into_iter();
        if let Some(script) = scripts.next() {
            if scripts.next().is_some() {
                self.push_comment(error_comment(
                    "multiple version scripts found?",
                    &ctx.value.dump(),
                ));
            }
            self.set_variable(false, ctx.prefix, "version_script", script, true)?;
        }
        Ok(())
    }

    fn host_os(&mut self, ctx: &Assign) -> Result<(), TranslateError> {
        let value = self.to_bp(ctx.value, Type::List)?;
        let Some(values) = value.as_list() else {
            bail_unsupported!("unsupported host os expression");
        };
        let mut oses = Vec::new();
        for value in values {
            match value.as_str() {
                Some(os) => oses.push(os),
                None => bail_type!("host os expected a string, got {}", value.ty()),
            }
        }

        let has = |os: &str| oses.contains(&os);
        let (windows, linux, darwin) = (has("windows"), has("linux"), has("darwin"));
        if windows {
            self.set_variable(false, Some("target.windows"), "enabled", Expression::Bool(true), true)?;
        }
        if !linux {
            self.set_variable(
                false,
                Some("target.linux_glibc"),
                "enabled",
                Expression::Bool(false),
                true,
            )?;
        }
        if !darwin {
            self.set_variable(false, Some("target.darwin"), "enabled", Expression::Bool(false), true)?;
        }
        Ok(())
    }

    fn sanitize(&mut self, ctx: &Assign, sub: &str) -> Result<(), TranslateError> {
        let value = self.to_bp(ctx.value, Type::List)?;
        let misc_name = format!("sanitize.{sub}misc_undefined");
        let Expression::List(values) = value else {
            return self.set_variable(false, ctx.prefix, &misc_name, value, true);
        };

        let mut misc = Vec::new();
        for value in values {
            match value.as_str() {
                Some(sanitizer) if SANITIZERS.contains(&sanitizer) => {
                    let name = format!("sanitize.{sub}{sanitizer}");
                    self.set_variable(false, ctx.prefix, &name, Expression::Bool(true), true)?;
                }
                _ => misc.push(value),
            }
        }
        if !misc.is_empty() {
            self.set_variable(false, ctx.prefix, &misc_name, Expression::List(misc), true)?;
        }
        Ok(())
    }

    fn proguard(&mut self, ctx: &Assign) -> Result<(), TranslateError> {
        let value = self.to_bp(ctx.value, Type::List)?;
        let Expression::List(values) = value else {
            bail_unsupported!("unsupported proguard expression");
        };

        let mut enable = false;
        for value in values {
            let Some(option) = value.as_str() else {
                bail_unsupported!("unsupported proguard expression");
            };
            let set = match option {
                "disabled" => Some(("optimize.enabled", false)),
                "obfuscation" => Some(("optimize.obfuscate", true)),
                "optimization" => Some(("optimize.optimize", true)),
                "full" => None,
                "custom" => Some(("optimize.no_aapt_flags", true)),
                _ => bail_unsupported!("unsupported proguard value \"{}\"", option),
            };
            enable |= option != "disabled";
            if let Some((name, value)) = set {
                self.set_variable(false, ctx.prefix, name, Expression::Bool(value), true)?;
            }
        }
        if enable {
            self.set_variable(false, ctx.prefix, "optimize.enabled", Expression::Bool(true), true)?;
        }
        Ok(())
    }

    /// `$(VAR)/fixed`, or `$(PRODUCT_OUT)/$(TARGET_COPY_OUT_VENDOR)/fixed`
    /// which means the same as `$(TARGET_OUT_VENDOR)/fixed`.
    fn module_path(&mut self, ctx: &Assign) -> Result<(), TranslateError> {
        if ctx.append {
            bail_unsupported!("Cannot handle appending to LOCAL_MODULE_PATH");
        }
        let value = ctx.value;
        let (var, fixed) = match (value.variables.as_slice(), value.strings.as_slice()) {
            ([var], [before, fixed]) if before.is_empty() && literal_name(var).is_some() => {
                (literal_name(var).unwrap_or_default(), fixed.as_str())
            }
            ([out, vendor], [before, sep, fixed])
                if before.is_empty()
                    && sep == "/"
                    && literal_name(out) == Some("PRODUCT_OUT")
                    && literal_name(vendor) == Some("TARGET_COPY_OUT_VENDOR") =>
            {
                ("TARGET_OUT_VENDOR", fixed.as_str())
            }
            _ => bail_unsupported!(
                "LOCAL_MODULE_PATH value should start with $(<some-variable>)/ or $(PRODUCT_OUT)/$(TARGET_COPY_VENDOR)/"
            ),
        };
        let prefix = Some("local_module_path");
        self.set_variable(false, prefix, "var", Expression::string(var), true)?;
        if !fixed.is_empty() {
            self.set_variable(false, prefix, "fixed", Expression::string(fixed), true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Expression {
        Expression::string(v)
    }

    fn var(name: &str) -> Expression {
        Expression::Variable(name.into(), Type::String)
    }

    #[test]
    fn test_ldflag_version_script() {
        let script = Expression::concat(
            Expression::concat(s("-Wl,--version-script,"), var("LOCAL_PATH")),
            s("/exported.map"),
        );
        assert!(matches!(ldflag(&script), Ldflag::VersionScript(path) if path == "exported.map"));

        let elsewhere = Expression::concat(
            Expression::concat(s("-Wl,--version-script,"), var("OUT")),
            s("/exported.map"),
        );
        assert!(matches!(ldflag(&elsewhere), Ldflag::Unrecognized));
        assert!(matches!(ldflag(&s("-Wl,--gc-sections")), Ldflag::Flag));
    }

    #[test]
    fn test_list_items_flattens_operators() {
        let value = Expression::concat(
            Expression::List(vec![s("a")]),
            Expression::List(vec![s("b"), s("c")]),
        );
        assert_eq!(list_items(value), vec![s("a"), s("b"), s("c")]);
    }
}
