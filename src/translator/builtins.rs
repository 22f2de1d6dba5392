use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use super::properties::{CLEAR_VARS, INCLUDE_IGNORED, Rules};
use crate::scope::Scope;

fn files_under(args: &[String], wildcard: &str) -> Vec<String> {
    let dirs: Vec<&str> = match args.first() {
        Some(dirs) => dirs.split_whitespace().collect(),
        None => vec![""],
    };
    dirs.into_iter()
        .map(|dir| format!("{dir}/**/{wildcard}"))
        .collect()
}

fn my_dir(_: &[String]) -> Vec<String> {
    vec![".".into()]
}

fn all_java_files_under(args: &[String]) -> Vec<String> {
    files_under(args, "*.java")
}

fn all_proto_files_under(args: &[String]) -> Vec<String> {
    files_under(args, "*.proto")
}

fn all_aidl_files_under(args: &[String]) -> Vec<String> {
    files_under(args, "*.aidl")
}

fn all_iaidl_files_under(args: &[String]) -> Vec<String> {
    files_under(args, "I*.aidl")
}

fn all_logtags_files_under(args: &[String]) -> Vec<String> {
    files_under(args, "*.logtags")
}

fn all_subdir_java_files(_: &[String]) -> Vec<String> {
    vec!["**/*.java".into()]
}

fn include_ignored(_: &[String]) -> Vec<String> {
    vec![INCLUDE_IGNORED.into()]
}

/// Root scope every makefile is evaluated in.
///
/// Each module-type variable evaluates to its own name, which is what
/// [`Rules::module_type`] is keyed by.
pub(crate) fn android_scope(rules: &Rules) -> Scope<'static> {
    let mut scope = Scope::new();
    scope.set("CLEAR_VARS", CLEAR_VARS);
    scope.set_func("my-dir", my_dir);
    scope.set_func("all-java-files-under", all_java_files_under);
    scope.set_func("all-proto-files-under", all_proto_files_under);
    scope.set_func("all-aidl-files-under", all_aidl_files_under);
    scope.set_func("all-Iaidl-files-under", all_iaidl_files_under);
    scope.set_func("all-logtags-files-under", all_logtags_files_under);
    scope.set_func("all-subdir-java-files", all_subdir_java_files);
    scope.set_func("all-makefiles-under", include_ignored);
    scope.set_func("first-makefiles-under", include_ignored);
    scope.set_func("all-named-subdir-makefiles", include_ignored);
    scope.set_func("all-subdir-makefiles", include_ignored);
    for name in rules.module_type_variables() {
        scope.set(name, name);
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_under() {
        let scope = android_scope(&Rules::new());
        assert_eq!(
            scope.call("all-java-files-under", &[" src gen".into()]),
            vec!["src/**/*.java", "gen/**/*.java"]
        );
        assert_eq!(scope.call("all-Iaidl-files-under", &[]), vec!["/**/I*.aidl"]);
        assert_eq!(scope.call("all-subdir-java-files", &[]), vec!["**/*.java"]);
    }

    #[test]
    fn test_module_type_variables_resolve_to_themselves() {
        let rules = Rules::new();
        let scope = android_scope(&rules);
        let path = scope.get("BUILD_SHARED_LIBRARY");
        assert_eq!(rules.module_type(&path), Some("cc_library_shared"));
        assert_eq!(scope.get("CLEAR_VARS"), CLEAR_VARS);
        assert_eq!(scope.call("all-subdir-makefiles", &[]), vec![INCLUDE_IGNORED]);
    }
}
