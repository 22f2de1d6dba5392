use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::iter;
use core::mem;

use super::FixError;
use crate::bp::{Comment, Definition, Expression, File, Item, Module, Property, Type, print_expression};
use crate::path::Path;

const COMMON_PROPERTY_PRIORITIES: &[&str] = &[
    "name",
    "defaults",
    "device_supported",
    "host_supported",
    "installable",
];

/// Libraries that are empty and may not be depended on.
const EMPTY_LIBRARIES: &[&str] = &["libhidltransport", "libhwbinder"];

const LIBRARY_FIELDS: &[&str] = &[
    "export_shared_lib_headers",
    "export_static_lib_headers",
    "static_libs",
    "whole_static_libs",
    "shared_libs",
];

const TAGS_UNSUPPORTED: &str = " WARNING: Module tags are not supported in Soong.";

/// How a `prebuilt_etc` installed below some prefix is expressed.
struct EtcLocation {
    prefix: &'static str,
    ty: Option<&'static str>,
    flags: &'static [&'static str],
}

const fn etc(prefix: &'static str, ty: Option<&'static str>, flags: &'static [&'static str]) -> EtcLocation {
    EtcLocation { prefix, ty, flags }
}

/// Install locations by the variable `local_module_path` starts with. The
/// first matching prefix wins.
const ETC_LOCATIONS: &[(&str, &[EtcLocation])] = &[
    (
        "HOST_OUT",
        &[
            etc("/etc", Some("prebuilt_etc_host"), &[]),
            etc("/usr/share", Some("prebuilt_usr_share_host"), &[]),
            etc("", Some("prebuilt_root_host"), &[]),
        ],
    ),
    (
        "PRODUCT_OUT",
        &[etc("/system/etc", None, &[]), etc("/vendor/etc", None, &["proprietary"])],
    ),
    (
        "TARGET_OUT",
        &[
            etc("/usr/share", Some("prebuilt_usr_share"), &[]),
            etc("/fonts", Some("prebuilt_font"), &[]),
            etc("/etc/firmware", Some("prebuilt_firmware"), &[]),
            etc("/vendor/firmware", Some("prebuilt_firmware"), &["proprietary"]),
            etc("/etc", None, &[]),
        ],
    ),
    (
        "TARGET_OUT_ETC",
        &[etc("/firmware", Some("prebuilt_firmware"), &[]), etc("", None, &[])],
    ),
    (
        "TARGET_OUT_PRODUCT",
        &[
            etc("/etc", None, &["product_specific"]),
            etc("/fonts", Some("prebuilt_font"), &["product_specific"]),
        ],
    ),
    ("TARGET_OUT_PRODUCT_ETC", &[etc("", None, &["product_specific"])]),
    ("TARGET_OUT_ODM", &[etc("/etc", None, &["device_specific"])]),
    ("TARGET_OUT_SYSTEM_EXT", &[etc("/etc", None, &["system_ext_specific"])]),
    ("TARGET_OUT_SYSTEM_EXT_ETC", &[etc("", None, &["system_ext_specific"])]),
    (
        "TARGET_OUT_VENDOR",
        &[
            etc("/etc", None, &["proprietary"]),
            etc("/firmware", Some("prebuilt_firmware"), &["proprietary"]),
        ],
    ),
    ("TARGET_OUT_VENDOR_ETC", &[etc("", None, &["proprietary"])]),
    ("TARGET_RECOVERY_ROOT_OUT", &[etc("/system/etc", None, &["recovery"])]),
];

impl EtcLocation {
    /// Applies the location when `path` lies below the prefix.
    fn update(&self, module: &mut Module, path: &str) -> bool {
        if path != self.prefix {
            let Some(rest) = path
                .strip_prefix(self.prefix)
                .and_then(|rest| rest.strip_prefix('/'))
            else {
                return false;
            };
            module.push_property(Property::new(
                "relative_install_path",
                Expression::string(rest),
            ));
        }
        for flag in self.flags {
            push_true(module, flag);
        }
        if let Some(ty) = self.ty {
            module.ty = ty.into();
        }
        true
    }
}

fn modules(file: &mut File) -> impl Iterator<Item = &mut Module> {
    file.defs.iter_mut().filter_map(|def| match def {
        Definition::Module(module) => Some(module),
        _ => None,
    })
}

fn literal_string<'a>(module: &'a Module, name: &str) -> Option<&'a str> {
    module.property(name)?.value.as_str()
}

fn literal_bool(module: &Module, name: &str) -> Option<bool> {
    match module.property(name)?.value {
        Expression::Bool(value) => Some(value),
        _ => None,
    }
}

fn has_non_empty_list(module: &Module, name: &str) -> bool {
    module
        .property(name)
        .and_then(|prop| prop.value.as_list())
        .is_some_and(|values| !values.is_empty())
}

fn push_true(module: &mut Module, name: &str) {
    module.push_property(Property::new(name, Expression::Bool(true)));
}

/// A string field of a map property, or `""`.
fn map_string<'a>(prop: &'a Property, field: &str) -> &'a str {
    let Expression::Map(props) = &prop.value else {
        return "";
    };
    props
        .iter()
        .find(|prop| prop.name == field)
        .and_then(|prop| prop.value.as_str())
        .unwrap_or_default()
}

fn push_attribute_error(module: &mut Module, attribute: &str, msg: &str) {
    module.push_property(Property::new(
        attribute,
        Expression::string(format!("ERROR: {msg}")),
    ));
}

fn attribute_error(module: &mut Module, attribute: &str, msg: String) -> Result<(), FixError> {
    push_attribute_error(module, attribute, &msg);
    Err(FixError::Invalid(msg.into()))
}

/// `$(LOCAL_MODULE)` stands for the module's own name.
fn resolve_local_module(module: &Module, value: Expression) -> Expression {
    match &value {
        Expression::Variable(name, _) if name == "LOCAL_MODULE" => {
            match literal_string(module, "name") {
                Some(name) => Expression::string(name),
                None => value,
            }
        }
        _ => value,
    }
}

/// Replaces the `srcs` list by a single-valued property.
fn convert_to_single_source(module: &mut Module, name: &str) {
    let single = matches!(
        module.property("srcs").map(|prop| &prop.value),
        Some(Expression::List(_) | Expression::Variable(..))
    );
    if !single {
        module.rename_property("srcs", name);
        return;
    }
    let Some(srcs) = module.remove_property("srcs") else {
        return;
    };
    let value = match srcs.value {
        Expression::List(mut values) => match values.len() {
            0 => return,
            1 => values.remove(0),
            _ => {
                push_attribute_error(module, name, "LOCAL_SRC_FILES should contain at most one item");
                return;
            }
        },
        value => value,
    };
    let value = resolve_local_module(module, value);
    module.push_property(Property::new(name, value));
}

pub(super) fn simplify_redundant_variables(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        let Some(exported) = module
            .property("export_include_dirs")
            .and_then(|prop| prop.value.as_list())
            .map(<[Expression]>::to_vec)
        else {
            continue;
        };
        let Some(Expression::List(local)) = module
            .property_mut("local_include_dirs")
            .map(|prop| &mut prop.value)
        else {
            continue;
        };
        if local.is_empty() {
            continue;
        }
        local.retain(|dir| !exported.contains(dir));
        if local.is_empty() {
            module.remove_property("local_include_dirs");
        }
    }
    Ok(())
}

pub(super) fn rewrite_incorrect_prebuilts(file: &mut File) -> Result<(), FixError> {
    for module in modules(file).filter(|module| module.ty == "java_import") {
        if literal_bool(module, "host") == Some(true) {
            module.ty = "java_import_host".into();
            module.remove_property("host");
        }
        let first = module
            .property("srcs")
            .and_then(|prop| prop.value.as_list())
            .and_then(|values| values.first())
            .and_then(Expression::as_str)
            .map(Path::from);
        match first.as_ref().and_then(Path::extension) {
            Some("jar") => module.rename_property("srcs", "jars"),
            Some("aar") => {
                module.rename_property("srcs", "aars");
                module.ty = "android_library_import".into();
                // never installed
                module.remove_property("installable");
            }
            _ => {}
        }
    }
    Ok(())
}

pub(super) fn rewrite_cts_module_types(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        let (ty, defaults) = match module.ty.as_str() {
            "cts_support_package" => ("android_test_helper_app", "cts_support_defaults"),
            "cts_package" => ("android_test", "cts_defaults"),
            "cts_target_java_library" => ("java_library", "cts_defaults"),
            "cts_host_java_library" => ("java_library_host", "cts_defaults"),
            _ => continue,
        };
        module.ty = ty.into();
        module.push_property(Property::new(
            "defaults",
            Expression::List(vec![Expression::string(defaults)]),
        ));
    }
    Ok(())
}

pub(super) fn rewrite_android_libraries(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        if !module.ty.starts_with("java_") && !module.ty.starts_with("android_") {
            continue;
        }
        let android_libs = has_non_empty_list(module, "android_libs");
        let static_android_libs = has_non_empty_list(module, "android_static_libs");
        let resource_dirs = has_non_empty_list(module, "resource_dirs");

        if (android_libs || static_android_libs || resource_dirs)
            && matches!(module.ty.as_str(), "java_library_static" | "java_library")
        {
            module.ty = "android_library".into();
        }
        if module.ty == "java_import" && !static_android_libs {
            module.remove_property("android_static_libs");
        }

        // duplicates are merged by a later step
        module.rename_property("shared_libs", "libs");
        module.rename_property("android_libs", "libs");
        module.rename_property("android_static_libs", "static_libs");
    }
    Ok(())
}

/// Make has no separate classes for most tests; they are recognised by
/// their tags and test properties instead.
pub(super) fn rewrite_test_module_types(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        if !module.ty.starts_with("java_")
            && !module.ty.starts_with("android_")
            && module.ty != "cc_binary"
        {
            continue;
        }
        let is_test = literal_string(module, "instrumentation_for").is_some_and(|s| !s.is_empty())
            || has_non_empty_list(module, "test_suites")
            || module
                .string_list("tags")
                .is_some_and(|tags| tags.contains(&"tests"));
        if !is_test {
            continue;
        }
        let ty = match module.ty.as_str() {
            "android_app" => "android_test",
            "android_app_import" => "android_test_import",
            "java_library" | "java_library_installable" => "java_test",
            "java_library_host" => "java_test_host",
            "cc_binary" => "cc_test",
            _ => continue,
        };
        module.ty = ty.into();
    }
    Ok(())
}

pub(super) fn rewrite_installable_java_libs(file: &mut File) -> Result<(), FixError> {
    for module in modules(file).filter(|module| module.ty == "java_library_installable") {
        module.ty = "java_library".into();
        if !module.has("installable") {
            push_true(module, "installable");
        }
    }
    Ok(())
}

pub(super) fn rewrite_java_static_libs(file: &mut File) -> Result<(), FixError> {
    for module in modules(file).filter(|module| module.ty == "java_library_static") {
        module.ty = "java_library".into();
    }
    Ok(())
}

/// Turns `local_module_path` into the module type and install properties
/// of the matching prebuilt flavour.
pub(super) fn rewrite_prebuilt_etc(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        if !matches!(module.ty.as_str(), "prebuilt_etc" | "prebuilt_etc_host") {
            continue;
        }
        convert_to_single_source(module, "src");
        module.rename_property("sub_dir", "relative_install_path");

        let Some(path) = module.remove_property("local_module_path") else {
            continue;
        };
        let var = map_string(&path, "var");
        let Some((_, locations)) = ETC_LOCATIONS.iter().find(|(name, _)| *name == var) else {
            let msg = format!("Cannot handle $({var}) for the prebuilt_etc");
            return attribute_error(module, "filename", msg);
        };
        let fixed = map_string(&path, "fixed");
        if !locations.iter().any(|location| location.update(module, fixed)) {
            let prefixes: Vec<&str> = locations.iter().map(|location| location.prefix).collect();
            let msg = format!(
                "LOCAL_MODULE_PATH value under $({var}) should start with {}",
                prefixes.join(", ")
            );
            return attribute_error(module, "filename", msg);
        }
    }
    Ok(())
}

/// Joins list properties defined more than once, at every map level.
pub(super) fn merge_matching_properties(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        merge_duplicates(&mut module.items, item_property)?;
    }
    Ok(())
}

fn item_property(item: &mut Item) -> Option<&mut Property> {
    match item {
        Item::Property(prop) => Some(prop),
        Item::Comment(_) => None,
    }
}

fn same_property(prop: &mut Property) -> Option<&mut Property> {
    Some(prop)
}

fn merge_duplicates<T>(
    list: &mut Vec<T>,
    property: fn(&mut T) -> Option<&mut Property>,
) -> Result<(), FixError> {
    let mut i = 0;
    while i < list.len() {
        let Some(current) = property(&mut list[i]) else {
            i += 1;
            continue;
        };
        let name = current.name.clone();
        if let Expression::Map(props) = &mut current.value {
            merge_duplicates(props, same_property)?;
        }

        let first = (0..i).find(|&j| property(&mut list[j]).is_some_and(|prop| prop.name == name));
        if let Some(j) = first {
            let (head, tail) = list.split_at_mut(i);
            if let (Some(a), Some(b)) = (property(&mut head[j]), property(&mut tail[0]))
                && merge_pair(a, b)?
            {
                list.remove(i);
                continue;
            }
        }
        i += 1;
    }
    Ok(())
}

/// Folds `b` into `a`. Returns whether `b` can be dropped.
fn merge_pair(a: &mut Property, b: &Property) -> Result<bool, FixError> {
    // untyped references are left for the build to report
    if matches!(a.value, Expression::Variable(..)) || matches!(b.value, Expression::Variable(..)) {
        return Ok(false);
    }
    if a.value.ty() != b.value.ty() {
        return Err(FixError::Type(
            format!(
                "type mismatch when merging properties \"{}\": {} and {}",
                a.name,
                a.value.ty(),
                b.value.ty()
            )
            .into(),
        ));
    }
    if a.value.ty() == Type::String {
        return Err(FixError::Conflict(
            format!("conflicting definitions of string property \"{}\"", a.name).into(),
        ));
    }
    match (&mut a.value, &b.value) {
        (Expression::List(values), Expression::List(more)) => {
            values.extend(more.iter().cloned());
            Ok(true)
        }
        (Expression::Map(props), Expression::Map(more)) => {
            props.extend(more.iter().cloned());
            merge_duplicates(props, same_property)?;
            Ok(true)
        }
        (value, more) if value.ty() == Type::List => {
            *value = Expression::concat(value.clone(), more.clone());
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Moves the common properties to the front. Comments stay with the
/// property that follows them.
pub(super) fn reorder_common_properties(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        let mut chunks: Vec<Vec<Item>> = Vec::new();
        let mut pending = Vec::new();
        for item in mem::take(&mut module.items) {
            let is_property = matches!(item, Item::Property(_));
            pending.push(item);
            if is_property {
                chunks.push(mem::take(&mut pending));
            }
        }
        chunks.sort_by_key(|chunk| match chunk.last() {
            Some(Item::Property(prop)) => COMMON_PROPERTY_PRIORITIES
                .iter()
                .position(|name| *name == prop.name)
                .unwrap_or(COMMON_PROPERTY_PRIORITIES.len()),
            _ => COMMON_PROPERTY_PRIORITIES.len(),
        });
        module.items = chunks.into_iter().flatten().chain(pending).collect();
    }
    Ok(())
}

fn tests_tag_hint(ty: &str) -> Option<&'static [&'static str]> {
    if ty.contains("cc_test")
        || ty.contains("cc_library_static")
        || ty.contains("java_test")
        || ty == "android_test"
        || ty == "android_test_import"
    {
        return None;
    }
    let hint: &[&str] = if ty.contains("cc_lib") {
        &[
            " To make a shared library only for tests, use the \"cc_test_library\" module",
            " type. If you don't use gtest, set \"gtest: false\".",
        ]
    } else if ty.contains("cc_bin") {
        &[
            " For native test binaries, use the \"cc_test\" module type. Some differences:",
            "  - If you don't use gtest, set \"gtest: false\"",
            "  - Binaries will be installed into /data/nativetest[64]/<name>/<name>",
            "  - Both 32 & 64 bit versions will be built (as appropriate)",
        ]
    } else if ty.contains("java_lib") {
        &[
            " For JUnit or similar tests, use the \"java_test\" module type. A dependency on",
            " Junit will be added by default, if it is using some other runner, set \"junit: false\".",
        ]
    } else if ty == "android_app" {
        &[" For JUnit or instrumentataion app tests, use the \"android_test\" module type."]
    } else {
        &[
            " In most cases, tests are now identified by their module type:",
            " cc_test, java_test, python_test",
        ]
    };
    Some(hint)
}

/// Comment lines replacing one module tag, if it needs any.
fn tag_comment(ty: &str, tag: &Expression) -> Option<Vec<String>> {
    let Some(tag) = tag.as_str() else {
        let tag = print_expression(tag);
        return Some(vec![format!(" ERROR: Unable to parse tag {tag:?}")]);
    };
    let hint: &[&str] = match tag {
        "optional" => return None,
        "debug" => &[
            " Add this module to PRODUCT_PACKAGES_DEBUG in your product file if you want to",
            " force installation for -userdebug and -eng builds.",
        ],
        "eng" => &[
            " Add this module to PRODUCT_PACKAGES_ENG in your product file if you want to",
            " force installation for -eng builds.",
        ],
        "tests" => tests_tag_hint(ty)?,
        _ => return Some(vec![format!(" WARNING: Unknown module tag {tag:?}")]),
    };
    Some(
        iter::once(TAGS_UNSUPPORTED)
            .chain(hint.iter().copied())
            .map(String::from)
            .collect(),
    )
}

/// Replaces `tags` by comments explaining each tag's replacement.
pub(super) fn remove_tags(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        let Some(index) = module
            .items
            .iter()
            .position(|item| matches!(item, Item::Property(prop) if prop.name == "tags"))
        else {
            continue;
        };
        let Item::Property(Property {
            value: Expression::List(tags),
            ..
        }) = &module.items[index]
        else {
            continue;
        };
        let comments: Vec<Item> = tags
            .iter()
            .filter_map(|tag| tag_comment(&module.ty, tag))
            .map(|lines| Item::Comment(Comment::new(lines)))
            .collect();
        module.items.splice(index..=index, comments);
    }
    Ok(())
}

/// Test apps install into `$(TARGET_OUT_DATA_APPS)` and nowhere else.
pub(super) fn rewrite_android_test(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        if !matches!(module.ty.as_str(), "android_test" | "android_test_helper_app") {
            continue;
        }
        let Some(path) = module.remove_property("local_module_path") else {
            continue;
        };
        if map_string(&path, "var") == "TARGET_OUT_DATA_APPS" && map_string(&path, "fixed").is_empty() {
            continue;
        }
        let msg = format!(
            "Only LOCAL_MODULE_PATH := $(TARGET_OUT_DATA_APPS) is allowed for the {}",
            module.ty
        );
        return attribute_error(module, "filename", msg);
    }
    Ok(())
}

pub(super) fn rewrite_android_app_import(file: &mut File) -> Result<(), FixError> {
    for module in modules(file).filter(|module| module.ty == "android_app_import") {
        convert_to_single_source(module, "apk");
        if literal_string(module, "certificate") == Some("PRESIGNED") {
            module.remove_property("certificate");
            push_true(module, "presigned");
        }
    }
    Ok(())
}

/// Overlays are always product specific in make.
pub(super) fn rewrite_runtime_resource_overlay(file: &mut File) -> Result<(), FixError> {
    for module in modules(file).filter(|module| module.ty == "runtime_resource_overlay") {
        if !module.has("product_specific") {
            push_true(module, "product_specific");
        }
    }
    Ok(())
}

pub(super) fn remove_empty_lib_dependencies(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        for field in LIBRARY_FIELDS {
            let Some(values) = module.property(field).and_then(|prop| prop.value.as_list()) else {
                continue;
            };
            if values.iter().any(|value| value.as_str().is_none()) {
                return Err(FixError::Type(
                    format!("Expecting string for {}.{} fields", module.ty, field).into(),
                ));
            }
            let kept: Vec<Expression> = values
                .iter()
                .filter(|value| value.as_str().is_some_and(|lib| !EMPTY_LIBRARIES.contains(&lib)))
                .cloned()
                .collect();
            if kept.is_empty() && !values.is_empty() {
                module.remove_property(field);
            } else if let Some(prop) = module.property_mut(field) {
                prop.value = Expression::List(kept);
            }
        }
    }
    Ok(())
}

pub(super) fn remove_hidl_interface_types(file: &mut File) -> Result<(), FixError> {
    for module in modules(file).filter(|module| module.ty == "hidl_interface") {
        module.remove_property("types");
    }
    Ok(())
}

pub(super) fn remove_pdk_property(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        remove_nested_property(module, "product_variables.pdk");
    }
    Ok(())
}

pub(super) fn remove_scudo_property(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        remove_nested_property(module, "sanitize.scudo");
    }
    Ok(())
}

/// Removes a dotted property, along with the maps it leaves empty.
fn remove_nested_property(module: &mut Module, path: &str) {
    let Some((head, rest)) = path.split_once('.') else {
        module.remove_property(path);
        return;
    };
    let Some(Expression::Map(props)) = module.property_mut(head).map(|prop| &mut prop.value) else {
        return;
    };
    if remove_from_map(props, rest) && props.is_empty() {
        module.remove_property(head);
    }
}

fn remove_from_map(props: &mut Vec<Property>, path: &str) -> bool {
    let Some((head, rest)) = path.split_once('.') else {
        let before = props.len();
        props.retain(|prop| prop.name != path);
        return props.len() != before;
    };
    let Some(index) = props.iter().position(|prop| prop.name == head) else {
        return false;
    };
    let Expression::Map(inner) = &mut props[index].value else {
        return false;
    };
    let removed = remove_from_map(inner, rest);
    if removed && inner.is_empty() {
        props.remove(index);
    }
    removed
}

pub(super) fn remove_default_resource_dirs(file: &mut File) -> Result<(), FixError> {
    for module in modules(file) {
        if module.string_list("resource_dirs").as_deref() == Some(&["res"][..]) {
            module.remove_property("resource_dirs");
        }
        if module.string_list("asset_dirs").as_deref() == Some(&["assets"][..]) {
            module.remove_property("asset_dirs");
        }
    }
    Ok(())
}
