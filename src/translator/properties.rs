use hashbrown::HashMap;

use crate::bp::Type;

/// Value of the scope variable that `include $(CLEAR_VARS)` resolves to.
pub const CLEAR_VARS: &str = "__android_mk_clear_vars";
/// Value of includes that pull in other makefiles.
pub const INCLUDE_IGNORED: &str = "__android_mk_include_ignored";

/// How a `LOCAL_` variable is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// Plain conversion into a property of the given type.
    Standard(&'static str, Type),
    Skip,
    ThirtyTwoBitOnly,
    /// Splits paths into global and `$(LOCAL_PATH)` relative properties.
    IncludeDirs {
        global: &'static str,
        local: &'static str,
    },
    LocalizePathList(&'static str),
    LocalizePath(&'static str),
    Ldflags,
    PrebuiltClass,
    Stem,
    HostOs,
    /// Sanitizer list, under `sanitize.` plus the given sub-map.
    Sanitize(&'static str),
    Strip,
    Cflags,
    Invert(&'static str),
    ProguardEnabled,
    ModulePath,
    Tags,
    SrcFiles,
    ArmMode,
}

/// Property prefixes selected by variable name suffixes, e.g.
/// `LOCAL_SRC_FILES_arm`. Suffixes that end another suffix come later.
pub const PROPERTY_PREFIXES: &[(&str, &str)] = &[
    ("arm", "arch.arm"),
    ("arm64", "arch.arm64"),
    ("mips", "arch.mips"),
    ("mips64", "arch.mips64"),
    ("x86", "arch.x86"),
    ("x86_64", "arch.x86_64"),
    ("32", "multilib.lib32"),
    // after x86_64
    ("64", "multilib.lib64"),
    ("darwin", "target.darwin"),
    ("linux", "target.linux_glibc"),
    ("windows", "target.windows"),
];

/// Property prefixes for each branch of a known conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalTranslation {
    pub when_true: Option<&'static str>,
    pub when_false: Option<&'static str>,
}

impl ConditionalTranslation {
    pub fn prefix(&self, eq: bool) -> Option<&'static str> {
        if eq { self.when_true } else { self.when_false }
    }
}

/// Read-only translation tables, shared by every file translated with the
/// same converter.
pub struct Rules {
    pub(crate) rewrites: HashMap<&'static str, Rewrite>,
    pub(crate) module_types: HashMap<&'static str, &'static str>,
    pub(crate) conditionals: HashMap<&'static str, ConditionalTranslation>,
}

const MODULE_TYPES: &[(&str, &str)] = &[
    ("BUILD_SHARED_LIBRARY", "cc_library_shared"),
    ("BUILD_STATIC_LIBRARY", "cc_library_static"),
    ("BUILD_HOST_SHARED_LIBRARY", "cc_library_host_shared"),
    ("BUILD_HOST_STATIC_LIBRARY", "cc_library_host_static"),
    ("BUILD_HEADER_LIBRARY", "cc_library_headers"),
    ("BUILD_EXECUTABLE", "cc_binary"),
    ("BUILD_HOST_EXECUTABLE", "cc_binary_host"),
    ("BUILD_NATIVE_TEST", "cc_test"),
    ("BUILD_HOST_NATIVE_TEST", "cc_test_host"),
    ("BUILD_NATIVE_BENCHMARK", "cc_benchmark"),
    ("BUILD_HOST_NATIVE_BENCHMARK", "cc_benchmark_host"),
    // java_library_installable becomes java_library in the fix-up pass
    ("BUILD_JAVA_LIBRARY", "java_library_installable"),
    ("BUILD_STATIC_JAVA_LIBRARY", "java_library"),
    ("BUILD_HOST_JAVA_LIBRARY", "java_library_host"),
    ("BUILD_HOST_DALVIK_JAVA_LIBRARY", "java_library_host_dalvik"),
    ("BUILD_PACKAGE", "android_app"),
    ("BUILD_RRO_PACKAGE", "runtime_resource_overlay"),
    ("BUILD_CTS_EXECUTABLE", "cc_binary"),
    ("BUILD_CTS_SUPPORT_PACKAGE", "cts_support_package"),
    ("BUILD_CTS_PACKAGE", "cts_package"),
    ("BUILD_CTS_TARGET_JAVA_LIBRARY", "cts_target_java_library"),
    ("BUILD_CTS_HOST_JAVA_LIBRARY", "cts_host_java_library"),
];

/// `LOCAL_MODULE_CLASS` values usable with `include $(BUILD_PREBUILT)`.
const PREBUILT_TYPES: &[(&str, &str)] = &[
    ("SHARED_LIBRARIES", "cc_prebuilt_library_shared"),
    ("STATIC_LIBRARIES", "cc_prebuilt_library_static"),
    ("EXECUTABLES", "cc_prebuilt_binary"),
    ("JAVA_LIBRARIES", "java_import"),
    ("APPS", "android_app_import"),
    ("ETC", "prebuilt_etc"),
];

const INCLUDE_PATHS: &[(&str, &str)] = &[("test/vts/tools/build/Android.host_config.mk", "vts_config")];

const STRING_PROPERTIES: &[(&str, &str)] = &[
    ("LOCAL_MODULE", "name"),
    ("LOCAL_CXX_STL", "stl"),
    ("LOCAL_MULTILIB", "compile_multilib"),
    ("LOCAL_ARM_MODE_HACK", "instruction_set"),
    ("LOCAL_SDK_VERSION", "sdk_version"),
    ("LOCAL_MIN_SDK_VERSION", "min_sdk_version"),
    ("LOCAL_NDK_STL_VARIANT", "stl"),
    ("LOCAL_JAR_MANIFEST", "manifest"),
    ("LOCAL_CERTIFICATE", "certificate"),
    ("LOCAL_PACKAGE_NAME", "name"),
    ("LOCAL_MODULE_RELATIVE_PATH", "relative_install_path"),
    ("LOCAL_PROTOC_OPTIMIZE_TYPE", "proto.type"),
    ("LOCAL_MODULE_OWNER", "owner"),
    ("LOCAL_RENDERSCRIPT_TARGET_API", "renderscript.target_api"),
    ("LOCAL_NOTICE_FILE", "notice"),
    ("LOCAL_JAVA_LANGUAGE_VERSION", "java_version"),
    ("LOCAL_INSTRUMENTATION_FOR", "instrumentation_for"),
    ("LOCAL_MANIFEST_FILE", "manifest"),
    ("LOCAL_DEX_PREOPT_PROFILE_CLASS_LISTING", "dex_preopt.profile"),
    ("LOCAL_TEST_CONFIG", "test_config"),
];

const LIST_PROPERTIES: &[(&str, &str)] = &[
    ("LOCAL_SRC_FILES_EXCLUDE", "exclude_srcs"),
    ("LOCAL_HEADER_LIBRARIES", "header_libs"),
    ("LOCAL_SHARED_LIBRARIES", "shared_libs"),
    ("LOCAL_STATIC_LIBRARIES", "static_libs"),
    ("LOCAL_WHOLE_STATIC_LIBRARIES", "whole_static_libs"),
    ("LOCAL_SYSTEM_SHARED_LIBRARIES", "system_shared_libs"),
    ("LOCAL_ASFLAGS", "asflags"),
    ("LOCAL_CLANG_ASFLAGS", "clang_asflags"),
    ("LOCAL_CONLYFLAGS", "conlyflags"),
    ("LOCAL_CPPFLAGS", "cppflags"),
    ("LOCAL_REQUIRED_MODULES", "required"),
    ("LOCAL_OVERRIDES_MODULES", "overrides"),
    ("LOCAL_LDLIBS", "host_ldlibs"),
    ("LOCAL_CLANG_CFLAGS", "clang_cflags"),
    ("LOCAL_YACCFLAGS", "yaccflags"),
    ("LOCAL_SANITIZE_RECOVER", "sanitize.recover"),
    ("LOCAL_LOGTAGS_FILES", "logtags"),
    ("LOCAL_EXPORT_HEADER_LIBRARY_HEADERS", "export_header_lib_headers"),
    ("LOCAL_EXPORT_SHARED_LIBRARY_HEADERS", "export_shared_lib_headers"),
    ("LOCAL_EXPORT_STATIC_LIBRARY_HEADERS", "export_static_lib_headers"),
    ("LOCAL_INIT_RC", "init_rc"),
    ("LOCAL_VINTF_FRAGMENTS", "vintf_fragments"),
    ("LOCAL_TIDY_FLAGS", "tidy_flags"),
    ("LOCAL_TIDY_CHECKS", "tidy_checks"),
    ("LOCAL_RENDERSCRIPT_INCLUDES", "renderscript.include_dirs"),
    ("LOCAL_RENDERSCRIPT_FLAGS", "renderscript.flags"),
    ("LOCAL_JAVA_RESOURCE_DIRS", "java_resource_dirs"),
    ("LOCAL_JAVACFLAGS", "javacflags"),
    ("LOCAL_ERROR_PRONE_FLAGS", "errorprone.javacflags"),
    ("LOCAL_DX_FLAGS", "dxflags"),
    ("LOCAL_JAVA_LIBRARIES", "libs"),
    ("LOCAL_STATIC_JAVA_LIBRARIES", "static_libs"),
    ("LOCAL_JNI_SHARED_LIBRARIES", "jni_libs"),
    ("LOCAL_AAPT_FLAGS", "aaptflags"),
    ("LOCAL_PACKAGE_SPLITS", "package_splits"),
    ("LOCAL_COMPATIBILITY_SUITE", "test_suites"),
    ("LOCAL_OVERRIDES_PACKAGES", "overrides"),
    ("LOCAL_ANNOTATION_PROCESSORS", "plugins"),
    ("LOCAL_PROGUARD_FLAGS", "optimize.proguard_flags"),
    ("LOCAL_PROGUARD_FLAG_FILES", "optimize.proguard_flags_files"),
    // renamed to libs and static_libs by the fix-up pass
    ("LOCAL_SHARED_ANDROID_LIBRARIES", "android_libs"),
    ("LOCAL_STATIC_ANDROID_LIBRARIES", "android_static_libs"),
    ("LOCAL_ADDITIONAL_CERTIFICATES", "additional_certificates"),
    ("LOCAL_JACK_COVERAGE_INCLUDE_FILTER", "jacoco.include_filter"),
    ("LOCAL_JACK_COVERAGE_EXCLUDE_FILTER", "jacoco.exclude_filter"),
    ("LOCAL_FULL_LIBS_MANIFEST_FILES", "additional_manifests"),
];

const BOOL_PROPERTIES: &[(&str, &str)] = &[
    ("LOCAL_IS_HOST_MODULE", "host"),
    ("LOCAL_CLANG", "clang"),
    ("LOCAL_FORCE_STATIC_EXECUTABLE", "static_executable"),
    ("LOCAL_NATIVE_COVERAGE", "native_coverage"),
    ("LOCAL_NO_CRT", "nocrt"),
    ("LOCAL_ALLOW_UNDEFINED_SYMBOLS", "allow_undefined_symbols"),
    ("LOCAL_RTTI_FLAG", "rtti"),
    ("LOCAL_NO_STANDARD_LIBRARIES", "no_standard_libs"),
    ("LOCAL_PACK_MODULE_RELOCATIONS", "pack_relocations"),
    ("LOCAL_TIDY", "tidy"),
    ("LOCAL_USE_CLANG_LLD", "use_clang_lld"),
    ("LOCAL_PROPRIETARY_MODULE", "proprietary"),
    ("LOCAL_VENDOR_MODULE", "vendor"),
    ("LOCAL_ODM_MODULE", "device_specific"),
    ("LOCAL_PRODUCT_MODULE", "product_specific"),
    ("LOCAL_PRODUCT_SERVICES_MODULE", "product_services_specific"),
    ("LOCAL_EXPORT_PACKAGE_RESOURCES", "export_package_resources"),
    ("LOCAL_PRIVILEGED_MODULE", "privileged"),
    ("LOCAL_AAPT_INCLUDE_ALL_RESOURCES", "aapt_include_all_resources"),
    ("LOCAL_USE_EMBEDDED_NATIVE_LIBS", "use_embedded_native_libs"),
    ("LOCAL_USE_EMBEDDED_DEX", "use_embedded_dex"),
    ("LOCAL_DEX_PREOPT", "dex_preopt.enabled"),
    ("LOCAL_DEX_PREOPT_APP_IMAGE", "dex_preopt.app_image"),
    ("LOCAL_DEX_PREOPT_GENERATE_PROFILE", "dex_preopt.profile_guided"),
    ("LOCAL_PRIVATE_PLATFORM_APIS", "platform_apis"),
    ("LOCAL_JETIFIER_ENABLED", "jetifier"),
];

const SKIPPED: &[&str] = &[
    "LOCAL_ADDITIONAL_DEPENDENCIES",
    "LOCAL_CPP_EXTENSION",
    "LOCAL_MODULE_SUFFIX",
    "LOCAL_PATH",
    "LOCAL_PRELINK_MODULE",
    "LOCAL_BUILT_MODULE_STEM",
    "LOCAL_USE_AAPT2",
    "LOCAL_JAR_EXCLUDE_FILES",
    "LOCAL_ANNOTATION_PROCESSOR_CLASSES",
    "LOCAL_CTS_TEST_PACKAGE",
    "LOCAL_JACK_ENABLED",
    "LOCAL_JACK_FLAGS",
];

const CUSTOM: &[(&str, Rewrite)] = &[
    ("LOCAL_32_BIT_ONLY", Rewrite::ThirtyTwoBitOnly),
    (
        "LOCAL_AIDL_INCLUDES",
        Rewrite::IncludeDirs {
            global: "aidl.include_dirs",
            local: "aidl.local_include_dirs",
        },
    ),
    ("LOCAL_ASSET_DIR", Rewrite::LocalizePathList("asset_dirs")),
    (
        "LOCAL_C_INCLUDES",
        Rewrite::IncludeDirs {
            global: "include_dirs",
            local: "local_include_dirs",
        },
    ),
    (
        "LOCAL_EXPORT_C_INCLUDE_DIRS",
        Rewrite::IncludeDirs {
            global: "export_include_dirs",
            local: "export_include_dirs",
        },
    ),
    ("LOCAL_JARJAR_RULES", Rewrite::LocalizePath("jarjar_rules")),
    ("LOCAL_LDFLAGS", Rewrite::Ldflags),
    ("LOCAL_MODULE_CLASS", Rewrite::PrebuiltClass),
    ("LOCAL_MODULE_STEM", Rewrite::Stem),
    ("LOCAL_MODULE_HOST_OS", Rewrite::HostOs),
    ("LOCAL_RESOURCE_DIR", Rewrite::LocalizePathList("resource_dirs")),
    ("LOCAL_SANITIZE", Rewrite::Sanitize("")),
    ("LOCAL_SANITIZE_DIAG", Rewrite::Sanitize("diag.")),
    ("LOCAL_STRIP_MODULE", Rewrite::Strip),
    ("LOCAL_CFLAGS", Rewrite::Cflags),
    ("LOCAL_UNINSTALLABLE_MODULE", Rewrite::Invert("installable")),
    ("LOCAL_PROGUARD_ENABLED", Rewrite::ProguardEnabled),
    ("LOCAL_MODULE_PATH", Rewrite::ModulePath),
    ("LOCAL_MODULE_TAGS", Rewrite::Tags),
    ("LOCAL_SRC_FILES", Rewrite::SrcFiles),
    ("LOCAL_ARM_MODE", Rewrite::ArmMode),
];

const fn branches(
    when_true: Option<&'static str>,
    when_false: Option<&'static str>,
) -> ConditionalTranslation {
    ConditionalTranslation {
        when_true,
        when_false,
    }
}

const DARWIN: ConditionalTranslation = branches(Some("target.darwin"), Some("target.not_darwin"));
const WINDOWS: ConditionalTranslation =
    branches(Some("target.windows"), Some("target.not_windows"));
const LINUX: ConditionalTranslation =
    branches(Some("target.linux_glibc"), Some("target.not_linux_glibc"));
const UNBUNDLED: ConditionalTranslation =
    branches(None, Some("product_variables.unbundled_build"));
const PDK: ConditionalTranslation = branches(Some("product_variables.pdk"), None);

const CONDITIONALS: &[(&str, ConditionalTranslation)] = &[
    ("($(HOST_OS),darwin)", DARWIN),
    ("($(HOST_OS), darwin)", DARWIN),
    ("($(HOST_OS),windows)", WINDOWS),
    ("($(HOST_OS), windows)", WINDOWS),
    ("($(HOST_OS),linux)", LINUX),
    ("($(HOST_OS), linux)", LINUX),
    ("($(BUILD_OS),darwin)", DARWIN),
    ("($(BUILD_OS), darwin)", DARWIN),
    ("($(BUILD_OS),linux)", LINUX),
    ("($(BUILD_OS), linux)", LINUX),
    ("(,$(TARGET_BUILD_APPS))", UNBUNDLED),
    ("($(TARGET_BUILD_APPS),)", UNBUNDLED),
    ("($(TARGET_BUILD_PDK),true)", PDK),
    ("($(TARGET_BUILD_PDK), true)", PDK),
];

impl Rules {
    pub fn new() -> Self {
        let standard = [
            (STRING_PROPERTIES, Type::String),
            (LIST_PROPERTIES, Type::List),
            (BOOL_PROPERTIES, Type::Bool),
        ]
        .into_iter()
        .flat_map(|(table, ty)| {
            table
                .iter()
                .map(move |&(mk, bp)| (mk, Rewrite::Standard(bp, ty)))
        });
        let skipped = SKIPPED.iter().map(|&mk| (mk, Rewrite::Skip));
        let rewrites = standard
            .chain(skipped)
            .chain(CUSTOM.iter().copied())
            .collect();

        let module_types = MODULE_TYPES
            .iter()
            .chain(PREBUILT_TYPES)
            .chain(INCLUDE_PATHS)
            .copied()
            .collect();

        let conditionals = CONDITIONALS.iter().copied().collect();

        Self {
            rewrites,
            module_types,
            conditionals,
        }
    }

    pub fn rewrite(&self, name: &str) -> Option<Rewrite> {
        self.rewrites.get(name).copied()
    }

    /// Module type for a resolved include path.
    pub fn module_type(&self, path: &str) -> Option<&'static str> {
        self.module_types.get(path).copied()
    }

    pub fn is_prebuilt_class(&self, class: &str) -> bool {
        PREBUILT_TYPES.iter().any(|(name, _)| *name == class)
    }

    pub fn conditional(&self, cond: &str) -> Option<ConditionalTranslation> {
        self.conditionals.get(cond).copied()
    }

    /// Make variables naming a module type, e.g. `BUILD_SHARED_LIBRARY`.
    pub fn module_type_variables(&self) -> impl Iterator<Item = &'static str> {
        MODULE_TYPES.iter().map(|(name, _)| *name)
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `LOCAL_SRC_FILES_arm` into `LOCAL_SRC_FILES` and `arch.arm`.
pub fn strip_property_suffix(name: &str) -> Option<(&str, &'static str)> {
    PROPERTY_PREFIXES.iter().find_map(|(suffix, prefix)| {
        let base = name.strip_suffix(suffix)?.strip_suffix('_')?;
        Some((base, *prefix))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_do_not_overlap() {
        let total = STRING_PROPERTIES.len()
            + LIST_PROPERTIES.len()
            + BOOL_PROPERTIES.len()
            + SKIPPED.len()
            + CUSTOM.len();
        assert_eq!(Rules::new().rewrites.len(), total);
    }

    #[test]
    fn test_lookups() {
        let rules = Rules::new();
        assert_eq!(
            rules.rewrite("LOCAL_MODULE"),
            Some(Rewrite::Standard("name", Type::String))
        );
        assert_eq!(rules.rewrite("LOCAL_PATH"), Some(Rewrite::Skip));
        assert_eq!(rules.rewrite("LOCAL_NOPE"), None);
        assert_eq!(rules.module_type("BUILD_PACKAGE"), Some("android_app"));
        assert_eq!(rules.module_type("ETC"), Some("prebuilt_etc"));
        assert!(rules.is_prebuilt_class("EXECUTABLES"));
        assert_eq!(
            rules.conditional("(,$(TARGET_BUILD_APPS))").and_then(|c| c.prefix(true)),
            None
        );
    }

    #[test]
    fn test_strip_property_suffix() {
        assert_eq!(
            strip_property_suffix("LOCAL_SRC_FILES_arm"),
            Some(("LOCAL_SRC_FILES", "arch.arm"))
        );
        assert_eq!(
            strip_property_suffix("LOCAL_CFLAGS_x86_64"),
            Some(("LOCAL_CFLAGS", "arch.x86_64"))
        );
        assert_eq!(
            strip_property_suffix("LOCAL_CFLAGS_64"),
            Some(("LOCAL_CFLAGS", "multilib.lib64"))
        );
        assert_eq!(
            strip_property_suffix("LOCAL_LDLIBS_linux"),
            Some(("LOCAL_LDLIBS", "target.linux_glibc"))
        );
        assert_eq!(strip_property_suffix("LOCAL_SRC_FILES"), None);
    }
}
