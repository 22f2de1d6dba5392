//! Flag-library code generation contract.
//!
//! A declarations module publishes a [`DeclarationsInfo`]. A flag library
//! picks the one declarations dependency it was given, asks the build for
//! one generator action and publishes a [`CodegenInfo`] that downstream
//! modules aggregate with [`CodegenInfo::merge`].

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use anyhow::{anyhow, bail};
use hashbrown::HashMap;
use log::debug;

use crate::path::Path;
use crate::steps::{CodegenAction, CodegenSteps};

/// Data a module publishes to the modules depending on it.
pub trait Provider: fmt::Debug + as_any::AsAny {}

impl dyn Provider {
    pub fn downcast_ref<T: Provider>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Published by a declarations module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationsInfo {
    pub package: String,
    pub container: String,
    pub exportable: bool,
    pub intermediate_cache_path: Path,
    pub intermediate_dump_path: Path,
}

impl Provider for DeclarationsInfo {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyTag {
    /// The declarations a flag library generates code for.
    Declarations,
    Other,
}

#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub tag: DependencyTag,
    pub providers: Vec<Rc<dyn Provider>>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, tag: DependencyTag) -> Self {
        Self {
            name: name.into(),
            tag,
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl Provider) -> Self {
        self.providers.push(Rc::new(provider));
        self
    }

    /// The first provider of type `T`.
    pub fn provider<T: Provider>(&self) -> Option<&T> {
        self.providers
            .iter()
            .find_map(|provider| provider.downcast_ref::<T>())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Java,
    Cc,
    Rust,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Production,
    Test,
    Exported,
    ForceReadOnly,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Production => "production",
            Mode::Test => "test",
            Mode::Exported => "exported",
            Mode::ForceReadOnly => "force-read-only",
        }
    }

    /// Whether code in this mode may be read from another container.
    pub fn crosses_containers(&self) -> bool {
        matches!(self, Mode::Exported | Mode::ForceReadOnly)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Mode::Production),
            "test" => Ok(Mode::Test),
            "exported" => Ok(Mode::Exported),
            "force-read-only" => Ok(Mode::ForceReadOnly),
            _ => bail!("mode: {s:?} is not a supported mode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeInfo {
    pub container: String,
    pub mode: Mode,
}

/// Published by a flag library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodegenInfo {
    /// Names of the declarations modules the code was generated from.
    pub declarations: Vec<String>,
    pub intermediate_cache_paths: Vec<Path>,
    /// Archives generated for java libraries.
    pub srcjars: Vec<Path>,
    /// Mode of each library, by library name.
    pub mode_infos: HashMap<String, ModeInfo>,
}

impl Provider for CodegenInfo {}

impl CodegenInfo {
    pub fn merge(&mut self, other: &CodegenInfo) {
        self.declarations.extend(other.declarations.iter().cloned());
        self.intermediate_cache_paths
            .extend(other.intermediate_cache_paths.iter().cloned());
        self.srcjars.extend(other.srcjars.iter().cloned());
        self.mode_infos.extend(
            other
                .mode_infos
                .iter()
                .map(|(name, info)| (name.clone(), info.clone())),
        );
    }

    /// Libraries that `module` in `container` may not read, one message each.
    pub fn cross_container_errors(&self, module: &str, container: &str) -> Vec<String> {
        let mut errors: Vec<String> = self
            .mode_infos
            .iter()
            .filter(|(_, info)| info.container != container && !info.mode.crosses_containers())
            .map(|(name, info)| {
                format!(
                    "{module}/{container} depends on {name}/{}/{} across containers",
                    info.container, info.mode
                )
            })
            .collect();
        errors.sort();
        errors
    }
}

/// Flag text dumps of the declarations an app lists in `flags_packages`,
/// in dependency order.
pub fn flag_text_files(deps: &[Dependency]) -> anyhow::Result<Vec<Path>> {
    deps.iter()
        .filter(|dep| dep.tag == DependencyTag::Declarations)
        .map(|dep| match dep.provider::<DeclarationsInfo>() {
            Some(info) => Ok(info.intermediate_dump_path.clone()),
            None => Err(anyhow!(
                "Only aconfig_declarations module type is allowed for flags_packages property, but {} is not aconfig_declarations module type",
                dep.name
            )),
        })
        .collect()
}

/// A library generated from one set of flag declarations.
#[derive(Debug, Clone)]
pub struct FlagLibrary {
    pub name: String,
    pub backend: Backend,
    /// `production` when unset.
    pub mode: Option<String>,
}

impl FlagLibrary {
    pub fn new(name: impl Into<String>, backend: Backend) -> Self {
        Self {
            name: name.into(),
            backend,
            mode: None,
        }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn generate(
        &self,
        deps: &[Dependency],
        gen_dir: &Path,
        steps: &dyn CodegenSteps,
    ) -> anyhow::Result<CodegenInfo> {
        let declarations: Vec<&Dependency> = deps
            .iter()
            .filter(|dep| dep.tag == DependencyTag::Declarations)
            .collect();
        let [dep] = declarations.as_slice() else {
            bail!("Exactly one aconfig_declarations property required");
        };
        let info = dep.provider::<DeclarationsInfo>().ok_or_else(|| {
            anyhow!("{}: module does not provide flag declarations", dep.name)
        })?;

        let mode = match &self.mode {
            Some(mode) => mode.parse()?,
            None => Mode::default(),
        };
        if mode == Mode::Exported && !info.exportable {
            bail!("exported mode requires its aconfig_declaration has exportable prop true");
        }

        let out = match self.backend {
            Backend::Java => gen_dir.join(format!("{}.srcjar", self.name)),
            Backend::Cc => gen_dir.join(&self.name),
            Backend::Rust => gen_dir.join("src/lib.rs"),
        };
        let action = CodegenAction {
            library: self.name.clone(),
            backend: self.backend,
            mode,
            package: info.package.clone(),
            cache: info.intermediate_cache_path.clone(),
            out: out.clone(),
        };
        debug!("{}: {:?} codegen for {} into {out}", self.name, self.backend, info.package);
        steps.codegen(&action);

        let srcjars = match self.backend {
            Backend::Java => vec![out],
            Backend::Cc | Backend::Rust => Vec::new(),
        };
        let mode_info = ModeInfo {
            container: info.container.clone(),
            mode,
        };
        Ok(CodegenInfo {
            declarations: vec![dep.name.clone()],
            intermediate_cache_paths: vec![info.intermediate_cache_path.clone()],
            srcjars,
            mode_infos: HashMap::from_iter([(self.name.clone(), mode_info)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        actions: RefCell<Vec<CodegenAction>>,
    }

    impl CodegenSteps for Recorder {
        fn codegen(&self, action: &CodegenAction) {
            self.actions.borrow_mut().push(action.clone());
        }
    }

    #[derive(Debug)]
    struct Unrelated;

    impl Provider for Unrelated {}

    fn declarations(name: &str, container: &str) -> Dependency {
        Dependency::new(name, DependencyTag::Declarations).with_provider(DeclarationsInfo {
            package: "com.example.flags".into(),
            container: container.into(),
            exportable: false,
            intermediate_cache_path: Path::from("out/flags/cache.pb"),
            intermediate_dump_path: Path::from("out/flags/dump.pb"),
        })
    }

    #[test]
    fn test_java_library() {
        let steps = Recorder::default();
        let deps = [
            Dependency::new("other", DependencyTag::Other).with_provider(Unrelated),
            declarations("my_flags", "system"),
        ];
        let info = FlagLibrary::new("my_java_flags", Backend::Java)
            .mode("test")
            .generate(&deps, &Path::from("out/gen"), &steps)
            .unwrap();

        assert_eq!(info.declarations, vec![String::from("my_flags")]);
        assert_eq!(info.intermediate_cache_paths, vec![Path::from("out/flags/cache.pb")]);
        assert_eq!(info.srcjars, vec![Path::from("out/gen/my_java_flags.srcjar")]);
        assert_eq!(info.mode_infos["my_java_flags"].mode, Mode::Test);

        let actions = steps.actions.borrow();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].mode, Mode::Test);
        assert_eq!(actions[0].package, "com.example.flags");
        assert_eq!(actions[0].cache, Path::from("out/flags/cache.pb"));
    }

    #[test]
    fn test_outputs_by_backend() {
        let deps = [declarations("flags", "system")];
        let gen_dir = Path::from("gen");
        let steps = Recorder::default();
        let cc = FlagLibrary::new("cc_flags", Backend::Cc)
            .generate(&deps, &gen_dir, &steps)
            .unwrap();
        let rust = FlagLibrary::new("rust_flags", Backend::Rust)
            .generate(&deps, &gen_dir, &steps)
            .unwrap();
        assert!(cc.srcjars.is_empty() && rust.srcjars.is_empty());

        let outs: Vec<_> = steps.actions.borrow().iter().map(|a| a.out.clone()).collect();
        assert_eq!(outs, vec![Path::from("gen/cc_flags"), Path::from("gen/src/lib.rs")]);
        assert_eq!(rust.mode_infos["rust_flags"].mode, Mode::Production);
    }

    #[test]
    fn test_declarations_cardinality() {
        let steps = Recorder::default();
        let lib = FlagLibrary::new("lib", Backend::Java);
        let gen_dir = Path::from("gen");
        for deps in [vec![], vec![declarations("a", "system"), declarations("b", "system")]] {
            let err = lib.generate(&deps, &gen_dir, &steps).unwrap_err();
            assert_eq!(err.to_string(), "Exactly one aconfig_declarations property required");
        }
        let deps = [Dependency::new("bare", DependencyTag::Declarations)];
        assert!(lib.generate(&deps, &gen_dir, &steps).is_err());
        assert!(steps.actions.borrow().is_empty());
    }

    #[test]
    fn test_unsupported_mode() {
        let deps = [declarations("flags", "system")];
        let err = FlagLibrary::new("lib", Backend::Java)
            .mode("unsupported")
            .generate(&deps, &Path::from("gen"), &Recorder::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "mode: \"unsupported\" is not a supported mode");

        let err = FlagLibrary::new("lib", Backend::Java)
            .mode("exported")
            .generate(&deps, &Path::from("gen"), &Recorder::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("exported mode requires"));
    }

    #[test]
    fn test_flag_text_files() {
        let deps = [
            declarations("a", "system"),
            Dependency::new("other", DependencyTag::Other),
            Dependency::new("b", DependencyTag::Declarations).with_provider(DeclarationsInfo {
                package: "com.example.b".into(),
                container: "system".into(),
                exportable: false,
                intermediate_cache_path: Path::from("out/b/cache.pb"),
                intermediate_dump_path: Path::from("out/b/dump.pb"),
            }),
        ];
        assert_eq!(
            flag_text_files(&deps).unwrap(),
            vec![Path::from("out/flags/dump.pb"), Path::from("out/b/dump.pb")]
        );

        let deps = [Dependency::new("bare", DependencyTag::Declarations).with_provider(Unrelated)];
        let err = flag_text_files(&deps).unwrap_err();
        assert!(err.to_string().ends_with("but bare is not aconfig_declarations module type"));
    }

    #[test]
    fn test_merge_and_containers() {
        let steps = Recorder::default();
        let gen_dir = Path::from("gen");
        let mut merged = CodegenInfo::default();
        for (name, container, mode) in [("a", "system", "production"), ("b", "vendor", "force-read-only"), ("c", "vendor", "test")] {
            let deps = [declarations(name, container)];
            let info = FlagLibrary::new(name, Backend::Java)
                .mode(mode)
                .generate(&deps, &gen_dir, &steps)
                .unwrap();
            merged.merge(&info);
        }
        assert_eq!(merged.declarations.len(), 3);
        assert_eq!(merged.srcjars.len(), 3);
        assert_eq!(
            merged.cross_container_errors("app", "system"),
            vec![String::from("app/system depends on c/vendor/test across containers")]
        );
    }
}
