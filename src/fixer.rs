//! Clean-up pass over a translated blueprint file.
//!
//! The translator maps each make variable on its own. Some results only make
//! sense once the whole module is known: a `java_import` whose sources are
//! `.jar` files, a library tagged as a test, properties that ended up defined
//! twice. The fixer applies its steps repeatedly until the file stops
//! changing.

use alloc::borrow::Cow;
use alloc::vec::Vec;
use core::fmt;

use log::{debug, trace, warn};

use crate::bp::File;

mod steps;

/// Upper bound on fix passes before the fixer gives up.
const MAX_ITERATIONS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixError {
    /// Two definitions of the same property could not be merged.
    Conflict(Cow<'static, str>),
    /// A property held a value of an unexpected type.
    Type(Cow<'static, str>),
    /// A property value has no blueprint equivalent.
    Invalid(Cow<'static, str>),
    /// The file still changed after this many passes.
    Unstable(usize),
}

impl fmt::Display for FixError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FixError::Conflict(msg) | FixError::Type(msg) | FixError::Invalid(msg) => {
                f.write_str(msg)
            }
            FixError::Unstable(n) => write!(
                f,
                "Applied fixes {n} times and yet the tree continued to change. Is there an infinite loop?"
            ),
        }
    }
}

impl core::error::Error for FixError {}

#[derive(Debug, Clone, Copy)]
pub struct FixStep {
    pub name: &'static str,
    pub fix: fn(&mut File) -> Result<(), FixError>,
}

const BASE_STEPS: &[FixStep] = &[
    FixStep {
        name: "simplifyKnownRedundantVariables",
        fix: steps::simplify_redundant_variables,
    },
    FixStep {
        name: "rewriteIncorrectAndroidmkPrebuilts",
        fix: steps::rewrite_incorrect_prebuilts,
    },
    FixStep {
        name: "rewriteCtsModuleTypes",
        fix: steps::rewrite_cts_module_types,
    },
    FixStep {
        name: "rewriteIncorrectAndroidmkAndroidLibraries",
        fix: steps::rewrite_android_libraries,
    },
    FixStep {
        name: "rewriteTestModuleTypes",
        fix: steps::rewrite_test_module_types,
    },
    FixStep {
        name: "rewriteAndroidmkJavaLibs",
        fix: steps::rewrite_installable_java_libs,
    },
    FixStep {
        name: "rewriteJavaStaticLibs",
        fix: steps::rewrite_java_static_libs,
    },
    FixStep {
        name: "rewritePrebuiltEtc",
        fix: steps::rewrite_prebuilt_etc,
    },
    FixStep {
        name: "mergeMatchingModuleProperties",
        fix: steps::merge_matching_properties,
    },
    FixStep {
        name: "reorderCommonProperties",
        fix: steps::reorder_common_properties,
    },
    FixStep {
        name: "removeTags",
        fix: steps::remove_tags,
    },
    FixStep {
        name: "rewriteAndroidTest",
        fix: steps::rewrite_android_test,
    },
    FixStep {
        name: "rewriteAndroidAppImport",
        fix: steps::rewrite_android_app_import,
    },
    FixStep {
        name: "removeEmptyLibDependencies",
        fix: steps::remove_empty_lib_dependencies,
    },
    FixStep {
        name: "removeHidlInterfaceTypes",
        fix: steps::remove_hidl_interface_types,
    },
    FixStep {
        name: "removePdkProperty",
        fix: steps::remove_pdk_property,
    },
    FixStep {
        name: "removeScudoProperty",
        fix: steps::remove_scudo_property,
    },
    FixStep {
        name: "removeResourcesAndAssetsIfDefault",
        fix: steps::remove_default_resource_dirs,
    },
];

/// Steps that only apply to files produced from makefiles.
const ANDROIDMK_STEPS: &[FixStep] = &[FixStep {
    name: "rewriteRuntimeResourceOverlay",
    fix: steps::rewrite_runtime_resource_overlay,
}];

/// The steps to run, in order.
#[derive(Debug, Clone, Default)]
pub struct FixRequest {
    steps: Vec<FixStep>,
}

impl FixRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known step.
    pub fn add_all(mut self) -> Self {
        self.steps.extend_from_slice(BASE_STEPS);
        self.steps.extend_from_slice(ANDROIDMK_STEPS);
        self
    }

    /// The steps that apply to any blueprint file.
    pub fn add_base(mut self) -> Self {
        self.steps.extend_from_slice(BASE_STEPS);
        self
    }

    /// The named steps, in registry order. Unknown names are ignored.
    pub fn add_matching(mut self, names: &[&str]) -> Self {
        let matching = BASE_STEPS
            .iter()
            .chain(ANDROIDMK_STEPS)
            .filter(|step| names.contains(&step.name));
        self.steps.extend(matching);
        self
    }

    pub fn step_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(|step| step.name)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub struct Fixer {
    file: File,
}

impl Fixer {
    pub fn new(file: File) -> Self {
        Self { file }
    }

    /// Runs the requested steps until the file settles.
    pub fn fix(mut self, request: &FixRequest) -> Result<File, FixError> {
        let mut iterations = 0;
        loop {
            let before = self.file.clone();
            self.run_once(request)?;
            if self.file == before {
                break;
            }
            iterations += 1;
            if iterations >= MAX_ITERATIONS {
                return Err(FixError::Unstable(iterations));
            }
        }
        debug!("fix-up settled after {} passes", iterations + 1);
        Ok(self.file)
    }

    fn run_once(&mut self, request: &FixRequest) -> Result<(), FixError> {
        for step in &request.steps {
            trace!("fix step {}", step.name);
            if let Err(err) = (step.fix)(&mut self.file) {
                warn!("fix step {} failed: {}", step.name, err);
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bp::{Definition, Expression, Module, Property};
    use alloc::vec;

    fn module(ty: &str, props: Vec<(&str, Expression)>) -> File {
        let mut module = Module::new(ty);
        for (name, value) in props {
            module.push_property(Property::new(name, value));
        }
        File {
            defs: vec![Definition::Module(module)],
        }
    }

    fn flip(file: &mut File) -> Result<(), FixError> {
        for def in &mut file.defs {
            if let Definition::Module(module) = def {
                module.ty = match module.ty.as_str() {
                    "a" => "b".into(),
                    _ => "a".into(),
                };
            }
        }
        Ok(())
    }

    #[test]
    fn test_request_selection() {
        assert!(FixRequest::new().is_empty());
        let all: Vec<_> = FixRequest::new().add_all().step_names().collect();
        assert_eq!(all.len(), BASE_STEPS.len() + ANDROIDMK_STEPS.len());
        assert_eq!(all.first(), Some(&"simplifyKnownRedundantVariables"));
        assert_eq!(all.last(), Some(&"rewriteRuntimeResourceOverlay"));

        let some: Vec<_> = FixRequest::new()
            .add_matching(&["removeTags", "rewriteRuntimeResourceOverlay", "nope"])
            .step_names()
            .collect();
        assert_eq!(some, vec!["removeTags", "rewriteRuntimeResourceOverlay"]);
        assert!(
            !FixRequest::new()
                .add_base()
                .step_names()
                .any(|name| name == "rewriteRuntimeResourceOverlay")
        );
    }

    #[test]
    fn test_fix_settles() {
        let file = module(
            "java_library_installable",
            vec![("name", Expression::string("lib"))],
        );
        let fixed = Fixer::new(file).fix(&FixRequest::new().add_all()).unwrap();
        let Definition::Module(module) = &fixed.defs[0] else {
            panic!("expected a module");
        };
        assert_eq!(module.ty, "java_library");
        assert_eq!(
            module.property("installable").map(|p| &p.value),
            Some(&Expression::Bool(true))
        );
    }

    #[test]
    fn test_unstable_fix_is_reported() {
        let mut request = FixRequest::new();
        request.steps.push(FixStep {
            name: "flip",
            fix: flip,
        });
        let err = Fixer::new(module("a", vec![])).fix(&request).unwrap_err();
        assert_eq!(err, FixError::Unstable(MAX_ITERATIONS));
        assert!(err.to_string().starts_with("Applied fixes 20 times"));
    }

    #[test]
    fn test_step_error_stops_the_pass() {
        let file = module(
            "cc_library_shared",
            vec![
                ("stl", Expression::string("a")),
                ("stl", Expression::string("b")),
            ],
        );
        let err = Fixer::new(file).fix(&FixRequest::new().add_all()).unwrap_err();
        assert_eq!(
            err,
            FixError::Conflict("conflicting definitions of string property \"stl\"".into())
        );
    }
}
