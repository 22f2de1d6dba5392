#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bp;
pub mod codegen;
pub mod fixer;
pub mod parser;
pub mod path;
pub mod scope;
pub mod steps;
pub mod translator;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use log::debug;

use crate::fixer::{FixError, FixRequest, Fixer};
use crate::parser::ParseError;
use crate::translator::Rules;

/// Result of converting one makefile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// The blueprint text. Untranslatable constructs are kept as comments.
    pub output: String,
    /// Fix-up failures. The output then holds the unfixed translation.
    pub warnings: Vec<FixError>,
}

/// The makefile could not be scanned. Nothing was translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertError {
    pub filename: String,
    pub errors: Vec<ParseError>,
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}:{err}", self.filename)?;
        }
        Ok(())
    }
}

impl core::error::Error for ConvertError {}

pub struct Androidmk {
    rules: Rules,
    fix: bool,
    request: FixRequest,
}

impl Default for Androidmk {
    fn default() -> Self {
        Self::new()
    }
}

impl Androidmk {
    pub fn new() -> Self {
        Self {
            rules: Rules::new(),
            fix: true,
            request: FixRequest::new().add_all(),
        }
    }

    /// Whether to run the fix-up pass over the translation.
    pub fn fix(&mut self, fix: bool) -> &mut Self {
        self.fix = fix;
        self
    }

    /// Replaces the fix-up steps to run.
    pub fn fix_request(&mut self, request: FixRequest) -> &mut Self {
        self.request = request;
        self
    }

    pub fn convert(&self, filename: &str, input: &str) -> Result<Conversion, ConvertError> {
        let nodes = parser::parse(input).map_err(|errors| ConvertError {
            filename: filename.into(),
            errors,
        })?;
        debug!("{filename}: {} nodes", nodes.len());

        let file = translator::translate(&self.rules, &nodes);
        let mut warnings = Vec::new();
        let file = if self.fix && !self.request.is_empty() {
            match Fixer::new(file.clone()).fix(&self.request) {
                Ok(fixed) => fixed,
                Err(err) => {
                    debug!("{filename}: keeping unfixed output: {err}");
                    warnings.push(err);
                    file
                }
            }
        } else {
            file
        };

        Ok(Conversion {
            output: bp::print(&file),
            warnings,
        })
    }
}

/// Converts with the default rules and every fix-up step.
pub fn convert_file(filename: &str, input: &str) -> Result<Conversion, ConvertError> {
    Androidmk::new().convert(filename, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_convert_with_fixes() {
        let input = indoc! {"
            include $(CLEAR_VARS)
            LOCAL_MODULE := foo
            LOCAL_MODULE_CLASS := JAVA_LIBRARIES
            LOCAL_SRC_FILES := foo.jar
            LOCAL_MODULE_TAGS := optional
            include $(BUILD_PREBUILT)
        "};
        let conversion = convert_file("Android.mk", input).unwrap();
        assert_eq!(
            conversion.output,
            indoc! {r#"
                java_import {
                    name: "foo",
                    jars: ["foo.jar"],
                }
            "#}
        );
        assert!(conversion.warnings.is_empty());
    }

    #[test]
    fn test_convert_without_fixes() {
        let input = indoc! {"
            include $(CLEAR_VARS)
            LOCAL_MODULE := foo
            LOCAL_MODULE_CLASS := JAVA_LIBRARIES
            LOCAL_SRC_FILES := foo.jar
            include $(BUILD_PREBUILT)
        "};
        let conversion = Androidmk::new().fix(false).convert("Android.mk", input).unwrap();
        assert_eq!(
            conversion.output,
            indoc! {r#"
                java_import {
                    name: "foo",
                    srcs: ["foo.jar"],
                }
            "#}
        );
    }

    #[test]
    fn test_fix_failure_keeps_translation() {
        let input = indoc! {"
            include $(CLEAR_VARS)
            LOCAL_MODULE := foo
            LOCAL_MODULE_CLASS := ETC
            LOCAL_MODULE_PATH := $(TARGET_OUT_VENDOR)/bin
            include $(BUILD_PREBUILT)
        "};
        let mut androidmk = Androidmk::new();
        androidmk.fix_request(FixRequest::new().add_matching(&["rewritePrebuiltEtc"]));
        let conversion = androidmk.convert("Android.mk", input).unwrap();
        assert_eq!(conversion.warnings.len(), 1);
        assert_eq!(
            conversion.warnings[0].to_string(),
            "LOCAL_MODULE_PATH value under $(TARGET_OUT_VENDOR) should start with /etc, /firmware"
        );
        assert!(conversion.output.contains("local_module_path: {"));
    }

    #[test]
    fn test_scan_errors_are_fatal() {
        let err = convert_file("Android.mk", "FOO := $(BAR\n").unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.to_string().starts_with("Android.mk:1:"));
    }
}
