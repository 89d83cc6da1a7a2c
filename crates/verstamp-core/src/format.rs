//! Rendering version templates against a [`VersionSource`].
//!
//! Each placeholder has its own method, and [`VersionFormatter::evaluate`]
//! is the dispatch table the template renderer calls into. A placeholder
//! the template does not mention is never evaluated, so a `{tag}`-only
//! template works on a machine without any CI variables.

use std::path::Path;

use tracing::{debug, info};
use verstamp_schema::{Placeholder, ResolvedVersion, TagDescription, VersionSpec, VersionTemplate};

use crate::error::Result;
use crate::rewrite;
use crate::source::VersionSource;

/// Renders templates by querying a [`VersionSource`] on demand.
#[derive(Debug)]
pub struct VersionFormatter<'a, S: VersionSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: VersionSource + ?Sized> VersionFormatter<'a, S> {
    /// Create a formatter over `source`.
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Value of `{jenkins}`: the CI build number.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::StampError::MissingEnvironment`].
    pub fn jenkins(&self) -> Result<String> {
        self.source.build_number_from_environment()
    }

    /// Value of `{tag}`: `major.minor[dev]` from the tag description.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::StampError::VcsUnavailable`].
    pub fn tag(&self) -> Result<String> {
        let description = self.source.latest_tag_description()?;
        Ok(TagDescription::parse(&description).render())
    }

    /// Value of `{commits}`: scoped commit count, `dev`-suffixed when dirty.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::StampError::VcsUnavailable`].
    pub fn commits(&self) -> Result<String> {
        let count = self.source.commit_count_for_path()?;
        let dirty = self.source.is_working_tree_dirty()?;
        Ok(TagDescription::new(None, count.to_string(), dirty).render())
    }

    /// Revision stamped into `__revision__` slots.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::StampError::VcsUnavailable`].
    pub fn revision(&self) -> Result<String> {
        self.source.short_revision_of_path()
    }

    /// Evaluate a single placeholder.
    ///
    /// # Errors
    ///
    /// Whatever the placeholder's own method returns.
    pub fn evaluate(&self, placeholder: Placeholder) -> Result<String> {
        debug!(%placeholder, "Evaluating placeholder");
        match placeholder {
            Placeholder::Jenkins => self.jenkins(),
            Placeholder::Tag => self.tag(),
            Placeholder::Commits => self.commits(),
        }
    }

    /// Render a parsed template.
    ///
    /// # Errors
    ///
    /// The first error raised by a referenced placeholder.
    pub fn format(&self, template: &VersionTemplate) -> Result<ResolvedVersion> {
        let rendered = template.render(|p| self.evaluate(p))?;
        Ok(ResolvedVersion::new(rendered))
    }

    /// Parse and render a template string.
    ///
    /// # Errors
    ///
    /// [`crate::StampError::Template`] for a malformed template, otherwise
    /// as [`Self::format`].
    pub fn format_str(&self, template: &str) -> Result<ResolvedVersion> {
        let parsed = VersionTemplate::parse(template)?;
        self.format(&parsed)
    }

    /// Resolve the version declared by `spec`.
    ///
    /// For the file form, the template is the `__version__` value of the
    /// source declaration file, resolved against `project_root`.
    ///
    /// # Errors
    ///
    /// [`crate::StampError::NoDeclarationFound`] when the source file has no
    /// `__version__`, otherwise as [`Self::format_str`].
    pub fn resolve(&self, spec: &VersionSpec, project_root: &Path) -> Result<ResolvedVersion> {
        let template = match spec {
            VersionSpec::Template(t) => t.clone(),
            VersionSpec::File { source, .. } => {
                rewrite::read_declared_version(&project_root.join(source))?
            }
        };
        let version = self.format_str(&template)?;
        info!(%template, %version, "Resolved version");
        Ok(version)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::StampError;
    use std::cell::RefCell;

    /// In-memory source that records which queries ran.
    #[derive(Debug, Default)]
    pub(crate) struct FakeSource {
        pub(crate) description: String,
        pub(crate) revision: String,
        pub(crate) count: u64,
        pub(crate) dirty: bool,
        pub(crate) build_number: Option<String>,
        pub(crate) calls: RefCell<Vec<&'static str>>,
    }

    impl FakeSource {
        pub(crate) fn tagged(description: &str) -> Self {
            Self {
                description: description.to_string(),
                revision: "abc1234".to_string(),
                ..Self::default()
            }
        }
    }

    impl VersionSource for FakeSource {
        fn latest_tag_description(&self) -> Result<String> {
            self.calls.borrow_mut().push("describe");
            Ok(self.description.clone())
        }
        fn short_revision_of_path(&self) -> Result<String> {
            self.calls.borrow_mut().push("revision");
            Ok(self.revision.clone())
        }
        fn commit_count_for_path(&self) -> Result<u64> {
            self.calls.borrow_mut().push("count");
            Ok(self.count)
        }
        fn is_working_tree_dirty(&self) -> Result<bool> {
            self.calls.borrow_mut().push("dirty");
            Ok(self.dirty)
        }
        fn build_number_from_environment(&self) -> Result<String> {
            self.calls.borrow_mut().push("env");
            self.build_number
                .clone()
                .ok_or_else(|| StampError::MissingEnvironment {
                    variable: "BUILD_NUMBER".to_string(),
                    placeholder: "jenkins",
                })
        }
    }

    #[test]
    fn test_tag_clean_and_dirty() {
        let clean = FakeSource::tagged("v1-12-gabc123");
        assert_eq!(VersionFormatter::new(&clean).format_str("{tag}").unwrap().as_str(), "1.12");

        let dirty = FakeSource::tagged("v1-12-gabc123-dirty");
        assert_eq!(
            VersionFormatter::new(&dirty).format_str("{tag}").unwrap().as_str(),
            "1.12dev"
        );
    }

    #[test]
    fn test_tag_without_ci_variable() {
        let source = FakeSource::tagged("v2-0-gdef456");
        let version = VersionFormatter::new(&source).format_str("{tag}").unwrap();
        assert_eq!(version.as_str(), "2.0");
        assert!(!source.calls.borrow().contains(&"env"));
    }

    #[test]
    fn test_jenkins_without_ci_variable_fails() {
        let source = FakeSource::tagged("v1-0-gabc");
        let err = VersionFormatter::new(&source)
            .format_str("1.{jenkins}")
            .unwrap_err();
        assert!(matches!(err, StampError::MissingEnvironment { .. }));
    }

    #[test]
    fn test_jenkins_with_ci_variable() {
        let source = FakeSource {
            build_number: Some("311".to_string()),
            ..FakeSource::default()
        };
        let version = VersionFormatter::new(&source).format_str("3.{jenkins}").unwrap();
        assert_eq!(version.as_str(), "3.311");
        assert_eq!(*source.calls.borrow(), vec!["env"]);
    }

    #[test]
    fn test_commits_omits_major() {
        let source = FakeSource {
            count: 57,
            dirty: true,
            ..FakeSource::default()
        };
        let version = VersionFormatter::new(&source).format_str("1.{commits}").unwrap();
        assert_eq!(version.as_str(), "1.57dev");
        assert!(!source.calls.borrow().contains(&"describe"));
    }

    #[test]
    fn test_literal_template_queries_nothing() {
        let source = FakeSource::default();
        let version = VersionFormatter::new(&source).format_str("4.2.0").unwrap();
        assert_eq!(version.as_str(), "4.2.0");
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn test_unknown_placeholder_is_template_error() {
        let source = FakeSource::default();
        let err = VersionFormatter::new(&source)
            .format_str("{branch}")
            .unwrap_err();
        assert!(matches!(err, StampError::Template(_)));
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn test_resolve_reads_declaration_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/demo")).unwrap();
        std::fs::write(
            dir.path().join("src/demo/_version.py"),
            "__version__ = \"{tag}\"\n__revision__ = \"\"\n",
        )
        .unwrap();

        let spec = VersionSpec::File {
            source: "src/demo/_version.py".into(),
            build: "demo/_version.py".into(),
        };
        let source = FakeSource::tagged("v5-3-gabc");
        let version = VersionFormatter::new(&source)
            .resolve(&spec, dir.path())
            .unwrap();
        assert_eq!(version.as_str(), "5.3");
    }

    #[test]
    fn test_resolve_missing_declaration() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("v.py"), "# nothing here\n").unwrap();
        let spec = VersionSpec::File {
            source: "v.py".into(),
            build: "v.py".into(),
        };
        let source = FakeSource::default();
        let err = VersionFormatter::new(&source)
            .resolve(&spec, dir.path())
            .unwrap_err();
        assert!(matches!(err, StampError::NoDeclarationFound { .. }));
    }
}
