//! Freshness comparison of a server update declaration against the
//! currently installed bundle.

use serde::Deserialize;

use crate::config::CcsConfig;
use crate::core::{CodeSwapError, Result};
use crate::update::UpdateInfo;
use crate::utils::url_join;

/// The update declaration document as served at `<base_url>/chcp.json`.
///
/// Fields are optional so an incomplete document still parses and is
/// rejected with a precise [`MalformedDeclaration`] instead of a JSON
/// error.
///
/// [`MalformedDeclaration`]: CodeSwapError::MalformedDeclaration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDeclaration {
    /// Advertised version identifier.
    pub version: Option<String>,
    /// Advertised release identifier; names the release folder on both the
    /// content server and local storage.
    pub release: Option<String>,
    /// Base URL the release's content (manifest and files) is served under.
    pub content_url: Option<String>,
}

fn malformed(reason: &str) -> CodeSwapError {
    CodeSwapError::MalformedDeclaration {
        reason: reason.to_string(),
    }
}

/// Decide whether `declaration` advertises an applicable update.
///
/// Fails with `MalformedDeclaration` when a required field is absent and
/// with `NoUpdateAvailable` when version and release both match the
/// installed bundle. Side-effect free; the returned [`UpdateInfo`] carries
/// the declaration's raw content base, which the caller resolves with
/// [`resolve_content_url`].
pub(crate) fn compare_with_current(
    config: &CcsConfig,
    declaration: &UpdateDeclaration,
) -> Result<UpdateInfo> {
    let version = declaration
        .version
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| malformed("declaration is missing a version identifier"))?;
    let release = declaration
        .release
        .as_deref()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| malformed("declaration is missing a release identifier"))?;
    let content_url = declaration
        .content_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| malformed("declaration is missing a content URL"))?;

    if config.version.as_deref() == Some(version) && config.release.as_deref() == Some(release) {
        return Err(CodeSwapError::NoUpdateAvailable);
    }

    Ok(UpdateInfo {
        version: version.to_string(),
        release: release.to_string(),
        content_url: content_url.to_string(),
        manifest: None,
    })
}

/// Resolve the final content URL for one release: the declared content base
/// joined with the release identifier. `chcp.manifest` and every bundle
/// file are fetched beneath it.
pub(crate) fn resolve_content_url(declared_base: &str, release: &str) -> String {
    url_join(declared_base, release)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(version: &str, release: &str, content_url: &str) -> UpdateDeclaration {
        UpdateDeclaration {
            version: Some(version.to_string()),
            release: Some(release.to_string()),
            content_url: Some(content_url.to_string()),
        }
    }

    fn installed(version: &str, release: &str) -> CcsConfig {
        CcsConfig {
            version: Some(version.to_string()),
            release: Some(release.to_string()),
            ..CcsConfig::default()
        }
    }

    #[test]
    fn missing_fields_are_malformed() {
        let config = CcsConfig::default();
        for decl in [
            UpdateDeclaration { version: None, ..declaration("1", "r1", "https://cdn") },
            UpdateDeclaration { release: None, ..declaration("1", "r1", "https://cdn") },
            UpdateDeclaration { content_url: None, ..declaration("1", "r1", "https://cdn") },
            UpdateDeclaration { version: Some(String::new()), ..declaration("1", "r1", "https://cdn") },
        ] {
            let err = compare_with_current(&config, &decl).unwrap_err();
            assert!(matches!(err, CodeSwapError::MalformedDeclaration { .. }), "{decl:?}");
        }
    }

    #[test]
    fn identical_version_and_release_is_no_update() {
        let config = installed("1.0", "2024.1");
        let err = compare_with_current(&config, &declaration("1.0", "2024.1", "https://cdn"))
            .unwrap_err();
        assert!(matches!(err, CodeSwapError::NoUpdateAvailable));
    }

    #[test]
    fn differing_release_is_an_update() {
        let config = installed("1.0", "2024.1");
        let info = compare_with_current(&config, &declaration("1.0", "2024.2", "https://cdn"))
            .unwrap();
        assert_eq!(info.release, "2024.2");
        assert_eq!(info.content_url, "https://cdn");
        assert!(info.manifest.is_none());
    }

    #[test]
    fn fresh_config_accepts_any_wellformed_declaration() {
        let info = compare_with_current(
            &CcsConfig::default(),
            &declaration("1.0", "2024.1", "https://cdn/app"),
        )
        .unwrap();
        assert_eq!(info.version, "1.0");
    }

    #[test]
    fn content_url_resolves_under_release_folder() {
        assert_eq!(
            resolve_content_url("https://cdn.example.com/app/", "2024.2"),
            "https://cdn.example.com/app/2024.2"
        );
    }
}
