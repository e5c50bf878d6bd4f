//! Semantic version resolution.

use reglet_core::{Error, Result};
use semver::{Version, VersionReq};

use crate::ports::VersionResolver;

/// [`VersionResolver`] backed by the `semver` crate.
///
/// `latest` means the highest parseable version. Invalid entries in the
/// availability list are skipped rather than failing the whole resolution.
#[derive(Default)]
pub struct SemverResolver;

impl SemverResolver {
    pub fn new() -> Self {
        Self
    }
}

impl VersionResolver for SemverResolver {
    fn resolve(&self, constraint: &str, available: &[String]) -> Result<String> {
        let requirement = if constraint == "latest" {
            VersionReq::parse(">=0.0.0")
        } else {
            VersionReq::parse(constraint)
        }
        .map_err(|e| Error::InvalidInput(format!("invalid version constraint {constraint:?}: {e}")))?;

        let highest = available
            .iter()
            .filter_map(|raw| Version::parse(raw).ok().map(|v| (v, raw)))
            .filter(|(v, _)| requirement.matches(v))
            .max_by(|(a, _), (b, _)| a.cmp(b));

        match highest {
            Some((_, raw)) => Ok(raw.clone()),
            None => Err(Error::PluginNotFound(format!(
                "no version satisfies constraint {constraint:?} from available options"
            ))),
        }
    }
}
