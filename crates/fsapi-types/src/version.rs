//! Version stamp codec.
//!
//! Internally a version is a `u64` counter. On the wire (and on disk) it is
//! the decimal string in `metadata.resourceVersion`, where the empty string
//! means "no version".

use crate::error::TypeError;
use crate::resource::Resource;

/// Parse a wire version. `""` parses to `0`.
pub fn parse_resource_version(value: &str) -> Result<u64, TypeError> {
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<u64>()
        .map_err(|e| TypeError::InvalidVersion {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Format a version as decimal without padding.
pub fn format_resource_version(version: u64) -> String {
    version.to_string()
}

/// Read the version stamp of an object.
pub fn get_resource_version<R: Resource>(obj: &R) -> Result<u64, TypeError> {
    parse_resource_version(&obj.metadata().resource_version)
}

/// Stamp an object with a version. Zero is rejected.
pub fn set_resource_version<R: Resource>(obj: &mut R, version: u64) -> Result<(), TypeError> {
    if version == 0 {
        return Err(TypeError::NonPositiveVersion(version));
    }
    obj.metadata_mut().resource_version = format_resource_version(version);
    Ok(())
}

/// Remove the version stamp, e.g. before comparing objects.
pub fn clear_resource_version<R: Resource>(obj: &mut R) {
    obj.metadata_mut().resource_version.clear();
}
