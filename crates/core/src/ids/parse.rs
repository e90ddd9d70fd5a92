#![forbid(unsafe_code)]

use super::{
    FCR_ACL, FCR_METADATA, FCR_TOMBSTONE, FCR_VERSIONS, ID_PREFIX, IdKind, ResourceId,
    ResourceIdError,
};
use crate::instant;

const FORBIDDEN_PARTS: [&str; 3] = ["fcr-root", ".fcrepo", "fcr-container.nt"];
const FORBIDDEN_SUFFIXES: [&str; 4] = ["~fcr-desc", "~fcr-acl", "~fcr-desc.nt", "~fcr-acl.nt"];

pub(super) fn parse(value: &str) -> Result<ResourceId, ResourceIdError> {
    let full_id = with_prefix(value.trim());
    let full_id = full_id.trim_end_matches('/').to_string();
    if full_id.len() <= ID_PREFIX.len() {
        return Ok(ResourceId::root());
    }

    check_extension_combinations(&full_id)?;
    if full_id.contains("//") {
        return Err(ResourceIdError::EmptySegment);
    }

    let mut kind = IdKind::default();
    let mut memento_instant = None;
    let mut rest = full_id.as_str();
    let mut hash_uri = None;

    if let Some((before, after)) = rest.split_once('#') {
        if after.contains('#') {
            return Err(ResourceIdError::MultipleHash);
        }
        hash_uri = Some(after.to_string());
        rest = before;
    }

    if rest.contains(FCR_TOMBSTONE) {
        rest = remove_trailing_part(rest, FCR_TOMBSTONE)?;
        kind.tombstone = true;
    }
    if rest.contains(FCR_ACL) {
        rest = remove_trailing_part(rest, FCR_ACL)?;
        kind.acl = true;
    }
    if rest.contains(FCR_VERSIONS) {
        let marker = format!("/{FCR_VERSIONS}");
        let parts: Vec<&str> = rest.split(marker.as_str()).collect();
        if parts.len() > 2 {
            return Err(ResourceIdError::MultipleVersions);
        }
        let after = parts.get(1).copied().unwrap_or_default();
        if after.is_empty() || after == "/" {
            kind.timemap = true;
        } else {
            let label = after
                .strip_prefix('/')
                .filter(|label| label.len() == 14 && label.bytes().all(|b| b.is_ascii_digit()))
                .ok_or(ResourceIdError::InvalidMemento)?;
            memento_instant =
                Some(instant::parse_memento_label(label).ok_or(ResourceIdError::InvalidMemento)?);
            kind.memento = true;
        }
        rest = parts[0];
    }
    if rest.contains(FCR_METADATA) {
        rest = remove_trailing_part(rest, FCR_METADATA)?;
        kind.description = true;
    }

    let base_id = rest.trim_end_matches('/').to_string();
    enforce_naming(&base_id)?;

    if base_id.len() <= ID_PREFIX.len() {
        kind.root = !(kind.memento || kind.timemap || kind.acl || kind.description || kind.tombstone);
    }

    Ok(ResourceId::from_parts(
        full_id.clone(),
        base_id,
        hash_uri,
        kind,
        memento_instant,
    ))
}

fn with_prefix(value: &str) -> String {
    if value.starts_with(ID_PREFIX) {
        value.to_string()
    } else if value.starts_with('/') {
        format!("{ID_PREFIX}{value}")
    } else {
        format!("{ID_PREFIX}/{value}")
    }
}

fn check_extension_combinations(full_id: &str) -> Result<(), ResourceIdError> {
    let acl_or_tombstone = full_id.contains(FCR_ACL) || full_id.contains(FCR_TOMBSTONE);
    let metadata_or_versions = full_id.contains(FCR_METADATA) || full_id.contains(FCR_VERSIONS);
    if (acl_or_tombstone && metadata_or_versions)
        || (full_id.contains(FCR_TOMBSTONE) && full_id.contains(FCR_ACL))
    {
        return Err(ResourceIdError::InvalidPath);
    }
    for extension in [FCR_TOMBSTONE, FCR_METADATA, FCR_ACL, FCR_VERSIONS] {
        if full_id.matches(extension).count() > 1 {
            return Err(ResourceIdError::InvalidPath);
        }
    }
    Ok(())
}

/// Strips `/<part>` which must be the final element of `value`.
fn remove_trailing_part<'a>(value: &'a str, part: &str) -> Result<&'a str, ResourceIdError> {
    let marker = format!("/{part}");
    match value.split_once(marker.as_str()) {
        Some((before, "")) => Ok(before),
        _ => Err(ResourceIdError::InvalidPath),
    }
}

fn enforce_naming(base_id: &str) -> Result<(), ResourceIdError> {
    let last = base_id.rsplit('/').next().unwrap_or_default();
    if FORBIDDEN_PARTS.contains(&last) {
        return Err(ResourceIdError::ForbiddenName(last.to_string()));
    }
    for suffix in FORBIDDEN_SUFFIXES {
        if last.ends_with(suffix) && last != suffix {
            return Err(ResourceIdError::ForbiddenName(suffix.to_string()));
        }
    }
    Ok(())
}
