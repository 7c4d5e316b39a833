use crate::VaultError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DURATION_RE: Regex =
        Regex::new(r"^(?:[0-9]+|(?:[0-9]+(?:\.[0-9]+)?(?:ns|us|µs|ms|s|m|h|d))+)$").unwrap();
}

/// Check a Vault duration: whole seconds ("3600") or unit form ("1h30m")
pub fn duration(field: &str, value: &str) -> Result<(), VaultError> {
    if DURATION_RE.is_match(value) {
        Ok(())
    } else {
        Err(VaultError::validation(format!(
            "{} must be a duration like \"30m\" or a number of seconds, got {:?}",
            field, value
        )))
    }
}

pub fn optional_duration(field: &str, value: Option<&str>) -> Result<(), VaultError> {
    match value {
        Some(v) => duration(field, v),
        None => Ok(()),
    }
}

pub fn non_empty(field: &str, value: &str) -> Result<(), VaultError> {
    if value.trim().is_empty() {
        return Err(VaultError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Names that end up as a single path segment
pub fn segment(field: &str, value: &str) -> Result<(), VaultError> {
    non_empty(field, value)?;
    if value.contains('/') {
        return Err(VaultError::validation(format!(
            "{} must not contain '/', got {:?}",
            field, value
        )));
    }
    path_component(field, value)
}

/// Mount paths may be nested but not empty after trimming slashes
pub fn mount_path(value: &str) -> Result<String, VaultError> {
    let trimmed = value.trim_matches('/');
    non_empty("mount path", trimmed)?;
    for component in trimmed.split('/') {
        if component.is_empty() {
            return Err(VaultError::validation(format!(
                "mount path must not contain empty components, got {:?}",
                value
            )));
        }
        path_component("mount path", component)?;
    }
    Ok(trimmed.to_string())
}

/// URL parsing would resolve dot segments or cut the path at '?' and '#'
fn path_component(field: &str, value: &str) -> Result<(), VaultError> {
    if value
        .chars()
        .any(|c| matches!(c, '?' | '#' | '\\') || c.is_control())
    {
        return Err(VaultError::validation(format!(
            "{} must not contain '?', '#', '\\' or control characters, got {:?}",
            field, value
        )));
    }
    let decoded = value.to_ascii_lowercase().replace("%2e", ".");
    if decoded == "." || decoded == ".." {
        return Err(VaultError::validation(format!(
            "{} must not be a dot segment, got {:?}",
            field, value
        )));
    }
    Ok(())
}

pub fn policies(policies: &[String]) -> Result<(), VaultError> {
    for policy in policies {
        non_empty("policy name", policy)?;
        if policy.contains(',') {
            return Err(VaultError::validation(format!(
                "policy name must not contain ',', got {:?}",
                policy
            )));
        }
    }
    Ok(())
}

pub fn paths(paths: &[String]) -> Result<(), VaultError> {
    if paths.is_empty() {
        return Err(VaultError::validation("at least one path is required"));
    }
    for path in paths {
        non_empty("path", path)?;
    }
    Ok(())
}
