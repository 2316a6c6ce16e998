//! Record-level validation run after merging and before persisting

use crate::error::{ImportError, Result};
use crate::image::model::Image;

/// Check the fields the store requires of every image record.
///
/// `creating` relaxes the name requirement when `generateName` is set, since
/// the store assigns the final name.
pub fn validate_image(image: &Image, creating: bool) -> Result<()> {
    let name = image.name();
    if name.is_empty() {
        if !(creating && !image.metadata.generate_name.is_empty()) {
            return Err(ImportError::Validation("metadata.name: Required value".to_string()));
        }
    } else {
        validate_name(name)?;
    }

    if image.docker_image_reference.is_empty() {
        return Err(ImportError::Validation(
            "dockerImageReference: Required value".to_string(),
        ));
    }
    validate_reference(&image.docker_image_reference)
}

fn validate_name(name: &str) -> Result<()> {
    if name == "." || name == ".." {
        return Err(ImportError::Validation(format!(
            "metadata.name: Invalid value {:?}: may not be '.' or '..'",
            name
        )));
    }
    if let Some(bad) = name.chars().find(|c| *c == '/' || *c == '%') {
        return Err(ImportError::Validation(format!(
            "metadata.name: Invalid value {:?}: may not contain '{}'",
            name, bad
        )));
    }
    Ok(())
}

/// `[domain/]path[:tag][@digest]`
pub fn validate_reference(reference: &str) -> Result<()> {
    let invalid = |why: &str| {
        Err(ImportError::Validation(format!(
            "dockerImageReference: Invalid value {:?}: {}",
            reference, why
        )))
    };

    if reference.contains('\\') || reference.chars().any(char::is_whitespace) {
        return invalid("contains invalid characters");
    }

    let (rest, digest) = match reference.split_once('@') {
        Some((rest, digest)) => (rest, Some(digest)),
        None => (reference, None),
    };
    if let Some(digest) = digest {
        if !crate::image::digest::Digest::is_digest_shaped(digest) {
            return invalid("digest must be algorithm:hex");
        }
    }

    // A ':' after the last '/' separates the tag; earlier ones belong to a port
    let last_slash = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (repository, tag) = match rest[last_slash..].find(':') {
        Some(i) => (&rest[..last_slash + i], Some(&rest[last_slash + i + 1..])),
        None => (rest, None),
    };
    if let Some(tag) = tag {
        if !is_valid_tag(tag) {
            return invalid("tag must match [A-Za-z0-9_][A-Za-z0-9_.-]{0,127}");
        }
    }
    if repository.is_empty() {
        return invalid("repository name is required");
    }

    let mut components: Vec<&str> = repository.split('/').collect();
    if components.len() > 1 && looks_like_domain(components[0]) {
        if !is_valid_domain(components[0]) {
            return invalid("registry domain is malformed");
        }
        components.remove(0);
    }
    if components.iter().any(|c| !is_valid_path_component(c)) {
        return invalid("path components must be lowercase alphanumerics separated by '.', '_', '__' or '-'");
    }
    Ok(())
}

fn looks_like_domain(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
        || component.chars().any(|c| c.is_ascii_uppercase())
}

fn is_valid_domain(domain: &str) -> bool {
    let (host, port) = match domain.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (domain, None),
    };
    if let Some(port) = port {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }
    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn is_valid_path_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if bytes.is_empty() || !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        if alnum(bytes[i]) {
            i += 1;
            continue;
        }
        // Separator run: '.', '_', '__' or any number of '-'
        let start = i;
        while i < bytes.len() && !alnum(bytes[i]) {
            i += 1;
        }
        let separator = &component[start..i];
        let ok = matches!(separator, "." | "_" | "__") || separator.bytes().all(|b| b == b'-');
        if !ok {
            return false;
        }
    }
    true
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    tag.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
