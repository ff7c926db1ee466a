use crate::error::{AppError, Result};

const MAX_NAME_LEN: usize = 128;

fn is_safe_name(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_NAME_LEN
        && !value.starts_with(['.', '-'])
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Instance ids double as directory and container names.
pub fn validate_instance_id(instance_id: &str) -> Result<()> {
    if !is_safe_name(instance_id) {
        return Err(AppError::validation(format!(
            "Invalid instance id: {:?}",
            instance_id
        )));
    }
    Ok(())
}

pub fn validate_version_id(version: &str) -> Result<()> {
    let is_safe = !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | ' '));

    if !is_safe {
        return Err(AppError::version_not_found(version));
    }

    Ok(())
}

/// Image references: `name[:tag]`, optionally with registry path segments.
pub fn validate_image_name(image: &str) -> Result<()> {
    let valid = !image.is_empty()
        && image.len() <= 255
        && !image.starts_with(['.', '-', '/', ':'])
        && image.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/' | ':')
        });

    if !valid {
        return Err(AppError::validation(format!(
            "Invalid image name: {:?}",
            image
        )));
    }
    Ok(())
}

pub fn validate_motd(motd: Option<&str>) -> Result<&str> {
    match motd {
        Some(m) if !m.trim().is_empty() => {
            if m.contains(['\n', '\r']) {
                Err(AppError::validation("MOTD must be a single line."))
            } else {
                Ok(m)
            }
        }
        _ => Err(AppError::validation("MOTD is required.")),
    }
}
