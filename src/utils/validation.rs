use anyhow::{Result, anyhow};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed size of {} bytes",
                size, max_size
            ),
        }));
    }
    Ok(())
}

/// Checks that a download handle or upload id names a single file inside the
/// storage directory. Anything with path components is rejected outright.
pub fn validate_storage_key(key: &str) -> Result<&str> {
    let invalid = key.is_empty()
        || key == "."
        || key.contains("..")
        || key.contains('/')
        || key.contains('\\')
        || key.chars().any(|c| c.is_control());

    if invalid {
        tracing::warn!("Rejected storage key: {:?}", key);
        return Err(anyhow!(ValidationError {
            code: "INVALID_KEY",
            message: "Invalid file reference".to_string(),
        }));
    }
    Ok(key)
}

/// Reduces a client-supplied display name to a safe single filename
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Get only the filename component (remove any path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(anyhow!(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        }));
    }

    Ok(sanitized)
}
