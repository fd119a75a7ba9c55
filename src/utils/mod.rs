use std::fs;
use std::path::Path;
use anyhow::{Result, Context};

/// Ensures that the directory for the given file path exists
///
/// This function extracts the directory part of a given file path
/// and creates it if it doesn't exist.
///
/// # Arguments
/// * `file_path` - The path to the file including the filename
///
/// # Returns
/// * `Result<()>` - Ok if the directory exists or was created successfully
pub fn ensure_directory_exists(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).with_context(||
                format!("Failed to create directory: {}", parent.display())
            )?;
        }
    }
    Ok(())
}
