//! Multipart form collection and uploaded-file storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 2] = ["pdf", "docx"];

/// Subfolder of the upload root that holds resumes.
pub const RESUME_DIR: &str = "resumes";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// A multipart body split into text fields and file fields, each possibly repeated.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed form data: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            match file_name {
                Some(file_name) => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                    form.files
                        .entry(name)
                        .or_default()
                        .push(UploadedFile { file_name, data });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read field: {e}")))?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }
        Ok(form)
    }

    /// First value of a text field, or "" when absent.
    pub fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn texts(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Files under `name` that were actually chosen. Browsers send an empty
    /// filename for an untouched file input.
    pub fn files(&self, name: &str) -> Vec<&UploadedFile> {
        self.files
            .get(name)
            .map(|files| files.iter().filter(|f| !f.file_name.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files(name).into_iter().next()
    }
}

/// Reduces an untrusted filename to a safe single path component.
/// Returns an empty string when nothing usable is left.
pub fn secure_filename(name: &str) -> String {
    let flattened: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c: char| c == '.' || c == '_').to_string()
}

pub fn allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Per-user upload folder. The username is sanitized like a filename.
pub fn user_upload_dir(root: &Path, username: &str) -> PathBuf {
    match secure_filename(username) {
        name if name.is_empty() => root.join("_"),
        name => root.join(name),
    }
}

/// The name `file` would be stored under, or a validation error when it is empty
/// or has an extension outside the allow-list.
pub fn checked_name(file: &UploadedFile) -> Result<String, AppError> {
    let stored_name = secure_filename(&file.file_name);
    if stored_name.is_empty() {
        return Err(AppError::Validation("No selected file".to_string()));
    }
    if !allowed_file(&stored_name) {
        return Err(AppError::Validation(format!(
            "'{stored_name}' is not allowed; upload one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    Ok(stored_name)
}

/// Validates and writes one upload into `dir`, returning the stored name.
pub async fn save_upload(dir: &Path, file: &UploadedFile) -> Result<String, AppError> {
    let stored_name = checked_name(file)?;
    write_upload(dir, &stored_name, &file.data).await?;
    Ok(stored_name)
}

/// Validates every file before writing any, so a rejected file leaves nothing
/// behind. Returns the stored names in order.
pub async fn save_uploads(dir: &Path, files: &[&UploadedFile]) -> Result<Vec<String>, AppError> {
    let names = files
        .iter()
        .map(|file| checked_name(file))
        .collect::<Result<Vec<_>, _>>()?;
    for (name, file) in names.iter().zip(files) {
        write_upload(dir, name, &file.data).await?;
    }
    Ok(names)
}

async fn write_upload(dir: &Path, stored_name: &str, data: &Bytes) -> Result<(), AppError> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(stored_name);
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!("Stored upload {} ({} bytes)", path.display(), data.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My Resume.pdf"), "My_Resume.pdf");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("C:\\Users\\cv.docx"), "C_Users_cv.docx");
        assert_eq!(secure_filename("résumé.pdf"), "rsum.pdf");
        assert_eq!(secure_filename("..."), "");
        assert_eq!(secure_filename(".hidden.pdf"), "hidden.pdf");
    }

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("cv.pdf"));
        assert!(allowed_file("CV.DOCX"));
        assert!(!allowed_file("cv.doc"));
        assert!(!allowed_file("pdf"));
        assert!(!allowed_file("script.pdf.exe"));
    }

    #[test]
    fn test_user_upload_dir_cannot_escape_root() {
        let root = Path::new("/srv/uploads");
        assert_eq!(user_upload_dir(root, "alice"), root.join("alice"));
        assert_eq!(user_upload_dir(root, "../bob"), root.join("bob"));
        assert_eq!(user_upload_dir(root, ".."), root.join("_"));
    }

    #[tokio::test]
    async fn test_save_upload_rejects_disallowed_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = UploadedFile {
            file_name: "notes.txt".to_string(),
            data: Bytes::from_static(b"hi"),
        };
        let err = save_upload(dir.path(), &file).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_save_upload_writes_sanitized_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = UploadedFile {
            file_name: "my plan.docx".to_string(),
            data: Bytes::from_static(b"PK"),
        };
        let stored = save_upload(&dir.path().join("alice"), &file).await.unwrap();
        assert_eq!(stored, "my_plan.docx");
        assert_eq!(std::fs::read(dir.path().join("alice/my_plan.docx")).unwrap(), b"PK");
    }

    #[tokio::test]
    async fn test_save_uploads_writes_nothing_when_any_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = UploadedFile {
            file_name: "plan.pdf".to_string(),
            data: Bytes::from_static(b"%PDF"),
        };
        let bad = UploadedFile {
            file_name: "tool.exe".to_string(),
            data: Bytes::from_static(b"MZ"),
        };

        let err = save_uploads(dir.path(), &[&good, &bad]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!dir.path().join("plan.pdf").exists());

        let names = save_uploads(dir.path(), &[&good]).await.unwrap();
        assert_eq!(names, vec!["plan.pdf"]);
        assert!(dir.path().join("plan.pdf").exists());
    }
}
