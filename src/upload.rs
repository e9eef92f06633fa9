use reqwest::multipart::{Form, Part};

use crate::error::Error;

/// Form field name the backends read uploaded files from.
pub const FILE_FIELD: &str = "file";

/// One file to send as multipart form data.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl UploadFile {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Reads `path` into memory, naming the part after the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read.
    pub async fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| FILE_FIELD.to_owned());
        Ok(Self::new(file_name, bytes))
    }

    pub(crate) fn into_part(self) -> Result<Part, Error> {
        let part = Part::bytes(self.bytes).file_name(self.file_name);
        match self.mime {
            Some(mime) => part
                .mime_str(&mime)
                .map_err(|e| Error::Config(format!("invalid MIME type {mime}: {e}"))),
            None => Ok(part),
        }
    }

    /// Form with this file as its single `file` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unparsable MIME type.
    pub fn into_form(self) -> Result<Form, Error> {
        Ok(Form::new().part(FILE_FIELD, self.into_part()?))
    }
}

/// Builder for forms mixing text fields and files, e.g. a non-conformity fix
/// with its attachments.
#[derive(Debug)]
pub struct MultipartPayload {
    form: Form,
}

impl Default for MultipartPayload {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartPayload {
    #[must_use]
    pub fn new() -> Self {
        Self { form: Form::new() }
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form = self.form.text(name.into(), value.into());
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unparsable MIME type.
    pub fn file(mut self, name: impl Into<String>, file: UploadFile) -> Result<Self, Error> {
        self.form = self.form.part(name.into(), file.into_part()?);
        Ok(self)
    }

    #[must_use]
    pub fn into_form(self) -> Form {
        self.form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_form_has_boundary() {
        let form = UploadFile::new("scan.png", vec![1, 2, 3])
            .with_mime("image/png")
            .into_form()
            .unwrap();
        assert!(!form.boundary().is_empty());
    }

    #[test]
    fn rejects_invalid_mime() {
        let err = UploadFile::new("a.bin", vec![0])
            .with_mime("not a mime")
            .into_form()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "invoice.pdf");
        assert_eq!(file.bytes, b"%PDF");
    }

    #[test]
    fn mixed_payload_builds() {
        let payload = MultipartPayload::new()
            .text("actionTaken", "replaced gasket")
            .text("isEffective", "true")
            .file("attachments", UploadFile::new("photo.jpg", vec![0xff]))
            .unwrap();
        assert!(!payload.into_form().boundary().is_empty());
    }
}
