//! Multipart form reading for upload endpoints

use std::collections::HashMap;

use axum::extract::Multipart;
use serde::de::DeserializeOwned;

use crate::media::MediaSource;
use crate::shared::error::{PlatformError, Result};

/// Text fields and image parts of one `multipart/form-data` body.
#[derive(Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<(String, MediaSource)>,
}

impl UploadForm {
    /// Drain the request body. Parts with a file name are treated as images;
    /// everything else is a text field.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field.bytes().await?;
                    if data.is_empty() {
                        continue;
                    }
                    let source = MediaSource::image(file_name, content_type, data)?;
                    form.files.push((normalize_name(&name), source));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<&str> {
        self.text(name)
            .ok_or_else(|| PlatformError::validation(format!("{} is required", name)))
    }

    /// Parse a JSON-encoded text field.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let raw = self.required_text(name)?;
        serde_json::from_str(raw)
            .map_err(|e| PlatformError::validation(format!("invalid {} payload: {}", name, e)))
    }

    /// First file part named `name`.
    pub fn take_file(&mut self, name: &str) -> Option<MediaSource> {
        let position = self.files.iter().position(|(n, _)| n == name)?;
        Some(self.files.remove(position).1)
    }

    /// Every file part named `name`, in upload order.
    pub fn take_files(&mut self, name: &str) -> Vec<MediaSource> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(n, _)| n == name);
        self.files = rest;
        taken.into_iter().map(|(_, source)| source).collect()
    }

    /// An uploaded file, or a remote URL in a text field of the same name.
    pub fn take_image(&mut self, name: &str) -> Result<Option<MediaSource>> {
        if let Some(file) = self.take_file(name) {
            return Ok(Some(file));
        }
        self.text(name).map(MediaSource::remote).transpose()
    }
}

/// `images[]` and `images` name the same repeated part.
fn normalize_name(name: &str) -> String {
    name.strip_suffix("[]").unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn png(name: &str) -> MediaSource {
        MediaSource::image(name, "image/png", Bytes::from_static(b"\x89PNG")).unwrap()
    }

    #[test]
    fn test_repeated_parts_are_collected_in_order() {
        let mut form = UploadForm::default();
        form.files.push(("images".into(), png("a.png")));
        form.files.push(("main_image".into(), png("main.png")));
        form.files.push(("images".into(), png("b.png")));

        let images = form.take_files("images");
        assert_eq!(images.len(), 2);
        match &images[1] {
            MediaSource::Bytes { file_name, .. } => assert_eq!(file_name, "b.png"),
            other => panic!("unexpected source {:?}", other),
        }
        assert!(form.take_file("main_image").is_some());
        assert!(form.take_file("main_image").is_none());
    }

    #[test]
    fn test_text_and_json_fields() {
        let mut form = UploadForm::default();
        form.fields.insert("name".into(), "  Beads  ".into());
        form.fields.insert("blank".into(), "   ".into());
        form.fields.insert("data".into(), r#"{"n": 3}"#.into());

        assert_eq!(form.text("name"), Some("Beads"));
        assert_eq!(form.text("blank"), None);
        assert!(form.required_text("missing").is_err());

        #[derive(serde::Deserialize)]
        struct Data {
            n: u32,
        }
        assert_eq!(form.json::<Data>("data").unwrap().n, 3);
        form.fields.insert("data".into(), "{".into());
        assert!(form.json::<Data>("data").is_err());
    }

    #[test]
    fn test_remote_url_fallback() {
        let mut form = UploadForm::default();
        form.fields.insert("logo".into(), "https://cdn.example.com/logo.png".into());
        assert!(matches!(form.take_image("logo").unwrap(), Some(MediaSource::RemoteUrl(_))));
        assert!(form.take_image("banner").unwrap().is_none());
    }

    #[test]
    fn test_array_suffix_is_dropped() {
        assert_eq!(normalize_name("images[]"), "images");
        assert_eq!(normalize_name("logo"), "logo");
    }
}
