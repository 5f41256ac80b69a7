use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Request payloads for the load tool: every prompt paired with every image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub prompts: Vec<String>,
    pub image_dir: PathBuf,
    /// Dedicated directory; stale `.json` files in it are removed.
    pub output_dir: PathBuf,
    pub max_tokens: u32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            prompts: vec![
                "Describe this image in detail.".to_string(),
                "What objects are visible in this image?".to_string(),
            ],
            image_dir: PathBuf::from("images"),
            output_dir: PathBuf::from("dataset"),
            max_tokens: 256,
        }
    }
}

/// Image files under `dir`, sorted by path.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.context(format!("Failed to read {:?}", dir))?;
        if entry.file_type().is_file() && mime_type(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Chat-completions body with one text part and one inline image part.
pub fn build_payload(prompt: &str, image: &[u8], mime: &str, max_tokens: u32) -> Value {
    let data_url = format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(image));

    json!({
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": data_url } }
            ]
        }],
        "max_tokens": max_tokens
    })
}

/// Stable file name for a (prompt, image) pair.
pub fn payload_id(prompt: &str, image_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update([0u8]);
    hasher.update(image_path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Write one payload file per (prompt, image) pair and return their paths.
pub async fn prepare_dataset(config: &DatasetConfig) -> Result<Vec<PathBuf>> {
    if config.prompts.is_empty() {
        anyhow::bail!("Dataset needs at least one prompt");
    }

    let images = image_files(&config.image_dir)?;
    if images.is_empty() {
        anyhow::bail!("No images found in {:?}", config.image_dir);
    }

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .context(format!("Failed to create {:?}", config.output_dir))?;
    remove_stale_payloads(&config.output_dir).await?;

    let mut written = Vec::with_capacity(images.len() * config.prompts.len());
    for image_path in &images {
        let bytes = tokio::fs::read(image_path)
            .await
            .context(format!("Failed to read image {:?}", image_path))?;
        let mime = mime_type(image_path).unwrap_or("image/jpeg");

        for prompt in &config.prompts {
            let payload = build_payload(prompt, &bytes, mime, config.max_tokens);
            let path = config
                .output_dir
                .join(format!("{}.json", payload_id(prompt, image_path)));

            tokio::fs::write(&path, serde_json::to_vec(&payload)?)
                .await
                .context(format!("Failed to write {:?}", path))?;
            debug!(path = %path.display(), "Wrote payload");
            written.push(path);
        }
    }

    info!(
        payloads = written.len(),
        images = images.len(),
        prompts = config.prompts.len(),
        dir = %config.output_dir.display(),
        "Prepared dataset"
    );
    Ok(written)
}

async fn remove_stale_payloads(dir: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_embeds_image_as_data_url() {
        let payload = build_payload("What is this?", b"test", "image/png", 64);
        let content = &payload["messages"][0]["content"];

        assert_eq!(content[0]["text"], "What is this?");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,dGVzdA==");
        assert_eq!(payload["max_tokens"], 64);
    }

    #[test]
    fn payload_ids_are_stable_and_distinct() {
        let a = payload_id("p", Path::new("img/1.jpg"));
        assert_eq!(a, payload_id("p", Path::new("img/1.jpg")));
        assert_ne!(a, payload_id("p", Path::new("img/2.jpg")));
        assert_ne!(a, payload_id("q", Path::new("img/1.jpg")));
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn writes_one_payload_per_prompt_image_pair() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(images.join("nested")).unwrap();
        std::fs::write(images.join("a.jpg"), b"jpeg bytes").unwrap();
        std::fs::write(images.join("nested/b.PNG"), b"png bytes").unwrap();
        std::fs::write(images.join("notes.txt"), b"ignored").unwrap();

        let output_dir = dir.path().join("dataset");
        std::fs::create_dir_all(&output_dir).unwrap();
        std::fs::write(output_dir.join("stale.json"), b"{}").unwrap();

        let config = DatasetConfig {
            prompts: vec!["one".to_string(), "two".to_string()],
            image_dir: images,
            output_dir: output_dir.clone(),
            max_tokens: 32,
        };

        let written = prepare_dataset(&config).await.unwrap();
        assert_eq!(written.len(), 4);
        assert!(!output_dir.join("stale.json").exists());

        for path in &written {
            let payload: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
            let url = payload["messages"][0]["content"][1]["image_url"]["url"]
                .as_str()
                .unwrap();
            assert!(url.starts_with("data:image/"));
        }
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn empty_image_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig {
            image_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("out"),
            ..DatasetConfig::default()
        };

        let err = prepare_dataset(&config).await.unwrap_err();
        assert!(err.to_string().contains("No images found"));
    }
}
