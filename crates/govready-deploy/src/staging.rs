//! イメージのビルドコンテキストへのファイル一時配置
//!
//! 証明書やブランディングなど、ローカルファイルを指す設定キーの実体を
//! `<stack_dir>/<image>/tmp/` にコピーし、キーの値をファイル名に書き換える。
//! 配置したファイルは `StagedBuildFiles` の破棄時に削除される。

use govready_deploy_config::{BUILD_FILE_KEYS, BuildFileKey, ConfigError, ConfigResolver};
use govready_deploy_core::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 一時配置したファイルとディレクトリ
#[derive(Debug, Default)]
pub struct StagedBuildFiles {
    files: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
}

impl StagedBuildFiles {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn cleanup(&mut self) {
        for file in self.files.drain(..) {
            if let Err(e) = fs::remove_file(&file) {
                warn!("Failed to remove staged file {}: {}", file.display(), e);
            }
        }
        for dir in self.created_dirs.drain(..) {
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!("Failed to remove staging dir {}: {}", dir.display(), e);
            }
        }
    }
}

impl Drop for StagedBuildFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// ビルドに必要なファイルを一時配置する
pub fn stage_build_files(
    resolver: &mut ConfigResolver,
    stack_dir: &Path,
) -> Result<StagedBuildFiles> {
    let mut staged = StagedBuildFiles::default();

    for entry in &BUILD_FILE_KEYS {
        let Some(source) = source_path(resolver, entry)? else {
            continue;
        };
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| invalid(entry.key, "ファイル名を含むパスを指定してください"))?;

        let tmp_dir = stack_dir.join(entry.image).join("tmp");
        if !tmp_dir.exists() {
            fs::create_dir_all(&tmp_dir)?;
            staged.created_dirs.push(tmp_dir.clone());
        }

        let target = tmp_dir.join(&file_name);
        fs::copy(&source, &target)?;
        debug!("Staged {} -> {}", source.display(), target.display());

        staged.files.push(target);
        resolver.set(entry.key, file_name);
    }

    Ok(staged)
}

/// 指定されたビルド用ファイルがすべて存在するか確認する
pub fn validate_build_files(resolver: &ConfigResolver) -> Result<()> {
    for entry in &BUILD_FILE_KEYS {
        source_path(resolver, entry)?;
    }
    Ok(())
}

fn source_path(resolver: &ConfigResolver, entry: &BuildFileKey) -> Result<Option<PathBuf>> {
    if !resolver.is_truthy(entry.key) {
        return Ok(None);
    }
    let raw = resolver
        .get_str(entry.key)
        .ok_or_else(|| invalid(entry.key, "ファイルパスを文字列で指定してください"))?;

    let path = PathBuf::from(raw);
    if !path.is_file() {
        return Err(invalid(entry.key, &format!("ファイルが見つかりません: {}", raw)).into());
    }
    Ok(Some(path))
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govready_deploy_core::DeployError;
    use serde_json::json;

    #[test]
    fn test_nothing_to_stage() {
        let stack_dir = tempfile::tempdir().unwrap();
        let mut resolver = ConfigResolver::new();
        resolver.set("BRANDING", json!(""));

        let staged = stage_build_files(&mut resolver, stack_dir.path()).unwrap();
        assert!(staged.is_empty());
        assert!(!stack_dir.path().join("govready-q").exists());
    }

    #[test]
    fn test_stage_and_cleanup() {
        let stack_dir = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let cert = source_dir.path().join("server.crt");
        let key = source_dir.path().join("server.key");
        fs::write(&cert, "CERT").unwrap();
        fs::write(&key, "KEY").unwrap();

        let mut resolver = ConfigResolver::new();
        resolver.set("NGINX_CERT", json!(cert.to_string_lossy()));
        resolver.set("NGINX_KEY", json!(key.to_string_lossy()));

        let staged = stage_build_files(&mut resolver, stack_dir.path()).unwrap();
        let tmp_dir = stack_dir.path().join("nginx").join("tmp");

        assert_eq!(staged.files().len(), 2);
        assert_eq!(fs::read_to_string(tmp_dir.join("server.crt")).unwrap(), "CERT");
        assert_eq!(resolver.get_str("NGINX_CERT"), Some("server.crt"));
        assert_eq!(resolver.get_str("NGINX_KEY"), Some("server.key"));

        drop(staged);
        assert!(!tmp_dir.exists());
        // 元のファイルは残る
        assert!(cert.exists());
    }

    #[test]
    fn test_existing_tmp_dir_is_kept() {
        let stack_dir = tempfile::tempdir().unwrap();
        let tmp_dir = stack_dir.path().join("govready-q").join("tmp");
        fs::create_dir_all(&tmp_dir).unwrap();
        fs::write(tmp_dir.join("keep.txt"), "keep").unwrap();

        let source_dir = tempfile::tempdir().unwrap();
        let branding = source_dir.path().join("branding.zip");
        fs::write(&branding, "zip").unwrap();

        let mut resolver = ConfigResolver::new();
        resolver.set("BRANDING", json!(branding.to_string_lossy()));

        let staged = stage_build_files(&mut resolver, stack_dir.path()).unwrap();
        assert!(tmp_dir.join("branding.zip").exists());
        drop(staged);

        assert!(!tmp_dir.join("branding.zip").exists());
        assert!(tmp_dir.join("keep.txt").exists());
    }

    #[test]
    fn test_missing_file_is_invalid_value() {
        let mut resolver = ConfigResolver::new();
        resolver.set("NGINX_CERT", json!("/nonexistent/server.crt"));

        let err = validate_build_files(&resolver).unwrap_err();
        match err {
            DeployError::Configuration(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "NGINX_CERT")
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }

        let stack_dir = tempfile::tempdir().unwrap();
        assert!(stage_build_files(&mut resolver, stack_dir.path()).is_err());
    }
}
