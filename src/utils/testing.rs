use rand::Rng;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;

async fn create_test_file(maybe_size: Option<usize>, randomly: bool) -> (PathBuf, TempDir) {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("test_file");
    let mut file = TokioFile::create(&file_path).await.unwrap();
    if let Some(size) = maybe_size {
        let mut bytes = vec![0u8; size];
        if randomly {
            rand::thread_rng().fill(&mut bytes[..]);
        }
        file.write_all(&bytes).await.unwrap();
    }
    file.flush().await.unwrap();
    (file_path, dir)
}

pub async fn create_test_file_rng_filled(size: usize) -> (PathBuf, TempDir) {
    create_test_file(size.into(), true).await
}

pub async fn create_test_file_zero_filled(size: usize) -> (PathBuf, TempDir) {
    create_test_file(size.into(), false).await
}

pub async fn create_test_file_empty() -> (PathBuf, TempDir) {
    create_test_file(None, false).await
}
