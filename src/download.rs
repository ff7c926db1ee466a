use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt as _;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt as _;

use crate::error::{AppError, Result};
use crate::manifest::VersionDescriptor;
use crate::paths::ARTIFACT_FILE;

/// Stream `url` into `dest`. The body lands in `<dest>.part` first and is
/// renamed once complete, so `dest` never holds a truncated download.
pub async fn download_file(client: &Client, url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::io(e.to_string()))?;
    }

    let resp = client
        .get(url)
        .header("User-Agent", "mcserver-launcher")
        .send()
        .await
        .map_err(|e| AppError::transport_with_url(url, e.to_string()))?;

    if !resp.status().is_success() {
        return Err(AppError::transport_with_url(url, resp.status().to_string()));
    }

    let part = part_path(dest);
    let written = match write_part(resp, url, &part).await {
        Ok(()) => fs::rename(&part, dest)
            .await
            .map_err(|e| AppError::io(format!("Failed to move {:?} into place: {}", part, e))),
        Err(e) => Err(e),
    };
    if written.is_err() {
        let _ = fs::remove_file(&part).await;
    }
    written
}

async fn write_part(resp: reqwest::Response, url: &str, part: &Path) -> Result<()> {
    let mut file = fs::File::create(part)
        .await
        .map_err(|e| AppError::io(e.to_string()))?;

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::transport_with_url(url, e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::io(e.to_string()))?;
    }
    file.flush().await.map_err(|e| AppError::io(e.to_string()))
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Download the server artifact for `descriptor` into `dest_dir`, replacing
/// any artifact already there.
pub async fn fetch_artifact(
    client: &Client,
    descriptor: &VersionDescriptor,
    dest_dir: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    let dest = dest_dir.join(ARTIFACT_FILE);

    log::info!(
        "Downloading server version {} to {:?}...",
        descriptor.version,
        dest
    );

    match tokio::time::timeout(
        timeout,
        download_file(client, &descriptor.download_url, &dest),
    )
    .await
    {
        Ok(Ok(())) => {
            log::info!("Download of {} complete.", descriptor.version);
            Ok(dest)
        }
        Ok(Err(e)) => {
            log::error!("Failed to download {}: {}", ARTIFACT_FILE, e);
            Err(e)
        }
        Err(_) => {
            let _ = fs::remove_file(part_path(&dest)).await;
            log::error!(
                "Download of {} timed out after {}s",
                descriptor.version,
                timeout.as_secs()
            );
            Err(AppError::timeout("download", timeout.as_secs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{stalled_server, test_client, StubServer};

    #[tokio::test]
    async fn fetch_writes_fixed_filename() {
        let stub = StubServer::with_versions(&["1.21.8"]).await;
        let dir = tempfile::tempdir().unwrap();
        let descriptor = VersionDescriptor {
            version: "1.21.8".into(),
            download_url: stub.artifact_url("1.21.8"),
        };

        let path = fetch_artifact(
            &test_client(),
            &descriptor,
            dir.path(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(path, dir.path().join("server.jar"));
        assert_eq!(
            std::fs::read(&path).unwrap(),
            StubServer::artifact_bytes("1.21.8")
        );
        assert!(!dir.path().join("server.jar.part").exists());
    }

    #[tokio::test]
    async fn fetch_overwrites_existing_artifact() {
        let stub = StubServer::with_versions(&["1.21.8"]).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("server.jar"), b"stale").unwrap();
        let descriptor = VersionDescriptor {
            version: "1.21.8".into(),
            download_url: stub.artifact_url("1.21.8"),
        };

        fetch_artifact(
            &test_client(),
            &descriptor,
            dir.path(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("server.jar")).unwrap(),
            StubServer::artifact_bytes("1.21.8")
        );
    }

    #[tokio::test]
    async fn missing_artifact_is_transport_error() {
        let stub = StubServer::with_versions(&[]).await;
        let dir = tempfile::tempdir().unwrap();
        let descriptor = VersionDescriptor {
            version: "1.21.8".into(),
            download_url: stub.url("/nowhere.jar"),
        };

        let err = fetch_artifact(
            &test_client(),
            &descriptor,
            dir.path(),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!dir.path().join("server.jar").exists());
    }

    #[test]
    fn part_file_sits_next_to_destination() {
        assert_eq!(
            part_path(Path::new("/a/server.jar")),
            PathBuf::from("/a/server.jar.part")
        );
    }

    #[tokio::test]
    async fn failed_move_removes_part_file() {
        let stub = StubServer::with_versions(&["1.21.8"]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("server.jar");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep"), b"x").unwrap();

        let err = download_file(&test_client(), &stub.artifact_url("1.21.8"), &dest)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!dir.path().join("server.jar.part").exists());
    }

    #[tokio::test]
    async fn stalled_download_times_out() {
        let (url, _server) = stalled_server().await;
        let dir = tempfile::tempdir().unwrap();
        let descriptor = VersionDescriptor {
            version: "1.21.8".into(),
            download_url: url,
        };

        let err = fetch_artifact(
            &test_client(),
            &descriptor,
            dir.path(),
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(!dir.path().join("server.jar").exists());
        assert!(!dir.path().join("server.jar.part").exists());
    }
}
