/// Unlinks attachment files once their rows are gone. Storage cleanup is
/// best effort and runs off the request path; a missing file is not an
/// error, anything else is logged and forgotten.
pub fn remove_files(paths: Vec<String>) {
    if paths.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!("removed media file {path}"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => tracing::warn!("failed to remove media file {path}: {err}"),
            }
        }
    });
}
