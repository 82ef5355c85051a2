//! Probe module for reading duration and tags from source files.
//!
//! Probing happens upstream of a run, when files are added to a plan. It
//! never fails: unreadable files come back marked invalid so they can still
//! be listed.

mod ffprobe;
mod traits;
mod types;

pub(crate) use ffprobe::{run_ffprobe_blocking, ProbeError};
pub use ffprobe::FfprobeProber;
pub use traits::Prober;
pub use types::SourceFile;

use futures::future::join_all;
use std::path::PathBuf;

/// Probes several files concurrently, preserving input order.
pub async fn probe_all<P: Prober + ?Sized>(prober: &P, paths: &[PathBuf]) -> Vec<SourceFile> {
    join_all(paths.iter().map(|path| prober.probe(path))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;

    struct NameLengthProber;

    #[async_trait]
    impl Prober for NameLengthProber {
        fn name(&self) -> &str {
            "name-length"
        }

        async fn probe(&self, path: &Path) -> SourceFile {
            let len = path.as_os_str().len() as i64;
            SourceFile::with_duration(path, len * 1000)
        }
    }

    #[tokio::test]
    async fn test_probe_all_preserves_order() {
        let paths = vec![PathBuf::from("/a"), PathBuf::from("/bbb"), PathBuf::from("/cc")];
        let files = probe_all(&NameLengthProber, &paths).await;

        let durations: Vec<i64> = files.iter().map(|f| f.duration_ms).collect();
        assert_eq!(durations, vec![2000, 4000, 3000]);
        assert_eq!(files[1].path, PathBuf::from("/bbb"));
    }
}
