//! Trait definitions for the probe module.

use async_trait::async_trait;
use std::path::Path;

use super::types::SourceFile;

/// Reads duration and tags from a single audio file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns the name of this prober implementation.
    fn name(&self) -> &str;

    /// Probes a file.
    ///
    /// Never fails: a file that cannot be read yields
    /// [`SourceFile::unprobed`].
    async fn probe(&self, path: &Path) -> SourceFile;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProber;

    #[async_trait]
    impl Prober for FixedProber {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn probe(&self, path: &Path) -> SourceFile {
            SourceFile::with_duration(path, 1234)
        }
    }

    #[tokio::test]
    async fn test_prober_object_safe() {
        let prober: Box<dyn Prober> = Box::new(FixedProber);
        let file = prober.probe(Path::new("/a.flac")).await;
        assert_eq!(prober.name(), "fixed");
        assert_eq!(file.duration_ms, 1234);
    }
}
