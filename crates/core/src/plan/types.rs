//! Volumes and the plan that orders them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::probe::SourceFile;

use super::error::PlanError;

/// One output container built from an ordered list of source files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Path of the container written for this volume.
    pub output_path: PathBuf,
    /// Source files in playback order.
    pub files: Vec<SourceFile>,
}

impl Volume {
    pub fn new(output_path: impl Into<PathBuf>, files: Vec<SourceFile>) -> Self {
        Self {
            output_path: output_path.into(),
            files,
        }
    }

    /// Display name reported to progress observers: the output file name.
    pub fn name(&self) -> String {
        self.output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output_path.display().to_string())
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of the probed durations of files with a known length.
    pub fn estimated_duration_ms(&self) -> i64 {
        self.files
            .iter()
            .filter(|f| f.has_known_duration())
            .map(|f| f.duration_ms)
            .sum()
    }
}

/// Ordered volumes for one run. Output paths are distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumePlan {
    volumes: Vec<Volume>,
}

impl VolumePlan {
    /// Builds a plan, rejecting volumes that share an output path.
    pub fn new(volumes: Vec<Volume>) -> Result<Self, PlanError> {
        let mut plan = Self::default();
        for volume in volumes {
            plan.push(volume)?;
        }
        Ok(plan)
    }

    /// Appends a volume writing `files` to `output_path`.
    pub fn add_volume(
        &mut self,
        output_path: impl Into<PathBuf>,
        files: Vec<SourceFile>,
    ) -> Result<(), PlanError> {
        self.push(Volume::new(output_path, files))
    }

    fn push(&mut self, volume: Volume) -> Result<(), PlanError> {
        if self
            .volumes
            .iter()
            .any(|v| v.output_path == volume.output_path)
        {
            return Err(PlanError::DuplicateOutput {
                path: volume.output_path,
            });
        }
        self.volumes.push(volume);
        Ok(())
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Total number of source files across all volumes.
    pub fn file_count(&self) -> usize {
        self.volumes.iter().map(|v| v.files.len()).sum()
    }

    /// Output paths in plan order.
    pub fn output_paths(&self) -> Vec<&Path> {
        self.volumes.iter().map(|v| v.output_path.as_path()).collect()
    }
}

impl<'de> Deserialize<'de> for VolumePlan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let volumes = Vec::<Volume>::deserialize(deserializer)?;
        VolumePlan::new(volumes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, ms: i64) -> SourceFile {
        SourceFile::with_duration(path, ms)
    }

    #[test]
    fn test_volume_name_is_file_name() {
        let volume = Volume::new("/out/book/v1.m4b", vec![]);
        assert_eq!(volume.name(), "v1.m4b");
        assert!(volume.is_empty());
    }

    #[test]
    fn test_estimated_duration_skips_unknown() {
        let volume = Volume::new(
            "/out/v1.m4b",
            vec![file("/a.mp3", 5000), SourceFile::unprobed("/b.mp3"), file("/c.mp3", 3000)],
        );
        assert_eq!(volume.estimated_duration_ms(), 8000);
    }

    #[test]
    fn test_plan_rejects_duplicate_outputs() {
        let mut plan = VolumePlan::default();
        plan.add_volume("/out/v1.m4b", vec![file("/a.mp3", 1)]).unwrap();
        plan.add_volume("/out/v2.m4b", vec![file("/b.mp3", 1)]).unwrap();

        let err = plan.add_volume("/out/v1.m4b", vec![]).unwrap_err();
        assert_eq!(
            err,
            PlanError::DuplicateOutput {
                path: PathBuf::from("/out/v1.m4b")
            }
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.file_count(), 2);
    }

    #[test]
    fn test_plan_new_preserves_order() {
        let plan = VolumePlan::new(vec![
            Volume::new("/out/b.m4b", vec![]),
            Volume::new("/out/a.m4b", vec![]),
        ])
        .unwrap();
        assert_eq!(
            plan.output_paths(),
            vec![Path::new("/out/b.m4b"), Path::new("/out/a.m4b")]
        );
    }

    #[test]
    fn test_deserialize_checks_duplicates() {
        let json = r#"[
            {"output_path": "/out/v1.m4b", "files": []},
            {"output_path": "/out/v1.m4b", "files": []}
        ]"#;
        let result: Result<VolumePlan, _> = serde_json::from_str(json);
        assert!(result.unwrap_err().to_string().contains("duplicate output path"));
    }
}
