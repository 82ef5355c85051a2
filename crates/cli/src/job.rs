//! Job files describing the volumes of one audiobook.
//!
//! ```toml
//! [run]
//! channels = 1
//! bitrate = 64000
//!
//! [[volumes]]
//! output = "out/Book - Part 1.m4b"
//! files = ["disc1/01.mp3", "disc1/02.mp3"]
//! ```
//!
//! Relative paths are resolved against the job file's directory. Entries
//! missing from `[run]` keep the values from the settings file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use audiobinder_core::{Channels, PlanError, RunConfig, SourceFile, VolumePlan};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobFile {
    #[serde(default)]
    run: RunOverride,
    #[serde(default)]
    volumes: Vec<JobVolume>,
}

/// `[run]` entries of a job file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunOverride {
    pub channels: Option<Channels>,
    pub sample_rate: Option<u32>,
    pub bitrate: Option<u32>,
}

impl RunOverride {
    /// Replaces the fields of `base` this override sets.
    pub fn apply(&self, base: &RunConfig) -> RunConfig {
        RunConfig::new(
            self.channels.unwrap_or(base.channels),
            self.sample_rate.unwrap_or(base.sample_rate),
            self.bitrate.unwrap_or(base.bitrate),
        )
    }
}

/// One output volume and its ordered inputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobVolume {
    pub output: PathBuf,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub run: RunOverride,
    pub volumes: Vec<JobVolume>,
}

impl Job {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {:?}", path))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&content, base).with_context(|| format!("Invalid job file {:?}", path))
    }

    pub fn parse(content: &str, base: &Path) -> Result<Self> {
        let file: JobFile = toml::from_str(content)?;
        let volumes = file
            .volumes
            .into_iter()
            .map(|volume| JobVolume {
                output: resolve(base, volume.output),
                files: volume
                    .files
                    .into_iter()
                    .map(|f| resolve(base, f))
                    .collect(),
            })
            .collect();
        Ok(Self {
            run: file.run,
            volumes,
        })
    }

    /// The run configuration for this job on top of `base`.
    pub fn run_config(&self, base: &RunConfig) -> RunConfig {
        self.run.apply(base)
    }

    /// Every input in plan order.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.volumes
            .iter()
            .flat_map(|v| v.files.iter().cloned())
            .collect()
    }

    /// Builds the plan from probe results given in [`Job::input_paths`] order.
    pub fn into_plan(self, probed: Vec<SourceFile>) -> Result<VolumePlan, PlanError> {
        let mut probed = probed.into_iter();
        let mut plan = VolumePlan::default();
        for volume in self.volumes {
            let files: Vec<SourceFile> = volume
                .files
                .iter()
                .map(|path| {
                    probed
                        .next()
                        .unwrap_or_else(|| SourceFile::unprobed(path.clone()))
                })
                .collect();
            plan.add_volume(volume.output, files)?;
        }
        Ok(plan)
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"
[run]
channels = 1
bitrate = 64000

[[volumes]]
output = "out/part1.m4b"
files = ["01.mp3", "02.mp3"]

[[volumes]]
output = "/abs/part2.m4b"
files = ["/abs/03.mp3"]
"#;

    #[test]
    fn test_parse_resolves_relative_paths() {
        let job = Job::parse(JOB, Path::new("/books/dune")).unwrap();

        assert_eq!(job.volumes.len(), 2);
        assert_eq!(
            job.volumes[0].output,
            PathBuf::from("/books/dune/out/part1.m4b")
        );
        assert_eq!(
            job.volumes[0].files,
            vec![
                PathBuf::from("/books/dune/01.mp3"),
                PathBuf::from("/books/dune/02.mp3")
            ]
        );
        assert_eq!(job.volumes[1].output, PathBuf::from("/abs/part2.m4b"));
        assert_eq!(job.volumes[1].files, vec![PathBuf::from("/abs/03.mp3")]);
    }

    #[test]
    fn test_run_override_keeps_unset_fields() {
        let job = Job::parse(JOB, Path::new("/books")).unwrap();
        let base = RunConfig::new(Channels::Stereo, 22050, 32000);

        let run = job.run_config(&base);

        assert_eq!(run.channels, Channels::Mono);
        assert_eq!(run.sample_rate, 22050);
        assert_eq!(run.bitrate, 64000);
    }

    #[test]
    fn test_partial_run_section_only_changes_channels() {
        let job = Job::parse(
            "[run]\nchannels = 1\n\n[[volumes]]\noutput = \"a.m4b\"\n",
            Path::new(""),
        )
        .unwrap();
        let base = RunConfig::new(Channels::Stereo, 48000, 96000);

        assert_eq!(
            job.run_config(&base),
            RunConfig::new(Channels::Mono, 48000, 96000)
        );
    }

    #[test]
    fn test_run_override_rejects_bad_channels() {
        assert!(Job::parse("[run]\nchannels = 6\n", Path::new("")).is_err());
    }

    #[test]
    fn test_parse_without_run_section() {
        let job = Job::parse(
            "[[volumes]]\noutput = \"a.m4b\"\nfiles = [\"a.mp3\"]\n",
            Path::new(""),
        )
        .unwrap();
        assert_eq!(job.run, RunOverride::default());
        let base = RunConfig::new(Channels::Mono, 22050, 0);
        assert_eq!(job.run_config(&base), base);
        assert_eq!(job.volumes[0].output, PathBuf::from("a.m4b"));
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        assert!(Job::parse("[[volumes]]\noutput = \"a.m4b\"\nfile = []\n", Path::new("")).is_err());
    }

    #[test]
    fn test_into_plan_splits_probe_results_per_volume() {
        let job = Job::parse(JOB, Path::new("/books")).unwrap();
        let probed: Vec<SourceFile> = job
            .input_paths()
            .into_iter()
            .map(|p| SourceFile::with_duration(p, 1000))
            .collect();
        assert_eq!(probed.len(), 3);

        let plan = job.into_plan(probed).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.volumes()[0].files.len(), 2);
        assert_eq!(plan.volumes()[1].files.len(), 1);
        assert_eq!(
            plan.volumes()[1].files[0].path,
            PathBuf::from("/abs/03.mp3")
        );
    }

    #[test]
    fn test_into_plan_rejects_duplicate_outputs() {
        let job = Job::parse(
            "[[volumes]]\noutput = \"a.m4b\"\n\n[[volumes]]\noutput = \"a.m4b\"\n",
            Path::new("/x"),
        )
        .unwrap();
        let err = job.into_plan(Vec::new()).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateOutput { .. }));
    }

    #[test]
    fn test_load_reads_relative_to_job_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(&path, "[[volumes]]\noutput = \"v.m4b\"\nfiles = [\"1.mp3\"]\n").unwrap();

        let job = Job::load(&path).unwrap();

        assert_eq!(job.volumes[0].output, dir.path().join("v.m4b"));
        assert_eq!(job.volumes[0].files, vec![dir.path().join("1.mp3")]);
    }
}
