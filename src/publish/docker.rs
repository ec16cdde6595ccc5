use std::path::Path;

use crate::cmd;
use crate::error::ActivationResult;
use crate::publish::{Artifact, ArtifactPublisher, build_failure, push_failure};

/// Publish with a local Docker daemon: `docker build` then
/// `docker push`. Needs registry credentials already configured
/// via `docker login`.
pub struct DockerPublisher {
    pub dockerfile: String,
    pub platform: String,
    pub build_args: Vec<(String, String)>,
}

impl DockerPublisher {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dockerfile: String::new(),
            platform: String::new(),
            build_args: Vec::new(),
        }
    }

    #[must_use]
    pub fn dockerfile(mut self, path: &str) -> Self {
        self.dockerfile = path.to_string();
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        self
    }

    #[must_use]
    pub fn build_arg(mut self, key: &str, value: &str) -> Self {
        self.build_args.push((key.to_string(), value.to_string()));
        self
    }

    fn dockerfile_or_default(&self) -> &str {
        if self.dockerfile.is_empty() {
            "Dockerfile"
        } else {
            &self.dockerfile
        }
    }

    fn platform_or_default(&self) -> &str {
        if self.platform.is_empty() {
            "linux/amd64"
        } else {
            &self.platform
        }
    }
}

impl Default for DockerPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactPublisher for DockerPublisher {
    fn build(&self, source: &Path, image: &str) -> ActivationResult<()> {
        let platform = self.platform_or_default();
        eprintln!("Building {image} for {platform}...");

        let source = source.to_string_lossy();
        let mut args = vec![
            "build",
            "--platform",
            platform,
            "-f",
            self.dockerfile_or_default(),
            "-t",
            image,
        ];

        let build_arg_strings: Vec<String> = self
            .build_args
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        for arg in &build_arg_strings {
            args.push("--build-arg");
            args.push(arg);
        }

        args.push(&source);

        cmd::run_streamed("docker", &args).map_err(build_failure)
    }

    fn push(&self, image: &str) -> ActivationResult<Artifact> {
        eprintln!("Pushing {image}...");
        cmd::run_streamed("docker", &["push", image]).map_err(push_failure)?;
        Ok(Artifact::new(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let publisher = DockerPublisher::new();

        assert_eq!(publisher.dockerfile_or_default(), "Dockerfile");
        assert_eq!(publisher.platform_or_default(), "linux/amd64");
        assert!(publisher.build_args.is_empty());
    }

    #[test]
    fn builder_chain() {
        let publisher = DockerPublisher::new()
            .dockerfile("deploy/Dockerfile")
            .platform("linux/arm64")
            .build_arg("RUST_VERSION", "1.85.0");

        assert_eq!(publisher.dockerfile_or_default(), "deploy/Dockerfile");
        assert_eq!(publisher.platform_or_default(), "linux/arm64");
        assert_eq!(
            publisher.build_args,
            vec![("RUST_VERSION".into(), "1.85.0".into())]
        );
    }
}
