#![allow(dead_code)]

use std::collections::BTreeMap;

use buildgraph::config::{ConfigFile, ConfigSection, JobConfig, PipelineSection, RawConfigFile};
use buildgraph::dag::{BuildLayers, Scheduler, topological_sort};
use buildgraph::dsl::{ParsedBuild, parse_build_no_verify};
use buildgraph::types::Edition;

/// Parse a pipeline without name verification.
pub fn pipeline(input: &str) -> ParsedBuild {
    parse_build_no_verify(input).expect("pipeline should parse")
}

/// Parse and layer a pipeline.
pub fn layers(input: &str) -> BuildLayers {
    topological_sort(&pipeline(input).jobs).expect("pipeline should layer")
}

/// Community-edition scheduler with one dispatch slot.
pub fn scheduler(input: &str) -> Scheduler {
    let build = pipeline(input);
    let layers = topological_sort(&build.jobs).expect("pipeline should layer");
    Scheduler::new(layers, build.scheduler_settings).expect("pipeline should be acyclic")
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                pipeline: PipelineSection::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_script(mut self, script: &str) -> Self {
        self.config.pipeline.script = Some(script.to_string());
        self
    }

    pub fn with_pipeline_file(mut self, file: &str) -> Self {
        self.config.pipeline.file = Some(file.to_string());
        self
    }

    pub fn with_job(self, id: &str, cmd: &str) -> Self {
        self.with_job_agents(id, cmd, &[])
    }

    pub fn with_job_agents(mut self, id: &str, cmd: &str, agents: &[&str]) -> Self {
        self.config.job.insert(
            id.to_string(),
            JobConfig {
                cmd: cmd.to_string(),
                agents: agents.iter().map(|a| a.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_agent(mut self, agent: &str) -> Self {
        self.config.config.agents.push(agent.to_string());
        self
    }

    pub fn with_edition(mut self, edition: Edition) -> Self {
        self.config.config.edition = edition;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.config.config.max_parallel = max_parallel;
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.config.config.strict_mode = strict;
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.config.config.verify = verify;
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
