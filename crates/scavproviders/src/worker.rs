use scavcore::Workflow;

/// Image used when no worker image is configured
pub const DEFAULT_WORKER_IMAGE: &str = "sthanguy/scavenger-scraper";

/// Port the worker serves its health probe and tunnel on
pub const WORKER_PORT: u16 = 8765;

pub const WORKER_HEALTH_PATH: &str = "/healthz";

/// Environment handed to a worker container.
///
/// The worker takes its whole task configuration from here: schedule,
/// extraction schema, prompt, target page and model credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEnv {
    entries: Vec<(String, String)>,
}

impl WorkerEnv {
    pub fn for_workflow(workflow: &Workflow, api_key: &str) -> Result<Self, serde_json::Error> {
        let schema = workflow.schema.to_env_value()?;
        Ok(Self {
            entries: vec![
                ("CRONTAB".to_string(), workflow.cron.clone()),
                ("GEMINI_API_KEY".to_string(), api_key.to_string()),
                ("SCHEMA".to_string(), schema),
                ("PROMPT".to_string(), workflow.prompt.clone()),
                ("WEBPAGE_URL".to_string(), workflow.website().to_string()),
            ],
        })
    }

    /// Tell the worker which port to listen on
    pub fn with_port(mut self, port: u16) -> Self {
        self.entries.push(("PORT".to_string(), port.to_string()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// `KEY=value` strings as the Docker API expects them
    pub fn to_docker_env(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}
