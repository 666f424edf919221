use scavcore::{ScavengerError, WorkflowDescriptor};
use scavproviders::ServiceProvider;
use std::path::Path;

/// Result of loading the bootstrap file
#[derive(Debug, Default)]
pub struct BootstrapOutcome {
    pub created: Vec<String>,
    /// Descriptors left out because they declare no schema fields
    pub skipped: Vec<String>,
    pub failed: Vec<(String, ScavengerError)>,
}

/// Read the descriptor list. A missing file yields `None`.
pub async fn load_descriptors(path: &Path) -> Result<Option<Vec<WorkflowDescriptor>>, ScavengerError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Create a workflow for each descriptor. One bad entry does not stop the
/// rest.
pub async fn apply(provider: &dyn ServiceProvider, descriptors: Vec<WorkflowDescriptor>) -> BootstrapOutcome {
    let mut outcome = BootstrapOutcome::default();

    for descriptor in descriptors {
        let name = descriptor.name.clone();
        if descriptor.schema.is_empty() {
            tracing::warn!(workflow = %name, "Skipping bootstrap workflow with no schema fields");
            outcome.skipped.push(name);
            continue;
        }

        let workflow = match descriptor.into_workflow() {
            Ok(workflow) => workflow,
            Err(e) => {
                tracing::error!(workflow = %name, error = %e, "Invalid bootstrap workflow");
                outcome.failed.push((name, e.into()));
                continue;
            }
        };

        match provider.create_from_config(workflow).await {
            Ok(()) => {
                tracing::info!(workflow = %name, "Bootstrap workflow ready");
                outcome.created.push(name);
            }
            Err(e) => {
                tracing::error!(workflow = %name, error = %e, "Failed to create bootstrap workflow");
                outcome.failed.push((name, e.into()));
            }
        }
    }

    outcome
}

/// Load `path` and apply it
pub async fn run(provider: &dyn ServiceProvider, path: &Path) -> Result<BootstrapOutcome, ScavengerError> {
    let descriptors = match load_descriptors(path).await? {
        Some(descriptors) => descriptors,
        None => {
            tracing::warn!(path = %path.display(), "Bootstrap file not found, skipping");
            return Ok(BootstrapOutcome::default());
        }
    };

    tracing::info!(path = %path.display(), entries = descriptors.len(), "Loading bootstrap workflows");
    let outcome = apply(provider, descriptors).await;
    tracing::info!(
        created = outcome.created.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failed.len(),
        "Bootstrap finished"
    );
    Ok(outcome)
}
