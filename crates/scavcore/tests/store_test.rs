// crates/scavcore/tests/store_test.rs

use scavcore::{
    ApiKey, ApiKeyStore, ApiKeyVerifier, ExtractionSchema, JsonFileStore, MemoryStore, SchemaField,
    StoreError, Workflow, WorkflowStore,
};

fn sample_workflow(name: &str) -> Workflow {
    let mut schema = ExtractionSchema::new();
    schema.insert_normalized(SchemaField::new("Debt", "number", "total debt"));
    schema.insert_normalized(SchemaField::new("Per Citizen", "number", "debt per citizen"));
    schema.insert_normalized(SchemaField::new("Updated At", "string", "timestamp"));

    Workflow::new(name, "https://example.com", "*/5 * * * *", "Extract the debt", schema, 3)
        .with_worker_address("http://localhost:49153")
}

#[test]
fn test_workflow_json_round_trip() {
    let workflow = sample_workflow("Debt Clock");

    let json = serde_json::to_string(&workflow).unwrap();
    let back: Workflow = serde_json::from_str(&json).unwrap();

    assert_eq!(back, workflow);
}

#[test]
fn test_schema_round_trip_ignores_key_order() {
    let workflow = sample_workflow("order");
    let mut value = serde_json::to_value(&workflow).unwrap();

    // Rebuild the properties object with keys in reverse order
    let props = value["schema"]["properties"].as_object().unwrap().clone();
    let mut reversed = serde_json::Map::new();
    let mut keys: Vec<_> = props.keys().cloned().collect();
    keys.sort();
    keys.reverse();
    for k in keys {
        reversed.insert(k.clone(), props[&k].clone());
    }
    value["schema"]["properties"] = serde_json::Value::Object(reversed);

    let back: Workflow = serde_json::from_value(value).unwrap();
    assert_eq!(back, workflow);
}

#[tokio::test]
async fn test_memory_store_lifecycle() {
    let store = MemoryStore::new();
    let workflow = sample_workflow("debt");

    store.insert_workflow(&workflow).await.unwrap();
    assert!(matches!(
        store.insert_workflow(&workflow).await,
        Err(StoreError::Duplicate(name)) if name == "debt"
    ));

    assert_eq!(store.find_workflow("debt").await.unwrap(), Some(workflow));
    assert_eq!(store.list_workflows().await.unwrap().len(), 1);

    assert!(store.delete_workflow("debt").await.unwrap());
    assert!(!store.delete_workflow("debt").await.unwrap());
    assert_eq!(store.find_workflow("debt").await.unwrap(), None);
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scavenger.json");

    let first = sample_workflow("first");
    let second = sample_workflow("second");
    let token = scavcore::generate_token();

    {
        let store = JsonFileStore::open(&path).await.unwrap();
        store.insert_workflow(&first).await.unwrap();
        store.insert_workflow(&second).await.unwrap();
        store.delete_workflow("first").await.unwrap();
        store.insert_api_key(ApiKey::from_token(&token)).await.unwrap();
    }

    let reopened = JsonFileStore::open(&path).await.unwrap();
    assert_eq!(reopened.find_workflow("first").await.unwrap(), None);
    assert_eq!(reopened.find_workflow("second").await.unwrap(), Some(second));

    let keys = reopened.api_keys().await.unwrap();
    assert!(ApiKeyVerifier::new(&keys).verify(&token));

    // Plaintext never reaches disk
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains(&token));
}

#[tokio::test]
async fn test_file_store_rejects_duplicates_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scavenger.json");
    let store = JsonFileStore::open(&path).await.unwrap();

    store.insert_workflow(&sample_workflow("debt")).await.unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    assert!(store.insert_workflow(&sample_workflow("debt")).await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn test_file_store_opens_missing_file_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("absent.json")).await.unwrap();

    assert!(store.list_workflows().await.unwrap().is_empty());
    assert!(store.api_keys().await.unwrap().is_empty());
}
