//! A file-backed engine and the workspace config across process restarts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use revmap_config::loader::set_master_map_id;
use revmap_config::{Config, workspace_config_path};
use revmap_core::{ChannelId, MapId, ResourceId};
use revmap_crypto::KeyPair;
use revmap_ledger::{CommitRequest, RecordService, provision_master_map};
use revmap_map::{DEFAULT_CALL_TIMEOUT, MapAdmin, MapError, MemoryMapEngine};
use revmap_test::test_context;
use serde_json::json;

fn open_engine(dir: &Path) -> Arc<MemoryMapEngine> {
    let keypair = KeyPair::load_or_generate(dir.join("signing.key")).unwrap();
    Arc::new(MemoryMapEngine::open(dir.join("state.json"), keypair).unwrap())
}

async fn service(engine: Arc<MemoryMapEngine>, master: MapId) -> RecordService {
    let admin = MapAdmin::new(engine, DEFAULT_CALL_TIMEOUT);
    RecordService::connect(admin, &test_context(), master)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context();

    let master = {
        let engine = open_engine(dir.path());
        let admin = MapAdmin::new(engine.clone(), DEFAULT_CALL_TIMEOUT);
        let master = provision_master_map(&admin, &ctx).await.unwrap();
        let service = service(engine, master).await;
        service
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({"k": "v"})))
            .await
            .unwrap();
        service
            .commit(&ctx, CommitRequest::new("c1", "r1", "UPDATE", json!({"k": "v2"})))
            .await
            .unwrap();
        master
    };

    let service = service(open_engine(dir.path()), master).await;
    let entries = service
        .audit(&ctx, &ChannelId::new("c1"), &ResourceId::new("r1"))
        .await
        .unwrap();
    let revisions: Vec<_> = entries.iter().map(|e| e.revision).collect();
    assert_eq!(revisions, vec![2, 1]);

    let receipt = service
        .commit(&ctx, CommitRequest::new("c1", "r1", "UPDATE", json!({"k": "v3"})))
        .await
        .unwrap();
    assert!(!receipt.channel_created);
    assert_eq!(receipt.revision, 3);
}

#[tokio::test]
async fn test_state_signed_by_another_key_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(dir.path());
    let admin = MapAdmin::new(engine, DEFAULT_CALL_TIMEOUT);
    provision_master_map(&admin, &test_context()).await.unwrap();

    let result = MemoryMapEngine::open(dir.path().join("state.json"), KeyPair::generate());
    assert!(matches!(result, Err(MapError::Storage(_))));
}

#[tokio::test]
async fn test_master_map_id_recorded_in_workspace_config() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context();
    let engine = open_engine(dir.path());
    let admin = MapAdmin::new(engine.clone(), DEFAULT_CALL_TIMEOUT);

    let master = provision_master_map(&admin, &ctx).await.unwrap();
    let config_path = workspace_config_path(dir.path());
    set_master_map_id(&config_path, master.get()).unwrap();

    let resolved = Config::load_with_env(Some(config_path.as_path()), &HashMap::new()).unwrap();
    let configured = resolved.config.map.master_map_id.map(MapId).unwrap();
    assert_eq!(configured, master);

    let service = service(engine, configured).await;
    let receipt = service
        .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({})))
        .await
        .unwrap();
    assert_eq!(receipt.revision, 1);
}

#[tokio::test]
async fn test_legacy_env_var_names_the_master_map() {
    let env: HashMap<String, String> =
        [("CHANNEL_CONFIG_MAP_ID".to_owned(), "41".to_owned())].into();
    let resolved = Config::load_with_env(None, &env).unwrap();
    assert_eq!(resolved.config.map.master_map_id, Some(41));
}
