//! The blocking facade runs the same reconciliation and batching code as the
//! async one; these tests drive it without any runtime.

mod integration;

use integration::mock_service::MockService;
use select_ai_rust::prelude::*;
use select_ai_rust::{sql, SelectAiConfig};
use serde_json::json;
use std::sync::Arc;

fn connection(service: &Arc<MockService>) -> BlockingConnection {
    // tiny chunks force many reads per large object
    Connection::builder()
        .lob_chunk_size(3)
        .build_blocking(service.clone())
        .unwrap()
}

fn attributes() -> ProfileAttributes {
    ProfileAttributes {
        credential_name: Some("GENAI_CRED".into()),
        object_list: Some(vec![json!({"owner": "SH", "name": "CUSTOMERS"})
            .as_object()
            .cloned()
            .unwrap()]),
        provider: Some(
            ProviderAttributes::new(Provider::Aws)
                .with_region("us-east-1")
                .with_model("anthropic.claude-v2"),
        ),
        ..Default::default()
    }
}

#[test]
fn test_profile_lifecycle() {
    integration::init_tracing();
    let service = MockService::new();
    let conn = connection(&service);

    let mut profile = Profile::open(
        &conn,
        ProfileOptions::named("bedrock_ai").with_attributes(attributes()),
    )
    .unwrap();
    assert_eq!(profile.state(), ResourceState::Persisted);
    assert_eq!(
        service.profile_attributes("BEDROCK_AI").unwrap().get("provider_endpoint"),
        Some(&json!("bedrock-runtime.us-east-1.amazonaws.com"))
    );

    let fetched = Profile::fetch(&conn, "bedrock_ai").unwrap();
    let stored = fetched.attributes().unwrap();
    assert_eq!(stored.credential_name.as_deref(), Some("GENAI_CRED"));
    assert_eq!(stored.object_list, attributes().object_list);
    assert_eq!(stored.provider, attributes().provider);

    profile.set_attribute("max_tokens", 256).unwrap();
    assert_eq!(profile.get_attributes().unwrap().max_tokens, Some(256));

    let err = Profile::open(
        &conn,
        ProfileOptions::named("bedrock_ai").with_attributes(attributes()),
    )
    .unwrap_err();
    assert!(err.is_already_exists());

    profile.drop(false).unwrap();
    assert!(matches!(
        Profile::fetch(&conn, "bedrock_ai"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_generation_drains_readers() {
    let service = MockService::new();
    let conn = connection(&service);
    let profile = Profile::open(
        &conn,
        ProfileOptions::named("bedrock_ai").with_attributes(attributes()),
    )
    .unwrap();

    assert_eq!(
        profile.explain_sql("Which customers bought the most?").unwrap().as_deref(),
        Some("explainsql:Which customers bought the most?")
    );
    assert_eq!(
        profile.show_prompt("ventes par région").unwrap().as_deref(),
        Some("showprompt:ventes par région")
    );
    assert_eq!(profile.run_sql("count").unwrap().len(), 1);
}

#[test]
fn test_pipeline_matches_async_semantics() {
    let service = MockService::new();
    service.set_reverse_outcomes(true);
    let conn = connection(&service);
    let profile = Profile::open(
        &conn,
        ProfileOptions::named("bedrock_ai").with_attributes(attributes()),
    )
    .unwrap();
    service.clear_log();

    let requests: Vec<PipelineRequest> = (0..20)
        .map(|i| {
            let prompt = if i == 7 { "FAIL seven".to_string() } else { format!("q{}", i) };
            PipelineRequest::new(prompt, Action::Chat)
        })
        .collect();

    let results = profile.run_pipeline(requests.clone(), true).unwrap();
    assert_eq!(results.len(), 20);
    assert!(results.get(7).unwrap().is_err());
    assert_eq!(
        results.get(19).unwrap().as_ref().unwrap().as_deref(),
        Some("chat:q19")
    );
    assert_eq!(service.pipeline_sizes(), vec![20]);

    let err = profile.run_pipeline(requests, false).unwrap_err();
    assert!(matches!(err, Error::Remote(_)));
}

#[test]
fn test_vector_index_and_listing() {
    let service = MockService::new();
    let conn = connection(&service);
    let profile = Profile::open(
        &conn,
        ProfileOptions::named("bedrock_ai").with_attributes(attributes()),
    )
    .unwrap();

    let mut index = profile
        .create_vector_index(
            "kb_idx",
            VectorIndexAttributes {
                location: Some("https://objectstorage.example.com/b/kb".into()),
                ..Default::default()
            },
            None,
            false,
        )
        .unwrap();
    index.disable().unwrap();
    assert!(!service.index_enabled("KB_IDX"));

    let owned: Vec<VectorIndex> = profile
        .list_vector_indexes(Some("kb"))
        .unwrap()
        .collect::<select_ai_rust::Result<_>>()
        .unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].name(), Some("KB_IDX"));

    let profiles: Vec<Profile> = Profile::list(&conn, Some("bedrock"))
        .collect::<select_ai_rust::Result<_>>()
        .unwrap();
    assert_eq!(profiles.len(), 1);

    index.drop(true).unwrap();
    assert!(service.index_attributes("KB_IDX").is_none());
}

#[test]
fn test_conversation_and_session() {
    let service = MockService::new();
    let conn = connection(&service);
    let profile = Profile::open(
        &conn,
        ProfileOptions::named("bedrock_ai").with_attributes(attributes()),
    )
    .unwrap();

    let mut conversation = Conversation::new(&conn, ConversationAttributes::titled("Blocking chat"));
    let id = conversation.create().unwrap();
    let session = Session::with_conversation(&profile, id.clone());
    assert_eq!(
        session.chat("hello").unwrap(),
        Some(format!("chat[{}]:hello", id))
    );

    let listed: Vec<Conversation> = Conversation::list(&conn, Some("blocking"))
        .collect::<select_ai_rust::Result<_>>()
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id(), Some(id.as_str()));

    conversation.drop(false).unwrap();
    assert!(service.calls_named(sql::DROP_CONVERSATION).len() == 1);
}

#[test]
fn test_config_from_yaml_applies_to_connection() {
    let config = SelectAiConfig::from_yaml_str(
        "lob_chunk_size: 16\ndefault_list_pattern: \"^B\"\nmax_pipeline_requests: 4\n",
    )
    .unwrap();
    let service = MockService::new();
    service.seed_profile("BEDROCK_AI", json!({"provider": "aws", "region": "eu-west-1"}), None);
    service.seed_profile("OTHER_AI", json!({"provider": "oci"}), None);
    let conn = Connection::builder()
        .config(config)
        .build_blocking(service.clone())
        .unwrap();

    assert_eq!(conn.config().lob_chunk_size, 16);
    let listed: Vec<Profile> = Profile::list(&conn, None)
        .collect::<select_ai_rust::Result<_>>()
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(
        listed[0]
            .attributes()
            .and_then(|a| a.provider.as_ref())
            .and_then(|p| p.provider_endpoint.clone())
            .as_deref(),
        Some("bedrock-runtime.eu-west-1.amazonaws.com")
    );

    let profile = listed.into_iter().next().unwrap();
    let too_many: Vec<PipelineRequest> = (0..5)
        .map(|i| PipelineRequest::new(format!("q{}", i), Action::Chat))
        .collect();
    assert!(matches!(
        profile.run_pipeline(too_many, true),
        Err(Error::Validation { .. })
    ));
}
