//! Tests for the label codec.
//!
//! The label set is the only record of platform identity, so these tests pin
//! the encode/decode contract and the selectors built on it.

use chrono::Utc;
use std::collections::BTreeMap;
use workload_deploy::constants::{
    LABEL_DEPLOYMENT_ID, LABEL_DEPLOYMENT_TYPE, LABEL_DESCRIPTION, LABEL_ENDPOINTS,
    LABEL_MANAGED, LABEL_METADATA_PREFIX, LABEL_PROJECT_ID,
};
use workload_deploy::labels::{
    self, decode_all, identity_selector, network_labels, project_selector, to_deployment,
};
use workload_deploy::{
    ContainerInfo, ContainerState, DeploymentLabels, DeploymentStatus, DeploymentType, Endpoint,
    LabelError, Labels, ServiceInput, runtime::matches_selector,
};

fn full_labels() -> DeploymentLabels {
    let mut metadata = BTreeMap::new();
    metadata.insert("team".to_string(), "payments".to_string());
    metadata.insert("tier.level".to_string(), "gold".to_string());

    DeploymentLabels {
        project_id: "Team Alpha/prod".into(),
        deployment_id: "public-api".into(),
        deployment_type: DeploymentType::Service,
        display_name: "Public API".into(),
        description: Some("edge, with commas, and = signs".into()),
        endpoints: vec![Endpoint::tcp(8080), Endpoint::udp(53)],
        metadata,
    }
}

fn container(labels: Labels, state: ContainerState, exit_code: Option<i32>) -> ContainerInfo {
    ContainerInfo {
        id: "c0ffee".into(),
        name: "workload-x".into(),
        image: "nginx:latest".into(),
        labels,
        state,
        exit_code,
        created_at: Utc::now(),
        volumes: vec![],
    }
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_decode_inverts_encode() {
    let original = full_labels();
    let decoded = DeploymentLabels::decode(&original.encode()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_decode_inverts_encode_for_jobs_without_optionals() {
    let original = DeploymentLabels {
        project_id: "p".into(),
        deployment_id: "nightly".into(),
        deployment_type: DeploymentType::Job,
        display_name: "nightly".into(),
        description: None,
        endpoints: vec![],
        metadata: BTreeMap::new(),
    };
    assert_eq!(DeploymentLabels::decode(&original.encode()).unwrap(), original);
}

#[test]
fn test_from_input_derives_identity() {
    let input = ServiceInput::new("Public API", "nginx").with_metadata("team", "payments");
    let labels = DeploymentLabels::from_input("proj1", DeploymentType::Service, &input).unwrap();

    assert_eq!(labels.deployment_id, "public-api");
    assert_eq!(labels.project_id, "proj1");
    assert_eq!(labels.display_name, "Public API");
    assert_eq!(labels.metadata["team"], "payments");
}

#[test]
fn test_encoding_layout() {
    let encoded = full_labels().encode();
    assert_eq!(encoded[LABEL_MANAGED], "true");
    assert_eq!(encoded[LABEL_PROJECT_ID], "Team Alpha/prod");
    assert_eq!(encoded[LABEL_DEPLOYMENT_TYPE], "service");
    assert_eq!(encoded[LABEL_DEPLOYMENT_ID], "public-api");
    assert_eq!(encoded[LABEL_ENDPOINTS], "8080/tcp,53/udp");
    assert_eq!(encoded[LABEL_DESCRIPTION], "edge, with commas, and = signs");
    assert_eq!(encoded[&format!("{LABEL_METADATA_PREFIX}team")], "payments");
}

// =============================================================================
// Rejection
// =============================================================================

#[test]
fn test_each_required_key_is_enforced() {
    for key in [LABEL_PROJECT_ID, LABEL_DEPLOYMENT_ID, LABEL_DEPLOYMENT_TYPE] {
        let mut encoded = full_labels().encode();
        encoded.remove(key);
        assert_eq!(
            DeploymentLabels::decode(&encoded),
            Err(LabelError::Missing(key)),
            "removing {key} must fail decoding"
        );
    }
}

#[test]
fn test_malformed_endpoints_rejected() {
    let mut encoded = full_labels().encode();
    encoded.insert(LABEL_ENDPOINTS.into(), "8080/tcp,nope".into());
    assert!(matches!(
        DeploymentLabels::decode(&encoded),
        Err(LabelError::Invalid { key, .. }) if key == LABEL_ENDPOINTS
    ));
}

#[test]
fn test_foreign_labels_are_ignored() {
    let mut encoded = full_labels().encode();
    encoded.insert("com.docker.compose.project".into(), "other".into());
    encoded.insert("maintainer".into(), "someone".into());
    assert_eq!(DeploymentLabels::decode(&encoded).unwrap(), full_labels());
}

// =============================================================================
// Selectors
// =============================================================================

#[test]
fn test_selectors_match_encoded_labels() {
    let encoded = full_labels().encode();

    assert!(matches_selector(
        &encoded,
        &project_selector("Team Alpha/prod", DeploymentType::Service)
    ));
    assert!(matches_selector(
        &encoded,
        &identity_selector("Team Alpha/prod", DeploymentType::Service, "public-api")
    ));

    assert!(!matches_selector(
        &encoded,
        &project_selector("Team Alpha/prod", DeploymentType::Job)
    ));
    assert!(!matches_selector(
        &encoded,
        &project_selector("Team Alpha", DeploymentType::Service)
    ));
    assert!(!matches_selector(
        &encoded,
        &identity_selector("Team Alpha/prod", DeploymentType::Service, "public")
    ));
}

#[test]
fn test_network_labels_carry_project() {
    let labels = network_labels("proj1");
    assert_eq!(labels[LABEL_PROJECT_ID], "proj1");
    assert_eq!(labels[LABEL_MANAGED], "true");
    assert!(!labels.contains_key(LABEL_DEPLOYMENT_TYPE));
}

// =============================================================================
// Domain Mapping
// =============================================================================

#[test]
fn test_to_deployment_combines_labels_and_state() {
    let info = container(full_labels().encode(), ContainerState::Running, None);
    let deployment = to_deployment(&info).unwrap();

    assert_eq!(deployment.deployment_id, "public-api");
    assert_eq!(deployment.project_id, "Team Alpha/prod");
    assert_eq!(deployment.status, DeploymentStatus::Running);
    assert_eq!(deployment.container_id, "c0ffee");
    assert_eq!(deployment.image, "nginx:latest");
}

#[test]
fn test_decode_all_skips_broken_containers() {
    let good = container(full_labels().encode(), ContainerState::Exited, Some(1));
    let mut broken = full_labels().encode();
    broken.remove(LABEL_DEPLOYMENT_ID);
    let bad = container(broken, ContainerState::Running, None);
    let foreign = container(Labels::new(), ContainerState::Running, None);

    let decoded = decode_all(&[bad, good, foreign]);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].status, DeploymentStatus::Failed);
    assert!(labels::to_deployment(&container(Labels::new(), ContainerState::Running, None)).is_err());
}
