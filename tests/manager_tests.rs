//! Tests for the container deployment manager.
//!
//! Drives the full lifecycle against the in-memory runtime: deploy, list,
//! metadata, logs, delete, action enumeration and error translation.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use workload_deploy::constants::{
    LABEL_DEPLOYMENT_TYPE, LABEL_DISPLAY_NAME, LABEL_MANAGED, LABEL_PROJECT_ID,
};
use workload_deploy::{
    BackendConfig, ContainerDeploymentManager, ContainerInfo, ContainerState, DeploymentManager,
    DeploymentStatus, DeploymentType, Endpoint, Error, JobInput, Labels, ManagerConfig,
    MemoryRuntime, Naming, RuntimeHandle, ServiceInput,
};

fn setup_with(runtime: MemoryRuntime) -> (Arc<MemoryRuntime>, ContainerDeploymentManager) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let runtime = Arc::new(runtime);
    let config = ManagerConfig {
        namespace: "workload".to_string(),
        backend: BackendConfig::Memory,
    };
    let manager = ContainerDeploymentManager::new(RuntimeHandle::new(runtime.clone()), &config)
        .expect("valid config");
    (runtime, manager)
}

fn setup() -> (Arc<MemoryRuntime>, ContainerDeploymentManager) {
    setup_with(MemoryRuntime::new())
}

// =============================================================================
// End-to-End Lifecycle
// =============================================================================

#[tokio::test]
async fn test_service_deploy_then_delete() {
    let (runtime, manager) = setup();

    let service = manager
        .deploy_service("proj1", &ServiceInput::new("web", "nginx:latest"), None)
        .await
        .unwrap();

    assert_eq!(service.deployment_id, "web");
    assert_eq!(service.project_id, "proj1");
    assert_eq!(service.display_name, "web");
    assert_eq!(service.deployment_type, DeploymentType::Service);
    assert_eq!(service.status, DeploymentStatus::Running);
    assert_eq!(service.image, "nginx:latest");

    let fetched = manager.get_service_metadata("proj1", "web").await.unwrap();
    assert_eq!(fetched.container_id, service.container_id);

    manager.delete_service("proj1", "web", true).await.unwrap();

    let err = manager.get_service_metadata("proj1", "web").await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {err:?}");
    assert_eq!(runtime.container_count(), 0);
}

#[tokio::test]
async fn test_job_with_invalid_image_leaves_nothing() {
    let (runtime, manager) = setup();

    let err = manager
        .deploy_job("proj1", &JobInput::new("migrate", "Invalid/Image:latest"), None)
        .await
        .unwrap_err();

    assert!(err.is_backend_failure(), "expected BackendFailure, got {err:?}");
    assert!(err.to_string().contains("migrate"), "should name the job");
    assert_eq!(runtime.container_count(), 0);
    assert!(manager.list_jobs("proj1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_job_with_unpullable_image_is_backend_failure() {
    let (runtime, manager) =
        setup_with(MemoryRuntime::new().with_missing_image("ghcr.io/acme/missing:1"));

    let err = manager
        .deploy_job("proj1", &JobInput::new("batch", "ghcr.io/acme/missing:1"), None)
        .await
        .unwrap_err();

    assert!(err.is_backend_failure());
    assert_eq!(runtime.container_count(), 0);
}

#[tokio::test]
async fn test_job_start_failure_is_rolled_back() {
    let (runtime, manager) = setup_with(MemoryRuntime::new().with_failing_start("busybox:broken"));

    let err = manager
        .deploy_job("proj1", &JobInput::new("batch", "busybox:broken"), None)
        .await
        .unwrap_err();

    assert!(err.is_backend_failure());
    assert_eq!(runtime.container_count(), 0, "created container must be removed");

    let err = manager.get_job_metadata("proj1", "batch").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_service_rejection_is_invalid_request() {
    let (runtime, manager) = setup();

    let err = manager
        .deploy_service("proj1", &ServiceInput::new("web", "Nginx:latest"), None)
        .await
        .unwrap_err();

    assert!(err.is_invalid_request(), "expected InvalidRequest, got {err:?}");
    assert!(err.to_string().contains("web"));
    assert_eq!(err.status_code(), 400);
    assert_eq!(runtime.container_count(), 0);
}

#[tokio::test]
async fn test_job_status_follows_exit_code() {
    let (runtime, manager) = setup();

    let ok = manager
        .deploy_job("proj1", &JobInput::new("ok", "busybox"), None)
        .await
        .unwrap();
    let bad = manager
        .deploy_job("proj1", &JobInput::new("bad", "busybox"), None)
        .await
        .unwrap();
    assert_eq!(ok.status, DeploymentStatus::Running);

    runtime.exit_container(&ok.container_id, 0).unwrap();
    runtime.exit_container(&bad.container_id, 2).unwrap();

    let ok = manager.get_job_metadata("proj1", "ok").await.unwrap();
    assert_eq!(ok.status, DeploymentStatus::Succeeded);
    assert_eq!(ok.exit_code, Some(0));

    let bad = manager.get_job_metadata("proj1", "bad").await.unwrap();
    assert_eq!(bad.status, DeploymentStatus::Failed);
    assert_eq!(bad.exit_code, Some(2));
}

#[tokio::test]
async fn test_descriptor_fields_round_trip() {
    let (_runtime, manager) = setup();

    let input = ServiceInput::new("Public API", "ghcr.io/acme/api:v2")
        .with_description("customer-facing REST API")
        .with_endpoint(Endpoint::tcp(8080))
        .with_endpoint(Endpoint::udp(53))
        .with_metadata("team", "payments")
        .with_env("RUST_LOG", "info")
        .with_resources(Some(0.5), Some(256));

    let service = manager.deploy_service("proj1", &input, None).await.unwrap();
    assert_eq!(service.deployment_id, "public-api");
    assert_eq!(service.display_name, "Public API");

    let fetched = manager
        .get_service_metadata("proj1", "public-api")
        .await
        .unwrap();
    assert_eq!(fetched.description.as_deref(), Some("customer-facing REST API"));
    assert_eq!(fetched.endpoints, vec![Endpoint::tcp(8080), Endpoint::udp(53)]);
    assert_eq!(fetched.metadata.get("team").map(String::as_str), Some("payments"));
}

// =============================================================================
// Scoping
// =============================================================================

#[tokio::test]
async fn test_type_filter_isolates_services_and_jobs() {
    let (_runtime, manager) = setup();

    manager
        .deploy_service("proj1", &ServiceInput::new("api", "nginx:latest"), None)
        .await
        .unwrap();

    assert!(manager.get_job_metadata("proj1", "api").await.unwrap_err().is_not_found());
    assert!(manager.delete_job("proj1", "api").await.unwrap_err().is_not_found());
    assert!(manager.list_jobs("proj1").await.unwrap().is_empty());

    // Same id, other type: a separate identity.
    let job = manager
        .deploy_job("proj1", &JobInput::new("api", "busybox"), None)
        .await
        .unwrap();
    assert_eq!(job.deployment_type, DeploymentType::Job);

    let services = manager.list_services("proj1").await;
    let jobs = manager.list_jobs("proj1").await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(jobs.len(), 1);
    assert!(services.iter().all(|s| s.deployment_type == DeploymentType::Service));
    assert!(jobs.iter().all(|j| j.deployment_type == DeploymentType::Job));
}

#[tokio::test]
async fn test_projects_are_isolated() {
    let (runtime, manager) = setup();

    manager
        .deploy_service("team-a", &ServiceInput::new("web", "nginx:latest"), None)
        .await
        .unwrap();
    manager
        .deploy_service("team-b", &ServiceInput::new("web", "nginx:latest"), None)
        .await
        .unwrap();

    assert_eq!(runtime.network_count(), 2, "one network per project");
    assert_eq!(manager.list_services("team-a").await.len(), 1);
    assert!(manager.list_services("team-c").await.is_empty());

    manager.delete_service("team-a", "web", false).await.unwrap();
    assert!(manager.get_service_metadata("team-b", "web").await.is_ok());
}

#[tokio::test]
async fn test_delete_is_not_idempotent() {
    let (_runtime, manager) = setup();

    manager
        .deploy_job("proj1", &JobInput::new("once", "busybox"), None)
        .await
        .unwrap();
    manager.delete_job("proj1", "once").await.unwrap();

    let err = manager.delete_job("proj1", "once").await.unwrap_err();
    match err {
        Error::NotFound { kind, project_id, id } => {
            assert_eq!(kind, DeploymentType::Job);
            assert_eq!(project_id, "proj1");
            assert_eq!(id, "once");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

// =============================================================================
// Volumes
// =============================================================================

#[tokio::test]
async fn test_volumes_are_kept_unless_requested() {
    let (runtime, manager) = setup();
    let input = ServiceInput::new("db", "postgres:16").with_volume("/var/lib/postgresql/data");

    manager.deploy_service("proj1", &input, None).await.unwrap();
    let container = Naming::new("workload").container("proj1", DeploymentType::Service, "db");
    assert_eq!(runtime.volume_names(), vec![format!("{container}-data")]);

    manager.delete_service("proj1", "db", false).await.unwrap();
    assert_eq!(runtime.volume_names().len(), 1, "volume must survive");

    manager.deploy_service("proj1", &input, None).await.unwrap();
    manager.delete_service("proj1", "db", true).await.unwrap();
    assert!(runtime.volume_names().is_empty());
}

#[tokio::test]
async fn test_job_delete_keeps_volumes() {
    let (runtime, manager) = setup();
    let input = JobInput::new("export", "busybox").with_volume("/out");

    manager.deploy_job("proj1", &input, None).await.unwrap();
    manager.delete_job("proj1", "export").await.unwrap();
    let container = Naming::new("workload").container("proj1", DeploymentType::Job, "export");
    assert_eq!(runtime.volume_names(), vec![format!("{container}-data")]);
}

// =============================================================================
// Logs
// =============================================================================

#[tokio::test]
async fn test_logs_tail_and_since() {
    let (runtime, manager) = setup();
    let service = manager
        .deploy_service("proj1", &ServiceInput::new("web", "nginx:latest"), None)
        .await
        .unwrap();

    let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    for i in 0..10 {
        runtime
            .append_log(&service.container_id, base + Duration::seconds(i), &format!("line {i}"))
            .unwrap();
    }

    let tail = manager
        .get_service_logs("proj1", "web", Some(5), None)
        .await
        .unwrap();
    assert_eq!(tail, "line 5\nline 6\nline 7\nline 8\nline 9\n");

    let since = manager
        .get_service_logs("proj1", "web", None, Some(base + Duration::seconds(8)))
        .await
        .unwrap();
    assert_eq!(since, "line 8\nline 9\n");

    let both = manager
        .get_service_logs("proj1", "web", Some(1), Some(base + Duration::seconds(3)))
        .await
        .unwrap();
    assert_eq!(both, "line 9\n");

    let full = manager
        .get_service_logs("proj1", "web", None, None)
        .await
        .unwrap();
    assert_eq!(full.lines().count(), 10);
}

#[tokio::test]
async fn test_logs_of_unknown_job_is_not_found() {
    let (_runtime, manager) = setup();
    let err = manager
        .get_job_logs("proj1", "ghost", Some(5), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// =============================================================================
// Listing Failures
// =============================================================================

#[tokio::test]
async fn test_service_listing_degrades_but_job_listing_fails() {
    let (runtime, manager) = setup();
    manager
        .deploy_service("proj1", &ServiceInput::new("web", "nginx:latest"), None)
        .await
        .unwrap();

    runtime.set_unavailable(true).unwrap();

    assert!(manager.list_services("proj1").await.is_empty());
    let err = manager.list_jobs("proj1").await.unwrap_err();
    assert!(err.is_backend_failure());

    let err = manager.get_service_metadata("proj1", "web").await.unwrap_err();
    assert!(err.is_backend_failure(), "lookup failure is not a NotFound");

    runtime.set_unavailable(false).unwrap();
    assert_eq!(manager.list_services("proj1").await.len(), 1);
}

#[tokio::test]
async fn test_undecodable_containers_are_skipped() {
    let (runtime, manager) = setup();
    manager
        .deploy_service("proj1", &ServiceInput::new("web", "nginx:latest"), None)
        .await
        .unwrap();

    // Carries the listing selector but no deployment id.
    let mut labels = Labels::new();
    labels.insert(LABEL_MANAGED.into(), "true".into());
    labels.insert(LABEL_PROJECT_ID.into(), "proj1".into());
    labels.insert(LABEL_DEPLOYMENT_TYPE.into(), "service".into());
    labels.insert(LABEL_DISPLAY_NAME.into(), "stray".into());
    runtime
        .insert_container(ContainerInfo {
            id: "stray".into(),
            name: "hand-made".into(),
            image: "alpine".into(),
            labels,
            state: ContainerState::Running,
            exit_code: None,
            created_at: Utc::now(),
            volumes: vec![],
        })
        .unwrap();

    let services = manager.list_services("proj1").await;
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].deployment_id, "web");
}

// =============================================================================
// Actions
// =============================================================================

#[tokio::test]
async fn test_actions_are_read_only() {
    let (runtime, manager) = setup();
    let input = ServiceInput::new("web", "nginx:latest");

    let actions = manager
        .list_deploy_service_actions("proj1", &input)
        .await
        .unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_id, "deploy");
    let container = Naming::new("workload").container("proj1", DeploymentType::Service, "web");
    assert!(actions[0].description.contains(&container));
    assert!(actions[0].description.contains("creates project network"));

    assert_eq!(runtime.container_count(), 0);
    assert_eq!(runtime.network_count(), 0);
}

#[tokio::test]
async fn test_replace_action() {
    let (runtime, manager) = setup();
    let input = ServiceInput::new("web", "nginx:1.25").with_volume("/usr/share/nginx/html");
    let first = manager.deploy_service("proj1", &input, None).await.unwrap();

    let actions = manager
        .list_deploy_service_actions("proj1", &input)
        .await
        .unwrap();
    assert_eq!(actions[0].action_id, "replace");
    assert!(actions[0].description.contains("Will replace"));

    // Without the replace action the runtime's name uniqueness wins.
    let err = manager.deploy_service("proj1", &input, None).await.unwrap_err();
    assert!(err.is_invalid_request());

    let upgraded = ServiceInput::new("web", "nginx:1.27").with_volume("/usr/share/nginx/html");
    let second = manager
        .deploy_service("proj1", &upgraded, Some("replace"))
        .await
        .unwrap();

    assert_ne!(first.container_id, second.container_id);
    assert_eq!(second.image, "nginx:1.27");
    assert_eq!(runtime.container_count(), 1);
    assert_eq!(runtime.volume_names().len(), 1, "replacement keeps data");
}

#[tokio::test]
async fn test_duplicate_job_without_replace_is_backend_failure() {
    let (_runtime, manager) = setup();
    let input = JobInput::new("batch", "busybox");
    manager.deploy_job("proj1", &input, None).await.unwrap();

    let err = manager.deploy_job("proj1", &input, Some("deploy")).await.unwrap_err();
    assert!(err.is_backend_failure());

    let actions = manager.list_deploy_job_actions("proj1", &input).await.unwrap();
    assert_eq!(actions[0].action_id, "replace");
    manager.deploy_job("proj1", &input, Some("replace")).await.unwrap();
}

#[tokio::test]
async fn test_overlapping_project_ids_do_not_block_each_other() {
    let (runtime, manager) = setup();

    manager
        .deploy_service("acme", &ServiceInput::new("Service Web", "nginx"), None)
        .await
        .unwrap();

    let web = ServiceInput::new("web", "nginx");
    let actions = manager
        .list_deploy_service_actions("acme-service", &web)
        .await
        .unwrap();
    assert_eq!(actions[0].action_id, "deploy");
    manager.deploy_service("acme-service", &web, None).await.unwrap();

    manager
        .deploy_service("a", &ServiceInput::new("job b", "nginx"), None)
        .await
        .unwrap();
    let b = JobInput::new("b", "busybox");
    manager.deploy_job("a-service", &b, None).await.unwrap();
    manager.deploy_job("a-service", &b, Some("replace")).await.unwrap();

    assert_eq!(runtime.container_count(), 4);
    assert_eq!(manager.list_services("acme").await.len(), 1);
    assert_eq!(manager.list_services("acme-service").await.len(), 1);
    assert_eq!(manager.list_jobs("a-service").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_action_id_rejected_before_side_effects() {
    let (runtime, manager) = setup();
    let err = manager
        .deploy_service("proj1", &ServiceInput::new("web", "nginx:latest"), Some("rollout"))
        .await
        .unwrap_err();

    assert!(err.is_invalid_request());
    assert_eq!(runtime.network_count(), 0);
    assert_eq!(runtime.container_count(), 0);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_descriptors_are_rejected_for_both_types() {
    let (runtime, manager) = setup();

    let cases = [
        ServiceInput::new("", "nginx:latest"),
        ServiceInput::new("---", "nginx:latest"),
        ServiceInput::new("web", ""),
        ServiceInput::new("web", "nginx latest"),
        ServiceInput::new("web", "nginx").with_resources(Some(0.0), None),
        ServiceInput::new("web", "nginx").with_resources(None, Some(1)),
        ServiceInput::new("web", "nginx").with_volume("relative/path"),
        ServiceInput::new("web", "nginx").with_env("BAD=KEY", "x"),
        ServiceInput::new("web", "nginx").with_metadata("bad key", "x"),
    ];

    for input in &cases {
        let err = manager.deploy_service("proj1", input, None).await.unwrap_err();
        assert!(err.is_invalid_request(), "service {input:?}: {err:?}");

        let err = manager.deploy_job("proj1", input, None).await.unwrap_err();
        assert!(err.is_invalid_request(), "job {input:?}: {err:?}");
    }

    let err = manager
        .deploy_job("", &JobInput::new("batch", "busybox"), None)
        .await
        .unwrap_err();
    assert!(err.is_invalid_request());

    assert_eq!(runtime.container_count(), 0);
    assert_eq!(runtime.network_count(), 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_first_deploys_share_one_network() {
    let (runtime, manager) = setup();
    let web = ServiceInput::new("web", "nginx:latest");
    let worker = JobInput::new("worker", "busybox");

    let (a, b) = tokio::join!(
        manager.deploy_service("proj1", &web, None),
        manager.deploy_job("proj1", &worker, None),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(runtime.network_count(), 1);
    assert_eq!(runtime.container_count(), 2);
}
