//! Cluster facade against real processes and the in-process gateway.

mod common;

use common::FakeGateway;
use std::io::Write;
use std::sync::Arc;
use sync_testkit::cluster::{
    Cluster, ClusterError, ClusterFacade, ClusterNode, CommandProvisioner, LaunchVars, NodeRole, Provisioner,
};
use sync_testkit::config::ClusterTopology;
use sync_testkit::types::ClusterMode;

fn write(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn topology() -> ClusterTopology {
    let file = write(
        r#"{
            "sync_gateways": [{"name": "sg1", "ip": "127.0.0.1"}],
            "sg_accels": [{"name": "ac1", "ip": "127.0.0.2"}],
            "couchbase_servers": [{"name": "cbs1", "ip": "127.0.0.3"}]
        }"#,
    );
    ClusterTopology::from_file(file.path()).unwrap()
}

#[tokio::test]
async fn test_node_info_reads_banner() {
    let gateway = FakeGateway::start(ClusterMode::ChannelCache).await;
    let topology = topology();
    let provisioner: Arc<dyn Provisioner> = Arc::new(CommandProvisioner::new("true"));
    let node = ClusterNode::new(
        "sg1",
        NodeRole::SyncGateway,
        gateway.public_url.clone(),
        gateway.admin_url.clone(),
        LaunchVars::from_topology(&topology),
        provisioner,
    );

    let banner = node.info(&FakeGateway::settings()).await.unwrap();
    assert!(banner.contains("Sync Gateway"));

    drop(gateway);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let err = node.info(&FakeGateway::settings()).await.unwrap_err();
    assert!(matches!(err, ClusterError::Unreachable { ref node, .. } if node == "sg1"));
}

#[tokio::test]
async fn test_reset_with_command_provisioner() {
    let config = write(r#"{"databases": {"db": {"bucket": "data-bucket"}}}"#);
    let mut cluster = Cluster::new(
        &topology(),
        FakeGateway::settings(),
        Arc::new(CommandProvisioner::new("true")),
    );

    let mode = cluster.reset(config.path()).await.unwrap();
    assert_eq!(mode, ClusterMode::ChannelCache);
    assert_eq!(cluster.gateway_config().unwrap().bucket_names(), ["data-bucket"]);
}

#[tokio::test]
async fn test_reset_stops_on_failing_playbook() {
    let config = write(r#"{"databases": {"db": {"bucket": "data-bucket"}}}"#);
    let mut cluster = Cluster::new(
        &topology(),
        FakeGateway::settings(),
        Arc::new(CommandProvisioner::new("false")),
    );

    let err = cluster.reset(config.path()).await.unwrap_err();
    assert!(matches!(err, ClusterError::Provision { ref playbook, .. } if playbook == "stop-sync-gateway"));
    assert!(cluster.gateway_config().is_none());
}

#[tokio::test]
async fn test_node_lifecycle_with_missing_program() {
    let provisioner: Arc<dyn Provisioner> =
        Arc::new(CommandProvisioner::new("/nonexistent/ansible-playbook"));
    let cluster = Cluster::new(&topology(), FakeGateway::settings(), provisioner);

    let err = cluster.sync_gateways()[0].stop().await.unwrap_err();
    assert!(matches!(err, ClusterError::Spawn { .. }));
}
