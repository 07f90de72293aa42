//! Cluster membership client properties: node ID stability and the
//! single-node `CLUSTER PEERS` shape.

use databuddy::cluster::{ClusterClient, PROTOCOL_VERSION, ROLE_TAG};
use databuddy::ServerConfig;

fn free_port() -> u16 {
    std::net::UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn test_config() -> ServerConfig {
    ServerConfig {
        gossip_host: "127.0.0.1".to_string(),
        gossip_port: free_port(),
        ..Default::default()
    }
}

#[tokio::test]
async fn single_node_cluster_reports_one_member() {
    let client = ClusterClient::start(&test_config()).await.unwrap();
    assert_eq!(client.num_nodes(), 1);
    assert_eq!(client.members().len(), 1);
}

#[tokio::test]
async fn self_member_carries_role_tag_and_protocol_version() {
    let client = ClusterClient::start(&test_config()).await.unwrap();
    let members = client.members();
    let me = &members[0];

    assert_eq!(me.status, "alive");
    assert_eq!(me.protocol_version, PROTOCOL_VERSION);
    assert_eq!(me.tags.get("role"), Some(&ROLE_TAG.to_string()));
    assert_eq!(me.address, client.local_identity().addr.to_string());
}

#[tokio::test]
async fn node_id_is_stable_for_fixed_hostname_and_address() {
    let config = test_config();
    let a = ClusterClient::start(&config).await.unwrap();

    // Re-deriving the identity for the same (hostname, gossip address) pair
    // must produce the same node ID, independent of process lifetime.
    let hostname = hostname::get().unwrap().to_string_lossy().into_owned();
    let expected = databuddy::NodeId::derive(&hostname, &config.gossip_addr());
    assert_eq!(a.local_identity().id, expected);
}

#[tokio::test]
async fn leave_succeeds_on_freshly_started_client() {
    let client = ClusterClient::start(&test_config()).await.unwrap();
    assert!(client.leave().await.is_ok());
}
