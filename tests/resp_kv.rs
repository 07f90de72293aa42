//! End-to-end RESP wire scenarios driven over a real TCP connection: PING,
//! create/use/set/get, DROP protecting the caller's current bucket, KEYS
//! prefix ordering, and the unknown-subcommand error shape.

use std::time::Duration;

use databuddy::{BucketRegistry, ServerConfig};
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Initializes a data directory, starts `serve()` on ephemeral ports, and
/// waits for the RESP listener to accept connections.
async fn start_server() -> (u16, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700)).unwrap();
    }
    BucketRegistry::init(dir.path(), "default").unwrap();

    let port = free_port();
    let config = ServerConfig {
        datadir: dir.path().to_path_buf(),
        port,
        gossip_port: free_port(),
        ..Default::default()
    };

    tokio::spawn(databuddy::serve(config));

    for _ in 0..200 {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    (port, dir)
}

async fn roundtrip(stream: &mut TcpStream, request: &str) -> String {
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[tokio::test]
async fn ping_returns_pong() {
    let (port, _dir) = start_server().await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    let reply = roundtrip(&mut stream, "*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(reply, "+PONG\r\n");
}

#[tokio::test]
async fn create_use_set_get() {
    let (port, _dir) = start_server().await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    assert_eq!(
        roundtrip(&mut stream, "BUCKET CREATE users\r\n").await,
        "+OK\r\n"
    );
    assert_eq!(
        roundtrip(&mut stream, "BUCKET USE users\r\n").await,
        "+OK\r\n"
    );
    assert_eq!(
        roundtrip(&mut stream, "SET alice 30\r\n").await,
        "+OK\r\n"
    );
    assert_eq!(roundtrip(&mut stream, "GET alice\r\n").await, "$2\r\n30\r\n");
}

#[tokio::test]
async fn drop_protects_current_bucket() {
    let (port, _dir) = start_server().await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    assert_eq!(
        roundtrip(&mut stream, "BUCKET USE default\r\n").await,
        "+OK bucket already used\r\n"
    );
    assert_eq!(
        roundtrip(&mut stream, "BUCKET DROP default other\r\n").await,
        ":0\r\n"
    );
    let list = roundtrip(&mut stream, "BUCKET LIST\r\n").await;
    assert!(list.contains("default"));
}

#[tokio::test]
async fn keys_prefix_ordering() {
    let (port, _dir) = start_server().await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    for key in ["a", "aa", "ab", "b"] {
        assert_eq!(
            roundtrip(&mut stream, &format!("SET {key} v\r\n")).await,
            "+OK\r\n"
        );
    }

    let reply = roundtrip(&mut stream, "KEYS a\r\n").await;
    assert_eq!(
        reply,
        "*3\r\n$1\r\na\r\n$2\r\naa\r\n$2\r\nab\r\n"
    );

    let reply = roundtrip(&mut stream, "KEYS\r\n").await;
    assert!(reply.starts_with("*4\r\n"));
}

#[tokio::test]
async fn unknown_subcommand_error() {
    let (port, _dir) = start_server().await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    let reply = roundtrip(&mut stream, "BUCKET FROBNICATE x\r\n").await;
    assert_eq!(reply, "-ERR unknown command 'bucket frobnicate'\r\n");
}

#[tokio::test]
async fn session_bucket_selection_is_isolated_per_connection() {
    let (port, _dir) = start_server().await;
    let mut a = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut b = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    assert_eq!(
        roundtrip(&mut a, "BUCKET CREATE scratch\r\n").await,
        "+OK\r\n"
    );
    assert_eq!(roundtrip(&mut a, "BUCKET USE scratch\r\n").await, "+OK\r\n");

    assert_eq!(roundtrip(&mut b, "BUCKET\r\n").await, "+default\r\n");
    assert_eq!(roundtrip(&mut a, "BUCKET\r\n").await, "+scratch\r\n");
}
