// Own test binary: the abandoned capture keeps the process-global sampler busy
// after the runtime is gone.

use pprof_samples::debug_server::DebugServer;
use pprof_samples::runtime::block_on_detached;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[test]
fn test_running_capture_does_not_delay_shutdown() {
    let start = Instant::now();

    block_on_detached(async {
        let server = DebugServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"GET /debug/pprof/profile?seconds=5 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();

        // Let the capture reach the blocking pool
        tokio::time::sleep(Duration::from_millis(300)).await;
    })
    .unwrap();

    assert!(
        start.elapsed() < Duration::from_secs(3),
        "shutdown waited {:?} for the capture",
        start.elapsed()
    );
}
