use tokio::net::TcpListener;

/// Standalone echo server for poking at the client by hand.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("echo server listening on http://{addr}");
    mock_server::run(listener).await
}
