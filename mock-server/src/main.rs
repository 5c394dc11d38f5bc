use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("mock PrintNode API on http://{addr}");
    println!("try: PRINTNODE_API_URL=http://{addr} PRINTNODE_API_KEY=anything");
    mock_server::run(listener).await
}
