/* demos/axum.rs */

use axum::{Router, extract::Request, response::Json, routing::get};
use clientip::trust::trust_private;
use clientip::{ClientIp, ClientIpLayer};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = create_app();
    let listener = match tokio::net::TcpListener::bind("0.0.0.0:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Failed to bind 0.0.0.0:3000: {err}");
            return;
        }
    };

    println!("Server starting on http://localhost:3000");
    println!("Test endpoints:");
    println!("  • GET /ip      - detected client IP (peer, X-Real-IP, X-Forwarded-For)");
    println!("  • GET /strict  - same, rejecting requests without a client IP");
    println!();
    println!("Test with headers:");
    println!("  curl -H 'X-Forwarded-For: 198.51.100.1, 10.0.0.3' http://localhost:3000/ip");
    println!("  curl -H 'X-Real-IP: 203.0.113.42' http://localhost:3000/ip");
    println!();

    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        eprintln!("Server error: {err}");
    }
}

#[derive(Clone, Copy)]
struct DetectedBy(&'static str);

fn create_app() -> Router {
    let layer = ClientIpLayer::new()
        .with_trusted_header_detector("X-Real-IP")
        .with_xff_detector(trust_private())
        .with_callback(|mut req: Request, ip: Option<IpAddr>| {
            let source = if ip.is_some() { "detected" } else { "undetermined" };
            req.extensions_mut().insert(DetectedBy(source));
            req
        });

    let open = Router::new().route("/", get(ip_handler)).layer(layer);

    let strict = Router::new()
        .route("/", get(strict_handler))
        .layer(ClientIpLayer::new().with_xff_detector(trust_private()).reject_undetermined());

    Router::new().nest("/ip", open).nest("/strict", strict)
}

async fn ip_handler(
    client_ip: Option<ClientIp>,
    axum::Extension(DetectedBy(source)): axum::Extension<DetectedBy>,
) -> Json<serde_json::Value> {
    Json(json!({
        "client_ip": client_ip.map(|ip| ip.ip().to_string()),
        "status": source,
    }))
}

async fn strict_handler(ClientIp(ip): ClientIp) -> Json<serde_json::Value> {
    Json(json!({
        "client_ip": ip.to_string(),
        "ip_version": match ip {
            IpAddr::V4(_) => "IPv4",
            IpAddr::V6(_) => "IPv6",
        },
    }))
}
