/* demos/demo.rs */

use clientip::trust::{trust_ips, trust_private};
use clientip::{ClientIpDetector, RequestMeta};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Client IP Detection Examples ===\n");

    // Example 1: Connection peer address only
    example_1_remote_addr();

    // Example 2: Trusted header set by the edge proxy
    example_2_trusted_header();

    // Example 3: X-Forwarded-For through trusted proxies
    example_3_forwarded_chain();

    // Example 4: Spoofing attempt from a direct client
    example_4_spoofing();

    // Example 5: Custom detector
    example_5_custom_detector();

    println!("=== All examples completed! ===");
}

fn show(detector: &ClientIpDetector, meta: &RequestMeta) {
    match detector.detect(meta) {
        Some(ip) => println!("Detected IP: {}", ip),
        None => println!("No IP detected"),
    }
}

fn example_1_remote_addr() {
    println!("Example 1: Connection peer address");

    let detector = ClientIpDetector::new();
    show(&detector, &RequestMeta::new().with_remote_addr("203.0.113.45:52311"));
    show(&detector, &RequestMeta::new().with_remote_addr("not an address"));
    println!();
}

fn example_2_trusted_header() {
    println!("Example 2: Trusted X-Real-IP header");

    let detector = ClientIpDetector::new().with_trusted_header("X-Real-IP");
    let meta = RequestMeta::new()
        .with_remote_addr("10.0.0.2:40000")
        .with_header("X-Real-IP", "198.51.100.42");
    show(&detector, &meta);
    println!();
}

fn example_3_forwarded_chain() {
    println!("Example 3: X-Forwarded-For through trusted proxies");

    let detector = ClientIpDetector::new().with_xff(trust_private());
    let meta = RequestMeta::new()
        .with_remote_addr("10.0.0.5:40000")
        .with_header("X-Forwarded-For", "192.0.2.1, 203.0.113.1, 10.0.0.9");
    // 10.0.0.9 is a private proxy, 203.0.113.1 is the first hop we cannot vouch for.
    show(&detector, &meta);
    println!();
}

fn example_4_spoofing() {
    println!("Example 4: Direct client sending X-Forwarded-For");

    let detector =
        ClientIpDetector::new().with_xff(trust_ips(["10.0.0.5".parse().unwrap()]));
    let meta = RequestMeta::new()
        .with_remote_addr("198.51.100.7:51000")
        .with_header("X-Forwarded-For", "1.2.3.4");
    // The header is ignored, the peer address wins.
    show(&detector, &meta);
    println!();
}

fn example_5_custom_detector() {
    println!("Example 5: Custom detector");

    let detector = ClientIpDetector::new().with_detector(|meta: &RequestMeta| {
        meta.header("CF-Connecting-IP")
            .and_then(|value| clientip::parse_ip(value).ok())
    });
    let meta = RequestMeta::new()
        .with_remote_addr("10.0.0.5:40000")
        .with_header("CF-Connecting-IP", "192.0.2.100");
    show(&detector, &meta);
    println!();
}
