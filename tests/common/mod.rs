//! Shared utilities for integration tests.

use std::sync::Arc;
use tokio::task::JoinHandle;

use rtb_bidder::config::{BidderConfig, ListenerConfig};
use rtb_bidder::interceptor::Registries;
use rtb_bidder::routing::Feature;
use rtb_bidder::{BidderApp, HttpServer, Shutdown};

/// A running bidder on fixed local ports.
pub struct TestBidder {
    pub app: Arc<BidderApp>,
    pub bidder_url: String,
    pub admin_url: String,
    shutdown: Shutdown,
    server: JoinHandle<std::io::Result<()>>,
}

impl TestBidder {
    /// Stop accepting, drain, then stop the controllers.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.server.await.unwrap().unwrap();
        let app = Arc::clone(&self.app);
        tokio::task::spawn_blocking(move || app.shutdown()).await.unwrap();
    }
}

/// Config with a traffic listener and an admin listener on the given ports.
pub fn config(bidder_port: u16, admin_port: u16) -> BidderConfig {
    let mut config = BidderConfig::default();
    config.listeners = vec![
        ListenerConfig {
            name: "bidder".into(),
            bind_address: format!("127.0.0.1:{}", bidder_port),
            features: vec![
                Feature::Bid,
                Feature::Impression,
                Feature::Click,
                Feature::Match,
                Feature::Other,
            ],
        },
        ListenerConfig {
            name: "admin".into(),
            bind_address: format!("127.0.0.1:{}", admin_port),
            features: vec![Feature::Admin],
        },
    ];
    config
}

/// Build, start and serve a bidder.
pub async fn start_bidder(config: BidderConfig, registries: Registries) -> TestBidder {
    let bidder_url = format!("http://{}", config.listeners[0].bind_address);
    let admin_url = format!("http://{}", config.listeners[1].bind_address);

    let app = Arc::new(BidderApp::from_config(config, &registries).unwrap());
    let starting = Arc::clone(&app);
    tokio::task::spawn_blocking(move || starting.start())
        .await
        .unwrap()
        .unwrap();

    let server = HttpServer::bind(app.router(), app.config()).await.unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(server.run(shutdown.clone()));

    TestBidder {
        app,
        bidder_url,
        admin_url,
        shutdown,
        server,
    }
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
