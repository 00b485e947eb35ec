//! End-to-end tests: real listeners, real HTTP, configured interceptors.

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

use rtb_bidder::interceptor::{
    BidChain, ClickChain, InterceptError, Interceptor, MatchChain, Registries,
};
use rtb_bidder::model::{
    Bid, BidRequest, BidResponse, ClickRequest, ClickResponse, MatchRequest, MatchResponse,
    UserRequest,
};
use rtb_bidder::price::PriceCodec;
use rtb_bidder::receiver::impression::PIXEL;

mod common;

/// Bids 1.5 on every impression of the auction.
struct FlatBidder;

impl Interceptor<BidRequest, BidResponse> for FlatBidder {
    fn execute(&self, chain: &mut BidChain<'_>) -> Result<(), InterceptError> {
        let ids: Vec<String> = chain.request().impression_ids().map(String::from).collect();
        for id in ids {
            chain.response_mut().add_bid(
                Bid::new(id, 1.5)
                    .with_size(300, 250)
                    .with_adm("<img src=\"${OB_IMPRESSION_URL}?w=${OB_AD_WIDTH}\">"),
            );
        }
        chain.proceed()
    }
}

struct Landing;

impl Interceptor<ClickRequest, ClickResponse> for Landing {
    fn execute(&self, chain: &mut ClickChain<'_>) -> Result<(), InterceptError> {
        if let Some(target) = chain.request().http_request().parameter("to") {
            let target = target.to_string();
            chain.response_mut().set_redirect_location(target);
        }
        chain.proceed()
    }
}

struct Syncer;

impl Interceptor<MatchRequest, MatchResponse> for Syncer {
    fn execute(&self, chain: &mut MatchChain<'_>) -> Result<(), InterceptError> {
        chain
            .response_mut()
            .set_redirect_location("http://exchange.example/sync")
            .put_redirect_parameter("uid", "u-42");
        chain.proceed()
    }
}

fn registries() -> Registries {
    let mut registries = Registries::default();
    registries.bid.register("flat", || {
        Ok(Arc::new(FlatBidder) as Arc<dyn Interceptor<BidRequest, BidResponse>>)
    });
    registries.click.register("landing", || {
        Ok(Arc::new(Landing) as Arc<dyn Interceptor<ClickRequest, ClickResponse>>)
    });
    registries.matching.register("sync", || {
        Ok(Arc::new(Syncer) as Arc<dyn Interceptor<MatchRequest, MatchResponse>>)
    });
    registries
}

#[tokio::test]
async fn test_bid_round_trip() {
    let mut config = common::config(18301, 18302);
    config.bid.interceptors = vec!["trace".into(), "flat".into()];
    config.callbacks.callback_url = Some("http://bidder.example".into());
    config.callbacks.impression_url = Some("${OB_CALLBACK_URL}/impression".into());
    let bidder = common::start_bidder(config, registries()).await;
    let client = common::client();

    let res = client
        .post(format!("{}/bid", bidder.bidder_url))
        .json(&json!({ "id": "auction-1", "imp": [{ "id": "1" }, { "id": "2" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], "auction-1");
    let bids = body["seatbid"][0]["bid"].as_array().unwrap();
    assert_eq!(bids.len(), 2);
    assert_eq!(
        bids[0]["adm"],
        "<img src=\"http://bidder.example/impression?w=300\">"
    );

    // no impressions, no bids
    let res = client
        .post(format!("{}/bid", bidder.bidder_url))
        .json(&json!({ "id": "auction-2", "imp": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .post(format!("{}/bid", bidder.bidder_url))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(bidder.app.bid_controller().interceptor_names(), vec!["trace", "flat"]);
    bidder.stop().await;
}

#[tokio::test]
async fn test_impression_pixel_with_encrypted_price() {
    let mut config = common::config(18311, 18312);
    // 32 zero bytes and 32 0x01 bytes, base64
    config.price.encryption_key = Some("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".into());
    config.price.integrity_key = Some("AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=".into());
    let codec = PriceCodec::from_base64(
        config.price.encryption_key.as_deref().unwrap(),
        config.price.integrity_key.as_deref().unwrap(),
    )
    .unwrap();
    let bidder = common::start_bidder(config, registries()).await;

    let token = codec.encode(0.75).unwrap();
    let res = common::client()
        .get(format!("{}/impression?price={}", bidder.bidder_url, token))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/gif");
    assert_eq!(res.bytes().await.unwrap().as_ref(), PIXEL);

    bidder.stop().await;
}

#[tokio::test]
async fn test_click_and_match_redirects() {
    let mut config = common::config(18321, 18322);
    config.click.interceptors = vec!["landing".into()];
    config.matching.interceptors = vec!["sync".into()];
    let bidder = common::start_bidder(config, registries()).await;
    let client = common::client();

    let res = client
        .get(format!("{}/click?to=http://advertiser.example/", bidder.bidder_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()["location"], "http://advertiser.example/");

    let res = client
        .get(format!("{}/click", bidder.bidder_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/match", bidder.bidder_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()["location"], "http://exchange.example/sync?uid=u-42");

    bidder.stop().await;
}

#[tokio::test]
async fn test_default_receivers() {
    let bidder = common::start_bidder(common::config(18331, 18332), registries()).await;
    let client = common::client();

    let res = client
        .get(format!("{}/nowhere", bidder.bidder_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/bid", bidder.bidder_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["allow"], "POST");

    let res = client
        .request(reqwest::Method::OPTIONS, format!("{}/bid", bidder.bidder_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["allow"], "POST, OPTIONS");

    // admin routes are dormant on the traffic port
    let res = client
        .get(format!("{}/healthz", bidder.bidder_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    bidder.stop().await;
}

#[tokio::test]
async fn test_admin_endpoints() {
    let mut config = common::config(18341, 18342);
    config.admin.api_key = Some("admin-key".into());
    let bidder = common::start_bidder(config, registries()).await;
    let client = common::client();

    let res = client
        .get(format!("{}/healthz", bidder.admin_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/admin/status", bidder.admin_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/admin/status", bidder.admin_url))
        .bearer_auth("admin-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "operational");
    assert_eq!(body["controllers"].as_array().unwrap().len(), 4);

    let res = client
        .post(format!("{}/bid", bidder.admin_url))
        .json(&json!({ "id": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    bidder.stop().await;
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = common::config(18351, 18352);
    config.limits.max_body_bytes = 64;
    config.bid.interceptors = vec!["flat".into()];
    let bidder = common::start_bidder(config, registries()).await;
    let client = common::client();

    let imps: Vec<Value> = (0..20).map(|i| json!({ "id": i.to_string() })).collect();
    let res = client
        .post(format!("{}/bid", bidder.bidder_url))
        .json(&json!({ "id": "auction-big", "imp": imps }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let res = client
        .post(format!("{}/bid", bidder.bidder_url))
        .json(&json!({ "id": "a", "imp": [{ "id": "1" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    bidder.stop().await;
}
