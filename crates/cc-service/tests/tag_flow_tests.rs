//! Tag endpoint integration tests.
//!
//! Exercises issue-or-rotate, the QR image endpoint, value validation, and
//! the scan view through the `TestServer` harness.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use cc_test_utils::TestServer;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_issue_or_rotate_returns_fresh_tag() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!(
            "{}/api/tags/issue-or-rotate?owner_id={}",
            server.url(),
            owner_id
        ))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    let tag_id = body["tagId"].as_str().expect("tagId present").to_string();
    assert_eq!(body["ttlSeconds"].as_i64(), Some(60));
    assert_eq!(
        body["imageUrl"].as_str(),
        Some(format!("/api/tags/{tag_id}/image").as_str())
    );
    assert!(body["expiresAt"].as_str().is_some());

    Ok(())
}

#[tokio::test]
async fn test_repeated_issue_reuses_until_forced() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    let client = reqwest::Client::new();
    let url = format!(
        "{}/api/tags/issue-or-rotate?owner_id={}",
        server.url(),
        owner_id
    );

    let first: Value = client.post(&url).send().await?.json().await?;
    let second: Value = client.post(&url).send().await?.json().await?;
    assert_eq!(first["tagId"], second["tagId"]);

    let forced: Value = client
        .post(format!("{url}&force=true"))
        .send()
        .await?
        .json()
        .await?;
    assert_ne!(first["tagId"], forced["tagId"]);

    Ok(())
}

#[tokio::test]
async fn test_tag_image_is_uncacheable_svg() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    let tag = server.state().tags.issue_or_rotate(owner_id, false).await;

    let response = reqwest::get(format!("{}/api/tags/{}/image", server.url(), tag.id)).await?;
    assert_eq!(response.status(), 200);

    let headers = response.headers();
    assert_eq!(
        headers.get("content-type").and_then(|v| v.to_str().ok()),
        Some("image/svg+xml")
    );
    assert_eq!(
        headers.get("cache-control").and_then(|v| v.to_str().ok()),
        Some("no-store, must-revalidate")
    );
    assert_eq!(
        headers.get("pragma").and_then(|v| v.to_str().ok()),
        Some("no-cache")
    );
    assert!(headers.get("expires-at").is_some());
    let ttl: i64 = headers
        .get("x-tag-ttl")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("x-tag-ttl header");
    assert!(ttl > 0 && ttl <= 60);

    let body = response.text().await?;
    assert!(body.contains("<svg"));

    Ok(())
}

#[tokio::test]
async fn test_unknown_tag_image_is_404() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;

    let response = reqwest::get(format!(
        "{}/api/tags/{}/image",
        server.url(),
        Uuid::new_v4()
    ))
    .await?;
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"].as_str(), Some("NOT_FOUND"));

    Ok(())
}

#[tokio::test]
async fn test_expired_tag_answers_410_and_validates_invalid() -> Result<(), anyhow::Error> {
    let vars = HashMap::from([("TAG_TTL_SECONDS".to_string(), "1".to_string())]);
    let server = TestServer::spawn_with_vars(vars).await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    let tag = server.state().tags.issue_or_rotate(owner_id, false).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let image = reqwest::get(format!("{}/api/tags/{}/image", server.url(), tag.id)).await?;
    assert_eq!(image.status(), 410);
    let body: Value = image.json().await?;
    assert_eq!(body["error"]["code"].as_str(), Some("GONE"));

    // The value existed, so validation answers 200 with valid: false.
    let validation = reqwest::get(format!(
        "{}/api/tags/by-value/{}",
        server.url(),
        tag.value
    ))
    .await?;
    assert_eq!(validation.status(), 200);
    let body: Value = validation.json().await?;
    assert_eq!(body["valid"].as_bool(), Some(false));
    assert_eq!(body["reason"].as_str(), Some("EXPIRED"));

    Ok(())
}

#[tokio::test]
async fn test_validate_by_value() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    let tag = server.state().tags.issue_or_rotate(owner_id, false).await;

    let unknown = reqwest::get(format!(
        "{}/api/tags/by-value/definitely-not-a-tag",
        server.url()
    ))
    .await?;
    assert_eq!(unknown.status(), 404);

    let live = reqwest::get(format!(
        "{}/api/tags/by-value/{}",
        server.url(),
        tag.value
    ))
    .await?;
    assert_eq!(live.status(), 200);
    let body: Value = live.json().await?;
    assert_eq!(body["valid"].as_bool(), Some(true));
    assert_eq!(body["ownerId"].as_str(), Some(owner_id.to_string().as_str()));

    Ok(())
}

#[tokio::test]
async fn test_public_scan_view_carries_relay_section() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    let tag = server.state().tags.issue_or_rotate(owner_id, false).await;

    let response = reqwest::get(format!("{}/api/tags/{}/view", server.url(), tag.id)).await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(body["mode"].as_str(), Some("public"));
    assert_eq!(body["valid"].as_bool(), Some(true));
    assert_eq!(body["vehicleMask"].as_str(), Some("12GA***"));
    assert!(body.get("admin").is_none());

    let relay = &body["relay"];
    assert!(relay["callTicket"]
        .as_str()
        .is_some_and(|t| t.starts_with("call.")));
    assert!(relay["msgTicket"]
        .as_str()
        .is_some_and(|t| t.starts_with("message.")));
    assert_eq!(relay["ttlSec"].as_i64(), Some(60));
    assert!(relay["sessionId"].as_str().is_some());

    Ok(())
}

#[tokio::test]
async fn test_admin_scan_view_returns_masked_permit() -> Result<(), anyhow::Error> {
    use cc_service::services::collaborators::PermitSummary;

    let server = TestServer::spawn().await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    server
        .seed_permit(
            owner_id,
            PermitSummary {
                resident: true,
                maternity: true,
                disabled: false,
                sticker_no: Some("ST-90812".to_string()),
                building_unit: Some("101-1203".to_string()),
                note: None,
            },
        )
        .await;
    let tag = server.state().tags.issue_or_rotate(owner_id, false).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/tags/{}/view", server.url(), tag.id))
        .header("x-user-id", Uuid::new_v4().to_string())
        .header("x-user-role", "admin")
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(body["mode"].as_str(), Some("admin"));
    assert!(body.get("relay").is_none());

    let admin = &body["admin"];
    assert_eq!(admin["resident"].as_bool(), Some(true));
    assert_eq!(admin["maternity"].as_bool(), Some(true));
    assert_eq!(admin["disabled"].as_bool(), Some(false));
    assert_eq!(admin["stickerNoMasked"].as_str(), Some("ST-90***"));
    assert_eq!(admin["ownerMask"].as_str(), Some("J*rdan"));
    assert_eq!(admin["buildingUnitMask"].as_str(), Some("***-****"));

    Ok(())
}
