//! Full scan-to-call scenario through the spawned server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use cc_service::models::CallState;
use cc_test_utils::TestServer;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn recv_json(ws: &mut Ws) -> Result<Value, anyhow::Error> {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("stream closed"))??;
        if let Message::Text(text) = frame {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

async fn wait_for_state(
    server: &TestServer,
    session_id: &str,
    expected: CallState,
) -> Result<(), anyhow::Error> {
    timeout(Duration::from_secs(5), async {
        loop {
            if let Some(session) = server.state().sessions.get(session_id).await {
                if session.state == expected {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn test_scan_call_signal_hangup_scenario() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn().await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    let tag = server.state().tags.issue_or_rotate(owner_id, false).await;
    let client = reqwest::Client::new();

    // Visitor scans the tag.
    let scan: Value = client
        .get(format!("{}/api/tags/{}/view", server.url(), tag.id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(scan["mode"].as_str(), Some("public"));
    let session_id = scan["relay"]["sessionId"]
        .as_str()
        .expect("sessionId")
        .to_string();
    let call_ticket = scan["relay"]["callTicket"].as_str().expect("callTicket");

    // The call service verifies the ticket before letting the visitor in.
    let verified: Value = client
        .post(format!("{}/api/relay/verify-ticket", server.url()))
        .json(&json!({"token": call_ticket, "purpose": "call"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(verified["tagId"].as_str(), Some(tag.id.to_string().as_str()));

    // Visitor joins the signaling room; the session starts ringing.
    let (mut visitor, _) = connect_async(server.ws_url()).await?;
    visitor
        .send(Message::Text(
            json!({"type": "join", "sessionId": session_id}).to_string(),
        ))
        .await?;
    recv_json(&mut visitor).await?; // ack
    wait_for_state(&server, &session_id, CallState::WaitingPeers).await?;

    // Owner answers; both peers present.
    let (mut owner, _) = connect_async(server.ws_url()).await?;
    owner
        .send(Message::Text(
            json!({"type": "join", "sessionId": session_id}).to_string(),
        ))
        .await?;
    recv_json(&mut owner).await?; // ack
    recv_json(&mut visitor).await?; // joined
    wait_for_state(&server, &session_id, CallState::Connected).await?;

    // SDP and ICE flow both ways.
    visitor
        .send(Message::Text(
            json!({
                "type": "offer",
                "sessionId": session_id,
                "sdp": {"type": "offer", "sdp": "v=0 visitor"}
            })
            .to_string(),
        ))
        .await?;
    let offer = recv_json(&mut owner).await?;
    assert_eq!(offer["sdp"]["sdp"].as_str(), Some("v=0 visitor"));

    owner
        .send(Message::Text(
            json!({
                "type": "answer",
                "sessionId": session_id,
                "sdp": {"type": "answer", "sdp": "v=0 owner"}
            })
            .to_string(),
        ))
        .await?;
    let answer = recv_json(&mut visitor).await?;
    assert_eq!(answer["type"].as_str(), Some("answer"));

    owner
        .send(Message::Text(
            json!({
                "type": "ice",
                "sessionId": session_id,
                "candidate": {"candidate": "candidate:1"}
            })
            .to_string(),
        ))
        .await?;
    assert_eq!(recv_json(&mut visitor).await?["type"].as_str(), Some("ice"));

    // Visitor hangs up.
    let end = client
        .post(format!("{}/api/calls/{}/end", server.url(), session_id))
        .json(&json!({"ok": true}))
        .send()
        .await?;
    assert_eq!(end.status(), 204);

    let session = server
        .state()
        .sessions
        .get(&session_id)
        .await
        .expect("terminal session is readable");
    assert_eq!(session.state, CallState::Ended);
    assert!(session.ended_at.is_some());

    // Peers disconnect; the room drains and the key is free again.
    visitor.close(None).await?;
    let left = recv_json(&mut owner).await?;
    assert_eq!(left["type"].as_str(), Some("left"));
    owner.close(None).await?;

    timeout(Duration::from_secs(5), async {
        while server.state().relay.room_count().await != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    Ok(())
}

#[tokio::test]
async fn test_session_that_never_connects_fails_lazily() -> Result<(), anyhow::Error> {
    use std::collections::HashMap;

    // Session TTL floors at 60s, so drive the clock instead of sleeping.
    let vars = HashMap::from([("SESSION_TTL_SECONDS".to_string(), "60".to_string())]);
    let server = TestServer::spawn_with_vars(vars).await?;
    let owner_id = server.seed_owner("Jordan", "12GA3456").await;
    let tag = server.state().tags.issue_or_rotate(owner_id, false).await;
    let client = reqwest::Client::new();

    let started: Value = client
        .post(format!("{}/api/calls/start", server.url()))
        .json(&json!({"tagValue": tag.value}))
        .send()
        .await?
        .json()
        .await?;
    let session_id = started["sessionId"].as_str().expect("sessionId");

    let later = chrono::Utc::now() + chrono::Duration::seconds(61);
    assert!(server
        .state()
        .sessions
        .get_at(session_id, later)
        .await
        .is_none());

    let failed = server
        .state()
        .sessions
        .get(session_id)
        .await
        .expect("record remains, now terminal");
    assert_eq!(failed.state, CallState::Failed);

    Ok(())
}
