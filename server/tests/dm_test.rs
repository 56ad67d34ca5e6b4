//! Integration tests for the direct-message REST endpoints and their
//! real-time push to connected recipients.

mod common;

use common::{start_test_server, WsClient};
use serde_json::{json, Value};

async fn create_conversation(client: &reqwest::Client, base_url: &str, a: i64, b: i64) -> (u16, Value) {
    let resp = client
        .post(format!("{}/api/conversations", base_url))
        .json(&json!({"user_id_1": a, "user_id_2": b}))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn post_message(
    client: &reqwest::Client,
    base_url: &str,
    conversation_id: i64,
    sender_id: i64,
    content: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/messages", base_url))
        .json(&json!({
            "conversation_id": conversation_id,
            "sender_id": sender_id,
            "content": content,
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_root_and_health() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/health", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let banner: Value = client
        .get(format!("{}/", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(banner["environment"], "test");
    assert!(banner["version"].is_string());
    assert!(banner["message"].is_string());
}

#[tokio::test]
async fn test_create_conversation_is_idempotent() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let (status, first) = create_conversation(&client, &base_url, 1, 2).await;
    assert_eq!(status, 201);
    assert_eq!(first["type"], "direct");

    let (status, second) = create_conversation(&client, &base_url, 2, 1).await;
    assert_eq!(status, 200);
    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn test_create_conversation_validation() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/conversations", base_url))
        .json(&json!({"user_id_1": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let (status, _) = create_conversation(&client, &base_url, 3, 3).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_message_flow_with_history_and_read() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let (_, conv) = create_conversation(&client, &base_url, 1, 2).await;
    let conversation_id = conv["id"].as_i64().unwrap();

    let resp = post_message(&client, &base_url, conversation_id, 1, "hello").await;
    assert_eq!(resp.status(), 201);
    let sent: Value = resp.json().await.unwrap();
    assert!(sent["messageId"].as_i64().unwrap() > 0);

    post_message(&client, &base_url, conversation_id, 1, "are you there?").await;

    let list: Value = client
        .get(format!("{}/api/conversations/user/2", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list[0]["id"], conversation_id);
    assert_eq!(list[0]["participants"], json!([1]));
    assert_eq!(list[0]["last_message"], "are you there?");
    assert_eq!(list[0]["unread_count"], 2);

    let history: Value = client
        .get(format!(
            "{}/api/conversations/{}/messages?user_id=2",
            base_url, conversation_id
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let contents: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["hello", "are you there?"]);

    let read: Value = client
        .put(format!("{}/api/conversations/{}/read", base_url, conversation_id))
        .json(&json!({"user_id": 2}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["updatedCount"], 2);

    let list: Value = client
        .get(format!("{}/api/conversations/user/2", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list[0]["unread_count"], 0);
}

#[tokio::test]
async fn test_outsider_is_forbidden() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let (_, conv) = create_conversation(&client, &base_url, 1, 2).await;
    let conversation_id = conv["id"].as_i64().unwrap();

    let resp = post_message(&client, &base_url, conversation_id, 3, "let me in").await;
    assert_eq!(resp.status(), 403);

    let resp = client
        .get(format!(
            "{}/api/conversations/{}/messages?user_id=3",
            base_url, conversation_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .get(format!("{}/api/conversations/{}/messages", base_url, conversation_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let (_, conv) = create_conversation(&client, &base_url, 1, 2).await;
    let resp = post_message(&client, &base_url, conv["id"].as_i64().unwrap(), 1, "   ").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_sent_message_is_pushed_to_online_recipient() {
    let (base_url, addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let mut recipient = WsClient::connect(addr).await;
    let mut bystander = WsClient::connect(addr).await;
    recipient.announce(2).await;
    bystander.expect_event("presence-changed").await;
    bystander.announce(3).await;
    recipient.expect_event("presence-changed").await;

    let (_, conv) = create_conversation(&client, &base_url, 1, 2).await;
    let conversation_id = conv["id"].as_i64().unwrap();

    let resp = post_message(&client, &base_url, conversation_id, 1, "ping from REST").await;
    assert_eq!(resp.status(), 201);
    let sent: Value = resp.json().await.unwrap();

    let event = recipient.next_event().await;
    assert_eq!(event["event"], "message-delivered");
    assert_eq!(event["data"]["conversationId"], conversation_id);
    assert_eq!(event["data"]["senderId"], 1);
    assert_eq!(event["data"]["message"]["content"], "ping from REST");
    assert_eq!(event["data"]["message"]["id"], sent["messageId"]);

    bystander.expect_silence().await;
}

#[tokio::test]
async fn test_message_to_offline_recipient_still_persists() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let (_, conv) = create_conversation(&client, &base_url, 1, 2).await;
    let conversation_id = conv["id"].as_i64().unwrap();

    let resp = post_message(&client, &base_url, conversation_id, 1, "for later").await;
    assert_eq!(resp.status(), 201);

    let history: Value = client
        .get(format!(
            "{}/api/conversations/{}/messages?user_id=2&limit=500",
            base_url, conversation_id
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["read"], false);
}

#[tokio::test]
async fn test_wrongly_typed_body_is_json_400() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/conversations", base_url))
        .json(&json!({"user_id_1": "abc", "user_id_2": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = client
        .post(format!("{}/api/messages", base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_bad_query_and_path_are_json_400() {
    let (base_url, _addr) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let (_, conv) = create_conversation(&client, &base_url, 1, 2).await;
    let resp = client
        .get(format!(
            "{}/api/conversations/{}/messages?user_id=1&limit=-1",
            base_url, conv["id"]
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = client
        .get(format!("{}/api/conversations/user/not-a-number", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (base_url, _addr) = start_test_server(false).await;

    let resp = reqwest::get(format!("{}/api/nope", base_url)).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "route not found");
}
