//! Integration tests end-to-end su WebSocket reali
//!
//! Il server gira su una porta locale, i client usano tokio-tungstenite.

mod common;

#[cfg(test)]
mod websocket_tests {
    use super::common::*;
    use serde_json::json;
    use sqlx::SqlitePool;
    use std::time::Duration;

    #[sqlx::test(fixtures(
        path = "../fixtures",
        scripts("users", "servers", "direct_messages", "messages")
    ))]
    async fn test_general_channel_round_trip(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let addr = spawn_app(state).await;

        let mut alice = connect_ws(addr, &create_test_jwt(1, "alice")).await;
        let mut bob = connect_ws(addr, &create_test_jwt(2, "bob")).await;

        send_event(&mut alice, json!({ "type": "joinChannel", "data": 1 })).await;
        send_event(&mut bob, json!({ "type": "joinChannel", "data": 1 })).await;
        sync(&mut alice).await;
        sync(&mut bob).await;

        send_event(
            &mut alice,
            json!({ "type": "sendMessage", "data": { "channelId": 1, "content": "hello", "replyTo": 2 } }),
        )
        .await;

        for ws in [&mut alice, &mut bob] {
            let event = wait_for(ws, "newMessage").await;
            let message = &event["data"];
            assert_eq!(message["content"], "hello");
            assert_eq!(message["channelId"], 1);
            assert_eq!(message["sender"]["id"], 1);
            assert_eq!(message["sender"]["username"], "alice");
            assert_eq!(message["sender"]["avatar"], "alice.png");
            assert_eq!(message["replyTo"]["id"], 2);
            assert_eq!(message["replyTo"]["sender"]["username"], "bob");
            assert_eq!(message["edited"], false);
            assert_eq!(message["reactions"], json!([]));
        }
        Ok(())
    }

    #[sqlx::test(fixtures(
        path = "../fixtures",
        scripts("users", "servers", "direct_messages", "messages")
    ))]
    async fn test_non_member_is_ignored_then_rejected(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let addr = spawn_app(state).await;

        let mut alice = connect_ws(addr, &create_test_jwt(1, "alice")).await;
        send_event(&mut alice, json!({ "type": "joinChannel", "data": 1 })).await;
        sync(&mut alice).await;

        let mut eve = connect_ws(addr, &create_test_jwt(5, "eve")).await;
        send_event(&mut eve, json!({ "type": "joinChannel", "data": 1 })).await;
        let seen = sync(&mut eve).await;
        assert!(seen.iter().all(|e| e["type"] != "error"), "join must be silent: {seen:?}");

        send_event(
            &mut eve,
            json!({ "type": "sendMessage", "data": { "channelId": 1, "content": "let me in" } }),
        )
        .await;
        let error = wait_for(&mut eve, "error").await;
        assert_eq!(error["data"]["code"], 403);

        send_event(&mut eve, json!({ "type": "typing", "data": { "channelId": 1 } })).await;
        let error = wait_for(&mut eve, "error").await;
        assert_eq!(error["data"]["code"], 403);

        assert_no_event(&mut alice, Duration::from_millis(200)).await;
        Ok(())
    }

    #[sqlx::test(fixtures(
        path = "../fixtures",
        scripts("users", "servers", "direct_messages")
    ))]
    async fn test_first_direct_message_reaches_both_sides(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let addr = spawn_app(state).await;

        let mut dave = connect_ws(addr, &create_test_jwt(4, "dave")).await;
        let mut eve = connect_ws(addr, &create_test_jwt(5, "eve")).await;
        sync(&mut dave).await;

        send_event(
            &mut eve,
            json!({ "type": "sendDirectMessage", "data": { "recipientId": 4, "content": "hi dave" } }),
        )
        .await;

        let received = wait_for(&mut dave, "newDMMessage").await;
        let echoed = wait_for(&mut eve, "newDMMessage").await;
        assert_eq!(received["data"]["dmId"], echoed["data"]["dmId"]);
        assert_eq!(received["data"]["message"]["content"], "hi dave");
        assert_eq!(received["data"]["message"]["dmId"], received["data"]["dmId"]);
        assert!(received["data"]["message"]["channelId"].is_null());

        // a self-addressed message is rejected
        send_event(
            &mut eve,
            json!({ "type": "sendDirectMessage", "data": { "recipientId": 5, "content": "me" } }),
        )
        .await;
        let error = wait_for(&mut eve, "error").await;
        assert_eq!(error["data"]["code"], 400);
        Ok(())
    }

    #[sqlx::test(fixtures(
        path = "../fixtures",
        scripts("users", "servers", "direct_messages")
    ))]
    async fn test_presence_online_and_offline(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let addr = spawn_app(state.clone()).await;

        let mut alice = connect_ws(addr, &create_test_jwt(1, "alice")).await;
        let own = wait_for(&mut alice, "userOnline").await;
        assert_eq!(own["data"][0]["userId"], 1);

        let mut bob = connect_ws(addr, &create_test_jwt(2, "bob")).await;
        sync(&mut bob).await;
        assert!(load_user(&state, 2).await.is_online);

        let online = wait_for(&mut alice, "userOnline").await;
        let ids: Vec<i64> = online["data"]
            .as_array()
            .expect("snapshot is an array")
            .iter()
            .filter_map(|p| p["userId"].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2]);
        let member = wait_for(&mut alice, "memberOnline").await;
        assert_eq!(member["data"]["userId"], 2);
        assert_eq!(member["data"]["serverId"], 1);

        bob.close(None).await.expect("close handshake");

        let offline = wait_for(&mut alice, "userOffline").await;
        assert_eq!(offline["data"], json!([{ "userId": 1, "username": "alice", "avatar": "alice.png" }]));
        let member = wait_for(&mut alice, "memberOffline").await;
        assert_eq!(member["data"]["userId"], 2);
        assert_eq!(member["data"]["serverId"], 1);

        assert!(!load_user(&state, 2).await.is_online);
        assert!(!state.presence.is_online(2));
        Ok(())
    }

    #[sqlx::test(fixtures(
        path = "../fixtures",
        scripts("users", "servers", "direct_messages")
    ))]
    async fn test_typing_expires_without_stop(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state_with_typing(pool, Duration::from_millis(300));
        let addr = spawn_app(state).await;

        let mut alice = connect_ws(addr, &create_test_jwt(1, "alice")).await;
        let mut bob = connect_ws(addr, &create_test_jwt(2, "bob")).await;
        send_event(&mut alice, json!({ "type": "joinChannel", "data": 1 })).await;
        send_event(&mut bob, json!({ "type": "joinChannel", "data": 1 })).await;
        sync(&mut alice).await;
        sync(&mut bob).await;

        send_event(&mut bob, json!({ "type": "typing", "data": { "channelId": 1 } })).await;

        let started = wait_for(&mut alice, "userTyping").await;
        assert_eq!(started["data"]["userId"], 2);
        assert_eq!(started["data"]["channelId"], 1);

        let stopped = wait_for(&mut alice, "userStoppedTyping").await;
        assert_eq!(stopped["data"]["userId"], 2);
        assert_eq!(stopped["data"]["username"], "bob");

        // il mittente non riceve i propri indicatori
        let seen = sync(&mut bob).await;
        assert!(seen.iter().all(|e| e["type"] != "userTyping" && e["type"] != "userStoppedTyping"));
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_malformed_frame_keeps_connection_open(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let addr = spawn_app(state).await;

        let mut alice = connect_ws(addr, &create_test_jwt(1, "alice")).await;
        send_event(&mut alice, json!({ "type": "launchRocket", "data": 1 })).await;

        let error = wait_for(&mut alice, "error").await;
        assert_eq!(error["data"]["code"], 400);
        assert_eq!(error["data"]["message"], "Invalid event payload");

        // la connessione resta utilizzabile
        sync(&mut alice).await;
        Ok(())
    }
}
