// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;

use botrpc::broker::memory::{Fault, MemoryBroker};
use botrpc::broker::{Channel, Connection, MessageProperties, QueueOptions};
use botrpc::configs::*;
use botrpc::operation::slot;
use botrpc::types::*;
use botrpc::{
    BotApi, DecodeError, Dispatcher, Operation, Registry, RemoteBot, RemoteError,
    RequestEnvelope, ResponseEnvelope, RpcError, Slots,
};

use common::*;

#[tokio::test]
#[tracing_test::traced_test]
async fn test_get_me() {
    let harness = Harness::start(server_config()).await;

    let me = harness.client.get_me().await.unwrap();
    assert_eq!(me, StubBot::me());
    assert_eq!(harness.bot.calls(), vec!["get_me"]);

    harness.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_send_forward() {
    let harness = Harness::start(server_config()).await;

    let forward = ForwardConfig {
        base: BaseChat {
            chat_id: 1001,
            ..Default::default()
        },
        from_chat_id: 2002,
        message_id: 77,
        ..Default::default()
    };
    let sent = harness.client.send(forward.into()).await.unwrap();

    assert_eq!(sent.message_id, 100);
    assert_eq!(sent.text, "ForwardConfig");
    assert_eq!(sent.chat.map(|c| c.id), Some(1001));
    assert_eq!(sent.forward_from_message_id, 77);

    harness.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_every_operation_round_trips() {
    let harness = Harness::start(server_config()).await;
    let bot = &harness.client;

    let params: Params = [("chat_id".to_string(), vec!["5".to_string()])].into();
    let res = bot.make_request("getChat".to_string(), params).await.unwrap();
    assert!(res.ok);
    assert_eq!(res.result["endpoint"], "getChat");
    assert_eq!(res.result["params"]["chat_id"][0], "5");

    let fields: FormFields = [("chat_id".to_string(), "5".to_string())].into();
    let file = FileSource::Bytes {
        name: "cat.jpg".to_string(),
        data: vec![1, 2, 3, 4],
    };
    let res = bot
        .upload_file("sendPhoto".to_string(), fields, "photo".to_string(), file)
        .await
        .unwrap();
    assert_eq!(res.result["field"], "photo");
    assert_eq!(res.result["size"], 4);

    assert_eq!(
        bot.get_file_direct_url("abc".to_string()).await.unwrap(),
        "https://files.example/abc"
    );
    assert_eq!(bot.get_me().await.unwrap().username, BOT_USERNAME);

    let photos = bot
        .get_user_profile_photos(UserProfilePhotosConfig {
            user_id: 9,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(photos.photos[0][0].file_id, "photo-9");

    let file = bot
        .get_file(FileConfig {
            file_id: "doc".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(file.file_path, "documents/doc.bin");

    let updates = bot.get_updates(UpdateConfig::new(2)).await.unwrap();
    assert_eq!(
        updates.iter().map(|u| u.update_id).collect::<Vec<_>>(),
        vec![2, 3]
    );

    assert!(bot.remove_webhook().await.unwrap().ok);
    let res = bot
        .set_webhook(WebhookConfig {
            url: "https://hooks.example/bot".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(res.result["url"], "https://hooks.example/bot");
    assert!(bot.get_webhook_info().await.unwrap().is_set());

    assert!(bot.answer_inline_query(InlineConfig::default()).await.unwrap().ok);
    assert!(bot.answer_callback_query(CallbackConfig::default()).await.unwrap().ok);
    assert!(bot.kick_chat_member(KickChatMemberConfig::default()).await.unwrap().ok);

    let chat = ChatConfig {
        chat_id: 5,
        ..Default::default()
    };
    assert!(bot.leave_chat(chat.clone()).await.unwrap().ok);
    assert_eq!(bot.get_chat(chat.clone()).await.unwrap().title, "crew");
    let admins = bot.get_chat_administrators(chat.clone()).await.unwrap();
    assert!(admins[0].is_administrator());
    assert_eq!(bot.get_chat_members_count(chat.clone()).await.unwrap(), 7);

    let member = bot
        .get_chat_member(ChatConfigWithUser {
            chat_id: 5,
            user_id: 31,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(member.user.map(|u| u.id), Some(31));

    assert!(bot.unban_chat_member(ChatMemberConfig::default()).await.unwrap().ok);
    assert!(bot.restrict_chat_member(RestrictChatMemberConfig::default()).await.unwrap().ok);
    assert!(bot.promote_chat_member(PromoteChatMemberConfig::default()).await.unwrap().ok);

    let scores = bot
        .get_game_high_scores(GetGameHighScoresConfig::default())
        .await
        .unwrap();
    assert_eq!(scores[0].score, 999);

    assert!(bot.answer_shipping_query(ShippingConfig::default()).await.unwrap().ok);
    assert!(bot.answer_pre_checkout_query(PreCheckoutConfig::default()).await.unwrap().ok);
    assert!(bot.delete_message(DeleteMessageConfig::default()).await.unwrap().ok);
    assert_eq!(
        bot.get_invite_link(chat).await.unwrap(),
        "https://chat.example/join/5"
    );
    assert!(bot.pin_chat_message(PinChatMessageConfig::default()).await.unwrap().ok);
    assert!(bot.unpin_chat_message(UnpinChatMessageConfig::default()).await.unwrap().ok);

    let res = bot
        .set_chat_title(SetChatTitleConfig {
            chat_id: 5,
            title: "new crew".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(res.result["title"], "new crew");
    assert!(bot.set_chat_description(SetChatDescriptionConfig::default()).await.unwrap().ok);
    assert!(bot.set_chat_photo(SetChatPhotoConfig::default()).await.unwrap().ok);
    assert!(bot.delete_chat_photo(DeleteChatPhotoConfig::default()).await.unwrap().ok);

    let sent = bot
        .send(
            MessageConfig {
                text: "hi".to_string(),
                ..Default::default()
            }
            .into(),
        )
        .await
        .unwrap();
    assert_eq!(sent.text, "hi");

    let to_me = Message {
        text: format!("hello @{}", BOT_USERNAME),
        ..Default::default()
    };
    assert!(bot.is_message_to_me(to_me).await);
    assert!(!bot.is_message_to_me(Message::default()).await);

    assert_eq!(harness.bot.calls().len(), 35);

    harness.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_remote_errors_keep_their_kind() {
    let harness = Harness::start(server_config()).await;

    let err = harness
        .client
        .get_chat(ChatConfig {
            chat_id: -5,
            ..Default::default()
        })
        .await
        .unwrap_err();
    match err.remote() {
        Some(RemoteError::Api(api)) => {
            assert_eq!(api.error_code, 400);
            assert_eq!(api.description, "Bad Request: chat -5 not found");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = harness
        .client
        .get_file_direct_url(String::new())
        .await
        .unwrap_err();
    assert_eq!(
        err.remote(),
        Some(&RemoteError::InvalidArgument("empty file id".to_string()))
    );

    harness.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_timeout_releases_reply_queue() {
    let broker = MemoryBroker::new();
    let client = RemoteBot::new(
        Arc::new(broker.clone()),
        client_config(Duration::from_millis(200)),
    );

    let start = Instant::now();
    let err = client.get_me().await.unwrap_err();

    assert!(err.is_timeout(), "unexpected error {:?}", err);
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(broker.queue_names().is_empty());
    assert_eq!(broker.open_channels(), 0);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_concurrent_calls_answered_out_of_order() {
    let broker = MemoryBroker::new();
    let server = broker.open_channel().await.unwrap();
    server.declare_queue(QUEUE, QueueOptions::shared()).await.unwrap();
    let mut requests = server.consume(QUEUE, false).await.unwrap();

    let stub = tokio::spawn(async move {
        let first = requests.next().await.unwrap().unwrap();
        let second = requests.next().await.unwrap().unwrap();

        // answer the later request first
        for delivery in [second, first] {
            let request = RequestEnvelope::decode(&delivery.body).unwrap();
            let slots = match request.operation().unwrap() {
                Operation::GetMe => Slots::new().with(slot::USER, &StubBot::me()).unwrap(),
                Operation::GetChatMembersCount => Slots::new().with(slot::COUNT, &12).unwrap(),
                other => panic!("unexpected operation {}", other),
            };
            let response =
                ResponseEnvelope::success(request.operation, request.correlation_id, slots);
            let properties = MessageProperties::default()
                .with_correlation_id(delivery.properties.correlation_id.clone().unwrap());
            server
                .publish(
                    delivery.properties.reply_to.as_deref().unwrap(),
                    properties,
                    response.encode().unwrap(),
                )
                .await
                .unwrap();
            server.ack(delivery.delivery_tag).await.unwrap();
        }
        server
    });

    let client = RemoteBot::new(Arc::new(broker.clone()), client_config(Duration::from_secs(2)));
    let (me, count) = tokio::join!(
        client.get_me(),
        client.get_chat_members_count(ChatConfig::default())
    );

    assert_eq!(me.unwrap(), StubBot::me());
    assert_eq!(count.unwrap(), 12);

    let server = stub.await.unwrap();
    server.close().await.unwrap();
    assert!(broker.queue_names().iter().all(|q| q == QUEUE));
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_foreign_replies_are_discarded() {
    let broker = MemoryBroker::new();
    let server = broker.open_channel().await.unwrap();
    server.declare_queue(QUEUE, QueueOptions::shared()).await.unwrap();
    let mut requests = server.consume(QUEUE, false).await.unwrap();

    let stub = tokio::spawn(async move {
        let delivery = requests.next().await.unwrap().unwrap();
        let request = RequestEnvelope::decode(&delivery.body).unwrap();
        let reply_to = delivery.properties.reply_to.clone().unwrap();

        let stray = ResponseEnvelope::success(
            "GetMe",
            "SOMEBODYELSE",
            Slots::new().with(slot::USER, &User::default()).unwrap(),
        );
        server
            .publish(
                &reply_to,
                MessageProperties::default().with_correlation_id("SOMEBODYELSE"),
                stray.encode().unwrap(),
            )
            .await
            .unwrap();

        let answer = ResponseEnvelope::success(
            request.operation,
            request.correlation_id.clone(),
            Slots::new().with(slot::USER, &StubBot::me()).unwrap(),
        );
        server
            .publish(
                &reply_to,
                MessageProperties::default().with_correlation_id(request.correlation_id),
                answer.encode().unwrap(),
            )
            .await
            .unwrap();
        server.ack(delivery.delivery_tag).await.unwrap();
    });

    let client = RemoteBot::new(Arc::new(broker), client_config(Duration::from_secs(2)));
    assert_eq!(client.get_me().await.unwrap(), StubBot::me());
    stub.await.unwrap();
}

/// Answer the next request on the queue with whatever `reply` builds.
fn answer_next_request<F>(broker: &MemoryBroker, reply: F) -> tokio::task::JoinHandle<()>
where
    F: FnOnce(RequestEnvelope) -> Vec<u8> + Send + 'static,
{
    let broker = broker.clone();
    tokio::spawn(async move {
        let server = broker.open_channel().await.unwrap();
        server.declare_queue(QUEUE, QueueOptions::shared()).await.unwrap();
        let mut requests = server.consume(QUEUE, false).await.unwrap();

        let delivery = requests.next().await.unwrap().unwrap();
        let request = RequestEnvelope::decode(&delivery.body).unwrap();
        let correlation_id = request.correlation_id.clone();
        server
            .publish(
                delivery.properties.reply_to.as_deref().unwrap(),
                MessageProperties::default().with_correlation_id(correlation_id),
                reply(request),
            )
            .await
            .unwrap();
        server.ack(delivery.delivery_tag).await.unwrap();
        server.close().await.unwrap();
    })
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_malformed_reply_is_decode_error() {
    let broker = MemoryBroker::new();
    let server = answer_next_request(&broker, |_request| b"{not json".to_vec());
    wait_for_consumers(&broker, QUEUE, 1).await;

    let client = RemoteBot::new(Arc::new(broker.clone()), client_config(Duration::from_secs(2)));
    let err = client.get_me().await.unwrap_err();
    assert!(
        matches!(err, RpcError::Decode(DecodeError::Malformed(_))),
        "unexpected error {:?}",
        err
    );

    server.await.unwrap();
    assert_eq!(broker.open_channels(), 0);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_reply_without_result_slot_is_decode_error() {
    let broker = MemoryBroker::new();
    let server = answer_next_request(&broker, |request| {
        ResponseEnvelope::success(request.operation, request.correlation_id, Slots::new())
            .encode()
            .unwrap()
    });
    wait_for_consumers(&broker, QUEUE, 1).await;

    let client = RemoteBot::new(Arc::new(broker.clone()), client_config(Duration::from_secs(2)));
    let err = client.get_me().await.unwrap_err();
    assert!(
        matches!(err, RpcError::Decode(DecodeError::MissingSlot("user"))),
        "unexpected error {:?}",
        err
    );

    server.await.unwrap();
    assert_eq!(broker.open_channels(), 0);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_request_wire_properties() {
    let broker = MemoryBroker::new();
    let server = broker.open_channel().await.unwrap();
    server.declare_queue(QUEUE, QueueOptions::shared()).await.unwrap();
    let mut requests = server.consume(QUEUE, true).await.unwrap();

    let client = RemoteBot::new(Arc::new(broker), client_config(Duration::from_millis(200)));
    let call = tokio::spawn(async move { client.get_me().await });

    let delivery = requests.next().await.unwrap().unwrap();
    let correlation_id = delivery.properties.correlation_id.clone().unwrap();
    assert_eq!(correlation_id.len(), 32);
    assert!(correlation_id.chars().all(|c| c.is_ascii_uppercase()));
    assert_eq!(
        delivery.properties.content_type.as_deref(),
        Some("application/json")
    );
    assert!(delivery.properties.reply_to.unwrap().starts_with("amq.gen-"));

    let request = RequestEnvelope::decode(&delivery.body).unwrap();
    assert_eq!(request.operation, "GetMe");
    assert_eq!(request.correlation_id, correlation_id);
    assert!(request.slots.is_empty());

    assert!(matches!(call.await.unwrap(), Err(RpcError::Timeout(_))));
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_is_message_to_me_degrades_to_false() {
    let harness = Harness::start(server_config()).await;
    let to_me = Message {
        text: format!("ping @{}", BOT_USERNAME),
        ..Default::default()
    };

    for fault in [
        Fault::OpenChannel,
        Fault::DeclareQueue,
        Fault::Consume,
        Fault::Publish,
    ] {
        harness.broker.inject_fault(fault);
        assert!(
            !harness.client.is_message_to_me(to_me.clone()).await,
            "{:?} did not degrade to false",
            fault
        );
    }

    // faults are one-shot, the next call goes through
    assert!(harness.client.is_message_to_me(to_me.clone()).await);
    assert!(logs_contain("IsMessageToMe failed, answering false"));

    harness.stop().await;

    let unserved = RemoteBot::new(
        Arc::new(MemoryBroker::new()),
        client_config(Duration::from_millis(100)),
    );
    assert!(!unserved.is_message_to_me(to_me).await);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_transport_errors_name_the_stage() {
    let broker = MemoryBroker::new();
    let client = RemoteBot::new(Arc::new(broker.clone()), client_config(Duration::from_secs(1)));

    for (fault, context) in [
        (Fault::OpenChannel, "failed to open a channel"),
        (Fault::DeclareQueue, "failed to declare a queue"),
        (Fault::Consume, "failed to register a consumer"),
        (Fault::Publish, "failed to publish a message"),
    ] {
        broker.inject_fault(fault);
        match client.get_me().await {
            Err(RpcError::Transport { context: c, .. }) => assert_eq!(c, context),
            other => panic!("unexpected result {:?}", other),
        }
    }
    assert_eq!(broker.open_channels(), 0);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_updates_stream_advances_offset() {
    let harness = Harness::start(server_config()).await;

    let ids: Vec<i64> = harness
        .client
        .updates(UpdateConfig::new(0))
        .take(3)
        .map(|u| u.update_id)
        .collect()
        .await;
    assert_eq!(ids, vec![1, 2, 3]);

    harness.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_long_poll_extends_call_deadline() {
    let broker = MemoryBroker::new();
    let connection = Arc::new(broker.clone());

    let mut registry: Registry<StubBot> = Registry::new();
    registry.register_unary(
        Operation::GetUpdates,
        slot::UPDATE_CONFIG,
        |_bot, config: UpdateConfig| async move {
            // hold the poll longer than the client timeout
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, RemoteError>(vec![Update {
                update_id: config.offset,
                ..Default::default()
            }])
        },
    );
    let dispatcher = Dispatcher::with_registry(
        connection.clone(),
        Arc::new(StubBot::default()),
        server_config(),
        registry,
    );
    let serving = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.serve().await })
    };
    wait_for_consumers(&broker, QUEUE, 1).await;

    let client = RemoteBot::new(connection, client_config(Duration::from_millis(200)));

    let short_poll = client.get_updates(UpdateConfig::new(5)).await.unwrap_err();
    assert!(short_poll.is_timeout(), "unexpected error {:?}", short_poll);

    let long_poll = UpdateConfig {
        timeout: 1,
        ..UpdateConfig::new(5)
    };
    let updates = client.get_updates(long_poll).await.unwrap();
    assert_eq!(updates[0].update_id, 5);

    dispatcher.shutdown().await;
    serving.await.unwrap().unwrap();
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_empty_short_polls_wait_between_calls() {
    let harness = Harness::start(server_config()).await;

    // no update past id 3, every poll comes back empty
    let mut updates = Box::pin(harness.client.updates(UpdateConfig::new(4)));
    let next = tokio::time::timeout(Duration::from_millis(100), updates.next()).await;
    assert!(next.is_err());
    drop(updates);

    // a 20ms poll interval allows a handful of polls in 100ms
    let polls = harness.bot.calls().len();
    assert!((1..=10).contains(&polls), "{} polls in 100ms", polls);

    harness.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_remote_bot_can_be_served_again() {
    let harness = Harness::start(server_config()).await;

    // an edge dispatcher forwarding to the first one through a RemoteBot
    let connection = Arc::new(harness.broker.clone());
    let edge = Dispatcher::new(
        connection.clone(),
        Arc::new(harness.client.clone()),
        server_config().with_request_queue("edge"),
    );
    let serving = {
        let edge = edge.clone();
        tokio::spawn(async move { edge.serve().await })
    };
    wait_for_consumers(&harness.broker, "edge", 1).await;

    let client = RemoteBot::new(
        connection,
        client_config(Duration::from_secs(2)).with_request_queue("edge"),
    );
    assert_eq!(client.get_me().await.unwrap(), StubBot::me());

    let err = client
        .get_chat(ChatConfig {
            chat_id: -1,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err.remote(), Some(RemoteError::Api(_))));

    edge.shutdown().await;
    serving.await.unwrap().unwrap();
    harness.stop().await;
}
