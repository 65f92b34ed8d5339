//! End-to-end lookup behaviour: cache, remote catalog and batch handling

mod common;

use amoeboid_core::{
    compositor, AmoeboidError, BotConfig, CacheLookup, CardService, Database, MessageContext,
    MessageOutcome, Query, Reply,
};
use chrono::{Duration, Utc};
use common::{harness, harness_with, normal_card, RecordingBackend};
use serde_json::json;
use std::sync::Arc;

fn message(content: &str) -> MessageContext {
    MessageContext {
        server_id: Some("1000".into()),
        content: content.into(),
        author_is_bot: false,
    }
}

fn bolt() -> serde_json::Value {
    normal_card("Lightning Bolt", "Instant", &["R"])
}

#[tokio::test]
async fn test_single_mention_with_empty_cache_fetches_once() {
    let h = harness(RecordingBackend::default().with_card(bolt()));

    let cards = h
        .service
        .get_canonical_cards(&[Query::new("Lightning Bolt")])
        .await
        .unwrap();

    assert_eq!(cards.len(), 1);
    assert!(cards[0].type_line.as_deref().unwrap().contains("Instant"));
    assert_eq!(h.backend.named_calls(), 1);
    assert_eq!(
        h.backend.calls(),
        vec!["named:Lightning Bolt", "image:https://img.test/lightning-bolt.png"]
    );

    let entry = h.service.cache().get("Lightning Bolt").unwrap().unwrap();
    assert_eq!(h.service.cache().len().unwrap(), 1);
    assert!(Utc::now() - entry.last_refreshed < Duration::minutes(1));
}

#[tokio::test]
async fn test_message_reply_for_single_mention() {
    let h = harness(RecordingBackend::default().with_card(bolt()));

    let outcome = h
        .service
        .handle_message(&message("I love [[Lightning Bolt]]"))
        .await
        .unwrap();

    let MessageOutcome::Reply(reply) = outcome else {
        panic!("expected a reply, got {outcome:?}");
    };
    let embed = reply.embed.expect("single card replies carry an embed");
    assert_eq!(embed.title, "Lightning Bolt");
    assert_eq!(embed.field_value("Type:"), Some("Instant"));
    assert_eq!(embed.field_value("Cost:"), Some("**🔴**"));
    assert_eq!(embed.field_value("Set:"), Some("[M10] Magic 2010"));
    assert_eq!(embed.field_value("Prices:"), Some("Normal: 1.00 USD\nFoil: N/A"));
    assert!(embed
        .description
        .as_deref()
        .unwrap()
        .starts_with("Lightning Bolt does something."));
    assert!(reply.attachment.is_some());
    assert_eq!(h.backend.named_calls(), 1);
}

#[tokio::test]
async fn test_fresh_cache_hit_makes_no_network_calls() {
    let h = harness(RecordingBackend::default());
    h.service
        .cache()
        .upsert("Lightning Bolt", &bolt(), &common::png(8, 8, 1))
        .unwrap();

    let cards = h
        .service
        .get_canonical_cards(&[Query::new("lightning bolt"), Query::new("Lightning Bolt")])
        .await
        .unwrap();

    assert_eq!(cards.len(), 2);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_too_many_mentions_rejected_before_any_fetch() {
    let h = harness(RecordingBackend::default().with_card(bolt()));
    let content: String = (0..11).map(|_| "[[Lightning Bolt]] ").collect();

    let outcome = h.service.handle_message(&message(&content)).await.unwrap();

    assert_eq!(
        outcome,
        MessageOutcome::Reply(Reply::text("Please request 10 or less cards at a time."))
    );
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_bad_parameters_rejected_before_any_fetch() {
    let h = harness(RecordingBackend::default().with_card(bolt()));

    let outcome = h
        .service
        .handle_message(&message("[[Lightning Bolt; m10]]"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        MessageOutcome::Reply(Reply::text("Invalid formatting of parameters."))
    );
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_parameters_always_go_remote_and_are_forwarded() {
    let h = harness(RecordingBackend::default().with_card(bolt()));
    h.service
        .cache()
        .upsert("Lightning Bolt", &bolt(), &common::png(8, 8, 1))
        .unwrap();

    let query = Query::new("Lightning Bolt")
        .with_parameter("set", "m10")
        .with_parameter("frame", "old");
    assert_eq!(
        h.service.cache().lookup("Lightning Bolt", &query).unwrap(),
        CacheLookup::Miss
    );

    h.service.get_cards(&[query]).await.unwrap();
    assert_eq!(h.backend.calls()[0], "named:Lightning Bolt?set=m10");
}

#[tokio::test]
async fn test_batch_preserves_order_and_skips_missing() {
    let backend = RecordingBackend::default()
        .with_card(bolt())
        .with_card(normal_card("Shock", "Instant", &["R"]))
        .with_card(normal_card("Opt", "Instant", &["U"]));
    let h = harness(backend);

    let queries = vec![
        Query::new("Opt"),
        Query::new("Not A Real Card"),
        Query::new("Lightning Bolt"),
        Query::new("Shock"),
    ];
    let cards = h.service.get_cards(&queries).await.unwrap();

    let names: Vec<_> = cards.iter().map(|c| c.canonical_name.as_str()).collect();
    assert_eq!(names, vec!["Opt", "Lightning Bolt", "Shock"]);
}

fn transform_card(name: &str, front: &str, back: &str) -> serde_json::Value {
    json!({
        "name": name,
        "layout": "transform",
        "type_line": "Creature",
        "color_identity": ["U"],
        "card_faces": [
            {"name": "Front", "mana_cost": "{U}", "image_uris": {"normal": front}},
            {"name": "Back", "mana_cost": "", "image_uris": {"normal": back}}
        ]
    })
}

#[tokio::test]
async fn test_undecodable_face_image_skips_only_that_card() {
    let backend = RecordingBackend::default()
        .with_card(normal_card("Opt", "Instant", &["U"]))
        .with_card(transform_card(
            "Broken // Faces",
            "https://img.test/broken-front.png",
            "https://img.test/broken-back.png",
        ))
        .with_card(bolt())
        .with_image("https://img.test/broken-back.png", b"<html>oops</html>");
    let h = harness(backend);

    let queries = vec![
        Query::new("Opt"),
        Query::new("Broken // Faces"),
        Query::new("Lightning Bolt"),
    ];
    let cards = h.service.get_cards(&queries).await.unwrap();

    let names: Vec<_> = cards.iter().map(|c| c.canonical_name.as_str()).collect();
    assert_eq!(names, vec!["Opt", "Lightning Bolt"]);
    assert!(h.service.cache().get("Broken // Faces").unwrap().is_none());

    let outcome = h
        .service
        .handle_message(&message("[[Opt]] [[Broken // Faces]]"))
        .await
        .unwrap();
    let MessageOutcome::Reply(reply) = outcome else {
        panic!("expected a reply");
    };
    assert_eq!(reply.embed.unwrap().title, "Opt");
}

#[tokio::test]
async fn test_malformed_record_is_skipped_between_good_cards() {
    let mut odd = normal_card("Odd Thing", "Artifact", &[]);
    odd["layout"] = json!("art_series");
    let backend = RecordingBackend::default()
        .with_card(normal_card("Opt", "Instant", &["U"]))
        .with_card(odd)
        .with_card(bolt());
    let h = harness(backend);

    let cards = h
        .service
        .get_canonical_cards(&[
            Query::new("Opt"),
            Query::new("Odd Thing"),
            Query::new("Lightning Bolt"),
        ])
        .await
        .unwrap();
    let names: Vec<_> = cards.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Opt", "Lightning Bolt"]);

    let outcome = h
        .service
        .handle_message(&message("[[Opt]] [[Odd Thing]] [[Lightning Bolt]]"))
        .await
        .unwrap();
    let MessageOutcome::Reply(reply) = outcome else {
        panic!("expected a reply");
    };
    assert_eq!(
        reply.text.as_deref(),
        Some("Retrieved 2 cards. Call a single card for more details.")
    );
    assert_eq!(reply.attachment.unwrap().filename, "cards.png");
}

#[tokio::test]
async fn test_corrupt_cache_row_is_refetched() {
    let h = harness(RecordingBackend::default().with_card(bolt()));
    h.service.get_cards(&[Query::new("Lightning Bolt")]).await.unwrap();

    let conn = rusqlite::Connection::open(&h.db_path).unwrap();
    conn.execute("UPDATE cards SET raw_card = '{not json'", [])
        .unwrap();
    drop(conn);

    let cards = h.service.get_cards(&[Query::new("Lightning Bolt")]).await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(h.backend.named_calls(), 2);
    let entry = h.service.cache().get("Lightning Bolt").unwrap().unwrap();
    assert_eq!(entry.raw_record["name"], "Lightning Bolt");
}

#[tokio::test]
async fn test_multi_card_message_gets_composite_image() {
    let backend = RecordingBackend::default()
        .with_card(bolt())
        .with_card(normal_card("Shock", "Instant", &["R"]))
        .with_card(normal_card("Opt", "Instant", &["U"]));
    let h = harness(backend);

    let outcome = h
        .service
        .handle_message(&message("[[Opt]] [[Shock]] [[Lightning Bolt]] [[Nope]]"))
        .await
        .unwrap();

    let MessageOutcome::Reply(reply) = outcome else {
        panic!("expected a reply");
    };
    assert_eq!(
        reply.text.as_deref(),
        Some("Retrieved 3 cards. Call a single card for more details.")
    );
    assert!(reply.embed.is_none());

    let attachment = reply.attachment.unwrap();
    assert_eq!(attachment.filename, "cards.png");
    let image = compositor::decode(&attachment.bytes).unwrap();
    // three 16x22 cards in one strip
    assert_eq!((image.width(), image.height()), (3 * 16 + 4 * 10, 22 + 2 * 10));
}

#[tokio::test]
async fn test_no_matches_reply() {
    let h = harness(RecordingBackend::default());
    let outcome = h
        .service
        .handle_message(&message("[[Nope]]"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MessageOutcome::Reply(Reply::text("Could not find any cards."))
    );
}

#[tokio::test]
async fn test_stale_entry_is_refreshed_in_place() {
    let h = harness(RecordingBackend::default().with_card(bolt()));
    let old = Utc::now() - Duration::hours(30);
    h.service
        .cache()
        .upsert_at("Lightning Bolt", &json!({"name": "Lightning Bolt", "layout": "normal"}), b"old", old)
        .unwrap();

    let cards = h.service.get_cards(&[Query::new("Lightning Bolt")]).await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(h.backend.named_calls(), 1);
    let entry = h.service.cache().get("Lightning Bolt").unwrap().unwrap();
    assert!(entry.last_refreshed > old);
    assert_ne!(entry.image_bytes, b"old".to_vec());
    assert_eq!(h.service.cache().len().unwrap(), 1);
}

#[tokio::test]
async fn test_stale_entry_served_on_transient_failure() {
    let h = harness(RecordingBackend::default().with_card(bolt()));
    let old = Utc::now() - Duration::hours(30);
    h.service
        .cache()
        .upsert_at("Lightning Bolt", &bolt(), b"old", old)
        .unwrap();
    h.backend.fail_all();

    let cards = h.service.get_cards(&[Query::new("Lightning Bolt")]).await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].image_bytes, b"old".to_vec());
    let entry = h.service.cache().get("Lightning Bolt").unwrap().unwrap();
    assert_eq!(entry.last_refreshed.timestamp(), old.timestamp());
}

#[tokio::test]
async fn test_transient_failure_without_fallback_is_skipped() {
    let config = BotConfig {
        serve_stale_on_error: false,
        ..Default::default()
    };
    let h = harness_with(RecordingBackend::default().with_card(bolt()), config);
    h.service
        .cache()
        .upsert_at("Lightning Bolt", &bolt(), b"old", Utc::now() - Duration::hours(30))
        .unwrap();
    h.backend.fail_all();

    let err = h
        .service
        .get_card(&Query::new("Lightning Bolt"))
        .await
        .unwrap_err();
    assert!(matches!(err, AmoeboidError::Transient(_)));

    let cards = h.service.get_cards(&[Query::new("Lightning Bolt")]).await.unwrap();
    assert!(cards.is_empty());
}

#[tokio::test]
async fn test_faces_without_card_image_are_stitched() {
    let transform = json!({
        "name": "Delver of Secrets // Insectile Aberration",
        "layout": "transform",
        "type_line": "Creature — Human Wizard // Creature — Human Insect",
        "color_identity": ["U"],
        "card_faces": [
            {"name": "Delver of Secrets", "mana_cost": "{U}", "power": "1", "toughness": "1",
             "image_uris": {"normal": "https://img.test/delver-front.png"}},
            {"name": "Insectile Aberration", "mana_cost": "", "power": "3", "toughness": "2",
             "image_uris": {"normal": "https://img.test/delver-back.png"}}
        ]
    });
    let h = harness(RecordingBackend::default().with_card(transform));

    let cards = h
        .service
        .get_canonical_cards(&[Query::new("Delver of Secrets // Insectile Aberration")])
        .await
        .unwrap();

    assert_eq!(cards.len(), 1);
    let card = &cards[0];
    assert_eq!(card.image_url, "https://img.test/delver-front.png");
    assert_eq!(card.power.as_deref(), Some("1"));
    let image = compositor::decode(&card.image_bytes).unwrap();
    assert_eq!((image.width(), image.height()), (16 + 16 + 3 * 10, 22));
}

#[tokio::test]
async fn test_cache_and_settings_survive_restart() {
    let h = harness(RecordingBackend::default().with_card(bolt()));
    h.service.get_cards(&[Query::new("Lightning Bolt")]).await.unwrap();
    h.service.settings().set_prefix("1000", "!!").unwrap();

    let backend = Arc::new(RecordingBackend::default());
    let db = Arc::new(Database::open(&h.db_path).unwrap());
    let reopened = CardService::new(
        BotConfig {
            db_path: h.db_path.clone(),
            ..Default::default()
        },
        db,
        Box::new(Arc::clone(&backend)),
    )
    .unwrap();

    let cards = reopened.get_cards(&[Query::new("Lightning Bolt")]).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert!(backend.calls().is_empty());
    assert_eq!(reopened.settings().get_prefix("1000").unwrap(), "!!");
}
