#![allow(clippy::unwrap_used, clippy::expect_used)]

//! A bridge follows an invite-only room upgrade and brings its ghosts along.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    ghostbridge_config::{IntentOptions, UpgradeConfig},
    ghostbridge_intent::{
        Intent, MatrixClient,
        mock::{Call, CallLog, MockClient, Op, OpKind, forbidden},
    },
    ghostbridge_protocol::{RoomEvent, RoomId, UserId},
    ghostbridge_upgrade::{IntentDirectory, RoomMigrator, RoomUpgrade, RoomUpgradeHandler},
    serde_json::json,
};

const BOT: &str = "@bridge:example.org";
const GHOST: &str = "@irc_alice:example.org";
const OLD_ROOM: &str = "!old:example.org";
const NEW_ROOM: &str = "!new:example.org";

/// Bridge-side registry of intents, one per bridged identity.
struct Bridge {
    bot_client: Arc<MockClient>,
    bot: Arc<Intent>,
    ghosts: HashMap<UserId, Arc<Intent>>,
}

impl Bridge {
    fn new(log: &CallLog) -> (Self, Arc<MockClient>) {
        let bot_client = Arc::new(MockClient::new(BOT, log));
        let options = IntentOptions {
            registered: true,
            ..Default::default()
        };
        let bot = Arc::new(Intent::new(
            Arc::clone(&bot_client) as Arc<dyn MatrixClient>,
            Arc::clone(&bot_client) as Arc<dyn MatrixClient>,
            options.clone(),
        ));
        let ghost_client = Arc::new(MockClient::new(GHOST, log));
        let ghost = Arc::new(Intent::new(
            Arc::clone(&ghost_client) as Arc<dyn MatrixClient>,
            Arc::clone(&bot_client) as Arc<dyn MatrixClient>,
            options,
        ));
        let bridge = Self {
            bot_client,
            bot,
            ghosts: HashMap::from([(UserId::from(GHOST), ghost)]),
        };
        (bridge, ghost_client)
    }
}

impl IntentDirectory for Bridge {
    fn intent(&self, user_id: Option<&UserId>) -> Arc<Intent> {
        user_id
            .and_then(|id| self.ghosts.get(id))
            .map_or_else(|| Arc::clone(&self.bot), Arc::clone)
    }
}

/// Moves every known ghost of the old room into the new one.
struct GhostMigrator {
    directory: Arc<Bridge>,
    members: Mutex<HashMap<RoomId, Vec<UserId>>>,
}

#[async_trait]
impl RoomMigrator for GhostMigrator {
    async fn on_room_upgraded(&self, upgrade: &RoomUpgrade) -> anyhow::Result<()> {
        if !upgrade.migrate_ghosts {
            return Ok(());
        }
        let ghosts = self
            .members
            .lock()
            .unwrap()
            .remove(&upgrade.old_room_id)
            .unwrap_or_default();
        for ghost in &ghosts {
            let intent = self.directory.intent(Some(ghost));
            intent.leave(&upgrade.old_room_id).await?;
            intent.join(&upgrade.new_room_id).await?;
        }
        self.members
            .lock()
            .unwrap()
            .insert(upgrade.new_room_id.clone(), ghosts);
        Ok(())
    }
}

fn event(value: serde_json::Value) -> RoomEvent {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn invite_only_upgrade_moves_ghosts() {
    let log = CallLog::new();
    let (bridge, _ghost_client) = Bridge::new(&log);
    let bridge = Arc::new(bridge);
    let migrator = Arc::new(GhostMigrator {
        directory: Arc::clone(&bridge),
        members: Mutex::new(HashMap::from([(RoomId::from(OLD_ROOM), vec![
            UserId::from(GHOST),
        ])])),
    });
    let handler = RoomUpgradeHandler::new(
        UpgradeConfig::default(),
        Arc::clone(&bridge) as Arc<dyn IntentDirectory>,
        Arc::clone(&migrator) as Arc<dyn RoomMigrator>,
    );

    // The replacement room is invite-only at first.
    bridge
        .bot_client
        .respond(OpKind::Join, Err(forbidden("You are not invited to this room.")));

    let tombstone = event(json!({
        "event_id": "$tomb:example.org",
        "room_id": OLD_ROOM,
        "sender": "@admin:example.org",
        "type": "m.room.tombstone",
        "state_key": "",
        "content": {
            "body": "This room has been replaced",
            "replacement_room": NEW_ROOM
        }
    }));
    assert!(handler.on_tombstone(&tombstone).await);
    assert!(handler.pending_invites().contains_key(&RoomId::from(NEW_ROOM)));

    // The room admin invites the bridge bot.
    let invite = event(json!({
        "event_id": "$invite:example.org",
        "room_id": NEW_ROOM,
        "sender": "@admin:example.org",
        "type": "m.room.member",
        "state_key": BOT,
        "content": { "membership": "invite" }
    }));
    assert!(handler.on_invite(&invite).await);
    assert!(handler.pending_invites().is_empty());

    let new_room = RoomId::from(NEW_ROOM);
    assert_eq!(log.calls(), vec![
        Call::new(BOT, Op::Join(new_room.clone())),
        Call::new(BOT, Op::Join(new_room.clone())),
        Call::new(GHOST, Op::Leave(RoomId::from(OLD_ROOM))),
        Call::new(GHOST, Op::Join(new_room.clone())),
    ]);
    assert_eq!(
        migrator.members.lock().unwrap().get(&new_room),
        Some(&vec![UserId::from(GHOST)])
    );
}

#[tokio::test]
async fn ghosts_stay_when_migration_is_disabled() {
    let log = CallLog::new();
    let (bridge, _ghost_client) = Bridge::new(&log);
    let bridge = Arc::new(bridge);
    let migrator = Arc::new(GhostMigrator {
        directory: Arc::clone(&bridge),
        members: Mutex::new(HashMap::from([(RoomId::from(OLD_ROOM), vec![
            UserId::from(GHOST),
        ])])),
    });
    let handler = RoomUpgradeHandler::new(
        UpgradeConfig {
            migrate_ghosts: false,
            ..Default::default()
        },
        Arc::clone(&bridge) as Arc<dyn IntentDirectory>,
        Arc::clone(&migrator) as Arc<dyn RoomMigrator>,
    );

    let tombstone = event(json!({
        "room_id": OLD_ROOM,
        "type": "m.room.tombstone",
        "state_key": "",
        "content": { "replacement_room": NEW_ROOM }
    }));
    assert!(handler.on_tombstone(&tombstone).await);

    assert_eq!(log.calls(), vec![Call::new(
        BOT,
        Op::Join(RoomId::from(NEW_ROOM))
    )]);
    assert_eq!(log.count(GHOST, OpKind::Join), 0);
}
