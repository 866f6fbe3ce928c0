use super::*;

/// Queries sent from API -> Bevy
pub enum ApiCommand {
    GetRuntime(tokio::sync::oneshot::Sender<RuntimeSnapshot>),
    /// Gameplay events with a sequence number above the given one.
    GetEvents(u64, tokio::sync::oneshot::Sender<Vec<GameEvent>>),
}

#[derive(Resource)]
pub struct ApiChannels {
    pub receiver: Receiver<ApiCommand>,
}

pub(super) fn process_api_commands(
    channels: Res<ApiChannels>,
    scene: Option<Res<bevy::prelude::State<Scene>>>,
    session: Option<Res<PlaySession>>,
    bus: Option<Res<GameEventBus>>,
) {
    while let Ok(cmd) = channels.receiver.try_recv() {
        match cmd {
            ApiCommand::GetRuntime(tx) => {
                let scene = scene.as_ref().map(|s| *s.get()).unwrap_or_default();
                let snapshot = match session.as_ref() {
                    Some(session) => crate::game_runtime::snapshot(scene, session),
                    None => crate::game_runtime::snapshot(scene, &PlaySession::default()),
                };
                let _ = tx.send(snapshot);
            }
            ApiCommand::GetEvents(since, tx) => {
                let events = bus
                    .as_ref()
                    .map(|bus| bus.since(since).cloned().collect())
                    .unwrap_or_default();
                let _ = tx.send(events);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_runtime::{Playlist, RuntimeStatePlugin, SceneRequest};

    fn setup_runtime_app(receiver: Receiver<ApiCommand>) -> App {
        let mut app = App::new();
        app.add_plugins(bevy::state::app::StatesPlugin)
            .add_plugins(RuntimeStatePlugin)
            .insert_resource(ApiChannels { receiver })
            .insert_resource(GameEventBus::default())
            .add_systems(Update, process_api_commands);
        app
    }

    #[test]
    fn runtime_snapshot_follows_the_session() {
        let (sender, receiver) = crossbeam_channel::unbounded::<ApiCommand>();
        let mut app = setup_runtime_app(receiver);
        app.update();

        let (tx, rx) = tokio::sync::oneshot::channel();
        sender.send(ApiCommand::GetRuntime(tx)).expect("send");
        app.update();
        let snapshot = rx.blocking_recv().expect("snapshot");
        assert_eq!(snapshot.scene, Scene::MainMenu);
        assert_eq!(snapshot.level_count, 0);

        let level = Level::default_for_theme("cave");
        app.world_mut().send_event(SceneRequest::PlayLevels {
            playlist: Playlist::authored(vec![level.clone(), level], Some("set-1".into())),
            start_index: 1,
        });
        app.update();
        app.update();

        let (tx, rx) = tokio::sync::oneshot::channel();
        sender.send(ApiCommand::GetRuntime(tx)).expect("send");
        app.update();
        let snapshot = rx.blocking_recv().expect("snapshot");
        assert_eq!(snapshot.scene, Scene::Play);
        assert_eq!(snapshot.level_index, 1);
        assert_eq!(snapshot.level_count, 2);
        assert_eq!(snapshot.set_id.as_deref(), Some("set-1"));
    }

    #[test]
    fn events_are_filtered_by_sequence() {
        let (sender, receiver) = crossbeam_channel::unbounded::<ApiCommand>();
        let mut app = setup_runtime_app(receiver);
        {
            let mut bus = app.world_mut().resource_mut::<GameEventBus>();
            bus.emit("coin_collected", serde_json::json!({ "coins": 1 }));
            bus.emit("player_died", serde_json::json!({ "cause": "fell" }));
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        sender.send(ApiCommand::GetEvents(1, tx)).expect("send");
        app.update();
        let events = rx.blocking_recv().expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "player_died");
    }
}
