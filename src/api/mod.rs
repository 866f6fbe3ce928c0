mod commands;
mod helpers;
mod router;
mod routes_ai;
mod routes_play;
mod routes_sets;
mod security;
mod state;
pub mod types;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, patch, post, put},
    Json, Router,
};
use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use crate::bridge::{BridgeEvent, Direction, EventBridge};
use crate::designer::{Designer, DesignerError};
use crate::events::{GameEvent, GameEventBus};
use crate::game_runtime::{PlaySession, RuntimeSnapshot, Scene};
use crate::level::Level;
use crate::storage::{ColorPatch, Store, StoreError};
use commands::*;
use helpers::*;
use router::build_router;
use routes_ai::*;
use routes_play::*;
use routes_sets::*;
use security::*;
use state::*;
use types::*;

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:3000";

/// Serves the HTTP API on its own thread and answers its runtime queries
/// from the ECS world.
pub struct ApiPlugin {
    pub addr: String,
    pub designer: Designer,
    pub bridge: EventBridge,
}

impl Plugin for ApiPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<ApiCommand>();

        app.insert_resource(ApiChannels { receiver: rx })
            .add_systems(Update, process_api_commands);

        let state = AppState {
            sender: tx,
            store: self.designer.store().clone(),
            designer: self.designer.clone(),
            bridge: self.bridge.clone(),
        };
        let security = ApiSecurity::from_env();
        let addr = self.addr.clone();
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("[Markie API] Failed to start tokio runtime: {e}");
                    return;
                }
            };
            rt.block_on(async {
                let app = build_router(state, security);

                let listener = match tokio::net::TcpListener::bind(&addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!("[Markie API] Failed to bind {addr}: {e}");
                        return;
                    }
                };

                info!("[Markie API] Listening on http://{addr}");

                if let Err(e) = axum::serve(listener, app).await {
                    error!("[Markie API] Server stopped: {e}");
                }
            });
        });
    }
}
