use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, warn};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::validate_jwt;
use crate::chat_server::{ChatServer, Connect, Deliver, Disconnect};
use crate::error::ApiError;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
pub struct WsAuth {
    pub token: String,
}

pub struct WebSocketConnection {
    pub user_id: String,
    pub hb: Instant,
    pub addr: Addr<ChatServer>,
}

impl WebSocketConnection {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("WebSocket heartbeat failed for {}, disconnecting", act.user_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WebSocketConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.addr
            .send(Connect {
                user_id: self.user_id.clone(),
                addr: ctx.address().recipient(),
            })
            .into_actor(self)
            .then(|res, _act, ctx| {
                if res.is_err() {
                    warn!("Failed to register with chat server");
                    ctx.stop();
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.addr.do_send(Disconnect {
            user_id: self.user_id.clone(),
            addr: ctx.address().recipient(),
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                // the channel is push-only; any client text counts as liveness
                self.hb = Instant::now();
                debug!("Ignoring client text from {}: {}", self.user_id, text);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("WebSocket error for {}: {}", self.user_id, e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<Deliver> for WebSocketConnection {
    type Result = ();

    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

/// GET /ws?token=<jwt>
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    query: web::Query<WsAuth>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = validate_jwt(&query.token, &data.config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?;
    ws::start(
        WebSocketConnection {
            user_id: claims.sub,
            hb: Instant::now(),
            addr: data.chat_server.clone(),
        },
        &req,
        stream,
    )
}
