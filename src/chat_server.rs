use std::collections::HashMap;

use actix::prelude::*;
use log::{debug, info};
use serde::Serialize;

use crate::models::{CalendarEvent, Message as ChatMessage, RequestStatus};

/// What gets pushed to a connected client, serialized as JSON text.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Notification {
    NewMessage {
        conversation_id: String,
        message: ChatMessage,
    },
    CollaborationRequest {
        request_id: String,
        project_id: String,
        sender_id: String,
    },
    CollaborationResolved {
        request_id: String,
        project_id: String,
        status: RequestStatus,
    },
    CalendarEvent {
        event: CalendarEvent,
    },
}

/// A serialized notification on its way to one session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Deliver(pub String);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub user_id: String,
    pub addr: Recipient<Deliver>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub user_id: String,
    pub addr: Recipient<Deliver>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Notify {
    pub user_ids: Vec<String>,
    pub notification: Notification,
}

/// Number of open sessions across all users.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct OnlineCount;

#[derive(Default)]
pub struct ChatServer {
    // a user may be connected from several tabs
    sessions: HashMap<String, Vec<Recipient<Deliver>>>,
}

impl ChatServer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for ChatServer {
    type Context = Context<Self>;
}

impl Handler<Connect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!("User {} connected (WS)", msg.user_id);
        self.sessions.entry(msg.user_id).or_default().push(msg.addr);
    }
}

impl Handler<Disconnect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!("User {} disconnected (WS)", msg.user_id);
        if let Some(addrs) = self.sessions.get_mut(&msg.user_id) {
            addrs.retain(|a| a != &msg.addr);
            if addrs.is_empty() {
                self.sessions.remove(&msg.user_id);
            }
        }
    }
}

impl Handler<Notify> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Notify, _: &mut Context<Self>) {
        let payload = match serde_json::to_string(&msg.notification) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Failed to serialize notification: {}", e);
                return;
            }
        };
        for user_id in &msg.user_ids {
            if let Some(addrs) = self.sessions.get(user_id) {
                debug!("Pushing notification to {} ({} sessions)", user_id, addrs.len());
                for addr in addrs {
                    addr.do_send(Deliver(payload.clone()));
                }
            }
        }
    }
}

impl Handler<OnlineCount> for ChatServer {
    type Result = usize;

    fn handle(&mut self, _: OnlineCount, _: &mut Context<Self>) -> usize {
        self.sessions.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Probe {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Actor for Probe {
        type Context = Context<Self>;
    }

    impl Handler<Deliver> for Probe {
        type Result = ();

        fn handle(&mut self, msg: Deliver, _: &mut Context<Self>) {
            self.seen.lock().unwrap().push(msg.0);
        }
    }

    #[actix_web::test]
    async fn notifications_reach_only_addressed_users() {
        let server = ChatServer::new().start();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = Probe { seen: seen.clone() }.start();
        server
            .send(Connect {
                user_id: "bob".into(),
                addr: probe.clone().recipient(),
            })
            .await
            .unwrap();
        assert_eq!(server.send(OnlineCount).await.unwrap(), 1);

        let notification = Notification::CollaborationRequest {
            request_id: "r1".into(),
            project_id: "p1".into(),
            sender_id: "alice".into(),
        };
        server
            .send(Notify {
                user_ids: vec!["carol".into()],
                notification: notification.clone(),
            })
            .await
            .unwrap();
        server
            .send(Notify {
                user_ids: vec!["bob".into()],
                notification,
            })
            .await
            .unwrap();
        // let the probe drain its mailbox
        actix_web::rt::time::sleep(std::time::Duration::from_millis(50)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("\"type\":\"collaboration_request\""));

        server.do_send(Disconnect {
            user_id: "bob".into(),
            addr: probe.recipient(),
        });
    }
}
