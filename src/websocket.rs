use crate::error::{AppError, AppResult};
use crate::models::{Account, ChatMessage, ThreadKind};
use crate::presence::PresenceRouter;
use crate::services::MessagingService;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Messages clients send to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsRequest {
    #[serde(rename = "identify", rename_all = "camelCase")]
    Identify { user_id: String },
    #[serde(rename = "joinLessonManagement", rename_all = "camelCase")]
    JoinLessonManagement { teacher_name: String },
    #[serde(rename = "sendMessage", rename_all = "camelCase")]
    SendMessage {
        sender_id: String,
        recipient_id: String,
        message_content: String,
    },
}

/// Messages the server pushes to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsEvent {
    #[serde(rename = "identified")]
    Identified { success: bool },
    #[serde(rename = "lessonManagementJoined", rename_all = "camelCase")]
    LessonManagementJoined { teacher_name: String },
    #[serde(rename = "messageAck")]
    MessageAck {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "checkingAccountUpdate")]
    CheckingAccountUpdate { account: Account },
    #[serde(rename = "savingsAccountUpdate")]
    SavingsAccountUpdate { account: Account },
    #[serde(rename = "timeTravelAccountUpdate")]
    TimeTravelAccountUpdate { account: Account },
    #[serde(rename = "newMessage", rename_all = "camelCase")]
    NewMessage {
        thread_id: String,
        thread_type: ThreadKind,
        message: ChatMessage,
    },
    #[serde(rename = "studentAdded", rename_all = "camelCase")]
    StudentAdded {
        member_name: String,
        teacher: String,
        class_period: i32,
    },
    #[serde(rename = "lessonManagementRefresh")]
    LessonManagementRefresh,
    #[serde(rename = "lessonManagementUpdate", rename_all = "camelCase")]
    LessonManagementUpdate {
        teacher_name: String,
        action: String,
        data: serde_json::Value,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// The group a teacher's lesson management dashboards join
pub fn lesson_management_group(teacher_name: &str) -> String {
    format!("lessonManagement-{}", teacher_name)
}

/// WebSocket server: accepts connections, speaks the JSON protocol, and
/// feeds presence registration and messaging.
pub struct WebSocketServer {
    router: Arc<PresenceRouter>,
    messaging: Arc<MessagingService>,
}

impl WebSocketServer {
    pub fn new(router: Arc<PresenceRouter>, messaging: Arc<MessagingService>) -> Self {
        Self { router, messaging }
    }

    /// Drive one client connection to completion.
    ///
    /// The outbound half is pumped by a spawned task fed from the presence
    /// router's channel; the read loop runs here so presence cleanup happens
    /// exactly once when the connection ends.
    pub async fn handle_connection(&self, stream: tokio::net::TcpStream) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let conn_id = Uuid::new_v4();
        info!("New WebSocket connection: {}", conn_id);

        let (tx, mut rx) = mpsc::unbounded_channel::<WsEvent>();
        self.router.register_connection(conn_id, tx.clone()).await;

        // Outbound pump: serialize queued events onto the socket
        let writer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize outbound event: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(Message::Text(json)).await {
                    warn!("Failed to send to connection {}: {}", conn_id, e);
                    break;
                }
            }
        });

        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    self.handle_request(conn_id, &tx, &text).await;
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket connection closed: {}", conn_id);
                    break;
                }
                Err(e) => {
                    error!("WebSocket error on {}: {}", conn_id, e);
                    break;
                }
                _ => {}
            }
        }

        // Presence cleanup runs once, whatever ended the read loop
        self.router.remove(conn_id).await;
        drop(tx);
        writer.await.ok();
        Ok(())
    }

    async fn handle_request(
        &self,
        conn_id: Uuid,
        tx: &mpsc::UnboundedSender<WsEvent>,
        text: &str,
    ) {
        let request = match serde_json::from_str::<WsRequest>(text) {
            Ok(request) => request,
            Err(_) => {
                warn!("Unparseable message from connection {}: {}", conn_id, text);
                let _ = tx.send(WsEvent::Error {
                    message: "Invalid message format".to_string(),
                });
                return;
            }
        };

        match request {
            WsRequest::Identify { user_id } => {
                self.router.identify(&user_id, conn_id).await;
                info!("Connection {} identified as '{}'", conn_id, user_id);
                let _ = tx.send(WsEvent::Identified { success: true });
            }
            WsRequest::JoinLessonManagement { teacher_name } => {
                let group = lesson_management_group(&teacher_name);
                self.router.join_group(&group, conn_id).await;
                let _ = tx.send(WsEvent::LessonManagementJoined { teacher_name });
            }
            WsRequest::SendMessage {
                sender_id,
                recipient_id,
                message_content,
            } => {
                match self
                    .messaging
                    .post_message(&sender_id, &recipient_id, &message_content)
                    .await
                {
                    Ok(_) => {
                        let _ = tx.send(WsEvent::MessageAck {
                            success: true,
                            error: None,
                        });
                    }
                    Err(e) => {
                        warn!("sendMessage from '{}' failed: {}", sender_id, e);
                        let _ = tx.send(WsEvent::MessageAck {
                            success: false,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }
    }
}
