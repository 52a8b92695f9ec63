use std::sync::Arc;

use application::{ChatService, ConnectionRegistry};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub registry: ConnectionRegistry,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        registry: ConnectionRegistry,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            chat_service,
            registry,
            jwt_service,
        }
    }
}
