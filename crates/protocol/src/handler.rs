// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dispatch of verified messages to per-kind handlers.
//!
//! Receivers register one handler per [`MessageKind`]; dispatch of a kind
//! nobody registered is a structured `handler_not_registered` error rather
//! than a panic or a silent drop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::envelope::MessageKind;

#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    #[error("No handler registered for message kind {0}")]
    NotRegistered(MessageKind),

    #[error("Handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotRegistered(_) => "handler_not_registered",
            Self::Failed(_) => "internal",
        }
    }
}

/// Uniform handler signature: payload in, payload or error out.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> Result<Value, HandlerError>;
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<MessageKind, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: MessageKind, handler: Arc<dyn MessageHandler>) {
        info!(kind = %kind, "Registered message handler");
        self.handlers.insert(kind, handler);
    }

    pub async fn dispatch(&self, kind: MessageKind, payload: Value) -> Result<Value, HandlerError> {
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(HandlerError::NotRegistered(kind))?;
        handler.handle(payload).await
    }
}
