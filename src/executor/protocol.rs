use async_trait::async_trait;

use super::Operation;
use super::SequencedChannel;
use crate::BackendKey;
use crate::BackendKeyRow;
use crate::ExecutorError;
use crate::FieldValues;
use crate::InstanceKey;
use crate::ObjectDescriptor;
use crate::Result;

/// Message sent to a backend speaking the backend protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolRequest {
    List {
        object: String,
    },
    Create {
        object: String,
        backend_key: BackendKey,
        fields: FieldValues,
    },
    Update {
        object: String,
        backend_key: BackendKey,
        fields: FieldValues,
    },
    Delete {
        object: String,
        backend_key: BackendKey,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolReply {
    Keys(Vec<BackendKey>),
    Done { restart: bool },
    Failed(String),
}

/// [`OpStyle::BackendProtocol`](crate::OpStyle::BackendProtocol) handler
/// exchanging sequenced messages with one backend.
pub struct ProtocolOperation {
    channel: SequencedChannel<ProtocolRequest, ProtocolReply>,
}

impl ProtocolOperation {
    pub fn new(channel: SequencedChannel<ProtocolRequest, ProtocolReply>) -> Self {
        Self { channel }
    }

    async fn mutate(
        &self,
        object: &ObjectDescriptor,
        verb: &'static str,
        request: ProtocolRequest,
    ) -> Result<bool> {
        match self.channel.call(request).await? {
            ProtocolReply::Done { restart } => Ok(restart),
            ProtocolReply::Failed(message) => Err(ExecutorError::Failed {
                object: object.name.clone(),
                verb,
                message,
            }
            .into()),
            ProtocolReply::Keys(_) => Err(self.unexpected(object, verb)),
        }
    }

    fn unexpected(
        &self,
        object: &ObjectDescriptor,
        verb: &'static str,
    ) -> crate::Error {
        ExecutorError::Failed {
            object: object.name.clone(),
            verb,
            message: format!("unexpected reply from {}", self.channel.backend()),
        }
        .into()
    }
}

#[async_trait]
impl Operation for ProtocolOperation {
    async fn list(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Vec<BackendKeyRow>> {
        let request = ProtocolRequest::List {
            object: object.name.clone(),
        };
        match self.channel.call(request).await? {
            ProtocolReply::Keys(keys) => Ok(keys.into_iter().map(BackendKeyRow::new).collect()),
            ProtocolReply::Failed(message) => Err(ExecutorError::Failed {
                object: object.name.clone(),
                verb: "list",
                message,
            }
            .into()),
            ProtocolReply::Done { .. } => Err(self.unexpected(object, "list")),
        }
    }

    async fn create(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
        fields: &FieldValues,
    ) -> Result<bool> {
        let request = ProtocolRequest::Create {
            object: object.name.clone(),
            backend_key: backend_key.clone(),
            fields: fields.clone(),
        };
        self.mutate(object, "create", request).await
    }

    async fn update(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
        fields: &FieldValues,
    ) -> Result<bool> {
        let request = ProtocolRequest::Update {
            object: object.name.clone(),
            backend_key: backend_key.clone(),
            fields: fields.clone(),
        };
        self.mutate(object, "update", request).await
    }

    async fn delete(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
    ) -> Result<bool> {
        let request = ProtocolRequest::Delete {
            object: object.name.clone(),
            backend_key: backend_key.clone(),
        };
        self.mutate(object, "delete", request).await
    }
}
