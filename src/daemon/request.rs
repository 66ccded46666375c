use std::collections::BTreeSet;
use std::fmt;

use tokio::sync::oneshot;
use tracing::debug;

use crate::CascadeReport;
use crate::DiscoverReport;
use crate::Error;
use crate::ErrorCode;
use crate::FieldValues;
use crate::InstanceKey;
use crate::WriteKind;

/// What a front-end asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Reads stored values; an empty `params` returns every field
    GetValue {
        object: String,
        key: InstanceKey,
        params: Vec<String>,
    },
    SetValue {
        object: String,
        key: InstanceKey,
        fields: FieldValues,
    },
    AddObject {
        object: String,
        parent_key: InstanceKey,
        fields: FieldValues,
    },
    DeleteObject {
        object: String,
        key: InstanceKey,
    },
    /// Reconciles the named objects, every object when empty
    DiscoverConfig {
        objects: Vec<String>,
    },
}

impl RequestKind {
    /// Lock kind of write-class requests, `None` for reads.
    pub fn write_kind(&self) -> Option<WriteKind> {
        match self {
            RequestKind::GetValue { .. } => None,
            RequestKind::SetValue { .. } => Some(WriteKind::SetValue),
            RequestKind::AddObject { .. } => Some(WriteKind::AddObject),
            RequestKind::DeleteObject { .. } => Some(WriteKind::DeleteObject),
            RequestKind::DiscoverConfig { .. } => Some(WriteKind::DiscoverConfig),
        }
    }

    pub fn is_write_class(&self) -> bool {
        self.write_kind().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self.write_kind() {
            Some(kind) => kind.as_str(),
            None => "get_value",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            RequestKind::GetValue { object, key, .. } => write!(f, "get {object}[{key}]"),
            RequestKind::SetValue { object, key, .. } => write!(f, "set {object}[{key}]"),
            RequestKind::AddObject { object, parent_key, .. } => write!(f, "add {object} under [{parent_key}]"),
            RequestKind::DeleteObject { object, key } => write!(f, "delete {object}[{key}]"),
            RequestKind::DiscoverConfig { objects } if objects.is_empty() => f.write_str("discover all"),
            RequestKind::DiscoverConfig { objects } => write!(f, "discover {}", objects.join(",")),
        }
    }
}

/// A request travelling from the dispatcher to a worker.
#[derive(Debug)]
pub struct Request {
    pub txn_id: u64,
    pub caller_id: u32,
    pub kind: RequestKind,
    reply: Option<oneshot::Sender<Response>>,
}

impl Request {
    /// Request whose response is delivered on the returned receiver.
    pub fn new(
        txn_id: u64,
        caller_id: u32,
        kind: RequestKind,
    ) -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            txn_id,
            caller_id,
            kind,
            reply: Some(tx),
        };
        (request, rx)
    }

    /// Request nobody waits on.
    pub fn detached(
        txn_id: u64,
        caller_id: u32,
        kind: RequestKind,
    ) -> Self {
        Self {
            txn_id,
            caller_id,
            kind,
            reply: None,
        }
    }

    pub(crate) fn respond(
        &mut self,
        response: Response,
    ) {
        if let Some(tx) = self.reply.take() {
            if tx.send(response).is_err() {
                debug!("txn {}: requester went away before the response", self.txn_id);
            }
        }
    }
}

/// Outcome reported back to the requester.
#[derive(Debug, Clone)]
pub struct Response {
    pub txn_id: u64,
    pub code: ErrorCode,
    pub values: FieldValues,
    /// Key of the instance an AddObject created
    pub new_key: Option<InstanceKey>,
    /// Cascade performed by add/delete, partial when `code` is not Ok
    pub cascade: Option<CascadeReport>,
    pub discover: Option<DiscoverReport>,
    pub restart_backends: BTreeSet<String>,
    pub message: Option<String>,
}

impl Response {
    pub fn ok(txn_id: u64) -> Self {
        Self {
            txn_id,
            code: ErrorCode::Ok,
            values: FieldValues::new(),
            new_key: None,
            cascade: None,
            discover: None,
            restart_backends: BTreeSet::new(),
            message: None,
        }
    }

    pub fn from_error(
        txn_id: u64,
        error: &Error,
    ) -> Self {
        let mut response = Self::ok(txn_id);
        response.code = error.code();
        response.message = Some(error.to_string());
        if let Error::Cascade(abort) = error {
            response.restart_backends = abort.partial.restart_backends.clone();
            response.cascade = Some(abort.partial.clone());
        }
        response
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok
    }
}
