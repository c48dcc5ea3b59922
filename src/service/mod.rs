//! Services that handle the calls received by the RPC server
mod dispatch;
mod done;

pub use dispatch::{dispatch, Outcome};
pub use done::{Closure, Done};

use prost::Message;
use std::sync::Arc;

use crate::proto::{error_code, EchoRequest, EchoResponse, OpCode, ECHO_METHOD};
use crate::KvsEngine;

/// Interface of a service that can be registered with the RPC server
pub trait Service: Send + Sync + 'static {
    /// Return `true` if the service implements the method
    fn has_method(&self, method: &str) -> bool;

    /// Handle one call to `method`.
    ///
    /// `request` holds the encoded request message, the encoded response message is written into
    /// `response`. The handler must let `done` signal the completion exactly once, on every path.
    fn call(
        &self,
        method: &str,
        cntl: &mut Controller,
        request: &[u8],
        response: &mut Vec<u8>,
        done: Done,
    );
}

/// Per-call state shared between the transport and the service
#[derive(Debug, Default)]
pub struct Controller {
    peer: String,
    request_attachment: Vec<u8>,
    response_attachment: Vec<u8>,
    failure: Option<(i32, String)>,
}

impl Controller {
    /// Create the controller of a call that carries the given attachment
    pub fn new<S>(peer: S, request_attachment: Vec<u8>) -> Self
    where
        S: Into<String>,
    {
        Self {
            peer: peer.into(),
            request_attachment,
            ..Self::default()
        }
    }

    /// Description of the remote side
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Bytes attached to the request
    pub fn request_attachment(&self) -> &[u8] {
        &self.request_attachment
    }

    /// Bytes that will be attached to the response
    pub fn response_attachment(&self) -> &[u8] {
        &self.response_attachment
    }

    /// Append the request attachment to the response attachment
    pub fn echo_attachment(&mut self) {
        self.response_attachment
            .extend_from_slice(&self.request_attachment);
    }

    /// Mark the call as failed at the transport level
    pub fn set_failed<S>(&mut self, code: i32, text: S)
    where
        S: Into<String>,
    {
        self.failure = Some((code, text.into()));
    }

    /// Return the transport error code and its text if the call failed
    pub fn failure(&self) -> Option<(i32, &str)> {
        self.failure
            .as_ref()
            .map(|(code, text)| (*code, text.as_str()))
    }

    /// Take out the response attachment, leaving it empty
    pub fn take_response_attachment(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.response_attachment)
    }
}

/// Exposes a key-value store through the `Echo` method
#[derive(Debug)]
pub struct EchoService<E>
where
    E: KvsEngine,
{
    engine: Arc<E>,
    echo_attachment: bool,
    logger: slog::Logger,
}

impl<E> EchoService<E>
where
    E: KvsEngine,
{
    /// Create a service that applies requests to the engine. If `echo_attachment` is set, the
    /// request attachment is sent back as the response attachment.
    pub fn new<L>(engine: Arc<E>, echo_attachment: bool, logger: Option<L>) -> Self
    where
        L: Into<slog::Logger>,
    {
        let logger = logger
            .map(|l| l.into())
            .unwrap_or_else(|| slog::Logger::root(slog::Discard, o!()));
        Self {
            engine,
            echo_attachment,
            logger,
        }
    }
}

impl<E> Service for EchoService<E>
where
    E: KvsEngine,
{
    fn has_method(&self, method: &str) -> bool {
        method == ECHO_METHOD
    }

    fn call(
        &self,
        _method: &str,
        cntl: &mut Controller,
        request: &[u8],
        response: &mut Vec<u8>,
        done: Done,
    ) {
        let _done_guard = done;
        let logger = self.logger.new(o!("peer" => cntl.peer().to_string()));

        let request = match EchoRequest::decode(request) {
            Ok(request) => request,
            Err(err) => {
                error!(logger, "Could not decode request"; "error" => %err);
                cntl.set_failed(error_code::EREQUEST, err.to_string());
                return;
            }
        };
        let op = OpCode::from(request.op);
        debug!(logger, "Received request"; "op" => %op, "key_len" => request.key.len());

        let outcome = dispatch(&*self.engine, op, &request.key, &request.value, &logger);
        let reply = EchoResponse {
            status: outcome.status.map(i32::from).unwrap_or_default(),
            value: outcome.value.unwrap_or_default(),
        };
        if let Err(err) = reply.encode(response) {
            error!(logger, "Could not encode response"; "error" => %err);
            cntl.set_failed(error_code::EINTERNAL, err.to_string());
            return;
        }

        if self.echo_attachment {
            cntl.echo_attachment();
        }
    }
}
