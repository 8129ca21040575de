use super::transport::Transport;
use super::types::{Binding, Response, WalkResult};
use crate::error::{ProtocolError, SnmpResult};
use crate::oid::OidPath;

/// GET and WALK on top of a single-attempt transport.
///
/// Every request gets `retries` extra attempts after a timeout. Other errors
/// are returned immediately.
pub struct QueryEngine<T> {
    transport: T,
    retries: u32,
}

impl<T: Transport> QueryEngine<T> {
    pub fn new(transport: T, retries: u32) -> Self {
        Self { transport, retries }
    }

    /// Fetch a single object.
    pub fn get(&mut self, oid: &OidPath) -> SnmpResult<Binding> {
        let response = self.with_retry(oid, |transport, oid| transport.get(oid))?;

        response
            .check_status()?
            .bindings
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::MalformedResponse("No varbinds in response".into()))
    }

    /// Walk the subtree under `root` with GET-NEXT.
    ///
    /// An error at any point discards what was collected so far and the walk
    /// comes back empty, so an empty result may mean either an empty table or
    /// a failed walk.
    pub fn walk(&mut self, root: &OidPath) -> WalkResult {
        match self.try_walk(root) {
            Ok(bindings) => bindings,
            Err(e) => {
                tracing::warn!("Walk of {} failed, discarding partial result: {}", root, e);
                Vec::new()
            }
        }
    }

    fn try_walk(&mut self, root: &OidPath) -> SnmpResult<WalkResult> {
        let mut results = Vec::new();
        let mut cursor = root.clone();

        loop {
            let response = self
                .with_retry(&cursor, |transport, oid| transport.get_next(oid))?
                .check_status()?;

            let Some(binding) = response.bindings.into_iter().next() else {
                break;
            };

            if binding.value.is_exception() || !binding.oid.is_under(root) {
                break;
            }

            if binding.oid <= cursor {
                return Err(ProtocolError::NotIncreasing {
                    previous: cursor,
                    current: binding.oid,
                });
            }

            cursor = binding.oid.clone();
            results.push(binding);
        }

        tracing::debug!("Walk of {} returned {} bindings", root, results.len());
        Ok(results)
    }

    fn with_retry<F>(&mut self, oid: &OidPath, mut send: F) -> SnmpResult<Response>
    where
        F: FnMut(&mut T, &OidPath) -> SnmpResult<Response>,
    {
        let attempts = self.retries + 1;
        let mut attempt = 1;
        loop {
            match send(&mut self.transport, oid) {
                Err(ProtocolError::Timeout) if attempt < attempts => {
                    tracing::debug!(
                        "Request for {} timed out (attempt {}/{}), retrying",
                        oid,
                        attempt,
                        attempts
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
