/*
 *  Copyright (C) 2025 Michael Bachmann
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::{
    ber::{AsnReader, RelativeOid},
    error::{EmberResult, ErrorKind},
    s101::{self, S101Decoder, S101Event},
    tree::{
        ElementTag, RootElement,
        command::{COMMAND_GET_DIRECTORY, COMMAND_SUBSCRIBE, COMMAND_UNSUBSCRIBE},
    },
};
use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    select, spawn,
    sync::mpsc,
    time::{Instant, timeout},
};
use tokio_util::sync::CancellationToken;
#[cfg(feature = "tracing")]
use tracing::{debug, error, trace, warn};

pub const OUTBOUND_QUEUE_SIZE: usize = 256;
const READ_DEADLINE: Duration = Duration::from_millis(100);

/// One-shot completion callback of a request.
///
/// Fires exactly once: with a snapshot of the merged tree on success, or
/// with `Timeout`/`Cancelled`.
pub type TreeListener = Box<dyn FnOnce(EmberResult<RootElement>) + Send + 'static>;

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Per-request timer; `None` disables request timeouts.
    pub request_timeout: Option<Duration>,
}

struct PendingRequest {
    /// `None` targets the top level; any merge completes it.
    target: Option<RelativeOid>,
    listener: TreeListener,
    deadline: Option<Instant>,
}

struct Shared {
    tree: Mutex<RootElement>,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    next_request_id: AtomicU64,
    outbound: mpsc::Sender<Vec<u8>>,
    connected: AtomicBool,
    request_timeout: Option<Duration>,
}

/// Ember+ consumer.
///
/// Owns a single io manager task which in turn owns the transport, the
/// frame decoder, and the live tree. API callers talk to it through the
/// bounded outbound queue and get results back through their listeners;
/// only the io manager mutates the tree.
pub struct EmberClient {
    config: ClientConfig,
    shared: Option<Arc<Shared>>,
    cancel: Option<CancellationToken>,
}

impl EmberClient {
    pub fn new(config: ClientConfig) -> Self {
        EmberClient {
            config,
            shared: None,
            cancel: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .as_ref()
            .map(|shared| shared.connected.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub async fn connect(&mut self, provider_addr: SocketAddr) -> EmberResult<()> {
        if self.is_connected() {
            return Err(ErrorKind::Connection("already connected".to_owned()).into());
        }

        #[cfg(feature = "tracing")]
        debug!("Connecting to provider {provider_addr} …");

        let socket = TcpStream::connect(provider_addr).await?;
        socket.set_nodelay(true)?;
        self.connect_stream(socket)
    }

    /// Attaches the client to an already-established bidirectional stream.
    pub fn connect_stream<T>(&mut self, io: T) -> EmberResult<()>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if self.is_connected() {
            return Err(ErrorKind::Connection("already connected".to_owned()).into());
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let shared = Arc::new(Shared {
            tree: Mutex::new(RootElement::new()),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(0),
            outbound: outbound_tx,
            connected: AtomicBool::new(true),
            request_timeout: self.config.request_timeout,
        });
        let cancel = CancellationToken::new();

        spawn(io_manager(io, shared.clone(), outbound_rx, cancel.clone()));

        self.shared = Some(shared);
        self.cancel = Some(cancel);
        Ok(())
    }

    /// Aborts the io manager. Every pending request listener fires with
    /// `Cancelled` and the tree is discarded.
    pub fn disconnect(&mut self) -> EmberResult<()> {
        if !self.is_connected() {
            self.shared = None;
            self.cancel = None;
            return Err(ErrorKind::NotConnected.into());
        }
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.shared = None;
        Ok(())
    }

    /// Asks the provider for the immediate children of `path`, or of the
    /// top level when `path` is `None`. The listener fires when the
    /// matching update has been merged.
    pub fn get_directory(&self, path: Option<&[u32]>, listener: TreeListener) -> EmberResult<()> {
        let shared = self.shared()?;
        match path {
            None => submit(
                shared,
                None,
                Some(listener),
                RootElement::get_directory_request().to_bytes(),
            ),
            Some(path) => {
                let oid = RelativeOid::from(path);
                let tag = resolve_tag(shared, path)?;
                let payload =
                    RootElement::qualified_command_request(tag, &oid, COMMAND_GET_DIRECTORY)?
                        .to_bytes();
                submit(shared, Some(oid), Some(listener), payload)
            }
        }
    }

    pub fn subscribe(&self, path: &[u32]) -> EmberResult<()> {
        self.fire_and_forget(path, COMMAND_SUBSCRIBE)
    }

    pub fn unsubscribe(&self, path: &[u32]) -> EmberResult<()> {
        self.fire_and_forget(path, COMMAND_UNSUBSCRIBE)
    }

    fn fire_and_forget(&self, path: &[u32], command: i32) -> EmberResult<()> {
        let shared = self.shared()?;
        let oid = RelativeOid::from(path);
        let tag = resolve_tag(shared, path)?;
        let payload = RootElement::qualified_command_request(tag, &oid, command)?.to_bytes();
        submit(shared, None, None, payload)
    }

    /// Walks the whole provider tree with recursive GetDirectory requests.
    /// The listener fires exactly once, when no request is outstanding
    /// anymore or the first branch fails.
    pub fn get_tree(&self, listener: TreeListener) -> EmberResult<()> {
        let shared = self.shared()?;
        let walk = Arc::new(TreeWalk {
            outstanding: AtomicUsize::new(0),
            visited: Mutex::new(HashSet::new()),
            listener: Mutex::new(Some(listener)),
        });
        request_walk(shared, &walk, None, ElementTag::Node)
    }

    /// Runs a closure against the live tree. Keep it short: the io manager
    /// contends on the same lock.
    pub fn with_tree<R>(&self, f: impl FnOnce(&RootElement) -> R) -> EmberResult<R> {
        let shared = self.shared()?;
        let tree = lock(&shared.tree);
        Ok(f(&tree))
    }

    /// Mutable variant of [`with_tree`](Self::with_tree), used to register
    /// and remove listeners atomically with respect to merge dispatch.
    pub fn with_tree_mut<R>(&self, f: impl FnOnce(&mut RootElement) -> R) -> EmberResult<R> {
        let shared = self.shared()?;
        let mut tree = lock(&shared.tree);
        Ok(f(&mut tree))
    }

    pub fn tree_snapshot(&self) -> EmberResult<RootElement> {
        self.with_tree(RootElement::clone)
    }

    fn shared(&self) -> EmberResult<&Arc<Shared>> {
        match &self.shared {
            Some(shared) if shared.connected.load(Ordering::SeqCst) => Ok(shared),
            _ => Err(ErrorKind::NotConnected.into()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn resolve_tag(shared: &Arc<Shared>, path: &[u32]) -> EmberResult<ElementTag> {
    let tree = lock(&shared.tree);
    tree.walk(path).map(|element| element.tag()).ok_or_else(|| {
        ErrorKind::MergeDetached {
            path: RelativeOid::from(path).to_string(),
        }
        .into()
    })
}

/// Registers the pending request and enqueues the encoded message. The
/// timer is armed here, at enqueue time.
fn submit(
    shared: &Arc<Shared>,
    target: Option<RelativeOid>,
    listener: Option<TreeListener>,
    payload: Vec<u8>,
) -> EmberResult<()> {
    let id = shared.next_request_id.fetch_add(1, Ordering::Relaxed);
    if let Some(listener) = listener {
        let deadline = shared.request_timeout.map(|t| Instant::now() + t);
        lock(&shared.pending).insert(
            id,
            PendingRequest {
                target,
                listener,
                deadline,
            },
        );
    }
    match shared.outbound.try_send(payload) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => {
            lock(&shared.pending).remove(&id);
            Err(ErrorKind::QueueFull.into())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            lock(&shared.pending).remove(&id);
            Err(ErrorKind::NotConnected.into())
        }
    }
}

struct TreeWalk {
    outstanding: AtomicUsize,
    visited: Mutex<HashSet<Vec<u32>>>,
    listener: Mutex<Option<TreeListener>>,
}

const fn expandable(tag: ElementTag) -> bool {
    matches!(
        tag,
        ElementTag::Node
            | ElementTag::QualifiedNode
            | ElementTag::Matrix
            | ElementTag::QualifiedMatrix
            | ElementTag::Function
            | ElementTag::QualifiedFunction
    )
}

fn request_walk(
    shared: &Arc<Shared>,
    walk: &Arc<TreeWalk>,
    path: Option<Vec<u32>>,
    tag: ElementTag,
) -> EmberResult<()> {
    walk.outstanding.fetch_add(1, Ordering::SeqCst);

    let result = (|| {
        let (target, payload) = match &path {
            None => (None, RootElement::get_directory_request().to_bytes()),
            Some(p) => {
                let oid = RelativeOid::from(p.as_slice());
                let payload =
                    RootElement::qualified_command_request(tag, &oid, COMMAND_GET_DIRECTORY)?
                        .to_bytes();
                (Some(oid), payload)
            }
        };
        let shared_for_listener = shared.clone();
        let walk_for_listener = walk.clone();
        let listener: TreeListener = Box::new(move |result| {
            continue_walk(shared_for_listener, walk_for_listener, path, result);
        });
        submit(shared, target, Some(listener), payload)
    })();

    if result.is_err() {
        walk.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
    result
}

fn continue_walk(
    shared: Arc<Shared>,
    walk: Arc<TreeWalk>,
    path: Option<Vec<u32>>,
    result: EmberResult<RootElement>,
) {
    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            if let Some(listener) = lock(&walk.listener).take() {
                listener(Err(e));
            }
            return;
        }
    };

    let discovered: Vec<(Vec<u32>, ElementTag)> = match &path {
        None => snapshot
            .elements()
            .map(|element| (vec![element.number() as u32], element.tag()))
            .collect(),
        Some(p) => snapshot
            .walk(p)
            .map(|element| {
                element
                    .children()
                    .map(|child| {
                        let mut child_path = p.clone();
                        child_path.push(child.number() as u32);
                        (child_path, child.tag())
                    })
                    .collect()
            })
            .unwrap_or_default(),
    };

    for (child_path, tag) in discovered {
        if !expandable(tag) {
            continue;
        }
        if !lock(&walk.visited).insert(child_path.clone()) {
            continue;
        }
        if let Err(_e) = request_walk(&shared, &walk, Some(child_path), tag) {
            #[cfg(feature = "tracing")]
            warn!("Could not expand tree branch: {_e}");
        }
    }

    if walk.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
        if let Some(listener) = lock(&walk.listener).take() {
            listener(Ok(snapshot));
        }
    }
}

async fn io_manager<T>(
    mut io: T,
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    #[cfg(feature = "tracing")]
    debug!("Starting io manager loop.");

    let mut decoder = S101Decoder::new();
    let mut buf = [0u8; 65536];

    'io: loop {
        expire_requests(&shared);

        select! {
            biased;
            _ = cancel.cancelled() => {
                #[cfg(feature = "tracing")]
                debug!("Io manager cancelled.");
                break 'io;
            }
            message = outbound_rx.recv() => match message {
                Some(payload) => {
                    #[cfg(feature = "tracing")]
                    trace!("Sending EmBER+ message of {} bytes …", payload.len());
                    if let Err(_e) = send_message(&mut io, &payload).await {
                        #[cfg(feature = "tracing")]
                        error!("Could not write to transport: {_e}");
                        break 'io;
                    }
                }
                None => break 'io,
            },
            read = timeout(READ_DEADLINE, io.read(&mut buf)) => match read {
                Err(_elapsed) => {} // read deadline, loop around to re-check timers
                Ok(Ok(0)) => {
                    #[cfg(feature = "tracing")]
                    debug!("Transport closed by peer.");
                    break 'io;
                }
                Ok(Ok(n)) => {
                    for event in decoder.feed(&buf[..n]) {
                        match event {
                            S101Event::KeepaliveRequest => {
                                #[cfg(feature = "tracing")]
                                debug!("Received keepalive request, sending response.");
                                // head of line, ahead of anything queued
                                if let Err(_e) = io.write_all(&s101::keepalive_response()).await {
                                    #[cfg(feature = "tracing")]
                                    error!("Could not write keepalive response: {_e}");
                                    break 'io;
                                }
                            }
                            S101Event::KeepaliveResponse => {
                                #[cfg(feature = "tracing")]
                                trace!("Received keepalive response.");
                            }
                            S101Event::EmberMessage(payload) => {
                                apply_message(&shared, &payload);
                            }
                        }
                    }
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    error!("Error reading from transport: {_e}");
                    break 'io;
                }
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    outbound_rx.close();
    fail_all_pending(&shared);

    #[cfg(feature = "tracing")]
    debug!("Io manager loop stopped.");
}

async fn send_message<T: AsyncWrite + Unpin>(io: &mut T, payload: &[u8]) -> EmberResult<()> {
    for frame in s101::encode_message(payload) {
        io.write_all(&frame).await?;
    }
    Ok(())
}

fn apply_message(shared: &Arc<Shared>, payload: &[u8]) {
    let report = {
        let mut tree = lock(&shared.tree);
        let mut reader = AsnReader::new(payload);
        match tree.decode(&mut reader) {
            Ok(report) => report,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                warn!(
                    "Could not decode EmBER+ message {}: {}",
                    crate::utils::format_bytes(payload),
                    _e.verbose()
                );
                return;
            }
        }
    };

    #[cfg(feature = "tracing")]
    for dropped in &report.dropped {
        warn!("Dropped element during merge: {}", dropped.verbose());
    }

    if !report.modified.is_empty() {
        complete_requests(shared, &report.modified);
    }
}

fn complete_requests(shared: &Arc<Shared>, modified: &[RelativeOid]) {
    let completed: Vec<PendingRequest> = {
        let mut pending = lock(&shared.pending);
        let ids: Vec<u64> = pending
            .iter()
            .filter(|(_, request)| match &request.target {
                None => true,
                Some(target) => modified.iter().any(|path| path.starts_with(target)),
            })
            .map(|(id, _)| *id)
            .collect();
        ids.iter().filter_map(|id| pending.remove(id)).collect()
    };
    if completed.is_empty() {
        return;
    }

    let snapshot = lock(&shared.tree).clone();
    for request in completed {
        (request.listener)(Ok(snapshot.clone()));
    }
}

fn expire_requests(shared: &Arc<Shared>) {
    let now = Instant::now();
    let expired: Vec<PendingRequest> = {
        let mut pending = lock(&shared.pending);
        let ids: Vec<u64> = pending
            .iter()
            .filter(|(_, request)| request.deadline.is_some_and(|deadline| deadline <= now))
            .map(|(id, _)| *id)
            .collect();
        ids.iter().filter_map(|id| pending.remove(id)).collect()
    };
    for request in expired {
        #[cfg(feature = "tracing")]
        warn!("Request timed out.");
        (request.listener)(Err(ErrorKind::Timeout.into()));
    }
}

fn fail_all_pending(shared: &Arc<Shared>) {
    let drained: Vec<PendingRequest> = lock(&shared.pending)
        .drain()
        .map(|(_, request)| request)
        .collect();
    for request in drained {
        (request.listener)(Err(ErrorKind::Cancelled.into()));
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::tree::Element;
    use tokio::{
        io::{DuplexStream, duplex},
        sync::oneshot,
    };

    /// Minimal in-process provider side of a duplex transport.
    struct TestProvider {
        io: DuplexStream,
        decoder: S101Decoder,
        buf: Vec<u8>,
    }

    impl TestProvider {
        fn new(io: DuplexStream) -> Self {
            TestProvider {
                io,
                decoder: S101Decoder::new(),
                buf: vec![0u8; 65536],
            }
        }

        /// Reads until one complete request message arrives, returned as the
        /// merged request tree.
        async fn next_request(&mut self) -> RootElement {
            loop {
                let n = self.io.read(&mut self.buf).await.unwrap();
                assert!(n > 0, "client closed the transport");
                for event in self.decoder.feed(&self.buf[..n]) {
                    if let S101Event::EmberMessage(payload) = event {
                        let mut request = RootElement::new();
                        let mut reader = AsnReader::new(&payload);
                        request.decode(&mut reader).unwrap();
                        return request;
                    }
                }
            }
        }

        async fn send(&mut self, message: &RootElement) {
            for frame in s101::encode_message(&message.to_bytes()) {
                self.io.write_all(&frame).await.unwrap();
            }
        }
    }

    fn node_message(number: i32, identifier: &str) -> RootElement {
        let mut node = Element::new_node(number);
        node.contents_mut()
            .as_node_mut()
            .unwrap()
            .set_identifier(identifier);
        let mut message = RootElement::new();
        message.add_element(node);
        message
    }

    #[tokio::test]
    async fn get_directory_completes_on_matching_update() {
        let (client_io, provider_io) = duplex(1 << 16);
        let mut client = EmberClient::new(ClientConfig::default());
        client.connect_stream(client_io).unwrap();

        let mut provider = TestProvider::new(provider_io);
        let (tx, rx) = oneshot::channel();

        client
            .get_directory(
                None,
                Box::new(move |result| {
                    tx.send(result.map(|tree| tree.len())).ok();
                }),
            )
            .unwrap();

        let request = provider.next_request().await;
        let command = request.get(COMMAND_GET_DIRECTORY).unwrap();
        assert_eq!(ElementTag::Command, command.tag());

        provider.send(&node_message(10, "gdnet")).await;

        assert_eq!(1, rx.await.unwrap().unwrap());
        assert_eq!(
            "gdnet",
            client
                .with_tree(|tree| tree
                    .get(10)
                    .unwrap()
                    .contents()
                    .unwrap()
                    .as_node()
                    .unwrap()
                    .identifier()
                    .unwrap()
                    .to_owned())
                .unwrap()
        );
    }

    #[tokio::test]
    async fn request_times_out_when_the_provider_stays_silent() {
        let (client_io, provider_io) = duplex(1 << 16);
        let mut client = EmberClient::new(ClientConfig {
            request_timeout: Some(Duration::from_millis(50)),
        });
        client.connect_stream(client_io).unwrap();

        let (tx, rx) = oneshot::channel();
        client
            .get_directory(None, Box::new(move |result| {
                tx.send(result.map(|_| ())).ok();
            }))
            .unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_timeout());

        // keep the provider half alive until the assertion is done
        drop(provider_io);
    }

    #[tokio::test]
    async fn disconnect_cancels_pending_requests() {
        let (client_io, provider_io) = duplex(1 << 16);
        let mut client = EmberClient::new(ClientConfig::default());
        client.connect_stream(client_io).unwrap();

        let (tx, rx) = oneshot::channel();
        client
            .get_directory(None, Box::new(move |result| {
                tx.send(result.map(|_| ())).ok();
            }))
            .unwrap();

        client.disconnect().unwrap();
        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());

        assert!(matches!(
            client.get_directory(None, Box::new(|_| {})).unwrap_err().kind,
            ErrorKind::NotConnected
        ));
        assert!(matches!(
            client.disconnect().unwrap_err().kind,
            ErrorKind::NotConnected
        ));

        drop(provider_io);
    }

    #[tokio::test]
    async fn keepalive_requests_are_answered() {
        let (client_io, mut provider_io) = duplex(1 << 16);
        let mut client = EmberClient::new(ClientConfig::default());
        client.connect_stream(client_io).unwrap();

        provider_io
            .write_all(&s101::keepalive_request())
            .await
            .unwrap();

        let mut decoder = S101Decoder::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = provider_io.read(&mut buf).await.unwrap();
            let events = decoder.feed(&buf[..n]);
            if !events.is_empty() {
                assert_eq!(vec![S101Event::KeepaliveResponse], events);
                break;
            }
        }
    }

    #[tokio::test]
    async fn get_tree_walks_expandable_children_and_fires_once() {
        let (client_io, provider_io) = duplex(1 << 16);
        let mut client = EmberClient::new(ClientConfig::default());
        client.connect_stream(client_io).unwrap();

        let mut provider = TestProvider::new(provider_io);
        let (tx, rx) = oneshot::channel();

        client
            .get_tree(Box::new(move |result| {
                tx.send(result).ok();
            }))
            .unwrap();

        // root request
        let request = provider.next_request().await;
        assert!(request.get(COMMAND_GET_DIRECTORY).is_some());
        provider.send(&node_message(1, "top")).await;

        // walk descends into node 1
        let request = provider.next_request().await;
        let node = request.get(1).unwrap();
        assert_eq!(ElementTag::QualifiedNode, node.tag());
        assert!(node.child(COMMAND_GET_DIRECTORY).is_some());

        // answer with a parameter below node 1; parameters are not expanded
        let leaf =
            Element::new_qualified_parameter(RelativeOid::new(vec![1, 2])).unwrap();
        let mut update = RootElement::new();
        update.add_element(leaf);
        provider.send(&update).await;

        let tree = rx.await.unwrap().unwrap();
        assert!(tree.walk(&[1, 2]).is_some());
    }

    #[tokio::test]
    async fn qualified_get_directory_targets_the_element() {
        let (client_io, provider_io) = duplex(1 << 16);
        let mut client = EmberClient::new(ClientConfig::default());
        client.connect_stream(client_io).unwrap();

        let mut provider = TestProvider::new(provider_io);

        // unknown paths are rejected before anything is sent
        assert!(client.get_directory(Some(&[5]), Box::new(|_| {})).is_err());

        let (tx, rx) = oneshot::channel();
        client
            .get_directory(
                None,
                Box::new(move |result| {
                    tx.send(result.map(|_| ())).ok();
                }),
            )
            .unwrap();
        provider.next_request().await;
        provider.send(&node_message(5, "five")).await;
        rx.await.unwrap().unwrap();

        let (tx, rx) = oneshot::channel();
        client
            .get_directory(
                Some(&[5]),
                Box::new(move |result| {
                    tx.send(result.map(|tree| tree.walk(&[5, 1]).is_some())).ok();
                }),
            )
            .unwrap();

        let request = provider.next_request().await;
        let element = request.get(5).unwrap();
        assert_eq!(ElementTag::QualifiedNode, element.tag());
        assert_eq!(Some(&RelativeOid::new(vec![5])), element.path());

        let leaf = Element::new_qualified_parameter(RelativeOid::new(vec![5, 1])).unwrap();
        let mut update = RootElement::new();
        update.add_element(leaf);
        provider.send(&update).await;

        assert!(rx.await.unwrap().unwrap());
    }
}
