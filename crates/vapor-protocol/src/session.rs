//! One live connection: receive loop, routing, keep-alive and the
//! typed outbound surface
//!
//! Frames are processed strictly in receive order. A multi frame's
//! nested entries are queued ahead of the next top-level frame, so
//! their encoded order is preserved. Unsolicited messages leave this
//! crate as [`SessionEvent`]s over a bounded channel; the consumer is
//! the only writer of the resolution caches.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use prost::Message;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use url::Url;
use vapor_wire::frame::Frame;
use vapor_wire::proto::entitlements::{
    ClientLicenseList, ProductInfoRequest, ProductInfoResponse, product_info_request,
};
use vapor_wire::proto::friends::{
    ClientChangeStatus, ClientFriendsList, ClientPersonaState, ClientPlayerNicknameList,
    ClientRequestFriendData,
};
use vapor_wire::proto::header::FrameHeader;
use vapor_wire::proto::login::{
    ClientAccountInfo, ClientHeartBeat, ClientHello, ClientLogOff, ClientLoggedOff,
    ClientLogonResponse,
};
use vapor_wire::proto::service::{
    CloudConfigDownloadRequest, CloudConfigDownloadResponse,
    GetAppRichPresenceLocalizationRequest, GetAppRichPresenceLocalizationResponse,
    GetLastPlayedTimesRequest, GetLastPlayedTimesResponse, cloud_config, methods,
};
use vapor_wire::proto::stats::{ClientGetUserStats, ClientGetUserStatsResponse};
use vapor_wire::{
    ACCOUNT_ID_MASK, MAX_MESSAGE_SIZE, MsgKind, PERSONA_STATE_FLAGS, PROTOCOL_VERSION, ResultCode,
};

use crate::error::{Error, Result};
use crate::event::SessionEvent;
use crate::jobs::{JobCorrelator, JobOptions, JobReply};
use crate::transport::{Transport, TransportReader, TransportWriter};

/// Job id value the backend uses for "no job".
const NO_JOB: u64 = u64::MAX;

const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the unsolicited event channel. Ingest awaits free
/// slots, which caps how far the receive loop can run ahead of the
/// dispatch task.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Shared routing identity of the session
#[derive(Debug)]
struct SessionIds {
    steam_id: AtomicU64,
    session_id: AtomicI32,
    authenticated: AtomicBool,
}

impl SessionIds {
    fn new() -> Self {
        Self {
            steam_id: AtomicU64::new(ACCOUNT_ID_MASK),
            session_id: AtomicI32::new(0),
            authenticated: AtomicBool::new(false),
        }
    }

    /// Adopts the first nonzero session id seen on an inbound header
    /// and flags later disagreements.
    fn observe(&self, header: &FrameHeader) {
        if let Some(session_id) = header.session_id.filter(|&id| id != 0) {
            let current = self.session_id.load(Ordering::Acquire);
            if current == 0 {
                debug!(session_id, "adopted session id");
                self.session_id.store(session_id, Ordering::Release);
            } else if current != session_id {
                warn!(current, session_id, "inbound session id mismatch");
            }
        }
        if let Some(steam_id) = header.steam_id.filter(|&id| id != 0 && id != ACCOUNT_ID_MASK) {
            if self.steam_id.load(Ordering::Acquire) == ACCOUNT_ID_MASK {
                debug!(steam_id, "adopted steam id");
                self.steam_id.store(steam_id, Ordering::Release);
            }
        }
    }
}

/// Routes decoded frames to the correlator or the event channel.
struct FrameRouter {
    correlator: Arc<JobCorrelator>,
    events: mpsc::Sender<SessionEvent>,
    ids: Arc<SessionIds>,
}

impl FrameRouter {
    /// Processes one transport payload, unwrapping multi frames
    /// iteratively so nesting depth is not bounded by the stack.
    async fn ingest(&self, raw: Bytes) {
        let mut queue: VecDeque<Bytes> = VecDeque::from([raw]);
        while let Some(raw) = queue.pop_front() {
            let frame = match vapor_wire::decode(&raw) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(%err, len = raw.len(), "dropping malformed frame");
                    continue;
                }
            };
            if frame.kind == MsgKind::Multi {
                match vapor_wire::unwrap_multi(&frame.body) {
                    Ok(nested) => {
                        trace!(count = nested.len(), "unwrapped multi frame");
                        for sub in nested.into_iter().rev() {
                            queue.push_front(sub);
                        }
                    }
                    Err(err) => warn!(%err, "dropping malformed multi frame"),
                }
                continue;
            }
            self.ids.observe(&frame.header);
            let frame = {
                let mut frame = frame;
                if frame.header.target_job_id == Some(NO_JOB) {
                    frame.header.target_job_id = None;
                }
                frame
            };
            if let Some(unsolicited) = self.correlator.resolve(frame) {
                self.dispatch(unsolicited).await;
            }
        }
    }

    async fn dispatch(&self, frame: Frame) {
        let Some(event) = Self::classify(frame) else {
            return;
        };
        if self.events.send(event).await.is_err() {
            trace!("event consumer gone, dropping unsolicited message");
        }
    }

    fn classify(frame: Frame) -> Option<SessionEvent> {
        fn parse<M: Message + Default>(kind: MsgKind, body: &[u8]) -> Option<M> {
            match M::decode(body) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!(%kind, %err, "dropping undecodable body");
                    None
                }
            }
        }

        let kind = frame.kind;
        let event = match kind {
            MsgKind::ClientLogOnResponse => {
                SessionEvent::LogonResponse(parse::<ClientLogonResponse>(kind, &frame.body)?)
            }
            MsgKind::ClientLoggedOff => {
                let message = parse::<ClientLoggedOff>(kind, &frame.body)?;
                SessionEvent::LoggedOff(ResultCode::from_raw(message.eresult.unwrap_or_default()))
            }
            MsgKind::ClientAccountInfo => {
                SessionEvent::AccountInfo(parse::<ClientAccountInfo>(kind, &frame.body)?)
            }
            MsgKind::ClientFriendsList => {
                SessionEvent::FriendsList(parse::<ClientFriendsList>(kind, &frame.body)?)
            }
            MsgKind::ClientPersonaState => {
                SessionEvent::PersonaState(parse::<ClientPersonaState>(kind, &frame.body)?)
            }
            MsgKind::ClientLicenseList => {
                SessionEvent::LicenseList(parse::<ClientLicenseList>(kind, &frame.body)?)
            }
            MsgKind::ClientPicsProductInfoResponse => {
                SessionEvent::ProductInfo(parse::<ProductInfoResponse>(kind, &frame.body)?)
            }
            MsgKind::ClientGetUserStatsResponse => {
                SessionEvent::UserStats(parse::<ClientGetUserStatsResponse>(kind, &frame.body)?)
            }
            MsgKind::ClientPlayerNicknameList => {
                SessionEvent::NicknameList(parse::<ClientPlayerNicknameList>(kind, &frame.body)?)
            }
            MsgKind::ServiceMethod | MsgKind::ServiceMethodResponse => {
                let method = frame.header.method_name().unwrap_or_default().to_string();
                SessionEvent::ServiceMethod {
                    method,
                    body: frame.body,
                }
            }
            other => {
                trace!(kind = %other, "unhandled message kind");
                SessionEvent::Unhandled { kind: other }
            }
        };
        Some(event)
    }
}

/// Shared handle to a running session
pub type SessionHandle = Arc<ProtocolSession>;

/// Owns one live connection to a connection manager.
pub struct ProtocolSession {
    writer: tokio::sync::Mutex<TransportWriter>,
    reader: Mutex<Option<TransportReader>>,
    router: FrameRouter,
    correlator: Arc<JobCorrelator>,
    ids: Arc<SessionIds>,
    heartbeat: Mutex<Option<tokio::task::JoinHandle<()>>>,
    job_timeout: Duration,
    local_addr: Option<SocketAddr>,
}

impl ProtocolSession {
    /// Connects to the given address and returns the session plus the
    /// receiver of unsolicited events.
    pub async fn connect(
        address: &Url,
        connect_timeout: Duration,
    ) -> Result<(SessionHandle, mpsc::Receiver<SessionEvent>)> {
        let transport = Transport::connect(address, connect_timeout).await?;
        Ok(Self::from_transport(transport))
    }

    /// Wraps an already-connected transport.
    pub fn from_transport(
        transport: Transport,
    ) -> (SessionHandle, mpsc::Receiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let correlator = Arc::new(JobCorrelator::new());
        let ids = Arc::new(SessionIds::new());
        let session = Arc::new(Self {
            writer: tokio::sync::Mutex::new(transport.writer),
            reader: Mutex::new(Some(transport.reader)),
            router: FrameRouter {
                correlator: Arc::clone(&correlator),
                events: events_tx,
                ids: Arc::clone(&ids),
            },
            correlator,
            ids,
            heartbeat: Mutex::new(None),
            job_timeout: DEFAULT_JOB_TIMEOUT,
            local_addr: transport.local_addr,
        });
        (session, events_rx)
    }

    /// Runs the receive loop until the transport closes or errors.
    ///
    /// Tears the session down either way: pending jobs fail and the
    /// keep-alive stops.
    pub async fn run(&self) -> Result<()> {
        let Some(mut reader) = self.reader.lock().take() else {
            return Err(Error::Closed);
        };
        let outcome = loop {
            match reader.receive().await {
                Ok(Some(payload)) => {
                    if payload.len() > MAX_MESSAGE_SIZE {
                        warn!(len = payload.len(), "dropping oversized inbound message");
                        continue;
                    }
                    self.router.ingest(payload).await;
                }
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        self.teardown().await;
        outcome
    }

    /// Steam id used on outbound headers.
    pub fn steam_id(&self) -> u64 {
        self.ids.steam_id.load(Ordering::Acquire)
    }

    /// Sets the outbound steam id ahead of a logon attempt without
    /// marking the session authenticated.
    pub fn adopt_steam_id(&self, steam_id: u64) {
        self.ids.steam_id.store(steam_id, Ordering::Release);
    }

    /// Reverts the outbound identity to the anonymous mask.
    pub fn reset_steam_id(&self) {
        self.ids.steam_id.store(ACCOUNT_ID_MASK, Ordering::Release);
    }

    /// Marks logon as finished and fixes the outbound identity.
    pub fn mark_authenticated(&self, steam_id: u64) {
        self.ids.steam_id.store(steam_id, Ordering::Release);
        self.ids.authenticated.store(true, Ordering::Release);
    }

    /// Local address of the underlying socket, when known.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_authenticated(&self) -> bool {
        self.ids.authenticated.load(Ordering::Acquire)
    }

    fn base_header(&self) -> FrameHeader {
        let session_id = self.ids.session_id.load(Ordering::Acquire);
        FrameHeader {
            steam_id: Some(self.steam_id()),
            session_id: (session_id != 0).then_some(session_id),
            ..Default::default()
        }
    }

    async fn transmit(&self, kind: MsgKind, header: &FrameHeader, body: &[u8]) -> Result<()> {
        let raw = vapor_wire::encode(kind, header, body);
        self.writer.lock().await.send(raw).await
    }

    /// Sends a message without expecting a correlated response.
    pub async fn send_message<M: Message>(&self, kind: MsgKind, message: &M) -> Result<()> {
        let header = self.base_header();
        trace!(%kind, "sending message");
        self.transmit(kind, &header, &message.encode_to_vec()).await
    }

    /// Sends a request and waits for its correlated response.
    pub async fn send_job<M: Message>(
        &self,
        kind: MsgKind,
        message: &M,
        options: JobOptions,
    ) -> Result<JobReply> {
        let method = options.expected_method.clone();
        let (job_id, rx) = self.correlator.register(kind, options);
        let mut header = self.base_header();
        header.source_job_id = Some(job_id);
        header.target_job_name = method;
        if let Err(err) = self.transmit(kind, &header, &message.encode_to_vec()).await {
            self.correlator.abandon(job_id);
            return Err(err);
        }
        match tokio::time::timeout(self.job_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_closed)) => Err(Error::Closed),
            Err(_elapsed) => {
                self.correlator.abandon(job_id);
                Err(Error::JobTimeout { job_id })
            }
        }
    }

    /// Calls a named service method and decodes its response.
    ///
    /// Unauthenticated sessions use the non-authed call kind; the
    /// result code still comes from the response header and is left
    /// for the caller to branch on.
    pub async fn service_call<Req, Resp>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<(FrameHeader, Resp)>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let kind = if self.is_authenticated() {
            MsgKind::ServiceMethodCallFromClient
        } else {
            MsgKind::ServiceMethodCallFromClientNonAuthed
        };
        let reply = self
            .send_job(kind, request, JobOptions::expect_service(method))
            .await?;
        let response = Resp::decode(reply.body.as_ref()).map_err(|source| Error::MalformedBody {
            kind: MsgKind::ServiceMethodResponse,
            source,
        })?;
        Ok((reply.header, response))
    }

    /// Starts the keep-alive task at the server-provided interval,
    /// replacing any previous one.
    pub fn start_heartbeat(self: &Arc<Self>, interval: Duration) {
        debug!(?interval, "starting keep-alive");
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let beat = ClientHeartBeat::default();
                if session
                    .send_message(MsgKind::ClientHeartBeat, &beat)
                    .await
                    .is_err()
                {
                    debug!("keep-alive send failed, stopping");
                    break;
                }
            }
        });
        if let Some(previous) = self.heartbeat.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
    }

    async fn teardown(&self) {
        self.stop_heartbeat();
        self.correlator.fail_all();
    }

    /// Announces logoff and closes the transport.
    pub async fn close(&self) {
        if self.is_authenticated() {
            let _ = self
                .send_message(MsgKind::ClientLogOff, &ClientLogOff::default())
                .await;
        }
        self.teardown().await;
        let _ = self.writer.lock().await.close().await;
    }

    // Typed outbound helpers.

    /// Announces the protocol version. The backend closes the socket
    /// on non-authed traffic from clients that skipped this.
    pub async fn hello(&self) -> Result<()> {
        let message = ClientHello {
            protocol_version: Some(PROTOCOL_VERSION),
        };
        self.send_message(MsgKind::ClientHello, &message).await
    }

    /// Requests metadata for the given packages. Responses arrive as
    /// `ProductInfo` events, possibly across several batches.
    pub async fn request_package_info(&self, packages: &[(u32, u64)]) -> Result<()> {
        let request = ProductInfoRequest {
            packages: packages
                .iter()
                .map(|&(packageid, access_token)| product_info_request::PackageInfo {
                    packageid: Some(packageid),
                    access_token: Some(access_token),
                })
                .collect(),
            ..Default::default()
        };
        self.send_message(MsgKind::ClientPicsProductInfoRequest, &request)
            .await
    }

    /// Requests metadata for the given apps.
    pub async fn request_app_info(&self, app_ids: &[u32]) -> Result<()> {
        let request = ProductInfoRequest {
            apps: app_ids
                .iter()
                .map(|&appid| product_info_request::AppInfo {
                    appid: Some(appid),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        self.send_message(MsgKind::ClientPicsProductInfoRequest, &request)
            .await
    }

    /// Publishes our own persona state.
    pub async fn set_persona_state(&self, state: u32) -> Result<()> {
        let request = ClientChangeStatus {
            persona_state: Some(state),
            ..Default::default()
        };
        self.send_message(MsgKind::ClientChangeStatus, &request).await
    }

    /// Requests both persona facets for the given users.
    pub async fn request_friend_persona_states(&self, user_ids: &[u64]) -> Result<()> {
        let request = ClientRequestFriendData {
            persona_state_requested: Some(PERSONA_STATE_FLAGS),
            friends: user_ids.to_vec(),
        };
        self.send_message(MsgKind::ClientRequestFriendData, &request)
            .await
    }

    /// Requests stats and achievements for one game. The response
    /// arrives as a `UserStats` event.
    pub async fn request_user_stats(&self, game_id: u64) -> Result<()> {
        let request = ClientGetUserStats {
            game_id: Some(game_id),
            ..Default::default()
        };
        self.send_message(MsgKind::ClientGetUserStats, &request).await
    }

    /// Fetches play times for every owned game.
    pub async fn request_last_played_times(&self) -> Result<GetLastPlayedTimesResponse> {
        let request = GetLastPlayedTimesRequest {
            min_last_played: Some(0),
        };
        let (_header, response) = self
            .service_call(methods::LAST_PLAYED_TIMES, &request)
            .await?;
        Ok(response)
    }

    /// Downloads a cloud-config namespace (game collections live in
    /// namespace 1).
    pub async fn download_cloud_config(
        &self,
        namespace: u32,
    ) -> Result<CloudConfigDownloadResponse> {
        let request = CloudConfigDownloadRequest {
            versions: vec![cloud_config::NamespaceVersion {
                enamespace: Some(namespace),
                version: None,
            }],
        };
        let (_header, response) = self
            .service_call(methods::CLOUD_CONFIG_DOWNLOAD, &request)
            .await?;
        Ok(response)
    }

    /// Fetches rich-presence token translations for one app.
    pub async fn request_rich_presence_localization(
        &self,
        app_id: i32,
        language: &str,
    ) -> Result<GetAppRichPresenceLocalizationResponse> {
        let request = GetAppRichPresenceLocalizationRequest {
            appid: Some(app_id),
            language: Some(language.to_string()),
        };
        let (_header, response) = self
            .service_call(methods::RICH_PRESENCE_LOC, &request)
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vapor_wire::proto::login::ClientHello;

    use super::*;

    fn test_router() -> (FrameRouter, mpsc::Receiver<SessionEvent>, Arc<JobCorrelator>) {
        let (tx, rx) = mpsc::channel(16);
        let correlator = Arc::new(JobCorrelator::new());
        let router = FrameRouter {
            correlator: Arc::clone(&correlator),
            events: tx,
            ids: Arc::new(SessionIds::new()),
        };
        (router, rx, correlator)
    }

    fn encoded(kind: MsgKind, header: &FrameHeader, message: &impl Message) -> Bytes {
        vapor_wire::encode(kind, header, &message.encode_to_vec())
    }

    #[tokio::test]
    async fn test_ingest_routes_unsolicited_event() {
        let (router, mut rx, _correlator) = test_router();
        let message = ClientLoggedOff {
            eresult: Some(ResultCode::TryAnotherCm.as_raw()),
        };
        router
            .ingest(encoded(
                MsgKind::ClientLoggedOff,
                &FrameHeader::default(),
                &message,
            ))
            .await;
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::LoggedOff(ResultCode::TryAnotherCm))
        );
    }

    #[tokio::test]
    async fn test_ingest_drops_malformed_frame() {
        let (router, mut rx, _correlator) = test_router();
        router.ingest(Bytes::from_static(&[1, 2, 3])).await;
        drop(router);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_multi_contents_processed_in_order() {
        let (router, mut rx, _correlator) = test_router();
        let first = encoded(
            MsgKind::ClientLoggedOff,
            &FrameHeader::default(),
            &ClientLoggedOff {
                eresult: Some(ResultCode::Ok.as_raw()),
            },
        );
        let second = encoded(
            MsgKind::ClientLoggedOff,
            &FrameHeader::default(),
            &ClientLoggedOff {
                eresult: Some(ResultCode::Fail.as_raw()),
            },
        );
        let mut packed = Vec::new();
        for entry in [&first, &second] {
            packed.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            packed.extend_from_slice(entry);
        }
        let envelope = vapor_wire::proto::header::Multi {
            size_unzipped: None,
            message_body: Some(packed),
        };
        router
            .ingest(encoded(MsgKind::Multi, &FrameHeader::default(), &envelope))
            .await;
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::LoggedOff(ResultCode::Ok))
        );
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::LoggedOff(ResultCode::Fail))
        );
    }

    #[tokio::test]
    async fn test_correlated_response_not_dispatched_as_event() {
        let (router, mut rx, correlator) = test_router();
        let (job_id, job_rx) = correlator.register(
            MsgKind::ServiceMethodCallFromClientNonAuthed,
            JobOptions::expect_service("Authentication.GetPasswordRSAPublicKey#1"),
        );
        let header = FrameHeader {
            target_job_id: Some(job_id),
            target_job_name: Some("Authentication.GetPasswordRSAPublicKey#1".to_string()),
            ..Default::default()
        };
        router
            .ingest(encoded(
                MsgKind::ServiceMethodResponse,
                &header,
                &ClientHello::default(),
            ))
            .await;
        assert!(job_rx.await.is_ok());
        drop(router);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_no_job_marker_treated_as_unsolicited() {
        let (router, mut rx, _correlator) = test_router();
        let header = FrameHeader {
            target_job_id: Some(NO_JOB),
            target_job_name: Some("Chat.SomePush#1".to_string()),
            ..Default::default()
        };
        router
            .ingest(encoded(
                MsgKind::ServiceMethod,
                &header,
                &ClientHello::default(),
            ))
            .await;
        match rx.recv().await {
            Some(SessionEvent::ServiceMethod { method, .. }) => {
                assert_eq!(method, "Chat.SomePush");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_session_id_adoption_and_mismatch() {
        let ids = SessionIds::new();
        ids.observe(&FrameHeader {
            session_id: Some(41),
            ..Default::default()
        });
        assert_eq!(ids.session_id.load(Ordering::Acquire), 41);
        // A differing id is logged but the adopted one sticks.
        ids.observe(&FrameHeader {
            session_id: Some(77),
            ..Default::default()
        });
        assert_eq!(ids.session_id.load(Ordering::Acquire), 41);
    }

    #[test]
    fn test_steam_id_adopted_once() {
        let ids = SessionIds::new();
        assert_eq!(ids.steam_id.load(Ordering::Acquire), ACCOUNT_ID_MASK);
        ids.observe(&FrameHeader {
            steam_id: Some(76561198000000001),
            ..Default::default()
        });
        assert_eq!(ids.steam_id.load(Ordering::Acquire), 76561198000000001);
        ids.observe(&FrameHeader {
            steam_id: Some(76561198000000002),
            ..Default::default()
        });
        assert_eq!(ids.steam_id.load(Ordering::Acquire), 76561198000000001);
    }
}
