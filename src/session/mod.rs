//! The Kraken protocol session: the single object an application interacts
//! with after construction.
//!
//! A [`Session`] wires together one [`Connection`], one [`ChannelManager`]
//! and one replay table per supported channel, the `req_id` generator, the
//! last-observed transport epoch, per-channel callback dispatchers, and a
//! pull-based fact store (pong, status, rejection).
//!
//! # Poll-driven operation
//!
//! All session mutation happens on the caller's task through `&mut self`:
//! [`Session::poll`] drives the connection (retry timer, liveness watchdog),
//! drains connection signals — replaying acknowledged subscriptions when the
//! transport epoch changes — and drains received messages, routing each
//! parsed message to the channel managers, the replay database, and user
//! callbacks.
//!
//! # Callback contract
//!
//! Callbacks run synchronously inside `poll()` in network arrival order per
//! symbol. They receive `&Event` and cannot re-enter the session's mutating
//! methods (the borrow checker enforces the re-entrancy rule).

use std::collections::{HashMap, VecDeque};

use tokio::time::Instant;

use crate::connection::{Connection, ConnectionConfig, ConnectionSignal, ConnectionState};
use crate::error::{Result, WirekrakError};
use crate::protocol::channel::Channel;
use crate::protocol::channel_manager::ChannelManager;
use crate::protocol::messages::{
    self, BookData, DataKind, Inbound, MethodAck, RejectionNotice, StatusData, TradeEntry,
};
use crate::protocol::replay::ReplayDatabase;
use crate::protocol::requests::{
    self, BookSubscribe, BookUnsubscribe, KrakenRequest, Ping, TradeSubscribe, TradeUnsubscribe,
};
use crate::protocol::ReqId;
use crate::transport::{MessageBlock, Transport, TransportTelemetry, WebSocketTransport};

mod dispatcher;
pub mod facts;

use dispatcher::Dispatcher;
pub use facts::{PongFact, SessionSignal};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One trade delivered to a trade-channel callback.
#[derive(Debug, Clone)]
pub struct TradeEvent {
    /// Whether the trade came from the initial snapshot or a live update.
    pub kind: DataKind,
    /// The executed trade.
    pub trade: TradeEntry,
}

/// One book payload delivered to a book-channel callback.
#[derive(Debug, Clone)]
pub struct BookEvent {
    /// Snapshot or incremental update.
    pub kind: DataKind,
    /// The book payload.
    pub book: BookData,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Connection-level settings (liveness windows, retry policy).
    pub connection: ConnectionConfig,
    /// Whether a liveness warning automatically emits a protocol-level
    /// ping. Enabled by default; the connection itself never synthesizes
    /// traffic.
    pub disable_auto_ping: bool,
}

// ---------------------------------------------------------------------------
// Outbound request store
// ---------------------------------------------------------------------------

/// The typed request behind an in-flight `req_id`, kept until every symbol
/// of the request has been resolved. Subscribe entries seed the replay
/// database as their symbols are acknowledged.
#[derive(Debug, Clone)]
enum OutboundRequest {
    TradeSubscribe(TradeSubscribe),
    TradeUnsubscribe(TradeUnsubscribe),
    BookSubscribe(BookSubscribe),
    BookUnsubscribe(BookUnsubscribe),
}

impl OutboundRequest {
    fn channel(&self) -> Channel {
        match self {
            OutboundRequest::TradeSubscribe(_) | OutboundRequest::TradeUnsubscribe(_) => {
                Channel::Trade
            }
            OutboundRequest::BookSubscribe(_) | OutboundRequest::BookUnsubscribe(_) => {
                Channel::Book
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The session type most applications want: a [`Session`] over the
/// production WebSocket transport.
pub type KrakenSession = Session<WebSocketTransport>;

/// Protocol session over any [`Transport`].
pub struct Session<T: Transport> {
    connection: Connection<T>,
    observed_epoch: u64,
    next_req_id: u64,

    trade_manager: ChannelManager,
    book_manager: ChannelManager,
    replay: ReplayDatabase,

    trade_dispatcher: Dispatcher<TradeEvent>,
    book_dispatcher: Dispatcher<BookEvent>,

    outbound: HashMap<ReqId, OutboundRequest>,
    signals: VecDeque<SessionSignal>,

    pong: PongFact,
    status: Option<StatusData>,
    rejection: Option<RejectionNotice>,

    origin: Instant,
    auto_ping: bool,
}

impl KrakenSession {
    /// A session over the production WebSocket transport.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_transport(WebSocketTransport::new(), config)
    }
}

impl<T: Transport> Session<T> {
    /// A session over a caller-supplied transport. Used by integration tests
    /// and embedders with their own I/O.
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        Self {
            connection: Connection::new(transport, config.connection),
            observed_epoch: 0,
            next_req_id: 1,
            trade_manager: ChannelManager::new(Channel::Trade),
            book_manager: ChannelManager::new(Channel::Book),
            replay: ReplayDatabase::default(),
            trade_dispatcher: Dispatcher::default(),
            book_dispatcher: Dispatcher::default(),
            outbound: HashMap::new(),
            signals: VecDeque::new(),
            pong: PongFact::default(),
            status: None,
            rejection: None,
            origin: Instant::now(),
            auto_ping: !config.disable_auto_ping,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open the connection. Fails to the caller only on this first attempt;
    /// later disconnects are recovered internally via the retry policy.
    pub async fn connect(&mut self, url: &str) -> Result<()> {
        self.connection.open(url).await
    }

    /// Close the session: cancel any pending retry, close the transport, and
    /// drop all subscription state. Idempotent.
    pub async fn close(&mut self) {
        self.connection.close().await;
        self.trade_manager.clear_all();
        self.book_manager.clear_all();
        self.trade_dispatcher.clear();
        self.book_dispatcher.clear();
        self.replay.clear();
        self.outbound.clear();
    }

    // -----------------------------------------------------------------------
    // Subscribe / unsubscribe
    // -----------------------------------------------------------------------

    /// Subscribe to the trade feed.
    ///
    /// Mints a fresh `req_id`, registers the request as pending, registers
    /// the callback under `(req_id, symbols)`, and sends the envelope.
    /// Symbols that are already active or already pending are filtered out;
    /// if nothing remains the minted id is recycled, nothing goes on the
    /// wire, and [`ReqId::INVALID`] is returned.
    pub async fn subscribe_trade(
        &mut self,
        request: TradeSubscribe,
        callback: impl Fn(&TradeEvent) + Send + Sync + 'static,
    ) -> Result<ReqId> {
        requests::validate_symbols(&request.symbols)?;
        if !self.connection.is_connected() {
            return Err(WirekrakError::NotConnected);
        }

        let req_id = self.mint_req_id();
        let filtered = self.trade_manager.register_subscription(&request.symbols, req_id);
        if filtered.is_empty() {
            self.recycle_req_id(req_id);
            return Ok(ReqId::INVALID);
        }

        let mut request = request;
        request.symbols = filtered;
        request.set_req_id(req_id);

        self.trade_dispatcher
            .add(req_id, &request.symbols, std::sync::Arc::new(callback));

        let wire = request.to_wire()?;
        if !self.connection.send(&wire).await {
            tracing::warn!(%req_id, "trade subscribe send failed; awaiting reconnect");
        }

        self.outbound
            .insert(req_id, OutboundRequest::TradeSubscribe(request));
        Ok(req_id)
    }

    /// Unsubscribe symbols from the trade feed. Non-active symbols are
    /// filtered out; an entirely filtered request returns
    /// [`ReqId::INVALID`] without touching the wire.
    pub async fn unsubscribe_trade(&mut self, request: TradeUnsubscribe) -> Result<ReqId> {
        requests::validate_symbols(&request.symbols)?;
        if !self.connection.is_connected() {
            return Err(WirekrakError::NotConnected);
        }

        let req_id = self.mint_req_id();
        let filtered = self
            .trade_manager
            .register_unsubscription(&request.symbols, req_id);
        if filtered.is_empty() {
            self.recycle_req_id(req_id);
            return Ok(ReqId::INVALID);
        }

        let mut request = request;
        request.symbols = filtered;
        request.set_req_id(req_id);

        let wire = request.to_wire()?;
        if !self.connection.send(&wire).await {
            tracing::warn!(%req_id, "trade unsubscribe send failed; awaiting reconnect");
        }

        self.outbound
            .insert(req_id, OutboundRequest::TradeUnsubscribe(request));
        Ok(req_id)
    }

    /// Subscribe to the order-book feed. See [`Session::subscribe_trade`]
    /// for the idempotency rules.
    pub async fn subscribe_book(
        &mut self,
        request: BookSubscribe,
        callback: impl Fn(&BookEvent) + Send + Sync + 'static,
    ) -> Result<ReqId> {
        requests::validate_symbols(&request.symbols)?;
        if !self.connection.is_connected() {
            return Err(WirekrakError::NotConnected);
        }

        let req_id = self.mint_req_id();
        let filtered = self.book_manager.register_subscription(&request.symbols, req_id);
        if filtered.is_empty() {
            self.recycle_req_id(req_id);
            return Ok(ReqId::INVALID);
        }

        let mut request = request;
        request.symbols = filtered;
        request.set_req_id(req_id);

        self.book_dispatcher
            .add(req_id, &request.symbols, std::sync::Arc::new(callback));

        let wire = request.to_wire()?;
        if !self.connection.send(&wire).await {
            tracing::warn!(%req_id, "book subscribe send failed; awaiting reconnect");
        }

        self.outbound
            .insert(req_id, OutboundRequest::BookSubscribe(request));
        Ok(req_id)
    }

    /// Unsubscribe symbols from the order-book feed.
    pub async fn unsubscribe_book(&mut self, request: BookUnsubscribe) -> Result<ReqId> {
        requests::validate_symbols(&request.symbols)?;
        if !self.connection.is_connected() {
            return Err(WirekrakError::NotConnected);
        }

        let req_id = self.mint_req_id();
        let filtered = self
            .book_manager
            .register_unsubscription(&request.symbols, req_id);
        if filtered.is_empty() {
            self.recycle_req_id(req_id);
            return Ok(ReqId::INVALID);
        }

        let mut request = request;
        request.symbols = filtered;
        request.set_req_id(req_id);

        let wire = request.to_wire()?;
        if !self.connection.send(&wire).await {
            tracing::warn!(%req_id, "book unsubscribe send failed; awaiting reconnect");
        }

        self.outbound
            .insert(req_id, OutboundRequest::BookUnsubscribe(request));
        Ok(req_id)
    }

    /// Send a protocol-level ping. The reply updates the pong fact.
    pub async fn ping(&mut self) -> Result<ReqId> {
        if !self.connection.is_connected() {
            return Err(WirekrakError::NotConnected);
        }
        let req_id = self.mint_req_id();
        let wire = Ping {
            req_id: Some(req_id),
        }
        .to_wire()?;
        if !self.connection.send(&wire).await {
            tracing::debug!(%req_id, "ping send failed");
        }
        Ok(req_id)
    }

    // -----------------------------------------------------------------------
    // Poll
    // -----------------------------------------------------------------------

    /// Drive the session. Must be called regularly.
    ///
    /// One call drives the connection (retry timer, liveness watchdog),
    /// drains connection signals — triggering replay when the transport
    /// epoch changes — and drains all received messages, invoking user
    /// callbacks synchronously.
    pub async fn poll(&mut self) {
        self.connection.poll().await;

        while let Some(signal) = self.connection.poll_signal() {
            match signal {
                ConnectionSignal::Connected { epoch } => {
                    if epoch > self.observed_epoch {
                        self.replay_after_reconnect(epoch).await;
                        self.observed_epoch = epoch;
                    }
                }
                ConnectionSignal::LivenessThreatened { idle } => {
                    tracing::warn!(
                        idle_ms = idle.as_millis() as u64,
                        "connection liveness threatened"
                    );
                    if self.auto_ping {
                        let _ = self.ping().await;
                    }
                    self.signals
                        .push_back(SessionSignal::LivenessWarning { idle });
                }
                ConnectionSignal::Disconnected => {
                    tracing::debug!("transport disconnected");
                }
                ConnectionSignal::RetryImmediate { attempt } => {
                    tracing::debug!(attempt, "reconnecting immediately");
                }
                ConnectionSignal::RetryScheduled { attempt, delay } => {
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");
                }
            }
        }

        while let Some(block) = self.connection.try_recv() {
            self.route(block);
        }

        #[cfg(debug_assertions)]
        {
            self.trade_manager.assert_consistency();
            self.book_manager.assert_consistency();
            self.replay.trade_table_mut().assert_consistency();
            self.replay.book_table_mut().assert_consistency();
        }
    }

    /// Pull at most one protocol-level signal.
    pub fn poll_signal(&mut self) -> Option<SessionSignal> {
        self.signals.pop_front()
    }

    /// True iff no requests are pending, no signals are queued, and the
    /// connection has nothing buffered or scheduled.
    pub fn is_idle(&self) -> bool {
        !self.trade_manager.has_pending_requests()
            && !self.book_manager.has_pending_requests()
            && self.signals.is_empty()
            && self.connection.is_idle()
    }

    // -----------------------------------------------------------------------
    // Facts & views
    // -----------------------------------------------------------------------

    /// The latest pong evidence.
    pub fn pong(&self) -> PongFact {
        self.pong
    }

    /// The latest system status, if one has been observed.
    pub fn status(&self) -> Option<&StatusData> {
        self.status.as_ref()
    }

    /// The latest rejection notice, if one has been observed.
    pub fn rejection(&self) -> Option<&RejectionNotice> {
        self.rejection.as_ref()
    }

    /// The current transport epoch (monotonically non-decreasing).
    pub fn transport_epoch(&self) -> u64 {
        self.connection.transport_epoch()
    }

    /// The connection's lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Trade-channel subscription state.
    pub fn trade_subscriptions(&self) -> &ChannelManager {
        &self.trade_manager
    }

    /// Book-channel subscription state.
    pub fn book_subscriptions(&self) -> &ChannelManager {
        &self.book_manager
    }

    /// The replay database (acknowledged intent).
    pub fn replay_database(&self) -> &ReplayDatabase {
        &self.replay
    }

    /// In-flight requests across all channels.
    pub fn pending_protocol_requests(&self) -> usize {
        self.trade_manager.pending_requests() + self.book_manager.pending_requests()
    }

    /// Receive-path counters of the underlying transport.
    pub fn telemetry(&self) -> TransportTelemetry {
        self.connection.telemetry()
    }

    // -----------------------------------------------------------------------
    // Request identity
    // -----------------------------------------------------------------------

    fn mint_req_id(&mut self) -> ReqId {
        let id = ReqId(self.next_req_id);
        self.next_req_id += 1;
        id
    }

    /// Return an id that produced no wire traffic. Only the most recently
    /// minted id can actually be reclaimed.
    fn recycle_req_id(&mut self, id: ReqId) {
        if id.0 + 1 == self.next_req_id {
            self.next_req_id = id.0;
        }
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    /// Rebuild protocol state for a new transport epoch.
    ///
    /// Pending state is dropped — only acknowledged intent is replayed. Each
    /// stored subscription is re-issued with its original `req_id`, and the
    /// surviving callbacks are re-registered under the same identity. The
    /// replay database only grows on ACK, so a storm of reconnects with no
    /// intervening ACKs cannot amplify the number of in-flight requests.
    async fn replay_after_reconnect(&mut self, epoch: u64) {
        tracing::info!(epoch, "transport epoch changed, replaying acknowledged subscriptions");

        self.trade_manager.clear_all();
        self.book_manager.clear_all();
        self.outbound.clear();

        let trade_callbacks = self.trade_dispatcher.take_callbacks();
        let book_callbacks = self.book_dispatcher.take_callbacks();

        let trade_subs = self.replay.trade_table_mut().take_subscriptions();
        let book_subs = self.replay.book_table_mut().take_subscriptions();

        for sub in trade_subs {
            let request = sub.into_request();
            let Some(req_id) = request.req_id().filter(|id| id.is_valid()) else {
                tracing::error!("dropping replayable subscription without req_id");
                continue;
            };

            let filtered = self
                .trade_manager
                .register_subscription(request.symbols(), req_id);
            if filtered.is_empty() {
                tracing::warn!(%req_id, "dropping fully filtered replayed subscription");
                continue;
            }

            if let Some(callback) = trade_callbacks.get(&req_id) {
                self.trade_dispatcher
                    .add(req_id, request.symbols(), callback.clone());
            }

            self.send_replay(&request, req_id).await;
            self.outbound
                .insert(req_id, OutboundRequest::TradeSubscribe(request));
        }

        for sub in book_subs {
            let request = sub.into_request();
            let Some(req_id) = request.req_id().filter(|id| id.is_valid()) else {
                tracing::error!("dropping replayable subscription without req_id");
                continue;
            };

            let filtered = self
                .book_manager
                .register_subscription(request.symbols(), req_id);
            if filtered.is_empty() {
                tracing::warn!(%req_id, "dropping fully filtered replayed subscription");
                continue;
            }

            if let Some(callback) = book_callbacks.get(&req_id) {
                self.book_dispatcher
                    .add(req_id, request.symbols(), callback.clone());
            }

            self.send_replay(&request, req_id).await;
            self.outbound
                .insert(req_id, OutboundRequest::BookSubscribe(request));
        }
    }

    async fn send_replay<R: KrakenRequest>(&mut self, request: &R, req_id: ReqId) {
        match request.to_wire() {
            Ok(wire) => {
                if !self.connection.send(&wire).await {
                    tracing::warn!(%req_id, "replay send failed; will retry next epoch");
                } else {
                    tracing::debug!(%req_id, "replayed subscription request");
                }
            }
            Err(e) => {
                tracing::error!(%req_id, error = %e, "failed to serialize replayed request");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound routing
    // -----------------------------------------------------------------------

    fn route(&mut self, block: MessageBlock) {
        let Some(text) = block.as_str() else {
            tracing::debug!(len = block.len(), "discarding non-UTF-8 message");
            return;
        };

        let Some(message) = messages::parse(text) else {
            return;
        };

        match message {
            Inbound::Ack(ack) => self.handle_ack(ack),
            Inbound::Pong(pong) => {
                self.pong.count += 1;
                self.pong.last_rx_ns = Some(self.origin.elapsed().as_nanos() as u64);
                if let Some(result) = &pong.result {
                    for warning in &result.warnings {
                        tracing::warn!(warning = %warning, "pong carried a warning");
                    }
                }
                self.signals.push_back(SessionSignal::PongObserved);
            }
            Inbound::Rejection(notice) => self.handle_rejection(notice),
            Inbound::Status(status) => {
                tracing::info!(
                    system = ?status.system,
                    connection_id = status.connection_id,
                    "exchange status update"
                );
                self.status = Some(status);
                self.signals.push_back(SessionSignal::StatusChanged);
            }
            Inbound::Trade(message) => {
                for trade in message.trades {
                    let symbol = trade.symbol.clone();
                    let event = TradeEvent {
                        kind: message.kind,
                        trade,
                    };
                    self.trade_dispatcher.dispatch(&symbol, &event);
                }
            }
            Inbound::Book(message) => {
                for book in message.books {
                    let symbol = book.symbol.clone();
                    let event = BookEvent {
                        kind: message.kind,
                        book,
                    };
                    self.book_dispatcher.dispatch(&symbol, &event);
                }
            }
            Inbound::Heartbeat => {
                // Liveness evidence is already captured at the transport.
            }
        }
    }

    fn handle_ack(&mut self, ack: MethodAck) {
        let Some(req_id) = ack.req_id.filter(|id| id.is_valid()) else {
            tracing::debug!("discarding ACK without req_id");
            return;
        };
        let Some(symbol) = ack.ack_symbol().cloned() else {
            tracing::debug!(%req_id, "discarding ACK without symbol");
            return;
        };

        // Failure ACKs carry no result object; fall back to the stored
        // outbound request to learn the channel.
        let channel = ack
            .ack_channel()
            .or_else(|| self.outbound.get(&req_id).map(OutboundRequest::channel));
        let Some(channel) = channel else {
            tracing::debug!(%req_id, symbol = %symbol, "ignoring ACK for unknown request");
            return;
        };

        if let Some(result) = &ack.result {
            for warning in &result.warnings {
                tracing::warn!(%req_id, warning = %warning, "ACK carried a warning");
            }
        }

        match (channel, ack.is_subscribe()) {
            (Channel::Trade, true) => {
                let applied =
                    self.trade_manager
                        .process_subscribe_ack(req_id, &symbol, ack.success);
                if applied {
                    if ack.success {
                        if let Some(OutboundRequest::TradeSubscribe(request)) =
                            self.outbound.get(&req_id)
                        {
                            let mut entry = request.clone();
                            *entry.symbols_mut() = vec![symbol.clone()];
                            self.replay.trade_table_mut().add(entry);
                        } else {
                            tracing::warn!(%req_id, "subscribe ACK without stored request");
                        }
                    } else {
                        tracing::warn!(
                            %req_id, symbol = %symbol,
                            error = ack.error.as_deref().unwrap_or(""),
                            "trade subscription rejected by exchange"
                        );
                        self.trade_dispatcher.remove_entry(req_id, &symbol);
                    }
                }
            }
            (Channel::Trade, false) => {
                let applied =
                    self.trade_manager
                        .process_unsubscribe_ack(req_id, &symbol, ack.success);
                if applied && ack.success {
                    self.replay.trade_table_mut().erase_symbol(&symbol);
                    self.trade_dispatcher.remove_symbol(&symbol);
                }
            }
            (Channel::Book, true) => {
                let applied =
                    self.book_manager
                        .process_subscribe_ack(req_id, &symbol, ack.success);
                if applied {
                    if ack.success {
                        if let Some(OutboundRequest::BookSubscribe(request)) =
                            self.outbound.get(&req_id)
                        {
                            let mut entry = request.clone();
                            *entry.symbols_mut() = vec![symbol.clone()];
                            self.replay.book_table_mut().add(entry);
                        } else {
                            tracing::warn!(%req_id, "subscribe ACK without stored request");
                        }
                    } else {
                        tracing::warn!(
                            %req_id, symbol = %symbol,
                            error = ack.error.as_deref().unwrap_or(""),
                            "book subscription rejected by exchange"
                        );
                        self.book_dispatcher.remove_entry(req_id, &symbol);
                    }
                }
            }
            (Channel::Book, false) => {
                let applied =
                    self.book_manager
                        .process_unsubscribe_ack(req_id, &symbol, ack.success);
                if applied && ack.success {
                    self.replay.book_table_mut().erase_symbol(&symbol);
                    self.book_dispatcher.remove_symbol(&symbol);
                }
            }
            (other, _) => {
                tracing::debug!(channel = %other, "ignoring ACK for unsupported channel");
            }
        }

        self.gc_outbound(req_id);
    }

    fn handle_rejection(&mut self, notice: RejectionNotice) {
        tracing::warn!(
            error = %notice.error,
            req_id = notice.req_id.map(|id| id.0),
            symbol = notice.symbol.as_deref(),
            "exchange rejection notice"
        );

        let addressed = notice
            .req_id
            .filter(|id| id.is_valid())
            .zip(notice.symbol.clone());

        if let Some((req_id, symbol)) = addressed {
            // The rejection may apply to a pending request…
            let mut handled = self.trade_manager.try_process_rejection(req_id, &symbol);
            if !handled {
                handled = self.book_manager.try_process_rejection(req_id, &symbol);
            }

            // …or trim an already-acknowledged subscription. The active set
            // follows the replay database so the two stay reconciled.
            if self
                .replay
                .trade_table_mut()
                .try_process_rejection(req_id, &symbol)
            {
                self.trade_manager.drop_active(&symbol);
                handled = true;
            }
            if self
                .replay
                .book_table_mut()
                .try_process_rejection(req_id, &symbol)
            {
                self.book_manager.drop_active(&symbol);
                handled = true;
            }

            if handled {
                self.trade_dispatcher.remove_entry(req_id, &symbol);
                self.book_dispatcher.remove_entry(req_id, &symbol);
                self.gc_outbound(req_id);
            }
        }

        self.rejection = Some(notice);
        self.signals.push_back(SessionSignal::RejectionObserved);
    }

    /// Drop the stored outbound request once nothing references it anymore.
    fn gc_outbound(&mut self, req_id: ReqId) {
        let still_pending = match self.outbound.get(&req_id).map(OutboundRequest::channel) {
            Some(Channel::Trade) => self.trade_manager.contains_pending_request(req_id),
            Some(Channel::Book) => self.book_manager.contains_pending_request(req_id),
            _ => return,
        };
        if !still_pending {
            self.outbound.remove(&req_id);
        }
    }
}
