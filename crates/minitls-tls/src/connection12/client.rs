use std::io::{self, Read, Write};

use log::{debug, trace, warn};

use super::ConnectionState;
use crate::alert::{alert_for_error, Alert, AlertDescription, AlertLevel};
use crate::config::TlsConfig;
use crate::connection_info::ConnectionInfo;
use crate::handshake::client12::Tls12ClientHandshake;
use crate::handshake::codec::{decode_server_hello, read_u24, HANDSHAKE_HEADER_LEN};
use crate::handshake::codec12::{
    decode_certificate12, decode_change_cipher_spec, decode_server_hello_done,
    decode_server_key_exchange, encode_change_cipher_spec,
};
use crate::handshake::HandshakeType;
use crate::record::{
    ContentType, RecordLayer, MAX_CIPHERTEXT_LENGTH, MAX_PLAINTEXT_LENGTH, RECORD_HEADER_LEN,
};
use crate::{CipherSuite, TlsConnection, TlsError, TlsVersion};
use minitls_types::ErrorClass;

/// Largest handshake message accepted from the server.
pub const MAX_HANDSHAKE_MESSAGE_LEN: usize = 1 << 17;

/// A synchronous TLS 1.2 client connection.
pub struct Tls12ClientConnection<S: Read + Write> {
    stream: S,
    config: TlsConfig,
    pub(super) record_layer: RecordLayer,
    pub(super) state: ConnectionState,
    negotiated_suite: Option<CipherSuite>,
    /// Buffer for reading records from the stream.
    read_buf: Vec<u8>,
    /// Handshake bytes not yet split into messages.
    hs_buf: Vec<u8>,
    /// Buffered decrypted application data.
    app_data_buf: Vec<u8>,
    client_verify_data: Vec<u8>,
    server_verify_data: Vec<u8>,
    /// Peer certificates (DER-encoded, leaf first).
    peer_certificates: Vec<Vec<u8>>,
    insecure_suite: bool,
    /// The close_notify record, once sent.
    close_notify_record: Option<Vec<u8>>,
    pub(super) received_close_notify: bool,
}

impl<S: Read + Write> Tls12ClientConnection<S> {
    /// Create a new TLS 1.2 client connection wrapping the given stream.
    pub fn new(stream: S, config: TlsConfig) -> Self {
        let mut record_layer = RecordLayer::new();
        record_layer.max_fragment_size = config.max_fragment_size.clamp(1, MAX_PLAINTEXT_LENGTH);
        Self {
            stream,
            config,
            record_layer,
            state: ConnectionState::Handshaking,
            negotiated_suite: None,
            read_buf: Vec::with_capacity(16 * 1024),
            hs_buf: Vec::new(),
            app_data_buf: Vec::new(),
            client_verify_data: Vec::new(),
            server_verify_data: Vec::new(),
            peer_certificates: Vec::new(),
            insecure_suite: false,
            close_notify_record: None,
            received_close_notify: false,
        }
    }

    /// Get a snapshot of the negotiated connection parameters.
    /// Returns `None` if the handshake has not completed.
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.negotiated_suite.map(|suite| ConnectionInfo {
            cipher_suite: suite,
            peer_certificates: self.peer_certificates.clone(),
            server_name: self.config.server_name.clone(),
            insecure_suite: self.insecure_suite,
            peer_verify_data: self.server_verify_data.clone(),
            local_verify_data: self.client_verify_data.clone(),
        })
    }

    /// Get the peer's certificate chain (DER-encoded, leaf first).
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    /// Get the peer's Finished verify_data.
    pub fn peer_verify_data(&self) -> &[u8] {
        &self.server_verify_data
    }

    /// Get the local Finished verify_data.
    pub fn local_verify_data(&self) -> &[u8] {
        &self.client_verify_data
    }

    /// Whether the peer has sent close_notify.
    pub fn peer_closed(&self) -> bool {
        self.received_close_notify
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Send close_notify and return the record bytes.
    ///
    /// Only the first call writes; later calls return the same bytes.
    /// Transport errors are logged and ignored since the peer may already
    /// be gone.
    pub fn send_close_notify(&mut self) -> Result<Vec<u8>, TlsError> {
        if let Some(record) = &self.close_notify_record {
            return Ok(record.clone());
        }
        let record = self
            .record_layer
            .seal_record(ContentType::Alert, &Alert::CLOSE_NOTIFY.encode())?;
        if let Err(e) = self
            .stream
            .write_all(&record)
            .and_then(|()| self.stream.flush())
        {
            debug!("close_notify not delivered: {e}");
        }
        self.close_notify_record = Some(record.clone());
        if self.state != ConnectionState::Error {
            self.state = ConnectionState::Closed;
        }
        Ok(record)
    }

    /// Read at least `min_bytes` from the stream into read_buf.
    fn fill_buf(&mut self, min_bytes: usize) -> Result<(), TlsError> {
        while self.read_buf.len() < min_bytes {
            let mut tmp = [0u8; 16384];
            let n = match self.stream.read(&mut tmp) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(TlsError::IoError(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection without close_notify",
                )));
            }
            self.read_buf.extend_from_slice(&tmp[..n]);
        }
        Ok(())
    }

    /// Read a single record from the stream.
    fn read_record(&mut self) -> Result<(ContentType, Vec<u8>), TlsError> {
        self.fill_buf(RECORD_HEADER_LEN)?;
        let length = u16::from_be_bytes([self.read_buf[3], self.read_buf[4]]) as usize;
        if length > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::RecordError("record too large".into()));
        }
        self.fill_buf(RECORD_HEADER_LEN + length)?;
        let (ct, plaintext, consumed) = self.record_layer.open_record(&self.read_buf)?;
        self.read_buf.drain(..consumed);
        trace!("record in: {ct:?}, {length} bytes");
        Ok((ct, plaintext))
    }

    /// Act on a received alert. Returns `Ok` only for ignorable warnings.
    fn handle_alert(&mut self, data: &[u8]) -> Result<(), TlsError> {
        let alert = Alert::decode(data)?;
        if alert.is_close_notify() {
            debug!("close_notify received");
            self.received_close_notify = true;
            return Err(TlsError::ConnectionClosed);
        }
        match alert.level {
            AlertLevel::Fatal => Err(TlsError::AlertReceived {
                level: alert.level as u8,
                description: alert.description as u8,
            }),
            AlertLevel::Warning => {
                warn!("ignoring warning alert {:?}", alert.description);
                Ok(())
            }
        }
    }

    /// Take the next complete handshake message, reading records as needed.
    /// Returns (handshake_type, full_message_bytes_including_header).
    fn read_handshake_msg(&mut self) -> Result<(HandshakeType, Vec<u8>), TlsError> {
        loop {
            if self.hs_buf.len() >= HANDSHAKE_HEADER_LEN {
                let body_len = read_u24(&self.hs_buf[1..]) as usize;
                if body_len > MAX_HANDSHAKE_MESSAGE_LEN {
                    return Err(TlsError::DecodeError(format!(
                        "handshake message of {body_len} bytes exceeds limit"
                    )));
                }
                let total = HANDSHAKE_HEADER_LEN + body_len;
                if self.hs_buf.len() >= total {
                    let msg: Vec<u8> = self.hs_buf.drain(..total).collect();
                    let hs_type = HandshakeType::from_u8(msg[0]).ok_or_else(|| {
                        TlsError::DecodeError(format!("unknown handshake type: {}", msg[0]))
                    })?;
                    return Ok((hs_type, msg));
                }
            }

            let (ct, data) = self.read_record()?;
            match ct {
                ContentType::Handshake => self.hs_buf.extend_from_slice(&data),
                ContentType::Alert => self.handle_alert(&data)?,
                other => {
                    return Err(TlsError::UnexpectedMessage(format!(
                        "{other:?} record while waiting for a handshake message"
                    )))
                }
            }
        }
    }

    /// Fragment and send a handshake message.
    fn send_handshake(&mut self, msg: &[u8]) -> Result<(), TlsError> {
        for chunk in msg.chunks(self.record_layer.max_fragment_size) {
            let record = self.record_layer.seal_record(ContentType::Handshake, chunk)?;
            self.stream.write_all(&record)?;
        }
        Ok(())
    }

    /// Best-effort fatal alert for a local failure.
    fn send_fatal_alert(&mut self, description: AlertDescription) {
        let alert = Alert::fatal(description).encode();
        match self.record_layer.seal_record(ContentType::Alert, &alert) {
            Ok(record) => {
                if let Err(e) = self.stream.write_all(&record) {
                    debug!("fatal alert {description:?} not delivered: {e}");
                }
            }
            Err(e) => debug!("fatal alert {description:?} not sealed: {e}"),
        }
    }

    /// Mark the connection failed and tell the peer why, unless the failure
    /// came from the transport or the peer itself.
    fn fail(&mut self, err: TlsError) -> TlsError {
        let peer_ended = matches!(
            err,
            TlsError::AlertReceived { .. } | TlsError::ConnectionClosed
        );
        if !peer_ended && err.class() != ErrorClass::Transport {
            self.send_fatal_alert(alert_for_error(&err));
        }
        self.state = ConnectionState::Error;
        err
    }

    /// Run the TLS 1.2 client handshake.
    fn do_handshake(&mut self) -> Result<(), TlsError> {
        let mut hs = Tls12ClientHandshake::new(self.config.clone());
        match self.run_handshake(&mut hs) {
            Ok(()) => Ok(()),
            Err(e) => {
                hs.abort();
                warn!("handshake failed: {e}");
                Err(self.fail(e))
            }
        }
    }

    fn run_handshake(&mut self, hs: &mut Tls12ClientHandshake) -> Result<(), TlsError> {
        // 1. ClientHello
        let ch_msg = hs.build_client_hello()?;
        self.send_handshake(&ch_msg)?;
        self.stream.flush()?;

        // 2. Server flight, up to ServerHelloDone. The state machine
        //    rejects anything out of order.
        loop {
            let (hs_type, msg) = self.read_handshake_msg()?;
            let body = &msg[HANDSHAKE_HEADER_LEN..];
            match hs_type {
                HandshakeType::ServerHello => {
                    let sh = decode_server_hello(body)?;
                    hs.process_server_hello(&msg, &sh)?;
                }
                HandshakeType::Certificate => {
                    let cert = decode_certificate12(body)?;
                    hs.process_certificate(&msg, &cert)?;
                }
                HandshakeType::ServerKeyExchange => {
                    let ske = decode_server_key_exchange(body)?;
                    hs.process_server_key_exchange(&msg, &ske)?;
                }
                HandshakeType::ServerHelloDone => {
                    decode_server_hello_done(body)?;
                    hs.process_server_hello_done(&msg)?;
                    break;
                }
                other => {
                    return Err(TlsError::UnexpectedMessage(format!(
                        "{other:?} in server hello flight"
                    )))
                }
            }
        }
        if !self.hs_buf.is_empty() {
            return Err(TlsError::UnexpectedMessage(
                "data after ServerHelloDone".into(),
            ));
        }

        let params = hs
            .params()
            .ok_or_else(|| TlsError::HandshakeFailed("no cipher suite negotiated".into()))?;

        // 3. ClientKeyExchange, ChangeCipherSpec, Finished
        let flight = hs.build_client_flight()?;
        self.send_handshake(&flight.client_key_exchange)?;

        let ccs = self
            .record_layer
            .seal_record(ContentType::ChangeCipherSpec, &encode_change_cipher_spec())?;
        self.stream.write_all(&ccs)?;
        self.record_layer
            .activate_write_encryption(params, flight.keys.client_write())?;
        debug!("write protection active ({})", params.name);
        hs.change_cipher_spec_sent()?;

        self.send_handshake(&flight.finished)?;
        self.stream.flush()?;
        hs.finished_sent()?;

        // 4. Server ChangeCipherSpec
        loop {
            let (ct, data) = self.read_record()?;
            match ct {
                ContentType::ChangeCipherSpec => {
                    if !self.hs_buf.is_empty() {
                        return Err(TlsError::DecodeError(
                            "partial handshake message before ChangeCipherSpec".into(),
                        ));
                    }
                    decode_change_cipher_spec(&data)?;
                    hs.process_change_cipher_spec()?;
                    break;
                }
                ContentType::Alert => self.handle_alert(&data)?,
                other => {
                    return Err(TlsError::UnexpectedMessage(format!(
                        "{other:?} record while waiting for ChangeCipherSpec"
                    )))
                }
            }
        }
        self.record_layer
            .activate_read_decryption(params, flight.keys.server_write())?;
        debug!("read protection active ({})", params.name);
        drop(flight);

        // 5. Server Finished
        let (hs_type, msg) = self.read_handshake_msg()?;
        if hs_type != HandshakeType::Finished {
            return Err(TlsError::UnexpectedMessage(format!(
                "expected Finished, got {hs_type:?}"
            )));
        }
        hs.process_finished(&msg, &msg[HANDSHAKE_HEADER_LEN..])?;
        if !self.hs_buf.is_empty() {
            return Err(TlsError::UnexpectedMessage(
                "data after server Finished".into(),
            ));
        }

        self.negotiated_suite = Some(params.suite);
        self.insecure_suite = params.is_insecure();
        self.client_verify_data = hs.client_verify_data().to_vec();
        self.server_verify_data = hs.server_verify_data().to_vec();
        self.peer_certificates = hs.server_certificates().to_vec();
        self.state = ConnectionState::Connected;
        debug!("handshake complete: {}", params.name);
        Ok(())
    }

    /// Pull the next application data record into `app_data_buf`.
    /// Returns false once the peer has sent close_notify.
    fn read_app_data(&mut self) -> Result<bool, TlsError> {
        loop {
            let (ct, data) = self.read_record()?;
            match ct {
                ContentType::ApplicationData => {
                    if data.is_empty() {
                        continue;
                    }
                    self.app_data_buf.extend_from_slice(&data);
                    return Ok(true);
                }
                ContentType::Alert => match self.handle_alert(&data) {
                    Ok(()) => continue,
                    Err(TlsError::ConnectionClosed) => return Ok(false),
                    Err(e) => return Err(e),
                },
                ContentType::Handshake => {
                    self.hs_buf.extend_from_slice(&data);
                    self.refuse_renegotiation()?;
                }
                ContentType::ChangeCipherSpec => {
                    return Err(TlsError::UnexpectedMessage(
                        "ChangeCipherSpec after handshake".into(),
                    ))
                }
            }
        }
    }

    /// Answer HelloRequest with a no_renegotiation warning; anything else
    /// after the handshake is unexpected.
    fn refuse_renegotiation(&mut self) -> Result<(), TlsError> {
        while self.hs_buf.len() >= HANDSHAKE_HEADER_LEN {
            if self.hs_buf[..HANDSHAKE_HEADER_LEN] != [HandshakeType::HelloRequest as u8, 0, 0, 0]
            {
                return Err(TlsError::UnexpectedMessage(format!(
                    "post-handshake message type {}",
                    self.hs_buf[0]
                )));
            }
            self.hs_buf.drain(..HANDSHAKE_HEADER_LEN);
            let alert = Alert {
                level: AlertLevel::Warning,
                description: AlertDescription::NoRenegotiation,
            };
            let record = self
                .record_layer
                .seal_record(ContentType::Alert, &alert.encode())?;
            self.stream.write_all(&record)?;
            debug!("refused renegotiation");
        }
        Ok(())
    }
}

impl<S: Read + Write> TlsConnection for Tls12ClientConnection<S> {
    fn handshake(&mut self) -> Result<(), TlsError> {
        if self.state != ConnectionState::Handshaking {
            return Err(TlsError::HandshakeFailed(
                "handshake already performed".into(),
            ));
        }
        self.do_handshake()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        if self.app_data_buf.is_empty() {
            if self.received_close_notify {
                return Ok(0);
            }
            if self.state != ConnectionState::Connected {
                return Err(TlsError::RecordError(format!(
                    "read in state {:?}",
                    self.state
                )));
            }
            match self.read_app_data() {
                Ok(true) => {}
                Ok(false) => return Ok(0),
                Err(e) => return Err(self.fail(e)),
            }
        }
        let n = buf.len().min(self.app_data_buf.len());
        buf[..n].copy_from_slice(&self.app_data_buf[..n]);
        self.app_data_buf.drain(..n);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
        if self.state != ConnectionState::Connected {
            return Err(TlsError::RecordError(format!(
                "write in state {:?}",
                self.state
            )));
        }
        for chunk in buf.chunks(self.record_layer.max_fragment_size) {
            let record = match self
                .record_layer
                .seal_record(ContentType::ApplicationData, chunk)
            {
                Ok(record) => record,
                Err(e) => return Err(self.fail(e)),
            };
            // A partial record leaves the write sequence out of step with the peer.
            if let Err(e) = self.stream.write_all(&record) {
                return Err(self.fail(e.into()));
            }
        }
        if let Err(e) = self.stream.flush() {
            return Err(self.fail(e.into()));
        }
        Ok(buf.len())
    }

    fn shutdown(&mut self) -> Result<(), TlsError> {
        self.send_close_notify()?;
        Ok(())
    }

    fn version(&self) -> Option<TlsVersion> {
        self.negotiated_suite.map(|_| TlsVersion::Tls12)
    }

    fn cipher_suite(&self) -> Option<CipherSuite> {
        self.negotiated_suite
    }
}
