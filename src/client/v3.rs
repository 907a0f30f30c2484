//! SNMPv3 GET: discovery, key localization, request and reply processing.

use bytes::Bytes;
use tokio::time::Instant;

use super::{Client, Step, UsmAuth, UsmKeys};
use crate::ber::Decoder;
use crate::error::{Error, Result};
use crate::format::Hex;
use crate::message::{
    Message, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData,
};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::v3::{
    EngineState, ReportKind, UsmSecurityParams, authenticate_message, verify_message,
};
use crate::varbind::VarBind;

/// A reply that passed USM processing.
enum Reply {
    Pdu(Pdu),
    Report(ReportKind, UsmSecurityParams),
}

impl<T: Transport> Client<T> {
    pub(super) async fn get_v3(&self, usm: &UsmAuth, oid: &Oid, deadline: Instant) -> Result<VarBind> {
        let level = usm.security_level();
        let target = self.peer_addr();

        // password expansion runs on the blocking pool while discovery is in flight
        let masters = level.requires_auth().then(|| {
            let usm = usm.clone();
            tokio::task::spawn_blocking(move || usm.master_keys())
        });

        let mut engine = self.discover(deadline).await?;

        let keys = match masters {
            Some(task) => {
                let masters = task.await.map_err(|e| {
                    Error::Config(format!("key derivation task failed: {e}").into()).boxed()
                })?;
                let engine_id = engine.engine_id.clone();
                tokio::task::spawn_blocking(move || masters.localize(&engine_id))
                    .await
                    .map_err(|e| {
                        Error::Config(format!("key localization task failed: {e}").into()).boxed()
                    })??
            }
            None => UsmKeys::default(),
        };

        let mut msg_id = self.next_request_id();
        let request = self.encode_get(usm, &keys, &engine, msg_id, oid)?;
        let mut resynced = false;

        tracing::debug!(target: "snmp_credcheck::client", { snmp.msg_id = msg_id, snmp.security_level = %level }, "sending v3 GET");

        let outcome = self
            .exchange(request, None, deadline, |raw, message| {
                let Message::V3(msg) = message else {
                    return Step::Ignore;
                };
                if msg.msg_id() != msg_id {
                    return Step::Ignore;
                }
                match self.open_reply(raw, msg, level, &keys) {
                    Err(e) => Step::Done(Err(e)),
                    Ok(Reply::Pdu(pdu)) if pdu.request_id != msg_id => Step::Ignore,
                    Ok(Reply::Pdu(pdu)) => Step::Done(self.finish_get(pdu)),
                    Ok(Reply::Report(ReportKind::NotInTimeWindow, params)) if !resynced => {
                        resynced = true;
                        if !engine.update_time(params.engine_boots, params.engine_time) {
                            engine = EngineState::new(
                                engine.engine_id.clone(),
                                params.engine_boots,
                                params.engine_time,
                            );
                        }
                        tracing::debug!(target: "snmp_credcheck::client", { snmp.engine_boots = engine.engine_boots, snmp.engine_time = engine.engine_time }, "not in time window, resending");
                        msg_id = self.next_request_id();
                        match self.encode_get(usm, &keys, &engine, msg_id, oid) {
                            Ok(data) => Step::Resend(data),
                            Err(e) => Step::Done(Err(e)),
                        }
                    }
                    Ok(Reply::Report(kind, _)) => {
                        tracing::debug!(target: "snmp_credcheck::client", { snmp.target = %target, report = %kind }, "request answered with report");
                        Step::Done(Err(Error::Report { target, kind }.boxed()))
                    }
                }
            })
            .await?;

        // discovery already proved the engine is up
        outcome.map_err(|exhausted| {
            if exhausted.malformed {
                Error::MalformedResponse { target }.boxed()
            } else {
                Error::SilentDrop {
                    target,
                    elapsed: exhausted.elapsed,
                }
                .boxed()
            }
        })
    }

    /// Learn engine ID, boots and time (RFC 3414 4).
    async fn discover(&self, deadline: Instant) -> Result<EngineState> {
        let msg_id = self.next_request_id();
        let target = self.peer_addr();
        let request = V3Message::discovery_request(msg_id).encode();

        tracing::debug!(target: "snmp_credcheck::client", { snmp.msg_id = msg_id }, "engine discovery");

        let outcome = self
            .exchange(request, None, deadline, |_, message| match message {
                Message::V3(msg) if msg.msg_id() == msg_id => Step::Done(
                    UsmSecurityParams::decode(msg.security_params.clone(), target).and_then(|params| {
                        if params.engine_id.is_empty() {
                            tracing::debug!(target: "snmp_credcheck::client", { snmp.target = %target }, "discovery reply without engine ID");
                            return Err(Error::MalformedResponse { target }.boxed());
                        }
                        Ok(EngineState::from_params(&params))
                    }),
                ),
                _ => Step::Ignore,
            })
            .await?;

        let engine = outcome.map_err(|exhausted| self.exhausted_error(exhausted))?;
        tracing::debug!(
            target: "snmp_credcheck::client",
            {
                snmp.engine_id = %Hex(&engine.engine_id),
                snmp.engine_boots = engine.engine_boots,
                snmp.engine_time = engine.engine_time,
            },
            "discovered engine"
        );
        Ok(engine)
    }

    /// Encode an authenticated and, if configured, encrypted GET.
    fn encode_get(
        &self,
        usm: &UsmAuth,
        keys: &UsmKeys,
        engine: &EngineState,
        msg_id: i32,
        oid: &Oid,
    ) -> Result<Bytes> {
        let level = usm.security_level();
        let boots = engine.engine_boots;
        let time = engine.estimated_time();

        let scoped = ScopedPdu::new(
            engine.engine_id.clone(),
            self.config.context_name.clone(),
            Pdu::get_request(msg_id, std::slice::from_ref(oid)),
        );
        let mut params =
            UsmSecurityParams::new(engine.engine_id.clone(), boots, time, usm.username.clone());

        let data = if level.requires_priv() {
            let key = keys
                .privacy
                .as_ref()
                .ok_or_else(|| Error::Config("privacy key missing".into()).boxed())?;
            let (ciphertext, salt) = key.encrypt(&scoped.encode_to_bytes(), boots, time, &self.salt)?;
            params = params.with_priv_params(salt);
            V3MessageData::Encrypted(ciphertext)
        } else {
            V3MessageData::Plaintext(scoped)
        };

        let auth_key = match &keys.auth {
            Some(key) if level.requires_auth() => Some(key),
            None if level.requires_auth() => {
                return Err(Error::Config("authentication key missing".into()).boxed());
            }
            _ => None,
        };
        if let Some(key) = auth_key {
            params = params.with_auth_placeholder(key.mac_len());
        }

        let message = V3Message {
            global_data: MsgGlobalData::new(msg_id, self.config.max_msg_size, MsgFlags::new(level, true)),
            security_params: params.encode(),
            data,
        };
        let mut encoded = message.encode().to_vec();

        if let Some(key) = auth_key {
            let (offset, _) = UsmSecurityParams::find_auth_params_offset(&encoded)
                .ok_or_else(|| Error::Config("auth placeholder not found".into()).boxed())?;
            authenticate_message(key, &mut encoded, offset);
        }
        Ok(Bytes::from(encoded))
    }

    /// Verify, decrypt and classify a reply (RFC 3414 3.2).
    ///
    /// Reports are recognised even when unauthenticated: agents send
    /// unknownUserNames and wrongDigests at noAuthNoPriv.
    fn open_reply(
        &self,
        raw: &[u8],
        msg: V3Message,
        level: SecurityLevel,
        keys: &UsmKeys,
    ) -> Result<Reply> {
        let target = self.peer_addr();
        let params = UsmSecurityParams::decode(msg.security_params.clone(), target)?;
        let reply_level = msg.security_level();

        if reply_level.requires_auth() {
            let key = keys
                .auth
                .as_ref()
                .ok_or_else(|| Error::Auth { target }.boxed())?;
            let verified = UsmSecurityParams::find_auth_params_offset(raw)
                .is_some_and(|(offset, len)| verify_message(key, raw, offset, len));
            if !verified {
                tracing::debug!(target: "snmp_credcheck::auth", { snmp.target = %target }, "reply failed HMAC verification");
                return Err(Error::Auth { target }.boxed());
            }
        }

        let scoped = match msg.data {
            V3MessageData::Plaintext(scoped) => scoped,
            V3MessageData::Encrypted(ciphertext) => {
                let key = keys
                    .privacy
                    .as_ref()
                    .ok_or_else(|| Error::Decrypt { target }.boxed())?;
                let plaintext = key.decrypt(
                    &ciphertext,
                    params.engine_boots,
                    params.engine_time,
                    &params.priv_params,
                    target,
                )?;
                ScopedPdu::decode(&mut Decoder::with_target(plaintext, target))
                    .map_err(|_| Error::Decrypt { target }.boxed())?
            }
        };

        if scoped.pdu.pdu_type == PduType::Report {
            return Ok(Reply::Report(ReportKind::from_pdu(&scoped.pdu), params));
        }
        if reply_level < level {
            tracing::debug!(target: "snmp_credcheck::auth", { snmp.target = %target, reply_level = %reply_level, request_level = %level }, "reply below request security level");
            return Err(Error::Auth { target }.boxed());
        }
        Ok(Reply::Pdu(scoped.pdu))
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::client::{Auth, ClientConfig};
    use crate::oid;
    use crate::transport::MockTransport;
    use crate::v3::{AuthProtocol, LocalizedKey, PrivKey, PrivProtocol, SaltCounter, report_oid};
    use crate::value::Value;

    const ENGINE_ID: &[u8] = b"\x80\x00\x1f\x88\x80mock-agent";

    fn target() -> SocketAddr {
        "192.0.2.20:161".parse().unwrap()
    }

    fn client(transport: MockTransport) -> Client<MockTransport> {
        let config = ClientConfig {
            timeout: Duration::from_millis(200),
            retries: 1,
            ..ClientConfig::default()
        };
        Client::new(transport, config, Arc::new(SaltCounter::new()))
    }

    fn report(msg: &V3Message, counter: u32, boots: u32, time: u32) -> Bytes {
        let params = UsmSecurityParams::new(ENGINE_ID, boots, time, "");
        let header = MsgGlobalData::new(msg.msg_id(), 65507, MsgFlags::new(SecurityLevel::NoAuthNoPriv, false));
        let scoped = ScopedPdu::new(ENGINE_ID, "", Pdu::report(msg.msg_id(), report_oid(counter), 1));
        V3Message::new(header, params.encode(), scoped).encode()
    }

    /// Minimal authNoPriv agent for user "admin" / SHA / "authpassword".
    fn auth_agent(mut on_request: impl FnMut(&V3Message) -> Option<Bytes> + Send + 'static) -> MockTransport {
        let key = LocalizedKey::from_password(AuthProtocol::Sha1, b"authpassword", ENGINE_ID);
        MockTransport::new(target()).respond_with(move |data| {
            let Ok(Message::V3(msg)) = Message::decode(Bytes::copy_from_slice(data), target()) else {
                return Vec::new();
            };
            if msg.security_level() == SecurityLevel::NoAuthNoPriv {
                return vec![report(&msg, 4, 1, 500)];
            }
            if let Some(reply) = on_request(&msg) {
                return vec![reply];
            }
            let (offset, len) = UsmSecurityParams::find_auth_params_offset(data).unwrap();
            if !verify_message(&key, data, offset, len) {
                return vec![report(&msg, 5, 1, 500)];
            }
            let request = msg.scoped_pdu().unwrap().pdu.clone();
            let response = Pdu::response(
                request.request_id,
                vec![VarBind::new(request.varbinds[0].oid.clone(), Value::from("mock"))],
            );
            let params = UsmSecurityParams::new(ENGINE_ID, 1, 500, "admin").with_auth_placeholder(12);
            let header = MsgGlobalData::new(msg.msg_id(), 65507, MsgFlags::new(SecurityLevel::AuthNoPriv, false));
            let mut encoded = V3Message::new(header, params.encode(), ScopedPdu::new(ENGINE_ID, "", response))
                .encode()
                .to_vec();
            let (offset, _) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();
            authenticate_message(&key, &mut encoded, offset);
            vec![Bytes::from(encoded)]
        })
    }

    fn admin(password: &str) -> Auth {
        Auth::usm("admin").auth(AuthProtocol::Sha1, password).into()
    }

    #[tokio::test]
    async fn authenticated_get() {
        let client = client(auth_agent(|_| None));
        let vb = client.get(&admin("authpassword"), &oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
        assert_eq!(vb.value, Value::from("mock"));
    }

    #[tokio::test]
    async fn wrong_key_gets_wrong_digest_report() {
        let client = client(auth_agent(|_| None));
        let err = client.get(&admin("not-the-password"), &oid!(1, 3, 6, 1)).await.unwrap_err();
        assert!(matches!(*err, Error::Report { kind: ReportKind::WrongDigest, .. }), "{err}");
    }

    #[tokio::test]
    async fn unknown_user_report() {
        let client = client(auth_agent(|msg| Some(report(msg, 3, 1, 500))));
        let err = client.get(&admin("authpassword"), &oid!(1, 3, 6, 1)).await.unwrap_err();
        assert!(matches!(*err, Error::Report { kind: ReportKind::UnknownUserName, .. }));
    }

    #[tokio::test]
    async fn resyncs_once_on_time_window() {
        let mut seen = 0;
        let client = client(auth_agent(move |msg| {
            seen += 1;
            (seen == 1).then(|| report(msg, 2, 1, 900))
        }));
        let vb = client.get(&admin("authpassword"), &oid!(1, 3, 6, 1)).await.unwrap();
        assert_eq!(vb.value, Value::from("mock"));
    }

    #[tokio::test]
    async fn persistent_time_window_is_a_report() {
        let client = client(auth_agent(|msg| Some(report(msg, 2, 1, 900))));
        let err = client.get(&admin("authpassword"), &oid!(1, 3, 6, 1)).await.unwrap_err();
        assert!(matches!(*err, Error::Report { kind: ReportKind::NotInTimeWindow, .. }));
    }

    /// Agent that answers discovery and nothing else.
    fn discovery_only() -> MockTransport {
        MockTransport::new(target()).respond_with(|data| {
            match Message::decode(Bytes::copy_from_slice(data), target()) {
                Ok(Message::V3(msg)) if msg.security_level() == SecurityLevel::NoAuthNoPriv => {
                    vec![report(&msg, 4, 1, 500)]
                }
                _ => Vec::new(),
            }
        })
    }

    #[tokio::test]
    async fn dropped_request_after_discovery_is_silent_drop() {
        let err = client(discovery_only())
            .get(&admin("authpassword"), &oid!(1, 3, 6, 1))
            .await
            .unwrap_err();
        assert!(matches!(*err, Error::SilentDrop { .. }), "{err}");
    }

    #[tokio::test]
    async fn undecodable_answers_after_discovery_are_malformed() {
        let client = client(auth_agent(|_| Some(Bytes::from_static(b"\x30\x03xyz"))));
        let err = client.get(&admin("authpassword"), &oid!(1, 3, 6, 1)).await.unwrap_err();
        assert!(matches!(*err, Error::MalformedResponse { .. }), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_agent_times_out_during_discovery() {
        let client = client(MockTransport::new(target()));
        let start = Instant::now();
        let err = client.get(&admin("authpassword"), &oid!(1, 3, 6, 1)).await.unwrap_err();
        assert!(matches!(*err, Error::Timeout { .. }));
        assert!(start.elapsed() <= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn forged_reply_fails_verification() {
        let client = client(auth_agent(|msg| {
            let response = Pdu::response(msg.msg_id(), Vec::new());
            let params = UsmSecurityParams::new(ENGINE_ID, 1, 500, "admin").with_auth_placeholder(12);
            let header = MsgGlobalData::new(msg.msg_id(), 65507, MsgFlags::new(SecurityLevel::AuthNoPriv, false));
            Some(V3Message::new(header, params.encode(), ScopedPdu::new(ENGINE_ID, "", response)).encode())
        }));
        let err = client.get(&admin("authpassword"), &oid!(1, 3, 6, 1)).await.unwrap_err();
        assert!(matches!(*err, Error::Auth { .. }));
    }

    #[tokio::test]
    async fn encrypted_request_round_trip() {
        let auth_key = LocalizedKey::from_password(AuthProtocol::Sha256, b"authpassword", ENGINE_ID);
        let priv_key = PrivKey::from_password(
            AuthProtocol::Sha256,
            PrivProtocol::Aes128,
            b"privpassword",
            ENGINE_ID,
            PrivProtocol::Aes128.default_key_extension(),
        )
        .unwrap();
        let transport = MockTransport::new(target()).respond_with(move |data| {
            let Ok(Message::V3(msg)) = Message::decode(Bytes::copy_from_slice(data), target()) else {
                return Vec::new();
            };
            if msg.security_level() == SecurityLevel::NoAuthNoPriv {
                return vec![report(&msg, 4, 3, 77)];
            }
            let params = UsmSecurityParams::decode(msg.security_params.clone(), target()).unwrap();
            let V3MessageData::Encrypted(ciphertext) = &msg.data else {
                return Vec::new();
            };
            let plain = priv_key
                .decrypt(ciphertext, params.engine_boots, params.engine_time, &params.priv_params, target())
                .unwrap();
            let request = ScopedPdu::decode(&mut Decoder::new(plain)).unwrap();
            let response = Pdu::response(
                request.pdu.request_id,
                vec![VarBind::new(request.pdu.varbinds[0].oid.clone(), Value::Integer(42))],
            );
            let scoped = ScopedPdu::new(ENGINE_ID, "", response).encode_to_bytes();
            let (ciphertext, salt) = priv_key.encrypt(&scoped, 3, 77, &SaltCounter::new()).unwrap();
            let reply_params = UsmSecurityParams::new(ENGINE_ID, 3, 77, "admin")
                .with_auth_placeholder(24)
                .with_priv_params(salt);
            let header = MsgGlobalData::new(msg.msg_id(), 65507, MsgFlags::new(SecurityLevel::AuthPriv, false));
            let mut encoded = V3Message::new_encrypted(header, reply_params.encode(), ciphertext)
                .encode()
                .to_vec();
            let (offset, _) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();
            authenticate_message(&auth_key, &mut encoded, offset);
            vec![Bytes::from(encoded)]
        });
        let auth: Auth = Auth::usm("admin")
            .auth(AuthProtocol::Sha256, "authpassword")
            .privacy(PrivProtocol::Aes128, "privpassword")
            .into();
        let vb = client(transport).get(&auth, &oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)).await.unwrap();
        assert_eq!(vb.value, Value::Integer(42));
    }
}
