//! Authoritative engine state and usmStats reports (RFC 3414 3, 4).
//!
//! A probe discovers the agent's engine ID, boots and time with an
//! unauthenticated request, then sends authenticated traffic stamped with
//! the estimated engine time. Agents refuse requests outside a 150 second
//! window with a notInTimeWindows report that carries fresh values.

use std::fmt;
use std::time::Instant;

use bytes::Bytes;

use super::UsmSecurityParams;
use crate::format::Hex;
use crate::oid::Oid;
use crate::pdu::Pdu;

/// Seconds of clock skew an agent tolerates (RFC 3414 2.2.3).
pub const TIME_WINDOW: u32 = 150;

/// snmpEngineTime and snmpEngineBoots never exceed 2^31 - 1.
pub const MAX_ENGINE_VALUE: u32 = 2_147_483_647;

const USM_STATS_PREFIX: [u32; 9] = [1, 3, 6, 1, 6, 3, 15, 1, 1];

/// `usmStats` counter instance `n`: `1.3.6.1.6.3.15.1.1.n.0`.
pub fn report_oid(n: u32) -> Oid {
    let mut arcs = USM_STATS_PREFIX.to_vec();
    arcs.extend([n, 0]);
    Oid::new(arcs)
}

/// What a Report PDU says went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    /// usmStatsUnsupportedSecLevels: the user is not configured for this level.
    UnsupportedSecLevel,
    /// usmStatsNotInTimeWindows: engine boots/time out of date.
    NotInTimeWindow,
    /// usmStatsUnknownUserNames
    UnknownUserName,
    /// usmStatsUnknownEngineIDs: expected reply to discovery.
    UnknownEngineId,
    /// usmStatsWrongDigests: the user exists but the HMAC did not verify.
    WrongDigest,
    /// usmStatsDecryptionErrors
    DecryptionError,
    /// Any other counter, such as snmpUnknownContexts.
    Other(Oid),
}

impl ReportKind {
    /// Classify by the first binding's OID.
    pub fn from_pdu(pdu: &Pdu) -> Self {
        match pdu.varbinds.first() {
            Some(vb) => Self::from_oid(&vb.oid),
            None => Self::Other(Oid::default()),
        }
    }

    pub fn from_oid(oid: &Oid) -> Self {
        // some agents omit the .0 instance arc
        let arcs = oid.arcs();
        let counter = match arcs.strip_prefix(&USM_STATS_PREFIX[..]) {
            Some([n]) | Some([n, 0]) => Some(*n),
            _ => None,
        };
        match counter {
            Some(1) => Self::UnsupportedSecLevel,
            Some(2) => Self::NotInTimeWindow,
            Some(3) => Self::UnknownUserName,
            Some(4) => Self::UnknownEngineId,
            Some(5) => Self::WrongDigest,
            Some(6) => Self::DecryptionError,
            _ => Self::Other(oid.clone()),
        }
    }

    /// Counter OID this kind is reported under.
    pub fn oid(&self) -> Oid {
        match self {
            Self::UnsupportedSecLevel => report_oid(1),
            Self::NotInTimeWindow => report_oid(2),
            Self::UnknownUserName => report_oid(3),
            Self::UnknownEngineId => report_oid(4),
            Self::WrongDigest => report_oid(5),
            Self::DecryptionError => report_oid(6),
            Self::Other(oid) => oid.clone(),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedSecLevel => f.write_str("usmStatsUnsupportedSecLevels"),
            Self::NotInTimeWindow => f.write_str("usmStatsNotInTimeWindows"),
            Self::UnknownUserName => f.write_str("usmStatsUnknownUserNames"),
            Self::UnknownEngineId => f.write_str("usmStatsUnknownEngineIDs"),
            Self::WrongDigest => f.write_str("usmStatsWrongDigests"),
            Self::DecryptionError => f.write_str("usmStatsDecryptionErrors"),
            Self::Other(oid) => write!(f, "report {oid}"),
        }
    }
}

/// Timeliness values learned from the authoritative engine.
#[derive(Clone)]
pub struct EngineState {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    /// Local instant `engine_time` was received.
    pub synced_at: Instant,
    /// Highest time seen in this boot cycle, for replay detection.
    pub latest_received_engine_time: u32,
}

impl EngineState {
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
            latest_received_engine_time: engine_time,
        }
    }

    /// State from the security parameters of a discovery reply.
    pub fn from_params(params: &UsmSecurityParams) -> Self {
        Self::new(
            params.engine_id.clone(),
            params.engine_boots,
            params.engine_time,
        )
    }

    /// Engine time now, extrapolated from the last sync.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = u32::try_from(self.synced_at.elapsed().as_secs()).unwrap_or(u32::MAX);
        self.engine_time
            .saturating_add(elapsed)
            .min(MAX_ENGINE_VALUE)
    }

    /// Adopt newer timeliness values (RFC 3414 3.2 step 7b).
    ///
    /// Returns `true` if the state changed.
    pub fn update_time(&mut self, boots: u32, time: u32) -> bool {
        let newer = boots > self.engine_boots
            || (boots == self.engine_boots && time > self.latest_received_engine_time);
        if newer {
            self.engine_boots = boots;
            self.engine_time = time;
            self.synced_at = Instant::now();
            self.latest_received_engine_time = time;
        }
        newer
    }

    /// Whether a message stamped `boots`/`time` is acceptable.
    pub fn is_in_time_window(&self, boots: u32, time: u32) -> bool {
        if self.engine_boots == MAX_ENGINE_VALUE || boots != self.engine_boots {
            return false;
        }
        time.abs_diff(self.estimated_time()) <= TIME_WINDOW
    }
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field("engine_id", &Hex(&self.engine_id))
            .field("engine_boots", &self.engine_boots)
            .field("engine_time", &self.engine_time)
            .finish_non_exhaustive()
    }
}
