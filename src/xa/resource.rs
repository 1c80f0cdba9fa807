//! Two-phase commit resource

use super::XaResolverSession;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Global transaction branch identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xid {
    pub format_id: i32,
    pub gtrid: Vec<u8>,
    pub bqual: Vec<u8>,
}

impl Xid {
    pub fn new(format_id: i32, gtrid: impl Into<Vec<u8>>, bqual: impl Into<Vec<u8>>) -> Self {
        Self {
            format_id,
            gtrid: gtrid.into(),
            bqual: bqual.into(),
        }
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.format_id)?;
        for byte in &self.gtrid {
            write!(f, "{:02x}", byte)?;
        }
        f.write_str(":")?;
        for byte in &self.bqual {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// XA flag word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct XaFlags(pub u32);

impl XaFlags {
    pub const TMNOFLAGS: XaFlags = XaFlags(0);
    pub const TMENDRSCAN: XaFlags = XaFlags(0x0080_0000);
    pub const TMSTARTRSCAN: XaFlags = XaFlags(0x0100_0000);
    pub const TMSUSPEND: XaFlags = XaFlags(0x0200_0000);
    pub const TMSUCCESS: XaFlags = XaFlags(0x0400_0000);
    pub const TMRESUME: XaFlags = XaFlags(0x0800_0000);
    pub const TMFAIL: XaFlags = XaFlags(0x2000_0000);
    pub const TMONEPHASE: XaFlags = XaFlags(0x4000_0000);
    pub const TMJOIN: XaFlags = XaFlags(0x0020_0000);

    const NAMES: [(XaFlags, &'static str); 8] = [
        (XaFlags::TMENDRSCAN, "TMENDRSCAN"),
        (XaFlags::TMFAIL, "TMFAIL"),
        (XaFlags::TMJOIN, "TMJOIN"),
        (XaFlags::TMONEPHASE, "TMONEPHASE"),
        (XaFlags::TMRESUME, "TMRESUME"),
        (XaFlags::TMSTARTRSCAN, "TMSTARTRSCAN"),
        (XaFlags::TMSUCCESS, "TMSUCCESS"),
        (XaFlags::TMSUSPEND, "TMSUSPEND"),
    ];

    /// Check if every bit of `other` is set
    pub fn contains(self, other: XaFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Display for XaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_flags(*self))
    }
}

/// Render flags for logs, e.g. `TMJOIN|TMRESUME`.
pub fn format_flags(flags: XaFlags) -> String {
    if flags == XaFlags::TMNOFLAGS {
        return "TMNOFLAGS".to_string();
    }
    let mut names: Vec<String> = XaFlags::NAMES
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, name)| (*name).to_string())
        .collect();
    let known = XaFlags::NAMES.iter().fold(0, |acc, (flag, _)| acc | flag.0);
    if flags.0 & !known != 0 {
        names.push(format!("{:#x}", flags.0 & !known));
    }
    names.join("|")
}

/// XA errors, each carrying its protocol code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XaError {
    #[error("XA_RBROLLBACK: {0}")]
    RbRollback(String),

    #[error("XAER_RMERR: {0}")]
    RmErr(String),

    #[error("XAER_NOTA: {0}")]
    Nota(String),

    #[error("XAER_INVAL: {0}")]
    Inval(String),

    #[error("XAER_PROTO: {0}")]
    Proto(String),

    #[error("XAER_RMFAIL: {0}")]
    RmFail(String),
}

impl XaError {
    /// Numeric XA error code
    pub fn code(&self) -> i32 {
        match self {
            XaError::RbRollback(_) => 100,
            XaError::RmErr(_) => -3,
            XaError::Nota(_) => -4,
            XaError::Inval(_) => -5,
            XaError::Proto(_) => -6,
            XaError::RmFail(_) => -7,
        }
    }
}

pub type XaResult<T> = Result<T, XaError>;

/// Outcome of a successful prepare. This resource never votes read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XaVote {
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum XaState {
    Idle,
    Active(Xid),
    Prepared(Xid),
    RollbackOnly(Xid),
}

impl XaState {
    fn xid(&self) -> Option<&Xid> {
        match self {
            XaState::Idle => None,
            XaState::Active(xid) | XaState::Prepared(xid) | XaState::RollbackOnly(xid) => Some(xid),
        }
    }
}

/// XA resource over one resolver session.
///
/// Associates at most one transaction branch with the session at a time.
pub struct StoreXaResource {
    session: XaResolverSession,
    state: XaState,
    timeout_secs: u64,
}

impl StoreXaResource {
    pub fn new(session: XaResolverSession, timeout_secs: u64) -> Self {
        Self {
            session,
            state: XaState::Idle,
            timeout_secs,
        }
    }

    /// The session the branch writes through
    pub fn session(&self) -> &XaResolverSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut XaResolverSession {
        &mut self.session
    }

    /// Xid of the associated branch, if any
    pub fn current_xid(&self) -> Option<&Xid> {
        self.state.xid()
    }

    /// Check if the branch can only be rolled back
    pub fn is_rollback_only(&self) -> bool {
        matches!(self.state, XaState::RollbackOnly(_))
    }

    fn is_current(&self, xid: &Xid) -> bool {
        self.state.xid() == Some(xid)
    }

    pub fn start(&mut self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        debug!("Start {} flags={}", xid, format_flags(flags));
        match flags {
            XaFlags::TMNOFLAGS => {
                if let XaState::Prepared(current) = &self.state {
                    return Err(XaError::Proto(format!("branch {} is prepared", current)));
                }
                self.session.refresh().map_err(|e| {
                    self.state = XaState::Idle;
                    XaError::RmFail(format!("refresh failed: {}", e))
                })?;
                self.state = XaState::Active(xid.clone());
                Ok(())
            }
            XaFlags::TMRESUME | XaFlags::TMJOIN => match &self.state {
                XaState::Active(current) if current == xid => Ok(()),
                _ => Err(XaError::Inval(format!(
                    "{} of unknown branch {}",
                    format_flags(flags),
                    xid
                ))),
            },
            _ => {
                warn!("Unrecognised start flags {} for {}", format_flags(flags), xid);
                self.state = XaState::RollbackOnly(xid.clone());
                Err(XaError::Inval(format!("unrecognised flags {}", format_flags(flags))))
            }
        }
    }

    /// Dissociate the branch. Only logged; the branch stays attached.
    pub fn end(&mut self, xid: &Xid, flags: XaFlags) -> XaResult<()> {
        debug!("End {} flags={}", xid, format_flags(flags));
        Ok(())
    }

    pub fn prepare(&mut self, xid: &Xid) -> XaResult<XaVote> {
        debug!("Prepare {}", xid);
        if self.is_rollback_only() {
            return Err(XaError::RbRollback(format!("branch {} is marked rollback-only", xid)));
        }
        if !self.is_current(xid) {
            return Err(XaError::Nota(format!("prepare of unknown branch {}", xid)));
        }
        if let XaState::Prepared(_) = self.state {
            return Ok(XaVote::Ok);
        }
        match self.session.prepare() {
            Ok(()) => {
                self.state = XaState::Prepared(xid.clone());
                Ok(XaVote::Ok)
            }
            Err(e) => {
                warn!("Prepare of {} failed: {}", xid, e);
                self.state = XaState::RollbackOnly(xid.clone());
                Err(XaError::RbRollback(format!("prepare failed: {}", e)))
            }
        }
    }

    pub fn commit(&mut self, xid: &Xid, one_phase: bool) -> XaResult<()> {
        debug!("Commit {} one_phase={}", xid, one_phase);
        if self.is_rollback_only() {
            return Err(XaError::RbRollback(format!("branch {} is marked rollback-only", xid)));
        }
        if !self.is_current(xid) {
            return Err(XaError::Nota(format!("commit of unknown branch {}", xid)));
        }

        if one_phase {
            if let Err(e) = self.session.prepare() {
                warn!("One-phase prepare of {} failed: {}", xid, e);
                self.state = XaState::RollbackOnly(xid.clone());
                return Err(XaError::RbRollback(format!("prepare failed: {}", e)));
            }
        }

        let result = self.session.commit();
        self.state = XaState::Idle;
        result.map_err(|e| {
            error!(fatal = true, "Commit of {} failed, store may be inconsistent: {}", xid, e);
            XaError::RmErr(format!("commit failed: {}", e))
        })
    }

    /// Roll the branch back. The session is rolled back even when `xid` is
    /// not the associated branch; that case is still reported as an error.
    pub fn rollback(&mut self, xid: &Xid) -> XaResult<()> {
        debug!("Rollback {}", xid);
        let mut fatal = None;
        if !self.is_current(xid) {
            error!(fatal = true, "Rollback of {} which is not the associated branch", xid);
            fatal = Some(format!("rollback of unknown branch {}", xid));
        }
        if let Err(e) = self.session.rollback() {
            error!(fatal = true, "Rollback of {} failed: {}", xid, e);
            fatal = Some(format!("rollback failed: {}", e));
        }
        self.state = XaState::Idle;
        match fatal {
            Some(reason) => Err(XaError::RmErr(reason)),
            None => Ok(()),
        }
    }

    /// Forget the branch and release the session.
    pub fn forget(&mut self, xid: &Xid) -> XaResult<()> {
        debug!("Forget {}", xid);
        self.state = XaState::Idle;
        self.session
            .release()
            .map_err(|e| XaError::RmErr(format!("release failed: {}", e)))
    }

    /// In-doubt branches cannot be listed.
    pub fn recover(&mut self, flags: XaFlags) -> XaResult<Vec<Xid>> {
        warn!("Recover requested with flags {}", format_flags(flags));
        Err(XaError::RmErr("recover is not supported".to_string()))
    }

    /// Check if `other` is this resource
    pub fn is_same_rm(&self, other: &StoreXaResource) -> bool {
        std::ptr::eq(self, other)
    }

    pub fn get_transaction_timeout(&self) -> u64 {
        self.timeout_secs
    }

    pub fn set_transaction_timeout(&mut self, secs: u64) -> bool {
        self.timeout_secs = secs;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_flags() {
        assert_eq!(format_flags(XaFlags::TMNOFLAGS), "TMNOFLAGS");
        assert_eq!(
            format_flags(XaFlags(XaFlags::TMJOIN.0 | XaFlags::TMRESUME.0)),
            "TMJOIN|TMRESUME"
        );
        assert_eq!(format_flags(XaFlags(0x1)), "0x1");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(XaError::RbRollback(String::new()).code(), 100);
        assert_eq!(XaError::Nota(String::new()).code(), -4);
        assert_eq!(XaError::RmFail(String::new()).code(), -7);
    }

    #[test]
    fn test_xid_display() {
        let xid = Xid::new(1, vec![0xab], vec![0x01, 0x02]);
        assert_eq!(xid.to_string(), "1:ab:0102");
    }
}
