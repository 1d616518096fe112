use crate::StatusCode;

/// Highest logical unit a single target can address (3-bit field).
pub const MAX_LUN: u8 = 7;

/// Per-device flags mutated by the command dispatcher and by bus reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    locked: bool,
    attention: bool,
    reset_pending: bool,
    status: StatusCode,
    lun: u8,
    ready: bool,
}

impl DeviceState {
    /// Only the low three bits of `lun` are kept, so 9 addresses LUN 1. Callers that need to
    /// reject out-of-range units validate before constructing (see `DeviceConfig::validate`).
    pub fn new(lun: u8) -> Self {
        Self {
            lun: lun & MAX_LUN,
            ..Self::default()
        }
    }

    /// Bus reset: unlock, drop pending attention/reset and clear the latched status.
    ///
    /// Readiness and the LUN belong to the attached image and are left alone.
    pub fn reset(&mut self) {
        self.locked = false;
        self.attention = false;
        self.reset_pending = false;
        self.status = StatusCode::NO_ERROR;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn has_attention(&self) -> bool {
        self.attention
    }

    pub fn set_attention(&mut self, attention: bool) {
        self.attention = attention;
    }

    pub fn is_reset_pending(&self) -> bool {
        self.reset_pending
    }

    pub fn set_reset_pending(&mut self, pending: bool) {
        self.reset_pending = pending;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn lun(&self) -> u8 {
        self.lun
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lun_is_masked_to_three_bits() {
        assert_eq!(DeviceState::new(2).lun(), 2);
        assert_eq!(DeviceState::new(0x0A).lun(), 2);
    }

    #[test]
    fn reset_clears_flags_but_keeps_readiness() {
        let mut state = DeviceState::new(1);
        state.set_locked(true);
        state.set_attention(true);
        state.set_reset_pending(true);
        state.set_status(StatusCode::NOT_READY);
        state.set_ready(true);

        state.reset();
        let once = state.clone();
        state.reset();

        assert_eq!(state, once);
        assert!(!state.is_locked());
        assert!(!state.has_attention());
        assert!(!state.is_reset_pending());
        assert_eq!(state.status(), StatusCode::NO_ERROR);
        assert!(state.is_ready());
        assert_eq!(state.lun(), 1);
    }
}
