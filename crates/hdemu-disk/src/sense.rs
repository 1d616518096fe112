//! Fixed-layout response buffers shared by both drive variants.

use crate::{DeviceState, StatusCode};

/// Allocation length used when REQUEST SENSE asks for 0 bytes: the legacy SASI convention is to
/// transfer the fixed 4-byte header.
pub const DEFAULT_SENSE_LEN: usize = 4;

/// Allocation length field of a 6-byte CDB. A truncated CDB reads as 0.
pub(crate) fn allocation_length(cdb: &[u8]) -> usize {
    cdb.get(4).copied().map_or(0, usize::from)
}

/// Builds the non-extended sense buffer for REQUEST SENSE.
///
/// Byte 0 carries the sense key of the latched status, byte 1 the LUN in its top three bits. All
/// other bytes are zero.
pub fn request_sense(state: &DeviceState, cdb: &[u8]) -> Vec<u8> {
    let len = match allocation_length(cdb) {
        0 => DEFAULT_SENSE_LEN,
        n => n,
    };

    let mut buf = vec![0u8; len];
    buf[0] = state.status().sense_key();
    if let Some(lun_byte) = buf.get_mut(1) {
        *lun_byte = state.lun() << 5;
    }
    buf
}

/// Response for a command the variant does not implement: latch INVALID COMMAND and transfer
/// nothing.
pub fn unsupported_command(state: &mut DeviceState) -> Vec<u8> {
    state.set_status(StatusCode::INVALID_COMMAND);
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_sense_cdb(alloc_len: u8) -> [u8; 6] {
        let mut cdb = [0u8; 6];
        cdb[0] = 0x03;
        cdb[4] = alloc_len;
        cdb
    }

    #[test]
    fn zero_length_transfers_fixed_header() {
        let state = DeviceState::new(2);
        let buf = request_sense(&state, &request_sense_cdb(0));
        assert_eq!(buf, [0x00, 0x40, 0x00, 0x00]);
    }

    #[test]
    fn sense_key_comes_from_bits_16_to_23() {
        let mut state = DeviceState::new(0);
        state.set_status(StatusCode::from_raw(0x00_07_27_00));
        let buf = request_sense(&state, &request_sense_cdb(18));
        assert_eq!(buf.len(), 18);
        assert_eq!(buf[0], 0x07);
        assert!(buf[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn single_byte_request_only_carries_the_sense_key() {
        let mut state = DeviceState::new(3);
        state.set_status(StatusCode::INVALID_COMMAND);
        let buf = request_sense(&state, &request_sense_cdb(1));
        assert_eq!(buf, [0x05]);
    }

    #[test]
    fn truncated_cdb_reads_as_zero_length() {
        let state = DeviceState::new(0);
        assert_eq!(request_sense(&state, &[0x03]).len(), DEFAULT_SENSE_LEN);
    }

    #[test]
    fn unsupported_command_latches_invalid_command() {
        let mut state = DeviceState::new(0);
        assert!(unsupported_command(&mut state).is_empty());
        assert_eq!(state.status(), StatusCode::INVALID_COMMAND);
    }
}
