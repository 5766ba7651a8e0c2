//! Transport-level payload validation (`spec.md` §4.7): the registry subject
//! rejects oversize requests before they ever reach the dispatcher.

use capreg_core::{ErrorCode, RegistryError};

/// Maximum accepted request payload, in bytes (`spec.md` §6).
pub const MAX_REQUEST_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Reject a payload larger than [`MAX_REQUEST_PAYLOAD_BYTES`].
///
/// # Errors
///
/// `InvalidRequest` with message `"Request body too large"` when `payload`
/// exceeds the limit.
pub fn check_payload_size(payload: &[u8]) -> Result<(), RegistryError> {
    if payload.len() > MAX_REQUEST_PAYLOAD_BYTES {
        return Err(RegistryError::new(ErrorCode::InvalidRequest, "Request body too large"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_payload_at_the_limit() {
        let payload = vec![0u8; MAX_REQUEST_PAYLOAD_BYTES];
        assert!(check_payload_size(&payload).is_ok());
    }

    #[test]
    fn rejects_payload_over_the_limit() {
        let payload = vec![0u8; MAX_REQUEST_PAYLOAD_BYTES + 1];
        let err = check_payload_size(&payload).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }
}
